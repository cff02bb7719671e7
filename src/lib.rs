//! # hirag
//!
//! A hybrid cache and storage coordinator for hierarchical retrieval over
//! structured legal documents.
//!
//! hirag parses a statute-like source document into a part/chapter/section/
//! article/clause tree, derives routing indexes and branch summaries, embeds
//! clause texts, and keeps all of it consistent across three stores under
//! one storage root:
//!
//! ```text
//! ┌────────────┐   ┌───────────────────┐
//! │  Source    │──▶│  Build pipeline    │
//! │ .docx/.txt │   │ parse→index→embed │
//! └────────────┘   └────────┬──────────┘
//!                           │
//!                ┌──────────┼──────────────┐
//!                ▼          ▼              ▼
//!          ┌─────────┐ ┌─────────┐  ┌───────────┐
//!          │ SQLite  │ │ Objects │  │  Vectors  │
//!          │metadata │ │ (JSON)  │  │ (cosine)  │
//!          └─────────┘ └─────────┘  └───────────┘
//! ```
//!
//! The [`coordinator::CacheCoordinator`] is the only API that touches more
//! than one store; it owns content fingerprinting, invalidation, and the
//! staged build protocol whose stage flags flip strictly after the artifacts
//! they describe are durable.
//!
//! ## Quick Start
//!
//! ```bash
//! hirag build ./civil_code.docx     # parse, index, embed
//! hirag list                        # registered documents and stage flags
//! hirag search 1 "contract formation"
//! hirag vacuum                      # compact metadata, sweep orphans
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Store error taxonomy |
//! | [`coordinator`] | Cross-store cache coordinator |
//! | [`meta`] | SQLite metadata store |
//! | [`objects`] | Filesystem object store |
//! | [`vectors`] | File-backed vector index |
//! | [`parse`] | Hierarchy parser |
//! | [`index`] | Index and summary builders |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`pipeline`] | Staged build pipeline |

pub mod config;
pub mod coordinator;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod meta;
pub mod migrate;
pub mod models;
pub mod objects;
pub mod parse;
pub mod pipeline;
pub mod search;
pub mod status;
pub mod vacuum;
pub mod vectors;
