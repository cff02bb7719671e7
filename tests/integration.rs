use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn hirag_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("hirag");
    path
}

const SAMPLE_LAW: &str = "\
CIVIL CODE 2015
PART ONE
CHAPTER I
Article 1. Scope
1. This Code governs civil relations.
2. Personal and property relations are included.
Article 2. Principles
All persons are equal before civil law.
CHAPTER II
Section 1
Article 3. Application
1. Custom applies where the law is silent.
";

/// Config with embeddings disabled; builds stop after the indexed stage.
fn setup_test_env() -> (TempDir, PathBuf, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let store_dir = root.join("store");
    fs::create_dir_all(&store_dir).unwrap();

    let source = root.join("civil_code.txt");
    fs::write(&source, SAMPLE_LAW).unwrap();

    let config_content = format!(
        r#"[storage]
root = "{}/store"

[embedding]
provider = "disabled"

[retrieval]
top_k = 3
"#,
        root.display()
    );

    let config_path = root.join("hirag.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path, source)
}

fn run_hirag(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = hirag_binary();
    let output = Command::new(&binary)
        .env_remove("OPENAI_API_KEY")
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run hirag binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_build_with_disabled_embeddings_succeeds() {
    let (_tmp, config_path, source) = setup_test_env();

    let (stdout, stderr, success) =
        run_hirag(&config_path, &["build", source.to_str().unwrap()]);
    assert!(success, "build failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("parsed"));
    assert!(stdout.contains("indexed"));
    assert!(stdout.contains("embedded stage left pending"));
}

#[test]
fn test_list_shows_stage_flags() {
    let (_tmp, config_path, source) = setup_test_env();

    run_hirag(&config_path, &["build", source.to_str().unwrap()]);
    let (stdout, _, success) = run_hirag(&config_path, &["list"]);
    assert!(success);
    assert!(stdout.contains("civil_code"));
    // Parsed and indexed complete, embedded pending
    assert!(stdout.contains("P I -"));
}

#[test]
fn test_list_empty_store() {
    let (_tmp, config_path, _) = setup_test_env();

    let (stdout, _, success) = run_hirag(&config_path, &["list"]);
    assert!(success);
    assert!(stdout.contains("No documents registered"));
}

#[test]
fn test_info_reports_counts() {
    let (_tmp, config_path, source) = setup_test_env();

    run_hirag(&config_path, &["build", source.to_str().unwrap()]);
    let (stdout, _, success) = run_hirag(&config_path, &["info"]);
    assert!(success);
    assert!(stdout.contains("Documents:   1"));
    assert!(stdout.contains("parsed:"));
    assert!(stdout.contains("article"));
}

#[test]
fn test_inspect_shows_node_counts() {
    let (_tmp, config_path, source) = setup_test_env();

    run_hirag(&config_path, &["build", source.to_str().unwrap()]);
    let (stdout, _, success) = run_hirag(&config_path, &["inspect", "1"]);
    assert!(success);
    assert!(stdout.contains("Source:"));
    assert!(stdout.contains("Fingerprint:"));
    assert!(stdout.contains("part"));
    assert!(stdout.contains("clause"));
    assert!(stdout.contains("incomplete or stale"));
}

#[test]
fn test_inspect_unknown_id_fails() {
    let (_tmp, config_path, _) = setup_test_env();

    let (_, stderr, success) = run_hirag(&config_path, &["inspect", "99"]);
    assert!(!success);
    assert!(stderr.contains("not registered"));
}

#[test]
fn test_clear_keeps_registration() {
    let (_tmp, config_path, source) = setup_test_env();

    run_hirag(&config_path, &["build", source.to_str().unwrap()]);
    let (stdout, _, success) = run_hirag(&config_path, &["clear", "1"]);
    assert!(success, "clear failed: {}", stdout);

    // Still listed, but all stages reset
    let (stdout, _, _) = run_hirag(&config_path, &["list"]);
    assert!(stdout.contains("civil_code"));
    assert!(stdout.contains("- - -"));
}

#[test]
fn test_clear_is_idempotent() {
    let (_tmp, config_path, source) = setup_test_env();

    run_hirag(&config_path, &["build", source.to_str().unwrap()]);
    let (_, _, success1) = run_hirag(&config_path, &["clear", "1"]);
    assert!(success1);
    let (_, _, success2) = run_hirag(&config_path, &["clear", "1"]);
    assert!(success2, "second clear failed (not idempotent)");
}

#[test]
fn test_rebuild_reprocesses_document() {
    let (_tmp, config_path, source) = setup_test_env();

    run_hirag(&config_path, &["build", source.to_str().unwrap()]);
    let (stdout, stderr, success) = run_hirag(&config_path, &["rebuild", "1"]);
    assert!(success, "rebuild failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("parsed"));
}

#[test]
fn test_vacuum_reports_sweeps() {
    let (_tmp, config_path, source) = setup_test_env();

    run_hirag(&config_path, &["build", source.to_str().unwrap()]);
    let (stdout, stderr, success) = run_hirag(&config_path, &["vacuum"]);
    assert!(success, "vacuum failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("pages"));
    assert!(stdout.contains("0 orphaned blob(s) removed"));
}

#[test]
fn test_info_is_best_effort_when_store_unavailable() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();

    // A regular file where the storage root should be: every store fails
    // to open
    fs::write(root.join("store"), b"not a directory").unwrap();
    let config_content = format!(
        r#"[storage]
root = "{}/store"
"#,
        root.display()
    );
    let config_path = root.join("hirag.toml");
    fs::write(&config_path, config_content).unwrap();

    let (stdout, stderr, success) = run_hirag(&config_path, &["info"]);
    assert!(
        success,
        "info must exit 0 on store failure: stdout={}, stderr={}",
        stdout, stderr
    );
    assert!(stdout.contains("Store Overview"));
    assert!(stdout.contains("unavailable"));
}

#[test]
fn test_build_without_api_key_fails_at_embed_stage() {
    let (_tmp, config_path, source) = setup_test_env();

    // Same store, but with a remote provider configured and no API key in
    // the environment
    let config_content = fs::read_to_string(&config_path)
        .unwrap()
        .replace("provider = \"disabled\"", "provider = \"openai\"\nmodel = \"text-embedding-3-small\"\ndims = 1536");
    fs::write(&config_path, config_content).unwrap();

    let (stdout, stderr, success) = run_hirag(&config_path, &["build", source.to_str().unwrap()]);
    assert!(!success, "build must fail without OPENAI_API_KEY: {}", stdout);
    assert!(stderr.contains("OPENAI_API_KEY"));

    // Parse and index stages committed before the provider error
    let (stdout, _, _) = run_hirag(&config_path, &["list"]);
    assert!(stdout.contains("P I -"));
}

#[test]
fn test_search_requires_embedding_provider() {
    let (_tmp, config_path, source) = setup_test_env();

    run_hirag(&config_path, &["build", source.to_str().unwrap()]);
    let (_, stderr, success) = run_hirag(&config_path, &["search", "1", "civil relations"]);
    assert!(!success);
    assert!(stderr.contains("embedding provider"));
}

#[test]
fn test_build_unknown_source_fails() {
    let (_tmp, config_path, _) = setup_test_env();

    let (_, stderr, success) = run_hirag(&config_path, &["build", "/nonexistent/law.txt"]);
    assert!(!success);
    assert!(stderr.contains("not found") || stderr.contains("Source"));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("absent.toml");

    let (_, stderr, success) = run_hirag(&config_path, &["list"]);
    assert!(!success);
    assert!(stderr.contains("config"));
}
