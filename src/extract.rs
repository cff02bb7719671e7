//! Text extraction for source documents.
//!
//! Plain text and Markdown pass through untouched; `.docx` files are
//! unzipped and the paragraph text of `word/document.xml` is extracted.
//! Paragraph boundaries become newlines, which the hierarchy parser relies
//! on for heading detection.

use anyhow::{bail, Context, Result};
use std::io::Read;
use std::path::Path;

/// Decompressed size limit for a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Read a source file and return its plain text.
pub fn read_source_text(path: &Path) -> Result<String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "docx" => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read source file: {}", path.display()))?;
            extract_docx(&bytes)
        }
        "txt" | "md" | "" => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read source file: {}", path.display())),
        other => bail!("Unsupported source format: .{other} (expected .docx, .txt, or .md)"),
    }
}

/// Extract paragraph text from a DOCX archive, one line per `w:p` element.
pub fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .context("not a valid DOCX archive")?;

    let mut doc_xml = Vec::new();
    {
        let entry = archive
            .by_name("word/document.xml")
            .context("word/document.xml not found in archive")?;
        entry
            .take(MAX_XML_ENTRY_BYTES)
            .read_to_end(&mut doc_xml)
            .context("failed to read word/document.xml")?;
        if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
            bail!("word/document.xml exceeds size limit");
        }
    }

    extract_paragraphs(&doc_xml)
}

/// Walk the document XML collecting `w:t` text, emitting a newline at the
/// end of each `w:p` paragraph.
fn extract_paragraphs(xml: &[u8]) -> Result<String> {
    let mut out = String::new();
    let mut paragraph = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_t = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_t = true;
                }
            }
            Ok(quick_xml::events::Event::Text(te)) if in_t => {
                paragraph.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(quick_xml::events::Event::End(e)) => {
                let name = e.local_name();
                if name.as_ref() == b"t" {
                    in_t = false;
                } else if name.as_ref() == b"p" {
                    let trimmed = paragraph.trim();
                    if !trimmed.is_empty() {
                        out.push_str(trimmed);
                        out.push('\n');
                    }
                    paragraph.clear();
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => bail!("malformed document XML: {e}"),
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}
