//! Converts uploaded files into plain text.
//!
//! Extraction is total: every failure mode degrades to placeholder text so
//! the prompt pipeline always receives a string, never an error.

use std::path::Path;

/// Hard cap on bytes read from a single uploaded file.
pub const MAX_FILE_BYTES: usize = 10 * 1024 * 1024;

/// Word cap applied to extracted PDF text.
pub const MAX_PDF_WORDS: usize = 10_000;

const ALLOWED_EXTENSIONS: [&str; 5] = [".pdf", ".txt", ".csv", ".json", ".md"];

/// Text extracted from one uploaded file.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedDocument {
    pub filename: String,
    pub text: String,
}

/// Extract text from an uploaded file.
///
/// Unsupported extensions, oversized input, undecodable bytes and broken
/// PDFs all yield placeholder text inline rather than an error.
pub fn extract(filename: &str, raw: &[u8]) -> ExtractedDocument {
    let ext = extension_of(filename);
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return ExtractedDocument {
            filename: filename.to_string(),
            text: format!("[Unsupported file type: {ext}]"),
        };
    }

    let capped = &raw[..raw.len().min(MAX_FILE_BYTES)];
    let text = if ext == ".pdf" {
        extract_pdf(capped)
    } else {
        let mut text = String::from_utf8_lossy(capped).into_owned();
        if raw.len() >= MAX_FILE_BYTES {
            text.push_str("\n\n[FILE TRUNCATED]");
        }
        text
    };

    ExtractedDocument {
        filename: filename.to_string(),
        text,
    }
}

/// Lowercased extension including the leading dot, or an empty string.
fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_default()
}

/// Per-page PDF text labeled `--- Page N ---`, joined by blank lines.
fn extract_pdf(raw: &[u8]) -> String {
    let doc = match lopdf::Document::load_mem(raw) {
        Ok(doc) => doc,
        Err(e) => return format!("[Could not extract PDF: {e}]"),
    };

    let mut pages = Vec::new();
    for &number in doc.get_pages().keys() {
        // A page that fails to decode is treated like a blank page.
        let text = doc.extract_text(&[number]).unwrap_or_default();
        let text = text.trim();
        if !text.is_empty() {
            pages.push(format!("--- Page {number} ---\n{text}"));
        }
    }

    if pages.is_empty() {
        return "[PDF contains no extractable text]".to_string();
    }
    truncate_words(pages.join("\n\n"))
}

/// Cap extracted text at [`MAX_PDF_WORDS`] words, appending a marker when cut.
fn truncate_words(full: String) -> String {
    let words: Vec<&str> = full.split_whitespace().collect();
    if words.len() <= MAX_PDF_WORDS {
        return full;
    }
    format!(
        "{}\n\n[PDF TRUNCATED - showing first 10000 words]",
        words[..MAX_PDF_WORDS].join(" ")
    )
}
