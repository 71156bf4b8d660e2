//! Email attachments

use base64::{engine::general_purpose::STANDARD, Engine as _};

const TEXT_UTF8: &str = "text/plain; charset=utf-8";
const HTML_UTF8: &str = "text/html; charset=utf-8";

/// Leading byte signatures of formats commonly attached to emails
const SIGNATURES: &[(&[u8], &str)] = &[
    (b"%PDF-", "application/pdf"),
    (b"\x89PNG\r\n\x1a\n", "image/png"),
    (b"\xFF\xD8\xFF", "image/jpeg"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"PK\x03\x04", "application/zip"),
    (b"\x1F\x8B\x08", "application/x-gzip"),
];

const HTML_MARKERS: &[&[u8]] = &[b"<!doctype html", b"<html", b"<head", b"<body"];

/// A file attached to a message
///
/// The content is stored base64-encoded; encoding happens once, when the
/// attachment is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Base64 encoded content
    pub content: String,

    /// MIME content type
    pub content_type: String,

    /// Name the recipient sees
    pub filename: String,
}

impl Attachment {
    /// Encodes `content` into a new attachment.
    ///
    /// Without an explicit `content_type`, one is detected from the raw bytes,
    /// falling back to the filename's extension.
    pub fn from_bytes(
        filename: impl Into<String>,
        content: &[u8],
        content_type: Option<&str>,
    ) -> Self {
        let filename = filename.into();
        let content_type = content_type
            .map(str::to_string)
            .unwrap_or_else(|| detect_content_type(content, &filename));

        Self {
            content: STANDARD.encode(content),
            content_type,
            filename,
        }
    }
}

/// Detects the MIME type of `content`
pub fn detect_content_type(content: &[u8], filename: &str) -> String {
    if let Some((_, mime)) = SIGNATURES
        .iter()
        .find(|(signature, _)| content.starts_with(signature))
    {
        return mime.to_string();
    }

    if looks_like_html(content) {
        return HTML_UTF8.to_string();
    }

    if let Some(guess) = mime_guess::from_path(filename).first() {
        return guess.essence_str().to_string();
    }

    match std::str::from_utf8(content) {
        Ok(text) if !text.chars().any(is_binary_control) => TEXT_UTF8.to_string(),
        _ => mime::APPLICATION_OCTET_STREAM.to_string(),
    }
}

fn looks_like_html(content: &[u8]) -> bool {
    let start = content
        .iter()
        .position(|byte| !byte.is_ascii_whitespace())
        .unwrap_or(content.len());
    let content = &content[start..];

    HTML_MARKERS.iter().any(|marker| {
        content.len() >= marker.len() && content[..marker.len()].eq_ignore_ascii_case(marker)
    })
}

fn is_binary_control(c: char) -> bool {
    c.is_control() && !matches!(c, '\t' | '\n' | '\r' | '\x0C')
}
