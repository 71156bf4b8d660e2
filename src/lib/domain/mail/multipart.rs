//! Raw RFC 2046 multipart composition
//!
//! Without attachments the body is `multipart/alternative`, holding the text
//! and HTML parts. With attachments it is `multipart/mixed`: a nested
//! `multipart/alternative` part first, then one base64 part per attachment.
//!
//! Header values go through lettre's RFC 2047 encoder, so line breaks in a
//! subject or filename never start a new header.

use std::fmt;

use chrono::{DateTime, Local, TimeZone};
use lettre::message::{
    header::{self, ContentTransferEncoding, ContentType, HeaderName, HeaderValue, Headers},
    Attachment as AttachmentPart, Body, Mailbox, MultiPart, SinglePart,
};
use mime::Mime;
use rand::{distributions::Alphanumeric, Rng};

use super::{attachment::Attachment, message::Message, transport::Origin};

const CRLF: &str = "\r\n";
const BOUNDARY_LENGTH: usize = 60;
const BASE64_LINE_LENGTH: usize = 76;
const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Composes the raw email for `message`, dated now
pub fn compose(origin: &Origin, message: &Message) -> String {
    compose_at(origin, message, Local::now())
}

/// Composes the raw email for `message` with the given `Date` header
pub fn compose_at<Tz>(origin: &Origin, message: &Message, date: DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let mut headers = Headers::new();
    headers.set(header::From::from(lettre::message::Mailboxes::from(origin.from.clone())));
    headers.set(header::MIME_VERSION_1_0);
    raw_header(&mut headers, "Date", date.format(DATE_FORMAT).to_string());
    headers.set(header::Subject::from(origin.subject(message)));
    raw_header(&mut headers, "To", join_addresses(&message.to));
    raw_header(&mut headers, "CC", join_addresses(&message.cc));
    raw_header(&mut headers, "BCC", join_addresses(&message.bcc));

    let body = if message.has_attachments() {
        mixed(message)
    } else {
        alternative(message, boundary())
    };

    let mut raw = headers.to_string();
    raw.push_str(&String::from_utf8_lossy(&body.formatted()));

    raw
}

/// Joins addresses for a header line.
///
/// Folds from an empty accumulator, so a non-empty list starts with `", "`.
pub fn join_addresses(addresses: &[Mailbox]) -> String {
    addresses
        .iter()
        .fold(String::new(), |joined, address| format!("{joined}, {address}"))
}

fn raw_header(headers: &mut Headers, name: &'static str, value: String) {
    headers.insert_raw(HeaderValue::new(HeaderName::new_from_ascii_str(name), value));
}

fn alternative(message: &Message, boundary: String) -> MultiPart {
    let mut part = MultiPart::alternative().boundary(boundary).build();

    if !message.text_content().is_empty() {
        part = part.singlepart(SinglePart::plain(message.text_content().to_string()));
    }

    if !message.html_content().is_empty() {
        part = part.singlepart(SinglePart::html(message.html_content().to_string()));
    }

    part
}

fn mixed(message: &Message) -> MultiPart {
    let inner = boundary();
    let outer = loop {
        let candidate = boundary();
        if candidate != inner {
            break candidate;
        }
    };

    let mut part = MultiPart::mixed().boundary(outer).build();

    if message.has_content() {
        part = part.multipart(alternative(message, inner));
    }

    for attachment in &message.attachments {
        part = part.singlepart(attachment_part(attachment));
    }

    part
}

fn attachment_part(attachment: &Attachment) -> SinglePart {
    let content_type = attachment
        .content_type
        .parse::<Mime>()
        .unwrap_or(mime::APPLICATION_OCTET_STREAM);

    let mut content = String::with_capacity(attachment.content.len());
    wrap_lines(&mut content, &attachment.content, BASE64_LINE_LENGTH);

    AttachmentPart::new(attachment.filename.clone()).body(
        Body::dangerous_pre_encoded(content.into_bytes(), ContentTransferEncoding::Base64),
        ContentType::from(content_type),
    )
}

fn boundary() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(BOUNDARY_LENGTH)
        .map(char::from)
        .collect()
}

fn wrap_lines(raw: &mut String, content: &str, width: usize) {
    for (i, c) in content.chars().enumerate() {
        if i > 0 && i % width == 0 {
            raw.push_str(CRLF);
        }
        raw.push(c);
    }
}
