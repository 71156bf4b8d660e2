//! SendGrid email transport

use async_trait::async_trait;
use clap::Parser;
use lettre::message::Mailbox;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::domain::mail::{errors::TransportError, Attachment, Message, Origin, Transport};

const SENDGRID_HOST: &str = "https://api.sendgrid.com";
const SENDGRID_ENDPOINT: &str = "/v3/mail/send";
const DISPOSITION_ATTACHMENT: &str = "attachment";

/// SendGrid configuration
#[derive(Clone, Debug, Parser)]
pub struct SendgridConfig {
    /// The SendGrid API key
    #[clap(long, env = "SENDGRID_API_KEY")]
    pub api_key: String,

    /// The SendGrid API host
    #[clap(long, env = "SENDGRID_HOST", default_value = SENDGRID_HOST)]
    pub host: String,
}

impl SendgridConfig {
    /// Configuration for the public SendGrid API
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            host: SENDGRID_HOST.to_string(),
        }
    }

    fn url(&self) -> String {
        format!("{}{SENDGRID_ENDPOINT}", self.host.trim_end_matches('/'))
    }
}

/// Sends messages through the SendGrid v3 mail API
#[derive(Debug, Clone)]
pub struct SendgridTransport {
    config: SendgridConfig,
    client: Client,
}

impl SendgridTransport {
    /// Create a new SendGrid transport
    pub fn new(config: SendgridConfig) -> Result<Self, TransportError> {
        let client = Client::builder().build()?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl Transport for SendgridTransport {
    async fn send(&self, origin: &Origin, message: &Message) -> Result<(), TransportError> {
        let url = self.config.url();
        debug!("posting {:?} to {url}", message.subject);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&Payload::new(origin, message))
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct Payload<'a> {
    personalizations: [Personalization<'a>; 1],
    from: Email<'a>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    content: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<AttachmentPayload<'a>>,
}

impl<'a> Payload<'a> {
    fn new(origin: &'a Origin, message: &'a Message) -> Self {
        let content = [
            (mime::TEXT_PLAIN.essence_str(), message.text_content()),
            (mime::TEXT_HTML.essence_str(), message.html_content()),
        ]
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(kind, value)| Content { kind, value })
        .collect();

        Self {
            personalizations: [Personalization {
                to: emails(&message.to),
                cc: emails(&message.cc),
                bcc: emails(&message.bcc),
                subject: origin.subject(message),
            }],
            from: Email::from(&origin.from),
            content,
            attachments: message
                .attachments
                .iter()
                .map(AttachmentPayload::from)
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    to: Vec<Email<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cc: Vec<Email<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    bcc: Vec<Email<'a>>,
    subject: String,
}

#[derive(Debug, Serialize)]
struct Email<'a> {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

impl<'a> From<&'a Mailbox> for Email<'a> {
    fn from(mailbox: &'a Mailbox) -> Self {
        Self {
            email: mailbox.email.to_string(),
            name: mailbox.name.as_deref(),
        }
    }
}

fn emails(mailboxes: &[Mailbox]) -> Vec<Email<'_>> {
    mailboxes.iter().map(Email::from).collect()
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    value: &'a str,
}

#[derive(Debug, Serialize)]
struct AttachmentPayload<'a> {
    content: &'a str,
    #[serde(rename = "type")]
    content_type: &'a str,
    filename: &'a str,
    disposition: &'static str,
}

impl<'a> From<&'a Attachment> for AttachmentPayload<'a> {
    fn from(attachment: &'a Attachment) -> Self {
        Self {
            content: &attachment.content,
            content_type: &attachment.content_type,
            filename: &attachment.filename,
            disposition: DISPOSITION_ATTACHMENT,
        }
    }
}
