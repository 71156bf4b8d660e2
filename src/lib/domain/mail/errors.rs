//! Error types for the mail module

use std::{error::Error as StdError, io, iter, path::PathBuf};

use thiserror::Error;
use tracing::debug;

use super::templates::ContentKind;

/// A message that cannot be sent as-is
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The message has no `to` recipients
    #[error("no recipients")]
    NoRecipients,

    /// The message rendered no content and carries no attachments
    #[error("no content or attachments")]
    NoContent,
}

/// Errors that can occur while rendering a message's content
#[derive(Debug, Error)]
pub enum RenderError {
    /// The template name is empty or unknown to the template store
    #[error("template {0:?} not found")]
    TemplateNotFound(String),

    /// A template failed to execute
    #[error("executing {kind} template {name:?}")]
    Execution {
        /// Which of the template's variants failed
        kind: ContentKind,

        /// The template name
        name: String,

        /// The template engine's error
        #[source]
        source: tera::Error,
    },
}

/// Errors reported by a transport
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be built or delivered
    #[error("sending request")]
    Request(#[source] reqwest::Error),

    /// The remote service rejected the message
    #[error("unexpected status code: {status} - body: {body}")]
    Status {
        /// The HTTP status code
        status: u16,

        /// The response body
        body: String,
    },

    /// Unknown error
    #[error(transparent)]
    Unknown(#[from] anyhow::Error),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        debug!("reqwest::Error -> TransportError");

        TransportError::Request(err)
    }
}

/// A failed delivery, as published on a provider's error stream
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The message was not sendable
    #[error("validating email {subject:?}")]
    Validation {
        /// Subject of the failed message
        subject: String,

        /// Why the message was rejected
        #[source]
        source: ValidationError,
    },

    /// The message's content could not be rendered
    #[error("rendering email {subject:?}")]
    Render {
        /// Subject of the failed message
        subject: String,

        /// The rendering failure
        #[source]
        source: RenderError,
    },

    /// The transport failed to send the message
    #[error("sending email {subject:?}")]
    Transport {
        /// Subject of the failed message
        subject: String,

        /// The transport failure
        #[source]
        source: TransportError,
    },
}

impl DeliveryError {
    /// Subject of the message this error belongs to
    pub fn subject(&self) -> &str {
        match self {
            Self::Validation { subject, .. }
            | Self::Render { subject, .. }
            | Self::Transport { subject, .. } => subject,
        }
    }

    /// The error and every underlying cause, joined with `": "`
    pub fn report(&self) -> String {
        iter::successors(Some(self as &dyn StdError), |&err| err.source())
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(": ")
    }
}

/// Errors that can occur while loading templates from disk
#[derive(Debug, Error)]
pub enum TemplateParseError {
    /// The template directory could not be listed
    #[error("reading template directory {}", path.display())]
    ReadDir {
        /// The directory
        path: PathBuf,

        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// A template file could not be read
    #[error("reading template file {}", path.display())]
    Read {
        /// The file
        path: PathBuf,

        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// A set of template files failed to compile
    #[error("parsing template files {paths:?}")]
    Parse {
        /// Every file that took part in the compilation
        paths: Vec<PathBuf>,

        /// The template engine's error
        #[source]
        source: tera::Error,
    },
}

/// Errors that can occur while attaching content to a message
#[derive(Debug, Error)]
pub enum AttachmentError {
    /// The file to attach could not be opened
    #[error("opening file {}", path.display())]
    Open {
        /// Path of the file
        path: PathBuf,

        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The attachment content could not be read
    #[error("reading content of {filename}")]
    Read {
        /// Name the attachment was given
        filename: String,

        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

/// Errors returned to callers submitting messages to a provider
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Every delivery worker has stopped, nothing can accept the message
    #[error("the delivery queue is closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_error_carries_subject() {
        let err = DeliveryError::Validation {
            subject: "Welcome".to_string(),
            source: ValidationError::NoRecipients,
        };

        assert_eq!(err.subject(), "Welcome");
        assert_eq!(err.to_string(), "validating email \"Welcome\"");
    }

    #[test]
    fn test_delivery_error_report_includes_causes() {
        let err = DeliveryError::Transport {
            subject: "Welcome".to_string(),
            source: TransportError::Status {
                status: 503,
                body: "busy".to_string(),
            },
        };

        assert_eq!(
            err.report(),
            "sending email \"Welcome\": unexpected status code: 503 - body: busy"
        );
    }

    #[test]
    fn test_transport_status_error_message() {
        let err = TransportError::Status {
            status: 401,
            body: "unauthorized".to_string(),
        };

        assert_eq!(
            err.to_string(),
            "unexpected status code: 401 - body: unauthorized"
        );
    }

    #[test]
    fn test_template_not_found_quotes_name() {
        let err = RenderError::TemplateNotFound(String::new());

        assert_eq!(err.to_string(), "template \"\" not found");
    }
}
