//! Transport trait

use async_trait::async_trait;
use lettre::message::Mailbox;

#[cfg(test)]
use mockall::mock;

use super::{errors::TransportError, message::Message};

/// Sender details a provider applies to every message it sends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    /// The sender mailbox
    pub from: Mailbox,

    /// Prepended to every outgoing subject
    pub subject_prefix: String,
}

impl Origin {
    /// Creates an origin without a subject prefix
    pub fn new(from: Mailbox) -> Self {
        Self {
            from,
            subject_prefix: String::new(),
        }
    }

    /// The subject `message` goes out with
    pub fn subject(&self, message: &Message) -> String {
        format!("{}{}", self.subject_prefix, message.subject)
    }
}

/// Moves a rendered message to its destination
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Send a rendered message
    ///
    /// # Arguments
    /// * `origin` - The sender details of the provider.
    /// * `message` - A message that has been rendered and validated.
    ///
    /// # Returns
    /// A [`Result`] indicating success or failure.
    async fn send(&self, origin: &Origin, message: &Message) -> Result<(), TransportError>;
}

#[cfg(test)]
mock! {
    pub Transport {}

    #[async_trait]
    impl Transport for Transport {
        async fn send(&self, origin: &Origin, message: &Message) -> Result<(), TransportError>;
    }
}
