//! Console email transport

use async_trait::async_trait;
use tracing::info;

use crate::domain::mail::{errors::TransportError, multipart, Message, Origin, Transport};

/// Writes each message to the log as a raw RFC 2046 document
#[derive(Debug, Default, Clone)]
pub struct ConsoleTransport {
    quiet: bool,
}

impl ConsoleTransport {
    /// Create a new console transport; a quiet one composes but logs nothing
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

#[async_trait]
impl Transport for ConsoleTransport {
    async fn send(&self, origin: &Origin, message: &Message) -> Result<(), TransportError> {
        let raw = multipart::compose(origin, message);

        if !self.quiet {
            info!("\n{raw}");
        }

        Ok(())
    }
}
