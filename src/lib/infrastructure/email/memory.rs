//! In-memory email transport

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::mail::{errors::TransportError, Message, Origin, Transport};

/// Shared record of the messages a [`MemoryTransport`] has sent
///
/// Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    sent: Arc<Mutex<Vec<Message>>>,
}

impl Recorder {
    /// Creates an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message to the record
    pub fn record(&self, message: Message) {
        self.sent.lock().push(message);
    }

    /// A snapshot of the sent messages, in the order they were sent
    pub fn messages(&self) -> Vec<Message> {
        self.sent.lock().clone()
    }

    /// Number of sent messages
    pub fn len(&self) -> usize {
        self.sent.lock().len()
    }

    /// Whether nothing was sent yet
    pub fn is_empty(&self) -> bool {
        self.sent.lock().is_empty()
    }

    /// Forgets every recorded message
    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

/// Stores rendered messages in a [`Recorder`] instead of sending them
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    recorder: Recorder,
}

impl MemoryTransport {
    /// Create a new memory transport recording into `recorder`
    pub fn new(recorder: Recorder) -> Self {
        Self { recorder }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, _origin: &Origin, message: &Message) -> Result<(), TransportError> {
        self.recorder.record(message.clone());

        Ok(())
    }
}
