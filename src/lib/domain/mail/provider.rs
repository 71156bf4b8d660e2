//! Delivery pipeline
//!
//! A [`Provider`] owns a bounded queue drained by a fixed number of worker
//! tasks. Each worker renders, validates and sends one message at a time, so
//! at most `max_workers` messages are ever inside [`Transport::send`]. Failures
//! are published on the [`ErrorStream`] returned alongside the provider; a
//! message that produces no error was delivered.

use std::{num::NonZeroUsize, sync::Arc};

use clap::Parser;
use lettre::message::Mailbox;
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tracing::{debug, error, warn, Instrument};

use super::{
    errors::{DeliveryError, ProviderError, ValidationError},
    message::Message,
    templates::TemplateStore,
    transport::{Origin, Transport},
};

const DEFAULT_MAX_WORKERS: NonZeroUsize = match NonZeroUsize::new(3) {
    Some(workers) => workers,
    None => unreachable!(),
};

/// Receives every delivery failure of a provider.
///
/// Yields `None` once the provider is closed and all its work has drained.
pub type ErrorStream = mpsc::UnboundedReceiver<DeliveryError>;

/// Provider configuration
#[derive(Clone, Debug, Parser)]
pub struct ProviderConfig {
    /// The sender address
    #[clap(long, env = "MAIL_FROM")]
    pub from: Mailbox,

    /// Prepended to every outgoing subject
    #[clap(long, env = "MAIL_SUBJECT_PREFIX", default_value = "")]
    pub subject_prefix: String,

    /// How many messages may be in flight at once
    #[clap(long, env = "MAIL_MAX_WORKERS", default_value = "3")]
    pub max_workers: NonZeroUsize,
}

impl ProviderConfig {
    /// Creates a configuration with no subject prefix and the default worker count
    pub fn new(from: Mailbox) -> Self {
        Self {
            from,
            subject_prefix: String::new(),
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }

    /// Sets the subject prefix
    pub fn with_subject_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.subject_prefix = prefix.into();
        self
    }

    /// Sets the number of delivery workers
    pub fn with_max_workers(mut self, max_workers: NonZeroUsize) -> Self {
        self.max_workers = max_workers;
        self
    }

    fn origin(&self) -> Origin {
        Origin {
            from: self.from.clone(),
            subject_prefix: self.subject_prefix.clone(),
        }
    }
}

/// Email provider: a transport behind a bounded pool of delivery workers
#[derive(Debug)]
pub struct Provider {
    queue: mpsc::Sender<Message>,
    workers: Vec<JoinHandle<()>>,
}

impl Provider {
    /// Starts `config.max_workers` delivery workers sending through `transport`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new<T: Transport>(
        transport: T,
        templates: Arc<TemplateStore>,
        config: ProviderConfig,
    ) -> (Self, ErrorStream) {
        let max_workers = config.max_workers.get();

        let (queue, pending) = mpsc::channel(max_workers);
        let (errors, error_stream) = mpsc::unbounded_channel();

        let pending = Arc::new(Mutex::new(pending));
        let delivery = Arc::new(Delivery {
            transport,
            templates,
            origin: config.origin(),
        });

        let workers = (0..max_workers)
            .map(|id| {
                let task = worker(delivery.clone(), pending.clone(), errors.clone());
                tokio::spawn(task.instrument(tracing::debug_span!("delivery_worker", id)))
            })
            .collect();

        debug!("started {max_workers} delivery workers");

        (Self { queue, workers }, error_stream)
    }

    /// Queues messages for delivery, in order.
    ///
    /// Waits for room whenever the queue is full.
    ///
    /// # Errors
    /// [`ProviderError::Closed`] if no worker is left to take the messages.
    pub async fn send_message(
        &self,
        messages: impl IntoIterator<Item = Message>,
    ) -> Result<(), ProviderError> {
        for message in messages {
            self.queue
                .send(message)
                .await
                .map_err(|_| ProviderError::Closed)?;
        }

        Ok(())
    }

    /// Stops accepting messages and waits for queued and in-flight ones to finish.
    ///
    /// The error stream ends once this returns.
    pub async fn close(self) {
        let Self { queue, workers } = self;
        drop(queue);

        for worker in workers {
            if let Err(e) = worker.await {
                error!("delivery worker failed: {e}");
            }
        }

        debug!("all delivery workers stopped");
    }
}

struct Delivery<T> {
    transport: T,
    templates: Arc<TemplateStore>,
    origin: Origin,
}

impl<T: Transport> Delivery<T> {
    async fn deliver(&self, mut message: Message) -> Result<(), DeliveryError> {
        if !message.has_recipients() {
            return Err(DeliveryError::Validation {
                subject: message.subject,
                source: ValidationError::NoRecipients,
            });
        }

        if let Err(source) = message.render(&self.templates) {
            return Err(DeliveryError::Render {
                subject: message.subject,
                source,
            });
        }

        if let Err(source) = message.validate() {
            return Err(DeliveryError::Validation {
                subject: message.subject,
                source,
            });
        }

        self.transport
            .send(&self.origin, &message)
            .await
            .map_err(|source| DeliveryError::Transport {
                subject: message.subject.clone(),
                source,
            })
    }
}

async fn worker<T: Transport>(
    delivery: Arc<Delivery<T>>,
    pending: Arc<Mutex<mpsc::Receiver<Message>>>,
    errors: mpsc::UnboundedSender<DeliveryError>,
) {
    loop {
        let next = pending.lock().await.recv().await;
        let Some(message) = next else {
            break;
        };

        debug!("delivering {message}");

        if let Err(e) = delivery.deliver(message).await {
            warn!("{}", e.report());

            if errors.send(e).is_err() {
                debug!("error stream dropped");
            }
        }
    }

    debug!("delivery queue closed");
}
