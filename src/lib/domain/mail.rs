//! Email composition and delivery

mod attachment;
mod message;
mod provider;
mod templates;
mod transport;

pub mod errors;
pub mod multipart;

pub use attachment::{detect_content_type, Attachment};
pub use lettre::message::Mailbox;
pub use message::Message;
pub use provider::{ErrorStream, Provider, ProviderConfig};
pub use templates::{CompiledTemplate, ContentKind, TemplateStore};
pub use transport::{Origin, Transport};
