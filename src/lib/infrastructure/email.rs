//! Email transports

mod console;
mod memory;
mod sendgrid;

pub use console::ConsoleTransport;
pub use memory::{MemoryTransport, Recorder};
pub use sendgrid::{SendgridConfig, SendgridTransport};
