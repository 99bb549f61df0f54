mod batch;
pub mod continuation;
pub mod events;
pub mod gate_scope;
pub mod pipeline;
mod single_file;

pub use events::{BatchEvent, ObjectCreatedEvent};
pub use pipeline::Ingestor;
