//! Implementations of the collaborator ports.

pub mod in_memory;
pub mod tracing_sink;
