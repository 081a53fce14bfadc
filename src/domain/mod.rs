//! Domain model: diagnostics, the error context, request components,
//! transactions, responses and the collaborator ports.

pub mod components;
pub mod context;
pub mod diagnostic;
pub mod ports;
pub mod response;
pub mod transaction;
