//! Application layer containing the transaction lifecycle.
//!
//! This module defines the `PaymentEngine` which validates, assembles, submits
//! and reconciles one transaction per call. Each call owns its transaction
//! outright, so concurrent submissions share only the engine's configuration,
//! transport and sink.

pub mod engine;
