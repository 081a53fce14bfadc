//! Client library for a payment gateway that speaks a length-prefixed
//! name/value protocol.
//!
//! Callers build a [`Transaction`] through one of the factories in
//! [`domain::transaction`], hand it to a [`PaymentEngine`] and always get a
//! [`Response`] back. Problems along the way are recorded as
//! [`DiagnosticRecord`]s in the transaction's [`ErrorContext`] rather than
//! raised as errors.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
pub mod logging;

pub use application::engine::PaymentEngine;
pub use config::GatewayConfig;
pub use domain::context::ErrorContext;
pub use domain::diagnostic::{DiagnosticKind, DiagnosticRecord, Severity};
pub use domain::response::{FatalError, Response, SubmitOutcome};
pub use domain::transaction::Transaction;
pub use error::{PaymentError, Result};
