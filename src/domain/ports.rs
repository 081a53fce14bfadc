use super::diagnostic::DiagnosticRecord;
use crate::config::ProxyConfig;
use crate::error::TransportError;
use async_trait::async_trait;
use std::time::Duration;

/// Everything a transport needs to deliver one encoded request.
#[derive(Debug, Clone, Copy)]
pub struct TransportRequest<'a> {
    /// Encoded request record, unmasked.
    pub body: &'a str,
    /// Idempotency key; the gateway replays the original result for repeats.
    pub request_id: &'a str,
    pub timeout: Duration,
    pub proxy: Option<&'a ProxyConfig>,
}

/// Delivers an encoded request to the gateway and returns its raw reply.
///
/// Implementations own connection handling and must enforce `timeout`
/// themselves.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn submit(&self, request: TransportRequest<'_>) -> Result<String, TransportError>;
}

/// Shared logging collaborator.
///
/// Must accept concurrent `log` calls from independent transactions.
#[async_trait]
pub trait DiagnosticSink: Send + Sync {
    async fn log(&self, records: &[DiagnosticRecord]);

    /// Records raised elsewhere (for example by the transport) on behalf of
    /// the transaction identified by `request_id`. Records belonging to other
    /// transactions must not be returned.
    async fn fetch_pending(&self, request_id: &str) -> Vec<DiagnosticRecord>;
}

pub type TransportBox = Box<dyn Transport>;
pub type DiagnosticSinkBox = Box<dyn DiagnosticSink>;
