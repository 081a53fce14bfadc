use crate::domain::diagnostic::{DiagnosticRecord, Severity};
use crate::domain::ports::DiagnosticSink;
use async_trait::async_trait;
use tracing::{debug, error, info, warn};

/// Writes every flushed record to the `tracing` subscriber.
///
/// Severity maps onto the nearest tracing level; `Fatal` logs as `error`.
/// This sink never produces pending records of its own.
#[derive(Debug, Default, Clone)]
pub struct TracingSink {
    trace_formatting_errors: bool,
}

impl TracingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trace_formatting_errors(mut self, enabled: bool) -> Self {
        self.trace_formatting_errors = enabled;
        self
    }
}

#[async_trait]
impl DiagnosticSink for TracingSink {
    async fn log(&self, records: &[DiagnosticRecord]) {
        for record in records {
            let message = record.render(self.trace_formatting_errors);
            let code = record.code.as_str();
            match record.severity {
                Severity::Debug => debug!(code, kind = ?record.kind, "{message}"),
                Severity::Info => info!(code, kind = ?record.kind, "{message}"),
                Severity::Warn => warn!(code, kind = ?record.kind, "{message}"),
                Severity::Error | Severity::Fatal => error!(code, kind = ?record.kind, "{message}"),
            }
        }
    }

    async fn fetch_pending(&self, _request_id: &str) -> Vec<DiagnosticRecord> {
        Vec::new()
    }
}
