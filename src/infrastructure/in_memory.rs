use crate::domain::diagnostic::{DiagnosticKind, DiagnosticRecord, Severity, codes};
use crate::domain::ports::{DiagnosticSink, Transport, TransportRequest};
use crate::error::TransportError;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// A thread-safe in-memory diagnostic sink.
///
/// Uses `Arc<RwLock<..>>` so clones share the same log and pending queues.
/// Pending records are keyed by request id, so a transaction only ever picks
/// up what was reported on its own behalf.
#[derive(Default, Clone)]
pub struct InMemorySink {
    logged: Arc<RwLock<Vec<DiagnosticRecord>>>,
    pending: Arc<RwLock<HashMap<String, Vec<DiagnosticRecord>>>>,
}

impl InMemorySink {
    /// Creates a new, empty in-memory sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a record for the transaction identified by `request_id`.
    pub async fn push_pending(&self, request_id: &str, record: DiagnosticRecord) {
        self.pending
            .write()
            .await
            .entry(request_id.to_string())
            .or_default()
            .push(record);
    }

    /// Number of records still waiting to be fetched, across all requests.
    pub async fn pending_count(&self) -> usize {
        self.pending.read().await.values().map(Vec::len).sum()
    }

    /// Everything logged so far, in arrival order.
    pub async fn logged(&self) -> Vec<DiagnosticRecord> {
        self.logged.read().await.clone()
    }
}

#[async_trait]
impl DiagnosticSink for InMemorySink {
    async fn log(&self, records: &[DiagnosticRecord]) {
        self.logged.write().await.extend_from_slice(records);
    }

    async fn fetch_pending(&self, request_id: &str) -> Vec<DiagnosticRecord> {
        self.pending
            .write()
            .await
            .remove(request_id)
            .unwrap_or_default()
    }
}

/// One request as seen by [`ScriptedTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub body: String,
    pub request_id: String,
}

/// A transport that answers from a queue of canned replies.
///
/// Every request is recorded. When a sink is attached, transport errors are
/// also reported to it, the way a real transport reports to a shared log.
#[derive(Default, Clone)]
pub struct ScriptedTransport {
    replies: Arc<RwLock<VecDeque<Result<String, TransportError>>>>,
    requests: Arc<RwLock<Vec<RecordedRequest>>>,
    calls: Arc<AtomicUsize>,
    sink: Option<InMemorySink>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: InMemorySink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Queues the reply for the next request.
    pub async fn reply(&self, reply: Result<String, TransportError>) {
        self.replies.write().await.push_back(reply);
    }

    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.read().await.clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn submit(&self, request: TransportRequest<'_>) -> Result<String, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.write().await.push(RecordedRequest {
            body: request.body.to_string(),
            request_id: request.request_id.to_string(),
        });

        let reply = self
            .replies
            .write()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Other("no scripted reply".to_string())));

        if let (Err(err), Some(sink)) = (&reply, &self.sink) {
            sink.push_pending(
                request.request_id,
                DiagnosticRecord::new(Severity::Error, DiagnosticKind::External, codes::TRANSPORT_FAILURE)
                    .with_param(err.to_string()),
            )
            .await;
        }
        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn request<'a>(body: &'a str, request_id: &'a str) -> TransportRequest<'a> {
        TransportRequest {
            body,
            request_id,
            timeout: Duration::from_secs(1),
            proxy: None,
        }
    }

    #[tokio::test]
    async fn test_in_memory_sink() {
        let sink = InMemorySink::new();
        let record = DiagnosticRecord::validation(codes::MISSING_CREDENTIALS);

        sink.log(std::slice::from_ref(&record)).await;
        assert_eq!(sink.logged().await, vec![record.clone()]);

        sink.push_pending("r1", record.clone()).await;
        assert!(sink.fetch_pending("r2").await.is_empty());
        assert_eq!(sink.pending_count().await, 1);
        assert_eq!(sink.fetch_pending("r1").await, vec![record]);
        assert!(sink.fetch_pending("r1").await.is_empty());
        assert_eq!(sink.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_scripted_transport_replays_in_order() {
        let transport = ScriptedTransport::new();
        transport.reply(Ok("RESULT[1]=0".to_string())).await;
        transport.reply(Err(TransportError::Timeout(Duration::from_secs(1)))).await;

        assert_eq!(transport.submit(request("A[1]=1", "r1")).await, Ok("RESULT[1]=0".to_string()));
        assert!(matches!(
            transport.submit(request("A[1]=2", "r2")).await,
            Err(TransportError::Timeout(_))
        ));
        assert!(matches!(
            transport.submit(request("A[1]=3", "r3")).await,
            Err(TransportError::Other(_))
        ));
        assert_eq!(transport.call_count(), 3);
        assert_eq!(transport.requests().await[1].request_id, "r2");
    }

    #[tokio::test]
    async fn test_scripted_transport_reports_errors_to_sink() {
        let sink = InMemorySink::new();
        let transport = ScriptedTransport::new().with_sink(sink.clone());
        transport
            .reply(Err(TransportError::Connection("reset".to_string())))
            .await;

        let _ = transport.submit(request("A[1]=1", "r1")).await;

        assert!(sink.fetch_pending("other").await.is_empty());
        let pending = sink.fetch_pending("r1").await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].parameters[0], "connection to gateway failed: reset");
    }
}
