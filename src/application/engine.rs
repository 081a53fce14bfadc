use crate::config::GatewayConfig;
use crate::domain::context::ErrorContext;
use crate::domain::diagnostic::{DiagnosticKind, DiagnosticRecord, Severity, codes};
use crate::domain::ports::{DiagnosticSinkBox, TransportBox, TransportRequest};
use crate::domain::response::{GatewayResult, Response, SubmitOutcome};
use crate::domain::transaction::Transaction;
use crate::error::{PaymentError, error_chain};
use crate::interfaces::nvp::{FieldToken, decode_record};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Stages a transaction passes through inside [`PaymentEngine::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Validating,
    ShortCircuited,
    Assembling,
    Submitting,
    Decoding,
    Reconciled,
}

/// What the exchange with the gateway produced before reconciliation.
struct Exchange {
    raw_request: String,
    raw_response: Option<String>,
    tokens: Vec<FieldToken>,
}

/// Submits transactions to the gateway.
///
/// `PaymentEngine` owns the transport and the optional shared diagnostic sink,
/// and reads process-wide settings from a shared [`GatewayConfig`]. It holds
/// no per-transaction state, so one engine can serve concurrent submissions.
pub struct PaymentEngine {
    config: Arc<GatewayConfig>,
    transport: TransportBox,
    sink: Option<DiagnosticSinkBox>,
}

impl PaymentEngine {
    /// Creates a new `PaymentEngine` instance.
    ///
    /// # Arguments
    ///
    /// * `config` - Process-wide gateway settings.
    /// * `transport` - Delivers encoded requests to the gateway.
    pub fn new(config: Arc<GatewayConfig>, transport: TransportBox) -> Self {
        Self {
            config,
            transport,
            sink: None,
        }
    }

    /// Attaches the shared logging collaborator.
    pub fn with_sink(mut self, sink: DiagnosticSinkBox) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Submits a transaction and always returns a fully formed [`Response`].
    ///
    /// A transaction whose context already holds a fatal diagnostic is never
    /// sent. Failures during assembly, transport or decoding become a single
    /// fatal record in the response's context.
    #[instrument(skip_all, fields(request_id = %tx.request_id(), trx_type = tx.kind().trx_type()))]
    pub async fn submit(&self, mut tx: Transaction) -> Response {
        debug!(state = ?LifecycleState::Created, diagnostics = tx.context().len());
        if self.config.trace_formatting_errors {
            tx.context_mut().set_trace_formatting_errors(true);
        }

        debug!(state = ?LifecycleState::Validating, "populating context");
        let request_id = tx.request_id().to_string();
        self.merge_pending(&request_id, tx.context_mut()).await;

        if tx.context_mut().is_fatal() {
            debug!(state = ?LifecycleState::ShortCircuited, "fatal diagnostics present");
            warn!("transaction not sent: fatal diagnostics recorded before submission");
            let (request_id, context) = tx.into_parts();
            let exchange = Exchange {
                raw_request: String::new(),
                raw_response: None,
                tokens: Vec::new(),
            };
            return self
                .reconcile(request_id, context, exchange, SubmitOutcome::ShortCircuited)
                .await;
        }

        let mut exchange = Exchange {
            raw_request: String::new(),
            raw_response: None,
            tokens: Vec::new(),
        };
        let outcome = match self.exchange(&mut tx, &mut exchange).await {
            Ok(()) => SubmitOutcome::Completed,
            Err(record) => {
                warn!(code = %record.code, "transaction failed, building fallback response");
                tx.context_mut().add(record);
                SubmitOutcome::Fallback
            }
        };
        let (request_id, context) = tx.into_parts();
        self.reconcile(request_id, context, exchange, outcome).await
    }

    /// Assembling, submitting and decoding. Any failure comes back as the one
    /// fatal record that describes it.
    async fn exchange(
        &self,
        tx: &mut Transaction,
        exchange: &mut Exchange,
    ) -> Result<(), DiagnosticRecord> {
        debug!(state = ?LifecycleState::Assembling);
        let request = tx
            .assemble(self.config.verbosity)
            .map_err(|err| failure(&err))?;
        let masked = self
            .config
            .masking
            .mask_record(&request)
            .map_err(|err| {
                failure(&PaymentError::TransactionError(format!(
                    "request could not be masked: {err}"
                )))
            })?;
        debug!(request = %masked, "request assembled");
        exchange.raw_request = masked;

        debug!(state = ?LifecycleState::Submitting);
        let raw = self
            .transport
            .submit(TransportRequest {
                body: &request,
                request_id: tx.request_id(),
                timeout: self.config.timeout(),
                proxy: self.config.proxy.as_ref(),
            })
            .await
            .map_err(|err| failure(&PaymentError::from(err)))?;
        let raw: &str = exchange.raw_response.insert(raw);

        debug!(state = ?LifecycleState::Decoding);
        let tokens = decode_record(raw).map_err(|err| failure(&PaymentError::from(err)))?;
        let fields: BTreeMap<String, String> = tokens
            .iter()
            .map(|t| (t.name.clone(), t.value.clone()))
            .collect();
        let gateway = gateway_diagnostics(&fields, tx.request_id());
        tx.context_mut().add_all(gateway);
        exchange.tokens = tokens;
        Ok(())
    }

    async fn reconcile(
        &self,
        request_id: String,
        mut context: ErrorContext,
        exchange: Exchange,
        outcome: SubmitOutcome,
    ) -> Response {
        self.merge_pending(&request_id, &mut context).await;
        let highest = context.highest_severity();

        let raw_response = match exchange.raw_response {
            Some(raw) => raw,
            None => context
                .first_fatal()
                .map(|record| context.render_record(record))
                .unwrap_or_default(),
        };

        if let Some(sink) = &self.sink {
            // records fetched from the sink are already in its log
            let own: Vec<DiagnosticRecord> = context
                .iter()
                .filter(|r| r.kind != DiagnosticKind::External)
                .cloned()
                .collect();
            if !own.is_empty() {
                sink.log(&own).await;
            }
        }

        debug!(state = ?LifecycleState::Reconciled);
        info!(?outcome, ?highest, diagnostics = context.len(), "transaction reconciled");
        Response::new(
            request_id,
            exchange.raw_request,
            raw_response,
            context,
            exchange.tokens,
            outcome,
        )
    }

    async fn merge_pending(&self, request_id: &str, context: &mut ErrorContext) {
        if let Some(sink) = &self.sink {
            let pending = sink.fetch_pending(request_id).await;
            if !pending.is_empty() {
                debug!(count = pending.len(), "staging records from shared sink");
                context.stage_external(pending);
            }
        }
        context.populate();
    }
}

/// Wraps an error raised after validation into the single fatal record that
/// stands for it.
fn failure(err: &PaymentError) -> DiagnosticRecord {
    let (kind, code, param) = match err {
        PaymentError::Transport(e) => (DiagnosticKind::Transport, codes::TRANSPORT_FAILURE, e.to_string()),
        PaymentError::Codec(e) => (DiagnosticKind::Encoding, codes::MALFORMED_RESPONSE, e.to_string()),
        PaymentError::Contribution { component, reason } => {
            return DiagnosticRecord::new(Severity::Fatal, DiagnosticKind::Transaction, codes::CONTRIBUTION_FAILED)
                .with_params([component.to_string(), reason.clone()])
                .with_stack_trace(error_chain(err));
        }
        other => (DiagnosticKind::Transaction, codes::TRANSACTION_FAILED, other.to_string()),
    };
    DiagnosticRecord::new(Severity::Fatal, kind, code)
        .with_param(param)
        .with_stack_trace(error_chain(err))
}

/// Translates the result fields of a decoded reply into diagnostics.
fn gateway_diagnostics(fields: &BTreeMap<String, String>, request_id: &str) -> Vec<DiagnosticRecord> {
    let Some(raw_result) = fields.get("RESULT") else {
        return vec![DiagnosticRecord::new(Severity::Fatal, DiagnosticKind::Gateway, codes::MISSING_RESULT)];
    };
    let Some(result) = GatewayResult::from_fields(fields) else {
        return vec![
            DiagnosticRecord::new(Severity::Fatal, DiagnosticKind::Encoding, codes::MALFORMED_RESPONSE)
                .with_param(format!("RESULT={raw_result}")),
        ];
    };

    let mut records = Vec::new();
    let message = result.message.clone().unwrap_or_default();
    if result.result < 0 {
        records.push(
            DiagnosticRecord::new(Severity::Fatal, DiagnosticKind::Gateway, codes::GATEWAY_COMMUNICATION)
                .with_params([result.result.to_string(), message]),
        );
    } else if result.result > 0 {
        records.push(
            DiagnosticRecord::new(Severity::Error, DiagnosticKind::Gateway, codes::GATEWAY_DECLINED)
                .with_params([result.result.to_string(), message]),
        );
    }
    if result.duplicate {
        records.push(
            DiagnosticRecord::new(Severity::Info, DiagnosticKind::Gateway, codes::DUPLICATE_REQUEST)
                .with_param(request_id),
        );
    }
    records
}
