use super::context::ErrorContext;
use super::diagnostic::{DiagnosticRecord, Severity};
use crate::interfaces::nvp::FieldToken;
use miette::Diagnostic;
use std::collections::BTreeMap;
use thiserror::Error;

/// Which path through the lifecycle produced a [`Response`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The gateway answered with a decodable reply.
    Completed,
    /// Fatal diagnostics existed before submission; nothing was sent.
    ShortCircuited,
    /// Assembly, transport or decoding failed after validation passed.
    Fallback,
}

/// The transaction-result fields every gateway reply carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayResult {
    /// `0` is approval, negative values are communication errors, positive
    /// values are declines or business failures.
    pub result: i32,
    pub pnref: Option<String>,
    pub message: Option<String>,
    pub auth_code: Option<String>,
    pub duplicate: bool,
}

impl GatewayResult {
    /// `None` when `RESULT` is absent or not an integer.
    pub fn from_fields(fields: &BTreeMap<String, String>) -> Option<Self> {
        let result = fields.get("RESULT")?.trim().parse().ok()?;
        Some(Self {
            result,
            pnref: fields.get("PNREF").cloned(),
            message: fields.get("RESPMSG").cloned(),
            auth_code: fields.get("AUTHCODE").cloned(),
            duplicate: fields.get("DUPLICATE").is_some_and(|d| d == "1"),
        })
    }

    pub fn is_approved(&self) -> bool {
        self.result == 0
    }
}

/// Outcome of one submission. Always produced, whatever failed.
#[derive(Debug, Clone)]
pub struct Response {
    request_id: String,
    raw_request: String,
    raw_response: String,
    context: ErrorContext,
    tokens: Vec<FieldToken>,
    fields: BTreeMap<String, String>,
    outcome: SubmitOutcome,
}

impl Response {
    pub(crate) fn new(
        request_id: String,
        raw_request: String,
        raw_response: String,
        context: ErrorContext,
        tokens: Vec<FieldToken>,
        outcome: SubmitOutcome,
    ) -> Self {
        let fields = tokens
            .iter()
            .map(|t| (t.name.clone(), t.value.clone()))
            .collect();
        Self {
            request_id,
            raw_request,
            raw_response,
            context,
            tokens,
            fields,
            outcome,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// The request as sent, with sensitive fields masked. Empty when nothing
    /// was assembled.
    pub fn raw_request(&self) -> &str {
        &self.raw_request
    }

    /// The gateway's reply, or the rendering of the first fatal diagnostic
    /// when no reply was received.
    pub fn raw_response(&self) -> &str {
        &self.raw_response
    }

    pub fn context(&self) -> &ErrorContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ErrorContext {
        &mut self.context
    }

    /// Decoded reply fields; the last occurrence of a repeated name wins.
    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Decoded reply tokens in wire order, duplicates included.
    pub fn tokens(&self) -> &[FieldToken] {
        &self.tokens
    }

    pub fn outcome(&self) -> SubmitOutcome {
        self.outcome
    }

    pub fn gateway_result(&self) -> Option<GatewayResult> {
        GatewayResult::from_fields(&self.fields)
    }

    pub fn highest_severity(&self) -> Option<Severity> {
        self.context.current_severity()
    }

    /// Completed with `RESULT=0` and no fatal diagnostics.
    pub fn is_approved(&self) -> bool {
        self.outcome == SubmitOutcome::Completed
            && self.highest_severity() < Some(Severity::Fatal)
            && self.gateway_result().is_some_and(|r| r.is_approved())
    }

    /// Splits on the presence of a fatal diagnostic.
    pub fn into_result(self) -> Result<Self, FatalError> {
        match self.context.first_fatal().cloned() {
            Some(record) => Err(FatalError {
                record,
                response: Box::new(self),
            }),
            None => Ok(self),
        }
    }
}

/// A response that carries at least one fatal diagnostic.
#[derive(Error, Diagnostic, Debug)]
#[error("{record}")]
#[diagnostic(code(nvp::fatal))]
pub struct FatalError {
    pub record: DiagnosticRecord,
    pub response: Box<Response>,
}
