use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Line separator used when a record or context is rendered as text.
pub const NEWLINE: &str = if cfg!(windows) { "\r\n" } else { "\n" };

/// Placeholder rendered instead of a message whose template cannot be filled.
pub const FORMAT_ERROR_MESSAGE: &str = "Message formatting error";

/// Rank of a diagnostic. Only [`Severity::Fatal`] stops a transaction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

impl Severity {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which subsystem produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    /// Raised while a transaction and its components are built.
    Validation,
    /// Codec framing violation.
    Encoding,
    /// Network, timeout or connection failure.
    Transport,
    /// Well-formed reply reporting a business failure.
    Gateway,
    /// Anything unexpected during assembly, submission or decoding.
    Transaction,
    /// Sourced from the shared logging sink.
    External,
}

/// Diagnostic codes understood by the built-in message catalog.
pub mod codes {
    pub const MISSING_REQUEST_ID: &str = "MISSING_REQUEST_ID";
    pub const MISSING_CREDENTIALS: &str = "MISSING_CREDENTIALS";
    pub const MISSING_TENDER: &str = "MISSING_TENDER";
    pub const MISSING_INVOICE: &str = "MISSING_INVOICE";
    pub const MISSING_FIELD: &str = "MISSING_FIELD";
    pub const INVALID_AMOUNT: &str = "INVALID_AMOUNT";
    pub const INVALID_EXPIRY: &str = "INVALID_EXPIRY";
    pub const AMOUNT_ROUNDED: &str = "AMOUNT_ROUNDED";
    pub const TOO_MANY_USER_FIELDS: &str = "TOO_MANY_USER_FIELDS";
    pub const CONTRIBUTION_FAILED: &str = "CONTRIBUTION_FAILED";
    pub const TRANSACTION_FAILED: &str = "TRANSACTION_FAILED";
    pub const TRANSPORT_FAILURE: &str = "TRANSPORT_FAILURE";
    pub const MALFORMED_RESPONSE: &str = "MALFORMED_RESPONSE";
    pub const MISSING_RESULT: &str = "MISSING_RESULT";
    pub const GATEWAY_COMMUNICATION: &str = "GATEWAY_COMMUNICATION";
    pub const GATEWAY_DECLINED: &str = "GATEWAY_DECLINED";
    pub const DUPLICATE_REQUEST: &str = "DUPLICATE_REQUEST";
}

/// Template used when a record carries no template of its own.
pub fn default_template(code: &str) -> Option<&'static str> {
    let template = match code {
        codes::MISSING_REQUEST_ID => "Request id is required.",
        codes::MISSING_CREDENTIALS => "User credentials are required.",
        codes::MISSING_TENDER => "Tender is required for {0} transactions.",
        codes::MISSING_INVOICE => "Invoice is required for {0} transactions.",
        codes::MISSING_FIELD => "Required field {0} is missing.",
        codes::INVALID_AMOUNT => "Amount {0} is invalid.",
        codes::INVALID_EXPIRY => "Expiry date {0} is not in MMYY format.",
        codes::AMOUNT_ROUNDED => "Amount {0} was rounded to {1}.",
        codes::TOO_MANY_USER_FIELDS => "Only {1} user defined fields are sent, {0} supplied.",
        codes::CONTRIBUTION_FAILED => "{0} could not contribute its fields: {1}",
        codes::TRANSACTION_FAILED => "Transaction failed: {0}",
        codes::TRANSPORT_FAILURE => "Failed to reach the gateway: {0}",
        codes::MALFORMED_RESPONSE => "Gateway response could not be decoded: {0}",
        codes::MISSING_RESULT => "Gateway response has no RESULT field.",
        codes::GATEWAY_COMMUNICATION => "Gateway communication error {0}: {1}",
        codes::GATEWAY_DECLINED => "Gateway declined the transaction with result {0}: {1}",
        codes::DUPLICATE_REQUEST => "Request {0} is a duplicate; original result returned.",
        _ => return None,
    };
    Some(template)
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("placeholder {{{index}}} has no parameter ({available} supplied)")]
    MissingParameter { index: usize, available: usize },
    #[error("unterminated placeholder at position {0}")]
    Unterminated(usize),
    #[error("invalid placeholder at position {0}")]
    InvalidPlaceholder(usize),
    #[error("unmatched '}}' at position {0}")]
    UnmatchedBrace(usize),
}

/// Fills `{0}`, `{1}`, ... in `template` with `params`. `{{` and `}}` are
/// literal braces.
pub fn format_template(template: &str, params: &[String]) -> Result<String, FormatError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();
    while let Some((pos, c)) = chars.next() {
        match c {
            '{' if chars.peek().map(|&(_, next)| next) == Some('{') => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let mut digits = String::new();
                loop {
                    match chars.next() {
                        Some((_, '}')) => break,
                        Some((_, d)) if d.is_ascii_digit() => digits.push(d),
                        Some(_) => return Err(FormatError::InvalidPlaceholder(pos)),
                        None => return Err(FormatError::Unterminated(pos)),
                    }
                }
                let index: usize = digits
                    .parse()
                    .map_err(|_| FormatError::InvalidPlaceholder(pos))?;
                let param = params.get(index).ok_or(FormatError::MissingParameter {
                    index,
                    available: params.len(),
                })?;
                out.push_str(param);
            }
            '}' if chars.peek().map(|&(_, next)| next) == Some('}') => {
                chars.next();
                out.push('}');
            }
            '}' => return Err(FormatError::UnmatchedBrace(pos)),
            other => out.push(other),
        }
    }
    Ok(out)
}

/// One diagnostic: a severity, a code and an optional positional message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticRecord {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_template: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
}

impl DiagnosticRecord {
    pub fn new(severity: Severity, kind: DiagnosticKind, code: impl Into<String>) -> Self {
        Self {
            severity,
            kind,
            code: code.into(),
            message_template: None,
            parameters: Vec::new(),
            stack_trace: None,
        }
    }

    /// Fatal validation failure, the usual outcome of a missing component.
    pub fn validation(code: impl Into<String>) -> Self {
        Self::new(Severity::Fatal, DiagnosticKind::Validation, code)
    }

    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.parameters.push(param.into());
        self
    }

    pub fn with_params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameters.extend(params.into_iter().map(Into::into));
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.message_template = Some(template.into());
        self
    }

    pub fn with_stack_trace(mut self, trace: impl Into<String>) -> Self {
        self.stack_trace = Some(trace.into());
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }

    /// Two records describe the same event when code and first parameter
    /// agree; used to drop sink records already recorded locally.
    pub fn same_event(&self, other: &Self) -> bool {
        self.code == other.code && self.parameters.first() == other.parameters.first()
    }

    /// Message text with parameters substituted.
    ///
    /// Records without a template and with a code unknown to the catalog
    /// render as the code followed by their parameters.
    pub fn message(&self) -> Result<String, FormatError> {
        let template = self
            .message_template
            .as_deref()
            .or_else(|| default_template(&self.code));
        match template {
            Some(template) => format_template(template, &self.parameters),
            None if self.parameters.is_empty() => Ok(self.code.clone()),
            None => Ok(format!("{}: {}", self.code, self.parameters.join(", "))),
        }
    }

    /// `[LABEL]message`, then the stack trace on its own line if present.
    ///
    /// A template that cannot be filled degrades to
    /// [`FORMAT_ERROR_MESSAGE`]; with `trace_errors` the reason is appended.
    pub fn render(&self, trace_errors: bool) -> String {
        let message = match self.message() {
            Ok(message) => message,
            Err(err) if trace_errors => format!("{FORMAT_ERROR_MESSAGE}: {err}"),
            Err(_) => FORMAT_ERROR_MESSAGE.to_string(),
        };
        let mut out = format!("[{}]{message}", self.severity.label());
        if let Some(trace) = &self.stack_trace {
            out.push_str(NEWLINE);
            out.push_str(trace);
        }
        out
    }
}

impl fmt::Display for DiagnosticRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(false))
    }
}
