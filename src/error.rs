use miette::Diagnostic;
use std::time::Duration;
use thiserror::Error;

/// Framing violations raised by the NVP codec.
///
/// Every variant carries the byte offset into the record at which parsing
/// stopped so a malformed gateway reply can be located in audit logs.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("invalid field name {0:?}")]
    #[diagnostic(
        code(nvp::codec::field_name),
        help("field names must be non-empty and must not contain '[', ']', '=' or '&'")
    )]
    InvalidFieldName(String),
    #[error("malformed record at byte {offset}: missing '[' after field name")]
    #[diagnostic(code(nvp::codec::missing_length))]
    MissingLength { offset: usize },
    #[error("malformed record at byte {offset}: length is not a decimal number")]
    #[diagnostic(code(nvp::codec::invalid_length))]
    InvalidLength { offset: usize },
    #[error("malformed record at byte {offset}: expected \"]=\" after length")]
    #[diagnostic(code(nvp::codec::missing_separator))]
    MissingSeparator { offset: usize },
    #[error("malformed record at byte {offset}: declared length {declared} overruns remaining {remaining} bytes")]
    #[diagnostic(code(nvp::codec::length_overrun))]
    LengthOverrun {
        offset: usize,
        declared: usize,
        remaining: usize,
    },
    #[error("malformed record at byte {offset}: expected '&' after value")]
    #[diagnostic(code(nvp::codec::missing_delimiter))]
    MissingDelimiter { offset: usize },
    #[error("malformed record at byte {offset}: value is not valid UTF-8")]
    #[diagnostic(code(nvp::codec::invalid_utf8))]
    InvalidUtf8 { offset: usize },
}

/// Failures reported by a [`Transport`](crate::domain::ports::Transport).
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("gateway did not answer within {0:?}")]
    #[diagnostic(code(nvp::transport::timeout))]
    Timeout(Duration),
    #[error("connection to gateway failed: {0}")]
    #[diagnostic(code(nvp::transport::connection))]
    Connection(String),
    #[error("gateway rejected the request with status {status}")]
    #[diagnostic(code(nvp::transport::rejected))]
    Rejected { status: u16 },
    #[error("transport error: {0}")]
    #[diagnostic(code(nvp::transport::other))]
    Other(String),
}

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    #[diagnostic(code(nvp::config::io))]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    #[diagnostic(code(nvp::config::json))]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    #[diagnostic(code(nvp::config::invalid))]
    Invalid(String),
}

#[derive(Error, Diagnostic, Debug)]
pub enum PaymentError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
    #[error("{component} could not contribute its fields: {reason}")]
    #[diagnostic(code(nvp::contribution))]
    Contribution {
        component: &'static str,
        reason: String,
    },
    #[error("Transaction error: {0}")]
    #[diagnostic(code(nvp::transaction))]
    TransactionError(String),
}

pub type Result<T> = std::result::Result<T, PaymentError>;

/// Renders an error together with its `source()` chain, one cause per line.
///
/// Used as the "stack trace" of diagnostic records built from Rust errors.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str("\ncaused by: ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
