//! Subscriber setup for the engine's `tracing` events.
//!
//! Lifecycle transitions are emitted at `debug`, outcomes at `info` and
//! fallbacks at `warn`, all inside a `submit` span carrying the request id and
//! transaction type. Nothing is printed until a host installs a subscriber,
//! either its own or the one built here. Output goes to stderr.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// How events are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines with source locations.
    #[default]
    Pretty,
    /// One JSON object per event, including the enclosing `submit` span.
    Json,
}

impl LogFormat {
    /// `"json"` in any case selects [`LogFormat::Json`]; every other name,
    /// including an empty one, falls back to [`LogFormat::Pretty`].
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Installs a global subscriber filtered by `RUST_LOG`, or by `default_level`
/// when that is unset (for example `"nvp_gateway=debug"`).
///
/// Returns `false` and changes nothing if the host already installed one.
pub fn init_logging(default_level: &str, format: LogFormat) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let (pretty, json) = match format {
        LogFormat::Pretty => (
            Some(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_file(true)
                    .with_line_number(true),
            ),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(true),
            ),
        ),
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json)
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!(?format, "subscriber installed");
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("json", LogFormat::Json)]
    #[case(" JSON ", LogFormat::Json)]
    #[case("pretty", LogFormat::Pretty)]
    #[case("compact", LogFormat::Pretty)]
    #[case("", LogFormat::Pretty)]
    fn test_log_format_from_name(#[case] name: &str, #[case] expected: LogFormat) {
        assert_eq!(LogFormat::from_name(name), expected);
    }

    #[test]
    fn test_second_init_is_refused() {
        let _ = init_logging("warn", LogFormat::Pretty);
        assert!(!init_logging("warn", LogFormat::Json));
    }
}
