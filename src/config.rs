//! Process-wide gateway settings.
//!
//! Loaded once at start-up (usually from JSON) and shared by every
//! transaction as an `Arc<GatewayConfig>`.

use crate::error::ConfigError;
use crate::interfaces::nvp::MaskingPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// How much processor detail the gateway includes in its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verbosity {
    #[default]
    Low,
    High,
}

impl Verbosity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::High => "HIGH",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub timeout_secs: u64,
    pub proxy: Option<ProxyConfig>,
    pub verbosity: Verbosity,
    pub masking: MaskingPolicy,
    /// Append the underlying reason to "Message formatting error" renderings.
    pub trace_formatting_errors: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "pilot-payflowpro.paypal.com".to_string(),
            port: 443,
            timeout_secs: 45,
            proxy: None,
            verbosity: Verbosity::Low,
            masking: MaskingPolicy::default(),
            trace_formatting_errors: false,
        }
    }
}

impl GatewayConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must be non-zero".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be non-zero".to_string()));
        }
        if let Some(proxy) = &self.proxy
            && (proxy.host.trim().is_empty() || proxy.port == 0)
        {
            return Err(ConfigError::Invalid("proxy needs a host and a port".to_string()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = GatewayConfig::from_json_str(r#"{"host": "payflowpro.paypal.com"}"#).unwrap();
        assert_eq!(config.host, "payflowpro.paypal.com");
        assert_eq!(config.port, 443);
        assert_eq!(config.timeout(), Duration::from_secs(45));
        assert!(config.masking.is_sensitive("ACCT"));
    }

    #[test]
    fn test_masking_fields_come_from_config() {
        let json = r#"{"masking": {"sensitive_fields": ["ACCT", "EMAIL"]}, "verbosity": "HIGH"}"#;
        let config = GatewayConfig::from_json_str(json).unwrap();
        assert!(config.masking.is_sensitive("EMAIL"));
        assert!(!config.masking.is_sensitive("CVV2"));
        assert_eq!(config.masking.mask_char, 'X');
        assert_eq!(config.verbosity, Verbosity::High);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(
            GatewayConfig::from_json_str(r#"{"port": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            GatewayConfig::from_json_str(r#"{"timeout_secs": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            GatewayConfig::from_json_str(r#"{"proxy": {"host": "", "port": 8080}}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            GatewayConfig::from_json_str("{not json"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"port": 8443, "proxy": {{"host": "proxy.local", "port": 3128, "user": "ops"}}}}"#
        )
        .unwrap();

        let config = GatewayConfig::from_path(file.path()).unwrap();
        assert_eq!(config.port, 8443);
        let proxy = config.proxy.unwrap();
        assert_eq!(proxy.host, "proxy.local");
        assert_eq!(proxy.user.as_deref(), Some("ops"));
        assert_eq!(proxy.password, None);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = GatewayConfig::from_path(dir.path().join("absent.json"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
