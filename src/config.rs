//! Process-wide settings, built once at startup and shared by reference.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

lazy_static! {
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[^\s@<>(),;:]+@[^\s@<>(),;:]+\.[^\s@<>(),;:]+$").unwrap();
}

const DEFAULT_SENDER_EMAIL: &str = "noreply@team4lifespaces.com";
const DEFAULT_SENDER_NAME: &str = "Sprinkler Permit System";
const DEFAULT_RECIPIENT_EMAIL: &str = "facilities@team4lifespaces.com";
const DEFAULT_STORE_NAME: &str = "Sprinkler_Permit_Log";
const DEFAULT_SUBJECT_PREFIX: &str = "🚒 Sprinkler Permit - ";
const DEFAULT_STORE_DIR: &str = "database";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
/// Submissions carry a base64 PDF and a signature image, so the cap is generous.
const DEFAULT_MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// Returns true when `value` has the shape of a single mailbox address.
pub fn looks_like_email(value: &str) -> bool {
    EMAIL_REGEX.is_match(value.trim())
}

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TlsMode {
    /// Implicit TLS from the first byte (port 465).
    #[default]
    Wrapper,
    /// Plain connection upgraded with STARTTLS (port 587).
    Starttls,
    /// No encryption, for local relays and test servers.
    None,
}

impl std::str::FromStr for TlsMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wrapper" | "tls" | "ssl" => Ok(TlsMode::Wrapper),
            "starttls" => Ok(TlsMode::Starttls),
            "none" | "plain" => Ok(TlsMode::None),
            other => Err(ConfigError::Invalid {
                field: "smtp.tls",
                message: format!("unknown TLS mode '{}'", other),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: String,
    /// Unset means the default port of the TLS mode.
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: TlsMode,
}

impl SmtpConfig {
    /// The configured port, or 465 / 587 / 25 for wrapper / STARTTLS / plain.
    pub fn effective_port(&self) -> u16 {
        match (self.port, self.tls) {
            (Some(port), _) => port,
            (None, TlsMode::Wrapper) => 465,
            (None, TlsMode::Starttls) => 587,
            (None, TlsMode::None) => 25,
        }
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        SmtpConfig {
            host: "localhost".to_string(),
            port: None,
            username: None,
            password: None,
            tls: TlsMode::Wrapper,
        }
    }
}

/// Application configuration.
///
/// Sources, lowest precedence first: built-in defaults, an optional JSON
/// file, then `PERMIT_*` environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sender_email: String,
    pub sender_name: String,
    pub recipient_email: String,
    pub store_name: String,
    pub subject_prefix: String,
    pub store_dir: PathBuf,
    pub bind_addr: String,
    /// Largest accepted submission body in bytes.
    pub max_body_bytes: usize,
    pub smtp: SmtpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sender_email: DEFAULT_SENDER_EMAIL.to_string(),
            sender_name: DEFAULT_SENDER_NAME.to_string(),
            recipient_email: DEFAULT_RECIPIENT_EMAIL.to_string(),
            store_name: DEFAULT_STORE_NAME.to_string(),
            subject_prefix: DEFAULT_SUBJECT_PREFIX.to_string(),
            store_dir: PathBuf::from(DEFAULT_STORE_DIR),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            smtp: SmtpConfig::default(),
        }
    }
}

impl Config {
    /// Loads the configuration for the server process.
    ///
    /// `path` wins over `PERMIT_CONFIG`; with neither set the defaults are
    /// used before the environment overrides are applied.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let from_env = std::env::var_os("PERMIT_CONFIG").map(PathBuf::from);
        let mut config = match path.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::from_file(&path)?,
            None => Config::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Applies `PERMIT_*` overrides looked up through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("PERMIT_SENDER_EMAIL") {
            self.sender_email = v;
        }
        if let Some(v) = lookup("PERMIT_SENDER_NAME") {
            self.sender_name = v;
        }
        if let Some(v) = lookup("PERMIT_RECIPIENT_EMAIL") {
            self.recipient_email = v;
        }
        if let Some(v) = lookup("PERMIT_STORE_NAME") {
            self.store_name = v;
        }
        if let Some(v) = lookup("PERMIT_SUBJECT_PREFIX") {
            self.subject_prefix = v;
        }
        if let Some(v) = lookup("PERMIT_STORE_DIR") {
            self.store_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("PERMIT_BIND_ADDR") {
            self.bind_addr = v;
        }
        if let Some(v) = lookup("PERMIT_SMTP_HOST") {
            self.smtp.host = v;
        }
        if let Some(v) = lookup("PERMIT_SMTP_PORT") {
            self.smtp.port = Some(v.trim().parse().map_err(|_| ConfigError::Invalid {
                field: "smtp.port",
                message: format!("'{}' is not a port number", v),
            })?);
        }
        if let Some(v) = lookup("PERMIT_MAX_BODY_BYTES") {
            self.max_body_bytes = v.trim().parse().map_err(|_| ConfigError::Invalid {
                field: "max_body_bytes",
                message: format!("'{}' is not a byte count", v),
            })?;
        }
        if let Some(v) = lookup("PERMIT_SMTP_USERNAME") {
            self.smtp.username = Some(v);
        }
        if let Some(v) = lookup("PERMIT_SMTP_PASSWORD") {
            self.smtp.password = Some(v);
        }
        if let Some(v) = lookup("PERMIT_SMTP_TLS") {
            self.smtp.tls = v.parse()?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !looks_like_email(&self.sender_email) {
            return Err(ConfigError::Invalid {
                field: "sender_email",
                message: format!("'{}' is not an email address", self.sender_email),
            });
        }
        if !looks_like_email(&self.recipient_email) {
            return Err(ConfigError::Invalid {
                field: "recipient_email",
                message: format!("'{}' is not an email address", self.recipient_email),
            });
        }
        let name = self.store_name.trim();
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(ConfigError::Invalid {
                field: "store_name",
                message: format!("'{}' cannot be used as a store name", self.store_name),
            });
        }
        if self.smtp.host.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "smtp.host",
                message: "SMTP host is empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.subject_prefix, "🚒 Sprinkler Permit - ");
        assert_eq!(config.store_name, "Sprinkler_Permit_Log");
    }

    #[test]
    fn overrides_take_precedence() {
        let env: HashMap<&str, &str> = [
            ("PERMIT_RECIPIENT_EMAIL", "ops@example.com"),
            ("PERMIT_SMTP_PORT", "587"),
            ("PERMIT_SMTP_TLS", "starttls"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.recipient_email, "ops@example.com");
        assert_eq!(config.smtp.port, Some(587));
        assert_eq!(config.smtp.tls, TlsMode::Starttls);
    }

    #[test]
    fn starttls_without_port_uses_submission_port() {
        let mut config = Config::default();
        config
            .apply_overrides(|k| (k == "PERMIT_SMTP_TLS").then(|| "starttls".to_string()))
            .unwrap();
        assert_eq!(config.smtp.port, None);
        assert_eq!(config.smtp.effective_port(), 587);
        assert_eq!(SmtpConfig::default().effective_port(), 465);

        config.smtp.port = Some(2525);
        assert_eq!(config.smtp.effective_port(), 2525);
    }

    #[test]
    fn body_limit_override() {
        let mut config = Config::default();
        assert_eq!(config.max_body_bytes, 25 * 1024 * 1024);
        config
            .apply_overrides(|k| (k == "PERMIT_MAX_BODY_BYTES").then(|| "1048576".to_string()))
            .unwrap();
        assert_eq!(config.max_body_bytes, 1_048_576);
    }

    #[test]
    fn bad_port_is_reported() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(|k| (k == "PERMIT_SMTP_PORT").then(|| "smtp".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("smtp.port"));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            Config::from_json_str(r#"{"store_name": "Permits", "smtp": {"tls": "none"}}"#).unwrap();
        assert_eq!(config.store_name, "Permits");
        assert_eq!(config.smtp.tls, TlsMode::None);
        assert_eq!(config.smtp.port, None);
        assert_eq!(config.smtp.effective_port(), 25);
        assert_eq!(config.recipient_email, DEFAULT_RECIPIENT_EMAIL);
    }

    #[test]
    fn store_name_must_be_a_plain_file_name() {
        let config = Config {
            store_name: "../escape".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn email_shape() {
        assert!(looks_like_email("owner@example.com"));
        assert!(!looks_like_email("owner at example"));
        assert!(!looks_like_email("a@b"));
        assert!(!looks_like_email(""));
    }
}
