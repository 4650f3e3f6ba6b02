//! Error types for configuration, the submission store, rendering and mail.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building the configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value for {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

/// Errors from the submission store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store '{0}' has no Submissions sheet")]
    MissingSheet(String),

    #[error("Store is unavailable: {0}")]
    Unavailable(String),
}

/// Errors from building the HTML notification.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Template error: {0}")]
    Template(String),
}

/// Errors from the mail transport.
#[derive(Error, Debug)]
pub enum MailError {
    #[error("Invalid address '{address}': {message}")]
    Address { address: String, message: String },

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("Mail transport failed: {0}")]
    Transport(String),
}

/// Failure of the notify step, before or during sending.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Mail(#[from] MailError),
}

/// Why a submission could not be processed.
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Invalid request body: {0}")]
    MalformedInput(#[from] serde_json::Error),

    #[error("Could not read request body: {0}")]
    UnreadableBody(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Notify(#[from] NotifyError),
}

impl From<handlebars::TemplateError> for RenderError {
    fn from(err: handlebars::TemplateError) -> Self {
        RenderError::Template(err.to_string())
    }
}

impl From<handlebars::RenderError> for RenderError {
    fn from(err: handlebars::RenderError) -> Self {
        RenderError::Template(err.to_string())
    }
}
