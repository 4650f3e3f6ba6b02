#![cfg(not(tarpaulin_include))]

use log::info;
use sprinkler_permit::app;
use sprinkler_permit::config::Config;
use sprinkler_permit::handler::SubmissionService;
use sprinkler_permit::mailer::SmtpMailer;
use sprinkler_permit::store::FileStore;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

/// Main entry point for the permit intake server
///
/// Loads the configuration once, wires the file store and SMTP mailer into
/// the submission service, and serves it until the process is stopped.
///
/// # Arguments
/// * An optional path to a JSON config file as the first argument
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = env::args().nth(1).map(PathBuf::from);
    let config = Arc::new(Config::load(config_path.as_deref())?);
    info!(
        "Starting permit server: store '{}' in {}, notifying {}",
        config.store_name,
        config.store_dir.display(),
        config.recipient_email
    );

    let store = Arc::new(FileStore::from_config(&config));
    let mailer = Arc::new(SmtpMailer::new(&config.smtp)?);
    let service = SubmissionService::new(config, store, mailer)?;

    app::run(service).await
}
