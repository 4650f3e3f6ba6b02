//! The intake workflow: parse, log, notify, respond.

use chrono::{DateTime, SecondsFormat, Utc};
use log::{error, info, warn};
use serde::Serialize;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{NotifyError, RenderError, StoreError, SubmitError};
use crate::mailer::{Dispatcher, MailTransport};
use crate::notification::NotificationRenderer;
use crate::store::{RowPosition, StoreHandle, SubmissionStore};
use crate::submission::{
    EMAIL_STATUS_COLUMN, FORM_ID_COLUMN, FormId, STATUS_SENT, Submission, format_row,
};

/// JSON body returned for every submission, success or not.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_sent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl SubmissionResponse {
    pub fn accepted(receipt: &Receipt) -> Self {
        SubmissionResponse {
            success: true,
            message: "Form submitted successfully".to_string(),
            log_id: Some(receipt.form_id.to_string()),
            email_sent: Some(receipt.email_sent),
            timestamp: Some(receipt.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }

    pub fn failed(err: &SubmitError) -> Self {
        SubmissionResponse {
            success: false,
            message: format!("Error processing form: {}", err),
            log_id: None,
            email_sent: None,
            timestamp: None,
        }
    }
}

/// What a fully processed submission produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    pub form_id: FormId,
    pub row: RowPosition,
    pub email_sent: bool,
    pub timestamp: DateTime<Utc>,
}

/// Runs the intake workflow against a store and a mail transport.
///
/// Built once at startup; the configuration is shared, never global.
pub struct SubmissionService {
    config: Arc<Config>,
    store: Arc<dyn SubmissionStore>,
    transport: Arc<dyn MailTransport>,
    renderer: NotificationRenderer,
}

impl SubmissionService {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn SubmissionStore>,
        transport: Arc<dyn MailTransport>,
    ) -> Result<Self, RenderError> {
        let renderer = NotificationRenderer::new(&config)?;
        Ok(SubmissionService {
            config,
            store,
            transport,
            renderer,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &dyn SubmissionStore {
        self.store.as_ref()
    }

    /// Processes one request body and always answers with a response payload.
    pub fn handle(&self, body: &[u8], now: DateTime<Utc>) -> SubmissionResponse {
        match self.process(body, now) {
            Ok(receipt) => {
                info!(
                    "Submission {} complete at row {}",
                    receipt.form_id, receipt.row
                );
                SubmissionResponse::accepted(&receipt)
            }
            Err(e) => {
                error!("Error processing form: {}", e);
                SubmissionResponse::failed(&e)
            }
        }
    }

    /// Parses, logs, then notifies. A logging failure aborts before any mail is sent.
    pub fn process(&self, body: &[u8], now: DateTime<Utc>) -> Result<Receipt, SubmitError> {
        let record = Submission::parse(body)?;
        let form_id = FormId::from_timestamp(&now);
        info!(
            "Received submission {} for {} flat {}",
            form_id, record.tower, record.flat_no
        );

        let (handle, row) = self.log_submission(&record, &form_id, &now)?;
        self.notify(&handle, &record, &form_id, &now)?;

        Ok(Receipt {
            form_id,
            row,
            email_sent: true,
            timestamp: now,
        })
    }

    /// Appends the submission row with status `PENDING`.
    pub fn log_submission(
        &self,
        record: &Submission,
        form_id: &FormId,
        now: &DateTime<Utc>,
    ) -> Result<(StoreHandle, RowPosition), StoreError> {
        let handle = self.store.ensure_store(&self.config.store_name)?;
        let row = self
            .store
            .append_row(&handle, format_row(record, form_id, now))
            .inspect_err(|e| error!("Error logging to store: {}", e))?;
        info!("Logged {} at row {} of '{}'", form_id, row, handle.name);
        Ok((handle, row))
    }

    /// Renders and sends the notification, then records the email status.
    /// On failure the status becomes `FAILED: <detail>` and one fallback
    /// alert is attempted before the error is returned.
    pub fn notify(
        &self,
        handle: &StoreHandle,
        record: &Submission,
        form_id: &FormId,
        now: &DateTime<Utc>,
    ) -> Result<(), NotifyError> {
        let dispatcher = Dispatcher::new(&self.config, self.transport.as_ref());
        let notification = self
            .renderer
            .render(record, now, form_id)
            .map_err(NotifyError::from);
        let reply_to = dispatcher.reply_to_for(&record.email);

        let outcome = dispatcher.deliver(notification, reply_to, &record.raw);
        let status = match &outcome.primary {
            Ok(()) => STATUS_SENT.to_string(),
            Err(e) => format!("FAILED: {}", e),
        };
        self.update_email_status(handle, form_id, &status);

        outcome.into_result()
    }

    /// Best effort: failures are logged, never returned.
    fn update_email_status(&self, handle: &StoreHandle, form_id: &FormId, status: &str) {
        match self.store.update_cell_by_key(
            handle,
            FORM_ID_COLUMN,
            form_id.as_str(),
            EMAIL_STATUS_COLUMN,
            status,
        ) {
            Ok(true) => {}
            Ok(false) => warn!("No log row found for {} when setting status", form_id),
            Err(e) => error!("Error updating email status for {}: {}", form_id, e),
        }
    }
}
