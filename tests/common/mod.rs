#![allow(dead_code)]

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Value, json};
use sprinkler_permit::config::Config;
use sprinkler_permit::error::{MailError, StoreError};
use sprinkler_permit::mailer::{FALLBACK_SUBJECT, MailTransport, OutgoingMail};
use sprinkler_permit::store::{FileStore, RowPosition, StoreHandle, StoreSettings, SubmissionStore};
use sprinkler_permit::workbook::Workbook;
use std::path::Path;
use std::sync::Mutex;

/// Mail transport that records every message and fails on demand.
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<OutgoingMail>>,
    pub fail_primary: bool,
    pub fail_fallback: bool,
}

impl RecordingTransport {
    pub fn failing(fail_primary: bool, fail_fallback: bool) -> Self {
        RecordingTransport {
            sent: Mutex::new(Vec::new()),
            fail_primary,
            fail_fallback,
        }
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fallbacks(&self) -> usize {
        self.sent()
            .iter()
            .filter(|m| m.subject == FALLBACK_SUBJECT)
            .count()
    }
}

impl MailTransport for RecordingTransport {
    fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(mail.clone());
        let is_fallback = mail.subject == FALLBACK_SUBJECT;
        if (is_fallback && self.fail_fallback) || (!is_fallback && self.fail_primary) {
            return Err(MailError::Transport("550 relay refused".to_string()));
        }
        Ok(())
    }
}

/// Store whose every operation fails.
pub struct UnavailableStore;

impl SubmissionStore for UnavailableStore {
    fn ensure_store(&self, _name: &str) -> Result<StoreHandle, StoreError> {
        Err(StoreError::Unavailable("disk offline".to_string()))
    }

    fn append_row(&self, _handle: &StoreHandle, _row: Vec<String>) -> Result<RowPosition, StoreError> {
        Err(StoreError::Unavailable("disk offline".to_string()))
    }

    fn update_cell_by_key(
        &self,
        _handle: &StoreHandle,
        _key_column: usize,
        _key_value: &str,
        _target_column: usize,
        _new_value: &str,
    ) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("disk offline".to_string()))
    }

    fn read_workbook(&self, _handle: &StoreHandle) -> Result<Workbook, StoreError> {
        Err(StoreError::Unavailable("disk offline".to_string()))
    }
}

/// File store that opens normally but refuses to append rows.
pub struct AppendFailingStore {
    pub inner: FileStore,
}

impl SubmissionStore for AppendFailingStore {
    fn ensure_store(&self, name: &str) -> Result<StoreHandle, StoreError> {
        self.inner.ensure_store(name)
    }

    fn append_row(&self, _handle: &StoreHandle, _row: Vec<String>) -> Result<RowPosition, StoreError> {
        Err(StoreError::Unavailable("quota exceeded".to_string()))
    }

    fn update_cell_by_key(
        &self,
        handle: &StoreHandle,
        key_column: usize,
        key_value: &str,
        target_column: usize,
        new_value: &str,
    ) -> Result<bool, StoreError> {
        self.inner
            .update_cell_by_key(handle, key_column, key_value, target_column, new_value)
    }

    fn read_workbook(&self, handle: &StoreHandle) -> Result<Workbook, StoreError> {
        self.inner.read_workbook(handle)
    }
}

pub fn test_config(dir: &Path) -> Config {
    Config {
        sender_email: "noreply@example.com".to_string(),
        recipient_email: "facilities@example.com".to_string(),
        store_dir: dir.to_path_buf(),
        ..Config::default()
    }
}

pub fn file_store(dir: &Path) -> FileStore {
    FileStore::new(
        dir,
        StoreSettings {
            system_email: "noreply@example.com".to_string(),
            recipient_email: "facilities@example.com".to_string(),
        },
    )
}

pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 12, 9, 30, 0).unwrap()
}

/// A base64 payload comfortably over the attachment threshold.
pub fn pdf_payload() -> String {
    let document = b"%PDF-1.4\n1 0 obj << /Type /Catalog >> endobj\n".repeat(4);
    STANDARD.encode(document)
}

pub fn sample_submission() -> Value {
    json!({
        "scroll_no": "TEST001",
        "date": "2026-01-12",
        "tower": "Tower A",
        "flat_no": "10F",
        "owner_name": "Test Owner",
        "contact_number": "1234567890",
        "email": "test@example.com",
        "extension_locations": "Hall, Kitchen",
        "advisory_acknowledged": true,
        "signature": "data:image/png;base64,iVBORw0KGgo=",
        "pdf_base64": pdf_payload(),
    })
}
