//! Persistent tabular log of submissions.
//!
//! A store is a [`Workbook`] named after the configured store name. It
//! holds a `Submissions` sheet with a fixed header row, a derived
//! `Summary` sheet and a static `Settings` sheet. [`FileStore`] keeps each
//! store as a gzipped bincode file under a directory.

use chrono::{DateTime, Local, NaiveDate, Utc};
use log::{debug, info};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::config::Config;
use crate::error::StoreError;
use crate::saving::{load_workbook, save_workbook};
use crate::submission::{EMAIL_STATUS_COLUMN, HEADERS, PDF_COLUMN, STATUS_PENDING, display_time};
use crate::workbook::{Sheet, Workbook};

pub const SUBMISSIONS_SHEET: &str = "Submissions";
pub const SUMMARY_SHEET: &str = "Summary";
pub const SETTINGS_SHEET: &str = "Settings";

/// Identifies an opened store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreHandle {
    pub name: String,
}

/// 1-based row number of an appended row, header included.
pub type RowPosition = usize;

/// Access to the submission log.
///
/// Column arguments are 1-based, matching spreadsheet conventions.
pub trait SubmissionStore: Send + Sync {
    /// Opens the named store, creating it and its header row if needed.
    fn ensure_store(&self, name: &str) -> Result<StoreHandle, StoreError>;

    fn append_row(&self, handle: &StoreHandle, row: Vec<String>) -> Result<RowPosition, StoreError>;

    /// Sets `target_column` on the first data row whose `key_column` equals
    /// `key_value`. Returns whether a row matched.
    fn update_cell_by_key(
        &self,
        handle: &StoreHandle,
        key_column: usize,
        key_value: &str,
        target_column: usize,
        new_value: &str,
    ) -> Result<bool, StoreError>;

    /// Snapshot of every sheet in the store.
    fn read_workbook(&self, handle: &StoreHandle) -> Result<Workbook, StoreError>;
}

/// Counters shown on the `Summary` sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryMetrics {
    pub total_submissions: usize,
    pub todays_submissions: usize,
    pub pdfs_generated: usize,
    pub pending_review: usize,
}

/// Computes the summary counters from a `Submissions` sheet.
pub fn summarize(submissions: &Sheet, today: NaiveDate) -> SummaryMetrics {
    let today_prefix = today.format("%Y-%m-%d").to_string();
    let mut metrics = SummaryMetrics {
        total_submissions: 0,
        todays_submissions: 0,
        pdfs_generated: 0,
        pending_review: 0,
    };

    for (row, cells) in submissions.data_rows() {
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        metrics.total_submissions += 1;
        if cells.first().is_some_and(|ts| ts.starts_with(&today_prefix)) {
            metrics.todays_submissions += 1;
        }
        if submissions.cell(row, PDF_COLUMN) == Some("YES") {
            metrics.pdfs_generated += 1;
        }
        if submissions.cell(row, EMAIL_STATUS_COLUMN) == Some(STATUS_PENDING) {
            metrics.pending_review += 1;
        }
    }

    metrics
}

/// Returns the summary counters of an opened workbook.
pub fn workbook_summary(workbook: &Workbook, today: NaiveDate) -> SummaryMetrics {
    match workbook.sheet(SUBMISSIONS_SHEET) {
        Some(sheet) => summarize(sheet, today),
        None => summarize(&Sheet::new(SUBMISSIONS_SHEET), today),
    }
}

fn header_row() -> Vec<String> {
    HEADERS.iter().map(|h| h.to_string()).collect()
}

fn row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

/// Values written to the `Settings` sheet when a store is created.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub system_email: String,
    pub recipient_email: String,
}

impl From<&Config> for StoreSettings {
    fn from(config: &Config) -> Self {
        StoreSettings {
            system_email: config.sender_email.clone(),
            recipient_email: config.recipient_email.clone(),
        }
    }
}

/// Builds a fresh store: Submissions with headers, then Summary and Settings.
pub fn new_workbook(name: &str, settings: &StoreSettings, now: &DateTime<Utc>) -> Workbook {
    let mut workbook = Workbook::new(name);

    let mut submissions = Sheet::new(SUBMISSIONS_SHEET);
    submissions.append_row(header_row());
    workbook.sheets.push(submissions);

    workbook.sheets.push(Sheet::new(SUMMARY_SHEET));
    refresh_summary(&mut workbook, now);

    let mut settings_sheet = Sheet::new(SETTINGS_SHEET);
    settings_sheet.set_values(
        1,
        vec![
            row(&["CONFIGURATION", "", ""]),
            row(&["System Email", &settings.system_email, ""]),
            row(&["Recipient Email", &settings.recipient_email, ""]),
            row(&["", "", ""]),
            row(&["LAST UPDATED", &display_time(now), ""]),
            row(&["SCRIPT VERSION", env!("CARGO_PKG_VERSION"), ""]),
            row(&["", "", ""]),
            row(&["INSTRUCTIONS", "", ""]),
            row(&["1. Do not delete this sheet", "", ""]),
            row(&["2. All form data goes to Submissions sheet", "", ""]),
            row(&["3. Summary updates automatically", "", ""]),
        ],
    );
    workbook.sheets.push(settings_sheet);

    workbook
}

/// Makes sure the Submissions sheet exists and carries its header row.
/// Returns true when the workbook was modified.
pub fn ensure_submissions_sheet(workbook: &mut Workbook) -> bool {
    let mut modified = workbook.sheet(SUBMISSIONS_SHEET).is_none();
    let sheet = workbook.sheet_or_insert(SUBMISSIONS_SHEET, 0);
    if sheet.row_count() == 0 {
        sheet.append_row(header_row());
        modified = true;
    }
    modified
}

/// Rewrites the Summary sheet from the current Submissions rows.
pub fn refresh_summary(workbook: &mut Workbook, now: &DateTime<Utc>) {
    let metrics = workbook_summary(workbook, now.with_timezone(&Local).date_naive());
    let updated = display_time(now);
    let summary = workbook.sheet_or_insert(SUMMARY_SHEET, 1);
    summary.rows = vec![
        row(&["Metric", "Value", "Last Updated"]),
        row(&["Total Submissions", &metrics.total_submissions.to_string(), &updated]),
        row(&["Today's Submissions", &metrics.todays_submissions.to_string(), &updated]),
        row(&["PDFs Generated", &metrics.pdfs_generated.to_string(), &updated]),
        row(&["Pending Review", &metrics.pending_review.to_string(), &updated]),
    ];
}

/// File-backed store: `<dir>/<name>.bin.gz`.
///
/// Every operation is a load-modify-save of the whole workbook, serialized
/// by a process-local lock. Separate processes sharing a directory are not
/// coordinated.
pub struct FileStore {
    dir: PathBuf,
    settings: StoreSettings,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>, settings: StoreSettings) -> Self {
        FileStore {
            dir: dir.into(),
            settings,
            lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.store_dir.clone(), StoreSettings::from(config))
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.bin.gz", name))
    }

    fn open_or_create(&self, name: &str, path: &Path) -> Result<Workbook, StoreError> {
        if path.exists() {
            let mut workbook = load_workbook(path)?;
            if ensure_submissions_sheet(&mut workbook) {
                save_workbook(&workbook, path)?;
            }
            return Ok(workbook);
        }

        std::fs::create_dir_all(&self.dir)?;
        let workbook = new_workbook(name, &self.settings, &Utc::now());
        save_workbook(&workbook, path)?;
        info!("Created store '{}' at {}", name, path.display());
        Ok(workbook)
    }

    fn with_workbook<T>(
        &self,
        handle: &StoreHandle,
        f: impl FnOnce(&mut Workbook) -> Result<(T, bool), StoreError>,
    ) -> Result<T, StoreError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))?;
        let path = self.path_for(&handle.name);
        let mut workbook = self.open_or_create(&handle.name, &path)?;
        let (value, dirty) = f(&mut workbook)?;
        if dirty {
            save_workbook(&workbook, &path)?;
        }
        Ok(value)
    }
}

impl SubmissionStore for FileStore {
    fn ensure_store(&self, name: &str) -> Result<StoreHandle, StoreError> {
        let handle = StoreHandle {
            name: name.to_string(),
        };
        self.with_workbook(&handle, |_| Ok(((), false)))?;
        Ok(handle)
    }

    fn append_row(&self, handle: &StoreHandle, row: Vec<String>) -> Result<RowPosition, StoreError> {
        self.with_workbook(handle, |workbook| {
            ensure_submissions_sheet(workbook);
            let position = workbook
                .sheet_mut(SUBMISSIONS_SHEET)
                .ok_or_else(|| StoreError::MissingSheet(handle.name.clone()))?
                .append_row(row);
            refresh_summary(workbook, &Utc::now());
            debug!("Appended row {} to store '{}'", position, handle.name);
            Ok((position, true))
        })
    }

    fn update_cell_by_key(
        &self,
        handle: &StoreHandle,
        key_column: usize,
        key_value: &str,
        target_column: usize,
        new_value: &str,
    ) -> Result<bool, StoreError> {
        self.with_workbook(handle, |workbook| {
            let sheet = workbook
                .sheet_mut(SUBMISSIONS_SHEET)
                .ok_or_else(|| StoreError::MissingSheet(handle.name.clone()))?;

            let found = sheet
                .data_rows()
                .find(|(row, _)| sheet.cell(*row, key_column) == Some(key_value))
                .map(|(row, _)| row);

            match found {
                Some(row) => {
                    sheet.set_cell(row, target_column, new_value);
                    debug!(
                        "Set {} = '{}' in store '{}'",
                        Sheet::get_cell_name(row, target_column),
                        new_value,
                        handle.name
                    );
                    refresh_summary(workbook, &Utc::now());
                    Ok((true, true))
                }
                None => Ok((false, false)),
            }
        })
    }

    fn read_workbook(&self, handle: &StoreHandle) -> Result<Workbook, StoreError> {
        self.with_workbook(handle, |workbook| Ok((workbook.clone(), false)))
    }
}
