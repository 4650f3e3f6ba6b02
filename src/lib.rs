/*!
# Sprinkler Permit Intake

A small web service that records sprinkler-modification work permits for a
residential building and notifies facilities management by email.

## Overview

A resident fills in a permit form in the browser and the page posts it as
JSON. Each submission is appended to a persistent log and a formatted
notification, with the generated permit PDF attached when one was supplied,
is mailed to a fixed recipient.

## Workflow

1. **Parse** the request body into a [`Submission`](submission::Submission).
   Any JSON object is accepted; absent fields take defaults.
2. **Log** the submission as a 14-column row in the `Submissions` sheet of
   the store, with email status `PENDING`. A failure here ends the request
   and no mail is sent.
3. **Notify**: render the subject and HTML body, decode the attachment, and
   send. On success the status becomes `SENT`. On failure it becomes
   `FAILED: <detail>`, a plain-text alert is attempted once, and the
   request fails.
4. **Respond** with a JSON payload reporting success or the error, always
   in-band.

The form id (`SPR-` + base-36 milliseconds) is generated once per
submission and threaded through both the log and the notification.

## Modules

- **config**: Process-wide settings (defaults, JSON file, `PERMIT_*` environment)
- **submission**: Input record, form id and log-row formatting
- **workbook**: Sheets of text cells
- **saving**: Gzip + bincode persistence of workbooks
- **store**: The submission log, its header row and summary sheet
- **notification**: Subject, escaped HTML body and PDF attachment
- **mailer**: Mail transport (SMTP via lettre) and the fallback dispatcher
- **handler**: The intake workflow and its JSON response
- **downloader**: CSV and XLSX export of the log
- **app**: Routing (requires the `web` feature)

## REST API Endpoints

- `POST /`, `POST /api/submit` - Accepts a form submission
- `GET /api/summary` - Submission counters
- `GET /api/export?format=xlsx|csv` - Downloads the log
- `GET /health` - Liveness probe
*/

#[cfg(feature = "web")]
pub mod app;
pub mod config;
pub mod downloader;
pub mod error;
pub mod handler;
pub mod mailer;
pub mod notification;
pub mod saving;
pub mod store;
pub mod submission;
pub mod workbook;

pub use config::Config;
pub use error::*;
pub use handler::{Receipt, SubmissionResponse, SubmissionService};
pub use store::{FileStore, SubmissionStore};
pub use submission::{FormId, Submission, format_row};
