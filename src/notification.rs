//! Subject, HTML body and PDF attachment of the facilities notification.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Datelike, Local, Utc};
use handlebars::Handlebars;
use log::warn;
use serde_json::json;

use crate::config::Config;
use crate::error::RenderError;
use crate::submission::{FormId, Submission, display_time};

const TEMPLATE_NAME: &str = "notification";
const TEMPLATE: &str = include_str!("./static/notification.hbs");

/// Payloads this short are placeholders, never a real document.
pub const MIN_PDF_PAYLOAD_LEN: usize = 100;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// A binary file attached to an outgoing mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A rendered notification, ready for the mail dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub subject: String,
    pub html_body: String,
    pub attachment: Option<Attachment>,
}

/// Renders notifications from submissions.
///
/// The template is compiled once; Handlebars HTML-escapes every `{{field}}`,
/// so submitted text can never inject markup into the body.
pub struct NotificationRenderer {
    registry: Handlebars<'static>,
    subject_prefix: String,
    store_name: String,
}

impl NotificationRenderer {
    pub fn new(config: &Config) -> Result<Self, RenderError> {
        Self::with_settings(&config.subject_prefix, &config.store_name)
    }

    pub fn with_settings(subject_prefix: &str, store_name: &str) -> Result<Self, RenderError> {
        let mut registry = Handlebars::new();
        registry.register_template_string(TEMPLATE_NAME, TEMPLATE)?;
        Ok(NotificationRenderer {
            registry,
            subject_prefix: subject_prefix.to_string(),
            store_name: store_name.to_string(),
        })
    }

    pub fn subject(&self, record: &Submission) -> String {
        format!("{}{} - Flat {}", self.subject_prefix, record.tower, record.flat_no)
    }

    pub fn html_body(
        &self,
        record: &Submission,
        timestamp: &DateTime<Utc>,
        form_id: &FormId,
    ) -> Result<String, RenderError> {
        let yes_no = |flag: bool| if flag { "YES" } else { "NO" };
        let data = json!({
            "form_id": form_id.as_str(),
            "submitted_at": display_time(timestamp),
            "scroll_no": record.scroll_no,
            "owner_name": record.owner_name,
            "tower": record.tower,
            "flat_no": record.flat_no,
            "contact_number": record.contact_number,
            "email": record.email,
            "extension_locations": record
                .extension_locations
                .as_deref()
                .unwrap_or("No locations selected"),
            "advisory": yes_no(record.advisory_acknowledged),
            "signature": yes_no(record.has_signature),
            "pdf": if record.has_pdf() { "YES - See attachment" } else { "NO - Data only" },
            "store_name": self.store_name,
            "year": timestamp.with_timezone(&Local).year(),
        });
        Ok(self.registry.render(TEMPLATE_NAME, &data)?)
    }

    pub fn render(
        &self,
        record: &Submission,
        timestamp: &DateTime<Utc>,
        form_id: &FormId,
    ) -> Result<Notification, RenderError> {
        Ok(Notification {
            subject: self.subject(record),
            html_body: self.html_body(record, timestamp, form_id)?,
            attachment: decode_attachment(record, form_id),
        })
    }
}

pub fn attachment_name(flat_no: &str, form_id: &FormId) -> String {
    format!("Sprinkler_Permit_{}_{}.pdf", flat_no, form_id)
}

fn strip_data_uri(payload: &str) -> &str {
    if payload.starts_with("data:") {
        if let Some(pos) = payload.find(";base64,") {
            return &payload[pos + ";base64,".len()..];
        }
    }
    payload
}

/// Decodes the submitted PDF, if any.
///
/// Short, absent or undecodable payloads yield `None`; a bad payload is
/// logged but never fails the notification.
pub fn decode_attachment(record: &Submission, form_id: &FormId) -> Option<Attachment> {
    let payload = strip_data_uri(record.pdf_base64.as_deref()?);
    if payload.len() <= MIN_PDF_PAYLOAD_LEN {
        return None;
    }

    let compact: String = payload.split_whitespace().collect();
    match STANDARD.decode(compact.as_bytes()) {
        Ok(data) if !data.is_empty() => Some(Attachment {
            filename: attachment_name(&record.flat_no, form_id),
            content_type: PDF_CONTENT_TYPE.to_string(),
            data,
        }),
        Ok(_) => None,
        Err(e) => {
            warn!("Could not create PDF attachment for {}: {}", form_id, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn renderer() -> NotificationRenderer {
        NotificationRenderer::with_settings("🚒 Sprinkler Permit - ", "Sprinkler_Permit_Log").unwrap()
    }

    #[test]
    fn body_escapes_submitted_markup() {
        let record = Submission::from_value(json!({
            "owner_name": "<script>alert('x')</script>",
            "tower": "A & B",
        }));
        let ts = Utc::now();
        let body = renderer()
            .html_body(&record, &ts, &FormId::from_timestamp(&ts))
            .unwrap();
        assert!(!body.contains("<script>"));
        assert!(body.contains("&lt;script&gt;"));
        assert!(body.contains("A &amp; B"));
    }

    #[test]
    fn body_defaults_for_missing_fields() {
        let record = Submission::from_value(json!({}));
        let ts = Utc::now();
        let body = renderer()
            .html_body(&record, &ts, &FormId::from_timestamp(&ts))
            .unwrap();
        assert!(body.contains("No locations selected"));
        assert!(body.contains("NO - Data only"));
        assert!(body.contains("Sprinkler_Permit_Log"));
    }

    #[test]
    fn data_uri_prefix_is_stripped() {
        assert_eq!(strip_data_uri("data:application/pdf;base64,JVBE"), "JVBE");
        assert_eq!(strip_data_uri("JVBE"), "JVBE");
    }
}
