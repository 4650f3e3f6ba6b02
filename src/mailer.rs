use log::{error, info, warn};
use serde_json::Value;

#[cfg(feature = "web")]
use crate::config::{SmtpConfig, TlsMode};
use crate::config::{Config, looks_like_email};
use crate::error::{MailError, NotifyError};
use crate::notification::{Attachment, Notification};

#[cfg(feature = "web")]
use lettre::message::header::ContentType;
#[cfg(feature = "web")]
use lettre::message::{Attachment as MimeAttachment, Mailbox, MultiPart, SinglePart};
#[cfg(feature = "web")]
use lettre::transport::smtp::authentication::Credentials;
#[cfg(feature = "web")]
use lettre::transport::smtp::client::{Tls, TlsParameters};
#[cfg(feature = "web")]
use lettre::{Message, SmtpTransport, Transport};

pub const FALLBACK_SUBJECT: &str = "URGENT: Sprinkler Form Error";

#[derive(Debug, Clone, PartialEq)]
pub enum MailBody {
    Html(String),
    Text(String),
}

/// A fully addressed message, independent of the transport that sends it.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMail {
    pub from_name: String,
    pub from: String,
    pub to: String,
    pub reply_to: Option<String>,
    pub subject: String,
    pub body: MailBody,
    pub attachments: Vec<Attachment>,
}

/// Sends one message. Implementations block until the relay accepts or
/// rejects it.
pub trait MailTransport: Send + Sync {
    fn send(&self, mail: &OutgoingMail) -> Result<(), MailError>;
}

/// SMTP delivery through lettre.
#[cfg(feature = "web")]
pub struct SmtpMailer {
    smtp: SmtpTransport,
}

#[cfg(feature = "web")]
impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let transport_err = |e: lettre::transport::smtp::Error| MailError::Transport(e.to_string());

        let builder = match config.tls {
            TlsMode::Wrapper => {
                let tls_parameters =
                    TlsParameters::new(config.host.clone()).map_err(transport_err)?;
                SmtpTransport::relay(&config.host)
                    .map_err(transport_err)?
                    .tls(Tls::Wrapper(tls_parameters))
            }
            TlsMode::Starttls => SmtpTransport::starttls_relay(&config.host).map_err(transport_err)?,
            TlsMode::None => SmtpTransport::builder_dangerous(&config.host),
        };

        let builder = builder.port(config.effective_port());
        let builder = match (&config.username, &config.password) {
            (Some(user), Some(pass)) => {
                builder.credentials(Credentials::new(user.clone(), pass.clone()))
            }
            _ => builder,
        };

        Ok(SmtpMailer {
            smtp: builder.build(),
        })
    }

    fn build_message(mail: &OutgoingMail) -> Result<Message, MailError> {
        let address_err = |address: &str, e: lettre::address::AddressError| MailError::Address {
            address: address.to_string(),
            message: e.to_string(),
        };

        let from = Mailbox::new(
            Some(mail.from_name.clone()),
            mail.from.parse().map_err(|e| address_err(&mail.from, e))?,
        );
        let to = Mailbox::new(None, mail.to.parse().map_err(|e| address_err(&mail.to, e))?);

        let mut builder = Message::builder().from(from).to(to).subject(mail.subject.clone());
        if let Some(reply_to) = &mail.reply_to {
            let address = reply_to.parse().map_err(|e| address_err(reply_to, e))?;
            builder = builder.reply_to(Mailbox::new(None, address));
        }

        let body = match &mail.body {
            MailBody::Html(html) => SinglePart::html(html.clone()),
            MailBody::Text(text) => SinglePart::plain(text.clone()),
        };

        let message = if mail.attachments.is_empty() {
            builder.singlepart(body)
        } else {
            let mut parts = MultiPart::mixed().singlepart(body);
            for attachment in &mail.attachments {
                let content_type = ContentType::parse(&attachment.content_type)
                    .map_err(|e| MailError::Build(e.to_string()))?;
                parts = parts.singlepart(
                    MimeAttachment::new(attachment.filename.clone())
                        .body(attachment.data.clone(), content_type),
                );
            }
            builder.multipart(parts)
        };

        message.map_err(|e| MailError::Build(e.to_string()))
    }
}

#[cfg(feature = "web")]
impl MailTransport for SmtpMailer {
    fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        let message = Self::build_message(mail)?;
        self.smtp
            .send(&message)
            .map_err(|e| MailError::Transport(e.to_string()))?;
        Ok(())
    }
}

/// Result of one dispatch: the primary notification, plus the fallback
/// alert when the primary failed.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub primary: Result<(), NotifyError>,
    pub fallback: Option<Result<(), MailError>>,
}

impl DispatchOutcome {
    pub fn delivered(&self) -> bool {
        self.primary.is_ok()
    }

    /// The primary result. Fallback failures never surface here.
    pub fn into_result(self) -> Result<(), NotifyError> {
        self.primary
    }
}

/// Sends notifications to the fixed facilities recipient, falling back to
/// a plain-text alert when the notification cannot be delivered.
pub struct Dispatcher<'a> {
    config: &'a Config,
    transport: &'a dyn MailTransport,
}

impl<'a> Dispatcher<'a> {
    pub fn new(config: &'a Config, transport: &'a dyn MailTransport) -> Self {
        Dispatcher { config, transport }
    }

    /// Reply-to for a notification: the submitter when the address is
    /// usable, otherwise the system sender.
    pub fn reply_to_for(&self, submitter_email: &str) -> String {
        if looks_like_email(submitter_email) {
            submitter_email.trim().to_string()
        } else {
            self.config.sender_email.clone()
        }
    }

    pub fn notification_mail(&self, notification: Notification, reply_to: String) -> OutgoingMail {
        OutgoingMail {
            from_name: self.config.sender_name.clone(),
            from: self.config.sender_email.clone(),
            to: self.config.recipient_email.clone(),
            reply_to: Some(reply_to),
            subject: notification.subject,
            body: MailBody::Html(notification.html_body),
            attachments: notification.attachment.into_iter().collect(),
        }
    }

    pub fn fallback_mail(&self, record: &Value) -> OutgoingMail {
        let data = serde_json::to_string_pretty(record).unwrap_or_else(|_| record.to_string());
        OutgoingMail {
            from_name: self.config.sender_name.clone(),
            from: self.config.sender_email.clone(),
            to: self.config.recipient_email.clone(),
            reply_to: None,
            subject: FALLBACK_SUBJECT.to_string(),
            body: MailBody::Text(format!(
                "Form submission failed. Check server logs. Data: {}",
                data
            )),
            attachments: Vec::new(),
        }
    }

    /// Sends `notification`, or reports the failure that prevented building
    /// it. On any failure exactly one fallback alert carrying `record` is
    /// attempted.
    pub fn deliver(
        &self,
        notification: Result<Notification, NotifyError>,
        reply_to: String,
        record: &Value,
    ) -> DispatchOutcome {
        let primary = notification.and_then(|n| {
            let mail = self.notification_mail(n, reply_to);
            self.transport.send(&mail).map_err(NotifyError::from)
        });

        match primary {
            Ok(()) => {
                info!("Notification sent to {}", self.config.recipient_email);
                DispatchOutcome {
                    primary: Ok(()),
                    fallback: None,
                }
            }
            Err(e) => {
                error!("Error sending notification: {}", e);
                let fallback = self.transport.send(&self.fallback_mail(record));
                match &fallback {
                    Ok(()) => warn!("Fallback alert sent to {}", self.config.recipient_email),
                    Err(fe) => error!("Fallback email also failed: {}", fe),
                }
                DispatchOutcome {
                    primary: Err(e),
                    fallback: Some(fallback),
                }
            }
        }
    }
}

#[cfg(all(test, feature = "web"))]
mod tests {
    use super::*;

    fn mail(attachments: Vec<Attachment>) -> OutgoingMail {
        OutgoingMail {
            from_name: "Sprinkler Permit System".to_string(),
            from: "noreply@example.com".to_string(),
            to: "facilities@example.com".to_string(),
            reply_to: Some("owner@example.com".to_string()),
            subject: "🚒 Sprinkler Permit - Tower A - Flat 10F".to_string(),
            body: MailBody::Html("<p>hello</p>".to_string()),
            attachments,
        }
    }

    #[test]
    fn builds_multipart_with_attachment() {
        let attachment = Attachment {
            filename: "Sprinkler_Permit_10F_SPR-1.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            data: b"%PDF-1.4".to_vec(),
        };
        let message = SmtpMailer::build_message(&mail(vec![attachment])).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("Sprinkler_Permit_10F_SPR-1.pdf"));
        assert!(raw.contains("Reply-To: owner@example.com"));
    }

    #[test]
    fn rejects_bad_recipient() {
        let mut bad = mail(Vec::new());
        bad.to = "not an address".to_string();
        assert!(matches!(
            SmtpMailer::build_message(&bad),
            Err(MailError::Address { .. })
        ));
    }
}
