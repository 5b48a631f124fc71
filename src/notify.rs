use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::{debug, info, warn};
use serde::Serialize;

use crate::error::DeliveryError;
use crate::secrets::SmtpCredentials;

pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 465;
pub const DEFAULT_SUBJECT: &str = "YouTube Transcription";

/// A single plain-text email, built right before sending
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailRequest {
    pub sender: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

impl EmailRequest {
    pub fn to_message(&self) -> Result<Message, DeliveryError> {
        Message::builder()
            .from(parse_mailbox(&self.sender)?)
            .to(parse_mailbox(&self.recipient)?)
            .subject(&self.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(self.body.clone())
            .map_err(|e| DeliveryError::Build(e.to_string()))
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, DeliveryError> {
    address.parse().map_err(|e: lettre::address::AddressError| DeliveryError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, request: &EmailRequest, credentials: &SmtpCredentials) -> Result<(), DeliveryError>;
}

/// SMTP relay over implicit TLS
pub struct SmtpRelay {
    host: String,
    port: u16,
}

impl SmtpRelay {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }
}

impl Default for SmtpRelay {
    fn default() -> Self {
        Self::new(DEFAULT_SMTP_HOST, DEFAULT_SMTP_PORT)
    }
}

#[async_trait]
impl MailTransport for SmtpRelay {
    async fn send(&self, request: &EmailRequest, credentials: &SmtpCredentials) -> Result<(), DeliveryError> {
        let message = request.to_message()?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.host)
            .map_err(|e| DeliveryError::Transport(e.to_string()))?
            .port(self.port)
            .credentials(Credentials::new(
                credentials.username.clone(),
                credentials.password.clone(),
            ))
            .build();

        debug!("Sending email via {}:{} to {}", self.host, self.port, request.recipient);
        mailer
            .send(message)
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;
        Ok(())
    }
}

/// Sends transcript or summary text; one attempt per call
pub struct Notifier {
    transport: Box<dyn MailTransport>,
    credentials: Option<SmtpCredentials>,
    sender: Option<String>,
}

impl Notifier {
    /// `sender` defaults to the credential username
    pub fn new(
        transport: Box<dyn MailTransport>,
        credentials: Option<SmtpCredentials>,
        sender: Option<String>,
    ) -> Self {
        Self {
            transport,
            credentials,
            sender,
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    pub async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<EmailRequest, DeliveryError> {
        let credentials = self.credentials.as_ref().ok_or(DeliveryError::MissingCredentials)?;

        let request = EmailRequest {
            sender: self.sender.clone().unwrap_or_else(|| credentials.username.clone()),
            recipient: recipient.trim().to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        };
        request.to_message()?;

        match self.transport.send(&request, credentials).await {
            Ok(()) => {
                info!("Email sent to {}", request.recipient);
                Ok(request)
            }
            Err(e) => {
                warn!("Email to {} failed: {e}", request.recipient);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Arc<Mutex<Vec<EmailRequest>>>,
        fail: bool,
    }

    #[async_trait]
    impl MailTransport for RecordingTransport {
        async fn send(&self, request: &EmailRequest, _credentials: &SmtpCredentials) -> Result<(), DeliveryError> {
            self.sent.lock().unwrap().push(request.clone());
            if self.fail {
                return Err(DeliveryError::Transport("535 authentication failed".to_string()));
            }
            Ok(())
        }
    }

    fn credentials() -> SmtpCredentials {
        SmtpCredentials {
            username: "sender@example.com".to_string(),
            password: "app-password".to_string(),
        }
    }

    fn notifier(credentials: Option<SmtpCredentials>, fail: bool) -> (Notifier, Arc<Mutex<Vec<EmailRequest>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let transport = RecordingTransport {
            sent: sent.clone(),
            fail,
        };
        (Notifier::new(Box::new(transport), credentials, None), sent)
    }

    #[tokio::test]
    async fn test_missing_credentials_never_contacts_transport() {
        let (n, sent) = notifier(None, false);
        assert!(!n.has_credentials());
        let err = n.send("to@example.com", DEFAULT_SUBJECT, "body").await.unwrap_err();
        assert!(matches!(err, DeliveryError::MissingCredentials));
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_builds_request() {
        let (n, sent) = notifier(Some(credentials()), false);
        let request = n.send(" to@example.com ", DEFAULT_SUBJECT, "the summary").await.unwrap();
        assert_eq!(request.sender, "sender@example.com");
        assert_eq!(request.recipient, "to@example.com");
        assert_eq!(request.subject, "YouTube Transcription");
        assert_eq!(request.body, "the summary");
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_explicit_sender() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let transport = RecordingTransport {
            sent: sent.clone(),
            fail: false,
        };
        let n = Notifier::new(
            Box::new(transport),
            Some(credentials()),
            Some("Digest Bot <bot@example.com>".to_string()),
        );
        let request = n.send("to@example.com", "s", "b").await.unwrap();
        assert_eq!(request.sender, "Digest Bot <bot@example.com>");
    }

    #[tokio::test]
    async fn test_invalid_recipient_rejected_before_transport() {
        let (n, sent) = notifier(Some(credentials()), false);
        let err = n.send("not an address", "s", "b").await.unwrap_err();
        assert!(matches!(err, DeliveryError::InvalidAddress { .. }));
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_single_attempt() {
        let (n, sent) = notifier(Some(credentials()), true);
        let err = n.send("to@example.com", "s", "b").await.unwrap_err();
        assert!(err.to_string().contains("authentication failed"));
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_to_message_plain_text() {
        let request = EmailRequest {
            sender: "a@example.com".to_string(),
            recipient: "b@example.com".to_string(),
            subject: "Hello".to_string(),
            body: "Body text".to_string(),
        };
        let raw = String::from_utf8(request.to_message().unwrap().formatted()).unwrap();
        assert!(raw.contains("Subject: Hello"));
        assert!(raw.contains("text/plain"));
        assert!(raw.contains("Body text"));
    }
}
