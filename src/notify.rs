//! Outbound e-mail.
//!
//! Every message is written to the outbox as PENDING and delivered off the
//! request path to the configured Slack and Discord webhooks. A failed
//! delivery goes to RETRY and is picked up again by the outbox worker until
//! `max_retries` attempts have failed, after which it stays FAILED. With no
//! channel configured the message is logged and marked SENT.

use chrono::Utc;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::MailConfig;
use crate::error::{AppError, Result};
use crate::storage::Storage;
use crate::types::{ContactMessage, EmailNotification, EmailStatus};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);
/// Discord rejects longer message bodies.
const DISCORD_MAX_CONTENT: usize = 2000;
/// Rows taken per outbox run.
const OUTBOX_BATCH: usize = 50;
const OUTBOX_CONCURRENCY: usize = 4;

pub const CONTACT_REFERENCE: &str = "CONTACT_MESSAGE";
pub const USER_REFERENCE: &str = "USER";

/// A rendered message, ready for the outbox.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub recipient_email: String,
    pub recipient_name: Option<String>,
    pub subject: String,
    pub body: String,
    pub notification_type: String,
    pub reference_id: Option<i64>,
    pub reference_type: Option<String>,
}

/// Outcome counts of one outbox run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OutboxRun {
    pub sent: usize,
    pub retrying: usize,
    pub failed: usize,
}

impl OutboxRun {
    pub fn attempted(&self) -> usize {
        self.sent + self.retrying + self.failed
    }
}

pub struct EmailService {
    storage: Arc<Storage>,
    config: MailConfig,
    http: reqwest::Client,
}

impl EmailService {
    pub fn new(storage: Arc<Storage>, config: MailConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build webhook client: {}", e)))?;
        Ok(Self { storage, config, http })
    }

    fn enqueue(&self, email: OutgoingEmail) -> Result<EmailNotification> {
        self.storage.insert_email(&EmailNotification {
            id: 0,
            recipient_email: email.recipient_email,
            recipient_name: email.recipient_name,
            subject: email.subject,
            body: email.body,
            notification_type: email.notification_type,
            reference_id: email.reference_id,
            reference_type: email.reference_type,
            status: EmailStatus::Pending,
            error_message: None,
            retry_count: 0,
            max_retries: self.config.max_retries,
            sent_at: None,
            created_at: Utc::now(),
        })
    }

    /// Store the message as PENDING and start delivering it in the
    /// background. Outside a Tokio runtime the row waits for the worker.
    pub fn dispatch(self: &Arc<Self>, email: OutgoingEmail) -> Result<EmailNotification> {
        let row = self.enqueue(email)?;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let service = Arc::clone(self);
                let id = row.id;
                handle.spawn(async move {
                    if let Err(e) = service.attempt(id).await {
                        warn!(email_id = id, error = %e, "email attempt aborted");
                    }
                });
            }
            Err(_) => debug!(email_id = row.id, "no runtime; email left for the outbox worker"),
        }
        Ok(row)
    }

    /// Claim the row and try every channel once. `None` when the row was not
    /// deliverable, e.g. another attempt already holds it.
    pub async fn attempt(&self, id: i64) -> Result<Option<EmailStatus>> {
        let row = match self.storage.claim_email(id)? {
            Some(row) => row,
            None => return Ok(None),
        };
        match self.deliver(&row).await {
            Ok(()) => {
                self.storage.mark_email(row.id, EmailStatus::Sent, None, Some(Utc::now()))?;
                info!(
                    email_id = row.id,
                    recipient = %row.recipient_email,
                    kind = %row.notification_type,
                    "email dispatched"
                );
                Ok(Some(EmailStatus::Sent))
            }
            Err(e) => {
                let status = self.storage.record_email_failure(row.id, &e.to_string())?;
                warn!(
                    email_id = row.id,
                    recipient = %row.recipient_email,
                    attempt = row.retry_count + 1,
                    status = %status,
                    error = %e,
                    "email dispatch failed"
                );
                Ok(Some(status))
            }
        }
    }

    /// Deliver queued PENDING rows and retry RETRY rows that have attempts left.
    pub async fn process_outbox(&self) -> Result<OutboxRun> {
        let rows = self.storage.deliverable_emails(OUTBOX_BATCH)?;
        let outcomes: Vec<Result<Option<EmailStatus>>> = futures::stream::iter(rows)
            .map(|row| self.attempt(row.id))
            .buffer_unordered(OUTBOX_CONCURRENCY)
            .collect()
            .await;

        let mut run = OutboxRun::default();
        for outcome in outcomes {
            match outcome {
                Ok(Some(EmailStatus::Sent)) => run.sent += 1,
                Ok(Some(EmailStatus::Retry)) => run.retrying += 1,
                Ok(Some(EmailStatus::Failed)) => run.failed += 1,
                Ok(_) => {}
                Err(e) => warn!(error = %e, "outbox attempt aborted"),
            }
        }
        Ok(run)
    }

    /// Posts to every configured channel. A failing channel does not stop the
    /// others; the first error is returned.
    async fn deliver(&self, email: &EmailNotification) -> std::result::Result<(), reqwest::Error> {
        let text = format!(
            "[{}] {}\nFrom: {}\nTo: {}\n\n{}",
            email.notification_type, email.subject, self.config.from, email.recipient_email, email.body
        );
        let mut attempted = false;
        let mut first_error = None;

        if let Some(webhook) = non_empty(&self.config.slack_webhook_url) {
            attempted = true;
            if let Err(e) = self.post_webhook(webhook, serde_json::json!({ "text": text })).await {
                warn!(email_id = email.id, channel = "slack", error = %e, "webhook post failed");
                first_error.get_or_insert(e);
            }
        }

        if let Some(webhook) = non_empty(&self.config.discord_webhook_url) {
            attempted = true;
            let content: String = text.chars().take(DISCORD_MAX_CONTENT).collect();
            if let Err(e) = self.post_webhook(webhook, serde_json::json!({ "content": content })).await {
                warn!(email_id = email.id, channel = "discord", error = %e, "webhook post failed");
                first_error.get_or_insert(e);
            }
        }

        if !attempted {
            info!(
                recipient = %email.recipient_email,
                subject = %email.subject,
                "no notification channel configured; email logged only"
            );
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn post_webhook(
        &self,
        url: &str,
        payload: serde_json::Value,
    ) -> std::result::Result<(), reqwest::Error> {
        self.http
            .post(url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub fn queue_verification(
        self: &Arc<Self>,
        user_id: i64,
        to: &str,
        name: Option<&str>,
        token: &str,
    ) -> Result<EmailNotification> {
        self.dispatch(verification_email(user_id, to, name, token))
    }

    pub fn queue_contact_confirmation(
        self: &Arc<Self>,
        message: &ContactMessage,
    ) -> Result<EmailNotification> {
        self.dispatch(contact_confirmation(message, &self.config.support_email))
    }

    pub fn queue_contact_admin_notification(
        self: &Arc<Self>,
        message: &ContactMessage,
    ) -> Result<EmailNotification> {
        self.dispatch(contact_admin_notification(message, &self.config.admin_email))
    }

    pub fn queue_contact_response(
        self: &Arc<Self>,
        message: &ContactMessage,
    ) -> Result<EmailNotification> {
        self.dispatch(contact_response(message))
    }
}

/// Run the outbox every `every` until the handle is aborted. Rows left in
/// SENDING by an earlier process are released first.
pub fn spawn_outbox_worker(email: Arc<EmailService>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        match email.storage.requeue_stalled_emails() {
            Ok(0) => {}
            Ok(n) => info!(count = n, "requeued stalled emails"),
            Err(e) => warn!(error = %e, "failed to requeue stalled emails"),
        }
        let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match email.process_outbox().await {
                Ok(run) if run.attempted() > 0 => info!(
                    sent = run.sent,
                    retrying = run.retrying,
                    failed = run.failed,
                    "outbox processed"
                ),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "outbox run failed"),
            }
        }
    })
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

// ============================================
// Templates
// ============================================

pub fn verification_email(
    user_id: i64,
    to: &str,
    name: Option<&str>,
    token: &str,
) -> OutgoingEmail {
    let greeting = name.filter(|n| !n.trim().is_empty()).unwrap_or("there");
    let body = format!(
        "Dear {},\n\n\
         Welcome to Scholar Finder. Please confirm your email address with the following verification token:\n\n\
         {}\n\n\
         You can verify at /api/auth/verify-email?token={}\n\n\
         Best regards,\n\
         Scholar Finder Support Team",
        greeting, token, token
    );
    OutgoingEmail {
        recipient_email: to.to_string(),
        recipient_name: name.map(str::to_string),
        subject: "Verify your email - Scholar Finder".to_string(),
        body,
        notification_type: "EMAIL_VERIFICATION".to_string(),
        reference_id: Some(user_id),
        reference_type: Some(USER_REFERENCE.to_string()),
    }
}

pub fn contact_confirmation(message: &ContactMessage, support_email: &str) -> OutgoingEmail {
    let body = format!(
        "Dear {},\n\n\
         Thank you for contacting Scholar Finder. We have received your message regarding:\n\n\
         \"{}\"\n\n\
         Our support team will review your inquiry and get back to you within 24-48 hours.\n\n\
         Your reference number is: #{}\n\n\
         If you have any urgent matters, please don't hesitate to reach out to us at {}.\n\n\
         Best regards,\n\
         Scholar Finder Support Team",
        message.first_name, message.subject, message.id, support_email
    );
    OutgoingEmail {
        recipient_email: message.email.clone(),
        recipient_name: Some(message.first_name.clone()),
        subject: "We received your message - Scholar Finder".to_string(),
        body,
        notification_type: "CONTACT_CONFIRMATION".to_string(),
        reference_id: Some(message.id),
        reference_type: Some(CONTACT_REFERENCE.to_string()),
    }
}

pub fn contact_admin_notification(message: &ContactMessage, admin_email: &str) -> OutgoingEmail {
    let sender = message.full_name();
    let body = format!(
        "New contact form submission received:\n\n\
         Reference: #{}\n\
         From: {} <{}>\n\
         Subject: {}\n\n\
         Message:\n{}\n\n\
         ---\n\
         Please log in to the admin portal to respond to this message.",
        message.id, sender, message.email, message.subject, message.message
    );
    OutgoingEmail {
        recipient_email: admin_email.to_string(),
        recipient_name: Some("Admin".to_string()),
        subject: format!("[Contact Form] New message from {}", sender),
        body,
        notification_type: "CONTACT_ADMIN_NOTIFICATION".to_string(),
        reference_id: Some(message.id),
        reference_type: Some(CONTACT_REFERENCE.to_string()),
    }
}

pub fn contact_response(message: &ContactMessage) -> OutgoingEmail {
    let response = message.response.as_deref().unwrap_or_default();
    let body = format!(
        "Dear {},\n\n\
         Thank you for contacting Scholar Finder. Here is our response to your inquiry:\n\n\
         ---\n{}\n---\n\n\
         Reference number: #{}\n\n\
         If you have any further questions, please feel free to reply to this email.\n\n\
         Best regards,\n\
         Scholar Finder Support Team",
        message.first_name, response, message.id
    );
    OutgoingEmail {
        recipient_email: message.email.clone(),
        recipient_name: Some(message.first_name.clone()),
        subject: format!("Re: {} - Scholar Finder", message.subject),
        body,
        notification_type: "CONTACT_RESPONSE".to_string(),
        reference_id: Some(message.id),
        reference_type: Some(CONTACT_REFERENCE.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContactCategory, ContactPriority, ContactStatus};

    fn message() -> ContactMessage {
        let now = Utc::now();
        ContactMessage {
            id: 42,
            first_name: "Nimali".into(),
            last_name: "Perera".into(),
            email: "nimali@example.lk".into(),
            phone: None,
            subject: "Visa question".into(),
            message: "How long does the visa take?".into(),
            category: ContactCategory::General,
            status: ContactStatus::New,
            priority: ContactPriority::Normal,
            assigned_to: None,
            admin_notes: None,
            response: Some("About six weeks.".into()),
            responded_at: None,
            responded_by: None,
            ip_address: None,
            user_agent: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_contact_confirmation_template() {
        let email = contact_confirmation(&message(), "help@example.lk");
        assert_eq!(email.subject, "We received your message - Scholar Finder");
        assert_eq!(email.recipient_email, "nimali@example.lk");
        assert!(email.body.contains("Your reference number is: #42"));
        assert!(email.body.contains("24-48 hours"));
        assert!(email.body.contains("help@example.lk"));
        assert!(email.body.contains("\"Visa question\""));
    }

    #[test]
    fn test_admin_notification_template() {
        let email = contact_admin_notification(&message(), "ops@example.lk");
        assert_eq!(email.subject, "[Contact Form] New message from Nimali Perera");
        assert_eq!(email.recipient_email, "ops@example.lk");
        assert!(email.body.contains("From: Nimali Perera <nimali@example.lk>"));
    }

    #[test]
    fn test_response_template() {
        let email = contact_response(&message());
        assert_eq!(email.subject, "Re: Visa question - Scholar Finder");
        assert!(email.body.contains("---\nAbout six weeks.\n---"));
        assert_eq!(email.reference_type.as_deref(), Some(CONTACT_REFERENCE));
    }

    fn service_with(storage: &Arc<Storage>, config: MailConfig) -> Arc<EmailService> {
        Arc::new(EmailService::new(storage.clone(), config).unwrap())
    }

    fn unreachable(max_retries: u32) -> MailConfig {
        MailConfig {
            slack_webhook_url: Some("http://127.0.0.1:1/hook".into()),
            max_retries,
            ..MailConfig::default()
        }
    }

    #[tokio::test]
    async fn test_dispatch_without_channel_marks_sent() {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        let service = service_with(&storage, MailConfig::default());
        let row = service
            .dispatch(verification_email(7, "kasun@example.lk", Some("Kasun"), "tok-123"))
            .unwrap();
        assert_eq!(row.status, EmailStatus::Pending);

        let mut stored = storage.emails_for_reference(USER_REFERENCE, 7).unwrap();
        for _ in 0..50 {
            if stored[0].status == EmailStatus::Sent {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            stored = storage.emails_for_reference(USER_REFERENCE, 7).unwrap();
        }
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status, EmailStatus::Sent);
        assert!(stored[0].sent_at.is_some());
        assert!(stored[0].body.contains("tok-123"));
    }

    #[test]
    fn test_dispatch_outside_runtime_leaves_row_pending() {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        let service = service_with(&storage, MailConfig::default());
        let row = service.dispatch(contact_response(&message())).unwrap();
        assert_eq!(row.status, EmailStatus::Pending);
        assert_eq!(row.max_retries, 3);
        assert_eq!(storage.deliverable_emails(10).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_delivery_is_retried_by_worker() {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        let failing = service_with(&storage, unreachable(3));
        let row = failing.enqueue(contact_response(&message())).unwrap();

        let run = failing.process_outbox().await.unwrap();
        assert_eq!(run, OutboxRun { sent: 0, retrying: 1, failed: 0 });
        let retry = storage.emails_by_status(EmailStatus::Retry).unwrap();
        assert_eq!(retry[0].id, row.id);
        assert_eq!(retry[0].retry_count, 1);
        assert!(retry[0].error_message.is_some());

        // the channel comes back
        let healthy = service_with(&storage, MailConfig::default());
        let run = healthy.process_outbox().await.unwrap();
        assert_eq!(run.sent, 1);
        let sent = storage.emails_by_status(EmailStatus::Sent).unwrap();
        assert_eq!(sent[0].id, row.id);
        assert_eq!(sent[0].retry_count, 1);
    }

    #[tokio::test]
    async fn test_retries_stop_at_max() {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        let service = service_with(&storage, unreachable(2));
        service.enqueue(contact_response(&message())).unwrap();

        assert_eq!(service.process_outbox().await.unwrap().retrying, 1);
        assert_eq!(service.process_outbox().await.unwrap().failed, 1);
        assert_eq!(service.process_outbox().await.unwrap().attempted(), 0);

        let failed = storage.emails_by_status(EmailStatus::Failed).unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].retry_count, 2);
    }

    #[tokio::test]
    async fn test_slack_failure_still_posts_to_discord() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = axum::Router::new().route(
            "/discord",
            axum::routing::post(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    axum::http::StatusCode::NO_CONTENT
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let storage = Arc::new(Storage::open_in_memory().unwrap());
        let config = MailConfig {
            discord_webhook_url: Some(format!("http://{}/discord", addr)),
            ..unreachable(3)
        };
        let service = service_with(&storage, config);
        let row = service.enqueue(contact_response(&message())).unwrap();

        assert_eq!(service.attempt(row.id).await.unwrap(), Some(EmailStatus::Retry));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        let stored = storage.emails_by_status(EmailStatus::Retry).unwrap();
        assert!(stored[0].error_message.as_deref().is_some_and(|e| !e.is_empty()));
    }
}
