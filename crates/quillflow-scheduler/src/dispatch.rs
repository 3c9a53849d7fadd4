//! Notification dispatch: sends queued messages to the configured sink.
//! Supports: tracing log, HTTP webhook (JSON POST), SMTP (async lettre).
//!
//! Delivery is best effort. A failed send is logged and recorded; it never
//! reaches back into the transition that produced the message.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use quillflow_core::config::NotifyConfig;
use quillflow_core::error::{QuillflowError, Result};
use quillflow_core::locks::lock;
use quillflow_core::message::Message;
use quillflow_core::traits::{IdentityOracle, Notifier};

use crate::notify::{DeliveryStatus, NotifyRouter};
use crate::persistence::SchedulerDb;

/// Writes messages to the log instead of sending them.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, message: &Message) -> Result<()> {
        let to: Vec<&str> = message.recipients.iter().map(String::as_str).collect();
        tracing::info!("📨 [{}] {} → {}", message.key, message.subject, to.join(", "));
        Ok(())
    }
}

/// Generic HTTP webhook, POST with a JSON body.
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, message: &Message) -> Result<()> {
        let resp = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({
                "key": message.key,
                "recipients": message.recipients,
                "subject": message.subject,
                "body": message.body,
                "reply_to": message.reply_to,
                "paper_id": message.paper_id,
                "created_at": message.created_at.to_rfc3339(),
            }))
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| QuillflowError::Notify(format!("Webhook send failed: {e}")))?;

        if resp.status().is_success() {
            tracing::info!("✅ Webhook notification sent to {}: {}", self.url, message.subject);
            Ok(())
        } else {
            let status = resp.status();
            Err(QuillflowError::Notify(format!("Webhook error {status}")))
        }
    }
}

/// SMTP delivery. Profile ids are turned into addresses through the
/// identity oracle; recipients without one are skipped.
pub struct SmtpNotifier {
    host: String,
    port: u16,
    user: String,
    password: String,
    from: String,
    oracle: Arc<dyn IdentityOracle>,
}

impl SmtpNotifier {
    pub fn new(config: &NotifyConfig, oracle: Arc<dyn IdentityOracle>) -> Self {
        Self {
            host: config.smtp_host.clone(),
            port: config.smtp_port,
            user: config.smtp_user.clone(),
            password: config.smtp_password.clone(),
            from: config.from_address.clone(),
            oracle,
        }
    }

    fn address(&self, recipient: &str) -> Option<String> {
        if recipient.contains('@') {
            Some(recipient.to_string())
        } else {
            self.oracle.preferred_email(recipient)
        }
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn send(&self, message: &Message) -> Result<()> {
        use lettre::{
            AsyncSmtpTransport, AsyncTransport, Message as LettreMessage, message::Mailbox,
            message::header::ContentType, transport::smtp::authentication::Credentials,
        };

        let from: Mailbox = self
            .from
            .parse()
            .map_err(|e| QuillflowError::Notify(format!("Invalid from: {e}")))?;
        let reply_to: Option<Mailbox> = match &message.reply_to {
            Some(r) => Some(
                r.parse()
                    .map_err(|e| QuillflowError::Notify(format!("Invalid reply-to: {e}")))?,
            ),
            None => None,
        };

        let creds = Credentials::new(self.user.clone(), self.password.clone());
        let mailer = AsyncSmtpTransport::<lettre::Tokio1Executor>::starttls_relay(&self.host)
            .map_err(|e| QuillflowError::Notify(format!("SMTP relay: {e}")))?
            .port(self.port)
            .credentials(creds)
            .build();

        for recipient in &message.recipients {
            let Some(address) = self.address(recipient) else {
                tracing::warn!("⚠️ No email address for {recipient}, skipping");
                continue;
            };
            let to: Mailbox = address
                .parse()
                .map_err(|e| QuillflowError::Notify(format!("Invalid to: {e}")))?;

            let mut builder = LettreMessage::builder()
                .from(from.clone())
                .to(to)
                .subject(&message.subject)
                .header(ContentType::TEXT_PLAIN);
            if let Some(r) = &reply_to {
                builder = builder.reply_to(r.clone());
            }
            let email = builder
                .body(message.body.clone())
                .map_err(|e| QuillflowError::Notify(format!("Build email: {e}")))?;

            mailer
                .send(email)
                .await
                .map_err(|e| QuillflowError::Notify(format!("SMTP send: {e}")))?;
        }
        tracing::info!("📧 Email sent: {}", message.subject);
        Ok(())
    }
}

/// Build the notifier named by `notify.sink`.
pub fn notifier_from_config(config: &NotifyConfig, oracle: Arc<dyn IdentityOracle>) -> Result<Arc<dyn Notifier>> {
    match config.sink.as_str() {
        "log" => Ok(Arc::new(LogNotifier)),
        "webhook" if config.webhook_url.is_empty() => Err(QuillflowError::Config(
            "notify.sink = \"webhook\" needs notify.webhook_url".into(),
        )),
        "webhook" => Ok(Arc::new(WebhookNotifier::new(config.webhook_url.clone()))),
        "smtp" if config.smtp_host.is_empty() => Err(QuillflowError::Config(
            "notify.sink = \"smtp\" needs notify.smtp_host".into(),
        )),
        "smtp" => Ok(Arc::new(SmtpNotifier::new(config, oracle))),
        other => Err(QuillflowError::Config(format!("Unknown notify sink: {other}"))),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub sent: usize,
    pub failed: usize,
}

/// Send everything waiting in the outbox once.
pub async fn dispatch_pending(
    router: &Mutex<NotifyRouter>,
    notifier: &dyn Notifier,
    db: Option<&SchedulerDb>,
) -> DispatchStats {
    let pending = lock(router).take_pending();
    let mut stats = DispatchStats::default();

    for mut n in pending {
        n.attempts += 1;
        match notifier.send(&n.message).await {
            Ok(()) => {
                n.status = DeliveryStatus::Sent;
                stats.sent += 1;
            }
            Err(e) => {
                tracing::warn!("❌ Delivery of {} via {} failed: {e}", n.message.key, notifier.name());
                n.status = DeliveryStatus::Failed(e.to_string());
                stats.failed += 1;
            }
        }
        n.updated_at = chrono::Utc::now();
        if let Some(db) = db {
            if let Err(e) = db.save_notification(&n) {
                tracing::warn!("Failed to persist notification {}: {e}", n.message.key);
            }
        }
        lock(router).record(n);
    }
    stats
}

/// Spawn the dispatcher loop as a background tokio task.
pub fn spawn_dispatcher(
    router: Arc<Mutex<NotifyRouter>>,
    notifier: Arc<dyn Notifier>,
    db: Option<Arc<SchedulerDb>>,
    interval_secs: u64,
) -> tokio::task::JoinHandle<()> {
    tracing::info!(
        "📮 Dispatcher started via {} (drain every {}s)",
        notifier.name(),
        interval_secs
    );
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        loop {
            interval.tick().await;
            let stats = dispatch_pending(&router, notifier.as_ref(), db.as_deref()).await;
            if stats.sent + stats.failed > 0 {
                tracing::debug!("📮 Dispatched {} message(s), {} failed", stats.sent, stats.failed);
            }
        }
    })
}
