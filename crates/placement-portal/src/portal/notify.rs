//! Best-effort email notifications for application events.
//!
//! Messages are queued on an unbounded channel and delivered by a background worker. Nothing
//! is persisted, so anything still queued when the process exits is dropped.

use std::sync::Arc;

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::domain::{Job, Recruiter, Student};

/// Plain-text email addressed to a single recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("invalid mail address '{address}': {reason}")]
    Address { address: String, reason: String },
    #[error("unable to build message: {0}")]
    Build(String),
    #[error("mail transport unavailable: {0}")]
    Transport(String),
    #[error("notification queue is closed")]
    QueueClosed,
}

/// Synchronous delivery of one message.
pub trait MailTransport: Send + Sync {
    fn send(&self, message: &MailMessage) -> Result<(), NotifyError>;
}

/// Hands messages off for delivery without waiting on the outcome.
pub trait Notifier: Send + Sync {
    fn enqueue(&self, message: MailMessage) -> Result<(), NotifyError>;
}

/// Relays mail through an SMTP server over TLS.
pub struct SmtpMailer {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(
        host: &str,
        credentials: Option<(String, String)>,
        from: &str,
    ) -> Result<Self, NotifyError> {
        let mut builder =
            SmtpTransport::relay(host).map_err(|err| NotifyError::Transport(err.to_string()))?;
        if let Some((user, password)) = credentials {
            builder = builder.credentials(Credentials::new(user, password));
        }
        Ok(Self {
            transport: builder.build(),
            from: parse_mailbox(from)?,
        })
    }
}

impl std::fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer")
            .field("from", &self.from.to_string())
            .finish_non_exhaustive()
    }
}

impl MailTransport for SmtpMailer {
    fn send(&self, message: &MailMessage) -> Result<(), NotifyError> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(&message.to)?)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .map_err(|err| NotifyError::Build(err.to_string()))?;

        self.transport
            .send(&email)
            .map(|_| ())
            .map_err(|err| NotifyError::Transport(err.to_string()))
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address.parse().map_err(|err: lettre::address::AddressError| {
        NotifyError::Address {
            address: address.to_string(),
            reason: err.to_string(),
        }
    })
}

/// Writes messages to the log instead of sending them; used when SMTP is not configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

impl MailTransport for LogTransport {
    fn send(&self, message: &MailMessage) -> Result<(), NotifyError> {
        info!(
            recipient = %message.to,
            subject = %message.subject,
            "mail delivery skipped (log transport)"
        );
        Ok(())
    }
}

/// Channel-backed notifier drained by a tokio worker task.
#[derive(Debug, Clone)]
pub struct QueuedNotifier {
    sender: mpsc::UnboundedSender<MailMessage>,
}

impl QueuedNotifier {
    /// Starts the delivery worker on the current runtime.
    ///
    /// The worker exits once every notifier clone has been dropped and the queue is empty.
    pub fn spawn(transport: Arc<dyn MailTransport>) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = tokio::spawn(deliver(receiver, transport));
        (Self { sender }, worker)
    }
}

impl Notifier for QueuedNotifier {
    fn enqueue(&self, message: MailMessage) -> Result<(), NotifyError> {
        self.sender
            .send(message)
            .map_err(|_| NotifyError::QueueClosed)
    }
}

async fn deliver(
    mut receiver: mpsc::UnboundedReceiver<MailMessage>,
    transport: Arc<dyn MailTransport>,
) {
    while let Some(message) = receiver.recv().await {
        let recipient = message.to.clone();
        let transport = Arc::clone(&transport);
        match tokio::task::spawn_blocking(move || transport.send(&message)).await {
            Ok(Ok(())) => debug!(%recipient, "notification delivered"),
            Ok(Err(err)) => warn!(%recipient, error = %err, "notification delivery failed"),
            Err(err) => error!(%recipient, error = %err, "notification task failed"),
        }
    }
    debug!("notification queue drained");
}

/// Messages sent after a student applies: one to the posting's recruiter, one to the student.
pub fn application_notifications(
    student: &Student,
    recruiter: &Recruiter,
    job: &Job,
) -> [MailMessage; 2] {
    let details = &job.details;
    let recruiter_mail = MailMessage {
        to: recruiter.email.clone(),
        subject: format!("New application for {}", details.title),
        body: format!(
            "Hello {},\n\n{} ({}) has applied for {} at {}.\n",
            recruiter.profile.name,
            student.profile.name,
            student.email,
            details.title,
            details.company
        ),
    };

    let mut body = format!(
        "Hello {},\n\nYour application for {} at {} has been received.\n",
        student.profile.name, details.title, details.company
    );
    let schedule = [
        ("Interview date", details.interview_date.map(|date| date.to_string())),
        ("Interview time", details.interview_time.clone()),
        ("Interview place", details.interview_place.clone()),
    ];
    for (label, value) in schedule {
        if let Some(value) = value {
            body.push_str(&format!("{label}: {value}\n"));
        }
    }
    let student_mail = MailMessage {
        to: student.email.clone(),
        subject: format!("Application received: {}", details.title),
        body,
    };

    [recruiter_mail, student_mail]
}
