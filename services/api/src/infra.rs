use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use placement_portal::config::AppConfig;
use placement_portal::error::AppError;
use placement_portal::portal::{
    EntityStore, FsResumeStorage, LogTransport, MailTransport, MemoryStore, PortalService,
    QueuedNotifier, SessionSigner, SmtpMailer, SqliteStore,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Service type the binary runs: the store backend is picked from configuration.
pub(crate) type Portal = PortalService<dyn EntityStore, QueuedNotifier>;

/// Wires the store, mail worker, and resume directory described by `config`.
///
/// Must be called inside a tokio runtime; the returned handle completes once the service (and
/// with it the notifier) is dropped and the mail queue has drained.
pub(crate) fn build_portal(config: &AppConfig) -> Result<(Arc<Portal>, JoinHandle<()>), AppError> {
    let store: Arc<dyn EntityStore> = match &config.database.path {
        Some(path) => {
            info!(path = %path.display(), "opening sqlite store");
            Arc::new(SqliteStore::open(path)?)
        }
        None => {
            warn!("APP_DATABASE_PATH not set; data lives in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let transport: Arc<dyn MailTransport> = match &config.mail.smtp_host {
        Some(host) => Arc::new(SmtpMailer::new(
            host,
            config.mail.credentials(),
            &config.mail.from,
        )?),
        None => Arc::new(LogTransport),
    };
    let (notifier, worker) = QueuedNotifier::spawn(transport);

    let service = PortalService::new(
        store,
        Arc::new(notifier),
        SessionSigner::new(&config.session.secret, config.session.ttl()),
        Arc::new(FsResumeStorage::new(config.uploads.dir.clone())),
    );
    Ok((Arc::new(service), worker))
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
