//! One-shot operator commands that run against the configured store and exit.

use crate::infra::{build_portal, Portal};
use chrono::{Local, NaiveDate};
use clap::Args;
use placement_portal::config::AppConfig;
use placement_portal::error::AppError;
use placement_portal::portal::StudentId;
use placement_portal::telemetry;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(Args, Debug)]
pub(crate) struct ExpireJobsArgs {
    /// Date treated as today (YYYY-MM-DD); defaults to the local date
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

#[derive(Args, Debug)]
pub(crate) struct ExportProfileArgs {
    /// Student whose profile is rendered
    #[arg(long)]
    pub(crate) student_id: i64,
    /// Output path; defaults to the document's own filename in the working directory
    #[arg(long)]
    pub(crate) out: Option<PathBuf>,
}

async fn start() -> Result<(Arc<Portal>, JoinHandle<()>), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    build_portal(&config)
}

/// Drops the service so the mail worker sees a closed queue, then waits for it to drain.
async fn finish(service: Arc<Portal>, worker: JoinHandle<()>) {
    drop(service);
    if let Err(err) = worker.await {
        tracing::error!(error = %err, "notification worker failed");
    }
}

pub(crate) async fn run_expire_jobs(args: ExpireJobsArgs) -> Result<(), AppError> {
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let (service, worker) = start().await?;
    let expired = service.expire_jobs(today);
    finish(service, worker).await;

    let expired = expired?;
    println!("Expired {} job posting(s) as of {today}", expired.len());
    for job_id in expired {
        println!("  closed job {job_id}");
    }
    Ok(())
}

pub(crate) async fn run_export_profile(args: ExportProfileArgs) -> Result<(), AppError> {
    let (service, worker) = start().await?;
    let document = service.render_profile(StudentId(args.student_id));
    finish(service, worker).await;

    let document = document?;
    let path = args
        .out
        .unwrap_or_else(|| PathBuf::from(&document.filename));
    std::fs::write(&path, &document.bytes)?;
    println!(
        "Wrote {} ({}, {} bytes)",
        path.display(),
        document.content_type,
        document.bytes.len()
    );
    Ok(())
}
