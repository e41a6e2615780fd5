//! One-way status lifecycles for job postings and applications.

use chrono::NaiveDate;

use super::domain::{ApplicationStatus, Job, JobStatus};

/// Raised when a status change is not an edge of the lifecycle graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {entity} transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub entity: &'static str,
    pub from: &'static str,
    pub to: &'static str,
}

/// Status types with a fixed, forward-only transition graph.
pub trait Lifecycle: Copy + Eq {
    const ENTITY: &'static str;

    fn label(self) -> &'static str;

    fn permits(self, next: Self) -> bool;

    fn transition(self, next: Self) -> Result<Self, InvalidTransition> {
        if self.permits(next) {
            Ok(next)
        } else {
            Err(InvalidTransition::between(self, next))
        }
    }
}

impl InvalidTransition {
    pub fn between<L: Lifecycle>(from: L, to: L) -> Self {
        Self {
            entity: L::ENTITY,
            from: from.label(),
            to: to.label(),
        }
    }
}

impl Lifecycle for JobStatus {
    const ENTITY: &'static str = "job";

    fn label(self) -> &'static str {
        JobStatus::label(self)
    }

    fn permits(self, next: Self) -> bool {
        matches!((self, next), (JobStatus::Open, JobStatus::Closed))
    }
}

impl Lifecycle for ApplicationStatus {
    const ENTITY: &'static str = "application";

    fn label(self) -> &'static str {
        ApplicationStatus::label(self)
    }

    fn permits(self, next: Self) -> bool {
        matches!(
            (self, next),
            (ApplicationStatus::Submitted, ApplicationStatus::Reviewed)
        )
    }
}

/// New applications are only accepted while the posting is open.
pub fn ensure_accepting_applications(job: &Job) -> Result<(), InvalidTransition> {
    match job.status {
        JobStatus::Open => Ok(()),
        JobStatus::Closed => Err(posting_closed()),
    }
}

/// Rejection for an application against a closed posting.
pub fn posting_closed() -> InvalidTransition {
    InvalidTransition {
        entity: "application",
        from: "none",
        to: ApplicationStatus::Submitted.label(),
    }
}

/// Expiry policy: an open posting lapses once its interview date has passed.
pub fn is_expired(job: &Job, today: NaiveDate) -> bool {
    job.status == JobStatus::Open
        && job
            .details
            .interview_date
            .map(|date| date < today)
            .unwrap_or(false)
}
