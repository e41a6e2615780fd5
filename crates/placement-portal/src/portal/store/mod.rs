//! Persistence boundary for portal entities.
//!
//! Stores enforce uniqueness, referential integrity, and compare-and-set status updates. They do
//! not perform capability checks; the service layer authorizes every call before it gets here.

mod memory;
mod sqlite;

use chrono::{DateTime, Utc};

use super::domain::{
    Application, ApplicationId, ApplicationStatus, DelegatedLink, Identity, Job, JobId, JobStatus,
    NewApplication, NewJob, NewRecruiter, NewStudent, Recruiter, RecruiterId, Student, StudentId,
};
use super::identity::Provider;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Which postings to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobFilter {
    All,
    Open,
    PostedBy(RecruiterId),
}

impl JobFilter {
    pub(crate) fn matches(&self, job: &Job) -> bool {
        match self {
            JobFilter::All => true,
            JobFilter::Open => job.status == JobStatus::Open,
            JobFilter::PostedBy(recruiter) => job.recruiter_id == *recruiter,
        }
    }
}

/// Which applications to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationFilter {
    ForJob(JobId),
    ForStudent(StudentId),
    /// Every application on any job the recruiter owns.
    ForRecruiter(RecruiterId),
}

/// Storage abstraction shared by the in-memory and SQLite backends.
pub trait EntityStore: Send + Sync {
    /// Fails with `DuplicateKey` if the email belongs to any student or recruiter.
    fn insert_student(&self, student: NewStudent) -> Result<Student, StoreError>;
    fn student(&self, id: StudentId) -> Result<Student, StoreError>;
    fn update_student(&self, student: &Student) -> Result<(), StoreError>;

    fn insert_recruiter(&self, recruiter: NewRecruiter) -> Result<Recruiter, StoreError>;
    fn recruiter(&self, id: RecruiterId) -> Result<Recruiter, StoreError>;
    fn update_recruiter(&self, recruiter: &Recruiter) -> Result<(), StoreError>;

    /// Looks the email up across both account namespaces.
    fn identity_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError>;

    fn student_by_email(&self, email: &str) -> Result<Option<Student>, StoreError> {
        Ok(match self.identity_by_email(email)? {
            Some(Identity::Student(student)) => Some(student),
            _ => None,
        })
    }

    fn recruiter_by_email(&self, email: &str) -> Result<Option<Recruiter>, StoreError> {
        Ok(match self.identity_by_email(email)? {
            Some(Identity::Recruiter(recruiter)) => Some(recruiter),
            _ => None,
        })
    }

    /// Creates a provider-only student and links `(provider, subject)` to it in one write.
    /// Nothing is stored when either the email or the link is already taken.
    fn insert_delegated_student(
        &self,
        student: NewStudent,
        provider: Provider,
        subject: &str,
    ) -> Result<Student, StoreError>;

    fn link_delegated(&self, link: &DelegatedLink) -> Result<(), StoreError>;
    fn delegated_student(
        &self,
        provider: Provider,
        subject: &str,
    ) -> Result<Option<StudentId>, StoreError>;

    fn insert_job(&self, job: NewJob) -> Result<Job, StoreError>;
    fn job(&self, id: JobId) -> Result<Job, StoreError>;
    /// Replaces the descriptive fields; status changes go through the compare-and-set call.
    fn update_job(&self, job: &Job) -> Result<(), StoreError>;
    /// Removes the posting together with its applications.
    fn delete_job(&self, id: JobId) -> Result<(), StoreError>;
    fn jobs(&self, filter: JobFilter) -> Result<Vec<Job>, StoreError>;
    /// Returns `false` without writing when the stored status is not `expected`.
    fn compare_and_set_job_status(
        &self,
        id: JobId,
        expected: JobStatus,
        next: JobStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Fails with `DuplicateKey` for an existing (student, job) pair and `JobClosed` when the
    /// posting no longer accepts applications.
    fn insert_application(&self, application: NewApplication) -> Result<Application, StoreError>;
    fn application(&self, id: ApplicationId) -> Result<Application, StoreError>;
    fn applications(&self, filter: ApplicationFilter) -> Result<Vec<Application>, StoreError>;

    fn applications_for_job(&self, job: JobId) -> Result<Vec<Application>, StoreError> {
        self.applications(ApplicationFilter::ForJob(job))
    }

    fn applications_for_student(&self, student: StudentId) -> Result<Vec<Application>, StoreError> {
        self.applications(ApplicationFilter::ForStudent(student))
    }

    fn applications_for_recruiter(
        &self,
        recruiter: RecruiterId,
    ) -> Result<Vec<Application>, StoreError> {
        self.applications(ApplicationFilter::ForRecruiter(recruiter))
    }

    fn compare_and_set_application_status(
        &self,
        id: ApplicationId,
        expected: ApplicationStatus,
        next: ApplicationStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} with {key} already exists")]
    DuplicateKey { entity: &'static str, key: String },
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("job {0} is closed to new applications")]
    JobClosed(JobId),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub(crate) fn duplicate(entity: &'static str, key: impl Into<String>) -> Self {
        Self::DuplicateKey {
            entity,
            key: key.into(),
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
