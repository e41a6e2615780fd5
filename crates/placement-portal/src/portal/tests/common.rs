use std::sync::{Arc, Mutex};

use axum::http::StatusCode;
use axum::response::Response;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde_json::Value;
use tempfile::TempDir;

use crate::portal::domain::{
    Application, ApplicationId, ApplicationStatus, Credential, DelegatedLink, Identity, Job, JobId,
    JobStatus, NewApplication, NewJob, NewRecruiter, NewStudent, Recruiter, RecruiterId,
    RecruiterProfile, Student, StudentId, StudentProfile,
};
use crate::portal::forms::{JobPosting, RecruiterRegistration, StudentRegistration};
use crate::portal::identity::{Capability, CredentialHasher, Provider, SessionSigner};
use crate::portal::notify::{MailMessage, Notifier, NotifyError};
use crate::portal::resume::FsResumeStorage;
use crate::portal::store::{ApplicationFilter, EntityStore, JobFilter, MemoryStore, StoreError};
use crate::portal::{portal_router, PortalService};

pub(super) const PASSWORD: &str = "correct horse";

/// Service plus handles on its collaborators; the upload directory lives as long as this does.
pub(super) struct Harness<S: ?Sized, N: ?Sized> {
    pub(super) service: Arc<PortalService<S, N>>,
    pub(super) store: Arc<S>,
    pub(super) notifier: Arc<N>,
    _uploads: TempDir,
}

pub(super) fn build_service() -> Harness<MemoryStore, RecordingNotifier> {
    build_service_with(
        Arc::new(MemoryStore::new()),
        Arc::new(RecordingNotifier::default()),
    )
}

pub(super) fn build_service_with<S, N>(store: Arc<S>, notifier: Arc<N>) -> Harness<S, N>
where
    S: EntityStore + ?Sized,
    N: Notifier + ?Sized,
{
    let uploads = tempfile::tempdir().expect("temp dir");
    let service = PortalService::new(
        store.clone(),
        notifier.clone(),
        SessionSigner::new("test-secret", Duration::hours(1)),
        Arc::new(FsResumeStorage::new(uploads.path().join("resumes"))),
    )
    .with_hasher(CredentialHasher::with_cost(64, 1).expect("cheap hasher"));
    Harness {
        service: Arc::new(service),
        store,
        notifier,
        _uploads: uploads,
    }
}

pub(super) fn router_with<S, N>(harness: &Harness<S, N>) -> axum::Router
where
    S: EntityStore + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    portal_router(harness.service.clone())
}

pub(super) fn student_registration(email: &str, name: &str) -> StudentRegistration {
    StudentRegistration {
        email: email.to_string(),
        password: PASSWORD.to_string(),
        name: name.to_string(),
        city: Some("Pune".to_string()),
        job_preference: Some("Backend".to_string()),
        skills: vec!["Go".to_string(), "SQL".to_string()],
    }
}

pub(super) fn recruiter_registration(email: &str, company: &str) -> RecruiterRegistration {
    RecruiterRegistration {
        email: email.to_string(),
        password: PASSWORD.to_string(),
        name: "Ravi Menon".to_string(),
        company: company.to_string(),
        city: None,
    }
}

pub(super) fn job_posting(title: &str, interview_date: Option<NaiveDate>) -> JobPosting {
    JobPosting {
        title: title.to_string(),
        company: None,
        description: "Build and operate placement services".to_string(),
        location: "Bengaluru".to_string(),
        job_type: Some("Full-time".to_string()),
        salary: Some("12 LPA".to_string()),
        interview_date,
        interview_time: Some("10:00".to_string()),
        interview_place: Some("Seminar Hall B".to_string()),
    }
}

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn signed_in_student<S, N>(
    service: &PortalService<S, N>,
    email: &str,
    name: &str,
) -> Capability
where
    S: EntityStore + ?Sized,
    N: Notifier + ?Sized,
{
    let session = service
        .register_student(student_registration(email, name))
        .expect("student registers");
    service
        .authenticate(&session.token)
        .expect("fresh session verifies")
}

pub(super) fn signed_in_recruiter<S, N>(
    service: &PortalService<S, N>,
    email: &str,
    company: &str,
) -> Capability
where
    S: EntityStore + ?Sized,
    N: Notifier + ?Sized,
{
    let session = service
        .register_recruiter(recruiter_registration(email, company))
        .expect("recruiter registers");
    service
        .authenticate(&session.token)
        .expect("fresh session verifies")
}

pub(super) fn new_student(email: &str) -> NewStudent {
    NewStudent {
        email: email.to_string(),
        credential: Credential::Password {
            hash: "$argon2id$stub".to_string(),
        },
        profile: StudentProfile {
            name: "Asha".to_string(),
            skills: vec!["Go".to_string()],
            ..Default::default()
        },
    }
}

pub(super) fn new_recruiter(email: &str) -> NewRecruiter {
    NewRecruiter {
        email: email.to_string(),
        credential: Credential::Delegated,
        profile: RecruiterProfile {
            name: "Ravi".to_string(),
            company: "Acme".to_string(),
            ..Default::default()
        },
    }
}

pub(super) fn new_job(recruiter_id: RecruiterId, interview_date: Option<NaiveDate>) -> NewJob {
    NewJob {
        recruiter_id,
        details: job_posting("Backend Engineer", interview_date)
            .validate("Acme")
            .expect("valid posting"),
    }
}

#[derive(Default)]
pub(super) struct RecordingNotifier {
    messages: Mutex<Vec<MailMessage>>,
}

impl RecordingNotifier {
    pub(super) fn messages(&self) -> Vec<MailMessage> {
        self.messages
            .lock()
            .expect("notifier mutex poisoned")
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn enqueue(&self, message: MailMessage) -> Result<(), NotifyError> {
        self.messages
            .lock()
            .expect("notifier mutex poisoned")
            .push(message);
        Ok(())
    }
}

pub(super) struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn enqueue(&self, _message: MailMessage) -> Result<(), NotifyError> {
        Err(NotifyError::QueueClosed)
    }
}

pub(super) struct UnavailableStore;

fn offline<T>() -> Result<T, StoreError> {
    Err(StoreError::Unavailable("database offline".to_string()))
}

impl EntityStore for UnavailableStore {
    fn insert_student(&self, _student: NewStudent) -> Result<Student, StoreError> {
        offline()
    }

    fn student(&self, _id: StudentId) -> Result<Student, StoreError> {
        offline()
    }

    fn update_student(&self, _student: &Student) -> Result<(), StoreError> {
        offline()
    }

    fn insert_recruiter(&self, _recruiter: NewRecruiter) -> Result<Recruiter, StoreError> {
        offline()
    }

    fn recruiter(&self, _id: RecruiterId) -> Result<Recruiter, StoreError> {
        offline()
    }

    fn update_recruiter(&self, _recruiter: &Recruiter) -> Result<(), StoreError> {
        offline()
    }

    fn identity_by_email(&self, _email: &str) -> Result<Option<Identity>, StoreError> {
        offline()
    }

    fn insert_delegated_student(
        &self,
        _student: NewStudent,
        _provider: Provider,
        _subject: &str,
    ) -> Result<Student, StoreError> {
        offline()
    }

    fn link_delegated(&self, _link: &DelegatedLink) -> Result<(), StoreError> {
        offline()
    }

    fn delegated_student(
        &self,
        _provider: Provider,
        _subject: &str,
    ) -> Result<Option<StudentId>, StoreError> {
        offline()
    }

    fn insert_job(&self, _job: NewJob) -> Result<Job, StoreError> {
        offline()
    }

    fn job(&self, _id: JobId) -> Result<Job, StoreError> {
        offline()
    }

    fn update_job(&self, _job: &Job) -> Result<(), StoreError> {
        offline()
    }

    fn delete_job(&self, _id: JobId) -> Result<(), StoreError> {
        offline()
    }

    fn jobs(&self, _filter: JobFilter) -> Result<Vec<Job>, StoreError> {
        offline()
    }

    fn compare_and_set_job_status(
        &self,
        _id: JobId,
        _expected: JobStatus,
        _next: JobStatus,
        _at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        offline()
    }

    fn insert_application(&self, _application: NewApplication) -> Result<Application, StoreError> {
        offline()
    }

    fn application(&self, _id: ApplicationId) -> Result<Application, StoreError> {
        offline()
    }

    fn applications(&self, _filter: ApplicationFilter) -> Result<Vec<Application>, StoreError> {
        offline()
    }

    fn compare_and_set_application_status(
        &self,
        _id: ApplicationId,
        _expected: ApplicationStatus,
        _next: ApplicationStatus,
        _at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        offline()
    }
}

pub(super) fn assert_conflict_response(response: Response) {
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
