use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use mime::Mime;
use serde::Serialize;
use tracing::{info, warn};

use super::domain::{
    Application, ApplicationId, ApplicationStatus, Credential, DelegatedLink, Identity, Job,
    JobId, JobStatus, NewApplication, NewJob, NewRecruiter, NewStudent, RecruiterId, RecruiterView,
    Student, StudentId, StudentProfile, StudentView,
};
use super::export::{
    DocumentRenderer, ExportError, PdfRenderer, ProfileDocument, RenderedDocument,
};
use super::forms::{
    normalize_email, ApplicationForm, JobPosting, LoginForm, RecruiterProfileUpdate,
    RecruiterRegistration, StudentProfileUpdate, StudentRegistration, ValidationError,
};
use super::identity::{
    Capability, CredentialHasher, IdentityError, IssuedSession, Principal, Provider,
    ProviderProfile, SessionSigner,
};
use super::notify::{application_notifications, Notifier};
use super::resume::{resume_key, ResumeError, ResumeStorage};
use super::store::{EntityStore, JobFilter, StoreError};
use super::workflow::{self, InvalidTransition, Lifecycle};

const BAD_CREDENTIALS: &str = "invalid email or password";

/// Portal operations: every call takes the caller's [`Capability`] unless it is public.
pub struct PortalService<S: ?Sized, N: ?Sized> {
    store: Arc<S>,
    notifier: Arc<N>,
    sessions: Arc<SessionSigner>,
    hasher: Arc<CredentialHasher>,
    resumes: Arc<dyn ResumeStorage>,
    renderer: Arc<dyn DocumentRenderer>,
}

/// An application together with the student who submitted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Applicant {
    pub application: Application,
    pub student: StudentView,
}

impl<S, N> PortalService<S, N>
where
    S: EntityStore + ?Sized,
    N: Notifier + ?Sized,
{
    pub fn new(
        store: Arc<S>,
        notifier: Arc<N>,
        sessions: SessionSigner,
        resumes: Arc<dyn ResumeStorage>,
    ) -> Self {
        Self {
            store,
            notifier,
            sessions: Arc::new(sessions),
            hasher: Arc::new(CredentialHasher::default()),
            resumes,
            renderer: Arc::new(PdfRenderer),
        }
    }

    pub fn with_hasher(mut self, hasher: CredentialHasher) -> Self {
        self.hasher = Arc::new(hasher);
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    // Accounts and sessions

    pub fn register_student(
        &self,
        form: StudentRegistration,
    ) -> Result<IssuedSession, PortalError> {
        let (email, profile) = form.validate()?;
        let hash = self.hasher.hash(&form.password)?;
        let student = self.store.insert_student(NewStudent {
            email,
            credential: Credential::Password { hash },
            profile,
        })?;
        info!(student_id = %student.id, "student registered");
        self.issue(Principal::Student(student.id))
    }

    pub fn register_recruiter(
        &self,
        form: RecruiterRegistration,
    ) -> Result<IssuedSession, PortalError> {
        let (email, profile) = form.validate()?;
        let hash = self.hasher.hash(&form.password)?;
        let recruiter = self.store.insert_recruiter(NewRecruiter {
            email,
            credential: Credential::Password { hash },
            profile,
        })?;
        info!(recruiter_id = %recruiter.id, "recruiter registered");
        self.issue(Principal::Recruiter(recruiter.id))
    }

    /// Password login; delegated-only and deactivated accounts are refused.
    pub fn login(&self, form: LoginForm) -> Result<IssuedSession, PortalError> {
        let email = normalize_email(&form.email)
            .map_err(|_| IdentityError::Unauthenticated(BAD_CREDENTIALS))?;
        let (principal, credential, active) = match self.store.identity_by_email(&email)? {
            Some(Identity::Student(student)) => (
                Principal::Student(student.id),
                student.credential,
                student.active,
            ),
            Some(Identity::Recruiter(recruiter)) => (
                Principal::Recruiter(recruiter.id),
                recruiter.credential,
                recruiter.active,
            ),
            None => return Err(IdentityError::Unauthenticated(BAD_CREDENTIALS).into()),
        };

        let hash = match credential {
            Credential::Password { hash } => hash,
            Credential::Delegated => {
                return Err(IdentityError::Unauthenticated(
                    "account signs in through an identity provider",
                )
                .into())
            }
        };
        if !self.hasher.verify(&form.password, &hash) {
            return Err(IdentityError::Unauthenticated(BAD_CREDENTIALS).into());
        }
        if !active {
            return Err(IdentityError::Unauthenticated("account is deactivated").into());
        }
        self.issue(principal)
    }

    /// Turns a bearer token into a capability for an account that is still active.
    pub fn authenticate(&self, token: &str) -> Result<Capability, PortalError> {
        let capability = self.sessions.verify(token, Utc::now())?;
        let active = match capability.principal() {
            Principal::Student(id) => self.store.student(id).map(|student| student.active),
            Principal::Recruiter(id) => self.store.recruiter(id).map(|recruiter| recruiter.active),
        };
        match active {
            Ok(true) => Ok(capability),
            Ok(false) => Err(IdentityError::Unauthenticated("account is deactivated").into()),
            Err(StoreError::NotFound { .. }) => {
                Err(IdentityError::Unauthenticated("account no longer exists").into())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Signs in through an identity provider, creating a student on first contact.
    ///
    /// A known `(provider, subject)` resolves to the student it is linked to. An unknown subject
    /// resolves by email to a provider-only student and is linked to it. An email held by a
    /// password account or a recruiter is refused with `AuthConflict`; a password student has to
    /// sign in and link the provider explicitly.
    pub fn oauth_callback(&self, profile: ProviderProfile) -> Result<IssuedSession, PortalError> {
        let identity = profile.normalize()?;
        let email = normalize_email(&identity.email)?;

        // Retried once when a concurrent callback claims the subject or email first.
        for _ in 0..2 {
            if let Some(student) = self.linked_student(identity.provider, &identity.subject)? {
                return self.issue(Principal::Student(student));
            }

            let written = match self.store.identity_by_email(&email)? {
                Some(Identity::Student(student))
                    if matches!(student.credential, Credential::Delegated) =>
                {
                    if !student.active {
                        return Err(IdentityError::Unauthenticated("account is deactivated").into());
                    }
                    self.store
                        .link_delegated(&DelegatedLink {
                            provider: identity.provider,
                            subject: identity.subject.clone(),
                            student_id: student.id,
                        })
                        .map(|()| student)
                }
                Some(_) => return Err(conflict(&email).into()),
                None => self.store.insert_delegated_student(
                    NewStudent {
                        email: email.clone(),
                        credential: Credential::Delegated,
                        profile: StudentProfile {
                            name: identity.display_name.clone(),
                            ..StudentProfile::default()
                        },
                    },
                    identity.provider,
                    &identity.subject,
                ),
            };

            match written {
                Ok(student) => {
                    info!(
                        student_id = %student.id,
                        provider = %identity.provider,
                        "provider bound on sign-in"
                    );
                    return self.issue(Principal::Student(student.id));
                }
                Err(StoreError::DuplicateKey { .. }) => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Err(conflict(&email).into())
    }

    /// Binds a provider identity to the signed-in student's account.
    pub fn link_delegated_identity(
        &self,
        capability: &Capability,
        profile: ProviderProfile,
    ) -> Result<StudentView, PortalError> {
        let student_id = capability.student()?;
        let identity = profile.normalize()?;
        match self.store.delegated_student(identity.provider, &identity.subject)? {
            Some(linked) if linked == student_id => {}
            Some(_) => {
                return Err(IdentityError::AuthConflict(format!(
                    "{} account is linked to another student",
                    identity.provider
                ))
                .into())
            }
            None => {
                self.store.link_delegated(&DelegatedLink {
                    provider: identity.provider,
                    subject: identity.subject,
                    student_id,
                })?;
                info!(student_id = %student_id, provider = %identity.provider, "provider linked");
            }
        }
        Ok(self.store.student(student_id)?.view())
    }

    // Student profile

    pub fn student_profile(&self, capability: &Capability) -> Result<StudentView, PortalError> {
        Ok(self.store.student(capability.student()?)?.view())
    }

    pub fn update_student_profile(
        &self,
        capability: &Capability,
        form: StudentProfileUpdate,
    ) -> Result<StudentView, PortalError> {
        let mut student = self.store.student(capability.student()?)?;
        let (email, profile) = form.validate(&student.profile)?;
        student.email = email;
        student.profile = profile;
        self.store.update_student(&student)?;
        Ok(self.store.student(student.id)?.view())
    }

    /// Soft-deactivates the caller's own account; the record is kept.
    pub fn deactivate_student(&self, capability: &Capability) -> Result<StudentView, PortalError> {
        let mut student = self.store.student(capability.student()?)?;
        student.active = false;
        self.store.update_student(&student)?;
        info!(student_id = %student.id, "student deactivated");
        Ok(self.store.student(student.id)?.view())
    }

    pub fn upload_resume(
        &self,
        capability: &Capability,
        filename: &str,
        bytes: &[u8],
    ) -> Result<StudentView, PortalError> {
        let mut student = self.store.student(capability.student()?)?;
        let key = resume_key(student.id, filename)?;
        self.resumes.store(&key, bytes)?;
        student.profile.resume = Some(key);
        self.store.update_student(&student)?;
        Ok(self.store.student(student.id)?.view())
    }

    pub fn resume(
        &self,
        capability: &Capability,
        student_id: StudentId,
    ) -> Result<RenderedDocument, PortalError> {
        let student = self.store.student(student_id)?;
        self.authorize_profile_access(capability, student_id)?;
        let key = student
            .profile
            .resume
            .ok_or_else(|| ResumeError::Missing(format!("student {student_id}")))?;
        let bytes = self.resumes.load(&key)?;
        Ok(RenderedDocument {
            content_type: resume_content_type(&key),
            filename: key,
            bytes,
        })
    }

    // Recruiter profile

    pub fn recruiter_profile(&self, capability: &Capability) -> Result<RecruiterView, PortalError> {
        Ok(self.store.recruiter(capability.recruiter()?)?.view())
    }

    pub fn update_recruiter_profile(
        &self,
        capability: &Capability,
        form: RecruiterProfileUpdate,
    ) -> Result<RecruiterView, PortalError> {
        let mut recruiter = self.store.recruiter(capability.recruiter()?)?;
        let (email, profile) = form.validate()?;
        recruiter.email = email;
        recruiter.profile = profile;
        self.store.update_recruiter(&recruiter)?;
        Ok(self.store.recruiter(recruiter.id)?.view())
    }

    pub fn deactivate_recruiter(
        &self,
        capability: &Capability,
    ) -> Result<RecruiterView, PortalError> {
        let mut recruiter = self.store.recruiter(capability.recruiter()?)?;
        recruiter.active = false;
        self.store.update_recruiter(&recruiter)?;
        info!(recruiter_id = %recruiter.id, "recruiter deactivated");
        Ok(self.store.recruiter(recruiter.id)?.view())
    }

    // Jobs

    pub fn post_job(&self, capability: &Capability, form: JobPosting) -> Result<Job, PortalError> {
        let recruiter = self.store.recruiter(capability.recruiter()?)?;
        let details = form.validate(&recruiter.profile.company)?;
        let job = self.store.insert_job(NewJob {
            recruiter_id: recruiter.id,
            details,
        })?;
        info!(job_id = %job.id, recruiter_id = %recruiter.id, "job posted");
        Ok(job)
    }

    /// Replaces the posting's details; an omitted company keeps the current one.
    pub fn update_job(
        &self,
        capability: &Capability,
        job_id: JobId,
        form: JobPosting,
    ) -> Result<Job, PortalError> {
        let mut job = self.owned_job(capability.recruiter()?, job_id)?;
        job.details = form.validate(&job.details.company)?;
        self.store.update_job(&job)?;
        Ok(self.store.job(job_id)?)
    }

    pub fn close_job(&self, capability: &Capability, job_id: JobId) -> Result<Job, PortalError> {
        let job = self.owned_job(capability.recruiter()?, job_id)?;
        job.status.transition(JobStatus::Closed)?;
        if !self.store.compare_and_set_job_status(
            job_id,
            JobStatus::Open,
            JobStatus::Closed,
            Utc::now(),
        )? {
            // Another close landed between the read and the write.
            return Err(InvalidTransition::between(JobStatus::Closed, JobStatus::Closed).into());
        }
        info!(job_id = %job_id, "job closed");
        Ok(self.store.job(job_id)?)
    }

    /// Deletes the posting and every application made to it.
    pub fn delete_job(&self, capability: &Capability, job_id: JobId) -> Result<(), PortalError> {
        self.owned_job(capability.recruiter()?, job_id)?;
        self.store.delete_job(job_id)?;
        info!(job_id = %job_id, "job deleted");
        Ok(())
    }

    pub fn job(&self, job_id: JobId) -> Result<Job, PortalError> {
        Ok(self.store.job(job_id)?)
    }

    pub fn open_jobs(&self) -> Result<Vec<Job>, PortalError> {
        Ok(self.store.jobs(JobFilter::Open)?)
    }

    pub fn recruiter_jobs(&self, capability: &Capability) -> Result<Vec<Job>, PortalError> {
        Ok(self.store.jobs(JobFilter::PostedBy(capability.recruiter()?))?)
    }

    /// Closes every open posting whose interview date is before `today`.
    pub fn expire_jobs(&self, today: NaiveDate) -> Result<Vec<JobId>, PortalError> {
        let now = Utc::now();
        let mut expired = Vec::new();
        for job in self.store.jobs(JobFilter::Open)? {
            if !workflow::is_expired(&job, today) {
                continue;
            }
            if self.store.compare_and_set_job_status(
                job.id,
                JobStatus::Open,
                JobStatus::Closed,
                now,
            )? {
                info!(job_id = %job.id, "job expired");
                expired.push(job.id);
            }
        }
        Ok(expired)
    }

    // Applications

    /// Submits an application and queues notifications; delivery problems never fail the call.
    pub fn apply(
        &self,
        capability: &Capability,
        job_id: JobId,
        form: ApplicationForm,
    ) -> Result<Application, PortalError> {
        let student = self.store.student(capability.student()?)?;
        let cover_note = form.validate()?;
        let job = self.store.job(job_id)?;
        workflow::ensure_accepting_applications(&job)?;

        let application = self
            .store
            .insert_application(NewApplication {
                student_id: student.id,
                job_id,
                cover_note,
            })
            .map_err(|err| match err {
                StoreError::JobClosed(_) => PortalError::Transition(workflow::posting_closed()),
                other => PortalError::Store(other),
            })?;
        info!(application_id = %application.id, job_id = %job_id, "application submitted");

        self.notify_applied(&student, &job);
        Ok(application)
    }

    fn notify_applied(&self, student: &Student, job: &Job) {
        let recruiter = match self.store.recruiter(job.recruiter_id) {
            Ok(recruiter) => recruiter,
            Err(err) => {
                warn!(job_id = %job.id, error = %err, "skipping notifications");
                return;
            }
        };
        for message in application_notifications(student, &recruiter, job) {
            if let Err(err) = self.notifier.enqueue(message) {
                warn!(job_id = %job.id, error = %err, "notification not queued");
            }
        }
    }

    pub fn review_application(
        &self,
        capability: &Capability,
        application_id: ApplicationId,
    ) -> Result<Application, PortalError> {
        let recruiter = capability.recruiter()?;
        let application = self.store.application(application_id)?;
        self.owned_job(recruiter, application.job_id)?;
        application.status.transition(ApplicationStatus::Reviewed)?;
        if !self.store.compare_and_set_application_status(
            application_id,
            ApplicationStatus::Submitted,
            ApplicationStatus::Reviewed,
            Utc::now(),
        )? {
            return Err(InvalidTransition::between(
                ApplicationStatus::Reviewed,
                ApplicationStatus::Reviewed,
            )
            .into());
        }
        Ok(self.store.application(application_id)?)
    }

    /// Students see their own applications; recruiters see applications to their jobs.
    pub fn my_applications(
        &self,
        capability: &Capability,
    ) -> Result<Vec<Application>, PortalError> {
        let applications = match capability.principal() {
            Principal::Student(id) => self.store.applications_for_student(id)?,
            Principal::Recruiter(id) => self.store.applications_for_recruiter(id)?,
        };
        Ok(applications)
    }

    pub fn job_applications(
        &self,
        capability: &Capability,
        job_id: JobId,
    ) -> Result<Vec<Applicant>, PortalError> {
        self.owned_job(capability.recruiter()?, job_id)?;
        self.store
            .applications_for_job(job_id)?
            .into_iter()
            .map(|application| -> Result<Applicant, PortalError> {
                let student = self.store.student(application.student_id)?.view();
                Ok(Applicant {
                    application,
                    student,
                })
            })
            .collect()
    }

    // Export

    /// Renders a profile for its owner or for a recruiter the student applied to.
    pub fn export_profile(
        &self,
        capability: &Capability,
        student_id: StudentId,
    ) -> Result<RenderedDocument, PortalError> {
        let student = self.store.student(student_id)?;
        self.authorize_profile_access(capability, student_id)?;
        self.render(&student)
    }

    /// Renders a profile without a capability check; for operator tooling only.
    pub fn render_profile(&self, student_id: StudentId) -> Result<RenderedDocument, PortalError> {
        let student = self.store.student(student_id)?;
        self.render(&student)
    }

    fn render(&self, student: &Student) -> Result<RenderedDocument, PortalError> {
        let bytes = self.renderer.render(&ProfileDocument::from_student(student))?;
        Ok(RenderedDocument {
            filename: format!("student-{}-profile.{}", student.id, self.renderer.extension()),
            content_type: self.renderer.content_type(),
            bytes,
        })
    }

    fn issue(&self, principal: Principal) -> Result<IssuedSession, PortalError> {
        Ok(self.sessions.issue(principal, Utc::now())?)
    }

    fn linked_student(
        &self,
        provider: Provider,
        subject: &str,
    ) -> Result<Option<StudentId>, PortalError> {
        let Some(student_id) = self.store.delegated_student(provider, subject)? else {
            return Ok(None);
        };
        let student = self.store.student(student_id)?;
        if !student.active {
            return Err(IdentityError::Unauthenticated("account is deactivated").into());
        }
        Ok(Some(student_id))
    }

    fn owned_job(&self, recruiter: RecruiterId, job_id: JobId) -> Result<Job, PortalError> {
        let job = self.store.job(job_id)?;
        if !job.is_owned_by(recruiter) {
            return Err(IdentityError::Forbidden(format!(
                "job {job_id} belongs to another recruiter"
            ))
            .into());
        }
        Ok(job)
    }

    fn authorize_profile_access(
        &self,
        capability: &Capability,
        student_id: StudentId,
    ) -> Result<(), PortalError> {
        let allowed = match capability.principal() {
            Principal::Student(id) => id == student_id,
            Principal::Recruiter(id) => self
                .store
                .applications_for_recruiter(id)?
                .iter()
                .any(|application| application.student_id == student_id),
        };
        if !allowed {
            return Err(IdentityError::Forbidden(format!(
                "no access to student {student_id}"
            ))
            .into());
        }
        Ok(())
    }
}

fn conflict(email: &str) -> IdentityError {
    IdentityError::AuthConflict(format!(
        "{email} is already registered; sign in and link the provider instead"
    ))
}

fn resume_content_type(key: &str) -> Mime {
    match key.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "pdf" => mime::APPLICATION_PDF,
        Some(ext) if ext == "txt" => mime::TEXT_PLAIN,
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

/// Error raised by portal operations.
#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Transition(#[from] InvalidTransition),
    #[error(transparent)]
    Resume(#[from] ResumeError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Request-boundary classification of a [`PortalError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DuplicateKey,
    NotFound,
    InvalidTransition,
    Forbidden,
    AuthConflict,
    Validation,
    Unauthenticated,
    Internal,
}

impl PortalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PortalError::Validation(_) => ErrorKind::Validation,
            PortalError::Store(StoreError::DuplicateKey { .. }) => ErrorKind::DuplicateKey,
            PortalError::Store(StoreError::NotFound { .. }) => ErrorKind::NotFound,
            PortalError::Store(StoreError::JobClosed(_)) => ErrorKind::InvalidTransition,
            PortalError::Store(StoreError::Unavailable(_)) => ErrorKind::Internal,
            PortalError::Identity(IdentityError::Forbidden(_)) => ErrorKind::Forbidden,
            PortalError::Identity(IdentityError::Unauthenticated(_)) => ErrorKind::Unauthenticated,
            PortalError::Identity(IdentityError::AuthConflict(_)) => ErrorKind::AuthConflict,
            PortalError::Identity(IdentityError::Hashing(_)) => ErrorKind::Internal,
            PortalError::Transition(_) => ErrorKind::InvalidTransition,
            PortalError::Resume(
                ResumeError::InvalidFilename(_) | ResumeError::UnsupportedType(_) | ResumeError::Empty,
            ) => ErrorKind::Validation,
            PortalError::Resume(ResumeError::Missing(_)) => ErrorKind::NotFound,
            PortalError::Resume(ResumeError::Io(_)) | PortalError::Export(_) => ErrorKind::Internal,
        }
    }
}
