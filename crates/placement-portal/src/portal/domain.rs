use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::identity::Provider;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Identifier for a registered student.
    StudentId
);
entity_id!(
    /// Identifier for a registered recruiter.
    RecruiterId
);
entity_id!(
    /// Identifier for a job posting.
    JobId
);
entity_id!(
    /// Identifier for a student's application to a job.
    ApplicationId
);

/// How an account proves who it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Argon2 PHC string produced at registration.
    Password { hash: String },
    /// Account created through an external identity provider; it has no local password.
    Delegated,
}

impl Credential {
    pub fn password_hash(&self) -> Option<&str> {
        match self {
            Credential::Password { hash } => Some(hash),
            Credential::Delegated => None,
        }
    }
}

/// Editable student profile fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub name: String,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub university: Option<String>,
    pub degree: Option<String>,
    pub graduation_year: Option<String>,
    pub job_preference: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    pub bio: Option<String>,
    /// Storage key of the uploaded resume, if any.
    pub resume: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Student {
    pub id: StudentId,
    pub email: String,
    pub credential: Credential,
    pub profile: StudentProfile,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Student {
    pub fn view(&self) -> StudentView {
        StudentView {
            id: self.id,
            email: self.email.clone(),
            profile: self.profile.clone(),
            active: self.active,
            delegated: matches!(self.credential, Credential::Delegated),
            created_at: self.created_at,
        }
    }
}

/// Student record as exposed over the API; the credential never leaves the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentView {
    pub id: StudentId,
    pub email: String,
    pub profile: StudentProfile,
    pub active: bool,
    pub delegated: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewStudent {
    pub email: String,
    pub credential: Credential,
    pub profile: StudentProfile,
}

/// Editable recruiter and company fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecruiterProfile {
    pub name: String,
    pub company: String,
    pub company_description: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub website: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recruiter {
    pub id: RecruiterId,
    pub email: String,
    pub credential: Credential,
    pub profile: RecruiterProfile,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Recruiter {
    pub fn view(&self) -> RecruiterView {
        RecruiterView {
            id: self.id,
            email: self.email.clone(),
            profile: self.profile.clone(),
            active: self.active,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecruiterView {
    pub id: RecruiterId,
    pub email: String,
    pub profile: RecruiterProfile,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRecruiter {
    pub email: String,
    pub credential: Credential,
    pub profile: RecruiterProfile,
}

/// Account found under an email address, regardless of role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Student(Student),
    Recruiter(Recruiter),
}

/// Descriptive fields of a posting, as entered by the recruiter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDetails {
    pub title: String,
    pub company: String,
    pub description: String,
    pub location: String,
    pub job_type: Option<String>,
    pub salary: Option<String>,
    pub interview_date: Option<NaiveDate>,
    pub interview_time: Option<String>,
    pub interview_place: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Open,
    Closed,
}

impl JobStatus {
    pub const fn label(self) -> &'static str {
        match self {
            JobStatus::Open => "open",
            JobStatus::Closed => "closed",
        }
    }

    pub fn from_label(raw: &str) -> Option<Self> {
        match raw {
            "open" => Some(JobStatus::Open),
            "closed" => Some(JobStatus::Closed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    pub id: JobId,
    pub recruiter_id: RecruiterId,
    #[serde(flatten)]
    pub details: JobDetails,
    pub status: JobStatus,
    pub posted_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn is_owned_by(&self, recruiter: RecruiterId) -> bool {
        self.recruiter_id == recruiter
    }
}

#[derive(Debug, Clone)]
pub struct NewJob {
    pub recruiter_id: RecruiterId,
    pub details: JobDetails,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Submitted,
    Reviewed,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::Reviewed => "reviewed",
        }
    }

    pub fn from_label(raw: &str) -> Option<Self> {
        match raw {
            "submitted" => Some(ApplicationStatus::Submitted),
            "reviewed" => Some(ApplicationStatus::Reviewed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Application {
    pub id: ApplicationId,
    pub student_id: StudentId,
    pub job_id: JobId,
    pub status: ApplicationStatus,
    pub cover_note: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewApplication {
    pub student_id: StudentId,
    pub job_id: JobId,
    pub cover_note: Option<String>,
}

/// Binding between an external provider subject and a local student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegatedLink {
    pub provider: Provider,
    pub subject: String,
    pub student_id: StudentId,
}
