//! Campus placement portal: accounts, job postings, applications, and their side effects.
//!
//! Requests flow from the router through [`PortalService`], which checks the caller's
//! [`Capability`], reads and writes the [`EntityStore`], and validates status changes against
//! the lifecycles in [`workflow`]. Notification and export run as side effects of that call.

pub mod domain;
pub mod export;
pub mod forms;
pub mod identity;
pub mod notify;
pub mod resume;
pub mod router;
pub mod service;
pub mod store;
pub mod workflow;

#[cfg(test)]
mod tests;

pub use domain::{
    Application, ApplicationId, ApplicationStatus, Job, JobDetails, JobId, JobStatus, Recruiter,
    RecruiterId, RecruiterProfile, RecruiterView, Student, StudentId, StudentProfile, StudentView,
};
pub use export::{DocumentRenderer, ExportError, PdfRenderer, ProfileDocument, RenderedDocument};
pub use identity::{Capability, IdentityError, IssuedSession, Principal, SessionSigner};
pub use notify::{
    LogTransport, MailMessage, MailTransport, Notifier, NotifyError, QueuedNotifier, SmtpMailer,
};
pub use resume::{FsResumeStorage, ResumeError, ResumeStorage};
pub use router::{portal_router, Authenticated};
pub use service::{Applicant, ErrorKind, PortalError, PortalService};
pub use store::{EntityStore, MemoryStore, SqliteStore, StoreError};
