use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::{ApplicationFilter, EntityStore, JobFilter, StoreError};
use crate::portal::domain::{
    Application, ApplicationId, ApplicationStatus, DelegatedLink, Identity, Job, JobId, JobStatus,
    NewApplication, NewJob, NewRecruiter, NewStudent, Recruiter, RecruiterId, Student, StudentId,
};
use crate::portal::identity::Provider;

#[derive(Debug, Clone, Copy)]
enum Account {
    Student(StudentId),
    Recruiter(RecruiterId),
}

#[derive(Debug, Default)]
struct Tables {
    last_id: i64,
    students: BTreeMap<StudentId, Student>,
    recruiters: BTreeMap<RecruiterId, Recruiter>,
    emails: HashMap<String, Account>,
    jobs: BTreeMap<JobId, Job>,
    applications: BTreeMap<ApplicationId, Application>,
    application_pairs: HashMap<(StudentId, JobId), ApplicationId>,
    delegated: HashMap<(Provider, String), StudentId>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn claim_email(&mut self, email: &str, account: Account) -> Result<(), StoreError> {
        if self.emails.contains_key(email) {
            return Err(StoreError::duplicate("account", format!("email {email}")));
        }
        self.emails.insert(email.to_string(), account);
        Ok(())
    }

    fn add_student(&mut self, student: NewStudent) -> Result<Student, StoreError> {
        let id = StudentId(self.next_id());
        self.claim_email(&student.email, Account::Student(id))?;
        let now = Utc::now();
        let record = Student {
            id,
            email: student.email,
            credential: student.credential,
            profile: student.profile,
            active: true,
            created_at: now,
            updated_at: now,
        };
        self.students.insert(id, record.clone());
        Ok(record)
    }

    /// Moves an email claim, keeping the cross-role index consistent.
    fn rename_email(&mut self, old: &str, new: &str, account: Account) -> Result<(), StoreError> {
        if old == new {
            return Ok(());
        }
        self.claim_email(new, account)?;
        self.emails.remove(old);
        Ok(())
    }
}

/// Mutex-guarded in-process tables with the same integrity rules as the SQLite schema.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl EntityStore for MemoryStore {
    fn insert_student(&self, student: NewStudent) -> Result<Student, StoreError> {
        self.tables()?.add_student(student)
    }

    fn insert_delegated_student(
        &self,
        student: NewStudent,
        provider: Provider,
        subject: &str,
    ) -> Result<Student, StoreError> {
        let mut tables = self.tables()?;
        let key = (provider, subject.to_string());
        if tables.delegated.contains_key(&key) {
            return Err(StoreError::duplicate(
                "delegated identity",
                format!("{provider}:{subject}"),
            ));
        }
        let record = tables.add_student(student)?;
        tables.delegated.insert(key, record.id);
        Ok(record)
    }

    fn student(&self, id: StudentId) -> Result<Student, StoreError> {
        self.tables()?
            .students
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("student", id))
    }

    fn update_student(&self, student: &Student) -> Result<(), StoreError> {
        let mut tables = self.tables()?;
        let current_email = tables
            .students
            .get(&student.id)
            .map(|current| current.email.clone())
            .ok_or_else(|| StoreError::not_found("student", student.id))?;
        tables.rename_email(&current_email, &student.email, Account::Student(student.id))?;
        let mut record = student.clone();
        record.updated_at = Utc::now();
        tables.students.insert(student.id, record);
        Ok(())
    }

    fn insert_recruiter(&self, recruiter: NewRecruiter) -> Result<Recruiter, StoreError> {
        let mut tables = self.tables()?;
        let id = RecruiterId(tables.next_id());
        tables.claim_email(&recruiter.email, Account::Recruiter(id))?;
        let now = Utc::now();
        let record = Recruiter {
            id,
            email: recruiter.email,
            credential: recruiter.credential,
            profile: recruiter.profile,
            active: true,
            created_at: now,
            updated_at: now,
        };
        tables.recruiters.insert(id, record.clone());
        Ok(record)
    }

    fn recruiter(&self, id: RecruiterId) -> Result<Recruiter, StoreError> {
        self.tables()?
            .recruiters
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("recruiter", id))
    }

    fn update_recruiter(&self, recruiter: &Recruiter) -> Result<(), StoreError> {
        let mut tables = self.tables()?;
        let current_email = tables
            .recruiters
            .get(&recruiter.id)
            .map(|current| current.email.clone())
            .ok_or_else(|| StoreError::not_found("recruiter", recruiter.id))?;
        tables.rename_email(
            &current_email,
            &recruiter.email,
            Account::Recruiter(recruiter.id),
        )?;
        let mut record = recruiter.clone();
        record.updated_at = Utc::now();
        tables.recruiters.insert(recruiter.id, record);
        Ok(())
    }

    fn identity_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        let tables = self.tables()?;
        let identity = match tables.emails.get(email) {
            Some(Account::Student(id)) => tables.students.get(id).cloned().map(Identity::Student),
            Some(Account::Recruiter(id)) => {
                tables.recruiters.get(id).cloned().map(Identity::Recruiter)
            }
            None => None,
        };
        Ok(identity)
    }

    fn link_delegated(&self, link: &DelegatedLink) -> Result<(), StoreError> {
        let mut tables = self.tables()?;
        if !tables.students.contains_key(&link.student_id) {
            return Err(StoreError::not_found("student", link.student_id));
        }
        let key = (link.provider, link.subject.clone());
        if tables.delegated.contains_key(&key) {
            return Err(StoreError::duplicate(
                "delegated identity",
                format!("{}:{}", link.provider, link.subject),
            ));
        }
        tables.delegated.insert(key, link.student_id);
        Ok(())
    }

    fn delegated_student(
        &self,
        provider: Provider,
        subject: &str,
    ) -> Result<Option<StudentId>, StoreError> {
        Ok(self
            .tables()?
            .delegated
            .get(&(provider, subject.to_string()))
            .copied())
    }

    fn insert_job(&self, job: NewJob) -> Result<Job, StoreError> {
        let mut tables = self.tables()?;
        if !tables.recruiters.contains_key(&job.recruiter_id) {
            return Err(StoreError::not_found("recruiter", job.recruiter_id));
        }
        let id = JobId(tables.next_id());
        let record = Job {
            id,
            recruiter_id: job.recruiter_id,
            details: job.details,
            status: JobStatus::Open,
            posted_at: Utc::now(),
            closed_at: None,
        };
        tables.jobs.insert(id, record.clone());
        Ok(record)
    }

    fn job(&self, id: JobId) -> Result<Job, StoreError> {
        self.tables()?
            .jobs
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("job", id))
    }

    fn update_job(&self, job: &Job) -> Result<(), StoreError> {
        let mut tables = self.tables()?;
        let stored = tables
            .jobs
            .get_mut(&job.id)
            .ok_or_else(|| StoreError::not_found("job", job.id))?;
        stored.details = job.details.clone();
        Ok(())
    }

    fn delete_job(&self, id: JobId) -> Result<(), StoreError> {
        let mut tables = self.tables()?;
        if tables.jobs.remove(&id).is_none() {
            return Err(StoreError::not_found("job", id));
        }
        let orphaned: Vec<(ApplicationId, StudentId)> = tables
            .applications
            .values()
            .filter(|application| application.job_id == id)
            .map(|application| (application.id, application.student_id))
            .collect();
        for (application_id, student_id) in orphaned {
            tables.applications.remove(&application_id);
            tables.application_pairs.remove(&(student_id, id));
        }
        Ok(())
    }

    fn jobs(&self, filter: JobFilter) -> Result<Vec<Job>, StoreError> {
        Ok(self
            .tables()?
            .jobs
            .values()
            .filter(|job| filter.matches(job))
            .cloned()
            .collect())
    }

    fn compare_and_set_job_status(
        &self,
        id: JobId,
        expected: JobStatus,
        next: JobStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables()?;
        let job = tables
            .jobs
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("job", id))?;
        if job.status != expected {
            return Ok(false);
        }
        job.status = next;
        if next == JobStatus::Closed {
            job.closed_at = Some(at);
        }
        Ok(true)
    }

    fn insert_application(&self, application: NewApplication) -> Result<Application, StoreError> {
        let mut tables = self.tables()?;
        if !tables.students.contains_key(&application.student_id) {
            return Err(StoreError::not_found("student", application.student_id));
        }
        let job_status = tables
            .jobs
            .get(&application.job_id)
            .map(|job| job.status)
            .ok_or_else(|| StoreError::not_found("job", application.job_id))?;
        let pair = (application.student_id, application.job_id);
        if tables.application_pairs.contains_key(&pair) {
            return Err(StoreError::duplicate(
                "application",
                format!(
                    "student {} and job {}",
                    application.student_id, application.job_id
                ),
            ));
        }
        if job_status != JobStatus::Open {
            return Err(StoreError::JobClosed(application.job_id));
        }

        let id = ApplicationId(tables.next_id());
        let record = Application {
            id,
            student_id: application.student_id,
            job_id: application.job_id,
            status: ApplicationStatus::Submitted,
            cover_note: application.cover_note,
            submitted_at: Utc::now(),
            reviewed_at: None,
        };
        tables.application_pairs.insert(pair, id);
        tables.applications.insert(id, record.clone());
        Ok(record)
    }

    fn application(&self, id: ApplicationId) -> Result<Application, StoreError> {
        self.tables()?
            .applications
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("application", id))
    }

    fn applications(&self, filter: ApplicationFilter) -> Result<Vec<Application>, StoreError> {
        let tables = self.tables()?;
        let matches = |application: &&Application| match filter {
            ApplicationFilter::ForJob(job) => application.job_id == job,
            ApplicationFilter::ForStudent(student) => application.student_id == student,
            ApplicationFilter::ForRecruiter(recruiter) => tables
                .jobs
                .get(&application.job_id)
                .map(|job| job.recruiter_id == recruiter)
                .unwrap_or(false),
        };
        Ok(tables
            .applications
            .values()
            .filter(matches)
            .cloned()
            .collect())
    }

    fn compare_and_set_application_status(
        &self,
        id: ApplicationId,
        expected: ApplicationStatus,
        next: ApplicationStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables()?;
        let application = tables
            .applications
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("application", id))?;
        if application.status != expected {
            return Ok(false);
        }
        application.status = next;
        if next == ApplicationStatus::Reviewed {
            application.reviewed_at = Some(at);
        }
        Ok(true)
    }
}
