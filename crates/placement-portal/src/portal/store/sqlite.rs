use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{ffi, params, Connection, OptionalExtension, Row};

use super::{ApplicationFilter, EntityStore, JobFilter, StoreError};
use crate::portal::domain::{
    Application, ApplicationId, ApplicationStatus, Credential, DelegatedLink, Identity, Job,
    JobDetails, JobId, JobStatus, NewApplication, NewJob, NewRecruiter, NewStudent, Recruiter,
    RecruiterId, RecruiterProfile, Student, StudentId, StudentProfile,
};
use crate::portal::identity::Provider;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS identities (
    email TEXT PRIMARY KEY,
    role TEXT NOT NULL CHECK (role IN ('student', 'recruiter'))
);

CREATE TABLE IF NOT EXISTS students (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE REFERENCES identities(email) ON UPDATE CASCADE,
    password_hash TEXT,
    name TEXT NOT NULL,
    phone TEXT,
    city TEXT,
    state TEXT,
    country TEXT,
    university TEXT,
    degree TEXT,
    graduation_year TEXT,
    job_preference TEXT,
    skills TEXT NOT NULL DEFAULT '[]',
    bio TEXT,
    resume TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS recruiters (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE REFERENCES identities(email) ON UPDATE CASCADE,
    password_hash TEXT,
    name TEXT NOT NULL,
    company TEXT NOT NULL,
    company_description TEXT,
    phone TEXT,
    city TEXT,
    website TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    recruiter_id INTEGER NOT NULL REFERENCES recruiters(id),
    title TEXT NOT NULL,
    company TEXT NOT NULL,
    description TEXT NOT NULL,
    location TEXT NOT NULL,
    job_type TEXT,
    salary TEXT,
    interview_date TEXT,
    interview_time TEXT,
    interview_place TEXT,
    status TEXT NOT NULL DEFAULT 'open' CHECK (status IN ('open', 'closed')),
    posted_at TEXT NOT NULL,
    closed_at TEXT
);

CREATE TABLE IF NOT EXISTS applications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id INTEGER NOT NULL REFERENCES students(id),
    job_id INTEGER NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
    status TEXT NOT NULL DEFAULT 'submitted' CHECK (status IN ('submitted', 'reviewed')),
    cover_note TEXT,
    submitted_at TEXT NOT NULL,
    reviewed_at TEXT,
    UNIQUE (student_id, job_id)
);

CREATE TABLE IF NOT EXISTS delegated_links (
    provider TEXT NOT NULL,
    subject TEXT NOT NULL,
    student_id INTEGER NOT NULL REFERENCES students(id),
    linked_at TEXT NOT NULL,
    PRIMARY KEY (provider, subject)
);
"#;

const STUDENT_COLUMNS: &str = "id, email, password_hash, name, phone, city, state, country, \
    university, degree, graduation_year, job_preference, skills, bio, resume, active, \
    created_at, updated_at";
const RECRUITER_COLUMNS: &str = "id, email, password_hash, name, company, company_description, \
    phone, city, website, active, created_at, updated_at";
const JOB_COLUMNS: &str = "id, recruiter_id, title, company, description, location, job_type, \
    salary, interview_date, interview_time, interview_place, status, posted_at, closed_at";
const APPLICATION_COLUMNS: &str =
    "id, student_id, job_id, status, cover_note, submitted_at, reviewed_at";

/// SQLite-backed store; uniqueness and foreign keys are enforced by the schema.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("sqlite connection lock poisoned".to_string()))
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        StoreError::Unavailable(value.to_string())
    }
}

fn constraint_code(err: &rusqlite::Error) -> Option<i32> {
    match err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Some(failure.extended_code)
        }
        _ => None,
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        constraint_code(err),
        Some(ffi::SQLITE_CONSTRAINT_UNIQUE) | Some(ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
    )
}

fn is_foreign_key_violation(err: &rusqlite::Error) -> bool {
    constraint_code(err) == Some(ffi::SQLITE_CONSTRAINT_FOREIGNKEY)
}

fn encode_skills(skills: &[String]) -> Result<String, StoreError> {
    serde_json::to_string(skills).map_err(|err| StoreError::Unavailable(err.to_string()))
}

fn decode_skills(raw: &str) -> rusqlite::Result<Vec<String>> {
    serde_json::from_str(raw).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(
            12,
            rusqlite::types::Type::Text,
            Box::new(err),
        )
    })
}

fn credential_from(hash: Option<String>) -> Credential {
    match hash {
        Some(hash) => Credential::Password { hash },
        None => Credential::Delegated,
    }
}

fn student_from_row(row: &Row<'_>) -> rusqlite::Result<Student> {
    let skills: String = row.get("skills")?;
    Ok(Student {
        id: row.get("id")?,
        email: row.get("email")?,
        credential: credential_from(row.get("password_hash")?),
        profile: StudentProfile {
            name: row.get("name")?,
            phone: row.get("phone")?,
            city: row.get("city")?,
            state: row.get("state")?,
            country: row.get("country")?,
            university: row.get("university")?,
            degree: row.get("degree")?,
            graduation_year: row.get("graduation_year")?,
            job_preference: row.get("job_preference")?,
            skills: decode_skills(&skills)?,
            bio: row.get("bio")?,
            resume: row.get("resume")?,
        },
        active: row.get("active")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn recruiter_from_row(row: &Row<'_>) -> rusqlite::Result<Recruiter> {
    Ok(Recruiter {
        id: row.get("id")?,
        email: row.get("email")?,
        credential: credential_from(row.get("password_hash")?),
        profile: RecruiterProfile {
            name: row.get("name")?,
            company: row.get("company")?,
            company_description: row.get("company_description")?,
            phone: row.get("phone")?,
            city: row.get("city")?,
            website: row.get("website")?,
        },
        active: row.get("active")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<Job> {
    Ok(Job {
        id: row.get("id")?,
        recruiter_id: row.get("recruiter_id")?,
        details: JobDetails {
            title: row.get("title")?,
            company: row.get("company")?,
            description: row.get("description")?,
            location: row.get("location")?,
            job_type: row.get("job_type")?,
            salary: row.get("salary")?,
            interview_date: row.get("interview_date")?,
            interview_time: row.get("interview_time")?,
            interview_place: row.get("interview_place")?,
        },
        status: row.get("status")?,
        posted_at: row.get("posted_at")?,
        closed_at: row.get("closed_at")?,
    })
}

fn application_from_row(row: &Row<'_>) -> rusqlite::Result<Application> {
    Ok(Application {
        id: row.get("id")?,
        student_id: row.get("student_id")?,
        job_id: row.get("job_id")?,
        status: row.get("status")?,
        cover_note: row.get("cover_note")?,
        submitted_at: row.get("submitted_at")?,
        reviewed_at: row.get("reviewed_at")?,
    })
}

fn fetch_student(conn: &Connection, id: StudentId) -> Result<Student, StoreError> {
    conn.query_row(
        &format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?1"),
        params![id],
        student_from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::not_found("student", id))
}

fn fetch_recruiter(conn: &Connection, id: RecruiterId) -> Result<Recruiter, StoreError> {
    conn.query_row(
        &format!("SELECT {RECRUITER_COLUMNS} FROM recruiters WHERE id = ?1"),
        params![id],
        recruiter_from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::not_found("recruiter", id))
}

fn fetch_job(conn: &Connection, id: JobId) -> Result<Job, StoreError> {
    conn.query_row(
        &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
        params![id],
        job_from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::not_found("job", id))
}

fn fetch_application(conn: &Connection, id: ApplicationId) -> Result<Application, StoreError> {
    conn.query_row(
        &format!("SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = ?1"),
        params![id],
        application_from_row,
    )
    .optional()?
    .ok_or_else(|| StoreError::not_found("application", id))
}

fn claim_email(conn: &Connection, email: &str, role: &str) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO identities (email, role) VALUES (?1, ?2)",
        params![email, role],
    )
    .map_err(|err| {
        if is_unique_violation(&err) {
            StoreError::duplicate("account", format!("email {email}"))
        } else {
            err.into()
        }
    })?;
    Ok(())
}

fn rename_email(conn: &Connection, old: &str, new: &str) -> Result<(), StoreError> {
    if old == new {
        return Ok(());
    }
    conn.execute(
        "UPDATE identities SET email = ?2 WHERE email = ?1",
        params![old, new],
    )
    .map_err(|err| {
        if is_unique_violation(&err) {
            StoreError::duplicate("account", format!("email {new}"))
        } else {
            err.into()
        }
    })?;
    Ok(())
}

fn insert_student_row(conn: &Connection, student: &NewStudent) -> Result<Student, StoreError> {
    claim_email(conn, &student.email, "student")?;
    let now = Utc::now();
    let profile = &student.profile;
    conn.execute(
        "INSERT INTO students (email, password_hash, name, phone, city, state, country, \
         university, degree, graduation_year, job_preference, skills, bio, resume, active, \
         created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, 1, ?15, ?15)",
        params![
            student.email,
            student.credential.password_hash(),
            profile.name,
            profile.phone,
            profile.city,
            profile.state,
            profile.country,
            profile.university,
            profile.degree,
            profile.graduation_year,
            profile.job_preference,
            encode_skills(&profile.skills)?,
            profile.bio,
            profile.resume,
            now,
        ],
    )?;
    fetch_student(conn, StudentId(conn.last_insert_rowid()))
}

fn insert_link(conn: &Connection, link: &DelegatedLink) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO delegated_links (provider, subject, student_id, linked_at) \
         VALUES (?1, ?2, ?3, ?4)",
        params![link.provider, link.subject, link.student_id, Utc::now()],
    )
    .map_err(|err| {
        if is_unique_violation(&err) {
            StoreError::duplicate(
                "delegated identity",
                format!("{}:{}", link.provider, link.subject),
            )
        } else if is_foreign_key_violation(&err) {
            StoreError::not_found("student", link.student_id)
        } else {
            err.into()
        }
    })?;
    Ok(())
}

impl EntityStore for SqliteStore {
    fn insert_student(&self, student: NewStudent) -> Result<Student, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let record = insert_student_row(&tx, &student)?;
        tx.commit()?;
        Ok(record)
    }

    fn insert_delegated_student(
        &self,
        student: NewStudent,
        provider: Provider,
        subject: &str,
    ) -> Result<Student, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let record = insert_student_row(&tx, &student)?;
        insert_link(
            &tx,
            &DelegatedLink {
                provider,
                subject: subject.to_string(),
                student_id: record.id,
            },
        )?;
        tx.commit()?;
        Ok(record)
    }

    fn student(&self, id: StudentId) -> Result<Student, StoreError> {
        fetch_student(&*self.conn()?, id)
    }

    fn update_student(&self, student: &Student) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let current = fetch_student(&tx, student.id)?;
        rename_email(&tx, &current.email, &student.email)?;
        let profile = &student.profile;
        tx.execute(
            "UPDATE students SET email = ?2, password_hash = ?3, name = ?4, phone = ?5, \
             city = ?6, state = ?7, country = ?8, university = ?9, degree = ?10, \
             graduation_year = ?11, job_preference = ?12, skills = ?13, bio = ?14, resume = ?15, \
             active = ?16, updated_at = ?17 WHERE id = ?1",
            params![
                student.id,
                student.email,
                student.credential.password_hash(),
                profile.name,
                profile.phone,
                profile.city,
                profile.state,
                profile.country,
                profile.university,
                profile.degree,
                profile.graduation_year,
                profile.job_preference,
                encode_skills(&profile.skills)?,
                profile.bio,
                profile.resume,
                student.active,
                Utc::now(),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn insert_recruiter(&self, recruiter: NewRecruiter) -> Result<Recruiter, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        claim_email(&tx, &recruiter.email, "recruiter")?;
        let profile = &recruiter.profile;
        tx.execute(
            "INSERT INTO recruiters (email, password_hash, name, company, company_description, \
             phone, city, website, active, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9, ?9)",
            params![
                recruiter.email,
                recruiter.credential.password_hash(),
                profile.name,
                profile.company,
                profile.company_description,
                profile.phone,
                profile.city,
                profile.website,
                Utc::now(),
            ],
        )?;
        let id = RecruiterId(tx.last_insert_rowid());
        let record = fetch_recruiter(&tx, id)?;
        tx.commit()?;
        Ok(record)
    }

    fn recruiter(&self, id: RecruiterId) -> Result<Recruiter, StoreError> {
        fetch_recruiter(&*self.conn()?, id)
    }

    fn update_recruiter(&self, recruiter: &Recruiter) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let current = fetch_recruiter(&tx, recruiter.id)?;
        rename_email(&tx, &current.email, &recruiter.email)?;
        let profile = &recruiter.profile;
        tx.execute(
            "UPDATE recruiters SET email = ?2, password_hash = ?3, name = ?4, company = ?5, \
             company_description = ?6, phone = ?7, city = ?8, website = ?9, active = ?10, \
             updated_at = ?11 WHERE id = ?1",
            params![
                recruiter.id,
                recruiter.email,
                recruiter.credential.password_hash(),
                profile.name,
                profile.company,
                profile.company_description,
                profile.phone,
                profile.city,
                profile.website,
                recruiter.active,
                Utc::now(),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn identity_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        let conn = self.conn()?;
        let student = conn
            .query_row(
                &format!("SELECT {STUDENT_COLUMNS} FROM students WHERE email = ?1"),
                params![email],
                student_from_row,
            )
            .optional()?;
        if let Some(student) = student {
            return Ok(Some(Identity::Student(student)));
        }
        let recruiter = conn
            .query_row(
                &format!("SELECT {RECRUITER_COLUMNS} FROM recruiters WHERE email = ?1"),
                params![email],
                recruiter_from_row,
            )
            .optional()?;
        Ok(recruiter.map(Identity::Recruiter))
    }

    fn link_delegated(&self, link: &DelegatedLink) -> Result<(), StoreError> {
        insert_link(&*self.conn()?, link)
    }

    fn delegated_student(
        &self,
        provider: Provider,
        subject: &str,
    ) -> Result<Option<StudentId>, StoreError> {
        let conn = self.conn()?;
        let student = conn
            .query_row(
                "SELECT student_id FROM delegated_links WHERE provider = ?1 AND subject = ?2",
                params![provider, subject],
                |row| row.get(0),
            )
            .optional()?;
        Ok(student)
    }

    fn insert_job(&self, job: NewJob) -> Result<Job, StoreError> {
        let conn = self.conn()?;
        let details = &job.details;
        conn.execute(
            "INSERT INTO jobs (recruiter_id, title, company, description, location, job_type, \
             salary, interview_date, interview_time, interview_place, status, posted_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                job.recruiter_id,
                details.title,
                details.company,
                details.description,
                details.location,
                details.job_type,
                details.salary,
                details.interview_date,
                details.interview_time,
                details.interview_place,
                JobStatus::Open,
                Utc::now(),
            ],
        )
        .map_err(|err| {
            if is_foreign_key_violation(&err) {
                StoreError::not_found("recruiter", job.recruiter_id)
            } else {
                err.into()
            }
        })?;
        fetch_job(&conn, JobId(conn.last_insert_rowid()))
    }

    fn job(&self, id: JobId) -> Result<Job, StoreError> {
        fetch_job(&*self.conn()?, id)
    }

    fn update_job(&self, job: &Job) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let details = &job.details;
        let updated = conn.execute(
            "UPDATE jobs SET title = ?2, company = ?3, description = ?4, location = ?5, \
             job_type = ?6, salary = ?7, interview_date = ?8, interview_time = ?9, \
             interview_place = ?10 WHERE id = ?1",
            params![
                job.id,
                details.title,
                details.company,
                details.description,
                details.location,
                details.job_type,
                details.salary,
                details.interview_date,
                details.interview_time,
                details.interview_place,
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::not_found("job", job.id));
        }
        Ok(())
    }

    fn delete_job(&self, id: JobId) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM jobs WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(StoreError::not_found("job", id));
        }
        Ok(())
    }

    fn jobs(&self, filter: JobFilter) -> Result<Vec<Job>, StoreError> {
        let conn = self.conn()?;
        let jobs = match filter {
            JobFilter::All => {
                let mut stmt =
                    conn.prepare(&format!("SELECT {JOB_COLUMNS} FROM jobs ORDER BY id"))?;
                let rows = stmt.query_map([], job_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            JobFilter::Open => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {JOB_COLUMNS} FROM jobs WHERE status = 'open' ORDER BY id"
                ))?;
                let rows = stmt.query_map([], job_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            JobFilter::PostedBy(recruiter) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {JOB_COLUMNS} FROM jobs WHERE recruiter_id = ?1 ORDER BY id"
                ))?;
                let rows = stmt.query_map(params![recruiter], job_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };
        Ok(jobs)
    }

    fn compare_and_set_job_status(
        &self,
        id: JobId,
        expected: JobStatus,
        next: JobStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let closed_at = (next == JobStatus::Closed).then_some(at);
        let updated = conn.execute(
            "UPDATE jobs SET status = ?3, closed_at = COALESCE(?4, closed_at) \
             WHERE id = ?1 AND status = ?2",
            params![id, expected, next, closed_at],
        )?;
        if updated == 0 {
            fetch_job(&conn, id)?;
            return Ok(false);
        }
        Ok(true)
    }

    fn insert_application(&self, application: NewApplication) -> Result<Application, StoreError> {
        let conn = self.conn()?;
        let inserted = conn
            .execute(
                "INSERT INTO applications (student_id, job_id, status, cover_note, submitted_at) \
                 SELECT ?1, id, ?3, ?4, ?5 FROM jobs WHERE id = ?2 AND status = 'open'",
                params![
                    application.student_id,
                    application.job_id,
                    ApplicationStatus::Submitted,
                    application.cover_note,
                    Utc::now(),
                ],
            )
            .map_err(|err| {
                if is_unique_violation(&err) {
                    StoreError::duplicate(
                        "application",
                        format!(
                            "student {} and job {}",
                            application.student_id, application.job_id
                        ),
                    )
                } else if is_foreign_key_violation(&err) {
                    StoreError::not_found("student", application.student_id)
                } else {
                    err.into()
                }
            })?;

        if inserted == 0 {
            // Distinguish a missing posting from a closed one.
            fetch_job(&conn, application.job_id)?;
            return Err(StoreError::JobClosed(application.job_id));
        }
        fetch_application(&conn, ApplicationId(conn.last_insert_rowid()))
    }

    fn application(&self, id: ApplicationId) -> Result<Application, StoreError> {
        fetch_application(&*self.conn()?, id)
    }

    fn applications(&self, filter: ApplicationFilter) -> Result<Vec<Application>, StoreError> {
        let conn = self.conn()?;
        let (sql, key) = match filter {
            ApplicationFilter::ForJob(job) => (
                format!("SELECT {APPLICATION_COLUMNS} FROM applications WHERE job_id = ?1 ORDER BY id"),
                job.0,
            ),
            ApplicationFilter::ForStudent(student) => (
                format!(
                    "SELECT {APPLICATION_COLUMNS} FROM applications WHERE student_id = ?1 ORDER BY id"
                ),
                student.0,
            ),
            ApplicationFilter::ForRecruiter(recruiter) => (
                format!(
                    "SELECT {APPLICATION_COLUMNS} FROM applications WHERE job_id IN \
                     (SELECT id FROM jobs WHERE recruiter_id = ?1) ORDER BY id"
                ),
                recruiter.0,
            ),
        };
        let mut stmt = conn.prepare(&sql)?;
        let applications = stmt
            .query_map(params![key], application_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(applications)
    }

    fn compare_and_set_application_status(
        &self,
        id: ApplicationId,
        expected: ApplicationStatus,
        next: ApplicationStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let reviewed_at = (next == ApplicationStatus::Reviewed).then_some(at);
        let updated = conn.execute(
            "UPDATE applications SET status = ?3, reviewed_at = COALESCE(?4, reviewed_at) \
             WHERE id = ?1 AND status = ?2",
            params![id, expected, next, reviewed_at],
        )?;
        if updated == 0 {
            fetch_application(&conn, id)?;
            return Ok(false);
        }
        Ok(true)
    }
}

macro_rules! sql_id {
    ($($name:ident),+ $(,)?) => {
        $(
            impl ToSql for $name {
                fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                    Ok(ToSqlOutput::from(self.0))
                }
            }

            impl FromSql for $name {
                fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                    i64::column_result(value).map($name)
                }
            }
        )+
    };
}

sql_id!(StudentId, RecruiterId, JobId, ApplicationId);

macro_rules! sql_label {
    ($($name:ident),+ $(,)?) => {
        $(
            impl ToSql for $name {
                fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                    Ok(ToSqlOutput::from(self.label()))
                }
            }

            impl FromSql for $name {
                fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                    let raw = value.as_str()?;
                    $name::from_label(raw).ok_or_else(|| {
                        FromSqlError::Other(
                            format!("unknown {} '{raw}'", stringify!($name)).into(),
                        )
                    })
                }
            }
        )+
    };
}

sql_label!(JobStatus, ApplicationStatus, Provider);
