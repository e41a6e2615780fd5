//! Statically declared request forms and their validation rules.

use chrono::NaiveDate;
use serde::Deserialize;

use super::domain::{JobDetails, RecruiterProfile, StudentProfile};

pub const MIN_PASSWORD_LEN: usize = 8;
const MAX_TEXT_LEN: usize = 200;
const MAX_LONG_TEXT_LEN: usize = 5000;
const MAX_SKILLS: usize = 30;
const MAX_SKILL_LEN: usize = 50;

/// Field-level rejection raised before anything touches the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Lower-case and trim an address, rejecting anything that is not `local@domain.tld`.
pub fn normalize_email(raw: &str) -> Result<String, ValidationError> {
    let email = raw.trim().to_ascii_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid && email.len() <= MAX_TEXT_LEN {
        Ok(email)
    } else {
        Err(ValidationError::new("email", "must be a valid email address"))
    }
}

fn required(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, "is required"));
    }
    bounded(field, trimmed, MAX_TEXT_LEN)
}

fn bounded(field: &'static str, value: &str, max: usize) -> Result<String, ValidationError> {
    if value.chars().count() > max {
        return Err(ValidationError::new(
            field,
            format!("must be at most {max} characters"),
        ));
    }
    Ok(value.to_string())
}

fn optional(field: &'static str, value: &Option<String>) -> Result<Option<String>, ValidationError> {
    optional_bounded(field, value, MAX_TEXT_LEN)
}

fn optional_bounded(
    field: &'static str,
    value: &Option<String>,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    match value.as_deref().map(str::trim) {
        Some(trimmed) if !trimmed.is_empty() => bounded(field, trimmed, max).map(Some),
        _ => Ok(None),
    }
}

fn password(value: &str) -> Result<(), ValidationError> {
    if value.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::new(
            "password",
            format!("must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    Ok(())
}

fn skills(values: &[String]) -> Result<Vec<String>, ValidationError> {
    let mut cleaned: Vec<String> = Vec::with_capacity(values.len());
    for skill in values {
        let skill = skill.trim();
        if skill.is_empty() {
            continue;
        }
        if skill.chars().count() > MAX_SKILL_LEN {
            return Err(ValidationError::new(
                "skills",
                format!("each skill must be at most {MAX_SKILL_LEN} characters"),
            ));
        }
        if !cleaned.iter().any(|existing| existing.eq_ignore_ascii_case(skill)) {
            cleaned.push(skill.to_string());
        }
    }
    if cleaned.len() > MAX_SKILLS {
        return Err(ValidationError::new(
            "skills",
            format!("at most {MAX_SKILLS} skills may be listed"),
        ));
    }
    Ok(cleaned)
}

fn graduation_year(value: &Option<String>) -> Result<Option<String>, ValidationError> {
    let year = optional("graduation_year", value)?;
    if let Some(year) = &year {
        let plausible = year.len() == 4
            && year
                .parse::<u16>()
                .map(|y| (1950..=2100).contains(&y))
                .unwrap_or(false);
        if !plausible {
            return Err(ValidationError::new(
                "graduation_year",
                "must be a four digit year",
            ));
        }
    }
    Ok(year)
}

#[derive(Debug, Clone, Deserialize)]
pub struct StudentRegistration {
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub job_preference: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
}

impl StudentRegistration {
    /// Returns the normalized email and initial profile.
    pub fn validate(&self) -> Result<(String, StudentProfile), ValidationError> {
        let email = normalize_email(&self.email)?;
        password(&self.password)?;
        let profile = StudentProfile {
            name: required("name", &self.name)?,
            city: optional("city", &self.city)?,
            job_preference: optional("job_preference", &self.job_preference)?,
            skills: skills(&self.skills)?,
            ..StudentProfile::default()
        };
        Ok((email, profile))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecruiterRegistration {
    pub email: String,
    pub password: String,
    pub name: String,
    pub company: String,
    #[serde(default)]
    pub city: Option<String>,
}

impl RecruiterRegistration {
    pub fn validate(&self) -> Result<(String, RecruiterProfile), ValidationError> {
        let email = normalize_email(&self.email)?;
        password(&self.password)?;
        let profile = RecruiterProfile {
            name: required("name", &self.name)?,
            company: required("company", &self.company)?,
            city: optional("city", &self.city)?,
            ..RecruiterProfile::default()
        };
        Ok((email, profile))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Full replacement of the editable student fields; the resume is managed separately.
#[derive(Debug, Clone, Deserialize)]
pub struct StudentProfileUpdate {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub university: Option<String>,
    #[serde(default)]
    pub degree: Option<String>,
    #[serde(default)]
    pub graduation_year: Option<String>,
    #[serde(default)]
    pub job_preference: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

impl StudentProfileUpdate {
    /// Validates against the current profile so the stored resume reference is preserved.
    pub fn validate(
        &self,
        current: &StudentProfile,
    ) -> Result<(String, StudentProfile), ValidationError> {
        let email = normalize_email(&self.email)?;
        let profile = StudentProfile {
            name: required("name", &self.name)?,
            phone: optional("phone", &self.phone)?,
            city: optional("city", &self.city)?,
            state: optional("state", &self.state)?,
            country: optional("country", &self.country)?,
            university: optional("university", &self.university)?,
            degree: optional("degree", &self.degree)?,
            graduation_year: graduation_year(&self.graduation_year)?,
            job_preference: optional("job_preference", &self.job_preference)?,
            skills: skills(&self.skills)?,
            bio: optional_bounded("bio", &self.bio, MAX_LONG_TEXT_LEN)?,
            resume: current.resume.clone(),
        };
        Ok((email, profile))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecruiterProfileUpdate {
    pub email: String,
    pub name: String,
    pub company: String,
    #[serde(default)]
    pub company_description: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

impl RecruiterProfileUpdate {
    pub fn validate(&self) -> Result<(String, RecruiterProfile), ValidationError> {
        let email = normalize_email(&self.email)?;
        let website = optional("website", &self.website)?;
        if let Some(site) = &website {
            if !(site.starts_with("http://") || site.starts_with("https://")) {
                return Err(ValidationError::new(
                    "website",
                    "must start with http:// or https://",
                ));
            }
        }
        let profile = RecruiterProfile {
            name: required("name", &self.name)?,
            company: required("company", &self.company)?,
            company_description: optional_bounded(
                "company_description",
                &self.company_description,
                MAX_LONG_TEXT_LEN,
            )?,
            phone: optional("phone", &self.phone)?,
            city: optional("city", &self.city)?,
            website,
        };
        Ok((email, profile))
    }
}

/// Job posting form; title, description, and location are mandatory.
#[derive(Debug, Clone, Deserialize)]
pub struct JobPosting {
    pub title: String,
    /// Defaults to the recruiter's company when omitted.
    #[serde(default)]
    pub company: Option<String>,
    pub description: String,
    pub location: String,
    #[serde(default)]
    pub job_type: Option<String>,
    #[serde(default)]
    pub salary: Option<String>,
    #[serde(default)]
    pub interview_date: Option<NaiveDate>,
    #[serde(default)]
    pub interview_time: Option<String>,
    #[serde(default)]
    pub interview_place: Option<String>,
}

impl JobPosting {
    pub fn validate(&self, default_company: &str) -> Result<JobDetails, ValidationError> {
        let company = match optional("company", &self.company)? {
            Some(company) => company,
            None => required("company", default_company)?,
        };
        Ok(JobDetails {
            title: required("title", &self.title)?,
            company,
            description: required_long("description", &self.description)?,
            location: required("location", &self.location)?,
            job_type: optional("job_type", &self.job_type)?,
            salary: optional("salary", &self.salary)?,
            interview_date: self.interview_date,
            interview_time: optional("interview_time", &self.interview_time)?,
            interview_place: optional("interview_place", &self.interview_place)?,
        })
    }
}

fn required_long(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new(field, "is required"));
    }
    bounded(field, trimmed, MAX_LONG_TEXT_LEN)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationForm {
    #[serde(default)]
    pub cover_note: Option<String>,
}

impl ApplicationForm {
    pub fn validate(&self) -> Result<Option<String>, ValidationError> {
        optional_bounded("cover_note", &self.cover_note, MAX_LONG_TEXT_LEN)
    }
}
