//! Resume file storage keyed by student.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use super::domain::StudentId;

const MAX_FILENAME_LEN: usize = 120;
const ALLOWED_EXTENSIONS: [&str; 5] = ["pdf", "doc", "docx", "odt", "txt"];

#[derive(Debug, thiserror::Error)]
pub enum ResumeError {
    #[error("invalid resume filename '{0}'")]
    InvalidFilename(String),
    #[error("unsupported resume type '{0}'; expected one of pdf, doc, docx, odt, txt")]
    UnsupportedType(String),
    #[error("resume is empty")]
    Empty,
    #[error("resume '{0}' not found")]
    Missing(String),
    #[error("resume storage failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Byte storage for uploaded resumes.
pub trait ResumeStorage: Send + Sync {
    fn store(&self, key: &str, bytes: &[u8]) -> Result<(), ResumeError>;
    fn load(&self, key: &str) -> Result<Vec<u8>, ResumeError>;
}

/// Builds the storage key `<student-id>_<filename>` from a client-supplied filename.
///
/// Path components are stripped and anything outside `[A-Za-z0-9._-]` becomes `_`.
pub fn resume_key(student: StudentId, filename: &str) -> Result<String, ResumeError> {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    let sanitized: String = base
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let sanitized = sanitized.trim_start_matches('.');
    if sanitized.is_empty() || sanitized.len() > MAX_FILENAME_LEN {
        return Err(ResumeError::InvalidFilename(filename.to_string()));
    }

    let extension = sanitized
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .ok_or_else(|| ResumeError::UnsupportedType(String::new()))?;
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ResumeError::UnsupportedType(extension));
    }

    Ok(format!("{student}_{sanitized}"))
}

/// Stores resumes as flat files under a root directory.
#[derive(Debug, Clone)]
pub struct FsResumeStorage {
    root: PathBuf,
}

impl FsResumeStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, key: &str) -> Result<PathBuf, ResumeError> {
        let safe = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_'));
        if !safe {
            return Err(ResumeError::InvalidFilename(key.to_string()));
        }
        Ok(self.root.join(key))
    }
}

impl ResumeStorage for FsResumeStorage {
    fn store(&self, key: &str, bytes: &[u8]) -> Result<(), ResumeError> {
        if bytes.is_empty() {
            return Err(ResumeError::Empty);
        }
        let path = self.path(key)?;
        fs::create_dir_all(&self.root)?;
        fs::write(path, bytes)?;
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Vec<u8>, ResumeError> {
        match fs::read(self.path(key)?) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(ResumeError::Missing(key.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }
}
