//! Job description loading. A missing or too-short description is a
//! configuration fault: the run stops before touching any resume.

use std::path::Path;

use anyhow::{Context, Result};
use thiserror::Error;

/// Shorter descriptions do not give the model enough to score against.
pub const MIN_JOB_DESCRIPTION_CHARS: usize = 100;

#[derive(Debug, Error, PartialEq)]
pub enum JobError {
    #[error("Job description too short ({len} characters; minimum 100 for accurate analysis)")]
    TooShort { len: usize },
}

/// Immutable, trimmed job description of at least 100 characters.
#[derive(Debug, Clone, PartialEq)]
pub struct JobDescription(String);

impl JobDescription {
    pub fn new(text: &str) -> Result<Self, JobError> {
        let text = text.trim();
        let len = text.chars().count();
        if len < MIN_JOB_DESCRIPTION_CHARS {
            return Err(JobError::TooShort { len });
        }
        Ok(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }

    /// First 200 characters on one line, for the startup log.
    pub fn preview(&self) -> String {
        self.0
            .chars()
            .take(200)
            .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
            .collect()
    }
}

/// Reads and validates the job description file.
pub fn load_job_description(path: &Path) -> Result<JobDescription> {
    let raw = std::fs::read_to_string(path).with_context(|| {
        format!(
            "{} not found or unreadable. Create it with your job description",
            path.display()
        )
    })?;
    Ok(JobDescription::new(&raw)?)
}
