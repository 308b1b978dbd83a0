//! Scorer: one resume against one job description, through the model endpoint.
//!
//! Per file: build the instruction block → call the endpoint → pull a JSON
//! object out of the reply → validate its shape. A validation fault retries the
//! whole round-trip (bounded, with a fixed delay). Exhausted retries or any
//! endpoint fault produce the fallback record instead of an error, so nothing
//! here can abort the batch.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::llm_client::prompts::{JSON_ONLY_INSTRUCTION, RECRUITER_SYSTEM};
use crate::llm_client::{strip_json_fences, ContentPart, LlmError, ModelEndpoint};
use crate::models::analysis::AnalysisResult;
use crate::screening::job::JobDescription;
use crate::screening::prompts::{
    ANALYSIS_PROMPT_TEMPLATE, ATTACHED_FILE_NOTE, ATTACHED_RESUME_SECTION, INLINE_RESUME_SECTION,
};

/// Round-trips per file, first attempt included.
pub const MAX_ATTEMPTS: u32 = 2;
pub const MIN_SUMMARY_CHARS: usize = 400;
pub const MIN_TAGS: usize = 3;
pub const FALLBACK_SCORE: u8 = 50;
pub const FALLBACK_TAGS: [&str; 3] = [
    "manual_review_needed",
    "analysis_incomplete",
    "requires_human_assessment",
];

/// A shape violation in the model's reply. These are the only faults that retry.
#[derive(Debug, Error, PartialEq)]
pub enum ScoreError {
    #[error("Empty response from model")]
    EmptyReply,

    #[error("No JSON found in response")]
    NoJson,

    #[error("Invalid JSON: {0}")]
    Json(String),

    #[error("Score must be an integer")]
    ScoreNotInteger,

    #[error("Score must be between 1-100, got {0}")]
    ScoreOutOfRange(String),

    #[error("Summary must be a string")]
    SummaryNotString,

    #[error("Summary must be at least 400 characters, got {0}")]
    SummaryTooShort(usize),

    #[error("Tags must be a list")]
    TagsNotList,

    #[error("Must provide at least 3 tags, got {0}")]
    TooFewTags(usize),
}

/// What the model is shown: a previously uploaded file or extracted text.
#[derive(Debug, Clone, Copy)]
pub enum ResumeInput<'a> {
    RemoteFile { filename: &'a str, file_id: &'a str },
    Text { filename: &'a str, text: &'a str },
}

impl<'a> ResumeInput<'a> {
    pub fn filename(&self) -> &'a str {
        match *self {
            ResumeInput::RemoteFile { filename, .. } | ResumeInput::Text { filename, .. } => {
                filename
            }
        }
    }
}

/// Terminal state of one scoring run. Only `Valid` counts as a success.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreOutcome {
    Valid(AnalysisResult),
    Fallback {
        result: AnalysisResult,
        reason: String,
    },
}

impl ScoreOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ScoreOutcome::Valid(_))
    }

    pub fn into_result(self) -> AnalysisResult {
        match self {
            ScoreOutcome::Valid(result) | ScoreOutcome::Fallback { result, .. } => result,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScorerSettings {
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for ScorerSettings {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            retry_delay: Duration::from_secs(2),
        }
    }
}

#[derive(Clone)]
pub struct Scorer {
    endpoint: Arc<dyn ModelEndpoint>,
    settings: ScorerSettings,
}

impl Scorer {
    pub fn new(endpoint: Arc<dyn ModelEndpoint>, settings: ScorerSettings) -> Self {
        Self { endpoint, settings }
    }

    /// Scores one resume. Never fails: faults end in `ScoreOutcome::Fallback`.
    pub async fn score(&self, input: &ResumeInput<'_>, job: &JobDescription) -> ScoreOutcome {
        let filename = input.filename();
        let parts = build_parts(input, job);
        let max_attempts = self.settings.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                info!("Retry attempt {}/{} for {}", attempt, max_attempts, filename);
            }

            let parsed = match self.endpoint.complete(RECRUITER_SYSTEM, &parts).await {
                Ok(reply) => parse_analysis(&reply),
                Err(LlmError::EmptyContent) => Err(ScoreError::EmptyReply),
                Err(e) => {
                    warn!("Analysis error for {}: {}", filename, e);
                    let reason = e.to_string();
                    return ScoreOutcome::Fallback {
                        result: fallback_result(filename, Some(&reason)),
                        reason,
                    };
                }
            };

            match parsed {
                Ok(result) => {
                    info!(
                        "Score: {} | Tags: {}",
                        result.score,
                        result
                            .tags
                            .iter()
                            .take(3)
                            .cloned()
                            .collect::<Vec<_>>()
                            .join(", ")
                    );
                    return ScoreOutcome::Valid(result);
                }
                Err(e) if attempt < max_attempts => {
                    warn!("Attempt {} failed for {}: {}", attempt, filename, e);
                    tokio::time::sleep(self.settings.retry_delay).await;
                }
                Err(e) => {
                    warn!(
                        "Attempt {} failed for {}: {}. All attempts failed, using fallback response",
                        attempt, filename, e
                    );
                    return ScoreOutcome::Fallback {
                        result: fallback_result(filename, None),
                        reason: e.to_string(),
                    };
                }
            }
        }

        // max_attempts >= 1, so the loop always returns
        ScoreOutcome::Fallback {
            result: fallback_result(filename, None),
            reason: "no attempts made".to_string(),
        }
    }
}

fn build_parts(input: &ResumeInput<'_>, job: &JobDescription) -> Vec<ContentPart> {
    let prompt = |resume_section: &str| {
        fill_template(
            ANALYSIS_PROMPT_TEMPLATE,
            &[
                ("{job_description}", job.as_str()),
                ("{resume_section}", resume_section),
                ("{json_only}", JSON_ONLY_INSTRUCTION),
            ],
        )
    };

    match input {
        ResumeInput::RemoteFile { filename, file_id } => vec![
            ContentPart::text(prompt(ATTACHED_RESUME_SECTION)),
            ContentPart::text(ATTACHED_FILE_NOTE.replace("{filename}", filename)),
            ContentPart::file(*file_id),
        ],
        ResumeInput::Text { text, .. } => vec![ContentPart::text(prompt(
            &INLINE_RESUME_SECTION.replace("{resume_text}", text),
        ))],
    }
}

/// Single-pass placeholder substitution. Inserted values are never rescanned,
/// so a job description or resume containing `{resume_section}` stays literal.
fn fill_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match vars.iter().find(|(key, _)| tail.starts_with(key)) {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len()..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Extracts and validates the analysis object from a free-form reply.
pub fn parse_analysis(reply: &str) -> Result<AnalysisResult, ScoreError> {
    validate(&extract_json_object(reply)?)
}

/// Parses the reply as a bare (optionally fenced) JSON object first. When that
/// fails, falls back to the span from the first `{` to the last `}`, which
/// tolerates prose around a single object but not stray braces in that prose.
fn extract_json_object(reply: &str) -> Result<Value, ScoreError> {
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(strip_json_fences(reply)) {
        return Ok(value);
    }

    let start = reply.find('{').ok_or(ScoreError::NoJson)?;
    let end = reply.rfind('}').ok_or(ScoreError::NoJson)?;
    if end < start {
        return Err(ScoreError::NoJson);
    }

    serde_json::from_str(&reply[start..=end]).map_err(|e| ScoreError::Json(e.to_string()))
}

fn validate(value: &Value) -> Result<AnalysisResult, ScoreError> {
    let score = match value.get("score") {
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => n,
        _ => return Err(ScoreError::ScoreNotInteger),
    };
    let score = match score.as_i64() {
        Some(s @ 1..=100) => s as u8,
        _ => return Err(ScoreError::ScoreOutOfRange(score.to_string())),
    };

    let summary = value
        .get("summary")
        .and_then(Value::as_str)
        .ok_or(ScoreError::SummaryNotString)?;
    let summary_len = summary.trim().chars().count();
    if summary_len < MIN_SUMMARY_CHARS {
        return Err(ScoreError::SummaryTooShort(summary_len));
    }

    let tags = value
        .get("tags")
        .and_then(Value::as_array)
        .ok_or(ScoreError::TagsNotList)?;
    if tags.len() < MIN_TAGS {
        return Err(ScoreError::TooFewTags(tags.len()));
    }
    let tags = tags
        .iter()
        .map(|t| match t {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect();

    Ok(AnalysisResult {
        score,
        summary: summary.to_string(),
        tags,
    })
}

/// Deterministic stand-in used whenever scoring cannot finish validly.
pub fn fallback_result(filename: &str, error: Option<&str>) -> AnalysisResult {
    let mut summary = format!("Analysis of {filename} could not be completed automatically. ");
    if let Some(error) = error {
        summary.push_str(&format!("Error: {error}. "));
    }
    summary.push_str(
        "Manual review recommended to assess the candidate's qualifications, experience, \
        and fit for the role. Please review the CV directly to evaluate technical skills, \
        work history, education, and overall presentation. Consider scheduling an interview \
        if the candidate meets basic requirements based on manual assessment.",
    );

    AnalysisResult {
        score: FALLBACK_SCORE,
        summary,
        tags: FALLBACK_TAGS.iter().map(|t| t.to_string()).collect(),
    }
}
