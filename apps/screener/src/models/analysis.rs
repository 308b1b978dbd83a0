use serde::{Deserialize, Serialize};

/// A validated scoring result: score in [1, 100], summary of 400+ chars, 3+ tags.
/// Only the scorer constructs these, after validation or as the fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub score: u8,
    pub summary: String,
    pub tags: Vec<String>,
}

impl AnalysisResult {
    pub fn joined_tags(&self) -> String {
        self.tags.join(", ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Success,
    Error,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Success => "success",
            RecordStatus::Error => "error",
        }
    }
}

/// One processed file. Terminal: written to the report, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub filename: String,
    pub score: u8,
    pub summary: String,
    /// Tags joined with ", ".
    pub tags: String,
    pub status: RecordStatus,
    /// Remote handle used for scoring; `None` when no upload happened.
    pub file_id: Option<String>,
}

impl ResultRecord {
    pub fn new(
        filename: impl Into<String>,
        result: AnalysisResult,
        status: RecordStatus,
        file_id: Option<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            score: result.score,
            tags: result.joined_tags(),
            summary: result.summary,
            status,
            file_id,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RecordStatus::Success
    }
}
