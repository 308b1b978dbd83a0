use axum::{extract::State, Json};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::AppError;
use crate::extract::{extract_text, DocumentKind, ExtractError};
use crate::models::analysis::RecordStatus;
use crate::screening::job::JobDescription;
use crate::screening::scorer::{ResumeInput, Scorer};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AnalyzeCvRequest {
    /// Base64-encoded document bytes.
    pub file_data: String,
    pub filename: String,
    /// MIME type of the document.
    pub file_type: String,
    pub job_description: String,
    pub openai_api_key: String,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeCvResponse {
    pub extracted_text: String,
    pub score: u8,
    pub summary: String,
    pub tags: Vec<String>,
    pub status: RecordStatus,
}

/// POST /analyze-cv
pub async fn handle_analyze_cv(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeCvRequest>,
) -> Result<Json<AnalyzeCvResponse>, AppError> {
    let api_key = req.openai_api_key.trim();
    if api_key.is_empty() {
        return Err(AppError::Validation("openai_api_key is required".to_string()));
    }
    let job = JobDescription::new(&req.job_description)
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let kind = DocumentKind::from_mime(&req.file_type).ok_or_else(|| {
        AppError::Validation(format!("Unsupported file type: {}", req.file_type))
    })?;
    let bytes = STANDARD
        .decode(req.file_data.trim())
        .map_err(|e| AppError::Validation(format!("Invalid base64 file data: {e}")))?;

    let text = tokio::task::spawn_blocking(move || extract_text(&bytes, kind))
        .await
        .map_err(|e| AppError::Internal(e.into()))?
        .map_err(|e| match e {
            ExtractError::Empty => {
                AppError::Validation("No text could be extracted from the file".to_string())
            }
            other => AppError::Validation(format!("Failed to extract text: {other}")),
        })?;
    info!("Extracted {} chars from {}", text.chars().count(), req.filename);

    let scorer = Scorer::new((state.endpoints)(api_key), state.scorer_settings.clone());
    let input = ResumeInput::Text {
        filename: &req.filename,
        text: &text,
    };
    let outcome = scorer.score(&input, &job).await;
    let status = if outcome.is_valid() {
        RecordStatus::Success
    } else {
        RecordStatus::Error
    };
    let result = outcome.into_result();

    Ok(Json(AnalyzeCvResponse {
        extracted_text: text,
        score: result.score,
        summary: result.summary,
        tags: result.tags,
        status,
    }))
}
