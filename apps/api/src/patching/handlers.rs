use axum::{
    extract::{Multipart, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::TextSpan;
use crate::patching::orchestrator::PatchRequest;
use crate::proposals::parser::parse_change_list;
use crate::state::AppState;

pub const STRATEGY_HEADER: &str = "x-refit-strategy";
pub const APPLIED_HEADER: &str = "x-refit-applied";

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub text: String,
    pub spans: Vec<TextSpan>,
}

/// Multipart fields accepted by the resume endpoints.
#[derive(Default)]
struct UploadForm {
    file: Option<Vec<u8>>,
    changes: Option<String>,
    text: Option<String>,
    spans: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let invalid = |e: axum::extract::multipart::MultipartError| {
            AppError::Validation(format!("Unreadable field '{name}': {e}"))
        };
        match name.as_str() {
            "file" => form.file = Some(field.bytes().await.map_err(invalid)?.to_vec()),
            "changes" => form.changes = Some(field.text().await.map_err(invalid)?),
            "text" => form.text = Some(field.text().await.map_err(invalid)?),
            "spans" => form.spans = Some(field.text().await.map_err(invalid)?),
            _ => {}
        }
    }
    Ok(form)
}

fn require_file(form: &mut UploadForm) -> Result<Vec<u8>, AppError> {
    form.file
        .take()
        .filter(|bytes| !bytes.is_empty())
        .ok_or_else(|| AppError::Validation("Multipart field 'file' is required".to_string()))
}

/// POST /api/v1/resume/extract
pub async fn handle_extract(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ExtractResponse>, AppError> {
    let mut form = read_form(multipart).await?;
    let bytes = require_file(&mut form)?;

    let orchestrator = state.orchestrator.clone();
    let (text, spans) = tokio::task::spawn_blocking(move || orchestrator.extract_layout(&bytes))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("spawn_blocking failed in extract: {e}")))??;

    Ok(Json(ExtractResponse { text, spans }))
}

/// POST /api/v1/resume/apply
pub async fn handle_apply(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut form = read_form(multipart).await?;
    let document_bytes = require_file(&mut form)?;

    let changes = match form.changes.as_deref() {
        Some(raw) => parse_change_list(raw)
            .map_err(|e| AppError::Validation(format!("Invalid 'changes' payload: {e}")))?,
        None => Vec::new(),
    };
    let spans: Vec<TextSpan> = match form.spans.as_deref() {
        Some(raw) if !raw.trim().is_empty() => serde_json::from_str(raw)
            .map_err(|e| AppError::Validation(format!("Invalid 'spans' payload: {e}")))?,
        _ => Vec::new(),
    };
    let full_text = form.text.filter(|t| !t.trim().is_empty());

    let request_id = Uuid::new_v4();
    info!(
        %request_id,
        bytes = document_bytes.len(),
        changes = changes.len(),
        "Applying resume changes"
    );

    let orchestrator = state.orchestrator.clone();
    let request = PatchRequest {
        document_bytes,
        full_text,
        spans,
        changes,
    };
    let outcome = tokio::task::spawn_blocking(move || orchestrator.run(request))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("spawn_blocking failed in apply: {e}")))??;

    info!(
        %request_id,
        strategy = outcome.strategy.as_str(),
        applied = outcome.applied.len(),
        skipped = outcome.skipped.len(),
        "Resume changes applied"
    );

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"resume.pdf\"".to_string(),
            ),
            (
                header::HeaderName::from_static(STRATEGY_HEADER),
                outcome.strategy.as_str().to_string(),
            ),
            (
                header::HeaderName::from_static(APPLIED_HEADER),
                outcome.applied.len().to_string(),
            ),
        ],
        outcome.bytes,
    ))
}
