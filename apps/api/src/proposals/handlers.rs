use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::ProposedChange;
use crate::proposals::parser::PayloadSource;
use crate::proposals::service::{extract_keywords, propose_changes};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ProposalRequest {
    pub resume_text: String,
    pub job_description: String,
}

#[derive(Debug, Serialize)]
pub struct ProposalResponse {
    pub keywords: Vec<String>,
    pub changes: Vec<ProposedChange>,
    pub source: PayloadSource,
}

/// POST /api/v1/resume/proposals
pub async fn handle_propose(
    State(state): State<AppState>,
    Json(req): Json<ProposalRequest>,
) -> Result<Json<ProposalResponse>, AppError> {
    if req.resume_text.trim().is_empty() {
        return Err(AppError::Validation("resume_text must not be empty".to_string()));
    }
    if req.job_description.trim().is_empty() {
        return Err(AppError::Validation(
            "job_description must not be empty".to_string(),
        ));
    }

    let model = state.model.as_ref();
    let keywords = extract_keywords(model, &req.resume_text, &req.job_description).await?;
    let parsed = propose_changes(
        model,
        state.observer.as_ref(),
        &req.resume_text,
        &req.job_description,
        &keywords,
    )
    .await?;

    Ok(Json(ProposalResponse {
        keywords,
        changes: parsed.changes,
        source: parsed.source,
    }))
}
