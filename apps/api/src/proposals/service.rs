//! Keyword extraction and change proposals backed by the language model.
//!
//! Transport failures propagate as `LlmError`. Malformed model output never does:
//! keywords degrade to an empty list and proposals go through the degrade chain
//! in `parser`.

use tracing::{info, warn};

use crate::diagnostics::DiagnosticObserver;
use crate::llm_client::{CompletionModel, LlmError};
use crate::proposals::parser::{parse_keywords, parse_proposals, ParsedProposals};
use crate::proposals::prompts::{
    build_keyword_prompt, build_proposal_prompt, KEYWORD_SYSTEM, PROPOSAL_SYSTEM,
};

/// Asks the model which ATS keywords the job description screens for.
pub async fn extract_keywords(
    model: &dyn CompletionModel,
    resume_text: &str,
    job_description: &str,
) -> Result<Vec<String>, LlmError> {
    let prompt = build_keyword_prompt(resume_text, job_description);
    let raw = model.complete(&prompt, KEYWORD_SYSTEM).await?;

    match parse_keywords(&raw) {
        Ok(keywords) => {
            info!(count = keywords.len(), "Extracted job keywords");
            Ok(keywords)
        }
        Err(e) => {
            warn!(error = %e, raw_payload = %raw, "Keyword payload unusable, continuing without keywords");
            Ok(Vec::new())
        }
    }
}

/// Asks the model for edits that work `keywords` into the resume.
pub async fn propose_changes(
    model: &dyn CompletionModel,
    observer: &dyn DiagnosticObserver,
    resume_text: &str,
    job_description: &str,
    keywords: &[String],
) -> Result<ParsedProposals, LlmError> {
    let prompt = build_proposal_prompt(resume_text, job_description, keywords);
    let raw = model.complete(&prompt, PROPOSAL_SYSTEM).await?;

    let parsed = parse_proposals(&raw, resume_text, observer);
    info!(
        count = parsed.changes.len(),
        source = ?parsed.source,
        "Parsed change proposals"
    );
    Ok(parsed)
}
