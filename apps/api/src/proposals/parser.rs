//! Parsing of model output into proposed changes.
//!
//! Proposals go through a three-stage chain: a direct parse of the payload, then a
//! parse of the first JSON object or array embedded in surrounding prose, then a
//! synthesised placeholder. The chain always yields a usable batch; every stage
//! that fails is reported to the diagnostic observer with the raw payload.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::diagnostics::{DiagnosticEvent, DiagnosticObserver};
use crate::llm_client::strip_json_fences;
use crate::models::{normalize_changes, ChangeType, ProposedChange, RawProposedChange};

lazy_static! {
    static ref EMBEDDED_OBJECT: Regex = Regex::new(r"(?s)\{.*\}").unwrap();
    static ref EMBEDDED_ARRAY: Regex = Regex::new(r"(?s)\[.*\]").unwrap();
}

/// Id given to the synthesised placeholder change.
pub const PLACEHOLDER_ID: &str = "placeholder-1";

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("payload contains no usable changes")]
    NoChanges,

    #[error("no JSON object or array found in payload")]
    NoEmbeddedJson,
}

/// Which stage of the chain produced the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadSource {
    Direct,
    Embedded,
    Placeholder,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParsedProposals {
    pub changes: Vec<ProposedChange>,
    pub source: PayloadSource,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ChangesPayload {
    Envelope {
        #[serde(alias = "proposedChanges", alias = "proposed_changes", alias = "suggestions")]
        changes: Vec<RawProposedChange>,
    },
    List(Vec<RawProposedChange>),
}

impl ChangesPayload {
    fn into_raw(self) -> Vec<RawProposedChange> {
        match self {
            ChangesPayload::Envelope { changes } | ChangesPayload::List(changes) => changes,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum KeywordsPayload {
    Envelope { keywords: Vec<String> },
    List(Vec<String>),
}

// ────────────────────────────────────────────────────────────────────────────
// Proposals
// ────────────────────────────────────────────────────────────────────────────

/// Runs the full degrade chain. Never fails.
pub fn parse_proposals(
    raw: &str,
    resume_text: &str,
    observer: &dyn DiagnosticObserver,
) -> ParsedProposals {
    let report = |stage: &'static str, err: &PayloadError| {
        observer.emit(DiagnosticEvent::ProposalPayloadDegraded {
            stage,
            reason: err.to_string(),
            raw_payload: raw.to_string(),
        });
    };

    parse_changes_strict(raw)
        .map(|changes| ParsedProposals {
            changes,
            source: PayloadSource::Direct,
        })
        .or_else(|err| {
            report("direct", &err);
            parse_embedded(raw).map(|changes| ParsedProposals {
                changes,
                source: PayloadSource::Embedded,
            })
        })
        .unwrap_or_else(|err| {
            report("embedded", &err);
            ParsedProposals {
                changes: vec![placeholder_change(resume_text)],
                source: PayloadSource::Placeholder,
            }
        })
}

/// Parses the payload as-is, after removing markdown fences.
///
/// Accepts `{"changes": [...]}` and a bare `[...]`. A batch that normalizes to
/// nothing is an error.
pub fn parse_changes_strict(raw: &str) -> Result<Vec<ProposedChange>, PayloadError> {
    let changes = parse_change_list(raw)?;
    if changes.is_empty() {
        return Err(PayloadError::NoChanges);
    }
    Ok(changes)
}

/// Parses and normalizes a change batch, which may be empty.
///
/// Used for batches posted by clients, where an empty or all-unselected batch is legitimate.
pub fn parse_change_list(raw: &str) -> Result<Vec<ProposedChange>, PayloadError> {
    let payload: ChangesPayload = serde_json::from_str(strip_json_fences(raw))?;
    Ok(normalize_changes(payload.into_raw()))
}

/// Finds JSON embedded in prose, object first, then array.
pub fn parse_embedded(raw: &str) -> Result<Vec<ProposedChange>, PayloadError> {
    let mut last_error = PayloadError::NoEmbeddedJson;
    for pattern in [&*EMBEDDED_OBJECT, &*EMBEDDED_ARRAY] {
        if let Some(found) = pattern.find(raw) {
            match parse_changes_strict(found.as_str()) {
                Ok(changes) => return Ok(changes),
                Err(err) => last_error = err,
            }
        }
    }
    Err(last_error)
}

/// An unselected no-op change, so downstream steps always receive a batch.
pub fn placeholder_change(resume_text: &str) -> ProposedChange {
    let line = resume_text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("resume")
        .to_string();

    ProposedChange {
        id: PLACEHOLDER_ID.to_string(),
        original_text: line.clone(),
        modified_text: line,
        context: "Model output could not be parsed; no edits proposed.".to_string(),
        change_type: ChangeType::Phrasing,
        keywords: Default::default(),
        selected: false,
        position: None,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Keywords
// ────────────────────────────────────────────────────────────────────────────

/// Parses a keyword list, trimming entries and dropping case-insensitive repeats.
pub fn parse_keywords(raw: &str) -> Result<Vec<String>, PayloadError> {
    let parsed: KeywordsPayload = match serde_json::from_str(strip_json_fences(raw)) {
        Ok(parsed) => parsed,
        Err(err) => {
            let embedded = EMBEDDED_ARRAY.find(raw).ok_or(PayloadError::Json(err))?;
            serde_json::from_str(embedded.as_str())?
        }
    };
    let keywords = match parsed {
        KeywordsPayload::Envelope { keywords } | KeywordsPayload::List(keywords) => keywords,
    };

    let mut seen = std::collections::HashSet::new();
    Ok(keywords
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty() && seen.insert(k.to_lowercase()))
        .collect())
}
