//! Orchestrator: sequences extraction, estimation, matching, positional patching
//! and the reflow fallback for one request.
//!
//! The orchestrator owns every document handle it opens. A positional attempt
//! that fails is dropped whole; the fallback always starts from the untouched
//! original bytes and text.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::diagnostics::{DiagnosticEvent, DiagnosticObserver};
use crate::document::{Canvas, ExtractionError, PdfCanvas, TextExtractor};
use crate::layout::reflow::apply_substitutions;
use crate::layout::{estimate, get_metrics, reflow, EstimatorConfig, FontFamily, ReflowConfig, ReflowError};
use crate::models::{ProposedChange, TextSpan};
use crate::patching::matcher::locate;
use crate::patching::positional::{patch, PatchConfig, PatchError, PatchSummary};

/// The only failures a caller ever sees. Positional failures are absorbed by the fallback.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("Reflow fallback failed: {0}")]
    Reflow(#[from] ReflowError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Nothing was selected, or nothing selected could be applied; the original
    /// bytes are returned untouched.
    Unchanged,
    Positional,
    Reflow,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Unchanged => "unchanged",
            Strategy::Positional => "positional",
            Strategy::Reflow => "reflow",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PatchRequest {
    pub document_bytes: Vec<u8>,
    /// Overrides extraction when present.
    pub full_text: Option<String>,
    /// Estimated from the text when empty.
    pub spans: Vec<TextSpan>,
    pub changes: Vec<ProposedChange>,
}

#[derive(Debug, Clone)]
pub struct PatchOutcome {
    pub bytes: Vec<u8>,
    pub strategy: Strategy,
    pub applied: Vec<String>,
    /// Selected changes that were not applied: unplaced, unmatched or rejected duplicates.
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub estimator: EstimatorConfig,
    pub patch: PatchConfig,
    pub reflow: ReflowConfig,
}

#[derive(Clone)]
pub struct Orchestrator {
    extractor: Arc<dyn TextExtractor>,
    observer: Arc<dyn DiagnosticObserver>,
    config: PipelineConfig,
}

impl Orchestrator {
    pub fn new(
        extractor: Arc<dyn TextExtractor>,
        observer: Arc<dyn DiagnosticObserver>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            extractor,
            observer,
            config,
        }
    }

    /// Extracted text plus its estimated layout, as the client sees it before choosing changes.
    pub fn extract_layout(&self, bytes: &[u8]) -> Result<(String, Vec<TextSpan>), ExtractionError> {
        let text = self.extractor.extract(bytes)?;
        let spans = estimate(&text, &self.config.estimator);
        Ok((text, spans))
    }

    /// Produces the edited document. Blocking and CPU-bound.
    pub fn run(&self, request: PatchRequest) -> Result<PatchOutcome, PipelineError> {
        let PatchRequest {
            document_bytes,
            full_text,
            spans,
            changes,
        } = request;

        if !changes.iter().any(|c| c.selected) {
            debug!("No selected changes, returning the original document");
            return Ok(PatchOutcome {
                bytes: document_bytes,
                strategy: Strategy::Unchanged,
                applied: Vec::new(),
                skipped: Vec::new(),
            });
        }

        let text = match full_text {
            Some(text) => text,
            None => self.extractor.extract(&document_bytes)?,
        };
        let spans = if spans.is_empty() {
            estimate(&text, &self.config.estimator)
        } else {
            spans
        };

        let (mut changes, rejected) = self.reject_duplicates(changes);
        self.attach_positions(&mut changes, &spans);

        info!(
            changes = changes.len(),
            spans = spans.len(),
            rejected = rejected.len(),
            "Applying proposed changes"
        );

        match self.try_positional(&document_bytes, &changes) {
            Ok((bytes, summary)) => {
                let mut skipped = summary.skipped;
                skipped.extend(rejected);
                Ok(PatchOutcome {
                    bytes,
                    strategy: Strategy::Positional,
                    applied: summary.applied,
                    skipped,
                })
            }
            Err(err) => {
                self.observer.emit(DiagnosticEvent::PositionalPatchFailed {
                    reason: err.to_string(),
                });
                self.reflow_fallback(&document_bytes, &changes, &text, rejected)
            }
        }
    }

    /// Keeps the first selected change for each normalized original text.
    ///
    /// Later repeats are removed from the batch and returned by id.
    fn reject_duplicates(&self, changes: Vec<ProposedChange>) -> (Vec<ProposedChange>, Vec<String>) {
        let mut first_seen: HashMap<String, String> = HashMap::new();
        let mut kept = Vec::with_capacity(changes.len());
        let mut rejected = Vec::new();

        for change in changes {
            if !change.selected {
                kept.push(change);
                continue;
            }
            let key = normalize_original(&change.original_text);
            match first_seen.get(&key) {
                Some(first_id) => {
                    self.observer.emit(DiagnosticEvent::DuplicateChange {
                        change_id: change.id.clone(),
                        duplicate_of: first_id.clone(),
                    });
                    rejected.push(change.id);
                }
                None => {
                    first_seen.insert(key, change.id.clone());
                    kept.push(change);
                }
            }
        }

        (kept, rejected)
    }

    /// Resolves a position for every selected change that arrived without one.
    fn attach_positions(&self, changes: &mut [ProposedChange], spans: &[TextSpan]) {
        for change in changes
            .iter_mut()
            .filter(|c| c.selected && c.position.is_none())
        {
            change.position = locate(&change.original_text, spans);
            if change.position.is_none() {
                self.observer.emit(DiagnosticEvent::MatchMiss {
                    change_id: change.id.clone(),
                    original_text: change.original_text.clone(),
                });
            }
        }
    }

    fn try_positional(
        &self,
        bytes: &[u8],
        changes: &[ProposedChange],
    ) -> Result<(Vec<u8>, PatchSummary), PatchError> {
        let mut canvas = PdfCanvas::load(bytes)?;
        let summary = patch(&mut canvas, changes, &self.config.patch, self.observer.as_ref())?;
        let bytes = canvas.save()?;
        Ok((bytes, summary))
    }

    fn reflow_fallback(
        &self,
        original_bytes: &[u8],
        changes: &[ProposedChange],
        text: &str,
        rejected: Vec<String>,
    ) -> Result<PatchOutcome, PipelineError> {
        let (_, applicable, unmatched) = apply_substitutions(text, changes);
        if applicable.is_empty() {
            info!(
                unmatched = unmatched.len(),
                "No change applies to the text; returning the original document"
            );
            for change_id in &unmatched {
                self.observer.emit(DiagnosticEvent::ChangeSkipped {
                    change_id: change_id.clone(),
                    reason: "original text not found in document".to_string(),
                });
            }
            let mut skipped = unmatched;
            skipped.extend(rejected);
            return Ok(PatchOutcome {
                bytes: original_bytes.to_vec(),
                strategy: Strategy::Unchanged,
                applied: Vec::new(),
                skipped,
            });
        }

        let geometry = PdfCanvas::load(original_bytes)
            .ok()
            .and_then(|original| original.page_size(0).ok());

        let reflow_config = &self.config.reflow;
        let measure = get_metrics(&FontFamily::from_font_name(&reflow_config.font_name));
        let mut canvas = PdfCanvas::new();
        let summary = reflow(&mut canvas, measure, geometry, changes, text, reflow_config)?;
        let bytes = canvas.save().map_err(ReflowError::from)?;

        self.observer.emit(DiagnosticEvent::ReflowApplied {
            pages: summary.pages,
            applied: summary.applied.len(),
            unmatched: summary.unmatched.clone(),
        });

        let mut skipped = summary.unmatched;
        skipped.extend(rejected);
        Ok(PatchOutcome {
            bytes,
            strategy: Strategy::Reflow,
            applied: summary.applied,
            skipped,
        })
    }
}

fn normalize_original(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
