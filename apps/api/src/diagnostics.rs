//! Structured diagnostic events emitted by the patching pipeline and the proposal parser.
//!
//! Recoverable problems (a change that found no position, a positional patch that
//! had to be abandoned, a model payload that needed repair) are reported here
//! instead of being logged inline, so the control flow never depends on logging.

use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DiagnosticEvent {
    /// The matcher could not place a change anywhere in the estimated layout.
    MatchMiss {
        change_id: String,
        original_text: String,
    },
    /// A selected change was left out by the positional strategy.
    ChangeSkipped { change_id: String, reason: String },
    /// A change repeats the original text of an earlier change in the batch.
    DuplicateChange {
        change_id: String,
        duplicate_of: String,
    },
    /// Positional patching was abandoned; the reflow strategy takes over.
    PositionalPatchFailed { reason: String },
    ReflowApplied {
        pages: usize,
        applied: usize,
        unmatched: Vec<String>,
    },
    /// A model payload failed one parsing stage and fell through to the next.
    ProposalPayloadDegraded {
        stage: &'static str,
        reason: String,
        raw_payload: String,
    },
}

/// Receives diagnostic events. Implementations must not fail or block.
pub trait DiagnosticObserver: Send + Sync {
    fn emit(&self, event: DiagnosticEvent);
}

/// Forwards every event to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl DiagnosticObserver for TracingObserver {
    fn emit(&self, event: DiagnosticEvent) {
        match event {
            DiagnosticEvent::MatchMiss {
                change_id,
                original_text,
            } => info!(%change_id, %original_text, "No position found for change"),
            DiagnosticEvent::ChangeSkipped { change_id, reason } => {
                info!(%change_id, %reason, "Change skipped by positional patch")
            }
            DiagnosticEvent::DuplicateChange {
                change_id,
                duplicate_of,
            } => warn!(%change_id, %duplicate_of, "Rejecting ambiguous duplicate change"),
            DiagnosticEvent::PositionalPatchFailed { reason } => {
                warn!(%reason, "Positional patch failed, falling back to reflow")
            }
            DiagnosticEvent::ReflowApplied {
                pages,
                applied,
                unmatched,
            } => info!(pages, applied, ?unmatched, "Document regenerated by reflow"),
            DiagnosticEvent::ProposalPayloadDegraded {
                stage,
                reason,
                raw_payload,
            } => warn!(stage, %reason, %raw_payload, "Proposal payload could not be parsed"),
        }
    }
}

/// Keeps every event in memory, in emission order.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct CollectingObserver {
    events: std::sync::Mutex<Vec<DiagnosticEvent>>,
}

#[cfg(test)]
impl CollectingObserver {
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl DiagnosticObserver for CollectingObserver {
    fn emit(&self, event: DiagnosticEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_tag() {
        let event = DiagnosticEvent::PositionalPatchFailed {
            reason: "page 3 out of range".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "positional_patch_failed");
        assert_eq!(json["reason"], "page 3 out of range");
    }

    #[test]
    fn test_collecting_observer_keeps_order() {
        let observer = CollectingObserver::default();
        observer.emit(DiagnosticEvent::PositionalPatchFailed {
            reason: "a".to_string(),
        });
        observer.emit(DiagnosticEvent::ChangeSkipped {
            change_id: "c1".to_string(),
            reason: "b".to_string(),
        });
        let events = observer.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], DiagnosticEvent::ChangeSkipped { .. }));
    }

    #[test]
    fn test_tracing_observer_accepts_every_variant() {
        TracingObserver.emit(DiagnosticEvent::ReflowApplied {
            pages: 2,
            applied: 1,
            unmatched: vec!["c9".to_string()],
        });
        TracingObserver.emit(DiagnosticEvent::MatchMiss {
            change_id: "c1".to_string(),
            original_text: "nowhere".to_string(),
        });
    }
}
