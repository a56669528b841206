use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::span::TextSpan;

/// Kind of edit the proposal service suggested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Keyword,
    Phrasing,
    #[default]
    Enhancement,
}

impl ChangeType {
    /// Lenient parse of the loosely typed string coming back from the model.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "keyword" | "keywords" => ChangeType::Keyword,
            "phrasing" | "rephrase" | "wording" => ChangeType::Phrasing,
            _ => ChangeType::Enhancement,
        }
    }
}

/// A fully populated, validated text substitution.
///
/// Only the orchestrator mutates a change after normalization, and only to attach `position`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposedChange {
    pub id: String,
    pub original_text: String,
    pub modified_text: String,
    pub context: String,
    pub change_type: ChangeType,
    pub keywords: BTreeSet<String>,
    pub selected: bool,
    pub position: Option<TextSpan>,
}

/// Wire form of a change as produced by the model or posted by a client.
///
/// Every field is optional; `normalize_changes` is the only way to turn these
/// into `ProposedChange` values.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProposedChange {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default, alias = "originalText")]
    pub original_text: Option<String>,
    #[serde(default, alias = "modifiedText")]
    pub modified_text: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default, alias = "changeType", alias = "type")]
    pub change_type: Option<String>,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    #[serde(default)]
    pub selected: Option<bool>,
    #[serde(default)]
    pub position: Option<TextSpan>,
}

/// Turns raw proposals into strongly typed changes with every field defaulted.
///
/// Entries without usable `original_text` are dropped. Ids are made unique within the batch.
pub fn normalize_changes(raw: Vec<RawProposedChange>) -> Vec<ProposedChange> {
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut changes = Vec::with_capacity(raw.len());

    for (index, entry) in raw.into_iter().enumerate() {
        let original_text = match entry.original_text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => {
                warn!(index, "Dropping proposed change with empty originalText");
                continue;
            }
        };

        let base_id = entry
            .id
            .as_ref()
            .and_then(id_from_value)
            .unwrap_or_else(|| format!("change-{}", index + 1));
        let id = unique_id(base_id, &mut seen_ids);

        let modified_text = match entry.modified_text {
            Some(m) if !m.trim().is_empty() => m,
            Some(_) => {
                warn!(
                    index,
                    change_id = %id,
                    "Blank modifiedText, keeping originalText so the change is a no-op"
                );
                original_text.clone()
            }
            None => original_text.clone(),
        };

        changes.push(ProposedChange {
            id,
            original_text,
            modified_text,
            context: entry.context.unwrap_or_default(),
            change_type: entry
                .change_type
                .as_deref()
                .map(ChangeType::parse_lenient)
                .unwrap_or_default(),
            keywords: entry
                .keywords
                .unwrap_or_default()
                .into_iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
            selected: entry.selected.unwrap_or(true),
            position: entry.position,
        });
    }

    changes
}

/// Models emit ids as strings or numbers.
fn id_from_value(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn unique_id(base: String, seen: &mut HashSet<String>) -> String {
    if seen.insert(base.clone()) {
        return base;
    }
    let mut suffix = 2;
    loop {
        let candidate = format!("{base}-{suffix}");
        if seen.insert(candidate.clone()) {
            return candidate;
        }
        suffix += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(original: Option<&str>) -> RawProposedChange {
        RawProposedChange {
            original_text: original.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let changes = normalize_changes(vec![raw(Some("Built web apps."))]);
        assert_eq!(changes.len(), 1);
        let change = &changes[0];
        assert_eq!(change.id, "change-1");
        assert_eq!(change.modified_text, "Built web apps.");
        assert_eq!(change.change_type, ChangeType::Enhancement);
        assert!(change.selected);
        assert!(change.keywords.is_empty());
        assert!(change.position.is_none());
    }

    #[test]
    fn test_blank_original_text_is_dropped() {
        let changes = normalize_changes(vec![raw(None), raw(Some("   ")), raw(Some("Used SQL."))]);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].original_text, "Used SQL.");
        // index-based id survives the dropped entries
        assert_eq!(changes[0].id, "change-3");
    }

    #[test]
    fn test_blank_modified_text_keeps_original() {
        let mut blank = raw(Some("Used SQL."));
        blank.modified_text = Some("  \n ".to_string());
        let mut rewritten = raw(Some("Built web apps."));
        rewritten.modified_text = Some("Built web applications.".to_string());

        let changes = normalize_changes(vec![blank, rewritten]);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].modified_text, "Used SQL.");
        assert_eq!(changes[1].modified_text, "Built web applications.");
    }

    #[test]
    fn test_duplicate_ids_get_suffix() {
        let mut a = raw(Some("one"));
        a.id = Some(serde_json::json!("x"));
        let mut b = raw(Some("two"));
        b.id = Some(serde_json::json!("x"));
        let changes = normalize_changes(vec![a, b]);
        assert_eq!(changes[0].id, "x");
        assert_eq!(changes[1].id, "x-2");
    }

    #[test]
    fn test_numeric_id_and_camel_case_keys() {
        let json = r#"{"id": 7, "originalText": "Used SQL.", "modifiedText": "Used PostgreSQL.",
                       "changeType": "keyword", "keywords": ["PostgreSQL", " "], "selected": false}"#;
        let parsed: RawProposedChange = serde_json::from_str(json).unwrap();
        let change = normalize_changes(vec![parsed]).remove(0);
        assert_eq!(change.id, "7");
        assert_eq!(change.change_type, ChangeType::Keyword);
        assert_eq!(change.keywords.len(), 1);
        assert!(!change.selected);
    }

    #[test]
    fn test_unknown_change_type_falls_back_to_enhancement() {
        assert_eq!(ChangeType::parse_lenient("Rephrase"), ChangeType::Phrasing);
        assert_eq!(ChangeType::parse_lenient("mystery"), ChangeType::Enhancement);
    }
}
