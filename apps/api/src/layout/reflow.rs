//! Reflow Fallback: re-lays the substituted text from scratch onto fresh pages.
//!
//! Used when positional patching is impossible. Original line breaks survive
//! only as paragraph boundaries; everything inside a line is greedily
//! word-wrapped to the printable width and paginated.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::document::{Canvas, DocumentError, PageGeometry, TextMeasure, LETTER};
use crate::models::ProposedChange;

#[derive(Debug, Error)]
pub enum ReflowError {
    #[error("Reflow drawing failed: {0}")]
    Draw(#[from] DocumentError),

    #[error("Page {width}x{height} leaves no printable area with a {margin}pt margin")]
    NoPrintableArea { width: f32, height: f32, margin: f32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflowConfig {
    pub margin: f32,
    pub font_size: f32,
    pub line_height: f32,
    pub font_name: String,
    /// Used when the original document's page size is unknown.
    pub fallback_page: PageGeometry,
}

pub fn default_reflow_config() -> ReflowConfig {
    ReflowConfig {
        margin: 50.0,
        font_size: 11.0,
        line_height: 14.0,
        font_name: "Helvetica".to_string(),
        fallback_page: LETTER,
    }
}

impl Default for ReflowConfig {
    fn default() -> Self {
        default_reflow_config()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReflowSummary {
    pub pages: usize,
    pub lines_drawn: usize,
    /// Ids of selected changes whose original text was found and replaced.
    pub applied: Vec<String>,
    /// Ids of selected changes whose original text does not occur in the document.
    pub unmatched: Vec<String>,
}

/// Applies every selected change to `full_text` and lays the result out on new pages of `canvas`.
pub fn reflow(
    canvas: &mut dyn Canvas,
    measure: &dyn TextMeasure,
    original_geometry: Option<PageGeometry>,
    changes: &[ProposedChange],
    full_text: &str,
    config: &ReflowConfig,
) -> Result<ReflowSummary, ReflowError> {
    let page_size = original_geometry.unwrap_or(config.fallback_page);
    let max_width = page_size.width - 2.0 * config.margin;
    if max_width <= 0.0 || page_size.height - 2.0 * config.margin < config.line_height {
        return Err(ReflowError::NoPrintableArea {
            width: page_size.width,
            height: page_size.height,
            margin: config.margin,
        });
    }

    let (text, applied, unmatched) = apply_substitutions(full_text, changes);
    let font = canvas.embed_font(&config.font_name)?;

    // Baseline of the first line, so the glyph tops sit on the top margin.
    let top = page_size.height - config.margin - config.font_size;
    let mut page = canvas.add_page(page_size);
    let mut pages = 1;
    let mut y = top;
    let mut lines_drawn = 0;

    for line in text.lines() {
        if line.trim().is_empty() {
            y -= config.line_height;
            continue;
        }

        for wrapped in wrap_line(line, max_width, measure, config.font_size) {
            if y < config.margin {
                page = canvas.add_page(page_size);
                pages += 1;
                y = top;
            }
            canvas.draw_text(page, &wrapped, config.margin, y, config.font_size, font)?;
            y -= config.line_height;
            lines_drawn += 1;
        }
    }

    debug!(pages, lines_drawn, applied = applied.len(), "Reflow complete");

    Ok(ReflowSummary {
        pages,
        lines_drawn,
        applied,
        unmatched,
    })
}

/// Replaces the first occurrence of each selected change's original text, in list order.
///
/// Returns the new text plus the ids that were applied and the ids that found no match.
pub fn apply_substitutions(
    text: &str,
    changes: &[ProposedChange],
) -> (String, Vec<String>, Vec<String>) {
    let mut result = text.to_string();
    let mut applied = Vec::new();
    let mut unmatched = Vec::new();

    for change in changes.iter().filter(|c| c.selected) {
        if result.contains(&change.original_text) {
            result = result.replacen(&change.original_text, &change.modified_text, 1);
            applied.push(change.id.clone());
        } else {
            unmatched.push(change.id.clone());
        }
    }

    (result, applied, unmatched)
}

/// Greedy word wrap. A word wider than `max_width` gets a line of its own.
pub fn wrap_line(
    line: &str,
    max_width: f32,
    measure: &dyn TextMeasure,
    font_size: f32,
) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in line.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{current} {word}");
        if measure.width_of_text_at_size(&candidate, font_size) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    lines
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::document::{DrawOp, PdfCanvas};
    use crate::layout::font_metrics::{get_metrics, FontFamily};
    use crate::models::ChangeType;

    fn change(id: &str, original: &str, modified: &str) -> ProposedChange {
        ProposedChange {
            id: id.to_string(),
            original_text: original.to_string(),
            modified_text: modified.to_string(),
            context: String::new(),
            change_type: ChangeType::Phrasing,
            keywords: BTreeSet::new(),
            selected: true,
            position: None,
        }
    }

    fn drawn_text(canvas: &PdfCanvas, page: usize) -> Vec<(String, f32)> {
        canvas
            .page_ops(page)
            .unwrap()
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, y, .. } => Some((text.clone(), *y)),
                DrawOp::FillRect { .. } => None,
            })
            .collect()
    }

    fn run(text: &str, changes: &[ProposedChange]) -> (PdfCanvas, ReflowSummary) {
        let mut canvas = PdfCanvas::new();
        let summary = reflow(
            &mut canvas,
            get_metrics(&FontFamily::Helvetica),
            None,
            changes,
            text,
            &default_reflow_config(),
        )
        .unwrap();
        (canvas, summary)
    }

    #[test]
    fn test_substitution_then_layout() {
        let changes = vec![change(
            "c1",
            "Built web apps.",
            "Built scalable web applications.",
        )];
        let (canvas, summary) = run("Built web apps.\nUsed SQL.", &changes);

        let lines = drawn_text(&canvas, 0);
        assert_eq!(lines[0].0, "Built scalable web applications.");
        assert_eq!(lines[1].0, "Used SQL.");
        assert!(lines[1].1 < lines[0].1, "second line must be below the first");
        assert_eq!(summary.applied, vec!["c1".to_string()]);
        assert!(summary.unmatched.is_empty());
    }

    #[test]
    fn test_missing_original_is_noop() {
        let changes = vec![change("ghost", "Managed a fleet of drones", "Led drones")];
        let (canvas, summary) = run("Built web apps.\nUsed SQL.", &changes);
        let lines: Vec<String> = drawn_text(&canvas, 0).into_iter().map(|l| l.0).collect();
        assert_eq!(lines, vec!["Built web apps.", "Used SQL."]);
        assert_eq!(summary.unmatched, vec!["ghost".to_string()]);
    }

    #[test]
    fn test_only_first_occurrence_replaced() {
        let (text, applied, _) = apply_substitutions(
            "Used SQL. Used SQL.",
            &[change("c1", "Used SQL.", "Used PostgreSQL.")],
        );
        assert_eq!(text, "Used PostgreSQL. Used SQL.");
        assert_eq!(applied.len(), 1);
    }

    #[test]
    fn test_unselected_changes_are_ignored() {
        let mut skipped = change("c1", "SQL", "PostgreSQL");
        skipped.selected = false;
        let (text, applied, unmatched) = apply_substitutions("Used SQL.", &[skipped]);
        assert_eq!(text, "Used SQL.");
        assert!(applied.is_empty() && unmatched.is_empty());
    }

    #[test]
    fn test_zero_changes_preserves_every_word_in_order() {
        let paragraph = "Architected a distributed caching layer using Redis and consistent \
                         hashing, reducing p99 latency by 40% under 50k RPS peak load across \
                         three regions while mentoring four engineers and owning the on-call rotation";
        let text = format!("Jane Doe\n\n{paragraph}\nSkills: Rust, Go, SQL");
        let (canvas, summary) = run(&text, &[]);

        let drawn: Vec<String> = drawn_text(&canvas, 0)
            .into_iter()
            .flat_map(|(line, _)| {
                line.split_whitespace()
                    .map(String::from)
                    .collect::<Vec<_>>()
            })
            .collect();
        let expected: Vec<String> = text.split_whitespace().map(String::from).collect();
        assert_eq!(drawn, expected);
        assert!(summary.lines_drawn > 3, "long paragraph should wrap");
    }

    #[test]
    fn test_overflow_starts_new_page_with_overflowing_line() {
        let text: String = (0..80)
            .map(|i| format!("Line {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let (canvas, summary) = run(&text, &[]);
        assert_eq!(summary.pages, 2);

        let first_page = drawn_text(&canvas, 0);
        let second_page = drawn_text(&canvas, 1);
        let last_index: usize = first_page.last().unwrap().0[5..].parse().unwrap();
        assert_eq!(second_page[0].0, format!("Line {}", last_index + 1));

        let config = default_reflow_config();
        let top = LETTER.height - config.margin - config.font_size;
        assert!((second_page[0].1 - top).abs() < 1e-3);
        assert!(first_page.iter().all(|(_, y)| *y >= config.margin));
    }

    #[test]
    fn test_blank_lines_keep_paragraph_spacing() {
        let (canvas, _) = run("Summary\n\nExperience", &[]);
        let lines = drawn_text(&canvas, 0);
        let config = default_reflow_config();
        assert_eq!(lines.len(), 2);
        assert!((lines[0].1 - lines[1].1 - 2.0 * config.line_height).abs() < 1e-3);
    }

    #[test]
    fn test_uses_original_page_geometry() {
        let mut canvas = PdfCanvas::new();
        let a4 = PageGeometry {
            width: 595.0,
            height: 842.0,
        };
        reflow(
            &mut canvas,
            get_metrics(&FontFamily::Helvetica),
            Some(a4),
            &[],
            "Jane Doe",
            &default_reflow_config(),
        )
        .unwrap();
        assert_eq!(canvas.page_size(0).unwrap(), a4);
    }

    #[test]
    fn test_tiny_page_has_no_printable_area() {
        let mut canvas = PdfCanvas::new();
        let result = reflow(
            &mut canvas,
            get_metrics(&FontFamily::Helvetica),
            Some(PageGeometry {
                width: 80.0,
                height: 80.0,
            }),
            &[],
            "Jane Doe",
            &default_reflow_config(),
        );
        assert!(matches!(result, Err(ReflowError::NoPrintableArea { .. })));
    }

    #[test]
    fn test_wrap_line_respects_width() {
        let metrics = get_metrics(&FontFamily::Courier);
        // Courier at 10pt: 6pt per glyph, so 60pt fits 10 glyphs.
        let lines = wrap_line("aaaa bbbb cccc", 60.0, metrics, 10.0);
        assert_eq!(lines, vec!["aaaa bbbb", "cccc"]);
        let long = wrap_line("supercalifragilistic", 60.0, metrics, 10.0);
        assert_eq!(long, vec!["supercalifragilistic"]);
    }
}
