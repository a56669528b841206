//! Positional Patcher: erases matched text with a cover rectangle and redraws the replacement.
//!
//! Spans are top-down; the canvas is bottom-up. For a span at `(x, y)` with
//! height `h` on a page of height `H`:
//! - cover rectangle origin `(x - pad, H - y - h - pad)`, size `(w + 2·pad, h + 2·pad)`
//! - replacement baseline `(x, H - y - font_size)`

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::diagnostics::{DiagnosticEvent, DiagnosticObserver};
use crate::document::{Canvas, DocumentError, Rect, Rgb};
use crate::models::{ProposedChange, TextSpan};

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("Change {change_id} targets page {page_index}, but the document has {page_count} pages")]
    PageOutOfRange {
        change_id: String,
        page_index: usize,
        page_count: usize,
    },

    #[error("None of the {selected} selected changes has a resolved position")]
    NoPositions { selected: usize },

    #[error(transparent)]
    Document(#[from] DocumentError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchConfig {
    /// Slack added on every side of the cover rectangle.
    pub cover_padding: f32,
    pub background: Rgb,
    /// Used when a span's font cannot be resolved.
    pub default_font: String,
}

pub fn default_patch_config() -> PatchConfig {
    PatchConfig {
        cover_padding: 2.0,
        background: Rgb::WHITE,
        default_font: "Helvetica".to_string(),
    }
}

impl Default for PatchConfig {
    fn default() -> Self {
        default_patch_config()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatchSummary {
    pub applied: Vec<String>,
    /// Selected changes left untouched because they have no position.
    pub skipped: Vec<String>,
}

/// Overlays every selected, positioned change onto `canvas`, in list order.
///
/// Any out-of-range page index aborts before anything is drawn. A drawing error
/// aborts mid-way; the caller is expected to discard the canvas in that case.
pub fn patch(
    canvas: &mut dyn Canvas,
    changes: &[ProposedChange],
    config: &PatchConfig,
    observer: &dyn DiagnosticObserver,
) -> Result<PatchSummary, PatchError> {
    let selected: Vec<&ProposedChange> = changes.iter().filter(|c| c.selected).collect();
    let mut summary = PatchSummary::default();
    if selected.is_empty() {
        return Ok(summary);
    }

    let page_count = canvas.page_count();
    let mut positioned = 0;
    for change in &selected {
        if let Some(position) = &change.position {
            if position.page_index >= page_count {
                return Err(PatchError::PageOutOfRange {
                    change_id: change.id.clone(),
                    page_index: position.page_index,
                    page_count,
                });
            }
            positioned += 1;
        }
    }
    if positioned == 0 {
        return Err(PatchError::NoPositions {
            selected: selected.len(),
        });
    }

    for change in selected {
        let Some(position) = &change.position else {
            observer.emit(DiagnosticEvent::ChangeSkipped {
                change_id: change.id.clone(),
                reason: "no resolved position".to_string(),
            });
            summary.skipped.push(change.id.clone());
            continue;
        };

        let page = position.page_index;
        let page_height = canvas.page_size(page)?.height;

        canvas.fill_rect(
            page,
            cover_rect(position, page_height, config.cover_padding),
            config.background,
        )?;

        let font = match canvas.embed_font(&position.font_name) {
            Ok(font) => font,
            Err(_) => canvas.embed_font(&config.default_font)?,
        };
        canvas.draw_text(
            page,
            &change.modified_text,
            position.x,
            page_height - position.y - position.font_size,
            position.font_size,
            font,
        )?;

        summary.applied.push(change.id.clone());
    }

    Ok(summary)
}

/// Bottom-up rectangle covering `span`, grown by `padding` on every side.
pub fn cover_rect(span: &TextSpan, page_height: f32, padding: f32) -> Rect {
    Rect {
        x: span.x - padding,
        y: page_height - span.y - span.height - padding,
        width: span.width + 2.0 * padding,
        height: span.height + 2.0 * padding,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::diagnostics::CollectingObserver;
    use crate::document::{DrawOp, PdfCanvas, LETTER};
    use crate::layout::font_metrics::FontFamily;
    use crate::models::ChangeType;

    fn span(page_index: usize) -> TextSpan {
        TextSpan {
            x: 50.0,
            y: 64.0,
            width: 49.5,
            height: 11.0,
            font_name: "Times New Roman".to_string(),
            font_size: 11.0,
            text: "Used SQL.".to_string(),
            page_index,
        }
    }

    fn change(id: &str, position: Option<TextSpan>) -> ProposedChange {
        ProposedChange {
            id: id.to_string(),
            original_text: "Used SQL.".to_string(),
            modified_text: "Used PostgreSQL.".to_string(),
            context: String::new(),
            change_type: ChangeType::Keyword,
            keywords: BTreeSet::from(["PostgreSQL".to_string()]),
            selected: true,
            position,
        }
    }

    fn one_page_canvas() -> PdfCanvas {
        let mut canvas = PdfCanvas::new();
        canvas.add_page(LETTER);
        canvas
    }

    #[test]
    fn test_cover_rect_flips_and_pads() {
        let rect = cover_rect(&span(0), 792.0, 2.0);
        assert_eq!(rect.x, 48.0);
        assert!((rect.y - (792.0 - 64.0 - 11.0 - 2.0)).abs() < 1e-4);
        assert!((rect.width - 53.5).abs() < 1e-4);
        assert_eq!(rect.height, 15.0);
    }

    #[test]
    fn test_patch_draws_cover_then_text() {
        let mut canvas = one_page_canvas();
        let observer = CollectingObserver::default();
        let summary = patch(
            &mut canvas,
            &[change("c1", Some(span(0)))],
            &default_patch_config(),
            &observer,
        )
        .unwrap();

        assert_eq!(summary.applied, vec!["c1".to_string()]);
        let ops = canvas.page_ops(0).unwrap();
        assert_eq!(ops.len(), 2);
        match (&ops[0], &ops[1]) {
            (
                DrawOp::FillRect { color, .. },
                DrawOp::Text {
                    text, x, y, font, ..
                },
            ) => {
                assert_eq!(*color, Rgb::WHITE);
                assert_eq!(text, "Used PostgreSQL.");
                assert_eq!(*x, 50.0);
                assert!((*y - (792.0 - 64.0 - 11.0)).abs() < 1e-4);
                assert_eq!(*font, FontFamily::TimesRoman);
            }
            other => panic!("unexpected ops {other:?}"),
        }
    }

    #[test]
    fn test_changes_without_position_are_skipped() {
        let mut canvas = one_page_canvas();
        let observer = CollectingObserver::default();
        let changes = vec![change("c1", Some(span(0))), change("ghost", None)];
        let summary = patch(&mut canvas, &changes, &default_patch_config(), &observer).unwrap();

        assert_eq!(summary.applied, vec!["c1".to_string()]);
        assert_eq!(summary.skipped, vec!["ghost".to_string()]);
        assert!(matches!(
            observer.events()[0],
            DiagnosticEvent::ChangeSkipped { ref change_id, .. } if change_id == "ghost"
        ));
    }

    #[test]
    fn test_empty_selection_draws_nothing() {
        let mut canvas = one_page_canvas();
        let mut unselected = change("c1", Some(span(0)));
        unselected.selected = false;
        let summary = patch(
            &mut canvas,
            &[unselected],
            &default_patch_config(),
            &CollectingObserver::default(),
        )
        .unwrap();
        assert_eq!(summary, PatchSummary::default());
        assert_eq!(canvas.total_ops(), 0);
    }

    #[test]
    fn test_out_of_range_page_aborts_before_drawing() {
        let mut canvas = one_page_canvas();
        let changes = vec![change("c1", Some(span(0))), change("c2", Some(span(3)))];
        let result = patch(
            &mut canvas,
            &changes,
            &default_patch_config(),
            &CollectingObserver::default(),
        );
        assert!(matches!(
            result,
            Err(PatchError::PageOutOfRange { page_index: 3, page_count: 1, .. })
        ));
        assert_eq!(canvas.total_ops(), 0);
    }

    #[test]
    fn test_no_positions_is_a_structural_failure() {
        let mut canvas = one_page_canvas();
        let result = patch(
            &mut canvas,
            &[change("ghost", None)],
            &default_patch_config(),
            &CollectingObserver::default(),
        );
        assert!(matches!(result, Err(PatchError::NoPositions { selected: 1 })));
    }

    #[test]
    fn test_invalid_geometry_surfaces_document_error() {
        let mut canvas = one_page_canvas();
        let mut broken = span(0);
        broken.width = f32::NAN;
        let result = patch(
            &mut canvas,
            &[change("c1", Some(broken))],
            &default_patch_config(),
            &CollectingObserver::default(),
        );
        assert!(matches!(result, Err(PatchError::Document(DocumentError::Draw(_)))));
    }
}
