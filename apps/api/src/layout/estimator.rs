//! Position Estimator: derives approximate line and word spans from linear text.
//!
//! No real geometry is known at this stage. Every line gets the same height and
//! every glyph the same width; the spans only need to be plausible enough for
//! the matcher and the positional patcher to anchor a substitution.
//!
//! Coordinates are top-down (distance from the top edge). `y` restarts at the
//! top margin whenever the estimated page index advances.

use serde::{Deserialize, Serialize};

use crate::models::TextSpan;

/// Fixed metrics assumed across the whole document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorConfig {
    pub top_margin: f32,
    pub left_margin: f32,
    pub line_height: f32,
    pub font_size: f32,
    /// Width assumed for every character, in points.
    pub average_glyph_width: f32,
    pub inter_word_gap: f32,
    /// Words must be strictly longer than this (in chars) to get their own span.
    pub min_word_len: usize,
    /// Vertical space available for text on one page.
    pub page_content_height: f32,
    pub font_name: String,
}

/// US letter at 11pt Helvetica with 50pt margins: 50 lines per page.
pub fn default_estimator_config() -> EstimatorConfig {
    EstimatorConfig {
        top_margin: 50.0,
        left_margin: 50.0,
        line_height: 14.0,
        font_size: 11.0,
        average_glyph_width: 5.5,
        inter_word_gap: 3.0,
        min_word_len: 2,
        page_content_height: 700.0,
        font_name: "Helvetica".to_string(),
    }
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        default_estimator_config()
    }
}

/// Estimates spans for every non-blank line of `text`, in reading order.
///
/// Each line span is immediately followed by the word spans nested inside it.
/// Blank lines emit nothing but still consume a line of vertical space.
pub fn estimate(text: &str, config: &EstimatorConfig) -> Vec<TextSpan> {
    let mut spans = Vec::new();
    let mut current_y = config.top_margin;
    let mut current_page = 0usize;

    for (line_index, line) in text.lines().enumerate() {
        let page_index = page_for_line(line_index, config);
        if page_index != current_page {
            current_page = page_index;
            current_y = config.top_margin;
        }

        let content = line.trim();
        if !content.is_empty() {
            spans.push(make_span(
                content,
                config.left_margin,
                current_y,
                text_width(content, config),
                page_index,
                config,
            ));

            let mut x = config.left_margin;
            for word in content.split_whitespace() {
                let word_width = text_width(word, config);
                if word.chars().count() > config.min_word_len {
                    spans.push(make_span(word, x, current_y, word_width, page_index, config));
                }
                x += word_width + config.inter_word_gap;
            }
        }

        current_y += config.line_height;
    }

    spans
}

/// `floor(line_index × line_height / page_content_height)`.
fn page_for_line(line_index: usize, config: &EstimatorConfig) -> usize {
    if config.page_content_height <= 0.0 {
        return 0;
    }
    (line_index as f32 * config.line_height / config.page_content_height).floor() as usize
}

fn text_width(text: &str, config: &EstimatorConfig) -> f32 {
    text.chars().count() as f32 * config.average_glyph_width
}

fn make_span(
    text: &str,
    x: f32,
    y: f32,
    width: f32,
    page_index: usize,
    config: &EstimatorConfig,
) -> TextSpan {
    TextSpan {
        x,
        y,
        width,
        height: config.font_size,
        font_name: config.font_name.clone(),
        font_size: config.font_size,
        text: text.to_string(),
        page_index,
    }
}
