use serde::{Deserialize, Serialize};

/// An estimated rectangular region of extracted text.
///
/// Coordinates are top-down: `y` is the distance from the top edge of the page
/// to the top of the text. Renderers flip it against the page height before drawing.
/// A span holds either one whole line or a single word of that line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSpan {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub font_name: String,
    pub font_size: f32,
    pub text: String,
    pub page_index: usize,
}

impl TextSpan {
    /// Right edge of the span (`x + width`).
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Copy of this span stretched horizontally so it ends where `other` ends.
    ///
    /// Text is the two spans joined by a space; vertical position stays on `self`.
    /// When `other` ends left of `self` (it sits on a following line) the width is kept.
    pub fn extended_to(&self, other: &TextSpan) -> TextSpan {
        let width = other.right() - self.x;
        TextSpan {
            width: if width > 0.0 { width } else { self.width },
            text: format!("{} {}", self.text, other.text),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(text: &str, x: f32, width: f32) -> TextSpan {
        TextSpan {
            x,
            y: 100.0,
            width,
            height: 11.0,
            font_name: "Helvetica".to_string(),
            font_size: 11.0,
            text: text.to_string(),
            page_index: 0,
        }
    }

    #[test]
    fn test_extended_to_reaches_right_edge_of_other() {
        let first = span("cross", 72.0, 30.0);
        let second = span("functional", 110.0, 60.0);
        let merged = first.extended_to(&second);
        assert_eq!(merged.x, 72.0);
        assert!((merged.width - 98.0).abs() < 1e-4);
        assert_eq!(merged.text, "cross functional");
        assert_eq!(merged.y, first.y);
    }

    #[test]
    fn test_extended_to_keeps_width_when_other_is_left() {
        let first = span("cross", 300.0, 30.0);
        let second = span("functional", 50.0, 60.0);
        assert_eq!(first.extended_to(&second).width, 30.0);
    }

    #[test]
    fn test_span_serializes_camel_case() {
        let json = serde_json::to_value(span("Rust", 0.0, 10.0)).unwrap();
        assert!(json.get("pageIndex").is_some());
        assert!(json.get("fontSize").is_some());
    }
}
