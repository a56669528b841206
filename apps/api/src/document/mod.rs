//! Document drawing and text extraction capabilities.
//!
//! The core never touches `lopdf` or `pdf-extract` directly. It draws through
//! the `Canvas` trait and measures text through `TextMeasure`; `PdfCanvas` and
//! `PdfTextExtractor` are the production implementations.

pub mod extract;
pub mod pdf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::layout::font_metrics::FontFamily;

pub use extract::{ExtractionError, PdfTextExtractor, TextExtractor};
pub use pdf::PdfCanvas;

/// US letter, in PDF points.
pub const LETTER: PageGeometry = PageGeometry {
    width: 612.0,
    height: 792.0,
};

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Failed to load document: {0}")]
    Load(String),

    #[error("Page {index} out of range (document has {count} pages)")]
    PageOutOfRange { index: usize, count: usize },

    #[error("Page {index} has no usable MediaBox")]
    MissingGeometry { index: usize },

    #[error("Drawing failed: {0}")]
    Draw(String),

    #[error("Serialization failed: {0}")]
    Save(String),
}

/// Size of one page in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
}

/// RGB colour with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb {
        r: 1.0,
        g: 1.0,
        b: 1.0,
    };
    pub const BLACK: Rgb = Rgb {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };
}

/// Axis-aligned rectangle in bottom-up page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// A single recorded drawing call. Pages replay these in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    FillRect {
        rect: Rect,
        color: Rgb,
    },
    Text {
        text: String,
        x: f32,
        y: f32,
        size: f32,
        font: FontFamily,
    },
}

/// The drawing surface used by both rendering strategies.
///
/// Coordinates passed in are bottom-up (PDF user space).
pub trait Canvas {
    fn page_count(&self) -> usize;

    fn page_size(&self, index: usize) -> Result<PageGeometry, DocumentError>;

    /// Appends a blank page and returns its index.
    fn add_page(&mut self, geometry: PageGeometry) -> usize;

    fn fill_rect(&mut self, page: usize, rect: Rect, color: Rgb) -> Result<(), DocumentError>;

    fn draw_text(
        &mut self,
        page: usize,
        text: &str,
        x: f32,
        y: f32,
        size: f32,
        font: FontFamily,
    ) -> Result<(), DocumentError>;

    /// Resolves a font by name. Implementations may substitute a different family.
    fn embed_font(&mut self, name: &str) -> Result<FontFamily, DocumentError>;
}

/// Rendered-width measurement at a given font size, in points.
pub trait TextMeasure {
    fn width_of_text_at_size(&self, text: &str, size: f32) -> f32;
}
