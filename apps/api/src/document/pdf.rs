//! `lopdf`-backed canvas.
//!
//! Draw calls are recorded per page and only written out in `save`, so a
//! canvas that is dropped before saving leaves no trace. Overlays on existing
//! pages are appended as extra content streams; the original stream is wrapped
//! in `q`/`Q` so its graphics state cannot leak into the overlay.

use std::collections::BTreeSet;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::document::{Canvas, DocumentError, DrawOp, PageGeometry, Rect, Rgb};
use crate::layout::font_metrics::FontFamily;

/// Guards against cyclic `Parent` chains in malformed page trees.
const MAX_TREE_DEPTH: usize = 32;

struct PageSlot {
    /// `None` for pages created on this canvas and not yet written.
    id: Option<ObjectId>,
    geometry: Option<PageGeometry>,
    ops: Vec<DrawOp>,
}

pub struct PdfCanvas {
    doc: Document,
    pages: Vec<PageSlot>,
}

impl PdfCanvas {
    /// Starts an empty document with no pages.
    pub fn new() -> Self {
        Self {
            doc: Document::with_version("1.7"),
            pages: Vec::new(),
        }
    }

    /// Opens an existing document for overlay drawing.
    ///
    /// Pages whose size cannot be determined still load; `page_size` reports them.
    pub fn load(bytes: &[u8]) -> Result<Self, DocumentError> {
        let doc = Document::load_mem(bytes).map_err(|e| DocumentError::Load(e.to_string()))?;

        let pages = doc
            .get_pages()
            .into_values()
            .map(|page_id| PageSlot {
                id: Some(page_id),
                geometry: media_box(&doc, page_id),
                ops: Vec::new(),
            })
            .collect();

        Ok(Self { doc, pages })
    }

    /// Recorded operations for a page, in draw order.
    #[cfg(test)]
    pub fn page_ops(&self, index: usize) -> Option<&[DrawOp]> {
        self.pages.get(index).map(|p| p.ops.as_slice())
    }

    #[cfg(test)]
    pub fn total_ops(&self) -> usize {
        self.pages.iter().map(|p| p.ops.len()).sum()
    }

    /// Writes recorded operations into the document and serializes it.
    pub fn save(mut self) -> Result<Vec<u8>, DocumentError> {
        let used_fonts: BTreeSet<FontFamily> = self
            .pages
            .iter()
            .flat_map(|p| p.ops.iter())
            .filter_map(|op| match op {
                DrawOp::Text { font, .. } => Some(*font),
                DrawOp::FillRect { .. } => None,
            })
            .collect();
        let font_refs: Vec<(FontFamily, ObjectId)> = used_fonts
            .into_iter()
            .map(|family| (family, self.doc.add_object(font_dictionary(family))))
            .collect();

        let needs_new_pages = self.pages.iter().any(|p| p.id.is_none());
        let pages_root = match self.pages_root() {
            Some(id) => id,
            None if needs_new_pages || self.pages.is_empty() => self.create_page_tree(),
            None => return Err(DocumentError::Save("document has no page tree".to_string())),
        };

        for index in 0..self.pages.len() {
            let page_id = match self.pages[index].id {
                Some(id) => id,
                None => {
                    let geometry = self.pages[index]
                        .geometry
                        .ok_or(DocumentError::MissingGeometry { index })?;
                    let id = self.create_page(pages_root, geometry)?;
                    self.pages[index].id = Some(id);
                    id
                }
            };

            if self.pages[index].ops.is_empty() {
                continue;
            }

            let ops = std::mem::take(&mut self.pages[index].ops);
            self.append_overlay(page_id, &ops)?;
            self.register_fonts(page_id, &ops, &font_refs)?;
        }

        let mut buffer = Vec::new();
        self.doc
            .save_to(&mut buffer)
            .map_err(|e| DocumentError::Save(e.to_string()))?;
        Ok(buffer)
    }

    fn slot_mut(&mut self, index: usize) -> Result<&mut PageSlot, DocumentError> {
        let count = self.pages.len();
        self.pages
            .get_mut(index)
            .ok_or(DocumentError::PageOutOfRange { index, count })
    }

    fn pages_root(&self) -> Option<ObjectId> {
        let root_id = self.doc.trailer.get(b"Root").ok()?.as_reference().ok()?;
        let catalog = self.doc.get_object(root_id).ok()?.as_dict().ok()?;
        catalog.get(b"Pages").ok()?.as_reference().ok()
    }

    fn create_page_tree(&mut self) -> ObjectId {
        let pages_id = self.doc.new_object_id();
        let pages = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Count", Object::Integer(0)),
            ("Kids", Object::Array(vec![])),
        ]);
        self.doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]);
        let catalog_id = self.doc.add_object(catalog);
        self.doc.trailer.set("Root", Object::Reference(catalog_id));
        pages_id
    }

    fn create_page(
        &mut self,
        pages_root: ObjectId,
        geometry: PageGeometry,
    ) -> Result<ObjectId, DocumentError> {
        let page = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_root)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(geometry.width),
                    Object::Real(geometry.height),
                ]),
            ),
            ("Resources", Object::Dictionary(Dictionary::new())),
        ]);
        let page_id = self.doc.add_object(page);

        let root = self
            .doc
            .get_object_mut(pages_root)
            .and_then(Object::as_dict_mut)
            .map_err(|e| DocumentError::Save(format!("page tree root unreadable: {e}")))?;
        let mut kids = root
            .get(b"Kids")
            .and_then(Object::as_array)
            .map(|kids| kids.clone())
            .unwrap_or_default();
        kids.push(Object::Reference(page_id));
        root.set("Count", Object::Integer(kids.len() as i64));
        root.set("Kids", Object::Array(kids));

        Ok(page_id)
    }

    fn append_overlay(&mut self, page_id: ObjectId, ops: &[DrawOp]) -> Result<(), DocumentError> {
        let existing = self.existing_contents(page_id);

        let mut operations = Vec::new();
        if !existing.is_empty() {
            operations.push(Operation::new("Q", vec![]));
        }
        operations.push(Operation::new("q", vec![]));
        operations.extend(ops.iter().flat_map(encode_op));
        operations.push(Operation::new("Q", vec![]));

        let overlay = Content { operations }
            .encode()
            .map_err(|e| DocumentError::Draw(e.to_string()))?;
        let overlay_id = self.doc.add_object(Stream::new(Dictionary::new(), overlay));

        let mut contents = Vec::with_capacity(existing.len() + 2);
        if !existing.is_empty() {
            let open_id = self
                .doc
                .add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
            contents.push(Object::Reference(open_id));
            contents.extend(existing);
        }
        contents.push(Object::Reference(overlay_id));

        let page = self
            .doc
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| DocumentError::Draw(format!("page dictionary unreadable: {e}")))?;
        page.set("Contents", Object::Array(contents));
        Ok(())
    }

    fn existing_contents(&self, page_id: ObjectId) -> Vec<Object> {
        let Some(page) = self
            .doc
            .get_object(page_id)
            .ok()
            .and_then(|o| o.as_dict().ok())
        else {
            return Vec::new();
        };

        match page.get(b"Contents") {
            Ok(Object::Reference(id)) => match self.doc.get_object(*id) {
                Ok(Object::Array(items)) => items.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Ok(Object::Array(items)) => items.clone(),
            _ => Vec::new(),
        }
    }

    /// Copies the page's effective resources inline and adds the overlay fonts.
    fn register_fonts(
        &mut self,
        page_id: ObjectId,
        ops: &[DrawOp],
        font_refs: &[(FontFamily, ObjectId)],
    ) -> Result<(), DocumentError> {
        let families: BTreeSet<FontFamily> = ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { font, .. } => Some(*font),
                DrawOp::FillRect { .. } => None,
            })
            .collect();
        if families.is_empty() {
            return Ok(());
        }

        let mut resources = self.effective_resources(page_id);
        let mut fonts = resources
            .get(b"Font")
            .ok()
            .and_then(|obj| resolve(&self.doc, obj).as_dict().ok())
            .cloned()
            .unwrap_or_else(Dictionary::new);
        for (family, font_id) in font_refs.iter().filter(|(f, _)| families.contains(f)) {
            fonts.set(family.resource_name(), Object::Reference(*font_id));
        }
        resources.set("Font", Object::Dictionary(fonts));

        let page = self
            .doc
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| DocumentError::Draw(format!("page dictionary unreadable: {e}")))?;
        page.set("Resources", Object::Dictionary(resources));
        Ok(())
    }

    fn effective_resources(&self, page_id: ObjectId) -> Dictionary {
        let mut current = Some(page_id);
        for _ in 0..MAX_TREE_DEPTH {
            let Some(dict) = current
                .and_then(|id| self.doc.get_object(id).ok())
                .and_then(|o| o.as_dict().ok())
            else {
                break;
            };
            if let Ok(resources) = dict.get(b"Resources") {
                if let Ok(resolved) = resolve(&self.doc, resources).as_dict() {
                    return resolved.clone();
                }
            }
            current = dict.get(b"Parent").and_then(Object::as_reference).ok();
        }
        Dictionary::new()
    }
}

impl Default for PdfCanvas {
    fn default() -> Self {
        Self::new()
    }
}

impl Canvas for PdfCanvas {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_size(&self, index: usize) -> Result<PageGeometry, DocumentError> {
        let page = self.pages.get(index).ok_or(DocumentError::PageOutOfRange {
            index,
            count: self.pages.len(),
        })?;
        page.geometry.ok_or(DocumentError::MissingGeometry { index })
    }

    fn add_page(&mut self, geometry: PageGeometry) -> usize {
        self.pages.push(PageSlot {
            id: None,
            geometry: Some(geometry),
            ops: Vec::new(),
        });
        self.pages.len() - 1
    }

    fn fill_rect(&mut self, page: usize, rect: Rect, color: Rgb) -> Result<(), DocumentError> {
        let coords = [rect.x, rect.y, rect.width, rect.height];
        if coords.iter().any(|v| !v.is_finite()) || rect.width < 0.0 || rect.height < 0.0 {
            return Err(DocumentError::Draw(format!("invalid rectangle {rect:?}")));
        }
        self.slot_mut(page)?
            .ops
            .push(DrawOp::FillRect { rect, color });
        Ok(())
    }

    fn draw_text(
        &mut self,
        page: usize,
        text: &str,
        x: f32,
        y: f32,
        size: f32,
        font: FontFamily,
    ) -> Result<(), DocumentError> {
        if !x.is_finite() || !y.is_finite() || !(size.is_finite() && size > 0.0) {
            return Err(DocumentError::Draw(format!(
                "invalid text placement ({x}, {y}) at size {size}"
            )));
        }
        self.slot_mut(page)?.ops.push(DrawOp::Text {
            text: text.to_string(),
            x,
            y,
            size,
            font,
        });
        Ok(())
    }

    fn embed_font(&mut self, name: &str) -> Result<FontFamily, DocumentError> {
        // Only the standard 14 fonts are available; everything else is substituted.
        Ok(FontFamily::from_font_name(name))
    }
}

fn fill_color(color: Rgb) -> Operation {
    Operation::new(
        "rg",
        vec![
            Object::Real(color.r),
            Object::Real(color.g),
            Object::Real(color.b),
        ],
    )
}

fn encode_op(op: &DrawOp) -> Vec<Operation> {
    match op {
        DrawOp::FillRect { rect, color } => vec![
            fill_color(*color),
            Operation::new(
                "re",
                vec![
                    Object::Real(rect.x),
                    Object::Real(rect.y),
                    Object::Real(rect.width),
                    Object::Real(rect.height),
                ],
            ),
            Operation::new("f", vec![]),
        ],
        DrawOp::Text {
            text,
            x,
            y,
            size,
            font,
        } => vec![
            fill_color(Rgb::BLACK),
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![
                    Object::Name(font.resource_name().as_bytes().to_vec()),
                    Object::Real(*size),
                ],
            ),
            Operation::new("Td", vec![Object::Real(*x), Object::Real(*y)]),
            Operation::new(
                "Tj",
                vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
        ],
    }
}

fn font_dictionary(family: FontFamily) -> Dictionary {
    Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(family.base_font().as_bytes().to_vec())),
        ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
    ])
}

/// Maps text onto WinAnsiEncoding bytes; unmappable characters become `?`.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            ' '..='~' => c as u8,
            '\u{20AC}' => 0x80,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{A0}'..='\u{FF}' => c as u32 as u8,
            _ => b'?',
        })
        .collect()
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

/// Reads the page's MediaBox, following `Parent` inheritance.
fn media_box(doc: &Document, page_id: ObjectId) -> Option<PageGeometry> {
    let mut current = Some(page_id);
    for _ in 0..MAX_TREE_DEPTH {
        let dict = doc.get_object(current?).ok()?.as_dict().ok()?;
        if let Ok(obj) = dict.get(b"MediaBox") {
            let values: Vec<f32> = resolve(doc, obj)
                .as_array()
                .ok()?
                .iter()
                .filter_map(|v| number(resolve(doc, v)))
                .collect();
            return match values.as_slice() {
                [x0, y0, x1, y1] => Some(PageGeometry {
                    width: (x1 - x0).abs(),
                    height: (y1 - y0).abs(),
                }),
                _ => None,
            };
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::LETTER;

    fn blank_pdf(pages: usize) -> Vec<u8> {
        let mut canvas = PdfCanvas::new();
        for _ in 0..pages {
            canvas.add_page(LETTER);
        }
        canvas.save().unwrap()
    }

    fn content_of(bytes: &[u8], page_number: u32) -> Vec<u8> {
        let doc = Document::load_mem(bytes).unwrap();
        let page_id = doc.get_pages()[&page_number];
        doc.get_page_content(page_id).unwrap()
    }

    #[test]
    fn test_new_canvas_round_trips_page_count_and_size() {
        let bytes = blank_pdf(3);
        let canvas = PdfCanvas::load(&bytes).unwrap();
        assert_eq!(canvas.page_count(), 3);
        let size = canvas.page_size(2).unwrap();
        assert!((size.width - 612.0).abs() < 1e-3);
        assert!((size.height - 792.0).abs() < 1e-3);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let result = PdfCanvas::load(b"definitely not a pdf");
        assert!(matches!(result, Err(DocumentError::Load(_))));
    }

    #[test]
    fn test_page_size_out_of_range() {
        let canvas = PdfCanvas::load(&blank_pdf(1)).unwrap();
        assert!(matches!(
            canvas.page_size(4),
            Err(DocumentError::PageOutOfRange { index: 4, count: 1 })
        ));
    }

    #[test]
    fn test_draws_are_recorded_in_order() {
        let mut canvas = PdfCanvas::new();
        let page = canvas.add_page(LETTER);
        canvas
            .fill_rect(
                page,
                Rect {
                    x: 10.0,
                    y: 10.0,
                    width: 5.0,
                    height: 5.0,
                },
                Rgb::WHITE,
            )
            .unwrap();
        canvas
            .draw_text(page, "Hello", 20.0, 30.0, 11.0, FontFamily::Helvetica)
            .unwrap();
        let ops = canvas.page_ops(page).unwrap();
        assert_eq!(ops.len(), 2);
        assert!(matches!(ops[0], DrawOp::FillRect { .. }));
        assert!(matches!(ops[1], DrawOp::Text { .. }));
    }

    #[test]
    fn test_draw_on_missing_page_fails() {
        let mut canvas = PdfCanvas::new();
        let result = canvas.draw_text(0, "x", 0.0, 0.0, 11.0, FontFamily::Courier);
        assert!(matches!(result, Err(DocumentError::PageOutOfRange { .. })));
    }

    #[test]
    fn test_rejects_non_finite_coordinates() {
        let mut canvas = PdfCanvas::new();
        let page = canvas.add_page(LETTER);
        let result = canvas.draw_text(page, "x", f32::NAN, 0.0, 11.0, FontFamily::Helvetica);
        assert!(matches!(result, Err(DocumentError::Draw(_))));
    }

    #[test]
    fn test_overlay_is_written_into_existing_page() {
        let original = blank_pdf(1);
        let mut canvas = PdfCanvas::load(&original).unwrap();
        canvas
            .draw_text(0, "Rust", 72.0, 700.0, 11.0, FontFamily::TimesRoman)
            .unwrap();
        let patched = canvas.save().unwrap();

        let content = String::from_utf8_lossy(&content_of(&patched, 1)).to_string();
        assert!(content.contains("(Rust) Tj"), "content was: {content}");
        assert!(content.contains(FontFamily::TimesRoman.resource_name()));
    }

    #[test]
    fn test_win_ansi_maps_typographic_quotes() {
        assert_eq!(encode_win_ansi("a\u{2019}b"), vec![b'a', 0x92, b'b']);
        assert_eq!(encode_win_ansi("\u{4E2D}"), vec![b'?']);
    }
}
