use std::collections::BTreeMap;

use encoding_rs::WINDOWS_1252;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Encoding, Object, ObjectId};
use tracing::warn;

/// Fragments whose baselines differ by less than this many points share a line.
const BASELINE_TOLERANCE: f32 = 2.0;
/// Average glyph advance as a fraction of the font size, used when a string is
/// followed by another one without repositioning.
const GLYPH_WIDTH_EM: f32 = 0.5;
/// TJ adjustments below this (in thousandths of an em) read as a word gap.
const TJ_SPACE_THRESHOLD: f32 = -100.0;

/// PDF affine matrix `[a b c d e f]`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f32; 6]);

impl Matrix {
    const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn translation(tx: f32, ty: f32) -> Self {
        Matrix([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    /// `self × other` in the row-vector convention PDF uses.
    fn then(self, other: Matrix) -> Matrix {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = other.0;
        Matrix([
            a1 * a2 + b1 * c2,
            a1 * b2 + b1 * d2,
            c1 * a2 + d1 * c2,
            c1 * b2 + d1 * d2,
            e1 * a2 + f1 * c2 + e2,
            e1 * b2 + f1 * d2 + f2,
        ])
    }

    fn origin(self) -> (f32, f32) {
        (self.0[4], self.0[5])
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Fragment {
    x: f32,
    y: f32,
    text: String,
}

struct TextState<'a> {
    fonts: &'a BTreeMap<Vec<u8>, Encoding<'a>>,
    encoding: Option<&'a Encoding<'a>>,
    font_size: f32,
    leading: f32,
    ctm: Matrix,
    saved: Vec<Matrix>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    fragments: Vec<Fragment>,
}

impl<'a> TextState<'a> {
    fn new(fonts: &'a BTreeMap<Vec<u8>, Encoding<'a>>) -> Self {
        Self {
            fonts,
            encoding: None,
            font_size: 1.0,
            leading: 0.0,
            ctm: Matrix::IDENTITY,
            saved: Vec::new(),
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            fragments: Vec::new(),
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = Matrix::translation(tx, ty).then(self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.leading);
    }

    fn decode(&self, bytes: &[u8]) -> String {
        self.encoding
            .and_then(|encoding| Document::decode_text(encoding, bytes).ok())
            .unwrap_or_else(|| WINDOWS_1252.decode(bytes).0.into_owned())
    }

    fn advance(&mut self, ems: f32) {
        let tx = ems * self.font_size;
        self.text_matrix = Matrix::translation(tx, 0.0).then(self.text_matrix);
    }

    /// Record a string at the current text position and move past it.
    fn show(&mut self, operand: &Object) {
        let mut text = String::new();
        let mut width = 0.0;
        match operand {
            Object::String(bytes, _) => {
                let decoded = self.decode(bytes);
                width += decoded.chars().count() as f32 * GLYPH_WIDTH_EM;
                text.push_str(&decoded);
            }
            Object::Array(items) => {
                for item in items {
                    match item {
                        Object::String(bytes, _) => {
                            let decoded = self.decode(bytes);
                            width += decoded.chars().count() as f32 * GLYPH_WIDTH_EM;
                            text.push_str(&decoded);
                        }
                        other => {
                            if let Ok(adjust) = other.as_float() {
                                if adjust < TJ_SPACE_THRESHOLD {
                                    text.push(' ');
                                }
                                width -= adjust / 1000.0;
                            }
                        }
                    }
                }
            }
            _ => return,
        }

        let (x, y) = self.text_matrix.then(self.ctm).origin();
        if !text.trim().is_empty() {
            self.fragments.push(Fragment { x, y, text });
        }
        self.advance(width);
    }

    fn apply(&mut self, operation: &Operation) {
        let operands = &operation.operands;
        let number = |index: usize| operands.get(index).and_then(|o| o.as_float().ok());
        match operation.operator.as_str() {
            "q" => self.saved.push(self.ctm),
            "Q" => {
                if let Some(ctm) = self.saved.pop() {
                    self.ctm = ctm;
                }
            }
            "cm" => {
                if let Some(m) = matrix_operands(operands) {
                    self.ctm = m.then(self.ctm);
                }
            }
            "BT" => {
                self.text_matrix = Matrix::IDENTITY;
                self.line_matrix = Matrix::IDENTITY;
            }
            "Tf" => {
                let fonts = self.fonts;
                self.encoding = operands
                    .first()
                    .and_then(|name| name.as_name().ok())
                    .and_then(|name| fonts.get(name));
                if let Some(size) = number(1) {
                    self.font_size = size;
                }
            }
            "TL" => {
                if let Some(leading) = number(0) {
                    self.leading = leading;
                }
            }
            "Td" => {
                if let (Some(tx), Some(ty)) = (number(0), number(1)) {
                    self.move_line(tx, ty);
                }
            }
            "TD" => {
                if let (Some(tx), Some(ty)) = (number(0), number(1)) {
                    self.leading = -ty;
                    self.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(m) = matrix_operands(operands) {
                    self.line_matrix = m;
                    self.text_matrix = m;
                }
            }
            "T*" => self.next_line(),
            "Tj" | "TJ" => {
                if let Some(operand) = operands.first() {
                    self.show(operand);
                }
            }
            "'" => {
                self.next_line();
                if let Some(operand) = operands.first() {
                    self.show(operand);
                }
            }
            "\"" => {
                self.next_line();
                if let Some(operand) = operands.get(2) {
                    self.show(operand);
                }
            }
            _ => {}
        }
    }
}

fn matrix_operands(operands: &[Object]) -> Option<Matrix> {
    if operands.len() != 6 {
        return None;
    }
    let mut values = [0.0; 6];
    for (slot, operand) in values.iter_mut().zip(operands) {
        *slot = operand.as_float().ok()?;
    }
    Some(Matrix(values))
}

/// Group positioned fragments into visual lines: top to bottom, then left to
/// right inside each line.
fn group_lines(mut fragments: Vec<Fragment>) -> Vec<String> {
    fragments.sort_by(|a, b| b.y.total_cmp(&a.y));

    let mut lines: Vec<Vec<Fragment>> = Vec::new();
    for fragment in fragments {
        match lines.last_mut() {
            Some(line) if (line[0].y - fragment.y).abs() < BASELINE_TOLERANCE => {
                line.push(fragment)
            }
            _ => lines.push(vec![fragment]),
        }
    }

    lines
        .into_iter()
        .map(|mut line| {
            line.sort_by(|a, b| a.x.total_cmp(&b.x));
            line.iter()
                .map(|fragment| fragment.text.trim())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

/// Lines of text drawn by a list of content operations.
pub(crate) fn layout_lines(
    operations: &[Operation],
    fonts: &BTreeMap<Vec<u8>, Encoding<'_>>,
) -> Vec<String> {
    let mut state = TextState::new(fonts);
    for operation in operations {
        state.apply(operation);
    }
    group_lines(state.fragments)
}

/// Text of one page, one visual row per line.
pub(crate) fn page_text(document: &Document, page_id: ObjectId) -> Result<String, lopdf::Error> {
    let mut fonts = BTreeMap::new();
    for (name, font) in document.get_page_fonts(page_id)? {
        match font.get_font_encoding(document) {
            Ok(encoding) => {
                fonts.insert(name, encoding);
            }
            Err(err) => warn!(
                font = %String::from_utf8_lossy(&name),
                "unsupported font encoding, falling back to Windows-1252: {err}"
            ),
        }
    }

    let content = Content::decode(&document.get_page_content(page_id)?)?;
    Ok(layout_lines(&content.operations, &fonts).join("\n"))
}
