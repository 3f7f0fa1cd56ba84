//! Minimal top-down page layout for the report: single font, left or centred
//! lines, wrapped paragraphs and one raster image, paginating on overflow.
//! All coordinates are PDF points.

use lopdf::content::Operation;
use lopdf::{Object, StringFormat};

pub const MM: f32 = 72.0 / 25.4;
pub const PAGE_WIDTH: f32 = 210.0 * MM;
pub const PAGE_HEIGHT: f32 = 297.0 * MM;
pub const MARGIN: f32 = 10.0 * MM;
pub const CELL_HEIGHT: f32 = 10.0 * MM;
pub const BODY_LINE_HEIGHT: f32 = 6.0 * MM;
pub const FONT_SIZE: f32 = 12.0;
pub const FONT_NAME: &str = "F1";

// Helvetica advance widths for ' '..='~', in 1/1000 em (Adobe core AFM).
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // 'A'..'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // 'a'..'m'
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'n'..'z'
    334, 260, 334, 584, // '{'..'~'
];
// Outside printable ASCII; as wide as a capital 'C'.
const FALLBACK_WIDTH: u16 = 722;

/// Advance width of `c` in points at [`FONT_SIZE`].
pub fn glyph_width(c: char) -> f32 {
    let units = match c {
        ' '..='~' => HELVETICA_WIDTHS[c as usize - ' ' as usize],
        _ => FALLBACK_WIDTH,
    };
    units as f32 * FONT_SIZE / 1000.0
}

pub fn text_width(text: &str) -> f32 {
    text.chars().map(glyph_width).sum()
}

pub fn content_width() -> f32 {
    PAGE_WIDTH - 2.0 * MARGIN
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
}

pub struct PageLayout {
    pages: Vec<Vec<Operation>>,
    cursor: f32,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl PageLayout {
    pub fn new() -> Self {
        Self {
            pages: vec![Vec::new()],
            cursor: MARGIN,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn gap(&mut self, height: f32) {
        self.cursor += height;
    }

    pub fn line(&mut self, text: &str, align: Align) {
        self.text_row(text, align, CELL_HEIGHT);
    }

    /// Wraps `text` to the content width; explicit newlines are kept.
    pub fn paragraph(&mut self, text: &str) {
        for row in wrap(text, content_width()) {
            self.text_row(&row, Align::Left, BODY_LINE_HEIGHT);
        }
    }

    /// Places an image XObject at the left margin, `width` points wide with
    /// the pixel aspect ratio preserved. Images taller than a page are shrunk
    /// to fit.
    pub fn image(&mut self, xobject: &str, width: f32, pixel_width: u32, pixel_height: u32) {
        let aspect = pixel_height.max(1) as f32 / pixel_width.max(1) as f32;
        let usable = PAGE_HEIGHT - 2.0 * MARGIN;
        let (mut w, mut h) = (width, width * aspect);
        if h > usable {
            w *= usable / h;
            h = usable;
        }

        self.reserve(h);
        let y = PAGE_HEIGHT - self.cursor - h;
        self.push(vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    w.into(),
                    0.0f32.into(),
                    0.0f32.into(),
                    h.into(),
                    MARGIN.into(),
                    y.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(xobject.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ]);
        self.cursor += h;
    }

    pub fn finish(self) -> Vec<Vec<Operation>> {
        self.pages
    }

    fn text_row(&mut self, text: &str, align: Align, height: f32) {
        self.reserve(height);
        let x = match align {
            Align::Left => MARGIN,
            Align::Center => ((PAGE_WIDTH - text_width(text)) / 2.0).max(MARGIN),
        };
        let baseline = PAGE_HEIGHT - (self.cursor + height / 2.0 + FONT_SIZE * 0.35);

        self.push(vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![FONT_NAME.into(), FONT_SIZE.into()]),
            Operation::new("Td", vec![x.into(), baseline.into()]),
            Operation::new(
                "Tj",
                vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
        ]);
        self.cursor += height;
    }

    fn reserve(&mut self, height: f32) {
        let fresh_page = self.cursor <= MARGIN;
        if !fresh_page && self.cursor + height > PAGE_HEIGHT - MARGIN {
            self.pages.push(Vec::new());
            self.cursor = MARGIN;
        }
    }

    fn push(&mut self, operations: Vec<Operation>) {
        if let Some(page) = self.pages.last_mut() {
            page.extend(operations);
        }
    }
}

/// Greedy word wrap by measured width. Words wider than a line are split,
/// keeping at least one character per row.
pub fn wrap(text: &str, max_width: f32) -> Vec<String> {
    let space = glyph_width(' ');
    let mut rows = Vec::new();

    for raw_line in text.split('\n') {
        let line = raw_line.trim_end_matches('\r');
        let first_row = rows.len();
        let mut current = String::new();
        let mut current_width = 0.0;

        for word in line.split_whitespace() {
            let mut word = word;
            let mut word_width = text_width(word);
            while word_width > max_width {
                if !current.is_empty() {
                    rows.push(std::mem::take(&mut current));
                    current_width = 0.0;
                }
                let (head, tail) = word.split_at(split_point(word, max_width));
                rows.push(head.to_string());
                word = tail;
                word_width = text_width(word);
            }
            if word.is_empty() {
                continue;
            }

            let needed = if current.is_empty() {
                word_width
            } else {
                current_width + space + word_width
            };
            if needed > max_width {
                rows.push(std::mem::take(&mut current));
                current_width = 0.0;
            }
            if !current.is_empty() {
                current.push(' ');
                current_width += space;
            }
            current.push_str(word);
            current_width += word_width;
        }

        if !current.is_empty() || rows.len() == first_row {
            rows.push(current);
        }
    }

    rows
}

/// Byte offset of the longest prefix of `word` that fits in `max_width`.
fn split_point(word: &str, max_width: f32) -> usize {
    let mut width = 0.0;
    for (i, c) in word.char_indices() {
        width += glyph_width(c);
        if width > max_width {
            return if i == 0 { c.len_utf8() } else { i };
        }
    }
    word.len()
}

/// Latin-1 subset of WinAnsiEncoding; anything else becomes `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\t' => b' ',
            c if c.is_control() => b' ',
            c if (c as u32) <= 0xFF => c as u32 as u8,
            _ => b'?',
        })
        .collect()
}
