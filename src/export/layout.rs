//! Text fitting: turn a block of text into pages of positioned lines.
//!
//! Layout is a pure function of the text, a [`TextMeasure`] and a
//! [`PageGeometry`]; nothing here touches a PDF object. The writer draws
//! whatever this module decides.
//!
//! Per input line:
//!
//! 1. blank lines advance the cursor by one line height and draw nothing;
//! 2. a line that fits the available width is drawn as-is;
//! 3. a line that overflows is word-wrapped at spaces;
//! 4. if any single word is wider than the page, the whole line is instead
//!    chunked greedily by character, each chunk the longest prefix that fits,
//!    and never less than one character.
//!
//! A line that would cross the page-break trigger starts a new page first.

/// Points per millimetre.
pub const MM: f32 = 72.0 / 25.4;

/// Anything that can tell how wide text renders at a given size.
///
/// Widths are in points. `text_width` must equal the sum of `char_width` over
/// the string; the layout relies on that to chunk lines in a single pass.
pub trait TextMeasure {
    fn char_width(&self, ch: char, font_size: f32) -> f32;

    fn text_width(&self, text: &str, font_size: f32) -> f32 {
        text.chars().map(|ch| self.char_width(ch, font_size)).sum()
    }
}

/// Page size, margins and line metrics, all in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub left_margin: f32,
    pub right_margin: f32,
    pub top_margin: f32,
    /// Distance from the bottom edge at which a new page is started.
    pub bottom_margin: f32,
    /// Horizontal padding between the margin and the first glyph.
    pub cell_padding: f32,
    pub line_height: f32,
    pub font_size: f32,
}

impl PageGeometry {
    /// A4 portrait, 10 mm side/top margins, 15 mm break trigger, 10 mm lines, 12 pt text.
    pub fn a4() -> Self {
        Self {
            width: 210.0 * MM,
            height: 297.0 * MM,
            left_margin: 10.0 * MM,
            right_margin: 10.0 * MM,
            top_margin: 10.0 * MM,
            bottom_margin: 15.0 * MM,
            cell_padding: 1.0 * MM,
            line_height: 10.0 * MM,
            font_size: 12.0,
        }
    }

    /// Width a line may occupy: page width minus left and right margins.
    pub fn available_width(&self) -> f32 {
        (self.width - self.left_margin - self.right_margin).max(0.0)
    }

    fn page_break_trigger(&self) -> f32 {
        self.height - self.bottom_margin
    }

    /// PDF user-space y of the baseline for a line whose cell top is `top`
    /// (measured downward from the top edge). Text sits vertically centred
    /// in its cell.
    pub fn baseline(&self, top: f32) -> f32 {
        self.height - (top + 0.5 * self.line_height + 0.3 * self.font_size)
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        let fields = [
            ("width", self.width),
            ("height", self.height),
            ("line_height", self.line_height),
            ("font_size", self.font_size),
        ];
        for (name, value) in fields {
            if !(value.is_finite() && value > 0.0) {
                return Err(format!("page {name} must be positive, got {value}"));
            }
        }
        let margins = [
            self.left_margin,
            self.right_margin,
            self.top_margin,
            self.bottom_margin,
            self.cell_padding,
        ];
        if margins.iter().any(|m| !(m.is_finite() && *m >= 0.0)) {
            return Err("page margins must be non-negative".into());
        }
        if self.top_margin >= self.page_break_trigger() {
            return Err("top margin leaves no room above the bottom margin".into());
        }
        Ok(())
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::a4()
    }
}

/// How a drawn line came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// The input line fit the page unchanged.
    Whole,
    /// One row of a word-wrapped input line.
    Wrapped,
    /// One character chunk of an input line with an unbreakable token.
    Chunked,
}

/// A line of text at its final position.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    /// Left edge of the text in points.
    pub x: f32,
    /// Top of the line's cell, measured down from the top edge.
    pub top: f32,
    pub kind: LineKind,
}

/// Pages of placed lines. Always has at least one (possibly empty) page.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub pages: Vec<Vec<PlacedLine>>,
}

impl Layout {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn line_count(&self) -> usize {
        self.pages.iter().map(Vec::len).sum()
    }

    /// All lines in drawing order.
    pub fn lines(&self) -> impl Iterator<Item = &PlacedLine> {
        self.pages.iter().flatten()
    }
}

/// Lay `text` out on pages described by `page`.
pub fn layout_text(text: &str, measure: &dyn TextMeasure, page: &PageGeometry) -> Layout {
    let available = page.available_width();
    let size = page.font_size;
    let mut cursor = Cursor::new(page);

    for raw in text.split('\n') {
        let line = raw.strip_suffix('\r').unwrap_or(raw);

        if line.trim().is_empty() {
            cursor.skip_line();
            continue;
        }

        if measure.text_width(line, size) <= available {
            cursor.place(line.to_string(), LineKind::Whole);
            continue;
        }

        match wrap_words(line, measure, available, size) {
            Some(rows) => {
                for row in rows {
                    cursor.place(row, LineKind::Wrapped);
                }
            }
            None => {
                for chunk in chunk_chars(line, measure, available, size) {
                    cursor.place(chunk, LineKind::Chunked);
                }
            }
        }
    }

    cursor.finish()
}

/// Greedy word wrap at single spaces.
///
/// Returns `None` when some word alone is wider than `available`, which no
/// amount of wrapping can fix.
pub fn wrap_words(
    line: &str,
    measure: &dyn TextMeasure,
    available: f32,
    font_size: f32,
) -> Option<Vec<String>> {
    let space = measure.char_width(' ', font_size);
    let mut rows = Vec::new();
    let mut current = String::new();
    let mut current_width = 0.0_f32;

    for (i, word) in line.split(' ').enumerate() {
        let word_width = measure.text_width(word, font_size);
        if word_width > available {
            return None;
        }

        if i == 0 {
            current.push_str(word);
            current_width = word_width;
        } else if current_width + space + word_width <= available {
            current.push(' ');
            current.push_str(word);
            current_width += space + word_width;
        } else {
            rows.push(std::mem::take(&mut current));
            current.push_str(word);
            current_width = word_width;
        }
    }
    rows.push(current);
    rows.retain(|row| !row.is_empty());

    Some(rows)
}

/// Split `line` into consecutive chunks that each fit `available`.
///
/// Every iteration consumes at least one character, so this terminates for
/// any measure, including zero available width. Concatenating the chunks
/// yields `line` exactly.
pub fn chunk_chars(
    line: &str,
    measure: &dyn TextMeasure,
    available: f32,
    font_size: f32,
) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = line;

    while let Some(first) = rest.chars().next() {
        let mut width = 0.0_f32;
        let mut end = 0;
        for (idx, ch) in rest.char_indices() {
            let w = measure.char_width(ch, font_size);
            if width + w > available {
                break;
            }
            width += w;
            end = idx + ch.len_utf8();
        }
        if end == 0 {
            end = first.len_utf8();
        }

        chunks.push(rest[..end].to_string());
        rest = &rest[end..];
    }

    chunks
}

/// Vertical position tracker with automatic page breaks.
struct Cursor<'a> {
    page: &'a PageGeometry,
    y: f32,
    pages: Vec<Vec<PlacedLine>>,
}

impl<'a> Cursor<'a> {
    fn new(page: &'a PageGeometry) -> Self {
        Self {
            page,
            y: page.top_margin,
            pages: vec![Vec::new()],
        }
    }

    fn skip_line(&mut self) {
        self.y += self.page.line_height;
    }

    fn place(&mut self, text: String, kind: LineKind) {
        if self.y + self.page.line_height > self.page.page_break_trigger() {
            self.pages.push(Vec::new());
            self.y = self.page.top_margin;
        }

        let line = PlacedLine {
            text,
            x: self.page.left_margin + self.page.cell_padding,
            top: self.y,
            kind,
        };
        if let Some(current) = self.pages.last_mut() {
            current.push(line);
        }
        self.y += self.page.line_height;
    }

    fn finish(self) -> Layout {
        Layout { pages: self.pages }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every character is `per_char` points wide regardless of size.
    struct Fixed(f32);

    impl TextMeasure for Fixed {
        fn char_width(&self, _ch: char, _font_size: f32) -> f32 {
            self.0
        }
    }

    #[test]
    fn empty_text_is_one_empty_page() {
        let layout = layout_text("", &Fixed(6.0), &PageGeometry::a4());
        assert_eq!(layout.page_count(), 1);
        assert_eq!(layout.line_count(), 0);
    }

    #[test]
    fn short_lines_draw_once_each() {
        let text = "first line\n\nsecond line\n   \nthird\r\nfourth\n";
        let layout = layout_text(text, &Fixed(6.0), &PageGeometry::a4());
        let non_blank = text.split('\n').filter(|l| !l.trim().is_empty()).count();
        assert_eq!(layout.line_count(), non_blank);
        assert!(layout.lines().all(|l| l.kind == LineKind::Whole));
        assert_eq!(layout.pages[0][2].text, "third");
    }

    #[test]
    fn blank_lines_keep_paragraph_spacing() {
        let page = PageGeometry::a4();
        let layout = layout_text("a\n\nb", &Fixed(6.0), &page);
        let lines: Vec<_> = layout.lines().collect();
        assert_eq!(lines.len(), 2);
        let gap = lines[1].top - lines[0].top;
        assert!((gap - 2.0 * page.line_height).abs() < 1e-3, "gap was {gap}");
    }

    #[test]
    fn unbreakable_token_is_chunked_losslessly() {
        let page = PageGeometry::a4();
        let token = "x".repeat(500);
        let layout = layout_text(&token, &Fixed(6.0), &page);

        assert!(layout.line_count() > 1);
        assert!(layout.lines().all(|l| l.kind == LineKind::Chunked));
        let rebuilt: String = layout.lines().map(|l| l.text.as_str()).collect();
        assert_eq!(rebuilt, token);
        for line in layout.lines() {
            assert!(line.text.chars().count() as f32 * 6.0 <= page.available_width());
        }
    }

    #[test]
    fn multibyte_token_is_chunked_on_char_boundaries() {
        let token = "日本語テキスト".repeat(40);
        let layout = layout_text(&token, &Fixed(12.0), &PageGeometry::a4());
        let rebuilt: String = layout.lines().map(|l| l.text.as_str()).collect();
        assert_eq!(rebuilt, token);
    }

    #[test]
    fn zero_available_width_still_terminates() {
        let mut page = PageGeometry::a4();
        page.left_margin = page.width / 2.0;
        page.right_margin = page.width / 2.0;
        assert_eq!(page.available_width(), 0.0);

        let layout = layout_text("abc def", &Fixed(6.0), &page);
        let texts: Vec<_> = layout.lines().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c", " ", "d", "e", "f"]);
    }

    #[test]
    fn chunking_survives_nan_widths() {
        struct Broken;
        impl TextMeasure for Broken {
            fn char_width(&self, _ch: char, _font_size: f32) -> f32 {
                f32::NAN
            }
        }
        let chunks = chunk_chars("abcdef", &Broken, 10.0, 12.0);
        assert_eq!(chunks.concat(), "abcdef");
    }

    #[test]
    fn long_sentence_wraps_at_spaces() {
        let page = PageGeometry::a4();
        let sentence = vec!["word"; 60].join(" ");
        let layout = layout_text(&sentence, &Fixed(6.0), &page);

        assert!(layout.line_count() > 1);
        assert!(layout.lines().all(|l| l.kind == LineKind::Wrapped));
        for line in layout.lines() {
            assert!(line.text.chars().count() as f32 * 6.0 <= page.available_width());
        }
        let rejoined = layout
            .lines()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(rejoined, sentence);
    }

    #[test]
    fn one_oversized_word_chunks_the_whole_line() {
        let page = PageGeometry::a4();
        let line = format!("short {} tail", "y".repeat(200));
        assert!(wrap_words(&line, &Fixed(6.0), page.available_width(), 12.0).is_none());

        let layout = layout_text(&line, &Fixed(6.0), &page);
        assert!(layout.lines().all(|l| l.kind == LineKind::Chunked));
        let rebuilt: String = layout.lines().map(|l| l.text.as_str()).collect();
        assert_eq!(rebuilt, line);
    }

    #[test]
    fn pages_break_before_the_bottom_margin() {
        let page = PageGeometry::a4();
        let text = (1..=100).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let layout = layout_text(&text, &Fixed(6.0), &page);

        assert_eq!(layout.line_count(), 100);
        assert_eq!(layout.pages[0].len(), 27);
        assert_eq!(layout.page_count(), 4);
        for page_lines in &layout.pages {
            assert!((page_lines[0].top - page.top_margin).abs() < 1e-3);
            for line in page_lines {
                assert!(line.top + page.line_height <= page.height - page.bottom_margin + 1e-3);
            }
        }
    }

    #[test]
    fn geometry_validation() {
        assert!(PageGeometry::a4().validate().is_ok());
        let mut bad = PageGeometry::a4();
        bad.font_size = 0.0;
        assert!(bad.validate().is_err());
        let mut bad = PageGeometry::a4();
        bad.left_margin = -1.0;
        assert!(bad.validate().is_err());
    }
}
