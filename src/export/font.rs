//! Fonts for the re-export stage and their metrics.
//!
//! Two kinds of font can be drawn with:
//!
//! * a TrueType file (DejaVu Sans by default), embedded in full so any glyph
//!   it covers renders, including Cyrillic and CJK where the face has them;
//! * the PDF standard Helvetica, which needs no file but only covers
//!   WinAnsi (cp1252). Characters outside it are drawn as `?`.

use crate::error::ExportError;
use crate::export::layout::TextMeasure;
use std::collections::HashMap;

/// A font ready for layout and embedding.
#[derive(Debug, Clone)]
pub enum ExportFont {
    Unicode(TrueTypeFont),
    Builtin,
}

impl ExportFont {
    /// Font name as written to the PDF.
    pub fn name(&self) -> &str {
        match self {
            ExportFont::Unicode(face) => face.name(),
            ExportFont::Builtin => "Helvetica",
        }
    }

    pub fn is_unicode(&self) -> bool {
        matches!(self, ExportFont::Unicode(_))
    }
}

impl TextMeasure for ExportFont {
    fn char_width(&self, ch: char, font_size: f32) -> f32 {
        match self {
            ExportFont::Unicode(face) => face.char_width(ch, font_size),
            ExportFont::Builtin => Helvetica.char_width(ch, font_size),
        }
    }
}

// ── Built-in Helvetica ───────────────────────────────────────────────────

/// Metrics for the standard Type 1 Helvetica.
pub struct Helvetica;

impl TextMeasure for Helvetica {
    fn char_width(&self, ch: char, font_size: f32) -> f32 {
        let byte = winansi_byte(ch).unwrap_or(b'?');
        f32::from(HELVETICA_WIDTHS[usize::from(byte)]) * font_size / 1000.0
    }
}

/// Encode `text` as WinAnsi bytes, substituting `?` for anything unmappable.
pub fn encode_winansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| winansi_byte(ch).unwrap_or(b'?'))
        .collect()
}

/// The cp1252 byte for `ch`, if it has one.
pub fn winansi_byte(ch: char) -> Option<u8> {
    let code = u32::from(ch);
    if code < 0x80 || (0xA0..=0xFF).contains(&code) {
        return u8::try_from(code).ok();
    }
    let byte = match ch {
        '\u{20AC}' => 0x80,
        '\u{201A}' => 0x82,
        '\u{0192}' => 0x83,
        '\u{201E}' => 0x84,
        '\u{2026}' => 0x85,
        '\u{2020}' => 0x86,
        '\u{2021}' => 0x87,
        '\u{02C6}' => 0x88,
        '\u{2030}' => 0x89,
        '\u{0160}' => 0x8A,
        '\u{2039}' => 0x8B,
        '\u{0152}' => 0x8C,
        '\u{017D}' => 0x8E,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{02DC}' => 0x98,
        '\u{2122}' => 0x99,
        '\u{0161}' => 0x9A,
        '\u{203A}' => 0x9B,
        '\u{0153}' => 0x9C,
        '\u{017E}' => 0x9E,
        '\u{0178}' => 0x9F,
        _ => return None,
    };
    Some(byte)
}

/// Helvetica advance widths per WinAnsi code, in 1/1000 em.
#[rustfmt::skip]
static HELVETICA_WIDTHS: [u16; 256] = [
    278, 278, 278, 278, 278, 278, 278, 278, 278, 278, 278, 278, 278, 278, 278, 278,
    278, 278, 278, 278, 278, 278, 278, 278, 278, 278, 278, 278, 278, 278, 278, 278,
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, 350,
    556, 350, 222, 556, 333, 1000, 556, 556, 333, 1000, 667, 333, 1000, 350, 611, 350,
    350, 222, 222, 333, 333, 350, 556, 1000, 333, 1000, 500, 333, 944, 350, 500, 667,
    278, 333, 556, 556, 556, 556, 260, 556, 333, 737, 370, 556, 584, 333, 737, 333,
    400, 584, 333, 333, 333, 556, 537, 278, 333, 333, 365, 556, 834, 834, 834, 611,
    667, 667, 667, 667, 667, 667, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278,
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611,
    556, 556, 556, 556, 556, 556, 889, 500, 556, 556, 556, 556, 278, 278, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 584, 611, 556, 556, 556, 556, 500, 556, 500,
];

// ── TrueType ─────────────────────────────────────────────────────────────

/// A parsed TrueType face with the tables needed for layout and embedding.
///
/// The face is parsed once with `ttf-parser`; the character map and advance
/// widths are copied out so the raw bytes can be owned alongside them.
#[derive(Clone)]
pub struct TrueTypeFont {
    name: String,
    data: Vec<u8>,
    units_per_em: u16,
    ascender: i16,
    descender: i16,
    cap_height: i16,
    bbox: [i16; 4],
    glyphs: HashMap<char, u16>,
    advances: Vec<u16>,
}

impl std::fmt::Debug for TrueTypeFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrueTypeFont")
            .field("name", &self.name)
            .field("data", &format_args!("<{} bytes>", self.data.len()))
            .field("glyphs", &self.glyphs.len())
            .finish()
    }
}

impl TrueTypeFont {
    /// Parse `data` as a TrueType/OpenType font.
    ///
    /// `fallback_name` is used when the face carries no PostScript name.
    pub fn parse(fallback_name: &str, data: Vec<u8>) -> Result<Self, ExportError> {
        let parse_err = |detail: String| ExportError::FontParse {
            name: fallback_name.to_string(),
            detail,
        };

        let face = ttf_parser::Face::parse(&data, 0).map_err(|e| parse_err(e.to_string()))?;

        let units_per_em = face.units_per_em();
        if units_per_em == 0 {
            return Err(parse_err("units per em is zero".into()));
        }

        let mut glyphs = HashMap::new();
        if let Some(cmap) = face.tables().cmap {
            for subtable in cmap.subtables {
                if !subtable.is_unicode() {
                    continue;
                }
                subtable.codepoints(|cp| {
                    if let Some(ch) = char::from_u32(cp) {
                        if let Some(gid) = subtable.glyph_index(cp) {
                            glyphs.entry(ch).or_insert(gid.0);
                        }
                    }
                });
            }
        }
        if glyphs.is_empty() {
            return Err(parse_err("no Unicode character map".into()));
        }

        let advances = (0..face.number_of_glyphs())
            .map(|gid| {
                face.glyph_hor_advance(ttf_parser::GlyphId(gid))
                    .unwrap_or(0)
            })
            .collect();

        let name = postscript_name(&face).unwrap_or_else(|| sanitise_name(fallback_name));
        let rect = face.global_bounding_box();

        Ok(Self {
            name,
            units_per_em,
            ascender: face.ascender(),
            descender: face.descender(),
            cap_height: face.capital_height().unwrap_or_else(|| face.ascender()),
            bbox: [rect.x_min, rect.y_min, rect.x_max, rect.y_max],
            glyphs,
            advances,
            data,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The original font file.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Glyph id for `ch`, or 0 (`.notdef`) if the face lacks it.
    pub fn glyph_id(&self, ch: char) -> u16 {
        self.glyphs.get(&ch).copied().unwrap_or(0)
    }

    /// Advance of glyph `gid` in 1/1000 em, as PDF width arrays expect.
    pub fn advance_1000(&self, gid: u16) -> i64 {
        let advance = self.advances.get(usize::from(gid)).copied().unwrap_or(0);
        self.scale(i32::from(advance))
    }

    pub fn ascent_1000(&self) -> i64 {
        self.scale(i32::from(self.ascender))
    }

    pub fn descent_1000(&self) -> i64 {
        self.scale(i32::from(self.descender))
    }

    pub fn cap_height_1000(&self) -> i64 {
        self.scale(i32::from(self.cap_height))
    }

    pub fn bbox_1000(&self) -> [i64; 4] {
        self.bbox.map(|v| self.scale(i32::from(v)))
    }

    fn scale(&self, units: i32) -> i64 {
        (f64::from(units) * 1000.0 / f64::from(self.units_per_em)).round() as i64
    }
}

impl TextMeasure for TrueTypeFont {
    fn char_width(&self, ch: char, font_size: f32) -> f32 {
        self.advance_1000(self.glyph_id(ch)) as f32 * font_size / 1000.0
    }
}

fn postscript_name(face: &ttf_parser::Face<'_>) -> Option<String> {
    face.names()
        .into_iter()
        .filter(|n| n.name_id == ttf_parser::name_id::POST_SCRIPT_NAME)
        .find_map(|n| n.to_string())
        .map(|s| sanitise_name(&s))
        .filter(|s| !s.is_empty())
}

/// PDF names must not contain whitespace or delimiters.
fn sanitise_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '.'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const SYSTEM_DEJAVU: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";

    #[test]
    fn winansi_covers_latin1_and_cp1252_extras() {
        assert_eq!(winansi_byte('A'), Some(b'A'));
        assert_eq!(winansi_byte('é'), Some(0xE9));
        assert_eq!(winansi_byte('€'), Some(0x80));
        assert_eq!(winansi_byte('—'), Some(0x97));
        assert_eq!(winansi_byte('Ж'), None);
        assert_eq!(winansi_byte('日'), None);
    }

    #[test]
    fn unmappable_chars_encode_as_question_marks() {
        assert_eq!(encode_winansi("Привет, café"), b"??????, caf\xE9".to_vec());
    }

    #[test]
    fn helvetica_widths_match_afm() {
        let h = Helvetica;
        assert!((h.char_width(' ', 1000.0) - 278.0).abs() < 1e-3);
        assert!((h.char_width('W', 1000.0) - 944.0).abs() < 1e-3);
        assert!((h.char_width('i', 12.0) - 2.664).abs() < 1e-3);
        // Unmappable text is measured as the '?' it will be drawn as.
        assert_eq!(h.char_width('Ж', 12.0), h.char_width('?', 12.0));
    }

    #[test]
    fn garbage_is_not_a_font() {
        let err = TrueTypeFont::parse("junk", b"definitely not a font".to_vec()).unwrap_err();
        assert!(matches!(err, ExportError::FontParse { .. }));
    }

    #[test]
    fn sanitised_names_are_pdf_safe() {
        assert_eq!(sanitise_name("DejaVu Sans (Book)"), "DejaVuSansBook");
    }

    #[test]
    fn system_dejavu_covers_cyrillic() {
        if !Path::new(SYSTEM_DEJAVU).exists() {
            eprintln!("skipping: {SYSTEM_DEJAVU} not installed");
            return;
        }
        let data = std::fs::read(SYSTEM_DEJAVU).unwrap();
        let font = TrueTypeFont::parse("DejaVuSans", data).unwrap();

        assert_eq!(font.name(), "DejaVuSans");
        assert_ne!(font.glyph_id('Ж'), 0);
        assert_ne!(font.glyph_id('a'), 0);
        assert!(font.char_width('M', 12.0) > font.char_width('i', 12.0));
        assert!(font.ascent_1000() > 0);
        assert!(font.descent_1000() < 0);
    }
}
