//! Serialise a [`Layout`] to PDF bytes with `lopdf`.
//!
//! Built-in Helvetica is referenced as a standard Type 1 font with WinAnsi
//! encoding. A TrueType face is embedded whole as a Type 0 composite font
//! (CIDFontType2, Identity-H) with a `/W` array for the glyphs actually used
//! and a ToUnicode CMap so text copied out of the PDF stays readable.
//!
//! Content streams are left uncompressed; only the embedded font file is
//! deflated.

use crate::error::ExportError;
use crate::export::font::{encode_winansi, ExportFont, TrueTypeFont};
use crate::export::layout::{Layout, PageGeometry, PlacedLine};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use tracing::debug;

const FONT_KEY: &str = "F1";
const PRODUCER: &str = concat!("ocr-refinery ", env!("CARGO_PKG_VERSION"));

/// Write `layout` as a complete PDF document.
pub fn write_pdf(
    layout: &Layout,
    font: &ExportFont,
    page: &PageGeometry,
    title: Option<&str>,
) -> Result<Vec<u8>, ExportError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = match font {
        ExportFont::Builtin => doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        }),
        ExportFont::Unicode(face) => embed_truetype(&mut doc, face, layout),
    };
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { FONT_KEY => font_id },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(layout.page_count());
    for lines in &layout.pages {
        let content = Content {
            operations: page_operations(lines, font, page),
        };
        let encoded = content
            .encode()
            .map_err(|e| ExportError::Serialise(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(Dictionary::new(), encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
        "Resources" => resources_id,
        "MediaBox" => vec![
            0.into(),
            0.into(),
            Object::Real(page.width),
            Object::Real(page.height),
        ],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });

    let mut info = dictionary! { "Producer" => Object::string_literal(PRODUCER) };
    if let Some(title) = title {
        info.set("Title", text_string(title));
    }
    let info_id = doc.add_object(info);

    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| ExportError::Serialise(e.to_string()))?;
    Ok(out)
}

fn page_operations(lines: &[PlacedLine], font: &ExportFont, page: &PageGeometry) -> Vec<Operation> {
    if lines.is_empty() {
        return Vec::new();
    }

    let mut ops = Vec::with_capacity(lines.len() * 2 + 3);
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new(
        "Tf",
        vec![FONT_KEY.into(), Object::Real(page.font_size)],
    ));
    for line in lines {
        ops.push(Operation::new(
            "Tm",
            vec![
                1.into(),
                0.into(),
                0.into(),
                1.into(),
                Object::Real(line.x),
                Object::Real(page.baseline(line.top)),
            ],
        ));
        ops.push(Operation::new("Tj", vec![show_string(&line.text, font)]));
    }
    ops.push(Operation::new("ET", vec![]));
    ops
}

fn show_string(text: &str, font: &ExportFont) -> Object {
    let bytes = match font {
        ExportFont::Builtin => encode_winansi(text),
        ExportFont::Unicode(face) => text
            .chars()
            .flat_map(|ch| face.glyph_id(ch).to_be_bytes())
            .collect(),
    };
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// Info-dictionary text: PDFDocEncoding for ASCII, UTF-16BE otherwise.
fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::string_literal(text);
    }
    let mut bytes = vec![0xFE, 0xFF];
    bytes.extend(text.encode_utf16().flat_map(u16::to_be_bytes));
    Object::String(bytes, StringFormat::Hexadecimal)
}

fn embed_truetype(doc: &mut Document, face: &TrueTypeFont, layout: &Layout) -> ObjectId {
    // glyph id -> first character drawn with it
    let mut used: BTreeMap<u16, char> = BTreeMap::new();
    for line in layout.lines() {
        for ch in line.text.chars() {
            used.entry(face.glyph_id(ch)).or_insert(ch);
        }
    }

    let base_font = Object::Name(face.name().as_bytes().to_vec());

    let mut file = Stream::new(
        dictionary! { "Length1" => face.data().len() as i64 },
        face.data().to_vec(),
    );
    if let Err(e) = file.compress() {
        debug!("Embedding {} uncompressed: {e}", face.name());
    }
    let file_id = doc.add_object(file);

    let bbox = face.bbox_1000();
    let descriptor_id = doc.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => base_font.clone(),
        "Flags" => 32,
        "FontBBox" => bbox.iter().map(|v| Object::Integer(*v)).collect::<Vec<_>>(),
        "ItalicAngle" => 0,
        "Ascent" => face.ascent_1000(),
        "Descent" => face.descent_1000(),
        "CapHeight" => face.cap_height_1000(),
        "StemV" => 80,
        "FontFile2" => file_id,
    });

    let mut widths = Vec::with_capacity(used.len() * 2);
    for gid in used.keys() {
        widths.push(Object::Integer(i64::from(*gid)));
        widths.push(Object::Array(vec![Object::Integer(face.advance_1000(*gid))]));
    }

    let cid_font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "CIDFontType2",
        "BaseFont" => base_font.clone(),
        "CIDSystemInfo" => dictionary! {
            "Registry" => Object::string_literal("Adobe"),
            "Ordering" => Object::string_literal("Identity"),
            "Supplement" => 0,
        },
        "FontDescriptor" => descriptor_id,
        "DW" => 1000,
        "W" => widths,
        "CIDToGIDMap" => "Identity",
    });

    let to_unicode_id = doc.add_object(Stream::new(
        Dictionary::new(),
        to_unicode_cmap(&used).into_bytes(),
    ));

    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => base_font,
        "Encoding" => "Identity-H",
        "DescendantFonts" => vec![Object::Reference(cid_font_id)],
        "ToUnicode" => to_unicode_id,
    })
}

/// A ToUnicode CMap mapping each used glyph id back to its character.
fn to_unicode_cmap(used: &BTreeMap<u16, char>) -> String {
    let entries: Vec<(u16, char)> = used
        .iter()
        .filter(|(gid, _)| **gid != 0)
        .map(|(gid, ch)| (*gid, *ch))
        .collect();

    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n\
         <0000> <FFFF>\n\
         endcodespacerange\n",
    );

    // bfchar sections hold at most 100 entries each
    for block in entries.chunks(100) {
        let _ = writeln!(cmap, "{} beginbfchar", block.len());
        for (gid, ch) in block {
            let mut utf16 = [0u16; 2];
            let units: String = ch
                .encode_utf16(&mut utf16)
                .iter()
                .map(|u| format!("{u:04X}"))
                .collect();
            let _ = writeln!(cmap, "<{gid:04X}> <{units}>");
        }
        cmap.push_str("endbfchar\n");
    }

    cmap.push_str(
        "endcmap\n\
         CMapName currentdict /CMap defineresource pop\n\
         end\n\
         end\n",
    );
    cmap
}
