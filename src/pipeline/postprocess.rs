//! Post-processing: deterministic cleanup of raw OCR engine output.
//!
//! Engines emit form feeds between pages, Windows line endings, trailing
//! spaces from column padding and long runs of empty lines from blank regions
//! of the scan. None of that is content. These rules remove it without
//! touching the recognised characters themselves, so the text the user sees
//! first is tidy but otherwise exactly what the engine read.
//!
//! LLM-corrected text is never passed through here; it is returned verbatim.
//!
//! ## Rule Order
//!
//! Line endings are normalised first so every later rule can split on `\n`;
//! blank-line collapsing runs after trailing-whitespace trimming so lines of
//! spaces count as blank.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all normalisation rules to one page of engine output.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF / CR → LF)
/// 2. Replace form feeds with line breaks
/// 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 4. Trim trailing whitespace per line
/// 5. Collapse runs of blank lines to a single blank line
/// 6. Drop leading and trailing blank lines
pub fn normalise_ocr_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = replace_form_feeds(&s);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    trim_blank_edges(&s)
}

/// Join per-page text with one blank line between pages, skipping empty pages.
pub fn join_pages<S: AsRef<str>>(pages: &[S]) -> String {
    pages
        .iter()
        .map(AsRef::as_ref)
        .filter(|page| !page.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Form feeds ───────────────────────────────────────────────────────

fn replace_form_feeds(input: &str) -> String {
    input.replace('\u{000C}', "\n")
}

// ── Rule 3: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 4: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .split('\n')
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 5: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Rule 6: Trim blank edges ─────────────────────────────────────────────────

fn trim_blank_edges(input: &str) -> String {
    input.trim_matches('\n').to_string()
}
