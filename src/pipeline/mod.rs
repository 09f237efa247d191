//! Pipeline stages for OCR extraction and refinement.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and swapped (e.g. local vs remote OCR) without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ preprocess ──▶ ocr ──▶ postprocess      ← extraction (fatal on error)
//!                                      │
//!                                      ▼
//!                                   correct ──▶ export   ← refinement (degrades)
//!
//! input ──▶ searchable                              ← sibling, PDFs only
//! ```
//!
//! 1. [`input`]       — load a path/URL/bytes and stage it into a per-request temp dir
//! 2. [`preprocess`]  — grayscale page images; pdfium rasterisation for PDFs
//! 3. [`ocr`]         — page images to text via Tesseract or a remote service
//! 4. [`postprocess`] — deterministic cleanup of engine output
//! 5. [`correct`]     — one LLM call; falls back to the input text
//! 6. [`searchable`]  — `ocrmypdf` text layer with a three-way outcome
//!
//! PDF re-export lives in [`crate::export`].

pub mod correct;
pub mod input;
pub mod ocr;
pub mod postprocess;
pub mod preprocess;
pub mod searchable;
