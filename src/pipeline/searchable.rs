//! Searchable-PDF stage: add an invisible text layer with `ocrmypdf`.
//!
//! The tool's exit status decides the outcome:
//!
//! | exit | outcome                              |
//! |------|--------------------------------------|
//! | 0    | [`SearchablePdfResult::Tagged`]      |
//! | 6    | [`SearchablePdfResult::AlreadyTagged`] (page already has text) |
//! | 2 + `TaggedPDFError` | [`SearchablePdfResult::AlreadyTagged`] (marked as a Tagged PDF) |
//! | else | [`SearchablePdfResult::Failed`] with stderr verbatim |
//!
//! The input file is never modified; output always goes to a different path.

use crate::document::Language;
use crate::output::SearchablePdfResult;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// `ocrmypdf` exit status meaning "the PDF already has a text layer".
pub const ALREADY_TAGGED_EXIT_CODE: i32 = 6;

/// `ocrmypdf` exit status for bad input, which also covers Tagged PDFs.
pub const INPUT_FILE_EXIT_CODE: i32 = 2;

/// Whether stderr reports the tool's refusal to touch a Tagged PDF.
fn is_tagged_pdf_error(stderr: &str) -> bool {
    stderr.contains("TaggedPDFError") || stderr.contains("marked as a Tagged PDF")
}

/// `<dir>/<stem>_searchable.pdf` next to `input`.
pub fn searchable_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");
    input.with_file_name(format!("{stem}_searchable.pdf"))
}

/// Run the tool on `input`, writing the tagged copy to `output`.
pub async fn run_ocrmypdf(
    binary: &str,
    input: &Path,
    output: &Path,
    language: Language,
) -> SearchablePdfResult {
    if input == output {
        return SearchablePdfResult::Failed(format!(
            "output path '{}' must differ from the input",
            output.display()
        ));
    }

    debug!(
        "Running {} -l {} {} {}",
        binary,
        language.code(),
        input.display(),
        output.display()
    );
    let result = Command::new(binary)
        .arg("-l")
        .arg(language.code())
        .arg(input)
        .arg(output)
        .kill_on_drop(true)
        .output()
        .await;

    let out = match result {
        Ok(out) => out,
        Err(e) => {
            warn!("Could not start {binary}: {e}");
            return SearchablePdfResult::Failed(format!("could not run {binary}: {e}"));
        }
    };

    let outcome = classify_exit(out.status.code(), &out.stderr, output);
    if let SearchablePdfResult::Tagged(path) = &outcome {
        if !path.exists() {
            return SearchablePdfResult::Failed(format!(
                "{binary} reported success but wrote no file at {}",
                path.display()
            ));
        }
        info!("Searchable PDF written: {}", path.display());
    }
    outcome
}

/// Map the tool's exit status to an outcome.
pub fn classify_exit(code: Option<i32>, stderr: &[u8], output: &Path) -> SearchablePdfResult {
    match code {
        Some(0) => SearchablePdfResult::Tagged(output.to_path_buf()),
        Some(ALREADY_TAGGED_EXIT_CODE) => SearchablePdfResult::AlreadyTagged,
        other => {
            let stderr = String::from_utf8_lossy(stderr).trim().to_string();
            if other == Some(INPUT_FILE_EXIT_CODE) && is_tagged_pdf_error(&stderr) {
                SearchablePdfResult::AlreadyTagged
            } else if !stderr.is_empty() {
                SearchablePdfResult::Failed(stderr)
            } else if let Some(c) = other {
                SearchablePdfResult::Failed(format!("ocrmypdf exited with status {c}"))
            } else {
                SearchablePdfResult::Failed("ocrmypdf was terminated by a signal".into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_map_to_three_outcomes() {
        let out = Path::new("/tmp/x_searchable.pdf");
        assert_eq!(
            classify_exit(Some(0), b"", out),
            SearchablePdfResult::Tagged(out.to_path_buf())
        );
        assert_eq!(
            classify_exit(Some(6), b"PriorOcrFoundError: page already has text!", out),
            SearchablePdfResult::AlreadyTagged
        );
        assert_eq!(
            classify_exit(Some(2), b"InputFileError: not a PDF\n", out),
            SearchablePdfResult::Failed("InputFileError: not a PDF".into())
        );
        assert_eq!(
            classify_exit(Some(15), b"", out),
            SearchablePdfResult::Failed("ocrmypdf exited with status 15".into())
        );
        assert!(matches!(classify_exit(None, b"", out), SearchablePdfResult::Failed(_)));
    }

    #[test]
    fn tagged_pdf_refusal_is_already_tagged() {
        let out = Path::new("/tmp/x_searchable.pdf");
        let stderr = b"TaggedPDFError: This PDF is marked as a Tagged PDF. This often indicates \
that the PDF was generated from an office document and does not need OCR.";
        assert_eq!(
            classify_exit(Some(2), stderr, out),
            SearchablePdfResult::AlreadyTagged
        );
        assert_eq!(
            classify_exit(Some(2), b"This PDF is marked as a Tagged PDF.", out),
            SearchablePdfResult::AlreadyTagged
        );
        // Other exit codes with the same text stay failures.
        assert!(matches!(
            classify_exit(Some(15), b"TaggedPDFError", out),
            SearchablePdfResult::Failed(_)
        ));
    }

    #[test]
    fn output_name_sits_beside_input() {
        assert_eq!(
            searchable_path(Path::new("/work/scan.pdf")),
            PathBuf::from("/work/scan_searchable.pdf")
        );
    }

    #[tokio::test]
    async fn refuses_to_overwrite_input() {
        let p = Path::new("/work/scan.pdf");
        let res = run_ocrmypdf("ocrmypdf", p, p, Language::Eng).await;
        assert!(matches!(res, SearchablePdfResult::Failed(ref m) if m.contains("must differ")));
    }

    #[tokio::test]
    async fn missing_tool_is_a_failure_not_a_panic() {
        let res = run_ocrmypdf(
            "/nonexistent/bin/ocrmypdf-for-tests",
            Path::new("/work/in.pdf"),
            Path::new("/work/out.pdf"),
            Language::Eng,
        )
        .await;
        assert!(matches!(res, SearchablePdfResult::Failed(ref m) if m.contains("could not run")));
    }
}
