//! System prompt for LLM-based OCR cleanup.
//!
//! Keeping the instruction here, rather than inline in the request builder,
//! gives one place to tune it and lets tests inspect it without a network.
//!
//! Callers can override the default via
//! [`crate::config::CorrectionConfig::system_prompt`]; the constant is used
//! only when no override is provided.

/// Default system instruction sent ahead of the raw OCR text.
pub const CLEANUP_SYSTEM_PROMPT: &str = "You are an OCR cleanup assistant. Clean up the following text: \
fix formatting, punctuation, spacing and misspellings, remove OCR noise, and make it easy to read.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_covers_cleanup_duties() {
        for duty in ["punctuation", "spacing", "misspellings", "OCR noise", "easy to read"] {
            assert!(
                CLEANUP_SYSTEM_PROMPT.contains(duty),
                "prompt should mention {duty:?}"
            );
        }
    }
}
