//! Correction stage: one chat-completion call to clean raw OCR text.
//!
//! Two backends produce the same [`CorrectionResult`]:
//!
//! * **Chat completions** (default): a single HTTPS POST
//!   `{model, messages:[system, user], temperature, max_tokens}` with a
//!   bearer token, answered by `{choices:[{message:{content}}]}`.
//! * **Provider**: an `edgequake-llm` provider, either handed in pre-built or
//!   created by name, for deployments that route through another vendor.
//!
//! Whatever goes wrong (no key, network, non-2xx, unexpected body) the stage
//! returns the input text untouched with a
//! [`CorrectionStatus::Degraded`](crate::output::CorrectionStatus) reason.
//! Successful output is returned verbatim: no trimming, no validation.

use crate::config::CorrectionConfig;
use crate::error::CorrectionError;
use crate::output::CorrectionResult;
use crate::prompts::CLEANUP_SYSTEM_PROMPT;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Environment variable holding the chat-completion bearer token.
pub const API_KEY_ENV: &str = "TOGETHER_API_KEY";

/// Longest error body kept in a [`CorrectionError::Status`].
const MAX_ERROR_BODY: usize = 500;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [WireMessage<'a>; 2],
    temperature: f32,
    max_tokens: usize,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// Which backend serves a correction request.
enum Backend {
    ChatCompletions,
    Provider(Arc<dyn LLMProvider>),
}

/// Clean `text`, falling back to it unchanged on any failure.
pub async fn correct_text(text: &str, config: &CorrectionConfig) -> CorrectionResult {
    if text.trim().is_empty() {
        debug!("Nothing to correct: OCR text is empty");
        return CorrectionResult::corrected(text);
    }

    let outcome = match select_backend(config) {
        Ok(Backend::ChatCompletions) => chat_completion(text, config).await,
        Ok(Backend::Provider(provider)) => provider_completion(&provider, text, config).await,
        Err(reason) => Err(reason),
    };

    match outcome {
        Ok(cleaned) => {
            info!(
                "Correction complete: {} → {} chars",
                text.chars().count(),
                cleaned.chars().count()
            );
            CorrectionResult::corrected(cleaned)
        }
        Err(reason) => {
            warn!("Correction failed, keeping original text: {reason}");
            CorrectionResult::degraded(text, reason)
        }
    }
}

/// Resolve the backend, from most-specific to least-specific:
///
/// 1. pre-built provider,
/// 2. named provider plus the configured model,
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` from the environment,
/// 4. the chat-completion endpoint.
fn select_backend(config: &CorrectionConfig) -> Result<Backend, CorrectionError> {
    if let Some(ref provider) = config.provider {
        return Ok(Backend::Provider(Arc::clone(provider)));
    }

    if let Some(ref name) = config.provider_name {
        return create_provider(name, &config.model).map(Backend::Provider);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model).map(Backend::Provider);
        }
    }

    Ok(Backend::ChatCompletions)
}

fn create_provider(name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, CorrectionError> {
    ProviderFactory::create_llm_provider(name, model)
        .map_err(|e| CorrectionError::Provider(format!("{name}/{model}: {e}")))
}

fn system_prompt(config: &CorrectionConfig) -> &str {
    config
        .system_prompt
        .as_deref()
        .unwrap_or(CLEANUP_SYSTEM_PROMPT)
}

/// Configured key first, then the environment; blank keys count as absent.
fn pick_api_key(configured: Option<&str>, from_env: Option<String>) -> Option<String> {
    configured
        .map(str::to_string)
        .or(from_env)
        .filter(|key| !key.trim().is_empty())
}

async fn chat_completion(text: &str, config: &CorrectionConfig) -> Result<String, CorrectionError> {
    let api_key = pick_api_key(config.api_key.as_deref(), std::env::var(API_KEY_ENV).ok())
        .ok_or(CorrectionError::MissingApiKey)?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| CorrectionError::Transport(e.to_string()))?;

    debug!(
        "POST {} model={} ({} chars)",
        config.endpoint,
        config.model,
        text.chars().count()
    );
    let response = client
        .post(&config.endpoint)
        .bearer_auth(api_key)
        .json(&build_request(text, config))
        .send()
        .await
        .map_err(|e| CorrectionError::Transport(e.to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| CorrectionError::Transport(e.to_string()))?;

    if !status.is_success() {
        return Err(CorrectionError::Status {
            status: status.as_u16(),
            body: truncate(body.trim(), MAX_ERROR_BODY),
        });
    }

    parse_completion(&body)
}

fn build_request<'a>(text: &'a str, config: &'a CorrectionConfig) -> ChatRequest<'a> {
    ChatRequest {
        model: &config.model,
        messages: [
            WireMessage {
                role: "system",
                content: system_prompt(config),
            },
            WireMessage {
                role: "user",
                content: text,
            },
        ],
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    }
}

/// First choice's content, verbatim.
fn parse_completion(body: &str) -> Result<String, CorrectionError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| CorrectionError::MalformedResponse(e.to_string()))?;
    parsed
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or_else(|| CorrectionError::MalformedResponse("response has no choices".into()))
}

async fn provider_completion(
    provider: &Arc<dyn LLMProvider>,
    text: &str,
    config: &CorrectionConfig,
) -> Result<String, CorrectionError> {
    let messages = vec![
        ChatMessage::system(system_prompt(config)),
        ChatMessage::user(text),
    ];
    let options = CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    };

    let response = provider
        .chat(&messages, Some(&options))
        .await
        .map_err(|e| CorrectionError::Provider(e.to_string()))?;

    debug!(
        "Provider correction: {} input tokens, {} output tokens",
        response.prompt_tokens, response.completion_tokens
    );
    Ok(response.content)
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_matches_wire_contract() {
        let config = CorrectionConfig::default();
        let body = serde_json::to_value(build_request("teh qu1ck fox", &config)).unwrap();

        assert_eq!(body["model"], "meta-llama/Llama-3.3-70B-Instruct-Turbo-Free");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], CLEANUP_SYSTEM_PROMPT);
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "teh qu1ck fox");
        assert_eq!(body["max_tokens"], 1024);
        assert!((body["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn custom_prompt_replaces_default() {
        let config = CorrectionConfig {
            system_prompt: Some("Fix spelling only.".into()),
            ..CorrectionConfig::default()
        };
        let body = serde_json::to_value(build_request("x", &config)).unwrap();
        assert_eq!(body["messages"][0]["content"], "Fix spelling only.");
    }

    #[test]
    fn completion_content_is_returned_verbatim() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"  Clean text.\n"}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "  Clean text.\n");
    }

    #[test]
    fn empty_choices_is_malformed() {
        let err = parse_completion(r#"{"choices":[]}"#).unwrap_err();
        assert!(matches!(err, CorrectionError::MalformedResponse(_)));
        let err = parse_completion("<html>502</html>").unwrap_err();
        assert!(matches!(err, CorrectionError::MalformedResponse(_)));
    }

    #[test]
    fn api_key_precedence() {
        assert_eq!(
            pick_api_key(Some("cfg"), Some("env".into())).as_deref(),
            Some("cfg")
        );
        assert_eq!(pick_api_key(None, Some("env".into())).as_deref(), Some("env"));
        assert_eq!(pick_api_key(None, None), None);
        assert_eq!(pick_api_key(Some("  "), None), None);
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let s = "é".repeat(600);
        let t = truncate(&s, 500);
        assert_eq!(t.chars().count(), 501);
        assert!(t.ends_with('…'));
        assert_eq!(truncate("short", 500), "short");
    }

    #[tokio::test]
    async fn network_failure_returns_original_text() {
        let config = CorrectionConfig {
            endpoint: "http://127.0.0.1:9/v1/chat/completions".into(),
            api_key: Some("test-key".into()),
            timeout_secs: 5,
            ..CorrectionConfig::default()
        };
        let original = "0CR  text with   noise";
        let result = correct_text(original, &config).await;

        assert_eq!(result.text, original);
        assert!(result.is_degraded());
        assert!(result.notice().is_some());
    }

    #[tokio::test]
    async fn empty_text_skips_the_request() {
        let config = CorrectionConfig {
            endpoint: "http://127.0.0.1:9/v1/chat/completions".into(),
            ..CorrectionConfig::default()
        };
        let result = correct_text("  \n", &config).await;
        assert!(!result.is_degraded());
        assert_eq!(result.text, "  \n");
    }
}
