//! Model transport: message turns, the [`ModelClient`] seam, and retries.
//!
//! Stage modules build a list of [`Turn`]s and hand them to a
//! [`ModelClient`]. The production client, [`EdgequakeClient`], routes the
//! call through `edgequake-llm`; tests substitute scripted clients.
//!
//! ## Retry Strategy
//!
//! [`complete_with_retries`] is the transport-level retry, distinct from the
//! orchestrator's chain retry. Each failed call waits
//! `retry_backoff_ms * 2^(n-1)` before trying again: with 500 ms base and
//! 2 retries the sequence is 500 ms → 1 s. A single wait never exceeds
//! [`MAX_BACKOFF_MS`].

use crate::config::PipelineConfig;
use crate::error::TransportError;
use crate::pipeline::encode;
use crate::request::PageImage;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Speaker of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message in a model request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub images: Vec<PageImage>,
}

impl Turn {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            text: text.into(),
            images: Vec::new(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            images: Vec::new(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            images: Vec::new(),
        }
    }

    pub fn user_with_images(text: impl Into<String>, images: Vec<PageImage>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            images,
        }
    }
}

/// A generative model endpoint: ordered turns in, one text payload out.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, model: &str, turns: &[Turn]) -> Result<String, TransportError>;
}

/// Transport retry settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub backoff_ms: u64,
}

impl RetryPolicy {
    pub const NONE: RetryPolicy = RetryPolicy {
        retries: 0,
        backoff_ms: 0,
    };

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            retries: config.transport_retries,
            backoff_ms: config.retry_backoff_ms,
        }
    }
}

/// Upper bound on a single transport backoff.
pub const MAX_BACKOFF_MS: u64 = 30_000;

/// Wait before retry number `attempt` (1-based).
pub fn backoff_delay_ms(policy: RetryPolicy, attempt: u32) -> u64 {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    policy.backoff_ms.saturating_mul(factor).min(MAX_BACKOFF_MS)
}

/// Call `client` once plus up to `policy.retries` more times.
///
/// Returns the last error when every call fails.
pub async fn complete_with_retries(
    client: &dyn ModelClient,
    model: &str,
    turns: &[Turn],
    policy: RetryPolicy,
) -> Result<String, TransportError> {
    let mut attempt = 0u32;
    loop {
        if attempt > 0 {
            let backoff = backoff_delay_ms(policy, attempt);
            warn!(
                "Model {}: retry {}/{} after {}ms",
                model, attempt, policy.retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match client.complete(model, turns).await {
            Ok(text) => return Ok(text),
            Err(e) if attempt < policy.retries => {
                warn!("Model {}: call {} failed: {}", model, attempt + 1, e);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// [`ModelClient`] backed by `edgequake-llm` providers.
///
/// Providers are resolved per model id and cached for the client's lifetime.
pub struct EdgequakeClient {
    provider_name: Option<String>,
    provider: Option<Arc<dyn LLMProvider>>,
    options: CompletionOptions,
    api_timeout_secs: u64,
    cache: Mutex<HashMap<String, Arc<dyn LLMProvider>>>,
}

impl EdgequakeClient {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            provider_name: config.provider_name.clone(),
            provider: config.provider.clone(),
            options: build_options(config),
            api_timeout_secs: config.api_timeout_secs,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn provider_for(&self, model: &str) -> Result<Arc<dyn LLMProvider>, TransportError> {
        if let Some(ref provider) = self.provider {
            return Ok(Arc::clone(provider));
        }

        let mut cache = self
            .cache
            .lock()
            .map_err(|_| TransportError::Unavailable {
                model: model.to_string(),
                detail: "provider cache poisoned".to_string(),
            })?;
        if let Some(p) = cache.get(model) {
            return Ok(Arc::clone(p));
        }

        let provider = resolve_provider(self.provider_name.as_deref(), model)?;
        cache.insert(model.to_string(), Arc::clone(&provider));
        Ok(provider)
    }
}

#[async_trait]
impl ModelClient for EdgequakeClient {
    async fn complete(&self, model: &str, turns: &[Turn]) -> Result<String, TransportError> {
        let provider = self.provider_for(model)?;
        let messages = to_chat_messages(turns);
        let start = Instant::now();

        let response = timeout(
            Duration::from_secs(self.api_timeout_secs),
            provider.chat(&messages, Some(&self.options)),
        )
        .await
        .map_err(|_| TransportError::Timeout {
            model: model.to_string(),
            secs: self.api_timeout_secs,
        })?
        .map_err(|e| TransportError::classify(model, &e.to_string()))?;

        debug!(
            "Model {}: {} input tokens, {} output tokens, {:?}",
            model,
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        if response.content.trim().is_empty() {
            return Err(TransportError::MalformedResponse {
                model: model.to_string(),
                detail: "empty completion".to_string(),
            });
        }
        Ok(response.content)
    }
}

/// Resolve a provider for `model`.
///
/// 1. Named provider (`--provider`): API key read from its env var.
/// 2. `EDGEQUAKE_LLM_PROVIDER` from the environment.
/// 3. OpenAI when `OPENAI_API_KEY` is present.
/// 4. Full auto-detection via [`ProviderFactory::from_env`]; the detected
///    provider's own default model is used.
fn resolve_provider(
    provider_name: Option<&str>,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, TransportError> {
    let create = |name: &str| {
        ProviderFactory::create_llm_provider(name, model).map_err(|e| {
            TransportError::Authentication {
                model: model.to_string(),
                detail: format!("provider '{}' is not configured: {}", name, e),
            }
        })
    };

    if let Some(name) = provider_name {
        return create(name);
    }

    if let Ok(prov) = std::env::var("EDGEQUAKE_LLM_PROVIDER") {
        if !prov.is_empty() {
            return create(&prov);
        }
    }

    if std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        return create("openai");
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| TransportError::Authentication {
            model: model.to_string(),
            detail: format!(
                "No LLM provider could be auto-detected from environment. \
                 Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider. Error: {}",
                e
            ),
        })?;
    Ok(llm_provider)
}

fn to_chat_messages(turns: &[Turn]) -> Vec<ChatMessage> {
    turns
        .iter()
        .map(|turn| match turn.role {
            Role::System => ChatMessage::system(turn.text.as_str()),
            Role::Assistant => ChatMessage::assistant(turn.text.as_str()),
            Role::User if turn.images.is_empty() => ChatMessage::user(turn.text.as_str()),
            Role::User => ChatMessage::user_with_images(
                turn.text.as_str(),
                turn.images.iter().map(encode::to_image_data).collect(),
            ),
        })
        .collect()
}

/// Build `CompletionOptions` from the pipeline config.
fn build_options(config: &PipelineConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ModelClient for Flaky {
        async fn complete(&self, model: &str, _turns: &[Turn]) -> Result<String, TransportError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(TransportError::RateLimited {
                    model: model.to_string(),
                    detail: "429".into(),
                })
            } else {
                Ok("ok".into())
            }
        }
    }

    const FAST: RetryPolicy = RetryPolicy {
        retries: 2,
        backoff_ms: 0,
    };

    #[tokio::test]
    async fn retries_until_success() {
        let client = Flaky {
            failures: 2,
            calls: AtomicU32::new(0),
        };
        let out = complete_with_retries(&client, "m", &[Turn::user("hi")], FAST)
            .await
            .unwrap();
        assert_eq!(out, "ok");
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_retry_budget() {
        let client = Flaky {
            failures: 10,
            calls: AtomicU32::new(0),
        };
        let err = complete_with_retries(&client, "m", &[Turn::user("hi")], FAST)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::RateLimited { .. }));
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn no_retry_policy_calls_once() {
        let client = Flaky {
            failures: 10,
            calls: AtomicU32::new(0),
        };
        let _ = complete_with_retries(&client, "m", &[Turn::user("hi")], RetryPolicy::NONE).await;
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_doubles_then_caps() {
        let policy = RetryPolicy {
            retries: 3,
            backoff_ms: 500,
        };
        assert_eq!(backoff_delay_ms(policy, 1), 500);
        assert_eq!(backoff_delay_ms(policy, 2), 1000);
        assert_eq!(backoff_delay_ms(policy, 3), 2000);
        assert_eq!(backoff_delay_ms(policy, 60), MAX_BACKOFF_MS);
        assert_eq!(backoff_delay_ms(policy, u32::MAX), MAX_BACKOFF_MS);
    }

    #[tokio::test]
    async fn large_retry_budget_does_not_overflow() {
        let client = Flaky {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
        };
        let policy = RetryPolicy {
            retries: 70,
            backoff_ms: 0,
        };
        let err = complete_with_retries(&client, "m", &[Turn::user("hi")], policy)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::RateLimited { .. }));
        assert_eq!(client.calls.load(Ordering::SeqCst), 71);
    }

    #[test]
    fn build_options_defaults() {
        let config = PipelineConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.7));
        assert_eq!(opts.max_tokens, Some(4096));
    }

    #[test]
    fn retry_policy_reads_config() {
        let config = PipelineConfig::builder()
            .transport_retries(4)
            .retry_backoff_ms(10)
            .build()
            .unwrap();
        assert_eq!(
            RetryPolicy::from_config(&config),
            RetryPolicy {
                retries: 4,
                backoff_ms: 10
            }
        );
    }

    #[test]
    fn converts_every_turn() {
        let turns = vec![
            Turn::system("s"),
            Turn::user("u"),
            Turn::assistant("a"),
            Turn::user_with_images("look", vec![PageImage::new(vec![1, 2], "image/png")]),
        ];
        assert_eq!(to_chat_messages(&turns).len(), 4);
    }
}
