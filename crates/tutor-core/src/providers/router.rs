//! Model router with automatic failover across providers

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::types::{ChatMessage, ChatResponse, LlmProvider, ToolDefinition};
use crate::error::ProviderError;

/// Routes LLM requests across multiple providers with automatic failover
pub struct ModelRouter {
    /// Providers in failover order (index 0 = primary)
    providers: Vec<Box<dyn LlmProvider>>,
    max_retries_per_provider: u32,
    base_retry_delay: Duration,
}

impl ModelRouter {
    /// Create a router with multiple providers in failover order
    pub fn with_failover(providers: Vec<Box<dyn LlmProvider>>) -> Result<Self> {
        if providers.is_empty() {
            return Err(anyhow!("ModelRouter requires at least one provider"));
        }
        Ok(Self {
            providers,
            max_retries_per_provider: 2,
            base_retry_delay: Duration::from_millis(500),
        })
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries_per_provider = max_retries.max(1);
        self
    }

    pub fn with_base_retry_delay(mut self, delay: Duration) -> Self {
        self.base_retry_delay = delay;
        self
    }

    /// Number of configured providers
    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Call one provider, retrying with exponential backoff while the error is retryable
    async fn attempt(
        &self,
        provider: &dyn LlmProvider,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        system: &str,
    ) -> Result<ChatResponse> {
        let mut attempt = 0;
        loop {
            debug!(
                "Trying provider {} ({}) attempt {}/{}",
                provider.provider_name(),
                provider.model(),
                attempt + 1,
                self.max_retries_per_provider,
            );

            let err = match provider.chat(messages, tools, system).await {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };
            let retryable = is_retryable(&err);
            warn!(
                "Provider {} ({}) failed (attempt {}, retryable={}): {:#}",
                provider.provider_name(),
                provider.model(),
                attempt + 1,
                retryable,
                err,
            );

            attempt += 1;
            if !retryable || attempt >= self.max_retries_per_provider {
                return Err(err);
            }

            let delay = self.base_retry_delay * 2u32.pow(attempt - 1);
            debug!("Backing off for {:?} before retry", delay);
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl LlmProvider for ModelRouter {
    /// The primary provider's name
    fn provider_name(&self) -> &str {
        self.providers
            .first()
            .map(|p| p.provider_name())
            .unwrap_or("unknown")
    }

    /// The primary provider's model
    fn model(&self) -> &str {
        self.providers
            .first()
            .map(|p| p.model())
            .unwrap_or("unknown")
    }

    /// Send a chat request, failing over to the next provider on error
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        system: &str,
    ) -> Result<ChatResponse> {
        let mut last_error = None;

        for (idx, provider) in self.providers.iter().enumerate() {
            match self.attempt(provider.as_ref(), messages, tools, system).await {
                Ok(response) => {
                    if idx > 0 {
                        info!(
                            "Request succeeded on failover provider {} ({})",
                            provider.provider_name(),
                            provider.model()
                        );
                    }
                    return Ok(response);
                }
                Err(e) => last_error = Some(e),
            }

            if let Some(next) = self.providers.get(idx + 1) {
                info!(
                    "Failing over from {} to {}",
                    provider.provider_name(),
                    next.provider_name()
                );
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("All providers failed")))
    }
}

/// Only typed provider errors are retried; anything else fails over at once
fn is_retryable(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<ProviderError>())
        .any(ProviderError::is_retryable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::super::types::{ChatResponseBlock, ChatUsage, StopReason};

    struct SuccessProvider {
        name: String,
    }

    #[async_trait]
    impl LlmProvider for SuccessProvider {
        fn provider_name(&self) -> &str {
            &self.name
        }
        fn model(&self) -> &str {
            "test-model"
        }
        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _tools: &[ToolDefinition],
            _system: &str,
        ) -> Result<ChatResponse> {
            Ok(ChatResponse {
                blocks: vec![ChatResponseBlock::Text {
                    text: format!("from {}", self.name),
                }],
                stop_reason: StopReason::EndTurn,
                usage: ChatUsage {
                    input_tokens: 10,
                    output_tokens: 5,
                },
            })
        }
    }

    struct FailProvider {
        name: String,
        status: u16,
        body: String,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl LlmProvider for FailProvider {
        fn provider_name(&self) -> &str {
            &self.name
        }
        fn model(&self) -> &str {
            "fail-model"
        }
        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _tools: &[ToolDefinition],
            _system: &str,
        ) -> Result<ChatResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::Status {
                provider: self.name.clone(),
                status: self.status,
                body: self.body.clone(),
            }
            .into())
        }
    }

    fn failing(name: &str, status: u16, body: &str) -> (Box<dyn LlmProvider>, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let provider = FailProvider {
            name: name.to_string(),
            status,
            body: body.to_string(),
            calls: calls.clone(),
        };
        (Box::new(provider), calls)
    }

    fn succeeding(name: &str) -> Box<dyn LlmProvider> {
        Box::new(SuccessProvider {
            name: name.to_string(),
        })
    }

    #[tokio::test]
    async fn test_primary_provider_success() {
        let router = ModelRouter::with_failover(vec![succeeding("test")]).unwrap();
        let result = router.chat(&[], &[], "system").await.unwrap();
        assert_eq!(result.stop_reason, StopReason::EndTurn);
        assert_eq!(result.text(), "from test");
    }

    #[tokio::test]
    async fn test_failover_to_second_provider() {
        let (primary, calls) = failing("primary", 503, "overloaded");
        let router = ModelRouter::with_failover(vec![primary, succeeding("fallback")])
            .unwrap()
            .with_max_retries(2)
            .with_base_retry_delay(Duration::from_millis(1));

        let result = router.chat(&[], &[], "system").await.unwrap();
        assert_eq!(result.text(), "from fallback");
        // Retryable error: both attempts spent on the primary
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_skips_retries() {
        let (primary, calls) = failing("primary", 401, "unauthorized");
        let router = ModelRouter::with_failover(vec![primary, succeeding("fallback")])
            .unwrap()
            .with_max_retries(3)
            .with_base_retry_delay(Duration::from_millis(1));

        let result = router.chat(&[], &[], "system").await.unwrap();
        assert_eq!(result.text(), "from fallback");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_all_providers_fail() {
        let (a, _) = failing("a", 401, "bad key");
        let (b, _) = failing("b", 403, "forbidden");
        let router = ModelRouter::with_failover(vec![a, b]).unwrap().with_max_retries(1);

        let err = router.chat(&[], &[], "system").await.unwrap_err();
        let last = err.downcast_ref::<ProviderError>().unwrap();
        assert!(matches!(last, ProviderError::Status { status: 403, .. }));
    }

    #[tokio::test]
    async fn test_client_error_mentioning_server_codes_is_not_retried() {
        let (primary, calls) = failing(
            "primary",
            400,
            r#"{"error":"max_tokens: 1500 exceeds limit, retry after 500ms"}"#,
        );
        let router = ModelRouter::with_failover(vec![primary])
            .unwrap()
            .with_max_retries(3)
            .with_base_retry_delay(Duration::from_millis(1));

        assert!(router.chat(&[], &[], "system").await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_untyped_errors_are_not_retried() {
        struct Broken(Arc<AtomicU32>);

        #[async_trait]
        impl LlmProvider for Broken {
            fn provider_name(&self) -> &str {
                "broken"
            }
            fn model(&self) -> &str {
                "none"
            }
            async fn chat(
                &self,
                _messages: &[ChatMessage],
                _tools: &[ToolDefinition],
                _system: &str,
            ) -> Result<ChatResponse> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Err(anyhow!("status 503 timed out"))
            }
        }

        let calls = Arc::new(AtomicU32::new(0));
        let broken: Box<dyn LlmProvider> = Box::new(Broken(calls.clone()));
        let router = ModelRouter::with_failover(vec![broken])
            .unwrap()
            .with_max_retries(3);
        assert!(router.chat(&[], &[], "system").await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_until_budget_exhausted() {
        let (primary, calls) = failing("primary", 429, "rate limited");
        let router = ModelRouter::with_failover(vec![primary])
            .unwrap()
            .with_max_retries(3)
            .with_base_retry_delay(Duration::from_millis(1));

        assert!(router.chat(&[], &[], "system").await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_empty_providers_rejected() {
        assert!(ModelRouter::with_failover(vec![]).is_err());
    }

    #[test]
    fn test_reports_primary_provider() {
        let router = ModelRouter::with_failover(vec![succeeding("anthropic"), succeeding("openai")]).unwrap();
        assert_eq!(router.provider_name(), "anthropic");
        assert_eq!(router.model(), "test-model");
        assert_eq!(router.provider_count(), 2);
    }

    #[test]
    fn test_is_retryable_looks_through_context() {
        let err = anyhow::Error::from(ProviderError::Status {
            provider: "anthropic".to_string(),
            status: 529,
            body: "overloaded".to_string(),
        })
        .context("model call");
        assert!(is_retryable(&err));
        assert!(!is_retryable(&anyhow!("connection reset")));
    }
}
