//! Reasoning gateway.
//!
//! Every call to the reasoning capability goes through [`ReasoningGateway`].
//! The gateway owns the per-call timeout and the attempt loop; it never
//! surfaces provider errors. A `None` answer tells the unit to use its
//! heuristic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pipeline::{ProviderError, ReasoningProvider, ReportingConfig, RetryPolicy, StageKind};
use tracing::{debug, info_span, warn, Instrument};

/// Call counters, for run summaries and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GatewayStats {
    pub calls: u64,
    pub failures: u64,
    pub fallbacks: u64,
}

/// Bounded, retrying access to a [`ReasoningProvider`].
pub struct ReasoningGateway {
    provider: Option<Arc<dyn ReasoningProvider>>,
    timeout: Duration,
    calls: AtomicU64,
    failures: AtomicU64,
    fallbacks: AtomicU64,
}

impl std::fmt::Debug for ReasoningGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReasoningGateway")
            .field("provider", &self.provider.as_ref().map(|p| p.name().to_string()))
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ReasoningGateway {
    /// A gateway that calls `provider` unless `config` disables reasoning.
    pub fn new(provider: Arc<dyn ReasoningProvider>, config: &ReportingConfig) -> Self {
        Self {
            provider: config.use_llm_interpretation.then_some(provider),
            timeout: config.llm_timeout(),
            calls: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
        }
    }

    /// A gateway that always answers `None`.
    pub fn disabled() -> Self {
        Self {
            provider: None,
            timeout: Duration::ZERO,
            calls: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    pub fn stats(&self) -> GatewayStats {
        GatewayStats {
            calls: self.calls.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
        }
    }

    /// Completes `prompt` in at most `attempts` tries.
    ///
    /// Returns `None` when reasoning is disabled or every attempt failed,
    /// timed out, or came back blank.
    pub async fn reason(&self, stage: StageKind, prompt: &str, attempts: u32) -> Option<String> {
        let provider = self.provider.as_ref()?;
        let span = info_span!("reasoning", %stage, provider = provider.name());
        async {
            for attempt in 1..=attempts.max(1) {
                self.calls.fetch_add(1, Ordering::Relaxed);
                let outcome = match tokio::time::timeout(
                    self.timeout,
                    provider.complete(prompt, self.timeout),
                )
                .await
                {
                    Ok(Ok(text)) if !text.trim().is_empty() => {
                        debug!(attempt, chars = text.len(), "reasoning call succeeded");
                        return Some(text);
                    }
                    Ok(Ok(_)) => ProviderError::MalformedResponse {
                        message: "empty completion".into(),
                    },
                    Ok(Err(e)) => e,
                    Err(_) => ProviderError::Timeout {
                        after: self.timeout,
                    },
                };
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!(attempt, attempts, error = %outcome, "reasoning call failed");
                if attempt < attempts {
                    if let RetryPolicy::Retryable { after: Some(delay) } = outcome.retry_policy() {
                        tokio::time::sleep(delay.min(self.timeout)).await;
                    }
                }
            }
            self.fallbacks.fetch_add(1, Ordering::Relaxed);
            warn!("reasoning attempts exhausted; using heuristic");
            None
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use async_trait::async_trait;

    use super::*;

    struct Flaky {
        failures_before_success: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ReasoningProvider for Flaky {
        async fn complete(&self, _prompt: &str, _timeout: Duration) -> Result<String, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures_before_success {
                Err(ProviderError::Unavailable {
                    message: "connection reset".into(),
                })
            } else {
                Ok("Title: ok".into())
            }
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    struct Hanging;

    #[async_trait]
    impl ReasoningProvider for Hanging {
        async fn complete(&self, _prompt: &str, _timeout: Duration) -> Result<String, ProviderError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("too late".into())
        }

        fn name(&self) -> &str {
            "hanging"
        }
    }

    fn config() -> ReportingConfig {
        ReportingConfig {
            llm_timeout_seconds: 1,
            ..ReportingConfig::default()
        }
    }

    #[tokio::test]
    async fn retries_within_bound_then_succeeds() {
        let provider = Arc::new(Flaky {
            failures_before_success: 1,
            calls: AtomicU32::new(0),
        });
        let gateway = ReasoningGateway::new(provider.clone(), &config());
        let answer = gateway.reason(StageKind::Reporting, "prompt", 2).await;
        assert_eq!(answer.as_deref(), Some("Title: ok"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_bound() {
        let provider = Arc::new(Flaky {
            failures_before_success: 5,
            calls: AtomicU32::new(0),
        });
        let gateway = ReasoningGateway::new(provider.clone(), &config());
        assert!(gateway.reason(StageKind::Reporting, "prompt", 2).await.is_none());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            gateway.stats(),
            GatewayStats {
                calls: 2,
                failures: 2,
                fallbacks: 1
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn hung_provider_times_out() {
        let gateway = ReasoningGateway::new(Arc::new(Hanging), &config());
        assert!(gateway.reason(StageKind::SchemaAnalysis, "prompt", 2).await.is_none());
        assert_eq!(gateway.stats().failures, 2);
    }

    #[tokio::test]
    async fn disabled_interpretation_never_calls_provider() {
        let provider = Arc::new(Flaky {
            failures_before_success: 0,
            calls: AtomicU32::new(0),
        });
        let config = ReportingConfig {
            use_llm_interpretation: false,
            ..config()
        };
        let gateway = ReasoningGateway::new(provider.clone(), &config);
        assert!(!gateway.is_enabled());
        assert!(gateway.reason(StageKind::Reporting, "prompt", 2).await.is_none());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}
