//! 带退避重试的 TTS 包装层
//!
//! 重试策略只存在于这一层：临时错误按指数退避重试，直到达到尝试上限；
//! 永久错误立即返回。运行取消后不再发起新的尝试。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{SynthesizedAudio, TtsEnginePort, TtsError};

/// 默认尝试上限（含首次调用）
pub const DEFAULT_RETRY_CEILING: u32 = 3;

/// 重试策略
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最大尝试次数（含首次）
    pub max_attempts: u32,
    /// 第一次重试前的等待时间
    pub base_delay: Duration,
    /// 单次等待上限
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_CEILING,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// 第 attempt 次失败后（从 1 开始）的等待时间: base * 2^(attempt-1)，不超过 max_delay
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

/// 重试包装层
pub struct RetryingTtsEngine {
    inner: Arc<dyn TtsEnginePort>,
    policy: RetryPolicy,
}

impl RetryingTtsEngine {
    pub fn new(inner: Arc<dyn TtsEnginePort>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl TtsEnginePort for RetryingTtsEngine {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<SynthesizedAudio, TtsError> {
        self.synthesize_cancellable(text, voice, &CancellationToken::new()).await
    }

    /// 每次尝试前检查取消信号，退避等待可被取消打断
    async fn synthesize_cancellable(
        &self,
        text: &str,
        voice: &str,
        cancel: &CancellationToken,
    ) -> Result<SynthesizedAudio, TtsError> {
        let mut attempt = 1;
        loop {
            if cancel.is_cancelled() {
                return Err(TtsError::Cancelled);
            }

            match self.inner.synthesize(text, voice).await {
                Ok(audio) => {
                    if attempt > 1 {
                        tracing::debug!(
                            provider = self.inner.provider_name(),
                            attempt,
                            "Synthesis succeeded after retry"
                        );
                    }
                    return Ok(audio);
                }
                Err(e) if e.is_transient() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.delay_for(attempt);
                    tracing::warn!(
                        provider = self.inner.provider_name(),
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient synthesis failure, retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            tracing::debug!(
                                provider = self.inner.provider_name(),
                                attempt,
                                "Retry abandoned, run cancelled"
                            );
                            return Err(TtsError::Cancelled);
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_transient() {
                        tracing::warn!(
                            provider = self.inner.provider_name(),
                            attempts = attempt,
                            error = %e,
                            "Synthesis retries exhausted"
                        );
                    }
                    return Err(e);
                }
            }
        }
    }

    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }
}
