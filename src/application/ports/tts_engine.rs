//! TTS Engine Port - 语音合成能力抽象
//!
//! 所有 TTS 服务商（Azure、豆包）通过同一个接口接入，
//! 流水线内部从不按服务商分支。重试策略由包装层负责，服务商实现只负责
//! 把失败正确归类为临时或永久。

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// 失败类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// 超时、限流、5xx 等，可以重试
    Transient,
    /// 音色无效、鉴权失败、请求格式错误，不应重试
    Permanent,
}

/// TTS 错误
#[derive(Debug, Error)]
pub enum TtsError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Voice not found: {0}")]
    VoiceNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// 运行已取消，调用未发出
    #[error("Synthesis cancelled")]
    Cancelled,
}

impl TtsError {
    pub fn class(&self) -> FailureClass {
        match self {
            TtsError::NetworkError(_)
            | TtsError::Timeout
            | TtsError::RateLimited(_)
            | TtsError::ServiceError(_)
            | TtsError::InvalidResponse(_) => FailureClass::Transient,
            TtsError::Unauthorized(_)
            | TtsError::VoiceNotFound(_)
            | TtsError::InvalidRequest(_)
            | TtsError::Cancelled => FailureClass::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class() == FailureClass::Transient
    }

    /// 根据 HTTP 状态码归类服务端错误
    ///
    /// 408 / 429 / 5xx 为临时错误，其余 4xx 为永久错误
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let message = format!("HTTP {}: {}", status, body.into());
        match status {
            408 => TtsError::Timeout,
            429 => TtsError::RateLimited(message),
            401 | 403 => TtsError::Unauthorized(message),
            500..=599 => TtsError::ServiceError(message),
            _ => TtsError::InvalidRequest(message),
        }
    }
}

/// 合成结果
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    /// 原始音频数据（WAV）
    pub audio_data: Vec<u8>,
    /// 服务端报告的时长（毫秒），缺失时由调用方探测
    pub duration_ms: Option<u64>,
}

/// TTS Engine Port
///
/// 外部 TTS 服务的抽象接口
#[async_trait]
pub trait TtsEnginePort: Send + Sync {
    /// 将文本按指定音色合成为音频
    async fn synthesize(&self, text: &str, voice: &str) -> Result<SynthesizedAudio, TtsError>;

    /// 在取消信号下合成
    ///
    /// 已取消时返回 `TtsError::Cancelled`，不再发起新调用；已发出的调用照常完成
    async fn synthesize_cancellable(
        &self,
        text: &str,
        voice: &str,
        cancel: &CancellationToken,
    ) -> Result<SynthesizedAudio, TtsError> {
        if cancel.is_cancelled() {
            return Err(TtsError::Cancelled);
        }
        self.synthesize(text, voice).await
    }

    /// 服务商名称（用于日志）
    fn provider_name(&self) -> &str;
}
