//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::path::PathBuf;

use crate::domain::{NormalizationLevel, DEFAULT_MAX_SEGMENT_CHARS};
use super::loader::ConfigError;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 转换流水线配置
    #[serde(default)]
    pub conversion: ConversionConfig,

    /// TTS 服务商配置
    #[serde(default)]
    pub tts: TtsConfig,

    /// 音频封装配置
    #[serde(default)]
    pub audio: AudioConfig,

    /// 输入/输出
    #[serde(default)]
    pub book: BookConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 转换流水线配置
#[derive(Debug, Clone, Deserialize)]
pub struct ConversionConfig {
    /// 音色（必填）
    #[serde(default)]
    pub voice: String,

    /// 只处理前 N 章
    #[serde(default)]
    pub max_chapters: Option<usize>,

    /// 单个片段最大字符数
    #[serde(default = "default_max_segment_chars")]
    pub max_segment_chars: usize,

    /// 工作目录；未设置时由清单路径推导出固定的临时目录，
    /// 同一本书再次运行会复用已缓存的片段
    #[serde(default)]
    pub workspace: Option<PathBuf>,

    /// 同时进行的合成调用上限
    #[serde(default = "default_synthesis_concurrency")]
    pub synthesis_concurrency: usize,

    /// 单个片段的最大尝试次数（含首次）
    #[serde(default = "default_retry_ceiling")]
    pub retry_ceiling: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// 失败片段以多长的静音填补（毫秒）
    #[serde(default = "default_gap_silence_ms")]
    pub gap_silence_ms: u64,

    /// 文本规范化级别: off / basic
    #[serde(default)]
    pub text_normalization: NormalizationLevel,

    /// 成功后保留工作目录
    #[serde(default)]
    pub keep_workspace: bool,
}

fn default_max_segment_chars() -> usize {
    DEFAULT_MAX_SEGMENT_CHARS
}

fn default_synthesis_concurrency() -> usize {
    2
}

fn default_retry_ceiling() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_retry_max_delay_ms() -> u64 {
    10_000
}

fn default_gap_silence_ms() -> u64 {
    500
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            voice: String::new(),
            max_chapters: None,
            max_segment_chars: default_max_segment_chars(),
            workspace: None,
            synthesis_concurrency: default_synthesis_concurrency(),
            retry_ceiling: default_retry_ceiling(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            gap_silence_ms: default_gap_silence_ms(),
            text_normalization: NormalizationLevel::default(),
            keep_workspace: false,
        }
    }
}

/// TTS 服务商
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsProvider {
    Azure,
    Doubao,
    /// 生成静音，用于演练
    Fake,
}

impl std::fmt::Display for TtsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TtsProvider::Azure => write!(f, "azure"),
            TtsProvider::Doubao => write!(f, "doubao"),
            TtsProvider::Fake => write!(f, "fake"),
        }
    }
}

/// TTS 配置
#[derive(Debug, Clone, Deserialize)]
pub struct TtsConfig {
    /// 显式指定的服务商；未指定时在凭据完整的服务商中自动选择
    #[serde(default)]
    pub provider: Option<TtsProvider>,

    /// 请求超时时间（秒）
    #[serde(default = "default_tts_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub azure: AzureConfig,

    #[serde(default)]
    pub doubao: DoubaoConfig,
}

fn default_tts_timeout() -> u64 {
    60
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            provider: None,
            timeout_secs: default_tts_timeout(),
            azure: AzureConfig::default(),
            doubao: DoubaoConfig::default(),
        }
    }
}

impl TtsConfig {
    fn is_complete(&self, provider: TtsProvider) -> bool {
        match provider {
            TtsProvider::Azure => self.azure.is_complete(),
            TtsProvider::Doubao => self.doubao.is_complete(),
            TtsProvider::Fake => true,
        }
    }

    /// 凭据完整的服务商（不含 fake）
    pub fn configured_providers(&self) -> Vec<TtsProvider> {
        [TtsProvider::Azure, TtsProvider::Doubao]
            .into_iter()
            .filter(|p| self.is_complete(*p))
            .collect()
    }

    /// 确定本次运行使用的服务商
    pub fn resolve_provider(&self) -> Result<TtsProvider, ConfigError> {
        if let Some(provider) = self.provider {
            if self.is_complete(provider) {
                return Ok(provider);
            }
            return Err(ConfigError::ValidationError(format!(
                "TTS provider '{}' is missing credentials",
                provider
            )));
        }

        let configured = self.configured_providers();
        match configured.as_slice() {
            [only] => Ok(*only),
            [] => Err(ConfigError::ValidationError(
                "No TTS provider configured; set azure or doubao credentials".to_string(),
            )),
            many => Err(ConfigError::ValidationError(format!(
                "Multiple TTS providers configured ({}); set tts.provider to choose one",
                many.iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }
}

fn non_empty(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

/// Azure 语音服务
#[derive(Debug, Clone, Deserialize)]
pub struct AzureConfig {
    #[serde(default)]
    pub subscription_key: Option<String>,

    #[serde(default)]
    pub region: Option<String>,

    #[serde(default = "default_azure_output_format")]
    pub output_format: String,

    /// 覆盖区域端点
    #[serde(default)]
    pub endpoint: Option<String>,
}

fn default_azure_output_format() -> String {
    "riff-24khz-16bit-mono-pcm".to_string()
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            subscription_key: None,
            region: None,
            output_format: default_azure_output_format(),
            endpoint: None,
        }
    }
}

impl AzureConfig {
    pub fn is_complete(&self) -> bool {
        non_empty(&self.subscription_key) && non_empty(&self.region)
    }
}

/// 豆包语音
#[derive(Debug, Clone, Deserialize)]
pub struct DoubaoConfig {
    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default)]
    pub app_id: Option<String>,

    #[serde(default = "default_doubao_base_url")]
    pub base_url: String,

    #[serde(default = "default_doubao_cluster")]
    pub cluster: String,
}

fn default_doubao_base_url() -> String {
    "https://openspeech.bytedance.com/api/v1/tts".to_string()
}

fn default_doubao_cluster() -> String {
    "volcano_tts".to_string()
}

impl Default for DoubaoConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            app_id: None,
            base_url: default_doubao_base_url(),
            cluster: default_doubao_cluster(),
        }
    }
}

impl DoubaoConfig {
    pub fn is_complete(&self) -> bool {
        non_empty(&self.access_token)
            && non_empty(&self.app_id)
            && !self.base_url.trim().is_empty()
    }
}

/// 音频封装配置
#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// ffmpeg 可执行文件
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    /// AAC 比特率
    #[serde(default = "default_bitrate")]
    pub bitrate: String,

    /// 可选的 ffmpeg 音频滤镜链，例如 loudnorm
    #[serde(default)]
    pub filter_chain: Option<String>,
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_bitrate() -> String {
    "64k".to_string()
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            bitrate: default_bitrate(),
            filter_chain: None,
        }
    }
}

/// 输入/输出配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookConfig {
    /// 书籍清单（JSON）
    #[serde(default)]
    pub manifest: Option<PathBuf>,

    /// 输出的 m4b 文件
    #[serde(default)]
    pub output: Option<PathBuf>,
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.conversion.max_segment_chars, 500);
        assert_eq!(config.conversion.retry_ceiling, 3);
        assert_eq!(config.conversion.gap_silence_ms, 500);
        assert_eq!(config.conversion.text_normalization, NormalizationLevel::Basic);
        assert_eq!(config.audio.ffmpeg_path, "ffmpeg");
        assert_eq!(config.audio.bitrate, "64k");
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_resolve_provider_none_configured() {
        let config = TtsConfig::default();
        assert!(config.configured_providers().is_empty());
        assert!(config.resolve_provider().is_err());
    }

    #[test]
    fn test_resolve_provider_single() {
        let mut config = TtsConfig::default();
        config.azure.subscription_key = Some("key".into());
        config.azure.region = Some("eastasia".into());
        assert_eq!(config.resolve_provider().unwrap(), TtsProvider::Azure);
    }

    #[test]
    fn test_resolve_provider_ambiguous() {
        let mut config = TtsConfig::default();
        config.azure.subscription_key = Some("key".into());
        config.azure.region = Some("eastasia".into());
        config.doubao.access_token = Some("token".into());
        config.doubao.app_id = Some("app".into());

        let err = config.resolve_provider().unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        assert!(err.to_string().contains("azure, doubao"));

        config.provider = Some(TtsProvider::Doubao);
        assert_eq!(config.resolve_provider().unwrap(), TtsProvider::Doubao);
    }

    #[test]
    fn test_explicit_provider_requires_credentials() {
        let mut config = TtsConfig::default();
        config.provider = Some(TtsProvider::Doubao);
        config.doubao.access_token = Some("token".into());
        assert!(config.resolve_provider().is_err());

        config.doubao.app_id = Some("app".into());
        assert_eq!(config.resolve_provider().unwrap(), TtsProvider::Doubao);
    }

    #[test]
    fn test_fake_provider_needs_nothing() {
        let mut config = TtsConfig::default();
        config.provider = Some(TtsProvider::Fake);
        assert_eq!(config.resolve_provider().unwrap(), TtsProvider::Fake);
    }

    #[test]
    fn test_blank_credentials_incomplete() {
        let mut config = AzureConfig::default();
        config.subscription_key = Some("  ".into());
        config.region = Some("eastasia".into());
        assert!(!config.is_complete());
    }
}
