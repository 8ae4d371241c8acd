//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::{AppConfig, AzureConfig};

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// Azure SDK 约定的凭据环境变量
const AZURE_KEY_ENV: &str = "AZURE_SPEECH_KEY";
const AZURE_REGION_ENV: &str = "AZURE_SPEECH_REGION";

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `BOOKCAST_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `BOOKCAST_CONVERSION__VOICE=zh-CN-XiaoxiaoNeural`
/// - `BOOKCAST_CONVERSION__MAX_CHAPTERS=3`
/// - `BOOKCAST_TTS__PROVIDER=azure`
/// - `BOOKCAST_BOOK__OUTPUT=/data/book.m4b`
///
/// Azure 凭据未配置时回退到 `AZURE_SPEECH_KEY` / `AZURE_SPEECH_REGION`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut app_config = read_config(config_path)?;
    fill_azure_credentials(&mut app_config.tts.azure, |name| std::env::var(name).ok());
    validate_config(&app_config)?;
    Ok(app_config)
}

fn read_config(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 首先设置默认值（最低优先级）
    builder = builder
        .set_default("conversion.max_segment_chars", 500)?
        .set_default("conversion.synthesis_concurrency", 2)?
        .set_default("conversion.retry_ceiling", 3)?
        .set_default("conversion.retry_base_delay_ms", 1000)?
        .set_default("conversion.retry_max_delay_ms", 10_000)?
        .set_default("conversion.gap_silence_ms", 500)?
        .set_default("conversion.text_normalization", "basic")?
        .set_default("conversion.keep_workspace", false)?
        .set_default("tts.timeout_secs", 60)?
        .set_default("audio.ffmpeg_path", "ffmpeg")?
        .set_default("audio.bitrate", "64k")?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 添加配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 添加环境变量（最高优先级）
    // 例如: BOOKCAST_TTS__AZURE__REGION=eastasia
    builder = builder.add_source(
        Environment::with_prefix("BOOKCAST")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    config
        .try_deserialize()
        .map_err(|e| ConfigError::ParseError(format!("Failed to deserialize config: {}", e)))
}

/// 用外部环境变量补全缺失的 Azure 凭据
fn fill_azure_credentials(azure: &mut AzureConfig, lookup: impl Fn(&str) -> Option<String>) {
    if azure.subscription_key.is_none() {
        azure.subscription_key = lookup(AZURE_KEY_ENV);
    }
    if azure.region.is_none() {
        azure.region = lookup(AZURE_REGION_ENV);
    }
}

/// 验证配置有效性
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    let conversion = &config.conversion;

    if conversion.voice.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "conversion.voice is required".to_string(),
        ));
    }

    if conversion.max_segment_chars == 0 {
        return Err(ConfigError::ValidationError(
            "conversion.max_segment_chars must be greater than 0".to_string(),
        ));
    }

    if conversion.synthesis_concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "conversion.synthesis_concurrency must be greater than 0".to_string(),
        ));
    }

    if conversion.retry_ceiling == 0 {
        return Err(ConfigError::ValidationError(
            "conversion.retry_ceiling must be greater than 0".to_string(),
        ));
    }

    if conversion.max_chapters == Some(0) {
        return Err(ConfigError::ValidationError(
            "conversion.max_chapters must be greater than 0 when set".to_string(),
        ));
    }

    if config.book.manifest.is_none() {
        return Err(ConfigError::ValidationError(
            "book.manifest is required".to_string(),
        ));
    }

    if config.book.output.is_none() {
        return Err(ConfigError::ValidationError(
            "book.output is required".to_string(),
        ));
    }

    if config.audio.bitrate.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "audio.bitrate cannot be empty".to_string(),
        ));
    }

    config
        .tts
        .resolve_provider()?;

    Ok(())
}

fn mask(secret: &Option<String>) -> &'static str {
    match secret {
        Some(value) if !value.is_empty() => "****",
        _ => "<unset>",
    }
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    let conversion = &config.conversion;
    tracing::info!("=== Bookcast Configuration ===");
    tracing::info!("Manifest: {:?}", config.book.manifest);
    tracing::info!("Output: {:?}", config.book.output);
    tracing::info!("Voice: {}", conversion.voice);
    tracing::info!("Max Chapters: {:?}", conversion.max_chapters);
    tracing::info!("Max Segment Chars: {}", conversion.max_segment_chars);
    tracing::info!("Workspace: {:?}", conversion.workspace);
    tracing::info!("Synthesis Concurrency: {}", conversion.synthesis_concurrency);
    tracing::info!(
        "Retry: ceiling={}, base={}ms, max={}ms",
        conversion.retry_ceiling,
        conversion.retry_base_delay_ms,
        conversion.retry_max_delay_ms
    );
    tracing::info!("Text Normalization: {}", conversion.text_normalization);
    match config.tts.resolve_provider() {
        Ok(provider) => tracing::info!("TTS Provider: {}", provider),
        Err(e) => tracing::info!("TTS Provider: unresolved ({})", e),
    }
    tracing::info!("TTS Timeout: {}s", config.tts.timeout_secs);
    tracing::info!(
        "Azure: key={}, region={:?}",
        mask(&config.tts.azure.subscription_key),
        config.tts.azure.region
    );
    tracing::info!(
        "Doubao: token={}, app_id={:?}",
        mask(&config.tts.doubao.access_token),
        config.tts.doubao.app_id
    );
    tracing::info!("FFmpeg: {} (bitrate {})", config.audio.ffmpeg_path, config.audio.bitrate);
    if let Some(filter) = &config.audio.filter_chain {
        tracing::info!("Audio Filter: {}", filter);
    }
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("==============================");
}
