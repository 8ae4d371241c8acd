//! Fake TTS Client - 用于演练和测试的 TTS 客户端
//!
//! 不调用任何服务，按文本长度生成静音 WAV

use async_trait::async_trait;
use std::io::Cursor;
use std::time::Duration;

use crate::application::ports::{SynthesizedAudio, TtsEnginePort, TtsError};

/// Fake TTS Client 配置
#[derive(Debug, Clone)]
pub struct FakeTtsClientConfig {
    /// 每个字符对应的音频时长（毫秒）
    pub ms_per_char: u64,
    /// 采样率
    pub sample_rate: u32,
    /// 模拟的推理延迟
    pub latency_ms: u64,
}

impl Default for FakeTtsClientConfig {
    fn default() -> Self {
        Self {
            ms_per_char: 200,
            sample_rate: 24_000,
            latency_ms: 0,
        }
    }
}

/// Fake TTS Client
pub struct FakeTtsClient {
    config: FakeTtsClientConfig,
}

impl FakeTtsClient {
    pub fn new(config: FakeTtsClientConfig) -> Self {
        tracing::info!(
            ms_per_char = config.ms_per_char,
            sample_rate = config.sample_rate,
            "FakeTtsClient initialized"
        );
        Self { config }
    }

    /// 使用默认配置创建
    pub fn with_defaults() -> Self {
        Self::new(FakeTtsClientConfig::default())
    }

    fn silent_wav(&self, duration_ms: u64) -> Result<Vec<u8>, hound::Error> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.config.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let samples = self.config.sample_rate as u64 * duration_ms / 1000;

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
            for _ in 0..samples {
                writer.write_sample(0i16)?;
            }
            writer.finalize()?;
        }
        Ok(cursor.into_inner())
    }
}

#[async_trait]
impl TtsEnginePort for FakeTtsClient {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<SynthesizedAudio, TtsError> {
        if text.trim().is_empty() {
            return Err(TtsError::InvalidRequest("Empty text provided".to_string()));
        }

        tracing::debug!(
            text_len = text.chars().count(),
            voice = %voice,
            "FakeTtsClient: generating silent audio"
        );

        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }

        let duration_ms = text.chars().count() as u64 * self.config.ms_per_char;
        let audio_data = self
            .silent_wav(duration_ms)
            .map_err(|e| TtsError::InvalidResponse(format!("Failed to build WAV: {}", e)))?;

        Ok(SynthesizedAudio {
            audio_data,
            duration_ms: Some(duration_ms),
        })
    }

    fn provider_name(&self) -> &str {
        "fake"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_duration_proportional_to_text() {
        let client = FakeTtsClient::with_defaults();
        let audio = client.synthesize("你好世界。", "any").await.unwrap();
        assert_eq!(audio.duration_ms, Some(1000));

        let reader = hound::WavReader::new(Cursor::new(audio.audio_data)).unwrap();
        assert_eq!(reader.spec().sample_rate, 24_000);
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.duration(), 24_000);
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let client = FakeTtsClient::with_defaults();
        let err = client.synthesize("  ", "any").await.unwrap_err();
        assert!(matches!(err, TtsError::InvalidRequest(_)));
    }
}
