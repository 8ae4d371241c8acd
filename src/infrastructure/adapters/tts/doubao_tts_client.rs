//! Doubao TTS Client - 火山引擎豆包语音合成
//!
//! POST {base_url}  (默认 https://openspeech.bytedance.com/api/v1/tts)
//! Header: Authorization: Bearer;{access_token}
//! Request: JSON，包含 app / user / audio / request 四部分
//! Response: JSON，`data` 字段为 base64 编码的音频

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::application::ports::{SynthesizedAudio, TtsEnginePort, TtsError};

use super::map_send_error;

const SUCCESS_CODE: i64 = 3000;

/// 豆包 TTS 客户端配置
#[derive(Debug, Clone)]
pub struct DoubaoTtsClientConfig {
    pub access_token: String,
    pub app_id: String,
    pub base_url: String,
    pub cluster: String,
    pub timeout_secs: u64,
}

impl DoubaoTtsClientConfig {
    pub fn new(access_token: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            app_id: app_id.into(),
            base_url: "https://openspeech.bytedance.com/api/v1/tts".to_string(),
            cluster: "volcano_tts".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Serialize)]
struct DoubaoRequest<'a> {
    app: AppSection<'a>,
    user: UserSection<'a>,
    audio: AudioSection<'a>,
    request: RequestSection<'a>,
}

#[derive(Debug, Serialize)]
struct AppSection<'a> {
    appid: &'a str,
    token: &'a str,
    cluster: &'a str,
}

#[derive(Debug, Serialize)]
struct UserSection<'a> {
    uid: &'a str,
}

#[derive(Debug, Serialize)]
struct AudioSection<'a> {
    voice_type: &'a str,
    encoding: &'a str,
    speed_ratio: f32,
}

#[derive(Debug, Serialize)]
struct RequestSection<'a> {
    reqid: String,
    text: &'a str,
    operation: &'a str,
}

#[derive(Debug, Deserialize)]
struct DoubaoResponse {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    addition: Option<DoubaoAddition>,
}

#[derive(Debug, Deserialize)]
struct DoubaoAddition {
    #[serde(default)]
    duration: Option<String>,
}

/// 把服务端业务码映射为错误类别
fn classify_code(code: i64, message: &str) -> TtsError {
    let detail = format!("code {}: {}", code, message);
    match code {
        3003 => TtsError::RateLimited(detail),
        3005 | 3030 | 3031 | 3032 | 3040 => TtsError::ServiceError(detail),
        3050 => TtsError::VoiceNotFound(detail),
        3001 | 3010 | 3011 => TtsError::InvalidRequest(detail),
        _ => TtsError::ServiceError(detail),
    }
}

/// 解析响应体
fn parse_response(body: &[u8]) -> Result<SynthesizedAudio, TtsError> {
    let response: DoubaoResponse = serde_json::from_slice(body)
        .map_err(|e| TtsError::InvalidResponse(format!("Malformed Doubao response: {}", e)))?;

    if response.code != SUCCESS_CODE {
        return Err(classify_code(response.code, &response.message));
    }

    let data = response
        .data
        .filter(|d| !d.is_empty())
        .ok_or_else(|| TtsError::InvalidResponse("Doubao response has no audio data".to_string()))?;

    let audio_data = BASE64
        .decode(data.as_bytes())
        .map_err(|e| TtsError::InvalidResponse(format!("Invalid base64 audio: {}", e)))?;

    let duration_ms = response
        .addition
        .and_then(|a| a.duration)
        .and_then(|d| d.parse().ok());

    Ok(SynthesizedAudio {
        audio_data,
        duration_ms,
    })
}

pub struct DoubaoTtsClient {
    client: Client,
    config: DoubaoTtsClientConfig,
}

impl DoubaoTtsClient {
    pub fn new(config: DoubaoTtsClientConfig) -> Result<Self, TtsError> {
        if config.access_token.trim().is_empty() || config.base_url.trim().is_empty() {
            return Err(TtsError::Unauthorized(
                "Doubao access token and base url are required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TtsError::NetworkError(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn build_request(&self, text: &str, voice: &str) -> reqwest::RequestBuilder {
        let body = DoubaoRequest {
            app: AppSection {
                appid: &self.config.app_id,
                token: &self.config.access_token,
                cluster: &self.config.cluster,
            },
            user: UserSection { uid: "bookcast" },
            audio: AudioSection {
                voice_type: voice,
                encoding: "wav",
                speed_ratio: 1.0,
            },
            request: RequestSection {
                reqid: Uuid::new_v4().to_string(),
                text,
                operation: "query",
            },
        };

        self.client
            .post(&self.config.base_url)
            .header("Authorization", format!("Bearer;{}", self.config.access_token))
            .json(&body)
    }
}

#[async_trait]
impl TtsEnginePort for DoubaoTtsClient {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<SynthesizedAudio, TtsError> {
        if text.trim().is_empty() {
            return Err(TtsError::InvalidRequest("Empty text provided".to_string()));
        }

        tracing::debug!(
            voice = %voice,
            text_len = text.chars().count(),
            "Sending Doubao TTS request"
        );

        let response = self
            .build_request(text, voice)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| TtsError::InvalidResponse(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            // 业务错误也可能以非 2xx 返回，优先使用业务码
            if let Err(e @ (TtsError::RateLimited(_)
            | TtsError::VoiceNotFound(_)
            | TtsError::InvalidRequest(_))) = parse_response(&body)
            {
                return Err(e);
            }
            return Err(TtsError::from_status(
                status.as_u16(),
                String::from_utf8_lossy(&body).into_owned(),
            ));
        }

        let audio = parse_response(&body)?;
        tracing::debug!(
            audio_size = audio.audio_data.len(),
            duration_ms = ?audio.duration_ms,
            "Doubao TTS completed"
        );
        Ok(audio)
    }

    fn provider_name(&self) -> &str {
        "doubao"
    }
}
