//! Azure TTS Client - Azure 语音服务 REST 接口
//!
//! POST https://{region}.tts.speech.microsoft.com/cognitiveservices/v1
//! Headers: Ocp-Apim-Subscription-Key, Content-Type: application/ssml+xml,
//!          X-Microsoft-OutputFormat
//! Body: SSML
//! Response: 音频二进制

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::application::ports::{SynthesizedAudio, TtsEnginePort, TtsError};

use super::map_send_error;

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const OUTPUT_FORMAT_HEADER: &str = "X-Microsoft-OutputFormat";
const USER_AGENT: &str = concat!("bookcast/", env!("CARGO_PKG_VERSION"));
const DEFAULT_LANGUAGE: &str = "zh-CN";

/// Azure TTS 客户端配置
#[derive(Debug, Clone)]
pub struct AzureTtsClientConfig {
    pub subscription_key: String,
    pub region: String,
    /// 输出格式，片段拼接要求 WAV（riff-*）
    pub output_format: String,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
    /// 覆盖默认的区域端点
    pub endpoint: Option<String>,
}

impl AzureTtsClientConfig {
    pub fn new(subscription_key: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            subscription_key: subscription_key.into(),
            region: region.into(),
            output_format: "riff-24khz-16bit-mono-pcm".to_string(),
            timeout_secs: 60,
            endpoint: None,
        }
    }

    pub fn endpoint_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!(
                "https://{}.tts.speech.microsoft.com/cognitiveservices/v1",
                self.region
            ),
        }
    }
}

/// 转义 SSML 中的 XML 特殊字符
pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// 从音色名推断语言，`zh-CN-XiaoxiaoNeural` -> `zh-CN`
fn voice_language(voice: &str) -> String {
    let mut parts = voice.splitn(3, '-');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(lang), Some(region), Some(_)) if !lang.is_empty() && !region.is_empty() => {
            format!("{}-{}", lang, region)
        }
        _ => DEFAULT_LANGUAGE.to_string(),
    }
}

pub fn build_ssml(text: &str, voice: &str) -> String {
    format!(
        concat!(
            "<speak version='1.0' xmlns='http://www.w3.org/2001/10/synthesis' xml:lang='{}'>",
            "<voice name='{}'>{}</voice></speak>"
        ),
        voice_language(voice),
        escape_xml(voice),
        escape_xml(text)
    )
}

pub struct AzureTtsClient {
    client: Client,
    config: AzureTtsClientConfig,
}

impl AzureTtsClient {
    pub fn new(config: AzureTtsClientConfig) -> Result<Self, TtsError> {
        if config.subscription_key.trim().is_empty() || config.region.trim().is_empty() {
            return Err(TtsError::Unauthorized(
                "Azure subscription key and region are required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TtsError::NetworkError(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn build_request(&self, text: &str, voice: &str) -> reqwest::RequestBuilder {
        self.client
            .post(self.config.endpoint_url())
            .header(SUBSCRIPTION_KEY_HEADER, &self.config.subscription_key)
            .header("Content-Type", "application/ssml+xml")
            .header(OUTPUT_FORMAT_HEADER, &self.config.output_format)
            .header("User-Agent", USER_AGENT)
            .body(build_ssml(text, voice))
    }
}

/// Azure 对无效音色返回 400，正文中带有 voice 字样
fn classify_failure(status: u16, body: String, voice: &str) -> TtsError {
    if status == 400 && body.to_lowercase().contains("voice") {
        return TtsError::VoiceNotFound(format!("{}: {}", voice, body));
    }
    TtsError::from_status(status, body)
}

#[async_trait]
impl TtsEnginePort for AzureTtsClient {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<SynthesizedAudio, TtsError> {
        if text.trim().is_empty() {
            return Err(TtsError::InvalidRequest("Empty text provided".to_string()));
        }

        tracing::debug!(
            region = %self.config.region,
            voice = %voice,
            text_len = text.chars().count(),
            "Sending Azure TTS request"
        );

        let response = self
            .build_request(text, voice)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status.as_u16(), body, voice));
        }

        let audio_data = response
            .bytes()
            .await
            .map_err(|e| TtsError::InvalidResponse(format!("Failed to read audio: {}", e)))?
            .to_vec();

        if audio_data.is_empty() {
            return Err(TtsError::InvalidResponse("Azure returned empty audio".to_string()));
        }

        tracing::debug!(audio_size = audio_data.len(), "Azure TTS completed");

        Ok(SynthesizedAudio {
            audio_data,
            duration_ms: None,
        })
    }

    fn provider_name(&self) -> &str {
        "azure"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> AzureTtsClient {
        AzureTtsClient::new(AzureTtsClientConfig::new("test-key", "eastasia")).unwrap()
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("A & B"), "A &amp; B");
        assert_eq!(escape_xml("<b>'x'</b>"), "&lt;b&gt;&apos;x&apos;&lt;/b&gt;");
        assert_eq!(escape_xml("他说：\"好\""), "他说：&quot;好&quot;");
    }

    #[test]
    fn test_voice_language() {
        assert_eq!(voice_language("zh-CN-XiaoxiaoNeural"), "zh-CN");
        assert_eq!(voice_language("en-US-JennyNeural"), "en-US");
        assert_eq!(voice_language("narrator"), "zh-CN");
    }

    #[test]
    fn test_build_ssml() {
        let ssml = build_ssml("1 < 2", "en-US-JennyNeural");
        assert!(ssml.contains("xml:lang='en-US'"));
        assert!(ssml.contains("<voice name='en-US-JennyNeural'>1 &lt; 2</voice>"));
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let result = AzureTtsClient::new(AzureTtsClientConfig::new("", "eastasia"));
        assert!(matches!(result, Err(TtsError::Unauthorized(_))));
    }

    #[test]
    fn test_request_url_and_headers() {
        let request = client()
            .build_request("你好", "zh-CN-XiaoxiaoNeural")
            .build()
            .unwrap();

        assert_eq!(
            request.url().as_str(),
            "https://eastasia.tts.speech.microsoft.com/cognitiveservices/v1"
        );
        assert_eq!(request.method(), reqwest::Method::POST);
        let headers = request.headers();
        assert_eq!(headers.get(SUBSCRIPTION_KEY_HEADER).unwrap(), "test-key");
        assert_eq!(headers.get("content-type").unwrap(), "application/ssml+xml");
        assert_eq!(
            headers.get(OUTPUT_FORMAT_HEADER).unwrap(),
            "riff-24khz-16bit-mono-pcm"
        );

        let body = request.body().and_then(|b| b.as_bytes()).unwrap();
        let body = std::str::from_utf8(body).unwrap();
        assert!(body.contains("你好"));
    }

    #[test]
    fn test_custom_endpoint() {
        let mut config = AzureTtsClientConfig::new("k", "westus");
        config.endpoint = Some("http://localhost:9000/tts/".to_string());
        assert_eq!(config.endpoint_url(), "http://localhost:9000/tts");
    }

    #[test]
    fn test_classify_failure() {
        assert!(matches!(
            classify_failure(400, "Unsupported voice xx".into(), "xx"),
            TtsError::VoiceNotFound(_)
        ));
        assert!(matches!(
            classify_failure(400, "bad ssml".into(), "v"),
            TtsError::InvalidRequest(_)
        ));
        assert!(classify_failure(429, String::new(), "v").is_transient());
        assert!(matches!(classify_failure(401, String::new(), "v"), TtsError::Unauthorized(_)));
    }
}
