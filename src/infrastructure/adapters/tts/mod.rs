//! TTS Adapters - 各服务商的 TtsEnginePort 实现

mod azure_tts_client;
mod doubao_tts_client;
mod factory;
mod fake_tts_client;

pub use azure_tts_client::{build_ssml, escape_xml, AzureTtsClient, AzureTtsClientConfig};
pub use doubao_tts_client::{DoubaoTtsClient, DoubaoTtsClientConfig};
pub use factory::build_tts_engine;
pub use fake_tts_client::{FakeTtsClient, FakeTtsClientConfig};

use crate::application::ports::TtsError;

/// reqwest 发送失败统一归类为临时错误
pub(crate) fn map_send_error(e: reqwest::Error) -> TtsError {
    if e.is_timeout() {
        TtsError::Timeout
    } else if e.is_connect() {
        TtsError::NetworkError(format!("Cannot connect to TTS service: {}", e))
    } else {
        TtsError::NetworkError(e.to_string())
    }
}
