//! 根据配置创建 TTS 引擎

use std::sync::Arc;

use crate::application::ports::{TtsEnginePort, TtsError};
use crate::config::{TtsConfig, TtsProvider};

use super::{
    AzureTtsClient, AzureTtsClientConfig, DoubaoTtsClient, DoubaoTtsClientConfig, FakeTtsClient,
};

fn required(value: &Option<String>, key: &str) -> Result<String, TtsError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| TtsError::Unauthorized(format!("{} is not configured", key)))
}

/// 创建指定服务商的 TTS 引擎
pub fn build_tts_engine(
    config: &TtsConfig,
    provider: TtsProvider,
) -> Result<Arc<dyn TtsEnginePort>, TtsError> {
    let engine: Arc<dyn TtsEnginePort> = match provider {
        TtsProvider::Azure => {
            let mut client_config = AzureTtsClientConfig::new(
                required(&config.azure.subscription_key, "tts.azure.subscription_key")?,
                required(&config.azure.region, "tts.azure.region")?,
            );
            client_config.output_format = config.azure.output_format.clone();
            client_config.endpoint = config.azure.endpoint.clone();
            client_config.timeout_secs = config.timeout_secs;
            Arc::new(AzureTtsClient::new(client_config)?)
        }
        TtsProvider::Doubao => {
            let mut client_config = DoubaoTtsClientConfig::new(
                required(&config.doubao.access_token, "tts.doubao.access_token")?,
                required(&config.doubao.app_id, "tts.doubao.app_id")?,
            );
            client_config.base_url = config.doubao.base_url.clone();
            client_config.cluster = config.doubao.cluster.clone();
            client_config.timeout_secs = config.timeout_secs;
            Arc::new(DoubaoTtsClient::new(client_config)?)
        }
        TtsProvider::Fake => Arc::new(FakeTtsClient::with_defaults()),
    };

    tracing::info!(provider = %engine.provider_name(), "TTS engine created");
    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_each_provider() {
        let mut config = TtsConfig::default();
        config.azure.subscription_key = Some("key".into());
        config.azure.region = Some("eastasia".into());
        config.doubao.access_token = Some("token".into());
        config.doubao.app_id = Some("app".into());

        for (provider, name) in [
            (TtsProvider::Azure, "azure"),
            (TtsProvider::Doubao, "doubao"),
            (TtsProvider::Fake, "fake"),
        ] {
            let engine = build_tts_engine(&config, provider).unwrap();
            assert_eq!(engine.provider_name(), name);
        }
    }

    #[test]
    fn test_missing_credentials() {
        let config = TtsConfig::default();
        let err = build_tts_engine(&config, TtsProvider::Azure).err().unwrap();
        assert!(matches!(err, TtsError::Unauthorized(_)));
        assert!(err.to_string().contains("tts.azure.subscription_key"));
    }
}
