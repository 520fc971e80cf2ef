//! Deepgram speak client

use std::time::Duration;

use async_trait::async_trait;
use call_intake_config::SynthesisConfig;
use call_intake_core::{Error, Result, SpeechSynthesizer};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Url;

/// Synthesizes μ-law 8 kHz audio with no container
pub struct DeepgramSynthesizer {
    config: SynthesisConfig,
    client: reqwest::Client,
}

impl DeepgramSynthesizer {
    pub fn new(config: SynthesisConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::Synthesis(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn speak_url(&self) -> Result<Url> {
        Url::parse_with_params(
            &self.config.endpoint,
            &[
                ("model", self.config.voice_model.as_str()),
                ("encoding", "mulaw"),
                ("sample_rate", "8000"),
                ("container", "none"),
            ],
        )
        .map_err(|e| Error::Synthesis(format!("invalid endpoint: {}", e)))
    }

    fn build_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let token = HeaderValue::from_str(&format!("Token {}", self.config.api_key))
            .map_err(|e| Error::Synthesis(format!("invalid api key: {}", e)))?;
        headers.insert(AUTHORIZATION, token);
        Ok(headers)
    }
}

#[async_trait]
impl SpeechSynthesizer for DeepgramSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        if text.trim().is_empty() {
            return Err(Error::Synthesis("nothing to synthesize".to_string()));
        }

        let response = self
            .client
            .post(self.speak_url()?)
            .headers(self.build_headers()?)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(|e| Error::Synthesis(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Synthesis(format!("API error {}: {}", status, body)));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| Error::Synthesis(format!("reading audio failed: {}", e)))?;

        if audio.is_empty() {
            return Err(Error::Synthesis("provider returned empty audio".to_string()));
        }

        tracing::debug!(bytes = audio.len(), "Synthesized speech");
        Ok(audio.to_vec())
    }

    fn provider_name(&self) -> &str {
        "deepgram"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speak_url() {
        let synthesizer = DeepgramSynthesizer::new(SynthesisConfig {
            voice_model: "aura-luna-en".to_string(),
            ..SynthesisConfig::default()
        })
        .unwrap();

        let url = synthesizer.speak_url().unwrap();
        assert_eq!(url.path(), "/v1/speak");
        assert_eq!(
            url.query(),
            Some("model=aura-luna-en&encoding=mulaw&sample_rate=8000&container=none")
        );
    }

    #[test]
    fn test_headers_use_token_scheme() {
        let synthesizer = DeepgramSynthesizer::new(SynthesisConfig {
            api_key: "dg-key".to_string(),
            ..SynthesisConfig::default()
        })
        .unwrap();

        let headers = synthesizer.build_headers().unwrap();
        assert_eq!(headers[AUTHORIZATION], "Token dg-key");
    }

    #[tokio::test]
    async fn test_blank_text_fails_without_request() {
        let synthesizer = DeepgramSynthesizer::new(SynthesisConfig {
            endpoint: "http://127.0.0.1:9/v1/speak".to_string(),
            ..SynthesisConfig::default()
        })
        .unwrap();

        let err = synthesizer.synthesize("   ").await.unwrap_err();
        assert!(err.is_synthesis_failure());
    }
}
