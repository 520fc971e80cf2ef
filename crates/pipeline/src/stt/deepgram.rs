//! Deepgram live transcription client

use async_trait::async_trait;
use call_intake_config::RecognitionConfig;
use call_intake_core::{Error, RecognitionChannel, Result, SpeechRecognizer, TranscriptEvent};
use futures::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, AUTHORIZATION};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;

use super::TranscriptAssembler;

const CLOSE_STREAM: &str = r#"{"type":"CloseStream"}"#;
const AUDIO_BUFFER: usize = 256;
const EVENT_BUFFER: usize = 64;

/// Streams caller audio to Deepgram over a websocket
///
/// Each `open` is an independent provider connection served by a writer
/// task (audio → binary frames) and a reader task (results → events).
pub struct DeepgramRecognizer {
    config: RecognitionConfig,
}

impl DeepgramRecognizer {
    pub fn new(config: RecognitionConfig) -> Self {
        Self { config }
    }

    fn listen_url(&self) -> Result<Url> {
        let params = [
            ("model", self.config.model.clone()),
            ("encoding", self.config.encoding.clone()),
            ("sample_rate", self.config.sample_rate.to_string()),
            ("punctuate", self.config.punctuate.to_string()),
            ("interim_results", "true".to_string()),
            ("endpointing", self.config.endpointing_ms.to_string()),
            ("utterance_end_ms", self.config.utterance_end_ms.to_string()),
        ];

        Url::parse_with_params(&self.config.endpoint, &params)
            .map_err(|e| Error::Recognition(format!("invalid endpoint: {}", e)))
    }
}

#[async_trait]
impl SpeechRecognizer for DeepgramRecognizer {
    async fn open(&self) -> Result<RecognitionChannel> {
        let url = self.listen_url()?;

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| Error::Recognition(e.to_string()))?;
        let token = HeaderValue::from_str(&format!("Token {}", self.config.api_key))
            .map_err(|e| Error::Recognition(format!("invalid api key: {}", e)))?;
        request.headers_mut().insert(AUTHORIZATION, token);

        let (ws_stream, _) = connect_async(request)
            .await
            .map_err(|e| Error::Recognition(format!("connect failed: {}", e)))?;
        let (mut writer, mut reader) = ws_stream.split();

        tracing::info!(model = %self.config.model, "Recognition stream opened");

        let (audio_tx, mut audio_rx) = mpsc::channel::<Vec<u8>>(AUDIO_BUFFER);
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);

        tokio::spawn(async move {
            while let Some(chunk) = audio_rx.recv().await {
                if let Err(e) = writer.send(Message::Binary(chunk)).await {
                    tracing::debug!(error = %e, "Recognition writer stopped");
                    return;
                }
            }
            // Caller side hung up: ask the provider to flush and close
            if let Err(e) = writer.send(Message::Text(CLOSE_STREAM.to_string())).await {
                tracing::debug!(error = %e, "CloseStream not sent");
            }
        });

        tokio::spawn(async move {
            let mut assembler = TranscriptAssembler::new();

            let normal = loop {
                match reader.next().await {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(event) = assembler.on_message(&text) {
                            if event_tx.send(event).await.is_err() {
                                return;
                            }
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let normal = frame
                            .as_ref()
                            .is_some_and(|f| f.code == CloseCode::Normal);
                        if !normal {
                            tracing::warn!(frame = ?frame, "Recognition stream closed abnormally");
                        }
                        break normal;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Recognition stream error");
                        break false;
                    }
                    None => break false,
                }
            };

            let _ = event_tx.send(TranscriptEvent::Closed { normal }).await;
        });

        Ok(RecognitionChannel {
            audio: audio_tx,
            events: event_rx,
        })
    }

    fn provider_name(&self) -> &str {
        "deepgram"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listen_url_carries_stream_options() {
        let recognizer = DeepgramRecognizer::new(RecognitionConfig::default());
        let url = recognizer.listen_url().unwrap();
        let query: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(url.scheme(), "wss");
        assert_eq!(query["model"], "nova-2");
        assert_eq!(query["encoding"], "mulaw");
        assert_eq!(query["sample_rate"], "8000");
        assert_eq!(query["interim_results"], "true");
        assert_eq!(query["endpointing"], "200");
        assert_eq!(query["utterance_end_ms"], "1000");
    }

    #[test]
    fn test_invalid_endpoint_is_recognition_error() {
        let config = RecognitionConfig {
            endpoint: "not a url".to_string(),
            ..RecognitionConfig::default()
        };
        let recognizer = DeepgramRecognizer::new(config);
        assert!(matches!(recognizer.listen_url(), Err(Error::Recognition(_))));
    }
}
