//! Recognition reconnect supervision

use std::sync::Arc;
use std::time::Duration;

use call_intake_config::RecognitionConfig;
use call_intake_core::{RecognitionChannel, RecognitionEvent, SpeechRecognizer, TranscriptEvent};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const AUDIO_BUFFER: usize = 256;

/// Keeps one recognition stream alive for a session
///
/// Reopens after an abnormal close or a failed open, waiting `delay`
/// between attempts. The attempt counter resets after every successful
/// open. After `max_attempts` consecutive failures the session is sent
/// `RecognitionEvent::Failed` and no further attempts are made.
pub struct RecognitionSupervisor {
    recognizer: Arc<dyn SpeechRecognizer>,
    max_attempts: u32,
    delay: Duration,
}

enum StreamEnd {
    /// Provider closed cleanly; nothing to reopen
    Normal,
    /// Provider dropped; reopen
    Dropped,
    /// Session hung up or stopped listening
    Detached,
}

impl RecognitionSupervisor {
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>, config: &RecognitionConfig) -> Self {
        Self {
            recognizer,
            max_attempts: config.max_reconnect_attempts,
            delay: config.reconnect_delay(),
        }
    }

    pub fn with_policy(
        recognizer: Arc<dyn SpeechRecognizer>,
        max_attempts: u32,
        delay: Duration,
    ) -> Self {
        Self {
            recognizer,
            max_attempts,
            delay,
        }
    }

    /// Start supervising
    ///
    /// Returns the sender for caller audio. Dropping it closes the
    /// provider stream and ends the task.
    pub fn spawn<E>(self, events: mpsc::Sender<E>) -> (mpsc::Sender<Vec<u8>>, JoinHandle<()>)
    where
        E: From<RecognitionEvent> + Send + 'static,
    {
        let (audio_tx, audio_rx) = mpsc::channel(AUDIO_BUFFER);
        let handle = tokio::spawn(self.run(audio_rx, events));
        (audio_tx, handle)
    }

    async fn run<E>(self, mut audio: mpsc::Receiver<Vec<u8>>, events: mpsc::Sender<E>)
    where
        E: From<RecognitionEvent> + Send + 'static,
    {
        let provider = self.recognizer.provider_name().to_string();
        let mut attempts = 0u32;

        loop {
            match self.recognizer.open().await {
                Ok(channel) => {
                    attempts = 0;
                    match pump(channel, &mut audio, &events).await {
                        StreamEnd::Normal | StreamEnd::Detached => return,
                        StreamEnd::Dropped => {}
                    }
                }
                Err(e) => {
                    tracing::warn!(provider = %provider, error = %e, "Recognition open failed");
                }
            }

            if attempts >= self.max_attempts {
                tracing::error!(
                    provider = %provider,
                    attempts,
                    "Recognition reconnect attempts exhausted"
                );
                let _ = events.send(E::from(RecognitionEvent::Failed { attempts })).await;
                return;
            }

            attempts += 1;
            tracing::info!(
                provider = %provider,
                attempt = attempts,
                max = self.max_attempts,
                "Reconnecting recognition stream"
            );
            if events
                .send(E::from(RecognitionEvent::Reconnecting { attempt: attempts }))
                .await
                .is_err()
            {
                return;
            }

            tokio::time::sleep(self.delay).await;
        }
    }
}

async fn pump<E>(
    channel: RecognitionChannel,
    audio: &mut mpsc::Receiver<Vec<u8>>,
    events: &mpsc::Sender<E>,
) -> StreamEnd
where
    E: From<RecognitionEvent> + Send + 'static,
{
    let RecognitionChannel {
        audio: provider_audio,
        events: mut provider_events,
    } = channel;

    loop {
        tokio::select! {
            biased;

            chunk = audio.recv() => match chunk {
                Some(chunk) => {
                    if provider_audio.send(chunk).await.is_err() {
                        tracing::debug!("Recognition writer gone, waiting for close");
                    }
                }
                None => {
                    drop(provider_audio);
                    // let the provider flush its last results
                    while let Some(event) = provider_events.recv().await {
                        if forward(event, events).await.is_err() {
                            break;
                        }
                    }
                    return StreamEnd::Detached;
                }
            },
            event = provider_events.recv() => match event {
                Some(TranscriptEvent::Closed { normal: true }) => return StreamEnd::Normal,
                Some(TranscriptEvent::Closed { normal: false }) | None => return StreamEnd::Dropped,
                Some(event) => {
                    if forward(event, events).await.is_err() {
                        return StreamEnd::Detached;
                    }
                }
            },
        }
    }
}

/// Forward recognized text; `Err` means the session stopped listening
async fn forward<E>(event: TranscriptEvent, events: &mpsc::Sender<E>) -> Result<(), ()>
where
    E: From<RecognitionEvent>,
{
    let event = match event {
        TranscriptEvent::Interim(text) => RecognitionEvent::Interim(text),
        TranscriptEvent::Final(text) => RecognitionEvent::Final(text),
        TranscriptEvent::Closed { .. } => return Ok(()),
    };
    events.send(E::from(event)).await.map_err(|_| ())
}
