//! Call session
//!
//! One task per call. Every input (carrier frames, recognized text,
//! completion and synthesis results, timer expiries) arrives as a
//! [`SessionEvent`] on a single queue, so session state is only ever touched
//! from the loop in [`CallSession::run`].
//!
//! ```text
//! carrier ──frames──▶ ┌─────────────┐ ──audio──▶ recognition supervisor
//!                     │ CallSession │ ◀─text───┘
//! carrier ◀─sink───── │  (one loop) │ ──turn───▶ completion task
//!                     └─────────────┘ ──text───▶ synthesis tasks
//! ```

use std::collections::HashSet;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use call_intake_config::Settings;
use call_intake_core::{
    AudioSegment, CallerTurn, CompletionEngine, CompletionProvider, CompletionReply, Error,
    InboundMessage, MarkPayload, MediaPayload, MediaSink, OutboundFrame, OutboundMessage,
    RecognitionEvent, ReplyIntent, Result, SpeechRecognizer, SpeechRequest, SpeechSynthesizer,
    TransferTarget, NORMAL_CLOSURE,
};
use call_intake_pipeline::{
    AudioSequencer, InterimOutcome, PipelineError, RecognitionSupervisor, Submitted,
    TurnAggregator,
};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::handshake::{CommitReason, TransferHandshake};
use crate::registry::SessionRegistry;
use crate::telemetry;
use crate::timer::SessionTimer;

const TRANSFER_CLOSE_REASON: &str = "Transfer complete";

/// Everything that can happen to a call
#[derive(Debug)]
pub enum SessionEvent {
    /// Parsed frame from the carrier
    Inbound(InboundMessage),
    /// Carrier socket closed or errored
    TransportClosed,
    Recognition(RecognitionEvent),
    Completed {
        interaction: u32,
        result: Result<Vec<CompletionReply>>,
    },
    Synthesized {
        request: SpeechRequest,
        result: Result<Vec<u8>>,
    },
    QuietElapsed(u64),
    FallbackElapsed(u64),
    SettleElapsed(u64),
}

impl From<RecognitionEvent> for SessionEvent {
    fn from(event: RecognitionEvent) -> Self {
        SessionEvent::Recognition(event)
    }
}

/// Speech and language services a session talks to
#[derive(Clone)]
pub struct Collaborators {
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub completion: Arc<dyn CompletionProvider>,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Spoken when the stream starts; skipped when empty
    pub greeting: String,
    pub quiet_period: Duration,
    pub transfer_fallback: Duration,
    pub transfer_settle: Duration,
    pub event_capacity: usize,
    pub recognition_attempts: u32,
    pub recognition_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl SessionConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            greeting: settings.telephony.greeting.clone(),
            quiet_period: settings.call.quiet_period(),
            transfer_fallback: settings.call.transfer_fallback(),
            transfer_settle: settings.call.transfer_settle(),
            event_capacity: settings.call.event_capacity,
            recognition_attempts: settings.recognition.max_reconnect_attempts,
            recognition_delay: settings.recognition.reconnect_delay(),
        }
    }
}

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub call_sid: Option<String>,
    pub turns: u32,
    pub transfer: Option<(TransferTarget, CommitReason)>,
}

/// Outbound half of a carrier stream, feeding the socket writer task
pub struct StreamSink {
    stream_sid: String,
    frames: mpsc::UnboundedSender<OutboundFrame>,
    open: AtomicBool,
}

impl StreamSink {
    pub fn new(
        stream_sid: impl Into<String>,
        frames: mpsc::UnboundedSender<OutboundFrame>,
    ) -> Self {
        Self {
            stream_sid: stream_sid.into(),
            frames,
            open: AtomicBool::new(true),
        }
    }

    fn push(&self, message: OutboundMessage) -> Result<()> {
        if !self.is_open() {
            return Err(Error::TransportUnavailable);
        }
        self.frames
            .send(OutboundFrame::Message(message))
            .map_err(|_| Error::TransportUnavailable)
    }
}

impl MediaSink for StreamSink {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.frames.is_closed()
    }

    fn send_media(&self, audio: &[u8]) -> Result<()> {
        self.push(OutboundMessage::Media {
            stream_sid: self.stream_sid.clone(),
            media: MediaPayload::encode(audio),
        })
    }

    fn send_mark(&self, label: &str) -> Result<()> {
        self.push(OutboundMessage::Mark {
            stream_sid: self.stream_sid.clone(),
            mark: MarkPayload {
                name: label.to_string(),
            },
        })
    }

    fn send_clear(&self) -> Result<()> {
        self.push(OutboundMessage::Clear {
            stream_sid: self.stream_sid.clone(),
        })
    }

    fn close(&self, code: u16, reason: &str) -> Result<()> {
        if !self.open.swap(false, Ordering::AcqRel) {
            return Err(Error::TransportUnavailable);
        }
        self.frames
            .send(OutboundFrame::Close {
                code,
                reason: reason.to_string(),
            })
            .map_err(|_| Error::TransportUnavailable)
    }
}

pub struct CallSession {
    config: SessionConfig,
    collaborators: Collaborators,
    registry: Arc<SessionRegistry>,
    frames: mpsc::UnboundedSender<OutboundFrame>,
    events_tx: mpsc::Sender<SessionEvent>,
    events_rx: mpsc::Receiver<SessionEvent>,

    call_sid: Option<String>,
    sink: Option<StreamSink>,
    engine: Option<Arc<dyn CompletionEngine>>,
    recognition_audio: Option<mpsc::Sender<Vec<u8>>>,

    turns: TurnAggregator,
    sequencer: AudioSequencer,
    handshake: TransferHandshake,
    /// Marks sent but not yet echoed back; non-empty means audio is playing
    outstanding_marks: HashSet<String>,
    quiet_timer: SessionTimer,
    /// Fallback until the transfer mark is acknowledged, settle after
    transfer_timer: SessionTimer,
    tasks: JoinSet<()>,
    turn_count: u32,
}

impl CallSession {
    pub fn new(
        config: SessionConfig,
        collaborators: Collaborators,
        registry: Arc<SessionRegistry>,
        frames: mpsc::UnboundedSender<OutboundFrame>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(config.event_capacity.max(1));
        Self {
            config,
            collaborators,
            registry,
            frames,
            events_tx,
            events_rx,
            call_sid: None,
            sink: None,
            engine: None,
            recognition_audio: None,
            turns: TurnAggregator::new(),
            sequencer: AudioSequencer::new(),
            handshake: TransferHandshake::new(),
            outstanding_marks: HashSet::new(),
            quiet_timer: SessionTimer::new(),
            transfer_timer: SessionTimer::new(),
            tasks: JoinSet::new(),
            turn_count: 0,
        }
    }

    /// Queue for feeding carrier frames into the session
    pub fn events(&self) -> mpsc::Sender<SessionEvent> {
        self.events_tx.clone()
    }

    /// Process events until the call ends or a transfer commits
    pub async fn run(mut self) -> SessionOutcome {
        loop {
            tokio::select! {
                event = self.events_rx.recv() => {
                    // the session holds a sender, so the queue never drains shut
                    let Some(event) = event else { break };
                    if self.handle(event).is_break() {
                        break;
                    }
                }
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            tracing::error!(call_sid = ?self.call_sid, "Session task panicked");
                        }
                    }
                }
            }
        }

        self.teardown()
    }

    fn handle(&mut self, event: SessionEvent) -> ControlFlow<()> {
        match event {
            SessionEvent::Inbound(message) => return self.on_inbound(message),
            SessionEvent::TransportClosed => {
                tracing::info!(call_sid = ?self.call_sid, "Carrier stream closed");
                self.on_disconnect();
                return ControlFlow::Break(());
            }
            SessionEvent::Recognition(event) => self.on_recognition(event),
            SessionEvent::Completed {
                interaction,
                result,
            } => self.on_completed(interaction, result),
            SessionEvent::Synthesized { request, result } => {
                return self.on_synthesized(request, result)
            }
            SessionEvent::QuietElapsed(generation) => {
                if self.quiet_timer.fired(generation) {
                    if let Some(turn) = self.turns.on_quiet_elapsed() {
                        self.dispatch_turn(turn);
                    }
                }
            }
            SessionEvent::FallbackElapsed(generation) => {
                if self.transfer_timer.fired(generation) {
                    if let Some(reason) = self.handshake.on_fallback_elapsed() {
                        tracing::warn!(
                            call_sid = ?self.call_sid,
                            "Transfer line not confirmed in time"
                        );
                        return self.commit(reason);
                    }
                }
            }
            SessionEvent::SettleElapsed(generation) => {
                if self.transfer_timer.fired(generation) {
                    if let Some(reason) = self.handshake.on_settle_elapsed() {
                        return self.commit(reason);
                    }
                }
            }
        }
        ControlFlow::Continue(())
    }

    fn on_inbound(&mut self, message: InboundMessage) -> ControlFlow<()> {
        match message {
            InboundMessage::Start { stream_sid, start } => {
                let stream_sid = stream_sid.unwrap_or(start.stream_sid);
                self.on_start(start.call_sid, stream_sid);
            }
            InboundMessage::Media { media } => self.on_media(&media),
            InboundMessage::Mark { mark } => self.on_mark(mark.name),
            InboundMessage::Stop => {
                tracing::info!(call_sid = ?self.call_sid, "Carrier stopped stream");
                self.on_disconnect();
                return ControlFlow::Break(());
            }
            InboundMessage::Connected | InboundMessage::Unknown => {}
        }
        ControlFlow::Continue(())
    }

    fn on_start(&mut self, call_sid: String, stream_sid: String) {
        if self.call_sid.is_some() {
            tracing::warn!(call_sid = %call_sid, "Duplicate stream start ignored");
            return;
        }

        tracing::info!(call_sid = %call_sid, stream_sid = %stream_sid, "Call stream started");

        self.sink = Some(StreamSink::new(stream_sid, self.frames.clone()));
        self.engine = Some(self.collaborators.completion.open(&call_sid));
        self.call_sid = Some(call_sid);

        let supervisor = RecognitionSupervisor::with_policy(
            self.collaborators.recognizer.clone(),
            self.config.recognition_attempts,
            self.config.recognition_delay,
        );
        let (audio, _handle) = supervisor.spawn(self.events_tx.clone());
        self.recognition_audio = Some(audio);

        let greeting = self.config.greeting.trim().to_string();
        if !greeting.is_empty() {
            if greeting.ends_with('?') {
                self.listen();
            }
            self.synthesize(SpeechRequest {
                index: None,
                text: greeting,
                label: "greeting".to_string(),
            });
        }
    }

    fn on_media(&mut self, media: &MediaPayload) {
        let Some(audio) = &self.recognition_audio else {
            return;
        };

        match media.decode() {
            Ok(chunk) => {
                if let Err(mpsc::error::TrySendError::Full(_)) = audio.try_send(chunk) {
                    tracing::trace!("Recognition audio backlog full, dropping chunk");
                }
            }
            Err(e) => tracing::debug!(error = %e, "Undecodable media frame"),
        }
    }

    fn on_mark(&mut self, label: String) {
        self.outstanding_marks.remove(&label);
        if self.handshake.on_mark(&label) {
            tracing::info!(call_sid = ?self.call_sid, "Transfer line played");
            self.transfer_timer.arm(
                self.config.transfer_settle,
                &self.events_tx,
                SessionEvent::SettleElapsed,
            );
        }
    }

    fn on_recognition(&mut self, event: RecognitionEvent) {
        match event {
            RecognitionEvent::Interim(text) => {
                if !self.handshake.accepts_replies() {
                    return;
                }
                let playing = !self.outstanding_marks.is_empty();
                if let InterimOutcome::Buffered { interrupt } =
                    self.turns.on_interim(&text, playing)
                {
                    self.quiet_timer.arm(
                        self.config.quiet_period,
                        &self.events_tx,
                        SessionEvent::QuietElapsed,
                    );
                    if interrupt {
                        self.barge_in();
                    }
                }
            }
            RecognitionEvent::Final(text) => {
                if !self.handshake.accepts_replies() {
                    return;
                }
                if let Some(turn) = self.turns.on_final(&text) {
                    self.quiet_timer.cancel();
                    self.dispatch_turn(turn);
                }
            }
            RecognitionEvent::Reconnecting { attempt } => {
                tracing::info!(call_sid = ?self.call_sid, attempt, "Recognition reconnecting");
            }
            RecognitionEvent::Failed { attempts } => {
                tracing::error!(
                    call_sid = ?self.call_sid,
                    attempts,
                    "Recognition unavailable for the rest of the call"
                );
                telemetry::record_recognition_failure();
                self.recognition_audio = None;
            }
        }
    }

    /// Open the gate for the caller's answer
    fn listen(&mut self) {
        self.turns.open_gate();
        self.quiet_timer.cancel();
    }

    fn barge_in(&mut self) {
        let Some(sink) = &self.sink else { return };
        tracing::debug!(call_sid = ?self.call_sid, "Caller spoke over playback");
        if let Err(e) = sink.send_clear() {
            tracing::debug!(error = %e, "Clear not sent");
        }
    }

    fn dispatch_turn(&mut self, turn: CallerTurn) {
        if !self.handshake.accepts_replies() {
            return;
        }
        let Some(engine) = self.engine.clone() else {
            return;
        };

        self.turn_count += 1;
        telemetry::record_caller_turn();
        tracing::info!(
            call_sid = ?self.call_sid,
            interaction = turn.interaction,
            text = %turn.text,
            "Caller turn"
        );

        let events = self.events_tx.clone();
        self.tasks.spawn(async move {
            let result = engine.complete(&turn).await;
            let _ = events
                .send(SessionEvent::Completed {
                    interaction: turn.interaction,
                    result,
                })
                .await;
        });
    }

    fn on_completed(&mut self, interaction: u32, result: Result<Vec<CompletionReply>>) {
        let replies = match result {
            Ok(replies) => replies,
            Err(e) => {
                tracing::warn!(
                    call_sid = ?self.call_sid,
                    interaction,
                    error = %e,
                    "Completion failed, listening again"
                );
                if self.handshake.accepts_replies() {
                    self.listen();
                }
                return;
            }
        };

        for reply in replies {
            self.on_reply(reply);
        }
    }

    fn on_reply(&mut self, reply: CompletionReply) {
        if !self.handshake.accepts_replies() {
            tracing::debug!(index = reply.index, "Transfer in progress, reply discarded");
            return;
        }

        let label = match reply.intent {
            ReplyIntent::Transfer { target } => {
                let Some(label) = self.handshake.begin(target) else {
                    return;
                };
                self.turns.close_gate();
                self.quiet_timer.cancel();
                self.transfer_timer.arm(
                    self.config.transfer_fallback,
                    &self.events_tx,
                    SessionEvent::FallbackElapsed,
                );
                label
            }
            ReplyIntent::Ordinary => {
                if reply.asks_question() {
                    self.listen();
                }
                format!("reply-{}", reply.index)
            }
        };

        self.synthesize(SpeechRequest {
            index: Some(reply.index),
            text: reply.text,
            label,
        });
    }

    fn synthesize(&mut self, request: SpeechRequest) {
        let synthesizer = self.collaborators.synthesizer.clone();
        let events = self.events_tx.clone();
        self.tasks.spawn(async move {
            let result = synthesizer.synthesize(&request.text).await;
            let _ = events
                .send(SessionEvent::Synthesized { request, result })
                .await;
        });
    }

    fn on_synthesized(
        &mut self,
        request: SpeechRequest,
        result: Result<Vec<u8>>,
    ) -> ControlFlow<()> {
        let audio = match result {
            Ok(audio) => audio,
            Err(e) => return self.on_synthesis_failure(request, &e.to_string()),
        };

        let Some(sink) = &self.sink else {
            return ControlFlow::Continue(());
        };

        let segment = AudioSegment {
            index: request.index,
            payload: audio,
            label: Some(request.label.clone()),
        };

        let submitted = self.sequencer.submit(segment, sink);
        match submitted {
            Ok(submitted) => self.on_delivered(submitted),
            Err(PipelineError::EmptyPayload { .. }) => {
                return self.on_synthesis_failure(request, "empty audio");
            }
            Err(e) => {
                tracing::warn!(
                    call_sid = ?self.call_sid,
                    index = ?request.index,
                    error = %e,
                    "Audio not delivered"
                );
            }
        }
        ControlFlow::Continue(())
    }

    fn on_synthesis_failure(&mut self, request: SpeechRequest, error: &str) -> ControlFlow<()> {
        telemetry::record_synthesis_failure();
        tracing::warn!(
            call_sid = ?self.call_sid,
            index = ?request.index,
            label = %request.label,
            error = %error,
            "Synthesis failed"
        );

        if let Some(reason) = self.handshake.on_synthesis_failure() {
            return self.commit(reason);
        }

        let Some(index) = request.index else {
            return ControlFlow::Continue(());
        };
        let unblocked = match &self.sink {
            Some(sink) => self.sequencer.abandon(index, sink),
            None => Submitted::default(),
        };
        self.on_delivered(unblocked);
        ControlFlow::Continue(())
    }

    fn on_delivered(&mut self, submitted: Submitted) {
        for delivery in submitted.delivered {
            if self.handshake.on_audio_sent(&delivery.label) {
                tracing::info!(call_sid = ?self.call_sid, "Transfer line sent");
            }
            self.outstanding_marks.insert(delivery.label);
        }
        if let Some(e) = submitted.interrupted {
            tracing::warn!(call_sid = ?self.call_sid, error = %e, "Audio delivery interrupted");
        }
    }

    fn on_disconnect(&mut self) {
        if let Some(reason) = self.handshake.on_disconnect() {
            let _ = self.commit(reason);
        }
    }

    /// Record the transfer and end the media stream
    fn commit(&mut self, reason: CommitReason) -> ControlFlow<()> {
        self.transfer_timer.cancel();
        self.quiet_timer.cancel();
        self.turns.close_gate();

        match &self.call_sid {
            Some(call_sid) => self.registry.mark_due(call_sid),
            None => tracing::error!("Transfer committed before the call was identified"),
        }

        tracing::info!(
            call_sid = ?self.call_sid,
            target = ?self.handshake.target().map(|t| t.as_str()),
            reason = %reason,
            "Transfer committed"
        );
        telemetry::record_transfer_commit(reason);

        if let Some(sink) = &self.sink {
            if let Err(e) = sink.close(NORMAL_CLOSURE, TRANSFER_CLOSE_REASON) {
                tracing::debug!(error = %e, "Stream already closed");
            }
        }
        ControlFlow::Break(())
    }

    fn teardown(mut self) -> SessionOutcome {
        self.quiet_timer.cancel();
        self.transfer_timer.cancel();
        self.tasks.abort_all();
        // closes the provider stream; the supervisor exits on its own
        self.recognition_audio = None;

        let transfer = self.handshake.target().zip(self.handshake.reason());

        tracing::info!(
            call_sid = ?self.call_sid,
            turns = self.turn_count,
            transferred = transfer.is_some(),
            "Call session ended"
        );

        SessionOutcome {
            call_sid: self.call_sid,
            turns: self.turn_count,
            transfer,
        }
    }
}
