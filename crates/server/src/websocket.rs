//! Media-stream WebSocket
//!
//! The carrier opens one socket per call. Each socket gets a
//! [`CallSession`]; this module only moves frames between the socket and
//! the session.

use std::borrow::Cow;

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use call_intake_agent::{CallSession, SessionEvent};
use call_intake_core::{InboundMessage, OutboundFrame};

use crate::metrics::{record_active_calls, record_call_started};
use crate::state::AppState;

/// Handle WebSocket upgrade
pub async fn media_stream(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection = state.calls.register();
    record_call_started();
    record_active_calls(state.calls.len());
    tracing::info!(connection, "Media stream connected");

    let (sender, mut receiver) = socket.split();
    let (frames_tx, frames_rx) = mpsc::unbounded_channel();

    let session = CallSession::new(
        state.session_config(),
        state.collaborators.clone(),
        state.registry.clone(),
        frames_tx,
    );
    let events = session.events();
    let mut session_task = tokio::spawn(session.run());
    let writer = tokio::spawn(write_frames(sender, frames_rx));

    let outcome = loop {
        tokio::select! {
            outcome = &mut session_task => break outcome,
            message = receiver.next() => {
                let event = match message {
                    Some(Ok(Message::Text(text))) => match InboundMessage::parse(&text) {
                        Ok(inbound) => {
                            if let InboundMessage::Start { start, .. } = &inbound {
                                state.calls.identify(connection, &start.call_sid);
                            }
                            SessionEvent::Inbound(inbound)
                        }
                        Err(e) => {
                            tracing::debug!(connection, error = %e, "Unparseable carrier frame");
                            continue;
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => SessionEvent::TransportClosed,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::warn!(connection, error = %e, "Media stream error");
                        SessionEvent::TransportClosed
                    }
                };

                let closed = matches!(event, SessionEvent::TransportClosed);
                if events.send(event).await.is_err() || closed {
                    break (&mut session_task).await;
                }
            }
        }
    };

    // the session dropped its frame sender, so the writer drains and exits
    if let Err(e) = writer.await {
        tracing::warn!(connection, error = %e, "Frame writer failed");
    }

    state.calls.remove(connection);
    record_active_calls(state.calls.len());

    match outcome {
        Ok(outcome) => tracing::info!(
            connection,
            call_sid = ?outcome.call_sid,
            turns = outcome.turns,
            transfer = ?outcome.transfer,
            "Media stream finished"
        ),
        Err(e) => tracing::error!(connection, error = %e, "Call session failed"),
    }
}

async fn write_frames(
    mut sender: SplitSink<WebSocket, Message>,
    mut frames: mpsc::UnboundedReceiver<OutboundFrame>,
) {
    while let Some(frame) = frames.recv().await {
        match frame {
            OutboundFrame::Message(message) => {
                let text = match message.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(error = %e, "Unserializable outbound frame");
                        continue;
                    }
                };
                if sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            OutboundFrame::Close { code, reason } => {
                let close = CloseFrame {
                    code,
                    reason: Cow::Owned(reason),
                };
                if let Err(e) = sender.send(Message::Close(Some(close))).await {
                    tracing::debug!(error = %e, "Close frame not sent");
                }
                break;
            }
        }
    }
    let _ = sender.close().await;
}
