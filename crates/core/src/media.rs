//! Carrier media-stream wire protocol
//!
//! JSON text frames exchanged with the telephony carrier over the duplex
//! media connection. Inbound frames are tagged by `event`; anything the
//! session does not understand deserializes to [`InboundMessage::Unknown`]
//! and is ignored.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Close code sent when a session ends on its own terms
pub const NORMAL_CLOSURE: u16 = 1000;

/// Messages the carrier sends to us
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum InboundMessage {
    /// Socket handshake finished, no stream yet
    Connected,
    /// Stream opened for a call
    Start {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
        start: StartPayload,
    },
    /// A chunk of caller audio
    Media { media: MediaPayload },
    /// A previously sent mark finished playing
    Mark { mark: MarkPayload },
    /// End of stream
    Stop,
    #[serde(other)]
    Unknown,
}

impl InboundMessage {
    /// Parse a text frame from the carrier
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPayload {
    pub call_sid: String,
    pub stream_sid: String,
}

/// Base64 μ-law audio as carried on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaPayload {
    pub payload: String,
}

impl MediaPayload {
    pub fn encode(audio: &[u8]) -> Self {
        Self {
            payload: STANDARD.encode(audio),
        }
    }

    pub fn decode(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(self.payload.as_bytes())
            .map_err(|e| Error::other(format!("invalid media payload: {}", e)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkPayload {
    pub name: String,
}

/// Messages we send to the carrier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum OutboundMessage {
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        media: MediaPayload,
    },
    Mark {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        mark: MarkPayload,
    },
    /// Drop audio the carrier has queued but not yet played
    Clear {
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },
}

impl OutboundMessage {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Unit handed from a session to its socket writer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Message(OutboundMessage),
    Close { code: u16, reason: String },
}
