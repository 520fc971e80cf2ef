//! Inbound call routing
//!
//! Every call attempt hits the webhook twice when the AI hands off: once
//! when the call arrives, and again when the media stream it was connected
//! to closes. The second request finds the call in the registry and is
//! dialed through to the human line.

use std::sync::Arc;

use call_intake_agent::SessionRegistry;
use call_intake_config::Settings;

use crate::twiml;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallRoute {
    /// Connect the call to an AI session
    Connect {
        stream_url: String,
        action_url: String,
    },
    /// Dial the call through to a human line
    Forward { number: String },
}

impl CallRoute {
    /// Metric label
    pub fn kind(&self) -> &'static str {
        match self {
            CallRoute::Connect { .. } => "connect",
            CallRoute::Forward { .. } => "forward",
        }
    }

    pub fn to_twiml(&self) -> String {
        match self {
            CallRoute::Connect {
                stream_url,
                action_url,
            } => twiml::connect_stream(stream_url, action_url),
            CallRoute::Forward { number } => twiml::dial(number),
        }
    }
}

pub struct CallRouter {
    registry: Arc<SessionRegistry>,
    forward_number: String,
    stream_url: String,
    action_url: String,
}

impl CallRouter {
    pub fn new(registry: Arc<SessionRegistry>, settings: &Settings) -> Self {
        let host = &settings.server.public_host;
        Self {
            registry,
            forward_number: settings.telephony.forward_number.clone(),
            stream_url: format!("wss://{}{}", host, settings.telephony.stream_path),
            action_url: format!("https://{}{}", host, settings.telephony.incoming_path),
        }
    }

    /// Route a webhook for `call_sid`
    ///
    /// Consumes the registry entry, so a retried webhook after a transfer
    /// is dialed at most once.
    pub fn route(&self, call_sid: &str) -> CallRoute {
        if self.registry.consume(call_sid) {
            tracing::info!(call_sid = %call_sid, number = %self.forward_number, "Forwarding call");
            return CallRoute::Forward {
                number: self.forward_number.clone(),
            };
        }

        tracing::info!(call_sid = %call_sid, "Connecting call to intake session");
        self.connect()
    }

    /// Route for a webhook that carried no call id
    pub fn connect(&self) -> CallRoute {
        CallRoute::Connect {
            stream_url: self.stream_url.clone(),
            action_url: self.action_url.clone(),
        }
    }
}
