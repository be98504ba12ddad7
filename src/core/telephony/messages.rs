//! Telephony media stream frames.
//!
//! The provider opens a WebSocket per call and sends JSON frames tagged by
//! `event`. Audio is 8kHz G.711 u-law, base64 encoded, and is relayed without
//! decoding.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// =============================================================================
// Incoming Frames (provider -> gateway)
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum MediaStreamFrame {
    /// First frame after the socket opens
    Connected,

    /// Stream metadata; binds the stream identifier
    Start {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
        start: StreamStart,
    },

    /// Caller audio
    Media { media: MediaPayload },

    /// Playback acknowledgement for a mark we sent
    Mark { mark: MarkName },

    /// Call ended
    Stop,

    #[serde(other)]
    Unknown,
}

impl MediaStreamFrame {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStart {
    #[serde(default)]
    pub stream_sid: Option<String>,
    #[serde(default)]
    pub call_sid: Option<String>,
    #[serde(default)]
    pub custom_parameters: HashMap<String, String>,
}

impl StreamStart {
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.custom_parameters
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaPayload {
    /// Milliseconds since the stream started. Providers send it as a string.
    #[serde(default, deserialize_with = "lenient_millis")]
    pub timestamp: u64,
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkName {
    pub name: String,
}

fn lenient_millis<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

// =============================================================================
// Outgoing Frames (gateway -> provider)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum OutboundFrame {
    /// Assistant audio to play
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        media: OutboundMedia,
    },

    /// Ask for an acknowledgement once preceding audio has played
    Mark {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        mark: MarkName,
    },

    /// Discard buffered, not-yet-played audio
    Clear {
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMedia {
    pub payload: String,
}

impl OutboundFrame {
    pub fn media(stream_sid: &str, payload: String) -> Self {
        Self::Media {
            stream_sid: stream_sid.to_string(),
            media: OutboundMedia { payload },
        }
    }

    pub fn mark(stream_sid: &str, name: String) -> Self {
        Self::Mark {
            stream_sid: stream_sid.to_string(),
            mark: MarkName { name },
        }
    }

    pub fn clear(stream_sid: &str) -> Self {
        Self::Clear {
            stream_sid: stream_sid.to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
