//! Telephony media stream protocol.

mod messages;

pub use messages::{
    MarkName, MediaPayload, MediaStreamFrame, OutboundFrame, OutboundMedia, StreamStart,
};
