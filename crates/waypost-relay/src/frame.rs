//! Wire frames for the two-channel display protocol
//!
//! The peripheral accepts two frame shapes:
//!
//! - status channel: `[power_byte][time_bytes...]`
//! - message channel: `[command_byte][payload_bytes...]`
//!
//! A full cue transmission is five message frames in fixed command order
//! (time, distance, arrival, location, maneuver icon) and counts as
//! successful only when all five writes succeed; the caller must not mark
//! the cue as sent on partial success.
//!
//! Before each write the transport's payload limit is re-requested. The
//! request is idempotent and best-effort: its failure is logged and never
//! blocks the write itself.

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, trace};

use waypost_core::NavigationCue;

use crate::error::{RelayError, Result};
use crate::link::{LinkStateMachine, LinkTransport};

/// Command tags of the message channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FieldCommand {
    /// Time remaining
    Time = 1,
    /// Distance remaining
    Distance = 2,
    /// Arrival estimate
    Arrival = 3,
    /// Destination label
    Location = 4,
    /// Maneuver icon identity
    ManeuverIcon = 5,
}

impl FieldCommand {
    /// The fixed order of a full cue transmission
    pub const TRANSMISSION_ORDER: [FieldCommand; 5] = [
        FieldCommand::Time,
        FieldCommand::Distance,
        FieldCommand::Arrival,
        FieldCommand::Location,
        FieldCommand::ManeuverIcon,
    ];

    /// The wire command byte
    pub fn id(self) -> u8 {
        self as u8
    }
}

/// Payload of one message frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramePayload {
    /// UTF-8/ASCII text, sent as its bytes
    Text(String),
    /// A single raw byte
    Byte(u8),
    /// Raw bytes, passed through unchanged
    Raw(Bytes),
}

impl FramePayload {
    fn len(&self) -> usize {
        match self {
            FramePayload::Text(s) => s.len(),
            FramePayload::Byte(_) => 1,
            FramePayload::Raw(b) => b.len(),
        }
    }
}

/// Compose a status frame: one power byte followed by the time text
pub fn encode_status_frame(power_level: u8, time_text: &str) -> Bytes {
    let mut frame = BytesMut::with_capacity(1 + time_text.len());
    frame.put_u8(power_level);
    frame.put_slice(time_text.as_bytes());
    frame.freeze()
}

/// Compose a message frame: one command byte followed by the payload
pub fn encode_field_frame(command: FieldCommand, payload: &FramePayload) -> Bytes {
    let mut frame = BytesMut::with_capacity(1 + payload.len());
    frame.put_u8(command.id());
    match payload {
        FramePayload::Text(s) => frame.put_slice(s.as_bytes()),
        FramePayload::Byte(b) => frame.put_u8(*b),
        FramePayload::Raw(bytes) => frame.put_slice(bytes),
    }
    frame.freeze()
}

/// Performs channel writes against the active link session
///
/// Stateless; every operation checks the session is `Ready` and fails with
/// [`RelayError::NotReady`] otherwise, leaving the caller's dedup state
/// untouched.
pub struct FrameWriter;

impl FrameWriter {
    /// Write a time/power status frame to the status channel
    pub async fn write_status<T: LinkTransport>(
        link: &mut LinkStateMachine<T>,
        power_level: u8,
        time_text: &str,
    ) -> Result<()> {
        let (status_channel, _) = link.channels()?;
        let frame = encode_status_frame(power_level, time_text);
        trace!(
            "writeStatus {{power={},len={}}}",
            power_level,
            frame.len()
        );
        Self::write_frame(link, status_channel, &frame).await
    }

    /// Write one command-tagged field frame to the message channel
    pub async fn write_field<T: LinkTransport>(
        link: &mut LinkStateMachine<T>,
        command: FieldCommand,
        payload: FramePayload,
    ) -> Result<()> {
        let (_, message_channel) = link.channels()?;
        let frame = encode_field_frame(command, &payload);
        trace!("writeField {{cmd={},len={}}}", command.id(), frame.len());
        Self::write_frame(link, message_channel, &frame).await
    }

    /// Transmit a full cue: five field frames in command order
    ///
    /// Returns the first failure; the caller treats anything but `Ok` as
    /// "nothing sent" for dedup purposes, so a later identical cue retries
    /// all five fields.
    pub async fn transmit_cue<T: LinkTransport>(
        link: &mut LinkStateMachine<T>,
        cue: &NavigationCue,
    ) -> Result<()> {
        for command in FieldCommand::TRANSMISSION_ORDER {
            let text = match command {
                FieldCommand::Time => &cue.remaining_time,
                FieldCommand::Distance => &cue.remaining_distance,
                FieldCommand::Arrival => &cue.estimated_arrival,
                FieldCommand::Location => &cue.location_label,
                FieldCommand::ManeuverIcon => &cue.maneuver_icon_id,
            };
            Self::write_field(link, command, FramePayload::Text(text.clone())).await?;
        }
        Ok(())
    }

    /// Negotiate (best-effort), bound-check and write one frame
    async fn write_frame<T: LinkTransport>(
        link: &mut LinkStateMachine<T>,
        channel: crate::link::ChannelHandle,
        frame: &[u8],
    ) -> Result<()> {
        // Re-request the payload limit so a renegotiated link never
        // truncates; failure must not block the write attempt.
        let requested = link.requested_payload_limit();
        match link.transport_mut().request_payload_limit(requested).await {
            Ok(limit) => link.set_payload_limit(limit),
            Err(e) => debug!("Payload limit request failed (continuing): {}", e),
        }

        let limit = link.session().payload_limit();
        if frame.len() > limit {
            return Err(RelayError::FrameTooLarge {
                size: frame.len(),
                limit,
            });
        }

        link.transport_mut().write(channel, frame).await
    }
}
