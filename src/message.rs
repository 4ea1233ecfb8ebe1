//! Raw MIDI messages and status byte classification.
//!
//! A [`RawMessage`] is a status byte plus its data bytes, exactly as it appears on
//! the wire or in a track chunk. Meta messages (status `0xFF`) keep their sub-type
//! as the first data byte, followed by the payload.

use crate::error::{Error, Result};

pub const CHANNEL_COUNT: usize = 16;

pub const STATUS_META: u8 = 0xFF;
pub const STATUS_SYSEX: u8 = 0xF0;
// system-exclusive continuation ("escape") packet
pub const STATUS_SYSEX_ESCAPE: u8 = 0xF7;

/// Meta message sub-types the parser decodes.
pub mod meta {
    pub const LYRIC: u8 = 0x05;
    pub const MARKER: u8 = 0x06;
    pub const TEMPO: u8 = 0x51;
    pub const TIME_SIGNATURE: u8 = 0x58;
    pub const KEY_SIGNATURE: u8 = 0x59;
}

/// Channel-voice opcodes, numbered by the high nibble of the status byte minus 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelVoice {
    NoteOff = 0x0,
    NoteOn = 0x1,
    PolyphonicPressure = 0x2,
    ControlChange = 0x3,
    ProgramChange = 0x4,
    ChannelPressure = 0x5,
    PitchWheel = 0x6,
}

impl ChannelVoice {
    pub fn from_opcode(opcode: u8) -> Option<Self> {
        match opcode {
            0x0 => Some(ChannelVoice::NoteOff),
            0x1 => Some(ChannelVoice::NoteOn),
            0x2 => Some(ChannelVoice::PolyphonicPressure),
            0x3 => Some(ChannelVoice::ControlChange),
            0x4 => Some(ChannelVoice::ProgramChange),
            0x5 => Some(ChannelVoice::ChannelPressure),
            0x6 => Some(ChannelVoice::PitchWheel),
            _ => None,
        }
    }

    pub fn opcode(self) -> u8 {
        self as u8
    }

    pub fn data_len(self) -> usize {
        match self {
            ChannelVoice::ProgramChange | ChannelVoice::ChannelPressure => 1,
            _ => 2,
        }
    }

    /// Status byte for this opcode on `channel` (0-15).
    pub fn status(self, channel: u8) -> u8 {
        0x80 | (self.opcode() << 4) | (channel & 0x0F)
    }
}

/// What a status byte says a message is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    ChannelVoice { voice: ChannelVoice, channel: u8 },
    Meta { kind: u8 },
    SystemExclusive,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawMessage {
    status: u8,
    data: Vec<u8>,
}

impl RawMessage {
    pub fn new(status: u8, data: Vec<u8>) -> Self {
        Self { status, data }
    }

    /// Build a channel-voice message. `data2` is dropped for one-byte opcodes.
    pub fn channel(voice: ChannelVoice, channel: u8, data1: u8, data2: u8) -> Self {
        let mut data = vec![data1 & 0x7F];
        if voice.data_len() == 2 {
            data.push(data2 & 0x7F);
        }
        Self::new(voice.status(channel), data)
    }

    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self::channel(ChannelVoice::NoteOn, channel, note, velocity)
    }

    pub fn note_off(channel: u8, note: u8, velocity: u8) -> Self {
        Self::channel(ChannelVoice::NoteOff, channel, note, velocity)
    }

    /// Build a meta message of sub-type `kind` carrying `payload`.
    pub fn meta(kind: u8, payload: &[u8]) -> Self {
        let mut data = Vec::with_capacity(payload.len() + 1);
        data.push(kind);
        data.extend_from_slice(payload);
        Self::new(STATUS_META, data)
    }

    pub fn sysex(payload: &[u8]) -> Self {
        Self::new(STATUS_SYSEX, payload.to_vec())
    }

    pub fn status(&self) -> u8 {
        self.status
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Payload without the meta sub-type byte; for other messages the same as [`data`](Self::data).
    pub fn payload(&self) -> &[u8] {
        match self.status {
            STATUS_META => self.data.get(1..).unwrap_or(&[]),
            _ => &self.data,
        }
    }

    pub fn kind(&self) -> Result<MessageKind> {
        let kind = match self.status {
            STATUS_META => {
                let kind = *self.data.first().ok_or(Error::MalformedMessage {
                    status: self.status,
                    expected: 1,
                    actual: 0,
                })?;
                MessageKind::Meta { kind }
            }
            STATUS_SYSEX | STATUS_SYSEX_ESCAPE => MessageKind::SystemExclusive,
            0x80..=0xEF => match ChannelVoice::from_opcode((self.status >> 4) - 0x8) {
                Some(voice) => MessageKind::ChannelVoice {
                    voice,
                    channel: self.status & 0x0F,
                },
                None => MessageKind::Unknown,
            },
            _ => MessageKind::Unknown,
        };
        Ok(kind)
    }

    /// The two data bytes of a channel-voice message (second is 0 for one-byte opcodes).
    pub fn channel_data(&self, voice: ChannelVoice) -> Result<(u8, u8)> {
        let expected = voice.data_len();
        if self.data.len() < expected {
            return Err(Error::MalformedMessage {
                status: self.status,
                expected,
                actual: self.data.len(),
            });
        }
        let data2 = if expected == 2 { self.data[1] } else { 0 };
        Ok((self.data[0], data2))
    }
}
