//! Message sources: tracks of timestamped raw messages.
//!
//! [`MidiSource`] is what the parser consumes. It can be assembled in memory or
//! read from a Standard MIDI File through `midly`, whose events are re-encoded
//! as status and data bytes.

use std::path::Path;

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use tracing::debug;

use crate::error::Result;
use crate::message::{meta, ChannelVoice, RawMessage, STATUS_SYSEX, STATUS_SYSEX_ESCAPE};
use crate::timing::Division;

/// A raw message at an absolute tick within its track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedMessage {
    pub tick: u64,
    pub message: RawMessage,
}

impl TimedMessage {
    pub fn new(tick: u64, message: RawMessage) -> Self {
        Self { tick, message }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MidiSource {
    pub division: Division,
    /// Ticks per beat.
    pub resolution: u16,
    /// Each track in non-decreasing tick order.
    pub tracks: Vec<Vec<TimedMessage>>,
}

impl MidiSource {
    pub fn new(division: Division, resolution: u16) -> Self {
        Self {
            division,
            resolution,
            tracks: Vec::new(),
        }
    }

    pub fn with_track(mut self, track: Vec<TimedMessage>) -> Self {
        self.tracks.push(track);
        self
    }

    pub fn push_track(&mut self, track: Vec<TimedMessage>) {
        self.tracks.push(track);
    }

    pub fn message_count(&self) -> usize {
        self.tracks.iter().map(Vec::len).sum()
    }

    /// Load and read a Standard MIDI File from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::parse_bytes(&data)
    }

    /// Read a Standard MIDI File image.
    pub fn parse_bytes(data: &[u8]) -> Result<Self> {
        let smf = Smf::parse(data)?;
        Self::from_smf(&smf)
    }

    pub fn from_smf(smf: &Smf) -> Result<Self> {
        let (division, resolution) = match smf.header.timing {
            Timing::Metrical(tpb) => (Division::Ppq, tpb.as_int()),
            Timing::Timecode(fps, ticks_per_frame) => {
                debug!("SMPTE division: {} fps", fps.as_f32());
                let division = Division::Smpte {
                    frames_per_second: fps.as_f32(),
                    ticks_per_frame,
                };
                (division, u16::from(ticks_per_frame))
            }
        };

        let mut source = Self::new(division, resolution);
        for track in smf.tracks.iter() {
            let mut tick = 0u64;
            let mut messages = Vec::with_capacity(track.len());
            for event in track.iter() {
                tick += event.delta.as_int() as u64;
                messages.push(TimedMessage::new(tick, convert_event(&event.kind)));
            }
            source.push_track(messages);
        }

        debug!(
            "Read MIDI file: {} tracks, {} messages, {} ticks per beat",
            source.tracks.len(),
            source.message_count(),
            resolution
        );
        Ok(source)
    }
}

fn convert_event(kind: &TrackEventKind) -> RawMessage {
    match kind {
        TrackEventKind::Midi { channel, message } => convert_midi(channel.as_int(), message),
        TrackEventKind::SysEx(data) => RawMessage::new(STATUS_SYSEX, data.to_vec()),
        TrackEventKind::Escape(data) => RawMessage::new(STATUS_SYSEX_ESCAPE, data.to_vec()),
        TrackEventKind::Meta(message) => convert_meta(message),
    }
}

fn convert_midi(channel: u8, message: &MidiMessage) -> RawMessage {
    let (voice, data1, data2) = match *message {
        MidiMessage::NoteOff { key, vel } => (ChannelVoice::NoteOff, key.as_int(), vel.as_int()),
        MidiMessage::NoteOn { key, vel } => (ChannelVoice::NoteOn, key.as_int(), vel.as_int()),
        MidiMessage::Aftertouch { key, vel } => {
            (ChannelVoice::PolyphonicPressure, key.as_int(), vel.as_int())
        }
        MidiMessage::Controller { controller, value } => {
            (ChannelVoice::ControlChange, controller.as_int(), value.as_int())
        }
        MidiMessage::ProgramChange { program } => {
            (ChannelVoice::ProgramChange, program.as_int(), 0)
        }
        MidiMessage::ChannelAftertouch { vel } => (ChannelVoice::ChannelPressure, vel.as_int(), 0),
        MidiMessage::PitchBend { bend } => {
            // 14-bit value, sent least significant 7 bits first
            let raw = bend.0.as_int();
            (
                ChannelVoice::PitchWheel,
                (raw & 0x7F) as u8,
                ((raw >> 7) & 0x7F) as u8,
            )
        }
    };
    RawMessage::channel(voice, channel, data1, data2)
}

fn convert_meta(message: &MetaMessage) -> RawMessage {
    match message {
        MetaMessage::TrackNumber(number) => match number {
            Some(n) => RawMessage::meta(0x00, &n.to_be_bytes()),
            None => RawMessage::meta(0x00, &[]),
        },
        MetaMessage::Text(text) => RawMessage::meta(0x01, text),
        MetaMessage::Copyright(text) => RawMessage::meta(0x02, text),
        MetaMessage::TrackName(text) => RawMessage::meta(0x03, text),
        MetaMessage::InstrumentName(text) => RawMessage::meta(0x04, text),
        MetaMessage::Lyric(text) => RawMessage::meta(meta::LYRIC, text),
        MetaMessage::Marker(text) => RawMessage::meta(meta::MARKER, text),
        MetaMessage::CuePoint(text) => RawMessage::meta(0x07, text),
        MetaMessage::ProgramName(text) => RawMessage::meta(0x08, text),
        MetaMessage::DeviceName(text) => RawMessage::meta(0x09, text),
        MetaMessage::MidiChannel(channel) => RawMessage::meta(0x20, &[channel.as_int()]),
        MetaMessage::MidiPort(port) => RawMessage::meta(0x21, &[port.as_int()]),
        MetaMessage::EndOfTrack => RawMessage::meta(0x2F, &[]),
        MetaMessage::Tempo(tempo) => {
            let bytes = tempo.as_int().to_be_bytes();
            RawMessage::meta(meta::TEMPO, &bytes[1..])
        }
        MetaMessage::SmpteOffset(time) => RawMessage::meta(
            0x54,
            &[
                time.hour(),
                time.minute(),
                time.second(),
                time.frame(),
                time.subframe(),
            ],
        ),
        MetaMessage::TimeSignature(numerator, power_of_two, clocks, thirty_seconds) => {
            RawMessage::meta(
                meta::TIME_SIGNATURE,
                &[*numerator, *power_of_two, *clocks, *thirty_seconds],
            )
        }
        MetaMessage::KeySignature(key, minor) => {
            RawMessage::meta(meta::KEY_SIGNATURE, &[*key as u8, *minor as u8])
        }
        MetaMessage::SequencerSpecific(data) => RawMessage::meta(0x7F, data),
        MetaMessage::Unknown(kind, data) => RawMessage::meta(*kind, data),
    }
}
