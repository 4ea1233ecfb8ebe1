use crate::message::RawMessage;

/// A resolved note: pitch, duration and both velocities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
    pub pitch: u8,
    /// Duration in beats (see [`crate::timing`]).
    pub duration: f64,
    pub attack_velocity: u8,
    pub decay_velocity: u8,
}

/// Everything the parser reports to listeners, as a value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedEvent {
    Note(Note),
    Rest(f64),
    TempoChanged(f64),
    TrackChanged(u8),
    TrackBeatTimeRequested(f64),
    Lyric(String),
    Marker(String),
    KeySignature { key: i8, scale: u8 },
    TimeSignature { numerator: u8, power_of_two: u8 },
    Controller { controller: u8, value: u8 },
    Instrument(u8),
    PitchWheel { lsb: u8, msb: u8 },
    ChannelPressure(u8),
    PolyphonicPressure { key: u8, pressure: u8 },
    SystemExclusive(Vec<u8>),
    Unhandled(RawMessage),
}

impl ParsedEvent {
    pub fn is_note(&self) -> bool {
        matches!(self, ParsedEvent::Note(_))
    }

    pub fn is_rest(&self) -> bool {
        matches!(self, ParsedEvent::Rest(_))
    }
}

/// An event with the tick of the message that produced it.
///
/// A note is reported when it closes, so its tick is the note-off tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedEvent {
    pub tick: u64,
    pub event: ParsedEvent,
}
