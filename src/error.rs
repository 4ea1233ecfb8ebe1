//! Error types for the MIDI event parser.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("MIDI file error: {0}")]
    MidiFile(String),

    #[error("Unsupported MIDI timing format (SMPTE division)")]
    UnsupportedTiming,

    #[error("Malformed message {status:#04X}: expected {expected} data bytes, got {actual}")]
    MalformedMessage {
        status: u8,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid resolution: {0} ticks per beat")]
    InvalidResolution(u16),

    #[error("Invalid tempo: {0} BPM")]
    InvalidTempo(f64),
}

impl From<midly::Error> for Error {
    fn from(e: midly::Error) -> Self {
        Error::MidiFile(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
