//! Payload decoders for the meta messages the parser understands.

use crate::error::{Error, Result};
use crate::message::RawMessage;
use crate::timing::bpm_from_micros_per_quarter;

const LEN_TEMPO: usize = 3;
const LEN_KEY_SIGNATURE: usize = 2;
const LEN_TIME_SIGNATURE: usize = 2;

fn require(message: &RawMessage, expected: usize) -> Result<&[u8]> {
    let payload = message.payload();
    if payload.len() < expected {
        return Err(Error::MalformedMessage {
            status: message.status(),
            expected,
            actual: payload.len(),
        });
    }
    Ok(payload)
}

/// Tempo in BPM from a 24-bit big-endian microseconds-per-quarter payload.
pub fn decode_tempo(message: &RawMessage) -> Result<f64> {
    let bytes = require(message, LEN_TEMPO)?;
    let micros_per_quarter = u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]);
    Ok(bpm_from_micros_per_quarter(micros_per_quarter))
}

/// Text payloads have no mandated encoding; invalid UTF-8 is replaced.
pub fn decode_text(message: &RawMessage) -> String {
    String::from_utf8_lossy(message.payload()).into_owned()
}

/// `(sharps/flats, major/minor)`; the first byte is two's complement.
pub fn decode_key_signature(message: &RawMessage) -> Result<(i8, u8)> {
    let bytes = require(message, LEN_KEY_SIGNATURE)?;
    Ok((bytes[0] as i8, bytes[1]))
}

/// `(numerator, denominator as a power of two)`. Clock and 32nd-note bytes are ignored.
pub fn decode_time_signature(message: &RawMessage) -> Result<(u8, u8)> {
    let bytes = require(message, LEN_TIME_SIGNATURE)?;
    Ok((bytes[0], bytes[1]))
}
