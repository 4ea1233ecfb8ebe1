use crate::error::{Error, Result};
use crate::timing::{Division, TimeConverter, DEFAULT_BPM, DEFAULT_RESOLUTION};

/// Mutable state global to one parse pass: time base, tempo and the channel
/// most recently acted upon.
#[derive(Debug, Clone, PartialEq)]
pub struct ParserContext {
    division: Division,
    resolution: u16,
    tempo_bpm: f64,
    active_channel: Option<u8>,
}

impl ParserContext {
    /// Rejects SMPTE timing, a zero resolution and any tempo that is not a
    /// positive finite number.
    pub fn new(division: Division, resolution: u16, tempo_bpm: f64) -> Result<Self> {
        if let Division::Smpte { .. } = division {
            return Err(Error::UnsupportedTiming);
        }
        if resolution == 0 {
            return Err(Error::InvalidResolution(resolution));
        }
        validate_tempo(tempo_bpm)?;
        Ok(Self {
            division,
            resolution,
            tempo_bpm,
            active_channel: None,
        })
    }

    pub fn division(&self) -> Division {
        self.division
    }

    pub fn resolution(&self) -> u16 {
        self.resolution
    }

    pub fn tempo_bpm(&self) -> f64 {
        self.tempo_bpm
    }

    pub fn active_channel(&self) -> Option<u8> {
        self.active_channel
    }

    pub fn set_tempo_bpm(&mut self, tempo_bpm: f64) -> Result<()> {
        validate_tempo(tempo_bpm)?;
        self.tempo_bpm = tempo_bpm;
        Ok(())
    }

    /// Make `channel` the active channel. Returns `true` if it was not already.
    pub fn switch_channel(&mut self, channel: u8) -> bool {
        if self.active_channel == Some(channel) {
            return false;
        }
        self.active_channel = Some(channel);
        true
    }

    pub fn converter(&self) -> TimeConverter {
        TimeConverter::new(self.resolution, self.tempo_bpm)
    }
}

impl Default for ParserContext {
    fn default() -> Self {
        Self {
            division: Division::Ppq,
            resolution: DEFAULT_RESOLUTION,
            tempo_bpm: DEFAULT_BPM,
            active_channel: None,
        }
    }
}

fn validate_tempo(tempo_bpm: f64) -> Result<()> {
    if !tempo_bpm.is_finite() || tempo_bpm <= 0.0 {
        return Err(Error::InvalidTempo(tempo_bpm));
    }
    Ok(())
}
