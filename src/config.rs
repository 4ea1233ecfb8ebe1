//! Parser configuration.

use crate::timing::{DEFAULT_BPM, DEFAULT_RESOLUTION};

/// What to do with a note-on for a note number that is already sounding on the
/// same channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateNotePolicy {
    /// Discard the new note-on and keep the original pending note.
    #[default]
    KeepFirst,
    /// Close the pending note at the new note-on's tick (decay velocity 0),
    /// then open a new one.
    Retrigger,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParserConfig {
    /// Ticks per beat assumed until a source supplies its own.
    pub default_resolution: u16,
    /// Tempo in force at the start of every pass.
    pub default_tempo_bpm: f64,
    pub duplicate_note_policy: DuplicateNotePolicy,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            default_resolution: DEFAULT_RESOLUTION,
            default_tempo_bpm: DEFAULT_BPM,
            duplicate_note_policy: DuplicateNotePolicy::default(),
        }
    }
}
