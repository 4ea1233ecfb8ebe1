//! Interpret timed MIDI messages as musical events.
//!
//! [`MidiParser`] turns the channel-voice, meta and system-exclusive messages of
//! a [`MidiSource`] into notes with durations, rests, tempo changes, lyrics,
//! markers, signatures and controller values, and reports them to registered
//! [`ParserListener`]s.

pub mod error;
pub use error::{Error, Result};

pub mod channel;
pub use channel::{ChannelState, ChannelStates, PendingNote};

pub mod config;
pub use config::{DuplicateNotePolicy, ParserConfig};

pub mod context;
pub use context::ParserContext;

pub mod decode;

pub mod event;
pub use event::{Note, ParsedEvent, TimedEvent};

pub mod formatter;

pub mod listener;
pub use listener::{EventLog, Listeners, ObserverId, ParserListener};

pub mod message;
pub use message::{ChannelVoice, MessageKind, RawMessage, CHANNEL_COUNT};

pub mod parser;
pub use parser::MidiParser;

pub mod source;
pub use source::{MidiSource, TimedMessage};

pub mod timing;
pub use timing::{Division, TempoMap, TimeConverter};
