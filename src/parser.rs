//! The event-interpretation state machine.
//!
//! [`MidiParser`] classifies each raw message, matches note-ons with their
//! note-offs per channel, synthesizes rests for silent gaps and decodes the meta
//! and system-exclusive messages it understands. Results go to the registered
//! [`ParserListener`]s; every input message ends with exactly one handled or
//! unhandled notification.

use tracing::{debug, trace};

use crate::channel::{ChannelState, ChannelStates, PendingNote};
use crate::config::{DuplicateNotePolicy, ParserConfig};
use crate::context::ParserContext;
use crate::decode::{decode_key_signature, decode_tempo, decode_text, decode_time_signature};
use crate::error::Result;
use crate::event::Note;
use crate::listener::{Listeners, ObserverId, ParserListener};
use crate::message::{meta, ChannelVoice, MessageKind, RawMessage};
use crate::source::MidiSource;
use crate::timing::Division;

#[derive(Debug)]
pub struct MidiParser {
    config: ParserConfig,
    listeners: Listeners,
    /// Context every pass starts from, built from `config`.
    initial_context: ParserContext,
    context: ParserContext,
    channels: ChannelStates,
}

impl Default for MidiParser {
    fn default() -> Self {
        Self {
            config: ParserConfig::default(),
            listeners: Listeners::new(),
            initial_context: ParserContext::default(),
            context: ParserContext::default(),
            channels: ChannelStates::new(),
        }
    }
}

impl MidiParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails if the configured default resolution or tempo is degenerate.
    pub fn with_config(config: ParserConfig) -> Result<Self> {
        let context = ParserContext::new(
            Division::Ppq,
            config.default_resolution,
            config.default_tempo_bpm,
        )?;
        Ok(Self {
            config,
            listeners: Listeners::new(),
            initial_context: context.clone(),
            context,
            channels: ChannelStates::new(),
        })
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn add_listener(&mut self, listener: Box<dyn ParserListener>) -> ObserverId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&mut self, id: ObserverId) -> Option<Box<dyn ParserListener>> {
        self.listeners.remove(id)
    }

    pub fn context(&self) -> &ParserContext {
        &self.context
    }

    pub fn channel_state(&self, channel: u8) -> &ChannelState {
        self.channels.get(channel)
    }

    /// Run one complete pass over `source`: reset, every track in order, finish.
    pub fn parse(&mut self, source: &MidiSource) -> Result<()> {
        self.start_parser(source.division, source.resolution)?;
        for (index, track) in source.tracks.iter().enumerate() {
            trace!(track = index, messages = track.len(), "parsing track");
            for timed in track {
                self.parse_event(timed.tick, &timed.message)?;
            }
        }
        self.stop_parser();
        Ok(())
    }

    /// Reset all per-pass state and adopt the source's time base.
    pub fn start_parser(&mut self, division: Division, resolution: u16) -> Result<()> {
        self.reset();
        self.context = ParserContext::new(division, resolution, self.initial_context.tempo_bpm())?;
        debug!(
            "Parsing started: {} ticks per beat, {} BPM",
            resolution,
            self.context.tempo_bpm()
        );
        self.listeners.notify(|l| l.before_parsing_starts());
        Ok(())
    }

    pub fn stop_parser(&mut self) {
        for (channel, state) in self.channels.iter() {
            for (note, pending) in state.pending_notes() {
                debug!(
                    "Note {} on channel {} opened at tick {} was never closed",
                    note, channel, pending.start_tick
                );
            }
        }
        self.listeners.notify(|l| l.after_parsing_finished());
        debug!("Parsing finished");
    }

    /// Back to configured defaults: no active channel, empty note caches.
    pub fn reset(&mut self) {
        self.context = self.initial_context.clone();
        self.channels = ChannelStates::new();
    }

    /// Interpret one message at `tick`.
    pub fn parse_event(&mut self, tick: u64, message: &RawMessage) -> Result<()> {
        trace!(tick, status = message.status(), "dispatch");
        let kind = message.kind()?;
        self.listeners.notify(|l| l.before_message(tick, message));

        let handled = match kind {
            MessageKind::ChannelVoice { voice, channel } => {
                self.parse_channel_voice(tick, voice, channel, message)?;
                true
            }
            MessageKind::Meta { kind } => self.parse_meta(kind, message)?,
            MessageKind::SystemExclusive => {
                let data = message.payload();
                self.listeners.notify(|l| l.on_system_exclusive_parsed(data));
                true
            }
            MessageKind::Unknown => false,
        };

        if handled {
            self.listeners.notify(|l| l.on_handled_message(message));
        } else {
            trace!(status = message.status(), "unhandled message");
            self.listeners.notify(|l| l.on_unhandled_message(message));
        }
        Ok(())
    }

    fn parse_channel_voice(
        &mut self,
        tick: u64,
        voice: ChannelVoice,
        channel: u8,
        message: &RawMessage,
    ) -> Result<()> {
        let (data1, data2) = message.channel_data(voice)?;

        // A note-on's position is only known once it closes.
        if voice != ChannelVoice::NoteOn {
            self.check_channel(channel);
        }

        match voice {
            ChannelVoice::NoteOff => self.note_off(tick, channel, data1, data2),
            ChannelVoice::NoteOn => self.note_on(tick, channel, data1, data2),
            ChannelVoice::PolyphonicPressure => self
                .listeners
                .notify(|l| l.on_polyphonic_pressure_parsed(data1, data2)),
            ChannelVoice::ControlChange => self
                .listeners
                .notify(|l| l.on_controller_event_parsed(data1, data2)),
            ChannelVoice::ProgramChange => {
                self.listeners.notify(|l| l.on_instrument_parsed(data1))
            }
            ChannelVoice::ChannelPressure => self
                .listeners
                .notify(|l| l.on_channel_pressure_parsed(data1)),
            ChannelVoice::PitchWheel => self
                .listeners
                .notify(|l| l.on_pitch_wheel_parsed(data1, data2)),
        }
        Ok(())
    }

    /// Returns `false` for sub-types the parser does not decode.
    fn parse_meta(&mut self, kind: u8, message: &RawMessage) -> Result<bool> {
        match kind {
            meta::TEMPO => {
                let bpm = decode_tempo(message)?;
                self.context.set_tempo_bpm(bpm)?;
                debug!("Tempo change: {} BPM", bpm);
                self.listeners.notify(|l| l.on_tempo_changed(bpm));
            }
            meta::LYRIC => {
                let text = decode_text(message);
                self.listeners.notify(|l| l.on_lyric_parsed(&text));
            }
            meta::MARKER => {
                let text = decode_text(message);
                self.listeners.notify(|l| l.on_marker_parsed(&text));
            }
            meta::KEY_SIGNATURE => {
                let (key, scale) = decode_key_signature(message)?;
                self.listeners.notify(|l| l.on_key_signature_parsed(key, scale));
            }
            meta::TIME_SIGNATURE => {
                let (numerator, power_of_two) = decode_time_signature(message)?;
                self.listeners.notify(|l| l.on_time_signature_parsed(numerator, power_of_two));
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn note_on(&mut self, tick: u64, channel: u8, note: u8, velocity: u8) {
        if self.channels.get(channel).is_pending(note) {
            if velocity == 0 {
                self.note_off(tick, channel, note, velocity);
                return;
            }
            match self.config.duplicate_note_policy {
                DuplicateNotePolicy::KeepFirst => {
                    debug!(
                        "Discarding note-on {} on channel {} at tick {}: already sounding",
                        note, channel, tick
                    );
                    return;
                }
                DuplicateNotePolicy::Retrigger => self.note_off(tick, channel, note, 0),
            }
        }

        self.channels.get_mut(channel).open(
            note,
            PendingNote {
                start_tick: tick,
                attack_velocity: velocity,
            },
        );
    }

    /// Close `note` on `channel`; a note-off for a note that is not sounding is ignored.
    fn note_off(&mut self, tick: u64, channel: u8, note: u8, decay_velocity: u8) {
        let Some(pending) = self.channels.get_mut(channel).close(note) else {
            debug!(
                "Ignoring note-off {} on channel {} at tick {}: not sounding",
                note, channel, tick
            );
            return;
        };

        self.check_channel(channel);
        self.check_time(channel, pending.start_tick);

        let converter = self.context.converter();
        let duration_ticks = tick.saturating_sub(pending.start_tick);
        let duration = converter.ticks_to_beats(duration_ticks as f64);

        // same as current_beat_time + duration
        self.channels.get_mut(channel).expected_beat_time =
            converter.ticks_to_beats((pending.start_tick + duration_ticks) as f64);

        let note = Note {
            pitch: note,
            duration,
            attack_velocity: pending.attack_velocity,
            decay_velocity,
        };
        self.listeners.notify(|l| l.on_note_parsed(&note));
    }

    fn check_channel(&mut self, channel: u8) {
        if self.context.switch_channel(channel) {
            self.listeners.notify(|l| l.on_track_changed(channel));
        }
    }

    /// Fill the gap before `tick` with a rest, or ask the consumer to move back.
    fn check_time(&mut self, channel: u8, tick: u64) {
        let beat = self.context.converter().ticks_to_beats(tick as f64);
        let state = self.channels.get_mut(channel);
        let expected = state.expected_beat_time;
        state.current_beat_time = beat;

        if beat > expected {
            let gap = beat - expected;
            self.listeners.notify(|l| l.on_rest_parsed(gap));
        } else if beat < expected {
            self.listeners.notify(|l| l.on_track_beat_time_requested(beat));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ParsedEvent;
    use crate::listener::EventLog;
    use approx::assert_relative_eq;

    fn parser_with_log(resolution: u16) -> (MidiParser, EventLog) {
        let mut parser = MidiParser::new();
        let log = EventLog::new();
        parser.add_listener(Box::new(log.clone()));
        parser.start_parser(Division::Ppq, resolution).unwrap();
        (parser, log)
    }

    fn notes(log: &EventLog) -> Vec<Note> {
        log.events()
            .into_iter()
            .filter_map(|event| match event {
                ParsedEvent::Note(note) => Some(note),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_note_on_off_emits_note() {
        let (mut parser, log) = parser_with_log(240);
        parser.parse_event(0, &RawMessage::note_on(0, 60, 100)).unwrap();
        parser.parse_event(240, &RawMessage::note_off(0, 60, 64)).unwrap();

        assert_eq!(
            log.events(),
            vec![
                ParsedEvent::TrackChanged(0),
                ParsedEvent::Note(Note {
                    pitch: 60,
                    duration: 0.25,
                    attack_velocity: 100,
                    decay_velocity: 64,
                }),
            ]
        );
        assert_eq!(log.handled_count(), 2);
        assert_relative_eq!(parser.channel_state(0).expected_beat_time, 0.25);
    }

    #[test]
    fn test_zero_velocity_note_on_closes() {
        let (mut parser, log) = parser_with_log(240);
        parser.parse_event(0, &RawMessage::note_on(0, 60, 100)).unwrap();
        parser.parse_event(240, &RawMessage::note_on(0, 60, 0)).unwrap();

        assert_eq!(
            notes(&log),
            vec![Note {
                pitch: 60,
                duration: 0.25,
                attack_velocity: 100,
                decay_velocity: 0,
            }]
        );
        assert_eq!(parser.channel_state(0).pending_count(), 0);
    }

    #[test]
    fn test_unmatched_note_off_leaves_cursors() {
        let (mut parser, log) = parser_with_log(240);
        parser.parse_event(100, &RawMessage::note_off(2, 60, 0)).unwrap();

        assert!(notes(&log).is_empty());
        assert!(!log.events().iter().any(ParsedEvent::is_rest));
        let state = parser.channel_state(2);
        assert_eq!(state.current_beat_time, 0.0);
        assert_eq!(state.expected_beat_time, 0.0);
        assert_eq!(log.handled_count(), 1);
    }

    #[test]
    fn test_duplicate_note_on_keeps_first() {
        let (mut parser, log) = parser_with_log(100);
        parser.parse_event(0, &RawMessage::note_on(0, 60, 90)).unwrap();
        parser.parse_event(50, &RawMessage::note_on(0, 60, 30)).unwrap();
        parser.parse_event(100, &RawMessage::note_off(0, 60, 0)).unwrap();

        let notes = notes(&log);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].attack_velocity, 90);
        assert_relative_eq!(notes[0].duration, 0.25);
    }

    #[test]
    fn test_duplicate_note_on_retrigger() {
        let config = ParserConfig {
            duplicate_note_policy: DuplicateNotePolicy::Retrigger,
            ..ParserConfig::default()
        };
        let mut parser = MidiParser::with_config(config).unwrap();
        let log = EventLog::new();
        parser.add_listener(Box::new(log.clone()));
        parser.start_parser(Division::Ppq, 100).unwrap();

        parser.parse_event(0, &RawMessage::note_on(0, 60, 90)).unwrap();
        parser.parse_event(100, &RawMessage::note_on(0, 60, 30)).unwrap();
        parser.parse_event(300, &RawMessage::note_off(0, 60, 10)).unwrap();

        let notes = notes(&log);
        assert_eq!(notes.len(), 2);
        assert_eq!((notes[0].attack_velocity, notes[0].decay_velocity), (90, 0));
        assert_relative_eq!(notes[0].duration, 0.25);
        assert_eq!((notes[1].attack_velocity, notes[1].decay_velocity), (30, 10));
        assert_relative_eq!(notes[1].duration, 0.5);
        // back to back: no rest between them
        assert!(!log.events().iter().any(ParsedEvent::is_rest));
    }

    #[test]
    fn test_gap_emits_rest() {
        let (mut parser, log) = parser_with_log(100);
        parser.parse_event(0, &RawMessage::note_on(0, 60, 90)).unwrap();
        parser.parse_event(100, &RawMessage::note_off(0, 60, 0)).unwrap();
        parser.parse_event(300, &RawMessage::note_on(0, 62, 90)).unwrap();
        parser.parse_event(400, &RawMessage::note_off(0, 62, 0)).unwrap();

        let events = log.events();
        assert_eq!(events.len(), 4);
        assert_eq!(events[2], ParsedEvent::Rest(0.5));
        assert!(events[3].is_note());
    }

    #[test]
    fn test_leading_silence_emits_rest() {
        let (mut parser, log) = parser_with_log(100);
        parser.parse_event(200, &RawMessage::note_on(1, 60, 90)).unwrap();
        parser.parse_event(300, &RawMessage::note_off(1, 60, 0)).unwrap();

        assert_eq!(
            log.events()[..2],
            [ParsedEvent::TrackChanged(1), ParsedEvent::Rest(0.5)]
        );
    }

    #[test]
    fn test_overlap_requests_beat_time() {
        let (mut parser, log) = parser_with_log(100);
        parser.parse_event(0, &RawMessage::note_on(0, 60, 90)).unwrap();
        parser.parse_event(100, &RawMessage::note_on(0, 64, 90)).unwrap();
        parser.parse_event(200, &RawMessage::note_off(0, 60, 0)).unwrap();
        parser.parse_event(300, &RawMessage::note_off(0, 64, 0)).unwrap();

        let events = log.events();
        assert_eq!(
            events,
            vec![
                ParsedEvent::TrackChanged(0),
                ParsedEvent::Note(Note {
                    pitch: 60,
                    duration: 0.5,
                    attack_velocity: 90,
                    decay_velocity: 0,
                }),
                ParsedEvent::TrackBeatTimeRequested(0.25),
                ParsedEvent::Note(Note {
                    pitch: 64,
                    duration: 0.5,
                    attack_velocity: 90,
                    decay_velocity: 0,
                }),
            ]
        );
        assert_relative_eq!(parser.channel_state(0).current_beat_time, 0.25);
        assert_relative_eq!(parser.channel_state(0).expected_beat_time, 0.75);
    }

    #[test]
    fn test_track_changed_once_per_run() {
        let (mut parser, log) = parser_with_log(100);
        parser
            .parse_event(0, &RawMessage::channel(ChannelVoice::ControlChange, 3, 7, 100))
            .unwrap();
        parser
            .parse_event(0, &RawMessage::channel(ChannelVoice::ProgramChange, 3, 5, 0))
            .unwrap();
        parser
            .parse_event(0, &RawMessage::channel(ChannelVoice::ControlChange, 4, 7, 90))
            .unwrap();

        assert_eq!(
            log.events(),
            vec![
                ParsedEvent::TrackChanged(3),
                ParsedEvent::Controller {
                    controller: 7,
                    value: 100
                },
                ParsedEvent::Instrument(5),
                ParsedEvent::TrackChanged(4),
                ParsedEvent::Controller {
                    controller: 7,
                    value: 90
                },
            ]
        );
    }

    #[test]
    fn test_note_on_does_not_switch_channel() {
        let (mut parser, log) = parser_with_log(100);
        parser.parse_event(0, &RawMessage::note_on(5, 60, 90)).unwrap();
        assert!(log.is_empty());
        assert_eq!(parser.context().active_channel(), None);
    }

    #[test]
    fn test_tempo_updates_context() {
        let (mut parser, log) = parser_with_log(480);
        parser
            .parse_event(0, &RawMessage::meta(meta::TEMPO, &[0x0F, 0x42, 0x40]))
            .unwrap();
        assert_eq!(log.events(), vec![ParsedEvent::TempoChanged(60.0)]);
        assert_eq!(parser.context().tempo_bpm(), 60.0);
    }

    #[test]
    fn test_zero_tempo_is_rejected() {
        let (mut parser, _log) = parser_with_log(480);
        let result = parser.parse_event(0, &RawMessage::meta(meta::TEMPO, &[0, 0, 0]));
        assert!(matches!(result, Err(crate::Error::InvalidTempo(_))));
        assert_eq!(parser.context().tempo_bpm(), 120.0);
    }

    #[test]
    fn test_unhandled_meta_and_status() {
        let (mut parser, log) = parser_with_log(100);
        let track_name = RawMessage::meta(0x03, b"Piano");
        let clock = RawMessage::new(0xF8, vec![]);
        parser.parse_event(0, &track_name).unwrap();
        parser.parse_event(0, &clock).unwrap();

        assert_eq!(
            log.events(),
            vec![ParsedEvent::Unhandled(track_name), ParsedEvent::Unhandled(clock)]
        );
        assert_eq!(log.handled_count(), 0);
    }

    #[test]
    fn test_malformed_message_emits_nothing() {
        let (mut parser, log) = parser_with_log(100);
        let result = parser.parse_event(0, &RawMessage::new(0xB2, vec![7]));
        assert!(matches!(
            result,
            Err(crate::Error::MalformedMessage { status: 0xB2, .. })
        ));
        assert!(log.is_empty());
        assert_eq!(log.handled_count(), 0);
    }

    #[test]
    fn test_reset_restores_defaults() {
        let (mut parser, _log) = parser_with_log(960);
        parser
            .parse_event(0, &RawMessage::meta(meta::TEMPO, &[0x0F, 0x42, 0x40]))
            .unwrap();
        parser.parse_event(0, &RawMessage::note_on(0, 60, 90)).unwrap();

        parser.reset();
        assert_eq!(parser.context().resolution(), 128);
        assert_eq!(parser.context().tempo_bpm(), 120.0);
        assert_eq!(parser.channel_state(0).pending_count(), 0);
    }
}
