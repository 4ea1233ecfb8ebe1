//! Listener registration and fan-out.
//!
//! Listeners are called synchronously, in registration order. Every method has
//! an empty default so a listener only implements what it consumes.

use std::cell::RefCell;
use std::rc::Rc;

use crate::event::{Note, ParsedEvent, TimedEvent};
use crate::message::RawMessage;

#[allow(unused_variables)]
pub trait ParserListener {
    fn before_parsing_starts(&mut self) {}
    fn after_parsing_finished(&mut self) {}
    /// Fires before any event `message` produces.
    fn before_message(&mut self, tick: u64, message: &RawMessage) {}

    fn on_track_changed(&mut self, channel: u8) {}
    fn on_track_beat_time_requested(&mut self, beat: f64) {}
    fn on_tempo_changed(&mut self, bpm: f64) {}
    /// `key` is the signed sharps (+) / flats (-) count, `scale` 0 for major, 1 for minor.
    fn on_key_signature_parsed(&mut self, key: i8, scale: u8) {}
    /// `power_of_two` is the denominator's exponent: 2 means a quarter note.
    fn on_time_signature_parsed(&mut self, numerator: u8, power_of_two: u8) {}
    fn on_lyric_parsed(&mut self, lyric: &str) {}
    fn on_marker_parsed(&mut self, marker: &str) {}
    fn on_controller_event_parsed(&mut self, controller: u8, value: u8) {}
    fn on_instrument_parsed(&mut self, instrument: u8) {}
    fn on_pitch_wheel_parsed(&mut self, lsb: u8, msb: u8) {}
    fn on_channel_pressure_parsed(&mut self, pressure: u8) {}
    fn on_polyphonic_pressure_parsed(&mut self, key: u8, pressure: u8) {}
    fn on_system_exclusive_parsed(&mut self, data: &[u8]) {}
    fn on_note_parsed(&mut self, note: &Note) {}
    fn on_rest_parsed(&mut self, duration: f64) {}

    /// The message was decoded; fires after the message's own events.
    fn on_handled_message(&mut self, message: &RawMessage) {}
    /// The message's status or meta sub-type is not one the parser decodes.
    fn on_unhandled_message(&mut self, message: &RawMessage) {}
}

/// Handle returned by registration, used to remove the listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

#[derive(Default)]
pub struct Listeners {
    entries: Vec<(ObserverId, Box<dyn ParserListener>)>,
    next_id: u64,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, listener: Box<dyn ParserListener>) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    pub fn remove(&mut self, id: ObserverId) -> Option<Box<dyn ParserListener>> {
        let index = self.entries.iter().position(|(entry, _)| *entry == id)?;
        Some(self.entries.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Call `f` on every listener in registration order.
    pub fn notify(&mut self, mut f: impl FnMut(&mut dyn ParserListener)) {
        for (_, listener) in self.entries.iter_mut() {
            f(listener.as_mut());
        }
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("len", &self.entries.len())
            .finish()
    }
}

#[derive(Debug, Default)]
struct LogInner {
    events: Vec<TimedEvent>,
    tick: u64,
    handled: usize,
    passes: usize,
}

/// Listener that records every event as a [`ParsedEvent`].
///
/// Clones share one log, so a clone can be registered with the parser while
/// the original is kept to read the results.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    inner: Rc<RefCell<LogInner>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ParsedEvent> {
        let inner = self.inner.borrow();
        inner.events.iter().map(|timed| timed.event.clone()).collect()
    }

    pub fn timed_events(&self) -> Vec<TimedEvent> {
        self.inner.borrow().events.clone()
    }

    /// Drain the recorded events.
    pub fn take(&self) -> Vec<TimedEvent> {
        std::mem::take(&mut self.inner.borrow_mut().events)
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().events.is_empty()
    }

    /// Number of messages classified as handled.
    pub fn handled_count(&self) -> usize {
        self.inner.borrow().handled
    }

    pub fn unhandled_count(&self) -> usize {
        self.inner
            .borrow()
            .events
            .iter()
            .filter(|timed| matches!(timed.event, ParsedEvent::Unhandled(_)))
            .count()
    }

    /// Number of completed parse passes.
    pub fn passes(&self) -> usize {
        self.inner.borrow().passes
    }

    fn push(&self, event: ParsedEvent) {
        let mut inner = self.inner.borrow_mut();
        let tick = inner.tick;
        inner.events.push(TimedEvent { tick, event });
    }
}

impl ParserListener for EventLog {
    fn after_parsing_finished(&mut self) {
        self.inner.borrow_mut().passes += 1;
    }

    fn before_message(&mut self, tick: u64, _message: &RawMessage) {
        self.inner.borrow_mut().tick = tick;
    }

    fn on_track_changed(&mut self, channel: u8) {
        self.push(ParsedEvent::TrackChanged(channel));
    }

    fn on_track_beat_time_requested(&mut self, beat: f64) {
        self.push(ParsedEvent::TrackBeatTimeRequested(beat));
    }

    fn on_tempo_changed(&mut self, bpm: f64) {
        self.push(ParsedEvent::TempoChanged(bpm));
    }

    fn on_key_signature_parsed(&mut self, key: i8, scale: u8) {
        self.push(ParsedEvent::KeySignature { key, scale });
    }

    fn on_time_signature_parsed(&mut self, numerator: u8, power_of_two: u8) {
        self.push(ParsedEvent::TimeSignature {
            numerator,
            power_of_two,
        });
    }

    fn on_lyric_parsed(&mut self, lyric: &str) {
        self.push(ParsedEvent::Lyric(lyric.to_string()));
    }

    fn on_marker_parsed(&mut self, marker: &str) {
        self.push(ParsedEvent::Marker(marker.to_string()));
    }

    fn on_controller_event_parsed(&mut self, controller: u8, value: u8) {
        self.push(ParsedEvent::Controller { controller, value });
    }

    fn on_instrument_parsed(&mut self, instrument: u8) {
        self.push(ParsedEvent::Instrument(instrument));
    }

    fn on_pitch_wheel_parsed(&mut self, lsb: u8, msb: u8) {
        self.push(ParsedEvent::PitchWheel { lsb, msb });
    }

    fn on_channel_pressure_parsed(&mut self, pressure: u8) {
        self.push(ParsedEvent::ChannelPressure(pressure));
    }

    fn on_polyphonic_pressure_parsed(&mut self, key: u8, pressure: u8) {
        self.push(ParsedEvent::PolyphonicPressure { key, pressure });
    }

    fn on_system_exclusive_parsed(&mut self, data: &[u8]) {
        self.push(ParsedEvent::SystemExclusive(data.to_vec()));
    }

    fn on_note_parsed(&mut self, note: &Note) {
        self.push(ParsedEvent::Note(*note));
    }

    fn on_rest_parsed(&mut self, duration: f64) {
        self.push(ParsedEvent::Rest(duration));
    }

    fn on_handled_message(&mut self, _message: &RawMessage) {
        self.inner.borrow_mut().handled += 1;
    }

    fn on_unhandled_message(&mut self, message: &RawMessage) {
        self.push(ParsedEvent::Unhandled(message.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tagger {
        tag: &'static str,
        calls: Rc<RefCell<Vec<&'static str>>>,
    }

    impl ParserListener for Tagger {
        fn on_tempo_changed(&mut self, _bpm: f64) {
            self.calls.borrow_mut().push(self.tag);
        }
    }

    #[test]
    fn test_notify_in_registration_order() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut listeners = Listeners::new();
        for tag in ["a", "b", "c"] {
            listeners.add(Box::new(Tagger {
                tag,
                calls: calls.clone(),
            }));
        }

        listeners.notify(|l| l.on_tempo_changed(100.0));
        assert_eq!(*calls.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_remove_listener() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut listeners = Listeners::new();
        let a = listeners.add(Box::new(Tagger {
            tag: "a",
            calls: calls.clone(),
        }));
        listeners.add(Box::new(Tagger {
            tag: "b",
            calls: calls.clone(),
        }));

        assert!(listeners.remove(a).is_some());
        assert!(listeners.remove(a).is_none());
        assert_eq!(listeners.len(), 1);

        listeners.notify(|l| l.on_tempo_changed(100.0));
        assert_eq!(*calls.borrow(), vec!["b"]);
    }

    #[test]
    fn test_event_log_clones_share_storage() {
        let log = EventLog::new();
        let mut registered = log.clone();
        registered.before_message(96, &RawMessage::note_off(0, 60, 0));
        registered.on_rest_parsed(0.5);
        registered.on_handled_message(&RawMessage::sysex(&[1, 2]));
        registered.before_message(192, &RawMessage::new(0xF8, vec![]));
        registered.on_unhandled_message(&RawMessage::new(0xF8, vec![]));

        assert_eq!(log.len(), 2);
        assert_eq!(log.handled_count(), 1);
        assert_eq!(log.unhandled_count(), 1);
        let events = log.take();
        assert_eq!(
            events[0],
            TimedEvent {
                tick: 96,
                event: ParsedEvent::Rest(0.5)
            }
        );
        assert_eq!(events[1].tick, 192);
        assert!(log.is_empty());
    }
}
