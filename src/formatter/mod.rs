use crate::event::{ParsedEvent, TimedEvent};
use crate::timing::TempoMap;

mod text_formatter;

pub use text_formatter::TextFormatter;

pub trait EventFormatter {
    fn format(&self, event: &TimedEvent) -> String;
}

/// Collect every reported tempo change, ordered by tick.
pub fn tempo_map(events: &[TimedEvent], resolution: u16, initial_bpm: f64) -> TempoMap {
    let mut map = TempoMap::new(resolution, initial_bpm);
    for timed in events {
        if let ParsedEvent::TempoChanged(bpm) = timed.event {
            map.insert(timed.tick, bpm);
        }
    }
    map
}

/// Move each rest to the tick where it ends.
///
/// A rest is reported right before the note that follows it, at that note's
/// off tick. The rest ends where the note starts.
pub fn place_rests(events: &mut [TimedEvent], tempo_map: &TempoMap) {
    for index in 1..events.len() {
        let (before, after) = events.split_at_mut(index);
        let (rest, next) = (&mut before[index - 1], &after[0]);
        if let (ParsedEvent::Rest(_), ParsedEvent::Note(note)) = (&rest.event, &next.event) {
            if rest.tick == next.tick {
                rest.tick = span_start(tempo_map, next.tick, note.duration);
            }
        }
    }
}

/// Tick where a span of `beats` ending at `end` starts.
pub(crate) fn span_start(tempo_map: &TempoMap, end: u64, beats: f64) -> u64 {
    let ticks = tempo_map.converter_at(end).beats_to_ticks(beats);
    end.saturating_sub(ticks.round() as u64)
}
