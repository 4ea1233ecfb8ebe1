use crate::event::{ParsedEvent, TimedEvent};
use crate::formatter::{span_start, EventFormatter};
use crate::timing::TempoMap;

/// One bracketed line per event, e.g. `[note 60 0.250b 00:00.500 on100 off64]`.
pub struct TextFormatter {
    tempo_map: TempoMap,
}

impl TextFormatter {
    pub fn new(tempo_map: TempoMap) -> Self {
        Self { tempo_map }
    }

    // wall-clock length of the span of `beats` ending at `end`
    fn format_duration(&self, end: u64, beats: f64) -> String {
        let start = span_start(&self.tempo_map, end, beats);
        let millis = self.tempo_map.millis_between(start, end);
        format!("{:.3}b {}", beats, format_wall_clock(millis))
    }
}

impl EventFormatter for TextFormatter {
    fn format(&self, timed: &TimedEvent) -> String {
        let tick = timed.tick;
        let body = match &timed.event {
            ParsedEvent::Note(note) => format!(
                "note {} {} on{} off{}",
                note.pitch,
                self.format_duration(tick, note.duration),
                note.attack_velocity,
                note.decay_velocity
            ),
            ParsedEvent::Rest(duration) => {
                format!("rest {}", self.format_duration(tick, *duration))
            }
            ParsedEvent::TempoChanged(bpm) => format!("tempo {:.2}", bpm),
            // channels are displayed 1-based
            ParsedEvent::TrackChanged(channel) => format!("track {}", channel + 1),
            ParsedEvent::TrackBeatTimeRequested(beat) => format!("seek {:.3}b", beat),
            ParsedEvent::Lyric(text) => format!("lyric {:?}", text),
            ParsedEvent::Marker(text) => format!("marker {:?}", text),
            ParsedEvent::KeySignature { key, scale } => format!(
                "key {:+} {}",
                key,
                if *scale == 0 { "major" } else { "minor" }
            ),
            ParsedEvent::TimeSignature {
                numerator,
                power_of_two,
            } => match 1u32.checked_shl(u32::from(*power_of_two)) {
                Some(denominator) => format!("time {}/{}", numerator, denominator),
                None => format!("time {}/2^{}", numerator, power_of_two),
            },
            ParsedEvent::Controller { controller, value } => {
                format!("CC{}.{}", controller, value)
            }
            ParsedEvent::Instrument(program) => format!("program {}", program),
            ParsedEvent::PitchWheel { lsb, msb } => {
                format!("bend {}", (u16::from(*msb) << 7) | u16::from(*lsb))
            }
            ParsedEvent::ChannelPressure(pressure) => format!("pressure {}", pressure),
            ParsedEvent::PolyphonicPressure { key, pressure } => {
                format!("pressure N{}.{}", key, pressure)
            }
            ParsedEvent::SystemExclusive(data) => format!("sysex {}", hex(data)),
            ParsedEvent::Unhandled(message) => {
                let status = format!("{:02X}", message.status());
                if message.data().is_empty() {
                    format!("unhandled {}", status)
                } else {
                    format!("unhandled {} {}", status, hex(message.data()))
                }
            }
        };
        format!("[{}]", body)
    }
}

fn hex(data: &[u8]) -> String {
    data.iter()
        .map(|byte| format!("{:02X}", byte))
        .collect::<Vec<_>>()
        .join(" ")
}

/// `mm:ss.mmm`
fn format_wall_clock(millis: f64) -> String {
    let millis = millis.max(0.0).round() as u64;
    format!(
        "{:02}:{:02}.{:03}",
        millis / 60_000,
        millis / 1000 % 60,
        millis % 1000
    )
}
