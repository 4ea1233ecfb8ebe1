//! Tick, beat and wall-clock conversions.
//!
//! Beats here follow the downstream music model's convention: one beat is
//! `4 × resolution` ticks, so a quarter note of `resolution` ticks lasts 0.25.

// microseconds per minute
pub const MICROS_PER_MINUTE: f64 = 60_000_000.0;
const MILLIS_PER_MINUTE: f64 = 60_000.0;

pub const DEFAULT_RESOLUTION: u16 = 128;
pub const DEFAULT_BPM: f64 = 120.0;

/// How the source expresses time in its delta values.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Division {
    /// Pulses (ticks) per quarter note.
    #[default]
    Ppq,
    /// SMPTE frames per second with sub-frame ticks. Not supported by the parser.
    Smpte {
        frames_per_second: f32,
        ticks_per_frame: u8,
    },
}

/// Convert a tempo payload (microseconds per quarter note) to BPM.
pub fn bpm_from_micros_per_quarter(micros_per_quarter: u32) -> f64 {
    MICROS_PER_MINUTE / micros_per_quarter as f64
}

/// Pure arithmetic over a resolution and tempo snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeConverter {
    resolution: f64,
    tempo_bpm: f64,
}

impl TimeConverter {
    pub fn new(resolution: u16, tempo_bpm: f64) -> Self {
        Self {
            resolution: resolution as f64,
            tempo_bpm,
        }
    }

    pub fn ticks_to_beats(&self, ticks: f64) -> f64 {
        ticks / self.resolution / 4.0
    }

    pub fn beats_to_ticks(&self, beats: f64) -> f64 {
        beats * 4.0 * self.resolution
    }

    pub fn ticks_to_millis(&self, ticks: f64) -> f64 {
        (ticks / self.resolution) * (1.0 / self.tempo_bpm) * MILLIS_PER_MINUTE
    }

    pub fn millis_to_ticks(&self, millis: f64) -> f64 {
        millis / MILLIS_PER_MINUTE * self.tempo_bpm * self.resolution
    }

    pub fn beats_to_millis(&self, beats: f64) -> f64 {
        self.ticks_to_millis(self.beats_to_ticks(beats))
    }
}

/// Tempo changes by tick, for wall-clock times across a whole song.
///
/// Tracks are parsed one after another, so tempo changes from a conductor track
/// arrive before the notes they apply to. The map orders them by tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TempoMap {
    resolution: u16,
    changes: Vec<(u64, f64)>,
}

impl TempoMap {
    pub fn new(resolution: u16, initial_bpm: f64) -> Self {
        Self {
            resolution,
            changes: vec![(0, initial_bpm)],
        }
    }

    /// Changes at the same tick apply in insertion order; the last one wins.
    pub fn insert(&mut self, tick: u64, bpm: f64) {
        let index = self.changes.partition_point(|(at, _)| *at <= tick);
        self.changes.insert(index, (tick, bpm));
    }

    pub fn resolution(&self) -> u16 {
        self.resolution
    }

    pub fn tempo_at(&self, tick: u64) -> f64 {
        let index = self.changes.partition_point(|(at, _)| *at <= tick);
        self.changes[index.saturating_sub(1)].1
    }

    /// Converter over the tempo in force at `tick`.
    pub fn converter_at(&self, tick: u64) -> TimeConverter {
        TimeConverter::new(self.resolution, self.tempo_at(tick))
    }

    /// Wall-clock time from tick 0 to `tick`.
    pub fn ticks_to_millis(&self, tick: u64) -> f64 {
        let mut millis = 0.0;
        for (index, &(start, bpm)) in self.changes.iter().enumerate() {
            if start >= tick {
                break;
            }
            let end = self
                .changes
                .get(index + 1)
                .map_or(tick, |&(next, _)| next.min(tick));
            let converter = TimeConverter::new(self.resolution, bpm);
            millis += converter.ticks_to_millis((end - start) as f64);
        }
        millis
    }

    pub fn millis_between(&self, start: u64, end: u64) -> f64 {
        self.ticks_to_millis(end) - self.ticks_to_millis(start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_quarter_note_is_quarter_beat() {
        let conv = TimeConverter::new(240, 120.0);
        assert_relative_eq!(conv.ticks_to_beats(240.0), 0.25);
        assert_relative_eq!(conv.ticks_to_beats(960.0), 1.0);
    }

    #[test]
    fn test_ticks_to_millis() {
        // 120 BPM: one quarter note lasts 500ms
        let conv = TimeConverter::new(480, 120.0);
        assert_relative_eq!(conv.ticks_to_millis(480.0), 500.0);
        assert_relative_eq!(conv.millis_to_ticks(500.0), 480.0);
        assert_relative_eq!(conv.beats_to_millis(0.25), 500.0);
    }

    #[test]
    fn test_round_trips() {
        for &(resolution, tempo) in &[(96u16, 60.0), (128, 120.0), (480, 93.5), (960, 240.0)] {
            let conv = TimeConverter::new(resolution, tempo);
            for &beats in &[0.0, 0.0625, 0.25, 1.5, 37.125] {
                let back = conv.ticks_to_beats(conv.beats_to_ticks(beats));
                assert_relative_eq!(back, beats, epsilon = 1e-12);
            }
            for &ms in &[0.0, 1.0, 250.0, 12_345.6] {
                let back = conv.ticks_to_millis(conv.millis_to_ticks(ms));
                assert_relative_eq!(back, ms, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_bpm_from_tempo_payload() {
        assert_relative_eq!(bpm_from_micros_per_quarter(500_000), 120.0);
        assert_relative_eq!(bpm_from_micros_per_quarter(1_000_000), 60.0);
    }

    #[test]
    fn test_tempo_map_orders_changes_by_tick() {
        let mut map = TempoMap::new(480, 120.0);
        map.insert(960, 60.0);
        map.insert(0, 120.0);
        assert_relative_eq!(map.tempo_at(0), 120.0);
        assert_relative_eq!(map.tempo_at(959), 120.0);
        assert_relative_eq!(map.tempo_at(960), 60.0);

        // two quarters at 120 BPM, then one at 60 BPM
        assert_relative_eq!(map.ticks_to_millis(960), 1000.0);
        assert_relative_eq!(map.ticks_to_millis(1440), 2000.0);
        assert_relative_eq!(map.millis_between(480, 1440), 1500.0);
    }

    #[test]
    fn test_tempo_map_last_change_at_tick_wins() {
        let mut map = TempoMap::new(96, 120.0);
        map.insert(0, 60.0);
        assert_relative_eq!(map.tempo_at(0), 60.0);
        assert_relative_eq!(map.ticks_to_millis(96), 1000.0);
    }
}
