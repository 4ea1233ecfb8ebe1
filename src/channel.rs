//! Per-channel note cache and beat-time cursors.

use std::collections::BTreeMap;

use crate::message::CHANNEL_COUNT;

/// A note-on waiting for its note-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingNote {
    pub start_tick: u64,
    pub attack_velocity: u8,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelState {
    pending: BTreeMap<u8, PendingNote>,
    /// Last beat position the channel was known to be at.
    pub current_beat_time: f64,
    /// Beat position where the most recently closed note ended.
    pub expected_beat_time: f64,
}

impl ChannelState {
    pub fn is_pending(&self, note: u8) -> bool {
        self.pending.contains_key(&note)
    }

    pub fn pending(&self, note: u8) -> Option<&PendingNote> {
        self.pending.get(&note)
    }

    /// Open `note` unless it is already pending. Returns `false` when the
    /// existing pending note was kept.
    pub fn open(&mut self, note: u8, pending: PendingNote) -> bool {
        if self.pending.contains_key(&note) {
            return false;
        }
        self.pending.insert(note, pending);
        true
    }

    pub fn close(&mut self, note: u8) -> Option<PendingNote> {
        self.pending.remove(&note)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Note numbers still waiting for a note-off, in ascending order.
    pub fn pending_notes(&self) -> impl Iterator<Item = (u8, &PendingNote)> + '_ {
        self.pending.iter().map(|(note, pending)| (*note, pending))
    }
}

/// One [`ChannelState`] per MIDI channel.
#[derive(Debug, Clone, Default)]
pub struct ChannelStates {
    channels: [ChannelState; CHANNEL_COUNT],
}

impl ChannelStates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, channel: u8) -> &ChannelState {
        &self.channels[channel as usize & 0x0F]
    }

    pub fn get_mut(&mut self, channel: u8) -> &mut ChannelState {
        &mut self.channels[channel as usize & 0x0F]
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &ChannelState)> + '_ {
        self.channels
            .iter()
            .enumerate()
            .map(|(channel, state)| (channel as u8, state))
    }
}
