// Bounded per-voice history of vocabulary indices.
//
// Oldest entries are dropped first once capacity is reached. Entries are
// stored oldest-to-newest, which is also the order `recent` returns them in
// and the order the sampler expects for its context slice.

use crate::note::VoiceRole;
use crate::vocab::START;
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceHistory {
    entries: VecDeque<usize>,
    capacity: usize,
}

impl VoiceHistory {
    /// A history holding only the START token.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut entries = VecDeque::with_capacity(capacity);
        entries.push_back(START);
        VoiceHistory { entries, capacity }
    }

    pub fn push(&mut self, index: usize) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(index);
    }

    pub fn last(&self) -> Option<usize> {
        self.entries.back().copied()
    }

    /// Up to `n` most recent entries, oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = usize> + '_ {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).copied()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
        self.entries.push_back(START);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn to_vec(&self) -> Vec<usize> {
        self.entries.iter().copied().collect()
    }
}

/// One history per role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryBank {
    voices: [VoiceHistory; 4],
}

impl HistoryBank {
    pub fn new(capacity: usize) -> Self {
        HistoryBank {
            voices: VoiceRole::ALL.map(|_| VoiceHistory::new(capacity)),
        }
    }

    pub fn get(&self, role: VoiceRole) -> &VoiceHistory {
        &self.voices[role.index()]
    }

    pub fn get_mut(&mut self, role: VoiceRole) -> &mut VoiceHistory {
        &mut self.voices[role.index()]
    }

    pub fn reset(&mut self) {
        for history in &mut self.voices {
            history.reset();
        }
    }
}
