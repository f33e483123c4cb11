//! Bounded FIFO log of volume spikes

use std::collections::VecDeque;

use super::types::VolumeSpikeRecord;

/// Maximum spikes retained
pub const MAX_SPIKES: usize = 1000;

/// Append-only spike log that evicts the oldest entry once full
#[derive(Debug, Clone)]
pub struct SpikeLog {
    records: VecDeque<VolumeSpikeRecord>,
    capacity: usize,
}

impl SpikeLog {
    pub fn new() -> Self {
        Self::with_capacity(MAX_SPIKES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(MAX_SPIKES)),
            capacity,
        }
    }

    /// Append a spike, returning the evicted record if the log was full
    pub fn push(&mut self, record: VolumeSpikeRecord) -> Option<VolumeSpikeRecord> {
        self.records.push_back(record);
        if self.records.len() > self.capacity {
            self.records.pop_front()
        } else {
            None
        }
    }

    /// Most recent `n` spikes, oldest first
    pub fn recent(&self, n: usize) -> Vec<VolumeSpikeRecord> {
        let skip = self.records.len().saturating_sub(n);
        self.records.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VolumeSpikeRecord> {
        self.records.iter()
    }
}

impl Default for SpikeLog {
    fn default() -> Self {
        Self::new()
    }
}
