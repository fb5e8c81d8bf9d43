//! The chronological frame history: the one piece of mutable state in the
//! pipeline.

#[cfg(test)]
mod tests;

use hifitime::{Duration, Epoch};
use log::debug;

use crate::{SatellitePosition, VisibilityRecord};

/// Two frames closer together than this are the same instant; the one merged
/// first wins. The reference epsilon is 0.01 of a millisecond timestamp.
pub const DEDUP_EPSILON_MS: f64 = 0.01;

/// One complete snapshot of the array at an instant.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub timestamp: Epoch,
    /// One record per baseline, in the source's slot order. May be a subset
    /// when an antenna selection has been applied.
    pub data: Vec<VisibilityRecord>,
    /// Satellites above the horizon at this instant, for overlay plotting.
    pub satellites: Vec<SatellitePosition>,
}

impl Frame {
    /// A copy retaining only records whose antennas both lie in `antennas`.
    pub fn select_antennas(&self, antennas: &[usize]) -> Frame {
        Frame {
            timestamp: self.timestamp,
            data: self
                .data
                .iter()
                .filter(|r| antennas.contains(&r.i) && antennas.contains(&r.j))
                .copied()
                .collect(),
            satellites: self.satellites.clone(),
        }
    }
}

/// What a merge did with its incoming batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Frames appended to the history.
    pub merged: usize,
    /// Frames dropped as near-duplicates of an existing entry. Not an error;
    /// re-polling a live telescope hands back instants it served before.
    pub dropped: usize,
}

/// An append-only, deduplicated, chronologically sorted collection of frames.
///
/// All mutation goes through [`History::merge_batch`]; readers only ever see
/// `&[Frame]`, so nothing outside this module can perturb the ordering or
/// dedup invariants. Batches must be merged in decode-completion order:
/// when two near-duplicate candidates arrive in different batches, the
/// first-merged one is the one that survives.
#[derive(Debug, Clone, Default)]
pub struct History {
    frames: Vec<Frame>,
}

impl History {
    pub fn new() -> History {
        History::default()
    }

    /// Merge newly decoded frames into the history: candidates within
    /// [`DEDUP_EPSILON_MS`] of any retained timestamp are dropped (the
    /// existing entry wins), survivors are appended, and the result is
    /// stably re-sorted by timestamp.
    ///
    /// The duplicate scan is linear over the history per candidate; at the
    /// target scale (thousands of frames) that's cheaper than maintaining an
    /// index, and the drop decisions stay obviously identical to a scan.
    pub fn merge_batch(&mut self, incoming: Vec<Frame>) -> MergeReport {
        let epsilon = Duration::from_milliseconds(DEDUP_EPSILON_MS);
        let mut report = MergeReport::default();

        for frame in incoming {
            let duplicate_of = self
                .frames
                .iter()
                .find(|existing| (existing.timestamp - frame.timestamp).abs() < epsilon);
            match duplicate_of {
                Some(existing) => {
                    debug!(
                        "Dropping frame at {} as a duplicate of {}",
                        frame.timestamp, existing.timestamp
                    );
                    report.dropped += 1;
                }
                None => {
                    self.frames.push(frame);
                    report.merged += 1;
                }
            }
        }

        self.frames
            .sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        report
    }

    /// Read-only view of the frames, ascending by timestamp. The slice
    /// borrow keeps merges out until the reader is done; consumers that hold
    /// data across merges should clone what they need.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Discard everything. Session reset only; imports never shrink the
    /// history.
    pub fn reset(&mut self) {
        self.frames.clear();
    }
}
