//! The canonical mapping between flat visibility-array slots and antenna
//! pairs.


use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use lazy_static::lazy_static;
use thiserror::Error;

lazy_static! {
    /// Tables derived from an antenna count alone never change, so they're
    /// shared per count.
    static ref DERIVED_TABLES: Mutex<HashMap<usize, Arc<BaselineTable>>> =
        Mutex::new(HashMap::new());
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BaselineError {
    #[error("Baseline slot {slot} is out of range for a table of {len} baselines")]
    SlotOutOfRange { slot: usize, len: usize },

    #[error("Baseline pair ({i}, {j}) references an antenna outside 0..{num_antennas}")]
    AntennaOutOfRange {
        i: usize,
        j: usize,
        num_antennas: usize,
    },

    #[error("Baseline pair ({i}, {j}) correlates an antenna with itself")]
    AutoCorrelation { i: usize, j: usize },

    #[error("{got} baseline pairs were supplied, but {num_antennas} antennas have {expected} cross-correlations")]
    WrongPairCount {
        got: usize,
        expected: usize,
        num_antennas: usize,
    },

    #[error("Baseline pair ({i}, {j}) appears more than once")]
    DuplicatePair { i: usize, j: usize },
}

/// An ordered list of antenna pairs. Slot `k` of a flat visibility array
/// belongs to pair `k` of this list; every decode in the crate goes through
/// the same table, so the slot-to-pair correspondence cannot drift between
/// call sites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaselineTable {
    pairs: Vec<(usize, usize)>,
    /// Pair-to-slot lookups, keyed with the smaller antenna index first.
    /// Correlation is symmetric, so (i, j) and (j, i) are the same baseline.
    slots: HashMap<(usize, usize), usize>,
}

impl BaselineTable {
    /// Enumerate the cross-correlations of `num_antennas` antennas in the
    /// canonical order: lower antenna index ascending, then higher index
    /// ascending, i.e. (0,1), (0,2), ..., (0,N-1), (1,2), ...
    pub fn new(num_antennas: usize) -> BaselineTable {
        let num_baselines = (num_antennas * num_antennas.saturating_sub(1)) / 2;
        let mut pairs = Vec::with_capacity(num_baselines);
        for i in 0..num_antennas {
            for j in (0..num_antennas).skip(i + 1) {
                pairs.push((i, j));
            }
        }
        let slots = pairs
            .iter()
            .enumerate()
            .map(|(slot, &pair)| (pair, slot))
            .collect();

        BaselineTable { pairs, slots }
    }

    /// A shared table for `num_antennas` antennas in the canonical order.
    pub fn cached(num_antennas: usize) -> Arc<BaselineTable> {
        let mut tables = DERIVED_TABLES
            .lock()
            .expect("no panics while the table cache is held");
        Arc::clone(
            tables
                .entry(num_antennas)
                .or_insert_with(|| Arc::new(BaselineTable::new(num_antennas))),
        )
    }

    /// Adopt the slot order of a source that states its baseline list
    /// explicitly. The supplied order wins over the canonical enumeration,
    /// whatever it is; it only has to be a complete, non-repeating set of
    /// cross-correlations.
    pub fn from_pairs(
        pairs: Vec<(usize, usize)>,
        num_antennas: usize,
    ) -> Result<BaselineTable, BaselineError> {
        let expected = (num_antennas * num_antennas.saturating_sub(1)) / 2;
        if pairs.len() != expected {
            return Err(BaselineError::WrongPairCount {
                got: pairs.len(),
                expected,
                num_antennas,
            });
        }

        let mut slots = HashMap::with_capacity(pairs.len());
        for (slot, &(i, j)) in pairs.iter().enumerate() {
            if i >= num_antennas || j >= num_antennas {
                return Err(BaselineError::AntennaOutOfRange { i, j, num_antennas });
            }
            if i == j {
                return Err(BaselineError::AutoCorrelation { i, j });
            }
            if slots.insert(ordered(i, j), slot).is_some() {
                return Err(BaselineError::DuplicatePair { i, j });
            }
        }

        Ok(BaselineTable { pairs, slots })
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> &[(usize, usize)] {
        &self.pairs
    }

    /// The antenna pair behind flat-array slot `slot`.
    pub fn lookup(&self, slot: usize) -> Result<(usize, usize), BaselineError> {
        self.pairs
            .get(slot)
            .copied()
            .ok_or(BaselineError::SlotOutOfRange {
                slot,
                len: self.pairs.len(),
            })
    }

    /// The flat-array slot of the pair (i, j), in either orientation. Absent
    /// pairs are `None`; they must never be conflated with slot 0.
    pub fn find(&self, i: usize, j: usize) -> Option<usize> {
        self.slots.get(&ordered(i, j)).copied()
    }
}

fn ordered(i: usize, j: usize) -> (usize, usize) {
    if i <= j {
        (i, j)
    } else {
        (j, i)
    }
}
