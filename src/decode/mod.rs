//! Turning one timestamp's flat visibility array into antenna-pair-tagged
//! records, and applying per-antenna calibration to them.

#[cfg(test)]
mod tests;

use marlu::c64;
use thiserror::Error;

use crate::{baseline::BaselineTable, GainSet, VisibilityRecord};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Flat visibility array has {got} values, but the baseline table has {expected} slots")]
    LengthMismatch { got: usize, expected: usize },

    #[error("Visibility on pair ({i}, {j}) needs calibration for antenna {antenna}, but only {have} antennas are calibrated")]
    MissingGain {
        i: usize,
        j: usize,
        antenna: usize,
        have: usize,
    },
}

/// Tag each slot of a flat visibility array with its antenna pair. Slot `s`
/// of `flat` and pair `s` of `table` describe the same baseline; a length
/// mismatch means the two disagree about the array layout and the frame
/// cannot be trusted.
pub fn decode_frame(
    table: &BaselineTable,
    flat: &[c64],
) -> Result<Vec<VisibilityRecord>, DecodeError> {
    if flat.len() != table.len() {
        return Err(DecodeError::LengthMismatch {
            got: flat.len(),
            expected: table.len(),
        });
    }

    Ok(table
        .pairs()
        .iter()
        .zip(flat)
        .map(|(&(i, j), &vis)| VisibilityRecord::new(i, j, vis))
        .collect())
}

/// Apply per-antenna calibration to a frame's records: the visibility on
/// pair (i, j) becomes `v * g_i * g_j * exp(-i(p_i - p_j))`.
pub fn apply_gains(
    records: &[VisibilityRecord],
    gains: &GainSet,
) -> Result<Vec<VisibilityRecord>, DecodeError> {
    let have = gains.gain.len().min(gains.phase_offset.len());
    let mut calibrated = Vec::with_capacity(records.len());

    for record in records {
        let VisibilityRecord { i, j, .. } = *record;
        let antenna = i.max(j);
        if antenna >= have {
            return Err(DecodeError::MissingGain { i, j, antenna, have });
        }

        let theta = -c64::new(0.0, gains.phase_offset[i] - gains.phase_offset[j]);
        let vis = record.vis() * gains.gain[i] * gains.gain[j] * theta.exp();
        calibrated.push(VisibilityRecord::new(i, j, vis));
    }

    Ok(calibrated)
}
