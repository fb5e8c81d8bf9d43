//! Reconstruction of per-timestamp visibility records from parsed TART
//! telescope data, and assembly of those records into a deduplicated,
//! chronologically ordered history suitable for imaging or plotting.

pub mod baseline;
pub mod decimate;
pub mod decode;
pub mod history;
pub mod ingest;
pub mod write;

use marlu::{c64, LatLngHeight, ENH};
use serde::{Deserialize, Serialize};
use vec1::Vec1;

/// Metadata describing the telescope array that produced a batch of
/// visibilities. Built once per input file by the ingest layer and shared by
/// everything downstream.
#[derive(Debug, Clone)]
pub struct ArrayContext {
    /// The telescope name, e.g. "TART Dunedin". Sources that don't report a
    /// name get a placeholder.
    pub name: String,

    /// The number of antennas in the array. All antenna indices on visibility
    /// records must be smaller than this.
    pub num_antennas: usize,

    /// The positions of all antennas \[metres\], in the local East/North/Up
    /// frame the array is surveyed in. The length of this list always equals
    /// `num_antennas`.
    pub antenna_positions: Vec1<ENH>,

    /// The Earth position of the array, if the source supplied one. Live API
    /// snapshots often omit it; parsed file dumps carry it in their config
    /// object.
    pub array_position: Option<LatLngHeight>,

    /// The operating frequency \[Hz\], if the source supplied one.
    pub frequency_hz: Option<f64>,

    /// Per-antenna gain and phase calibration, if the source supplied one.
    pub gains: Option<GainSet>,
}

/// Per-antenna calibration: a real gain and a phase offset \[radians\] for
/// each antenna, indexed by antenna number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GainSet {
    pub gain: Vec<f64>,
    pub phase_offset: Vec<f64>,
}

impl GainSet {
    /// A calibration that leaves visibilities untouched: unit gains, zero
    /// phases.
    pub fn unit(num_antennas: usize) -> GainSet {
        GainSet {
            gain: vec![1.0; num_antennas],
            phase_offset: vec![0.0; num_antennas],
        }
    }
}

/// A known satellite position at one instant, as reported alongside the
/// visibilities. Carried through the pipeline untouched and re-emitted in the
/// renderer payload for overlay plotting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SatellitePosition {
    pub name: String,
    /// Azimuth \[degrees\].
    pub az: f64,
    /// Elevation \[degrees\].
    pub el: f64,
    /// Flux \[Jy\], where the catalogue provides one.
    #[serde(default)]
    pub jy: f64,
    /// Range \[metres\].
    #[serde(default)]
    pub r: f64,
}

/// One baseline's correlation measurement, tagged with the antenna pair it
/// belongs to so consumers never need a baseline table to interpret it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisibilityRecord {
    pub i: usize,
    pub j: usize,
    pub re: f64,
    pub im: f64,
}

impl VisibilityRecord {
    pub fn new(i: usize, j: usize, vis: c64) -> VisibilityRecord {
        VisibilityRecord {
            i,
            j,
            re: vis.re,
            im: vis.im,
        }
    }

    pub fn vis(&self) -> c64 {
        c64::new(self.re, self.im)
    }

    pub fn amplitude(&self) -> f64 {
        self.vis().norm()
    }

    /// The visibility phase \[degrees\] in (-180, 180].
    pub fn phase_degrees(&self) -> f64 {
        self.im.atan2(self.re).to_degrees()
    }
}
