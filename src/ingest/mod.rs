//! Normalization boundary between external parsers and the pipeline.
//!
//! Everything upstream of this module is duck-typed JSON whose arrays come in
//! several shapes depending on which parser produced them; everything
//! downstream only ever sees the canonical types. Timestamps are validated
//! here too, so the merger never has to reason about unparsable dates.

pub mod api;
pub mod dump;
mod error;


use std::{fs, path::Path};

use chrono::DateTime;
use hifitime::Epoch;
use marlu::{LatLngHeight, ENH};
use serde::Deserialize;

pub use error::{FrameError, IngestError};

use crate::{history::Frame, ArrayContext};

/// All read-supported input shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchInputType {
    /// Arrays lifted out of a telescope data file by the external parser:
    /// one flat visibility block covering every timestamp.
    ParsedDump,
    /// A snapshot of the live telescope API: per-timestamp record lists that
    /// already carry antenna pairs, plus satellite source lists.
    ApiSnapshot,
}

/// A fully normalized source file, ready to hand out decoded frames.
pub trait BatchRead: Sync + Send + std::fmt::Debug {
    fn array_context(&self) -> &ArrayContext;

    fn input_type(&self) -> BatchInputType;

    /// Decode the source's frames in file order, thinned to every
    /// `stride`-th frame of the file's own timestamp list. Frames that fail
    /// to decode are logged, skipped and counted; the second value is the
    /// skip count.
    fn read_frames(&self, stride: usize) -> (Vec<Frame>, usize);
}

/// Open a source file, figure out which shape it is, and normalize it.
pub fn read_batch(path: &Path) -> Result<Box<dyn BatchRead>, IngestError> {
    let contents = fs::read_to_string(path).map_err(|err| IngestError::Io {
        path: path.to_path_buf(),
        err,
    })?;
    let value: serde_json::Value =
        serde_json::from_str(&contents).map_err(|err| IngestError::Json {
            path: path.to_path_buf(),
            err,
        })?;

    match detect(&value) {
        Some(BatchInputType::ParsedDump) => Ok(Box::new(dump::DumpReader::from_value(value, path)?)),
        Some(BatchInputType::ApiSnapshot) => Ok(Box::new(api::ApiReader::from_value(value, path)?)),
        None => Err(IngestError::UnknownShape {
            path: path.to_path_buf(),
        }),
    }
}

fn detect(value: &serde_json::Value) -> Option<BatchInputType> {
    let obj = value.as_object()?;
    if obj.contains_key("vis") && obj.contains_key("timestamp") {
        Some(BatchInputType::ParsedDump)
    } else if obj.contains_key("data") && obj.contains_key("ant_pos") {
        Some(BatchInputType::ApiSnapshot)
    } else {
        None
    }
}

/// RFC 3339 in, `Epoch` out. Anything unparsable is rejected here rather
/// than being allowed to poison timestamp comparisons downstream.
pub(crate) fn parse_timestamp(value: &str) -> Result<Epoch, FrameError> {
    let parsed =
        DateTime::parse_from_rfc3339(value).map_err(|err| FrameError::MalformedTimestamp {
            value: value.to_string(),
            err,
        })?;
    Ok(Epoch::from_unix_seconds(
        parsed.timestamp_micros() as f64 / 1e6,
    ))
}

/// Telescope metadata as the sources report it: the dump config object, or
/// the API info route. Field coverage varies per deployment, so everything
/// is optional and position may be flat or nested.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct TelescopeConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "operating_frequency")]
    pub frequency: Option<f64>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub alt: Option<f64>,
    #[serde(default)]
    pub location: Option<ConfigLocation>,
    #[serde(default)]
    pub num_antenna: Option<usize>,
}

#[derive(Deserialize, Debug, Clone, Copy)]
pub struct ConfigLocation {
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
}

impl TelescopeConfig {
    pub fn array_position(&self) -> Option<LatLngHeight> {
        let (lat, lon, alt) = match (self.location, self.lat, self.lon) {
            (Some(loc), ..) => (loc.lat, loc.lon, loc.alt),
            (None, Some(lat), Some(lon)) => (lat, lon, self.alt.unwrap_or(0.0)),
            _ => return None,
        };
        Some(LatLngHeight {
            longitude_rad: lon.to_radians(),
            latitude_rad: lat.to_radians(),
            height_metres: alt,
        })
    }
}

/// Resolve a source's metadata into an [`ArrayContext`], enforcing the
/// antenna-count consistency every downstream index depends on.
pub(crate) fn build_context(
    config: &TelescopeConfig,
    positions: Vec<ENH>,
    gains: Option<crate::GainSet>,
) -> Result<ArrayContext, IngestError> {
    let num_antennas = config.num_antenna.unwrap_or(positions.len());
    if positions.len() != num_antennas {
        return Err(IngestError::AntennaCountMismatch {
            got: positions.len(),
            expected: num_antennas,
        });
    }
    let antenna_positions =
        vec1::Vec1::try_from_vec(positions).map_err(|_| IngestError::NoAntennas)?;

    if let Some(g) = &gains {
        if g.gain.len() != num_antennas || g.phase_offset.len() != num_antennas {
            return Err(IngestError::GainCount {
                gains: g.gain.len(),
                phases: g.phase_offset.len(),
                antennas: num_antennas,
            });
        }
    }

    Ok(ArrayContext {
        name: config
            .name
            .clone()
            .unwrap_or_else(|| String::from("unnamed array")),
        num_antennas,
        antenna_positions,
        array_position: config.array_position(),
        frequency_hz: config.frequency,
        gains,
    })
}

/// Antenna positions in any of the shapes the parsers emit: [x, y, z]
/// triples, one flat interleaved list, or {x, y, z} objects.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub(crate) enum Positions {
    Triples(Vec<[f64; 3]>),
    Flat(Vec<f64>),
    Objects(Vec<XyzPosition>),
}

#[derive(Deserialize, Debug, Clone, Copy)]
pub(crate) struct XyzPosition {
    x: f64,
    y: f64,
    z: f64,
}

impl Positions {
    pub(crate) fn normalize(self) -> Result<Vec<ENH>, IngestError> {
        let triples: Vec<[f64; 3]> = match self {
            Positions::Triples(t) => t,
            Positions::Flat(values) => {
                if values.len() % 3 != 0 {
                    return Err(IngestError::RaggedPositions { len: values.len() });
                }
                values.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect()
            }
            Positions::Objects(objects) => {
                objects.into_iter().map(|p| [p.x, p.y, p.z]).collect()
            }
        };
        Ok(triples
            .into_iter()
            .map(|[e, n, h]| ENH { e, n, h })
            .collect())
    }
}
