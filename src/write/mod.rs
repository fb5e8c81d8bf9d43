//! Building the synthesis payload: everything the external imaging library
//! needs to turn a stretch of history into an image.

#[cfg(test)]
mod tests;

use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
};

use chrono::{SecondsFormat, TimeZone, Utc};
use hifitime::Epoch;
use log::debug;
use serde::Serialize;
use thiserror::Error;

use crate::{
    decode, history::Frame, ArrayContext, GainSet, SatellitePosition, VisibilityRecord,
};

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("Couldn't write {path}: {err}")]
    Io {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },

    #[error("Couldn't serialize the payload: {err}")]
    Json {
        #[source]
        err: serde_json::Error,
    },

    #[error(transparent)]
    Calibration(#[from] crate::decode::DecodeError),
}

/// How the payload gets assembled.
#[derive(Debug, Clone, Default)]
pub struct PayloadOptions {
    /// Bake the context's gains into the emitted records and emit an
    /// identity gain set in their place, for consumers that can't calibrate
    /// themselves.
    pub calibrate: bool,

    /// Restrict records to baselines between these antennas.
    pub antennas: Option<Vec<usize>>,
}

/// The JSON body handed to the imaging library: telescope info, antenna
/// positions, a gain set, and one `[vis-block, satellites]` pair per frame.
#[derive(Serialize, Debug)]
pub struct Payload {
    info: PayloadInfo,
    ant_pos: Vec<[f64; 3]>,
    gains: GainSet,
    data: Vec<(PayloadVis, Vec<SatellitePosition>)>,
}

#[derive(Serialize, Debug)]
struct PayloadInfo {
    name: String,
    num_antenna: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    operating_frequency: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<PayloadLocation>,
}

#[derive(Serialize, Debug)]
struct PayloadLocation {
    lat: f64,
    lon: f64,
    alt: f64,
}

#[derive(Serialize, Debug)]
struct PayloadVis {
    data: Vec<VisibilityRecord>,
    timestamp: String,
}

pub fn render_payload(
    context: &ArrayContext,
    frames: &[Frame],
    options: &PayloadOptions,
) -> Result<Payload, WriteError> {
    let source_gains = context
        .gains
        .clone()
        .unwrap_or_else(|| GainSet::unit(context.num_antennas));

    let mut data = Vec::with_capacity(frames.len());
    for frame in frames {
        let selected;
        let frame = match &options.antennas {
            Some(antennas) => {
                selected = frame.select_antennas(antennas);
                &selected
            }
            None => frame,
        };

        let records = if options.calibrate {
            decode::apply_gains(&frame.data, &source_gains)?
        } else {
            frame.data.clone()
        };

        data.push((
            PayloadVis {
                data: records,
                timestamp: epoch_to_rfc3339(frame.timestamp),
            },
            frame.satellites.clone(),
        ));
    }

    // Calibrated records must not be calibrated again downstream.
    let gains = if options.calibrate {
        GainSet::unit(context.num_antennas)
    } else {
        source_gains
    };

    Ok(Payload {
        info: PayloadInfo {
            name: context.name.clone(),
            num_antenna: context.num_antennas,
            operating_frequency: context.frequency_hz,
            location: context.array_position.map(|pos| PayloadLocation {
                lat: pos.latitude_rad.to_degrees(),
                lon: pos.longitude_rad.to_degrees(),
                alt: pos.height_metres,
            }),
        },
        ant_pos: context
            .antenna_positions
            .iter()
            .map(|p| [p.e, p.n, p.h])
            .collect(),
        gains,
        data,
    })
}

pub fn write_payload<P: AsRef<Path>>(
    path: P,
    context: &ArrayContext,
    frames: &[Frame],
    options: &PayloadOptions,
) -> Result<(), WriteError> {
    let path = path.as_ref();
    let payload = render_payload(context, frames, options)?;

    debug!("Writing {} frames to {}", frames.len(), path.display());
    let file = File::create(path).map_err(|err| WriteError::Io {
        path: path.to_path_buf(),
        err,
    })?;
    serde_json::to_writer(BufWriter::new(file), &payload)
        .map_err(|err| WriteError::Json { err })?;
    Ok(())
}

/// RFC 3339 with microsecond precision, UTC.
fn epoch_to_rfc3339(epoch: Epoch) -> String {
    let micros = (epoch.to_unix_seconds() * 1e6).round() as i64;
    Utc.timestamp_opt(
        micros.div_euclid(1_000_000),
        (micros.rem_euclid(1_000_000) * 1000) as u32,
    )
    .single()
    .expect("UTC never has ambiguous local times")
    .to_rfc3339_opts(SecondsFormat::Micros, true)
}
