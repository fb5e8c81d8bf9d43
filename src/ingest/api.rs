//! Reading live-API snapshots: per-timestamp record lists that already carry
//! antenna pairs, plus the satellite sources visible at each instant.

use std::{path::Path, sync::Arc};

use log::{debug, warn};
use serde::Deserialize;

use super::{
    build_context, parse_timestamp, BatchInputType, BatchRead, FrameError, IngestError,
    Positions, TelescopeConfig,
};
use crate::{
    baseline::BaselineTable, decimate, decode::DecodeError, history::Frame, ArrayContext,
    GainSet, SatellitePosition, VisibilityRecord,
};

#[derive(Deserialize, Debug)]
struct ApiFile {
    #[serde(default)]
    info: Option<ApiInfo>,
    ant_pos: Positions,
    #[serde(default)]
    gains: Option<GainSet>,
    data: Vec<ApiEntry>,
}

/// The info route wraps its detail object one level deep; synthesized
/// payloads flatten it.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum ApiInfo {
    Nested { info: TelescopeConfig },
    Flat(TelescopeConfig),
}

impl ApiInfo {
    fn into_config(self) -> TelescopeConfig {
        match self {
            ApiInfo::Nested { info } => info,
            ApiInfo::Flat(config) => config,
        }
    }
}

/// One instant: either the API's object form, or the renderer-payload pair
/// form `[vis-block, satellites]`.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum ApiEntry {
    Object {
        data: ApiVisBlock,
        #[serde(default, alias = "satellites")]
        sources: Vec<SatellitePosition>,
    },
    Pair(ApiVisBlock, Vec<SatellitePosition>),
}

#[derive(Deserialize, Debug)]
struct ApiVisBlock {
    data: Vec<VisibilityRecord>,
    timestamp: String,
}

#[derive(Debug)]
pub struct ApiReader {
    context: ArrayContext,

    /// The slot order of the snapshot, adopted from its first frame.
    table: Arc<BaselineTable>,

    /// (raw timestamp, records, satellites) per instant, in file order.
    entries: Vec<(String, Vec<VisibilityRecord>, Vec<SatellitePosition>)>,
}

impl ApiReader {
    pub(crate) fn from_value(
        value: serde_json::Value,
        path: &Path,
    ) -> Result<ApiReader, IngestError> {
        let file: ApiFile = serde_json::from_value(value).map_err(|err| IngestError::Json {
            path: path.to_path_buf(),
            err,
        })?;

        let config = file.info.map(ApiInfo::into_config).unwrap_or_default();
        let positions = file.ant_pos.normalize()?;
        let context = build_context(&config, positions, file.gains)?;

        let entries: Vec<_> = file
            .data
            .into_iter()
            .map(|entry| match entry {
                ApiEntry::Object { data, sources } => (data.timestamp, data.data, sources),
                ApiEntry::Pair(data, satellites) => (data.timestamp, data.data, satellites),
            })
            .collect();

        // The first frame's pair sequence is the snapshot's encode-time slot
        // order. Every other frame must agree with it.
        let table = match entries.first() {
            Some((_, records, _)) => Arc::new(BaselineTable::from_pairs(
                records.iter().map(|r| (r.i, r.j)).collect(),
                context.num_antennas,
            )?),
            None => BaselineTable::cached(context.num_antennas),
        };

        debug!("Telescope:            {}", context.name);
        debug!("Number of antennas:   {}", context.num_antennas);
        debug!("Number of baselines:  {}", table.len());
        debug!("Number of snapshots:  {}", entries.len());

        Ok(ApiReader {
            context,
            table,
            entries,
        })
    }

    fn decode_entry(
        &self,
        entry: &(String, Vec<VisibilityRecord>, Vec<SatellitePosition>),
    ) -> Result<Frame, FrameError> {
        let (raw_timestamp, records, satellites) = entry;
        let timestamp = parse_timestamp(raw_timestamp)?;

        if records.len() != self.table.len() {
            return Err(DecodeError::LengthMismatch {
                got: records.len(),
                expected: self.table.len(),
            }
            .into());
        }
        for (slot, (record, &(expected_i, expected_j))) in
            records.iter().zip(self.table.pairs()).enumerate()
        {
            if (record.i, record.j) != (expected_i, expected_j) {
                return Err(FrameError::InconsistentPairs {
                    slot,
                    i: record.i,
                    j: record.j,
                    expected_i,
                    expected_j,
                });
            }
        }

        Ok(Frame {
            timestamp,
            data: records.clone(),
            satellites: satellites.clone(),
        })
    }
}

impl BatchRead for ApiReader {
    fn array_context(&self) -> &ArrayContext {
        &self.context
    }

    fn input_type(&self) -> BatchInputType {
        BatchInputType::ApiSnapshot
    }

    fn read_frames(&self, stride: usize) -> (Vec<Frame>, usize) {
        let mut frames = Vec::with_capacity(self.entries.len());
        let mut skipped = 0;
        for (index, entry) in self.entries.iter().enumerate() {
            if !decimate::keep(index, stride) {
                continue;
            }
            match self.decode_entry(entry) {
                Ok(frame) => frames.push(frame),
                Err(err) => {
                    warn!("Skipping frame {index}: {err}");
                    skipped += 1;
                }
            }
        }
        (frames, skipped)
    }
}
