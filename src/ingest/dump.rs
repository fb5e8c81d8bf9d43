//! Reading the raw-arrays dump the external file parser produces.

use std::{path::Path, sync::Arc};

use log::{debug, warn};
use marlu::c64;
use ndarray::Array2;
use rayon::prelude::*;
use serde::Deserialize;

use super::{
    build_context, parse_timestamp, BatchInputType, BatchRead, FrameError, IngestError,
    Positions, TelescopeConfig,
};
use crate::{
    baseline::BaselineTable, decimate, decode, history::Frame, ArrayContext, GainSet,
};

/// The parser's dump shape: one flat visibility block covering every
/// timestamp, row-major by timestamp then baseline slot, with the baseline
/// slot order stated explicitly when the file records it.
#[derive(Deserialize, Debug)]
struct DumpFile {
    timestamp: Vec<String>,
    vis: ComplexValues,
    #[serde(default)]
    baselines: Option<IndexPairs>,
    #[serde(default)]
    gains: Option<Vec<f64>>,
    #[serde(default)]
    phases: Option<Vec<f64>>,
    antenna_positions: Positions,
    #[serde(default)]
    config: TelescopeConfig,
}

/// Complex arrays arrive interleaved, as [re, im] pairs, or as {re, im}
/// objects, depending on which parser build produced the dump.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum ComplexValues {
    Interleaved(Vec<f64>),
    Pairs(Vec<[f64; 2]>),
    Records(Vec<ReIm>),
}

#[derive(Deserialize, Debug, Clone, Copy)]
struct ReIm {
    re: f64,
    im: f64,
}

impl ComplexValues {
    fn normalize(self) -> Result<Vec<c64>, IngestError> {
        match self {
            ComplexValues::Interleaved(values) => {
                if values.len() % 2 != 0 {
                    return Err(IngestError::OddInterleavedLength {
                        what: "visibility",
                        len: values.len(),
                    });
                }
                Ok(values
                    .chunks_exact(2)
                    .map(|c| c64::new(c[0], c[1]))
                    .collect())
            }
            ComplexValues::Pairs(pairs) => {
                Ok(pairs.into_iter().map(|[re, im]| c64::new(re, im)).collect())
            }
            ComplexValues::Records(records) => {
                Ok(records.into_iter().map(|r| c64::new(r.re, r.im)).collect())
            }
        }
    }
}

/// Baseline lists arrive interleaved or as [i, j] pairs.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum IndexPairs {
    Interleaved(Vec<usize>),
    Pairs(Vec<[usize; 2]>),
}

impl IndexPairs {
    fn normalize(self) -> Result<Vec<(usize, usize)>, IngestError> {
        match self {
            IndexPairs::Interleaved(values) => {
                if values.len() % 2 != 0 {
                    return Err(IngestError::OddInterleavedLength {
                        what: "baseline",
                        len: values.len(),
                    });
                }
                Ok(values.chunks_exact(2).map(|c| (c[0], c[1])).collect())
            }
            IndexPairs::Pairs(pairs) => Ok(pairs.into_iter().map(|[i, j]| (i, j)).collect()),
        }
    }
}

#[derive(Debug)]
pub struct DumpReader {
    context: ArrayContext,

    /// The slot order for every row of `vis`: the file's own baseline list
    /// when it has one, the canonical enumeration otherwise.
    table: Arc<BaselineTable>,

    /// Raw timestamps, one per row of `vis`. Kept unparsed so one bad value
    /// skips one frame instead of failing the file.
    timestamps: Vec<String>,

    /// timestamp x baseline-slot.
    vis: Array2<c64>,
}

impl DumpReader {
    pub(crate) fn from_value(
        value: serde_json::Value,
        path: &Path,
    ) -> Result<DumpReader, IngestError> {
        let dump: DumpFile = serde_json::from_value(value).map_err(|err| IngestError::Json {
            path: path.to_path_buf(),
            err,
        })?;

        let positions = dump.antenna_positions.normalize()?;
        let gains = match (dump.gains, dump.phases) {
            (Some(gain), Some(phase_offset)) => Some(GainSet { gain, phase_offset }),
            (None, None) => None,
            (gain, phase_offset) => {
                return Err(IngestError::GainCount {
                    gains: gain.map(|g| g.len()).unwrap_or(0),
                    phases: phase_offset.map(|p| p.len()).unwrap_or(0),
                    antennas: positions.len(),
                })
            }
        };
        let context = build_context(&dump.config, positions, gains)?;

        let table = match dump.baselines {
            Some(list) => Arc::new(BaselineTable::from_pairs(
                list.normalize()?,
                context.num_antennas,
            )?),
            None => {
                debug!("No baseline list in the dump; assuming the canonical slot order");
                BaselineTable::cached(context.num_antennas)
            }
        };

        let flat = dump.vis.normalize()?;
        let num_timestamps = dump.timestamp.len();
        let expected = num_timestamps * table.len();
        if flat.len() != expected {
            return Err(IngestError::VisibilityLength {
                got: flat.len(),
                expected,
                num_timestamps,
                num_baselines: table.len(),
            });
        }
        let vis = Array2::from_shape_vec((num_timestamps, table.len()), flat)
            .expect("length verified above");

        debug!("Telescope:            {}", context.name);
        debug!("Number of antennas:   {}", context.num_antennas);
        debug!("Number of baselines:  {}", table.len());
        debug!("Number of timestamps: {num_timestamps}");
        debug!("Calibration present:  {}", context.gains.is_some());

        Ok(DumpReader {
            context,
            table,
            timestamps: dump.timestamp,
            vis,
        })
    }
}

impl BatchRead for DumpReader {
    fn array_context(&self) -> &ArrayContext {
        &self.context
    }

    fn input_type(&self) -> BatchInputType {
        BatchInputType::ParsedDump
    }

    fn read_frames(&self, stride: usize) -> (Vec<Frame>, usize) {
        // Rows are independent, so decode them in parallel; collect keeps
        // file order.
        let results: Vec<(usize, Result<Frame, FrameError>)> = self
            .timestamps
            .par_iter()
            .enumerate()
            .filter(|(index, _)| decimate::keep(*index, stride))
            .map(|(index, raw)| (index, self.decode_row(index, raw)))
            .collect();

        let mut frames = Vec::with_capacity(results.len());
        let mut skipped = 0;
        for (index, result) in results {
            match result {
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

impl DumpReader {
    fn decode_row(&self, index: usize, raw_timestamp: &str) -> Result<Frame, FrameError> {
        let timestamp = parse_timestamp(raw_timestamp)?;
        let row = self.vis.row(index);
        let flat = row
            .as_slice()
            .expect("rows of a C-order array are contiguous");
        let data = decode::decode_frame(&self.table, flat)?;
        Ok(Frame {
            timestamp,
            data,
            satellites: vec![],
        })
    }
}
