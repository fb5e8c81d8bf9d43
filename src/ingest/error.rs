use std::path::PathBuf;

use thiserror::Error;

use crate::{baseline::BaselineError, decode::DecodeError};

/// Structural problems with a source file. These abort the whole file's
/// import; nothing from the file reaches the history.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Couldn't read {path}: {err}")]
    Io {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },

    #[error("Couldn't parse {path} as JSON: {err}")]
    Json {
        path: PathBuf,
        #[source]
        err: serde_json::Error,
    },

    #[error("{path} is neither a parsed-telescope-data dump nor an API snapshot")]
    UnknownShape { path: PathBuf },

    #[error("No antenna positions were supplied")]
    NoAntennas,

    #[error("{got} antenna positions were supplied, but the config names {expected} antennas")]
    AntennaCountMismatch { got: usize, expected: usize },

    #[error("Interleaved {what} array has odd length {len}")]
    OddInterleavedLength { what: &'static str, len: usize },

    #[error("Flat antenna position array has length {len}, which is not a multiple of 3")]
    RaggedPositions { len: usize },

    #[error("Visibility array has {got} values, but {num_timestamps} timestamps x {num_baselines} baselines needs {expected}")]
    VisibilityLength {
        got: usize,
        expected: usize,
        num_timestamps: usize,
        num_baselines: usize,
    },

    #[error("Calibration covers {gains} gains and {phases} phases, but the array has {antennas} antennas")]
    GainCount {
        gains: usize,
        phases: usize,
        antennas: usize,
    },

    #[error(transparent)]
    Baseline(#[from] BaselineError),
}

/// Problems with a single frame. Recoverable: the frame is skipped and
/// counted, and the rest of its batch continues.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Unparsable timestamp {value:?}: {err}")]
    MalformedTimestamp {
        value: String,
        #[source]
        err: chrono::ParseError,
    },

    #[error("Record {slot} is on pair ({i}, {j}), but the batch's baseline order has ({expected_i}, {expected_j}) there")]
    InconsistentPairs {
        slot: usize,
        i: usize,
        j: usize,
        expected_i: usize,
        expected_j: usize,
    },

    #[error(transparent)]
    Decode(#[from] DecodeError),
}
