use approx::assert_abs_diff_eq;
use hifitime::Epoch;
use marlu::ENH;
use serde_json::json;
use vec1::vec1;

use super::*;
use crate::{history::Frame, ArrayContext, GainSet, SatellitePosition, VisibilityRecord};

fn test_context(gains: Option<GainSet>) -> ArrayContext {
    ArrayContext {
        name: String::from("TART test"),
        num_antennas: 3,
        antenna_positions: vec1![
            ENH { e: 0.0, n: 0.0, h: 0.0 },
            ENH { e: 1.5, n: 0.0, h: 0.0 },
            ENH { e: 0.0, n: 1.5, h: 0.1 },
        ],
        array_position: None,
        frequency_hz: Some(1.57542e9),
        gains,
    }
}

fn test_frame() -> Frame {
    Frame {
        timestamp: Epoch::from_unix_seconds(1_700_000_000.5),
        data: vec![
            VisibilityRecord { i: 0, j: 1, re: 1.0, im: 0.0 },
            VisibilityRecord { i: 0, j: 2, re: 0.0, im: 1.0 },
            VisibilityRecord { i: 1, j: 2, re: -1.0, im: 0.0 },
        ],
        satellites: vec![SatellitePosition {
            name: String::from("GPS BIIR-2 (PRN 13)"),
            az: 112.5,
            el: 44.0,
            jy: 1.5e6,
            r: 2.2e7,
        }],
    }
}

#[test]
fn test_payload_shape() {
    let payload = render_payload(
        &test_context(None),
        &[test_frame()],
        &PayloadOptions::default(),
    )
    .unwrap();
    let value = serde_json::to_value(&payload).unwrap();

    assert_eq!(value["info"]["name"], json!("TART test"));
    assert_eq!(value["info"]["num_antenna"], json!(3));
    // No array position was supplied, so no location key is emitted.
    assert!(value["info"].get("location").is_none());
    assert_eq!(value["ant_pos"][1], json!([1.5, 0.0, 0.0]));

    // Without source gains the emitted calibration is the identity.
    assert_eq!(value["gains"]["gain"], json!([1.0, 1.0, 1.0]));
    assert_eq!(value["gains"]["phase_offset"], json!([0.0, 0.0, 0.0]));

    // Each data entry is a [vis-block, satellites] pair.
    let entry = &value["data"][0];
    assert_eq!(entry[0]["data"][0], json!({"i": 0, "j": 1, "re": 1.0, "im": 0.0}));
    assert_eq!(entry[0]["timestamp"], json!("2023-11-14T22:13:20.500000Z"));
    assert_eq!(entry[1][0]["name"], json!("GPS BIIR-2 (PRN 13)"));
}

#[test]
fn test_payload_passes_source_gains_through() {
    let gains = GainSet {
        gain: vec![1.0, 2.0, 3.0],
        phase_offset: vec![0.0, 0.1, 0.2],
    };
    let payload = render_payload(
        &test_context(Some(gains.clone())),
        &[test_frame()],
        &PayloadOptions::default(),
    )
    .unwrap();

    // Uncalibrated output: records untouched, gains forwarded for the
    // renderer to apply.
    assert_eq!(payload.gains, gains);
    assert_eq!(payload.data[0].0.data[0].re, 1.0);
}

#[test]
fn test_payload_calibrate_bakes_gains_in() {
    let gains = GainSet {
        gain: vec![2.0, 3.0, 1.0],
        phase_offset: vec![0.0, 0.0, 0.0],
    };
    let payload = render_payload(
        &test_context(Some(gains)),
        &[test_frame()],
        &PayloadOptions {
            calibrate: true,
            antennas: None,
        },
    )
    .unwrap();

    // Pair (0, 1) scaled by g0 * g1 = 6; emitted gain set is the identity.
    assert_abs_diff_eq!(payload.data[0].0.data[0].re, 6.0, epsilon = 1e-12);
    assert_eq!(payload.gains, GainSet::unit(3));
}

#[test]
fn test_payload_antenna_selection() {
    let payload = render_payload(
        &test_context(None),
        &[test_frame()],
        &PayloadOptions {
            calibrate: false,
            antennas: Some(vec![0, 2]),
        },
    )
    .unwrap();

    let records = &payload.data[0].0.data;
    assert_eq!(records.len(), 1);
    assert_eq!((records[0].i, records[0].j), (0, 2));
}

#[test]
fn test_epoch_to_rfc3339() {
    assert_eq!(
        epoch_to_rfc3339(Epoch::from_unix_seconds(0.0)),
        "1970-01-01T00:00:00.000000Z"
    );
    assert_eq!(
        epoch_to_rfc3339(Epoch::from_unix_seconds(1_700_000_000.000001)),
        "2023-11-14T22:13:20.000001Z"
    );
}
