use approx::assert_abs_diff_eq;
use marlu::c64;

use super::*;
use crate::baseline::BaselineTable;

#[test]
fn test_decode_three_antennas() {
    let table = BaselineTable::new(3);
    let flat = [c64::new(1.0, 0.0), c64::new(0.0, 1.0), c64::new(-1.0, 0.0)];

    let records = decode_frame(&table, &flat).unwrap();
    assert_eq!(
        records,
        vec![
            VisibilityRecord { i: 0, j: 1, re: 1.0, im: 0.0 },
            VisibilityRecord { i: 0, j: 2, re: 0.0, im: 1.0 },
            VisibilityRecord { i: 1, j: 2, re: -1.0, im: 0.0 },
        ]
    );

    assert_abs_diff_eq!(records[0].amplitude(), 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(records[0].phase_degrees(), 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(records[1].amplitude(), 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(records[1].phase_degrees(), 90.0, epsilon = 1e-12);
    assert_abs_diff_eq!(records[2].phase_degrees(), 180.0, epsilon = 1e-12);
}

#[test]
fn test_decode_round_trip() {
    // Encode known records into a flat array with the table's order, decode,
    // and expect the original tuples back exactly.
    let table = BaselineTable::new(5);
    let originals: Vec<VisibilityRecord> = table
        .pairs()
        .iter()
        .enumerate()
        .map(|(slot, &(i, j))| VisibilityRecord {
            i,
            j,
            re: slot as f64 * 0.25,
            im: -(slot as f64) * 1.5,
        })
        .collect();
    let flat: Vec<c64> = originals.iter().map(|r| r.vis()).collect();

    let decoded = decode_frame(&table, &flat).unwrap();
    assert_eq!(decoded, originals);
}

#[test]
fn test_decode_length_mismatch() {
    let table = BaselineTable::new(3);
    let flat = [c64::new(1.0, 0.0); 2];
    assert_eq!(
        decode_frame(&table, &flat),
        Err(DecodeError::LengthMismatch { got: 2, expected: 3 })
    );

    let flat = [c64::new(1.0, 0.0); 4];
    assert_eq!(
        decode_frame(&table, &flat),
        Err(DecodeError::LengthMismatch { got: 4, expected: 3 })
    );
}

#[test]
fn test_apply_gains() {
    use std::f64::consts::FRAC_PI_2;

    let records = vec![
        VisibilityRecord { i: 0, j: 1, re: 1.0, im: 0.0 },
        VisibilityRecord { i: 0, j: 2, re: 0.0, im: 1.0 },
    ];
    let gains = GainSet {
        gain: vec![2.0, 3.0, 1.0],
        phase_offset: vec![FRAC_PI_2, 0.0, 0.0],
    };

    let calibrated = apply_gains(&records, &gains).unwrap();

    // Pair (0, 1): 1 * 2 * 3 * exp(-i pi/2) = -6i.
    assert_eq!((calibrated[0].i, calibrated[0].j), (0, 1));
    assert_abs_diff_eq!(calibrated[0].re, 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(calibrated[0].im, -6.0, epsilon = 1e-12);

    // Pair (0, 2): i * 2 * 1 * exp(-i pi/2) = 2.
    assert_abs_diff_eq!(calibrated[1].re, 2.0, epsilon = 1e-12);
    assert_abs_diff_eq!(calibrated[1].im, 0.0, epsilon = 1e-12);
}

#[test]
fn test_apply_unit_gains_is_identity() {
    let records = vec![
        VisibilityRecord { i: 0, j: 1, re: 0.5, im: -0.25 },
        VisibilityRecord { i: 1, j: 2, re: -1.0, im: 2.0 },
    ];
    let calibrated = apply_gains(&records, &GainSet::unit(3)).unwrap();
    for (orig, cal) in records.iter().zip(&calibrated) {
        assert_abs_diff_eq!(orig.re, cal.re, epsilon = 1e-15);
        assert_abs_diff_eq!(orig.im, cal.im, epsilon = 1e-15);
    }
}

#[test]
fn test_apply_gains_missing_antenna() {
    let records = vec![VisibilityRecord { i: 0, j: 5, re: 1.0, im: 0.0 }];
    assert_eq!(
        apply_gains(&records, &GainSet::unit(3)),
        Err(DecodeError::MissingGain { i: 0, j: 5, antenna: 5, have: 3 })
    );
}
