use hifitime::Epoch;

use super::*;
use crate::VisibilityRecord;

/// A frame at a millisecond timestamp, tagged so tests can tell frames
/// apart after merging.
fn frame_at_ms(ms: f64, tag: usize) -> Frame {
    Frame {
        timestamp: Epoch::from_unix_seconds(ms / 1e3),
        data: vec![VisibilityRecord {
            i: 0,
            j: tag,
            re: 1.0,
            im: 0.0,
        }],
        satellites: vec![],
    }
}

fn timestamps_ms(history: &History) -> Vec<f64> {
    history
        .frames()
        .iter()
        .map(|f| f.timestamp.to_unix_seconds() * 1e3)
        .collect()
}

#[test]
fn test_first_merge_populates() {
    let mut history = History::new();
    assert!(history.is_empty());

    let report = history.merge_batch(vec![frame_at_ms(1000.0, 1), frame_at_ms(2000.0, 2)]);
    assert_eq!(report, MergeReport { merged: 2, dropped: 0 });
    assert_eq!(history.len(), 2);
}

#[test]
fn test_near_duplicate_is_dropped_and_existing_wins() {
    let mut history = History::new();
    history.merge_batch(vec![frame_at_ms(1000.0, 1)]);

    // 1000.005 is within the 0.01 ms epsilon of 1000; 1005 is not.
    let report = history.merge_batch(vec![frame_at_ms(1000.005, 2), frame_at_ms(1005.0, 3)]);
    assert_eq!(report, MergeReport { merged: 1, dropped: 1 });

    let ts = timestamps_ms(&history);
    assert_eq!(ts.len(), 2);
    assert!((ts[0] - 1000.0).abs() < 1e-6);
    assert!((ts[1] - 1005.0).abs() < 1e-6);

    // The surviving frame at ~1000 ms is the originally merged one, not the
    // near-duplicate candidate.
    assert_eq!(history.frames()[0].data[0].j, 1);
}

#[test]
fn test_merge_is_idempotent() {
    let batch = vec![
        frame_at_ms(1000.0, 1),
        frame_at_ms(2000.0, 2),
        frame_at_ms(3000.0, 3),
    ];

    let mut history = History::new();
    let first = history.merge_batch(batch.clone());
    let after_one = history.frames().to_vec();

    let second = history.merge_batch(batch);
    assert_eq!(first, MergeReport { merged: 3, dropped: 0 });
    assert_eq!(second, MergeReport { merged: 0, dropped: 3 });
    assert_eq!(history.frames(), after_one.as_slice());
}

#[test]
fn test_duplicates_within_one_batch() {
    let mut history = History::new();
    let report = history.merge_batch(vec![
        frame_at_ms(1000.0, 1),
        frame_at_ms(1000.002, 2),
        frame_at_ms(1000.004, 3),
    ]);

    // The first candidate establishes the entry; the rest fall inside its
    // epsilon and are dropped.
    assert_eq!(report, MergeReport { merged: 1, dropped: 2 });
    assert_eq!(history.frames()[0].data[0].j, 1);
}

#[test]
fn test_chronological_after_out_of_order_merges() {
    let mut history = History::new();
    history.merge_batch(vec![frame_at_ms(5000.0, 1), frame_at_ms(1000.0, 2)]);
    history.merge_batch(vec![frame_at_ms(3000.0, 3)]);
    history.merge_batch(vec![frame_at_ms(4000.0, 4), frame_at_ms(2000.0, 5)]);

    let ts = timestamps_ms(&history);
    assert_eq!(ts.len(), 5);
    for pair in ts.windows(2) {
        assert!(pair[0] <= pair[1]);
    }
}

#[test]
fn test_reset() {
    let mut history = History::new();
    history.merge_batch(vec![frame_at_ms(1000.0, 1)]);
    assert!(!history.is_empty());

    history.reset();
    assert!(history.is_empty());

    // A previously dropped instant is admissible again after a reset.
    let report = history.merge_batch(vec![frame_at_ms(1000.0, 2)]);
    assert_eq!(report, MergeReport { merged: 1, dropped: 0 });
}

#[test]
fn test_select_antennas() {
    let frame = Frame {
        timestamp: Epoch::from_unix_seconds(1.0),
        data: vec![
            VisibilityRecord { i: 0, j: 1, re: 1.0, im: 0.0 },
            VisibilityRecord { i: 0, j: 2, re: 2.0, im: 0.0 },
            VisibilityRecord { i: 1, j: 2, re: 3.0, im: 0.0 },
        ],
        satellites: vec![],
    };

    let subset = frame.select_antennas(&[0, 2]);
    assert_eq!(subset.data.len(), 1);
    assert_eq!((subset.data[0].i, subset.data[0].j), (0, 2));
    assert_eq!(subset.timestamp, frame.timestamp);
}
