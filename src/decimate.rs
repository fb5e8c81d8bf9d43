//! "Load every Nth frame" thinning for bulk imports of historical files.
//!
//! Decimation is decided per source file, against that file's own 0-based
//! frame ordering, before anything is merged. Merged-history positions play
//! no part; two files decimated with the same stride always keep the same
//! local pattern regardless of what was imported before them.

/// Whether the frame at `index` within its source batch survives thinning
/// with the given stride. A stride of 1 keeps everything; a stride larger
/// than the batch keeps exactly the first frame.
///
/// e.g. For a batch of 25 frames and a stride of 10, the kept indices are
/// 0, 10 and 20.
pub fn keep(index: usize, stride: usize) -> bool {
    debug_assert!(stride >= 1, "stride 0 keeps nothing and divides by zero");
    index % stride == 0
}
