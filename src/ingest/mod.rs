//! Input decoding: columnar JSON datasets, CSV signal exports, and
//! precomputed candle files.

pub mod candle_file;
pub mod columnar;
pub mod csv;
pub mod source;

use serde::Serialize;

/// Skip accounting for one decode pass. A malformed row never aborts
/// the batch; it is counted here instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub rows_seen: u64,
    pub rows_skipped: u64,
}

impl IngestStats {
    pub fn accepted(&self) -> u64 {
        self.rows_seen - self.rows_skipped
    }
}
