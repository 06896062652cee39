//! Signal detection: cost model plus threshold gates.

pub mod detector;
pub mod fees;

pub use detector::SignalDetector;
pub use fees::{CostBreakdown, CostModel};
