//! Time-of-day aggregation.
//!
//! [`TimeBins`] partitions the day into equal-width bins and keeps a running
//! mean per bin. [`BinsHandle`] moves a [`TimeBins`] into a dedicated tokio
//! task so that several producers can feed the same day.

pub mod handle;
pub mod time_bins;
pub mod utility;

pub use handle::{BinsHandle, HandleError};
pub use time_bins::{BinsError, BinsSnapshot, DAY_HOURS, DAY_MINUTES, MAX_BINS, TimeBins};
