//! Fixed-width partition of the day and per-bin means.

use serde::Serialize;
use thiserror::Error;

use crate::bins::utility::mean;

/// Minutes in a day.
pub const DAY_MINUTES: f64 = 24.0 * 60.0;

/// Hours in a day. Valid time-of-day values lie in `[0, DAY_HOURS)`.
pub const DAY_HOURS: f64 = 24.0;

/// Upper bound on the number of bins: one per second of the day.
pub const MAX_BINS: usize = 86_400;

/// Precondition failures when building or feeding a [`TimeBins`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BinsError {
    /// Bin width is not a finite number in `(0, 1440]` minutes, or is so
    /// narrow that the day would need more than [`MAX_BINS`] bins.
    #[error("invalid bin width {0} minutes: expected a value in [1/60, 1440]")]
    InvalidArgument(f64),

    /// Time of day is not a finite number in `[0, 24)` hours.
    #[error("time of day {0} is outside [0, 24) hours")]
    OutOfRange(f64),
}

#[derive(Debug, Clone)]
struct Bin {
    midpoint: f64,
    samples: Vec<f64>,
}

impl Bin {
    fn new(midpoint: f64) -> Self {
        Self {
            midpoint,
            samples: Vec::new(),
        }
    }

    fn mean(&self) -> f64 {
        mean(&self.samples)
    }
}

/// Point-in-time copy of the derived values of a [`TimeBins`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinsSnapshot {
    pub bin_minutes: f64,
    pub midpoints: Vec<f64>,
    pub means: Vec<f64>,
    pub counts: Vec<usize>,
}

/// Partition of the 24-hour day into equal-width bins.
///
/// The number of bins is `floor(1440 / bin_minutes)` and bin `i` has its
/// midpoint at `i * width + width / 2` hours. When the width does not divide
/// the day evenly, the remainder `[count * width, 24)` belongs to the last bin,
/// so every time of day in `[0, 24)` maps to exactly one bin.
///
/// Count, width and midpoints are fixed at construction; only the samples
/// held by each bin change afterwards.
#[derive(Debug, Clone)]
pub struct TimeBins {
    bin_minutes: f64,
    bin_width: f64,
    bins: Vec<Bin>,
}

impl TimeBins {
    /// Builds an empty partition with bins `bin_minutes` wide.
    ///
    /// # Errors
    ///
    /// Returns [`BinsError::InvalidArgument`] unless `0 < bin_minutes <= 1440`
    /// and the resulting bin count is at most [`MAX_BINS`].
    pub fn new(bin_minutes: f64) -> Result<Self, BinsError> {
        if !bin_minutes.is_finite() || bin_minutes <= 0.0 || bin_minutes > DAY_MINUTES {
            return Err(BinsError::InvalidArgument(bin_minutes));
        }

        let count = (DAY_MINUTES / bin_minutes).floor();
        if !count.is_finite() || count > MAX_BINS as f64 {
            return Err(BinsError::InvalidArgument(bin_minutes));
        }
        let count = count as usize;
        let bin_width = bin_minutes / 60.0;
        let half_width = bin_width / 2.0;

        let bins = (0..count)
            .map(|i| Bin::new(i as f64 * bin_width + half_width))
            .collect();

        Ok(Self {
            bin_minutes,
            bin_width,
            bins,
        })
    }

    /// Returns the index of the bin that `fractional_hour` falls into.
    ///
    /// # Errors
    ///
    /// Returns [`BinsError::OutOfRange`] for values outside `[0, 24)`,
    /// including exactly `24.0` and NaN.
    pub fn index_of(&self, fractional_hour: f64) -> Result<usize, BinsError> {
        if !(0.0..DAY_HOURS).contains(&fractional_hour) {
            return Err(BinsError::OutOfRange(fractional_hour));
        }

        let index = (fractional_hour / self.bin_width).floor() as usize;
        Ok(index.min(self.bins.len() - 1))
    }

    /// Appends `value` to the bin for `fractional_hour` and returns that bin's index.
    ///
    /// # Errors
    ///
    /// Returns [`BinsError::OutOfRange`] if `fractional_hour` is outside `[0, 24)`.
    /// No bin is modified in that case.
    pub fn add_value(&mut self, fractional_hour: f64, value: f64) -> Result<usize, BinsError> {
        let index = self.index_of(fractional_hour)?;
        self.bins[index].samples.push(value);
        Ok(index)
    }

    /// Bin midpoints in fractional hours, ascending.
    pub fn midpoints(&self) -> Vec<f64> {
        self.bins.iter().map(|b| b.midpoint).collect()
    }

    /// Mean of each bin's samples in bin order; `0.0` for bins without samples.
    pub fn means(&self) -> Vec<f64> {
        self.bins.iter().map(Bin::mean).collect()
    }

    /// Number of samples held by each bin.
    pub fn counts(&self) -> Vec<usize> {
        self.bins.iter().map(|b| b.samples.len()).collect()
    }

    pub fn total_samples(&self) -> usize {
        self.bins.iter().map(|b| b.samples.len()).sum()
    }

    /// Iterates over `(midpoint, mean)` pairs in bin order.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.bins.iter().map(|b| (b.midpoint, b.mean()))
    }

    pub fn snapshot(&self) -> BinsSnapshot {
        BinsSnapshot {
            bin_minutes: self.bin_minutes,
            midpoints: self.midpoints(),
            means: self.means(),
            counts: self.counts(),
        }
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    /// Always `false`: a valid width yields at least one bin.
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn bin_minutes(&self) -> f64 {
        self.bin_minutes
    }

    /// Bin width in hours, as used for index computation.
    pub fn bin_width_hours(&self) -> f64 {
        self.bin_width
    }
}
