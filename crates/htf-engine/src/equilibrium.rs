//! Discount / equilibrium / premium classification for a swing range
//!
//! Computes where a reference price sits relative to the midpoint of a
//! `{low, high}` range. Degenerate ranges are an expected, common case
//! and come back as `None`, never as an error or panic. All arithmetic
//! runs in `Decimal` and is rounded half-to-even at a configurable
//! precision, so identical inputs produce bit-identical results on any
//! platform.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::types::{EquilibriumLevel, Zone};

/// Classifier parameters.
///
/// Validated ranges: `threshold` ∈ [0, 1], `min_range_size` ≥ 0,
/// `precision` ∈ [0, 15].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquilibriumConfig {
    /// Half-width of the EQUILIBRIUM band, as a fraction of the range.
    pub threshold: f64,
    /// Ranges narrower than this are noise and classify as invalid.
    pub min_range_size: f64,
    /// Decimal places kept on every computed value.
    pub precision: u32,
}

impl EquilibriumConfig {
    pub fn new(threshold: f64, min_range_size: f64, precision: u32) -> EngineResult<Self> {
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(EngineError::InvalidConfig(format!(
                "equilibrium threshold must be within [0, 1], got {threshold}"
            )));
        }
        if !min_range_size.is_finite() || min_range_size < 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "min_range_size must be non-negative, got {min_range_size}"
            )));
        }
        if precision > 15 {
            return Err(EngineError::InvalidConfig(format!(
                "precision must be within [0, 15], got {precision}"
            )));
        }
        Ok(Self {
            threshold,
            min_range_size,
            precision,
        })
    }
}

impl Default for EquilibriumConfig {
    fn default() -> Self {
        Self {
            threshold: 0.05,
            min_range_size: 0.0,
            precision: 6,
        }
    }
}

/// Classify `current_price` within the `[low, high]` range.
///
/// Returns `None` for degenerate input: `low ≥ high`, any value
/// non-finite (or beyond decimal range), or a range narrower than
/// `min_range_size`. Otherwise:
///
/// - `equilibrium = low + (high - low) / 2`
/// - `distance_percent = (current - equilibrium) / (high - low)` —
///   unclamped, price may sit outside the range
/// - `distance_points = current - equilibrium`
/// - zone: EQUILIBRIUM when `|distance_percent| < threshold`, else
///   PREMIUM above, DISCOUNT below
pub fn classify(
    low: f64,
    high: f64,
    current_price: f64,
    config: &EquilibriumConfig,
) -> Option<EquilibriumLevel> {
    if !low.is_finite() || !high.is_finite() || !current_price.is_finite() {
        return None;
    }
    if low >= high {
        return None;
    }
    if (high - low) < config.min_range_size {
        return None;
    }

    let d_low = Decimal::from_f64(low)?;
    let d_high = Decimal::from_f64(high)?;
    let d_current = Decimal::from_f64(current_price)?;
    let d_threshold = Decimal::from_f64(config.threshold)?;

    let range = d_high - d_low;
    let equilibrium = (d_low + range / dec!(2)).round_dp(config.precision);
    let distance_points = (d_current - equilibrium).round_dp(config.precision);
    let distance_percent = ((d_current - equilibrium) / range).round_dp(config.precision);

    let zone = if distance_percent.abs() < d_threshold {
        Zone::Equilibrium
    } else if distance_percent > Decimal::ZERO {
        Zone::Premium
    } else {
        Zone::Discount
    };

    Some(EquilibriumLevel {
        equilibrium: equilibrium.to_f64()?,
        zone,
        distance_percent: distance_percent.to_f64()?,
        distance_points: distance_points.to_f64()?,
    })
}
