//! Core data values shared across the engine

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::timeframe::Timeframe;

/// A single OHLCV bar.
///
/// `timestamp` is the UTC bucket start in epoch milliseconds. Bars are
/// immutable once produced; a valid bar satisfies `high ≥ max(open, close)`,
/// `low ≤ min(open, close)` and `volume ≥ 0` (enforced at the provider
/// boundary, see [`RawBar::normalize`]).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

/// Provider-shaped bar accepting both verbose and shorthand field names.
///
/// Some feeds send `{"timestamp": ..., "open": ...}`, others the compact
/// `{"t": ..., "o": ...}` form. Both collapse to the canonical [`Bar`]
/// here, at the system boundary, so the rest of the engine sees a single
/// shape.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RawBar {
    #[serde(alias = "t")]
    pub timestamp: i64,
    #[serde(alias = "o")]
    pub open: f64,
    #[serde(alias = "h")]
    pub high: f64,
    #[serde(alias = "l")]
    pub low: f64,
    #[serde(alias = "c")]
    pub close: f64,
    #[serde(alias = "v")]
    pub volume: f64,
}

impl RawBar {
    /// Collapse to a canonical [`Bar`], rejecting non-finite prices,
    /// negative volume and OHLC violations. This is the single validation
    /// boundary; downstream components assume bars passed it.
    pub fn normalize(self) -> Option<Bar> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite()) {
            return None;
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return None;
        }
        if self.high < self.open.max(self.close) || self.low > self.open.min(self.close) {
            return None;
        }
        Some(Bar::new(
            self.timestamp,
            self.open,
            self.high,
            self.low,
            self.close,
            self.volume,
        ))
    }
}

/// Swing extremum kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SwingKind {
    High,
    Low,
}

impl fmt::Display for SwingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwingKind::High => f.write_str("HIGH"),
            SwingKind::Low => f.write_str("LOW"),
        }
    }
}

/// A pending or confirmed local extremum.
///
/// A confirmed point is frozen: no later bar changes its `price` or
/// `time`, and it only ever leaves the confirmed history through
/// oldest-first `keep_recent` eviction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwingPoint {
    pub id: String,
    pub timeframe: Timeframe,
    pub kind: SwingKind,
    pub price: f64,
    /// Timestamp of the pivot bar, epoch milliseconds UTC.
    pub time: i64,
    pub left: usize,
    pub right: usize,
    pub confirm: usize,
    pub confirmed: bool,
    /// Ordinal of the pivot bar within the processed stream.
    pub source_bar_index: u64,
}

impl SwingPoint {
    /// Deterministic id: the first 16 hex characters of a SHA-256 digest
    /// over `"{timeframe}:{pivot_time}:{kind}"`. Identical input streams
    /// reproduce identical ids across runs and process restarts.
    pub fn derive_id(timeframe: Timeframe, time: i64, kind: SwingKind) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("{}:{}:{}", timeframe.label(), time, kind).as_bytes());
        let digest = hasher.finalize();
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        format!("{:016x}", u64::from_be_bytes(prefix))
    }
}

/// Price zone relative to the midpoint of a swing range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Zone {
    Discount,
    Equilibrium,
    Premium,
}

/// Classified equilibrium level for a `{low, high}` swing range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquilibriumLevel {
    pub equilibrium: f64,
    pub zone: Zone,
    /// Signed distance from equilibrium as a fraction of the range.
    /// Not clamped to [-1, 1]; price may sit outside the range.
    pub distance_percent: f64,
    pub distance_points: f64,
}
