//! Arena of swing detectors keyed by (symbol, timeframe)
//!
//! Each tracked pair owns its detector outright; nothing is shared
//! between keys, so independent pairs may be driven concurrently by the
//! host as long as access to any single key is serialized.

use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::debug;

use crate::aggregate::BarAggregator;
use crate::equilibrium::{classify, EquilibriumConfig};
use crate::error::EngineResult;
use crate::swing::{SwingConfig, SwingDetector};
use crate::timeframe::Timeframe;
use crate::types::{Bar, EquilibriumLevel, SwingKind, SwingPoint};

/// Composite key addressing one tracked detector.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructureKey {
    pub symbol: String,
    pub timeframe: Timeframe,
}

impl StructureKey {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
        }
    }
}

/// Owns one [`SwingDetector`] per (symbol, timeframe) pair and ties the
/// pipeline together: optional aggregation to a higher timeframe, per-bar
/// swing detection, and equilibrium classification of the resulting
/// range.
pub struct StructureTracker {
    detectors: HashMap<StructureKey, SwingDetector>,
    swing_configs: HashMap<Timeframe, SwingConfig>,
    equilibrium: EquilibriumConfig,
}

impl StructureTracker {
    pub fn new(equilibrium: EquilibriumConfig) -> Self {
        Self {
            detectors: HashMap::new(),
            swing_configs: HashMap::new(),
            equilibrium,
        }
    }

    /// Window parameters applied when a detector for `timeframe` is first
    /// created. Existing detectors keep the config they were built with.
    pub fn configure(&mut self, timeframe: Timeframe, config: SwingConfig) {
        self.swing_configs.insert(timeframe, config);
    }

    /// Begin a session for the pair, creating its detector on first use.
    pub fn start_session(&mut self, symbol: &str, timeframe: Timeframe, date: NaiveDate) {
        self.detector_mut(symbol, timeframe).start_session(date);
    }

    pub fn end_session(&mut self, symbol: &str, timeframe: Timeframe) {
        if let Some(detector) = self
            .detectors
            .get_mut(&StructureKey::new(symbol, timeframe))
        {
            detector.end_session();
        }
    }

    /// Route one bar to the pair's detector.
    pub fn on_bar(
        &mut self,
        symbol: &str,
        timeframe: Timeframe,
        bar: &Bar,
    ) -> EngineResult<Vec<SwingPoint>> {
        self.detector_mut(symbol, timeframe).on_bar(bar)
    }

    /// The full pipeline in one call: aggregate `bars` from `source` to
    /// `target` (identity when equal) and feed every derived bar to the
    /// pair's detector, concatenating the confirmations.
    pub fn ingest(
        &mut self,
        symbol: &str,
        source: Timeframe,
        target: Timeframe,
        bars: &[Bar],
    ) -> EngineResult<Vec<SwingPoint>> {
        let derived: Vec<Bar> = if source == target {
            bars.to_vec()
        } else {
            let aggregator = BarAggregator::new(source, target)?;
            aggregator.aggregate(bars)
        };
        debug!(
            symbol,
            source = %source,
            target = %target,
            raw = bars.len(),
            derived = derived.len(),
            "Ingesting bars"
        );

        let detector = self.detector_mut(symbol, target);
        let mut confirmed = Vec::new();
        for bar in &derived {
            confirmed.extend(detector.on_bar(bar)?);
        }
        Ok(confirmed)
    }

    /// Read access to a pair's detector, if one exists.
    pub fn detector(&self, symbol: &str, timeframe: Timeframe) -> Option<&SwingDetector> {
        self.detectors.get(&StructureKey::new(symbol, timeframe))
    }

    /// Latest confirmed (low, high) price pair, when both kinds exist.
    pub fn swing_range(&self, symbol: &str, timeframe: Timeframe) -> Option<(f64, f64)> {
        let detector = self.detector(symbol, timeframe)?;
        let high = detector.latest_confirmed(SwingKind::High)?;
        let low = detector.latest_confirmed(SwingKind::Low)?;
        Some((low.price, high.price))
    }

    /// Classify `current_price` against the pair's latest swing range.
    pub fn equilibrium(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        current_price: f64,
    ) -> Option<EquilibriumLevel> {
        let (low, high) = self.swing_range(symbol, timeframe)?;
        classify(low, high, current_price, &self.equilibrium)
    }

    fn detector_mut(&mut self, symbol: &str, timeframe: Timeframe) -> &mut SwingDetector {
        let config = self
            .swing_configs
            .get(&timeframe)
            .copied()
            .unwrap_or_default();
        self.detectors
            .entry(StructureKey::new(symbol, timeframe))
            .or_insert_with(|| SwingDetector::new(symbol, timeframe, config))
    }
}
