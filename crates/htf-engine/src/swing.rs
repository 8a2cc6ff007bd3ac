//! Non-repainting swing-high/low detection over a rolling bar window
//!
//! One detector owns all state for a single (symbol, timeframe) pair. The
//! pivot under evaluation always sits `right` bars behind the newest bar;
//! a pattern is frozen as confirmed once `right + confirm` bars exist
//! beyond the pivot. A confirmed point is never revised or removed by
//! later bars — only the unconfirmed pending slot (at most one per kind)
//! is mutable, and only `keep_recent` eviction trims the oldest confirmed
//! entries.

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use crate::ring::RingBuffer;
use crate::timeframe::Timeframe;
use crate::types::{Bar, SwingKind, SwingPoint};

/// Ring-buffer slots beyond the confirmation window.
const WINDOW_HEADROOM: usize = 8;
const DEFAULT_KEEP_RECENT: usize = 50;

/// Window parameters for swing detection. All fields must be ≥ 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwingConfig {
    /// Bars strictly before the pivot that must all be less extreme.
    pub left: usize,
    /// Bars strictly after the pivot that must all be less extreme.
    pub right: usize,
    /// Additional bars beyond `right` before a point is frozen.
    pub confirm: usize,
    /// Confirmed points retained per kind; older entries are evicted.
    pub keep_recent: usize,
}

impl SwingConfig {
    pub fn new(
        left: usize,
        right: usize,
        confirm: usize,
        keep_recent: usize,
    ) -> EngineResult<Self> {
        for (name, value) in [
            ("left", left),
            ("right", right),
            ("confirm", confirm),
            ("keep_recent", keep_recent),
        ] {
            if value == 0 {
                return Err(EngineError::InvalidConfig(format!(
                    "swing parameter `{name}` must be at least 1"
                )));
            }
        }
        Ok(Self {
            left,
            right,
            confirm,
            keep_recent,
        })
    }

    /// Single-parameter shorthand: `bars_per_side = max(1, lookback / 2)`
    /// on each side, with a one-bar confirmation.
    ///
    /// Note the rounding: `lookback = 2` maps to one bar per side, so the
    /// smallest confirmable pattern needs a 4-bar window (left + pivot +
    /// right + confirm). The canonical parameterization remains
    /// `left`/`right`/`confirm`.
    pub fn from_lookback(lookback: usize) -> Self {
        let bars_per_side = (lookback / 2).max(1);
        Self {
            left: bars_per_side,
            right: bars_per_side,
            confirm: 1,
            keep_recent: DEFAULT_KEEP_RECENT,
        }
    }

    /// Bars required before any pivot is evaluable.
    pub fn min_window(&self) -> usize {
        self.left + self.right + 1
    }

    /// Bars required before a pivot can be frozen as confirmed.
    pub fn confirm_window(&self) -> usize {
        self.min_window() + self.confirm
    }
}

impl Default for SwingConfig {
    fn default() -> Self {
        Self {
            left: 2,
            right: 2,
            confirm: 1,
            keep_recent: DEFAULT_KEEP_RECENT,
        }
    }
}

/// Per-session mutable state, dropped wholesale on session end.
#[derive(Debug)]
struct Session {
    trading_date: NaiveDate,
    bars_seen: u64,
    pending_high: Option<SwingPoint>,
    pending_low: Option<SwingPoint>,
    confirmed_highs: Vec<SwingPoint>,
    confirmed_lows: Vec<SwingPoint>,
    /// Ids already confirmed this session; re-evaluations never duplicate.
    emitted: HashSet<String>,
}

impl Session {
    fn new(trading_date: NaiveDate) -> Self {
        Self {
            trading_date,
            bars_seen: 0,
            pending_high: None,
            pending_low: None,
            confirmed_highs: Vec::new(),
            confirmed_lows: Vec::new(),
            emitted: HashSet::new(),
        }
    }
}

/// Swing-high/low detector for one (symbol, timeframe) pair.
///
/// Not internally synchronized: callers must serialize `on_bar` per
/// instance (one task per symbol+timeframe, or an external mutex).
/// Independent instances share nothing and may run concurrently.
#[derive(Debug)]
pub struct SwingDetector {
    symbol: String,
    timeframe: Timeframe,
    config: SwingConfig,
    window: RingBuffer<Bar>,
    session: Option<Session>,
}

impl SwingDetector {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe, config: SwingConfig) -> Self {
        let window = RingBuffer::new(config.confirm_window() + WINDOW_HEADROOM);
        Self {
            symbol: symbol.into(),
            timeframe,
            config,
            window,
            session: None,
        }
    }

    pub fn config(&self) -> &SwingConfig {
        &self.config
    }

    pub fn has_active_session(&self) -> bool {
        self.session.is_some()
    }

    /// Trading date of the active session, if any.
    pub fn session_date(&self) -> Option<NaiveDate> {
        self.session.as_ref().map(|s| s.trading_date)
    }

    /// Begin a fresh session for `trading_date`, clearing all prior state
    /// (window, pending and confirmed points).
    pub fn start_session(&mut self, trading_date: NaiveDate) {
        info!(
            symbol = %self.symbol,
            timeframe = %self.timeframe,
            %trading_date,
            "Swing session started"
        );
        self.window.clear();
        self.session = Some(Session::new(trading_date));
    }

    /// End the active session, clearing all buffers and pending points.
    pub fn end_session(&mut self) {
        if self.session.take().is_some() {
            self.window.clear();
            info!(
                symbol = %self.symbol,
                timeframe = %self.timeframe,
                "Swing session ended"
            );
        }
    }

    /// Feed the next bar of the session's ordered stream.
    ///
    /// Returns the points confirmed by this call: zero, one, or — when a
    /// single pivot is both a swing high and a swing low, or pending
    /// points promote alongside a fresh confirmation — several.
    pub fn on_bar(&mut self, bar: &Bar) -> EngineResult<Vec<SwingPoint>> {
        let Some(session) = self.session.as_mut() else {
            return Err(EngineError::SessionNotStarted {
                symbol: self.symbol.clone(),
                timeframe: self.timeframe,
            });
        };

        self.window.push(*bar);
        session.bars_seen += 1;

        let config = self.config;
        let timeframe = self.timeframe;
        let can_confirm = self.window.len() >= config.confirm_window();
        let mut newly_confirmed: Vec<SwingPoint> = Vec::new();

        // Promote pending points the window has grown enough to freeze.
        if can_confirm {
            if let Some(mut point) = session.pending_high.take() {
                point.confirmed = true;
                record_confirmed(session, point, &config, &self.symbol, &mut newly_confirmed);
            }
            if let Some(mut point) = session.pending_low.take() {
                point.confirmed = true;
                record_confirmed(session, point, &config, &self.symbol, &mut newly_confirmed);
            }
        }

        // The pivot is evaluable once `left + right + 1` bars exist. Its
        // lookback position is fixed at `right` regardless of how much
        // further the buffer has grown.
        if self.window.len() < config.min_window() {
            return Ok(newly_confirmed);
        }
        let Some(pivot) = self.window.get(config.right).copied() else {
            return Ok(newly_confirmed);
        };
        let pivot_index = session.bars_seen - 1 - config.right as u64;

        if is_swing_high(&self.window, &config) {
            let point = make_point(
                timeframe,
                SwingKind::High,
                pivot.high,
                pivot.timestamp,
                &config,
                can_confirm,
                pivot_index,
            );
            if can_confirm {
                record_confirmed(session, point, &config, &self.symbol, &mut newly_confirmed);
            } else {
                if let Some(prev) = &session.pending_high {
                    debug!(superseded = %prev.id, id = %point.id, "Pending swing high superseded");
                }
                session.pending_high = Some(point);
            }
        }

        if is_swing_low(&self.window, &config) {
            let point = make_point(
                timeframe,
                SwingKind::Low,
                pivot.low,
                pivot.timestamp,
                &config,
                can_confirm,
                pivot_index,
            );
            if can_confirm {
                record_confirmed(session, point, &config, &self.symbol, &mut newly_confirmed);
            } else {
                if let Some(prev) = &session.pending_low {
                    debug!(superseded = %prev.id, id = %point.id, "Pending swing low superseded");
                }
                session.pending_low = Some(point);
            }
        }

        Ok(newly_confirmed)
    }

    /// Latest confirmed point of `kind`, if any.
    pub fn latest_confirmed(&self, kind: SwingKind) -> Option<&SwingPoint> {
        self.confirmed(kind).last()
    }

    /// Confirmed history of `kind`, oldest first.
    pub fn confirmed(&self, kind: SwingKind) -> &[SwingPoint] {
        match self.session.as_ref() {
            Some(session) => match kind {
                SwingKind::High => &session.confirmed_highs,
                SwingKind::Low => &session.confirmed_lows,
            },
            None => &[],
        }
    }

    /// Unconfirmed candidate of `kind`, if one is waiting on bars.
    pub fn pending(&self, kind: SwingKind) -> Option<&SwingPoint> {
        let session = self.session.as_ref()?;
        match kind {
            SwingKind::High => session.pending_high.as_ref(),
            SwingKind::Low => session.pending_low.as_ref(),
        }
    }

    /// Confirmed point (either kind) with the smallest price strictly
    /// above `price`. Pending points are never visible here.
    pub fn nearest_above(&self, price: f64) -> Option<&SwingPoint> {
        self.confirmed_iter()
            .filter(|p| p.price > price)
            .min_by(|a, b| cmp_price(a, b))
    }

    /// Confirmed point (either kind) with the largest price strictly
    /// below `price`.
    pub fn nearest_below(&self, price: f64) -> Option<&SwingPoint> {
        self.confirmed_iter()
            .filter(|p| p.price < price)
            .max_by(|a, b| cmp_price(a, b))
    }

    fn confirmed_iter(&self) -> impl Iterator<Item = &SwingPoint> {
        self.confirmed(SwingKind::High)
            .iter()
            .chain(self.confirmed(SwingKind::Low).iter())
    }
}

fn cmp_price(a: &SwingPoint, b: &SwingPoint) -> Ordering {
    a.price.partial_cmp(&b.price).unwrap_or(Ordering::Equal)
}

fn make_point(
    timeframe: Timeframe,
    kind: SwingKind,
    price: f64,
    time: i64,
    config: &SwingConfig,
    confirmed: bool,
    source_bar_index: u64,
) -> SwingPoint {
    SwingPoint {
        id: SwingPoint::derive_id(timeframe, time, kind),
        timeframe,
        kind,
        price,
        time,
        left: config.left,
        right: config.right,
        confirm: config.confirm,
        confirmed,
        source_bar_index,
    }
}

fn record_confirmed(
    session: &mut Session,
    point: SwingPoint,
    config: &SwingConfig,
    symbol: &str,
    out: &mut Vec<SwingPoint>,
) {
    if !session.emitted.insert(point.id.clone()) {
        return;
    }
    info!(
        symbol,
        timeframe = %point.timeframe,
        kind = %point.kind,
        price = point.price,
        time = point.time,
        "Swing point confirmed"
    );
    let list = match point.kind {
        SwingKind::High => &mut session.confirmed_highs,
        SwingKind::Low => &mut session.confirmed_lows,
    };
    list.push(point.clone());
    if list.len() > config.keep_recent {
        let excess = list.len() - config.keep_recent;
        list.drain(..excess);
    }
    out.push(point);
}

/// Strict swing-high test: every neighbor on both sides has a high
/// strictly below the pivot's. Ties invalidate the pattern, and a
/// non-finite value never satisfies it.
fn is_swing_high(window: &RingBuffer<Bar>, config: &SwingConfig) -> bool {
    let Some(pivot) = window.get(config.right) else {
        return false;
    };
    if !pivot.high.is_finite() {
        return false;
    }
    // Newer neighbors (lookback indices right-1 ..= 0), then older ones
    // (right+1 ..= right+left).
    for i in (0..config.right).chain(config.right + 1..=config.right + config.left) {
        match window.get(i) {
            Some(bar) if bar.high < pivot.high => {}
            _ => return false,
        }
    }
    true
}

/// Symmetric strict swing-low test.
fn is_swing_low(window: &RingBuffer<Bar>, config: &SwingConfig) -> bool {
    let Some(pivot) = window.get(config.right) else {
        return false;
    };
    if !pivot.low.is_finite() {
        return false;
    }
    for i in (0..config.right).chain(config.right + 1..=config.right + config.left) {
        match window.get(i) {
            Some(bar) if bar.low > pivot.low => {}
            _ => return false,
        }
    }
    true
}
