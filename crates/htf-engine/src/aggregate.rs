//! Folding source-timeframe bars into aligned higher-timeframe buckets

use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::timeframe::Timeframe;
use crate::types::Bar;

/// Folds consecutive source bars into complete target-timeframe buckets.
///
/// A bucket is complete only when it holds exactly `M` bars on
/// consecutive source-aligned timestamps, where `M` is the exact multiple
/// `target / source`. Buckets left incomplete by a gap in the input
/// (market holiday, feed outage) are dropped, never interpolated, so the
/// gap propagates to the output. The trailing bucket (market still open)
/// is likewise excluded unless `include_partial_last` is set — an
/// incomplete bucket would misrepresent the bar's true close.
///
/// The aggregator holds no state between calls.
#[derive(Debug, Clone)]
pub struct BarAggregator {
    source: Timeframe,
    target: Timeframe,
    multiple: i64,
    partial_last: bool,
}

impl BarAggregator {
    /// Fails with `UnsupportedAggregation` unless the target duration is
    /// an exact positive integer multiple of the source duration.
    /// `target == source` is the identity aggregation (M = 1).
    pub fn new(source: Timeframe, target: Timeframe) -> EngineResult<Self> {
        let src_ms = source.duration_ms();
        let tgt_ms = target.duration_ms();
        if tgt_ms < src_ms || tgt_ms % src_ms != 0 {
            return Err(EngineError::UnsupportedAggregation { source, target });
        }
        Ok(Self {
            source,
            target,
            multiple: tgt_ms / src_ms,
            partial_last: false,
        })
    }

    /// Opt in to emitting the trailing partial bucket.
    pub fn include_partial_last(mut self, include: bool) -> Self {
        self.partial_last = include;
        self
    }

    /// The exact multiple `M` between target and source durations.
    pub fn multiple(&self) -> i64 {
        self.multiple
    }

    /// Aggregate an ordered source sequence into target-timeframe bars.
    ///
    /// Input bars must be at the configured source timeframe, strictly
    /// ordered by timestamp with no duplicates (the provider boundary's
    /// contract). Output timestamps are bucket starts, strictly
    /// increasing; total volume is conserved across complete buckets.
    pub fn aggregate(&self, bars: &[Bar]) -> Vec<Bar> {
        let mut out = Vec::with_capacity(bars.len() / self.multiple as usize + 1);
        let mut group: Vec<Bar> = Vec::with_capacity(self.multiple as usize);
        let mut bucket_start = i64::MIN;
        let mut dropped = 0usize;

        for bar in bars {
            let start = self.target.floor_align(bar.timestamp);
            if start != bucket_start {
                if self.group_is_complete(bucket_start, &group) {
                    out.push(self.fold(bucket_start, &group));
                } else if !group.is_empty() {
                    dropped += 1;
                }
                group.clear();
                bucket_start = start;
            }
            group.push(*bar);
        }

        // Trailing bucket: complete groups always emit; a partial only on
        // explicit opt-in.
        if self.group_is_complete(bucket_start, &group) {
            out.push(self.fold(bucket_start, &group));
        } else if !group.is_empty() && self.partial_last {
            debug!(
                bucket_start,
                bars = group.len(),
                expected = self.multiple,
                "Including trailing partial bucket"
            );
            out.push(self.fold(bucket_start, &group));
        }

        if dropped > 0 {
            debug!(
                source = %self.source,
                target = %self.target,
                dropped,
                "Dropped incomplete aggregation buckets"
            );
        }

        out
    }

    /// Exactly `M` bars on consecutive source-aligned timestamps from the
    /// bucket start.
    fn group_is_complete(&self, bucket_start: i64, group: &[Bar]) -> bool {
        if group.len() as i64 != self.multiple {
            return false;
        }
        let src_ms = self.source.duration_ms();
        group
            .iter()
            .enumerate()
            .all(|(k, bar)| bar.timestamp == bucket_start + k as i64 * src_ms)
    }

    fn fold(&self, bucket_start: i64, group: &[Bar]) -> Bar {
        let mut high = group[0].high;
        let mut low = group[0].low;
        let mut volume = 0.0;
        for bar in group {
            high = high.max(bar.high);
            low = low.min(bar.low);
            volume += bar.volume;
        }
        Bar {
            timestamp: bucket_start,
            open: group[0].open,
            high,
            low,
            close: group[group.len() - 1].close,
            volume,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    /// Uniform bars at `tf` spacing with per-bar price/volume offsets.
    fn make_bars(start_ms: i64, tf: Timeframe, count: usize) -> Vec<Bar> {
        (0..count)
            .map(|i| {
                let base = 100.0 + i as f64;
                Bar::new(
                    start_ms + i as i64 * tf.duration_ms(),
                    base,
                    base + 2.0,
                    base - 1.0,
                    base + 1.0,
                    10.0 + i as f64,
                )
            })
            .collect()
    }

    #[test]
    fn test_twenty_five_minute_bars_fold_to_ten() {
        let start = Timeframe::Min10.floor_align(1_741_500_000_000);
        let source = make_bars(start, Timeframe::Min5, 20);
        let agg = BarAggregator::new(Timeframe::Min5, Timeframe::Min10).unwrap();
        let out = agg.aggregate(&source);

        assert_eq!(out.len(), 10);

        // First output bucket combines source bars 0 and 1
        let first = &out[0];
        assert_eq!(first.timestamp, start);
        assert_eq!(first.open, source[0].open);
        assert_eq!(first.close, source[1].close);
        assert_eq!(first.high, source[0].high.max(source[1].high));
        assert_eq!(first.low, source[0].low.min(source[1].low));
        assert_eq!(first.volume, source[0].volume + source[1].volume);
    }

    #[test]
    fn test_volume_conservation() {
        let start = Timeframe::Hour1.floor_align(1_741_500_000_000);
        let source = make_bars(start, Timeframe::Min15, 16);
        let agg = BarAggregator::new(Timeframe::Min15, Timeframe::Hour1).unwrap();
        let out = agg.aggregate(&source);

        assert_eq!(out.len(), 4);
        let in_volume: f64 = source.iter().map(|b| b.volume).sum();
        let out_volume: f64 = out.iter().map(|b| b.volume).sum();
        assert_eq!(in_volume, out_volume);
    }

    #[test]
    fn test_ohlc_invariants_preserved() {
        let start = Timeframe::Min30.floor_align(1_741_500_000_000);
        let source = make_bars(start, Timeframe::Min5, 36);
        let agg = BarAggregator::new(Timeframe::Min5, Timeframe::Min30).unwrap();

        for bar in agg.aggregate(&source) {
            assert!(bar.high >= bar.open.max(bar.close));
            assert!(bar.low <= bar.open.min(bar.close));
            assert!(bar.high >= bar.low);
        }
    }

    #[test]
    fn test_gap_propagates_without_interpolation() {
        let start = Timeframe::Min10.floor_align(1_741_500_000_000);
        let mut source = make_bars(start, Timeframe::Min5, 8);
        // Knock a bar out of the second 10m bucket
        source.remove(2);

        let agg = BarAggregator::new(Timeframe::Min5, Timeframe::Min10).unwrap();
        let out = agg.aggregate(&source);

        // Buckets 0, 2 and 3 survive; bucket 1 is a gap
        assert_eq!(out.len(), 3);
        let expected: Vec<i64> = [0i64, 2, 3]
            .iter()
            .map(|k| start + k * Timeframe::Min10.duration_ms())
            .collect();
        let got: Vec<i64> = out.iter().map(|b| b.timestamp).collect();
        assert_eq!(got, expected);
        assert!(got.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_partial_trailing_bucket_policy() {
        let start = Timeframe::Min10.floor_align(1_741_500_000_000);
        // 5 five-minute bars: two complete 10m buckets plus one leftover
        let source = make_bars(start, Timeframe::Min5, 5);
        let agg = BarAggregator::new(Timeframe::Min5, Timeframe::Min10).unwrap();

        let strict = agg.aggregate(&source);
        assert_eq!(strict.len(), 2, "partial trailing bucket excluded by default");

        let lenient = agg.clone().include_partial_last(true).aggregate(&source);
        assert_eq!(lenient.len(), 3);
        let partial = &lenient[2];
        assert_eq!(partial.open, source[4].open);
        assert_eq!(partial.close, source[4].close);
        assert_eq!(partial.volume, source[4].volume);
    }

    #[test]
    fn test_degenerate_inputs() {
        let agg = BarAggregator::new(Timeframe::Min5, Timeframe::Min10).unwrap();
        assert!(agg.aggregate(&[]).is_empty());

        let start = Timeframe::Min10.floor_align(1_741_500_000_000);
        let single = make_bars(start, Timeframe::Min5, 1);
        assert!(agg.aggregate(&single).is_empty());
        assert_eq!(
            agg.clone().include_partial_last(true).aggregate(&single).len(),
            1
        );
    }

    #[test]
    fn test_identity_aggregation() {
        let start = Timeframe::Min5.floor_align(1_741_500_000_000);
        let source = make_bars(start, Timeframe::Min5, 4);
        let agg = BarAggregator::new(Timeframe::Min5, Timeframe::Min5).unwrap();
        assert_eq!(agg.multiple(), 1);
        assert_eq!(agg.aggregate(&source), source);
    }

    #[test]
    fn test_rejects_non_exact_multiples() {
        assert!(matches!(
            BarAggregator::new(Timeframe::Min10, Timeframe::Min15),
            Err(EngineError::UnsupportedAggregation { .. })
        ));
        assert!(matches!(
            BarAggregator::new(Timeframe::Hour1, Timeframe::Min15),
            Err(EngineError::UnsupportedAggregation { .. })
        ));
    }

    #[test]
    fn test_spring_forward_transition_is_seamless() {
        // US DST starts 2025-03-09 (02:00 local). In UTC nothing happens:
        // minute bars across 06:00–07:10Z must aggregate with uniform
        // bucket spacing, no gap, no duplicate.
        let start = Utc
            .with_ymd_and_hms(2025, 3, 9, 6, 0, 0)
            .unwrap()
            .timestamp_millis();
        let source = make_bars(start, Timeframe::Min1, 70);
        let agg = BarAggregator::new(Timeframe::Min1, Timeframe::Min5).unwrap();
        let out = agg.aggregate(&source);

        assert_eq!(out.len(), 14);
        for w in out.windows(2) {
            assert_eq!(
                w[1].timestamp - w[0].timestamp,
                Timeframe::Min5.duration_ms()
            );
        }
    }

    #[test]
    fn test_fall_back_transition_is_seamless() {
        // US DST ends 2025-11-02; same property across 05:00–07:00Z.
        let start = Utc
            .with_ymd_and_hms(2025, 11, 2, 5, 0, 0)
            .unwrap()
            .timestamp_millis();
        let source = make_bars(start, Timeframe::Min1, 120);
        let agg = BarAggregator::new(Timeframe::Min1, Timeframe::Min10).unwrap();
        let out = agg.aggregate(&source);

        assert_eq!(out.len(), 12);
        for w in out.windows(2) {
            assert_eq!(
                w[1].timestamp - w[0].timestamp,
                Timeframe::Min10.duration_ms()
            );
        }
    }
}
