use std::collections::VecDeque;

use rust_decimal::Decimal;

/// One slot in the observed series.
///
/// A placeholder is its own variant so downstream consumers can never
/// mistake "no swap in this slot" for a real zero price.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PriceSample {
    Observed(Decimal),
    Gap,
}

impl PriceSample {
    pub fn observed(&self) -> Option<Decimal> {
        match self {
            PriceSample::Observed(price) => Some(*price),
            PriceSample::Gap => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PricePoint {
    /// Milliseconds since epoch.
    pub ts_ms: u64,
    pub sample: PriceSample,
}

/// Exactly one bounding policy is in force for a series instance.
#[derive(Clone, Copy, Debug)]
pub enum SeriesBound {
    /// Keep points no older than this many milliseconds.
    MaxAge(u64),
    /// Keep at most this many points; the newest win.
    MaxCount(usize),
}

/// Ordered, bounded series of price observations.
///
/// Invariants:
/// - `ts_ms` is non-decreasing across the buffer (ties allowed)
/// - the configured `SeriesBound` is enforced on every push
/// - readers only ever get copies; internal storage is never exposed
///
/// Coalescing policy: an observation arriving within `coalesce_ms` of the
/// latest observed point replaces that point's price in place (keeping the
/// slot's timestamp), so bursts of swaps amortize into fixed-cadence
/// samples. One swap is therefore not always one point. `coalesce_ms = 0`
/// disables coalescing and every observation lands as its own point.
#[derive(Debug)]
pub struct PriceSeries {
    window: VecDeque<PricePoint>,
    bound: SeriesBound,
    coalesce_ms: u64,
}

impl PriceSeries {
    pub fn new(bound: SeriesBound, coalesce_ms: u64) -> Self {
        Self {
            window: VecDeque::new(),
            bound,
            coalesce_ms,
        }
    }

    /// Record a real observation, keeping the series non-decreasing in time.
    pub fn push(&mut self, ts_ms: u64, price: Decimal) {
        let point = PricePoint {
            ts_ms,
            sample: PriceSample::Observed(price),
        };

        let coalesce = match self.window.back() {
            Some(last) if last.ts_ms <= ts_ms => {
                ts_ms - last.ts_ms < self.coalesce_ms
                    && matches!(last.sample, PriceSample::Observed(_))
            }
            _ => false,
        };

        if coalesce {
            if let Some(last) = self.window.back_mut() {
                last.sample = point.sample;
            }
        } else if self.window.back().map_or(true, |last| last.ts_ms <= ts_ms) {
            self.window.push_back(point);
        } else {
            // Straggler older than the tail: insert at its sorted position
            // so the ascending invariant holds even when the feed delivers
            // out of order.
            let idx = self.window.partition_point(|p| p.ts_ms <= ts_ms);
            self.window.insert(idx, point);
        }

        if let Some(newest) = self.window.back().map(|p| p.ts_ms) {
            self.evict(newest);
        }
    }

    /// Drop points outside the configured bound.
    pub fn evict(&mut self, now_ms: u64) {
        match self.bound {
            SeriesBound::MaxAge(max_age_ms) => {
                while let Some(front) = self.window.front() {
                    if now_ms.saturating_sub(front.ts_ms) > max_age_ms {
                        self.window.pop_front();
                    } else {
                        break;
                    }
                }
            }
            SeriesBound::MaxCount(max) => {
                while self.window.len() > max {
                    self.window.pop_front();
                }
            }
        }
    }

    /// Append cadence placeholders so the time axis stays regular during
    /// quiet stretches. No-op while the series is empty or when
    /// `cadence_ms` is zero.
    pub fn fill_gaps(&mut self, now_ms: u64, cadence_ms: u64) {
        if cadence_ms == 0 {
            return;
        }
        let Some(mut next) = self.window.back().map(|p| p.ts_ms + cadence_ms) else {
            return;
        };
        while next <= now_ms {
            self.window.push_back(PricePoint {
                ts_ms: next,
                sample: PriceSample::Gap,
            });
            next += cadence_ms;
        }
        self.evict(now_ms);
    }

    /// Pre-populate from historical observations.
    ///
    /// Merges by time: only points strictly older than the current head are
    /// inserted, so a backfill that lands after live traffic has started
    /// can never overwrite newer data.
    pub fn seed(&mut self, mut points: Vec<PricePoint>) {
        points.sort_by_key(|p| p.ts_ms);
        match self.window.front().map(|p| p.ts_ms) {
            None => self.window = points.into(),
            Some(head_ts) => {
                for point in points.into_iter().rev() {
                    if point.ts_ms < head_ts {
                        self.window.push_front(point);
                    }
                }
            }
        }
        if let Some(newest) = self.window.back().map(|p| p.ts_ms) {
            self.evict(newest);
        }
    }

    /// Ordered copy of the current points. Never a view into internal
    /// storage.
    pub fn snapshot(&self) -> Vec<PricePoint> {
        self.window.iter().copied().collect()
    }

    /// Most recent real observation, skipping gap placeholders.
    pub fn latest_observed(&self) -> Option<Decimal> {
        self.window.iter().rev().find_map(|p| p.sample.observed())
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(n: i64) -> Decimal {
        Decimal::from(n)
    }

    fn obs(ts_ms: u64, n: i64) -> PricePoint {
        PricePoint {
            ts_ms,
            sample: PriceSample::Observed(price(n)),
        }
    }

    fn times(series: &PriceSeries) -> Vec<u64> {
        series.snapshot().iter().map(|p| p.ts_ms).collect()
    }

    #[test]
    fn appends_stay_ordered_including_ties() {
        let mut s = PriceSeries::new(SeriesBound::MaxAge(60_000), 0);

        s.push(1_000, price(10));
        s.push(1_000, price(11));
        s.push(2_000, price(12));

        assert_eq!(times(&s), vec![1_000, 1_000, 2_000]);
    }

    #[test]
    fn straggler_is_inserted_at_sorted_position() {
        let mut s = PriceSeries::new(SeriesBound::MaxAge(60_000), 0);

        s.push(1_000, price(10));
        s.push(3_000, price(30));
        s.push(2_000, price(20));

        assert_eq!(times(&s), vec![1_000, 2_000, 3_000]);
    }

    #[test]
    fn coalesces_within_interval_keeping_slot_timestamp() {
        let mut s = PriceSeries::new(SeriesBound::MaxAge(600_000), 30_000);

        s.push(10_000, price(100));
        s.push(20_000, price(105));

        let snap = s.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].ts_ms, 10_000);
        assert_eq!(snap[0].sample, PriceSample::Observed(price(105)));
    }

    #[test]
    fn distinct_point_past_coalesce_interval() {
        let mut s = PriceSeries::new(SeriesBound::MaxAge(600_000), 30_000);

        s.push(10_000, price(100));
        s.push(40_000, price(105));

        assert_eq!(s.len(), 2);
    }

    #[test]
    fn window_bound_evicts_points_older_than_max_age() {
        let mut s = PriceSeries::new(SeriesBound::MaxAge(10_000), 0);

        s.push(1_000, price(1));
        s.push(2_000, price(2));
        s.push(20_000, price(3));

        assert_eq!(times(&s), vec![20_000]);

        // a periodic tick can advance "now" with no new points
        s.evict(40_000);
        assert!(s.is_empty());
    }

    #[test]
    fn count_bound_keeps_only_the_newest_n() {
        let mut s = PriceSeries::new(SeriesBound::MaxCount(3), 0);

        for i in 0..4u64 {
            s.push(i * 1_000, price(i as i64));
        }

        assert_eq!(times(&s), vec![1_000, 2_000, 3_000]);
    }

    #[test]
    fn gap_fill_produces_a_regular_axis() {
        let mut s = PriceSeries::new(SeriesBound::MaxAge(600_000), 0);

        s.push(10_000, price(100));
        s.fill_gaps(40_000, 10_000);

        assert_eq!(times(&s), vec![10_000, 20_000, 30_000, 40_000]);
        assert_eq!(
            s.snapshot()[1].sample,
            PriceSample::Gap,
            "filled slots carry no price"
        );
    }

    #[test]
    fn gaps_never_surface_as_prices() {
        let mut s = PriceSeries::new(SeriesBound::MaxAge(600_000), 0);

        s.push(10_000, price(100));
        s.fill_gaps(30_000, 10_000);

        assert_eq!(s.latest_observed(), Some(price(100)));
    }

    #[test]
    fn seed_fills_an_empty_series() {
        let mut s = PriceSeries::new(SeriesBound::MaxAge(600_000), 0);

        s.seed(vec![obs(3_000, 3), obs(1_000, 1), obs(2_000, 2)]);

        assert_eq!(times(&s), vec![1_000, 2_000, 3_000]);
    }

    #[test]
    fn seed_merges_only_points_older_than_live_data() {
        let mut s = PriceSeries::new(SeriesBound::MaxAge(600_000), 0);

        s.push(5_000, price(50));
        s.seed(vec![obs(1_000, 1), obs(5_000, 99), obs(9_000, 99)]);

        assert_eq!(times(&s), vec![1_000, 5_000]);
        assert_eq!(s.latest_observed(), Some(price(50)));
    }

    #[test]
    fn snapshot_is_a_copy() {
        let mut s = PriceSeries::new(SeriesBound::MaxAge(600_000), 0);

        s.push(1_000, price(1));
        let snap = s.snapshot();
        s.push(2_000, price(2));

        assert_eq!(snap.len(), 1);
    }
}
