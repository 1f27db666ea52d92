use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Months, Utc};
use rand::rngs::{StdRng, ThreadRng};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Buckets kept per synthesized series; older periods are dropped.
pub const MAX_BUCKETS: usize = 12;

/// Matches projected per producer/consumer pair, shared with the overview estimate.
pub const MATCH_RATE: f64 = 0.15;

const REVENUE_PER_PAIR: f64 = 150.0;
const JITTER: f64 = 0.2;
const CARBON_FLOOR: f64 = 85.0;
const CARBON_SPAN: f64 = 10.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "24h")]
    Last24Hours,
    #[default]
    #[serde(rename = "7d")]
    Last7Days,
    #[serde(rename = "30d")]
    Last30Days,
    #[serde(rename = "90d")]
    Last90Days,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::Last24Hours => "24h",
            TimeRange::Last7Days => "7d",
            TimeRange::Last30Days => "30d",
            TimeRange::Last90Days => "90d",
        }
    }

    /// Nominal period count before capping.
    pub fn periods(&self) -> usize {
        match self {
            TimeRange::Last24Hours => 24,
            TimeRange::Last7Days => 7,
            TimeRange::Last30Days => 30,
            TimeRange::Last90Days => 90,
        }
    }

    pub fn bucket_count(&self) -> usize {
        self.periods().min(MAX_BUCKETS)
    }

    /// Label for the period `back` steps before `now`.
    fn label(&self, now: DateTime<Utc>, back: usize) -> String {
        match self {
            TimeRange::Last24Hours => (now - Duration::hours(back as i64))
                .format("%H:00")
                .to_string(),
            TimeRange::Last7Days => (now - Duration::days(back as i64)).format("%a").to_string(),
            TimeRange::Last30Days | TimeRange::Last90Days => now
                .checked_sub_months(Months::new(back as u32))
                .unwrap_or(now)
                .format("%b")
                .to_string(),
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeRange {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "24h" => Ok(TimeRange::Last24Hours),
            "7d" => Ok(TimeRange::Last7Days),
            "30d" => Ok(TimeRange::Last30Days),
            "90d" => Ok(TimeRange::Last90Days),
            other => anyhow::bail!("unknown time range '{other}' (expected 24h, 7d, 30d or 90d)"),
        }
    }
}

/// Source of uniform samples in `[0, 1)`.
pub trait RandomSource {
    fn unit(&mut self) -> f64;
}

impl RandomSource for ThreadRng {
    fn unit(&mut self) -> f64 {
        self.random()
    }
}

impl RandomSource for StdRng {
    fn unit(&mut self) -> f64 {
        self.random()
    }
}

/// Replays a fixed cycle of samples.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct SequenceSource {
    values: Vec<f64>,
    cursor: usize,
}

#[cfg(test)]
impl SequenceSource {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values, cursor: 0 }
    }
}

#[cfg(test)]
impl RandomSource for SequenceSource {
    fn unit(&mut self) -> f64 {
        if self.values.is_empty() {
            return 0.5;
        }
        let value = self.values[self.cursor % self.values.len()];
        self.cursor += 1;
        value.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendBucket {
    pub period_label: String,
    pub matches: u64,
    pub carbon_pct: u32,
    pub revenue: u64,
}

/// Fabricates a rolling activity series where no history exists.
pub struct TrendSynthesizer<R> {
    rng: R,
}

impl Default for TrendSynthesizer<ThreadRng> {
    fn default() -> Self {
        Self::new(rand::rng())
    }
}

impl<R: RandomSource> TrendSynthesizer<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    pub fn synthesize(
        &mut self,
        range: TimeRange,
        producer_count: usize,
        consumer_count: usize,
    ) -> Vec<TrendBucket> {
        self.synthesize_at(range, producer_count, consumer_count, Utc::now())
    }

    /// Oldest bucket first, the last bucket is the period containing `now`.
    pub fn synthesize_at(
        &mut self,
        range: TimeRange,
        producer_count: usize,
        consumer_count: usize,
        now: DateTime<Utc>,
    ) -> Vec<TrendBucket> {
        let pairs = (producer_count * consumer_count) as f64;
        let count = range.bucket_count();

        (0..count)
            .rev()
            .map(|back| {
                let matches = pairs * MATCH_RATE * (1.0 + self.jitter());
                let revenue = pairs * REVENUE_PER_PAIR * (1.0 + self.jitter());
                let carbon = CARBON_FLOOR + self.rng.unit() * CARBON_SPAN;
                TrendBucket {
                    period_label: range.label(now, back),
                    matches: matches.round().max(0.0) as u64,
                    carbon_pct: carbon.round().clamp(0.0, 100.0) as u32,
                    revenue: revenue.round().max(0.0) as u64,
                }
            })
            .collect()
    }

    fn jitter(&mut self) -> f64 {
        self.rng.unit() * 2.0 * JITTER - JITTER
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        // A Wednesday in March.
        Utc.with_ymd_and_hms(2026, 3, 18, 14, 30, 0).unwrap()
    }

    #[test]
    fn bucket_counts_are_capped() {
        assert_eq!(TimeRange::Last24Hours.bucket_count(), 12);
        assert_eq!(TimeRange::Last7Days.bucket_count(), 7);
        assert_eq!(TimeRange::Last30Days.bucket_count(), 12);
        assert_eq!(TimeRange::Last90Days.bucket_count(), 12);
    }

    #[test]
    fn hourly_labels_roll_back_from_now() {
        let mut synth = TrendSynthesizer::new(SequenceSource::new(vec![0.5]));
        let buckets = synth.synthesize_at(TimeRange::Last24Hours, 2, 3, fixed_now());
        assert_eq!(buckets.len(), 12);
        assert_eq!(buckets.first().unwrap().period_label, "03:00");
        assert_eq!(buckets.last().unwrap().period_label, "14:00");
    }

    #[test]
    fn weekly_labels_use_weekday_abbreviations() {
        let mut synth = TrendSynthesizer::new(SequenceSource::new(vec![0.5]));
        let labels: Vec<String> = synth
            .synthesize_at(TimeRange::Last7Days, 1, 1, fixed_now())
            .into_iter()
            .map(|b| b.period_label)
            .collect();
        assert_eq!(labels, vec!["Thu", "Fri", "Sat", "Sun", "Mon", "Tue", "Wed"]);
    }

    #[test]
    fn monthly_labels_keep_most_recent_twelve() {
        let mut synth = TrendSynthesizer::new(SequenceSource::new(vec![0.5]));
        let buckets = synth.synthesize_at(TimeRange::Last90Days, 1, 1, fixed_now());
        assert_eq!(buckets.len(), 12);
        assert_eq!(buckets.first().unwrap().period_label, "Apr");
        assert_eq!(buckets.last().unwrap().period_label, "Mar");
    }

    #[test]
    fn midpoint_samples_hit_the_baseline() {
        let mut synth = TrendSynthesizer::new(SequenceSource::new(vec![0.5]));
        let buckets = synth.synthesize_at(TimeRange::Last7Days, 10, 20, fixed_now());
        for bucket in buckets {
            assert_eq!(bucket.matches, 30);
            assert_eq!(bucket.revenue, 30_000);
            assert_eq!(bucket.carbon_pct, 90);
        }
    }

    #[test]
    fn extreme_samples_stay_within_jitter_band() {
        let mut low = TrendSynthesizer::new(SequenceSource::new(vec![0.0]));
        let mut high = TrendSynthesizer::new(SequenceSource::new(vec![1.0]));
        let floor = low.synthesize_at(TimeRange::Last7Days, 10, 10, fixed_now());
        let ceiling = high.synthesize_at(TimeRange::Last7Days, 10, 10, fixed_now());
        assert!(floor.iter().all(|b| b.matches == 12 && b.carbon_pct == 85));
        assert!(ceiling.iter().all(|b| b.matches == 18 && b.carbon_pct == 95));
    }

    #[test]
    fn random_series_respects_structural_invariants() {
        let mut synth: TrendSynthesizer<ThreadRng> = TrendSynthesizer::default();
        for range in [
            TimeRange::Last24Hours,
            TimeRange::Last7Days,
            TimeRange::Last30Days,
            TimeRange::Last90Days,
        ] {
            let buckets = synth.synthesize(range, 4, 6);
            assert_eq!(buckets.len(), range.bucket_count());
            for bucket in &buckets {
                assert!(!bucket.period_label.is_empty());
                assert!((85..=95).contains(&bucket.carbon_pct));
                assert!(bucket.matches <= 5);
            }
        }
    }

    #[test]
    fn seeded_sources_reproduce_a_series() {
        use rand::SeedableRng;

        let mut a = TrendSynthesizer::new(StdRng::seed_from_u64(7));
        let mut b = TrendSynthesizer::new(StdRng::seed_from_u64(7));
        assert_eq!(
            a.synthesize_at(TimeRange::Last30Days, 5, 5, fixed_now()),
            b.synthesize_at(TimeRange::Last30Days, 5, 5, fixed_now())
        );
    }

    #[test]
    fn zero_counts_yield_zero_activity() {
        let mut synth: TrendSynthesizer<ThreadRng> = TrendSynthesizer::default();
        let buckets = synth.synthesize(TimeRange::Last30Days, 0, 5);
        assert!(buckets.iter().all(|b| b.matches == 0 && b.revenue == 0));
    }

    #[test]
    fn parses_range_selectors() {
        assert_eq!("30d".parse::<TimeRange>().unwrap(), TimeRange::Last30Days);
        assert!("1y".parse::<TimeRange>().is_err());
        assert_eq!(TimeRange::Last24Hours.to_string(), "24h");
    }
}
