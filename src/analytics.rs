use std::collections::{BTreeMap, HashMap};

use rand::rngs::ThreadRng;
use serde::{Deserialize, Serialize};

use crate::geo::{haversine_km, GeoClassifier};
use crate::models::{ConsumerRecord, ProducerRecord, VectorStats};
use crate::trends::{RandomSource, TimeRange, TrendBucket, TrendSynthesizer, MATCH_RATE};

const TOP_INDUSTRIES: usize = 5;
const TOP_REGIONS: usize = 10;
const CARBON_EFFICIENCY_FACTOR: f64 = 85.0;
const CARBON_EFFICIENCY_CAP: u32 = 95;
const WEEKS_PER_YEAR: f64 = 52.0;
const REVENUE_PER_TONNE: f64 = 15.0;

const HEALTH_BASE: f64 = 85.0;
const QUALITY_BASE: f64 = 70.0;
const EFFICIENCY_WITH_ENGINE: u32 = 95;
const EFFICIENCY_WITHOUT_ENGINE: u32 = 50;

/// Divides with the denominator floored at 1.
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    numerator / denominator.max(1.0)
}

/// Rounds and clamps into a 0..=100 percentage.
pub fn percent(value: f64) -> u32 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u32
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    /// Projected from producer × consumer counts, not measured.
    pub total_matches: u64,
    pub carbon_saved: u32,
    pub active_producers: usize,
    pub active_consumers: usize,
    /// Projected weekly revenue estimate.
    pub revenue_generated: u64,
    pub total_supply: f64,
    pub total_demand: f64,
    pub trends: Vec<TrendBucket>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndustryShare {
    pub name: String,
    pub count: usize,
    pub percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportShare {
    pub method: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchAnalytics {
    pub success_rate: u32,
    pub avg_distance: u64,
    pub top_industries: Vec<IndustryShare>,
    pub transport_methods: Vec<TransportShare>,
    pub capacity_utilization: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionCount {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeographyAnalytics {
    pub regions: Vec<String>,
    pub top_states: Vec<RegionCount>,
    pub avg_distance: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorAnalytics {
    pub system_health: u32,
    pub match_quality: u32,
    pub algorithm_efficiency: u32,
    pub vector_dimensions: BTreeMap<String, u32>,
    pub total_vectors: u64,
    pub weight_distribution: BTreeMap<String, f64>,
}

impl VectorAnalytics {
    /// Canned figures used whenever engine statistics are missing or unreadable.
    pub fn fallback() -> Self {
        Self {
            system_health: HEALTH_BASE as u32,
            match_quality: QUALITY_BASE as u32,
            algorithm_efficiency: EFFICIENCY_WITHOUT_ENGINE,
            vector_dimensions: default_dimensions(),
            total_vectors: 0,
            weight_distribution: default_weights(),
        }
    }

    fn from_stats(stats: &VectorStats) -> Self {
        let avg = if stats.avg_matches_per_producer.is_finite() {
            stats.avg_matches_per_producer
        } else {
            0.0
        };

        let (algorithm_efficiency, vector_dimensions, total_vectors) =
            match &stats.vector_engine_stats {
                Some(engine) => (
                    EFFICIENCY_WITH_ENGINE,
                    BTreeMap::from([
                        ("producer".to_string(), engine.vector_dimensions.producer),
                        ("consumer".to_string(), engine.vector_dimensions.consumer),
                    ]),
                    engine.producer_vectors + engine.consumer_vectors,
                ),
                None => (EFFICIENCY_WITHOUT_ENGINE, default_dimensions(), 0),
            };

        let weight_distribution = stats.weights.clone().unwrap_or_else(default_weights);

        Self {
            system_health: percent(HEALTH_BASE + avg / 3.0 * 15.0),
            match_quality: percent(QUALITY_BASE + avg * 10.0),
            algorithm_efficiency,
            vector_dimensions,
            total_vectors,
            weight_distribution,
        }
    }
}

pub fn default_weights() -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("vector_similarity".to_string(), 0.35),
        ("capacity_compatibility".to_string(), 0.25),
        ("distance_penalty".to_string(), 0.20),
        ("quality_match".to_string(), 0.15),
        ("transport_compatibility".to_string(), 0.05),
    ])
}

fn default_dimensions() -> BTreeMap<String, u32> {
    BTreeMap::from([("producer".to_string(), 32), ("consumer".to_string(), 28)])
}

/// One fully recomputed analytics view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSnapshot {
    pub overview: Overview,
    pub matches: MatchAnalytics,
    pub geography: GeographyAnalytics,
    pub vectors: VectorAnalytics,
}

pub struct AnalyticsEngine<R = ThreadRng> {
    geo: GeoClassifier,
    trends: TrendSynthesizer<R>,
}

impl Default for AnalyticsEngine<ThreadRng> {
    fn default() -> Self {
        Self::new(GeoClassifier::default(), TrendSynthesizer::default())
    }
}

impl<R: RandomSource> AnalyticsEngine<R> {
    pub fn new(geo: GeoClassifier, trends: TrendSynthesizer<R>) -> Self {
        Self { geo, trends }
    }

    /// Builds a snapshot from the full record collections. Never fails; unreadable
    /// `vector_stats` degrade to [`VectorAnalytics::fallback`].
    pub fn compute(
        &mut self,
        producers: &[ProducerRecord],
        consumers: &[ConsumerRecord],
        range: TimeRange,
        vector_stats: Option<&serde_json::Value>,
    ) -> AnalyticsSnapshot {
        let total_supply: f64 = producers.iter().map(ProducerRecord::supply_rate).sum();
        let total_demand: f64 = consumers.iter().map(ConsumerRecord::demand_rate).sum();

        let carbon_saved = percent(
            (safe_ratio(total_supply, total_demand) * CARBON_EFFICIENCY_FACTOR).round(),
        )
        .min(CARBON_EFFICIENCY_CAP);
        let capacity_utilization = percent(
            safe_ratio(
                total_supply.min(total_demand),
                total_supply.max(total_demand),
            ) * 100.0,
        );

        let avg_distance = average_match_distance(producers, consumers);
        let trends = self
            .trends
            .synthesize(range, producers.len(), consumers.len());

        AnalyticsSnapshot {
            overview: Overview {
                total_matches: ((producers.len() * consumers.len()) as f64 * MATCH_RATE).floor()
                    as u64,
                carbon_saved,
                active_producers: producers.len(),
                active_consumers: consumers.len(),
                revenue_generated: (total_supply * WEEKS_PER_YEAR * REVENUE_PER_TONNE).round()
                    as u64,
                total_supply,
                total_demand,
                trends,
            },
            matches: MatchAnalytics {
                success_rate: success_rate(producers, consumers),
                avg_distance,
                top_industries: industry_breakdown(producers),
                transport_methods: transport_breakdown(producers),
                capacity_utilization,
            },
            geography: GeographyAnalytics {
                regions: self.geo.labels(),
                top_states: self.region_breakdown(producers, consumers),
                avg_distance,
            },
            vectors: vector_analytics(vector_stats),
        }
    }

    fn region_breakdown(
        &self,
        producers: &[ProducerRecord],
        consumers: &[ConsumerRecord],
    ) -> Vec<RegionCount> {
        let mut tally: HashMap<&'static str, usize> = HashMap::new();
        let locations = producers
            .iter()
            .map(|p| p.location.as_ref())
            .chain(consumers.iter().map(|c| c.location.as_ref()));

        for location in locations {
            *tally.entry(self.geo.classify_location(location)).or_insert(0) += 1;
        }

        let mut regions: Vec<RegionCount> = tally
            .into_iter()
            .map(|(label, count)| RegionCount {
                label: label.to_string(),
                count,
            })
            .collect();
        regions.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
        regions.truncate(TOP_REGIONS);
        regions
    }
}

pub fn industry_breakdown(producers: &[ProducerRecord]) -> Vec<IndustryShare> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for producer in producers {
        *counts.entry(producer.industry()).or_insert(0) += 1;
    }

    let total = producers.len() as f64;
    let mut shares: Vec<IndustryShare> = counts
        .into_iter()
        .map(|(name, count)| IndustryShare {
            name: name.to_string(),
            count,
            percentage: percent(safe_ratio(count as f64, total) * 100.0),
        })
        .collect();

    shares.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    shares.truncate(TOP_INDUSTRIES);
    shares
}

pub fn transport_breakdown(producers: &[ProducerRecord]) -> Vec<TransportShare> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for method in producers.iter().flat_map(|p| p.transport_methods()) {
        *counts.entry(method.as_str()).or_insert(0) += 1;
    }

    let mut shares: Vec<TransportShare> = counts
        .into_iter()
        .map(|(method, count)| TransportShare {
            method: method.to_string(),
            count,
        })
        .collect();
    shares.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.method.cmp(&b.method)));
    shares
}

fn vector_analytics(raw: Option<&serde_json::Value>) -> VectorAnalytics {
    let Some(raw) = raw else {
        return VectorAnalytics::fallback();
    };

    match serde_json::from_value::<VectorStats>(raw.clone()) {
        Ok(stats) => VectorAnalytics::from_stats(&stats),
        Err(err) => {
            tracing::warn!(error = %err, "unreadable vector stats, using canned analytics");
            VectorAnalytics::fallback()
        }
    }
}

/// Consumers a producer can serve: demand no larger than its supply.
fn can_serve(producer: &ProducerRecord, consumer: &ConsumerRecord) -> bool {
    consumer.demand_rate() <= producer.supply_rate()
}

fn success_rate(producers: &[ProducerRecord], consumers: &[ConsumerRecord]) -> u32 {
    let served = producers
        .iter()
        .filter(|p| consumers.iter().any(|c| can_serve(p, c)))
        .count();
    percent(safe_ratio(served as f64, producers.len() as f64) * 100.0)
}

fn average_match_distance(producers: &[ProducerRecord], consumers: &[ConsumerRecord]) -> u64 {
    let mut total = 0.0;
    let mut pairs = 0usize;

    for producer in producers {
        let Some(from) = producer.location.as_ref() else {
            continue;
        };
        for consumer in consumers.iter().filter(|c| can_serve(producer, c)) {
            if let Some(to) = consumer.location.as_ref() {
                let distance = haversine_km(from, to);
                if distance.is_finite() {
                    total += distance;
                    pairs += 1;
                }
            }
        }
    }

    safe_ratio(total, pairs as f64).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Location;
    use crate::trends::SequenceSource;

    fn engine() -> AnalyticsEngine<SequenceSource> {
        AnalyticsEngine::new(
            GeoClassifier::default(),
            TrendSynthesizer::new(SequenceSource::new(vec![0.5])),
        )
    }

    fn producer(id: &str, supply: f64, industry: &str, lat: f64, lon: f64) -> ProducerRecord {
        ProducerRecord {
            id: id.to_string(),
            name: format!("Producer {id}"),
            industry_type: Some(industry.to_string()),
            co2_supply_tonnes_per_week: Some(supply),
            location: Some(Location { lat, lon }),
            transportation_methods: Some(vec!["Pipeline".to_string(), "Truck".to_string()]),
            ..Default::default()
        }
    }

    fn consumer(id: &str, demand: f64, lat: f64, lon: f64) -> ConsumerRecord {
        ConsumerRecord {
            id: id.to_string(),
            name: format!("Consumer {id}"),
            co2_demand_tonnes_per_week: Some(demand),
            location: Some(Location { lat, lon }),
            ..Default::default()
        }
    }

    fn scenario() -> (Vec<ProducerRecord>, Vec<ConsumerRecord>) {
        let producers = vec![
            producer("p1", 100.0, "Cement", 37.77, -122.42),
            producer("p2", 200.0, "Energy", 29.76, -95.37),
        ];
        let consumers = vec![
            consumer("c1", 50.0, 34.05, -118.24),
            consumer("c2", 50.0, 32.78, -96.80),
            consumer("c3", 50.0, 41.88, -87.63),
        ];
        (producers, consumers)
    }

    #[test]
    fn scenario_totals_and_ratios() {
        let (producers, consumers) = scenario();
        let snapshot = engine().compute(&producers, &consumers, TimeRange::Last7Days, None);

        assert_eq!(snapshot.overview.total_supply, 300.0);
        assert_eq!(snapshot.overview.total_demand, 150.0);
        assert_eq!(snapshot.overview.carbon_saved, 95);
        assert_eq!(snapshot.matches.capacity_utilization, 50);
        assert_eq!(snapshot.overview.total_matches, 0);
        assert_eq!(snapshot.overview.revenue_generated, 234_000);
        assert_eq!(snapshot.overview.active_producers, 2);
        assert_eq!(snapshot.overview.active_consumers, 3);
        assert_eq!(snapshot.matches.success_rate, 100);
        assert!(snapshot.matches.avg_distance > 0);
    }

    #[test]
    fn empty_inputs_do_not_divide_by_zero() {
        let snapshot = engine().compute(&[], &[], TimeRange::Last30Days, None);

        assert_eq!(snapshot.overview.total_matches, 0);
        assert_eq!(snapshot.overview.carbon_saved, 0);
        assert_eq!(snapshot.matches.capacity_utilization, 0);
        assert_eq!(snapshot.matches.success_rate, 0);
        assert_eq!(snapshot.matches.avg_distance, 0);
        assert!(snapshot.matches.top_industries.is_empty());
        assert!(snapshot.matches.transport_methods.is_empty());
        assert!(snapshot.geography.top_states.is_empty());
        assert_eq!(snapshot.overview.trends.len(), 12);
    }

    #[test]
    fn one_sided_inputs_stay_in_bounds() {
        let (producers, consumers) = scenario();
        let mut engine = engine();

        let supply_only = engine.compute(&producers, &[], TimeRange::Last7Days, None);
        assert_eq!(supply_only.overview.carbon_saved, 95);
        assert_eq!(supply_only.matches.capacity_utilization, 0);
        assert_eq!(supply_only.matches.success_rate, 0);

        let demand_only = engine.compute(&[], &consumers, TimeRange::Last7Days, None);
        assert_eq!(demand_only.overview.carbon_saved, 0);
        assert_eq!(demand_only.matches.capacity_utilization, 0);
    }

    #[test]
    fn total_matches_floors_fractional_estimates() {
        let producers: Vec<_> = (0..3)
            .map(|i| producer(&format!("p{i}"), 10.0, "Energy", 0.0, 0.0))
            .collect();
        let consumers: Vec<_> = (0..3)
            .map(|i| consumer(&format!("c{i}"), 5.0, 0.0, 0.0))
            .collect();
        // 9 × 0.15 = 1.35
        let snapshot = engine().compute(&producers, &consumers, TimeRange::Last7Days, None);
        assert_eq!(snapshot.overview.total_matches, 1);
    }

    #[test]
    fn industry_breakdown_ranks_and_keeps_top_five() {
        let mut producers = Vec::new();
        for (industry, n) in [
            ("Cement", 4),
            ("Energy", 3),
            ("Steel", 2),
            ("Ethanol", 1),
            ("Fertilizer", 1),
            ("Paper", 1),
        ] {
            for i in 0..n {
                producers.push(producer(&format!("{industry}-{i}"), 1.0, industry, 0.0, 0.0));
            }
        }
        producers.push(ProducerRecord {
            id: "blank".to_string(),
            ..Default::default()
        });

        let shares = industry_breakdown(&producers);
        assert_eq!(shares.len(), 5);
        assert_eq!(shares[0].name, "Cement");
        assert_eq!(shares[0].count, 4);
        assert_eq!(shares[0].percentage, 31);
        assert_eq!(shares[1].name, "Energy");
        assert_eq!(shares[2].name, "Steel");
        assert!(shares[3..].iter().all(|s| s.count == 1));
    }

    #[test]
    fn transport_breakdown_flattens_all_methods() {
        let mut producers = scenario().0;
        producers.push(ProducerRecord {
            id: "p3".to_string(),
            transportation_methods: Some(vec!["Ship".to_string(), "Pipeline".to_string()]),
            ..Default::default()
        });

        let shares = transport_breakdown(&producers);
        assert_eq!(
            shares,
            vec![
                TransportShare { method: "Pipeline".to_string(), count: 3 },
                TransportShare { method: "Truck".to_string(), count: 2 },
                TransportShare { method: "Ship".to_string(), count: 1 },
            ]
        );
    }

    #[test]
    fn geography_tallies_producers_and_consumers() {
        let (producers, consumers) = scenario();
        let snapshot = engine().compute(&producers, &consumers, TimeRange::Last7Days, None);
        let top = &snapshot.geography.top_states;

        assert_eq!(top[0], RegionCount { label: "California".to_string(), count: 2 });
        assert_eq!(top[1], RegionCount { label: "Texas".to_string(), count: 2 });
        assert_eq!(top[2], RegionCount { label: "Illinois".to_string(), count: 1 });
        assert_eq!(snapshot.geography.regions.last().map(String::as_str), Some("Other"));
        assert_eq!(snapshot.geography.avg_distance, snapshot.matches.avg_distance);
    }

    #[test]
    fn vector_stats_drive_quality_scores() {
        let stats = serde_json::json!({
            "total_producers": 9,
            "total_consumers": 5,
            "avg_matches_per_producer": 3.0,
            "vector_engine_stats": {
                "producer_vectors": 9,
                "consumer_vectors": 5,
                "vector_dimensions": { "producer": 32, "consumer": 28 }
            },
            "weights": { "vector_similarity": 0.6, "distance_penalty": 0.4 }
        });
        let snapshot = engine().compute(&[], &[], TimeRange::Last7Days, Some(&stats));
        let vectors = snapshot.vectors;

        assert_eq!(vectors.system_health, 100);
        assert_eq!(vectors.match_quality, 100);
        assert_eq!(vectors.algorithm_efficiency, 95);
        assert_eq!(vectors.total_vectors, 14);
        assert_eq!(vectors.weight_distribution.len(), 2);
        assert_eq!(vectors.weight_distribution["vector_similarity"], 0.6);
    }

    #[test]
    fn weights_are_reported_as_given() {
        let stats = serde_json::json!({
            "avg_matches_per_producer": 1.0,
            "weights": { "vector_similarity": 1.5, "distance_penalty": -0.25 }
        });
        let vectors = engine()
            .compute(&[], &[], TimeRange::Last7Days, Some(&stats))
            .vectors;

        assert_eq!(vectors.weight_distribution["vector_similarity"], 1.5);
        assert_eq!(vectors.weight_distribution["distance_penalty"], -0.25);
    }

    #[test]
    fn vector_stats_without_engine_use_low_efficiency() {
        let stats = serde_json::json!({ "avg_matches_per_producer": 1.5 });
        let vectors = engine()
            .compute(&[], &[], TimeRange::Last7Days, Some(&stats))
            .vectors;

        assert_eq!(vectors.system_health, 93);
        assert_eq!(vectors.match_quality, 85);
        assert_eq!(vectors.algorithm_efficiency, 50);
        assert_eq!(vectors.weight_distribution, default_weights());
    }

    #[test]
    fn malformed_vector_stats_fall_back() {
        let stats = serde_json::json!({ "avg_matches_per_producer": "lots" });
        let vectors = engine()
            .compute(&[], &[], TimeRange::Last7Days, Some(&stats))
            .vectors;
        assert_eq!(vectors, VectorAnalytics::fallback());
    }

    #[test]
    fn recomputation_is_stable_outside_trends() {
        let (producers, consumers) = scenario();
        let stats = serde_json::json!({ "avg_matches_per_producer": 2.0 });
        let mut engine: AnalyticsEngine = AnalyticsEngine::default();

        let mut first = engine.compute(&producers, &consumers, TimeRange::Last24Hours, Some(&stats));
        let mut second = engine.compute(&producers, &consumers, TimeRange::Last24Hours, Some(&stats));
        first.overview.trends.clear();
        second.overview.trends.clear();

        assert_eq!(first.overview, second.overview);
        assert_eq!(first.matches, second.matches);
        assert_eq!(first.geography, second.geography);
        assert_eq!(first.vectors, second.vectors);
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let snapshot = engine().compute(&[], &[], TimeRange::Last7Days, None);
        let value = serde_json::to_value(&snapshot).unwrap();
        assert!(value["overview"]["totalMatches"].is_u64());
        assert!(value["matches"]["capacityUtilization"].is_u64());
        assert!(value["vectors"]["weightDistribution"].is_object());
        assert!(value["overview"]["trends"][0]["periodLabel"].is_string());
    }

    #[test]
    fn helpers_guard_edges() {
        assert_eq!(safe_ratio(5.0, 0.0), 5.0);
        assert_eq!(percent(-3.0), 0);
        assert_eq!(percent(170.0), 100);
        assert_eq!(percent(f64::NAN), 0);
    }
}
