use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::analytics::default_weights;
use crate::error::UpstreamError;
use crate::geo::haversine_km;
use crate::models::{
    AnalysisReport, ConsumerRecord, ImpactReport, Location, MatchCandidate, ProducerRecord,
};

const CARBON_CREDIT_PRICE_PER_TONNE: f64 = 25.0;
const INDUSTRIAL_CO2_PRICE_PER_TONNE: f64 = 75.0;
const WEEKS_PER_YEAR: f64 = 52.0;
const DELIVERY_EMISSIONS_PER_100KM: f64 = 0.05;

/// The remote marketplace API as seen by this crate.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn producers(&self) -> Result<Vec<ProducerRecord>, UpstreamError>;
    async fn consumers(&self) -> Result<Vec<ConsumerRecord>, UpstreamError>;
    async fn matches(&self, producer_id: &str) -> Result<Vec<MatchCandidate>, UpstreamError>;
    async fn analyze_matches(
        &self,
        producer: &ProducerRecord,
        matches: &[MatchCandidate],
    ) -> Result<AnalysisReport, UpstreamError>;
    async fn impact_report(
        &self,
        producer: &ProducerRecord,
        counterpart: &MatchCandidate,
    ) -> Result<ImpactReport, UpstreamError>;
    async fn matching_stats(&self) -> Result<serde_json::Value, UpstreamError>;
}

#[derive(Debug, Default, Deserialize)]
struct Database {
    #[serde(default)]
    producers: Vec<ProducerRecord>,
    #[serde(default)]
    consumers: Vec<ConsumerRecord>,
}

/// Serves the marketplace API from a JSON database file on disk.
pub struct LocalBackend {
    path: PathBuf,
}

impl LocalBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn load(&self) -> Result<Database, UpstreamError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|err| UpstreamError::Unavailable(format!("{}: {err}", self.path.display())))?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Consumers the producer can serve, nearest first.
pub fn find_matches(producer: &ProducerRecord, consumers: &[ConsumerRecord]) -> Vec<MatchCandidate> {
    let Some(origin) = producer.location.as_ref() else {
        return Vec::new();
    };

    let mut matches: Vec<MatchCandidate> = consumers
        .iter()
        .filter(|consumer| consumer.demand_rate() <= producer.supply_rate())
        .filter_map(|consumer| {
            let target = consumer.location.as_ref()?;
            Some(MatchCandidate {
                consumer: consumer.clone(),
                distance_km: round2(haversine_km(origin, target)),
            })
        })
        .collect();

    matches.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    matches
}

pub fn impact_model(producer: &ProducerRecord, counterpart: &MatchCandidate) -> ImpactReport {
    let tonnes_per_week = producer.supply_rate().min(counterpart.consumer.demand_rate());
    let tonnes_per_year = tonnes_per_week * WEEKS_PER_YEAR;
    let producer_revenue = tonnes_per_year * CARBON_CREDIT_PRICE_PER_TONNE;
    let consumer_savings = tonnes_per_year * INDUSTRIAL_CO2_PRICE_PER_TONNE;
    let logistics =
        counterpart.distance_km / 100.0 * DELIVERY_EMISSIONS_PER_100KM * WEEKS_PER_YEAR;

    json!({
        "producer_name": producer.name,
        "consumer_name": counterpart.consumer.name,
        "annual_tonnage": round2(tonnes_per_year),
        "financials": {
            "producer_annual_revenue": round2(producer_revenue),
            "consumer_annual_savings": round2(consumer_savings),
            "carbon_credit_value": round2(producer_revenue),
        },
        "environmental": {
            "co2_diverted": round2(tonnes_per_year),
            "estimated_logistics_emissions": round2(logistics),
            "net_co2_impact": round2(tonnes_per_year - logistics),
        }
    })
}

/// Ranks matches in the order given, with a short rule-based rationale.
pub fn rank_matches(producer: &ProducerRecord, matches: &[MatchCandidate]) -> AnalysisReport {
    let ranked_matches = matches
        .iter()
        .enumerate()
        .map(|(i, candidate)| {
            let consumer = &candidate.consumer;
            let mut value = serde_json::to_value(candidate).unwrap_or_else(|_| json!({}));
            value["analysis"] = json!({
                "rank": i + 1,
                "justification": format!(
                    "Partnership between {} and {} in the {} industry. Distance: {} km.",
                    producer.name, consumer.name, consumer.industry(), candidate.distance_km
                ),
                "strategic_considerations": [
                    format!(
                        "Supply-demand fit: {}t demand vs {}t supply",
                        consumer.demand_rate(), producer.supply_rate()
                    ),
                    format!("Logistics: {} km delivery distance", candidate.distance_km),
                ],
            });
            value
        })
        .collect::<Vec<_>>();

    AnalysisReport {
        overall_summary: format!(
            "Found {} potential partners for {}, sorted by distance.",
            ranked_matches.len(),
            producer.name
        ),
        ranked_matches,
    }
}

#[async_trait]
impl Upstream for LocalBackend {
    async fn producers(&self) -> Result<Vec<ProducerRecord>, UpstreamError> {
        Ok(self.load().await?.producers)
    }

    async fn consumers(&self) -> Result<Vec<ConsumerRecord>, UpstreamError> {
        Ok(self.load().await?.consumers)
    }

    async fn matches(&self, producer_id: &str) -> Result<Vec<MatchCandidate>, UpstreamError> {
        let db = self.load().await?;
        let producer = db
            .producers
            .iter()
            .find(|p| p.id == producer_id)
            .ok_or_else(|| UpstreamError::NotFound(format!("producer '{producer_id}'")))?;
        Ok(find_matches(producer, &db.consumers))
    }

    async fn analyze_matches(
        &self,
        producer: &ProducerRecord,
        matches: &[MatchCandidate],
    ) -> Result<AnalysisReport, UpstreamError> {
        Ok(rank_matches(producer, matches))
    }

    async fn impact_report(
        &self,
        producer: &ProducerRecord,
        counterpart: &MatchCandidate,
    ) -> Result<ImpactReport, UpstreamError> {
        Ok(impact_model(producer, counterpart))
    }

    async fn matching_stats(&self) -> Result<serde_json::Value, UpstreamError> {
        let db = self.load().await?;
        let total_matches: usize = db
            .producers
            .iter()
            .map(|p| find_matches(p, &db.consumers).len())
            .sum();
        let avg = total_matches as f64 / db.producers.len().max(1) as f64;

        Ok(json!({
            "total_producers": db.producers.len(),
            "total_consumers": db.consumers.len(),
            "avg_matches_per_producer": round2(avg),
            "vector_engine_stats": {
                "producer_vectors": db.producers.len(),
                "consumer_vectors": db.consumers.len(),
                "vector_dimensions": { "producer": 32, "consumer": 28 }
            },
            "weights": default_weights(),
        }))
    }
}

/// Canned payloads substituted when the upstream cannot answer.
pub mod fallback {
    use super::*;

    pub fn producers() -> Vec<ProducerRecord> {
        vec![ProducerRecord {
            id: "demo-1".to_string(),
            name: "Demo Carbon Producer".to_string(),
            industry_type: Some("Demo Industry".to_string()),
            co2_supply_tonnes_per_week: Some(1000.0),
            co2_purity: Some(95.0),
            location: Some(Location { lat: 37.7749, lon: -122.4194 }),
            transportation_methods: Some(vec!["Pipeline".to_string(), "Truck".to_string()]),
            additional_info: Some("Demo producer for testing purposes".to_string()),
        }]
    }

    pub fn consumers() -> Vec<ConsumerRecord> {
        vec![ConsumerRecord {
            id: "demo-consumer-1".to_string(),
            name: "Demo Carbon Consumer".to_string(),
            industry_type: Some("Manufacturing".to_string()),
            co2_demand_tonnes_per_week: Some(500.0),
            location: Some(Location { lat: 37.7849, lon: -122.4094 }),
            transportation_methods: Some(vec!["Pipeline".to_string(), "Truck".to_string()]),
            additional_info: Some("Demo consumer for testing purposes".to_string()),
        }]
    }

    pub fn analysis(producer: &ProducerRecord, matches: &[MatchCandidate]) -> AnalysisReport {
        let mut report = rank_matches(producer, matches);
        report.overall_summary = format!(
            "Found {} potential partners for {}. Detailed analysis temporarily unavailable.",
            matches.len(),
            producer.name
        );
        report
    }

    pub fn impact_report(producer: &ProducerRecord, counterpart: &MatchCandidate) -> ImpactReport {
        json!({
            "partnership": {
                "producer": producer.name,
                "consumer": counterpart.consumer.name,
            },
            "impact": {
                "carbon_reduction": 1000,
                "revenue_potential": 50000,
                "cost_savings": 25000,
            }
        })
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
