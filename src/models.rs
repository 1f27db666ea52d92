use serde::{Deserialize, Serialize};

/// Fallback industry label for records that do not carry one.
pub const OTHER_INDUSTRY: &str = "Other";

/// Anything that can take part in a cached pair.
pub trait Identified {
    fn id(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

/// A registered CO₂ source. Numeric and collection fields are optional on the
/// wire; the accessors apply the defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProducerRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "industry", skip_serializing_if = "Option::is_none")]
    pub industry_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub co2_supply_tonnes_per_week: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub co2_purity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transportation_methods: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<String>,
}

impl ProducerRecord {
    /// A record that carries only its id, enough to address cache entries.
    pub fn from_id(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            ..Default::default()
        }
    }

    pub fn supply_rate(&self) -> f64 {
        non_negative(self.co2_supply_tonnes_per_week)
    }

    pub fn industry(&self) -> &str {
        industry_label(self.industry_type.as_deref())
    }

    pub fn transport_methods(&self) -> &[String] {
        self.transportation_methods.as_deref().unwrap_or(&[])
    }
}

impl Identified for ProducerRecord {
    fn id(&self) -> &str {
        &self.id
    }
}

/// A registered CO₂ sink.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsumerRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "industry", skip_serializing_if = "Option::is_none")]
    pub industry_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub co2_demand_tonnes_per_week: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transportation_methods: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<String>,
}

impl ConsumerRecord {
    pub fn from_id(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            ..Default::default()
        }
    }

    pub fn demand_rate(&self) -> f64 {
        non_negative(self.co2_demand_tonnes_per_week)
    }

    pub fn industry(&self) -> &str {
        industry_label(self.industry_type.as_deref())
    }
}

impl Identified for ConsumerRecord {
    fn id(&self) -> &str {
        &self.id
    }
}

/// A consumer proposed for a producer, annotated with its distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    #[serde(flatten)]
    pub consumer: ConsumerRecord,
    #[serde(default)]
    pub distance_km: f64,
}

impl MatchCandidate {
    pub fn from_id(id: &str) -> Self {
        Self {
            consumer: ConsumerRecord::from_id(id),
            distance_km: 0.0,
        }
    }
}

impl Identified for MatchCandidate {
    fn id(&self) -> &str {
        &self.consumer.id
    }
}

/// Ranked-match analysis for one producer, as returned by the analyze endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    #[serde(default)]
    pub overall_summary: String,
    #[serde(default)]
    pub ranked_matches: Vec<serde_json::Value>,
}

/// Opaque impact-model payload.
pub type ImpactReport = serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorDimensions {
    pub producer: u32,
    pub consumer: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorEngineStats {
    #[serde(default)]
    pub producer_vectors: u64,
    #[serde(default)]
    pub consumer_vectors: u64,
    pub vector_dimensions: VectorDimensions,
}

/// Matching-engine statistics reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorStats {
    #[serde(default)]
    pub total_producers: u64,
    #[serde(default)]
    pub total_consumers: u64,
    pub avg_matches_per_producer: f64,
    #[serde(default)]
    pub vector_engine_stats: Option<VectorEngineStats>,
    #[serde(default)]
    pub weights: Option<std::collections::BTreeMap<String, f64>>,
}

fn non_negative(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => 0.0,
    }
}

fn industry_label(value: Option<&str>) -> &str {
    match value.map(str::trim) {
        Some(label) if !label.is_empty() => label,
        _ => OTHER_INDUSTRY,
    }
}
