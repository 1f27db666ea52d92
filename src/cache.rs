use std::collections::HashMap;
use std::sync::Arc;

use crate::db::{load_json, save_json, KeyValueStore};
use crate::error::StoreError;
use crate::models::{AnalysisReport, Identified, ImpactReport, ProducerRecord};

pub const IMPACT_CACHE_KEY: &str = "carbonImpactReportCache";
pub const ANALYSIS_CACHE_KEY: &str = "carbonAnalysisCache";
pub const LAST_PRODUCER_KEY: &str = "carbonLastProducer";

/// Canonical key for a (producer, counterpart) pair. The producer id is
/// length-prefixed so the key is unambiguous and never symmetric.
pub fn pair_key(producer_id: &str, counterpart_id: &str) -> String {
    format!("{}:{}:{}", producer_id.len(), producer_id, counterpart_id)
}

/// Memoized impact reports, one per (producer, counterpart) pair. Every write
/// goes straight through to the store.
#[derive(Clone)]
pub struct PairReportCache {
    store: Arc<dyn KeyValueStore>,
}

impl PairReportCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn key_for(producer: &ProducerRecord, counterpart: &impl Identified) -> String {
        pair_key(producer.id(), counterpart.id())
    }

    async fn entries(&self) -> HashMap<String, ImpactReport> {
        load_json(self.store.as_ref(), IMPACT_CACHE_KEY)
            .await
            .unwrap_or_default()
    }

    pub async fn has(&self, producer: &ProducerRecord, counterpart: &impl Identified) -> bool {
        self.entries()
            .await
            .contains_key(&Self::key_for(producer, counterpart))
    }

    pub async fn get(
        &self,
        producer: &ProducerRecord,
        counterpart: &impl Identified,
    ) -> Option<ImpactReport> {
        let key = Self::key_for(producer, counterpart);
        let hit = self.entries().await.remove(&key);
        tracing::debug!(%key, hit = hit.is_some(), "impact report lookup");
        hit
    }

    pub async fn put(
        &self,
        producer: &ProducerRecord,
        counterpart: &impl Identified,
        report: &ImpactReport,
    ) -> Result<(), StoreError> {
        let mut entries = self.entries().await;
        entries.insert(Self::key_for(producer, counterpart), report.clone());
        save_json(self.store.as_ref(), IMPACT_CACHE_KEY, &entries).await
    }

    pub async fn invalidate(
        &self,
        producer: &ProducerRecord,
        counterpart: &impl Identified,
    ) -> Result<bool, StoreError> {
        let mut entries = self.entries().await;
        if entries.remove(&Self::key_for(producer, counterpart)).is_none() {
            return Ok(false);
        }
        save_json(self.store.as_ref(), IMPACT_CACHE_KEY, &entries).await?;
        Ok(true)
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(IMPACT_CACHE_KEY).await
    }
}

/// Memoized ranked-match analyses keyed by producer id, plus the pointer to
/// the most recently analyzed producer.
#[derive(Clone)]
pub struct AnalysisCache {
    store: Arc<dyn KeyValueStore>,
}

impl AnalysisCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    async fn entries(&self) -> HashMap<String, AnalysisReport> {
        load_json(self.store.as_ref(), ANALYSIS_CACHE_KEY)
            .await
            .unwrap_or_default()
    }

    pub async fn has_analysis(&self, producer: &ProducerRecord) -> bool {
        self.entries().await.contains_key(producer.id())
    }

    pub async fn get_analysis(&self, producer: &ProducerRecord) -> Option<AnalysisReport> {
        let hit = self.entries().await.remove(producer.id());
        tracing::debug!(producer = producer.id(), hit = hit.is_some(), "analysis lookup");
        hit
    }

    /// Stores the analysis and moves the last-producer pointer to `producer`.
    pub async fn put_analysis(
        &self,
        producer: &ProducerRecord,
        analysis: &AnalysisReport,
    ) -> Result<(), StoreError> {
        let mut entries = self.entries().await;
        entries.insert(producer.id().to_string(), analysis.clone());
        save_json(self.store.as_ref(), ANALYSIS_CACHE_KEY, &entries).await?;
        save_json(self.store.as_ref(), LAST_PRODUCER_KEY, producer).await
    }

    pub async fn invalidate(&self, producer: &ProducerRecord) -> Result<bool, StoreError> {
        let mut entries = self.entries().await;
        if entries.remove(producer.id()).is_none() {
            return Ok(false);
        }
        save_json(self.store.as_ref(), ANALYSIS_CACHE_KEY, &entries).await?;
        Ok(true)
    }

    /// Drops every analysis. The last-producer pointer is left for the
    /// session restorer to discard.
    pub async fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(ANALYSIS_CACHE_KEY).await
    }

    pub async fn last_producer(&self) -> Option<ProducerRecord> {
        load_json(self.store.as_ref(), LAST_PRODUCER_KEY).await
    }

    pub async fn clear_last_producer(&self) -> Result<(), StoreError> {
        self.store.remove(LAST_PRODUCER_KEY).await
    }
}
