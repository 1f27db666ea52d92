use std::sync::Arc;

use crate::cache::AnalysisCache;
use crate::db::{load_json, save_json, KeyValueStore};
use crate::error::StoreError;
use crate::models::{AnalysisReport, MatchCandidate, ProducerRecord};

pub const WATCHLIST_KEY: &str = "carbonWatchlist";
pub const VISITED_KEY: &str = "hasVisitedCarbonMarketplace";

pub const WELCOME_HINT: &str = "Welcome to the carbon marketplace. Try `matches --producer <ID>` \
to find partners for a producer, or `analytics` for a market overview.";

/// The view state republished on startup.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoredSession {
    pub producer: ProducerRecord,
    pub analysis: AnalysisReport,
}

pub struct SessionRestorer {
    analyses: AnalysisCache,
}

impl SessionRestorer {
    pub fn new(analyses: AnalysisCache) -> Self {
        Self { analyses }
    }

    /// Republishes the last analysis from cache. A pointer whose analysis is
    /// gone is removed so the next start does not try again.
    pub async fn restore_session(&self) -> Result<Option<RestoredSession>, StoreError> {
        let Some(producer) = self.analyses.last_producer().await else {
            return Ok(None);
        };

        if self.analyses.has_analysis(&producer).await {
            if let Some(analysis) = self.analyses.get_analysis(&producer).await {
                tracing::info!(producer = %producer.id, "restored cached analysis");
                return Ok(Some(RestoredSession { producer, analysis }));
            }
        }

        tracing::info!(producer = %producer.id, "dropping stale last-producer pointer");
        self.analyses.clear_last_producer().await?;
        Ok(None)
    }
}

/// Matches the user has bookmarked, unique by id.
pub struct Watchlist {
    store: Arc<dyn KeyValueStore>,
}

impl Watchlist {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> Vec<MatchCandidate> {
        load_json(self.store.as_ref(), WATCHLIST_KEY)
            .await
            .unwrap_or_default()
    }

    /// Returns `false` when a match with the same id is already present.
    pub async fn add(&self, candidate: &MatchCandidate) -> Result<bool, StoreError> {
        let mut items = self.list().await;
        if items.iter().any(|item| item.consumer.id == candidate.consumer.id) {
            return Ok(false);
        }
        items.push(candidate.clone());
        save_json(self.store.as_ref(), WATCHLIST_KEY, &items).await?;
        Ok(true)
    }

    pub async fn remove(&self, id: &str) -> Result<bool, StoreError> {
        let mut items = self.list().await;
        let before = items.len();
        items.retain(|item| item.consumer.id != id);
        if items.len() == before {
            return Ok(false);
        }
        save_json(self.store.as_ref(), WATCHLIST_KEY, &items).await?;
        Ok(true)
    }
}

/// Flags that only live as long as the session store.
pub struct SessionFlags {
    store: Arc<dyn KeyValueStore>,
}

impl SessionFlags {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// True exactly once per session.
    pub async fn first_visit(&self) -> Result<bool, StoreError> {
        if self.store.get_raw(VISITED_KEY).await?.is_some() {
            return Ok(false);
        }
        self.store.set_raw(VISITED_KEY, "true").await?;
        Ok(true)
    }

    /// Onboarding hint for the first command of a session, `None` afterwards.
    pub async fn welcome(&self) -> Result<Option<&'static str>, StoreError> {
        Ok(self.first_visit().await?.then_some(WELCOME_HINT))
    }
}
