use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::analytics::{AnalyticsEngine, AnalyticsSnapshot};
use crate::cache::{AnalysisCache, PairReportCache};
use crate::error::{StoreError, UpstreamError};
use crate::models::{AnalysisReport, ConsumerRecord, ImpactReport, MatchCandidate, ProducerRecord};
use crate::trends::{RandomSource, TimeRange};
use crate::upstream::{fallback, Upstream};

/// Where a payload handed to the view came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cache,
    Upstream,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Served<T> {
    pub value: T,
    pub source: Source,
}

/// Inputs of the analytics view, gathered from the upstream or its defaults.
pub struct AnalyticsInputs {
    pub producers: Vec<ProducerRecord>,
    pub consumers: Vec<ConsumerRecord>,
    pub vector_stats: Option<serde_json::Value>,
}

/// Routes view actions through the caches before touching the upstream.
pub struct Dashboard<U> {
    upstream: U,
    reports: PairReportCache,
    analyses: AnalysisCache,
    timeout: Duration,
}

impl<U: Upstream> Dashboard<U> {
    pub fn new(
        upstream: U,
        reports: PairReportCache,
        analyses: AnalysisCache,
        timeout: Duration,
    ) -> Self {
        Self {
            upstream,
            reports,
            analyses,
            timeout,
        }
    }

    #[cfg(test)]
    pub fn upstream(&self) -> &U {
        &self.upstream
    }

    async fn call<T, F>(&self, what: &str, fut: F) -> Result<T, UpstreamError>
    where
        F: Future<Output = Result<T, UpstreamError>>,
    {
        let result = match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(UpstreamError::Timeout(self.timeout.as_secs())),
        };
        if let Err(err) = &result {
            tracing::warn!(call = what, error = %err, "upstream call failed");
        }
        result
    }

    /// Ranked matches for `producer`, served from cache when possible. Only a
    /// complete upstream analysis is cached.
    pub async fn find_matches(
        &self,
        producer: &ProducerRecord,
    ) -> Result<Served<AnalysisReport>, StoreError> {
        if let Some(value) = self.analyses.get_analysis(producer).await {
            return Ok(Served {
                value,
                source: Source::Cache,
            });
        }

        let matches = match self.call("matches", self.upstream.matches(&producer.id)).await {
            Ok(matches) => matches,
            Err(_) => {
                return Ok(Served {
                    value: fallback::analysis(producer, &[]),
                    source: Source::Fallback,
                })
            }
        };

        if matches.is_empty() {
            return Ok(Served {
                value: AnalysisReport {
                    overall_summary: format!("No potential matches found for {}.", producer.name),
                    ranked_matches: Vec::new(),
                },
                source: Source::Upstream,
            });
        }

        let analysis = self
            .call(
                "analyze_matches",
                self.upstream.analyze_matches(producer, &matches),
            )
            .await;
        match analysis {
            Ok(value) => {
                self.analyses.put_analysis(producer, &value).await?;
                Ok(Served {
                    value,
                    source: Source::Upstream,
                })
            }
            Err(_) => Ok(Served {
                value: fallback::analysis(producer, &matches),
                source: Source::Fallback,
            }),
        }
    }

    /// Impact report for one pair, served from cache when possible.
    pub async fn generate_report(
        &self,
        producer: &ProducerRecord,
        counterpart: &MatchCandidate,
    ) -> Result<Served<ImpactReport>, StoreError> {
        if let Some(value) = self.reports.get(producer, counterpart).await {
            return Ok(Served {
                value,
                source: Source::Cache,
            });
        }

        let report = self
            .call(
                "impact_report",
                self.upstream.impact_report(producer, counterpart),
            )
            .await;
        match report {
            Ok(value) => {
                self.reports.put(producer, counterpart, &value).await?;
                Ok(Served {
                    value,
                    source: Source::Upstream,
                })
            }
            Err(_) => Ok(Served {
                value: fallback::impact_report(producer, counterpart),
                source: Source::Fallback,
            }),
        }
    }

    /// Ranked matches for the producer with `producer_id`. The analysis cache
    /// is consulted by id before the upstream resolves the record, so a hit
    /// needs no upstream at all. `None` means the upstream answered but does
    /// not know the producer.
    pub async fn matches_for(
        &self,
        producer_id: &str,
    ) -> Result<Option<Served<AnalysisReport>>, StoreError> {
        let key = ProducerRecord::from_id(producer_id);
        if let Some(value) = self.analyses.get_analysis(&key).await {
            return Ok(Some(Served {
                value,
                source: Source::Cache,
            }));
        }

        match self.producer(producer_id).await {
            Ok(Some(producer)) => self.find_matches(&producer).await.map(Some),
            Ok(None) => Ok(None),
            Err(_) => Ok(Some(Served {
                value: fallback::analysis(&key, &[]),
                source: Source::Fallback,
            })),
        }
    }

    /// Impact report for a pair given by ids. Cached reports are served
    /// without resolving either record upstream. `None` means the upstream
    /// answered but the pair is not a known match.
    pub async fn report_for(
        &self,
        producer_id: &str,
        counterpart_id: &str,
    ) -> Result<Option<Served<ImpactReport>>, StoreError> {
        let key_producer = ProducerRecord::from_id(producer_id);
        let key_counterpart = MatchCandidate::from_id(counterpart_id);
        if self.reports.has(&key_producer, &key_counterpart).await {
            if let Some(value) = self.reports.get(&key_producer, &key_counterpart).await {
                return Ok(Some(Served {
                    value,
                    source: Source::Cache,
                }));
            }
        }

        let producer = match self.producer(producer_id).await {
            Ok(Some(producer)) => producer,
            Ok(None) => return Ok(None),
            Err(_) => {
                return Ok(Some(Served {
                    value: fallback::impact_report(&key_producer, &key_counterpart),
                    source: Source::Fallback,
                }))
            }
        };
        match self.counterpart(producer_id, counterpart_id).await {
            Ok(Some(counterpart)) => self
                .generate_report(&producer, &counterpart)
                .await
                .map(Some),
            Ok(None) => Ok(None),
            Err(_) => Ok(Some(Served {
                value: fallback::impact_report(&producer, &key_counterpart),
                source: Source::Fallback,
            })),
        }
    }

    /// Fetches every analytics input, substituting defaults for failed calls.
    pub async fn analytics_inputs(&self) -> AnalyticsInputs {
        let producers = self
            .call("producers", self.upstream.producers())
            .await
            .unwrap_or_else(|_| fallback::producers());
        let consumers = self
            .call("consumers", self.upstream.consumers())
            .await
            .unwrap_or_else(|_| fallback::consumers());
        let vector_stats = self
            .call("matching_stats", self.upstream.matching_stats())
            .await
            .ok();

        AnalyticsInputs {
            producers,
            consumers,
            vector_stats,
        }
    }

    pub async fn load_analytics<R: RandomSource>(
        &self,
        engine: &mut AnalyticsEngine<R>,
        range: TimeRange,
    ) -> (AnalyticsInputs, AnalyticsSnapshot) {
        let inputs = self.analytics_inputs().await;
        let snapshot = engine.compute(
            &inputs.producers,
            &inputs.consumers,
            range,
            inputs.vector_stats.as_ref(),
        );
        (inputs, snapshot)
    }

    /// Looks a producer up by id among the upstream's records.
    pub async fn producer(&self, id: &str) -> Result<Option<ProducerRecord>, UpstreamError> {
        let producers = self.call("producers", self.upstream.producers()).await?;
        Ok(producers.into_iter().find(|p| p.id == id))
    }

    /// Resolves a counterpart among the producer's matches.
    pub async fn counterpart(
        &self,
        producer_id: &str,
        counterpart_id: &str,
    ) -> Result<Option<MatchCandidate>, UpstreamError> {
        let matches = self.call("matches", self.upstream.matches(producer_id)).await?;
        Ok(matches.into_iter().find(|m| m.consumer.id == counterpart_id))
    }
}

impl<U> Dashboard<U> {
    pub fn reports(&self) -> &PairReportCache {
        &self.reports
    }

    pub fn analyses(&self) -> &AnalysisCache {
        &self.analyses
    }
}

/// Convenience for wiring both caches onto one store.
pub fn caches(store: Arc<dyn crate::db::KeyValueStore>) -> (PairReportCache, AnalysisCache) {
    (PairReportCache::new(store.clone()), AnalysisCache::new(store))
}
