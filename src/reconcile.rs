// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Complete episode listings for a show.
//!
//! The primary listing endpoint returns at most [`CAPPED_PAGE_SIZE`]
//! episodes and rejects paging parameters, while its metadata advertises
//! the real total. The reconciler enumerates ids through the uncapped
//! per-episode analytics endpoint and then fetches every record one by one.

use std::collections::HashSet;
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::client::{TransistorClient, require_id};
use crate::error::{ApiError, ErrorKind};
use crate::filters::QueryFilters;
use crate::http::HttpClient;
use crate::models::{Document, EpisodeId, EpisodeRecord};
use crate::progress::{NoopReporter, ProgressEvent, SharedProgressReporter};

/// Maximum number of episodes the primary listing endpoint returns
pub const CAPPED_PAGE_SIZE: usize = 20;

/// An episode whose record could not be fetched
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedEpisode {
    pub id: EpisodeId,
    pub kind: ErrorKind,
    pub message: String,
}

/// Outcome of a full reconciliation run
///
/// Every discovered id appears exactly once, either in `succeeded` or in
/// `failed`. `succeeded` keeps discovery order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationResult {
    pub show_id: String,
    pub discovered: usize,
    pub succeeded: Vec<EpisodeRecord>,
    pub failed: Vec<FailedEpisode>,
}

impl ReconciliationResult {
    pub fn succeeded_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Render as a list envelope with a summary in `meta`
    pub fn to_document(&self) -> Document {
        Document {
            data: json!(self.succeeded),
            meta: Some(json!({
                "total_requested": self.discovered,
                "successful": self.succeeded_count(),
                "failed": self.failed_count(),
                "failed_episodes": self.failed,
            })),
            included: None,
        }
    }
}

/// Worst-case wall clock time for fetching `episodes` records one by one.
///
/// Each batch of `max_requests` fetches costs one full window. The
/// discovery request is not included.
pub fn estimated_duration(episodes: usize, max_requests: usize, window: Duration) -> Duration {
    if max_requests == 0 {
        return Duration::ZERO;
    }
    let windows = episodes.div_ceil(max_requests);
    window.saturating_mul(u32::try_from(windows).unwrap_or(u32::MAX))
}

/// Rebuilds the complete episode set of a show
pub struct Reconciler<'a, C: HttpClient> {
    client: &'a TransistorClient<C>,
    reporter: SharedProgressReporter,
}

impl<'a, C: HttpClient> Reconciler<'a, C> {
    pub fn new(client: &'a TransistorClient<C>) -> Self {
        Self {
            client,
            reporter: NoopReporter::shared(),
        }
    }

    pub fn with_reporter(mut self, reporter: SharedProgressReporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Every episode id of a show, in discovery order.
    ///
    /// Issues a single request. Ids repeated in the payload are kept once,
    /// at their first position. Failures are returned unchanged.
    pub async fn discover_all_ids(&self, show_id: &str) -> Result<Vec<EpisodeId>, ApiError> {
        let show_id = require_id("show id", show_id)?;

        self.reporter.report(ProgressEvent::Discovering {
            show_id: show_id.to_string(),
        });

        let waited = self.client.limiter().acquire().await;
        if !waited.is_zero() {
            self.reporter.report(ProgressEvent::Throttled { waited });
        }
        let analytics = self.client.discover_unthrottled(show_id).await?;

        let mut seen = HashSet::new();
        let ids: Vec<EpisodeId> = analytics
            .data
            .attributes
            .episodes
            .into_iter()
            .map(|episode| episode.id)
            .filter(|id| seen.insert(id.clone()))
            .collect();

        info!(show_id, episodes = ids.len(), "discovered episodes");
        self.reporter.report(ProgressEvent::Discovered {
            show_id: show_id.to_string(),
            episode_count: ids.len(),
        });

        Ok(ids)
    }

    /// Full records of every episode of a show.
    ///
    /// A discovery failure aborts the run. A failed episode fetch is
    /// recorded in the result and the run moves on to the next id.
    pub async fn fetch_all_full_records(
        &self,
        show_id: &str,
    ) -> Result<ReconciliationResult, ApiError> {
        let ids = self.discover_all_ids(show_id).await?;
        let total = ids.len();

        let mut succeeded = Vec::with_capacity(total);
        let mut failed = Vec::new();

        for (episode_index, episode_id) in ids.into_iter().enumerate() {
            let waited = self.client.limiter().acquire().await;
            if !waited.is_zero() {
                self.reporter.report(ProgressEvent::Throttled { waited });
            }

            self.reporter.report(ProgressEvent::FetchingEpisode {
                episode_id: episode_id.clone(),
                episode_index,
                total_episodes: total,
            });

            match self.client.fetch_episode_unthrottled(&episode_id).await {
                Ok(doc) => {
                    self.reporter.report(ProgressEvent::EpisodeFetched {
                        episode_id,
                        title: doc.data.title().map(str::to_string),
                    });
                    succeeded.push(doc.data);
                }
                Err(e) => {
                    warn!(episode_id = %episode_id, error = %e, "episode fetch failed");
                    self.reporter.report(ProgressEvent::EpisodeFailed {
                        episode_id: episode_id.clone(),
                        kind: e.kind(),
                        error: e.to_string(),
                    });
                    failed.push(FailedEpisode {
                        id: episode_id,
                        kind: e.kind(),
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            show_id = show_id.trim(),
            discovered = total,
            succeeded = succeeded.len(),
            failed = failed.len(),
            "reconciliation finished"
        );
        self.reporter.report(ProgressEvent::ReconciliationCompleted {
            succeeded_count: succeeded.len(),
            failed_count: failed.len(),
        });

        Ok(ReconciliationResult {
            show_id: show_id.trim().to_string(),
            discovered: total,
            succeeded,
            failed,
        })
    }

    /// The capped first page from the primary listing endpoint.
    ///
    /// Returns at most [`CAPPED_PAGE_SIZE`] episodes regardless of the total
    /// reported in `meta`. Cheap, but incomplete for larger shows.
    pub async fn list_capped(
        &self,
        show_id: &str,
        filters: &QueryFilters,
    ) -> Result<Document<Vec<EpisodeRecord>>, ApiError> {
        let show_id = require_id("show id", show_id)?;
        self.client.list_episodes(Some(show_id), filters).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::Value;

    use super::*;
    use crate::client::tests::MockHttpClient;
    use crate::limiter::RateLimiter;
    use crate::progress::ProgressReporter;

    fn analytics_for(ids: &[u64]) -> Value {
        let episodes: Vec<Value> = ids
            .iter()
            .map(|id| json!({ "id": id, "title": format!("Episode {id}"), "downloads": [] }))
            .collect();
        json!({ "data": { "id": "31926", "type": "episodes_analytics", "attributes": { "episodes": episodes } } })
    }

    fn record(id: u64) -> Value {
        json!({
            "data": {
                "id": id.to_string(),
                "type": "episode",
                "attributes": { "title": format!("Episode {id}"), "status": "published" }
            }
        })
    }

    fn show_with(ids: &[u64]) -> MockHttpClient {
        let mut mock = MockHttpClient::default().respond("analytics/31926/episodes", 200, analytics_for(ids));
        for id in ids {
            mock = mock.respond(&format!("episodes/{id}"), 200, record(*id));
        }
        mock
    }

    /// Collects every event for later inspection
    #[derive(Default)]
    struct RecordingReporter {
        events: Mutex<Vec<ProgressEvent>>,
    }

    impl ProgressReporter for RecordingReporter {
        fn report(&self, event: ProgressEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn discovers_ids_in_order() {
        let client = TransistorClient::new(show_with(&[3, 1, 2]));
        let ids = Reconciler::new(&client).discover_all_ids("31926").await.unwrap();

        assert_eq!(ids, vec![EpisodeId::new("3"), EpisodeId::new("1"), EpisodeId::new("2")]);
        assert_eq!(client.http().requested_paths(), vec!["analytics/31926/episodes"]);
    }

    #[tokio::test]
    async fn empty_show_id_is_rejected_before_any_request() {
        let client = TransistorClient::new(MockHttpClient::default());
        let reconciler = Reconciler::new(&client);

        assert!(matches!(
            reconciler.discover_all_ids("").await,
            Err(ApiError::InvalidArgument(_))
        ));
        assert!(matches!(
            reconciler.fetch_all_full_records("   ").await,
            Err(ApiError::InvalidArgument(_))
        ));
        assert!(client.http().requested_paths().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn fetches_every_discovered_episode() {
        let ids: Vec<u64> = (1..=12).collect();
        let client = TransistorClient::new(show_with(&ids));

        let result = Reconciler::new(&client)
            .fetch_all_full_records("31926")
            .await
            .unwrap();

        assert_eq!(result.discovered, 12);
        assert_eq!(result.succeeded_count() + result.failed_count(), 12);
        assert!(result.is_complete());
        let fetched: Vec<&str> = result.succeeded.iter().map(|r| r.id.as_str()).collect();
        let expected: Vec<String> = ids.iter().map(u64::to_string).collect();
        assert_eq!(fetched, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_ids_are_fetched_once() {
        let mut mock = show_with(&[1, 2, 3]);
        mock = mock.respond("analytics/31926/episodes", 200, analytics_for(&[1, 2, 2, 3, 1]));
        let client = TransistorClient::new(mock);

        let result = Reconciler::new(&client)
            .fetch_all_full_records("31926")
            .await
            .unwrap();

        assert_eq!(result.discovered, 3);
        assert_eq!(result.succeeded_count(), 3);
        let fetches = client
            .http()
            .requested_paths()
            .into_iter()
            .filter(|p| p.starts_with("episodes/"))
            .count();
        assert_eq!(fetches, 3);

        let unique: HashSet<_> = result.succeeded.iter().map(|r| r.id.clone()).collect();
        assert_eq!(unique.len(), result.succeeded.len());
    }

    #[tokio::test]
    async fn discovery_failure_aborts_without_item_fetches() {
        let mock = MockHttpClient::default().respond("analytics/31926/episodes", 401, json!({}));
        let client = TransistorClient::new(mock);

        let err = Reconciler::new(&client)
            .fetch_all_full_records("31926")
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Authentication));
        assert_eq!(client.http().requested_paths(), vec!["analytics/31926/episodes"]);
    }

    #[tokio::test]
    async fn discovery_transport_failure_propagates() {
        let mock = MockHttpClient::default().break_path("analytics/31926/episodes");
        let client = TransistorClient::new(mock);

        let err = Reconciler::new(&client)
            .discover_all_ids("31926")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[tokio::test(start_paused = true)]
    async fn one_failed_episode_does_not_abort_the_run() {
        let ids: Vec<u64> = (1..=8).collect();
        let client = TransistorClient::new(show_with(&ids).break_path("episodes/5"));
        let reporter = Arc::new(RecordingReporter::default());

        let result = Reconciler::new(&client)
            .with_reporter(reporter.clone())
            .fetch_all_full_records("31926")
            .await
            .unwrap();

        assert_eq!(result.succeeded_count(), 7);
        assert_eq!(result.failed_count(), 1);
        assert_eq!(result.failed[0].id, EpisodeId::new("5"));
        assert_eq!(result.failed[0].kind, ErrorKind::Transport);
        assert!(!result.succeeded.iter().any(|r| r.id.as_str() == "5"));

        let events = reporter.events.lock().unwrap();
        assert!(matches!(
            events.last(),
            Some(ProgressEvent::ReconciliationCompleted {
                succeeded_count: 7,
                failed_count: 1
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_episode_is_recorded_as_not_found() {
        let mut mock = MockHttpClient::default().respond("analytics/31926/episodes", 200, analytics_for(&[1, 2]));
        mock = mock.respond("episodes/1", 200, record(1));
        let client = TransistorClient::new(mock);

        let result = Reconciler::new(&client)
            .fetch_all_full_records("31926")
            .await
            .unwrap();

        assert_eq!(result.succeeded_count(), 1);
        assert_eq!(result.failed[0].kind, ErrorKind::NotFound);
    }

    #[tokio::test(start_paused = true)]
    async fn sixty_five_episodes_despite_capped_listing() {
        let ids: Vec<u64> = (1..=65).collect();
        let first_page: Vec<Value> = ids[..CAPPED_PAGE_SIZE]
            .iter()
            .map(|id| record(*id)["data"].clone())
            .collect();
        let mock = show_with(&ids).respond(
            "episodes",
            200,
            json!({
                "data": first_page,
                "meta": { "currentPage": 1, "totalPages": 4, "totalCount": 65 }
            }),
        );
        let limiter = Arc::new(RateLimiter::new(10, Duration::from_secs(10)).unwrap());
        let client = TransistorClient::with_limiter(mock, limiter);
        let reconciler = Reconciler::new(&client);

        let capped = reconciler
            .list_capped("31926", &QueryFilters::default())
            .await
            .unwrap();
        assert_eq!(capped.data.len(), CAPPED_PAGE_SIZE);
        assert_eq!(capped.list_meta().and_then(|m| m.total_count), Some(65));

        let start = tokio::time::Instant::now();
        let result = reconciler.fetch_all_full_records("31926").await.unwrap();
        assert_eq!(result.succeeded_count(), 65);
        assert!(result.is_complete());

        // 1 listing + 1 discovery + 65 fetches at 10 per 10s
        assert_eq!(start.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn throttling_is_reported() {
        let ids: Vec<u64> = (1..=4).collect();
        let limiter = Arc::new(RateLimiter::new(2, Duration::from_secs(1)).unwrap());
        let client = TransistorClient::with_limiter(show_with(&ids), limiter);
        let reporter = Arc::new(RecordingReporter::default());

        Reconciler::new(&client)
            .with_reporter(reporter.clone())
            .fetch_all_full_records("31926")
            .await
            .unwrap();

        let events = reporter.events.lock().unwrap();
        let throttled = events
            .iter()
            .filter(|e| matches!(e, ProgressEvent::Throttled { .. }))
            .count();
        // discovery + 4 fetches = 5 requests at 2/s: waits before the 3rd and 5th
        assert_eq!(throttled, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn throttled_discovery_is_reported() {
        let limiter = Arc::new(RateLimiter::new(2, Duration::from_secs(5)).unwrap());
        limiter.acquire().await;
        limiter.acquire().await;
        let client = TransistorClient::with_limiter(show_with(&[1]), limiter);
        let reporter = Arc::new(RecordingReporter::default());

        let ids = Reconciler::new(&client)
            .with_reporter(reporter.clone())
            .discover_all_ids("31926")
            .await
            .unwrap();

        assert_eq!(ids, vec![EpisodeId::new("1")]);
        assert_eq!(client.limiter().in_window().await, 1);
        let events = reporter.events.lock().unwrap();
        assert!(matches!(events[0], ProgressEvent::Discovering { .. }));
        assert!(matches!(
            events[1],
            ProgressEvent::Throttled { waited } if waited == Duration::from_secs(5)
        ));
        assert!(matches!(events[2], ProgressEvent::Discovered { episode_count: 1, .. }));
    }

    #[test]
    fn result_document_summarises_failures() {
        let result = ReconciliationResult {
            show_id: "31926".to_string(),
            discovered: 2,
            succeeded: vec![serde_json::from_value(record(1)["data"].clone()).unwrap()],
            failed: vec![FailedEpisode {
                id: EpisodeId::new("2"),
                kind: ErrorKind::NotFound,
                message: "Resource not found: episodes/2".to_string(),
            }],
        };

        let doc = result.to_document();
        assert_eq!(doc.data.as_array().map(Vec::len), Some(1));
        let meta = doc.meta.unwrap();
        assert_eq!(meta["total_requested"], 2);
        assert_eq!(meta["successful"], 1);
        assert_eq!(meta["failed"], 1);
        assert_eq!(meta["failed_episodes"][0]["id"], "2");
        assert_eq!(meta["failed_episodes"][0]["kind"], "not_found");
    }

    #[test]
    fn estimate_scales_with_catalog_size() {
        let window = Duration::from_secs(10);
        assert_eq!(estimated_duration(0, 10, window), Duration::ZERO);
        assert_eq!(estimated_duration(10, 10, window), Duration::from_secs(10));
        assert_eq!(estimated_duration(65, 10, window), Duration::from_secs(70));
    }
}
