// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::filters::QueryFilters;
use crate::http::{ApiRequest, HttpClient, HttpResponse, Method, RequestBody};
use crate::limiter::RateLimiter;
use crate::models::{
    Document, EpisodeAttributes, EpisodeId, EpisodeRecord, EpisodesAnalytics, ShowAttributes,
    resource_body,
};
use crate::reconcile::{ReconciliationResult, Reconciler};

/// How the primary episode listing is scoped to one show
///
/// The provider has accepted both shapes at different times, so this is the
/// single place that decides it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingShape {
    /// `GET episodes?<name>=<show_id>`
    QueryParam(String),
    /// `GET shows/<show_id>/episodes`
    PathSegment,
}

impl Default for ListingShape {
    fn default() -> Self {
        ListingShape::QueryParam("show_id".to_string())
    }
}

impl ListingShape {
    fn listing_request(&self, show_id: Option<&str>, mut query: Vec<(String, String)>) -> ApiRequest {
        match (self, show_id) {
            (ListingShape::QueryParam(name), Some(show_id)) => {
                query.insert(0, (name.clone(), show_id.to_string()));
                ApiRequest::get("episodes").with_query(query)
            }
            (ListingShape::PathSegment, Some(show_id)) => {
                ApiRequest::get(format!("shows/{show_id}/episodes")).with_query(query)
            }
            (_, None) => ApiRequest::get("episodes").with_query(query),
        }
    }
}

/// Client-level options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientConfig {
    pub listing_shape: ListingShape,
}

/// Client for the Transistor.fm API
///
/// Every request made through the public methods first passes the shared
/// rate limiter, then has its status mapped onto [`ApiError`]. Provider
/// 429 responses are surfaced as [`ApiError::RateLimitExceeded`] and never
/// retried.
pub struct TransistorClient<C: HttpClient> {
    http: C,
    limiter: Arc<RateLimiter>,
    config: ClientConfig,
}

impl<C: HttpClient> TransistorClient<C> {
    pub fn new(http: C) -> Self {
        Self::with_limiter(http, Arc::new(RateLimiter::transistor_default()))
    }

    /// Create a client that draws from an existing limiter
    pub fn with_limiter(http: C, limiter: Arc<RateLimiter>) -> Self {
        Self {
            http,
            limiter,
            config: ClientConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn http(&self) -> &C {
        &self.http
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Send a request through the limiter and decode the envelope
    pub async fn request<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<Document<T>, ApiError> {
        self.limiter.acquire().await;
        self.dispatch(request).await
    }

    /// Send a request without consulting the limiter.
    ///
    /// The caller must already hold a slot from [`Self::limiter`].
    pub(crate) async fn dispatch<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<Document<T>, ApiError> {
        let path = request.path.clone();
        debug!(method = %request.method, path = %path, "api request");

        let response = self.http.execute(request).await?;
        check_status(&path, &response)?;

        let body = if response.body.iter().all(u8::is_ascii_whitespace) {
            Bytes::from_static(br#"{"data":null}"#)
        } else {
            response.body
        };

        serde_json::from_slice(&body).map_err(|source| ApiError::Decode { path, source })
    }

    // Account

    pub async fn get_account(&self) -> Result<Document, ApiError> {
        self.request(ApiRequest::get("")).await
    }

    // Shows

    pub async fn list_shows(&self, filters: &QueryFilters) -> Result<Document, ApiError> {
        self.request(ApiRequest::get("shows").with_query(filters.to_query()?))
            .await
    }

    pub async fn get_show(&self, show_id: &str) -> Result<Document, ApiError> {
        let show_id = require_id("show id", show_id)?;
        self.request(ApiRequest::get(format!("shows/{show_id}")))
            .await
    }

    pub async fn create_show(&self, attributes: &ShowAttributes) -> Result<Document, ApiError> {
        if attributes.title.as_deref().is_none_or(|t| t.trim().is_empty()) {
            return Err(ApiError::invalid("a show needs a title"));
        }
        self.request(ApiRequest::new(Method::Post, "shows").with_json(resource_body("show", attributes)))
            .await
    }

    pub async fn update_show(
        &self,
        show_id: &str,
        attributes: &ShowAttributes,
    ) -> Result<Document, ApiError> {
        let show_id = require_id("show id", show_id)?;
        self.request(
            ApiRequest::new(Method::Patch, format!("shows/{show_id}"))
                .with_json(resource_body("show", attributes)),
        )
        .await
    }

    pub async fn delete_show(&self, show_id: &str) -> Result<Document, ApiError> {
        let show_id = require_id("show id", show_id)?;
        self.request(ApiRequest::new(Method::Delete, format!("shows/{show_id}")))
            .await
    }

    // Episodes

    /// List episodes through the primary listing endpoint.
    ///
    /// The provider returns at most one page of 20 episodes here, while
    /// `meta.totalCount` reports the real total. Use
    /// [`Self::get_all_episodes_full_data`] for the complete set.
    pub async fn list_episodes(
        &self,
        show_id: Option<&str>,
        filters: &QueryFilters,
    ) -> Result<Document<Vec<EpisodeRecord>>, ApiError> {
        let show_id = show_id.map(|id| require_id("show id", id)).transpose()?;
        let request = self
            .config
            .listing_shape
            .listing_request(show_id, filters.to_query()?);

        let doc: Document<Vec<EpisodeRecord>> = self.request(request).await?;
        if let Some(total) = doc.list_meta().and_then(|meta| meta.total_count)
            && total > doc.data.len() as u64
        {
            warn!(
                returned = doc.data.len(),
                total, "episode listing is capped, use the full reconciliation for all episodes"
            );
        }
        Ok(doc)
    }

    pub async fn get_episode(&self, episode_id: &EpisodeId) -> Result<Document<EpisodeRecord>, ApiError> {
        self.request(episode_request(episode_id)?).await
    }

    /// Fetch one episode using a limiter slot the caller already holds
    pub(crate) async fn fetch_episode_unthrottled(
        &self,
        episode_id: &EpisodeId,
    ) -> Result<Document<EpisodeRecord>, ApiError> {
        self.dispatch(episode_request(episode_id)?).await
    }

    pub async fn create_episode(
        &self,
        show_id: &str,
        attributes: &EpisodeAttributes,
    ) -> Result<Document<EpisodeRecord>, ApiError> {
        let show_id = require_id("show id", show_id)?;
        if attributes.title.as_deref().is_none_or(|t| t.trim().is_empty()) {
            return Err(ApiError::invalid("an episode needs a title"));
        }
        self.request(
            ApiRequest::new(Method::Post, format!("shows/{show_id}/episodes"))
                .with_json(resource_body("episode", attributes)),
        )
        .await
    }

    pub async fn update_episode(
        &self,
        episode_id: &EpisodeId,
        attributes: &EpisodeAttributes,
    ) -> Result<Document<EpisodeRecord>, ApiError> {
        let episode_id = require_id("episode id", episode_id.as_str())?;
        self.request(
            ApiRequest::new(Method::Patch, format!("episodes/{episode_id}"))
                .with_json(resource_body("episode", attributes)),
        )
        .await
    }

    pub async fn delete_episode(&self, episode_id: &EpisodeId) -> Result<Document, ApiError> {
        let episode_id = require_id("episode id", episode_id.as_str())?;
        self.request(ApiRequest::new(Method::Delete, format!("episodes/{episode_id}")))
            .await
    }

    pub async fn publish_episode(&self, episode_id: &EpisodeId) -> Result<Document, ApiError> {
        let episode_id = require_id("episode id", episode_id.as_str())?;
        self.request(ApiRequest::new(Method::Patch, format!("episodes/{episode_id}/publish")))
            .await
    }

    pub async fn unpublish_episode(&self, episode_id: &EpisodeId) -> Result<Document, ApiError> {
        let episode_id = require_id("episode id", episode_id.as_str())?;
        self.request(ApiRequest::new(
            Method::Patch,
            format!("episodes/{episode_id}/unpublish"),
        ))
        .await
    }

    /// Every episode id of a show, bypassing the listing cap
    pub async fn get_all_episode_ids(&self, show_id: &str) -> Result<Vec<EpisodeId>, ApiError> {
        Reconciler::new(self).discover_all_ids(show_id).await
    }

    /// Full records of every episode of a show.
    ///
    /// Costs one request per episode plus one, throttled to the limiter's
    /// quota. Failed episodes are reported in the result instead of
    /// aborting the run.
    pub async fn get_all_episodes_full_data(
        &self,
        show_id: &str,
    ) -> Result<ReconciliationResult, ApiError> {
        Reconciler::new(self).fetch_all_full_records(show_id).await
    }

    // Analytics

    pub async fn get_analytics(
        &self,
        analytics_id: &str,
        filters: &QueryFilters,
    ) -> Result<Document, ApiError> {
        let analytics_id = require_id("analytics id", analytics_id)?;
        self.request(ApiRequest::get(format!("analytics/{analytics_id}")).with_query(filters.to_query()?))
            .await
    }

    /// Daily downloads for a show, the last 14 days unless a range is given
    pub async fn get_show_analytics(
        &self,
        show_id: &str,
        filters: &QueryFilters,
    ) -> Result<Document, ApiError> {
        let show_id = require_id("show id", show_id)?;
        self.request(ApiRequest::get(format!("analytics/{show_id}")).with_query(filters.to_query()?))
            .await
    }

    /// Downloads for every episode of a show, the last 7 days unless a range is given
    pub async fn get_all_episodes_analytics(
        &self,
        show_id: &str,
        filters: &QueryFilters,
    ) -> Result<Document<EpisodesAnalytics>, ApiError> {
        self.request(episodes_analytics_request(show_id, filters)?).await
    }

    /// Per-episode analytics of a show, for a caller already holding a slot
    pub(crate) async fn discover_unthrottled(
        &self,
        show_id: &str,
    ) -> Result<Document<EpisodesAnalytics>, ApiError> {
        self.dispatch(episodes_analytics_request(show_id, &QueryFilters::default())?)
            .await
    }

    pub async fn get_episode_analytics(
        &self,
        episode_id: &EpisodeId,
        filters: &QueryFilters,
    ) -> Result<Document, ApiError> {
        let episode_id = require_id("episode id", episode_id.as_str())?;
        self.request(
            ApiRequest::get(format!("analytics/episodes/{episode_id}"))
                .with_query(filters.to_query()?),
        )
        .await
    }

    // Private subscribers

    pub async fn list_subscribers(
        &self,
        show_id: &str,
        filters: &QueryFilters,
    ) -> Result<Document, ApiError> {
        let show_id = require_id("show id", show_id)?;
        self.request(
            ApiRequest::get(format!("shows/{show_id}/private_subscribers"))
                .with_query(filters.to_query()?),
        )
        .await
    }

    pub async fn create_subscriber(&self, show_id: &str, email: &str) -> Result<Document, ApiError> {
        let show_id = require_id("show id", show_id)?;
        if !email.contains('@') {
            return Err(ApiError::invalid(format!("'{email}' is not an email address")));
        }
        self.request(
            ApiRequest::new(Method::Post, format!("shows/{show_id}/private_subscribers"))
                .with_json(resource_body("private_subscriber", &json!({ "email": email }))),
        )
        .await
    }

    pub async fn delete_subscriber(
        &self,
        show_id: &str,
        subscriber_id: &str,
    ) -> Result<Document, ApiError> {
        let show_id = require_id("show id", show_id)?;
        let subscriber_id = require_id("subscriber id", subscriber_id)?;
        self.request(ApiRequest::new(
            Method::Delete,
            format!("shows/{show_id}/private_subscribers/{subscriber_id}"),
        ))
        .await
    }

    // Uploads

    /// Upload an audio file as the `audio_file` multipart field
    pub async fn upload_audio(&self, path: &Path) -> Result<Document, ApiError> {
        if !path.is_file() {
            return Err(ApiError::invalid(format!(
                "audio file {} not found",
                path.display()
            )));
        }
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| ApiError::invalid(format!("{} has no file name", path.display())))?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ApiError::Transport(e.into()))?;

        self.request(ApiRequest::new(Method::Post, "uploads").with_body(RequestBody::File {
            field: "audio_file".to_string(),
            file_name,
            bytes: Bytes::from(bytes),
        }))
        .await
    }
}

fn episodes_analytics_request(
    show_id: &str,
    filters: &QueryFilters,
) -> Result<ApiRequest, ApiError> {
    let show_id = require_id("show id", show_id)?;
    Ok(ApiRequest::get(format!("analytics/{show_id}/episodes")).with_query(filters.to_query()?))
}

fn episode_request(episode_id: &EpisodeId) -> Result<ApiRequest, ApiError> {
    let episode_id = require_id("episode id", episode_id.as_str())?;
    Ok(ApiRequest::get(format!("episodes/{episode_id}")))
}

/// Reject identifiers that are empty or would change the request path
pub(crate) fn require_id<'a>(what: &str, id: &'a str) -> Result<&'a str, ApiError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ApiError::invalid(format!("{what} must not be empty")));
    }
    if id.contains(['/', '?', '#', '%']) || id.chars().any(char::is_whitespace) {
        return Err(ApiError::invalid(format!("{what} '{id}' contains invalid characters")));
    }
    // Dot segments are collapsed when the path is joined onto the base URL
    if id == "." || id == ".." {
        return Err(ApiError::invalid(format!("{what} '{id}' is not a valid identifier")));
    }
    Ok(id)
}

fn check_status(path: &str, response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }

    match response.status {
        401 => Err(ApiError::Authentication),
        404 => Err(ApiError::NotFound {
            path: path.to_string(),
        }),
        422 => Err(ApiError::Validation {
            message: error_message(&response.body),
        }),
        429 => Err(ApiError::RateLimitExceeded),
        status => Err(ApiError::Provider {
            status,
            message: error_message(&response.body),
        }),
    }
}

/// Pull a readable message out of an error body
fn error_message(body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        let first = value.get("errors").and_then(|errors| errors.get(0));
        let detail = first
            .and_then(|e| e.get("detail").or_else(|| e.get("title")))
            .and_then(Value::as_str);
        if let Some(detail) = detail {
            return detail.to_string();
        }
        if let Some(message) = value.get("message").and_then(Value::as_str) {
            return message.to_string();
        }
    }

    let text = String::from_utf8_lossy(body).trim().to_string();
    if text.is_empty() {
        "no error details".to_string()
    } else {
        text
    }
}
