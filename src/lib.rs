pub mod client;
pub mod error;
pub mod filters;
pub mod http;
pub mod limiter;
pub mod models;
pub mod progress;
pub mod reconcile;
pub mod render;

// Re-export main types for convenience
pub use client::{ClientConfig, ListingShape, TransistorClient};
pub use error::{ApiError, ConfigError, ErrorKind, TransportError};
pub use filters::{FilterValue, QueryFilters, parse_date};
pub use http::{ApiRequest, HttpClient, HttpResponse, Method, ReqwestClient, RequestBody};
pub use limiter::RateLimiter;
pub use models::{Document, EpisodeId, EpisodeRecord, EpisodesAnalytics, ListMeta};
pub use progress::{NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter};
pub use reconcile::{
    CAPPED_PAGE_SIZE, FailedEpisode, ReconciliationResult, Reconciler, estimated_duration,
};
