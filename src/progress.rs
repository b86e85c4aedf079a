use std::sync::Arc;
use std::time::Duration;

use crate::error::ErrorKind;
use crate::models::EpisodeId;

/// Events emitted during a reconciliation run for progress reporting
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// The discovery request for a show is being sent
    Discovering { show_id: String },

    /// Discovery finished
    Discovered { show_id: String, episode_count: usize },

    /// The client-side limiter suspended the run
    Throttled { waited: Duration },

    /// A per-episode fetch is starting
    FetchingEpisode {
        episode_id: EpisodeId,
        /// Position of this episode in discovery order
        episode_index: usize,
        total_episodes: usize,
    },

    /// A per-episode fetch succeeded
    EpisodeFetched {
        episode_id: EpisodeId,
        title: Option<String>,
    },

    /// A per-episode fetch failed; the run continues
    EpisodeFailed {
        episode_id: EpisodeId,
        kind: ErrorKind,
        error: String,
    },

    /// The run finished
    ReconciliationCompleted {
        succeeded_count: usize,
        failed_count: usize,
    },
}

/// Trait for reporting progress events during reconciliation.
///
/// Implementations can use this to display progress bars, log messages,
/// or collect statistics.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {
        // Intentionally empty
    }
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}
