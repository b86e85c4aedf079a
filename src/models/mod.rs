mod analytics;
mod document;
mod episode;

pub use analytics::{DailyDownloads, EpisodeDownloads, EpisodesAnalytics, EpisodesAnalyticsAttributes};
pub use document::{Document, ListMeta, resource_body};
pub use episode::{EpisodeAttributes, EpisodeId, EpisodeRecord, ShowAttributes};
