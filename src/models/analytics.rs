// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::filters::DATE_FORMAT;

use super::EpisodeId;

/// Per-episode analytics for a whole show
///
/// Unlike the episode listing, this payload is not capped and lists every
/// episode of the show.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpisodesAnalytics {
    #[serde(default)]
    pub attributes: EpisodesAnalyticsAttributes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpisodesAnalyticsAttributes {
    #[serde(default)]
    pub episodes: Vec<EpisodeDownloads>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeDownloads {
    pub id: EpisodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub downloads: Vec<DailyDownloads>,
}

impl EpisodeDownloads {
    pub fn total_downloads(&self) -> u64 {
        self.downloads.iter().map(|day| day.downloads).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyDownloads {
    pub date: String,
    pub downloads: u64,
}

impl DailyDownloads {
    pub fn day(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.date, DATE_FORMAT).ok()
    }
}
