// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;

use crate::error::ApiError;

/// Date format the API expects for analytics ranges
pub const DATE_FORMAT: &str = "%d-%m-%Y";

/// Keys the listing endpoints reject with a client error
const PAGING_KEYS: &[&str] = &["per_page", "limit", "offset"];
const PAGING_PREFIXES: &[&str] = &["page", "pagination"];

const TYPED_KEYS: &[&str] = &["start_date", "end_date", "status", "query"];

/// A primitive value for an untyped query filter
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Text(s) => f.write_str(s),
            FilterValue::Integer(n) => write!(f, "{n}"),
            FilterValue::Float(n) => write!(f, "{n}"),
            FilterValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Integer(value)
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        FilterValue::Float(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

/// Query filters accepted by listing and analytics endpoints
///
/// Recognized keys are typed fields. Anything else goes through `extra`,
/// which is checked so that paging parameters never reach the provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryFilters {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Episode status, e.g. "published" or "draft"
    pub status: Option<String>,
    /// Free-text search
    pub query: Option<String>,
    /// Sparse fieldsets, as (resource type, comma separated field list)
    pub fields: Vec<(String, String)>,
    pub extra: BTreeMap<String, FilterValue>,
}

impl QueryFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn date_range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self {
            start_date: start,
            end_date: end,
            ..Self::default()
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Validate and flatten into query pairs
    pub fn to_query(&self) -> Result<Vec<(String, String)>, ApiError> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date)
            && start > end
        {
            return Err(ApiError::invalid(format!(
                "start date {} is after end date {}",
                start.format(DATE_FORMAT),
                end.format(DATE_FORMAT)
            )));
        }

        let mut query = Vec::new();
        if let Some(start) = self.start_date {
            query.push(("start_date".to_string(), start.format(DATE_FORMAT).to_string()));
        }
        if let Some(end) = self.end_date {
            query.push(("end_date".to_string(), end.format(DATE_FORMAT).to_string()));
        }
        if let Some(status) = &self.status {
            query.push(("status".to_string(), status.clone()));
        }
        if let Some(search) = &self.query {
            query.push(("query".to_string(), search.clone()));
        }
        for (resource, list) in &self.fields {
            query.push((format!("fields[{resource}]"), list.clone()));
        }

        for (key, value) in &self.extra {
            check_extra_key(key)?;
            query.push((key.clone(), value.to_string()));
        }

        Ok(query)
    }
}

fn check_extra_key(key: &str) -> Result<(), ApiError> {
    if key.trim().is_empty() {
        return Err(ApiError::invalid("filter key must not be empty"));
    }
    if PAGING_KEYS.contains(&key) || PAGING_PREFIXES.iter().any(|p| key.starts_with(p)) {
        return Err(ApiError::invalid(format!(
            "paging parameter '{key}' is rejected by the provider"
        )));
    }
    if TYPED_KEYS.contains(&key) || key.starts_with("fields[") || key == "show_id" {
        return Err(ApiError::invalid(format!(
            "'{key}' has a dedicated option and cannot be passed as a raw filter"
        )));
    }
    Ok(())
}

/// Parse a `dd-mm-yyyy` date
pub fn parse_date(value: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| ApiError::invalid(format!("invalid date '{value}' (expected dd-mm-yyyy): {e}")))
}
