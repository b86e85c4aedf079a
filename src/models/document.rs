// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// A JSON:API response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document<T = Value> {
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub included: Option<Vec<Value>>,
}

impl<T> Document<T> {
    /// Paging metadata of a list response, if present
    pub fn list_meta(&self) -> Option<ListMeta> {
        self.meta
            .as_ref()
            .and_then(|meta| serde_json::from_value(meta.clone()).ok())
    }
}

/// Paging metadata returned by list endpoints
///
/// The listing endpoint reports `totalCount` and `totalPages` for the whole
/// show but ignores every paging parameter, so only the first page is ever
/// reachable through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMeta {
    #[serde(default)]
    pub current_page: Option<u32>,
    #[serde(default)]
    pub total_pages: Option<u32>,
    #[serde(default)]
    pub total_count: Option<u64>,
}

/// Wrap attributes into a `{ data: { type, attributes } }` request body
pub fn resource_body<A: Serialize>(kind: &str, attributes: &A) -> Value {
    json!({
        "data": {
            "type": kind,
            "attributes": attributes,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_meta_reads_camel_case() {
        let doc: Document = serde_json::from_value(json!({
            "data": [],
            "meta": { "currentPage": 1, "totalPages": 4, "totalCount": 65 }
        }))
        .unwrap();

        assert_eq!(
            doc.list_meta(),
            Some(ListMeta {
                current_page: Some(1),
                total_pages: Some(4),
                total_count: Some(65),
            })
        );
    }

    #[test]
    fn missing_meta_is_none() {
        let doc: Document = serde_json::from_value(json!({ "data": {} })).unwrap();
        assert!(doc.list_meta().is_none());
    }

    #[test]
    fn resource_body_wraps_attributes() {
        let body = resource_body("show", &json!({ "title": "My Podcast" }));
        assert_eq!(
            body,
            json!({ "data": { "type": "show", "attributes": { "title": "My Podcast" } } })
        );
    }
}
