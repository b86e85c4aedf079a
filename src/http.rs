// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderName, HeaderValue};
use tracing::debug;
use url::Url;

use crate::error::{ConfigError, TransportError};

/// Production API root
pub const DEFAULT_BASE_URL: &str = "https://api.transistor.fm/v1";

const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-api-key");

/// HTTP verbs used by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        })
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Request payload
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    /// A single file sent as a multipart form field
    File {
        field: String,
        file_name: String,
        bytes: Bytes,
    },
}

/// A request relative to the API root
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path below the API root, without a leading slash
    pub path: String,
    /// Query parameters in the order they are sent
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_json(mut self, body: serde_json::Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }
}

/// HTTP response with status and the full body
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP transport abstraction for testability
///
/// Implementations only move bytes. Status codes are interpreted by the
/// API client, so a non-2xx response is still `Ok` here.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> Result<HttpResponse, TransportError>;
}

/// Default transport using reqwest, authenticated with an API key
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
    base_url: Url,
    api_key: HeaderValue,
}

impl ReqwestClient {
    /// Create a client for the production API
    pub fn new(api_key: &str) -> Result<Self, ConfigError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a client for a custom API root
    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self, ConfigError> {
        let mut base = Url::parse(base_url).map_err(|e| ConfigError::InvalidBaseUrl {
            url: base_url.to_string(),
            source: e,
        })?;
        // Url::join drops the last segment unless the path ends with a slash
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut api_key = HeaderValue::from_str(api_key).map_err(|_| ConfigError::InvalidApiKey)?;
        api_key.set_sensitive(true);

        Ok(Self {
            client: reqwest::Client::new(),
            base_url: base,
            api_key,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve the absolute URL for a request, including its query string
    pub fn url_for(&self, request: &ApiRequest) -> Result<Url, TransportError> {
        let mut url = self.base_url.join(request.path.trim_start_matches('/'))?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }
        Ok(url)
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn execute(&self, request: ApiRequest) -> Result<HttpResponse, TransportError> {
        let url = self.url_for(&request)?;
        debug!(method = %request.method, %url, "sending request");

        let builder = self
            .client
            .request(request.method.into(), url.clone())
            .header(API_KEY_HEADER, self.api_key.clone())
            .header(ACCEPT, "application/json");

        let builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(value.to_string()),
            RequestBody::File {
                field,
                file_name,
                bytes,
            } => {
                let part = reqwest::multipart::Part::bytes(bytes.to_vec()).file_name(file_name);
                builder.multipart(reqwest::multipart::Form::new().part(field, part))
            }
        };

        let request_failed = |source| TransportError::Request {
            url: url.to_string(),
            source,
        };

        let response = builder.send().await.map_err(request_failed)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(request_failed)?;

        Ok(HttpResponse { status, body })
    }
}
