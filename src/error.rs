// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Errors raised below the API layer, while a request is being sent
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned by the API client
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Authentication failed, check your API key")]
    Authentication,

    #[error("Resource not found: {path}")]
    NotFound { path: String },

    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Provider rate limit exceeded (HTTP 429)")]
    RateLimitExceeded,

    #[error("API error {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Failed to decode response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    /// Coarse classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            ApiError::Authentication => ErrorKind::Authentication,
            ApiError::NotFound { .. } => ErrorKind::NotFound,
            ApiError::Validation { .. } => ErrorKind::Validation,
            ApiError::RateLimitExceeded => ErrorKind::RateLimitExceeded,
            ApiError::Provider { .. } => ErrorKind::Provider,
            ApiError::Transport(_) => ErrorKind::Transport,
            ApiError::Decode { .. } => ErrorKind::Decode,
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        ApiError::InvalidArgument(message.into())
    }
}

/// Error classification carried in failure lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidArgument,
    Authentication,
    NotFound,
    Validation,
    RateLimitExceeded,
    Provider,
    Transport,
    Decode,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::Authentication => "authentication",
            ErrorKind::NotFound => "not found",
            ErrorKind::Validation => "validation",
            ErrorKind::RateLimitExceeded => "rate limit exceeded",
            ErrorKind::Provider => "provider",
            ErrorKind::Transport => "transport",
            ErrorKind::Decode => "decode",
        };
        f.write_str(name)
    }
}

/// Errors raised while building a client or limiter from configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Rate limit must allow at least one request per window")]
    ZeroRequests,

    #[error("Rate limit window must be longer than zero")]
    ZeroWindow,

    #[error("Invalid base URL '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("API key contains characters not allowed in an HTTP header")]
    InvalidApiKey,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(ApiError::Authentication.kind(), ErrorKind::Authentication);
        assert_eq!(
            ApiError::Provider {
                status: 500,
                message: "boom".to_string()
            }
            .kind(),
            ErrorKind::Provider
        );
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert_eq!(
            ApiError::from(TransportError::from(io)).kind(),
            ErrorKind::Transport
        );
    }

    #[test]
    fn kind_serializes_as_snake_case() {
        let json = serde_json::to_string(&ErrorKind::RateLimitExceeded).unwrap();
        assert_eq!(json, "\"rate_limit_exceeded\"");
    }
}
