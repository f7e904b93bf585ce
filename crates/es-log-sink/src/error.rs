// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Fatal setup problems. Raised when the sink or its client is constructed and
/// never retried.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("authentication method not supported: `{0}`")]
    UnsupportedAuth(String),
    #[error("authentication `{strategy}` is unavailable: {reason}")]
    AuthUnavailable {
        strategy: &'static str,
        reason: String,
    },
    #[error("invalid host `{host}`: {reason}")]
    InvalidHost { host: String, reason: String },
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
    #[error("no tokio runtime available: {0}")]
    NoRuntime(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to load configuration: {0}")]
    Source(String),
}

/// Failures while shipping a batch. Recoverable: logged and rescheduled by
/// default, returned to the caller in fail-fast mode.
#[derive(Debug, Error)]
pub enum TransmissionError {
    #[error("no hosts configured")]
    NoHosts,
    #[error("invalid request url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} responded with {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
    #[error("{failed} of {total} documents were rejected by the backend")]
    Rejected { failed: usize, total: usize },
    #[error("failed to encode bulk payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to sign request: {0}")]
    Signing(String),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Transmission(#[from] TransmissionError),
}

impl SinkError {
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, SinkError::Configuration(_))
    }
}
