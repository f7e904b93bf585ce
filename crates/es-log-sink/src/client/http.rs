// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! `reqwest` implementation of [`BulkClient`].
//!
//! Hosts are tried in configuration order. A request that fails to reach a
//! host (connect error, timeout) moves on to the next one; any HTTP response
//! ends the attempt.

use core::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::client::auth::AuthStrategy;
use crate::client::{BulkAction, BulkClient, BulkStats};
use crate::config::{Host, SinkConfig};
use crate::error::{ConfigurationError, TransmissionError};

const NDJSON: &str = "application/x-ndjson";
const JSON: &str = "application/json";
const INDEX_EXISTS: &str = "resource_already_exists_exception";

fn build_client(config: &SinkConfig) -> Result<reqwest::Client, reqwest::Error> {
    let client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .pool_idle_timeout(Some(Duration::from_secs(270)))
        .tcp_keepalive(Some(Duration::from_secs(120)));

    #[cfg(feature = "tls")]
    let client = client.danger_accept_invalid_certs(!config.verify_certs);

    client.build()
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<Value>,
}

impl BulkResponse {
    /// Items carry one object keyed by the action name (`index`).
    fn failed_items(&self) -> impl Iterator<Item = &Value> {
        self.items.iter().filter_map(|item| {
            let result = item.as_object()?.values().next()?;
            let failed = result.get("error").is_some()
                || result
                    .get("status")
                    .and_then(Value::as_u64)
                    .is_some_and(|status| status >= 300);
            failed.then_some(result)
        })
    }
}

#[derive(Debug)]
pub struct ElasticsearchClient {
    client: reqwest::Client,
    hosts: Vec<Host>,
    auth: AuthStrategy,
}

impl ElasticsearchClient {
    pub fn new(config: &SinkConfig) -> Result<Self, ConfigurationError> {
        let auth = AuthStrategy::from_settings(&config.auth)?;
        if config.hosts.is_empty() {
            return Err(ConfigurationError::Invalid(
                "at least one host must be configured".to_string(),
            ));
        }
        let client =
            build_client(config).map_err(|e| ConfigurationError::HttpClient(e.to_string()))?;
        debug!(
            "Elasticsearch client built for {} host(s) with {} authentication",
            config.hosts.len(),
            auth.name()
        );
        Ok(ElasticsearchClient {
            client,
            hosts: config.hosts.clone(),
            auth,
        })
    }

    #[must_use]
    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    async fn send_to_host(
        &self,
        host: &Host,
        method: &Method,
        path: &str,
        body: &[u8],
        content_type: &str,
    ) -> Result<reqwest::Response, TransmissionError> {
        let raw_url = format!("{}{path}", host.url());
        let url = Url::parse(&raw_url).map_err(|e| TransmissionError::InvalidUrl {
            url: raw_url.clone(),
            reason: e.to_string(),
        })?;

        let mut request = self.client.request(method.clone(), url.clone());
        if !body.is_empty() {
            request = request
                .header(CONTENT_TYPE, content_type)
                .body(body.to_vec());
        }
        let request = self.auth.apply(request, method, &url, body)?;

        request
            .send()
            .await
            .map_err(|source| TransmissionError::Request {
                url: raw_url,
                source,
            })
    }

    /// Sends to the first host that answers.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: &[u8],
        content_type: &str,
    ) -> Result<(String, reqwest::Response), TransmissionError> {
        let mut last_error = TransmissionError::NoHosts;
        for host in &self.hosts {
            match self
                .send_to_host(host, &method, path, body, content_type)
                .await
            {
                Ok(response) => return Ok((host.url(), response)),
                Err(e @ TransmissionError::Request { .. }) => {
                    warn!("{}, trying next host", e);
                    last_error = e;
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error)
    }

    fn encode_bulk(actions: &[BulkAction]) -> Result<Vec<u8>, TransmissionError> {
        let mut body = Vec::new();
        for action in actions {
            let mut meta = json!({ "_index": action.index });
            if let Some(doc_type) = &action.doc_type {
                meta["_type"] = Value::from(doc_type.as_str());
            }
            serde_json::to_writer(&mut body, &json!({ "index": meta }))?;
            body.push(b'\n');
            serde_json::to_writer(&mut body, &action.source)?;
            body.push(b'\n');
        }
        Ok(body)
    }
}

async fn read_body(url: &str, response: reqwest::Response) -> Result<Vec<u8>, TransmissionError> {
    response
        .bytes()
        .await
        .map(|bytes| bytes.to_vec())
        .map_err(|source| TransmissionError::Request {
            url: url.to_string(),
            source,
        })
}

#[async_trait]
impl BulkClient for ElasticsearchClient {
    async fn bulk_index(&self, actions: Vec<BulkAction>) -> Result<BulkStats, TransmissionError> {
        if actions.is_empty() {
            return Ok(BulkStats::default());
        }
        let total = actions.len();
        let body = Self::encode_bulk(&actions)?;

        let (host, response) = self.send(Method::POST, "/_bulk", &body, NDJSON).await?;
        let url = format!("{host}/_bulk");
        let status = response.status();
        let bytes = read_body(&url, response).await?;
        if !status.is_success() {
            return Err(TransmissionError::Status {
                url,
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        let parsed: BulkResponse = serde_json::from_slice(&bytes)?;
        if parsed.errors {
            let failed: Vec<&Value> = parsed.failed_items().collect();
            if let Some(first) = failed.first() {
                debug!("First rejected document: {}", first);
            }
            let failed = failed.len().max(1);
            return Err(TransmissionError::Rejected { failed, total });
        }

        debug!("Indexed {} documents through {}", total, host);
        Ok(BulkStats {
            indexed: total,
            failed: 0,
        })
    }

    async fn ping(&self) -> bool {
        for host in &self.hosts {
            match self.send_to_host(host, &Method::HEAD, "/", &[], JSON).await {
                Ok(response) if response.status().is_success() => return true,
                Ok(response) => debug!("Ping to {} returned {}", host, response.status()),
                Err(e) => debug!("Ping to {} failed: {}", host, e),
            }
        }
        false
    }

    async fn create_index(&self, index: &str, body: &Value) -> Result<(), TransmissionError> {
        let payload = serde_json::to_vec(body)?;
        let path = format!("/{index}");
        let (host, response) = self.send(Method::PUT, &path, &payload, JSON).await?;
        let url = format!("{host}{path}");
        let status = response.status();
        if status.is_success() {
            debug!("Created index {}", index);
            return Ok(());
        }

        let text = String::from_utf8_lossy(&read_body(&url, response).await?).into_owned();
        if status == StatusCode::BAD_REQUEST && text.contains(INDEX_EXISTS) {
            debug!("Index {} already exists", index);
            return Ok(());
        }
        Err(TransmissionError::Status {
            url,
            status: status.as_u16(),
            body: text,
        })
    }
}
