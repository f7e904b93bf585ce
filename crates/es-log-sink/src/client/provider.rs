// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Lazily built, shared backend client.
//!
//! The HTTP client is created on first use and then reused by every flush.
//! A construction failure is returned to that caller and retried on the next
//! call; nothing is cached until a client exists.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::debug;

use crate::client::http::ElasticsearchClient;
use crate::client::BulkClient;
use crate::config::SinkConfig;
use crate::error::ConfigurationError;

enum ClientSource {
    Http(Arc<SinkConfig>),
    Fixed(Arc<dyn BulkClient>),
}

pub struct ClientProvider {
    source: ClientSource,
    client: OnceCell<Arc<dyn BulkClient>>,
}

impl std::fmt::Debug for ClientProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = match self.source {
            ClientSource::Http(_) => "http",
            ClientSource::Fixed(_) => "fixed",
        };
        f.debug_struct("ClientProvider")
            .field("source", &source)
            .field("initialized", &self.client.initialized())
            .finish()
    }
}

impl ClientProvider {
    #[must_use]
    pub fn from_config(config: Arc<SinkConfig>) -> Self {
        ClientProvider {
            source: ClientSource::Http(config),
            client: OnceCell::new(),
        }
    }

    /// Always hands out `client`.
    #[must_use]
    pub fn fixed(client: Arc<dyn BulkClient>) -> Self {
        ClientProvider {
            source: ClientSource::Fixed(client),
            client: OnceCell::new(),
        }
    }

    pub async fn get_client(&self) -> Result<Arc<dyn BulkClient>, ConfigurationError> {
        self.client
            .get_or_try_init(|| async {
                match &self.source {
                    ClientSource::Http(config) => {
                        debug!("Building Elasticsearch client");
                        let client: Arc<dyn BulkClient> =
                            Arc::new(ElasticsearchClient::new(config)?);
                        Ok::<_, ConfigurationError>(client)
                    }
                    ClientSource::Fixed(client) => Ok(Arc::clone(client)),
                }
            })
            .await
            .map(Arc::clone)
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.client.initialized()
    }
}
