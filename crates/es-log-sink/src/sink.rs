// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The buffered sink and its flush engine.
//!
//! # Triggers
//!
//! A flush runs when:
//! 1. an append brings the buffer to `buffer_size` (unless `timed_flush`)
//! 2. the deferred timer fires, `flush_interval` after the first unflushed append
//! 3. the caller invokes [`LogSink::flush`] or [`LogSink::close`]
//!
//! # Flush
//!
//! Flushes are single-flight. Each one cancels the armed timer, drains the
//! whole buffer and submits it as one bulk request against the index for the
//! current date. A failed submission drops the batch; by default the failure
//! is logged and the timer is re-armed, with `raise_on_indexing_exceptions`
//! it is returned to the caller instead. Client construction failures are
//! always returned and leave the buffer untouched.

use std::sync::Arc;

use serde_json::Value;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, error, warn};

use crate::buffer::LogBuffer;
use crate::client::provider::ClientProvider;
use crate::client::{BulkAction, BulkClient};
use crate::config::SinkConfig;
use crate::error::{ConfigurationError, SinkError};
use crate::normalizer::Normalizer;
use crate::record::LogRecord;
use crate::scheduler::FlushScheduler;
use crate::NormalizedEntry;

#[derive(Debug)]
struct SinkInner {
    config: Arc<SinkConfig>,
    normalizer: Normalizer,
    buffer: LogBuffer,
    scheduler: FlushScheduler,
    provider: ClientProvider,
    flush_lock: tokio::sync::Mutex<()>,
    runtime: Handle,
}

impl SinkInner {
    // Kept synchronous: the timer future calls `flush`, which calls back here.
    fn ensure_scheduled(self: &Arc<Self>) {
        let sink = Arc::downgrade(self);
        let armed = self.scheduler.ensure_scheduled(move || async move {
            let Some(sink) = sink.upgrade() else {
                return;
            };
            if let Err(e) = sink.flush().await {
                error!("Timed flush failed: {}", e);
            }
        });
        if armed {
            debug!("Flush scheduled in {:?}", self.scheduler.interval());
        }
    }

    fn should_flush_inline(&self, len: usize) -> bool {
        len >= self.config.buffer_size && !self.config.timed_flush
    }

    async fn flush(self: &Arc<Self>) -> Result<(), SinkError> {
        let _guard = self.flush_lock.lock().await;
        self.scheduler.cancel_if_armed();

        if self.buffer.is_empty() {
            return Ok(());
        }
        // Built before draining so a configuration failure loses nothing.
        let client = self.provider.get_client().await?;

        let batch = self.buffer.drain_all();
        let count = batch.len();
        let index = self
            .config
            .index_name_frequency
            .current_index_name(&self.config.index_name);
        let actions = batch
            .into_iter()
            .map(|source| BulkAction {
                index: index.clone(),
                doc_type: self.config.doc_type.clone(),
                source,
            })
            .collect();

        match client.bulk_index(actions).await {
            Ok(stats) => {
                debug!("Flushed {} log entries to {}", stats.indexed, index);
                Ok(())
            }
            Err(e) if self.config.raise_on_indexing_exceptions => Err(e.into()),
            Err(e) => {
                error!("Failed to send {} log entries to {}: {}", count, index, e);
                self.ensure_scheduled();
                Ok(())
            }
        }
    }
}

/// Buffered Elasticsearch sink. Cheap to clone; clones share one buffer.
#[derive(Debug, Clone)]
pub struct LogSink {
    inner: Arc<SinkInner>,
}

impl LogSink {
    /// Builds a sink that talks to the configured hosts. The HTTP client is
    /// created on the first flush. Must be called within a tokio runtime.
    ///
    /// With `include_host_fields`, the first sink in the process resolves the
    /// local hostname, which blocks. On a multi-threaded runtime that lookup
    /// runs under `block_in_place`.
    pub fn new(config: SinkConfig) -> Result<Self, ConfigurationError> {
        let config = Arc::new(config);
        let provider = ClientProvider::from_config(Arc::clone(&config));
        Self::with_provider(config, provider)
    }

    /// Builds a sink that submits through `client`.
    pub fn with_client(
        config: SinkConfig,
        client: Arc<dyn BulkClient>,
    ) -> Result<Self, ConfigurationError> {
        Self::with_provider(Arc::new(config), ClientProvider::fixed(client))
    }

    fn with_provider(
        config: Arc<SinkConfig>,
        provider: ClientProvider,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let runtime =
            Handle::try_current().map_err(|e| ConfigurationError::NoRuntime(e.to_string()))?;

        // host identity lookup blocks; keep it off the worker when we can
        let normalizer = match runtime.runtime_flavor() {
            RuntimeFlavor::CurrentThread => Normalizer::new(&config),
            _ => tokio::task::block_in_place(|| Normalizer::new(&config)),
        };

        // eviction must never precede the size trigger
        let capacity = config.max_buffered_entries.max(config.buffer_size);
        if capacity > config.max_buffered_entries {
            warn!(
                "max_buffered_entries {} is below buffer_size {}, buffering up to {}",
                config.max_buffered_entries, config.buffer_size, capacity
            );
        }

        let inner = SinkInner {
            normalizer,
            buffer: LogBuffer::new(capacity),
            scheduler: FlushScheduler::new(config.flush_interval, runtime.clone()),
            provider,
            flush_lock: tokio::sync::Mutex::new(()),
            runtime,
            config,
        };
        Ok(LogSink {
            inner: Arc::new(inner),
        })
    }

    #[must_use]
    pub fn config(&self) -> &SinkConfig {
        &self.inner.config
    }

    /// Normalizes and buffers `record`, flushing inline once the buffer is
    /// full.
    pub async fn append(&self, record: &LogRecord) -> Result<(), SinkError> {
        let entry = self.inner.normalizer.normalize(record);
        self.append_entry(entry).await
    }

    /// Buffers an already normalized entry.
    pub async fn append_entry(&self, entry: NormalizedEntry) -> Result<(), SinkError> {
        let len = self.inner.buffer.append(entry);
        if self.inner.should_flush_inline(len) {
            self.inner.flush().await
        } else {
            self.inner.ensure_scheduled();
            Ok(())
        }
    }

    /// Synchronous [`LogSink::append`]. A threshold flush runs on the sink's
    /// runtime and its failures are only logged.
    pub fn emit(&self, record: &LogRecord) {
        let len = self.inner.buffer.append(self.inner.normalizer.normalize(record));
        if self.inner.should_flush_inline(len) {
            let inner = Arc::clone(&self.inner);
            self.inner.runtime.spawn(async move {
                if let Err(e) = inner.flush().await {
                    error!("Flush failed: {}", e);
                }
            });
        } else {
            self.inner.ensure_scheduled();
        }
    }

    pub async fn flush(&self) -> Result<(), SinkError> {
        self.inner.flush().await
    }

    /// Runs a final flush if one is pending, then disarms the timer.
    pub async fn close(&self) -> Result<(), SinkError> {
        let result = if self.inner.scheduler.is_armed() {
            self.inner.flush().await
        } else {
            Ok(())
        };
        self.inner.scheduler.cancel_if_armed();
        result
    }

    /// Whether any configured host answers.
    pub async fn test_connection(&self) -> Result<bool, ConfigurationError> {
        let client = self.inner.provider.get_client().await?;
        Ok(client.ping().await)
    }

    /// Creates the base index with `mapping` as its body.
    pub async fn create_index_with_mapping(&self, mapping: &Value) -> Result<(), SinkError> {
        let client = self.inner.provider.get_client().await?;
        client
            .create_index(&self.inner.config.index_name, mapping)
            .await?;
        Ok(())
    }

    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.inner.buffer.len()
    }

    #[must_use]
    pub fn is_flush_scheduled(&self) -> bool {
        self.inner.scheduler.is_armed()
    }
}
