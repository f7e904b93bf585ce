// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::client::{BulkAction, BulkClient, BulkStats};
use crate::error::TransmissionError;

/// In-memory client that records every bulk request.
#[derive(Debug, Default)]
pub struct RecordingClient {
    batches: Mutex<Vec<Vec<BulkAction>>>,
    created: Mutex<Vec<(String, Value)>>,
    failing: AtomicBool,
    reachable: AtomicBool,
    delay_ms: AtomicU64,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl RecordingClient {
    pub fn new() -> Arc<Self> {
        let client = RecordingClient::default();
        client.reachable.store(true, Ordering::SeqCst);
        Arc::new(client)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Makes every bulk request take `delay`.
    pub fn set_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Most bulk requests ever in progress at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn batches(&self) -> Vec<Vec<BulkAction>> {
        self.batches.lock().expect("lock").clone()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches().iter().map(Vec::len).collect()
    }

    pub fn total_documents(&self) -> usize {
        self.batch_sizes().iter().sum()
    }

    pub fn created_indices(&self) -> Vec<(String, Value)> {
        self.created.lock().expect("lock").clone()
    }
}

#[async_trait]
impl BulkClient for RecordingClient {
    async fn bulk_index(&self, actions: Vec<BulkAction>) -> Result<BulkStats, TransmissionError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let result = self.record_batch(actions);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn ping(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    async fn create_index(&self, index: &str, body: &Value) -> Result<(), TransmissionError> {
        self.created
            .lock()
            .expect("lock")
            .push((index.to_string(), body.clone()));
        Ok(())
    }
}

impl RecordingClient {
    fn record_batch(&self, actions: Vec<BulkAction>) -> Result<BulkStats, TransmissionError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransmissionError::Status {
                url: "http://recording/_bulk".to_string(),
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        let indexed = actions.len();
        self.batches.lock().expect("lock").push(actions);
        Ok(BulkStats { indexed, failed: 0 })
    }
}
