// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Thread-safe FIFO buffer of normalized entries.
//!
//! Producers append while a flush drains; both take the same short-lived
//! lock, so every entry ends up in exactly one drained batch. The buffer is
//! bounded: once `max_entries` is reached the oldest entry is evicted.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

use crate::NormalizedEntry;

#[derive(Debug)]
pub struct LogBuffer {
    entries: Mutex<VecDeque<NormalizedEntry>>,
    max_entries: usize,
}

impl LogBuffer {
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        LogBuffer {
            entries: Mutex::new(VecDeque::new()),
            max_entries: max_entries.max(1),
        }
    }

    // A panicking producer must not wedge every later flush.
    fn lock(&self) -> MutexGuard<'_, VecDeque<NormalizedEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Appends an entry and returns the buffer length afterwards.
    pub fn append(&self, entry: NormalizedEntry) -> usize {
        let (len, evicted) = {
            let mut entries = self.lock();
            let evicted = if entries.len() >= self.max_entries {
                entries.pop_front();
                true
            } else {
                false
            };
            entries.push_back(entry);
            (entries.len(), evicted)
        };

        if evicted {
            warn!(
                "Log buffer full ({} entries), dropping oldest entry",
                self.max_entries
            );
        }
        len
    }

    /// Takes every buffered entry in insertion order, leaving the buffer empty.
    pub fn drain_all(&self) -> Vec<NormalizedEntry> {
        let mut entries = self.lock();
        std::mem::take(&mut *entries).into()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    #[must_use]
    pub fn capacity_limit(&self) -> usize {
        self.max_entries
    }
}
