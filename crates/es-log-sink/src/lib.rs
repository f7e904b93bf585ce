// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Buffered log sink for Elasticsearch.
//!
//! Structured log records are normalized into flat JSON documents, held in an
//! in-memory buffer and shipped to the cluster through the `_bulk` API, either
//! when the buffer reaches its size threshold or when a deferred flush timer
//! fires.
//!
//! # Architecture
//!
//! ```text
//!   producers (append / emit / SinkLayer)
//!          │
//!          v
//!   ┌──────────────┐
//!   │  Normalizer  │  (static fields, deny-list, timestamp)
//!   └──────┬───────┘
//!          │
//!          v
//!   ┌──────────────┐   size >= threshold   ┌──────────────┐
//!   │  LogBuffer   │ ─────────────────────>│  LogSink     │
//!   └──────┬───────┘                       │  flush       │
//!          │ otherwise                     └──────┬───────┘
//!          v                                      │
//!   ┌──────────────┐   timer fires                │
//!   │FlushScheduler│ ─────────────────────────────┤
//!   └──────────────┘                              v
//!                                          ┌──────────────┐
//!                                          │ClientProvider│ ──> _bulk
//!                                          └──────────────┘
//! ```
//!
//! # Delivery guarantee
//!
//! Delivery is best-effort. A batch whose transmission fails is dropped; only
//! the opportunity to flush again later is preserved by re-arming the timer.
//! Unless `raise_on_indexing_exceptions` is set, transmission failures are
//! reported through `tracing` and never reach the producer.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod buffer;
pub mod client;
pub mod config;
pub mod error;
pub mod hostname;
pub mod index_name;
pub mod layer;
pub mod normalizer;
pub mod record;
pub mod scheduler;
pub mod sink;

pub use config::SinkConfig;
pub use error::{ConfigurationError, SinkError, TransmissionError};
pub use layer::SinkLayer;
pub use record::{LogLevel, LogRecord};
pub use sink::LogSink;

/// A normalized document as it is stored in the buffer and sent to the backend.
pub type NormalizedEntry = serde_json::Map<String, serde_json::Value>;
