// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Backend access.
//!
//! [`BulkClient`] is the seam between the flush engine and the cluster. The
//! production implementation is [`http::ElasticsearchClient`]; the sink only
//! ever reaches it through a [`provider::ClientProvider`], which builds it on
//! first use.

pub mod auth;
pub mod http;
#[cfg(feature = "kerberos")]
mod kerberos;
pub mod provider;
#[cfg(feature = "aws-auth")]
pub mod sigv4;

#[cfg(test)]
pub(crate) mod test_support;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransmissionError;
use crate::NormalizedEntry;

/// One document of a bulk request.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkAction {
    pub index: String,
    pub doc_type: Option<String>,
    pub source: NormalizedEntry,
}

/// Outcome of a bulk request that the backend accepted as a whole.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkStats {
    pub indexed: usize,
    pub failed: usize,
}

#[async_trait]
pub trait BulkClient: Send + Sync {
    /// Indexes every action in a single bulk request. Partial rejections are
    /// reported as [`TransmissionError::Rejected`].
    async fn bulk_index(&self, actions: Vec<BulkAction>) -> Result<BulkStats, TransmissionError>;

    /// Whether any configured host answers.
    async fn ping(&self) -> bool;

    /// Creates `index` with the given body. An index that already exists is
    /// not an error.
    async fn create_index(&self, index: &str, body: &Value) -> Result<(), TransmissionError>;
}
