// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! AWS Signature Version 4 for Amazon OpenSearch / Elasticsearch Service.
//!
//! Signing is delegated to `aws-sigv4`. The caller adds the returned headers
//! to the request unchanged.

use std::fmt;
use std::time::SystemTime;

use aws_credential_types::Credentials;
use aws_sigv4::http_request::{
    sign as sign_request, PayloadChecksumKind, SignableBody, SignableRequest, SigningParams,
    SigningSettings,
};
use aws_sigv4::sign::v4;
use aws_smithy_runtime_api::client::identity::Identity;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};

use crate::error::TransmissionError;

pub const SERVICE: &str = "es";
const PROVIDER_NAME: &str = "es-log-sink";

#[derive(Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key", &"<redacted>")
            .field("secret_key", &"<redacted>")
            .field("region", &self.region)
            .finish()
    }
}

impl AwsCredentials {
    fn identity(&self) -> Identity {
        Credentials::new(
            self.access_key.clone(),
            self.secret_key.clone(),
            None,
            None,
            PROVIDER_NAME,
        )
        .into()
    }
}

fn signing_error(e: impl fmt::Display) -> TransmissionError {
    TransmissionError::Signing(e.to_string())
}

fn sign_for_service(
    credentials: &AwsCredentials,
    service: &str,
    settings: SigningSettings,
    method: &Method,
    url: &Url,
    body: &[u8],
    time: SystemTime,
) -> Result<HeaderMap, TransmissionError> {
    let identity = credentials.identity();
    let params: SigningParams<'_> = v4::SigningParams::builder()
        .identity(&identity)
        .region(&credentials.region)
        .name(service)
        .time(time)
        .settings(settings)
        .build()
        .map_err(signing_error)?
        .into();

    let request = SignableRequest::new(
        method.as_str(),
        url.as_str(),
        std::iter::empty(),
        SignableBody::Bytes(body),
    )
    .map_err(signing_error)?;
    let (instructions, _signature) = sign_request(request, &params)
        .map_err(signing_error)?
        .into_parts();

    let mut headers = HeaderMap::new();
    for (name, value) in instructions.headers() {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(signing_error)?;
        headers.insert(name, HeaderValue::from_str(value).map_err(signing_error)?);
    }
    Ok(headers)
}

/// Headers that authenticate `method url` with `body` at `now`. The payload
/// hash travels in `x-amz-content-sha256`, as the service requires.
pub fn sign(
    credentials: &AwsCredentials,
    method: &Method,
    url: &Url,
    body: &[u8],
    now: DateTime<Utc>,
) -> Result<HeaderMap, TransmissionError> {
    let mut settings = SigningSettings::default();
    settings.payload_checksum_kind = PayloadChecksumKind::XAmzSha256;
    sign_for_service(
        credentials,
        SERVICE,
        settings,
        method,
        url,
        body,
        SystemTime::from(now),
    )
}
