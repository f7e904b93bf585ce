// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Request authentication.
//!
//! | `auth_type`  | strategy                                    | feature    |
//! |--------------|---------------------------------------------|------------|
//! | `none`       | no credentials                              |            |
//! | `basic`      | HTTP basic with `username` / `password`     |            |
//! | `kerberos`   | SPNEGO token from the credential cache      | `kerberos` |
//! | `aws_signed` | SigV4 with the `aws_*` keys, service `es`   | `aws-auth` |
//!
//! Strategies whose feature is compiled out fail with
//! [`ConfigurationError::AuthUnavailable`] when the client is built.

use reqwest::{Method, RequestBuilder, Url};

#[cfg(feature = "aws-auth")]
use crate::client::sigv4::{self, AwsCredentials};
use crate::config::AuthSettings;
use crate::error::{ConfigurationError, TransmissionError};

#[derive(Clone, PartialEq, Eq)]
pub enum AuthStrategy {
    NoAuth,
    Basic { username: String, password: String },
    #[cfg(feature = "kerberos")]
    Kerberos,
    #[cfg(feature = "aws-auth")]
    AwsSigned(AwsCredentials),
}

impl std::fmt::Debug for AuthStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl AuthStrategy {
    pub fn from_settings(settings: &AuthSettings) -> Result<Self, ConfigurationError> {
        match settings.auth_type.trim().to_lowercase().as_str() {
            "" | "none" | "no_auth" => Ok(AuthStrategy::NoAuth),
            "basic" | "basic_auth" => Ok(AuthStrategy::Basic {
                username: settings.username.clone(),
                password: settings.password.clone(),
            }),
            "kerberos" | "kerberos_auth" => Self::kerberos(),
            "aws_signed" | "aws_signed_auth" | "aws" => Self::aws_signed(settings),
            other => Err(ConfigurationError::UnsupportedAuth(other.to_string())),
        }
    }

    #[cfg(feature = "kerberos")]
    fn kerberos() -> Result<Self, ConfigurationError> {
        Ok(AuthStrategy::Kerberos)
    }

    #[cfg(not(feature = "kerberos"))]
    fn kerberos() -> Result<Self, ConfigurationError> {
        Err(ConfigurationError::AuthUnavailable {
            strategy: "kerberos",
            reason: "built without the `kerberos` feature".to_string(),
        })
    }

    #[cfg(feature = "aws-auth")]
    fn aws_signed(settings: &AuthSettings) -> Result<Self, ConfigurationError> {
        let missing: Vec<&str> = [
            ("aws_access_key", &settings.aws_access_key),
            ("aws_secret_key", &settings.aws_secret_key),
            ("aws_region", &settings.aws_region),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
        .collect();
        if !missing.is_empty() {
            return Err(ConfigurationError::Invalid(format!(
                "aws_signed authentication requires {}",
                missing.join(", ")
            )));
        }
        Ok(AuthStrategy::AwsSigned(AwsCredentials {
            access_key: settings.aws_access_key.clone(),
            secret_key: settings.aws_secret_key.clone(),
            region: settings.aws_region.clone(),
        }))
    }

    #[cfg(not(feature = "aws-auth"))]
    fn aws_signed(_settings: &AuthSettings) -> Result<Self, ConfigurationError> {
        Err(ConfigurationError::AuthUnavailable {
            strategy: "aws_signed",
            reason: "built without the `aws-auth` feature".to_string(),
        })
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            AuthStrategy::NoAuth => "none",
            AuthStrategy::Basic { .. } => "basic",
            #[cfg(feature = "kerberos")]
            AuthStrategy::Kerberos => "kerberos",
            #[cfg(feature = "aws-auth")]
            AuthStrategy::AwsSigned(_) => "aws_signed",
        }
    }

    /// Adds credentials to an outgoing request. `body` must be the exact bytes
    /// that will be sent.
    #[cfg_attr(not(feature = "aws-auth"), allow(unused_variables))]
    pub fn apply(
        &self,
        request: RequestBuilder,
        method: &Method,
        url: &Url,
        body: &[u8],
    ) -> Result<RequestBuilder, TransmissionError> {
        match self {
            AuthStrategy::NoAuth => Ok(request),
            AuthStrategy::Basic { username, password } => {
                Ok(request.basic_auth(username, Some(password)))
            }
            #[cfg(feature = "kerberos")]
            AuthStrategy::Kerberos => {
                let host = url.host_str().ok_or_else(|| {
                    TransmissionError::Signing(format!("url `{url}` has no host"))
                })?;
                let header = crate::client::kerberos::negotiate_header(host)?;
                Ok(request.header(reqwest::header::AUTHORIZATION, header))
            }
            #[cfg(feature = "aws-auth")]
            AuthStrategy::AwsSigned(credentials) => {
                let headers = sigv4::sign(credentials, method, url, body, chrono::Utc::now())?;
                Ok(request.headers(headers))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strategies() {
        assert_eq!(
            AuthStrategy::from_settings(&AuthSettings::none()).expect("none"),
            AuthStrategy::NoAuth
        );
        assert_eq!(
            AuthStrategy::from_settings(&AuthSettings::default()).expect("empty"),
            AuthStrategy::NoAuth
        );
        assert_eq!(
            AuthStrategy::from_settings(&AuthSettings::basic("u", "p")).expect("basic"),
            AuthStrategy::Basic {
                username: "u".to_string(),
                password: "p".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_strategy_is_unsupported() {
        let settings = AuthSettings {
            auth_type: "ntlm".to_string(),
            ..AuthSettings::default()
        };
        assert!(matches!(
            AuthStrategy::from_settings(&settings),
            Err(ConfigurationError::UnsupportedAuth(name)) if name == "ntlm"
        ));
    }

    #[cfg(not(feature = "kerberos"))]
    #[test]
    fn test_kerberos_unavailable_without_feature() {
        assert!(matches!(
            AuthStrategy::from_settings(&AuthSettings::kerberos()),
            Err(ConfigurationError::AuthUnavailable {
                strategy: "kerberos",
                ..
            })
        ));
    }

    #[cfg(feature = "aws-auth")]
    #[test]
    fn test_aws_requires_all_keys() {
        let err = AuthStrategy::from_settings(&AuthSettings::aws_signed("AKID", "", ""))
            .expect_err("missing keys");
        let message = err.to_string();
        assert!(message.contains("aws_secret_key"));
        assert!(message.contains("aws_region"));

        let strategy =
            AuthStrategy::from_settings(&AuthSettings::aws_signed("AKID", "SECRET", "eu-west-1"))
                .expect("aws");
        assert_eq!(strategy.name(), "aws_signed");
        assert!(!format!("{strategy:?}").contains("SECRET"));
    }

    #[cfg(feature = "aws-auth")]
    #[test]
    fn test_apply_aws_adds_signature_headers() {
        let strategy =
            AuthStrategy::from_settings(&AuthSettings::aws_signed("AKID", "SECRET", "eu-west-1"))
                .expect("aws");
        let url = Url::parse("http://localhost:9200/_bulk").expect("url");
        let request = strategy
            .apply(
                reqwest::Client::new().post(url.clone()),
                &Method::POST,
                &url,
                b"{}\n",
            )
            .expect("signed")
            .build()
            .expect("request");
        assert!(request.headers().contains_key("authorization"));
        assert!(request.headers().contains_key("x-amz-date"));
    }

    #[test]
    fn test_apply_basic() {
        let strategy = AuthStrategy::Basic {
            username: "elastic".to_string(),
            password: "changeme".to_string(),
        };
        let url = Url::parse("http://localhost:9200/").expect("url");
        let request = strategy
            .apply(reqwest::Client::new().head(url.clone()), &Method::HEAD, &url, &[])
            .expect("applied")
            .build()
            .expect("request");
        // base64("elastic:changeme")
        assert_eq!(
            request.headers()["authorization"],
            "Basic ZWxhc3RpYzpjaGFuZ2VtZQ=="
        );
    }
}
