// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Environment variable configuration.
//!
//! Every [`PartialConfig`] field maps to an upper-case variable with the
//! `ES_LOG_` prefix, e.g. `ES_LOG_BUFFER_SIZE=500` or
//! `ES_LOG_HOSTS=es1:9200,es2:9200`.

use figment::{providers::Env, Figment};

use crate::config::{ConfigSource, PartialConfig, SinkConfig};
use crate::error::ConfigurationError;

pub const ENV_PREFIX: &str = "ES_LOG_";

#[derive(Debug, Default, Clone, Copy)]
#[allow(clippy::module_name_repetitions)]
pub struct EnvConfigSource;

impl ConfigSource for EnvConfigSource {
    fn load(&self, config: &mut SinkConfig) -> Result<(), ConfigurationError> {
        let figment = Figment::new().merge(Env::prefixed(ENV_PREFIX));

        let partial = figment.extract::<PartialConfig>().map_err(|e| {
            ConfigurationError::Source(format!(
                "Failed to parse config from environment variables: {e}"
            ))
        })?;
        partial.merge_into(config);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Host;
    use crate::index_name::IndexNameFrequency;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_env_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("ES_LOG_HOSTS", "es1:9201,https://es2:443");
            jail.set_env("ES_LOG_BUFFER_SIZE", "2");
            jail.set_env("ES_LOG_FLUSH_INTERVAL", "0.25");
            jail.set_env("ES_LOG_INDEX_NAME", "app_logs");
            jail.set_env("ES_LOG_INDEX_NAME_FREQUENCY", "monthly");
            jail.set_env("ES_LOG_TIMED_FLUSH", "true");
            jail.set_env("ES_LOG_AUTH_TYPE", "basic");
            jail.set_env("ES_LOG_USERNAME", "elastic");
            jail.set_env("ES_LOG_PASSWORD", "changeme");
            jail.set_env("ES_LOG_ADDITIONAL_FIELDS", "App:Test,Environment:Dev");

            let mut config = SinkConfig::default();
            EnvConfigSource.load(&mut config).expect("env loads");

            assert_eq!(
                config.hosts,
                vec![
                    Host::new("es1", 9201),
                    Host::new("es2", 443).with_scheme("https")
                ]
            );
            assert_eq!(config.buffer_size, 2);
            assert_eq!(config.flush_interval, Duration::from_millis(250));
            assert_eq!(config.index_name, "app_logs");
            assert_eq!(config.index_name_frequency, IndexNameFrequency::Monthly);
            assert!(config.timed_flush);
            assert_eq!(config.auth.auth_type, "basic");
            assert_eq!(config.auth.username, "elastic");
            assert_eq!(config.auth.password, "changeme");
            assert_eq!(config.additional_fields["App"], json!("Test"));
            assert_eq!(config.additional_fields["Environment"], json!("Dev"));
            Ok(())
        });
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("ES_LOG_BUFFER_SIZE", "lots");
            jail.set_env("ES_LOG_VERIFY_CERTS", "maybe");
            jail.set_env("ES_LOG_INDEX_NAME_FREQUENCY", "hourly");

            let mut config = SinkConfig::default();
            EnvConfigSource.load(&mut config).expect("env loads");

            assert_eq!(config.buffer_size, SinkConfig::default().buffer_size);
            assert!(config.verify_certs);
            assert_eq!(config.index_name_frequency, IndexNameFrequency::Daily);
            Ok(())
        });
    }

    #[test]
    fn test_empty_env_is_default() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            let mut config = SinkConfig::default();
            EnvConfigSource.load(&mut config).expect("env loads");
            assert_eq!(config, SinkConfig::default());
            Ok(())
        });
    }
}
