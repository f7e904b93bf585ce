// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! YAML file configuration.
//!
//! ```yaml
//! hosts:
//!   - host: es1
//!     port: 9200
//!   - https://es2:9243
//! auth_type: basic
//! username: elastic
//! password: changeme
//! index_name: app_logs
//! index_name_frequency: weekly
//! buffer_size: 500
//! flush_interval: 2
//! additional_fields:
//!   App: checkout
//!   Environment: prod
//! ```

use std::path::PathBuf;

use figment::{
    providers::{Format, Yaml},
    Figment,
};

use crate::config::{ConfigSource, PartialConfig, SinkConfig};
use crate::error::ConfigurationError;

#[derive(Debug, Clone)]
#[allow(clippy::module_name_repetitions)]
pub struct YamlConfigSource {
    pub path: PathBuf,
}

impl ConfigSource for YamlConfigSource {
    fn load(&self, config: &mut SinkConfig) -> Result<(), ConfigurationError> {
        let figment = Figment::new().merge(Yaml::file(self.path.clone()));

        match figment.extract::<PartialConfig>() {
            Ok(partial) => partial.merge_into(config),
            Err(e) => {
                return Err(ConfigurationError::Source(format!(
                    "Failed to parse config from yaml file {}: {e}",
                    self.path.display()
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{env::EnvConfigSource, ConfigBuilder, Host, RecordFormat};
    use crate::index_name::IndexNameFrequency;
    use serde_json::json;
    use std::path::Path;
    use std::time::Duration;

    #[test]
    fn test_yaml_file_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                "es_log.yaml",
                r"
hosts:
  - host: es1
    port: 9300
  - https://es2:9243
auth_type: aws_signed
aws_access_key: AKID
aws_secret_key: SECRET
aws_region: eu-west-1
index_name: app_logs
index_name_frequency: weekly
doc_type: _doc
buffer_size: 500
flush_interval: 2
record_format: compact
include_host_fields: false
additional_fields:
  App: checkout
  Replicas: 3
",
            )?;

            let mut config = SinkConfig::default();
            YamlConfigSource {
                path: Path::new("es_log.yaml").to_path_buf(),
            }
            .load(&mut config)
            .expect("Failed to load config");

            assert_eq!(
                config.hosts,
                vec![
                    Host::new("es1", 9300),
                    Host::new("es2", 9243).with_scheme("https")
                ]
            );
            assert_eq!(config.auth.auth_type, "aws_signed");
            assert_eq!(config.auth.aws_region, "eu-west-1");
            assert_eq!(config.index_name, "app_logs");
            assert_eq!(config.index_name_frequency, IndexNameFrequency::Weekly);
            assert_eq!(config.doc_type.as_deref(), Some("_doc"));
            assert_eq!(config.buffer_size, 500);
            assert_eq!(config.flush_interval, Duration::from_secs(2));
            assert_eq!(config.record_format, RecordFormat::Compact);
            assert!(!config.include_host_fields);
            assert_eq!(config.additional_fields["App"], json!("checkout"));
            assert_eq!(config.additional_fields["Replicas"], json!(3));
            Ok(())
        });
    }

    #[test]
    fn test_env_wins_over_yaml() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file("es_log.yaml", "buffer_size: 500\nindex_name: from_yaml\n")?;
            jail.set_env("ES_LOG_BUFFER_SIZE", "7");

            let config = ConfigBuilder::default()
                .add_source(Box::new(YamlConfigSource {
                    path: Path::new("es_log.yaml").to_path_buf(),
                }))
                .add_source(Box::new(EnvConfigSource))
                .build();

            assert_eq!(config.buffer_size, 7);
            assert_eq!(config.index_name, "from_yaml");
            Ok(())
        });
    }

    #[test]
    fn test_malformed_yaml_is_an_error() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file("es_log.yaml", "hosts: [unterminated\n")?;

            let mut config = SinkConfig::default();
            let result = YamlConfigSource {
                path: Path::new("es_log.yaml").to_path_buf(),
            }
            .load(&mut config);

            assert!(result.is_err());
            assert_eq!(config, SinkConfig::default());
            Ok(())
        });
    }
}
