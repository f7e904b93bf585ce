// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Index rotation policies.
//!
//! Each policy is a pure function of a base name and a date:
//!
//! | policy    | example for `logs` on 2024-03-14 |
//! |-----------|----------------------------------|
//! | `None`    | `logs`                           |
//! | `Daily`   | `logs-2024.03.14`                |
//! | `Weekly`  | `logs-2024.03.11` (Monday)       |
//! | `Monthly` | `logs-2024.03`                   |
//! | `Yearly`  | `logs-2024`                      |

use chrono::{Datelike, Days, Local, NaiveDate};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum IndexNameFrequency {
    None,
    #[default]
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl IndexNameFrequency {
    #[must_use]
    pub fn index_name(self, base: &str, date: NaiveDate) -> String {
        match self {
            IndexNameFrequency::None => base.to_string(),
            IndexNameFrequency::Daily => format!("{base}-{}", date.format("%Y.%m.%d")),
            IndexNameFrequency::Weekly => {
                let monday = date
                    .checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_monday())))
                    .unwrap_or(date);
                format!("{base}-{}", monday.format("%Y.%m.%d"))
            }
            IndexNameFrequency::Monthly => format!("{base}-{}", date.format("%Y.%m")),
            IndexNameFrequency::Yearly => format!("{base}-{}", date.format("%Y")),
        }
    }

    /// Index name for today's local date.
    #[must_use]
    pub fn current_index_name(self, base: &str) -> String {
        self.index_name(base, Local::now().date_naive())
    }
}

impl fmt::Display for IndexNameFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IndexNameFrequency::None => "none",
            IndexNameFrequency::Daily => "daily",
            IndexNameFrequency::Weekly => "weekly",
            IndexNameFrequency::Monthly => "monthly",
            IndexNameFrequency::Yearly => "yearly",
        })
    }
}

impl FromStr for IndexNameFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "no_freq" | "" => Ok(IndexNameFrequency::None),
            "daily" | "day" => Ok(IndexNameFrequency::Daily),
            "weekly" | "week" => Ok(IndexNameFrequency::Weekly),
            "monthly" | "month" => Ok(IndexNameFrequency::Monthly),
            "yearly" | "year" => Ok(IndexNameFrequency::Yearly),
            _ => Err(format!(
                "Invalid index name frequency: '{s}'. Valid values are: none, daily, weekly, monthly, yearly"
            )),
        }
    }
}

/// Lenient: invalid values are logged and fall back to `Daily`.
impl<'de> Deserialize<'de> for IndexNameFrequency {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(IndexNameFrequency::from_str(&s).unwrap_or_else(|e| {
                error!("{}", e);
                IndexNameFrequency::default()
            })),
            other => {
                error!("Expected a string for index name frequency, got {:?}", other);
                Ok(IndexNameFrequency::default())
            }
        }
    }
}
