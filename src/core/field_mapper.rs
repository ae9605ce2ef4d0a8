use crate::domain::model::Record;
use crate::utils::error::{EtlError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Map;
use std::collections::HashMap;

/// What to do when two source fields land on the same destination name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum CollisionPolicy {
    /// The later field in record order overwrites the earlier one.
    #[default]
    LastWins,
    Fail,
}

/// Source field name -> destination field name. Applied once, never chained.
#[derive(Debug, Clone, Default)]
pub struct FieldMapper {
    mapping: HashMap<String, String>,
    policy: CollisionPolicy,
}

impl FieldMapper {
    pub fn new(mapping: HashMap<String, String>, policy: CollisionPolicy) -> Result<Self> {
        if policy == CollisionPolicy::Fail {
            let mut destinations: HashMap<&str, &str> = HashMap::new();
            let mut sources: Vec<&String> = mapping.keys().collect();
            sources.sort();
            for source in sources {
                let destination = mapping[source].as_str();
                if let Some(first) = destinations.insert(destination, source) {
                    return Err(EtlError::FieldCollision {
                        first: first.to_string(),
                        second: source.clone(),
                        destination: destination.to_string(),
                    });
                }
            }
        }
        Ok(Self { mapping, policy })
    }

    /// Name `field` will carry after mapping.
    pub fn destination_of<'a>(&'a self, field: &'a str) -> &'a str {
        self.mapping.get(field).map(String::as_str).unwrap_or(field)
    }

    pub fn apply(&self, record: Record) -> Result<Record> {
        if self.mapping.is_empty() {
            return Ok(record);
        }

        let mut sources: HashMap<String, String> = HashMap::new();
        let mut mapped = Map::with_capacity(record.len());

        for (key, value) in record.data {
            let new_key = self.destination_of(&key).to_string();
            if let Some(previous) = sources.insert(new_key.clone(), key.clone()) {
                match self.policy {
                    CollisionPolicy::Fail => {
                        return Err(EtlError::FieldCollision {
                            first: previous,
                            second: key,
                            destination: new_key,
                        });
                    }
                    CollisionPolicy::LastWins => {
                        tracing::warn!(
                            "⚠️ Field '{}' overwrites '{}' after mapping to '{}'",
                            key,
                            previous,
                            new_key
                        );
                    }
                }
            }
            mapped.insert(new_key, value);
        }

        Ok(Record::from(mapped))
    }
}
