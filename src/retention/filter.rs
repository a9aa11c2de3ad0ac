use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Creation instant as reported by a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum CreationTime {
    Known(DateTime<Utc>),
    Missing,
    Unparseable(String),
}

impl CreationTime {
    /// Reads a creation timestamp from a JSON record field. Accepts RFC 3339
    /// strings and epoch milliseconds.
    pub fn from_json(field: Option<&Value>) -> Self {
        match field {
            None | Some(Value::Null) => CreationTime::Missing,
            Some(Value::String(raw)) => match DateTime::parse_from_rfc3339(raw) {
                Ok(parsed) => CreationTime::Known(parsed.with_timezone(&Utc)),
                Err(_) => CreationTime::Unparseable(raw.clone()),
            },
            Some(Value::Number(number)) => number
                .as_i64()
                .and_then(DateTime::<Utc>::from_timestamp_millis)
                .map(CreationTime::Known)
                .unwrap_or_else(|| CreationTime::Unparseable(number.to_string())),
            Some(other) => CreationTime::Unparseable(other.to_string()),
        }
    }
}

impl From<DateTime<Utc>> for CreationTime {
    fn from(value: DateTime<Utc>) -> Self {
        CreationTime::Known(value)
    }
}

impl From<Option<DateTime<Utc>>> for CreationTime {
    fn from(value: Option<DateTime<Utc>>) -> Self {
        value.map_or(CreationTime::Missing, CreationTime::Known)
    }
}

/// Anything the age filter can classify.
pub trait Aged {
    fn name(&self) -> &str;
    fn created_at(&self) -> &CreationTime;
}

/// An item kept because its age could not be determined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataAnomaly {
    pub name: String,
    pub created_at: CreationTime,
}

#[derive(Debug)]
pub struct AgePartition<T> {
    pub keep: Vec<T>,
    pub delete: Vec<T>,
    pub anomalies: Vec<MetadataAnomaly>,
}

impl<T: Aged> AgePartition<T> {
    pub fn delete_names(&self) -> Vec<String> {
        self.delete.iter().map(|item| item.name().to_string()).collect()
    }
}

/// Splits `items` around `cutoff`: strictly older goes to `delete`, the rest
/// to `keep`. Items without a usable timestamp are kept and listed in
/// `anomalies`.
pub fn partition<T: Aged>(items: Vec<T>, cutoff: DateTime<Utc>) -> AgePartition<T> {
    let mut keep = Vec::new();
    let mut delete = Vec::new();
    let mut anomalies = Vec::new();

    for item in items {
        match item.created_at() {
            CreationTime::Known(created_at) if *created_at < cutoff => delete.push(item),
            CreationTime::Known(_) => keep.push(item),
            unknown => {
                anomalies.push(MetadataAnomaly {
                    name: item.name().to_string(),
                    created_at: unknown.clone(),
                });
                keep.push(item);
            }
        }
    }

    AgePartition { keep, delete, anomalies }
}
