//! The write-side [`Point`] and the query-side [`Row`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::value::FieldValue;

/// A single point of information to send to InfluxDB.
///
/// Tags and fields are kept sorted by key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Point {
    pub measurement: String,
    /// `None` lets the server assign the time of the write.
    pub time: Option<DateTime<Utc>>,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
}

impl Point {
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            ..Default::default()
        }
    }

    /// Sets a tag, replacing any existing tag of the same name.
    pub fn tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(name.into(), value.into());
        self
    }

    /// Sets a field, replacing any existing field of the same name.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Sets the timestamp, replacing any existing timestamp.
    pub fn time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }
}

/// One series of a query result, as returned by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Series (measurement) name
    #[serde(default)]
    pub name: String,
    /// Tags shared by every value of the series
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub columns: Vec<String>,
    /// Value sequences aligned with `columns`
    #[serde(default)]
    pub values: Vec<Vec<Value>>,
}

impl Row {
    pub fn new(name: impl Into<String>, columns: impl IntoIterator<Item: Into<String>>) -> Self {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_values(mut self, values: Vec<Value>) -> Self {
        self.values.push(values);
        self
    }
}
