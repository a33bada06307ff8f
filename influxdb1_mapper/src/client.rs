//! The [`Client`] facade and the transport capabilities it is built on.

use std::{fmt::Debug, str::FromStr, sync::Arc};

use async_trait::async_trait;
use iox_time::SystemProvider;
use observability_deps::tracing::debug;
use serde_json::Value;

use crate::{
    decode::{DecodeTarget, decode},
    encode::{encode, encode_json},
    error::{DynError, Error, Result},
    point::{Point, Row},
    query::clean_query,
    record::Record,
    tags::{QueryOption, TagKeysCache, resolve_tag_keys, tag_keys_cache},
};

/// Runs InfluxQL commands against a server.
///
/// Implementations must report both transport failures and errors the server
/// returns in the response body.
#[async_trait]
pub trait QueryExecutor: Debug + Send + Sync {
    /// Address of the server, part of the tag key cache key.
    fn addr(&self) -> &str;

    /// Execute `command` against `database` and return the series of the
    /// first statement.
    async fn execute(&self, command: &str, database: &str) -> Result<Vec<Row>, DynError>;
}

/// Writes encoded points to a server.
#[async_trait]
pub trait PointWriter: Debug + Send + Sync {
    async fn write(&self, point: &Point, database: &str, precision: Precision)
    -> Result<(), DynError>;
}

/// Precision of the timestamps sent with a write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Precision {
    Hours,
    Minutes,
    Seconds,
    Milliseconds,
    Microseconds,
    #[default]
    Nanoseconds,
}

impl Precision {
    /// Value of the `precision` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hours => "h",
            Self::Minutes => "m",
            Self::Seconds => "s",
            Self::Milliseconds => "ms",
            Self::Microseconds => "u",
            Self::Nanoseconds => "ns",
        }
    }

    /// Number of nanoseconds in one unit.
    pub fn timestamp_base(&self) -> i64 {
        match self {
            Self::Hours => 3_600_000_000_000,
            Self::Minutes => 60_000_000_000,
            Self::Seconds => 1_000_000_000,
            Self::Milliseconds => 1_000_000,
            Self::Microseconds => 1_000,
            Self::Nanoseconds => 1,
        }
    }
}

impl FromStr for Precision {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let p = match s {
            "h" => Self::Hours,
            "m" => Self::Minutes,
            "s" => Self::Seconds,
            "ms" => Self::Milliseconds,
            "u" | "us" => Self::Microseconds,
            "ns" | "n" | "" => Self::Nanoseconds,
            _ => return Err(Error::InvalidPrecision(s.to_owned())),
        };
        Ok(p)
    }
}

impl std::fmt::Display for Precision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A client setting that is either kept across calls or consumed by the next
/// one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct UsingValue {
    value: String,
    retain: bool,
}

impl UsingValue {
    fn sticky(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            retain: true,
        }
    }

    fn once(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            retain: false,
        }
    }

    fn retain(&mut self) {
        if !self.retain {
            self.value.clear();
        }
    }

    fn value(&self) -> Option<&str> {
        (!self.value.is_empty()).then_some(self.value.as_str())
    }
}

/// Encodes records into writes and decodes query results into records.
///
/// The database, measurement and time field settings come in two flavours:
/// `use_*` keeps the value for every following call, `use_*_once` only for
/// the next write or query.
#[derive(Debug)]
pub struct Client<Q, W> {
    executor: Q,
    writer: W,
    precision: Precision,
    tag_keys: Arc<TagKeysCache>,
    db: UsingValue,
    measurement: UsingValue,
    time_field: UsingValue,
}

impl<Q, W> Client<Q, W>
where
    Q: QueryExecutor,
    W: PointWriter,
{
    pub fn new(executor: Q, writer: W) -> Self {
        Self {
            executor,
            writer,
            precision: Precision::default(),
            tag_keys: Arc::new(tag_keys_cache(Arc::new(SystemProvider::new()))),
            db: UsingValue::default(),
            measurement: UsingValue::default(),
            time_field: UsingValue::default(),
        }
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    /// Share a tag key cache with other clients.
    pub fn with_tag_keys_cache(mut self, cache: Arc<TagKeysCache>) -> Self {
        self.tag_keys = cache;
        self
    }

    pub fn tag_keys_cache(&self) -> &Arc<TagKeysCache> {
        &self.tag_keys
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    pub fn executor(&self) -> &Q {
        &self.executor
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn use_db(&mut self, db: impl Into<String>) -> &mut Self {
        self.db = UsingValue::sticky(db);
        self
    }

    pub fn use_db_once(&mut self, db: impl Into<String>) -> &mut Self {
        self.db = UsingValue::once(db);
        self
    }

    /// Replace the measurement of every written point.
    pub fn use_measurement(&mut self, measurement: impl Into<String>) -> &mut Self {
        self.measurement = UsingValue::sticky(measurement);
        self
    }

    pub fn use_measurement_once(&mut self, measurement: impl Into<String>) -> &mut Self {
        self.measurement = UsingValue::once(measurement);
        self
    }

    /// Output name of the field holding the time of written records.
    pub fn use_time_field(&mut self, field: impl Into<String>) -> &mut Self {
        self.time_field = UsingValue::sticky(field);
        self
    }

    pub fn use_time_field_once(&mut self, field: impl Into<String>) -> &mut Self {
        self.time_field = UsingValue::once(field);
        self
    }

    /// Current database, if any.
    pub fn database(&self) -> Option<&str> {
        self.db.value()
    }

    /// Drop every setting made with a `use_*_once` method.
    pub fn retain(&mut self) {
        self.db.retain();
        self.measurement.retain();
        self.time_field.retain();
    }

    fn require_db(&self) -> Result<String> {
        self.db
            .value()
            .map(str::to_owned)
            .ok_or(Error::NoDatabaseSelected)
    }

    /// Execute `query` and decode the series of its first statement into
    /// `target`.
    ///
    /// When `option` asks for tag values, the tag keys of the queried
    /// measurement are resolved (and cached) first and the distinct values
    /// found in the result are stored back into `option`.
    pub async fn decode_query<T>(
        &mut self,
        query: &str,
        target: &mut T,
        option: &mut QueryOption,
    ) -> Result<()>
    where
        T: DecodeTarget + ?Sized + Send,
    {
        let result = self.run_query(query, target, option).await;
        self.retain();
        result
    }

    async fn run_query<T>(&self, query: &str, target: &mut T, option: &mut QueryOption) -> Result<()>
    where
        T: DecodeTarget + ?Sized + Send,
    {
        let database = self.require_db()?;
        debug!(query = %clean_query(query), %database, "executing query");

        let rows = self
            .executor
            .execute(query, &database)
            .await
            .map_err(Error::Query)?;

        if option.wants_tags() {
            let keys =
                resolve_tag_keys(&self.executor, &self.tag_keys, query, &database, &rows).await?;
            option.set_resolved_tag_keys(keys);
        }

        let mut collector = option.collector();
        decode(rows, target, &mut *collector)?;
        if option.wants_tags() {
            option.set_tags(collector.complete());
        }

        Ok(())
    }

    /// Encode `record` and write it.
    pub async fn write_record<R: Record + Sync>(&mut self, record: &R) -> Result<()> {
        let result = async {
            let database = self.require_db()?;
            let point = encode(record, self.time_field.value())?;
            self.send(point, &database).await
        }
        .await;
        self.retain();
        result
    }

    /// Encode a JSON object and write it.
    pub async fn write_json(&mut self, document: &Value) -> Result<()> {
        let result = async {
            let database = self.require_db()?;
            let point = encode_json(document, self.time_field.value())?;
            self.send(point, &database).await
        }
        .await;
        self.retain();
        result
    }

    /// Write an already built point.
    pub async fn write_point(&mut self, point: Point) -> Result<()> {
        let result = async {
            let database = self.require_db()?;
            self.send(point, &database).await
        }
        .await;
        self.retain();
        result
    }

    async fn send(&self, mut point: Point, database: &str) -> Result<()> {
        if let Some(measurement) = self.measurement.value() {
            point.measurement = measurement.to_owned();
        }
        if point.measurement.is_empty() {
            return Err(Error::MissingMeasurement);
        }

        debug!(measurement = %point.measurement, %database, "writing point");
        self.writer
            .write(&point, database, self.precision)
            .await
            .map_err(Error::Write)
    }
}
