use crate::value::FieldKind;

/// Error type returned by the [`QueryExecutor`](crate::QueryExecutor) and
/// [`PointWriter`](crate::PointWriter) collaborators.
pub type DynError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Primary error type for encoding, decoding and the [`Client`](crate::Client).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("data must be a struct, got {found}")]
    NotAStruct { found: &'static str },

    #[error("time field {field} is not a timestamp")]
    InvalidTimeField { field: String },

    #[error("field {field} holds an unsupported {found} value")]
    UnsupportedValue { field: String, found: &'static str },

    #[error("point has no measurement")]
    MissingMeasurement,

    #[error("no database selected")]
    NoDatabaseSelected,

    #[error("invalid precision {0:?}, expected one of h, m, s, ms, u, ns")]
    InvalidPrecision(String),

    #[error("execute {command}: {source}")]
    Discovery {
        command: String,
        #[source]
        source: DynError,
    },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("query failed: {0}")]
    Query(#[source] DynError),

    #[error("write failed: {0}")]
    Write(#[source] DynError),
}

/// A specialized `Result` for `influxdb1_mapper` errors.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A wire value could not be stored in a record field.
#[derive(Debug, thiserror::Error)]
#[error("failed to decode field {field}: {source}")]
pub struct DecodeError {
    field: String,
    #[source]
    source: CoercionError,
}

impl DecodeError {
    pub fn new(field: impl Into<String>, source: CoercionError) -> Self {
        Self {
            field: field.into(),
            source,
        }
    }

    /// Output name of the field that failed.
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn coercion(&self) -> &CoercionError {
        &self.source
    }
}

/// Reasons a single wire value cannot be converted to a [`FieldKind`].
#[derive(Debug, thiserror::Error)]
pub enum CoercionError {
    #[error("expected {expected}, found {found}")]
    Mismatch {
        expected: FieldKind,
        found: &'static str,
    },

    #[error("{value} is not an integral number")]
    NotIntegral { value: f64 },

    #[error("{value} does not fit in {target}")]
    OutOfRange { value: String, target: &'static str },

    #[error("invalid RFC 3339 timestamp {value:?}: {source}")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}
