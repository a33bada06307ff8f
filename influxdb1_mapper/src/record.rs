//! The [`Record`] capability: a type that can enumerate its fields.

use crate::{
    annotation::FieldMetadata,
    decode::FlattenedRow,
    error::DecodeError,
    value::{FieldKind, FieldType, FieldValue},
};

/// Name of the field holding the measurement of a record.
///
/// It never becomes a tag or a field. The snake-case spelling
/// `influx_measurement` is accepted as well.
pub const MEASUREMENT_FIELD: &str = "InfluxMeasurement";

const MEASUREMENT_FIELD_SNAKE: &str = "influx_measurement";

/// Output name of the timestamp when no override is configured.
pub const DEFAULT_TIME_FIELD: &str = "time";

/// `true` if `name` is the measurement sentinel.
pub fn is_measurement_field(name: &str) -> bool {
    name == MEASUREMENT_FIELD || name == MEASUREMENT_FIELD_SNAKE
}

/// Static description of one record field.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    name: &'static str,
    annotation: &'static str,
    kind: FieldKind,
    metadata: FieldMetadata,
}

impl FieldDescriptor {
    pub fn new(name: &'static str, annotation: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            annotation,
            kind,
            metadata: FieldMetadata::parse(name, annotation),
        }
    }

    /// The struct field name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The raw annotation string.
    pub fn annotation(&self) -> &'static str {
        self.annotation
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn metadata(&self) -> &FieldMetadata {
        &self.metadata
    }

    pub fn is_measurement_sentinel(&self) -> bool {
        is_measurement_field(self.name)
    }

    /// Key this field is read from in a [`FlattenedRow`], `None` when the
    /// field never takes part in decoding.
    pub fn source_key(&self) -> Option<&str> {
        if self.is_measurement_sentinel() {
            Some(MEASUREMENT_FIELD)
        } else if self.metadata.is_skipped() {
            None
        } else {
            Some(self.metadata.output_name())
        }
    }
}

/// A record type that can be encoded into a [`Point`](crate::Point) and
/// decoded from query results.
///
/// Usually implemented with [`influx_record!`](crate::influx_record).
pub trait Record: Sized {
    /// Measurement used when the record does not name one.
    fn type_name() -> &'static str;

    /// Field descriptors in declaration order. Built once per type.
    fn descriptors() -> &'static [FieldDescriptor];

    /// Current field values, aligned with [`Record::descriptors`].
    fn field_values(&self) -> Vec<Option<FieldValue>>;

    /// Build a record from one flattened result row.
    fn from_flattened(row: &FlattenedRow) -> Result<Self, DecodeError>;
}

/// Read the field described by `descriptor` out of `row`.
///
/// Missing keys, `null` values and skipped fields yield the default value.
pub fn decode_field<T: FieldType>(
    descriptor: Option<&FieldDescriptor>,
    row: &FlattenedRow,
) -> Result<T, DecodeError> {
    let Some(key) = descriptor.and_then(FieldDescriptor::source_key) else {
        return Ok(T::default());
    };

    match row.get(key) {
        None | Some(serde_json::Value::Null) => Ok(T::default()),
        Some(value) => T::from_wire(value).map_err(|e| DecodeError::new(key, e)),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::influx_record;

    influx_record! {
        #[derive(Debug, Default, PartialEq)]
        #[allow(non_snake_case)]
        struct Described {
            InfluxMeasurement: String,
            time: DateTime<Utc>,
            #[influx("host,tag")]
            host: String,
            #[influx("-")]
            secret: String,
            count: Option<i64>,
        }
    }

    #[test]
    fn descriptors_follow_declaration_order() {
        let names: Vec<_> = Described::descriptors().iter().map(|d| d.name()).collect();
        assert_eq!(
            names,
            ["InfluxMeasurement", "time", "host", "secret", "count"]
        );

        let kinds: Vec<_> = Described::descriptors().iter().map(|d| d.kind()).collect();
        assert_eq!(
            kinds,
            [
                FieldKind::String,
                FieldKind::Timestamp,
                FieldKind::String,
                FieldKind::String,
                FieldKind::Integer
            ]
        );
    }

    #[test]
    fn descriptors_are_built_once() {
        assert!(std::ptr::eq(
            Described::descriptors(),
            Described::descriptors()
        ));
    }

    #[test]
    fn source_keys() {
        let keys: Vec<_> = Described::descriptors()
            .iter()
            .map(|d| d.source_key())
            .collect();
        assert_eq!(
            keys,
            [
                Some(MEASUREMENT_FIELD),
                Some("time"),
                Some("host"),
                None,
                Some("count")
            ]
        );
    }

    influx_record! {
        /// Cpu sample with documented fields
        #[derive(Debug, Default)]
        struct Documented {
            /// Host the sample came from
            #[influx("host,tag")]
            host: String,
            #[influx("usage_idle")]
            #[allow(dead_code)]
            idle: f64,
            /// Not annotated
            user: f64,
            #[influx("-")]
            /// Kept out of every point
            #[influx("ignored")]
            secret: String,
        }
    }

    #[test]
    fn annotations_next_to_other_attributes() {
        let metadata: Vec<_> = Documented::descriptors()
            .iter()
            .map(|d| {
                let metadata = d.metadata();
                (metadata.output_name(), metadata.is_tag(), metadata.is_skipped())
            })
            .collect();
        assert_eq!(
            metadata,
            [
                ("host", true, false),
                ("usage_idle", false, false),
                ("user", false, false),
                ("-", false, true)
            ]
        );

        let sample = Documented {
            host: "a".to_owned(),
            user: 0.5,
            ..Default::default()
        };
        assert_eq!(sample.field_values()[2], Some(crate::FieldValue::Float(0.5)));
    }

    #[test]
    fn sentinel_spellings() {
        assert!(is_measurement_field("InfluxMeasurement"));
        assert!(is_measurement_field("influx_measurement"));
        assert!(!is_measurement_field("measurement"));
    }
}
