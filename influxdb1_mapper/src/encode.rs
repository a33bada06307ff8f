//! Record to [`Point`] encoding.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::{
    error::{Error, Result},
    point::Point,
    record::{DEFAULT_TIME_FIELD, FieldDescriptor, MEASUREMENT_FIELD, Record},
    value::{FieldKind, FieldValue, parse_timestamp, wire_kind},
};

fn effective_time_field(time_field: Option<&str>) -> &str {
    time_field
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_TIME_FIELD)
}

/// Index of the descriptor holding the point's time.
///
/// A field whose output name equals `time_field` wins. Otherwise the only
/// timestamp-typed field is used; with several candidates the time stays
/// unset.
fn time_field_index(descriptors: &[FieldDescriptor], time_field: &str) -> Option<usize> {
    let candidates = || {
        descriptors.iter().enumerate().filter(|(_, d)| {
            !d.is_measurement_sentinel()
                && !d.metadata().is_skipped()
                && d.metadata().measurement().is_none()
        })
    };

    if let Some((i, _)) = candidates().find(|(_, d)| d.metadata().output_name() == time_field) {
        return Some(i);
    }

    let mut timestamps = candidates().filter(|(_, d)| d.kind() == FieldKind::Timestamp);
    match (timestamps.next(), timestamps.next()) {
        (Some((i, _)), None) => Some(i),
        _ => None,
    }
}

/// Encode `record` into a [`Point`].
///
/// `time_field` overrides the output name of the timestamp (`time` when
/// `None` or empty).
pub fn encode<R: Record>(record: &R, time_field: Option<&str>) -> Result<Point> {
    let time_field = effective_time_field(time_field);
    let descriptors = R::descriptors();
    let time_index = time_field_index(descriptors, time_field);

    let mut point = Point::default();

    for (i, (descriptor, value)) in descriptors.iter().zip(record.field_values()).enumerate() {
        if descriptor.is_measurement_sentinel() {
            if let Some(value) = value {
                point.measurement = value.to_string();
            }
            continue;
        }

        let metadata = descriptor.metadata();
        if metadata.is_skipped() {
            continue;
        }

        if let Some(measurement) = metadata.measurement() {
            point.measurement = measurement.to_owned();
            continue;
        }

        if time_index == Some(i) {
            if descriptor.kind() != FieldKind::Timestamp {
                return Err(Error::InvalidTimeField {
                    field: metadata.output_name().to_owned(),
                });
            }
            point.time = value.as_ref().and_then(FieldValue::as_timestamp);
            continue;
        }

        let Some(value) = value else {
            continue;
        };

        if metadata.is_tag() {
            point
                .tags
                .insert(metadata.output_name().to_owned(), value.to_string());
        }

        if metadata.is_field() {
            point.fields.insert(metadata.output_name().to_owned(), value);
        }
    }

    if point.measurement.is_empty() {
        point.measurement = R::type_name().to_owned();
    }

    Ok(point)
}

/// Encode a JSON document into a [`Point`].
///
/// Every key of the object becomes a field, except the
/// [`MEASUREMENT_FIELD`](crate::MEASUREMENT_FIELD) key and the time key (RFC
/// 3339 string or integer epoch nanoseconds). `null` values are skipped. The
/// measurement is left empty when the document does not name one.
pub fn encode_json(document: &Value, time_field: Option<&str>) -> Result<Point> {
    let Value::Object(object) = document else {
        return Err(Error::NotAStruct {
            found: wire_kind(document),
        });
    };
    let time_field = effective_time_field(time_field);

    let mut point = Point::default();

    for (key, value) in object {
        if key == MEASUREMENT_FIELD {
            match value {
                Value::String(m) => point.measurement = m.clone(),
                Value::Null => {}
                other => {
                    return Err(Error::UnsupportedValue {
                        field: key.clone(),
                        found: wire_kind(other),
                    });
                }
            }
            continue;
        }

        if key == time_field {
            point.time = match value {
                Value::String(s) => Some(parse_timestamp(s).map_err(|_| {
                    Error::InvalidTimeField { field: key.clone() }
                })?),
                Value::Number(n) => Some(
                    n.as_i64()
                        .map(DateTime::<Utc>::from_timestamp_nanos)
                        .ok_or_else(|| Error::InvalidTimeField { field: key.clone() })?,
                ),
                Value::Null => None,
                _ => return Err(Error::InvalidTimeField { field: key.clone() }),
            };
            continue;
        }

        if value.is_null() {
            continue;
        }
        let Some(value) = FieldValue::from_json(value) else {
            return Err(Error::UnsupportedValue {
                field: key.clone(),
                found: wire_kind(value),
            });
        };
        point.fields.insert(key.clone(), value);
    }

    Ok(point)
}
