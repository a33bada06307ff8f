//! Rendering of [`Point`]s as line protocol.

use std::{fmt, marker::PhantomData};

use influxdb1_mapper::{FieldValue, Point, Precision};

use crate::{Error, Result};

/// Render `point` as one line of line protocol, with its timestamp expressed
/// in `precision` units.
///
/// Tags and fields are written in key order. A point without fields cannot
/// be written and is rejected.
pub fn render(point: &Point, precision: Precision) -> Result<String> {
    if point.fields.is_empty() {
        return Err(Error::EmptyFields {
            measurement: point.measurement.clone(),
        });
    }

    for (field, value) in &point.fields {
        if let FieldValue::Float(f) = value {
            if !f.is_finite() {
                return Err(Error::NonFiniteField {
                    field: field.clone(),
                });
            }
        }
    }

    let timestamp = match point.time {
        Some(time) => {
            let nanos = time
                .timestamp_nanos_opt()
                .ok_or(Error::TimestampOutOfRange { time })?;
            Some(nanos.div_euclid(precision.timestamp_base()))
        }
        None => None,
    };

    Ok(LineProtocol { point, timestamp }.to_string())
}

/// Render every point of `points`, one per line.
pub fn render_all<'a>(
    points: impl IntoIterator<Item = &'a Point>,
    precision: Precision,
) -> Result<String> {
    let lines = points
        .into_iter()
        .map(|p| render(p, precision))
        .collect::<Result<Vec<_>>>()?;
    Ok(lines.join("\n"))
}

struct LineProtocol<'a> {
    point: &'a Point,
    timestamp: Option<i64>,
}

impl fmt::Display for LineProtocol<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Escaped::<Measurement>::new(&self.point.measurement))?;

        // line protocol has no empty tags
        let tags = self
            .point
            .tags
            .iter()
            .filter(|(k, v)| !k.is_empty() && !v.is_empty());
        for (k, v) in tags {
            write!(f, ",{}={}", Escaped::<Key>::new(k), Escaped::<Key>::new(v))?;
        }

        for (i, (k, v)) in self.point.fields.iter().enumerate() {
            let d = if i == 0 { " " } else { "," };
            write!(f, "{}{}={}", d, Escaped::<Key>::new(k), FieldLiteral(v))?;
        }

        if let Some(ts) = self.timestamp {
            write!(f, " {ts}")?;
        }

        Ok(())
    }
}

struct FieldLiteral<'a>(&'a FieldValue);

impl fmt::Display for FieldLiteral<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            FieldValue::Boolean(v) => write!(f, "{}", if *v { "t" } else { "f" }),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Integer(v) => write!(f, "{v}i"),
            FieldValue::String(v) => write!(f, r#""{}""#, Escaped::<StringValue>::new(v)),
            // timestamps stored as fields travel as RFC 3339 strings
            v @ FieldValue::Timestamp(_) => {
                write!(f, r#""{}""#, Escaped::<StringValue>::new(&v.to_string()))
            }
        }
    }
}

/// A string escaped according to the rules `K` when displayed.
struct Escaped<'a, K>(&'a str, PhantomData<K>);

impl<'a, K> Escaped<'a, K> {
    fn new(s: &'a str) -> Self {
        Self(s, PhantomData)
    }
}

impl<K> fmt::Display for Escaped<'_, K>
where
    K: EscapingSpecification,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut last = 0;

        for (idx, delim) in self.0.match_indices(K::DELIMITERS) {
            let s = &self.0[last..idx];
            write!(f, r#"{s}\{delim}"#)?;
            last = idx + delim.len();
        }

        f.write_str(&self.0[last..])
    }
}

/// Characters that must be escaped in one part of a line.
trait EscapingSpecification {
    const DELIMITERS: &'static [char];
}

struct Measurement;

/// Tag keys, tag values and field keys.
struct Key;

struct StringValue;

impl EscapingSpecification for Measurement {
    const DELIMITERS: &'static [char] = &[',', ' '];
}

impl EscapingSpecification for Key {
    const DELIMITERS: &'static [char] = &[',', '=', ' '];
}

impl EscapingSpecification for StringValue {
    const DELIMITERS: &'static [char] = &['"', '\\'];
}
