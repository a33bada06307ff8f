//! Query result to record decoding.
//!
//! Decoding happens in two steps. [`flatten`] turns every value sequence of
//! every [`Row`] into a [`FlattenedRow`] keyed by column, tag and measurement
//! sentinel, reporting tag columns to a [`TagCollector`] on the way. A
//! [`DecodeTarget`] then projects the flattened rows onto its own shape.

use std::collections::{BTreeMap, HashMap, HashSet};

use observability_deps::tracing::debug;
use serde_json::Value;

use crate::{
    error::DecodeError,
    point::Row,
    record::{MEASUREMENT_FIELD, Record},
    tags::TagCollector,
    value::tag_string,
};

/// One result row keyed by column name, tag key and [`MEASUREMENT_FIELD`].
pub type FlattenedRow = HashMap<String, Value>;

/// Flatten `rows`, reporting every column to `collector`.
///
/// Value sequences shorter than the columns leave the trailing columns
/// absent. Row tags overlay columns of the same name.
pub fn flatten<C: TagCollector + ?Sized>(rows: Vec<Row>, collector: &mut C) -> Vec<FlattenedRow> {
    let mut flattened = Vec::with_capacity(rows.iter().map(|r| r.values.len()).sum());

    for row in rows {
        let Row {
            name,
            tags,
            columns,
            values,
        } = row;

        for value_sequence in values {
            let mut flat = FlattenedRow::with_capacity(columns.len() + tags.len() + 1);

            for (column, value) in columns.iter().zip(value_sequence) {
                collector.collect(column, &value);
                flat.insert(column.clone(), value);
            }

            for (key, value) in &tags {
                let value = Value::String(value.clone());
                collector.collect(key, &value);
                flat.insert(key.clone(), value);
            }

            flat.insert(MEASUREMENT_FIELD.to_owned(), Value::String(name.clone()));
            flattened.push(flat);
        }
    }

    flattened
}

/// Destination of a decode call.
pub trait DecodeTarget {
    /// Project `rows` onto `self`. Only called with at least one row.
    fn decode_rows(&mut self, rows: Vec<FlattenedRow>) -> Result<(), DecodeError>;
}

/// Decode `rows` into `target`.
///
/// Decoding zero flattened rows is a no-op that leaves `target` untouched.
pub fn decode<T, C>(rows: Vec<Row>, target: &mut T, collector: &mut C) -> Result<(), DecodeError>
where
    T: DecodeTarget + ?Sized,
    C: TagCollector + ?Sized,
{
    let flattened = flatten(rows, collector);
    if flattened.is_empty() {
        return Ok(());
    }
    target.decode_rows(flattened)
}

fn decode_record<R: Record>(row: &FlattenedRow) -> Result<R, DecodeError> {
    let record = R::from_flattened(row)?;

    let used: HashSet<&str> = R::descriptors()
        .iter()
        .filter_map(|d| d.source_key())
        .collect();
    let mut unused: Vec<&str> = row
        .keys()
        .map(String::as_str)
        .filter(|k| !used.contains(k))
        .collect();
    if !unused.is_empty() {
        unused.sort_unstable();
        debug!(record = R::type_name(), ?unused, "ignoring unused result keys");
    }

    Ok(record)
}

impl<R: Record> DecodeTarget for Vec<R> {
    fn decode_rows(&mut self, rows: Vec<FlattenedRow>) -> Result<(), DecodeError> {
        // decode everything before touching self so a failure leaves it intact
        let decoded = rows
            .iter()
            .map(decode_record::<R>)
            .collect::<Result<Vec<_>, _>>()?;
        self.extend(decoded);
        Ok(())
    }
}

impl<R: Record> DecodeTarget for Option<R> {
    fn decode_rows(&mut self, rows: Vec<FlattenedRow>) -> Result<(), DecodeError> {
        if let Some(row) = rows.first() {
            *self = Some(decode_record::<R>(row)?);
        }
        Ok(())
    }
}

/// String form of a wire value, as stored in a string map.
fn stringify(value: &Value) -> String {
    tag_string(value).unwrap_or_default()
}

impl DecodeTarget for HashMap<String, String> {
    fn decode_rows(&mut self, rows: Vec<FlattenedRow>) -> Result<(), DecodeError> {
        if let Some(row) = rows.into_iter().next() {
            self.extend(row.into_iter().map(|(k, v)| {
                let v = stringify(&v);
                (k, v)
            }));
        }
        Ok(())
    }
}

impl DecodeTarget for BTreeMap<String, String> {
    fn decode_rows(&mut self, rows: Vec<FlattenedRow>) -> Result<(), DecodeError> {
        if let Some(row) = rows.into_iter().next() {
            self.extend(row.into_iter().map(|(k, v)| {
                let v = stringify(&v);
                (k, v)
            }));
        }
        Ok(())
    }
}

impl DecodeTarget for Vec<BTreeMap<String, Value>> {
    fn decode_rows(&mut self, rows: Vec<FlattenedRow>) -> Result<(), DecodeError> {
        self.extend(rows.into_iter().map(|row| row.into_iter().collect()));
        Ok(())
    }
}
