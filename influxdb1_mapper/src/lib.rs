//! # influxdb1_mapper
//!
//! Maps Rust records to and from the InfluxDB 1.x data model (measurement,
//! timestamp, tags, fields).
//!
//! Records describe themselves through the [`Record`] trait, usually implemented
//! with the [`influx_record!`] macro. Every field may carry an `influx`
//! annotation of the form `name[,tag][,field][,key:value]`:
//!
//! - `name` renames the field on the wire (defaults to the Rust field name);
//! - `-` as the name skips the field entirely;
//! - `tag` and `field` select the role(s); a field with neither is a field;
//! - `measurement:<name>` sets the measurement of the point.
//!
//! ```
//! use influxdb1_mapper::{encode, influx_record, FieldValue};
//!
//! influx_record! {
//!     #[derive(Debug, Default)]
//!     pub struct EnvSample {
//!         #[influx("location,tag")]
//!         pub location: String,
//!         #[influx("temperature")]
//!         pub temperature: f64,
//!         #[influx("-")]
//!         pub id: String,
//!     }
//! }
//!
//! let point = encode(&EnvSample { location: "Rm 243".into(), temperature: 70.0, ..Default::default() }, None)
//!     .expect("encode sample");
//! assert_eq!(point.measurement, "EnvSample");
//! assert_eq!(point.tags["location"], "Rm 243");
//! assert_eq!(point.fields["temperature"], FieldValue::Float(70.0));
//! ```
//!
//! Reading goes the other way: [`decode`] flattens the series returned by a
//! query and projects them onto a [`DecodeTarget`], optionally collecting the
//! distinct values of every tag key of the measurement (see [`tags`]).
//!
//! The [`Client`] facade wires both directions to a [`QueryExecutor`] and a
//! [`PointWriter`] supplied by a transport crate.

pub mod annotation;
pub mod client;
pub mod decode;
pub mod distinct_set;
pub mod encode;
pub mod error;
pub mod loading_cache;
pub mod point;
pub mod query;
pub mod record;
pub mod tags;
pub mod value;

pub use annotation::FieldMetadata;
pub use client::{Client, PointWriter, Precision, QueryExecutor};
pub use decode::{DecodeTarget, FlattenedRow, decode, flatten};
pub use distinct_set::BoundedDistinctSet;
pub use encode::{encode, encode_json};
pub use error::{CoercionError, DecodeError, DynError, Error, Result};
pub use loading_cache::LoadingCache;
pub use point::{Point, Row};
pub use query::clean_query;
pub use record::{
    DEFAULT_TIME_FIELD, FieldDescriptor, MEASUREMENT_FIELD, Record, decode_field,
};
pub use tags::{QueryOption, TagCollector, TagValues};
pub use value::{FieldKind, FieldType, FieldValue, Measurement, tag_string};

/// Defines a struct and implements [`Record`] for it.
///
/// Each field may carry an `#[influx("...")]` annotation next to its doc
/// comments and other attributes. Only the first annotation counts and none
/// reach the generated struct. Field types must implement [`FieldType`].
///
/// ```
/// use chrono::{DateTime, Utc};
/// use influxdb1_mapper::{influx_record, Record};
///
/// influx_record! {
///     #[derive(Debug, Default, PartialEq)]
///     pub struct Cpu {
///         pub influx_measurement: String,
///         pub time: DateTime<Utc>,
///         #[influx("host,tag")]
///         pub host: String,
///         /// Idle share of the cpu
///         #[influx("usage_idle")]
///         pub idle: f64,
///     }
/// }
///
/// assert_eq!(Cpu::type_name(), "Cpu");
/// assert_eq!(Cpu::descriptors().len(), 4);
/// ```
#[macro_export]
macro_rules! influx_record {
    (@annotation) => {
        ""
    };
    (@annotation [influx($annotation:literal)] $($rest:tt)*) => {
        $annotation
    };
    (@annotation [$($other:tt)*] $($rest:tt)*) => {
        $crate::influx_record!(@annotation $($rest)*)
    };
    (@struct [$($header:tt)*] [$($out:tt)*]) => {
        $($header)* { $($out)* }
    };
    (@struct $header:tt [$($out:tt)*] [#[influx($annotation:literal)] $($attrs:tt)*] $decl:tt $($rest:tt)*) => {
        $crate::influx_record!(@struct $header [$($out)*] [$($attrs)*] $decl $($rest)*);
    };
    (@struct $header:tt [$($out:tt)*] [#[$($attr:tt)*] $($attrs:tt)*] $decl:tt $($rest:tt)*) => {
        $crate::influx_record!(@struct $header [$($out)* #[$($attr)*]] [$($attrs)*] $decl $($rest)*);
    };
    (@struct $header:tt [$($out:tt)*] [] [$($decl:tt)*] $($rest:tt)*) => {
        $crate::influx_record!(@struct $header [$($out)* $($decl)*,] $($rest)*);
    };
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$($field_attr:tt)*])*
                $field_vis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $crate::influx_record!(
            @struct [$(#[$meta])* $vis struct $name] []
            $( [$(#[$($field_attr)*])*] [$field_vis $field : $ty] )*
        );

        impl $crate::Record for $name {
            fn type_name() -> &'static str {
                ::std::stringify!($name)
            }

            fn descriptors() -> &'static [$crate::FieldDescriptor] {
                static DESCRIPTORS: ::std::sync::LazyLock<::std::vec::Vec<$crate::FieldDescriptor>> =
                    ::std::sync::LazyLock::new(|| {
                        ::std::vec![
                            $(
                                $crate::FieldDescriptor::new(
                                    ::std::stringify!($field),
                                    $crate::influx_record!(@annotation $([$($field_attr)*])*),
                                    <$ty as $crate::FieldType>::KIND,
                                ),
                            )*
                        ]
                    });
                &DESCRIPTORS
            }

            fn field_values(&self) -> ::std::vec::Vec<::std::option::Option<$crate::FieldValue>> {
                ::std::vec![$($crate::FieldType::to_field_value(&self.$field),)*]
            }

            #[allow(unused_mut, unused_variables)]
            fn from_flattened(
                row: &$crate::FlattenedRow,
            ) -> ::std::result::Result<Self, $crate::DecodeError> {
                let mut descriptors = <Self as $crate::Record>::descriptors().iter();
                ::std::result::Result::Ok(Self {
                    $($field: $crate::decode_field::<$ty>(descriptors.next(), row)?,)*
                })
            }
        }
    };
}
