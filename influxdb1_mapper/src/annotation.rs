//! Parsing of the per-field `influx` annotation.
//!
//! The grammar is `name[,role...][,key:value...]`. Roles are `tag` and `field`;
//! any other segment of the form `key:value` is kept as a property. Malformed
//! segments are ignored.

use std::collections::BTreeMap;

/// Output name marking a field as excluded from both encoding and decoding.
pub const SKIP: &str = "-";

/// Role token marking a field as a tag.
pub const TAG_ROLE: &str = "tag";

/// Role token marking a field as a field.
pub const FIELD_ROLE: &str = "field";

/// Property key that redirects the measurement of the encoded point.
pub const MEASUREMENT_PROPERTY: &str = "measurement";

/// Structured form of one field annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMetadata {
    output_name: String,
    is_tag: bool,
    is_field: bool,
    properties: BTreeMap<String, String>,
}

impl FieldMetadata {
    /// Parse the annotation of the struct field `struct_field_name`.
    ///
    /// The output name defaults to the struct field name as written. A field
    /// carrying neither the `tag` nor the `field` role becomes a field.
    pub fn parse(struct_field_name: &str, annotation: &str) -> Self {
        let mut segments = annotation.split(',');
        let output_name = match segments.next().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => struct_field_name,
        };

        let mut metadata = Self {
            output_name: output_name.to_owned(),
            is_tag: false,
            is_field: false,
            properties: BTreeMap::new(),
        };

        if metadata.is_skipped() {
            return metadata;
        }

        for segment in segments.map(str::trim) {
            match segment {
                TAG_ROLE => metadata.is_tag = true,
                FIELD_ROLE => metadata.is_field = true,
                other => {
                    if let Some((key, value)) = other.split_once(':') {
                        let key = key.trim();
                        if !key.is_empty() {
                            metadata
                                .properties
                                .insert(key.to_owned(), value.trim().to_owned());
                        }
                    }
                }
            }
        }

        if !metadata.is_tag && !metadata.is_field {
            metadata.is_field = true;
        }

        metadata
    }

    /// Name of the tag or field on the wire.
    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    pub fn is_tag(&self) -> bool {
        self.is_tag
    }

    pub fn is_field(&self) -> bool {
        self.is_field
    }

    /// `true` when the annotation names the skip marker.
    pub fn is_skipped(&self) -> bool {
        self.output_name == SKIP
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// The non-empty `measurement` property, if any.
    pub fn measurement(&self) -> Option<&str> {
        self.property(MEASUREMENT_PROPERTY).filter(|m| !m.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parse_roles_and_names() {
        struct TestCase {
            annotation: &'static str,
            output_name: &'static str,
            is_tag: bool,
            is_field: bool,
        }

        let cases = [
            TestCase {
                annotation: "",
                output_name: "Test",
                is_tag: false,
                is_field: true,
            },
            TestCase {
                annotation: ",tag",
                output_name: "Test",
                is_tag: true,
                is_field: false,
            },
            TestCase {
                annotation: ",field,tag",
                output_name: "Test",
                is_tag: true,
                is_field: true,
            },
            TestCase {
                annotation: ",tag,field",
                output_name: "Test",
                is_tag: true,
                is_field: true,
            },
            TestCase {
                annotation: ",field",
                output_name: "Test",
                is_tag: false,
                is_field: true,
            },
            TestCase {
                annotation: "test",
                output_name: "test",
                is_tag: false,
                is_field: true,
            },
            TestCase {
                annotation: "test,tag",
                output_name: "test",
                is_tag: true,
                is_field: false,
            },
            TestCase {
                annotation: "test,tag,field",
                output_name: "test",
                is_tag: true,
                is_field: true,
            },
            TestCase {
                annotation: "-,tag,field",
                output_name: "-",
                is_tag: false,
                is_field: false,
            },
            TestCase {
                annotation: "-",
                output_name: "-",
                is_tag: false,
                is_field: false,
            },
        ];

        for case in cases {
            let metadata = FieldMetadata::parse("Test", case.annotation);
            assert_eq!(
                metadata.output_name(),
                case.output_name,
                "annotation: {:?}",
                case.annotation
            );
            assert_eq!(metadata.is_tag(), case.is_tag, "annotation: {:?}", case.annotation);
            assert_eq!(
                metadata.is_field(),
                case.is_field,
                "annotation: {:?}",
                case.annotation
            );
        }
    }

    #[test]
    fn skipped_field_ignores_properties() {
        let metadata = FieldMetadata::parse("id", "-,measurement:cpu");
        assert!(metadata.is_skipped());
        assert!(metadata.properties().is_empty());
        assert_eq!(metadata.measurement(), None);
    }

    #[test]
    fn properties_are_collected() {
        let metadata = FieldMetadata::parse("_m", ",measurement:test,unit:celsius");
        assert_eq!(metadata.output_name(), "_m");
        assert_eq!(metadata.measurement(), Some("test"));
        assert_eq!(metadata.property("unit"), Some("celsius"));
        // properties alone do not assign a role
        assert!(metadata.is_field());
        assert!(!metadata.is_tag());
    }

    #[test]
    fn malformed_segments_are_ignored() {
        let metadata = FieldMetadata::parse("host", "host,,bogus,:novalue,tag");
        assert!(metadata.is_tag());
        assert!(!metadata.is_field());
        assert!(metadata.properties().is_empty());
    }

    #[test]
    fn empty_measurement_property_is_absent() {
        let metadata = FieldMetadata::parse("m", ",measurement:");
        assert_eq!(metadata.property(MEASUREMENT_PROPERTY), Some(""));
        assert_eq!(metadata.measurement(), None);
    }
}
