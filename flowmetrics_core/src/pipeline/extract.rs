use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::models::FileMetric;
use crate::events::models::EventRecord;

/// Logical field of a `FileMetric`, named after its sink column.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricField {
    WorkloadId,
    BucketName,
    Key,
    Size,
    LastModified,
}

impl MetricField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WorkloadId => "workload_id",
            Self::BucketName => "bucket_name",
            Self::Key => "key",
            Self::Size => "size",
            Self::LastModified => "last_modified",
        }
    }
}

impl fmt::Display for MetricField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("missing attribute `{attribute}` for {field}")]
    MissingAttribute {
        field: MetricField,
        attribute: String,
    },

    #[error("malformed attribute `{attribute}` for {field}: {raw:?}")]
    MalformedAttribute {
        field: MetricField,
        attribute: String,
        raw: String,
    },
}

impl ExtractionError {
    pub fn field(&self) -> MetricField {
        match self {
            Self::MissingAttribute { field, .. } | Self::MalformedAttribute { field, .. } => *field,
        }
    }
}

/// Event attribute key for each metric field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeKeys {
    pub workload_id: String,
    pub bucket_name: String,
    pub key: String,
    pub size: String,
    pub last_modified: String,
}

impl Default for AttributeKeys {
    /// Attributes written by the `FetchS3Object` processor.
    fn default() -> Self {
        Self {
            workload_id: "workload_id".to_string(),
            bucket_name: "s3.bucket".to_string(),
            key: "orig_filename".to_string(),
            size: "s3.length".to_string(),
            last_modified: "s3.lastModified".to_string(),
        }
    }
}

impl AttributeKeys {
    fn key_for(&self, field: MetricField) -> &str {
        match field {
            MetricField::WorkloadId => &self.workload_id,
            MetricField::BucketName => &self.bucket_name,
            MetricField::Key => &self.key,
            MetricField::Size => &self.size,
            MetricField::LastModified => &self.last_modified,
        }
    }
}

/// Maps a filtered event onto a `FileMetric`. All five fields are required;
/// extraction yields either a complete record or an error, never a partial one.
#[derive(Debug, Clone, Default)]
pub struct FieldExtractor {
    keys: AttributeKeys,
}

impl FieldExtractor {
    pub fn new(keys: AttributeKeys) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &AttributeKeys {
        &self.keys
    }

    pub fn extract(&self, event: &EventRecord) -> Result<FileMetric, ExtractionError> {
        let workload_id = self.required(event, MetricField::WorkloadId)?;
        let bucket_name = self.required(event, MetricField::BucketName)?;
        let key = self.required(event, MetricField::Key)?;

        let size_raw = self.required(event, MetricField::Size)?;
        let size = self.parse_i64(MetricField::Size, size_raw)?;

        let last_modified_raw = self.required(event, MetricField::LastModified)?;
        let millis = self.parse_i64(MetricField::LastModified, last_modified_raw)?;
        let last_modified = DateTime::<Utc>::from_timestamp_millis(millis)
            .ok_or_else(|| self.malformed(MetricField::LastModified, last_modified_raw))?;

        Ok(FileMetric {
            workload_id: workload_id.to_string(),
            bucket_name: bucket_name.to_string(),
            key: key.to_string(),
            size,
            last_modified,
        })
    }

    fn required<'e>(
        &self,
        event: &'e EventRecord,
        field: MetricField,
    ) -> Result<&'e str, ExtractionError> {
        let attribute = self.keys.key_for(field);
        event
            .attribute(attribute)
            .ok_or_else(|| ExtractionError::MissingAttribute {
                field,
                attribute: attribute.to_string(),
            })
    }

    fn parse_i64(&self, field: MetricField, raw: &str) -> Result<i64, ExtractionError> {
        raw.parse::<i64>().map_err(|_| self.malformed(field, raw))
    }

    fn malformed(&self, field: MetricField, raw: &str) -> ExtractionError {
        ExtractionError::MalformedAttribute {
            field,
            attribute: self.keys.key_for(field).to_string(),
            raw: raw.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::events::models::EventType;

    fn fetch_event(attrs: &[(&str, &str)]) -> EventRecord {
        let attributes: BTreeMap<String, String> = attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EventRecord::new(1, "FetchS3Object", EventType::Fetch, attributes)
    }

    fn complete() -> Vec<(&'static str, &'static str)> {
        vec![
            ("workload_id", "w1"),
            ("s3.bucket", "b1"),
            ("orig_filename", "k1"),
            ("s3.length", "42"),
            ("s3.lastModified", "1600000000000"),
        ]
    }

    #[test]
    fn extracts_all_fields_from_valid_input() {
        let metric = FieldExtractor::default()
            .extract(&fetch_event(&complete()))
            .unwrap();
        assert_eq!(
            metric,
            FileMetric {
                workload_id: "w1".to_string(),
                bucket_name: "b1".to_string(),
                key: "k1".to_string(),
                size: 42,
                last_modified: DateTime::from_timestamp(1_600_000_000, 0).unwrap(),
            }
        );
    }

    #[test]
    fn missing_size_fails_with_missing_attribute() {
        let attrs: Vec<_> = complete()
            .into_iter()
            .filter(|(k, _)| *k != "s3.length")
            .collect();
        let err = FieldExtractor::default()
            .extract(&fetch_event(&attrs))
            .unwrap_err();
        assert_eq!(
            err,
            ExtractionError::MissingAttribute {
                field: MetricField::Size,
                attribute: "s3.length".to_string(),
            }
        );
        assert_eq!(err.field().as_str(), "size");
    }

    #[test]
    fn every_field_is_required() {
        for (missing, field) in [
            ("workload_id", MetricField::WorkloadId),
            ("s3.bucket", MetricField::BucketName),
            ("orig_filename", MetricField::Key),
            ("s3.lastModified", MetricField::LastModified),
        ] {
            let attrs: Vec<_> = complete()
                .into_iter()
                .filter(|(k, _)| *k != missing)
                .collect();
            let err = FieldExtractor::default()
                .extract(&fetch_event(&attrs))
                .unwrap_err();
            assert!(matches!(err, ExtractionError::MissingAttribute { .. }));
            assert_eq!(err.field(), field);
        }
    }

    #[test]
    fn non_numeric_size_is_malformed() {
        let mut attrs = complete();
        attrs[3] = ("s3.length", "42 bytes");
        let err = FieldExtractor::default()
            .extract(&fetch_event(&attrs))
            .unwrap_err();
        assert_eq!(
            err,
            ExtractionError::MalformedAttribute {
                field: MetricField::Size,
                attribute: "s3.length".to_string(),
                raw: "42 bytes".to_string(),
            }
        );
    }

    #[test]
    fn unparsable_or_out_of_range_timestamp_is_malformed() {
        for raw in ["2020-09-13T12:26:40Z", "", "9223372036854775807"] {
            let mut attrs = complete();
            attrs[4] = ("s3.lastModified", raw);
            let err = FieldExtractor::default()
                .extract(&fetch_event(&attrs))
                .unwrap_err();
            assert!(matches!(
                err,
                ExtractionError::MalformedAttribute {
                    field: MetricField::LastModified,
                    ..
                }
            ));
        }
    }

    #[test]
    fn empty_workload_id_is_passed_through() {
        let mut attrs = complete();
        attrs[0] = ("workload_id", "");
        let metric = FieldExtractor::default()
            .extract(&fetch_event(&attrs))
            .unwrap();
        assert_eq!(metric.workload_id, "");
    }

    #[test]
    fn custom_attribute_keys() {
        let keys = AttributeKeys {
            bucket_name: "gcs.bucket".to_string(),
            ..AttributeKeys::default()
        };
        let mut attrs = complete();
        attrs[1] = ("gcs.bucket", "b2");
        let metric = FieldExtractor::new(keys)
            .extract(&fetch_event(&attrs))
            .unwrap();
        assert_eq!(metric.bucket_name, "b2");
    }
}
