//! Translation between [`IntakeRecord`] and the hosted table's row shape.
//!
//! The row layout is versioned through [`REMOTE_SCHEMA_VERSION`]. Both directions are
//! total: missing or malformed fields fall back to defaults instead of failing.

use crate::domain::entities::{IntakeRecord, LineItem};
use crate::domain::value_objects::{ConsignerType, RecordId, RecordStatus};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const REMOTE_SCHEMA_VERSION: u32 = 1;

const IMAGES_KEY: &str = "images";

/// One row of the `intake_forms` table, schema version 1.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteRow {
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub status: String,
    pub consigner_type: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub consigner_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub consigner_number: String,
    #[serde(deserialize_with = "null_as_default")]
    pub consigner_email: String,
    #[serde(deserialize_with = "null_as_default")]
    pub consigner_phone: String,
    #[serde(deserialize_with = "null_as_default")]
    pub consigner_address: String,
    /// JSON array of line items. Older rows store it as a JSON-encoded string.
    pub items: Value,
    #[serde(deserialize_with = "null_as_default")]
    pub notes: String,
    pub signature: Option<String>,
    pub initials: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub accepted_terms: bool,
    pub signed_at: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

pub fn to_remote_shape(record: &IntakeRecord) -> RemoteRow {
    RemoteRow {
        id: record.id.as_str().to_string(),
        status: record.status.as_str().to_string(),
        consigner_type: record.consigner_type.map(|t| t.as_str().to_string()),
        consigner_name: record.consigner_name.clone(),
        consigner_number: record.consigner_number.clone(),
        consigner_email: record.consigner_email.clone(),
        consigner_phone: record.consigner_phone.clone(),
        consigner_address: record.consigner_address.clone(),
        items: Value::Array(record.items.iter().map(item_to_value).collect()),
        notes: record.notes.clone(),
        signature: record.signature.clone(),
        initials: record.initials.clone(),
        accepted_terms: record.accepted_terms,
        signed_at: record.signed_at.map(format_timestamp),
        created_at: Some(format_timestamp(record.created_at)),
        updated_at: Some(format_timestamp(record.updated_at)),
    }
}

pub fn to_local_shape(row: RemoteRow) -> IntakeRecord {
    IntakeRecord {
        id: RecordId::from_trusted(row.id),
        status: RecordStatus::parse_lenient(&row.status),
        consigner_type: row.consigner_type.as_deref().and_then(ConsignerType::parse),
        consigner_name: row.consigner_name,
        consigner_number: row.consigner_number,
        consigner_email: row.consigner_email,
        consigner_phone: row.consigner_phone,
        consigner_address: row.consigner_address,
        items: items_from_value(row.items),
        notes: row.notes,
        signature: row.signature,
        initials: row.initials,
        accepted_terms: row.accepted_terms,
        signed_at: row.signed_at.as_deref().and_then(parse_timestamp),
        created_at: row
            .created_at
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or_default(),
        updated_at: row
            .updated_at
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or_default(),
    }
}

pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn item_to_value(item: &LineItem) -> Value {
    let mut fields = item.fields.clone();
    if !item.images.is_empty() {
        fields.insert(
            IMAGES_KEY.to_string(),
            Value::Array(item.images.iter().cloned().map(Value::String).collect()),
        );
    }
    Value::Object(fields)
}

fn items_from_value(value: Value) -> Vec<LineItem> {
    match value {
        Value::Array(items) => items.into_iter().filter_map(item_from_value).collect(),
        Value::String(encoded) if !encoded.trim().is_empty() => {
            match serde_json::from_str::<Value>(&encoded) {
                Ok(decoded @ Value::Array(_)) => items_from_value(decoded),
                _ => {
                    tracing::warn!(
                        target: "sync::codec",
                        "items column is not a JSON array; treating as empty"
                    );
                    Vec::new()
                }
            }
        }
        _ => Vec::new(),
    }
}

fn item_from_value(value: Value) -> Option<LineItem> {
    let Value::Object(mut fields) = value else {
        tracing::warn!(target: "sync::codec", "dropping non-object line item");
        return None;
    };

    let images = match fields.remove(IMAGES_KEY) {
        Some(Value::Array(images)) if images.iter().all(Value::is_string) => images
            .into_iter()
            .filter_map(|image| match image {
                Value::String(uri) => Some(uri),
                _ => None,
            })
            .collect(),
        Some(other) => {
            fields.insert(IMAGES_KEY.to_string(), other);
            Vec::new()
        }
        None => Vec::new(),
    };

    Some(LineItem {
        images,
        fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn full_record() -> IntakeRecord {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let mut record = IntakeRecord::for_new_consigner(
            RecordId::new("f1".to_string()).unwrap(),
            "Jane Doe",
        );
        record.status = RecordStatus::Signed;
        record.consigner_email = "jane@example.com".into();
        record.consigner_phone = "555-0100".into();
        record.consigner_address = "1 Main St".into();
        record.notes = "fragile".into();
        record.items = vec![
            LineItem::default()
                .with_field("description", "Lamp")
                .with_field("price", 45.5)
                .with_image("data:image/png;base64,AAAA"),
            LineItem::default().with_field("description", "Chair"),
        ];
        record.signature = Some("data:image/png;base64,SIG".into());
        record.initials = Some("JD".into());
        record.accepted_terms = true;
        record.signed_at = Some(created + Duration::minutes(5));
        record.created_at = created;
        record.updated_at = created + Duration::nanoseconds(123_456_789);
        record
    }

    #[test]
    fn round_trip_preserves_every_field() {
        let record = full_record();
        let row = to_remote_shape(&record);
        assert_eq!(to_local_shape(row), record);
    }

    #[test]
    fn round_trip_survives_json_transport() {
        let record = full_record();
        let wire = serde_json::to_string(&to_remote_shape(&record)).unwrap();
        let row: RemoteRow = serde_json::from_str(&wire).unwrap();
        assert_eq!(to_local_shape(row), record);
    }

    #[test]
    fn row_uses_snake_case_columns() {
        let value = serde_json::to_value(to_remote_shape(&full_record())).unwrap();
        assert_eq!(value["consigner_name"], "Jane Doe");
        assert_eq!(value["consigner_type"], "new");
        assert_eq!(value["accepted_terms"], true);
        assert_eq!(value["items"][0]["images"][0], "data:image/png;base64,AAAA");
    }

    #[test]
    fn missing_fields_map_to_defaults() {
        let row: RemoteRow = serde_json::from_value(json!({ "id": "x9" })).unwrap();
        let record = to_local_shape(row);

        assert_eq!(record.id.as_str(), "x9");
        assert_eq!(record.status, RecordStatus::Draft);
        assert_eq!(record.consigner_type, None);
        assert!(record.items.is_empty());
        assert_eq!(record.updated_at, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn null_columns_map_to_defaults() {
        let row: RemoteRow = serde_json::from_value(json!({
            "id": "x3",
            "consigner_name": null,
            "notes": null,
            "accepted_terms": null,
            "items": null
        }))
        .unwrap();
        let record = to_local_shape(row);

        assert_eq!(record.consigner_name, "");
        assert_eq!(record.notes, "");
        assert!(!record.accepted_terms);
        assert!(record.items.is_empty());
    }

    #[test]
    fn items_encoded_as_string_are_decoded() {
        let row: RemoteRow = serde_json::from_value(json!({
            "id": "x1",
            "items": "[{\"description\":\"Vase\",\"images\":[\"data:x\"]}]"
        }))
        .unwrap();
        let record = to_local_shape(row);

        assert_eq!(record.items.len(), 1);
        assert_eq!(record.items[0].images, vec!["data:x".to_string()]);
        assert_eq!(record.items[0].fields["description"], "Vase");
    }

    #[test]
    fn garbage_values_never_fail() {
        let row: RemoteRow = serde_json::from_value(json!({
            "id": "x2",
            "status": "archived",
            "consigner_type": "vip",
            "items": 42,
            "updated_at": "yesterday"
        }))
        .unwrap();
        let record = to_local_shape(row);

        assert_eq!(record.status, RecordStatus::Draft);
        assert_eq!(record.consigner_type, None);
        assert!(record.items.is_empty());
        assert_eq!(record.updated_at, DateTime::<Utc>::UNIX_EPOCH);
    }
}
