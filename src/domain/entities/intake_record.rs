use crate::domain::value_objects::{ConsignerType, RecordId, RecordStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One consignment intake form. This is the shape the rest of the application sees;
/// the remote row shape never leaves `infrastructure::remote`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeRecord {
    pub id: RecordId,
    #[serde(default)]
    pub status: RecordStatus,
    #[serde(default)]
    pub consigner_type: Option<ConsignerType>,
    #[serde(default)]
    pub consigner_name: String,
    #[serde(default)]
    pub consigner_number: String,
    #[serde(default)]
    pub consigner_email: String,
    #[serde(default)]
    pub consigner_phone: String,
    #[serde(default)]
    pub consigner_address: String,
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub notes: String,
    /// Signature image as a data URI.
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub initials: Option<String>,
    #[serde(default)]
    pub accepted_terms: bool,
    #[serde(default)]
    pub signed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

/// A line item. Scalar fields are free-form and pass through untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LineItem {
    /// Embedded photos as data URIs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl IntakeRecord {
    pub fn new_draft(id: RecordId) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: RecordStatus::Draft,
            consigner_type: None,
            consigner_name: String::new(),
            consigner_number: String::new(),
            consigner_email: String::new(),
            consigner_phone: String::new(),
            consigner_address: String::new(),
            items: Vec::new(),
            notes: String::new(),
            signature: None,
            initials: None,
            accepted_terms: false,
            signed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn for_new_consigner(id: RecordId, name: impl Into<String>) -> Self {
        let mut record = Self::new_draft(id);
        record.consigner_type = Some(ConsignerType::New);
        record.consigner_name = name.into();
        record
    }

    pub fn for_existing_consigner(id: RecordId, number: impl Into<String>) -> Self {
        let mut record = Self::new_draft(id);
        record.consigner_type = Some(ConsignerType::Existing);
        record.consigner_number = number.into();
        record
    }

    /// The two structural requirements the remote table enforces.
    pub fn validate_for_sync(&self) -> Result<(), String> {
        if self.id.is_blank() {
            return Err("record id is required".to_string());
        }
        match self.consigner_type {
            None => Err("consigner type is required".to_string()),
            Some(ConsignerType::New) if self.consigner_name.trim().is_empty() => {
                Err("new consigner requires a name".to_string())
            }
            Some(ConsignerType::Existing) if self.consigner_number.trim().is_empty() => {
                Err("existing consigner requires a consigner number".to_string())
            }
            Some(_) => Ok(()),
        }
    }
}

impl LineItem {
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_image(mut self, data_uri: impl Into<String>) -> Self {
        self.images.push(data_uri.into());
        self
    }
}
