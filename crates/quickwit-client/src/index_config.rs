//! Index configuration document posted to the index-management endpoint.

use crate::error::ClientError;
use serde::{Deserialize, Serialize};

/// Config format version understood by the service.
pub const INDEX_CONFIG_VERSION: &str = "0.8";

/// Name of the datetime field every benchmark document carries.
pub const TIMESTAMP_FIELD: &str = "timestamp";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub version: String,
    pub index_id: String,
    pub doc_mapping: DocMapping,
    pub indexing_settings: IndexingSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocMappingMode {
    Dynamic,
    Strict,
    Lenient,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocMapping {
    pub mode: DocMappingMode,
    pub field_mappings: Vec<FieldMapping>,
    pub timestamp_field: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input_formats: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,
    #[serde(default)]
    pub fast: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexingSettings {
    pub commit_timeout_secs: u64,
}

impl IndexConfig {
    /// Dynamic-mode index keyed on an epoch-seconds `timestamp` fast field.
    pub fn benchmark(index_id: impl Into<String>, commit_timeout_secs: u64) -> Self {
        Self {
            version: INDEX_CONFIG_VERSION.to_string(),
            index_id: index_id.into(),
            doc_mapping: DocMapping {
                mode: DocMappingMode::Dynamic,
                field_mappings: vec![FieldMapping {
                    name: TIMESTAMP_FIELD.to_string(),
                    field_type: "datetime".to_string(),
                    input_formats: vec!["unix_timestamp".to_string()],
                    output_format: Some("unix_timestamp_secs".to_string()),
                    fast: true,
                }],
                timestamp_field: TIMESTAMP_FIELD.to_string(),
            },
            indexing_settings: IndexingSettings {
                commit_timeout_secs,
            },
        }
    }

    pub fn to_yaml(&self) -> Result<String, ClientError> {
        Ok(serde_yaml::to_string(self)?)
    }
}
