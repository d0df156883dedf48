use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::limits::{MAX_DATASET_NAME_LEN, MAX_FIELD_NAME_LEN};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError(pub String);

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetName(String);

impl DatasetName {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(ValidationError("dataset name must not be empty".to_string()));
        }
        if s.len() > MAX_DATASET_NAME_LEN {
            return Err(ValidationError(format!(
                "dataset name exceeds max length {MAX_DATASET_NAME_LEN}"
            )));
        }
        if s.chars().any(char::is_control) {
            return Err(ValidationError(
                "dataset name must not contain control characters".to_string(),
            ));
        }
        Ok(Self(s.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DatasetName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldName(String);

impl FieldName {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        if input.is_empty() {
            return Err(ValidationError("field name must not be empty".to_string()));
        }
        if input.len() > MAX_FIELD_NAME_LEN {
            return Err(ValidationError(format!(
                "field name exceeds max length {MAX_FIELD_NAME_LEN}"
            )));
        }
        Ok(Self(input.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for FieldName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Load-state of a dataset row. `Loading` persists only while a load is
/// in flight or after a process death mid-load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetStatus {
    Loading,
    Loaded,
}

impl DatasetStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Loaded => "loaded",
        }
    }
}

/// Normalized dataset metadata columns. Every key is optional; the raw
/// JSON text is stored alongside, so unknown keys are preserved there.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetMeta {
    #[serde(rename = "probeMap")]
    pub probemap: Option<String>,
    #[serde(rename = "shortTitle")]
    pub short_title: Option<String>,
    #[serde(rename = "longTitle")]
    pub long_title: Option<String>,
    #[serde(rename = "groupTitle")]
    pub group_title: Option<String>,
    pub platform: Option<String>,
    pub cohort: Option<String>,
    pub security: Option<String>,
    #[serde(rename = "dataSubType")]
    pub data_sub_type: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl DatasetMeta {
    /// Pick the normalized columns out of a raw metadata object. Unknown
    /// keys are ignored here and kept in the raw JSON text.
    #[must_use]
    pub fn from_value(value: &serde_json::Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_name_rejects_empty_and_control() {
        assert!(DatasetName::parse("  ").is_err());
        assert!(DatasetName::parse("a\nb").is_err());
        assert!(DatasetName::parse("tcga/BRCA/HiSeqV2").is_ok());
    }

    #[test]
    fn dataset_name_enforces_limit() {
        let long = "x".repeat(MAX_DATASET_NAME_LEN + 1);
        assert!(DatasetName::parse(&long).is_err());
    }

    #[test]
    fn meta_extracts_known_keys_only() {
        let raw = serde_json::json!({
            "shortTitle": "BRCA",
            "type": "genomicMatrix",
            "custom": {"nested": true}
        });
        let meta = DatasetMeta::from_value(&raw);
        assert_eq!(meta.short_title.as_deref(), Some("BRCA"));
        assert_eq!(meta.kind.as_deref(), Some("genomicMatrix"));
        assert!(meta.cohort.is_none());
    }
}
