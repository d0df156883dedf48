use crate::dataset::ValidationError;

pub const MAX_DATASET_NAME_LEN: usize = 1000;
pub const MAX_FIELD_NAME_LEN: usize = 255;
pub const MAX_CATEGORY_VALUE_LEN: usize = 16_384;
pub const MAX_METADATA_TEXT_LEN: usize = 65_535;
pub const MAX_SOURCE_PATH_LEN: usize = 2000;

pub fn validate_category_value(value: &str) -> Result<(), ValidationError> {
    if value.len() > MAX_CATEGORY_VALUE_LEN {
        return Err(ValidationError(format!(
            "category value exceeds max length {MAX_CATEGORY_VALUE_LEN}"
        )));
    }
    Ok(())
}

pub fn validate_metadata_text(text: &str) -> Result<(), ValidationError> {
    if text.len() > MAX_METADATA_TEXT_LEN {
        return Err(ValidationError(format!(
            "dataset metadata text exceeds max length {MAX_METADATA_TEXT_LEN}"
        )));
    }
    Ok(())
}

pub fn validate_source_path(path: &str) -> Result<(), ValidationError> {
    if path.is_empty() {
        return Err(ValidationError("source path must not be empty".to_string()));
    }
    if path.len() > MAX_SOURCE_PATH_LEN {
        return Err(ValidationError(format!(
            "source path exceeds max length {MAX_SOURCE_PATH_LEN}"
        )));
    }
    Ok(())
}
