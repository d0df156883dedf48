#![forbid(unsafe_code)]

mod dataset;
mod field;
mod limits;
mod source;

pub use crate::dataset::{DatasetMeta, DatasetName, DatasetStatus, FieldName, ValidationError};
pub use crate::field::{
    FeatureMeta, FieldData, FieldSource, MatrixSource, PositionRow, RowSource, ValueType,
};
pub use crate::limits::{
    validate_category_value, validate_metadata_text, validate_source_path,
    MAX_CATEGORY_VALUE_LEN, MAX_DATASET_NAME_LEN, MAX_FIELD_NAME_LEN, MAX_METADATA_TEXT_LEN,
    MAX_SOURCE_PATH_LEN,
};
pub use crate::source::SourceFile;

pub const CRATE_NAME: &str = "xena-model";

/// Name of the category field mapping storage rows to sample ids.
/// Parsers emit it; the fetch pipeline resolves sample lists through it.
pub const SAMPLE_FIELD: &str = "sampleID";
