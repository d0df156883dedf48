//! Deterministic test-data synthesis backing the `-t` flag: a matrix of
//! the requested dimensions written straight through the loader, no
//! files involved.

use xena_core::sha256_hex;
use xena_model::{FieldData, FieldSource, MatrixSource, RowSource, SourceFile, SAMPLE_FIELD};

pub struct TestData {
    pub sources: Vec<SourceFile>,
    pub matrix: MatrixSource,
}

#[must_use]
pub fn test_matrix(name: &str, samples: usize, probes: usize) -> TestData {
    let stamp = format!("{name}:{samples}x{probes}");
    let sources = vec![SourceFile::new(
        format!(":synthetic:{name}"),
        0,
        sha256_hex(stamp.as_bytes()),
    )];
    let matrix = MatrixSource::new(move || {
        let sample_names: Vec<Option<String>> =
            (0..samples).map(|j| Some(format!("sample{}", j + 1))).collect();
        let mut fields = vec![FieldSource::new(
            SAMPLE_FIELD,
            FieldData::Category(RowSource::from_vec(sample_names)),
        )];
        for i in 0..probes {
            let scores: Vec<f32> = (0..samples)
                .map(|j| (i + 1) as f32 + (j + 1) as f32 / 1000.0)
                .collect();
            fields.push(FieldSource::new(
                format!("probe{}", i + 1),
                FieldData::Float(RowSource::from_vec(scores)),
            ));
        }
        fields.into_iter()
    });
    TestData { sources, matrix }
}
