// SPDX-License-Identifier: Apache-2.0

//! Matrix TSV readers. A genomic matrix has samples across the header
//! and one probe per data line; a clinical matrix is the transpose, one
//! sample per line with features across the header. Both readers emit a
//! `sampleID` category field first, then one field per probe or
//! feature. Cells that do not parse as numbers are missing (NaN) in
//! float fields.

use xena_model::{FieldData, FieldSource, MatrixSource, RowSource, SAMPLE_FIELD};

fn is_missing(cell: &str) -> bool {
    cell.is_empty() || cell == "NA" || cell == "null"
}

fn parse_cell(cell: &str) -> f32 {
    let trimmed = cell.trim();
    if is_missing(trimmed) {
        return f32::NAN;
    }
    trimmed.parse().unwrap_or(f32::NAN)
}

fn split_line(line: &str) -> Vec<&str> {
    line.trim_end_matches(['\r', '\n']).split('\t').collect()
}

/// Deferred genomic matrix reader over the file's text.
#[must_use]
pub fn genomic_matrix_source(text: String) -> MatrixSource {
    MatrixSource::new(move || genomic_matrix_fields(&text).into_iter())
}

fn genomic_matrix_fields(text: &str) -> Vec<FieldSource> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let Some(header) = lines.next() else {
        return Vec::new();
    };
    let samples: Vec<Option<String>> = split_line(header)
        .into_iter()
        .skip(1)
        .map(|s| Some(s.to_string()))
        .collect();
    let width = samples.len();

    let mut fields = vec![FieldSource::new(
        SAMPLE_FIELD,
        FieldData::Category(RowSource::from_vec(samples)),
    )];
    for line in lines {
        let cols = split_line(line);
        let Some((name, cells)) = cols.split_first() else {
            continue;
        };
        let mut scores: Vec<f32> = cells.iter().map(|c| parse_cell(c)).collect();
        scores.resize(width, f32::NAN);
        fields.push(FieldSource::new(
            name.to_string(),
            FieldData::Float(RowSource::from_vec(scores)),
        ));
    }
    fields
}

/// Deferred clinical matrix reader: transposes on input so the row
/// dimension is samples, like every other dataset.
#[must_use]
pub fn clinical_matrix_source(text: String) -> MatrixSource {
    MatrixSource::new(move || clinical_matrix_fields(&text).into_iter())
}

fn clinical_matrix_fields(text: &str) -> Vec<FieldSource> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let Some(header) = lines.next() else {
        return Vec::new();
    };
    let feature_names: Vec<String> = split_line(header)
        .into_iter()
        .skip(1)
        .map(str::to_string)
        .collect();

    let mut samples: Vec<Option<String>> = Vec::new();
    let mut columns: Vec<Vec<String>> = vec![Vec::new(); feature_names.len()];
    for line in lines {
        let cols = split_line(line);
        let Some((sample, cells)) = cols.split_first() else {
            continue;
        };
        samples.push(Some(sample.to_string()));
        for (j, column) in columns.iter_mut().enumerate() {
            column.push(cells.get(j).map(|c| c.trim().to_string()).unwrap_or_default());
        }
    }

    let mut fields = vec![FieldSource::new(
        SAMPLE_FIELD,
        FieldData::Category(RowSource::from_vec(samples)),
    )];
    for (name, column) in feature_names.into_iter().zip(columns) {
        fields.push(clinical_field(name, column));
    }
    fields
}

/// A clinical column is numeric if every present cell parses; anything
/// else becomes a category field with first-seen codes.
fn clinical_field(name: String, column: Vec<String>) -> FieldSource {
    let present: Vec<&String> = column.iter().filter(|c| !is_missing(c)).collect();
    let numeric = !present.is_empty() && present.iter().all(|c| c.parse::<f64>().is_ok());
    if numeric {
        let scores = column.iter().map(|c| parse_cell(c)).collect();
        FieldSource::new(name, FieldData::Float(RowSource::from_vec(scores)))
    } else {
        let values = column
            .into_iter()
            .map(|c| if is_missing(&c) { None } else { Some(c) })
            .collect();
        FieldSource::new(name, FieldData::Category(RowSource::from_vec(values)))
    }
}
