// SPDX-License-Identifier: Apache-2.0

//! Probemap reader: tab-separated probe, chrom, chromStart, chromEnd,
//! strand, comma-separated genes. Emits three aligned fields keyed by
//! probe row: `name` (category), `position`, `genes`.

use tracing::warn;

use xena_model::{FieldData, FieldSource, MatrixSource, PositionRow, RowSource};

struct ProbeRow {
    name: String,
    position: PositionRow,
    genes: Vec<String>,
}

#[must_use]
pub fn probemap_source(text: String) -> MatrixSource {
    MatrixSource::new(move || probemap_fields(&text).into_iter())
}

fn parse_row(line: &str) -> Option<ProbeRow> {
    let cols: Vec<&str> = line.trim_end_matches(['\r', '\n']).split('\t').collect();
    let name = (*cols.first()?).to_string();
    if name.is_empty() {
        return None;
    }
    let chrom = cols.get(1).unwrap_or(&"").to_string();
    let chrom_start = cols.get(2).and_then(|c| c.trim().parse().ok()).unwrap_or(0);
    let chrom_end = cols.get(3).and_then(|c| c.trim().parse().ok()).unwrap_or(0);
    let strand = cols
        .get(4)
        .map(|s| s.trim())
        .filter(|s| *s == "+" || *s == "-")
        .map(str::to_string);
    let genes = cols
        .get(5)
        .map(|g| {
            g.split(',')
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    Some(ProbeRow {
        name,
        position: PositionRow {
            chrom,
            chrom_start,
            chrom_end,
            strand,
        },
        genes,
    })
}

fn probemap_fields(text: &str) -> Vec<FieldSource> {
    let mut rows: Vec<ProbeRow> = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_row(line) {
            Some(row) => rows.push(row),
            None => warn!(line = lineno + 1, "skipping malformed probemap row"),
        }
    }

    let names: Vec<Option<String>> = rows.iter().map(|r| Some(r.name.clone())).collect();
    let positions: Vec<PositionRow> = rows.iter().map(|r| r.position.clone()).collect();
    let genes: Vec<Vec<String>> = rows.into_iter().map(|r| r.genes).collect();
    vec![
        FieldSource::new("name", FieldData::Category(RowSource::from_vec(names))),
        FieldSource::new("position", FieldData::Position(RowSource::from_vec(positions))),
        FieldSource::new("genes", FieldData::Genes(RowSource::from_vec(genes))),
    ]
}
