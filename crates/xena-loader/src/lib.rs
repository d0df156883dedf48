#![forbid(unsafe_code)]

//! Loader pipeline: consume a [`MatrixSource`], assign ids, segment row
//! values, and batch-insert into every table, with skip-on-unchanged
//! sources and per-field value-type dispatch.

mod batch;
mod dataset;

use std::collections::BTreeMap;

use rusqlite::Connection;
use tracing::{info, warn};

use batch::{Batcher, Op};
use xena_core::codec::{encode, SEGMENT_SIZE};
use xena_core::{Error, Result};
use xena_model::{
    validate_category_value, validate_source_path, DatasetName, FeatureMeta, FieldData,
    FieldName, MatrixSource, RowSource, SourceFile, ValueType,
};
use xena_store::{clear_by_exp, Db};

pub const CRATE_NAME: &str = "xena-loader";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadResult {
    pub rows: i64,
    pub warnings: Vec<String>,
}

/// Hint map from field name to feature metadata, consulted when a field
/// descriptor carries none of its own.
pub type FeaturesHint = BTreeMap<String, FeatureMeta>;

/// Ingest one matrix into the store. Idempotent on the source set: when
/// `(name, mtime, hash)` of every source matches what the dataset was
/// last loaded from and `force` is off, only the metadata columns are
/// touched.
pub fn write_matrix(
    db: &Db,
    name: &str,
    sources: &[SourceFile],
    metadata: &serde_json::Value,
    matrix: MatrixSource,
    features_hint: Option<&FeaturesHint>,
    force: bool,
) -> Result<LoadResult> {
    let dataset_name = DatasetName::parse(name).map_err(|e| Error::input(e.to_string()))?;
    for source in sources {
        validate_source_path(&source.name).map_err(|e| Error::input(e.to_string()))?;
    }

    let mut conn = db.pool().get()?;
    let dataset_id = dataset::upsert_dataset(&mut conn, &dataset_name, metadata)?;

    let old_sources = dataset::read_sources(&conn, dataset_id)?;
    if !force && !old_sources.is_empty() && SourceFile::same_set(sources, &old_sources) {
        dataset::mark_loaded(&conn, dataset_id)?;
        let rows: i64 = conn.query_row(
            "SELECT COALESCE(rows, 0) FROM dataset WHERE id = ?1",
            [dataset_id],
            |r| r.get(0),
        )?;
        info!(dataset = name, "sources unchanged, metadata-only update");
        return Ok(LoadResult {
            rows,
            warnings: Vec::new(),
        });
    }

    clear_by_exp(&mut conn, dataset_id)?;
    dataset::replace_sources(&mut conn, dataset_id, sources)?;

    let mut batcher = Batcher::new();
    let mut warnings = Vec::new();
    let mut row_count: i64 = 0;
    for mut field in matrix.realize()? {
        let field_name =
            FieldName::parse(&field.name).map_err(|e| Error::input(e.to_string()))?;
        let feature = field
            .take_feature()
            .or_else(|| features_hint.and_then(|h| h.get(field_name.as_str()).cloned()));
        let loaded = load_field(
            db,
            &mut conn,
            &mut batcher,
            dataset_id,
            &field_name,
            field.data,
            feature,
        )?;
        match loaded {
            Some(rows) => row_count = row_count.max(rows),
            None => warnings.push(format!(
                "field {field_name}: unknown valueType, skipped"
            )),
        }
    }
    batcher.flush(&mut conn)?;

    dataset::finalize(&mut conn, dataset_id, row_count, &warnings)?;
    info!(dataset = name, rows = row_count, "dataset loaded");
    Ok(LoadResult {
        rows: row_count,
        warnings,
    })
}

/// Delete a dataset by name; unknown names succeed quietly.
pub fn delete_matrix(db: &Db, name: &str) -> Result<()> {
    let mut conn = db.pool().get()?;
    xena_store::delete_dataset(&mut conn, name)
}

/// Dispatch one field by value type. Returns the field's row count, or
/// `None` when the value type is unknown and the field was skipped.
fn load_field(
    db: &Db,
    conn: &mut Connection,
    batcher: &mut Batcher,
    dataset_id: i64,
    name: &FieldName,
    data: FieldData,
    feature: Option<FeatureMeta>,
) -> Result<Option<i64>> {
    if let FieldData::Unknown { value_type } = &data {
        warn!(
            field = name.as_str(),
            value_type = value_type.as_str(),
            "skipping unknown value type"
        );
        return Ok(None);
    }

    let field_id = db.field_ids().next(conn)?;
    batcher.push(
        conn,
        Op::Field {
            id: field_id,
            dataset_id,
            name: name.as_str().to_string(),
        },
    )?;

    let rows = match data {
        FieldData::Float(rows) => {
            if let Some(meta) = feature {
                push_feature(db, conn, batcher, field_id, ValueType::Float, meta)?;
            }
            load_scores(conn, batcher, field_id, rows)?
        }
        FieldData::Category(rows) => {
            load_category(db, conn, batcher, field_id, rows, feature)?
        }
        FieldData::Position(mut rows) => {
            if let Some(meta) = feature {
                push_feature(db, conn, batcher, field_id, ValueType::Position, meta)?;
            }
            let mut row: i64 = 0;
            for pos in rows.take()? {
                let bin = xena_core::bins::bin_of(pos.chrom_start, pos.chrom_end);
                batcher.push(
                    conn,
                    Op::Position {
                        field_id,
                        row,
                        bin,
                        pos,
                    },
                )?;
                row += 1;
            }
            row
        }
        FieldData::Genes(mut rows) => {
            if let Some(meta) = feature {
                push_feature(db, conn, batcher, field_id, ValueType::Genes, meta)?;
            }
            let mut row: i64 = 0;
            for genes in rows.take()? {
                for gene in genes {
                    batcher.push(conn, Op::Gene { field_id, row, gene })?;
                }
                row += 1;
            }
            row
        }
        FieldData::Unknown { .. } => unreachable!("handled above"),
    };
    Ok(Some(rows))
}

/// Segment a float stream into 1000-value chunks and queue the encoded
/// payloads with increasing `i`.
fn load_scores(
    conn: &mut Connection,
    batcher: &mut Batcher,
    field_id: i64,
    mut rows: RowSource<f32>,
) -> Result<i64> {
    let mut segment = Vec::with_capacity(SEGMENT_SIZE);
    let mut i: u32 = 0;
    let mut count: i64 = 0;
    for value in rows.take()? {
        segment.push(value);
        count += 1;
        if segment.len() == SEGMENT_SIZE {
            batcher.push(
                conn,
                Op::Score {
                    field_id,
                    i,
                    scores: encode(&segment),
                },
            )?;
            segment.clear();
            i += 1;
        }
    }
    if !segment.is_empty() {
        batcher.push(
            conn,
            Op::Score {
                field_id,
                i,
                scores: encode(&segment),
            },
        )?;
    }
    Ok(count)
}

/// Category fields: resolve the code dictionary (caller-supplied order
/// or first-seen inference), store orderings as floats, NaN for missing
/// and unknown values, then emit the dictionary.
fn load_category(
    db: &Db,
    conn: &mut Connection,
    batcher: &mut Batcher,
    field_id: i64,
    mut rows: RowSource<Option<String>>,
    feature: Option<FeatureMeta>,
) -> Result<i64> {
    let supplied_order = feature.as_ref().and_then(|f| f.order.clone());
    let mut order: Vec<String> = supplied_order.clone().unwrap_or_default();
    let mut index: BTreeMap<String, u32> = order
        .iter()
        .enumerate()
        .map(|(i, v)| (v.clone(), i as u32))
        .collect();
    let infer = supplied_order.is_none();

    let mut scores: Vec<f32> = Vec::new();
    for value in rows.take()? {
        let score = match value {
            None => f32::NAN,
            Some(value) => {
                validate_category_value(&value).map_err(|e| Error::input(e.to_string()))?;
                match index.get(&value) {
                    Some(ordering) => *ordering as f32,
                    None if infer => {
                        let ordering = order.len() as u32;
                        index.insert(value.clone(), ordering);
                        order.push(value);
                        ordering as f32
                    }
                    None => f32::NAN,
                }
            }
        };
        scores.push(score);
    }

    push_feature(
        db,
        conn,
        batcher,
        field_id,
        ValueType::Category,
        feature.unwrap_or_default(),
    )?;
    for (ordering, value) in order.into_iter().enumerate() {
        batcher.push(
            conn,
            Op::Code {
                field_id,
                ordering: ordering as u32,
                value,
            },
        )?;
    }
    load_scores(conn, batcher, field_id, RowSource::from_vec(scores))
}

fn push_feature(
    db: &Db,
    conn: &mut Connection,
    batcher: &mut Batcher,
    field_id: i64,
    value_type: ValueType,
    meta: FeatureMeta,
) -> Result<()> {
    let feature_id = db.feature_ids().next(conn)?;
    batcher.push(
        conn,
        Op::Feature {
            id: feature_id,
            field_id,
            value_type: value_type.as_str(),
            meta,
        },
    )
}
