// SPDX-License-Identifier: Apache-2.0

//! Dataset-row bookkeeping around a load: upsert with metadata merge,
//! source-set reads and replacement, final status flip.

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};

use xena_core::{Error, Result};
use xena_model::{validate_metadata_text, DatasetMeta, DatasetName, DatasetStatus, SourceFile};

/// Merge new metadata into what the dataset row already carries: present
/// keys overwrite, absent keys survive.
fn merge_metadata(existing: Option<&str>, incoming: &Value) -> Value {
    let mut merged: Map<String, Value> = existing
        .and_then(|text| serde_json::from_str(text).ok())
        .unwrap_or_default();
    if let Value::Object(incoming) = incoming {
        for (k, v) in incoming {
            merged.insert(k.clone(), v.clone());
        }
    }
    Value::Object(merged)
}

/// Insert or update the dataset row, leaving it in `loading` state.
/// Returns the dataset id.
pub fn upsert_dataset(
    conn: &mut Connection,
    name: &DatasetName,
    metadata: &Value,
) -> Result<i64> {
    let tx = conn.transaction()?;
    let existing: Option<(i64, Option<String>)> = tx
        .query_row(
            "SELECT id, text FROM dataset WHERE name = ?1",
            params![name.as_str()],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;
    let merged = merge_metadata(
        existing.as_ref().and_then(|(_, text)| text.as_deref()),
        metadata,
    );
    let text = serde_json::to_string(&merged)?;
    validate_metadata_text(&text).map_err(|e| Error::input(e.to_string()))?;
    let meta = DatasetMeta::from_value(&merged);
    let dataset_id = match existing {
        Some((id, _)) => {
            tx.execute(
                "UPDATE dataset SET probeMap=?1, shortTitle=?2, longTitle=?3, groupTitle=?4,
                 platform=?5, cohort=?6, security=?7, dataSubType=?8, type=?9, text=?10,
                 status=?11 WHERE id=?12",
                params![
                    meta.probemap,
                    meta.short_title,
                    meta.long_title,
                    meta.group_title,
                    meta.platform,
                    meta.cohort,
                    meta.security,
                    meta.data_sub_type,
                    meta.kind,
                    text,
                    DatasetStatus::Loading.as_str(),
                    id,
                ],
            )?;
            id
        }
        None => {
            tx.execute(
                "INSERT INTO dataset (name, probeMap, shortTitle, longTitle, groupTitle,
                 platform, cohort, security, dataSubType, type, text, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    name.as_str(),
                    meta.probemap,
                    meta.short_title,
                    meta.long_title,
                    meta.group_title,
                    meta.platform,
                    meta.cohort,
                    meta.security,
                    meta.data_sub_type,
                    meta.kind,
                    text,
                    DatasetStatus::Loading.as_str(),
                ],
            )?;
            tx.last_insert_rowid()
        }
    };
    tx.commit()?;
    Ok(dataset_id)
}

pub fn read_sources(conn: &Connection, dataset_id: i64) -> Result<Vec<SourceFile>> {
    let mut stmt = conn.prepare_cached(
        "SELECT s.name, s.time, s.hash FROM source s
         JOIN dataset_source ds ON ds.source_id = s.id
         WHERE ds.dataset_id = ?1",
    )?;
    let rows = stmt.query_map(params![dataset_id], |r| {
        Ok(SourceFile {
            name: r.get(0)?,
            time: r.get(1)?,
            hash: r.get(2)?,
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Swap the dataset's source links for the new set, inserting source
/// rows that are not on file yet. Identical (name, time, hash) rows are
/// shared between datasets.
pub fn replace_sources(
    conn: &mut Connection,
    dataset_id: i64,
    sources: &[SourceFile],
) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute(
        "DELETE FROM dataset_source WHERE dataset_id = ?1",
        params![dataset_id],
    )?;
    for source in sources {
        let source_id: Option<i64> = tx
            .query_row(
                "SELECT id FROM source WHERE name = ?1 AND time = ?2 AND hash = ?3",
                params![source.name, source.time, source.hash],
                |r| r.get(0),
            )
            .optional()?;
        let source_id = match source_id {
            Some(id) => id,
            None => {
                tx.execute(
                    "INSERT INTO source (name, time, hash) VALUES (?1, ?2, ?3)",
                    params![source.name, source.time, source.hash],
                )?;
                tx.last_insert_rowid()
            }
        };
        tx.execute(
            "INSERT INTO dataset_source (dataset_id, source_id) VALUES (?1, ?2)",
            params![dataset_id, source_id],
        )?;
    }
    tx.commit()?;
    Ok(())
}

/// Record the final row count, fold loader warnings into the metadata
/// text under the `loader` key, and flip status to loaded.
pub fn finalize(
    conn: &mut Connection,
    dataset_id: i64,
    row_count: i64,
    warnings: &[String],
) -> Result<()> {
    let tx = conn.transaction()?;
    if !warnings.is_empty() {
        let text: Option<String> = tx
            .query_row(
                "SELECT text FROM dataset WHERE id = ?1",
                params![dataset_id],
                |r| r.get(0),
            )
            .optional()?
            .flatten();
        let merged = merge_metadata(
            text.as_deref(),
            &serde_json::json!({ "loader": { "warnings": warnings } }),
        );
        tx.execute(
            "UPDATE dataset SET text = ?1 WHERE id = ?2",
            params![serde_json::to_string(&merged)?, dataset_id],
        )?;
    }
    tx.execute(
        "UPDATE dataset SET rows = ?1, status = ?2 WHERE id = ?3",
        params![row_count, DatasetStatus::Loaded.as_str(), dataset_id],
    )?;
    tx.commit()?;
    Ok(())
}

/// Flip status without touching anything else; used on the
/// unchanged-sources fast path where the load is metadata-only.
pub fn mark_loaded(conn: &Connection, dataset_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE dataset SET status = ?1 WHERE id = ?2",
        params![DatasetStatus::Loaded.as_str(), dataset_id],
    )?;
    Ok(())
}
