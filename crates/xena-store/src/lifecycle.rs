// SPDX-License-Identifier: Apache-2.0

//! Dataset create/delete plumbing. Cascades handle small datasets, but a
//! dataset can own millions of dependent rows, so deletion walks each
//! dependent table in bounded chunks, one short transaction per chunk,
//! before touching the `field` and `dataset` rows.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use xena_core::Result;

const DELETE_CHUNK: usize = 1000;

/// Dependent tables cleared per field, leaves first.
const FIELD_TABLES: [&str; 5] = [
    "code",
    "feature",
    "field_gene",
    "field_position",
    "field_score",
];

fn delete_field_rows_chunked(conn: &mut Connection, table: &str, field_id: i64) -> Result<()> {
    let sql = format!(
        "DELETE FROM {table} WHERE rowid IN
         (SELECT rowid FROM {table} WHERE field_id = ?1 LIMIT {DELETE_CHUNK})"
    );
    loop {
        let tx = conn.transaction()?;
        let affected = tx.execute(&sql, params![field_id])?;
        tx.commit()?;
        if affected == 0 {
            return Ok(());
        }
    }
}

/// Remove every field of a dataset and all rows hanging off each field.
/// Leaves the dataset row in place; callers decide whether this is a
/// reload (keep it) or a delete (drop it next).
pub fn clear_by_exp(conn: &mut Connection, dataset_id: i64) -> Result<()> {
    let field_ids: Vec<i64> = {
        let mut stmt = conn.prepare("SELECT id FROM field WHERE dataset_id = ?1")?;
        let rows = stmt.query_map(params![dataset_id], |r| r.get(0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()?
    };
    for field_id in field_ids {
        for table in FIELD_TABLES {
            delete_field_rows_chunked(conn, table, field_id)?;
        }
    }
    loop {
        let tx = conn.transaction()?;
        let affected = tx.execute(
            &format!(
                "DELETE FROM field WHERE rowid IN
                 (SELECT rowid FROM field WHERE dataset_id = ?1 LIMIT {DELETE_CHUNK})"
            ),
            params![dataset_id],
        )?;
        tx.commit()?;
        if affected == 0 {
            return Ok(());
        }
    }
}

/// Delete a dataset by name. An unknown name is logged and reported as
/// success; `dataset_source` rows go with the dataset row via cascade.
pub fn delete_dataset(conn: &mut Connection, name: &str) -> Result<()> {
    let dataset_id: Option<i64> = conn
        .query_row(
            "SELECT id FROM dataset WHERE name = ?1",
            params![name],
            |r| r.get(0),
        )
        .optional()?;
    let Some(dataset_id) = dataset_id else {
        info!(dataset = name, "delete requested for unknown dataset");
        return Ok(());
    };
    clear_by_exp(conn, dataset_id)?;
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM dataset WHERE id = ?1", params![dataset_id])?;
    tx.commit()?;
    info!(dataset = name, "dataset deleted");
    Ok(())
}

/// Drop source rows no dataset references any more.
pub fn clean_sources(conn: &Connection) -> Result<usize> {
    let affected = conn.execute(
        "DELETE FROM source WHERE id NOT IN (SELECT source_id FROM dataset_source)",
        [],
    )?;
    Ok(affected)
}
