// SPDX-License-Identifier: Apache-2.0

//! Genomic fetch: resolve a caller's sample list through the dataset's
//! sampleID code dictionary, locate the storage rows carrying those
//! samples, then pull exactly the segments that cover them in one query
//! and scatter the decoded floats into request-ordered output buffers.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use xena_core::codec::{decode, SEGMENT_SIZE};
use xena_core::{Error, Result};
use xena_model::SAMPLE_FIELD;
use xena_store::Db;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub dataset: String,
    pub columns: Vec<String>,
    pub samples: Vec<String>,
}

/// The request echoed back with a `data` map: column name to one dense
/// float vector, request-ordered, NaN where a sample has no value.
/// Requested columns missing from the dataset are omitted from `data`.
#[derive(Debug, Clone, Serialize)]
pub struct FetchResponse {
    #[serde(flatten)]
    pub request: FetchRequest,
    pub data: BTreeMap<String, Vec<f32>>,
}

fn dataset_id_by_name(conn: &Connection, name: &str) -> Result<i64> {
    conn.query_row(
        "SELECT id FROM dataset WHERE name = ?1",
        params![name],
        |r| r.get(0),
    )
    .optional()?
    .ok_or_else(|| Error::schema(format!("no dataset named `{name}`")))
}

/// Full decoded score vector of one field, segments concatenated in
/// order.
fn read_field_scores(conn: &Connection, field_id: i64) -> Result<Vec<f32>> {
    let mut stmt = conn.prepare_cached(
        "SELECT scores FROM field_score WHERE field_id = ?1 ORDER BY i",
    )?;
    let blobs = stmt.query_map(params![field_id], |r| r.get::<_, Vec<u8>>(0))?;
    let mut out = Vec::new();
    for blob in blobs {
        out.extend(decode(&blob?)?);
    }
    Ok(out)
}

fn sample_orderings(conn: &Connection, dataset_id: i64) -> Result<(i64, HashMap<String, u32>)> {
    let field_id: Option<i64> = conn
        .query_row(
            "SELECT id FROM field WHERE dataset_id = ?1 AND name = ?2",
            params![dataset_id, SAMPLE_FIELD],
            |r| r.get(0),
        )
        .optional()?;
    let field_id = field_id
        .ok_or_else(|| Error::schema(format!("dataset has no {SAMPLE_FIELD} field")))?;
    let mut stmt =
        conn.prepare_cached("SELECT ordering, value FROM code WHERE field_id = ?1")?;
    let rows = stmt.query_map(params![field_id], |r| {
        Ok((r.get::<_, String>(1)?, r.get::<_, i64>(0)? as u32))
    })?;
    let mut codes = HashMap::new();
    for row in rows {
        let (value, ordering) = row?;
        codes.insert(value, ordering);
    }
    Ok((field_id, codes))
}

/// Requested column names that exist in the dataset.
fn existing_columns(
    conn: &Connection,
    dataset_id: i64,
    columns: &[String],
) -> Result<Vec<String>> {
    let names: Vec<SqlValue> = columns
        .iter()
        .map(|c| SqlValue::Text(c.clone()))
        .collect();
    let mut stmt = conn.prepare_cached(
        "SELECT name FROM field WHERE dataset_id = ?1 AND name IN (SELECT value FROM rarray(?2))",
    )?;
    let rows = stmt.query_map(params![dataset_id, Rc::new(names)], |r| r.get(0))?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

pub fn fetch_on(conn: &Connection, request: FetchRequest) -> Result<FetchResponse> {
    let dataset_id = dataset_id_by_name(conn, &request.dataset)?;
    let (sample_field_id, codes) = sample_orderings(conn, dataset_id)?;

    // Output positions per requested ordering; duplicates in the sample
    // list each get their own slot.
    let mut positions_by_ordering: HashMap<u32, Vec<usize>> = HashMap::new();
    for (slot, sample) in request.samples.iter().enumerate() {
        if let Some(ordering) = codes.get(sample) {
            positions_by_ordering
                .entry(*ordering)
                .or_default()
                .push(slot);
        }
    }

    // Scan the sampleID column for rows whose value is requested, then
    // group the hits by target segment: segment index -> (offset within
    // segment, output slot).
    let mut shuffle: BTreeMap<u32, Vec<(usize, usize)>> = BTreeMap::new();
    let sample_column = read_field_scores(conn, sample_field_id)?;
    for (row, value) in sample_column.iter().enumerate() {
        if value.is_nan() || *value < 0.0 {
            continue;
        }
        if let Some(slots) = positions_by_ordering.get(&(*value as u32)) {
            let segment = (row / SEGMENT_SIZE) as u32;
            let offset = row % SEGMENT_SIZE;
            let entry = shuffle.entry(segment).or_default();
            for slot in slots {
                entry.push((offset, *slot));
            }
        }
    }

    let mut data: BTreeMap<String, Vec<f32>> = existing_columns(conn, dataset_id, &request.columns)?
        .into_iter()
        .map(|name| (name, vec![f32::NAN; request.samples.len()]))
        .collect();

    if !data.is_empty() && !shuffle.is_empty() {
        let names: Vec<SqlValue> = data.keys().cloned().map(SqlValue::Text).collect();
        let segments: Vec<SqlValue> = shuffle
            .keys()
            .map(|i| SqlValue::Integer(i64::from(*i)))
            .collect();
        let mut stmt = conn.prepare_cached(
            "SELECT f.name, s.i, s.scores FROM field f
             JOIN field_score s ON s.field_id = f.id
             WHERE f.dataset_id = ?1
               AND f.name IN (SELECT value FROM rarray(?2))
               AND s.i IN (SELECT value FROM rarray(?3))",
        )?;
        let rows = stmt.query_map(
            params![dataset_id, Rc::new(names), Rc::new(segments)],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, i64>(1)? as u32,
                    r.get::<_, Vec<u8>>(2)?,
                ))
            },
        )?;
        for row in rows {
            let (name, segment, blob) = row?;
            let decoded = decode(&blob)?;
            let Some(buffer) = data.get_mut(&name) else {
                continue;
            };
            if let Some(pairs) = shuffle.get(&segment) {
                for (offset, slot) in pairs {
                    if let Some(value) = decoded.get(*offset) {
                        buffer[*slot] = *value;
                    }
                }
            }
        }
    }

    Ok(FetchResponse { request, data })
}

/// Execute a batch of fetch requests on one pool connection, populating
/// each request's `data`.
pub fn fetch(db: &Db, requests: Vec<FetchRequest>) -> Result<Vec<FetchResponse>> {
    let conn = db.pool().get()?;
    requests
        .into_iter()
        .map(|request| fetch_on(&conn, request))
        .collect()
}
