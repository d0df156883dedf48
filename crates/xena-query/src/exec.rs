// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection};

use crate::ast::{compile, Query, Value};
use xena_core::{Error, Result};
use xena_store::Db;

/// One result row: column name (case as produced by the query) to cell.
pub type Row = BTreeMap<String, Value>;

fn cell(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Int(v),
        ValueRef::Real(v) => Value::Float(v),
        ValueRef::Text(v) => Value::Text(String::from_utf8_lossy(v).into_owned()),
        ValueRef::Blob(v) => Value::Bytes(v.to_vec()),
    }
}

/// Compile and run a structured query on an explicit connection.
pub fn run_query_on(conn: &Connection, query: &Query) -> Result<Vec<Row>> {
    let (sql, params) = compile(query)?;
    let mut stmt = conn.prepare_cached(&sql)?;
    if !stmt.readonly() {
        return Err(Error::schema("query compiled to a non-read-only statement"));
    }
    let names: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    let mapped = stmt.query_map(params_from_iter(params.iter()), |row| {
        let mut out = Row::new();
        for (idx, name) in names.iter().enumerate() {
            out.insert(name.clone(), cell(row.get_ref(idx)?));
        }
        Ok(out)
    })?;
    Ok(mapped.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Pool-connection convenience wrapper around [`run_query_on`].
pub fn run_query(db: &Db, query: &Query) -> Result<Vec<Row>> {
    let conn = db.pool().get()?;
    run_query_on(&conn, query)
}
