//! SQL scalar functions over the segment cache. Registered per pool
//! connection so relational queries can project scores and categorical
//! strings straight out of encoded columns:
//! `unpack(field_id, row)` and `unpackValue(field_id, row)`. Both return
//! NULL for rows or codes that do not exist.

use std::sync::Arc;

use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;

use crate::cache::SegmentCache;
use xena_core::Result;

pub fn register(conn: &Connection, cache: &Arc<SegmentCache>) -> Result<()> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;

    let rows = Arc::clone(cache);
    conn.create_scalar_function("unpack", 2, flags, move |ctx| {
        let field_id: i64 = ctx.get(0)?;
        let row: i64 = ctx.get(1)?;
        let score = rows
            .lookup_row(field_id, row)
            .map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))?;
        Ok(score.map(f64::from))
    })?;

    let values = Arc::clone(cache);
    conn.create_scalar_function("unpackValue", 2, flags, move |ctx| {
        let field_id: i64 = ctx.get(0)?;
        let row: i64 = ctx.get(1)?;
        values
            .lookup_value(field_id, row)
            .map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))
    })?;

    Ok(())
}
