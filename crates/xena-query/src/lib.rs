#![forbid(unsafe_code)]

//! Read-side of the engine: a structured query surface compiling to
//! parameterized read-only SQL, and the genomic fetch pipeline that
//! turns (dataset, columns, samples) requests into dense score vectors.

mod ast;
mod exec;
mod fetch;

pub use crate::ast::{
    BinaryOp, Direction, Expr, Join, Query, SelectItem, TableRef, Value,
};
pub use crate::exec::{run_query, run_query_on, Row};
pub use crate::fetch::{fetch, fetch_on, FetchRequest, FetchResponse};

pub const CRATE_NAME: &str = "xena-query";
