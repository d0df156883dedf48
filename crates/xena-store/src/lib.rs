#![forbid(unsafe_code)]

mod cache;
mod db;
mod functions;
mod ids;
mod lifecycle;
mod schema;

pub use crate::cache::{SegmentCache, DEFAULT_CACHE_SEGMENTS};
pub use crate::db::{Db, DbOptions, Pool, PooledConn};
pub use crate::ids::{IdAllocator, ID_BLOCK};
pub use crate::lifecycle::{clean_sources, clear_by_exp, delete_dataset};
pub use crate::schema::SCHEMA_VERSION;

pub const CRATE_NAME: &str = "xena-store";
