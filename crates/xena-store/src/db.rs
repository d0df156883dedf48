// SPDX-License-Identifier: Apache-2.0

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::cache::{SegmentCache, DEFAULT_CACHE_SEGMENTS};
use crate::functions;
use crate::ids::IdAllocator;
use crate::schema;
use xena_core::{Error, Result};

#[derive(Debug, Clone)]
pub struct DbOptions {
    /// Segment cache capacity in entries.
    pub cache_segments: usize,
    /// Connections kept idle in the pool; extra connections are opened
    /// on demand and dropped on return.
    pub pool_idle: usize,
}

impl Default for DbOptions {
    fn default() -> Self {
        Self {
            cache_segments: DEFAULT_CACHE_SEGMENTS,
            pool_idle: 8,
        }
    }
}

/// Open database: a pool of configured connections plus the shared
/// segment cache and the two id allocators. The loader checks out one
/// connection for a whole load; readers check out per request.
pub struct Db {
    pool: Pool,
    field_ids: IdAllocator,
    feature_ids: IdAllocator,
}

impl Db {
    pub fn open(path: impl AsRef<Path>, options: DbOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let first = Connection::open(&path)?;
        schema::apply(&first)?;
        let cache = Arc::new(SegmentCache::open(&path, options.cache_segments)?);
        Pool::configure(&first, &cache)?;
        let pool = Pool {
            path,
            cache,
            idle_limit: options.pool_idle,
            idle: Mutex::new(vec![first]),
        };
        Ok(Self {
            pool,
            field_ids: IdAllocator::field_ids(),
            feature_ids: IdAllocator::feature_ids(),
        })
    }

    #[must_use]
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<SegmentCache> {
        &self.pool.cache
    }

    #[must_use]
    pub fn field_ids(&self) -> &IdAllocator {
        &self.field_ids
    }

    #[must_use]
    pub fn feature_ids(&self) -> &IdAllocator {
        &self.feature_ids
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.pool.path
    }

    /// Drops the pool and cache connections.
    pub fn close(self) {}
}

pub struct Pool {
    path: PathBuf,
    cache: Arc<SegmentCache>,
    idle_limit: usize,
    idle: Mutex<Vec<Connection>>,
}

impl Pool {
    /// Per-connection setup: cascades on, the array virtual table for
    /// inline value lists, and the unpack scalar functions.
    fn configure(conn: &Connection, cache: &Arc<SegmentCache>) -> Result<()> {
        conn.execute_batch("PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;")?;
        rusqlite::vtab::array::load_module(conn)?;
        functions::register(conn, cache)?;
        Ok(())
    }

    pub fn get(&self) -> Result<PooledConn<'_>> {
        let recycled = self
            .idle
            .lock()
            .map_err(|_| Error::Io("pool lock poisoned".to_string()))?
            .pop();
        let conn = match recycled {
            Some(conn) => conn,
            None => {
                let conn = Connection::open(&self.path)?;
                Self::configure(&conn, &self.cache)?;
                conn
            }
        };
        Ok(PooledConn {
            pool: self,
            conn: Some(conn),
        })
    }
}

pub struct PooledConn<'a> {
    pool: &'a Pool,
    conn: Option<Connection>,
}

impl Deref for PooledConn<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("live pooled connection")
    }
}

impl DerefMut for PooledConn<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("live pooled connection")
    }
}

impl Drop for PooledConn<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Ok(mut idle) = self.pool.idle.lock() {
                if idle.len() < self.pool.idle_limit {
                    idle.push(conn);
                }
            }
        }
    }
}
