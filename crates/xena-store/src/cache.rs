// SPDX-License-Identifier: Apache-2.0

//! Process-wide LRU over decoded score segments. Row-value lookups from
//! SQL funnel through here, so repeated `unpack` calls against the same
//! segment cost one blob read and one decode. Segment contents are
//! immutable for the life of a field (fields are deleted and reinserted,
//! never updated), which is what makes a shared cache safe.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};

use xena_core::codec::{decode, SEGMENT_SIZE};
use xena_core::{Error, Result};

/// 128 entries = 128 full segments of 1000 floats.
pub const DEFAULT_CACHE_SEGMENTS: usize = 128;

type Key = (i64, u32);

struct CacheEntry {
    /// `None` records an absent segment row, a valid outcome on sparse
    /// columns; caching it spares repeated misses.
    value: Option<Arc<Vec<f32>>>,
    last_used: u64,
}

struct Inner {
    conn: Connection,
    capacity: usize,
    tick: u64,
    entries: HashMap<Key, CacheEntry>,
}

pub struct SegmentCache {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl SegmentCache {
    /// Opens a dedicated read connection to the database file. Lookups
    /// issued from SQL functions run on this connection, not the one
    /// executing the outer statement.
    pub fn open(path: &Path, capacity: usize) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.execute_batch("PRAGMA busy_timeout=5000;")?;
        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(Inner {
                conn,
                capacity: capacity.max(1),
                tick: 0,
                entries: HashMap::with_capacity(capacity),
            }),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| Error::Io("segment cache lock poisoned".to_string()))
    }

    /// Decoded segment for (field_id, segment_index), admitting on miss.
    pub fn get(&self, field_id: i64, index: u32) -> Result<Option<Arc<Vec<f32>>>> {
        let mut inner = self.lock()?;
        inner.tick += 1;
        let tick = inner.tick;
        if let Some(entry) = inner.entries.get_mut(&(field_id, index)) {
            entry.last_used = tick;
            return Ok(entry.value.clone());
        }
        let blob: Option<Vec<u8>> = inner
            .conn
            .query_row(
                "SELECT scores FROM field_score WHERE field_id = ?1 AND i = ?2",
                params![field_id, index],
                |r| r.get(0),
            )
            .optional()?;
        let value = match blob {
            Some(bytes) => Some(Arc::new(decode(&bytes)?)),
            None => None,
        };
        if inner.entries.len() >= inner.capacity {
            if let Some(victim) = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| *k)
            {
                inner.entries.remove(&victim);
            }
        }
        inner.entries.insert(
            (field_id, index),
            CacheEntry {
                value: value.clone(),
                last_used: tick,
            },
        );
        Ok(value)
    }

    /// Score at a storage row: segment row / S, offset row % S. Missing
    /// segment or out-of-range offset is `None`, never an error.
    pub fn lookup_row(&self, field_id: i64, row: i64) -> Result<Option<f32>> {
        if row < 0 {
            return Ok(None);
        }
        let index = (row as usize / SEGMENT_SIZE) as u32;
        let offset = row as usize % SEGMENT_SIZE;
        Ok(self
            .get(field_id, index)?
            .and_then(|seg| seg.get(offset).copied()))
    }

    /// Categorical string at a storage row: the score is the ordering
    /// into the field's code dictionary. NaN and unmapped orderings
    /// resolve to `None`.
    pub fn lookup_value(&self, field_id: i64, row: i64) -> Result<Option<String>> {
        let Some(score) = self.lookup_row(field_id, row)? else {
            return Ok(None);
        };
        if score.is_nan() {
            return Ok(None);
        }
        let ordering = score as i64;
        let inner = self.lock()?;
        let value: Option<String> = inner
            .conn
            .query_row(
                "SELECT value FROM code WHERE field_id = ?1 AND ordering = ?2",
                params![field_id, ordering],
                |r| r.get(0),
            )
            .optional()?;
        Ok(value)
    }

    #[cfg(test)]
    fn cached_keys(&self) -> Vec<Key> {
        let inner = self.inner.lock().expect("lock");
        inner.entries.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;
    use xena_core::codec::encode;

    fn seeded_db(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("cache_test.db");
        let conn = Connection::open(&path).expect("open");
        schema::apply(&conn).expect("schema");
        conn.execute_batch(
            "
            INSERT INTO dataset (id, name) VALUES (1, 'd');
            INSERT INTO field (id, dataset_id, name) VALUES (7, 1, 'probe1');
            INSERT INTO field (id, dataset_id, name) VALUES (8, 1, 'tissue');
            INSERT INTO code (field_id, ordering, value) VALUES (8, 0, 'tumor');
            INSERT INTO code (field_id, ordering, value) VALUES (8, 1, 'normal');
            ",
        )
        .expect("seed");
        let seg0: Vec<f32> = (0..SEGMENT_SIZE).map(|i| i as f32).collect();
        let seg1 = vec![1.0_f32, f32::NAN, 0.0];
        conn.execute(
            "INSERT INTO field_score (field_id, i, scores) VALUES (7, 0, ?1)",
            params![encode(&seg0)],
        )
        .expect("seg0");
        conn.execute(
            "INSERT INTO field_score (field_id, i, scores) VALUES (7, 1, ?1)",
            params![encode(&[2.5_f32])],
        )
        .expect("seg1 of probe1");
        conn.execute(
            "INSERT INTO field_score (field_id, i, scores) VALUES (8, 0, ?1)",
            params![encode(&seg1)],
        )
        .expect("tissue scores");
        path
    }

    #[test]
    fn lookup_row_addresses_across_segments() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = SegmentCache::open(&seeded_db(&dir), 4).expect("cache");
        assert_eq!(cache.lookup_row(7, 3).expect("row 3"), Some(3.0));
        assert_eq!(
            cache.lookup_row(7, SEGMENT_SIZE as i64).expect("row 1000"),
            Some(2.5)
        );
        assert_eq!(cache.lookup_row(7, 5000).expect("absent"), None);
        assert_eq!(cache.lookup_row(99, 0).expect("no field"), None);
    }

    #[test]
    fn lookup_value_resolves_codes_and_nan() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = SegmentCache::open(&seeded_db(&dir), 4).expect("cache");
        assert_eq!(
            cache.lookup_value(8, 0).expect("row 0"),
            Some("normal".to_string())
        );
        assert_eq!(cache.lookup_value(8, 1).expect("nan row"), None);
        assert_eq!(
            cache.lookup_value(8, 2).expect("row 2"),
            Some("tumor".to_string())
        );
    }

    #[test]
    fn eviction_is_least_recently_used() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = seeded_db(&dir);
        let cache = SegmentCache::open(&path, 2).expect("cache");
        cache.get(7, 0).expect("seg 0");
        cache.get(7, 1).expect("seg 1");
        cache.get(7, 0).expect("touch seg 0");
        cache.get(8, 0).expect("seg for other field");
        let keys = cache.cached_keys();
        assert!(keys.contains(&(7, 0)), "recently used entry survives");
        assert!(!keys.contains(&(7, 1)), "stale entry evicted");
    }

    #[test]
    fn concurrent_readers_share_one_cache() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache =
            std::sync::Arc::new(SegmentCache::open(&seeded_db(&dir), 4).expect("cache"));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = std::sync::Arc::clone(&cache);
                std::thread::spawn(move || {
                    for row in 0..200_i64 {
                        let value = cache.lookup_row(7, row).expect("lookup");
                        assert_eq!(value, Some(row as f32));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("join");
        }
    }

    #[test]
    fn absent_segments_are_negatively_cached() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = SegmentCache::open(&seeded_db(&dir), 4).expect("cache");
        assert!(cache.get(7, 9).expect("miss").is_none());
        assert!(cache.cached_keys().contains(&(7, 9)));
    }
}
