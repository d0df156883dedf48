use std::sync::Mutex;

use rusqlite::{params, Connection};

use xena_core::{Error, Result};

/// Ids reserved per sequence-table round-trip. Matches the cache size of
/// the FIELD_IDS / FEATURE_IDS sequences so allocation never dominates a
/// wide load.
pub const ID_BLOCK: i64 = 2000;

#[derive(Debug, Default)]
struct Block {
    next: i64,
    end: i64,
}

/// Block-reserving id allocator over a named `sequence` row.
#[derive(Debug)]
pub struct IdAllocator {
    name: &'static str,
    block: Mutex<Block>,
}

impl IdAllocator {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            block: Mutex::new(Block { next: 0, end: 0 }),
        }
    }

    #[must_use]
    pub const fn field_ids() -> Self {
        Self::new("FIELD_IDS")
    }

    #[must_use]
    pub const fn feature_ids() -> Self {
        Self::new("FEATURE_IDS")
    }

    pub fn next(&self, conn: &Connection) -> Result<i64> {
        let mut block = self
            .block
            .lock()
            .map_err(|_| Error::Io("id allocator lock poisoned".to_string()))?;
        if block.next >= block.end {
            let end: i64 = conn.query_row(
                "UPDATE sequence SET next_value = next_value + ?1 WHERE name = ?2
                 RETURNING next_value",
                params![ID_BLOCK, self.name],
                |r| r.get(0),
            )?;
            block.next = end - ID_BLOCK;
            block.end = end;
        }
        let id = block.next;
        block.next += 1;
        Ok(id)
    }
}
