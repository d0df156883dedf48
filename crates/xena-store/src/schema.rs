// SPDX-License-Identifier: Apache-2.0

use rusqlite::Connection;

use xena_core::Result;

pub const SCHEMA_VERSION: i64 = 1;

/// Pragmas applied once at open time, before the DDL batch.
const OPEN_PRAGMAS: &str = "
    PRAGMA journal_mode=WAL;
    PRAGMA synchronous=NORMAL;
    PRAGMA temp_store=MEMORY;
    PRAGMA cache_size=-32000;
";

/// The full on-disk schema. Every dependent table cascades from `field`,
/// and `field` cascades from `dataset`, so dropping a dataset row is
/// sufficient for small datasets; the lifecycle module still chunks
/// deletes for large ones.
const DDL: &str = "
    CREATE TABLE IF NOT EXISTS dataset (
      id INTEGER PRIMARY KEY,
      name TEXT NOT NULL UNIQUE,
      probeMap TEXT,
      shortTitle TEXT,
      longTitle TEXT,
      groupTitle TEXT,
      platform TEXT,
      cohort TEXT,
      security TEXT,
      dataSubType TEXT,
      type TEXT,
      text TEXT,
      rows INTEGER,
      status TEXT NOT NULL DEFAULT 'loading'
    );
    CREATE TABLE IF NOT EXISTS source (
      id INTEGER PRIMARY KEY,
      name TEXT NOT NULL,
      time INTEGER NOT NULL,
      hash TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS dataset_source (
      dataset_id INTEGER NOT NULL REFERENCES dataset(id) ON DELETE CASCADE,
      source_id INTEGER NOT NULL REFERENCES source(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_dataset_source_dataset ON dataset_source(dataset_id);
    CREATE TABLE IF NOT EXISTS field (
      id INTEGER PRIMARY KEY,
      dataset_id INTEGER NOT NULL REFERENCES dataset(id) ON DELETE CASCADE,
      name TEXT NOT NULL,
      UNIQUE (dataset_id, name)
    );
    CREATE TABLE IF NOT EXISTS field_score (
      field_id INTEGER NOT NULL REFERENCES field(id) ON DELETE CASCADE,
      i INTEGER NOT NULL,
      scores BLOB NOT NULL
    );
    CREATE UNIQUE INDEX IF NOT EXISTS idx_field_score_field_i ON field_score(field_id, i);
    CREATE TABLE IF NOT EXISTS feature (
      id INTEGER PRIMARY KEY,
      field_id INTEGER NOT NULL REFERENCES field(id) ON DELETE CASCADE,
      shortTitle TEXT,
      longTitle TEXT,
      priority REAL,
      valueType TEXT NOT NULL,
      visibility TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_feature_field ON feature(field_id);
    CREATE TABLE IF NOT EXISTS code (
      id INTEGER PRIMARY KEY,
      field_id INTEGER NOT NULL REFERENCES field(id) ON DELETE CASCADE,
      ordering INTEGER NOT NULL,
      value TEXT NOT NULL,
      UNIQUE (field_id, ordering)
    );
    CREATE TABLE IF NOT EXISTS field_position (
      field_id INTEGER NOT NULL REFERENCES field(id) ON DELETE CASCADE,
      row INTEGER NOT NULL,
      bin INTEGER NOT NULL,
      chrom TEXT NOT NULL,
      chromStart INTEGER NOT NULL,
      chromEnd INTEGER NOT NULL,
      strand TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_field_position_chrom_bin ON field_position(field_id, chrom, bin);
    CREATE INDEX IF NOT EXISTS idx_field_position_row ON field_position(field_id, row);
    CREATE TABLE IF NOT EXISTS field_gene (
      field_id INTEGER NOT NULL REFERENCES field(id) ON DELETE CASCADE,
      row INTEGER NOT NULL,
      gene TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_field_gene_gene ON field_gene(field_id, gene);
    CREATE INDEX IF NOT EXISTS idx_field_gene_row ON field_gene(field_id, row);
    CREATE TABLE IF NOT EXISTS sequence (
      name TEXT PRIMARY KEY,
      next_value INTEGER NOT NULL
    );
    INSERT OR IGNORE INTO sequence (name, next_value) VALUES ('FIELD_IDS', 1);
    INSERT OR IGNORE INTO sequence (name, next_value) VALUES ('FEATURE_IDS', 1);
";

pub fn apply(conn: &Connection) -> Result<()> {
    conn.execute_batch(OPEN_PRAGMAS)?;
    conn.execute_batch(DDL)?;
    conn.execute_batch(&format!("PRAGMA user_version={SCHEMA_VERSION};"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_is_idempotent() {
        let conn = Connection::open_in_memory().expect("open");
        apply(&conn).expect("first");
        apply(&conn).expect("second");
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM sequence", [], |r| r.get(0))
            .expect("count");
        assert_eq!(n, 2);
    }

    #[test]
    fn cascade_reaches_every_dependent_table() {
        let conn = Connection::open_in_memory().expect("open");
        apply(&conn).expect("schema");
        conn.execute_batch(
            "
            PRAGMA foreign_keys=ON;
            INSERT INTO dataset (id, name) VALUES (1, 'd');
            INSERT INTO field (id, dataset_id, name) VALUES (10, 1, 'probe1');
            INSERT INTO field_score (field_id, i, scores) VALUES (10, 0, x'00000000');
            INSERT INTO feature (id, field_id, valueType) VALUES (5, 10, 'category');
            INSERT INTO code (field_id, ordering, value) VALUES (10, 0, 'a');
            INSERT INTO field_position (field_id, row, bin, chrom, chromStart, chromEnd)
              VALUES (10, 0, 585, 'chr1', 0, 10);
            INSERT INTO field_gene (field_id, row, gene) VALUES (10, 0, 'TP53');
            DELETE FROM dataset WHERE id=1;
            ",
        )
        .expect("cascade");
        for table in ["field", "field_score", "feature", "code", "field_position", "field_gene"] {
            let n: i64 = conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
                .expect("count");
            assert_eq!(n, 0, "{table} should be empty after cascade");
        }
    }
}
