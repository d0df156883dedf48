// SPDX-License-Identifier: Apache-2.0

//! Insert batching. The loader queues row operations and commits them in
//! groups of 1000, each group one short transaction, so a wide load
//! never holds a long write lock. Queue order is insert order, which
//! keeps every field row ahead of the rows that reference it.

use rusqlite::{params, Connection};

use xena_core::Result;
use xena_model::{FeatureMeta, PositionRow};

pub const BATCH_SIZE: usize = 1000;

pub enum Op {
    Field {
        id: i64,
        dataset_id: i64,
        name: String,
    },
    Score {
        field_id: i64,
        i: u32,
        scores: Vec<u8>,
    },
    Feature {
        id: i64,
        field_id: i64,
        value_type: &'static str,
        meta: FeatureMeta,
    },
    Code {
        field_id: i64,
        ordering: u32,
        value: String,
    },
    Position {
        field_id: i64,
        row: i64,
        bin: u32,
        pos: PositionRow,
    },
    Gene {
        field_id: i64,
        row: i64,
        gene: String,
    },
}

pub struct Batcher {
    ops: Vec<Op>,
}

impl Batcher {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ops: Vec::with_capacity(BATCH_SIZE),
        }
    }

    pub fn push(&mut self, conn: &mut Connection, op: Op) -> Result<()> {
        self.ops.push(op);
        if self.ops.len() >= BATCH_SIZE {
            self.flush(conn)?;
        }
        Ok(())
    }

    pub fn flush(&mut self, conn: &mut Connection) -> Result<()> {
        if self.ops.is_empty() {
            return Ok(());
        }
        let tx = conn.transaction()?;
        {
            let mut insert_field = tx.prepare_cached(
                "INSERT INTO field (id, dataset_id, name) VALUES (?1, ?2, ?3)",
            )?;
            let mut insert_score = tx.prepare_cached(
                "INSERT INTO field_score (field_id, i, scores) VALUES (?1, ?2, ?3)",
            )?;
            let mut insert_feature = tx.prepare_cached(
                "INSERT INTO feature (id, field_id, shortTitle, longTitle, priority, valueType, visibility)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            let mut insert_code = tx.prepare_cached(
                "INSERT INTO code (field_id, ordering, value) VALUES (?1, ?2, ?3)",
            )?;
            let mut insert_position = tx.prepare_cached(
                "INSERT INTO field_position (field_id, row, bin, chrom, chromStart, chromEnd, strand)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            let mut insert_gene = tx.prepare_cached(
                "INSERT INTO field_gene (field_id, row, gene) VALUES (?1, ?2, ?3)",
            )?;
            for op in self.ops.drain(..) {
                match op {
                    Op::Field { id, dataset_id, name } => {
                        insert_field.execute(params![id, dataset_id, name])?;
                    }
                    Op::Score { field_id, i, scores } => {
                        insert_score.execute(params![field_id, i, scores])?;
                    }
                    Op::Feature {
                        id,
                        field_id,
                        value_type,
                        meta,
                    } => {
                        insert_feature.execute(params![
                            id,
                            field_id,
                            meta.short_title,
                            meta.long_title,
                            meta.priority,
                            value_type,
                            meta.visibility,
                        ])?;
                    }
                    Op::Code {
                        field_id,
                        ordering,
                        value,
                    } => {
                        insert_code.execute(params![field_id, ordering, value])?;
                    }
                    Op::Position {
                        field_id,
                        row,
                        bin,
                        pos,
                    } => {
                        insert_position.execute(params![
                            field_id,
                            row,
                            bin,
                            pos.chrom,
                            pos.chrom_start,
                            pos.chrom_end,
                            pos.strand,
                        ])?;
                    }
                    Op::Gene { field_id, row, gene } => {
                        insert_gene.execute(params![field_id, row, gene])?;
                    }
                }
            }
        }
        tx.commit()?;
        Ok(())
    }
}

impl Default for Batcher {
    fn default() -> Self {
        Self::new()
    }
}
