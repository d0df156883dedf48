use rusqlite::params;

use xena_core::codec::{decode, SEGMENT_SIZE};
use xena_loader::{delete_matrix, write_matrix};
use xena_model::{
    FeatureMeta, FieldData, FieldSource, MatrixSource, PositionRow, RowSource, SourceFile,
};
use xena_store::{Db, DbOptions};

fn open_db(dir: &tempfile::TempDir) -> Db {
    Db::open(dir.path().join("load.db"), DbOptions::default()).expect("open db")
}

fn probe_matrix() -> MatrixSource {
    MatrixSource::from_fields(vec![
        FieldSource::new("probe1", FieldData::Float(RowSource::from_vec(vec![1.1, 1.2]))),
        FieldSource::new("probe2", FieldData::Float(RowSource::from_vec(vec![2.1, 2.2]))),
    ])
}

fn sources_v1() -> Vec<SourceFile> {
    vec![SourceFile::new("id1.tsv", 1000, "hash-a")]
}

#[test]
fn small_matrix_lands_in_all_tables() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = open_db(&dir);
    let result = write_matrix(
        &db,
        "id1",
        &sources_v1(),
        &serde_json::json!({"cohort": "test"}),
        probe_matrix(),
        None,
        false,
    )
    .expect("load");
    assert_eq!(result.rows, 2);
    assert!(result.warnings.is_empty());

    let conn = db.pool().get().expect("conn");
    let (name, status, cohort): (String, String, String) = conn
        .query_row(
            "SELECT name, status, cohort FROM dataset",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .expect("dataset row");
    assert_eq!(name, "id1");
    assert_eq!(status, "loaded");
    assert_eq!(cohort, "test");

    let fields: Vec<String> = conn
        .prepare("SELECT name FROM field ORDER BY id")
        .expect("stmt")
        .query_map([], |r| r.get(0))
        .expect("query")
        .collect::<Result<_, _>>()
        .expect("fields");
    assert_eq!(fields, vec!["probe1", "probe2"]);

    let blob: Vec<u8> = conn
        .query_row(
            "SELECT s.scores FROM field_score s JOIN field f ON f.id = s.field_id
             WHERE f.name = 'probe2' AND s.i = 0",
            [],
            |r| r.get(0),
        )
        .expect("segment");
    assert_eq!(decode(&blob).expect("decode"), vec![2.1_f32, 2.2]);
}

#[test]
fn unchanged_sources_skip_the_reload() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = open_db(&dir);
    write_matrix(
        &db,
        "id1",
        &sources_v1(),
        &serde_json::json!({}),
        probe_matrix(),
        None,
        false,
    )
    .expect("first load");
    let conn = db.pool().get().expect("conn");
    let first_ids: Vec<i64> = conn
        .prepare("SELECT id FROM field ORDER BY id")
        .expect("stmt")
        .query_map([], |r| r.get(0))
        .expect("query")
        .collect::<Result<_, _>>()
        .expect("ids");
    drop(conn);

    // Same (name, mtime, hash) set: metadata-only update, fields keep
    // their ids.
    let result = write_matrix(
        &db,
        "id1",
        &sources_v1(),
        &serde_json::json!({"cohort": "updated"}),
        probe_matrix(),
        None,
        false,
    )
    .expect("second load");
    assert_eq!(result.rows, 2);
    let conn = db.pool().get().expect("conn");
    let second_ids: Vec<i64> = conn
        .prepare("SELECT id FROM field ORDER BY id")
        .expect("stmt")
        .query_map([], |r| r.get(0))
        .expect("query")
        .collect::<Result<_, _>>()
        .expect("ids");
    assert_eq!(first_ids, second_ids);
    let cohort: String = conn
        .query_row("SELECT cohort FROM dataset", [], |r| r.get(0))
        .expect("cohort");
    assert_eq!(cohort, "updated");
}

#[test]
fn force_flag_reloads_despite_identical_sources() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = open_db(&dir);
    write_matrix(&db, "id1", &sources_v1(), &serde_json::json!({}), probe_matrix(), None, false)
        .expect("first");
    write_matrix(&db, "id1", &sources_v1(), &serde_json::json!({}), probe_matrix(), None, true)
        .expect("forced");
    let conn = db.pool().get().expect("conn");
    let min_id: i64 = conn
        .query_row("SELECT MIN(id) FROM field", [], |r| r.get(0))
        .expect("min id");
    // Reinserted fields draw fresh ids from the sequence.
    assert!(min_id > 2);
    let n: i64 = conn
        .query_row("SELECT COUNT(*) FROM field", [], |r| r.get(0))
        .expect("count");
    assert_eq!(n, 2);
}

#[test]
fn changed_hash_triggers_replacement() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = open_db(&dir);
    write_matrix(&db, "id1", &sources_v1(), &serde_json::json!({}), probe_matrix(), None, false)
        .expect("first");
    let changed = vec![SourceFile::new("id1.tsv", 2000, "hash-b")];
    write_matrix(&db, "id1", &changed, &serde_json::json!({}), probe_matrix(), None, false)
        .expect("second");
    let conn = db.pool().get().expect("conn");
    let hash: String = conn
        .query_row(
            "SELECT s.hash FROM source s JOIN dataset_source ds ON ds.source_id = s.id",
            [],
            |r| r.get(0),
        )
        .expect("hash");
    assert_eq!(hash, "hash-b");
}

#[test]
fn category_field_infers_first_seen_codes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = open_db(&dir);
    let matrix = MatrixSource::from_fields(vec![FieldSource::new(
        "tissue",
        FieldData::Category(RowSource::from_vec(vec![
            Some("tumor".to_string()),
            Some("normal".to_string()),
            None,
            Some("tumor".to_string()),
        ])),
    )]);
    write_matrix(&db, "clin", &sources_v1(), &serde_json::json!({}), matrix, None, false)
        .expect("load");
    let conn = db.pool().get().expect("conn");
    let codes: Vec<(i64, String)> = conn
        .prepare("SELECT ordering, value FROM code ORDER BY ordering")
        .expect("stmt")
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
        .expect("query")
        .collect::<Result<_, _>>()
        .expect("codes");
    assert_eq!(
        codes,
        vec![(0, "tumor".to_string()), (1, "normal".to_string())]
    );
    let blob: Vec<u8> = conn
        .query_row("SELECT scores FROM field_score", [], |r| r.get(0))
        .expect("segment");
    let decoded = decode(&blob).expect("decode");
    assert_eq!(decoded[0], 0.0);
    assert_eq!(decoded[1], 1.0);
    assert!(decoded[2].is_nan());
    assert_eq!(decoded[3], 0.0);
    let value_type: String = conn
        .query_row("SELECT valueType FROM feature", [], |r| r.get(0))
        .expect("feature");
    assert_eq!(value_type, "category");
}

#[test]
fn supplied_order_pins_codes_and_unknowns_go_missing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = open_db(&dir);
    let matrix = MatrixSource::from_fields(vec![FieldSource::new(
        "stage",
        FieldData::Category(RowSource::from_vec(vec![
            Some("ii".to_string()),
            Some("i".to_string()),
            Some("iv".to_string()),
        ])),
    )
    .with_feature(FeatureMeta {
        order: Some(vec!["i".to_string(), "ii".to_string(), "iii".to_string()]),
        ..FeatureMeta::default()
    })]);
    write_matrix(&db, "clin", &sources_v1(), &serde_json::json!({}), matrix, None, false)
        .expect("load");
    let conn = db.pool().get().expect("conn");
    let n_codes: i64 = conn
        .query_row("SELECT COUNT(*) FROM code", [], |r| r.get(0))
        .expect("count");
    assert_eq!(n_codes, 3, "every supplied order entry gets a code row");
    let blob: Vec<u8> = conn
        .query_row("SELECT scores FROM field_score", [], |r| r.get(0))
        .expect("segment");
    let decoded = decode(&blob).expect("decode");
    assert_eq!(decoded[0], 1.0);
    assert_eq!(decoded[1], 0.0);
    assert!(decoded[2].is_nan(), "value outside the supplied order is missing");
}

#[test]
fn position_and_gene_fields_load_with_bins() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = open_db(&dir);
    let matrix = MatrixSource::from_fields(vec![
        FieldSource::new(
            "position",
            FieldData::Position(RowSource::from_vec(vec![
                PositionRow {
                    chrom: "chr1".to_string(),
                    chrom_start: 1000,
                    chrom_end: 2000,
                    strand: Some("+".to_string()),
                },
                PositionRow {
                    chrom: "chr2".to_string(),
                    chrom_start: 5_000_000,
                    chrom_end: 5_000_500,
                    strand: None,
                },
            ])),
        ),
        FieldSource::new(
            "genes",
            FieldData::Genes(RowSource::from_vec(vec![
                vec!["TP53".to_string(), "EGFR".to_string()],
                vec![],
            ])),
        ),
    ]);
    let result = write_matrix(
        &db,
        "probes",
        &sources_v1(),
        &serde_json::json!({}),
        matrix,
        None,
        false,
    )
    .expect("load");
    assert_eq!(result.rows, 2, "row count is rows, not gene entries");

    let conn = db.pool().get().expect("conn");
    let bin: i64 = conn
        .query_row(
            "SELECT bin FROM field_position WHERE chrom = 'chr1'",
            [],
            |r| r.get(0),
        )
        .expect("bin");
    assert_eq!(bin as u32, xena_core::bins::bin_of(1000, 2000));
    let genes: i64 = conn
        .query_row("SELECT COUNT(*) FROM field_gene", [], |r| r.get(0))
        .expect("genes");
    assert_eq!(genes, 2);
}

#[test]
fn unknown_value_type_is_skipped_with_warning() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = open_db(&dir);
    let matrix = MatrixSource::from_fields(vec![
        FieldSource::new(
            "mystery",
            FieldData::Unknown {
                value_type: "spatial".to_string(),
            },
        ),
        FieldSource::new("probe1", FieldData::Float(RowSource::from_vec(vec![1.0]))),
    ]);
    let result = write_matrix(
        &db,
        "id1",
        &sources_v1(),
        &serde_json::json!({}),
        matrix,
        None,
        false,
    )
    .expect("load");
    assert_eq!(result.warnings.len(), 1);
    let conn = db.pool().get().expect("conn");
    let n: i64 = conn
        .query_row("SELECT COUNT(*) FROM field", [], |r| r.get(0))
        .expect("count");
    assert_eq!(n, 1, "unknown field contributes no field row");
    let text: String = conn
        .query_row("SELECT text FROM dataset", [], |r| r.get(0))
        .expect("text");
    let meta: serde_json::Value = serde_json::from_str(&text).expect("json");
    assert!(meta["loader"]["warnings"][0]
        .as_str()
        .expect("warning string")
        .contains("mystery"));
}

#[test]
fn wide_field_segments_at_one_thousand_rows() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = open_db(&dir);
    let n = SEGMENT_SIZE + 7;
    let scores: Vec<f32> = (0..n).map(|i| i as f32).collect();
    let matrix = MatrixSource::from_fields(vec![FieldSource::new(
        "probe1",
        FieldData::Float(RowSource::from_vec(scores)),
    )]);
    let result = write_matrix(
        &db,
        "wide",
        &sources_v1(),
        &serde_json::json!({}),
        matrix,
        None,
        false,
    )
    .expect("load");
    assert_eq!(result.rows, n as i64);

    let conn = db.pool().get().expect("conn");
    let segments: Vec<(i64, Vec<u8>)> = conn
        .prepare("SELECT i, scores FROM field_score ORDER BY i")
        .expect("stmt")
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
        .expect("query")
        .collect::<Result<_, _>>()
        .expect("segments");
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].0, 0);
    assert_eq!(segments[0].1.len(), SEGMENT_SIZE * 4);
    assert_eq!(segments[1].1.len(), 7 * 4);
    let total: usize = segments
        .iter()
        .map(|(_, blob)| decode(blob).expect("decode").len())
        .sum();
    assert_eq!(total as i64, result.rows);
}

#[test]
fn delete_matrix_removes_everything_and_tolerates_unknown() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = open_db(&dir);
    write_matrix(&db, "id1", &sources_v1(), &serde_json::json!({}), probe_matrix(), None, false)
        .expect("load");
    delete_matrix(&db, "id1").expect("delete");
    delete_matrix(&db, "id1").expect("repeat delete is fine");
    let conn = db.pool().get().expect("conn");
    for table in ["dataset", "field", "field_score", "dataset_source"] {
        let n: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
            .expect("count");
        assert_eq!(n, 0, "{table} should be empty");
    }
}

#[test]
fn duplicate_dataset_ids_conflict_across_connections() {
    // Two loads of the same name on separate handles: one dataset row
    // wins; the unique constraint rejects a second insert racing it.
    let dir = tempfile::tempdir().expect("tempdir");
    let db = open_db(&dir);
    write_matrix(&db, "id1", &sources_v1(), &serde_json::json!({}), probe_matrix(), None, false)
        .expect("first");
    let conn = db.pool().get().expect("conn");
    let err = conn
        .execute("INSERT INTO dataset (name) VALUES ('id1')", params![])
        .expect_err("duplicate name");
    assert!(matches!(
        xena_core::Error::from(err),
        xena_core::Error::Integrity(_)
    ));
}
