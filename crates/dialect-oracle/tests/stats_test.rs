#[path = "support/remote_harness.rs"]
mod remote_harness;

use remote_harness::{Harness, NUMBERED_TABLE, fetch_all};
use tablelink_core::{CatalogTable, HostRow, MemoryCatalog, TableStatistics};
use tablelink_dialect_oracle::{QueryKind, StatisticsReader};

fn analyzed(rows: &str) -> Harness {
    let yaml = NUMBERED_TABLE.replace(
        "  tables: [T]",
        &format!("    {rows}\n  tables: [T]"),
    );
    Harness::load(&yaml, "numbered")
}

fn auto_incremented(sequence: bool) -> Harness {
    let mut yaml = NUMBERED_TABLE.replace(
        "nullable: false }",
        "nullable: false, auto_increment: true }",
    );
    if sequence {
        yaml = yaml.replace(
            "  tables: [T]",
            "    INSERT INTO ALL_SEQUENCES VALUES ('main', 'T_SEQ', 100);\n  tables: [T]\n  sequence: T_SEQ",
        );
    }
    Harness::load(&yaml, "numbered")
}

#[test]
fn dictionary_statistics_are_cached_until_refreshed() {
    let harness = analyzed("INSERT INTO ALL_TABLES VALUES ('main', 'T', 11, 24);");
    let catalog = MemoryCatalog::new();
    let reader = StatisticsReader::new(&harness.handler, &catalog, 0);
    let mut connection = harness.connect(0);

    let statistics = reader
        .show_table_status(&mut connection, false)
        .expect("statistics");
    assert_eq!(
        statistics,
        TableStatistics {
            records: 11,
            data_length: 264,
            mean_rec_length: 24,
        }
    );
    assert_eq!(
        harness
            .remote
            .statements_starting_with("SELECT NUM_ROWS, AVG_ROW_LEN FROM ALL_TABLES"),
        vec![
            "SELECT NUM_ROWS, AVG_ROW_LEN FROM ALL_TABLES WHERE OWNER = 'main' AND TABLE_NAME = 'T'"
                .to_string()
        ]
    );

    harness
        .remote
        .execute_batch("UPDATE ALL_TABLES SET NUM_ROWS = 500")
        .expect("reanalyze");
    let cached = reader
        .show_table_status(&mut connection, false)
        .expect("cached statistics");
    assert_eq!(cached.records, 11);
    assert_eq!(
        harness
            .remote
            .statements_starting_with("SELECT NUM_ROWS")
            .len(),
        1
    );

    let refreshed = reader
        .show_table_status(&mut connection, true)
        .expect("refreshed statistics");
    assert_eq!(refreshed.records, 500);
    assert_eq!(catalog.records(CatalogTable::TableStatistics).len(), 1);
}

#[test]
fn never_analyzed_table_falls_back_to_counting() {
    let harness = analyzed("INSERT INTO ALL_TABLES VALUES ('main', 'T', NULL, NULL);");
    let catalog = MemoryCatalog::new();
    let reader = StatisticsReader::new(&harness.handler, &catalog, 0);
    let mut connection = harness.connect(0);

    let statistics = reader
        .show_table_status(&mut connection, false)
        .expect("statistics");

    assert_eq!(statistics.records, 11);
    assert_eq!(statistics.data_length, 0);
    assert_eq!(
        harness
            .remote
            .statements_starting_with("SELECT COUNT(*)"),
        vec!["SELECT COUNT(*) FROM \"main\".\"T\"".to_string()]
    );
}

#[test]
fn missing_dictionary_row_also_counts() {
    let harness = Harness::load(NUMBERED_TABLE, "numbered");
    let catalog = MemoryCatalog::new();
    let reader = StatisticsReader::new(&harness.handler, &catalog, 0);
    let mut connection = harness.connect(0);

    assert_eq!(
        reader
            .show_table_status(&mut connection, false)
            .expect("statistics")
            .records,
        11
    );
}

#[test]
fn record_count_is_never_cached() {
    let harness = Harness::load(NUMBERED_TABLE, "numbered");
    let catalog = MemoryCatalog::new();
    let reader = StatisticsReader::new(&harness.handler, &catalog, 0);
    let mut connection = harness.connect(0);

    assert_eq!(reader.show_records(&mut connection).expect("count"), 11);
    connection
        .exec_query("DELETE FROM \"main\".\"T\" WHERE \"id\" > 9")
        .expect("delete");
    assert_eq!(reader.show_records(&mut connection).expect("count"), 9);
    assert!(catalog.records(CatalogTable::TableStatistics).is_empty());
}

#[test]
fn column_cardinality_is_sorted_and_cached() {
    let harness = analyzed(
        "INSERT INTO ALL_TAB_COL_STATISTICS VALUES ('main', 'T', 'name', NULL), ('main', 'T', 'id', 11), ('main', 'T', 'grp', 3), ('other', 'T', 'id', 99);",
    );
    let catalog = MemoryCatalog::new();
    let reader = StatisticsReader::new(&harness.handler, &catalog, 0);
    let mut connection = harness.connect(0);

    let cardinality = reader.show_index(&mut connection, false).expect("index");
    assert_eq!(
        cardinality,
        vec![
            ("grp".to_string(), 3),
            ("id".to_string(), 11),
            ("name".to_string(), 0),
        ]
    );

    let cached = reader.show_index(&mut connection, false).expect("cached");
    assert_eq!(cached, cardinality);
    assert_eq!(
        harness
            .remote
            .statements_starting_with("SELECT COLUMN_NAME")
            .len(),
        1
    );
    let records = catalog.records(CatalogTable::ColumnStatistics);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].0, "main.T");
}

#[test]
fn sequence_feeds_inserts_and_reports_the_last_value_drawn() {
    let mut harness = auto_incremented(true);
    let catalog = MemoryCatalog::new();
    let mut connection = harness.connect(0);
    {
        let reader = StatisticsReader::new(&harness.handler, &catalog, 0);
        assert_eq!(
            reader
                .show_last_insert_id(&mut connection)
                .expect("nothing drawn yet"),
            None
        );
        assert_eq!(
            reader.show_autoinc(&mut connection).expect("autoinc"),
            Some(100)
        );
    }

    let handler = &mut harness.handler;
    handler.append_insert_header(0).expect("header");
    for row in [
        HostRow::from_texts([None, Some("4"), Some("lima")]),
        HostRow::from_texts([Some("50"), Some("4"), Some("mike")]),
        HostRow::from_texts([None, Some("4"), Some("november")]),
    ] {
        handler.append_insert_values(&row).expect("values");
    }
    let insert = handler.insert_sql().as_str().to_string();
    assert_eq!(insert.matches("\"main\".\"T_SEQ\".NEXTVAL").count(), 2, "{insert}");
    connection
        .exec_query_with(&insert, QueryKind::Write, false)
        .expect("insert");

    let reader = StatisticsReader::new(&harness.handler, &catalog, 0);
    assert_eq!(
        reader.show_last_insert_id(&mut connection).expect("last insert id"),
        Some(101)
    );
    assert_eq!(
        reader.show_autoinc(&mut connection).expect("autoinc"),
        Some(102)
    );

    connection
        .exec_query_with(
            "SELECT \"id\", \"name\" FROM \"main\".\"T\" WHERE \"grp\" = 4 ORDER BY \"id\"",
            QueryKind::Read,
            false,
        )
        .expect("select");
    let names: Vec<(String, String)> = fetch_all(&mut connection, 2)
        .into_iter()
        .map(|row| {
            (
                row[0].clone().expect("id"),
                row[1].clone().expect("name"),
            )
        })
        .collect();
    assert_eq!(
        names,
        vec![
            ("50".to_string(), "mike".to_string()),
            ("100".to_string(), "lima".to_string()),
            ("101".to_string(), "november".to_string()),
        ]
    );
}

#[test]
fn autoinc_without_a_sequence_follows_the_column_maximum() {
    let harness = auto_incremented(false);
    let catalog = MemoryCatalog::new();
    let reader = StatisticsReader::new(&harness.handler, &catalog, 0);
    let mut connection = harness.connect(0);

    assert_eq!(
        reader.show_autoinc(&mut connection).expect("autoinc"),
        Some(12)
    );
    assert_eq!(
        reader
            .show_last_insert_id(&mut connection)
            .expect("no sequence"),
        None
    );
    assert_eq!(
        harness.remote.statements_starting_with("SELECT MAX("),
        vec!["SELECT MAX(\"id\") FROM \"main\".\"T\"".to_string()]
    );

    let plain = Harness::load(NUMBERED_TABLE, "numbered");
    let reader = StatisticsReader::new(&plain.handler, &catalog, 0);
    let mut connection = plain.connect(0);
    assert_eq!(reader.show_autoinc(&mut connection).expect("autoinc"), None);
}
