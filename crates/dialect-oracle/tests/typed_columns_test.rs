#[path = "support/remote_harness.rs"]
mod remote_harness;

use remote_harness::Harness;
use tablelink_core::{HostRow, OrderKey, Page};
use tablelink_dialect_oracle::{BulkMutationBuffer, Mutation, NativeType, ZERO_DATE};

const TYPED_TABLE: &str = r#"
typed:
  setup: |
    CREATE TABLE "T" ("id" NUMBER(10) PRIMARY KEY, "d" DATE, "b" BLOB);
  tables: [T]
  table:
    columns:
      - { name: id, type: { kind: int }, nullable: false }
      - { name: d, type: { kind: date } }
      - { name: b, type: { kind: blob } }
    keys:
      - { name: PRIMARY, columns: [0], unique: true, primary: true }
"#;

const DATED_TABLE: &str = r#"
dated:
  setup: |
    CREATE TABLE "T" ("a" DATE, "b" BLOB);
  tables: [T]
  table:
    columns:
      - { name: a, type: { kind: date } }
      - { name: b, type: { kind: blob } }
"#;

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|index| (index % 251) as u8).collect()
}

fn large_payload() -> Vec<u8> {
    (0..10_000u32).map(|index| (index % 251) as u8).collect()
}

fn seed(harness: &mut Harness) {
    let rows: Vec<(&str, Option<&str>, Option<Vec<u8>>)> = vec![
        ("1", Some("2024-01-05"), Some(vec![0x00, 0xFF])),
        ("2", Some("1999-12-31 23:59:59"), Some(Vec::new())),
        ("3", Some("2024-02-29 13:45:07"), None),
        ("4", Some(ZERO_DATE), Some(large_payload())),
        ("5", None, Some(vec![1, 2, 3])),
        ("6", Some("2000-01-01"), Some(vec![9])),
    ];
    let mut connection = harness.connect(0);
    let mut bulk = BulkMutationBuffer::new(harness.config.bulk_size);
    for (id, date, blob) in rows {
        let row = HostRow::new(vec![
            Some(id.as_bytes().to_vec()),
            date.map(|text| text.as_bytes().to_vec()),
            blob,
        ]);
        bulk.push(&mut harness.handler, 0, &Mutation::Insert(row))
            .expect("push insert");
    }
    bulk.flush(&mut harness.handler, &mut connection)
        .expect("seed rows");
}

fn select_page(harness: &mut Harness, page: Page) -> Vec<HostRow> {
    harness.handler.reset_select(0).expect("reset");
    harness.handler.append_select_part(&[]).expect("select list");
    harness
        .handler
        .append_order_by(&[OrderKey::asc(0)])
        .expect("order by");
    harness.handler.append_limit(page).expect("limit");

    let mut connection = harness.connect(0);
    harness
        .handler
        .exec_select(&mut connection, 0)
        .expect("select runs");
    let mut cursor = connection.store_result().expect("result set");
    let mut rows = Vec::new();
    while let Some(row) = cursor.fetch_row().expect("fetch") {
        assert_eq!(row.native_type(1), Some(NativeType::Date));
        assert_eq!(row.native_type(2), Some(NativeType::Blob));
        rows.push(row.to_host_row());
    }
    rows
}

#[test]
fn paged_select_decodes_dates_and_large_objects() {
    let mut harness = Harness::load(TYPED_TABLE, "typed");
    seed(&mut harness);

    let rows = select_page(&mut harness, Page::new(2, Some(3)));

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].text(0), Some("3"));
    assert_eq!(rows[0].text(1), Some("2024-02-29 13:45:07"));
    assert!(rows[0].is_null(2));

    assert_eq!(rows[1].text(0), Some("4"));
    assert_eq!(rows[1].text(1), Some(ZERO_DATE));
    assert_eq!(rows[1].get(2), Some(large_payload().as_slice()));

    assert_eq!(rows[2].text(0), Some("5"));
    assert!(rows[2].is_null(1));
    assert_eq!(rows[2].get(2), Some([1u8, 2, 3].as_slice()));
}

#[test]
fn short_dates_gain_midnight_and_empty_blobs_stay_non_null() {
    let mut harness = Harness::load(TYPED_TABLE, "typed");
    seed(&mut harness);

    let rows = select_page(&mut harness, Page::UNBOUNDED);

    assert_eq!(rows.len(), 6);
    assert_eq!(rows[0].text(1), Some("2024-01-05 00:00:00"));
    assert_eq!(rows[0].get(2), Some([0x00u8, 0xFF].as_slice()));
    assert_eq!(rows[1].text(1), Some("1999-12-31 23:59:59"));
    assert_eq!(rows[1].get(2), Some([].as_slice()));
    assert!(!rows[1].is_null(2));
    assert_eq!(rows[5].text(1), Some("2000-01-01 00:00:00"));
}

#[test]
fn blobs_are_written_as_hex_and_empty_blob_literals() {
    let mut harness = Harness::load(TYPED_TABLE, "typed");
    seed(&mut harness);

    let inserts = harness.remote.statements_starting_with("INSERT INTO");
    assert_eq!(inserts.len(), 1);
    assert!(inserts[0].contains("(1, '2024-01-05 00:00:00', HEXTORAW('00FF'))"));
    assert!(inserts[0].contains("(2, '1999-12-31 23:59:59', EMPTY_BLOB())"));
    assert!(inserts[0].contains("(3, '2024-02-29 13:45:07', NULL)"));
}

#[test]
fn window_over_date_order_returns_third_to_fifth_rows_with_their_blobs() {
    let mut harness = Harness::load(DATED_TABLE, "dated");
    let rows = [
        ("2024-07-19", 7000),
        ("2024-03-05", 500),
        ("2025-06-15", 100),
        ("2023-11-30 12:00:00", 1),
        ("2024-03-05 00:00:01", 12_345),
        ("2024-12-31 23:59:59", 3),
        ("2024-01-01", 10),
        ("2025-01-01", 64),
        ("2024-02-14 08:30:00", 4000),
        ("2024-04-01", 2),
    ];
    let mut connection = harness.connect(0);
    let mut bulk = BulkMutationBuffer::new(harness.config.bulk_size);
    for (date, len) in rows {
        let row = HostRow::new(vec![Some(date.as_bytes().to_vec()), Some(payload(len))]);
        bulk.push(&mut harness.handler, 0, &Mutation::Insert(row))
            .expect("push insert");
    }
    bulk.flush(&mut harness.handler, &mut connection)
        .expect("seed rows");

    harness.handler.reset_select(0).expect("reset");
    harness.handler.append_select_part(&[]).expect("select list");
    harness
        .handler
        .append_order_by(&[OrderKey::asc(0)])
        .expect("order by");
    harness
        .handler
        .append_limit(Page::new(2, Some(3)))
        .expect("limit");
    assert!(harness.handler.sql().as_str().contains("ORDER BY \"a\""));
    harness
        .handler
        .exec_select(&mut connection, 0)
        .expect("select runs");

    let mut cursor = connection.store_result().expect("result set");
    let mut window = Vec::new();
    while let Some(row) = cursor.fetch_row().expect("fetch") {
        let row = row.to_host_row();
        let date = row.text(0).expect("date").to_string();
        window.push((date, row.get(1).expect("blob").to_vec()));
    }

    let expected = [
        ("2024-02-14 08:30:00", 4000),
        ("2024-03-05 00:00:00", 500),
        ("2024-03-05 00:00:01", 12_345),
    ];
    assert_eq!(window.len(), expected.len());
    for ((date, blob), (expected_date, expected_len)) in window.iter().zip(expected) {
        assert_eq!(date, expected_date);
        assert_eq!(blob.len(), expected_len);
        assert_eq!(blob, &payload(expected_len));
    }
}
