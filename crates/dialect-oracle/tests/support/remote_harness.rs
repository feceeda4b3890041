#![allow(dead_code)]

use std::sync::Arc;

use tablelink_core::{AdapterConfig, TimeoutSource};
use tablelink_dialect_oracle::{ConnectParams, Connection, NativeClient, OracleHandler};
use tablelink_testkit::{RemoteFixture, SqliteRemote, load_fixture};

/// Two links onto `T`, keyed by `id`, with a secondary index on `grp`.
pub const NUMBERED_TABLE: &str = r#"
numbered:
  setup: |
    CREATE TABLE "T" ("id" NUMBER(10) PRIMARY KEY, "grp" NUMBER(10), "name" VARCHAR2(20));
    INSERT INTO "T" VALUES (1, 3, 'alpha'), (2, 1, 'bravo'), (3, 2, 'charlie'),
      (4, 1, 'delta'), (5, 3, 'echo'), (6, 2, 'foxtrot'), (7, 1, NULL),
      (8, 2, 'hotel'), (9, 3, 'india'), (10, 1, 'juliet'), (11, 2, 'kilo');
  tables: [T]
  table:
    columns:
      - { name: id, type: { kind: int }, nullable: false }
      - { name: grp, type: { kind: int } }
      - { name: name, type: { kind: varchar, length: 20 } }
    keys:
      - { name: PRIMARY, columns: [0], unique: true, primary: true }
      - { name: idx_grp, columns: [1] }
"#;

pub struct Harness {
    pub fixture: RemoteFixture,
    pub remote: Arc<SqliteRemote>,
    pub config: AdapterConfig,
    pub handler: OracleHandler,
}

impl Harness {
    pub fn load(yaml: &str, name: &str) -> Self {
        let fixture = load_fixture(yaml, name).expect("fixture must load");
        let remote = fixture.remote().expect("remote must seed");
        let config = fixture.adapter_config().expect("config must validate");
        let share = fixture.open_share().expect("share must open");
        Self {
            fixture,
            remote,
            config,
            handler: OracleHandler::new(share),
        }
    }

    pub fn connect(&self, link: usize) -> Connection {
        let client: Arc<dyn NativeClient> = self.remote.clone();
        let params = ConnectParams::from_config(&self.config, link, TimeoutSource::default())
            .expect("link must exist");
        let mut connection = Connection::new(client, params);
        connection.connect().expect("connect must succeed");
        connection
    }
}

/// Drains the open result set as text, keeping the first `width` columns.
pub fn fetch_all(connection: &mut Connection, width: usize) -> Vec<Vec<Option<String>>> {
    let mut cursor = connection.store_result().expect("result set must be open");
    let mut rows = Vec::new();
    while let Some(row) = cursor.fetch_row().expect("fetch must succeed") {
        rows.push(
            (0..width)
                .map(|index| {
                    row.val_str(index)
                        .expect("column must be text")
                        .map(str::to_string)
                })
                .collect(),
        );
    }
    rows
}
