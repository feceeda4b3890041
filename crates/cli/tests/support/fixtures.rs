#![allow(dead_code)]

use std::{fs, path::PathBuf, process::Command};

use tempfile::TempDir;

pub const TWO_SHARDS: &str = r#"
links:
  - host: db1.internal
    user: app
    service: ORCL
    database: SALES
    table: ORDERS_01
  - host: db2.internal
    port: 1522
    user: app
    service: ORCL
    database: SALES
    table: ORDERS_2
    link_status: recovery
"#;

pub const ORDERS_TABLE: &str = r#"
columns:
  - name: id
    type: { kind: int }
    nullable: false
  - name: customer
    type: { kind: varchar, length: 64 }
  - name: total
    type: { kind: decimal, precision: 10, scale: 2 }
keys:
  - name: PK_ORDERS
    columns: [0]
    primary: true
    unique: true
  - name: IDX_CUSTOMER
    columns: [1]
"#;

/// A scratch directory holding `config.yaml` and `table.yaml`.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new(config: &str, table: &str) -> Self {
        let dir = tempfile::tempdir().unwrap_or_else(|error| panic!("tempdir: {error}"));
        fs::write(dir.path().join("config.yaml"), config)
            .unwrap_or_else(|error| panic!("write config.yaml: {error}"));
        fs::write(dir.path().join("table.yaml"), table)
            .unwrap_or_else(|error| panic!("write table.yaml: {error}"));
        Self { dir }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn run(&self, args: &[&str]) -> std::process::Output {
        Command::new(env!("CARGO_BIN_EXE_tablelink"))
            .arg("--config")
            .arg(self.path("config.yaml"))
            .arg("--table")
            .arg(self.path("table.yaml"))
            .args(args)
            .env_remove("RUST_LOG")
            .output()
            .unwrap_or_else(|error| panic!("failed to run tablelink: {error}"))
    }
}

pub fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
