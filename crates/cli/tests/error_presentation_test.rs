#[path = "support/fixtures.rs"]
mod fixtures;

use std::process::Command;

use fixtures::{ORDERS_TABLE, TWO_SHARDS, Workspace, stderr};

#[test]
fn invalid_configuration_keeps_config_category_with_cli_context() {
    let workspace = Workspace::new("links: []\n", ORDERS_TABLE);
    let output = workspace.run(&["links"]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = stderr(&output);
    assert!(stderr.contains("[config]"), "got: {stderr}");
    assert!(
        stderr.contains("while loading adapter configuration"),
        "stderr must include CLI context from anyhow, got: {stderr}"
    );
    assert!(stderr.contains("no shard links configured"), "got: {stderr}");
}

#[test]
fn missing_table_file_is_an_io_error() {
    let workspace = Workspace::new(TWO_SHARDS, ORDERS_TABLE);
    let missing = workspace.path("nowhere.yaml");
    let output = Command::new(env!("CARGO_BIN_EXE_tablelink"))
        .arg("--config")
        .arg(workspace.path("config.yaml"))
        .arg("--table")
        .arg(&missing)
        .arg("scan")
        .output()
        .unwrap_or_else(|error| panic!("failed to run tablelink: {error}"));

    assert_eq!(output.status.code(), Some(1));
    let stderr = stderr(&output);
    assert!(stderr.contains("[io]"), "got: {stderr}");
    assert!(stderr.contains("while reading table definition file"), "got: {stderr}");
    assert!(stderr.contains("nowhere.yaml"), "got: {stderr}");
}

#[test]
fn malformed_table_definition_is_a_parse_error() {
    let workspace = Workspace::new(TWO_SHARDS, "columns: [");
    let output = workspace.run(&["scan"]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = stderr(&output);
    assert!(stderr.contains("[parse]"), "got: {stderr}");
    assert!(stderr.contains("while parsing table definition file"), "got: {stderr}");
}

#[test]
fn key_over_a_missing_column_is_rejected_as_config() {
    let table = ORDERS_TABLE.replace("columns: [1]", "columns: [7]");
    let workspace = Workspace::new(TWO_SHARDS, &table);
    let output = workspace.run(&["scan"]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = stderr(&output);
    assert!(stderr.contains("[config]"), "got: {stderr}");
    assert!(stderr.contains("while planning remote statements"), "got: {stderr}");
    assert!(stderr.contains("IDX_CUSTOMER"), "got: {stderr}");
}

#[test]
fn out_of_range_link_names_the_count() {
    let workspace = Workspace::new(TWO_SHARDS, ORDERS_TABLE);
    let output = workspace.run(&["--link", "5", "lock"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("shard link 5 is out of range (2 links configured)"));
}

#[test]
fn unknown_scan_column_is_a_usage_error() {
    let workspace = Workspace::new(TWO_SHARDS, ORDERS_TABLE);
    let output = workspace.run(&["scan", "--columns", "id,discount"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("[usage] table definition has no column `discount`"));
}

#[test]
fn missing_config_flag_is_reported() {
    let output = Command::new(env!("CARGO_BIN_EXE_tablelink"))
        .arg("links")
        .output()
        .unwrap_or_else(|error| panic!("failed to run tablelink: {error}"));

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("[usage] missing required input: pass --config <PATH>"));
}
