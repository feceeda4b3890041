#[path = "support/remote_harness.rs"]
mod remote_harness;

use std::collections::{BTreeMap, BTreeSet};

use remote_harness::{Harness, NUMBERED_TABLE};
use tablelink_core::{ComparisonOp, Expr, HostRow, Literal, Page};
use tablelink_dialect_oracle::{BkaStage, Connection};

const GRP_KEY: usize = 1;

fn stage_groups(harness: &Harness, groups: &[&str]) -> BkaStage {
    let mut stage = BkaStage::new(&harness.handler, GRP_KEY).expect("stage");
    for (member, group) in groups.iter().enumerate() {
        stage
            .push_key(member, HostRow::from_texts([Some(*group)]))
            .expect("push key");
    }
    stage
}

/// Target ids each batch member received.
fn joined_ids(
    stage: &mut BkaStage,
    connection: &mut Connection,
    condition: Option<&Expr>,
    page: Page,
) -> BTreeMap<usize, BTreeSet<String>> {
    let mut scan = stage
        .open(connection, 0, &[0, 2], condition, page)
        .expect("join must run");
    let mut rows = Vec::new();
    while let Some((id, row)) = scan.next_row().expect("next row") {
        rows.push((id, row.text(0).expect("id column").to_string()));
    }
    scan.finish().expect("staged table drop");

    let mut by_member: BTreeMap<usize, BTreeSet<String>> = BTreeMap::new();
    for (id, target) in rows {
        for member in stage.batch().members(id) {
            by_member.entry(*member).or_default().insert(target.clone());
        }
    }
    by_member
}

fn ids(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}

#[test]
fn one_join_answers_every_member_like_separate_lookups() {
    let harness = Harness::load(NUMBERED_TABLE, "numbered");
    let mut connection = harness.connect(0);
    let mut stage = stage_groups(&harness, &["3", "1", "3", "99"]);
    assert_eq!(stage.batch().len(), 3, "duplicate keys share one staged row");

    let by_member = joined_ids(&mut stage, &mut connection, None, Page::UNBOUNDED);

    assert_eq!(by_member.get(&0), Some(&ids(&["1", "5", "9"])));
    assert_eq!(by_member.get(&1), Some(&ids(&["10", "2", "4", "7"])));
    assert_eq!(by_member.get(&2), by_member.get(&0));
    assert_eq!(by_member.get(&3), None, "unmatched key yields no rows");
    assert!(
        !harness
            .remote
            .table_exists(stage.table_name())
            .expect("catalog query")
    );
}

#[test]
fn condition_is_applied_to_the_target_side() {
    let harness = Harness::load(NUMBERED_TABLE, "numbered");
    let mut connection = harness.connect(0);
    let mut stage = stage_groups(&harness, &["3", "1"]);
    let condition = Expr::compare(
        ComparisonOp::Gt,
        Expr::column(0),
        Expr::literal(Literal::Integer(4)),
    );

    let by_member = joined_ids(
        &mut stage,
        &mut connection,
        Some(&condition),
        Page::UNBOUNDED,
    );

    assert_eq!(by_member.get(&0), Some(&ids(&["5", "9"])));
    assert_eq!(by_member.get(&1), Some(&ids(&["10", "7"])));
}

#[test]
fn page_numbers_joined_rows_in_staged_order() {
    let harness = Harness::load(NUMBERED_TABLE, "numbered");
    let mut connection = harness.connect(0);
    let mut stage = stage_groups(&harness, &["2", "1"]);

    let by_member = joined_ids(&mut stage, &mut connection, None, Page::new(0, Some(2)));

    assert_eq!(by_member.len(), 1, "the window ends inside the first staged key");
    assert_eq!(by_member.get(&0).map(BTreeSet::len), Some(2));
}

#[test]
fn dropping_an_unfinished_scan_removes_the_staged_table() {
    let harness = Harness::load(NUMBERED_TABLE, "numbered");
    let mut connection = harness.connect(0);
    let mut stage = stage_groups(&harness, &["2"]);
    {
        let mut scan = stage
            .open(&mut connection, 0, &[], None, Page::UNBOUNDED)
            .expect("join must run");
        assert!(
            harness
                .remote
                .table_exists(stage.table_name())
                .expect("catalog query")
        );
        let (_, row) = scan.next_row().expect("fetch").expect("first row");
        assert_eq!(row.len(), 3);
    }
    assert!(
        !harness
            .remote
            .table_exists(stage.table_name())
            .expect("catalog query")
    );
}

#[test]
fn failed_join_still_drops_the_staged_table() {
    let harness = Harness::load(NUMBERED_TABLE, "numbered");
    let mut connection = harness.connect(0);
    let mut stage = stage_groups(&harness, &["1", "2"]);
    harness.remote.fail_execute(" bka_id", 900, "invalid SQL statement");

    let error = stage
        .open(&mut connection, 0, &[], None, Page::UNBOUNDED)
        .err()
        .expect("join must fail");
    assert!(error.to_string().contains("invalid SQL statement"));
    assert!(
        !harness
            .remote
            .table_exists(stage.table_name())
            .expect("catalog query")
    );
    let drops = harness.remote.statements_starting_with("DROP TABLE");
    assert_eq!(drops.len(), 2, "one drop before staging and one on abort");
}

#[test]
fn staging_splits_inserts_at_the_bulk_size() {
    let yaml = NUMBERED_TABLE.replace("  tables: [T]", "  tables: [T]\n  bulk_size: 64");
    let harness = Harness::load(&yaml, "numbered");
    let mut connection = harness.connect(0);
    let mut stage = stage_groups(&harness, &["1", "2", "3", "4", "5", "6"]);

    let by_member = joined_ids(&mut stage, &mut connection, None, Page::UNBOUNDED);
    assert_eq!(by_member.len(), 3);

    let staged_table = stage.table_name().to_string();
    let inserts: Vec<String> = harness
        .remote
        .statements_starting_with("INSERT INTO")
        .into_iter()
        .filter(|sql| sql.contains(&staged_table))
        .collect();
    assert!(inserts.len() > 1, "expected several inserts, got {inserts:?}");
}

#[test]
fn reset_stage_collects_a_fresh_batch() {
    let harness = Harness::load(NUMBERED_TABLE, "numbered");
    let mut connection = harness.connect(0);
    let mut stage = stage_groups(&harness, &["1"]);
    joined_ids(&mut stage, &mut connection, None, Page::UNBOUNDED);

    stage.reset().expect("reset");
    assert!(stage.batch().is_empty());
    stage
        .push_key(0, HostRow::from_texts([Some("2")]))
        .expect("push key");
    let by_member = joined_ids(&mut stage, &mut connection, None, Page::UNBOUNDED);
    assert_eq!(by_member.get(&0), Some(&ids(&["11", "3", "6", "8"])));
}

#[test]
fn temporary_table_is_emptied_before_it_is_dropped() {
    let yaml = NUMBERED_TABLE.replace("  tables: [T]", "  tables: [T]\n  bka_temporary: true");
    let harness = Harness::load(&yaml, "numbered");
    let mut connection = harness.connect(0);
    let mut stage = stage_groups(&harness, &["3", "1"]);

    let by_member = joined_ids(&mut stage, &mut connection, None, Page::UNBOUNDED);
    assert_eq!(by_member.len(), 2);

    let staged_table = stage.table_name().to_string();
    let touching: Vec<String> = harness
        .remote
        .statements()
        .into_iter()
        .filter(|sql| sql.contains(&staged_table))
        .collect();
    assert!(touching.iter().any(|sql| sql.starts_with("CREATE GLOBAL TEMPORARY TABLE")));
    let teardown = &touching[touching.len() - 2..];
    assert!(teardown[0].starts_with("TRUNCATE TABLE"), "{touching:?}");
    assert!(teardown[1].starts_with("DROP TABLE"), "{touching:?}");
    assert!(
        !harness
            .remote
            .table_exists(&staged_table)
            .expect("catalog query")
    );
}

#[test]
fn refused_drop_is_reported_by_finish() {
    let yaml = NUMBERED_TABLE.replace("  tables: [T]", "  tables: [T]\n  bka_temporary: true");
    let harness = Harness::load(&yaml, "numbered");
    let mut connection = harness.connect(0);
    let mut stage = stage_groups(&harness, &["2"]);

    let mut scan = stage
        .open(&mut connection, 0, &[], None, Page::UNBOUNDED)
        .expect("join must run");
    while scan.next_row().expect("next row").is_some() {}
    harness
        .remote
        .fail_execute("DROP TABLE", 14452, "temporary table already in use");

    let error = scan.finish().err().expect("drop must fail");
    assert!(error.to_string().contains("temporary table already in use"));
    assert!(
        harness
            .remote
            .table_exists(stage.table_name())
            .expect("catalog query"),
        "the refused drop leaves the table behind"
    );
}

#[test]
fn union_all_mode_joins_without_a_transient_table() {
    let yaml = NUMBERED_TABLE.replace("  tables: [T]", "  tables: [T]\n  bka_mode: union_all");
    let harness = Harness::load(&yaml, "numbered");
    let mut connection = harness.connect(0);
    let mut stage = stage_groups(&harness, &["3", "1", "3", "99"]);

    let by_member = joined_ids(&mut stage, &mut connection, None, Page::UNBOUNDED);

    assert_eq!(by_member.get(&0), Some(&ids(&["1", "5", "9"])));
    assert_eq!(by_member.get(&1), Some(&ids(&["10", "2", "4", "7"])));
    assert_eq!(by_member.get(&2), by_member.get(&0));
    assert_eq!(by_member.get(&3), None);

    let statements = harness.remote.statements();
    assert!(
        statements.iter().all(|sql| !sql.contains(stage.table_name())),
        "{statements:?}"
    );
    let joins: Vec<&String> = statements
        .iter()
        .filter(|sql| sql.contains(" bka_id"))
        .collect();
    assert_eq!(joins.len(), 1);
    assert!(joins[0].contains("SELECT 0 \"id\", 3 \"c0\" FROM DUAL UNION ALL SELECT 1 \"id\", 1 \"c0\" FROM DUAL UNION ALL SELECT 2 \"id\", 99 \"c0\" FROM DUAL"));
}
