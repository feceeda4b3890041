#[path = "support/remote_harness.rs"]
mod remote_harness;

use proptest::prelude::*;
use remote_harness::{Harness, NUMBERED_TABLE};
use sqlparser::{
    ast::Statement,
    dialect::GenericDialect,
    parser::Parser,
    tokenizer::{Token, Tokenizer},
};
use tablelink_core::{ComparisonOp, Expr, HostRow, Literal, OrderKey, Page};
use tablelink_dialect_oracle::{BkaStage, BulkMutationBuffer, Mutation};

fn parse_one(sql: &str) -> Statement {
    let mut statements = Parser::parse_sql(&GenericDialect {}, sql)
        .unwrap_or_else(|error| panic!("`{sql}` must parse: {error}"));
    assert_eq!(statements.len(), 1, "`{sql}` must be one statement");
    statements.remove(0)
}

fn string_literals(sql: &str) -> Vec<String> {
    Tokenizer::new(&GenericDialect {}, sql)
        .tokenize()
        .expect("tokenize")
        .into_iter()
        .filter_map(|token| match token {
            Token::SingleQuotedString(text) => Some(text),
            _ => None,
        })
        .collect()
}

#[test]
fn row_numbered_select_is_well_formed() {
    let mut harness = Harness::load(NUMBERED_TABLE, "numbered");
    let handler = &mut harness.handler;
    handler.reset_select(0).expect("reset");
    handler.append_select_part(&[0, 2]).expect("select list");
    handler
        .append_condition(&Expr::compare(
            ComparisonOp::NotEq,
            Expr::column(2),
            Expr::literal(Literal::String("it's".to_string())),
        ))
        .expect("condition");
    handler
        .append_order_by(&[OrderKey::desc(1), OrderKey::asc(0)])
        .expect("order by");
    handler.append_limit(Page::new(3, Some(4))).expect("limit");

    assert!(matches!(
        parse_one(harness.handler.sql().as_str()),
        Statement::Query(_)
    ));
    harness
        .handler
        .reappend_limit(Page::new(0, Some(2)))
        .expect("reappend");
    assert!(matches!(
        parse_one(harness.handler.sql().as_str()),
        Statement::Query(_)
    ));
}

#[test]
fn every_statement_sent_during_a_workload_parses() {
    let mut harness = Harness::load(NUMBERED_TABLE, "numbered");
    let mut connection = harness.connect(0);

    let mut bulk = BulkMutationBuffer::new(harness.config.bulk_size);
    for id in ["20", "21"] {
        bulk.push(
            &mut harness.handler,
            0,
            &Mutation::Insert(HostRow::from_texts([Some(id), Some("4"), Some("o'neil")])),
        )
        .expect("push insert");
    }
    bulk.flush(&mut harness.handler, &mut connection)
        .expect("insert flush");
    bulk.push(
        &mut harness.handler,
        0,
        &Mutation::Delete(HostRow::from_texts([Some("20"), Some("4"), None])),
    )
    .expect("push delete");
    bulk.flush(&mut harness.handler, &mut connection)
        .expect("delete flush");

    harness
        .handler
        .append_update_range(
            0,
            &[(2, None)],
            None,
            Some(&Expr::compare(
                ComparisonOp::Lt,
                Expr::column(0),
                Expr::literal(Literal::Integer(4)),
            )),
            Page::new(1, Some(1)),
        )
        .expect("range update");
    harness
        .handler
        .exec_update(&mut connection)
        .expect("range update runs");

    let mut stage = BkaStage::new(&harness.handler, 1).expect("stage");
    stage
        .push_key(0, HostRow::from_texts([Some("2")]))
        .expect("push key");
    let mut scan = stage
        .open(&mut connection, 0, &[0], None, Page::new(0, Some(2)))
        .expect("join");
    while scan.next_row().expect("next row").is_some() {}
    scan.finish().expect("finish");

    let sent: Vec<String> = harness
        .remote
        .statements()
        .into_iter()
        .filter(|sql| {
            ["SELECT ", "INSERT ", "UPDATE ", "DELETE "]
                .iter()
                .any(|prefix| sql.starts_with(prefix))
        })
        .collect();
    assert!(sent.len() >= 5, "expected a full workload, got {sent:?}");
    for sql in &sent {
        parse_one(sql);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn string_literals_survive_quoting(text in "[a-zA-Z0-9 ']{0,24}") {
        let mut harness = Harness::load(NUMBERED_TABLE, "numbered");
        let handler = &mut harness.handler;
        handler.reset_select(0).expect("reset");
        handler.append_select_part(&[0]).expect("select list");
        let pushed = handler
            .append_condition(&Expr::compare(
                ComparisonOp::Eq,
                Expr::column(2),
                Expr::literal(Literal::String(text.clone())),
            ))
            .expect("condition");
        prop_assert!(pushed);

        let sql = harness.handler.sql().as_str().to_string();
        prop_assert_eq!(string_literals(&sql), vec![text]);
    }
}
