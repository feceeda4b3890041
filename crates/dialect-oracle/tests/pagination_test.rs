#[path = "support/remote_harness.rs"]
mod remote_harness;

use proptest::prelude::*;
use remote_harness::{Harness, NUMBERED_TABLE, fetch_all};
use tablelink_core::{Error, OrderKey, Page, SortOrder};

const ORDER: [OrderKey; 2] = [
    OrderKey {
        column: 1,
        order: SortOrder::Desc,
    },
    OrderKey {
        column: 0,
        order: SortOrder::Asc,
    },
];

fn ordered_rows(harness: &mut Harness, page: Page) -> Vec<Vec<Option<String>>> {
    let handler = &mut harness.handler;
    handler.reset_select(0).expect("reset");
    handler.append_select_part(&[]).expect("select list");
    handler.append_order_by(&ORDER).expect("order by");
    handler.append_limit(page).expect("limit");

    let mut connection = harness.connect(0);
    harness
        .handler
        .exec_select(&mut connection, 0)
        .expect("paginated select must run");
    fetch_all(&mut connection, 3)
}

fn expected_window(all: &[Vec<Option<String>>], page: Page) -> Vec<Vec<Option<String>>> {
    let start = usize::try_from(page.offset).expect("offset fits").min(all.len());
    let end = match page.limit {
        Some(limit) => start.saturating_add(usize::try_from(limit).expect("limit fits")),
        None => all.len(),
    }
    .min(all.len());
    all[start..end].to_vec()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn row_numbered_window_matches_slice_of_ordered_result(
        offset in 0u64..14,
        limit in proptest::option::of(0u64..14),
    ) {
        let mut harness = Harness::load(NUMBERED_TABLE, "numbered");
        let all = ordered_rows(&mut harness, Page::UNBOUNDED);
        prop_assert_eq!(all.len(), 11);

        let page = Page::new(offset, limit);
        let window = ordered_rows(&mut harness, page);
        prop_assert_eq!(window, expected_window(&all, page));
    }
}

#[test]
fn unbounded_select_is_not_wrapped() {
    let mut harness = Harness::load(NUMBERED_TABLE, "numbered");
    let rows = ordered_rows(&mut harness, Page::UNBOUNDED);

    assert!(!harness.handler.is_row_numbered());
    assert!(!harness.handler.sql().as_str().contains("ROW_NUMBER()"));
    assert_eq!(rows[0][0].as_deref(), Some("1"));
    assert_eq!(rows[0][1].as_deref(), Some("3"));
    assert_eq!(rows.last().expect("rows")[0].as_deref(), Some("10"));
}

#[test]
fn reappended_limit_moves_the_window_without_rebuilding_the_select() {
    let mut harness = Harness::load(NUMBERED_TABLE, "numbered");
    let first = ordered_rows(&mut harness, Page::new(0, Some(4)));
    let select_prefix = harness
        .handler
        .sql()
        .as_str()
        .split(" ) WHERE row_num")
        .next()
        .expect("row-numbered select")
        .to_string();

    harness
        .handler
        .reappend_limit(Page::new(4, Some(4)))
        .expect("reappend");
    assert!(harness.handler.sql().as_str().starts_with(&select_prefix));
    assert!(
        harness
            .handler
            .sql()
            .as_str()
            .ends_with(" ) WHERE row_num BETWEEN 5 AND 8")
    );

    let mut connection = harness.connect(0);
    harness
        .handler
        .exec_select(&mut connection, 0)
        .expect("second window");
    let second = fetch_all(&mut connection, 3);

    let mut both = first;
    both.extend(second);
    let all = ordered_rows(&mut harness, Page::UNBOUNDED);
    assert_eq!(both, all[..8].to_vec());
}

#[test]
fn scrollable_cursor_counts_then_repositions() {
    let mut harness = Harness::load(NUMBERED_TABLE, "numbered");
    let handler = &mut harness.handler;
    handler.reset_select(0).expect("reset");
    handler.append_select_part(&[0, 2]).expect("select list");
    handler.append_order_by(&[OrderKey::asc(0)]).expect("order by");

    let mut connection = harness.connect(0);
    harness
        .handler
        .exec_select_scrollable(&mut connection, 0)
        .expect("scrollable select");
    let mut cursor = connection.store_result().expect("result set");

    assert_eq!(cursor.num_rows().expect("count"), 11);
    let first = cursor.fetch_row().expect("fetch").expect("first row");
    assert_eq!(first.val_str(1).expect("text"), Some("alpha"));

    let sixth = cursor.move_to_pos(5).expect("reposition").expect("sixth row");
    assert_eq!(sixth.val_str(1).expect("text"), Some("foxtrot"));
    assert!(cursor.move_to_pos(11).expect("past the end").is_none());
    assert!(matches!(cursor.move_to_pos(u64::MAX), Err(Error::EndOfData)));
    let again = cursor.move_to_pos(0).expect("reposition").expect("first row");
    assert_eq!(again.val_str(1).expect("text"), Some("alpha"));
}

#[test]
fn forward_only_cursor_refuses_to_reposition() {
    let mut harness = Harness::load(NUMBERED_TABLE, "numbered");
    let handler = &mut harness.handler;
    handler.reset_select(0).expect("reset");
    handler.append_select_part(&[0]).expect("select list");

    let mut connection = harness.connect(0);
    harness
        .handler
        .exec_select(&mut connection, 0)
        .expect("select");
    let mut cursor = connection.store_result().expect("result set");
    let error = cursor.move_to_pos(2).expect_err("forward-only cursor");
    assert!(error.to_string().contains("not scrollable"));
}
