#[path = "support/remote_harness.rs"]
mod remote_harness;

use std::{sync::Arc, time::Duration};

use remote_harness::{Harness, NUMBERED_TABLE, fetch_all};
use tablelink_core::{Error, TableLockMode, TimeoutSource, Timeouts, host_codes};
use tablelink_dialect_oracle::{
    ConnectParams, Connection, Isolation, LinkConnections, NativeClient, SessionState,
};

const SELECT_NAMES: &str = "SELECT \"name\" FROM \"main\".\"T\" WHERE \"id\" <= 2 ORDER BY \"id\"";
const END_OF_FILE: i32 = 3113;
const RESOURCE_BUSY: i32 = 54;

#[test]
fn connect_opens_six_handles_and_disconnect_frees_them() {
    let harness = Harness::load(NUMBERED_TABLE, "numbered");
    let mut connection = harness.connect(0);

    assert_eq!(connection.state(), SessionState::Connected);
    assert_eq!(harness.remote.open_handles(), 6);
    assert_eq!(
        harness.remote.statements_starting_with("ALTER SESSION SET NLS").len(),
        3
    );

    connection.disconnect().expect("disconnect");
    assert_eq!(connection.state(), SessionState::Disconnected);
    assert_eq!(harness.remote.open_handles(), 0);
}

#[test]
fn failed_attach_is_retried_then_reported_as_connect_error() {
    let harness = Harness::load(NUMBERED_TABLE, "numbered");
    let mut config = harness.config.clone();
    config.connect_retry_count = 1;
    harness.remote.fail_attach(12541, "TNS:no listener");
    harness.remote.fail_attach(12541, "TNS:no listener");

    let client: Arc<dyn NativeClient> = harness.remote.clone();
    let params = ConnectParams::from_config(&config, 0, TimeoutSource::default()).expect("params");
    let mut connection = Connection::new(client, params);
    let error = connection.connect().expect_err("both attempts fail");

    assert!(error.is_connection_gone());
    assert_eq!(harness.remote.attach_count(), 2);
    assert_eq!(connection.state(), SessionState::Disconnected);
    assert!(connection.last_error().is_some_and(|message| message.contains("no listener")));
    assert_eq!(harness.remote.open_handles(), 0, "partial handles are released");

    connection.connect().expect("third attempt succeeds");
    assert_eq!(harness.remote.attach_count(), 3);
}

#[test]
fn refused_logon_maps_to_the_connect_host_code() {
    let harness = Harness::load(NUMBERED_TABLE, "numbered");
    let mut config = harness.config.clone();
    config.links[0].user.clear();

    let client: Arc<dyn NativeClient> = harness.remote.clone();
    let params = ConnectParams::from_config(&config, 0, TimeoutSource::default()).expect("params");
    let mut connection = Connection::new(client, params);
    let error = connection.connect().expect_err("empty user is refused");

    assert_eq!(error.host_code(), host_codes::ER_ACCESS_DENIED);
    assert_eq!(harness.remote.open_handles(), 0);
}

#[test]
fn lost_read_is_resent_exactly_once() {
    let harness = Harness::load(NUMBERED_TABLE, "numbered");
    let mut connection = harness.connect(0);
    harness
        .remote
        .fail_execute(SELECT_NAMES, END_OF_FILE, "end-of-file on communication channel");

    connection.exec_query(SELECT_NAMES).expect("resend succeeds");
    let rows = fetch_all(&mut connection, 1);

    assert_eq!(
        rows,
        vec![vec![Some("alpha".to_string())], vec![Some("bravo".to_string())]]
    );
    assert_eq!(connection.reconnect_count(), 1);
    assert_eq!(harness.remote.attach_count(), 2);
    assert_eq!(harness.remote.statements_starting_with(SELECT_NAMES).len(), 2);
}

#[test]
fn second_loss_during_resend_is_surfaced() {
    let harness = Harness::load(NUMBERED_TABLE, "numbered");
    let mut connection = harness.connect(0);
    for _ in 0..2 {
        harness
            .remote
            .fail_execute(SELECT_NAMES, END_OF_FILE, "end-of-file on communication channel");
    }

    let error = connection.exec_query(SELECT_NAMES).expect_err("resend fails too");

    assert!(matches!(error, Error::ConnectionGone { native_code: END_OF_FILE, .. }));
    assert_eq!(harness.remote.statements_starting_with(SELECT_NAMES).len(), 2);
    assert_eq!(connection.reconnect_count(), 1);
    assert_eq!(connection.state(), SessionState::Disconnected);
}

#[test]
fn lost_write_is_never_resent() {
    let harness = Harness::load(NUMBERED_TABLE, "numbered");
    let mut connection = harness.connect(0);
    let update = "UPDATE \"main\".\"T\" SET \"grp\" = 0 WHERE \"id\" = 1";
    harness
        .remote
        .fail_execute(update, END_OF_FILE, "end-of-file on communication channel");

    let error = connection.exec_query(update).expect_err("write surfaces the loss");
    assert!(error.is_connection_gone());
    assert_eq!(harness.remote.statements_starting_with(update).len(), 1);
    assert_eq!(connection.reconnect_count(), 0);

    connection.exec_query(update).expect("next statement reconnects");
    assert_eq!(connection.affected_rows(), 1);
}

#[test]
fn severed_session_is_replaced_on_the_next_read() {
    let harness = Harness::load(NUMBERED_TABLE, "numbered");
    let mut connection = harness.connect(0);
    harness.remote.sever_sessions();

    connection.exec_query(SELECT_NAMES).expect("read reconnects");
    assert_eq!(fetch_all(&mut connection, 1).len(), 2);
    assert_eq!(connection.reconnect_count(), 1);
}

#[test]
fn ordinary_remote_errors_are_not_retried() {
    let harness = Harness::load(NUMBERED_TABLE, "numbered");
    let mut connection = harness.connect(0);

    let error = connection
        .exec_query("SELECT \"id\" FROM \"main\".\"missing\"")
        .expect_err("missing table");

    assert_eq!(error.host_code(), host_codes::ER_NO_SUCH_TABLE);
    assert_eq!(connection.reconnect_count(), 0);
    assert_eq!(connection.state(), SessionState::Connected);
}

#[test]
fn repeated_locks_collapse_into_one_statement_at_the_strongest_mode() {
    let harness = Harness::load(NUMBERED_TABLE, "numbered");
    let mut connection = harness.connect(0);
    for mode in [
        TableLockMode::Read,
        TableLockMode::Write,
        TableLockMode::ReadLocal,
        TableLockMode::Write,
    ] {
        harness
            .handler
            .lock_table(&mut connection, 0, mode)
            .expect("queue lock");
    }
    assert_eq!(connection.pending_lock_count(), 1);

    connection.exec_query(SELECT_NAMES).expect("first statement");
    connection.exec_query(SELECT_NAMES).expect("second statement");

    assert_eq!(
        harness.remote.statements_starting_with("LOCK TABLE"),
        vec!["LOCK TABLE \"main\".\"T\" IN EXCLUSIVE MODE".to_string()]
    );
    assert!(connection.is_table_locked());

    connection.unlock_tables().expect("unlock");
    assert!(!connection.is_table_locked());
    assert_eq!(connection.pending_lock_count(), 0);
}

#[test]
fn refused_table_lock_stays_queued_and_is_reissued() {
    let harness = Harness::load(NUMBERED_TABLE, "numbered");
    let mut connection = harness.connect(0);
    harness
        .handler
        .lock_table(&mut connection, 0, TableLockMode::Write)
        .expect("queue lock");
    harness
        .remote
        .fail_execute("LOCK TABLE", RESOURCE_BUSY, "resource busy and acquire with NOWAIT");

    connection
        .exec_query(SELECT_NAMES)
        .expect_err("lock refused");
    assert!(!connection.is_table_locked());
    assert_eq!(connection.pending_lock_count(), 1);

    connection.exec_query(SELECT_NAMES).expect("lock granted");
    assert_eq!(fetch_all(&mut connection, 1).len(), 2);
    assert_eq!(
        harness.remote.statements_starting_with("LOCK TABLE"),
        vec![
            "LOCK TABLE \"main\".\"T\" IN EXCLUSIVE MODE".to_string(),
            "LOCK TABLE \"main\".\"T\" IN EXCLUSIVE MODE".to_string(),
        ]
    );
    assert!(connection.is_table_locked());
    assert_eq!(connection.pending_lock_count(), 0);
}

#[test]
fn isolation_is_sent_once_per_level_and_forgotten_on_reconnect() {
    let harness = Harness::load(NUMBERED_TABLE, "numbered");
    let mut connection = harness.connect(0);

    connection.set_isolation(Isolation::RepeatableRead).expect("isolation");
    connection.set_isolation(Isolation::Serializable).expect("same remote level");
    connection.set_isolation(Isolation::ReadCommitted).expect("isolation");
    connection.disconnect().expect("disconnect");
    connection.set_isolation(Isolation::ReadCommitted).expect("isolation");

    assert_eq!(
        harness
            .remote
            .statements_starting_with("ALTER SESSION SET ISOLATION_LEVEL"),
        vec![
            "ALTER SESSION SET ISOLATION_LEVEL = SERIALIZABLE".to_string(),
            "ALTER SESSION SET ISOLATION_LEVEL = READ COMMITTED".to_string(),
            "ALTER SESSION SET ISOLATION_LEVEL = READ COMMITTED".to_string(),
        ]
    );
}

#[test]
fn statements_use_the_timeout_for_their_kind() {
    let harness = Harness::load(NUMBERED_TABLE, "numbered");
    let client: Arc<dyn NativeClient> = harness.remote.clone();
    let timeouts = TimeoutSource::new(Timeouts {
        connect_secs: 2,
        read_secs: 30,
        write_secs: 45,
    });
    let params =
        ConnectParams::from_config(&harness.config, 0, timeouts.clone()).expect("params");
    let mut connection = Connection::new(client, params);

    connection.connect().expect("connect");
    assert_eq!(harness.remote.last_call_timeout(), Some(Duration::from_secs(2)));
    connection.exec_query(SELECT_NAMES).expect("read");
    assert_eq!(harness.remote.last_call_timeout(), Some(Duration::from_secs(30)));

    timeouts.set(Timeouts {
        connect_secs: 2,
        read_secs: 30,
        write_secs: 5,
    });
    connection
        .exec_query("DELETE FROM \"main\".\"T\" WHERE \"id\" = 11")
        .expect("write");
    assert_eq!(harness.remote.last_call_timeout(), Some(Duration::from_secs(5)));
}

#[test]
fn dropped_transaction_rolls_back() {
    let harness = Harness::load(NUMBERED_TABLE, "numbered");
    let mut connection = harness.connect(0);
    {
        let mut transaction = connection.begin_transaction().expect("begin");
        transaction
            .connection()
            .exec_query("DELETE FROM \"main\".\"T\"")
            .expect("delete inside transaction");
    }
    assert!(!harness.remote.in_transaction());
    assert_eq!(harness.remote.query("SELECT * FROM \"T\"").expect("count").len(), 11);

    let mut transaction = connection.begin_transaction().expect("begin");
    transaction
        .connection()
        .exec_query("DELETE FROM \"main\".\"T\" WHERE \"id\" > 5")
        .expect("delete inside transaction");
    transaction.commit().expect("commit");
    assert_eq!(harness.remote.query("SELECT * FROM \"T\"").expect("count").len(), 5);
    assert_eq!(harness.remote.open_handles(), 6, "transaction handles are freed");
}

#[test]
fn background_connect_is_awaited_by_the_first_statement() {
    let harness = Harness::load(NUMBERED_TABLE, "numbered");
    let client: Arc<dyn NativeClient> = harness.remote.clone();
    let params =
        ConnectParams::from_config(&harness.config, 0, TimeoutSource::default()).expect("params");
    let mut connection = Connection::new(client, params);

    connection.bg_connect().expect("submit connect");
    connection.exec_query(SELECT_NAMES).expect("read after background connect");
    assert_eq!(connection.state(), SessionState::Connected);
    assert_eq!(fetch_all(&mut connection, 1).len(), 2);

    connection.bg_disconnect().expect("submit disconnect");
    drop(connection);
    assert_eq!(harness.remote.open_handles(), 0);
}

#[test]
fn link_connections_open_lazily_and_reopen_after_close() {
    let harness = Harness::load(NUMBERED_TABLE, "numbered");
    let mut links = LinkConnections::new(harness.remote.clone(), harness.config.clone());

    let first = links.get(0).expect("link 0");
    assert!(first.ptr_eq(&links.get(0).expect("link 0 again")));
    assert_eq!(harness.remote.attach_count(), 0);

    first.lock().exec_query(SELECT_NAMES).expect("lazy connect");
    assert_eq!(harness.remote.attach_count(), 1);

    links.close(0).expect("close");
    let second = links.get(0).expect("link 0 reopened");
    assert!(!first.ptr_eq(&second));
    assert!(links.get(1).is_err());
}
