//! Universal properties spanning the router and both storage engines:
//! schema/row round-trip, predicate soundness/completeness, projection
//! correctness, classification determinism, sync monotonicity, read-only
//! replica, and idempotent reopen.

use std::path::Path;
use std::time::Duration;

use dualstore_router::{classify, Classification, Router};
use dualstore_sql::parser::{Equality, Predicate};
use dualstore_sql::storage::{Storage, StorageError};
use dualstore_sql::value::{Column, ColumnType, Row, Scalar, Schema};

fn users_schema() -> Schema {
    Schema::new(
        "users".to_string(),
        vec![
            Column::new("id".to_string(), ColumnType::Int, true),
            Column::new("name".to_string(), ColumnType::String, true),
        ],
    )
}

fn user_row(id: i64, name: &str) -> Row {
    let mut row = Row::new();
    row.insert("id", Scalar::Int(id));
    row.insert("name", Scalar::Str(name.to_string()));
    row
}

async fn router(dir: &Path) -> std::sync::Arc<Router> {
    let primary = dualstore_oltp::OltpEngine::open(dir.join("db.bin")).unwrap();
    let replica = dualstore_olap::OlapReplica::open(dir.join("replica")).unwrap();
    Router::new(primary, replica, Duration::from_secs(300))
}

#[tokio::test]
async fn schema_round_trips_through_close_and_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.bin");

    let mut engine = dualstore_oltp::OltpEngine::open(&path).unwrap();
    engine.create_table(users_schema()).unwrap();
    engine.close().unwrap();

    let engine = dualstore_oltp::OltpEngine::open(&path).unwrap();
    assert_eq!(engine.get_schema("users").unwrap(), users_schema());
}

#[tokio::test]
async fn row_round_trips_through_select_star() {
    let dir = tempfile::tempdir().unwrap();
    let router = router(dir.path()).await;
    router.create_table(users_schema()).await.unwrap();
    router.insert("users", user_row(1, "John")).await.unwrap();

    let rows = router
        .select("users", &users_schema().column_names(), &Predicate::default())
        .await
        .unwrap();
    assert!(rows.contains(&user_row(1, "John")));
}

#[tokio::test]
async fn predicate_soundness_and_completeness() {
    let dir = tempfile::tempdir().unwrap();
    let router = router(dir.path()).await;
    router.create_table(users_schema()).await.unwrap();
    router.insert("users", user_row(1, "John")).await.unwrap();
    router.insert("users", user_row(2, "Jane")).await.unwrap();

    let predicate = Predicate(vec![Equality {
        column: "id".to_string(),
        value: Scalar::Int(1),
    }]);
    let rows = router
        .select("users", &users_schema().column_names(), &predicate)
        .await
        .unwrap();

    assert!(rows.contains(&user_row(1, "John")), "completeness: matching row must appear");
    assert!(!rows.contains(&user_row(2, "Jane")), "soundness: non-matching row must not appear");
}

#[tokio::test]
async fn projection_returns_exactly_the_requested_columns() {
    let dir = tempfile::tempdir().unwrap();
    let router = router(dir.path()).await;
    router.create_table(users_schema()).await.unwrap();
    router.insert("users", user_row(1, "John")).await.unwrap();

    let rows = router
        .select("users", &["name".to_string()], &Predicate::default())
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    let keys: Vec<_> = rows[0].0.keys().cloned().collect();
    assert_eq!(keys, vec!["name".to_string()]);
}

#[test]
fn classifier_is_deterministic_and_matches_the_seeded_cases() {
    let id_name = vec!["id".to_string(), "name".to_string()];
    let name_only = vec!["name".to_string()];
    let id_only = vec!["id".to_string()];
    let id_pred = Predicate(vec![Equality { column: "id".to_string(), value: Scalar::Int(1) }]);
    let name_pred = Predicate(vec![Equality {
        column: "name".to_string(),
        value: Scalar::Str("x".to_string()),
    }]);

    assert_eq!(classify(&id_name, &id_pred), Classification::Oltp);
    assert_eq!(classify(&["*".to_string()], &id_pred), Classification::Olap);
    assert_eq!(classify(&name_only, &name_pred), Classification::Olap);
    assert_eq!(classify(&id_only, &Predicate::default()), Classification::Olap);

    // Repeated calls with identical inputs must agree.
    for _ in 0..5 {
        assert_eq!(classify(&id_name, &id_pred), Classification::Oltp);
    }
}

#[tokio::test]
async fn two_syncs_with_no_intervening_writes_produce_identical_replica_rows() {
    let dir = tempfile::tempdir().unwrap();
    let router = router(dir.path()).await;
    router.create_table(users_schema()).await.unwrap();
    router.insert("users", user_row(1, "John")).await.unwrap();
    router.insert("users", user_row(2, "Jane")).await.unwrap();

    router.sync_now().await.unwrap();
    let replica_path = dir.path().join("replica").join("users.parquet");
    let first = std::fs::read_to_string(&replica_path).unwrap();

    router.sync_now().await.unwrap();
    let second = std::fs::read_to_string(&replica_path).unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn replica_row_mutations_always_fail_read_only() {
    let dir = tempfile::tempdir().unwrap();
    let router = router(dir.path()).await;
    router.create_table(users_schema()).await.unwrap();
    router.insert("users", user_row(1, "John")).await.unwrap();
    router.sync_now().await.unwrap();

    let mut replica = dualstore_olap::OlapReplica::open(dir.path().join("replica")).unwrap();
    assert!(matches!(replica.insert("users", user_row(2, "Jane")), Err(StorageError::ReadOnly)));
    assert!(matches!(
        replica.update(
            "users",
            &[],
            &Predicate(vec![Equality { column: "id".to_string(), value: Scalar::Int(1) }])
        ),
        Err(StorageError::ReadOnly)
    ));
    assert!(matches!(
        replica.delete(
            "users",
            &Predicate(vec![Equality { column: "id".to_string(), value: Scalar::Int(1) }])
        ),
        Err(StorageError::ReadOnly)
    ));
}

#[tokio::test]
async fn reopening_the_primary_preserves_tables_and_row_multisets() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.bin");

    let mut engine = dualstore_oltp::OltpEngine::open(&path).unwrap();
    engine.create_table(users_schema()).unwrap();
    engine.insert("users", user_row(1, "John")).unwrap();
    engine.insert("users", user_row(2, "Jane")).unwrap();
    engine.close().unwrap();

    let engine = dualstore_oltp::OltpEngine::open(&path).unwrap();
    assert_eq!(engine.show_tables().unwrap(), vec!["users".to_string()]);
    let mut rows = engine
        .select("users", &users_schema().column_names(), &Predicate::default())
        .unwrap();
    rows.sort_by_key(|r| match r.get("id") {
        Some(Scalar::Int(n)) => *n,
        _ => 0,
    });
    assert_eq!(rows, vec![user_row(1, "John"), user_row(2, "Jane")]);
}

#[tokio::test]
async fn select_star_falls_back_to_replica_when_primary_has_no_record_of_the_table() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("db.bin");
    let replica_path = dir.path().join("replica");

    {
        let router = router(dir.path()).await;
        router.create_table(users_schema()).await.unwrap();
        router.insert("users", user_row(1, "John")).await.unwrap();
        router.insert("users", user_row(2, "Jane")).await.unwrap();
        router.sync_now().await.unwrap();
        router.close().await.unwrap();
    }

    // Simulate a fresh process whose primary file was lost: a brand-new,
    // schema-less primary paired with the replica directory that already
    // has `users` from the prior sync.
    std::fs::remove_file(&db_path).unwrap();
    let primary = dualstore_oltp::OltpEngine::open(&db_path).unwrap();
    let replica = dualstore_olap::OlapReplica::open(&replica_path).unwrap();
    let router = Router::new(primary, replica, Duration::from_secs(300));

    let rows = router
        .select("users", &["*".to_string()], &Predicate::default())
        .await
        .unwrap();
    let mut rows = rows;
    rows.sort_by_key(|r| match r.get("id") {
        Some(Scalar::Int(n)) => *n,
        _ => 0,
    });
    assert_eq!(rows, vec![user_row(1, "John"), user_row(2, "Jane")]);
}
