//! MERGE against a live PostgreSQL server.
//!
//! Set `OXIDE_BULK_TEST_DATABASE_URL` to run these. Skipped on servers
//! older than PostgreSQL 15.

mod common;
use common::*;

use oxide_bulk::{
    BulkExecutor, MergeAction, MergeChain, MergeOutcome, MergeSpec, OperationSpec, Returning,
    SqlValue,
};
use sqlx::PgConnection;

async fn seeded() -> Option<(PgConnection, BulkExecutor)> {
    let mut conn = connect().await?;
    let executor = executor(&mut conn).await;
    if executor.config().server_version < 150_000 {
        eprintln!("MERGE needs PostgreSQL 15, skipping");
        return None;
    }
    create_items(&mut conn).await;
    executor
        .upsert(
            &mut conn,
            &items(),
            &[item("A", "1.00", 1), item("B", "2.00", 2)],
            &OperationSpec::matching(&["sku"]),
        )
        .await
        .unwrap();
    Some((conn, executor))
}

fn batch() -> Vec<oxide_bulk::Row> {
    vec![item("A", "1.00", 0), item("B", "2.00", 7), item("C", "3.00", 3)]
}

#[tokio::test]
async fn test_merge_first_matching_clause_wins() {
    let Some((mut conn, executor)) = seeded().await else {
        return;
    };
    let chain = MergeChain::new()
        .matched_and("source.\"qty\" = 0", MergeAction::Delete)
        .matched(MergeAction::update())
        .not_matched(MergeAction::insert());

    let result = executor
        .merge(&mut conn, &items(), &batch(), &MergeSpec::matching(&["sku"]), &chain)
        .await
        .unwrap();

    assert_eq!(result.affected, 3);
    assert_eq!(
        snapshot(&mut conn).await,
        vec![
            ("B".to_string(), "2.00".to_string(), Some(7)),
            ("C".to_string(), "3.00".to_string(), Some(3)),
        ]
    );
}

#[tokio::test]
async fn test_merge_reversed_clauses_change_the_outcome() {
    let Some((mut conn, executor)) = seeded().await else {
        return;
    };
    let chain = MergeChain::new()
        .matched_and("source.\"qty\" >= 0", MergeAction::update())
        .matched_and("source.\"qty\" = 0", MergeAction::Delete)
        .not_matched(MergeAction::insert());

    executor
        .merge(&mut conn, &items(), &batch(), &MergeSpec::matching(&["sku"]), &chain)
        .await
        .unwrap();
    let update_first = snapshot(&mut conn).await;

    let Some((mut conn, executor)) = seeded().await else {
        return;
    };
    let reversed = MergeChain::new()
        .matched_and("source.\"qty\" = 0", MergeAction::Delete)
        .matched_and("source.\"qty\" >= 0", MergeAction::update())
        .not_matched(MergeAction::insert());

    executor
        .merge(&mut conn, &items(), &batch(), &MergeSpec::matching(&["sku"]), &reversed)
        .await
        .unwrap();
    let delete_first = snapshot(&mut conn).await;

    assert_eq!(
        update_first,
        vec![
            ("A".to_string(), "1.00".to_string(), Some(0)),
            ("B".to_string(), "2.00".to_string(), Some(7)),
            ("C".to_string(), "3.00".to_string(), Some(3)),
        ]
    );
    assert_eq!(
        delete_first,
        vec![
            ("B".to_string(), "2.00".to_string(), Some(7)),
            ("C".to_string(), "3.00".to_string(), Some(3)),
        ]
    );
}

#[tokio::test]
async fn test_merge_change_predicate_skips_identical_rows() {
    let Some((mut conn, executor)) = seeded().await else {
        return;
    };
    let table = items();
    let predicate = executor
        .compiler(&table)
        .changed_predicate(&["price", "qty"])
        .unwrap();
    let chain = MergeChain::new().matched_and(predicate, MergeAction::update());
    let rows = vec![item("A", "1.00", 1), item("B", "2.00", 5)];

    let result = executor
        .merge(&mut conn, &table, &rows, &MergeSpec::matching(&["sku"]), &chain)
        .await
        .unwrap();

    assert_eq!(result.affected, 1);
}

#[tokio::test]
async fn test_merge_returning_reports_actions() {
    let Some((mut conn, executor)) = seeded().await else {
        return;
    };
    if executor.config().server_version < 170_000 {
        eprintln!("MERGE RETURNING needs PostgreSQL 17, skipping");
        return;
    }
    let spec = MergeSpec::matching(&["sku"]).returning(Returning::Columns(vec!["sku".into()]));
    let chain = MergeChain::new()
        .matched_and("source.\"qty\" = 0", MergeAction::Delete)
        .matched(MergeAction::update())
        .not_matched(MergeAction::insert());

    let result = executor
        .merge(&mut conn, &items(), &batch(), &spec, &chain)
        .await
        .unwrap();

    let sku = |outcome: MergeOutcome| -> Vec<SqlValue> {
        result
            .rows
            .iter()
            .filter(|row| row.outcome == outcome)
            .filter_map(|row| row.values.get("sku").cloned())
            .collect()
    };
    assert_eq!(sku(MergeOutcome::Deleted), vec![SqlValue::Text("A".into())]);
    assert_eq!(sku(MergeOutcome::Updated), vec![SqlValue::Text("B".into())]);
    assert_eq!(sku(MergeOutcome::Inserted), vec![SqlValue::Text("C".into())]);
    assert_eq!(result.created().count(), 1);
    assert_eq!(result.deleted().count(), 1);
}

#[tokio::test]
async fn test_merge_not_matched_by_source_deletes_missing_rows() {
    let Some((mut conn, executor)) = seeded().await else {
        return;
    };
    if executor.config().server_version < 170_000 {
        eprintln!("NOT MATCHED BY SOURCE needs PostgreSQL 17, skipping");
        return;
    }
    let chain = MergeChain::new()
        .matched(MergeAction::update())
        .not_matched_by_source(MergeAction::Delete);

    executor
        .merge(
            &mut conn,
            &items(),
            &[item("B", "2.50", 2)],
            &MergeSpec::matching(&["sku"]),
            &chain,
        )
        .await
        .unwrap();

    assert_eq!(
        snapshot(&mut conn).await,
        vec![("B".to_string(), "2.50".to_string(), Some(2))]
    );
}
