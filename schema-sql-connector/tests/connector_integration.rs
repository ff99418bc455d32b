use std::collections::{BTreeSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use schema_core::model::{DatabaseModel, FieldModel, ForeignKeyModel, RelationshipType, TableModel};
use schema_core::planner::{plan, ActionKind};
use schema_core::types::SqlType;
use schema_sql_connector::runner::{run, RunnerOptions};
use schema_sql_connector::SqlExecutor;

#[derive(Debug, thiserror::Error)]
#[error("recording executor error")]
struct RecordingExecutorError;

/// A standalone recording executor for these integration tests — the
/// crate's own `FakeSqlExecutor` fixture is test-only and not part of the
/// public API, so integration tests keep their own copy.
#[derive(Default)]
struct RecordingExecutor {
    statements: Mutex<Vec<String>>,
    existence_queue: Mutex<VecDeque<bool>>,
}

impl RecordingExecutor {
    fn new() -> Self {
        Self::default()
    }

    fn with_existence_responses(responses: Vec<bool>) -> Self {
        Self { statements: Mutex::new(Vec::new()), existence_queue: Mutex::new(responses.into()) }
    }

    fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }
}

#[async_trait]
impl SqlExecutor for RecordingExecutor {
    type Error = RecordingExecutorError;

    async fn execute(&self, sql: &str) -> Result<(), Self::Error> {
        self.statements.lock().unwrap().push(sql.to_string());
        Ok(())
    }

    async fn query_scalar(&self, sql: &str) -> Result<Option<String>, Self::Error> {
        self.statements.lock().unwrap().push(sql.to_string());
        Ok(None)
    }

    async fn query_exists(&self, sql: &str) -> Result<bool, Self::Error> {
        self.statements.lock().unwrap().push(sql.to_string());
        Ok(self.existence_queue.lock().unwrap().pop_front().unwrap_or(false))
    }
}

fn pk(table: &str) -> FieldModel {
    FieldModel {
        name: format!("{table}ID"),
        sql_type: SqlType::Int,
        is_nullable: false,
        is_primary_key: true,
        is_identity: true,
        is_optional: false,
        precision: None,
        scale: None,
        attributes: BTreeSet::new(),
        raw_type: None,
    }
}

/// Scenario 4 end-to-end: plan a brand-new FK relationship against two
/// already-existing tables, then run the plan and assert the FK constraint
/// statement and its companion index both went out, in that order.
#[tokio::test]
async fn fk_relation_is_planned_then_executed_with_companion_index() {
    let mut target = DatabaseModel::new();
    let mut user = TableModel::new("User");
    user.fields.push(pk("User"));
    target.insert_table(user);
    let mut order = TableModel::new("Order");
    order.fields.push(pk("Order"));
    order.fields.push(FieldModel {
        name: "UserID".into(),
        sql_type: SqlType::Int,
        is_nullable: false,
        is_primary_key: false,
        is_identity: false,
        is_optional: false,
        precision: None,
        scale: None,
        attributes: BTreeSet::new(),
        raw_type: None,
    });
    order.foreign_keys.push(ForeignKeyModel {
        column: "UserID".into(),
        target_table: "User".into(),
        target_column: "UserID".into(),
        is_nullable: false,
        relationship: RelationshipType::OneToOne,
    });
    target.insert_table(order);

    let mut actual = DatabaseModel::new();
    let mut user_a = TableModel::new("User");
    user_a.fields.push(pk("User"));
    actual.insert_table(user_a);
    let mut order_a = TableModel::new("Order");
    order_a.fields.push(pk("Order"));
    order_a.fields.push(FieldModel {
        name: "UserID".into(),
        sql_type: SqlType::Int,
        is_nullable: false,
        is_primary_key: false,
        is_identity: false,
        is_optional: false,
        precision: None,
        scale: None,
        attributes: BTreeSet::new(),
        raw_type: None,
    });
    actual.insert_table(order_a);

    let migration_plan = plan(&target, &actual);
    assert_eq!(migration_plan.steps.iter().map(|s| s.kind()).collect::<Vec<_>>(), vec![ActionKind::AddForeignKey]);

    let executor = RecordingExecutor::new();
    let report = run(&executor, &migration_plan, &RunnerOptions::default(), None).await;
    assert_eq!(report.applied.len(), 1);
    let statements = executor.statements();
    assert!(statements[0].contains("ADD CONSTRAINT [FK_Order_UserID]"));
    assert!(statements[1].contains("CHECK CONSTRAINT [FK_Order_UserID]"));
    assert!(statements[2].contains("CREATE NONCLUSTERED INDEX [IX_Order_UserID]"));
}

/// Scenario 3 end-to-end: a narrowing alter gated by `@reducesize` probes
/// the live data and is skipped, never reaching the executor as an ALTER.
#[tokio::test]
async fn unsafe_narrow_is_planned_but_skipped_at_run_time() {
    let mut target = DatabaseModel::new();
    let mut user = TableModel::new("User");
    user.fields.push(pk("User"));
    user.fields.push(FieldModel {
        name: "Username".into(),
        sql_type: SqlType::NVarChar,
        is_nullable: true,
        is_primary_key: false,
        is_identity: false,
        is_optional: false,
        precision: Some(60),
        scale: None,
        attributes: ["reducesize".to_string()].into_iter().collect(),
        raw_type: None,
    });
    target.insert_table(user);

    let mut actual = DatabaseModel::new();
    let mut user_a = TableModel::new("User");
    user_a.fields.push(pk("User"));
    user_a.fields.push(FieldModel {
        name: "Username".into(),
        sql_type: SqlType::NVarChar,
        is_nullable: true,
        is_primary_key: false,
        is_identity: false,
        is_optional: false,
        precision: Some(80),
        scale: None,
        attributes: BTreeSet::new(),
        raw_type: None,
    });
    actual.insert_table(user_a);

    let migration_plan = plan(&target, &actual);
    assert_eq!(migration_plan.steps.len(), 1);

    let executor = RecordingExecutor::with_existence_responses(vec![true]);
    let report = run(&executor, &migration_plan, &RunnerOptions::default(), None).await;
    assert!(report.applied.is_empty());
    assert_eq!(report.skipped.len(), 1);
    assert!(!executor.statements().iter().any(|s| s.starts_with("ALTER TABLE")));
}
