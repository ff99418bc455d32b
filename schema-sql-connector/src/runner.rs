//! The migration runner (§4.6): translates each [`MigrationStep`] into SQL,
//! runs the data-loss safety probe ahead of narrowing alters, and executes
//! best-effort — a single step's failure never aborts the run.

use std::collections::BTreeMap;

use schema_core::planner::{ActionKind, MigrationPlan, MigrationStep};

use crate::dialect;
use crate::executor::SqlExecutor;
use crate::naming::index_name;
use crate::safety;

#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Overrides every field's `@allowdataloss` gate at once, the way the
    /// teacher's migration engine exposes a force/accept-data-loss flag at
    /// the call boundary rather than only per-field in the DSL.
    pub allow_data_loss_override: bool,
    pub schema: String,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self { allow_data_loss_override: false, schema: "dbo".to_string() }
    }
}

#[derive(Debug, Clone)]
pub struct StepFailure {
    pub step: MigrationStep,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub applied: Vec<MigrationStep>,
    /// Steps that hit a data-safety skip (§7: "not an error").
    pub skipped: Vec<MigrationStep>,
    pub failures: Vec<StepFailure>,
}

impl RunReport {
    pub fn is_up_to_date(&self) -> bool {
        self.applied.is_empty() && self.skipped.is_empty() && self.failures.is_empty()
    }

    /// Count of applied steps per action (§7: "a count per action").
    pub fn summary(&self) -> BTreeMap<ActionKind, usize> {
        let mut counts = BTreeMap::new();
        for step in &self.applied {
            *counts.entry(step.kind()).or_insert(0) += 1;
        }
        counts
    }
}

async fn execute_all<E: SqlExecutor>(executor: &E, statements: &[String]) -> Result<(), E::Error> {
    for sql in statements {
        executor.execute(sql).await?;
    }
    Ok(())
}

/// Runs `plan` against `executor`, checking `cancel` (if given) after every
/// step. Already-applied steps stay applied if cancellation or a failure
/// stops the run partway through (§5).
#[tracing::instrument(skip_all, fields(schema = %options.schema))]
pub async fn run<E: SqlExecutor>(
    executor: &E,
    plan: &MigrationPlan,
    options: &RunnerOptions,
    cancel: Option<&dyn Fn() -> bool>,
) -> RunReport {
    let mut report = RunReport::default();

    for step in &plan.steps {
        if let Some(cancel) = cancel {
            if cancel() {
                tracing::info!("run cancelled, stopping before next step");
                break;
            }
        }

        let outcome = run_step(executor, &options.schema, step, options.allow_data_loss_override).await;
        match outcome {
            StepOutcome::Applied => report.applied.push(step.clone()),
            StepOutcome::Skipped => report.skipped.push(step.clone()),
            StepOutcome::Failed(error) => {
                tracing::error!(table = step.table(), kind = ?step.kind(), %error, "step failed");
                report.failures.push(StepFailure { step: step.clone(), error });
            }
        }
    }

    report
}

enum StepOutcome {
    Applied,
    Skipped,
    Failed(String),
}

async fn run_step<E: SqlExecutor>(executor: &E, schema: &str, step: &MigrationStep, allow_data_loss_override: bool) -> StepOutcome {
    match step {
        MigrationStep::CreateTable { table, fields } => {
            let sql = dialect::create_table_sql(schema, table, fields);
            to_outcome(executor.execute(&sql).await)
        }
        MigrationStep::AddColumn { table, field } => {
            let statements = dialect::add_column_sql(schema, table, field);
            to_outcome(execute_all(executor, &statements).await)
        }
        MigrationStep::AlterColumn { table, field } => run_alter_column(executor, schema, table, field, allow_data_loss_override).await,
        MigrationStep::AddForeignKey { table, fk } => {
            let mut statements = dialect::add_foreign_key_sql(schema, table, fk);
            let index = dialect::fk_auto_index(fk);
            let name = index_name(table, &index.fields, index.is_alternate_key);
            statements.push(dialect::add_index_sql(schema, table, &index, &name));
            to_outcome(execute_all(executor, &statements).await)
        }
        MigrationStep::AddIndex { table, index } => {
            let name = index.name.clone().unwrap_or_else(|| index_name(table, &index.fields, index.is_alternate_key));
            let sql = dialect::add_index_sql(schema, table, index, &name);
            to_outcome(executor.execute(&sql).await)
        }
    }
}

/// §4.6.1 / §4.6.3: a narrowing alter is probed first. `@allowdataloss` (or
/// the runner-level override) skips the probe and instead truncates values
/// in place before altering; plain `@reducesize` probes and, if unsafe,
/// skips the alter entirely rather than attempting and failing it (per the
/// concrete scenario in §8: "alter is skipped; CHARACTER_MAXIMUM_LENGTH
/// remains the original value").
async fn run_alter_column<E: SqlExecutor>(
    executor: &E,
    schema: &str,
    table: &str,
    field: &schema_core::model::FieldModel,
    allow_data_loss_override: bool,
) -> StepOutcome {
    let allow_data_loss = allow_data_loss_override || field.has_attribute("allowdataloss");

    if allow_data_loss {
        let update = safety::truncating_update_sql(schema, table, field);
        let alter = dialect::alter_column_sql(schema, table, field);
        return to_outcome(execute_all(executor, &[update, alter]).await);
    }

    match safety::is_narrowing_safe(executor, schema, table, field).await {
        Ok(true) => {
            let alter = dialect::alter_column_sql(schema, table, field);
            to_outcome(executor.execute(&alter).await)
        }
        Ok(false) => {
            tracing::warn!(table, column = %field.name, "data-safety probe found violating rows, skipping ALTER");
            StepOutcome::Skipped
        }
        Err(error) => StepOutcome::Failed(error.to_string()),
    }
}

fn to_outcome<E: std::error::Error>(result: Result<(), E>) -> StepOutcome {
    match result {
        Ok(()) => StepOutcome::Applied,
        Err(error) => StepOutcome::Failed(error.to_string()),
    }
}
