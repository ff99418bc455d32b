//! In-memory [`SqlExecutor`] fixture (§4, test tooling): records every
//! statement it was asked to run, and answers `query_exists` from a canned
//! queue, so runner tests assert on emitted SQL without a real database.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::executor::SqlExecutor;

#[derive(Debug, thiserror::Error)]
#[error("fake executor error")]
pub struct FakeExecutorError;

#[derive(Default)]
pub struct FakeSqlExecutor {
    statements: Mutex<Vec<String>>,
    existence_queue: Mutex<VecDeque<bool>>,
}

impl FakeSqlExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the answers `query_exists` hands back, in call order.
    pub fn with_existence_responses(responses: Vec<bool>) -> Self {
        Self { statements: Mutex::new(Vec::new()), existence_queue: Mutex::new(responses.into()) }
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }
}

#[async_trait]
impl SqlExecutor for FakeSqlExecutor {
    type Error = FakeExecutorError;

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
