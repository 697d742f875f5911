//! Scriptable in-memory executor and pool factory for tests.

use crate::executor::{Pool, Row, SqlExecutor};
use crate::factory::PoolFactory;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tessera_common::models::{ColumnInfo, DatabaseConfig, DatabaseProvider};
use tessera_error::{ErrorCode, Result, TesseraError};
use tessera_sql::{BoundStatement, SqlValue};

/// A statement as the executor received it.
#[derive(Debug, Clone)]
pub struct RecordedStatement {
    pub sql: String,
    pub params: Vec<(String, SqlValue)>,
}

impl RecordedStatement {
    fn from_bound(stmt: &BoundStatement) -> Self {
        Self {
            sql: stmt.named_sql(),
            params: stmt
                .params()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Records every statement. Query results and affected counts are served from queues;
/// an empty query queue yields no rows and an empty count queue yields the size of the
/// `ids` list parameter, or 1.
pub struct MockExecutor {
    provider: DatabaseProvider,
    tables: Mutex<HashMap<String, Vec<ColumnInfo>>>,
    describe_calls: AtomicUsize,
    statements: Mutex<Vec<RecordedStatement>>,
    ddl: Mutex<Vec<String>>,
    query_results: Mutex<VecDeque<Result<Vec<Row>>>>,
    execute_results: Mutex<VecDeque<Result<u64>>>,
}

impl MockExecutor {
    pub fn new(provider: DatabaseProvider) -> Self {
        Self {
            provider,
            tables: Mutex::new(HashMap::new()),
            describe_calls: AtomicUsize::new(0),
            statements: Mutex::new(Vec::new()),
            ddl: Mutex::new(Vec::new()),
            query_results: Mutex::new(VecDeque::new()),
            execute_results: Mutex::new(VecDeque::new()),
        }
    }

    /// Declares `table` with `(column, catalog type)` pairs.
    pub fn with_table(self, table: &str, columns: &[(&str, &str)]) -> Self {
        self.set_table(table, columns);
        self
    }

    pub fn set_table(&self, table: &str, columns: &[(&str, &str)]) {
        let infos = columns
            .iter()
            .map(|(name, ty)| ColumnInfo {
                name: name.to_string(),
                data_type: ty.to_string(),
                size: None,
                nullable: true,
                remarks: None,
            })
            .collect();
        lock(&self.tables).insert(table.to_lowercase(), infos);
    }

    pub fn push_rows(&self, rows: Vec<serde_json::Value>) {
        let rows = rows
            .into_iter()
            .filter_map(|v| match v {
                serde_json::Value::Object(map) => Some(map),
                _ => None,
            })
            .collect();
        lock(&self.query_results).push_back(Ok(rows));
    }

    pub fn push_query_error(&self, message: &str) {
        lock(&self.query_results).push_back(Err(TesseraError::new(
            ErrorCode::StatementFailed,
            message,
        )));
    }

    pub fn push_affected(&self, count: u64) {
        lock(&self.execute_results).push_back(Ok(count));
    }

    pub fn statements(&self) -> Vec<RecordedStatement> {
        lock(&self.statements).clone()
    }

    pub fn ddl(&self) -> Vec<String> {
        lock(&self.ddl).clone()
    }

    pub fn describe_calls(&self) -> usize {
        self.describe_calls.load(Ordering::SeqCst)
    }

    fn record(&self, stmt: &BoundStatement) {
        lock(&self.statements).push(RecordedStatement::from_bound(stmt));
    }
}

#[async_trait]
impl SqlExecutor for MockExecutor {
    fn provider(&self) -> DatabaseProvider {
        self.provider
    }

    async fn query(&self, stmt: &BoundStatement) -> Result<Vec<Row>> {
        self.record(stmt);
        lock(&self.query_results)
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn execute(&self, stmt: &BoundStatement) -> Result<u64> {
        self.record(stmt);
        if let Some(result) = lock(&self.execute_results).pop_front() {
            return result;
        }
        Ok(match stmt.param("ids") {
            Some(SqlValue::List(ids)) => ids.len() as u64,
            _ => 1,
        })
    }

    async fn execute_ddl(&self, ddl: &str) -> Result<()> {
        lock(&self.ddl).push(ddl.to_string());
        Ok(())
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        self.describe_calls.fetch_add(1, Ordering::SeqCst);
        Ok(lock(&self.tables)
            .get(&table.trim().to_lowercase())
            .cloned()
            .unwrap_or_default())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Hands out a fresh [`MockExecutor`] per build and counts builds.
#[derive(Default)]
pub struct MockPoolFactory {
    builds: AtomicUsize,
    failures_left: AtomicUsize,
    tables: Vec<(String, Vec<(String, String)>)>,
    built: Mutex<Vec<Arc<MockExecutor>>>,
}

impl MockPoolFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every executor built afterwards knows `table`.
    pub fn with_table(mut self, table: &str, columns: &[(&str, &str)]) -> Self {
        self.tables.push((
            table.to_string(),
            columns
                .iter()
                .map(|(c, t)| (c.to_string(), t.to_string()))
                .collect(),
        ));
        self
    }

    /// The next `n` builds fail with a connection error.
    pub fn failing(self, n: usize) -> Self {
        self.failures_left.store(n, Ordering::SeqCst);
        self
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn last_built(&self) -> Option<Arc<MockExecutor>> {
        lock(&self.built).last().cloned()
    }
}

#[async_trait]
impl PoolFactory for MockPoolFactory {
    async fn build(&self, config: &DatabaseConfig) -> Result<Pool> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(TesseraError::new(
                ErrorCode::ConnectionFailed,
                format!("connection refused for {}", config.id),
            ));
        }

        let executor = MockExecutor::new(config.provider);
        for (table, columns) in &self.tables {
            let pairs: Vec<(&str, &str)> = columns
                .iter()
                .map(|(c, t)| (c.as_str(), t.as_str()))
                .collect();
            executor.set_table(table, &pairs);
        }
        let executor = Arc::new(executor);
        lock(&self.built).push(executor.clone());
        Ok(executor as Pool)
    }
}
