use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use chrono::SecondsFormat;
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

use crate::{ColumnInfo, Connection, DatabaseError, QueryHandle, RowStream, SqlValue};

#[derive(Debug, Error)]
#[allow(clippy::module_name_repetitions)]
pub enum SimulatorDatabaseError {
    #[error(transparent)]
    Rusqlite(#[from] rusqlite::Error),
    #[error("Unsupported parameter: {0}")]
    UnsupportedParameter(String),
}

impl From<SimulatorDatabaseError> for DatabaseError {
    fn from(value: SimulatorDatabaseError) -> Self {
        Self::Simulator(value)
    }
}

static SIMULATOR_DB_ID: AtomicU64 = AtomicU64::new(0);

/// In-memory sqlite [`Connection`] for tests and examples. Every instance
/// opens its own uniquely named shared-cache database.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct SimulatorConnection {
    db_url: String,
    handle: RwLock<Option<Arc<SimulatorHandle>>>,
}

impl SimulatorConnection {
    /// # Panics
    ///
    /// * If time goes backwards
    #[must_use]
    pub fn new() -> Self {
        let id = SIMULATOR_DB_ID.fetch_add(1, Ordering::Relaxed);
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();

        Self {
            db_url: format!("file:rowmap_memdb_{id}_{timestamp}:?mode=memory&cache=shared&uri=true"),
            handle: RwLock::new(None),
        }
    }
}

impl Default for SimulatorConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connection for SimulatorConnection {
    async fn connect(&self, max_pool_size: usize) -> Result<(), DatabaseError> {
        let pool_size = max_pool_size.clamp(1, 5);
        let mut connections = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            let connection = rusqlite::Connection::open(&self.db_url)
                .map_err(SimulatorDatabaseError::Rusqlite)?;
            connection
                .busy_timeout(Duration::from_millis(10))
                .map_err(SimulatorDatabaseError::Rusqlite)?;
            connections.push(Arc::new(Mutex::new(connection)));
        }

        log::trace!(
            "connect: opened {pool_size} sqlite connections to {}",
            self.db_url
        );

        // New connections open before the old handle drops, so the shared
        // in-memory database survives a reconnect.
        *self.handle.write().await = Some(Arc::new(SimulatorHandle {
            connections,
            next_connection: AtomicUsize::new(0),
        }));

        Ok(())
    }

    async fn disconnect(&self) -> Result<(), DatabaseError> {
        if self.handle.write().await.take().is_some() {
            log::trace!("disconnect: dropped sqlite connections to {}", self.db_url);
        }
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.handle.read().await.is_some()
    }

    async fn instance(&self) -> Option<Arc<dyn QueryHandle>> {
        self.handle
            .read()
            .await
            .clone()
            .map(|handle| handle as Arc<dyn QueryHandle>)
    }
}

#[derive(Debug)]
struct SimulatorHandle {
    connections: Vec<Arc<Mutex<rusqlite::Connection>>>,
    next_connection: AtomicUsize,
}

impl SimulatorHandle {
    fn get_connection(&self) -> &Arc<Mutex<rusqlite::Connection>> {
        let i = self.next_connection.fetch_add(1, Ordering::Relaxed) % self.connections.len();
        &self.connections[i]
    }
}

#[async_trait]
impl QueryHandle for SimulatorHandle {
    async fn exec_raw(&self, statement: &str) -> Result<(), DatabaseError> {
        log::trace!("exec_raw: query:\n{statement}");

        let connection = self.get_connection().lock().await;
        connection
            .execute_batch(statement)
            .map_err(SimulatorDatabaseError::Rusqlite)?;

        Ok(())
    }

    async fn query_raw(&self, query: &str) -> Result<Box<dyn RowStream>, DatabaseError> {
        self.query_raw_params(query, &[]).await
    }

    async fn query_raw_params(
        &self,
        query: &str,
        params: &[SqlValue],
    ) -> Result<Box<dyn RowStream>, DatabaseError> {
        log::trace!("query_raw_params: query:\n{query}\nparams: {params:?}");

        let connection = self.get_connection().lock().await;
        let mut statement = connection
            .prepare(query)
            .map_err(SimulatorDatabaseError::Rusqlite)?;

        // Declared column types are not surfaced by this backend.
        let columns = statement
            .column_names()
            .into_iter()
            .map(|name| ColumnInfo {
                name: name.to_string(),
                type_name: String::new(),
            })
            .collect::<Vec<_>>();
        let column_count = statement.column_count();

        let mut query_rows = statement
            .query(rusqlite::params_from_iter(params))
            .map_err(SimulatorDatabaseError::Rusqlite)?;

        let mut rows = VecDeque::new();
        while let Some(row) = query_rows
            .next()
            .map_err(SimulatorDatabaseError::Rusqlite)?
        {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                values.push(
                    row.get::<_, Value>(i)
                        .map_err(SimulatorDatabaseError::Rusqlite)?
                        .into(),
                );
            }
            rows.push_back(values);
        }

        log::trace!(
            "Got {} row{}",
            rows.len(),
            if rows.len() == 1 { "" } else { "s" }
        );

        Ok(Box::new(SimulatorRowStream { columns, rows }))
    }
}

struct SimulatorRowStream {
    columns: Vec<ColumnInfo>,
    rows: VecDeque<Vec<SqlValue>>,
}

#[async_trait]
impl RowStream for SimulatorRowStream {
    fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    async fn next_row(&mut self) -> Result<Option<Vec<SqlValue>>, DatabaseError> {
        Ok(self.rows.pop_front())
    }
}

impl From<Value> for SqlValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Integer(value) => Self::Int(value),
            Value::Real(value) => Self::Real(value),
            Value::Text(value) => Self::Text(value),
            Value::Blob(value) => Self::Bytes(value),
        }
    }
}

impl rusqlite::types::ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Self::Null => Ok(ToSqlOutput::Owned(Value::Null)),
            Self::Bool(value) => Ok(ToSqlOutput::Owned(Value::Integer(i64::from(*value)))),
            Self::Int(value) => Ok(ToSqlOutput::Owned(Value::Integer(*value))),
            Self::UInt(value) => i64::try_from(*value)
                .map(|value| ToSqlOutput::Owned(Value::Integer(value)))
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e))),
            Self::Real(value) => Ok(ToSqlOutput::Owned(Value::Real(*value))),
            Self::Text(value) => Ok(ToSqlOutput::Borrowed(ValueRef::Text(value.as_bytes()))),
            Self::Bytes(value) => Ok(ToSqlOutput::Borrowed(ValueRef::Blob(value))),
            Self::DateTime(value) => Ok(ToSqlOutput::Owned(Value::Text(
                value.and_utc().to_rfc3339_opts(SecondsFormat::Secs, true),
            ))),
            Self::Array(_) => Err(rusqlite::Error::ToSqlConversionFailure(Box::new(
                SimulatorDatabaseError::UnsupportedParameter("array".to_string()),
            ))),
        }
    }
}
