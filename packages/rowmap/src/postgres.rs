use std::{ops::Deref, pin::Pin, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod, Runtime};
use futures::StreamExt;
use postgres_protocol::types::{
    bool_from_sql, bytea_from_sql, char_from_sql, float4_from_sql, float8_from_sql, int2_from_sql,
    int4_from_sql, int8_from_sql, text_from_sql,
};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_postgres::{
    Config, Socket,
    tls::{MakeTlsConnect, TlsConnect},
    types::{FromSql, IsNull, ToSql, Type},
};
use tokio_util::bytes::BytesMut;

use crate::{ColumnInfo, Connection, DatabaseError, QueryHandle, RowStream, SqlValue};

#[derive(Debug, Error)]
#[allow(clippy::module_name_repetitions)]
pub enum PostgresDatabaseError {
    #[error(transparent)]
    Postgres(#[from] tokio_postgres::Error),
    #[error(transparent)]
    Pool(#[from] deadpool_postgres::PoolError),
    #[error("Failed to build connection pool: {0}")]
    PoolBuild(String),
    #[error("Type Not Found: '{type_name}'")]
    TypeNotFound { type_name: String },
    #[error("Unsupported parameter: {0}")]
    UnsupportedParameter(String),
}

impl From<PostgresDatabaseError> for DatabaseError {
    fn from(value: PostgresDatabaseError) -> Self {
        Self::Postgres(value)
    }
}

/// Postgres-backed [`Connection`] that builds its deadpool pool on
/// [`connect`](Connection::connect) and swaps it atomically on reconnects.
#[allow(clippy::module_name_repetitions)]
pub struct PostgresConnection<T>
where
    T: MakeTlsConnect<Socket> + Clone + Sync + Send + 'static,
    T::Stream: Sync + Send,
    T::TlsConnect: Sync + Send,
    <T::TlsConnect as TlsConnect<Socket>>::Future: Send,
{
    config: Config,
    tls: T,
    handle: RwLock<Option<Arc<PostgresHandle>>>,
}

impl<T> PostgresConnection<T>
where
    T: MakeTlsConnect<Socket> + Clone + Sync + Send + 'static,
    T::Stream: Sync + Send,
    T::TlsConnect: Sync + Send,
    <T::TlsConnect as TlsConnect<Socket>>::Future: Send,
{
    #[must_use]
    pub fn new(config: Config, tls: T) -> Self {
        Self {
            config,
            tls,
            handle: RwLock::new(None),
        }
    }
}

impl<T> std::fmt::Debug for PostgresConnection<T>
where
    T: MakeTlsConnect<Socket> + Clone + Sync + Send + 'static,
    T::Stream: Sync + Send,
    T::TlsConnect: Sync + Send,
    <T::TlsConnect as TlsConnect<Socket>>::Future: Send,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresConnection")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<T> Connection for PostgresConnection<T>
where
    T: MakeTlsConnect<Socket> + Clone + Sync + Send + 'static,
    T::Stream: Sync + Send,
    T::TlsConnect: Sync + Send,
    <T::TlsConnect as TlsConnect<Socket>>::Future: Send,
{
    async fn connect(&self, max_pool_size: usize) -> Result<(), DatabaseError> {
        let manager = Manager::from_config(
            self.config.clone(),
            self.tls.clone(),
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );
        let pool = Pool::builder(manager)
            .max_size(max_pool_size)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| PostgresDatabaseError::PoolBuild(e.to_string()))?;

        log::trace!("connect: opened postgres pool max_size={max_pool_size}");

        let previous = self
            .handle
            .write()
            .await
            .replace(Arc::new(PostgresHandle { pool }));
        if let Some(previous) = previous {
            previous.pool.close();
        }

        Ok(())
    }

    async fn disconnect(&self) -> Result<(), DatabaseError> {
        if let Some(handle) = self.handle.write().await.take() {
            handle.pool.close();
            log::trace!("disconnect: closed postgres pool");
        }
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        let handle = self.handle.read().await.clone();
        match handle {
            Some(handle) => handle.pool.get().await.is_ok(),
            None => false,
        }
    }

    async fn instance(&self) -> Option<Arc<dyn QueryHandle>> {
        self.handle
            .read()
            .await
            .clone()
            .map(|handle| handle as Arc<dyn QueryHandle>)
    }
}

struct PostgresHandle {
    pool: Pool,
}

#[async_trait]
impl QueryHandle for PostgresHandle {
    async fn exec_raw(&self, statement: &str) -> Result<(), DatabaseError> {
        log::trace!("exec_raw: query:\n{statement}");

        let client = self.pool.get().await.map_err(PostgresDatabaseError::Pool)?;
        client
            .batch_execute(statement)
            .await
            .map_err(PostgresDatabaseError::Postgres)?;

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

        let client = self.pool.get().await.map_err(PostgresDatabaseError::Pool)?;
        let statement = client
            .prepare(query)
            .await
            .map_err(PostgresDatabaseError::Postgres)?;

        let columns = statement
            .columns()
            .iter()
            .map(|column| ColumnInfo {
                name: column.name().to_string(),
                type_name: column.type_().name().to_string(),
            })
            .collect();

        let params = params
            .iter()
            .cloned()
            .map(PgSqlValue::from)
            .collect::<Vec<_>>();
        let stream = client
            .query_raw(&statement, params)
            .await
            .map_err(PostgresDatabaseError::Postgres)?;

        Ok(Box::new(PgRowStream {
            columns,
            stream: Box::pin(stream),
            _client: client,
        }))
    }
}

struct PgRowStream {
    columns: Vec<ColumnInfo>,
    stream: Pin<Box<tokio_postgres::RowStream>>,
    // Holds the checked-out pool object so the connection is not recycled
    // while rows are still streaming.
    _client: Object,
}

#[async_trait]
impl RowStream for PgRowStream {
    fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    async fn next_row(&mut self) -> Result<Option<Vec<SqlValue>>, DatabaseError> {
        let Some(row) = self
            .stream
            .next()
            .await
            .transpose()
            .map_err(PostgresDatabaseError::Postgres)?
        else {
            return Ok(None);
        };

        let mut values = Vec::with_capacity(row.len());
        for i in 0..row.len() {
            values.push(
                row.try_get::<_, SqlValue>(i)
                    .map_err(PostgresDatabaseError::Postgres)?,
            );
        }

        Ok(Some(values))
    }
}

impl<'a> FromSql<'a> for SqlValue {
    fn from_sql(
        ty: &Type,
        raw: &'a [u8],
    ) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        match ty.name() {
            "bool" => Ok(Self::Bool(bool_from_sql(raw)?)),
            "char" => Ok(Self::Int(i64::from(char_from_sql(raw)?))),
            "smallint" | "smallserial" | "int2" => Ok(Self::Int(i64::from(int2_from_sql(raw)?))),
            "int" | "serial" | "int4" => Ok(Self::Int(i64::from(int4_from_sql(raw)?))),
            "bigint" | "bigserial" | "int8" => Ok(Self::Int(int8_from_sql(raw)?)),
            "real" | "float4" => Ok(Self::Real(f64::from(float4_from_sql(raw)?))),
            "double precision" | "float8" => Ok(Self::Real(float8_from_sql(raw)?)),
            "varchar" | "char(n)" | "text" | "name" | "citext" => {
                Ok(Self::Text(text_from_sql(raw)?.to_string()))
            }
            "bytea" => Ok(Self::Bytes(bytea_from_sql(raw).to_vec())),
            "timestamp" => Ok(Self::DateTime(NaiveDateTime::from_sql(ty, raw)?)),
            "timestamptz" | "timestamp with time zone" => {
                Ok(Self::DateTime(DateTime::<Utc>::from_sql(ty, raw)?.naive_utc()))
            }
            _ => Err(Box::new(PostgresDatabaseError::TypeNotFound {
                type_name: ty.to_string(),
            })),
        }
    }

    fn from_sql_null(_ty: &Type) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        Ok(Self::Null)
    }

    fn accepts(ty: &Type) -> bool {
        log::trace!("FromSql accepts: {ty}");
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
struct PgSqlValue(SqlValue);

impl From<SqlValue> for PgSqlValue {
    fn from(value: SqlValue) -> Self {
        Self(value)
    }
}

impl Deref for PgSqlValue {
    type Target = SqlValue;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl ToSql for PgSqlValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>>
    where
        Self: Sized,
    {
        self.to_sql_checked(ty, out)
    }

    fn accepts(ty: &Type) -> bool
    where
        Self: Sized,
    {
        log::trace!("ToSql accepts: {ty}");
        true
    }

    fn to_sql_checked(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        log::trace!("to_sql_checked: ty={ty} value={:?}", self.0);
        match &self.0 {
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Bool(value) => value.to_sql(ty, out),
            SqlValue::Int(value) => value.to_sql(ty, out),
            SqlValue::UInt(value) => i64::try_from(*value)?.to_sql(ty, out),
            SqlValue::Real(value) => value.to_sql(ty, out),
            SqlValue::Text(value) => value.to_sql(ty, out),
            SqlValue::Bytes(value) => value.to_sql(ty, out),
            SqlValue::DateTime(value) => value.to_sql(ty, out),
            SqlValue::Array(_) => Err(Box::new(PostgresDatabaseError::UnsupportedParameter(
                "array".to_string(),
            ))),
        }
    }
}
