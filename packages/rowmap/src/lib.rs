#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

pub mod convert;
pub mod literal;
pub mod mapper;
pub mod model;
pub mod params;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod query;
#[cfg(feature = "simulator")]
pub mod simulator;

use std::{num::TryFromIntError, sync::Arc};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Real(f64),
    Text(String),
    Bytes(Vec<u8>),
    DateTime(NaiveDateTime),
    Array(Vec<SqlValue>),
}

impl SqlValue {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::UInt(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Real(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Self::DateTime(value) => Some(*value),
            _ => None,
        }
    }
}

impl<T: Into<Self>> From<Option<T>> for SqlValue {
    fn from(val: Option<T>) -> Self {
        val.map_or(Self::Null, std::convert::Into::into)
    }
}

impl<T: Into<Self>> From<Vec<T>> for SqlValue {
    fn from(val: Vec<T>) -> Self {
        Self::Array(val.into_iter().map(std::convert::Into::into).collect())
    }
}

impl From<bool> for SqlValue {
    fn from(val: bool) -> Self {
        Self::Bool(val)
    }
}

impl From<&str> for SqlValue {
    fn from(val: &str) -> Self {
        Self::Text(val.to_string())
    }
}

impl From<&String> for SqlValue {
    fn from(val: &String) -> Self {
        Self::Text(val.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(val: String) -> Self {
        Self::Text(val)
    }
}

impl From<f32> for SqlValue {
    fn from(val: f32) -> Self {
        Self::Real(f64::from(val))
    }
}

impl From<f64> for SqlValue {
    fn from(val: f64) -> Self {
        Self::Real(val)
    }
}

impl From<i8> for SqlValue {
    fn from(val: i8) -> Self {
        Self::Int(i64::from(val))
    }
}

impl From<i16> for SqlValue {
    fn from(val: i16) -> Self {
        Self::Int(i64::from(val))
    }
}

impl From<i32> for SqlValue {
    fn from(val: i32) -> Self {
        Self::Int(i64::from(val))
    }
}

impl From<i64> for SqlValue {
    fn from(val: i64) -> Self {
        Self::Int(val)
    }
}

impl From<u8> for SqlValue {
    fn from(val: u8) -> Self {
        Self::UInt(u64::from(val))
    }
}

impl From<u16> for SqlValue {
    fn from(val: u16) -> Self {
        Self::UInt(u64::from(val))
    }
}

impl From<u32> for SqlValue {
    fn from(val: u32) -> Self {
        Self::UInt(u64::from(val))
    }
}

impl From<u64> for SqlValue {
    fn from(val: u64) -> Self {
        Self::UInt(val)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(val: NaiveDateTime) -> Self {
        Self::DateTime(val)
    }
}

#[derive(Debug, Error)]
pub enum TryFromError {
    #[error("Could not convert to type '{0}'")]
    CouldNotConvert(String),
    #[error(transparent)]
    TryFromInt(#[from] TryFromIntError),
}

impl TryFrom<SqlValue> for u64 {
    type Error = TryFromError;

    fn try_from(value: SqlValue) -> Result<Self, Self::Error> {
        match value {
            SqlValue::Int(value) => Ok(Self::try_from(value)?),
            SqlValue::UInt(value) => Ok(value),
            _ => Err(TryFromError::CouldNotConvert("u64".into())),
        }
    }
}

impl TryFrom<SqlValue> for i64 {
    type Error = TryFromError;

    fn try_from(value: SqlValue) -> Result<Self, Self::Error> {
        match value {
            SqlValue::Int(value) => Ok(value),
            SqlValue::UInt(value) => Ok(Self::try_from(value)?),
            _ => Err(TryFromError::CouldNotConvert("i64".into())),
        }
    }
}

impl TryFrom<SqlValue> for i32 {
    type Error = TryFromError;

    fn try_from(value: SqlValue) -> Result<Self, Self::Error> {
        match value {
            SqlValue::Int(value) => Ok(Self::try_from(value)?),
            SqlValue::UInt(value) => Ok(Self::try_from(value)?),
            _ => Err(TryFromError::CouldNotConvert("i32".into())),
        }
    }
}

impl TryFrom<SqlValue> for f64 {
    type Error = TryFromError;

    fn try_from(value: SqlValue) -> Result<Self, Self::Error> {
        match value {
            SqlValue::Real(value) => Ok(value),
            _ => Err(TryFromError::CouldNotConvert("f64".into())),
        }
    }
}

impl TryFrom<SqlValue> for bool {
    type Error = TryFromError;

    fn try_from(value: SqlValue) -> Result<Self, Self::Error> {
        match value {
            SqlValue::Bool(value) => Ok(value),
            _ => Err(TryFromError::CouldNotConvert("bool".into())),
        }
    }
}

impl TryFrom<SqlValue> for String {
    type Error = TryFromError;

    fn try_from(value: SqlValue) -> Result<Self, Self::Error> {
        match value {
            SqlValue::Text(value) => Ok(value),
            _ => Err(TryFromError::CouldNotConvert("String".into())),
        }
    }
}

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    Postgres(postgres::PostgresDatabaseError),
    #[cfg(feature = "simulator")]
    #[error(transparent)]
    Simulator(simulator::SimulatorDatabaseError),
    #[error("missing database rows instance")]
    MissingRowsInstance,
    #[error("can't get field info for column '{column}' in model '{model}'")]
    UnmappedColumn { column: String, model: String },
    #[error("error in converter {name}: {error}")]
    Converter {
        name: String,
        error: convert::ConvertError,
    },
}

/// A materialized record: field identifiers paired with their values, in
/// column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    pub fields: Vec<(String, SqlValue)>,
}

impl Row {
    #[must_use]
    pub const fn new() -> Self {
        Self { fields: Vec::new() }
    }

    #[must_use]
    pub fn get(&self, field_name: &str) -> Option<SqlValue> {
        self.fields
            .iter()
            .find(|field| field.0 == field_name)
            .map(|field| field.1.clone())
    }

    pub fn set(&mut self, field_name: &str, value: SqlValue) {
        if let Some(field) = self.fields.iter_mut().find(|field| field.0 == field_name) {
            field.1 = value;
        } else {
            self.fields.push((field_name.to_string(), value));
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Per-column metadata reported by the executing backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub type_name: String,
}

#[async_trait]
pub trait Connection: Send + Sync + std::fmt::Debug {
    /// Opens the connection to the underlying database.
    ///
    /// If the connection is already open, it is torn down and reopened with
    /// the new pool size.
    async fn connect(&self, max_pool_size: usize) -> Result<(), DatabaseError>;

    /// Closes the connection. Idempotent.
    async fn disconnect(&self) -> Result<(), DatabaseError>;

    /// Whether the connection is open and able to serve queries.
    async fn is_connected(&self) -> bool;

    /// The queryable handle, if connected.
    async fn instance(&self) -> Option<Arc<dyn QueryHandle>>;
}

#[async_trait]
pub trait QueryHandle: Send + Sync {
    async fn exec_raw(&self, statement: &str) -> Result<(), DatabaseError>;

    async fn query_raw(&self, query: &str) -> Result<Box<dyn RowStream>, DatabaseError>;

    async fn query_raw_params(
        &self,
        query: &str,
        params: &[SqlValue],
    ) -> Result<Box<dyn RowStream>, DatabaseError>;
}

#[async_trait]
pub trait RowStream: Send {
    /// Metadata for the result columns, in projection order.
    fn columns(&self) -> &[ColumnInfo];

    /// The next row's raw values, in column order, or `None` once the
    /// stream is exhausted.
    async fn next_row(&mut self) -> Result<Option<Vec<SqlValue>>, DatabaseError>;
}
