use std::collections::BTreeMap;

use thiserror::Error;

use crate::{
    ColumnInfo, Row, SqlValue,
    model::{FieldDescriptor, FieldType},
};

#[derive(Debug, Error, Clone, PartialEq)]
#[allow(clippy::module_name_repetitions)]
pub enum ConvertError {
    #[error("can't convert {field}: {value:?} to bool")]
    NotABool { field: String, value: SqlValue },
    #[error("{0}")]
    Custom(String),
}

/// A value converter: receives one cell plus its column and field metadata
/// and writes whatever it produces into the result row.
pub type ConverterFn = Box<
    dyn Fn(&SqlValue, &ColumnInfo, &FieldDescriptor, &mut Row) -> Result<(), ConvertError>
        + Send
        + Sync,
>;

/// Registry of named value converters.
///
/// Seeded with `ReadBool` and `WriteBool`. Mutation requires exclusive
/// access, so lookups during query execution see a fixed registry.
pub struct Converters {
    registered: BTreeMap<String, ConverterFn>,
}

impl Converters {
    #[must_use]
    pub fn new() -> Self {
        let mut converters = Self {
            registered: BTreeMap::new(),
        };
        converters.register("ReadBool", read_bool);
        converters.register("WriteBool", write_bool);
        converters
    }

    /// Registers `converter` under `name`, replacing any previous entry.
    pub fn register(
        &mut self,
        name: &str,
        converter: impl Fn(&SqlValue, &ColumnInfo, &FieldDescriptor, &mut Row) -> Result<(), ConvertError>
        + Send
        + Sync
        + 'static,
    ) {
        self.registered.insert(name.to_string(), Box::new(converter));
    }

    /// Removes the converter registered under `name`, if any.
    pub fn unregister(&mut self, name: &str) {
        self.registered.remove(name);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ConverterFn> {
        self.registered.get(name)
    }
}

impl Default for Converters {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Converters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converters")
            .field("registered", &self.registered.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Read converter for boolean fields: booleans pass through under the field
/// name, anything else collapses to the field type's zero value.
///
/// # Errors
///
/// * Infallible, but typed to fit [`ConverterFn`]
pub fn read_bool(
    value: &SqlValue,
    _column: &ColumnInfo,
    field: &FieldDescriptor,
    row: &mut Row,
) -> Result<(), ConvertError> {
    match value {
        SqlValue::Bool(value) => row.set(field.field, SqlValue::Bool(*value)),
        _ => row.set(field.field, field.field_type.zero_value()),
    }
    Ok(())
}

/// Write converter for boolean fields: only fields typed
/// [`FieldType::Bool`] participate, and non-boolean values for them are
/// rejected.
///
/// # Errors
///
/// * If the field is boolean but the value is not
pub fn write_bool(
    value: &SqlValue,
    column: &ColumnInfo,
    field: &FieldDescriptor,
    row: &mut Row,
) -> Result<(), ConvertError> {
    if field.field_type != FieldType::Bool {
        return Ok(());
    }
    match value {
        SqlValue::Bool(value) => {
            row.set(&column.name, SqlValue::Bool(*value));
            Ok(())
        }
        _ => Err(ConvertError::NotABool {
            field: field.field.to_string(),
            value: value.clone(),
        }),
    }
}
