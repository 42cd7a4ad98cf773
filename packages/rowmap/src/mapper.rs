//! High-level select façade over a [`Connection`], a converter registry, and
//! the descriptor-driven query builder.

use std::collections::BTreeMap;

use crate::{
    ColumnInfo, Connection, DatabaseError, Row, RowStream, SqlValue,
    convert::{ConvertError, ConverterFn, Converters},
    model::{FieldDescriptor, FieldType, KeyBy, Model, field_map},
    params,
    query::build_select,
};

/// Pool size used when a select has to establish the connection itself.
pub const DEFAULT_POOL_SIZE: usize = 50;

/// Owns one [`Connection`] plus the converter and column-template
/// registries scoped to it.
///
/// Registration requires `&mut self`, so queries running through `&self`
/// observe a fixed registry.
#[derive(Debug)]
pub struct Mapper {
    connection: Box<dyn Connection>,
    converters: Converters,
    column_templates: BTreeMap<String, String>,
}

impl Mapper {
    #[must_use]
    pub fn new(connection: Box<dyn Connection>) -> Self {
        Self {
            connection,
            converters: Converters::new(),
            column_templates: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn connection(&self) -> &dyn Connection {
        self.connection.as_ref()
    }

    /// Registers a named value converter, replacing any previous entry.
    pub fn register_converter(
        &mut self,
        name: &str,
        converter: impl Fn(&SqlValue, &ColumnInfo, &FieldDescriptor, &mut Row) -> Result<(), ConvertError>
        + Send
        + Sync
        + 'static,
    ) {
        self.converters.register(name, converter);
    }

    pub fn unregister_converter(&mut self, name: &str) {
        self.converters.unregister(name);
    }

    #[must_use]
    pub fn converter(&self, name: &str) -> Option<&ConverterFn> {
        self.converters.get(name)
    }

    /// Registers a `$column`-parameterized SQL template for inline column
    /// converter markers.
    pub fn register_column_convert(&mut self, name: &str, definition: &str) {
        self.column_templates
            .insert(name.to_string(), definition.to_string());
    }

    /// Runs the select derived from `T`'s descriptor table and materializes
    /// every result row.
    ///
    /// `:name` placeholders in `where_clause` are substituted from `args`
    /// before execution. Connects with [`DEFAULT_POOL_SIZE`] when the
    /// connection is not yet established.
    ///
    /// # Errors
    ///
    /// * If connecting or querying the database fails
    /// * If no statement handle is available after connecting
    /// * If a result column has no matching field descriptor
    /// * If a read converter rejects a value
    ///
    /// # Panics
    ///
    /// * If a descriptor names a column converter with no registered template
    /// * If a descriptor's column carries a malformed inline converter marker
    pub async fn select<T: Model>(
        &self,
        where_clause: &str,
        limit: Option<u64>,
        offset: u64,
        args: &[(&str, SqlValue)],
    ) -> Result<Vec<Row>, DatabaseError> {
        let mut query = build_select::<T>(where_clause, limit, offset, &self.column_templates);
        if !args.is_empty() {
            query = params::substitute(&query, args);
        }

        if !self.connection.is_connected().await {
            self.connection.connect(DEFAULT_POOL_SIZE).await?;
        }
        let Some(handle) = self.connection.instance().await else {
            return Err(DatabaseError::MissingRowsInstance);
        };

        log::trace!("Running select query: {query}");
        let stream = handle.query_raw(&query).await?;

        self.materialize::<T>(stream).await
    }

    /// Drains `stream`, mapping each result column back onto its field via
    /// the column-keyed descriptor map.
    async fn materialize<T: Model>(
        &self,
        mut stream: Box<dyn RowStream>,
    ) -> Result<Vec<Row>, DatabaseError> {
        let descriptors = field_map::<T>(KeyBy::Column);
        let mut rows = vec![];

        while let Some(values) = stream.next_row().await? {
            let mut row = Row::new();

            for (column, value) in stream.columns().iter().zip(values) {
                let Some(&descriptor) = descriptors.get(column.name.as_str()) else {
                    return Err(DatabaseError::UnmappedColumn {
                        column: column.name.clone(),
                        model: T::NAME.to_string(),
                    });
                };

                if let Some(converter) = self.converters.get(descriptor.read_with) {
                    converter(&value, column, descriptor, &mut row).map_err(|error| {
                        DatabaseError::Converter {
                            name: descriptor.read_with.to_string(),
                            error,
                        }
                    })?;
                    continue;
                }

                match value {
                    SqlValue::Bytes(bytes) => {
                        // Cells arriving as raw bytes only decode for text
                        // fields. Anything else keeps its field unset.
                        if descriptor.field_type == FieldType::Text {
                            row.set(
                                descriptor.field,
                                SqlValue::Text(String::from_utf8_lossy(&bytes).into_owned()),
                            );
                        }
                    }
                    value => row.set(descriptor.field, value),
                }
            }

            rows.push(row);
        }

        log::trace!(
            "Got {} row{}",
            rows.len(),
            if rows.len() == 1 { "" } else { "s" }
        );

        Ok(rows)
    }
}
