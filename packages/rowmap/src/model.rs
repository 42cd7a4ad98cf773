use std::collections::BTreeMap;

use crate::SqlValue;

/// One join clause contributing to a statement's source list, in declaration
/// order: `("from", "schema.table", "t")`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataSource {
    pub join: &'static str,
    pub source: &'static str,
    pub alias: &'static str,
}

impl DataSource {
    #[must_use]
    pub const fn new(join: &'static str, source: &'static str, alias: &'static str) -> Self {
        Self {
            join,
            source,
            alias,
        }
    }
}

/// Declared type of a record field, used for zero values and default
/// coercions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Bool,
    Int,
    UInt,
    Real,
    Text,
    Bytes,
    DateTime,
}

impl FieldType {
    /// The zero value substituted when a converter receives a value of the
    /// wrong shape.
    #[must_use]
    pub const fn zero_value(self) -> SqlValue {
        match self {
            Self::Bool => SqlValue::Bool(false),
            Self::Int => SqlValue::Int(0),
            Self::UInt => SqlValue::UInt(0),
            Self::Real => SqlValue::Real(0.0),
            Self::Text => SqlValue::Text(String::new()),
            Self::Bytes | Self::DateTime => SqlValue::Null,
        }
    }
}

/// Per-field metadata describing how a record field maps to a SQL
/// column/expression.
///
/// Built declaratively in a type's constant descriptor table:
///
/// ```rust
/// use rowmap::model::{FieldDescriptor, FieldType};
///
/// const AGE: FieldDescriptor = FieldDescriptor::new("age")
///     .column("tt.age")
///     .typed(FieldType::Int);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Record-field identifier. Unique within one record type.
    pub field: &'static str,
    /// Storage column. May be table-qualified (`tt.age`) and may carry an
    /// inline converter marker (`tt.age->addOne`).
    pub column: &'static str,
    /// Source alias the column belongs to. Prefixed onto unqualified columns
    /// when building projections.
    pub source: &'static str,
    /// Output alias override for the projected column.
    pub alias: &'static str,
    /// Read-side SQL transform template, `$column`-parameterized.
    pub read_sql: &'static str,
    /// Write-side SQL transform template, reserved for write paths.
    pub write_sql: &'static str,
    /// Named read converter applied during materialization.
    pub read_with: &'static str,
    /// Named write converter, exposed to direct invocation.
    pub write_with: &'static str,
    /// Named inline column-converter template.
    pub convert: &'static str,
    pub field_type: FieldType,
}

/// A descriptor's column after marker resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedColumn {
    /// The column's base expression, marker stripped.
    pub base: &'static str,
    /// The inline converter name, or `""` when none applies.
    pub convert: &'static str,
}

impl FieldDescriptor {
    /// Starts a descriptor with the column defaulted to the field identifier
    /// and the type to [`FieldType::Text`].
    #[must_use]
    pub const fn new(field: &'static str) -> Self {
        Self {
            field,
            column: field,
            source: "",
            alias: "",
            read_sql: "",
            write_sql: "",
            read_with: "",
            write_with: "",
            convert: "",
            field_type: FieldType::Text,
        }
    }

    #[must_use]
    pub const fn column(mut self, column: &'static str) -> Self {
        self.column = column;
        self
    }

    #[must_use]
    pub const fn source(mut self, source: &'static str) -> Self {
        self.source = source;
        self
    }

    #[must_use]
    pub const fn alias(mut self, alias: &'static str) -> Self {
        self.alias = alias;
        self
    }

    #[must_use]
    pub const fn read_sql(mut self, template: &'static str) -> Self {
        self.read_sql = template;
        self
    }

    #[must_use]
    pub const fn write_sql(mut self, template: &'static str) -> Self {
        self.write_sql = template;
        self
    }

    #[must_use]
    pub const fn read_with(mut self, converter: &'static str) -> Self {
        self.read_with = converter;
        self
    }

    #[must_use]
    pub const fn write_with(mut self, converter: &'static str) -> Self {
        self.write_with = converter;
        self
    }

    #[must_use]
    pub const fn convert(mut self, converter: &'static str) -> Self {
        self.convert = converter;
        self
    }

    #[must_use]
    pub const fn typed(mut self, field_type: FieldType) -> Self {
        self.field_type = field_type;
        self
    }

    /// Resolves the column string, splitting off any inline converter
    /// marker. An explicit [`convert`](Self::convert) name wins over a
    /// marker embedded in the column.
    ///
    /// # Panics
    ///
    /// * If the column carries a malformed inline converter marker
    #[must_use]
    pub fn resolved(&self) -> ResolvedColumn {
        self.column.split_once("->").map_or(
            ResolvedColumn {
                base: self.column,
                convert: self.convert,
            },
            |(base, marker)| {
                assert!(
                    !base.is_empty() && !marker.is_empty() && !marker.contains("->"),
                    "column definition is wrong {}",
                    self.column
                );
                ResolvedColumn {
                    base,
                    convert: if self.convert.is_empty() {
                        marker
                    } else {
                        self.convert
                    },
                }
            },
        )
    }

    /// The name the projected column is reported back under: the explicit
    /// alias when set, the unqualified base column otherwise.
    ///
    /// # Panics
    ///
    /// * If the column carries a malformed inline converter marker
    #[must_use]
    pub fn output_name(&self) -> &'static str {
        if !self.alias.is_empty() {
            return self.alias;
        }
        let base = self.resolved().base;
        base.rsplit_once('.').map_or(base, |(_, name)| name)
    }
}

/// Key space selector for [`field_map`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyBy {
    /// Key descriptors by record-field identifier.
    Field,
    /// Key descriptors by resolved output column name.
    Column,
}

/// Contract for a queryable record type: a diagnostic name, ordered data
/// sources, and one descriptor per field.
pub trait Model {
    const NAME: &'static str;
    const SOURCES: &'static [DataSource];
    const FIELDS: &'static [FieldDescriptor];
}

/// Derives the keyed descriptor map for `T` from its constant descriptor
/// table. Stateless; repeated calls yield identical results.
///
/// # Panics
///
/// * If a descriptor's column carries a malformed inline converter marker
#[must_use]
pub fn field_map<T: Model>(key_by: KeyBy) -> BTreeMap<&'static str, &'static FieldDescriptor> {
    T::FIELDS
        .iter()
        .map(|descriptor| {
            let key = match key_by {
                KeyBy::Field => descriptor.field,
                KeyBy::Column => descriptor.output_name(),
            };
            (key, descriptor)
        })
        .collect()
}
