use std::{collections::BTreeMap, sync::LazyLock};

use regex::Regex;

use crate::model::{FieldDescriptor, KeyBy, Model, field_map};

static PLAIN_SOURCE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.]+$").expect("Invalid Regex"));

/// Builds the complete select statement for `T`.
///
/// Projections render in field order, sources in declaration order, then the
/// raw `where_clause` (always preceded by a single space, even when empty),
/// then `limit` when set and `offset` when positive.
///
/// # Panics
///
/// * If a descriptor names a column converter with no registered template
/// * If a descriptor's column carries a malformed inline converter marker
#[must_use]
pub fn build_select<T: Model>(
    where_clause: &str,
    limit: Option<u64>,
    offset: u64,
    templates: &BTreeMap<String, String>,
) -> String {
    let projections = field_map::<T>(KeyBy::Field)
        .values()
        .map(|descriptor| projection(descriptor, templates))
        .collect::<Vec<_>>()
        .join(", ");

    let mut query = format!("select {projections}");

    for source in T::SOURCES {
        query.push(' ');
        query.push_str(source.join);
        query.push(' ');
        query.push_str(&format_source(source.source));
        if !source.alias.is_empty() {
            query.push(' ');
            query.push_str(source.alias);
        }
    }

    query.push(' ');
    query.push_str(where_clause);

    if let Some(limit) = limit {
        query.push_str(&format!(" limit {limit}"));
    }
    if offset > 0 {
        query.push_str(&format!(" offset {offset}"));
    }

    query
}

/// Renders one descriptor as an aliased projection expression.
fn projection(descriptor: &FieldDescriptor, templates: &BTreeMap<String, String>) -> String {
    let resolved = descriptor.resolved();
    let column = if descriptor.source.is_empty() || resolved.base.contains('.') {
        resolved.base.to_string()
    } else {
        format!("{}.{}", descriptor.source, resolved.base)
    };

    let expression = if resolved.convert.is_empty() {
        if descriptor.read_sql.is_empty() {
            column
        } else {
            descriptor.read_sql.replace("$column", &column)
        }
    } else {
        let template = templates.get(resolved.convert).unwrap_or_else(|| {
            panic!(
                "no column converter template registered for '{}'",
                resolved.convert
            )
        });
        template.replace("$column", &column)
    };

    format!("{expression} as \"{}\"", descriptor.output_name())
}

/// Quotes each dot segment of a plain source name. Sources containing
/// anything beyond `[A-Za-z0-9_.]`, subqueries included, pass through
/// verbatim.
fn format_source(source: &str) -> String {
    if PLAIN_SOURCE_REGEX.is_match(source) {
        source
            .split('.')
            .map(|segment| format!("\"{segment}\""))
            .collect::<Vec<_>>()
            .join(".")
    } else {
        source.to_string()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{DataSource, FieldType};

    struct Person;

    impl Model for Person {
        const NAME: &'static str = "Person";
        const SOURCES: &'static [DataSource] = &[DataSource::new("from", "person", "p")];
        const FIELDS: &'static [FieldDescriptor] = &[
            FieldDescriptor::new("id").column("p.id").typed(FieldType::Int),
            FieldDescriptor::new("name").column("p.name"),
        ];
    }

    #[test]
    fn select_lists_projections_in_field_order() {
        let query = build_select::<Person>("where p.id = 1", None, 0, &BTreeMap::new());

        assert_eq!(
            query,
            "select p.id as \"id\", p.name as \"name\" from \"person\" p where p.id = 1"
        );
    }

    #[test]
    fn empty_where_clause_still_gets_its_separator() {
        let query = build_select::<Person>("", None, 0, &BTreeMap::new());

        assert_eq!(
            query,
            "select p.id as \"id\", p.name as \"name\" from \"person\" p "
        );
    }

    #[test]
    fn limit_and_offset_render_only_when_set() {
        let templates = BTreeMap::new();

        assert!(
            build_select::<Person>("", Some(10), 5, &templates)
                .ends_with(" limit 10 offset 5")
        );
        assert!(build_select::<Person>("", Some(0), 0, &templates).ends_with(" limit 0"));
        assert!(!build_select::<Person>("", None, 0, &templates).contains("offset"));
    }

    struct TrackWithAlbum;

    impl Model for TrackWithAlbum {
        const NAME: &'static str = "TrackWithAlbum";
        const SOURCES: &'static [DataSource] = &[
            DataSource::new("from", "tracks", "t"),
            DataSource::new("join", "albums", "a"),
        ];
        const FIELDS: &'static [FieldDescriptor] = &[
            FieldDescriptor::new("album").column("a.name").alias("album"),
            FieldDescriptor::new("title").column("t.title"),
        ];
    }

    #[test]
    fn sources_render_in_declaration_order() {
        let query =
            build_select::<TrackWithAlbum>("where a.id = t.album_id", None, 0, &BTreeMap::new());

        assert_eq!(
            query,
            "select a.name as \"album\", t.title as \"title\" \
             from \"tracks\" t join \"albums\" a where a.id = t.album_id"
        );
    }

    struct SchemaQualified;

    impl Model for SchemaQualified {
        const NAME: &'static str = "SchemaQualified";
        const SOURCES: &'static [DataSource] =
            &[DataSource::new("from", "public.person", "p")];
        const FIELDS: &'static [FieldDescriptor] =
            &[FieldDescriptor::new("id").column("p.id").typed(FieldType::Int)];
    }

    #[test]
    fn qualified_sources_quote_each_segment() {
        let query = build_select::<SchemaQualified>("", None, 0, &BTreeMap::new());

        assert_eq!(
            query,
            "select p.id as \"id\" from \"public\".\"person\" p "
        );
    }

    struct Version;

    impl Model for Version {
        const NAME: &'static str = "Version";
        const SOURCES: &'static [DataSource] = &[DataSource::new(
            "from",
            "(select sqlite_version() as version)",
            "v",
        )];
        const FIELDS: &'static [FieldDescriptor] =
            &[FieldDescriptor::new("version").column("v.version")];
    }

    #[test]
    fn subquery_sources_pass_through_verbatim() {
        let query = build_select::<Version>("", None, 0, &BTreeMap::new());

        assert_eq!(
            query,
            "select v.version as \"version\" from (select sqlite_version() as version) v "
        );
    }

    struct Computed;

    impl Model for Computed {
        const NAME: &'static str = "Computed";
        const SOURCES: &'static [DataSource] = &[DataSource::new("from", "person", "p")];
        const FIELDS: &'static [FieldDescriptor] = &[
            FieldDescriptor::new("age")
                .column("p.age->addOne")
                .typed(FieldType::Int),
        ];
    }

    #[test]
    fn computed_columns_expand_the_registered_template() {
        let mut templates = BTreeMap::new();
        templates.insert("addOne".to_string(), "$column + 1".to_string());

        let query = build_select::<Computed>("", None, 0, &templates);

        assert_eq!(query, "select p.age + 1 as \"age\" from \"person\" p ");
    }

    #[test]
    #[should_panic(expected = "no column converter template registered for 'addOne'")]
    fn unregistered_column_converter_panics() {
        build_select::<Computed>("", None, 0, &BTreeMap::new());
    }

    struct Transformed;

    impl Model for Transformed {
        const NAME: &'static str = "Transformed";
        const SOURCES: &'static [DataSource] = &[DataSource::new("from", "person", "p")];
        const FIELDS: &'static [FieldDescriptor] = &[
            FieldDescriptor::new("created")
                .column("created")
                .source("p")
                .read_sql("datetime($column)")
                .typed(FieldType::DateTime),
        ];
    }

    #[test]
    fn read_templates_wrap_the_source_prefixed_column() {
        let query = build_select::<Transformed>("", None, 0, &BTreeMap::new());

        assert_eq!(
            query,
            "select datetime(p.created) as \"created\" from \"person\" p "
        );
    }
}
