#![cfg(feature = "simulator")]

use pretty_assertions::assert_eq;
use rowmap::{
    Connection, Row, SqlValue,
    convert::ConvertError,
    mapper::Mapper,
    model::{DataSource, FieldDescriptor, FieldType, Model},
    simulator::SimulatorConnection,
};

struct TestTypes;

impl Model for TestTypes {
    const NAME: &'static str = "TestTypes";
    const SOURCES: &'static [DataSource] = &[DataSource::new("from", "tt", "tt")];
    const FIELDS: &'static [FieldDescriptor] = &[
        FieldDescriptor::new("active")
            .column("tt.active")
            .read_with("ReadBool")
            .typed(FieldType::Bool),
        FieldDescriptor::new("data").column("tt.data"),
        FieldDescriptor::new("id").column("tt.id").typed(FieldType::Int),
        FieldDescriptor::new("name").column("tt.name"),
    ];
}

async fn connected_mapper() -> Mapper {
    let connection = SimulatorConnection::new();
    connection.connect(5).await.unwrap();
    connection
        .instance()
        .await
        .unwrap()
        .exec_raw(
            "create table tt (id integer, name text, active integer, age integer, data blob);
             insert into tt (id, name, active, age, data) values
               (1, 'first', 1, 20, x'68656c6c6f'),
               (2, 'second', 0, 30, null),
               (3, 'third', 1, 40, null);",
        )
        .await
        .unwrap();

    Mapper::new(Box::new(connection))
}

#[test_log::test(tokio::test)]
async fn select_materializes_every_row_under_field_names() {
    let mapper = connected_mapper().await;

    let rows = mapper.select::<TestTypes>("", None, 0, &[]).await.unwrap();

    assert_eq!(rows.len(), 3);
    // sqlite reports booleans as integers, so ReadBool collapses them to the
    // boolean zero value. The blob decodes through the text default.
    assert_eq!(
        rows[0],
        Row {
            fields: vec![
                ("active".into(), false.into()),
                ("data".into(), "hello".into()),
                ("id".into(), 1.into()),
                ("name".into(), "first".into()),
            ],
        }
    );
    assert_eq!(rows[1].get("data"), Some(SqlValue::Null));
    assert_eq!(rows[2].get("name"), Some("third".into()));
}

#[test_log::test(tokio::test)]
async fn where_placeholders_substitute_from_args() {
    let mapper = connected_mapper().await;

    let rows = mapper
        .select::<TestTypes>("where tt.id = :id", None, 0, &[("id", SqlValue::Int(2))])
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("name"), Some("second".into()));
}

#[test_log::test(tokio::test)]
async fn limit_and_offset_page_through_results() {
    let mapper = connected_mapper().await;

    let rows = mapper
        .select::<TestTypes>("order by tt.id", Some(1), 1, &[])
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("id"), Some(SqlValue::Int(2)));
}

struct UpperNames;

impl Model for UpperNames {
    const NAME: &'static str = "UpperNames";
    const SOURCES: &'static [DataSource] = &[DataSource::new("from", "tt", "tt")];
    const FIELDS: &'static [FieldDescriptor] = &[
        FieldDescriptor::new("name").column("tt.name").read_with("Upper"),
    ];
}

#[test_log::test(tokio::test)]
async fn registered_value_converters_transform_cells() {
    let mut mapper = connected_mapper().await;
    mapper.register_converter("Upper", |value, _column, field, row| match value {
        SqlValue::Text(text) => {
            row.set(field.field, SqlValue::Text(text.to_uppercase()));
            Ok(())
        }
        _ => Err(ConvertError::Custom(format!("expected text, got {value:?}"))),
    });

    let rows = mapper
        .select::<UpperNames>("where tt.id = 1", None, 0, &[])
        .await
        .unwrap();

    assert_eq!(rows[0].get("name"), Some("FIRST".into()));
}

struct WithComputedAge;

impl Model for WithComputedAge {
    const NAME: &'static str = "WithComputedAge";
    const SOURCES: &'static [DataSource] = &[DataSource::new("from", "tt", "tt")];
    const FIELDS: &'static [FieldDescriptor] = &[
        FieldDescriptor::new("age")
            .column("tt.age->addOne")
            .typed(FieldType::Int),
        FieldDescriptor::new("id").column("tt.id").typed(FieldType::Int),
    ];
}

#[test_log::test(tokio::test)]
async fn column_converter_templates_compute_in_sql() {
    let mut mapper = connected_mapper().await;
    mapper.register_column_convert("addOne", "$column + 1");

    let rows = mapper
        .select::<WithComputedAge>("where tt.id = 1", None, 0, &[])
        .await
        .unwrap();

    assert_eq!(rows[0].get("age"), Some(SqlValue::Int(21)));
}

struct SqliteVersion;

impl Model for SqliteVersion {
    const NAME: &'static str = "SqliteVersion";
    const SOURCES: &'static [DataSource] = &[DataSource::new(
        "from",
        "(select sqlite_version() as version)",
        "v",
    )];
    const FIELDS: &'static [FieldDescriptor] =
        &[FieldDescriptor::new("version").column("v.version")];
}

#[test_log::test(tokio::test)]
async fn select_connects_on_demand() {
    let mapper = Mapper::new(Box::new(SimulatorConnection::new()));

    let rows = mapper.select::<SqliteVersion>("", None, 0, &[]).await.unwrap();

    assert_eq!(rows.len(), 1);
    assert!(matches!(rows[0].get("version"), Some(SqlValue::Text(_))));
    assert!(mapper.connection().is_connected().await);
}
