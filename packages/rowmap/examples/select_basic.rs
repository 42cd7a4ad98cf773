use rowmap::{
    Connection, SqlValue,
    mapper::Mapper,
    model::{DataSource, FieldDescriptor, FieldType, Model},
    simulator::SimulatorConnection,
};

struct Track;

impl Model for Track {
    const NAME: &'static str = "Track";
    const SOURCES: &'static [DataSource] = &[DataSource::new("from", "tracks", "t")];
    const FIELDS: &'static [FieldDescriptor] = &[
        FieldDescriptor::new("id").column("t.id").typed(FieldType::Int),
        FieldDescriptor::new("plays")
            .column("t.plays->withBonus")
            .typed(FieldType::Int),
        FieldDescriptor::new("title").column("t.title"),
    ];
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let connection = SimulatorConnection::new();
    connection.connect(5).await?;
    connection
        .instance()
        .await
        .ok_or("missing database rows instance")?
        .exec_raw(
            "create table tracks (id integer, title text, plays integer);
             insert into tracks values
               (1, 'Bold Horizon', 14),
               (2, 'Silver Line', 3),
               (3, 'Nightdrive', 42);",
        )
        .await?;

    let mut mapper = Mapper::new(Box::new(connection));
    mapper.register_column_convert("withBonus", "$column + 100");

    let rows = mapper
        .select::<Track>(
            "where t.plays > :min",
            None,
            0,
            &[("min", SqlValue::Int(10))],
        )
        .await?;

    for row in &rows {
        println!(
            "{:?} {:?} plays={:?}",
            row.get("id"),
            row.get("title"),
            row.get("plays")
        );
    }

    Ok(())
}
