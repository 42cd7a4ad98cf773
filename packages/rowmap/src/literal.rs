//! Rendering of [`SqlValue`]s as inline SQL literal text.

use chrono::SecondsFormat;

use crate::SqlValue;

/// Renders `value` as inline SQL literal text.
///
/// Strings are single-quoted with embedded quotes doubled, timestamps render
/// as an RFC 3339 `cast(.. as timestamp)`, and arrays render element-wise as
/// `ARRAY[..]` with a comma-joined body.
#[must_use]
pub fn to_sql_literal(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Bool(value) => value.to_string(),
        SqlValue::Int(value) => value.to_string(),
        SqlValue::UInt(value) => value.to_string(),
        SqlValue::Real(value) => value.to_string(),
        SqlValue::Text(value) => quote(value),
        SqlValue::Bytes(value) => format!(
            "ARRAY[{}]",
            value
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",")
        ),
        SqlValue::DateTime(value) => format!(
            "cast('{}' as timestamp)",
            value.and_utc().to_rfc3339_opts(SecondsFormat::Secs, true)
        ),
        SqlValue::Array(values) => format!(
            "ARRAY[{}]",
            values
                .iter()
                .map(to_sql_literal)
                .collect::<Vec<_>>()
                .join(",")
        ),
    }
}

/// Single-quotes a string literal, doubling embedded single quotes so quote
/// characters cannot terminate the literal early.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn scalars_render_bare() {
        assert_eq!(to_sql_literal(&SqlValue::Null), "NULL");
        assert_eq!(to_sql_literal(&SqlValue::Bool(true)), "true");
        assert_eq!(to_sql_literal(&SqlValue::Int(-7)), "-7");
        assert_eq!(to_sql_literal(&SqlValue::UInt(7)), "7");
        assert_eq!(to_sql_literal(&SqlValue::Real(1.5)), "1.5");
    }

    #[test]
    fn reals_render_without_exponent_noise() {
        assert_eq!(to_sql_literal(&SqlValue::Real(42.0)), "42");
        assert_eq!(to_sql_literal(&SqlValue::Real(0.000_1)), "0.0001");
    }

    #[test]
    fn strings_are_quoted_and_embedded_quotes_doubled() {
        assert_eq!(
            to_sql_literal(&SqlValue::Text("it's".to_string())),
            "'it''s'"
        );
        assert_eq!(
            to_sql_literal(&SqlValue::Text("'; drop table users; --".to_string())),
            "'''; drop table users; --'"
        );
    }

    #[test]
    fn bytes_render_as_decimal_octet_arrays() {
        assert_eq!(
            to_sql_literal(&SqlValue::Bytes(vec![1, 2, 255])),
            "ARRAY[1,2,255]"
        );
    }

    #[test]
    fn datetimes_render_as_timestamp_casts() {
        let datetime = NaiveDate::from_ymd_opt(2024, 2, 1)
            .unwrap()
            .and_hms_opt(13, 37, 42)
            .unwrap();

        assert_eq!(
            to_sql_literal(&SqlValue::DateTime(datetime)),
            "cast('2024-02-01T13:37:42Z' as timestamp)"
        );
    }

    #[test]
    fn arrays_render_element_wise() {
        assert_eq!(
            to_sql_literal(&SqlValue::Array(vec![
                SqlValue::Int(1),
                SqlValue::Text("a'b".to_string()),
                SqlValue::Bool(false),
            ])),
            "ARRAY[1,'a''b',false]"
        );
    }
}
