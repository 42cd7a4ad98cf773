use std::sync::LazyLock;

use regex::Regex;

use crate::{SqlValue, literal::to_sql_literal};

static PLACEHOLDER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":([A-Za-z_][A-Za-z0-9_]*)").expect("Invalid Regex"));

/// Substitutes `:name` placeholders in `query` with the SQL literal
/// rendering of the matching argument.
///
/// Each complete placeholder is matched exactly once, so `:id` never
/// clobbers the prefix of `:id2`. Placeholders without a matching argument
/// are left untouched.
#[must_use]
pub fn substitute(query: &str, args: &[(&str, SqlValue)]) -> String {
    if args.is_empty() {
        return query.to_string();
    }

    PLACEHOLDER_REGEX
        .replace_all(query, |caps: &regex::Captures<'_>| {
            args.iter()
                .find(|(name, _)| *name == &caps[1])
                .map_or_else(|| caps[0].to_string(), |(_, value)| to_sql_literal(value))
        })
        .into_owned()
}
