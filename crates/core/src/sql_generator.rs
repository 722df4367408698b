use thiserror::Error;

use crate::schema_cache::MAIN_SCHEMA;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SqlGenerationError {
    #[error("schema name cannot be empty")]
    EmptySchemaName,
    #[error("table name cannot be empty")]
    EmptyTableName,
    #[error("column name cannot be empty")]
    EmptyColumnName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationDirection {
    Next,
    Previous,
}

/// A table addressed by name, optionally qualified by an attached schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlTarget<'a> {
    pub schema: Option<&'a str>,
    pub table: &'a str,
}

impl<'a> SqlTarget<'a> {
    pub fn new(schema: Option<&'a str>, table: &'a str) -> Result<Self, SqlGenerationError> {
        if table.trim().is_empty() {
            return Err(SqlGenerationError::EmptyTableName);
        }
        if let Some(schema_name) = schema {
            if schema_name.trim().is_empty() {
                return Err(SqlGenerationError::EmptySchemaName);
            }
        }
        Ok(Self { schema, table })
    }

    fn schema_or_main(&self) -> &str {
        self.schema.unwrap_or(MAIN_SCHEMA)
    }
}

#[must_use]
pub fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

#[must_use]
pub fn quote_sql_string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Numbers in canonical form pass through unquoted, `NULL` stays a keyword,
/// everything else (including `007` or `1e3`) becomes a string literal.
#[must_use]
pub fn quote_sql_literal(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("null") {
        return "NULL".to_string();
    }
    if is_canonical_number(trimmed) {
        trimmed.to_string()
    } else {
        quote_sql_string(trimmed)
    }
}

fn is_canonical_number(text: &str) -> bool {
    if let Ok(integer) = text.parse::<i64>() {
        return integer.to_string() == text;
    }
    text.parse::<f64>()
        .is_ok_and(|number| number.is_finite() && number.to_string() == text)
}

fn qualified_table_sql(target: &SqlTarget<'_>) -> String {
    match target.schema {
        Some(schema) if schema != MAIN_SCHEMA => format!(
            "{}.{}",
            quote_identifier(schema),
            quote_identifier(target.table)
        ),
        _ => quote_identifier(target.table),
    }
}

#[must_use]
pub fn preview_select_sql(target: &SqlTarget<'_>, limit: usize) -> String {
    format!(
        "SELECT * FROM {} LIMIT {}",
        qualified_table_sql(target),
        limit
    )
}

#[must_use]
pub fn offset_page_sql(target: &SqlTarget<'_>, limit: usize, offset: usize) -> String {
    format!(
        "SELECT * FROM {} LIMIT {} OFFSET {}",
        qualified_table_sql(target),
        limit,
        offset
    )
}

/// Offset of the neighbouring page, or `None` when already on the first page.
#[must_use]
pub fn adjacent_page_offset(
    current_offset: usize,
    limit: usize,
    direction: PaginationDirection,
) -> Option<usize> {
    match direction {
        PaginationDirection::Next => current_offset.checked_add(limit),
        PaginationDirection::Previous => {
            (current_offset > 0).then(|| current_offset.saturating_sub(limit))
        }
    }
}

#[must_use]
pub fn describe_table_sql(target: &SqlTarget<'_>) -> String {
    format!(
        "PRAGMA {}.table_info({})",
        quote_identifier(target.schema_or_main()),
        quote_identifier(target.table)
    )
}

#[must_use]
pub fn show_index_sql(target: &SqlTarget<'_>) -> String {
    format!(
        "PRAGMA {}.index_list({})",
        quote_identifier(target.schema_or_main()),
        quote_identifier(target.table)
    )
}

#[must_use]
pub fn show_create_table_sql(target: &SqlTarget<'_>) -> String {
    let master = if target.schema == Some("temp") {
        "sqlite_temp_master".to_string()
    } else {
        format!("{}.sqlite_master", quote_identifier(target.schema_or_main()))
    };
    format!(
        "SELECT sql FROM {master} WHERE name = {} AND sql IS NOT NULL",
        quote_sql_string(target.table)
    )
}

#[must_use]
pub fn count_rows_sql(target: &SqlTarget<'_>) -> String {
    format!(
        "SELECT COUNT(*) AS row_count FROM {}",
        qualified_table_sql(target)
    )
}

pub fn select_column_preview_sql(
    target: &SqlTarget<'_>,
    column: &str,
    limit: usize,
) -> Result<String, SqlGenerationError> {
    if column.trim().is_empty() {
        return Err(SqlGenerationError::EmptyColumnName);
    }

    Ok(format!(
        "SELECT {} FROM {} LIMIT {}",
        quote_identifier(column),
        qualified_table_sql(target),
        limit
    ))
}

pub fn distinct_values_sql(
    target: &SqlTarget<'_>,
    column: &str,
    limit: usize,
) -> Result<String, SqlGenerationError> {
    if column.trim().is_empty() {
        return Err(SqlGenerationError::EmptyColumnName);
    }

    let quoted_column = quote_identifier(column);
    Ok(format!(
        "SELECT {quoted_column}, COUNT(*) AS occurrences FROM {} \
         GROUP BY {quoted_column} ORDER BY occurrences DESC LIMIT {limit}",
        qualified_table_sql(target)
    ))
}

#[cfg(test)]
mod tests {
    use super::{
        adjacent_page_offset, count_rows_sql, describe_table_sql, distinct_values_sql,
        offset_page_sql, preview_select_sql, quote_identifier, quote_sql_literal,
        select_column_preview_sql, show_create_table_sql, show_index_sql, PaginationDirection,
        SqlGenerationError, SqlTarget,
    };

    #[test]
    fn quotes_identifiers_with_double_quotes() {
        assert_eq!(quote_identifier("users"), "\"users\"");
        assert_eq!(quote_identifier("odd\"name"), "\"odd\"\"name\"");
    }

    #[test]
    fn literals_keep_numbers_and_null_unquoted() {
        assert_eq!(quote_sql_literal(" 42 "), "42");
        assert_eq!(quote_sql_literal("-3.5"), "-3.5");
        assert_eq!(quote_sql_literal("null"), "NULL");
        assert_eq!(quote_sql_literal("O'Brien"), "'O''Brien'");
        assert_eq!(quote_sql_literal("inf"), "'inf'");
        assert_eq!(quote_sql_literal("NaN"), "'NaN'");
    }

    #[test]
    fn numbers_with_leading_zeros_stay_text() {
        assert_eq!(quote_sql_literal("007"), "'007'");
        assert_eq!(quote_sql_literal("+5"), "'+5'");
        assert_eq!(quote_sql_literal("00.5"), "'00.5'");
        assert_eq!(quote_sql_literal("1e3"), "'1e3'");
        assert_eq!(quote_sql_literal("0"), "0");
        assert_eq!(quote_sql_literal("0.25"), "0.25");
        assert_eq!(quote_sql_literal("-12"), "-12");
    }

    #[test]
    fn main_schema_is_left_unqualified() {
        let main = SqlTarget::new(Some("main"), "users").expect("valid target");
        let bare = SqlTarget::new(None, "users").expect("valid target");
        let attached = SqlTarget::new(Some("archive"), "users").expect("valid target");

        assert_eq!(preview_select_sql(&main, 200), "SELECT * FROM \"users\" LIMIT 200");
        assert_eq!(preview_select_sql(&bare, 200), "SELECT * FROM \"users\" LIMIT 200");
        assert_eq!(
            preview_select_sql(&attached, 10),
            "SELECT * FROM \"archive\".\"users\" LIMIT 10"
        );
    }

    #[test]
    fn generates_pragma_introspection_statements() {
        let target = SqlTarget::new(None, "users").expect("valid target");

        assert_eq!(
            describe_table_sql(&target),
            "PRAGMA \"main\".table_info(\"users\")"
        );
        assert_eq!(
            show_index_sql(&target),
            "PRAGMA \"main\".index_list(\"users\")"
        );
        assert_eq!(
            show_create_table_sql(&target),
            "SELECT sql FROM \"main\".sqlite_master WHERE name = 'users' AND sql IS NOT NULL"
        );

        let temp = SqlTarget::new(Some("temp"), "scratch").expect("valid target");
        assert_eq!(
            show_create_table_sql(&temp),
            "SELECT sql FROM sqlite_temp_master WHERE name = 'scratch' AND sql IS NOT NULL"
        );
    }

    #[test]
    fn generates_count_and_column_statements() {
        let target = SqlTarget::new(None, "users").expect("valid target");

        assert_eq!(
            count_rows_sql(&target),
            "SELECT COUNT(*) AS row_count FROM \"users\""
        );
        assert_eq!(
            select_column_preview_sql(&target, "email", 50).expect("sql"),
            "SELECT \"email\" FROM \"users\" LIMIT 50"
        );
        assert_eq!(
            distinct_values_sql(&target, "email", 20).expect("sql"),
            "SELECT \"email\", COUNT(*) AS occurrences FROM \"users\" \
             GROUP BY \"email\" ORDER BY occurrences DESC LIMIT 20"
        );
        assert_eq!(
            select_column_preview_sql(&target, " ", 50),
            Err(SqlGenerationError::EmptyColumnName)
        );
    }

    #[test]
    fn rejects_empty_names() {
        assert_eq!(
            SqlTarget::new(None, ""),
            Err(SqlGenerationError::EmptyTableName)
        );
        assert_eq!(
            SqlTarget::new(Some(" "), "users"),
            Err(SqlGenerationError::EmptySchemaName)
        );
    }

    #[test]
    fn offset_pagination_moves_between_pages() {
        let target = SqlTarget::new(None, "events").expect("valid target");
        assert_eq!(
            offset_page_sql(&target, 100, 300),
            "SELECT * FROM \"events\" LIMIT 100 OFFSET 300"
        );

        assert_eq!(
            adjacent_page_offset(0, 100, PaginationDirection::Next),
            Some(100)
        );
        assert_eq!(
            adjacent_page_offset(0, 100, PaginationDirection::Previous),
            None
        );
        assert_eq!(
            adjacent_page_offset(50, 100, PaginationDirection::Previous),
            Some(0)
        );
        assert_eq!(
            adjacent_page_offset(300, 100, PaginationDirection::Previous),
            Some(200)
        );
    }
}
