//! Point-and-click query construction.
//!
//! The builder holds the user's selection (tables, columns, joins, filters,
//! grouping, ordering and a limit) and renders it into a single SELECT.
//! Selections are validated against the loaded schema with
//! [`QueryBuilder::prune_to`].

use std::fmt;

use thiserror::Error;

use crate::schema_cache::{related_tables, RelationshipDirection, SchemaCatalog};
use crate::sql_generator::{quote_identifier, quote_sql_literal};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    #[must_use]
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }

    fn to_sql(&self, qualify: bool) -> String {
        if qualify {
            format!(
                "{}.{}",
                quote_identifier(&self.table),
                quote_identifier(&self.column)
            )
        } else {
            quote_identifier(&self.column)
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Cross,
}

impl JoinKind {
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
            Self::Cross => "CROSS JOIN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinClause {
    pub kind: JoinKind,
    pub table: String,
    /// `(left, right)` pairs where `right` belongs to the joined table.
    pub on: Vec<(ColumnRef, ColumnRef)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,
    NotLike,
    In,
    IsNull,
    IsNotNull,
}

impl ComparisonOperator {
    pub const ALL: [Self; 11] = [
        Self::Eq,
        Self::NotEq,
        Self::Lt,
        Self::LtEq,
        Self::Gt,
        Self::GtEq,
        Self::Like,
        Self::NotLike,
        Self::In,
        Self::IsNull,
        Self::IsNotNull,
    ];

    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::In => "IN",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        }
    }

    #[must_use]
    pub fn takes_value(self) -> bool {
        !matches!(self, Self::IsNull | Self::IsNotNull)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Conjunction {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub column: ColumnRef,
    pub operator: ComparisonOperator,
    pub value: Option<String>,
    /// How this condition attaches to the previous one; ignored for the first.
    pub conjunction: Conjunction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTerm {
    pub column: ColumnRef,
    pub direction: SortDirection,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryBuildError {
    #[error("select at least one table")]
    NoTables,
    #[error("column `{0}` belongs to a table that is not selected")]
    UnselectedTable(ColumnRef),
    #[error("join with `{0}` needs at least one ON column pair")]
    MissingJoinCondition(String),
    #[error("condition on `{0}` needs a value")]
    MissingConditionValue(ColumnRef),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryBuilder {
    tables: Vec<String>,
    columns: Vec<ColumnRef>,
    distinct: bool,
    joins: Vec<JoinClause>,
    conditions: Vec<Condition>,
    group_by: Vec<ColumnRef>,
    order_by: Vec<OrderTerm>,
    limit: Option<usize>,
}

impl QueryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnRef] {
        &self.columns
    }

    #[must_use]
    pub fn joins(&self) -> &[JoinClause] {
        &self.joins
    }

    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    #[must_use]
    pub fn group_by(&self) -> &[ColumnRef] {
        &self.group_by
    }

    #[must_use]
    pub fn order_by(&self) -> &[OrderTerm] {
        &self.order_by
    }

    #[must_use]
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    #[must_use]
    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    #[must_use]
    pub fn is_table_selected(&self, table: &str) -> bool {
        self.tables.iter().any(|selected| selected == table)
    }

    #[must_use]
    pub fn is_column_selected(&self, column: &ColumnRef) -> bool {
        self.columns.contains(column)
    }

    /// Adds the table when absent, removes it (and everything that refers
    /// to it) when present. Returns whether the table is now selected.
    pub fn toggle_table(&mut self, table: &str) -> bool {
        if self.is_table_selected(table) {
            self.remove_table(table);
            false
        } else {
            self.tables.push(table.to_string());
            true
        }
    }

    /// Adds the column when absent, removes it when present. Selecting a
    /// column also selects its table. Returns whether the column is now
    /// selected.
    pub fn toggle_column(&mut self, column: ColumnRef) -> bool {
        if let Some(position) = self.columns.iter().position(|selected| selected == &column) {
            self.columns.remove(position);
            return false;
        }
        if !self.is_table_selected(&column.table) {
            self.tables.push(column.table.clone());
        }
        self.columns.push(column);
        true
    }

    pub fn set_distinct(&mut self, distinct: bool) {
        self.distinct = distinct;
    }

    pub fn set_limit(&mut self, limit: Option<usize>) {
        self.limit = limit;
    }

    pub fn add_join(&mut self, join: JoinClause) {
        if !self.is_table_selected(&join.table) {
            self.tables.push(join.table.clone());
        }
        self.joins.retain(|existing| existing.table != join.table);
        self.joins.push(join);
    }

    pub fn add_condition(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }

    pub fn remove_condition(&mut self, index: usize) -> Option<Condition> {
        (index < self.conditions.len()).then(|| self.conditions.remove(index))
    }

    pub fn add_group_by(&mut self, column: ColumnRef) {
        if !self.group_by.contains(&column) {
            self.group_by.push(column);
        }
    }

    /// Adds an ORDER BY term, or flips its direction when the column is
    /// already ordered.
    pub fn toggle_order_by(&mut self, column: ColumnRef) {
        if let Some(term) = self.order_by.iter_mut().find(|term| term.column == column) {
            term.direction = match term.direction {
                SortDirection::Asc => SortDirection::Desc,
                SortDirection::Desc => SortDirection::Asc,
            };
            return;
        }
        self.order_by.push(OrderTerm {
            column,
            direction: SortDirection::Asc,
        });
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Drops every table, column and clause that no longer exists in
    /// `catalog`. Returns the number of removed items.
    pub fn prune_to(&mut self, catalog: &SchemaCatalog) -> usize {
        let before = self.item_count();

        let stale_tables = self
            .tables
            .iter()
            .filter(|table| catalog.resolve_table(table).is_none())
            .cloned()
            .collect::<Vec<_>>();
        for table in stale_tables {
            self.remove_table(&table);
        }

        let column_exists = |column: &ColumnRef| {
            catalog
                .resolve_table(&column.table)
                .is_some_and(|(_, table)| table.column(&column.column).is_some())
        };
        self.columns.retain(|column| column_exists(column));
        self.conditions
            .retain(|condition| column_exists(&condition.column));
        self.group_by.retain(|column| column_exists(column));
        self.order_by.retain(|term| column_exists(&term.column));
        self.joins.retain(|join| {
            join.on
                .iter()
                .all(|(left, right)| column_exists(left) && column_exists(right))
        });

        before - self.item_count()
    }

    /// Renders the selection as a SELECT statement.
    pub fn build(&self) -> Result<String, QueryBuildError> {
        let from_table = self.tables.first().ok_or(QueryBuildError::NoTables)?;
        let qualify = self.tables.len() > 1;

        for column in self
            .columns
            .iter()
            .chain(self.group_by.iter())
            .chain(self.order_by.iter().map(|term| &term.column))
            .chain(self.conditions.iter().map(|condition| &condition.column))
        {
            if !self.is_table_selected(&column.table) {
                return Err(QueryBuildError::UnselectedTable(column.clone()));
            }
        }

        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        if self.columns.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(
                &self
                    .columns
                    .iter()
                    .map(|column| column.to_sql(qualify))
                    .collect::<Vec<_>>()
                    .join(", "),
            );
        }

        sql.push_str("\nFROM ");
        sql.push_str(&quote_identifier(from_table));

        for table in self.tables.iter().skip(1) {
            match self.joins.iter().find(|join| &join.table == table) {
                Some(join) => {
                    sql.push('\n');
                    sql.push_str(join.kind.keyword());
                    sql.push(' ');
                    sql.push_str(&quote_identifier(table));
                    if join.kind != JoinKind::Cross {
                        if join.on.is_empty() {
                            return Err(QueryBuildError::MissingJoinCondition(table.clone()));
                        }
                        let on = join
                            .on
                            .iter()
                            .map(|(left, right)| {
                                format!("{} = {}", left.to_sql(true), right.to_sql(true))
                            })
                            .collect::<Vec<_>>()
                            .join(" AND ");
                        sql.push_str(" ON ");
                        sql.push_str(&on);
                    }
                }
                None => {
                    sql.push_str(", ");
                    sql.push_str(&quote_identifier(table));
                }
            }
        }

        if !self.conditions.is_empty() {
            sql.push_str("\nWHERE ");
            for (index, condition) in self.conditions.iter().enumerate() {
                if index > 0 {
                    sql.push_str(match condition.conjunction {
                        Conjunction::And => " AND ",
                        Conjunction::Or => " OR ",
                    });
                }
                sql.push_str(&render_condition(condition, qualify)?);
            }
        }

        if !self.group_by.is_empty() {
            sql.push_str("\nGROUP BY ");
            sql.push_str(
                &self
                    .group_by
                    .iter()
                    .map(|column| column.to_sql(qualify))
                    .collect::<Vec<_>>()
                    .join(", "),
            );
        }

        if !self.order_by.is_empty() {
            sql.push_str("\nORDER BY ");
            sql.push_str(
                &self
                    .order_by
                    .iter()
                    .map(|term| {
                        let direction = match term.direction {
                            SortDirection::Asc => "ASC",
                            SortDirection::Desc => "DESC",
                        };
                        format!("{} {direction}", term.column.to_sql(qualify))
                    })
                    .collect::<Vec<_>>()
                    .join(", "),
            );
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!("\nLIMIT {limit}"));
        }

        Ok(sql)
    }

    fn remove_table(&mut self, table: &str) {
        self.tables.retain(|selected| selected != table);
        self.columns.retain(|column| column.table != table);
        self.conditions
            .retain(|condition| condition.column.table != table);
        self.group_by.retain(|column| column.table != table);
        self.order_by.retain(|term| term.column.table != table);
        self.joins.retain(|join| {
            join.table != table
                && join
                    .on
                    .iter()
                    .all(|(left, right)| left.table != table && right.table != table)
        });
    }

    fn item_count(&self) -> usize {
        self.tables.len()
            + self.columns.len()
            + self.joins.len()
            + self.conditions.len()
            + self.group_by.len()
            + self.order_by.len()
    }
}

fn render_condition(condition: &Condition, qualify: bool) -> Result<String, QueryBuildError> {
    let column = condition.column.to_sql(qualify);
    let operator = condition.operator;
    if !operator.takes_value() {
        return Ok(format!("{column} {}", operator.symbol()));
    }

    let value = condition
        .value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| QueryBuildError::MissingConditionValue(condition.column.clone()))?;

    let rendered = if operator == ComparisonOperator::In {
        let items = value
            .trim_start_matches('(')
            .trim_end_matches(')')
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(quote_sql_literal)
            .collect::<Vec<_>>();
        if items.is_empty() {
            return Err(QueryBuildError::MissingConditionValue(
                condition.column.clone(),
            ));
        }
        format!("({})", items.join(", "))
    } else {
        quote_sql_literal(value)
    };

    Ok(format!("{column} {} {rendered}", operator.symbol()))
}

const CONDITION_SYMBOLS: [(&str, ComparisonOperator); 7] = [
    ("!=", ComparisonOperator::NotEq),
    ("<>", ComparisonOperator::NotEq),
    ("<=", ComparisonOperator::LtEq),
    (">=", ComparisonOperator::GtEq),
    ("=", ComparisonOperator::Eq),
    ("<", ComparisonOperator::Lt),
    (">", ComparisonOperator::Gt),
];
const CONDITION_KEYWORDS: [(&str, ComparisonOperator); 5] = [
    ("is not null", ComparisonOperator::IsNotNull),
    ("is null", ComparisonOperator::IsNull),
    ("not like", ComparisonOperator::NotLike),
    ("like", ComparisonOperator::Like),
    ("in", ComparisonOperator::In),
];

/// Parses filter text such as `>= 10`, `like %ann%`, `in 1, 2` or
/// `is null` into a condition on `column`. A leading `or` attaches the
/// condition with OR instead of AND.
#[must_use]
pub fn parse_condition(column: ColumnRef, input: &str) -> Option<Condition> {
    let mut rest = input.trim();
    let mut conjunction = Conjunction::And;
    if let Some(stripped) = strip_keyword(rest, "or") {
        conjunction = Conjunction::Or;
        rest = stripped;
    } else if let Some(stripped) = strip_keyword(rest, "and") {
        rest = stripped;
    }

    let (operator, value) = CONDITION_SYMBOLS
        .iter()
        .find_map(|(symbol, operator)| {
            rest.strip_prefix(*symbol).map(|value| (*operator, value))
        })
        .or_else(|| {
            CONDITION_KEYWORDS.iter().find_map(|(keyword, operator)| {
                strip_keyword(rest, keyword).map(|value| (*operator, value))
            })
        })?;

    let value = value.trim();
    let value = if operator.takes_value() {
        if value.is_empty() {
            return None;
        }
        Some(value.to_string())
    } else {
        if !value.is_empty() {
            return None;
        }
        None
    };

    Some(Condition {
        column,
        operator,
        value,
        conjunction,
    })
}

/// Strips a case-insensitive keyword followed by whitespace or the end of input.
fn strip_keyword<'a>(input: &'a str, keyword: &str) -> Option<&'a str> {
    let head = input.get(..keyword.len())?;
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }
    let rest = &input[keyword.len()..];
    (rest.is_empty() || rest.starts_with(char::is_whitespace)).then(|| rest.trim_start())
}

/// Derives an INNER JOIN between `left` and `right` from foreign keys in
/// either direction, looked up in the schema that holds `left`.
#[must_use]
pub fn suggest_join(catalog: &SchemaCatalog, left: &str, right: &str) -> Option<JoinClause> {
    let (schema, _) = catalog.resolve_table(left)?;
    let on = related_tables(schema, left)
        .into_iter()
        .filter(|relationship| relationship.related_table.eq_ignore_ascii_case(right))
        .map(|relationship| {
            let left_column = ColumnRef::new(left, relationship.source_column);
            let right_column = ColumnRef::new(right, relationship.related_column);
            (relationship.direction, left_column, right_column)
        })
        .min_by_key(|(direction, _, _)| *direction == RelationshipDirection::Inbound)
        .map(|(_, left_column, right_column)| vec![(left_column, right_column)])?;

    Some(JoinClause {
        kind: JoinKind::Inner,
        table: right.to_string(),
        on,
    })
}

#[cfg(test)]
mod tests {
    use super::{
        parse_condition, suggest_join, ColumnRef, ComparisonOperator, Condition, Conjunction, JoinClause,
        JoinKind, QueryBuildError, QueryBuilder,
    };
    use crate::schema_cache::fixtures::sample_catalog;

    fn condition(
        table: &str,
        column: &str,
        operator: ComparisonOperator,
        value: Option<&str>,
    ) -> Condition {
        Condition {
            column: ColumnRef::new(table, column),
            operator,
            value: value.map(str::to_string),
            conjunction: Conjunction::And,
        }
    }

    #[test]
    fn empty_builder_requires_a_table() {
        assert_eq!(QueryBuilder::new().build(), Err(QueryBuildError::NoTables));
    }

    #[test]
    fn single_table_without_columns_selects_star() {
        let mut builder = QueryBuilder::new();
        assert!(builder.toggle_table("users"));
        builder.set_limit(Some(50));

        assert_eq!(
            builder.build().expect("query should build"),
            "SELECT *\nFROM \"users\"\nLIMIT 50"
        );
    }

    #[test]
    fn builds_filtered_grouped_and_ordered_query() {
        let mut builder = QueryBuilder::new();
        builder.toggle_column(ColumnRef::new("users", "email"));
        builder.toggle_column(ColumnRef::new("users", "name"));
        builder.set_distinct(true);
        builder.add_condition(condition(
            "users",
            "email",
            ComparisonOperator::Like,
            Some("%@example.com"),
        ));
        let mut either = condition("users", "name", ComparisonOperator::In, Some("ann, O'Neil"));
        either.conjunction = Conjunction::Or;
        builder.add_condition(either);
        builder.add_condition(condition(
            "users",
            "id",
            ComparisonOperator::IsNotNull,
            None,
        ));
        builder.add_group_by(ColumnRef::new("users", "email"));
        builder.toggle_order_by(ColumnRef::new("users", "name"));
        builder.toggle_order_by(ColumnRef::new("users", "name"));

        assert_eq!(
            builder.build().expect("query should build"),
            "SELECT DISTINCT \"email\", \"name\"\nFROM \"users\"\n\
             WHERE \"email\" LIKE '%@example.com' OR \"name\" IN ('ann', 'O''Neil') \
             AND \"id\" IS NOT NULL\nGROUP BY \"email\"\nORDER BY \"name\" DESC"
        );
    }

    #[test]
    fn joined_tables_use_qualified_columns() {
        let catalog = sample_catalog();
        let mut builder = QueryBuilder::new();
        builder.toggle_column(ColumnRef::new("users", "email"));
        builder.toggle_column(ColumnRef::new("orders", "total"));
        let join = suggest_join(&catalog, "users", "orders").expect("join should be found");
        builder.add_join(join);
        builder.add_condition(condition(
            "orders",
            "total",
            ComparisonOperator::Gt,
            Some("100"),
        ));

        assert_eq!(
            builder.build().expect("query should build"),
            "SELECT \"users\".\"email\", \"orders\".\"total\"\nFROM \"users\"\n\
             INNER JOIN \"orders\" ON \"users\".\"id\" = \"orders\".\"user_id\"\n\
             WHERE \"orders\".\"total\" > 100"
        );
    }

    #[test]
    fn tables_without_join_become_cross_product() {
        let mut builder = QueryBuilder::new();
        builder.toggle_table("users");
        builder.toggle_table("orders");

        assert_eq!(
            builder.build().expect("query should build"),
            "SELECT *\nFROM \"users\", \"orders\""
        );
    }

    #[test]
    fn suggest_join_follows_outbound_foreign_keys() {
        let catalog = sample_catalog();
        let join = suggest_join(&catalog, "orders", "users").expect("join should be found");
        assert_eq!(join.kind, JoinKind::Inner);
        assert_eq!(
            join.on,
            vec![(
                ColumnRef::new("orders", "user_id"),
                ColumnRef::new("users", "id")
            )]
        );
        assert!(suggest_join(&catalog, "users", "recent_orders").is_none());
    }

    #[test]
    fn reports_invalid_clauses() {
        let mut builder = QueryBuilder::new();
        builder.toggle_table("users");
        builder.add_condition(condition("users", "email", ComparisonOperator::Eq, None));
        assert_eq!(
            builder.build(),
            Err(QueryBuildError::MissingConditionValue(ColumnRef::new(
                "users", "email"
            )))
        );

        let mut builder = QueryBuilder::new();
        builder.toggle_table("users");
        builder.add_join(JoinClause {
            kind: JoinKind::Left,
            table: "orders".to_string(),
            on: Vec::new(),
        });
        assert_eq!(
            builder.build(),
            Err(QueryBuildError::MissingJoinCondition("orders".to_string()))
        );

        let mut builder = QueryBuilder::new();
        builder.toggle_table("users");
        builder.add_group_by(ColumnRef::new("orders", "id"));
        assert_eq!(
            builder.build(),
            Err(QueryBuildError::UnselectedTable(ColumnRef::new("orders", "id")))
        );
    }

    #[test]
    fn toggling_selects_and_deselects() {
        let mut builder = QueryBuilder::new();
        assert!(builder.toggle_column(ColumnRef::new("users", "email")));
        assert!(builder.is_table_selected("users"));
        assert!(!builder.toggle_column(ColumnRef::new("users", "email")));
        assert!(builder.columns().is_empty());

        builder.toggle_column(ColumnRef::new("users", "email"));
        builder.toggle_order_by(ColumnRef::new("users", "email"));
        assert!(!builder.toggle_table("users"));
        assert!(builder.is_empty());
        assert!(builder.columns().is_empty());
        assert!(builder.order_by().is_empty());
    }

    #[test]
    fn prune_removes_selections_missing_from_schema() {
        let catalog = sample_catalog();
        let mut builder = QueryBuilder::new();
        builder.toggle_column(ColumnRef::new("users", "email"));
        builder.toggle_column(ColumnRef::new("users", "nickname"));
        builder.toggle_column(ColumnRef::new("legacy", "id"));
        builder.add_condition(condition(
            "legacy",
            "id",
            ComparisonOperator::Eq,
            Some("1"),
        ));

        let removed = builder.prune_to(&catalog);
        assert_eq!(removed, 4);
        assert_eq!(builder.tables(), &["users".to_string()]);
        assert_eq!(builder.columns(), &[ColumnRef::new("users", "email")]);
        assert!(builder.conditions().is_empty());
    }

    #[test]
    fn operator_metadata() {
        assert_eq!(ComparisonOperator::ALL.len(), 11);
        assert!(!ComparisonOperator::IsNull.takes_value());
        assert_eq!(ComparisonOperator::NotLike.symbol(), "NOT LIKE");
    }

    #[test]
    fn parses_filter_text_into_conditions() {
        let email = ColumnRef::new("users", "email");

        let like = parse_condition(email.clone(), "like %ann%").expect("like should parse");
        assert_eq!(like.operator, ComparisonOperator::Like);
        assert_eq!(like.value.as_deref(), Some("%ann%"));
        assert_eq!(like.conjunction, Conjunction::And);

        let not_null =
            parse_condition(email.clone(), "or IS NOT NULL").expect("is not null should parse");
        assert_eq!(not_null.operator, ComparisonOperator::IsNotNull);
        assert_eq!(not_null.value, None);
        assert_eq!(not_null.conjunction, Conjunction::Or);

        let at_least = parse_condition(email.clone(), ">= 10").expect(">= should parse");
        assert_eq!(at_least.operator, ComparisonOperator::GtEq);
        assert_eq!(at_least.value.as_deref(), Some("10"));

        let listed = parse_condition(email.clone(), "in 1, 2").expect("in should parse");
        assert_eq!(listed.operator, ComparisonOperator::In);

        assert_eq!(parse_condition(email.clone(), "= "), None);
        assert_eq!(parse_condition(email.clone(), "is null 3"), None);
        assert_eq!(parse_condition(email.clone(), "inside 3"), None);
        assert_eq!(parse_condition(email, "orange"), None);
    }
}
