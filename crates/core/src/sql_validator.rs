use std::collections::HashSet;
use std::ops::ControlFlow;

use sqlparser::ast::{
    ObjectName, Query, SelectItem, SetExpr, Statement, TableFactor, Visit, Visitor,
};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;
use thiserror::Error;

use crate::schema_cache::SchemaCatalog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Query,
    Insert,
    Update,
    Delete,
    Ddl,
    Transaction,
    Pragma,
    Attach,
    Explain,
    Other,
}

impl StatementKind {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Ddl => "ddl",
            Self::Transaction => "transaction",
            Self::Pragma => "pragma",
            Self::Attach => "attach",
            Self::Explain => "explain",
            Self::Other => "other",
        }
    }

    #[must_use]
    pub fn changes_schema(self) -> bool {
        matches!(self, Self::Ddl | Self::Attach)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementReport {
    pub kind: StatementKind,
    pub relations: Vec<String>,
    /// Pragma statements that assign a value rather than read one.
    pub assigns_pragma: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub severity: IssueSeverity,
    pub message: String,
}

impl ValidationIssue {
    fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Warning,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationReport {
    pub statements: Vec<StatementReport>,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.issues
            .iter()
            .all(|issue| issue.severity != IssueSeverity::Error)
    }

    #[must_use]
    pub fn warnings(&self) -> Vec<&ValidationIssue> {
        self.issues
            .iter()
            .filter(|issue| issue.severity == IssueSeverity::Warning)
            .collect()
    }

    /// One-line outcome for status bars.
    #[must_use]
    pub fn summary(&self) -> String {
        let kinds = self
            .statements
            .iter()
            .map(|statement| statement.kind.label())
            .collect::<Vec<_>>()
            .join(", ");
        let noun = if self.statements.len() == 1 {
            "statement"
        } else {
            "statements"
        };
        let mut summary = format!("{} {noun} ({kinds})", self.statements.len());
        if self.issues.is_empty() {
            summary.push_str(": valid");
        } else {
            let messages = self
                .issues
                .iter()
                .map(|issue| issue.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            summary.push_str(": ");
            summary.push_str(&messages);
        }
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("query text is empty")]
    EmptyInput,
    #[error("syntax error: {0}")]
    Syntax(String),
}

pub fn parse_statements(sql: &str) -> Result<Vec<Statement>, ValidationError> {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyInput);
    }

    let statements = Parser::parse_sql(&SQLiteDialect {}, trimmed)
        .map_err(|error| ValidationError::Syntax(error.to_string()))?;
    if statements.is_empty() {
        return Err(ValidationError::EmptyInput);
    }
    Ok(statements)
}

#[must_use]
pub fn classify_statement(statement: &Statement) -> StatementKind {
    match statement {
        Statement::Query(query) => {
            data_change_body(&query.body).map_or(StatementKind::Query, classify_statement)
        }
        Statement::Insert(_) => StatementKind::Insert,
        Statement::Update { .. } => StatementKind::Update,
        Statement::Delete(_) => StatementKind::Delete,
        Statement::CreateTable(_)
        | Statement::CreateIndex(_)
        | Statement::CreateView { .. }
        | Statement::CreateVirtualTable { .. }
        | Statement::CreateTrigger { .. }
        | Statement::AlterTable { .. }
        | Statement::Drop { .. }
        | Statement::DropTrigger { .. } => StatementKind::Ddl,
        Statement::StartTransaction { .. }
        | Statement::Commit { .. }
        | Statement::Rollback { .. }
        | Statement::Savepoint { .. }
        | Statement::ReleaseSavepoint { .. } => StatementKind::Transaction,
        Statement::Pragma { .. } => StatementKind::Pragma,
        Statement::AttachDatabase { .. } => StatementKind::Attach,
        Statement::Explain { .. } | Statement::ExplainTable { .. } => StatementKind::Explain,
        _ => StatementKind::Other,
    }
}

/// Parses `sql` and checks it against `catalog` when one is loaded.
///
/// Syntax errors are returned as `Err`; semantic findings (unknown tables,
/// unbounded writes, unbounded `SELECT *`) are issues on the report.
pub fn validate_sql(
    sql: &str,
    catalog: Option<&SchemaCatalog>,
) -> Result<ValidationReport, ValidationError> {
    let statements = parse_statements(sql)?;
    let mut report = ValidationReport::default();

    for statement in &statements {
        let kind = classify_statement(statement);
        let collected = collect_relations(statement);
        let assigns_pragma = matches!(statement, Statement::Pragma { value: Some(_), .. });

        if let Some(catalog) = catalog.filter(|catalog| !catalog.is_empty()) {
            if matches!(
                kind,
                StatementKind::Query
                    | StatementKind::Insert
                    | StatementKind::Update
                    | StatementKind::Delete
            ) {
                for relation in &collected.relations {
                    if !relation_exists(catalog, relation, &collected.cte_names) {
                        report
                            .issues
                            .push(ValidationIssue::error(format!("unknown table `{relation}`")));
                    }
                }
            }
        }

        let effective = match statement {
            Statement::Query(query) => data_change_body(&query.body).unwrap_or(statement),
            _ => statement,
        };
        match effective {
            Statement::Delete(delete) if delete.selection.is_none() => {
                report.issues.push(ValidationIssue::warning(
                    "DELETE without WHERE removes every row",
                ));
            }
            Statement::Update { selection, .. } if selection.is_none() => {
                report.issues.push(ValidationIssue::warning(
                    "UPDATE without WHERE changes every row",
                ));
            }
            Statement::Query(query) => {
                if let SetExpr::Select(select) = query.body.as_ref() {
                    let selects_star = select
                        .projection
                        .iter()
                        .any(|item| matches!(item, SelectItem::Wildcard(..)));
                    if selects_star
                        && select.selection.is_none()
                        && query.limit.is_none()
                        && !select.from.is_empty()
                    {
                        report.issues.push(ValidationIssue::warning(
                            "SELECT * without WHERE or LIMIT reads the whole table",
                        ));
                    }
                }
            }
            _ => {}
        }

        report.statements.push(StatementReport {
            kind,
            relations: collected.relations,
            assigns_pragma,
        });
    }

    Ok(report)
}

fn object_name_parts(name: &ObjectName) -> Vec<String> {
    name.0.iter().map(|ident| ident.value.clone()).collect()
}

/// The INSERT or UPDATE carried by a `WITH ...` statement, looking through
/// parenthesised bodies and set operations.
fn data_change_body(body: &SetExpr) -> Option<&Statement> {
    match body {
        SetExpr::Insert(statement) | SetExpr::Update(statement) => Some(statement),
        SetExpr::Query(query) => data_change_body(&query.body),
        SetExpr::SetOperation { left, right, .. } => {
            data_change_body(left).or_else(|| data_change_body(right))
        }
        _ => None,
    }
}

/// Walks a statement once, gathering table references and CTE names from
/// every nested query.
#[derive(Default)]
struct RelationCollector {
    seen: HashSet<String>,
    relations: Vec<String>,
    cte_names: HashSet<String>,
    skip_next_relation: bool,
}

impl Visitor for RelationCollector {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        if let Some(with) = &query.with {
            self.cte_names.extend(
                with.cte_tables
                    .iter()
                    .map(|cte| cte.alias.name.value.to_ascii_lowercase()),
            );
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_table_factor(&mut self, table_factor: &TableFactor) -> ControlFlow<Self::Break> {
        // Table-valued functions such as `json_each(...)` are not tables.
        if let TableFactor::Table { args: Some(_), .. } = table_factor {
            self.skip_next_relation = true;
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_relation(&mut self, relation: &ObjectName) -> ControlFlow<Self::Break> {
        if std::mem::take(&mut self.skip_next_relation) {
            return ControlFlow::Continue(());
        }
        let rendered = object_name_parts(relation).join(".");
        if self.seen.insert(rendered.to_ascii_lowercase()) {
            self.relations.push(rendered);
        }
        ControlFlow::Continue(())
    }
}

fn collect_relations(statement: &Statement) -> RelationCollector {
    let mut collector = RelationCollector::default();
    let _ = statement.visit(&mut collector);
    collector
}

fn relation_exists(catalog: &SchemaCatalog, relation: &str, cte_names: &HashSet<String>) -> bool {
    let lowered = relation.to_ascii_lowercase();
    if cte_names.contains(&lowered)
        || lowered.starts_with("sqlite_")
        || lowered.starts_with("pragma_")
    {
        return true;
    }

    match relation.split_once('.') {
        Some((schema, table)) if catalog.schema(schema).is_some() => {
            catalog.table(schema, table).is_some()
        }
        _ => catalog.resolve_table(relation).is_some(),
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_sql, IssueSeverity, StatementKind, ValidationError};
    use crate::schema_cache::fixtures::sample_catalog;
    use crate::schema_cache::SchemaCatalog;

    #[test]
    fn empty_input_is_rejected() {
        assert_eq!(validate_sql("  \n", None), Err(ValidationError::EmptyInput));
    }

    #[test]
    fn syntax_errors_are_reported() {
        let err = validate_sql("SELEC * FROM users", None).expect_err("should not parse");
        assert!(matches!(err, ValidationError::Syntax(_)));

        let err = validate_sql("SELECT * FROM", None).expect_err("should not parse");
        assert!(matches!(err, ValidationError::Syntax(_)));
    }

    #[test]
    fn classifies_statements_and_collects_relations() {
        let report = validate_sql(
            "SELECT u.email FROM users u JOIN orders o ON o.user_id = u.id WHERE o.total > 5; \
             INSERT INTO users (email) VALUES ('a@b.c'); \
             CREATE TABLE audit (id INTEGER PRIMARY KEY); \
             BEGIN; PRAGMA journal_mode = WAL",
            None,
        )
        .expect("should parse");

        let kinds = report
            .statements
            .iter()
            .map(|statement| statement.kind)
            .collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                StatementKind::Query,
                StatementKind::Insert,
                StatementKind::Ddl,
                StatementKind::Transaction,
                StatementKind::Pragma,
            ]
        );
        assert_eq!(
            report.statements[0].relations,
            vec!["users".to_string(), "orders".to_string()]
        );
        assert!(report.statements[4].assigns_pragma);
        assert!(report.is_valid());
    }

    #[test]
    fn unknown_tables_are_errors_when_schema_is_loaded() {
        let catalog = sample_catalog();
        let report = validate_sql("SELECT * FROM customers LIMIT 5", Some(&catalog))
            .expect("should parse");
        assert!(!report.is_valid());
        assert_eq!(report.issues[0].message, "unknown table `customers`");

        let without_schema = validate_sql("SELECT * FROM customers LIMIT 5", None)
            .expect("should parse");
        assert!(without_schema.is_valid());

        let empty_schema = SchemaCatalog::default();
        let report = validate_sql("SELECT * FROM customers LIMIT 5", Some(&empty_schema))
            .expect("should parse");
        assert!(report.is_valid());
    }

    #[test]
    fn cte_and_internal_tables_are_not_flagged() {
        let catalog = sample_catalog();
        let report = validate_sql(
            "WITH big AS (SELECT * FROM orders WHERE total > 100) \
             SELECT * FROM big JOIN sqlite_master ON 1 = 1 LIMIT 10",
            Some(&catalog),
        )
        .expect("should parse");
        assert!(report.is_valid(), "unexpected issues: {:?}", report.issues);
    }

    #[test]
    fn writes_behind_a_with_clause_are_classified_as_writes() {
        let catalog = sample_catalog();
        let report = validate_sql(
            "WITH src AS (SELECT 1) UPDATE users SET email = 'x'; \
             WITH src AS (SELECT 'a') INSERT INTO users (email) SELECT * FROM src",
            Some(&catalog),
        )
        .expect("should parse");

        let kinds = report
            .statements
            .iter()
            .map(|statement| statement.kind)
            .collect::<Vec<_>>();
        assert_eq!(kinds, vec![StatementKind::Update, StatementKind::Insert]);
        assert!(report.is_valid(), "unexpected issues: {:?}", report.issues);
        assert_eq!(
            report.warnings()[0].message,
            "UPDATE without WHERE changes every row"
        );
    }

    #[test]
    fn nested_cte_names_are_not_flagged() {
        let catalog = sample_catalog();
        for sql in [
            "INSERT INTO users (email) WITH src AS (SELECT 'a') SELECT * FROM src",
            "SELECT * FROM users WHERE id IN (WITH x AS (SELECT 1) SELECT * FROM x) LIMIT 5",
        ] {
            let report = validate_sql(sql, Some(&catalog)).expect("should parse");
            assert!(report.is_valid(), "{sql}: unexpected issues {:?}", report.issues);
            assert_eq!(report.statements[0].relations[0], "users");
        }
    }

    #[test]
    fn table_valued_functions_are_not_tables() {
        let catalog = sample_catalog();
        let report = validate_sql(
            "SELECT value FROM json_each('[1,2]'); \
             SELECT u.id, t.key FROM users u, json_tree(u.email) t WHERE u.id = 1",
            Some(&catalog),
        )
        .expect("should parse");

        assert!(report.is_valid(), "unexpected issues: {:?}", report.issues);
        assert!(report.statements[0].relations.is_empty());
        assert_eq!(report.statements[1].relations, vec!["users".to_string()]);
    }

    #[test]
    fn warns_about_unbounded_statements() {
        let catalog = sample_catalog();
        let report = validate_sql(
            "DELETE FROM orders; UPDATE users SET name = 'x'; SELECT * FROM users",
            Some(&catalog),
        )
        .expect("should parse");

        let warnings = report.warnings();
        assert_eq!(warnings.len(), 3);
        assert!(warnings
            .iter()
            .all(|issue| issue.severity == IssueSeverity::Warning));
        assert!(report.is_valid());

        let bounded = validate_sql(
            "DELETE FROM orders WHERE id = 1; SELECT * FROM users LIMIT 10",
            Some(&catalog),
        )
        .expect("should parse");
        assert!(bounded.issues.is_empty());
        assert_eq!(bounded.summary(), "2 statements (delete, query): valid");
    }
}
