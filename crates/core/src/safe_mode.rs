use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use thiserror::Error;

use crate::sql_validator::{classify_statement, parse_statements, StatementKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlRiskReason {
    MultiStatement,
    WriteOperation(StatementKind),
    DdlOperation,
    TransactionControl,
    SessionMutation(StatementKind),
    Unparseable(String),
    UnknownStatement,
}

impl SqlRiskReason {
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::MultiStatement => "multiple statements".to_string(),
            Self::WriteOperation(kind) => format!("{} modifies data", kind.label()),
            Self::DdlOperation => "schema change".to_string(),
            Self::TransactionControl => "transaction control".to_string(),
            Self::SessionMutation(kind) => format!("{} changes connection state", kind.label()),
            Self::Unparseable(message) => format!("could not be parsed ({message})"),
            Self::UnknownStatement => "statement type is not recognised".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlSafetyAssessment {
    pub statement_count: usize,
    pub primary_kind: Option<StatementKind>,
    pub reasons: Vec<SqlRiskReason>,
    pub normalized_sql: String,
}

impl SqlSafetyAssessment {
    #[must_use]
    pub fn is_safe_read_only(&self) -> bool {
        self.reasons.is_empty()
    }

    #[must_use]
    pub fn describe_reasons(&self) -> String {
        self.reasons
            .iter()
            .map(SqlRiskReason::describe)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfirmationToken(String);

impl ConfirmationToken {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow {
        assessment: SqlSafetyAssessment,
    },
    RequireConfirmation {
        token: ConfirmationToken,
        assessment: SqlSafetyAssessment,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SafeModeError {
    #[error("confirmation token is invalid or expired")]
    InvalidToken,
    #[error("confirmation token does not match the SQL statement")]
    SqlMismatch,
}

#[derive(Debug, Clone)]
struct PendingConfirmation {
    sql_fingerprint: u64,
}

/// Holds back statements that are not plain reads until the user confirms
/// them with a single-use token bound to the exact statement text.
#[derive(Debug, Default)]
pub struct SafeModeGuard {
    enabled: bool,
    nonce: u64,
    pending_confirmations: HashMap<String, PendingConfirmation>,
}

impl SafeModeGuard {
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.pending_confirmations.clear();
        }
    }

    pub fn evaluate(&mut self, sql: &str) -> GuardDecision {
        let assessment = assess_sql_safety(sql);
        if !self.enabled || assessment.is_safe_read_only() {
            return GuardDecision::Allow { assessment };
        }

        self.nonce = self.nonce.saturating_add(1);
        let fingerprint = fingerprint_sql(&assessment.normalized_sql);
        let token_string = format!("confirm-{}-{fingerprint:016x}", self.nonce);
        self.pending_confirmations.insert(
            token_string.clone(),
            PendingConfirmation {
                sql_fingerprint: fingerprint,
            },
        );

        GuardDecision::RequireConfirmation {
            token: ConfirmationToken(token_string),
            assessment,
        }
    }

    pub fn confirm(&mut self, token: &ConfirmationToken, sql: &str) -> Result<(), SafeModeError> {
        let Some(pending) = self.pending_confirmations.remove(token.as_str()) else {
            return Err(SafeModeError::InvalidToken);
        };

        let assessment = assess_sql_safety(sql);
        if pending.sql_fingerprint != fingerprint_sql(&assessment.normalized_sql) {
            return Err(SafeModeError::SqlMismatch);
        }

        Ok(())
    }
}

#[must_use]
pub fn assess_sql_safety(sql: &str) -> SqlSafetyAssessment {
    let statements = match parse_statements(sql) {
        Ok(statements) => statements,
        Err(error) => {
            return SqlSafetyAssessment {
                statement_count: 0,
                primary_kind: None,
                reasons: vec![SqlRiskReason::Unparseable(error.to_string())],
                normalized_sql: sql.split_whitespace().collect::<Vec<_>>().join(" "),
            };
        }
    };

    let mut reasons = Vec::new();
    if statements.len() > 1 {
        reasons.push(SqlRiskReason::MultiStatement);
    }

    for statement in &statements {
        let kind = classify_statement(statement);
        match kind {
            StatementKind::Query | StatementKind::Explain => {}
            StatementKind::Pragma => {
                if matches!(
                    statement,
                    sqlparser::ast::Statement::Pragma { value: Some(_), .. }
                ) {
                    reasons.push(SqlRiskReason::SessionMutation(kind));
                }
            }
            StatementKind::Insert | StatementKind::Update | StatementKind::Delete => {
                reasons.push(SqlRiskReason::WriteOperation(kind));
            }
            StatementKind::Ddl => reasons.push(SqlRiskReason::DdlOperation),
            StatementKind::Transaction => reasons.push(SqlRiskReason::TransactionControl),
            StatementKind::Attach => reasons.push(SqlRiskReason::SessionMutation(kind)),
            StatementKind::Other => reasons.push(SqlRiskReason::UnknownStatement),
        }
    }

    SqlSafetyAssessment {
        statement_count: statements.len(),
        primary_kind: statements.first().map(classify_statement),
        reasons,
        normalized_sql: statements
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; "),
    }
}

fn fingerprint_sql(normalized_sql: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    normalized_sql.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::{assess_sql_safety, GuardDecision, SafeModeError, SafeModeGuard, SqlRiskReason};
    use crate::sql_validator::StatementKind;

    #[test]
    fn select_without_side_effects_is_safe() {
        let assessment = assess_sql_safety("SELECT * FROM users");
        assert!(assessment.is_safe_read_only());
        assert_eq!(assessment.primary_kind, Some(StatementKind::Query));
    }

    #[test]
    fn pragma_reads_are_safe_but_assignments_are_not() {
        assert!(assess_sql_safety("PRAGMA table_info(users)").is_safe_read_only());

        let assessment = assess_sql_safety("PRAGMA foreign_keys = OFF");
        assert_eq!(
            assessment.reasons,
            vec![SqlRiskReason::SessionMutation(StatementKind::Pragma)]
        );
    }

    #[test]
    fn destructive_statement_requires_confirmation_when_safe_mode_enabled() {
        let mut guard = SafeModeGuard::new(true);
        let decision = guard.evaluate("DELETE FROM users");

        match decision {
            GuardDecision::Allow { .. } => panic!("delete should not be auto-allowed"),
            GuardDecision::RequireConfirmation { assessment, .. } => {
                assert!(assessment
                    .reasons
                    .contains(&SqlRiskReason::WriteOperation(StatementKind::Delete)));
                assert_eq!(assessment.describe_reasons(), "delete modifies data");
            }
        }
    }

    #[test]
    fn writes_prefixed_by_a_cte_are_not_reads() {
        let assessment = assess_sql_safety("WITH src AS (SELECT 1) UPDATE users SET email = 'x'");
        assert!(!assessment.is_safe_read_only());
        assert_eq!(assessment.primary_kind, Some(StatementKind::Update));
        assert_eq!(
            assessment.reasons,
            vec![SqlRiskReason::WriteOperation(StatementKind::Update)]
        );

        let assessment = assess_sql_safety(
            "WITH src AS (SELECT 'a') INSERT INTO users (email) SELECT * FROM src",
        );
        assert_eq!(assessment.primary_kind, Some(StatementKind::Insert));

        let mut guard = SafeModeGuard::new(true);
        assert!(matches!(
            guard.evaluate("WITH src AS (SELECT 1) UPDATE users SET email = 'x'"),
            GuardDecision::RequireConfirmation { .. }
        ));
        assert!(assess_sql_safety("WITH src AS (SELECT 1) SELECT * FROM src").is_safe_read_only());
    }

    #[test]
    fn dangerous_statement_is_allowed_when_safe_mode_disabled() {
        let mut guard = SafeModeGuard::new(false);
        let decision = guard.evaluate("DROP TABLE users");

        assert!(matches!(decision, GuardDecision::Allow { .. }));
    }

    #[test]
    fn multi_statement_and_unparseable_sql_is_marked_risky() {
        let assessment = assess_sql_safety("SELECT 1; DELETE FROM users");
        assert!(assessment.reasons.contains(&SqlRiskReason::MultiStatement));
        assert_eq!(assessment.statement_count, 2);

        let assessment = assess_sql_safety("SELEC oops");
        assert!(matches!(
            assessment.reasons.as_slice(),
            [SqlRiskReason::Unparseable(_)]
        ));
    }

    #[test]
    fn ignores_comments_when_classifying_sql() {
        let assessment = assess_sql_safety(
            r"
            -- user lookup
            /* safe read */
            SELECT * FROM users;
            ",
        );
        assert!(assessment.is_safe_read_only());
    }

    #[test]
    fn confirmation_requires_matching_sql_and_token_is_single_use() {
        let mut guard = SafeModeGuard::new(true);
        let decision = guard.evaluate("UPDATE users SET admin = 1");
        let GuardDecision::RequireConfirmation { token, .. } = decision else {
            panic!("update should require confirmation");
        };

        guard
            .confirm(&token, "update users   set admin = 1")
            .expect("equivalent sql should confirm");

        let err = guard
            .confirm(&token, "UPDATE users SET admin = 1")
            .expect_err("token should be single use");
        assert_eq!(err, SafeModeError::InvalidToken);
    }

    #[test]
    fn confirmation_fails_when_sql_does_not_match_token() {
        let mut guard = SafeModeGuard::new(true);
        let decision = guard.evaluate("DELETE FROM users WHERE id = 1");
        let GuardDecision::RequireConfirmation { token, .. } = decision else {
            panic!("delete should require confirmation");
        };

        let err = guard
            .confirm(&token, "DELETE FROM users WHERE id = 2")
            .expect_err("different statement should fail");
        assert_eq!(err, SafeModeError::SqlMismatch);
    }
}
