use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;

pub const MAIN_SCHEMA: &str = "main";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub default_value: Option<String>,
    /// 1-based position within the primary key, `None` when not part of it.
    pub primary_key_position: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeySchema {
    pub id: i64,
    pub column_name: String,
    pub referenced_table: String,
    /// SQLite allows omitting the parent column, meaning the parent's
    /// primary key.
    pub referenced_column: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSchema {
    pub name: String,
    pub unique: bool,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Table,
    View,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub kind: TableKind,
    pub columns: Vec<ColumnSchema>,
    pub foreign_keys: Vec<ForeignKeySchema>,
    pub indexes: Vec<IndexSchema>,
}

impl TableSchema {
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns
            .iter()
            .find(|column| column.name.eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub fn primary_key_columns(&self) -> Vec<&ColumnSchema> {
        let mut columns = self
            .columns
            .iter()
            .filter(|column| column.primary_key_position.is_some())
            .collect::<Vec<_>>();
        columns.sort_by_key(|column| column.primary_key_position);
        columns
    }
}

/// One attached schema (`main`, `temp` or an `ATTACH`ed file).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSchema {
    pub name: String,
    pub file: Option<String>,
    pub tables: Vec<TableSchema>,
}

impl DatabaseSchema {
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables
            .iter()
            .find(|table| table.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchemaCatalog {
    pub schemas: Vec<DatabaseSchema>,
}

impl SchemaCatalog {
    #[must_use]
    pub fn schema(&self, name: &str) -> Option<&DatabaseSchema> {
        self.schemas
            .iter()
            .find(|schema| schema.name.eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub fn table(&self, schema_name: &str, table_name: &str) -> Option<&TableSchema> {
        self.schema(schema_name)
            .and_then(|schema| schema.table(table_name))
    }

    /// Resolves an unqualified table name the way SQLite does: `temp`
    /// first, then `main`, then attached schemas in order.
    #[must_use]
    pub fn resolve_table(&self, table_name: &str) -> Option<(&DatabaseSchema, &TableSchema)> {
        let search_order = self
            .schemas
            .iter()
            .filter(|schema| schema.name == "temp")
            .chain(self.schemas.iter().filter(|schema| schema.name == MAIN_SCHEMA))
            .chain(
                self.schemas
                    .iter()
                    .filter(|schema| schema.name != "temp" && schema.name != MAIN_SCHEMA),
            );

        for schema in search_order {
            if let Some(table) = schema.table(table_name) {
                return Some((schema, table));
            }
        }
        None
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.iter().all(|schema| schema.tables.is_empty())
    }

    #[must_use]
    pub fn table_count(&self) -> usize {
        self.schemas.iter().map(|schema| schema.tables.len()).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RelationshipDirection {
    Outbound,
    Inbound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRelationship {
    pub direction: RelationshipDirection,
    pub source_column: String,
    pub related_table: String,
    pub related_column: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SchemaBackendError {
    message: String,
}

impl SchemaBackendError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SchemaCacheError {
    #[error("schema backend failed: {0}")]
    Backend(#[source] SchemaBackendError),
}

#[async_trait]
pub trait SchemaBackend {
    async fn fetch_schema(&self) -> Result<SchemaCatalog, SchemaBackendError>;
}

#[derive(Debug)]
struct CachedSchema {
    fetched_at: Instant,
    schema: Arc<SchemaCatalog>,
}

#[derive(Debug)]
pub struct SchemaCacheService<B: SchemaBackend> {
    backend: B,
    ttl: Duration,
    cache: Option<CachedSchema>,
}

impl<B: SchemaBackend> SchemaCacheService<B> {
    #[must_use]
    pub fn new(backend: B, ttl: Duration) -> Self {
        Self {
            backend,
            ttl,
            cache: None,
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Last fetched catalog regardless of age.
    #[must_use]
    pub fn cached(&self) -> Option<Arc<SchemaCatalog>> {
        self.cache.as_ref().map(|cache| Arc::clone(&cache.schema))
    }

    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    pub async fn schema(&mut self) -> Result<Arc<SchemaCatalog>, SchemaCacheError> {
        self.schema_at(Instant::now()).await
    }

    pub async fn refresh(&mut self) -> Result<Arc<SchemaCatalog>, SchemaCacheError> {
        self.refresh_at(Instant::now()).await
    }

    pub async fn list_schemas(&mut self) -> Result<Vec<String>, SchemaCacheError> {
        let schema = self.schema().await?;
        Ok(schema
            .schemas
            .iter()
            .map(|database| database.name.clone())
            .collect())
    }

    pub async fn list_tables(&mut self, schema_name: &str) -> Result<Vec<String>, SchemaCacheError> {
        let schema = self.schema().await?;
        Ok(schema
            .schema(schema_name)
            .map(|database| {
                database
                    .tables
                    .iter()
                    .map(|table| table.name.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    pub async fn list_columns(
        &mut self,
        schema_name: &str,
        table_name: &str,
    ) -> Result<Vec<ColumnSchema>, SchemaCacheError> {
        let schema = self.schema().await?;
        Ok(schema
            .table(schema_name, table_name)
            .map(|table| table.columns.clone())
            .unwrap_or_default())
    }

    pub async fn list_related_tables(
        &mut self,
        schema_name: &str,
        table_name: &str,
    ) -> Result<Vec<TableRelationship>, SchemaCacheError> {
        let schema = self.schema().await?;
        Ok(schema
            .schema(schema_name)
            .map(|database| related_tables(database, table_name))
            .unwrap_or_default())
    }

    async fn schema_at(&mut self, now: Instant) -> Result<Arc<SchemaCatalog>, SchemaCacheError> {
        if let Some(cache) = &self.cache {
            if now.duration_since(cache.fetched_at) <= self.ttl {
                return Ok(Arc::clone(&cache.schema));
            }
        }
        self.refresh_at(now).await
    }

    async fn refresh_at(&mut self, now: Instant) -> Result<Arc<SchemaCatalog>, SchemaCacheError> {
        let schema = Arc::new(
            self.backend
                .fetch_schema()
                .await
                .map_err(SchemaCacheError::Backend)?,
        );
        tracing::debug!(tables = schema.table_count(), "schema refreshed");

        self.cache = Some(CachedSchema {
            fetched_at: now,
            schema: Arc::clone(&schema),
        });
        Ok(schema)
    }
}

/// Outbound and inbound foreign-key relationships of `table_name` within one
/// schema, sorted by related table, then column, then direction.
#[must_use]
pub fn related_tables(database: &DatabaseSchema, table_name: &str) -> Vec<TableRelationship> {
    let mut relationships = Vec::new();

    if let Some(table) = database.table(table_name) {
        for foreign_key in &table.foreign_keys {
            relationships.push(TableRelationship {
                direction: RelationshipDirection::Outbound,
                source_column: foreign_key.column_name.clone(),
                related_table: foreign_key.referenced_table.clone(),
                related_column: referenced_column_name(database, foreign_key),
            });
        }
    }

    for candidate_table in &database.tables {
        for foreign_key in &candidate_table.foreign_keys {
            if foreign_key.referenced_table.eq_ignore_ascii_case(table_name) {
                relationships.push(TableRelationship {
                    direction: RelationshipDirection::Inbound,
                    source_column: referenced_column_name(database, foreign_key),
                    related_table: candidate_table.name.clone(),
                    related_column: foreign_key.column_name.clone(),
                });
            }
        }
    }

    relationships.sort_unstable_by(|left, right| {
        left.related_table
            .cmp(&right.related_table)
            .then_with(|| left.related_column.cmp(&right.related_column))
            .then_with(|| left.source_column.cmp(&right.source_column))
            .then_with(|| left.direction.cmp(&right.direction))
    });
    relationships
}

fn referenced_column_name(database: &DatabaseSchema, foreign_key: &ForeignKeySchema) -> String {
    if let Some(column) = &foreign_key.referenced_column {
        return column.clone();
    }
    database
        .table(&foreign_key.referenced_table)
        .and_then(|parent| {
            parent
                .primary_key_columns()
                .first()
                .map(|column| column.name.clone())
        })
        .unwrap_or_else(|| "rowid".to_string())
}
