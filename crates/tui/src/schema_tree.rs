use std::collections::BTreeSet;

use sqlb_core::actions_engine::SchemaSelection;
use sqlb_core::schema_cache::{SchemaCatalog, TableKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SchemaNode {
    Table {
        schema: String,
        table: String,
        kind: TableKind,
        expanded: bool,
    },
    Column {
        schema: String,
        table: String,
        column: String,
        data_type: String,
        primary_key: bool,
    },
}

impl SchemaNode {
    pub(crate) fn schema(&self) -> &str {
        match self {
            Self::Table { schema, .. } | Self::Column { schema, .. } => schema,
        }
    }

    pub(crate) fn table(&self) -> &str {
        match self {
            Self::Table { table, .. } | Self::Column { table, .. } => table,
        }
    }
}

/// Flattened table/column rows of the loaded catalog with a cursor.
#[derive(Debug, Clone, Default)]
pub(crate) struct SchemaTree {
    nodes: Vec<SchemaNode>,
    expanded: BTreeSet<(String, String)>,
    cursor: usize,
}

impl SchemaTree {
    /// Rebuilds the rows from `catalog`, keeping expansion state and the
    /// cursor position for tables that still exist.
    pub(crate) fn rebuild(&mut self, catalog: &SchemaCatalog) {
        let focused = self
            .selected()
            .map(|node| (node.schema().to_string(), node.table().to_string()));

        self.expanded.retain(|(schema, table)| catalog.table(schema, table).is_some());
        self.nodes.clear();
        for database in &catalog.schemas {
            for table in &database.tables {
                let key = (database.name.clone(), table.name.clone());
                let expanded = self.expanded.contains(&key);
                self.nodes.push(SchemaNode::Table {
                    schema: database.name.clone(),
                    table: table.name.clone(),
                    kind: table.kind,
                    expanded,
                });
                if expanded {
                    self.nodes
                        .extend(table.columns.iter().map(|column| SchemaNode::Column {
                            schema: database.name.clone(),
                            table: table.name.clone(),
                            column: column.name.clone(),
                            data_type: column.data_type.clone(),
                            primary_key: column.primary_key_position.is_some(),
                        }));
                }
            }
        }

        self.cursor = focused
            .and_then(|(schema, table)| {
                self.nodes.iter().position(|node| {
                    matches!(node, SchemaNode::Table { .. })
                        && node.schema() == schema
                        && node.table() == table
                })
            })
            .unwrap_or(0);
    }

    pub(crate) fn nodes(&self) -> &[SchemaNode] {
        &self.nodes
    }

    pub(crate) fn cursor(&self) -> usize {
        self.cursor
    }

    pub(crate) fn selected(&self) -> Option<&SchemaNode> {
        self.nodes.get(self.cursor)
    }

    pub(crate) fn move_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub(crate) fn move_down(&mut self) {
        if self.cursor + 1 < self.nodes.len() {
            self.cursor += 1;
        }
    }

    /// Expands or collapses the table under the cursor. Returns `false`
    /// when nothing is selected.
    pub(crate) fn set_expanded(&mut self, catalog: &SchemaCatalog, expanded: bool) -> bool {
        let Some(node) = self.selected() else {
            return false;
        };
        let key = (node.schema().to_string(), node.table().to_string());
        if expanded {
            self.expanded.insert(key);
        } else {
            self.expanded.remove(&key);
        }
        self.rebuild(catalog);
        true
    }

    pub(crate) fn selection(&self) -> SchemaSelection {
        match self.selected() {
            Some(SchemaNode::Table { schema, table, .. }) => SchemaSelection {
                schema: Some(schema.clone()),
                table: Some(table.clone()),
                column: None,
            },
            Some(SchemaNode::Column {
                schema,
                table,
                column,
                ..
            }) => SchemaSelection {
                schema: Some(schema.clone()),
                table: Some(table.clone()),
                column: Some(column.clone()),
            },
            None => SchemaSelection::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use sqlb_core::schema_cache::{
        ColumnSchema, DatabaseSchema, SchemaCatalog, TableKind, TableSchema,
    };

    use super::{SchemaNode, SchemaTree};

    fn table(name: &str, columns: &[&str]) -> TableSchema {
        TableSchema {
            name: name.to_string(),
            kind: TableKind::Table,
            columns: columns
                .iter()
                .enumerate()
                .map(|(index, column)| ColumnSchema {
                    name: (*column).to_string(),
                    data_type: "TEXT".to_string(),
                    nullable: true,
                    default_value: None,
                    primary_key_position: (index == 0).then_some(1),
                })
                .collect(),
            foreign_keys: Vec::new(),
            indexes: Vec::new(),
        }
    }

    fn catalog(tables: Vec<TableSchema>) -> SchemaCatalog {
        SchemaCatalog {
            schemas: vec![DatabaseSchema {
                name: "main".to_string(),
                file: None,
                tables,
            }],
        }
    }

    #[test]
    fn expanding_a_table_lists_its_columns() {
        let catalog = catalog(vec![table("orders", &["id", "total"]), table("users", &["id"])]);
        let mut tree = SchemaTree::default();
        tree.rebuild(&catalog);
        assert_eq!(tree.nodes().len(), 2);

        assert!(tree.set_expanded(&catalog, true));
        assert_eq!(tree.nodes().len(), 4);
        tree.move_down();
        let selection = tree.selection();
        assert_eq!(selection.table.as_deref(), Some("orders"));
        assert_eq!(selection.column.as_deref(), Some("id"));
        assert!(matches!(
            tree.selected(),
            Some(SchemaNode::Column { primary_key: true, .. })
        ));

        tree.set_expanded(&catalog, false);
        assert_eq!(tree.nodes().len(), 2);
        assert_eq!(tree.selection().table.as_deref(), Some("orders"));
    }

    #[test]
    fn rebuild_drops_tables_that_disappeared() {
        let before = catalog(vec![table("orders", &["id"]), table("users", &["id"])]);
        let mut tree = SchemaTree::default();
        tree.rebuild(&before);
        tree.move_down();
        tree.set_expanded(&before, true);
        assert_eq!(tree.selection().table.as_deref(), Some("users"));

        let after = catalog(vec![table("orders", &["id"])]);
        tree.rebuild(&after);
        assert_eq!(tree.nodes().len(), 1);
        assert_eq!(tree.cursor(), 0);
        assert_eq!(tree.selection().table.as_deref(), Some("orders"));
    }
}
