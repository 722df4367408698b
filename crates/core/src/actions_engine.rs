use std::collections::HashMap;

use thiserror::Error;

use crate::sql_generator::{
    count_rows_sql, describe_table_sql, preview_select_sql, show_create_table_sql,
    show_index_sql, SqlGenerationError, SqlTarget,
};

pub const DEFAULT_PREVIEW_LIMIT: usize = 200;
const MAX_RECENCY_BOOST: i32 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionId {
    PreviewTable,
    DescribeTable,
    ShowIndexes,
    ShowCreateTable,
    CountRows,
    BuildQuery,
    RunCurrentQuery,
    ValidateQuery,
    FormatQuery,
    ApplyLimit,
    SaveFavorite,
    PreviousPage,
    NextPage,
    ExportCsv,
    ExportJson,
    CancelRunningQuery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppView {
    OpenDatabase,
    SchemaExplorer,
    Builder,
    QueryEditor,
    Results,
    History,
    Favorites,
    Templates,
}

impl AppView {
    /// Panes reachable with the pane-cycling key, in order.
    pub const CYCLE: [Self; 7] = [
        Self::SchemaExplorer,
        Self::Builder,
        Self::QueryEditor,
        Self::Results,
        Self::History,
        Self::Favorites,
        Self::Templates,
    ];

    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::OpenDatabase => "Open database",
            Self::SchemaExplorer => "Schema",
            Self::Builder => "Builder",
            Self::QueryEditor => "Query",
            Self::Results => "Results",
            Self::History => "History",
            Self::Favorites => "Favorites",
            Self::Templates => "Templates",
        }
    }

    #[must_use]
    pub fn next(self) -> Self {
        let position = Self::CYCLE.iter().position(|view| *view == self);
        match position {
            Some(index) => Self::CYCLE[(index + 1) % Self::CYCLE.len()],
            None => Self::SchemaExplorer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchemaSelection {
    pub schema: Option<String>,
    pub table: Option<String>,
    pub column: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionContext {
    pub view: AppView,
    pub selection: SchemaSelection,
    pub query_text: Option<String>,
    pub query_running: bool,
    pub has_results: bool,
    pub builder_ready: bool,
    pub pagination_enabled: bool,
    pub can_page_next: bool,
    pub can_page_previous: bool,
    pub preview_limit: usize,
}

impl Default for ActionContext {
    fn default() -> Self {
        Self {
            view: AppView::OpenDatabase,
            selection: SchemaSelection::default(),
            query_text: None,
            query_running: false,
            has_results: false,
            builder_ready: false,
            pagination_enabled: false,
            can_page_next: false,
            can_page_previous: false,
            preview_limit: DEFAULT_PREVIEW_LIMIT,
        }
    }
}

impl ActionContext {
    #[must_use]
    pub fn with_view(mut self, view: AppView) -> Self {
        self.view = view;
        self
    }

    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query_text = Some(query.into());
        self
    }

    fn non_empty_query(&self) -> Option<&str> {
        self.query_text
            .as_deref()
            .map(str::trim)
            .filter(|query| !query.is_empty())
    }

    fn has_table(&self) -> bool {
        self.selection.table.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionDefinition {
    pub id: ActionId,
    pub title: &'static str,
    pub description: &'static str,
}

const ACTIONS: [ActionDefinition; 16] = [
    ActionDefinition {
        id: ActionId::PreviewTable,
        title: "Preview table",
        description: "Run SELECT * with the preview LIMIT",
    },
    ActionDefinition {
        id: ActionId::DescribeTable,
        title: "Describe table",
        description: "Inspect table columns via PRAGMA table_info",
    },
    ActionDefinition {
        id: ActionId::ShowIndexes,
        title: "Show indexes",
        description: "Inspect table indexes via PRAGMA index_list",
    },
    ActionDefinition {
        id: ActionId::ShowCreateTable,
        title: "Show DDL",
        description: "Show the stored CREATE statement",
    },
    ActionDefinition {
        id: ActionId::CountRows,
        title: "Count rows",
        description: "Run an exact COUNT(*)",
    },
    ActionDefinition {
        id: ActionId::BuildQuery,
        title: "Build query",
        description: "Generate SQL from the selected tables and columns",
    },
    ActionDefinition {
        id: ActionId::RunCurrentQuery,
        title: "Run query",
        description: "Execute the current editor query",
    },
    ActionDefinition {
        id: ActionId::ValidateQuery,
        title: "Validate",
        description: "Parse the editor query and check it against the schema",
    },
    ActionDefinition {
        id: ActionId::FormatQuery,
        title: "Format",
        description: "Reformat the editor query",
    },
    ActionDefinition {
        id: ActionId::ApplyLimit,
        title: "Apply LIMIT",
        description: "Append the preview limit to a broad SELECT",
    },
    ActionDefinition {
        id: ActionId::SaveFavorite,
        title: "Save favorite",
        description: "Save the editor query as a favorite",
    },
    ActionDefinition {
        id: ActionId::PreviousPage,
        title: "Previous page",
        description: "Load the previous preview page",
    },
    ActionDefinition {
        id: ActionId::NextPage,
        title: "Next page",
        description: "Load the next preview page",
    },
    ActionDefinition {
        id: ActionId::ExportCsv,
        title: "Export CSV",
        description: "Export current results to CSV",
    },
    ActionDefinition {
        id: ActionId::ExportJson,
        title: "Export JSON",
        description: "Export current results to JSON",
    },
    ActionDefinition {
        id: ActionId::CancelRunningQuery,
        title: "Cancel query",
        description: "Cancel active query execution",
    },
];

#[derive(Debug, Default)]
pub struct ActionRegistry;

impl ActionRegistry {
    #[must_use]
    pub fn all(&self) -> &'static [ActionDefinition] {
        &ACTIONS
    }

    #[must_use]
    pub fn find(&self, action_id: ActionId) -> Option<ActionDefinition> {
        ACTIONS
            .iter()
            .copied()
            .find(|action| action.id == action_id)
    }

    #[must_use]
    pub fn enabled_actions(&self, context: &ActionContext) -> Vec<ActionDefinition> {
        ACTIONS
            .iter()
            .copied()
            .filter(|action| action_enabled(action.id, context))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedAction {
    pub id: ActionId,
    pub title: &'static str,
    pub score: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionInvocation {
    RunSql(String),
    BuildQuery,
    ValidateQuery(String),
    FormatQuery(String),
    ReplaceQueryEditorText(String),
    SaveFavorite(String),
    PaginatePrevious,
    PaginateNext,
    ExportResults(ExportFormat),
    CancelQuery,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionEngineError {
    #[error("action `{0:?}` is disabled in the current context")]
    ActionDisabled(ActionId),
    #[error("selected table is required")]
    MissingTableSelection,
    #[error("query text is required")]
    MissingQueryText,
    #[error("no LIMIT suggestion is available for this query")]
    NoLimitSuggestion,
    #[error("failed to generate SQL: {0}")]
    SqlGeneration(#[from] SqlGenerationError),
}

#[derive(Debug, Default)]
pub struct ActionsEngine {
    registry: ActionRegistry,
    recency_tick: u64,
    recency: HashMap<ActionId, u64>,
}

impl ActionsEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    #[must_use]
    pub fn rank_top_n(&self, context: &ActionContext, limit: usize) -> Vec<RankedAction> {
        let mut ranked = self
            .registry
            .all()
            .iter()
            .copied()
            .filter(|action| action_enabled(action.id, context))
            .map(|action| RankedAction {
                id: action.id,
                title: action.title,
                score: action_base_score(action.id, context) + self.recency_boost(action.id),
            })
            .collect::<Vec<_>>();

        ranked.sort_by(|left, right| {
            right
                .score
                .cmp(&left.score)
                .then_with(|| left.title.cmp(right.title))
        });
        ranked.truncate(limit);
        ranked
    }

    pub fn invoke(
        &mut self,
        action_id: ActionId,
        context: &ActionContext,
    ) -> Result<ActionInvocation, ActionEngineError> {
        if !action_enabled(action_id, context) {
            return Err(ActionEngineError::ActionDisabled(action_id));
        }

        let invocation = match action_id {
            ActionId::PreviewTable => {
                let target = context_selected_target(context)?;
                ActionInvocation::RunSql(preview_select_sql(&target, context.preview_limit))
            }
            ActionId::DescribeTable => {
                let target = context_selected_target(context)?;
                ActionInvocation::RunSql(describe_table_sql(&target))
            }
            ActionId::ShowIndexes => {
                let target = context_selected_target(context)?;
                ActionInvocation::RunSql(show_index_sql(&target))
            }
            ActionId::ShowCreateTable => {
                let target = context_selected_target(context)?;
                ActionInvocation::RunSql(show_create_table_sql(&target))
            }
            ActionId::CountRows => {
                let target = context_selected_target(context)?;
                ActionInvocation::RunSql(count_rows_sql(&target))
            }
            ActionId::BuildQuery => ActionInvocation::BuildQuery,
            ActionId::RunCurrentQuery => ActionInvocation::RunSql(required_query(context)?),
            ActionId::ValidateQuery => ActionInvocation::ValidateQuery(required_query(context)?),
            ActionId::FormatQuery => ActionInvocation::FormatQuery(required_query(context)?),
            ActionId::SaveFavorite => ActionInvocation::SaveFavorite(required_query(context)?),
            ActionId::ApplyLimit => {
                let query = context
                    .query_text
                    .as_deref()
                    .ok_or(ActionEngineError::MissingQueryText)?;
                let suggested = suggest_preview_limit(query, context.preview_limit)
                    .ok_or(ActionEngineError::NoLimitSuggestion)?;
                ActionInvocation::ReplaceQueryEditorText(suggested)
            }
            ActionId::PreviousPage => ActionInvocation::PaginatePrevious,
            ActionId::NextPage => ActionInvocation::PaginateNext,
            ActionId::ExportCsv => ActionInvocation::ExportResults(ExportFormat::Csv),
            ActionId::ExportJson => ActionInvocation::ExportResults(ExportFormat::Json),
            ActionId::CancelRunningQuery => ActionInvocation::CancelQuery,
        };

        self.record_use(action_id);
        Ok(invocation)
    }

    fn record_use(&mut self, action_id: ActionId) {
        self.recency_tick = self.recency_tick.saturating_add(1);
        self.recency.insert(action_id, self.recency_tick);
    }

    fn recency_boost(&self, action_id: ActionId) -> i32 {
        let Some(last_used_tick) = self.recency.get(&action_id).copied() else {
            return 0;
        };

        let age = self.recency_tick.saturating_sub(last_used_tick);
        let age_i32 = i32::try_from(age).unwrap_or(i32::MAX);
        (MAX_RECENCY_BOOST - age_i32).max(0)
    }
}

fn required_query(context: &ActionContext) -> Result<String, ActionEngineError> {
    context
        .non_empty_query()
        .map(str::to_string)
        .ok_or(ActionEngineError::MissingQueryText)
}

fn context_selected_target(context: &ActionContext) -> Result<SqlTarget<'_>, ActionEngineError> {
    let table = context
        .selection
        .table
        .as_deref()
        .ok_or(ActionEngineError::MissingTableSelection)?;

    SqlTarget::new(context.selection.schema.as_deref(), table).map_err(ActionEngineError::from)
}

fn action_enabled(action_id: ActionId, context: &ActionContext) -> bool {
    let idle = !context.query_running;
    match action_id {
        ActionId::PreviewTable
        | ActionId::DescribeTable
        | ActionId::ShowIndexes
        | ActionId::ShowCreateTable
        | ActionId::CountRows => context.has_table() && idle,
        ActionId::BuildQuery => context.builder_ready,
        ActionId::RunCurrentQuery => idle && context.non_empty_query().is_some(),
        ActionId::ValidateQuery | ActionId::FormatQuery | ActionId::SaveFavorite => {
            context.non_empty_query().is_some()
        }
        ActionId::ApplyLimit => {
            idle && context.query_text.as_deref().is_some_and(|query| {
                suggest_preview_limit(query, context.preview_limit).is_some()
            })
        }
        ActionId::PreviousPage => idle && context.pagination_enabled && context.can_page_previous,
        ActionId::NextPage => idle && context.pagination_enabled && context.can_page_next,
        ActionId::ExportCsv | ActionId::ExportJson => context.has_results,
        ActionId::CancelRunningQuery => context.query_running,
    }
}

fn boost_in(context: &ActionContext, views: &[AppView], score: i32) -> i32 {
    if views.contains(&context.view) {
        score
    } else {
        score / 4
    }
}

fn action_base_score(action_id: ActionId, context: &ActionContext) -> i32 {
    use AppView::{Builder, QueryEditor, Results, SchemaExplorer};

    match action_id {
        ActionId::CancelRunningQuery => 1_000,
        ActionId::ApplyLimit => boost_in(context, &[QueryEditor], 950),
        ActionId::BuildQuery => boost_in(context, &[Builder, SchemaExplorer], 930),
        ActionId::PreviewTable => boost_in(context, &[SchemaExplorer], 900),
        ActionId::RunCurrentQuery => boost_in(context, &[QueryEditor, Builder], 880),
        ActionId::NextPage => boost_in(context, &[Results], 860),
        ActionId::PreviousPage => boost_in(context, &[Results], 840),
        ActionId::DescribeTable => boost_in(context, &[SchemaExplorer], 820),
        ActionId::ValidateQuery => boost_in(context, &[QueryEditor], 810),
        ActionId::ShowIndexes => boost_in(context, &[SchemaExplorer], 790),
        ActionId::FormatQuery => boost_in(context, &[QueryEditor], 780),
        ActionId::ShowCreateTable => boost_in(context, &[SchemaExplorer], 760),
        ActionId::CountRows => boost_in(context, &[SchemaExplorer], 700),
        ActionId::SaveFavorite => boost_in(context, &[QueryEditor], 660),
        ActionId::ExportCsv | ActionId::ExportJson => boost_in(context, &[Results], 640),
    }
}

#[must_use]
pub fn suggest_preview_limit(query_text: &str, limit: usize) -> Option<String> {
    let without_trailing_semicolon = query_text.trim().trim_end_matches(';').trim();
    if without_trailing_semicolon.is_empty()
        || without_trailing_semicolon.contains(';')
        || !starts_with_select(without_trailing_semicolon)
        || contains_limit_keyword(without_trailing_semicolon)
    {
        return None;
    }

    Some(format!("{without_trailing_semicolon} LIMIT {limit}"))
}

fn starts_with_select(query: &str) -> bool {
    let mut words = query.split_whitespace();
    matches!(words.next(), Some(keyword) if keyword.eq_ignore_ascii_case("SELECT"))
}

fn contains_limit_keyword(query: &str) -> bool {
    query
        .split(|ch: char| !ch.is_ascii_alphanumeric() && ch != '_')
        .any(|token| token.eq_ignore_ascii_case("LIMIT"))
}
