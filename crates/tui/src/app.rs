use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlb_adapters::export::{export_results_to_csv, export_results_to_json};
use sqlb_adapters::sqlite::{SqliteConnectionBackend, SqliteDataBackend, SqliteRowStream};
use sqlb_core::actions_engine::{
    ActionContext, ActionId, ActionInvocation, ActionsEngine, AppView, ExportFormat,
    SchemaSelection,
};
use sqlb_core::connection_manager::{ConnectionManager, DatabaseLocation, DatabaseTarget};
use sqlb_core::favorites::{Favorite, FileFavoritesStore, FAVORITES_FILE_NAME};
use sqlb_core::history::{FileHistoryStore, HistoryEntry, HISTORY_FILE_NAME};
use sqlb_core::query_builder::{parse_condition, suggest_join, ColumnRef, QueryBuilder};
use sqlb_core::query_runner::{
    CancellationToken, PumpProgress, QueryExecution, QueryExecutionSummary, QueryRunner,
};
use sqlb_core::results::ResultSet;
use sqlb_core::safe_mode::{ConfirmationToken, GuardDecision, SafeModeGuard};
use sqlb_core::schema_cache::{SchemaCacheService, SchemaCatalog};
use sqlb_core::settings::FileSettingsStore;
use sqlb_core::sql_formatter::SqlFormatter;
use sqlb_core::sql_generator::{
    adjacent_page_offset, offset_page_sql, PaginationDirection, SqlTarget,
};
use sqlb_core::sql_validator::{
    classify_statement, parse_statements, validate_sql, ValidationReport,
};
use sqlb_core::templates::{TemplateLibrary, TEMPLATES_FILE_NAME};
use tokio::runtime::Runtime;

use crate::keymap::{DirectionKey, InputMode, Msg};
use crate::schema_tree::{SchemaNode, SchemaTree};
use crate::text_input::TextInput;
use crate::{TuiError, TuiOptions};

pub(crate) const FOOTER_ACTIONS_LIMIT: usize = 7;
const SCHEMA_CACHE_TTL: Duration = Duration::from_secs(60);
/// Longest a single tick waits for rows before handing control back to input.
const PUMP_BUDGET: Duration = Duration::from_millis(40);
const EXPORTS_DIR: &str = "exports";

struct Session {
    schema: SchemaCacheService<SqliteDataBackend>,
    runner: QueryRunner<SqliteDataBackend>,
}

pub(crate) struct RunningQuery {
    execution: QueryExecution<SqliteRowStream>,
    pub(crate) sql: String,
    changes_schema: bool,
    cancellation: CancellationToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PreviewPage {
    pub(crate) schema: String,
    pub(crate) table: String,
    pub(crate) offset: usize,
    pub(crate) limit: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct PendingConfirmation {
    token: ConfirmationToken,
    pub(crate) sql: String,
    pub(crate) reasons: String,
    page: Option<PreviewPage>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PromptKind {
    Search,
    FavoriteName { sql: String },
    TemplateName { sql: String },
    Filter { column: ColumnRef },
    Limit,
}

impl PromptKind {
    pub(crate) fn label(&self) -> String {
        match self {
            Self::Search => "Search results".to_string(),
            Self::FavoriteName { .. } => "Favorite name".to_string(),
            Self::TemplateName { .. } => "Template name".to_string(),
            Self::Filter { column } => format!("Filter {column} (e.g. `>= 10`, `or like %a%`)"),
            Self::Limit => "LIMIT (empty to remove)".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Prompt {
    pub(crate) kind: PromptKind,
    pub(crate) input: TextInput,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct StatusLine {
    pub(crate) text: String,
    pub(crate) is_error: bool,
}

pub(crate) struct TuiApp {
    pub(crate) actions: ActionsEngine,
    pub(crate) pane: AppView,
    pub(crate) settings: FileSettingsStore,
    config_dir: PathBuf,
    runtime: Runtime,
    connections: ConnectionManager<SqliteConnectionBackend>,
    session: Option<Session>,
    pub(crate) catalog: Arc<SchemaCatalog>,
    pub(crate) schema_tree: SchemaTree,
    pub(crate) builder: QueryBuilder,
    pub(crate) builder_cursor: usize,
    pub(crate) editor: TextInput,
    pub(crate) editing_query: bool,
    pub(crate) last_validation: Option<ValidationReport>,
    pub(crate) open_input: TextInput,
    pub(crate) open_read_only: bool,
    pub(crate) recent_cursor: Option<usize>,
    pub(crate) prompt: Option<Prompt>,
    pub(crate) results: ResultSet,
    pub(crate) results_cursor: usize,
    pub(crate) results_column_offset: usize,
    last_search: Option<String>,
    pub(crate) running: Option<RunningQuery>,
    pub(crate) pending: Option<PendingConfirmation>,
    pub(crate) pagination: Option<PreviewPage>,
    pub(crate) history: FileHistoryStore,
    pub(crate) history_cursor: usize,
    pub(crate) favorites: FileFavoritesStore,
    pub(crate) favorites_cursor: usize,
    pub(crate) templates: TemplateLibrary,
    pub(crate) templates_cursor: usize,
    pub(crate) safe_mode: SafeModeGuard,
    formatter: SqlFormatter,
    pub(crate) show_help: bool,
    pub(crate) should_quit: bool,
    pub(crate) status: StatusLine,
}

impl TuiApp {
    pub(crate) fn new(options: TuiOptions) -> Result<Self, TuiError> {
        let TuiOptions {
            settings,
            config_dir,
            database,
            read_only,
        } = options;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;

        let mut warnings = Vec::new();
        let history_path = config_dir.join(HISTORY_FILE_NAME);
        let history_limit = settings.settings().history_limit;
        let history = FileHistoryStore::load_from_path(&history_path, history_limit)
            .unwrap_or_else(|error| {
                warnings.push(format!("History not loaded: {error}"));
                FileHistoryStore::empty_at(&history_path, history_limit)
            });
        let favorites_path = config_dir.join(FAVORITES_FILE_NAME);
        let favorites = FileFavoritesStore::load_from_path(&favorites_path).unwrap_or_else(|error| {
            warnings.push(format!("Favorites not loaded: {error}"));
            FileFavoritesStore::empty_at(&favorites_path)
        });
        let templates_path = config_dir.join(TEMPLATES_FILE_NAME);
        let templates = TemplateLibrary::load_from_path(&templates_path).unwrap_or_else(|error| {
            warnings.push(format!("Templates not loaded: {error}"));
            TemplateLibrary::builtin_only(&templates_path)
        });
        for warning in &warnings {
            tracing::warn!("{warning}");
        }

        let app_settings = settings.settings();
        let result_buffer_capacity = app_settings.result_buffer_capacity;
        let safe_mode = SafeModeGuard::new(app_settings.safe_mode);
        let formatter = SqlFormatter::new(app_settings.formatter.clone());
        let mut app = Self {
            actions: ActionsEngine::new(),
            pane: AppView::OpenDatabase,
            config_dir,
            runtime,
            connections: ConnectionManager::new(SqliteConnectionBackend),
            session: None,
            catalog: Arc::new(SchemaCatalog::default()),
            schema_tree: SchemaTree::default(),
            builder: QueryBuilder::new(),
            builder_cursor: 0,
            editor: TextInput::default(),
            editing_query: false,
            last_validation: None,
            open_input: TextInput::default(),
            open_read_only: read_only,
            recent_cursor: None,
            prompt: None,
            results: ResultSet::new(result_buffer_capacity),
            results_cursor: 0,
            results_column_offset: 0,
            last_search: None,
            running: None,
            pending: None,
            pagination: None,
            history,
            history_cursor: 0,
            favorites,
            favorites_cursor: 0,
            templates,
            templates_cursor: 0,
            safe_mode,
            formatter,
            show_help: false,
            should_quit: false,
            status: StatusLine::default(),
            settings,
        };

        match warnings.first() {
            Some(warning) => app.set_error(warning.clone()),
            None => app.set_status("Type a database path (or :memory:) and press Enter"),
        }
        if let Some(target) = database {
            app.open_database(target);
        }
        Ok(app)
    }

    pub(crate) fn input_mode(&self) -> InputMode {
        if self.prompt.is_some()
            || (self.pane == AppView::OpenDatabase && self.pending.is_none())
            || (self.pane == AppView::QueryEditor && self.editing_query)
        {
            InputMode::Editing
        } else {
            InputMode::Normal
        }
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub(crate) fn connection_label(&self) -> Option<String> {
        let status = self.connections.status();
        let label = status.target_label?;
        let latency = status
            .last_latency
            .map(|latency| format!(" {}ms", latency.as_millis()))
            .unwrap_or_default();
        let mode = if status.read_only { " read-only" } else { "" };
        Some(format!("{label}{mode}{latency}"))
    }

    pub(crate) fn set_status(&mut self, text: impl Into<String>) {
        self.status = StatusLine {
            text: text.into(),
            is_error: false,
        };
    }

    pub(crate) fn set_error(&mut self, text: impl Into<String>) {
        self.status = StatusLine {
            text: text.into(),
            is_error: true,
        };
    }

    pub(crate) fn handle(&mut self, msg: Msg) {
        if self.pending.is_some() && self.handle_pending_confirmation(msg) {
            return;
        }

        match msg {
            Msg::Quit => self.should_quit = true,
            Msg::ToggleHelp => self.show_help = !self.show_help,
            Msg::NextPane => self.switch_pane(self.pane.next()),
            Msg::PreviousPane => self.switch_pane(previous_view(self.pane)),
            Msg::Submit => self.submit(),
            Msg::Escape => self.escape(),
            Msg::CancelQuery => self.cancel_query(),
            Msg::RunQuery => {
                let context = self
                    .action_context()
                    .with_view(AppView::QueryEditor)
                    .with_query(self.editor.text());
                self.invoke_action(ActionId::RunCurrentQuery, &context);
            }
            Msg::ToggleReadOnly => {
                self.open_read_only = !self.open_read_only;
                self.set_status(if self.open_read_only {
                    "Databases will open read-only"
                } else {
                    "Databases will open read-write"
                });
            }
            Msg::Navigate(direction) => self.navigate(direction),
            Msg::InvokeActionSlot(index) => self.invoke_ranked_action(index),
            Msg::PaneKey(key) => self.pane_key(key),
            Msg::Input(ch) => {
                if let Some(input) = self.focused_input() {
                    input.insert(ch);
                }
            }
            Msg::Backspace => {
                if let Some(input) = self.focused_input() {
                    input.backspace();
                }
            }
            Msg::Tick => self.on_tick(),
        }
    }

    /// Returns `true` when `msg` was consumed by the confirmation prompt.
    fn handle_pending_confirmation(&mut self, msg: Msg) -> bool {
        match msg {
            Msg::PaneKey('y') | Msg::Submit => {
                if let Some(pending) = self.pending.take() {
                    match self.safe_mode.confirm(&pending.token, &pending.sql) {
                        Ok(()) => self.start_query(pending.sql, pending.page),
                        Err(error) => self.set_error(format!("Confirmation rejected: {error}")),
                    }
                }
                true
            }
            Msg::PaneKey('n') | Msg::Escape => {
                self.pending = None;
                self.set_status("Statement discarded");
                true
            }
            Msg::Tick | Msg::Quit | Msg::ToggleHelp => false,
            _ => {
                self.set_status("Press y to run the statement or Esc to discard it");
                true
            }
        }
    }

    fn focused_input(&mut self) -> Option<&mut TextInput> {
        if let Some(prompt) = self.prompt.as_mut() {
            return Some(&mut prompt.input);
        }
        match self.pane {
            AppView::OpenDatabase => Some(&mut self.open_input),
            AppView::QueryEditor if self.editing_query => Some(&mut self.editor),
            _ => None,
        }
    }

    fn switch_pane(&mut self, pane: AppView) {
        if pane == AppView::SchemaExplorer && !self.is_connected() {
            self.pane = AppView::OpenDatabase;
            self.set_status("Open a database first");
            return;
        }
        self.pane = pane;
        self.editing_query = false;
        self.set_status(format!("Switched pane to {}", pane.title()));
    }

    fn escape(&mut self) {
        if self.prompt.take().is_some() {
            self.set_status("Prompt closed");
        } else if self.show_help {
            self.show_help = false;
        } else if self.editing_query {
            self.editing_query = false;
            self.set_status("Editor: normal mode");
        } else if self.pane == AppView::OpenDatabase {
            if self.is_connected() {
                self.pane = AppView::SchemaExplorer;
                self.set_status("Switched pane to Schema");
            } else {
                self.should_quit = true;
            }
        }
    }

    fn on_tick(&mut self) {
        let Some(mut running) = self.running.take() else {
            return;
        };

        let rows_per_tick = self.settings.settings().rows_per_tick;
        let results = &mut self.results;
        let execution = &mut running.execution;
        let cancellation = &running.cancellation;
        let pumped = self.runtime.block_on(async move {
            tokio::time::timeout(
                PUMP_BUDGET,
                execution.pump(results, rows_per_tick, cancellation),
            )
            .await
        });

        match pumped {
            Err(_) | Ok(Ok(PumpProgress::Streaming { .. })) => {
                self.set_status(format!(
                    "Running... {} rows",
                    running.execution.rows_streamed()
                ));
                self.running = Some(running);
            }
            Ok(Ok(PumpProgress::Finished(summary))) => self.finish_query(running, &summary),
            Ok(Ok(PumpProgress::Cancelled(summary))) => {
                self.set_status(format!(
                    "Query cancelled after {} rows",
                    summary.rows_streamed
                ));
            }
            Ok(Err(error)) => {
                tracing::warn!(%error, "query failed while streaming");
                self.set_error(format!("Query failed: {error}"));
            }
        }
    }

    fn finish_query(&mut self, running: RunningQuery, summary: &QueryExecutionSummary) {
        let elapsed_ms = u64::try_from(summary.elapsed.as_millis()).unwrap_or(u64::MAX);
        let row_count = summary.rows_affected.unwrap_or(summary.rows_streamed);

        let mut entry = HistoryEntry::new(running.sql.clone(), Utc::now());
        entry.database = self.connections.status().target_label;
        entry.row_count = Some(row_count);
        entry.elapsed_ms = Some(elapsed_ms);
        self.history.record(entry);
        self.history_cursor = 0;
        let persisted = self.history.persist();

        if running.changes_schema {
            if let Some(session) = self.session.as_mut() {
                session.schema.invalidate();
            }
            self.refresh_schema();
        }

        let outcome = match summary.rows_affected {
            Some(changed) => format!("{changed} rows affected in {elapsed_ms} ms"),
            None => {
                let dropped = self.results.dropped_rows();
                if dropped > 0 {
                    format!(
                        "{} rows in {elapsed_ms} ms ({dropped} oldest rows not kept)",
                        summary.rows_streamed
                    )
                } else {
                    format!("{} rows in {elapsed_ms} ms", summary.rows_streamed)
                }
            }
        };
        match persisted {
            Ok(()) => self.set_status(outcome),
            Err(error) => self.set_error(format!("{outcome}; history not saved: {error}")),
        }
    }

    fn submit(&mut self) {
        if let Some(prompt) = self.prompt.take() {
            self.submit_prompt(prompt);
            return;
        }

        match self.pane {
            AppView::OpenDatabase => {
                let input = self.open_input.text().to_string();
                match DatabaseTarget::parse(&input) {
                    Some(target) => self.open_database(target.with_read_only(self.open_read_only)),
                    None => self.set_error("Enter a database path or :memory:"),
                }
            }
            AppView::SchemaExplorer => {
                let expanded = matches!(
                    self.schema_tree.selected(),
                    Some(SchemaNode::Table { expanded: true, .. })
                );
                self.schema_tree.set_expanded(&self.catalog, !expanded);
            }
            AppView::Builder => {
                let context = self.action_context();
                self.invoke_action(ActionId::BuildQuery, &context);
            }
            AppView::QueryEditor => {
                if self.editing_query {
                    self.editor.insert('\n');
                } else {
                    self.editing_query = true;
                    self.set_status("Editor: insert mode (Esc to leave, Ctrl+R to run)");
                }
            }
            AppView::Results => {
                if let Some(row) = self.results.row(self.results_cursor) {
                    let rendered = self
                        .results
                        .columns()
                        .iter()
                        .enumerate()
                        .map(|(index, column)| format!("{column}={}", row.display(index)))
                        .collect::<Vec<_>>()
                        .join(", ");
                    self.set_status(rendered);
                }
            }
            AppView::History => self.load_history_entry(),
            AppView::Favorites => self.load_favorite(),
            AppView::Templates => self.load_template(),
        }
    }

    fn submit_prompt(&mut self, prompt: Prompt) {
        let text = prompt.input.text().trim().to_string();
        match prompt.kind {
            PromptKind::Search => {
                self.last_search = Some(text);
                self.search_results(None);
            }
            PromptKind::FavoriteName { sql } => {
                let name = text.clone();
                let saved = self
                    .favorites
                    .upsert(Favorite::new(text, sql))
                    .and_then(|()| self.favorites.persist());
                match saved {
                    Ok(()) => self.set_status(format!("Saved favorite `{name}`")),
                    Err(error) => self.set_error(format!("Favorite not saved: {error}")),
                }
            }
            PromptKind::TemplateName { sql } => {
                let name = text.clone();
                let saved = self
                    .templates
                    .upsert_user(text, sql)
                    .and_then(|()| self.templates.persist());
                match saved {
                    Ok(()) => self.set_status(format!("Saved template `{name}`")),
                    Err(error) => self.set_error(format!("Template not saved: {error}")),
                }
            }
            PromptKind::Filter { column } => match parse_condition(column, &text) {
                Some(condition) => {
                    let column = condition.column.clone();
                    if !self.builder.is_table_selected(&column.table) {
                        self.builder.toggle_table(&column.table);
                    }
                    self.builder.add_condition(condition);
                    self.set_status(format!("Added filter on {column}"));
                }
                None => self.set_error(format!("Could not parse filter `{text}`")),
            },
            PromptKind::Limit => {
                if text.is_empty() {
                    self.builder.set_limit(None);
                    self.set_status("Removed LIMIT");
                } else {
                    match text.parse::<usize>() {
                        Ok(limit) => {
                            self.builder.set_limit(Some(limit));
                            self.set_status(format!("LIMIT {limit}"));
                        }
                        Err(_) => self.set_error(format!("`{text}` is not a row count")),
                    }
                }
            }
        }
    }

    fn open_prompt(&mut self, kind: PromptKind, initial: impl Into<String>) {
        self.set_status(kind.label());
        self.prompt = Some(Prompt {
            kind,
            input: TextInput::with_text(initial),
        });
    }

    pub(crate) fn open_database(&mut self, target: DatabaseTarget) {
        self.close_session();

        match self
            .runtime
            .block_on(self.connections.connect(target.clone()))
        {
            Ok(latency) => {
                let Some(handle) = self.connections.connection().cloned() else {
                    self.set_error("Connection opened without a handle");
                    return;
                };
                let data = SqliteDataBackend::new(handle);
                self.session = Some(Session {
                    schema: SchemaCacheService::new(data.clone(), SCHEMA_CACHE_TTL),
                    runner: QueryRunner::new(data),
                });
                self.results = ResultSet::new(self.settings.settings().result_buffer_capacity);
                self.results_cursor = 0;
                self.pagination = None;
                self.pane = AppView::SchemaExplorer;

                let mut remembered = Ok(());
                if let DatabaseLocation::File(path) = &target.location {
                    self.settings
                        .settings_mut()
                        .remember_database(path.display().to_string());
                    remembered = self.settings.persist();
                }

                self.refresh_schema();
                if !self.status.is_error {
                    let opened = format!(
                        "Opened {target} in {} ms, {} tables",
                        latency.as_millis(),
                        self.catalog.table_count()
                    );
                    match remembered {
                        Ok(()) => self.set_status(opened),
                        Err(error) => {
                            self.set_error(format!("{opened}; recent list not saved: {error}"));
                        }
                    }
                }
            }
            Err(error) => {
                tracing::warn!(database = %target, %error, "open failed");
                self.set_error(format!("Could not open {target}: {error}"));
            }
        }
    }

    fn close_session(&mut self) {
        if let Some(running) = self.running.take() {
            running.cancellation.cancel();
        }
        if let Some(session) = self.session.take() {
            session.runner.backend().handle().interrupt();
        }
        self.pending = None;
        self.catalog = Arc::new(SchemaCatalog::default());
        self.schema_tree.rebuild(&self.catalog);
        if let Err(error) = self.runtime.block_on(self.connections.disconnect()) {
            tracing::warn!(%error, "disconnect failed");
        }
    }

    pub(crate) fn shutdown(&mut self) {
        self.close_session();
    }

    fn refresh_schema(&mut self) {
        let Some(session) = self.session.as_mut() else {
            self.set_error("Open a database first");
            return;
        };
        match self.runtime.block_on(session.schema.refresh()) {
            Ok(catalog) => {
                self.schema_tree.rebuild(&catalog);
                let pruned = self.builder.prune_to(&catalog);
                self.builder_cursor = self
                    .builder_cursor
                    .min(self.builder.columns().len().saturating_sub(1));
                self.catalog = catalog;
                if pruned > 0 {
                    self.set_status(format!(
                        "Schema reloaded; removed {pruned} stale builder items"
                    ));
                } else {
                    self.set_status(format!(
                        "Schema reloaded: {} tables",
                        self.catalog.table_count()
                    ));
                }
            }
            Err(error) => self.set_error(format!("Schema refresh failed: {error}")),
        }
    }

    fn navigate(&mut self, direction: DirectionKey) {
        if let Some(input) = self.prompt.as_mut().map(|prompt| &mut prompt.input) {
            move_in_input(input, direction);
            return;
        }

        match self.pane {
            AppView::OpenDatabase => self.navigate_recent(direction),
            AppView::SchemaExplorer => match direction {
                DirectionKey::Up => self.schema_tree.move_up(),
                DirectionKey::Down => self.schema_tree.move_down(),
                DirectionKey::Left => {
                    self.schema_tree.set_expanded(&self.catalog, false);
                }
                DirectionKey::Right => {
                    self.schema_tree.set_expanded(&self.catalog, true);
                }
            },
            AppView::Builder => {
                let count = self.builder.columns().len();
                self.builder_cursor = step(self.builder_cursor, count, direction);
            }
            AppView::QueryEditor => {
                if self.editing_query {
                    move_in_input(&mut self.editor, direction);
                }
            }
            AppView::Results => self.navigate_results(direction),
            AppView::History => {
                self.history_cursor = step(self.history_cursor, self.history.len(), direction);
            }
            AppView::Favorites => {
                let count = self.favorites.favorites().len();
                self.favorites_cursor = step(self.favorites_cursor, count, direction);
            }
            AppView::Templates => {
                let count = self.templates.names().len();
                self.templates_cursor = step(self.templates_cursor, count, direction);
            }
        }
    }

    fn navigate_recent(&mut self, direction: DirectionKey) {
        let recent = &self.settings.settings().recent_databases;
        if recent.is_empty() {
            move_in_input(&mut self.open_input, direction);
            return;
        }

        let next = match (direction, self.recent_cursor) {
            (DirectionKey::Down, None) => Some(0),
            (DirectionKey::Down, Some(index)) => Some((index + 1).min(recent.len() - 1)),
            (DirectionKey::Up, Some(0) | None) => None,
            (DirectionKey::Up, Some(index)) => Some(index - 1),
            (DirectionKey::Left | DirectionKey::Right, _) => {
                move_in_input(&mut self.open_input, direction);
                return;
            }
        };
        self.recent_cursor = next;
        if let Some(path) = next.and_then(|index| recent.get(index)) {
            self.open_input.set_text(path.clone());
        }
    }

    fn navigate_results(&mut self, direction: DirectionKey) {
        let row_count = self.results.len();
        match direction {
            DirectionKey::Up | DirectionKey::Down => {
                if row_count == 0 {
                    self.set_status("No buffered rows yet");
                    return;
                }
                self.results_cursor = step(self.results_cursor, row_count, direction);
                self.set_status(format!(
                    "Row {} / {}",
                    self.results_cursor + 1,
                    row_count
                ));
            }
            DirectionKey::Left => {
                self.results_column_offset = self.results_column_offset.saturating_sub(1);
            }
            DirectionKey::Right => {
                let last = self.results.columns().len().saturating_sub(1);
                self.results_column_offset = (self.results_column_offset + 1).min(last);
            }
        }
    }

    fn pane_key(&mut self, key: char) {
        match key {
            'o' => {
                self.pane = AppView::OpenDatabase;
                self.recent_cursor = None;
                self.set_status("Type a database path (or :memory:) and press Enter");
                return;
            }
            'r' if self.pane != AppView::Results => {
                if let Some(session) = self.session.as_mut() {
                    session.schema.invalidate();
                }
                self.refresh_schema();
                return;
            }
            '!' => {
                let enabled = !self.safe_mode.is_enabled();
                self.safe_mode.set_enabled(enabled);
                self.set_status(if enabled {
                    "Safe mode on"
                } else {
                    "Safe mode off"
                });
                return;
            }
            _ => {}
        }

        match self.pane {
            AppView::SchemaExplorer => self.schema_key(key),
            AppView::Builder => self.builder_key(key),
            AppView::QueryEditor => self.editor_key(key),
            AppView::Results => self.results_key(key),
            AppView::History => self.history_key(key),
            AppView::Favorites => self.favorites_key(key),
            AppView::Templates => self.templates_key(key),
            AppView::OpenDatabase => {}
        }
    }

    fn schema_key(&mut self, key: char) {
        let Some(node) = self.schema_tree.selected().cloned() else {
            self.set_status("No tables loaded");
            return;
        };

        match (key, node) {
            (' ', SchemaNode::Table { table, .. }) => {
                let selected = self.builder.toggle_table(&table);
                self.set_status(if selected {
                    format!("Added table `{table}` to the builder")
                } else {
                    format!("Removed table `{table}` from the builder")
                });
            }
            (' ', SchemaNode::Column { table, column, .. }) => {
                let column = ColumnRef::new(table, column);
                let selected = self.builder.toggle_column(column.clone());
                self.set_status(if selected {
                    format!("Added column {column}")
                } else {
                    format!("Removed column {column}")
                });
            }
            ('w' | 's' | 'g', SchemaNode::Column { table, column, .. }) => {
                self.column_command(key, ColumnRef::new(table, column));
            }
            _ => {}
        }
    }

    fn builder_key(&mut self, key: char) {
        let focused = self.builder.columns().get(self.builder_cursor).cloned();
        match (key, focused) {
            ('w' | 's' | 'g', Some(column)) => self.column_command(key, column),
            ('d', Some(column)) => {
                self.builder.toggle_column(column.clone());
                self.builder_cursor = self
                    .builder_cursor
                    .min(self.builder.columns().len().saturating_sub(1));
                self.set_status(format!("Removed column {column}"));
            }
            ('w' | 's' | 'g' | 'd', None) => {
                self.set_status("Select columns in the Schema pane with space");
            }
            ('x', _) => {
                let last = self.builder.conditions().len().checked_sub(1);
                match last.and_then(|index| self.builder.remove_condition(index)) {
                    Some(condition) => {
                        self.set_status(format!("Removed filter on {}", condition.column));
                    }
                    None => self.set_status("No filters to remove"),
                }
            }
            ('u', _) => {
                let distinct = !self.builder.is_distinct();
                self.builder.set_distinct(distinct);
                self.set_status(if distinct { "DISTINCT on" } else { "DISTINCT off" });
            }
            ('m', _) => {
                let current = self
                    .builder
                    .limit()
                    .map(|limit| limit.to_string())
                    .unwrap_or_default();
                self.open_prompt(PromptKind::Limit, current);
            }
            ('a', _) => self.suggest_joins(),
            ('c', _) => {
                self.builder.clear();
                self.builder_cursor = 0;
                self.set_status("Builder cleared");
            }
            _ => {}
        }
    }

    fn column_command(&mut self, key: char, column: ColumnRef) {
        match key {
            'w' => self.open_prompt(PromptKind::Filter { column }, ""),
            's' => {
                if !self.builder.is_table_selected(&column.table) {
                    self.builder.toggle_table(&column.table);
                }
                self.builder.toggle_order_by(column.clone());
                self.set_status(format!("Ordering by {column}"));
            }
            'g' => {
                if !self.builder.is_table_selected(&column.table) {
                    self.builder.toggle_table(&column.table);
                }
                self.builder.add_group_by(column.clone());
                self.set_status(format!("Grouping by {column}"));
            }
            _ => {}
        }
    }

    fn suggest_joins(&mut self) {
        let tables = self.builder.tables().to_vec();
        let Some((first, rest)) = tables.split_first() else {
            self.set_status("Select at least two tables to join");
            return;
        };

        let mut added = 0;
        for table in rest {
            if self.builder.joins().iter().any(|join| &join.table == table) {
                continue;
            }
            let suggestion = suggest_join(&self.catalog, first, table).or_else(|| {
                tables
                    .iter()
                    .filter(|candidate| *candidate != table)
                    .find_map(|candidate| suggest_join(&self.catalog, candidate, table))
            });
            if let Some(join) = suggestion {
                self.builder.add_join(join);
                added += 1;
            }
        }

        if added == 0 {
            self.set_status("No foreign keys link the selected tables");
        } else {
            self.set_status(format!("Added {added} joins from foreign keys"));
        }
    }

    fn editor_key(&mut self, key: char) {
        match key {
            'e' | 'i' => {
                self.editing_query = true;
                self.set_status("Editor: insert mode (Esc to leave, Ctrl+R to run)");
            }
            't' => {
                let sql = self.editor.text().trim().to_string();
                if sql.is_empty() {
                    self.set_status("Write a query before saving it as a template");
                } else {
                    self.open_prompt(PromptKind::TemplateName { sql }, "");
                }
            }
            'c' => {
                self.editor.clear();
                self.last_validation = None;
                self.set_status("Editor cleared");
            }
            _ => {}
        }
    }

    fn results_key(&mut self, key: char) {
        match key {
            '/' => {
                let current = self.last_search.clone().unwrap_or_default();
                self.open_prompt(PromptKind::Search, current);
            }
            'n' => self.search_results(Some(self.results_cursor)),
            _ => {}
        }
    }

    fn search_results(&mut self, after: Option<usize>) {
        let Some(needle) = self.last_search.clone().filter(|needle| !needle.is_empty()) else {
            self.set_status("Press / to search the buffered rows");
            return;
        };
        match self.results.find_next(&needle, after) {
            Some(index) => {
                self.results_cursor = index;
                self.set_status(format!("`{needle}` found in row {}", index + 1));
            }
            None => self.set_status(format!("No buffered row contains `{needle}`")),
        }
    }

    fn history_key(&mut self, key: char) {
        match key {
            'd' => {
                let index = self.history_index();
                if index.and_then(|index| self.history.remove(index)).is_some() {
                    self.history_cursor = self
                        .history_cursor
                        .min(self.history.len().saturating_sub(1));
                    self.persist_history("History entry removed");
                }
            }
            'c' => {
                self.history.clear();
                self.history_cursor = 0;
                self.persist_history("History cleared");
            }
            _ => {}
        }
    }

    fn persist_history(&mut self, done: &str) {
        match self.history.persist() {
            Ok(()) => self.set_status(done),
            Err(error) => self.set_error(format!("History not saved: {error}")),
        }
    }

    /// Index into the store for the cursor; the pane lists newest first.
    fn history_index(&self) -> Option<usize> {
        let len = self.history.len();
        (self.history_cursor < len).then(|| len - 1 - self.history_cursor)
    }

    fn load_history_entry(&mut self) {
        let Some(entry) = self
            .history_index()
            .and_then(|index| self.history.entries().get(index))
        else {
            self.set_status("History is empty");
            return;
        };
        let query = entry.query.clone();
        self.load_into_editor(query, "Loaded query from history");
    }

    fn favorites_key(&mut self, key: char) {
        if key != 'd' {
            return;
        }
        let Some(name) = self
            .favorites
            .favorites()
            .get(self.favorites_cursor)
            .map(|favorite| favorite.name.clone())
        else {
            return;
        };
        if self.favorites.delete(&name) {
            self.favorites_cursor = self
                .favorites_cursor
                .min(self.favorites.favorites().len().saturating_sub(1));
            match self.favorites.persist() {
                Ok(()) => self.set_status(format!("Deleted favorite `{name}`")),
                Err(error) => self.set_error(format!("Favorites not saved: {error}")),
            }
        }
    }

    fn load_favorite(&mut self) {
        let Some(favorite) = self.favorites.favorites().get(self.favorites_cursor) else {
            self.set_status("No favorites saved yet");
            return;
        };
        let (name, query) = (favorite.name.clone(), favorite.query.clone());
        self.load_into_editor(query, &format!("Loaded favorite `{name}`"));
    }

    fn templates_key(&mut self, key: char) {
        if key != 'd' {
            return;
        }
        let Some(name) = self.templates.names().get(self.templates_cursor).cloned() else {
            return;
        };
        let deleted = self
            .templates
            .delete_user(&name)
            .and_then(|()| self.templates.persist());
        match deleted {
            Ok(()) => {
                self.templates_cursor = self
                    .templates_cursor
                    .min(self.templates.names().len().saturating_sub(1));
                self.set_status(format!("Deleted template `{name}`"));
            }
            Err(error) => self.set_error(error.to_string()),
        }
    }

    fn load_template(&mut self) {
        let Some(name) = self.templates.names().get(self.templates_cursor).cloned() else {
            self.set_status("No templates available");
            return;
        };
        let Some(sql) = self.templates.get(&name).map(str::to_string) else {
            self.set_error(format!("Template `{name}` disappeared"));
            return;
        };
        self.load_into_editor(sql, &format!("Loaded template `{name}`"));
    }

    fn load_into_editor(&mut self, sql: String, done: &str) {
        self.editor.set_text(sql);
        self.last_validation = None;
        self.editing_query = false;
        self.pane = AppView::QueryEditor;
        self.set_status(done);
    }

    fn cancel_query(&mut self) {
        match &self.running {
            Some(running) => {
                running.cancellation.cancel();
                self.set_status("Cancelling query...");
            }
            None => self.set_status("No query is running"),
        }
    }

    fn invoke_ranked_action(&mut self, index: usize) {
        let context = self.action_context();
        let ranked = self.actions.rank_top_n(&context, FOOTER_ACTIONS_LIMIT);
        let Some(action) = ranked.get(index) else {
            self.set_status(format!("No action bound to slot {}", index + 1));
            return;
        };
        self.invoke_action(action.id, &context);
    }

    fn invoke_action(&mut self, action_id: ActionId, context: &ActionContext) {
        match self.actions.invoke(action_id, context) {
            Ok(ActionInvocation::RunSql(sql)) if action_id == ActionId::PreviewTable => {
                let page = preview_page(&context.selection, context.preview_limit);
                self.run_sql(sql, page);
            }
            Ok(invocation) => self.apply_invocation(invocation),
            Err(error) => self.set_error(format!("Action failed: {error}")),
        }
    }

    fn apply_invocation(&mut self, invocation: ActionInvocation) {
        match invocation {
            ActionInvocation::RunSql(sql) => self.run_sql(sql, None),
            ActionInvocation::BuildQuery => match self.builder.build() {
                Ok(sql) => self.load_into_editor(sql, "Built query from the selection"),
                Err(error) => self.set_error(format!("Cannot build query: {error}")),
            },
            ActionInvocation::ValidateQuery(sql) => {
                match validate_sql(&sql, Some(self.catalog.as_ref())) {
                    Ok(report) => {
                        let summary = report.summary();
                        if report.is_valid() {
                            self.set_status(summary);
                        } else {
                            self.set_error(summary);
                        }
                        self.last_validation = Some(report);
                    }
                    Err(error) => {
                        self.last_validation = None;
                        self.set_error(format!("Invalid SQL: {error}"));
                    }
                }
            }
            ActionInvocation::FormatQuery(sql) => match self.formatter.format(&sql) {
                Ok(formatted) => {
                    self.editor.set_text(formatted);
                    self.set_status("Query formatted");
                }
                Err(error) => self.set_error(format!("Format failed: {error}")),
            },
            ActionInvocation::ReplaceQueryEditorText(query) => {
                self.editor.set_text(query);
                self.set_status("Applied LIMIT suggestion");
            }
            ActionInvocation::SaveFavorite(sql) => {
                let name = self.favorites.next_default_name();
                self.open_prompt(PromptKind::FavoriteName { sql }, name);
            }
            ActionInvocation::PaginatePrevious => self.paginate(PaginationDirection::Previous),
            ActionInvocation::PaginateNext => self.paginate(PaginationDirection::Next),
            ActionInvocation::ExportResults(format) => self.export_results(format),
            ActionInvocation::CancelQuery => self.cancel_query(),
        }
    }

    pub(crate) fn run_sql(&mut self, sql: String, page: Option<PreviewPage>) {
        if self.running.is_some() {
            self.set_status("A query is already running (Ctrl+C cancels it)");
            return;
        }
        if self.session.is_none() {
            self.set_error("Open a database first");
            return;
        }

        match self.safe_mode.evaluate(&sql) {
            GuardDecision::Allow { .. } => self.start_query(sql, page),
            GuardDecision::RequireConfirmation { token, assessment } => {
                let reasons = assessment.describe_reasons();
                self.set_status(format!("Safe mode: {reasons}. Press y to run, Esc to discard"));
                self.pending = Some(PendingConfirmation {
                    token,
                    sql,
                    reasons,
                    page,
                });
            }
        }
    }

    fn start_query(&mut self, sql: String, page: Option<PreviewPage>) {
        let Some(session) = self.session.as_ref() else {
            self.set_error("Open a database first");
            return;
        };

        match self
            .runtime
            .block_on(session.runner.start(&sql, &mut self.results))
        {
            Ok(execution) => {
                tracing::info!(statement = %sql, "query started");
                self.pagination = page;
                self.results_cursor = 0;
                self.results_column_offset = 0;
                self.running = Some(RunningQuery {
                    execution,
                    changes_schema: statement_changes_schema(&sql),
                    sql,
                    cancellation: CancellationToken::new(),
                });
                self.pane = AppView::Results;
                self.editing_query = false;
                self.set_status("Running...");
            }
            Err(error) => {
                tracing::warn!(statement = %sql, %error, "query rejected");
                self.set_error(format!("Query failed: {error}"));
            }
        }
    }

    fn paginate(&mut self, direction: PaginationDirection) {
        let Some(page) = self.pagination.clone() else {
            self.set_status("Pagination is only available for table previews");
            return;
        };
        let Some(offset) = adjacent_page_offset(page.offset, page.limit, direction) else {
            self.set_status("Already on the first page");
            return;
        };
        let sql = match SqlTarget::new(Some(page.schema.as_str()), &page.table) {
            Ok(target) => offset_page_sql(&target, page.limit, offset),
            Err(error) => {
                self.set_error(format!("Cannot paginate: {error}"));
                return;
            }
        };
        self.run_sql(sql, Some(PreviewPage { offset, ..page }));
    }

    fn export_results(&mut self, format: ExportFormat) {
        let file_name = format!(
            "results-{}.{}",
            Utc::now().format("%Y%m%d-%H%M%S"),
            format.extension()
        );
        let path = self.config_dir.join(EXPORTS_DIR).join(file_name);
        let exported = match format {
            ExportFormat::Csv => export_results_to_csv(&path, &self.results),
            ExportFormat::Json => export_results_to_json(&path, &self.results),
        };
        match exported {
            Ok(rows) => self.set_status(format!("Exported {rows} rows to {}", path.display())),
            Err(error) => self.set_error(format!("Export failed: {error}")),
        }
    }

    pub(crate) fn action_context(&self) -> ActionContext {
        let query_text = (self.pane == AppView::QueryEditor)
            .then(|| self.editor.text().to_string());
        let preview_limit = self.settings.settings().preview_limit;
        let pagination = self.pagination.as_ref();

        ActionContext {
            view: self.pane,
            selection: self.schema_tree.selection(),
            query_text,
            query_running: self.running.is_some(),
            has_results: !self.results.columns().is_empty(),
            builder_ready: !self.builder.is_empty(),
            pagination_enabled: pagination.is_some(),
            can_page_next: pagination.is_some_and(|page| self.results.len() >= page.limit),
            can_page_previous: pagination.is_some_and(|page| page.offset > 0),
            preview_limit,
        }
    }
}

fn previous_view(view: AppView) -> AppView {
    let position = AppView::CYCLE.iter().position(|candidate| *candidate == view);
    match position {
        Some(0) | None => AppView::CYCLE[AppView::CYCLE.len() - 1],
        Some(index) => AppView::CYCLE[index - 1],
    }
}

fn step(cursor: usize, len: usize, direction: DirectionKey) -> usize {
    if len == 0 {
        return 0;
    }
    match direction {
        DirectionKey::Up | DirectionKey::Left => cursor.saturating_sub(1),
        DirectionKey::Down | DirectionKey::Right => (cursor + 1).min(len - 1),
    }
}

fn move_in_input(input: &mut TextInput, direction: DirectionKey) {
    match direction {
        DirectionKey::Up => input.move_up(),
        DirectionKey::Down => input.move_down(),
        DirectionKey::Left => input.move_left(),
        DirectionKey::Right => input.move_right(),
    }
}

fn preview_page(selection: &SchemaSelection, limit: usize) -> Option<PreviewPage> {
    Some(PreviewPage {
        schema: selection.schema.clone()?,
        table: selection.table.clone()?,
        offset: 0,
        limit,
    })
}

/// Unparseable input is assumed to change the schema so the cache reloads.
fn statement_changes_schema(sql: &str) -> bool {
    parse_statements(sql).map_or(true, |statements| {
        statements
            .iter()
            .any(|statement| classify_statement(statement).changes_schema())
    })
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use sqlb_core::actions_engine::AppView;
    use sqlb_core::connection_manager::DatabaseTarget;
    use sqlb_core::settings::FileSettingsStore;
    use tempfile::TempDir;

    use super::{statement_changes_schema, TuiApp};
    use crate::keymap::{DirectionKey, Msg};
    use crate::TuiOptions;

    fn app_in(dir: &Path, database: Option<DatabaseTarget>) -> TuiApp {
        let settings = FileSettingsStore::load_from_dir(dir).expect("settings should load");
        TuiApp::new(TuiOptions {
            settings,
            config_dir: dir.to_path_buf(),
            database,
            read_only: false,
        })
        .expect("app should start")
    }

    fn run_to_completion(app: &mut TuiApp, sql: &str) {
        app.run_sql(sql.to_string(), None);
        if app.pending.is_some() {
            app.handle(Msg::PaneKey('y'));
        }
        for _ in 0..1_000 {
            if app.running.is_none() {
                return;
            }
            app.handle(Msg::Tick);
        }
        panic!("query did not finish: {sql}");
    }

    fn type_text(app: &mut TuiApp, text: &str) {
        for ch in text.chars() {
            app.handle(Msg::Input(ch));
        }
    }

    #[test]
    fn template_selection_loads_exact_text_into_editor() {
        let dir = TempDir::new().expect("temp dir");
        let mut app = app_in(dir.path(), None);
        let names = app.templates.names();
        let index = names
            .iter()
            .position(|name| name == "Inner Join")
            .expect("built-in template should exist");

        app.pane = AppView::Templates;
        for _ in 0..index {
            app.handle(Msg::Navigate(DirectionKey::Down));
        }
        app.handle(Msg::Submit);

        assert_eq!(app.pane, AppView::QueryEditor);
        assert_eq!(
            Some(app.editor.text()),
            app.templates.get("Inner Join"),
            "editor should hold the stored template verbatim"
        );
    }

    #[test]
    fn opening_from_the_prompt_lists_tables_and_remembers_the_file() {
        let dir = TempDir::new().expect("temp dir");
        let database = dir.path().join("notes.db");
        let mut app = app_in(dir.path(), None);
        assert_eq!(app.pane, AppView::OpenDatabase);

        type_text(&mut app, &database.display().to_string());
        app.handle(Msg::Submit);
        assert!(app.is_connected(), "status: {}", app.status.text);
        assert_eq!(app.pane, AppView::SchemaExplorer);
        assert_eq!(
            app.settings.settings().recent_databases,
            vec![database.display().to_string()]
        );

        run_to_completion(&mut app, "CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT)");
        assert_eq!(app.catalog.table_count(), 1);
        assert_eq!(app.schema_tree.selection().table.as_deref(), Some("notes"));
        app.shutdown();
    }

    #[test]
    fn invalid_sql_is_reported_and_history_is_untouched() {
        let dir = TempDir::new().expect("temp dir");
        let mut app = app_in(dir.path(), Some(DatabaseTarget::in_memory()));
        assert!(app.is_connected());

        app.pane = AppView::QueryEditor;
        app.editor.set_text("SELEC 1");
        app.handle(Msg::RunQuery);
        assert!(app.pending.is_some(), "unparseable SQL needs confirmation");
        app.handle(Msg::PaneKey('y'));

        assert!(app.status.is_error);
        assert!(app.status.text.contains("syntax error"), "{}", app.status.text);
        assert!(app.history.is_empty());
        assert!(!app.history.path().exists());
    }

    #[test]
    fn writes_need_confirmation_and_successful_runs_are_recorded() {
        let dir = TempDir::new().expect("temp dir");
        let mut app = app_in(dir.path(), Some(DatabaseTarget::in_memory()));

        app.run_sql("CREATE TABLE pets (id INTEGER, name TEXT)".to_string(), None);
        assert!(app.pending.is_some());
        assert!(app.running.is_none());
        app.handle(Msg::Escape);
        assert!(app.pending.is_none());
        assert!(app.history.is_empty());

        run_to_completion(&mut app, "CREATE TABLE pets (id INTEGER, name TEXT)");
        run_to_completion(&mut app, "INSERT INTO pets VALUES (1, 'Rex'), (2, NULL)");
        run_to_completion(&mut app, "SELECT id, name FROM pets ORDER BY id");

        assert_eq!(app.results.columns(), ["id".to_string(), "name".to_string()]);
        assert_eq!(app.results.len(), 2);
        assert_eq!(app.results.row(1).map(|row| row.display(1)), Some("NULL"));
        assert_eq!(app.history.len(), 3);
        assert_eq!(
            app.history.latest().map(|entry| entry.query.as_str()),
            Some("SELECT id, name FROM pets ORDER BY id")
        );
        assert_eq!(app.history.latest().and_then(|entry| entry.row_count), Some(2));
    }

    #[test]
    fn writes_behind_a_with_clause_wait_for_confirmation() {
        let dir = TempDir::new().expect("temp dir");
        let mut app = app_in(dir.path(), Some(DatabaseTarget::in_memory()));
        run_to_completion(&mut app, "CREATE TABLE pets (id INTEGER, name TEXT)");
        run_to_completion(&mut app, "INSERT INTO pets VALUES (1, 'Rex')");

        app.run_sql(
            "WITH renamed AS (SELECT 'Max') UPDATE pets SET name = (SELECT * FROM renamed)"
                .to_string(),
            None,
        );
        assert!(app.pending.is_some(), "CTE-prefixed update must be confirmed");
        assert!(app.running.is_none());
        app.handle(Msg::Escape);

        run_to_completion(&mut app, "SELECT name FROM pets");
        assert_eq!(app.results.row(0).map(|row| row.display(0)), Some("Rex"));
    }

    #[test]
    fn builder_selection_builds_sql_and_is_pruned_after_drop() {
        let dir = TempDir::new().expect("temp dir");
        let mut app = app_in(dir.path(), Some(DatabaseTarget::in_memory()));
        run_to_completion(&mut app, "CREATE TABLE pets (id INTEGER, name TEXT)");

        app.pane = AppView::SchemaExplorer;
        app.handle(Msg::Navigate(DirectionKey::Right));
        app.handle(Msg::Navigate(DirectionKey::Down));
        app.handle(Msg::Navigate(DirectionKey::Down));
        app.handle(Msg::PaneKey(' '));
        assert_eq!(app.builder.columns().len(), 1);

        app.pane = AppView::Builder;
        app.handle(Msg::PaneKey('w'));
        type_text(&mut app, "like R%");
        app.handle(Msg::Submit);
        app.handle(Msg::Submit);

        assert_eq!(app.pane, AppView::QueryEditor);
        assert_eq!(
            app.editor.text(),
            "SELECT \"name\"\nFROM \"pets\"\nWHERE \"name\" LIKE 'R%'"
        );

        run_to_completion(&mut app, "DROP TABLE pets");
        assert!(app.builder.is_empty());
        assert_eq!(app.catalog.table_count(), 0);
    }

    #[test]
    fn preview_pages_through_a_table() {
        let dir = TempDir::new().expect("temp dir");
        let mut app = app_in(dir.path(), Some(DatabaseTarget::in_memory()));
        run_to_completion(&mut app, "CREATE TABLE n (v INTEGER)");
        run_to_completion(
            &mut app,
            "INSERT INTO n SELECT v FROM (
                 WITH RECURSIVE seq(v) AS (SELECT 1 UNION ALL SELECT v + 1 FROM seq WHERE v < 250)
                 SELECT v FROM seq
             )",
        );

        app.pane = AppView::SchemaExplorer;
        let context = app.action_context();
        app.invoke_action(super::ActionId::PreviewTable, &context);
        for _ in 0..1_000 {
            if app.running.is_none() {
                break;
            }
            app.handle(Msg::Tick);
        }
        assert_eq!(app.results.len(), 200);
        assert!(app.action_context().can_page_next);

        app.paginate(super::PaginationDirection::Next);
        for _ in 0..1_000 {
            if app.running.is_none() {
                break;
            }
            app.handle(Msg::Tick);
        }
        assert_eq!(app.results.len(), 50);
        assert_eq!(app.pagination.as_ref().map(|page| page.offset), Some(200));
        assert!(app.action_context().can_page_previous);
    }

    #[test]
    fn ddl_and_unparseable_statements_reload_the_schema() {
        assert!(statement_changes_schema("CREATE TABLE t (id INTEGER)"));
        assert!(statement_changes_schema("VACUUM INTO 'copy.db'"));
        assert!(!statement_changes_schema("SELECT 1"));
        assert!(!statement_changes_schema("DELETE FROM t"));
    }
}
