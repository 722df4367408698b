use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Wrap};
use ratatui::Frame;
use sqlb_core::actions_engine::AppView;
use sqlb_core::query_builder::{ColumnRef, Conjunction, SortDirection};
use sqlb_core::schema_cache::TableKind;
use sqlb_core::sql_validator::IssueSeverity;
use sqlb_core::templates::TemplateOrigin;

use crate::app::{TuiApp, FOOTER_ACTIONS_LIMIT};
use crate::schema_tree::SchemaNode;
use crate::text_input::TextInput;

const MAX_COLUMN_WIDTH: usize = 40;

fn cursor_style() -> Style {
    Style::default()
        .fg(Color::Black)
        .bg(Color::Cyan)
        .add_modifier(Modifier::BOLD)
}

fn marker(selected: bool) -> &'static str {
    if selected {
        ">"
    } else {
        " "
    }
}

fn to_u16(value: usize) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

pub(crate) fn render(frame: &mut Frame<'_>, app: &TuiApp) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(4),
        ])
        .split(frame.area());

    render_header(frame, app, chunks[0]);

    let body = chunks[1];
    let block = Block::default()
        .borders(Borders::ALL)
        .title(app.pane.title());
    match app.pane {
        AppView::OpenDatabase => render_open_database(frame, app, body, block),
        AppView::SchemaExplorer => render_schema(frame, app, body, block),
        AppView::Builder => render_builder(frame, app, body, block),
        AppView::QueryEditor => render_editor(frame, app, body),
        AppView::Results => render_results(frame, app, body),
        AppView::History => {
            let lines = app
                .history
                .entries()
                .iter()
                .rev()
                .enumerate()
                .map(|(index, entry)| {
                    let rows = entry
                        .row_count
                        .map(|rows| format!(" [{rows} rows]"))
                        .unwrap_or_default();
                    list_line(index == app.history_cursor, format!("{}{rows}", entry.summary(80)))
                })
                .collect::<Vec<_>>();
            render_list(frame, body, block, lines, "No queries executed yet", app.history_cursor);
        }
        AppView::Favorites => {
            let lines = app
                .favorites
                .favorites()
                .iter()
                .enumerate()
                .map(|(index, favorite)| {
                    list_line(
                        index == app.favorites_cursor,
                        format!("{}: {}", favorite.name, first_line(&favorite.query)),
                    )
                })
                .collect::<Vec<_>>();
            render_list(frame, body, block, lines, "No favorites saved yet", app.favorites_cursor);
        }
        AppView::Templates => {
            let lines = app
                .templates
                .templates()
                .into_iter()
                .enumerate()
                .map(|(index, template)| {
                    let origin = match template.origin {
                        TemplateOrigin::BuiltIn => "built-in",
                        TemplateOrigin::User => "user",
                    };
                    list_line(
                        index == app.templates_cursor,
                        format!("{} ({origin}): {}", template.name, first_line(&template.sql)),
                    )
                })
                .collect::<Vec<_>>();
            render_list(frame, body, block, lines, "No templates", app.templates_cursor);
        }
    }

    render_footer(frame, app, chunks[2]);

    if let Some(pending) = &app.pending {
        let area = centered_rect(70, 40, frame.area());
        frame.render_widget(Clear, area);
        let popup = Paragraph::new(vec![
            Line::from(Span::styled(
                format!("Safe mode: {}", pending.reasons),
                Style::default().fg(Color::Yellow),
            )),
            Line::from(""),
            Line::from(pending.sql.as_str()),
            Line::from(""),
            Line::from("y / Enter: run anyway    n / Esc: discard"),
        ])
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Confirm statement"));
        frame.render_widget(popup, area);
    }

    if let Some(prompt) = &app.prompt {
        let area = centered_rect(60, 20, frame.area());
        frame.render_widget(Clear, area);
        render_input(frame, &prompt.input, area, &prompt.kind.label());
    }

    if app.show_help {
        render_help_popup(frame);
    }
}

fn render_header(frame: &mut Frame<'_>, app: &TuiApp, area: Rect) {
    let mut spans = Vec::new();
    for view in AppView::CYCLE {
        let style = if view == app.pane {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(format!(" {} ", view.title()), style));
    }
    spans.push(Span::raw(" | "));
    spans.push(Span::raw(format!(
        "DB: {}",
        app.connection_label()
            .unwrap_or_else(|| "not connected".to_string())
    )));
    spans.push(Span::raw(" | "));
    spans.push(Span::raw(format!(
        "Safe mode: {}",
        if app.safe_mode.is_enabled() { "on" } else { "off" }
    )));
    spans.push(Span::raw(" | "));
    spans.push(Span::raw(format!(
        "Query: {}",
        if app.running.is_some() { "running" } else { "idle" }
    )));

    let header = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title("sqlb"));
    frame.render_widget(header, area);
}

fn render_footer(frame: &mut Frame<'_>, app: &TuiApp, area: Rect) {
    let actions = app
        .actions
        .rank_top_n(&app.action_context(), FOOTER_ACTIONS_LIMIT);
    let footer_line = if actions.is_empty() {
        "No available actions in this context".to_string()
    } else {
        actions
            .iter()
            .enumerate()
            .map(|(index, action)| format!("{}:{} ", index + 1, action.title))
            .collect::<Vec<_>>()
            .join("| ")
    };
    let status_style = if app.status.is_error {
        Style::default().fg(Color::Red)
    } else {
        Style::default()
    };
    let footer = Paragraph::new(vec![
        Line::from(footer_line),
        Line::from(Span::styled(
            format!("Status: {}", app.status.text),
            status_style,
        )),
    ])
    .block(Block::default().borders(Borders::ALL).title("Next Actions"));
    frame.render_widget(footer, area);
}

fn render_open_database(frame: &mut Frame<'_>, app: &TuiApp, area: Rect, block: Block<'_>) {
    let inner = block.inner(area);
    frame.render_widget(block, area);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(1)])
        .split(inner);

    let mode = if app.open_read_only {
        "read-only"
    } else {
        "read-write"
    };
    render_input(
        frame,
        &app.open_input,
        chunks[0],
        &format!("Database path or :memory: ({mode}, F2 toggles)"),
    );

    let recent = &app.settings.settings().recent_databases;
    let mut lines = vec![Line::from("Recent databases (Up/Down to pick, Enter to open):")];
    if recent.is_empty() {
        lines.push(Line::from("  none yet"));
    }
    for (index, path) in recent.iter().enumerate() {
        lines.push(list_line(app.recent_cursor == Some(index), path.clone()));
    }
    frame.render_widget(Paragraph::new(lines), chunks[1]);
}

fn render_schema(frame: &mut Frame<'_>, app: &TuiApp, area: Rect, block: Block<'_>) {
    let lines = app
        .schema_tree
        .nodes()
        .iter()
        .enumerate()
        .map(|(index, node)| {
            let selected = index == app.schema_tree.cursor();
            let text = match node {
                SchemaNode::Table {
                    schema,
                    table,
                    kind,
                    expanded,
                } => {
                    let fold = if *expanded { "-" } else { "+" };
                    let picked = if app.builder.is_table_selected(table) { "*" } else { " " };
                    let kind = match kind {
                        TableKind::Table => "",
                        TableKind::View => " (view)",
                    };
                    let prefix = if schema == "main" {
                        String::new()
                    } else {
                        format!("{schema}.")
                    };
                    format!("{fold}{picked} {prefix}{table}{kind}")
                }
                SchemaNode::Column {
                    table,
                    column,
                    data_type,
                    primary_key,
                    ..
                } => {
                    let picked = if app.builder.is_column_selected(
                        &ColumnRef::new(table.clone(), column.clone()),
                    ) {
                        "*"
                    } else {
                        " "
                    };
                    let key = if *primary_key { " PK" } else { "" };
                    let data_type = if data_type.is_empty() { "ANY" } else { data_type };
                    format!("   {picked} {column}: {data_type}{key}")
                }
            };
            list_line(selected, text)
        })
        .collect::<Vec<_>>();
    render_list(
        frame,
        area,
        block,
        lines,
        "No tables. Create one from the Query pane.",
        app.schema_tree.cursor(),
    );
}

fn render_builder(frame: &mut Frame<'_>, app: &TuiApp, area: Rect, block: Block<'_>) {
    let builder = &app.builder;
    let mut lines = vec![Line::from(format!(
        "Tables: {}",
        if builder.tables().is_empty() {
            "none (space in Schema pane)".to_string()
        } else {
            builder.tables().join(", ")
        }
    ))];

    lines.push(Line::from("Columns:"));
    if builder.columns().is_empty() {
        lines.push(Line::from("  * (all columns)"));
    }
    for (index, column) in builder.columns().iter().enumerate() {
        let ordered = builder
            .order_by()
            .iter()
            .find(|term| &term.column == column)
            .map(|term| match term.direction {
                SortDirection::Asc => " [asc]",
                SortDirection::Desc => " [desc]",
            })
            .unwrap_or_default();
        let grouped = if builder.group_by().contains(column) {
            " [group]"
        } else {
            ""
        };
        lines.push(list_line(
            index == app.builder_cursor,
            format!("{column}{ordered}{grouped}"),
        ));
    }

    for join in builder.joins() {
        let on = join
            .on
            .iter()
            .map(|(left, right)| format!("{left} = {right}"))
            .collect::<Vec<_>>()
            .join(" AND ");
        lines.push(Line::from(format!("{} {} ON {on}", join.kind.keyword(), join.table)));
    }
    for (index, condition) in builder.conditions().iter().enumerate() {
        let conjunction = match (index, condition.conjunction) {
            (0, _) => "Where",
            (_, Conjunction::And) => "  and",
            (_, Conjunction::Or) => "   or",
        };
        lines.push(Line::from(format!(
            "{conjunction}: {} {} {}",
            condition.column,
            condition.operator.symbol(),
            condition.value.as_deref().unwrap_or_default()
        )));
    }
    lines.push(Line::from(format!(
        "Distinct: {}  Limit: {}",
        if builder.is_distinct() { "yes" } else { "no" },
        builder
            .limit()
            .map_or_else(|| "none".to_string(), |limit| limit.to_string())
    )));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "SQL preview",
        Style::default().add_modifier(Modifier::BOLD),
    )));
    match builder.build() {
        Ok(sql) => lines.extend(sql.lines().map(|line| Line::from(line.to_string()))),
        Err(error) => lines.push(Line::from(Span::styled(
            error.to_string(),
            Style::default().fg(Color::DarkGray),
        ))),
    }
    lines.push(Line::from(""));
    lines.push(Line::from(
        "w filter  x drop filter  s sort  g group  u distinct  m limit  a joins  d remove  c clear  Enter build",
    ));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_editor(frame: &mut Frame<'_>, app: &TuiApp, area: Rect) {
    let title = if app.editing_query {
        "Query [insert]"
    } else {
        "Query (e to edit, F5 to run)"
    };
    let block = Block::default().borders(Borders::ALL).title(title);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let issue_lines = app
        .last_validation
        .as_ref()
        .map(|report| {
            let mut lines = vec![Line::from(report.summary())];
            lines.extend(report.issues.iter().map(|issue| {
                let color = match issue.severity {
                    IssueSeverity::Error => Color::Red,
                    IssueSeverity::Warning => Color::Yellow,
                };
                Line::from(Span::styled(
                    format!("  {}", issue.message),
                    Style::default().fg(color),
                ))
            }));
            lines
        })
        .unwrap_or_default();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(to_u16(issue_lines.len())),
        ])
        .split(inner);

    let (line, column) = app.editor.cursor_position();
    let height = usize::from(chunks[0].height.max(1));
    let scroll = line.saturating_sub(height - 1);
    let editor = Paragraph::new(app.editor.text()).scroll((to_u16(scroll), 0));
    frame.render_widget(editor, chunks[0]);
    if app.editing_query && app.prompt.is_none() && app.pending.is_none() {
        frame.set_cursor_position(Position::new(
            chunks[0].x.saturating_add(to_u16(column)),
            chunks[0].y.saturating_add(to_u16(line - scroll)),
        ));
    }

    frame.render_widget(Paragraph::new(issue_lines), chunks[1]);
}

fn render_results(frame: &mut Frame<'_>, app: &TuiApp, area: Rect) {
    let results = &app.results;
    let page = app
        .pagination
        .as_ref()
        .map(|page| {
            format!(
                ", {} page {}",
                page.table,
                page.offset / page.limit.max(1) + 1
            )
        })
        .unwrap_or_default();
    let block = Block::default().borders(Borders::ALL).title(format!(
        "Results: {} rows buffered, {} seen{page}",
        results.len(),
        results.total_rows_seen()
    ));

    if results.columns().is_empty() {
        let text = match &app.running {
            Some(running) => format!("Running: {}", first_line(&running.sql)),
            None => "Run a query to see rows here".to_string(),
        };
        frame.render_widget(Paragraph::new(text).block(block), area);
        return;
    }

    let offset = app.results_column_offset.min(results.columns().len() - 1);
    let widths = results.column_widths(MAX_COLUMN_WIDTH);
    let null_counts = results.null_counts();
    let header = Row::new(
        results
            .columns()
            .iter()
            .zip(&null_counts)
            .skip(offset)
            .map(|(column, nulls)| {
                let label = if *nulls > 0 {
                    format!("{column} ({nulls} null)")
                } else {
                    column.clone()
                };
                Cell::from(label)
            }),
    )
    .style(Style::default().add_modifier(Modifier::BOLD));

    let visible = usize::from(block.inner(area).height.saturating_sub(1)).max(1);
    let window_start = app.results_cursor.saturating_sub(visible / 2);
    let rows = results
        .visible_rows(window_start, visible)
        .into_iter()
        .enumerate()
        .map(|(position, row)| {
            let cells = (offset..results.columns().len()).map(|index| {
                let value = row.display(index);
                let cell = Cell::from(truncate(value, MAX_COLUMN_WIDTH));
                if row.values.get(index).is_some_and(Option::is_none) {
                    cell.style(Style::default().fg(Color::DarkGray))
                } else {
                    cell
                }
            });
            let row = Row::new(cells);
            if window_start + position == app.results_cursor {
                row.style(cursor_style())
            } else {
                row
            }
        })
        .collect::<Vec<_>>();

    let constraints = widths
        .iter()
        .skip(offset)
        .map(|width| Constraint::Length(to_u16(*width)))
        .collect::<Vec<_>>();
    let table = Table::new(rows, constraints)
        .header(header)
        .column_spacing(2)
        .block(block);
    frame.render_widget(table, area);
}

fn render_list(
    frame: &mut Frame<'_>,
    area: Rect,
    block: Block<'_>,
    lines: Vec<Line<'static>>,
    empty: &'static str,
    cursor: usize,
) {
    if lines.is_empty() {
        frame.render_widget(Paragraph::new(empty).block(block), area);
        return;
    }
    let height = usize::from(block.inner(area).height.max(1));
    let scroll = cursor.saturating_sub(height - 1);
    frame.render_widget(
        Paragraph::new(lines)
            .block(block)
            .scroll((to_u16(scroll), 0)),
        area,
    );
}

fn render_input(frame: &mut Frame<'_>, input: &TextInput, area: Rect, title: &str) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title.to_string());
    let inner = block.inner(area);
    frame.render_widget(Paragraph::new(input.text()).block(block), area);
    let (_, column) = input.cursor_position();
    frame.set_cursor_position(Position::new(
        inner.x.saturating_add(to_u16(column)),
        inner.y,
    ));
}

fn list_line(selected: bool, text: String) -> Line<'static> {
    let line = Line::from(format!("{} {text}", marker(selected)));
    if selected {
        line.style(cursor_style())
    } else {
        line
    }
}

fn first_line(sql: &str) -> String {
    let mut lines = sql.trim().lines();
    let first = lines.next().unwrap_or_default();
    if lines.next().is_some() {
        format!("{first} ...")
    } else {
        first.to_string()
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.replace('\n', " ");
    }
    let mut shortened = value
        .chars()
        .take(max_chars.saturating_sub(1))
        .collect::<String>()
        .replace('\n', " ");
    shortened.push('~');
    shortened
}

fn render_help_popup(frame: &mut Frame<'_>) {
    let area = centered_rect(70, 70, frame.area());
    frame.render_widget(Clear, area);
    let help = Paragraph::new(vec![
        Line::from("Global keymap"),
        Line::from("q: quit    ?: toggle help    Tab / Shift+Tab: cycle panes"),
        Line::from("1..7: invoke ranked action slot    Ctrl+C: cancel running query"),
        Line::from("F5 or Ctrl+R: run editor query    o: open database    r: reload schema"),
        Line::from("!: toggle safe mode    Esc: leave input, close popups"),
        Line::from(""),
        Line::from("Schema: arrows/hjkl move and fold, space selects, w/s/g filter/sort/group"),
        Line::from("Builder: w x s g u m a d c as listed in the pane, Enter builds SQL"),
        Line::from("Query: e or Enter edits, t saves as template, c clears"),
        Line::from("Results: arrows scroll rows and columns, / searches, n next match"),
        Line::from("History / Favorites / Templates: Enter loads into the editor, d deletes"),
        Line::from("History: c clears all entries"),
    ])
    .alignment(Alignment::Left)
    .block(Block::default().borders(Borders::ALL).title("Help"));
    frame.render_widget(help, area);
}

fn centered_rect(width_percent: u16, height_percent: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100_u16 - height_percent) / 2),
            Constraint::Percentage(height_percent),
            Constraint::Percentage((100_u16 - height_percent) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100_u16 - width_percent) / 2),
            Constraint::Percentage(width_percent),
            Constraint::Percentage((100_u16 - width_percent) / 2),
        ])
        .split(vertical[1])[1]
}
