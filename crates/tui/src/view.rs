use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs, Wrap};
use ratatui::Frame;

use datalink_core::schema_cache::{RoutineKind, TableDetails};
use datalink_core::schema_tree::{NodeKind, VisibleNode};
use datalink_core::sorting::SortDirection;

use crate::app::{ConnectionForm, FormField, NotificationLevel, QueryFocus, Tab, TuiApp};
use crate::worker::BusyKind;

const MAX_COLUMN_WIDTH: usize = 28;

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
    match app.tab {
        Tab::Connections => render_connections(frame, app, chunks[1]),
        Tab::QueryEditor => render_query(frame, app, chunks[1]),
        Tab::SchemaExplorer => render_schema(frame, app, chunks[1]),
    }
    render_footer(frame, app, chunks[2]);

    if app.show_help {
        render_help_popup(frame);
    }
}

fn render_header(frame: &mut Frame<'_>, app: &TuiApp, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(40), Constraint::Length(44)])
        .split(area);

    let tabs = Tabs::new(
        Tab::ALL
            .iter()
            .map(|tab| Line::from(format!("F{} {}", tab.index() + 1, tab.title()))),
    )
    .select(app.tab.index())
    .highlight_style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    )
    .block(Block::default().borders(Borders::ALL).title("DataLink"));
    frame.render_widget(tabs, chunks[0]);

    let status = match app.active() {
        Some(profile) => Line::from(vec![
            Span::styled("● ", Style::default().fg(Color::Green)),
            Span::raw(format!("{} ({})", profile.name, profile.kind.label())),
        ]),
        None => Line::from(Span::styled(
            "○ not connected",
            Style::default().fg(Color::DarkGray),
        )),
    };
    let status = Paragraph::new(status)
        .alignment(Alignment::Right)
        .block(Block::default().borders(Borders::ALL).title("Connection"));
    frame.render_widget(status, chunks[1]);
}

fn render_connections(frame: &mut Frame<'_>, app: &TuiApp, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(area);

    let mut lines = Vec::new();
    if app.snapshot.connections.is_empty() {
        lines.push(Line::from("No saved connections. Press n to add one."));
    }
    for (index, profile) in app.snapshot.connections.iter().enumerate() {
        let marker = if index == app.connection_cursor { ">" } else { " " };
        let active = if profile.is_active { "●" } else { " " };
        let mut style = Style::default();
        if app.pending_delete == Some(profile.id) {
            style = style.fg(Color::Red);
        } else if index == app.connection_cursor {
            style = style.add_modifier(Modifier::BOLD);
        }
        lines.push(Line::from(vec![
            Span::styled(format!("{marker} {active} "), Style::default().fg(Color::Green)),
            Span::styled(
                format!("{} [{}] {}", profile.name, profile.kind.label(), profile.endpoint()),
                style,
            ),
        ]));
    }

    let list = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(busy_title("Saved connections", app, &[BusyKind::Connect, BusyKind::DeleteConnection])),
    );
    frame.render_widget(list, chunks[0]);

    match &app.form {
        Some(form) => render_form(frame, app, form, chunks[1]),
        None => render_connection_details(frame, app, chunks[1]),
    }
}

fn render_form(frame: &mut Frame<'_>, app: &TuiApp, form: &ConnectionForm, area: Rect) {
    let title = if form.editing.is_some() {
        "Edit connection"
    } else {
        "New connection"
    };

    let mut lines = vec![
        Line::from("Enter: save | Ctrl+T: test | Tab: next field | Esc: cancel"),
        Line::from(""),
    ];
    for field in FormField::ALL {
        let marker = if form.field == field { ">" } else { " " };
        let mut value = form.value(field);
        if field == FormField::Kind {
            value = format!("< {value} >");
        } else if field == FormField::Port && value.is_empty() {
            value = format!("{} (default)", form.kind.default_port());
        } else if field == FormField::Password && value.is_empty() && form.editing.is_some() {
            value = "(unchanged)".to_string();
        }
        let style = if form.field == field {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        lines.push(Line::from(vec![
            Span::raw(format!("{marker} {:<9}", field.label())),
            Span::styled(value, style),
        ]));
    }

    if let Some(error) = &form.error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            error.clone(),
            Style::default().fg(Color::Red),
        )));
    }
    push_test_report(&mut lines, app);

    let body = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(busy_title(title, app, &[BusyKind::SaveConnection, BusyKind::TestConnection])),
    );
    frame.render_widget(body, area);
}

fn render_connection_details(frame: &mut Frame<'_>, app: &TuiApp, area: Rect) {
    let mut lines = Vec::new();
    match app.selected_connection() {
        Some(profile) => {
            lines.push(Line::from(format!("Name:      {}", profile.name)));
            lines.push(Line::from(format!("Type:      {}", profile.kind.label())));
            if profile.kind.is_networked() {
                lines.push(Line::from(format!("Host:      {}:{}", profile.host, profile.port)));
                lines.push(Line::from(format!("Username:  {}", profile.username)));
            }
            lines.push(Line::from(format!("Database:  {}", profile.database)));
            lines.push(Line::from(format!(
                "Password:  {}",
                if profile.password_set { "stored" } else { "none" }
            )));
            lines.push(Line::from(format!(
                "Last used: {}",
                profile
                    .last_connected
                    .map_or_else(|| "never".to_string(), |at| at.format("%Y-%m-%d %H:%M").to_string())
            )));
        }
        None => lines.push(Line::from("Select a connection to see its settings.")),
    }
    lines.push(Line::from(""));
    lines.push(Line::from(
        "Enter/c: connect | d: disconnect | t: test | n: new | e: edit | x: delete",
    ));
    push_test_report(&mut lines, app);

    let body = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Details"));
    frame.render_widget(body, area);
}

fn push_test_report(lines: &mut Vec<Line<'static>>, app: &TuiApp) {
    let Some(report) = &app.last_test else {
        return;
    };
    let color = if report.success { Color::Green } else { Color::Red };
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        format!("Last test: {}", report.message),
        Style::default().fg(color),
    )));
    if let Some(version) = &report.server_version {
        lines.push(Line::from(format!("Server version: {version}")));
    }
    if let Some(latency) = report.latency {
        lines.push(Line::from(format!("Latency: {} ms", latency.as_millis())));
    }
}

fn render_query(frame: &mut Frame<'_>, app: &TuiApp, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
        .split(area);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(8), Constraint::Min(5)])
        .split(columns[0]);

    let editor_lines = app
        .query
        .editor
        .split('\n')
        .map(|line| Line::from(line.to_string()))
        .collect::<Vec<_>>();
    let editor = Paragraph::new(editor_lines)
        .wrap(Wrap { trim: false })
        .block(focused_block(
            &busy_title("SQL (Ctrl+R to run)", app, &[BusyKind::Execute]),
            app.query.focus == QueryFocus::Editor,
        ));
    frame.render_widget(editor, rows[0]);

    render_results(frame, app, rows[1]);
    render_history(frame, app, columns[1]);
}

fn render_results(frame: &mut Frame<'_>, app: &TuiApp, area: Rect) {
    let focused = app.query.focus == QueryFocus::Results;
    let Some(executed) = app.query.executed.as_deref() else {
        let message = app.query.last_error.as_deref().map_or_else(
            || Line::from("Run a query to see results."),
            |error| Line::from(Span::styled(error.to_string(), Style::default().fg(Color::Red))),
        );
        let empty = Paragraph::new(message).block(focused_block("Results", focused));
        frame.render_widget(empty, area);
        return;
    };

    let result = &executed.result;
    let header = Row::new(result.columns().iter().enumerate().map(|(index, name)| {
        let indicator = match (app.query.sort.column == Some(index), app.query.sort.direction) {
            (true, SortDirection::Ascending) => " ▲",
            (true, SortDirection::Descending) => " ▼",
            (false, _) => "",
        };
        let mut style = Style::default().add_modifier(Modifier::BOLD);
        if focused && index == app.query.column_cursor {
            style = style.fg(Color::Yellow);
        }
        Cell::from(format!("{name}{indicator}")).style(style)
    }));

    let visible = usize::from(area.height.saturating_sub(4)).max(1);
    let window_start = app.query.row_cursor.saturating_sub(visible.saturating_sub(1));
    let body = app
        .query
        .order
        .iter()
        .enumerate()
        .skip(window_start)
        .take(visible)
        .filter_map(|(position, index)| Some((position, result.row(*index)?)))
        .map(|(position, cells)| {
            let row = Row::new(cells.iter().map(|cell| {
                let text = cell.display_text();
                let style = if cell.is_null() {
                    Style::default().fg(Color::DarkGray)
                } else {
                    Style::default()
                };
                Cell::from(truncate(&text)).style(style)
            }));
            if focused && position == app.query.row_cursor {
                row.style(Style::default().add_modifier(Modifier::REVERSED))
            } else {
                row
            }
        })
        .collect::<Vec<_>>();

    let widths = result
        .columns()
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let widest = result
                .rows()
                .iter()
                .filter_map(|row| row.get(index))
                .map(|cell| cell.display_text().chars().count())
                .max()
                .unwrap_or(0)
                .max(name.chars().count() + 2)
                .min(MAX_COLUMN_WIDTH);
            Constraint::Length(u16::try_from(widest).unwrap_or(u16::MAX))
        })
        .collect::<Vec<_>>();

    let mut title = format!(
        "Results: {} rows in {} ms",
        executed.row_count,
        executed.execution_time_ms()
    );
    if let Some(error) = &app.query.last_error {
        title = format!("{title} | last run failed: {error}");
    }
    let table = Table::new(body, widths)
        .header(header)
        .column_spacing(2)
        .block(focused_block(
            &busy_title(&title, app, &[BusyKind::Export]),
            focused,
        ));
    frame.render_widget(table, area);
}

fn render_history(frame: &mut Frame<'_>, app: &TuiApp, area: Rect) {
    let focused = app.query.focus == QueryFocus::History;
    let rows = app.history_rows();
    let mut lines = Vec::new();
    if rows.is_empty() {
        lines.push(Line::from(if app.query.favorites_only {
            "No favorite queries yet."
        } else {
            "No queries run yet."
        }));
    }
    for (index, record) in rows.iter().enumerate() {
        let marker = if focused && index == app.query.history_cursor {
            ">"
        } else {
            " "
        };
        let star = if record.is_favorite { "★" } else { " " };
        let first_line = record.sql.lines().next().unwrap_or_default();
        lines.push(Line::from(vec![
            Span::raw(format!("{marker}{star} ")),
            Span::raw(truncate(first_line)),
        ]));
        lines.push(Line::from(Span::styled(
            format!(
                "    {} | {} rows | {} ms",
                record.executed_at.format("%m-%d %H:%M"),
                record.row_count,
                record.execution_time_ms
            ),
            Style::default().fg(Color::DarkGray),
        )));
    }

    let title = if app.query.favorites_only {
        "Favorites (v: recent)"
    } else {
        "Recent (v: favorites)"
    };
    let history = Paragraph::new(lines).block(focused_block(
        &busy_title(title, app, &[BusyKind::History]),
        focused,
    ));
    frame.render_widget(history, area);
}

fn render_schema(frame: &mut Frame<'_>, app: &TuiApp, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    let mut lines = Vec::new();
    let filter_style = if app.schema.editing_filter {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    lines.push(Line::from(Span::styled(
        format!("/ {}", app.schema.tree.filter()),
        filter_style,
    )));

    if app.active().is_none() {
        lines.push(Line::from("Connect to a database to browse its schema."));
    } else if let Some(error) = &app.schema.error {
        lines.push(Line::from(Span::styled(
            error.clone(),
            Style::default().fg(Color::Red),
        )));
        lines.push(Line::from("Press r to retry."));
    } else if app.schema.tree.catalog().is_none() {
        lines.push(Line::from("Loading schema..."));
    }

    let cursor = app.schema.tree.cursor();
    for (index, node) in app.schema.tree.visible_nodes().iter().enumerate() {
        lines.push(tree_line(node, index == cursor && !app.schema.editing_filter));
    }

    let title = app.schema.tree.catalog().map_or_else(
        || "Schema".to_string(),
        |catalog| format!("Schema: {}", catalog.database_name),
    );
    let tree = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(busy_title(&title, app, &[BusyKind::Schema])),
    );
    frame.render_widget(tree, chunks[0]);

    render_schema_details(frame, app, chunks[1]);
}

fn tree_line(node: &VisibleNode, under_cursor: bool) -> Line<'static> {
    let indent = "  ".repeat(node.depth);
    let toggle = if node.has_children {
        if node.expanded {
            "▾ "
        } else {
            "▸ "
        }
    } else {
        "  "
    };
    let icon = match node.kind {
        NodeKind::Group(_) => "",
        NodeKind::Table => "▦ ",
        NodeKind::View => "◫ ",
        NodeKind::Routine(RoutineKind::Procedure) => "ƒ ",
        NodeKind::Routine(RoutineKind::Function) => "λ ",
    };
    let badge = node
        .badge
        .map(|count| format!(" ({count})"))
        .unwrap_or_default();

    let mut style = Style::default();
    if node.selected {
        style = style.fg(Color::Cyan).add_modifier(Modifier::BOLD);
    }
    if under_cursor {
        style = style.add_modifier(Modifier::REVERSED);
    }

    Line::from(vec![
        Span::raw(format!("{indent}{toggle}")),
        Span::styled(format!("{icon}{}", node.label), style),
        Span::styled(badge, Style::default().fg(Color::DarkGray)),
    ])
}

fn render_schema_details(frame: &mut Frame<'_>, app: &TuiApp, area: Rect) {
    let mut lines = Vec::new();

    if let Some(summary) = app.schema.tree.summary() {
        lines.push(Line::from(format!(
            "{} tables | {} views | {} procedures",
            summary.tables, summary.views, summary.procedures
        )));
        lines.push(Line::from(""));
    }

    if let Some(search) = &app.schema.search {
        lines.push(Line::from(Span::styled(
            format!("Search \"{}\"", search.term),
            Style::default().add_modifier(Modifier::BOLD),
        )));
        if search.is_empty() {
            lines.push(Line::from("  no matches"));
        }
        for table in &search.tables {
            lines.push(Line::from(format!("  table  {}", table.name)));
        }
        for view in &search.views {
            lines.push(Line::from(format!("  view   {}", view.name)));
        }
        for found in &search.columns {
            lines.push(Line::from(format!(
                "  column {}.{} {}",
                found.table_name, found.column.name, found.column.data_type
            )));
        }
        lines.push(Line::from(""));
    }

    match app.schema.tree.selected_table() {
        Some(table) => {
            match &app.schema.details {
                Some(details) => push_table_details(&mut lines, details),
                None => lines.push(Line::from(format!("{table}: loading details..."))),
            }
            if let Some(queries) = &app.schema.queries {
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled(
                    "Generated SQL (s: select, i: insert)",
                    Style::default().add_modifier(Modifier::BOLD),
                )));
                for line in queries.select.lines().chain(queries.insert.lines()) {
                    lines.push(Line::from(Span::styled(
                        line.to_string(),
                        Style::default().fg(Color::Cyan),
                    )));
                }
            }
        }
        None => lines.push(Line::from(
            "Enter: expand or select | /: filter | r: refresh | s/i: send SQL to editor",
        )),
    }

    let details = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(busy_title(
            "Details",
            app,
            &[BusyKind::TableDetails, BusyKind::Search],
        )));
    frame.render_widget(details, area);
}

fn push_table_details(lines: &mut Vec<Line<'static>>, details: &TableDetails) {
    let table = &details.table;
    let stats = &details.statistics;
    lines.push(Line::from(Span::styled(
        table.name.clone(),
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(format!(
        "{} rows | {} | updated {}",
        stats.row_count,
        stats.table_size,
        stats.last_updated.format("%Y-%m-%d")
    )));
    lines.push(Line::from(""));

    for column in &table.columns {
        let mut flags = Vec::new();
        if !column.key.label().is_empty() {
            flags.push(column.key.label().to_string());
        }
        if !column.nullable {
            flags.push("NOT NULL".to_string());
        }
        if let Some(default) = &column.default_value {
            flags.push(format!("DEFAULT {default}"));
        }
        if let Some(extra) = &column.extra {
            flags.push(extra.clone());
        }
        lines.push(Line::from(format!(
            "  {:<16} {:<24} {}",
            column.name,
            column.data_type,
            flags.join(" ")
        )));
    }

    if !table.indexes.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from("Indexes"));
        for index in &table.indexes {
            lines.push(Line::from(format!(
                "  {}{} ({}) {}",
                index.name,
                if index.unique { " unique" } else { "" },
                index.columns.join(", "),
                index.method.as_deref().unwrap_or_default()
            )));
        }
    }
}

fn render_footer(frame: &mut Frame<'_>, app: &TuiApp, area: Rect) {
    let hints = match app.tab {
        Tab::Connections if app.form.is_some() => {
            "Tab/↑↓: field | ←→: type | Enter: save | Ctrl+T: test | Esc: cancel"
        }
        Tab::Connections => "↑↓: select | Enter: connect | n/e/x: new/edit/delete | ?: help | q: quit",
        Tab::QueryEditor => match app.query.focus {
            QueryFocus::Editor => "Ctrl+R/F5: run | Tab: results | Esc: leave editor | Ctrl+Q: quit",
            QueryFocus::Results => "←→: column | s: sort | c: clear sort | e/j: export CSV/JSON | Tab: history",
            QueryFocus::History => "Enter: load | f: favorite | x: delete | v: favorites | Tab: editor",
        },
        Tab::SchemaExplorer if app.schema.editing_filter => "type to filter | Enter: search | Esc: clear",
        Tab::SchemaExplorer => "↑↓: move | Enter: open/select | /: filter | r: refresh | s/i: to editor",
    };

    let mut status = vec![Line::from(hints)];
    match &app.notification {
        Some(notification) => {
            let color = match notification.level {
                NotificationLevel::Info => Color::White,
                NotificationLevel::Success => Color::Green,
                NotificationLevel::Error => Color::Red,
            };
            status.push(Line::from(Span::styled(
                notification.text.clone(),
                Style::default().fg(color),
            )));
        }
        None => {
            let busy = app
                .busy
                .iter()
                .map(|kind| kind.label())
                .collect::<Vec<_>>()
                .join(", ");
            status.push(Line::from(Span::styled(
                if busy.is_empty() {
                    "Ready".to_string()
                } else {
                    format!("{busy}...")
                },
                Style::default().fg(Color::DarkGray),
            )));
        }
    }

    let footer = Paragraph::new(status).block(Block::default().borders(Borders::ALL).title("Status"));
    frame.render_widget(footer, area);
}

fn render_help_popup(frame: &mut Frame<'_>) {
    let area = centered_rect(70, 70, frame.area());
    frame.render_widget(Clear, area);
    let help = Paragraph::new(vec![
        Line::from("Global keymap"),
        Line::from("F1 F2 F3 (or 1 2 3): switch tab"),
        Line::from("Ctrl+Q / q: quit"),
        Line::from("?: toggle help | Esc: close"),
        Line::from(""),
        Line::from("Connections: n new, e edit, x delete, t test, Enter connect, d disconnect"),
        Line::from("Query editor: Ctrl+R run, Tab cycles editor / results / history"),
        Line::from("Results: ←→ column, s sort, c clear sort, e CSV, j JSON"),
        Line::from("History: Enter load, f favorite, x delete, v favorites only"),
        Line::from("Schema: Enter expand/select, / filter, r refresh, s select, i insert"),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    frame.render_widget(help, area);
}

fn focused_block(title: &str, focused: bool) -> Block<'static> {
    let style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(style)
        .title(title.to_string())
}

fn busy_title(title: &str, app: &TuiApp, kinds: &[BusyKind]) -> String {
    match kinds.iter().find(|kind| app.is_busy(**kind)) {
        Some(kind) => format!("{title} [{}...]", kind.label()),
        None => title.to_string(),
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_COLUMN_WIDTH {
        return text.to_string();
    }
    let mut shortened = text.chars().take(MAX_COLUMN_WIDTH - 1).collect::<String>();
    shortened.push('…');
    shortened
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
