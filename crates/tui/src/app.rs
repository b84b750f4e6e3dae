use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use datalink_adapters::export::ExportFormat;
use datalink_core::connection_manager::ConnectionTestReport;
use datalink_core::profiles::{ConnectionFields, ConnectionProfile, DatabaseKind};
use datalink_core::query_history::QueryRecord;
use datalink_core::query_runner::ExecutedQuery;
use datalink_core::result_set::TabularResult;
use datalink_core::schema_cache::{SchemaSearchResults, TableDetails};
use datalink_core::schema_tree::{NodeKind, SchemaTreeState, TreeActivation};
use datalink_core::sorting::{sorted_order, SortState};
use datalink_core::sql_generator::{preview_select_sql, table_queries, TableQueries};
use tracing::warn;

use crate::worker::{
    ActionOutput, BusyKind, Command, ExportRequest, Outcome, SessionCommand, SessionSnapshot,
};

const NOTIFICATION_TTL: Duration = Duration::from_secs(4);
const MIN_SEARCH_LENGTH: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Connections,
    QueryEditor,
    SchemaExplorer,
}

impl Tab {
    pub const ALL: [Self; 3] = [Self::Connections, Self::QueryEditor, Self::SchemaExplorer];

    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Connections => "Connections",
            Self::QueryEditor => "Query Editor",
            Self::SchemaExplorer => "Schema Explorer",
        }
    }

    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::Connections => 0,
            Self::QueryEditor => 1,
            Self::SchemaExplorer => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryFocus {
    Editor,
    Results,
    History,
}

impl QueryFocus {
    fn next(self) -> Self {
        match self {
            Self::Editor => Self::Results,
            Self::Results => Self::History,
            Self::History => Self::Editor,
        }
    }

    fn previous(self) -> Self {
        match self {
            Self::Editor => Self::History,
            Self::Results => Self::Editor,
            Self::History => Self::Results,
        }
    }
}

/// Which keys are read as text rather than shortcuts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Navigate,
    Form,
    Editor,
    Filter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Name,
    Kind,
    Host,
    Port,
    Database,
    Username,
    Password,
}

impl FormField {
    pub const ALL: [Self; 7] = [
        Self::Name,
        Self::Kind,
        Self::Host,
        Self::Port,
        Self::Database,
        Self::Username,
        Self::Password,
    ];

    fn next(self) -> Self {
        match self {
            Self::Name => Self::Kind,
            Self::Kind => Self::Host,
            Self::Host => Self::Port,
            Self::Port => Self::Database,
            Self::Database => Self::Username,
            Self::Username => Self::Password,
            Self::Password => Self::Name,
        }
    }

    fn previous(self) -> Self {
        match self {
            Self::Name => Self::Password,
            Self::Kind => Self::Name,
            Self::Host => Self::Kind,
            Self::Port => Self::Host,
            Self::Database => Self::Port,
            Self::Username => Self::Database,
            Self::Password => Self::Username,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::Kind => "Type",
            Self::Host => "Host",
            Self::Port => "Port",
            Self::Database => "Database",
            Self::Username => "Username",
            Self::Password => "Password",
        }
    }
}

/// Editable copy of a connection. The port stays text until submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionForm {
    pub editing: Option<u64>,
    pub name: String,
    pub kind: DatabaseKind,
    pub host: String,
    pub port: String,
    pub database: String,
    pub username: String,
    pub password: String,
    pub field: FormField,
    pub error: Option<String>,
}

impl Default for ConnectionForm {
    fn default() -> Self {
        Self {
            editing: None,
            name: String::new(),
            kind: DatabaseKind::Mysql,
            host: "localhost".to_string(),
            port: String::new(),
            database: String::new(),
            username: String::new(),
            password: String::new(),
            field: FormField::Name,
            error: None,
        }
    }
}

impl ConnectionForm {
    /// The stored password is never read back; leaving the field blank keeps it.
    #[must_use]
    pub fn from_profile(profile: &ConnectionProfile) -> Self {
        let fields = profile.to_fields();
        Self {
            editing: Some(profile.id),
            name: fields.name,
            kind: fields.kind,
            host: fields.host,
            port: fields.port.map(|port| port.to_string()).unwrap_or_default(),
            database: fields.database,
            username: fields.username,
            password: String::new(),
            field: FormField::Name,
            error: None,
        }
    }

    #[must_use]
    pub fn value(&self, field: FormField) -> String {
        match field {
            FormField::Name => self.name.clone(),
            FormField::Kind => self.kind.label().to_string(),
            FormField::Host => self.host.clone(),
            FormField::Port => self.port.clone(),
            FormField::Database => self.database.clone(),
            FormField::Username => self.username.clone(),
            FormField::Password => "*".repeat(self.password.chars().count()),
        }
    }

    fn text_mut(&mut self) -> Option<&mut String> {
        match self.field {
            FormField::Name => Some(&mut self.name),
            FormField::Kind => None,
            FormField::Host => Some(&mut self.host),
            FormField::Port => Some(&mut self.port),
            FormField::Database => Some(&mut self.database),
            FormField::Username => Some(&mut self.username),
            FormField::Password => Some(&mut self.password),
        }
    }

    fn input(&mut self, ch: char) {
        if self.field == FormField::Port && !ch.is_ascii_digit() {
            return;
        }
        if let Some(text) = self.text_mut() {
            text.push(ch);
        }
    }

    fn backspace(&mut self) {
        if let Some(text) = self.text_mut() {
            text.pop();
        }
    }

    fn cycle_kind(&mut self, forward: bool) {
        self.kind = if forward {
            self.kind.next()
        } else {
            self.kind.previous()
        };
    }

    /// Parses and validates the form into the fields the session accepts.
    pub fn to_fields(&self) -> Result<ConnectionFields, String> {
        let port = if self.port.trim().is_empty() {
            None
        } else {
            match self.port.trim().parse::<u16>() {
                Ok(port) if port > 0 => Some(port),
                _ => return Err("port must be between 1 and 65535".to_string()),
            }
        };

        let fields = ConnectionFields {
            name: self.name.clone(),
            kind: self.kind,
            host: self.host.clone(),
            port,
            database: self.database.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
        };
        fields.validate().map_err(|err| err.to_string())?;
        Ok(fields)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub text: String,
    pub level: NotificationLevel,
    pub expires_at: Instant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryPane {
    pub editor: String,
    pub focus: QueryFocus,
    pub executed: Option<Arc<ExecutedQuery>>,
    pub sort: SortState,
    pub order: Vec<usize>,
    pub row_cursor: usize,
    pub column_cursor: usize,
    pub history_cursor: usize,
    pub favorites_only: bool,
    pub last_error: Option<String>,
}

impl Default for QueryPane {
    fn default() -> Self {
        Self {
            editor: String::new(),
            focus: QueryFocus::Editor,
            executed: None,
            sort: SortState::default(),
            order: Vec::new(),
            row_cursor: 0,
            column_cursor: 0,
            history_cursor: 0,
            favorites_only: false,
            last_error: None,
        }
    }
}

impl QueryPane {
    #[must_use]
    pub fn result(&self) -> Option<&TabularResult> {
        self.executed.as_deref().map(|executed| &executed.result)
    }

    fn resort(&mut self) {
        self.order = self
            .result()
            .map(|result| sorted_order(result, self.sort))
            .unwrap_or_default();
    }
}

#[derive(Debug, Clone, Default)]
pub struct SchemaPane {
    pub tree: SchemaTreeState,
    pub editing_filter: bool,
    pub details: Option<TableDetails>,
    pub queries: Option<TableQueries>,
    pub search: Option<SchemaSearchResults>,
    pub error: Option<String>,
}

impl SchemaPane {
    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Startup values the screens need besides the session itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TuiOptions {
    pub preview_limit: usize,
    pub export_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Msg {
    Quit,
    ToggleHelp,
    SelectTab(Tab),
    NextFocus,
    PreviousFocus,
    Up,
    Down,
    Left,
    Right,
    Activate,
    Cancel,
    Delete,
    Input(char),
    Backspace,
    Shortcut(char),
    RunQuery,
    TestConnection,
    Tick,
}

#[derive(Debug)]
pub struct TuiApp {
    pub tab: Tab,
    pub should_quit: bool,
    pub show_help: bool,
    pub snapshot: SessionSnapshot,
    pub connection_cursor: usize,
    pub form: Option<ConnectionForm>,
    pub pending_delete: Option<u64>,
    pub last_test: Option<ConnectionTestReport>,
    pub query: QueryPane,
    pub schema: SchemaPane,
    pub busy: BTreeSet<BusyKind>,
    pub notification: Option<Notification>,
    preview_limit: usize,
    export_dir: PathBuf,
}

impl TuiApp {
    #[must_use]
    pub fn new(options: TuiOptions, snapshot: SessionSnapshot) -> Self {
        Self {
            tab: Tab::Connections,
            should_quit: false,
            show_help: false,
            snapshot,
            connection_cursor: 0,
            form: None,
            pending_delete: None,
            last_test: None,
            query: QueryPane::default(),
            schema: SchemaPane::default(),
            busy: BTreeSet::new(),
            notification: None,
            preview_limit: options.preview_limit,
            export_dir: options.export_dir,
        }
    }

    #[must_use]
    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    #[must_use]
    pub fn active(&self) -> Option<&ConnectionProfile> {
        self.snapshot.active.as_ref()
    }

    #[must_use]
    pub fn selected_connection(&self) -> Option<&ConnectionProfile> {
        self.snapshot.connections.get(self.connection_cursor)
    }

    #[must_use]
    pub fn is_busy(&self, kind: BusyKind) -> bool {
        self.busy.contains(&kind)
    }

    /// History rows as shown: favorites only, or the recent list.
    #[must_use]
    pub fn history_rows(&self) -> &[QueryRecord] {
        if self.query.favorites_only {
            &self.snapshot.favorites
        } else {
            &self.snapshot.recent
        }
    }

    #[must_use]
    pub fn input_mode(&self) -> InputMode {
        match self.tab {
            Tab::Connections if self.form.is_some() => InputMode::Form,
            Tab::QueryEditor if self.query.focus == QueryFocus::Editor => InputMode::Editor,
            Tab::SchemaExplorer if self.schema.editing_filter => InputMode::Filter,
            _ => InputMode::Navigate,
        }
    }

    pub fn handle(&mut self, msg: Msg) -> Vec<Command> {
        match msg {
            Msg::Quit => {
                self.should_quit = true;
                Vec::new()
            }
            Msg::ToggleHelp => {
                self.show_help = !self.show_help;
                Vec::new()
            }
            Msg::Tick => {
                self.expire_notification(Instant::now());
                Vec::new()
            }
            Msg::SelectTab(tab) => self.select_tab(tab),
            _ if self.show_help => {
                if matches!(msg, Msg::Cancel) {
                    self.show_help = false;
                }
                Vec::new()
            }
            _ => match self.tab {
                Tab::Connections => self.handle_connections(msg),
                Tab::QueryEditor => self.handle_query(msg),
                Tab::SchemaExplorer => self.handle_schema(msg),
            },
        }
    }

    /// Applies a finished background task and returns any follow-up work.
    pub fn apply(&mut self, outcome: Outcome) -> Vec<Command> {
        self.busy.remove(&outcome.kind);
        if let Some(snapshot) = outcome.snapshot {
            self.apply_snapshot(snapshot);
        }

        match outcome.result {
            Ok(output) => self.apply_output(output),
            Err(message) => {
                self.apply_failure(outcome.kind, message);
                Vec::new()
            }
        }
    }

    fn apply_snapshot(&mut self, snapshot: SessionSnapshot) {
        self.snapshot = snapshot;
        self.connection_cursor = clamp(self.connection_cursor, self.snapshot.connections.len());
        self.query.history_cursor = clamp(self.query.history_cursor, self.history_rows().len());

        let active_id = self.snapshot.active.as_ref().map(|profile| profile.id);
        if self.schema.tree.connection_id().is_some() && self.schema.tree.connection_id() != active_id {
            self.schema.reset();
        }
    }

    fn apply_output(&mut self, output: ActionOutput) -> Vec<Command> {
        match output {
            ActionOutput::ConnectionSaved(profile) => {
                self.form = None;
                if let Some(index) = self
                    .snapshot
                    .connections
                    .iter()
                    .position(|candidate| candidate.id == profile.id)
                {
                    self.connection_cursor = index;
                }
                self.notify(
                    format!("Saved connection \"{}\"", profile.name),
                    NotificationLevel::Success,
                );
            }
            ActionOutput::ConnectionDeleted(profile) => {
                self.pending_delete = None;
                self.notify(
                    format!("Deleted connection \"{}\"", profile.name),
                    NotificationLevel::Success,
                );
            }
            ActionOutput::ConnectionTested(report) => {
                let level = if report.success {
                    NotificationLevel::Success
                } else {
                    NotificationLevel::Error
                };
                self.notify(test_summary(&report), level);
                self.last_test = Some(report);
            }
            ActionOutput::Connected(profile) => {
                self.notify(
                    format!("Connected to \"{}\"", profile.name),
                    NotificationLevel::Success,
                );
                if self.tab == Tab::SchemaExplorer {
                    return self.load_schema(false);
                }
            }
            ActionOutput::Disconnected => {
                self.schema.reset();
                self.notify("Disconnected", NotificationLevel::Info);
            }
            ActionOutput::Executed(executed) => {
                self.notify(
                    format!(
                        "{} rows in {} ms",
                        executed.row_count,
                        executed.execution_time_ms()
                    ),
                    NotificationLevel::Success,
                );
                self.query.executed = Some(Arc::new(executed));
                self.query.last_error = None;
                self.query.sort.clear();
                self.query.row_cursor = 0;
                self.query.column_cursor = 0;
                self.query.resort();
            }
            ActionOutput::HistoryUpdated(_) => {}
            ActionOutput::SchemaLoaded {
                connection_id,
                catalog,
                refreshed,
            } => {
                if self.active().map(|profile| profile.id) != Some(connection_id) {
                    return Vec::new();
                }
                self.schema.error = None;
                self.schema.tree.replace_catalog(connection_id, catalog);
                match self.schema.tree.selected_table().map(str::to_string) {
                    Some(table) => self.schema.queries = self.generate_queries(&table),
                    None => {
                        self.schema.details = None;
                        self.schema.queries = None;
                    }
                }
                if refreshed {
                    self.notify("Schema refreshed", NotificationLevel::Success);
                }
            }
            ActionOutput::TableDetailsLoaded {
                connection_id,
                details,
            } => {
                if self.schema.tree.connection_id() == Some(connection_id)
                    && self.schema.tree.is_selected(&details.table.name)
                {
                    self.schema.details = Some(details);
                }
            }
            ActionOutput::SearchCompleted {
                connection_id,
                results,
            } => {
                if self.schema.tree.connection_id() == Some(connection_id) {
                    self.schema.search = Some(results);
                }
            }
            ActionOutput::Exported(summary) => self.notify(
                format!(
                    "Exported {} rows as {} to {}",
                    summary.rows,
                    summary.format.label(),
                    summary.path.display()
                ),
                NotificationLevel::Success,
            ),
        }
        Vec::new()
    }

    fn apply_failure(&mut self, kind: BusyKind, message: String) {
        warn!(?kind, %message, "background task failed");
        match kind {
            BusyKind::SaveConnection => {
                if let Some(form) = &mut self.form {
                    form.error = Some(message.clone());
                }
            }
            BusyKind::TestConnection => {
                self.last_test = Some(ConnectionTestReport::failed(message.clone()));
            }
            BusyKind::Execute => {
                self.query.last_error = Some(message.clone());
                self.notify(
                    format!("{message} (Ctrl+R to retry)"),
                    NotificationLevel::Error,
                );
                return;
            }
            BusyKind::Schema => {
                self.schema.error = Some(message.clone());
                self.notify(format!("{message} (r to retry)"), NotificationLevel::Error);
                return;
            }
            _ => {}
        }
        self.notify(message, NotificationLevel::Error);
    }

    fn select_tab(&mut self, tab: Tab) -> Vec<Command> {
        self.tab = tab;
        self.pending_delete = None;
        if tab == Tab::SchemaExplorer {
            let loaded = self.schema.tree.connection_id();
            let active = self.active().map(|profile| profile.id);
            if active.is_some() && loaded != active {
                return self.load_schema(false);
            }
        }
        Vec::new()
    }

    fn handle_connections(&mut self, msg: Msg) -> Vec<Command> {
        if self.form.is_some() {
            return self.handle_form(msg);
        }

        match msg {
            Msg::Up => {
                self.pending_delete = None;
                self.connection_cursor = self.connection_cursor.saturating_sub(1);
            }
            Msg::Down => {
                self.pending_delete = None;
                self.connection_cursor =
                    clamp(self.connection_cursor + 1, self.snapshot.connections.len());
            }
            Msg::Activate | Msg::Shortcut('c') => return self.connect_selected(),
            Msg::Shortcut('d') => {
                if self.active().is_none() {
                    self.notify("No active connection", NotificationLevel::Info);
                    return Vec::new();
                }
                return self.issue(SessionCommand::Disconnect);
            }
            Msg::Shortcut('n') => self.form = Some(ConnectionForm::default()),
            Msg::Shortcut('e') => {
                if let Some(profile) = self.selected_connection() {
                    self.form = Some(ConnectionForm::from_profile(profile));
                }
            }
            Msg::Shortcut('t') | Msg::TestConnection => {
                if let Some(profile) = self.selected_connection() {
                    let fields = profile.to_fields();
                    return self.issue(SessionCommand::TestConnection(fields));
                }
            }
            Msg::Delete | Msg::Shortcut('x') => {
                if let Some((id, name)) = self
                    .selected_connection()
                    .map(|profile| (profile.id, profile.name.clone()))
                {
                    self.pending_delete = Some(id);
                    self.notify(
                        format!("Delete \"{name}\"? Press y to confirm"),
                        NotificationLevel::Info,
                    );
                }
            }
            Msg::Shortcut('y') => {
                if let Some(id) = self.pending_delete.take() {
                    return self.issue(SessionCommand::DeleteConnection(id));
                }
            }
            Msg::Cancel => self.pending_delete = None,
            _ => {}
        }
        Vec::new()
    }

    fn connect_selected(&mut self) -> Vec<Command> {
        let Some(profile) = self.selected_connection() else {
            self.notify("Create a connection first (n)", NotificationLevel::Info);
            return Vec::new();
        };
        if self.active().map(|active| active.id) == Some(profile.id) {
            let text = format!("Already connected to \"{}\"", profile.name);
            self.notify(text, NotificationLevel::Info);
            return Vec::new();
        }
        let id = profile.id;
        self.issue(SessionCommand::Connect(id))
    }

    fn handle_form(&mut self, msg: Msg) -> Vec<Command> {
        let Some(form) = &mut self.form else {
            return Vec::new();
        };

        match msg {
            Msg::Cancel => self.form = None,
            Msg::NextFocus | Msg::Down => form.field = form.field.next(),
            Msg::PreviousFocus | Msg::Up => form.field = form.field.previous(),
            Msg::Left if form.field == FormField::Kind => form.cycle_kind(false),
            Msg::Right if form.field == FormField::Kind => form.cycle_kind(true),
            Msg::Input(ch) => form.input(ch),
            Msg::Backspace => form.backspace(),
            Msg::Activate => match form.to_fields() {
                Ok(fields) => {
                    form.error = None;
                    let id = form.editing;
                    return self.issue(SessionCommand::SaveConnection { id, fields });
                }
                Err(message) => form.error = Some(message),
            },
            Msg::TestConnection => match form.to_fields() {
                Ok(fields) => {
                    form.error = None;
                    return self.issue(SessionCommand::TestConnection(fields));
                }
                Err(message) => form.error = Some(message),
            },
            _ => {}
        }
        Vec::new()
    }

    fn handle_query(&mut self, msg: Msg) -> Vec<Command> {
        match msg {
            Msg::RunQuery => return self.run_query(),
            Msg::NextFocus => {
                self.query.focus = self.query.focus.next();
                return Vec::new();
            }
            Msg::PreviousFocus => {
                self.query.focus = self.query.focus.previous();
                return Vec::new();
            }
            _ => {}
        }

        match self.query.focus {
            QueryFocus::Editor => {
                match msg {
                    Msg::Input(ch) => self.query.editor.push(ch),
                    Msg::Backspace => {
                        self.query.editor.pop();
                    }
                    Msg::Cancel => self.query.focus = QueryFocus::Results,
                    _ => {}
                }
                Vec::new()
            }
            QueryFocus::Results => self.handle_results(msg),
            QueryFocus::History => self.handle_history(msg),
        }
    }

    fn run_query(&mut self) -> Vec<Command> {
        let Some(connection_id) = self.active().map(|profile| profile.id) else {
            self.notify("Connect to a database first", NotificationLevel::Error);
            return Vec::new();
        };
        let sql = self.query.editor.trim();
        if sql.is_empty() {
            self.notify("Enter a SQL statement to run", NotificationLevel::Info);
            return Vec::new();
        }
        let sql = sql.to_string();
        self.issue(SessionCommand::Execute { connection_id, sql })
    }

    fn handle_results(&mut self, msg: Msg) -> Vec<Command> {
        let (rows, columns) = self
            .query
            .result()
            .map_or((0, 0), |result| (result.row_count(), result.column_count()));

        match msg {
            Msg::Up => self.query.row_cursor = self.query.row_cursor.saturating_sub(1),
            Msg::Down => self.query.row_cursor = clamp(self.query.row_cursor + 1, rows),
            Msg::Left => self.query.column_cursor = self.query.column_cursor.saturating_sub(1),
            Msg::Right => self.query.column_cursor = clamp(self.query.column_cursor + 1, columns),
            Msg::Activate | Msg::Shortcut('s') if columns > 0 => {
                self.query.sort.toggle(self.query.column_cursor);
                self.query.resort();
            }
            Msg::Shortcut('c') => {
                self.query.sort.clear();
                self.query.resort();
            }
            Msg::Shortcut('e') => return self.export(ExportFormat::Csv),
            Msg::Shortcut('j') => return self.export(ExportFormat::Json),
            Msg::Cancel | Msg::Shortcut('i') => self.query.focus = QueryFocus::Editor,
            _ => {}
        }
        Vec::new()
    }

    fn export(&mut self, format: ExportFormat) -> Vec<Command> {
        let Some(executed) = &self.query.executed else {
            self.notify("Run a query before exporting", NotificationLevel::Info);
            return Vec::new();
        };
        if executed.result.is_empty() {
            self.notify("No rows to export", NotificationLevel::Info);
            return Vec::new();
        }
        let request = ExportRequest {
            format,
            result: Arc::new(executed.result.clone()),
            order: self.query.order.clone(),
        };
        self.issue(request)
    }

    fn handle_history(&mut self, msg: Msg) -> Vec<Command> {
        let len = self.history_rows().len();
        let selected = self
            .history_rows()
            .get(self.query.history_cursor)
            .map(|record| (record.id, record.sql.clone()));

        match msg {
            Msg::Up => self.query.history_cursor = self.query.history_cursor.saturating_sub(1),
            Msg::Down => self.query.history_cursor = clamp(self.query.history_cursor + 1, len),
            Msg::Activate => {
                if let Some((_, sql)) = selected {
                    self.query.editor = sql;
                    self.query.focus = QueryFocus::Editor;
                }
            }
            Msg::Shortcut('f') => {
                if let Some((id, _)) = selected {
                    return self.issue(SessionCommand::ToggleFavorite(id));
                }
            }
            Msg::Delete | Msg::Shortcut('x') => {
                if let Some((id, _)) = selected {
                    return self.issue(SessionCommand::DeleteQuery(id));
                }
            }
            Msg::Shortcut('v') => {
                self.query.favorites_only = !self.query.favorites_only;
                self.query.history_cursor = 0;
            }
            Msg::Cancel => self.query.focus = QueryFocus::Editor,
            _ => {}
        }
        Vec::new()
    }

    fn handle_schema(&mut self, msg: Msg) -> Vec<Command> {
        if self.schema.editing_filter {
            return self.handle_filter(msg);
        }

        match msg {
            Msg::Up => self.schema.tree.move_cursor_up(),
            Msg::Down => self.schema.tree.move_cursor_down(),
            Msg::Activate | Msg::Right | Msg::Left => return self.activate_tree_row(msg),
            Msg::Shortcut('/') => self.schema.editing_filter = true,
            Msg::Shortcut('r') => return self.load_schema(self.schema.error.is_none()),
            Msg::Shortcut('s') => self.send_to_editor(false),
            Msg::Shortcut('i') => self.send_to_editor(true),
            Msg::Cancel => {
                self.schema.tree.clear_selection();
                self.schema.details = None;
                self.schema.queries = None;
            }
            _ => {}
        }
        Vec::new()
    }

    fn activate_tree_row(&mut self, msg: Msg) -> Vec<Command> {
        if let Some(row) = self.schema.tree.row_at_cursor() {
            let wants_open = match msg {
                Msg::Right => Some(true),
                Msg::Left => Some(false),
                _ => None,
            };
            if row.has_children && wants_open.is_some_and(|open| open == row.expanded) {
                return Vec::new();
            }
            if !row.has_children && wants_open.is_some() {
                return Vec::new();
            }
        }

        match self.schema.tree.activate_cursor() {
            TreeActivation::TableSelected(table) => {
                self.schema.queries = self.generate_queries(&table);
                self.schema.details = None;
                match self.schema.tree.connection_id() {
                    Some(connection_id) => self.issue(SessionCommand::LoadTableDetails {
                        connection_id,
                        table,
                    }),
                    None => Vec::new(),
                }
            }
            TreeActivation::Toggled { .. } | TreeActivation::Nothing => Vec::new(),
        }
    }

    fn handle_filter(&mut self, msg: Msg) -> Vec<Command> {
        match msg {
            Msg::Input(ch) => {
                let mut filter = self.schema.tree.filter().to_string();
                filter.push(ch);
                self.schema.tree.set_filter(filter);
            }
            Msg::Backspace => {
                let mut filter = self.schema.tree.filter().to_string();
                filter.pop();
                self.schema.tree.set_filter(filter);
            }
            Msg::Cancel => {
                self.schema.editing_filter = false;
                self.schema.tree.set_filter(String::new());
                self.schema.search = None;
            }
            Msg::Activate => {
                self.schema.editing_filter = false;
                let term = self.schema.tree.filter().trim().to_string();
                if term.chars().count() < MIN_SEARCH_LENGTH {
                    self.schema.search = None;
                    return Vec::new();
                }
                if let Some(connection_id) = self.schema.tree.connection_id() {
                    return self.issue(SessionCommand::SearchSchema {
                        connection_id,
                        term,
                    });
                }
            }
            _ => {}
        }
        Vec::new()
    }

    fn load_schema(&mut self, refresh: bool) -> Vec<Command> {
        let Some(connection_id) = self.active().map(|profile| profile.id) else {
            self.notify("Connect to a database to browse its schema", NotificationLevel::Info);
            return Vec::new();
        };
        self.schema.error = None;
        self.issue(SessionCommand::LoadSchema {
            connection_id,
            refresh,
        })
    }

    fn generate_queries(&mut self, table: &str) -> Option<TableQueries> {
        let schema = self.schema.tree.catalog()?.table(table)?;
        match table_queries(schema, self.preview_limit) {
            Ok(queries) => Some(queries),
            Err(err) => {
                self.notify(err.to_string(), NotificationLevel::Error);
                None
            }
        }
    }

    /// Copies generated SQL for the row under the cursor into the editor.
    fn send_to_editor(&mut self, insert: bool) {
        let Some(row) = self.schema.tree.row_at_cursor() else {
            return;
        };

        let sql = match row.kind {
            NodeKind::View if !insert => Some(preview_select_sql(&row.label, self.preview_limit)),
            NodeKind::Table => self.generate_queries(&row.label).map(|queries| {
                if insert {
                    queries.insert
                } else {
                    queries.select
                }
            }),
            _ => None,
        };

        match sql {
            Some(sql) => {
                self.query.editor = sql;
                self.query.focus = QueryFocus::Editor;
                self.tab = Tab::QueryEditor;
            }
            None => self.notify("Nothing to generate for this item", NotificationLevel::Info),
        }
    }

    /// Marks the command's kind busy and hands it out, unless one is in flight.
    fn issue(&mut self, command: impl Into<Command>) -> Vec<Command> {
        let command = command.into();
        let kind = command.kind();
        if !self.busy.insert(kind) {
            self.notify(format!("{} already in progress", kind.label()), NotificationLevel::Info);
            return Vec::new();
        }
        vec![command]
    }

    pub fn notify(&mut self, text: impl Into<String>, level: NotificationLevel) {
        self.notification = Some(Notification {
            text: text.into(),
            level,
            expires_at: Instant::now() + NOTIFICATION_TTL,
        });
    }

    fn expire_notification(&mut self, now: Instant) {
        if self
            .notification
            .as_ref()
            .is_some_and(|notification| notification.expires_at <= now)
        {
            self.notification = None;
        }
    }
}

fn clamp(index: usize, len: usize) -> usize {
    index.min(len.saturating_sub(1))
}

fn test_summary(report: &ConnectionTestReport) -> String {
    let mut text = report.message.clone();
    if let Some(version) = &report.server_version {
        text.push_str(&format!(" (server {version}"));
        if let Some(latency) = report.latency {
            text.push_str(&format!(", {} ms", latency.as_millis()));
        }
        text.push(')');
    }
    text
}

/// Translates a key press into a message for the current input mode.
#[must_use]
pub fn map_key_event(mode: InputMode, key: KeyEvent) -> Option<Msg> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('q') if ctrl => return Some(Msg::Quit),
        KeyCode::Char('c') if ctrl => return Some(Msg::Quit),
        KeyCode::Char('r') if ctrl => return Some(Msg::RunQuery),
        KeyCode::Char('t') if ctrl => return Some(Msg::TestConnection),
        KeyCode::F(1) => return Some(Msg::SelectTab(Tab::Connections)),
        KeyCode::F(2) => return Some(Msg::SelectTab(Tab::QueryEditor)),
        KeyCode::F(3) => return Some(Msg::SelectTab(Tab::SchemaExplorer)),
        KeyCode::F(5) => return Some(Msg::RunQuery),
        KeyCode::Esc => return Some(Msg::Cancel),
        KeyCode::Tab => return Some(Msg::NextFocus),
        KeyCode::BackTab => return Some(Msg::PreviousFocus),
        KeyCode::Up => return Some(Msg::Up),
        KeyCode::Down => return Some(Msg::Down),
        KeyCode::Backspace => return Some(Msg::Backspace),
        _ if ctrl => return None,
        _ => {}
    }

    match mode {
        InputMode::Navigate => match key.code {
            KeyCode::Char('q') => Some(Msg::Quit),
            KeyCode::Char('?') => Some(Msg::ToggleHelp),
            KeyCode::Char('1') => Some(Msg::SelectTab(Tab::Connections)),
            KeyCode::Char('2') => Some(Msg::SelectTab(Tab::QueryEditor)),
            KeyCode::Char('3') => Some(Msg::SelectTab(Tab::SchemaExplorer)),
            KeyCode::Char(ch) => Some(Msg::Shortcut(ch)),
            KeyCode::Left => Some(Msg::Left),
            KeyCode::Right => Some(Msg::Right),
            KeyCode::Enter => Some(Msg::Activate),
            KeyCode::Delete => Some(Msg::Delete),
            _ => None,
        },
        InputMode::Form | InputMode::Filter => match key.code {
            KeyCode::Char(ch) => Some(Msg::Input(ch)),
            KeyCode::Left => Some(Msg::Left),
            KeyCode::Right => Some(Msg::Right),
            KeyCode::Enter => Some(Msg::Activate),
            _ => None,
        },
        InputMode::Editor => match key.code {
            KeyCode::Char(ch) => Some(Msg::Input(ch)),
            KeyCode::Enter => Some(Msg::Input('\n')),
            _ => None,
        },
    }
}
