//! Navigation model for the schema explorer: a three-group tree built from a
//! [`SchemaCatalog`], with filter, expansion and table selection state.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::schema_cache::{RoutineKind, SchemaCatalog};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    Tables,
    Views,
    Procedures,
}

impl GroupKind {
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::Tables => "tables",
            Self::Views => "views",
            Self::Procedures => "procedures",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Tables => "Tables",
            Self::Views => "Views",
            Self::Procedures => "Procedures",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Group(GroupKind),
    Table,
    View,
    Routine(RoutineKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub id: String,
    pub label: String,
    pub kind: NodeKind,
    /// Child count for groups, column count for tables.
    pub badge: Option<usize>,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    fn leaf(id: String, label: &str, kind: NodeKind, badge: Option<usize>) -> Self {
        Self {
            id,
            label: label.to_string(),
            kind,
            badge,
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    fn find(&self, id: &str) -> Option<&TreeNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }
}

#[must_use]
pub fn table_node_id(name: &str) -> String {
    format!("table-{name}")
}

#[must_use]
pub fn view_node_id(name: &str) -> String {
    format!("view-{name}")
}

#[must_use]
pub fn routine_node_id(name: &str) -> String {
    format!("proc-{name}")
}

/// Case-insensitive substring match; an empty term matches everything.
#[must_use]
pub fn matches_filter(name: &str, term: &str) -> bool {
    term.is_empty() || name.to_lowercase().contains(&term.to_lowercase())
}

fn group(kind: GroupKind, children: Vec<TreeNode>) -> Option<TreeNode> {
    if children.is_empty() {
        return None;
    }
    Some(TreeNode {
        id: kind.id().to_string(),
        label: kind.label().to_string(),
        kind: NodeKind::Group(kind),
        badge: Some(children.len()),
        children,
    })
}

/// Builds the Tables / Views / Procedures groups, dropping any group the
/// filter leaves empty.
#[must_use]
pub fn build_tree(catalog: &SchemaCatalog, filter: &str) -> Vec<TreeNode> {
    let tables = catalog
        .tables
        .iter()
        .filter(|table| matches_filter(&table.name, filter))
        .map(|table| {
            TreeNode::leaf(
                table_node_id(&table.name),
                &table.name,
                NodeKind::Table,
                Some(table.columns.len()),
            )
        })
        .collect();
    let views = catalog
        .views
        .iter()
        .filter(|view| matches_filter(&view.name, filter))
        .map(|view| TreeNode::leaf(view_node_id(&view.name), &view.name, NodeKind::View, None))
        .collect();
    let procedures = catalog
        .procedures
        .iter()
        .filter(|routine| matches_filter(&routine.name, filter))
        .map(|routine| {
            TreeNode::leaf(
                routine_node_id(&routine.name),
                &routine.name,
                NodeKind::Routine(routine.kind),
                None,
            )
        })
        .collect();

    [
        group(GroupKind::Tables, tables),
        group(GroupKind::Views, views),
        group(GroupKind::Procedures, procedures),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Selecting a table leaf yields its name; anything else is a no-op.
#[must_use]
pub fn select(node: &TreeNode) -> Option<&str> {
    matches!(node.kind, NodeKind::Table).then_some(node.label.as_str())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpansionState {
    expanded: BTreeSet<String>,
}

impl Default for ExpansionState {
    fn default() -> Self {
        Self {
            expanded: BTreeSet::from([GroupKind::Tables.id().to_string()]),
        }
    }
}

impl ExpansionState {
    #[must_use]
    pub fn is_expanded(&self, id: &str) -> bool {
        self.expanded.contains(id)
    }

    /// Flips a node with children; childless nodes are left alone. Returns
    /// whether the set changed.
    pub fn toggle(&mut self, node: &TreeNode) -> bool {
        if !node.has_children() {
            return false;
        }
        if !self.expanded.remove(&node.id) {
            self.expanded.insert(node.id.clone());
        }
        true
    }

    pub fn expand(&mut self, id: impl Into<String>) {
        self.expanded.insert(id.into());
    }

    pub fn collapse(&mut self, id: &str) {
        self.expanded.remove(id);
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.expanded.iter().map(String::as_str)
    }
}

/// One rendered row of the flattened tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleNode {
    pub id: String,
    pub label: String,
    pub kind: NodeKind,
    pub badge: Option<usize>,
    pub depth: usize,
    pub has_children: bool,
    pub expanded: bool,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeActivation {
    Toggled { id: String, expanded: bool },
    TableSelected(String),
    Nothing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogSummary {
    pub tables: usize,
    pub views: usize,
    pub procedures: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SchemaTreeState {
    connection_id: Option<u64>,
    catalog: Option<Arc<SchemaCatalog>>,
    tree: Vec<TreeNode>,
    expansion: ExpansionState,
    filter: String,
    selected_table: Option<String>,
    cursor: usize,
}

impl SchemaTreeState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a freshly fetched catalog. A different connection starts from
    /// a clean slate; a refresh of the same one keeps expansion and filter.
    pub fn replace_catalog(&mut self, connection_id: u64, catalog: Arc<SchemaCatalog>) {
        if self.connection_id == Some(connection_id) {
            if let Some(selected) = &self.selected_table {
                if catalog.table(selected).is_none() {
                    self.selected_table = None;
                }
            }
        } else {
            self.expansion = ExpansionState::default();
            self.filter.clear();
            self.selected_table = None;
            self.cursor = 0;
        }

        self.connection_id = Some(connection_id);
        self.catalog = Some(catalog);
        self.rebuild();
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    #[must_use]
    pub fn connection_id(&self) -> Option<u64> {
        self.connection_id
    }

    #[must_use]
    pub fn catalog(&self) -> Option<&SchemaCatalog> {
        self.catalog.as_deref()
    }

    #[must_use]
    pub fn summary(&self) -> Option<CatalogSummary> {
        self.catalog.as_deref().map(|catalog| CatalogSummary {
            tables: catalog.tables.len(),
            views: catalog.views.len(),
            procedures: catalog.procedures.len(),
        })
    }

    #[must_use]
    pub fn tree(&self) -> &[TreeNode] {
        &self.tree
    }

    #[must_use]
    pub fn expansion(&self) -> &ExpansionState {
        &self.expansion
    }

    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Changing the filter never expands or collapses anything.
    pub fn set_filter(&mut self, term: impl Into<String>) {
        self.filter = term.into();
        self.rebuild();
    }

    #[must_use]
    pub fn selected_table(&self) -> Option<&str> {
        self.selected_table.as_deref()
    }

    #[must_use]
    pub fn is_selected(&self, table_name: &str) -> bool {
        self.selected_table.as_deref() == Some(table_name)
    }

    pub fn clear_selection(&mut self) {
        self.selected_table = None;
    }

    #[must_use]
    pub fn node(&self, id: &str) -> Option<&TreeNode> {
        self.tree.iter().find_map(|node| node.find(id))
    }

    /// Toggles the node with `id`, if it exists and has children.
    pub fn toggle(&mut self, id: &str) -> bool {
        let Some(node) = self.tree.iter().find_map(|node| node.find(id)) else {
            return false;
        };
        let changed = self.expansion.toggle(node);
        self.clamp_cursor();
        changed
    }

    /// Depth-first rows honoring the expansion set.
    #[must_use]
    pub fn visible_nodes(&self) -> Vec<VisibleNode> {
        let mut rows = Vec::new();
        for node in &self.tree {
            self.push_visible(node, 0, &mut rows);
        }
        rows
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn move_cursor_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_cursor_down(&mut self) {
        let visible = self.visible_nodes().len();
        if visible > 0 {
            self.cursor = (self.cursor + 1).min(visible - 1);
        }
    }

    /// Click on the row under the cursor: groups toggle, table leaves become
    /// the selection.
    pub fn activate_cursor(&mut self) -> TreeActivation {
        let Some(row) = self.visible_nodes().into_iter().nth(self.cursor) else {
            return TreeActivation::Nothing;
        };

        if row.has_children {
            self.toggle(&row.id);
            return TreeActivation::Toggled {
                expanded: self.expansion.is_expanded(&row.id),
                id: row.id,
            };
        }

        if matches!(row.kind, NodeKind::Table) {
            self.selected_table = Some(row.label.clone());
            return TreeActivation::TableSelected(row.label);
        }

        TreeActivation::Nothing
    }

    #[must_use]
    pub fn row_at_cursor(&self) -> Option<VisibleNode> {
        self.visible_nodes().into_iter().nth(self.cursor)
    }

    fn push_visible(&self, node: &TreeNode, depth: usize, rows: &mut Vec<VisibleNode>) {
        let expanded = self.expansion.is_expanded(&node.id);
        rows.push(VisibleNode {
            id: node.id.clone(),
            label: node.label.clone(),
            kind: node.kind,
            badge: node.badge,
            depth,
            has_children: node.has_children(),
            expanded,
            selected: matches!(node.kind, NodeKind::Table) && self.is_selected(&node.label),
        });

        if expanded {
            for child in &node.children {
                self.push_visible(child, depth + 1, rows);
            }
        }
    }

    fn rebuild(&mut self) {
        self.tree = self
            .catalog
            .as_deref()
            .map(|catalog| build_tree(catalog, &self.filter))
            .unwrap_or_default();
        self.clamp_cursor();
    }

    fn clamp_cursor(&mut self) {
        let visible = self.visible_nodes().len();
        self.cursor = self.cursor.min(visible.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{
        build_tree, select, table_node_id, ExpansionState, GroupKind, NodeKind, SchemaTreeState,
        TreeActivation,
    };
    use crate::schema_cache::{
        ColumnSchema, RoutineKind, RoutineSchema, SchemaCatalog, TableSchema, ViewSchema,
    };

    fn table(name: &str, columns: &[&str]) -> TableSchema {
        TableSchema {
            name: name.to_string(),
            columns: columns
                .iter()
                .map(|column| ColumnSchema::new(*column, "int"))
                .collect(),
            indexes: Vec::new(),
        }
    }

    fn catalog() -> SchemaCatalog {
        SchemaCatalog {
            database_name: "ecommerce_db".to_string(),
            tables: vec![
                table("users", &["id", "username", "email"]),
                table("products", &["id", "name"]),
            ],
            views: vec![ViewSchema {
                name: "user_order_summary".to_string(),
                definition: "SELECT 1".to_string(),
            }],
            procedures: vec![RoutineSchema {
                name: "GetUserOrders".to_string(),
                kind: RoutineKind::Procedure,
                parameters: vec!["user_id INT".to_string()],
                description: "Returns all orders for a specific user".to_string(),
            }],
        }
    }

    #[test]
    fn unfiltered_tree_has_three_groups_with_badges() {
        let tree = build_tree(&catalog(), "");

        let ids = tree.iter().map(|node| node.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["tables", "views", "procedures"]);
        assert_eq!(tree[0].badge, Some(2));
        assert_eq!(tree[0].children[0].id, "table-users");
        assert_eq!(tree[0].children[0].badge, Some(3));
        assert_eq!(tree[1].children[0].id, "view-user_order_summary");
        assert_eq!(tree[2].children[0].id, "proc-GetUserOrders");
        assert_eq!(
            tree[2].children[0].kind,
            NodeKind::Routine(RoutineKind::Procedure)
        );
    }

    #[test]
    fn filter_is_case_insensitive_and_drops_empty_groups() {
        let tree = build_tree(&catalog(), "USE");

        assert_eq!(tree.len(), 3);
        assert_eq!(tree[0].children.len(), 1);
        assert_eq!(tree[0].children[0].label, "users");
        assert_eq!(tree[0].badge, Some(1));

        let tree = build_tree(&catalog(), "prod");
        let groups = tree.iter().map(|node| node.kind).collect::<Vec<_>>();
        assert_eq!(groups, vec![NodeKind::Group(GroupKind::Tables)]);
        assert_eq!(tree[0].children[0].label, "products");

        assert!(build_tree(&catalog(), "zzz").is_empty());
    }

    #[test]
    fn toggling_a_childless_leaf_is_a_no_op() {
        let tree = build_tree(&catalog(), "");
        let mut expansion = ExpansionState::default();
        let before = expansion.clone();

        assert!(!expansion.toggle(&tree[0].children[0]));
        assert_eq!(expansion, before);

        assert!(expansion.toggle(&tree[0]));
        assert!(!expansion.is_expanded("tables"));
        assert!(expansion.toggle(&tree[0]));
        assert!(expansion.is_expanded("tables"));
    }

    #[test]
    fn default_expansion_opens_tables_group_only() {
        let expansion = ExpansionState::default();
        assert_eq!(expansion.ids().collect::<Vec<_>>(), vec!["tables"]);
    }

    #[test]
    fn select_only_yields_table_leaves() {
        let tree = build_tree(&catalog(), "");
        assert_eq!(select(&tree[0].children[1]), Some("products"));
        assert_eq!(select(&tree[0]), None);
        assert_eq!(select(&tree[1].children[0]), None);
    }

    #[test]
    fn filter_changes_keep_expansion_state() {
        let mut state = SchemaTreeState::new();
        state.replace_catalog(1, Arc::new(catalog()));
        assert!(state.toggle("views"));

        state.set_filter("zzz");
        assert!(state.tree().is_empty());
        assert!(state.visible_nodes().is_empty());

        state.set_filter("");
        assert!(state.expansion().is_expanded("tables"));
        assert!(state.expansion().is_expanded("views"));
        assert!(!state.expansion().is_expanded("procedures"));
    }

    #[test]
    fn visible_nodes_follow_expansion() {
        let mut state = SchemaTreeState::new();
        state.replace_catalog(1, Arc::new(catalog()));

        let labels = state
            .visible_nodes()
            .into_iter()
            .map(|row| (row.depth, row.label))
            .collect::<Vec<_>>();
        assert_eq!(
            labels,
            vec![
                (0, "Tables".to_string()),
                (1, "users".to_string()),
                (1, "products".to_string()),
                (0, "Views".to_string()),
                (0, "Procedures".to_string()),
            ]
        );
    }

    #[test]
    fn activating_rows_toggles_groups_and_selects_tables() {
        let mut state = SchemaTreeState::new();
        state.replace_catalog(1, Arc::new(catalog()));

        state.move_cursor_down();
        assert_eq!(
            state.activate_cursor(),
            TreeActivation::TableSelected("users".to_string())
        );
        assert!(state.is_selected("users"));
        assert!(!state.is_selected("Users"));
        assert!(state.visible_nodes()[1].selected);

        state.move_cursor_up();
        assert_eq!(
            state.activate_cursor(),
            TreeActivation::Toggled {
                id: "tables".to_string(),
                expanded: false,
            }
        );
        assert_eq!(state.visible_nodes().len(), 3);

        state.move_cursor_down();
        state.move_cursor_down();
        state.move_cursor_down();
        assert_eq!(state.cursor(), 2);
        assert!(!state.toggle(&table_node_id("users")));
    }

    #[test]
    fn new_connection_resets_state_but_refresh_keeps_it() {
        let mut state = SchemaTreeState::new();
        state.replace_catalog(1, Arc::new(catalog()));
        state.toggle("views");
        state.set_filter("user");
        state.move_cursor_down();
        state.activate_cursor();
        assert_eq!(state.selected_table(), Some("users"));

        state.replace_catalog(1, Arc::new(catalog()));
        assert_eq!(state.filter(), "user");
        assert!(state.expansion().is_expanded("views"));
        assert_eq!(state.selected_table(), Some("users"));

        let mut shrunk = catalog();
        shrunk.tables.retain(|table| table.name != "users");
        state.replace_catalog(1, Arc::new(shrunk));
        assert_eq!(state.selected_table(), None);

        state.replace_catalog(2, Arc::new(catalog()));
        assert_eq!(state.filter(), "");
        assert_eq!(state.expansion(), &ExpansionState::default());
        assert_eq!(state.cursor(), 0);
        assert_eq!(state.connection_id(), Some(2));
    }
}
