//! Built-in datasets served by the simulated backends.

use datalink_core::profiles::DatabaseKind;
use datalink_core::result_set::{CellValue, ResultSetError, TabularResult};
use datalink_core::schema_cache::{
    ColumnKey, ColumnSchema, IndexSchema, RoutineKind, RoutineSchema, SchemaCatalog, TableSchema,
    ViewSchema,
};

fn column(name: &str, data_type: &str) -> ColumnSchema {
    ColumnSchema::new(name, data_type)
}

trait ColumnExt {
    fn required(self) -> Self;
    fn key(self, key: ColumnKey) -> Self;
    fn with_default(self, value: &str) -> Self;
    fn extra(self, value: &str) -> Self;
}

impl ColumnExt for ColumnSchema {
    fn required(mut self) -> Self {
        self.nullable = false;
        self
    }

    fn key(mut self, key: ColumnKey) -> Self {
        self.key = key;
        self
    }

    fn with_default(mut self, value: &str) -> Self {
        self.default_value = Some(value.to_string());
        self
    }

    fn extra(mut self, value: &str) -> Self {
        self.extra = Some(value.to_string());
        self
    }
}

fn auto_id() -> ColumnSchema {
    column("id", "int")
        .required()
        .key(ColumnKey::Primary)
        .extra("auto_increment")
}

fn created_at() -> ColumnSchema {
    column("created_at", "timestamp")
        .required()
        .with_default("CURRENT_TIMESTAMP")
}

fn updated_at() -> ColumnSchema {
    column("updated_at", "timestamp")
        .required()
        .with_default("CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP")
}

fn index(name: &str, columns: &[&str], unique: bool) -> IndexSchema {
    IndexSchema {
        name: name.to_string(),
        columns: columns.iter().map(ToString::to_string).collect(),
        unique,
        method: None,
    }
}

fn routine(name: &str, kind: RoutineKind, parameters: &[&str], description: &str) -> RoutineSchema {
    RoutineSchema {
        name: name.to_string(),
        kind,
        parameters: parameters.iter().map(ToString::to_string).collect(),
        description: description.to_string(),
    }
}

fn view(name: &str, definition: &str) -> ViewSchema {
    ViewSchema {
        name: name.to_string(),
        definition: definition.to_string(),
    }
}

/// Catalog shown for a connection of the given kind. PostgreSQL connections
/// see the analytics database; MySQL and SQLite see the store database.
#[must_use]
pub fn demo_catalog(kind: DatabaseKind) -> SchemaCatalog {
    match kind {
        DatabaseKind::Postgresql => analytics_catalog(),
        DatabaseKind::Mysql | DatabaseKind::Sqlite => ecommerce_catalog(),
    }
}

#[must_use]
pub fn ecommerce_catalog() -> SchemaCatalog {
    let users = TableSchema {
        name: "users".to_string(),
        columns: vec![
            auto_id(),
            column("username", "varchar(50)")
                .required()
                .key(ColumnKey::Unique),
            column("email", "varchar(100)")
                .required()
                .key(ColumnKey::Unique),
            column("password_hash", "varchar(255)").required(),
            column("first_name", "varchar(50)"),
            column("last_name", "varchar(50)"),
            created_at(),
            updated_at(),
            column("status", "enum('active','inactive','pending')")
                .required()
                .with_default("pending"),
        ],
        indexes: vec![
            index("PRIMARY", &["id"], true),
            index("username_unique", &["username"], true),
            index("email_unique", &["email"], true),
            index("idx_status", &["status"], false),
        ],
    };

    let products = TableSchema {
        name: "products".to_string(),
        columns: vec![
            auto_id(),
            column("name", "varchar(200)").required(),
            column("description", "text"),
            column("price", "decimal(10,2)").required(),
            column("category_id", "int"),
            column("supplier_id", "int"),
            column("sku", "varchar(50)").required().key(ColumnKey::Unique),
            column("stock_quantity", "int").required().with_default("0"),
            created_at(),
            updated_at(),
        ],
        indexes: vec![
            index("PRIMARY", &["id"], true),
            index("sku_unique", &["sku"], true),
            index("idx_category", &["category_id"], false),
            index("idx_supplier", &["supplier_id"], false),
        ],
    };

    let orders = TableSchema {
        name: "orders".to_string(),
        columns: vec![
            auto_id(),
            column("user_id", "int").required(),
            column("total_amount", "decimal(10,2)").required(),
            column(
                "status",
                "enum('pending','processing','shipped','delivered','cancelled')",
            )
            .required()
            .with_default("pending"),
            column("shipping_address", "text"),
            created_at(),
            updated_at(),
        ],
        indexes: vec![
            index("PRIMARY", &["id"], true),
            index("idx_user", &["user_id"], false),
            index("idx_status", &["status"], false),
            index("idx_created_at", &["created_at"], false),
        ],
    };

    let categories = TableSchema {
        name: "categories".to_string(),
        columns: vec![
            auto_id(),
            column("name", "varchar(100)").required(),
            column("parent_id", "int"),
            column("description", "text"),
            created_at(),
        ],
        indexes: vec![
            index("PRIMARY", &["id"], true),
            index("idx_parent", &["parent_id"], false),
        ],
    };

    SchemaCatalog {
        database_name: "ecommerce_db".to_string(),
        tables: vec![users, products, orders, categories],
        views: vec![
            view(
                "user_order_summary",
                "SELECT u.id, u.username, COUNT(o.id) as order_count, SUM(o.total_amount) as total_spent FROM users u LEFT JOIN orders o ON u.id = o.user_id GROUP BY u.id, u.username",
            ),
            view(
                "product_inventory",
                "SELECT p.id, p.name, p.sku, p.stock_quantity, c.name as category_name FROM products p LEFT JOIN categories c ON p.category_id = c.id",
            ),
        ],
        procedures: vec![
            routine(
                "GetUserOrders",
                RoutineKind::Procedure,
                &["user_id INT"],
                "Returns all orders for a specific user",
            ),
            routine(
                "UpdateProductStock",
                RoutineKind::Procedure,
                &["product_id INT", "quantity INT"],
                "Updates product stock quantity",
            ),
        ],
    }
}

#[must_use]
pub fn analytics_catalog() -> SchemaCatalog {
    let events = TableSchema {
        name: "events".to_string(),
        columns: vec![
            column("id", "bigserial").required().key(ColumnKey::Primary),
            column("user_id", "integer"),
            column("event_type", "varchar(50)").required(),
            column("properties", "jsonb"),
            column("timestamp", "timestamptz").required().with_default("now()"),
            column("session_id", "uuid"),
        ],
        indexes: vec![
            index("events_pkey", &["id"], true),
            index("idx_events_user_id", &["user_id"], false),
            index("idx_events_timestamp", &["timestamp"], false),
            IndexSchema {
                method: Some("gin".to_string()),
                ..index("idx_events_properties", &["properties"], false)
            },
        ],
    };

    let sessions = TableSchema {
        name: "sessions".to_string(),
        columns: vec![
            column("id", "uuid")
                .required()
                .key(ColumnKey::Primary)
                .with_default("gen_random_uuid()"),
            column("user_id", "integer"),
            column("started_at", "timestamptz").required(),
            column("ended_at", "timestamptz"),
            column("ip_address", "inet"),
            column("user_agent", "text"),
        ],
        indexes: vec![
            index("sessions_pkey", &["id"], true),
            index("idx_sessions_user_id", &["user_id"], false),
            index("idx_sessions_started_at", &["started_at"], false),
        ],
    };

    SchemaCatalog {
        database_name: "analytics_db".to_string(),
        tables: vec![events, sessions],
        views: vec![view(
            "daily_events",
            "SELECT date_trunc('day', timestamp) as day, event_type, count(*) as event_count FROM events GROUP BY 1, 2 ORDER BY 1 DESC",
        )],
        procedures: vec![routine(
            "cleanup_old_sessions",
            RoutineKind::Function,
            &["days_old INTEGER DEFAULT 30"],
            "Removes sessions older than specified days",
        )],
    }
}

fn table(columns: &[&str], rows: Vec<Vec<CellValue>>) -> Result<TabularResult, ResultSetError> {
    TabularResult::new(columns.iter().map(ToString::to_string).collect(), rows)
}

/// Result picked by keyword: a `select` naming users, products or orders
/// returns that sample set, anything else a one-cell acknowledgement.
pub fn canned_result(sql: &str) -> Result<TabularResult, ResultSetError> {
    let normalized = sql.trim().to_lowercase();
    let is_select = normalized.contains("select");

    if is_select && normalized.contains("users") {
        return table(
            &["id", "name", "email", "created_at", "status"],
            vec![
                vec![1.into(), "John Doe".into(), "john@example.com".into(), "2024-01-15 10:30:00".into(), "active".into()],
                vec![2.into(), "Jane Smith".into(), "jane@example.com".into(), "2024-01-16 14:22:00".into(), "active".into()],
                vec![3.into(), "Bob Johnson".into(), "bob@example.com".into(), "2024-01-17 09:15:00".into(), "inactive".into()],
                vec![4.into(), "Alice Brown".into(), "alice@example.com".into(), "2024-01-18 16:45:00".into(), "active".into()],
                vec![5.into(), "Charlie Wilson".into(), "charlie@example.com".into(), "2024-01-19 11:20:00".into(), "pending".into()],
            ],
        );
    }

    if is_select && normalized.contains("products") {
        return table(
            &["id", "name", "price", "category", "stock", "supplier"],
            vec![
                vec![1.into(), "Laptop Pro 15".into(), 1299.99.into(), "Electronics".into(), 25.into(), "TechCorp".into()],
                vec![2.into(), "Wireless Mouse".into(), 29.99.into(), "Electronics".into(), 150.into(), "AccessoryMaker".into()],
                vec![3.into(), "Office Chair".into(), 249.99.into(), "Furniture".into(), 8.into(), "FurniturePlus".into()],
                vec![4.into(), "Desk Lamp".into(), 79.99.into(), "Furniture".into(), 32.into(), "LightingCo".into()],
                vec![5.into(), "Notebook Set".into(), 15.99.into(), "Stationery".into(), 200.into(), "PaperWorks".into()],
            ],
        );
    }

    if is_select && normalized.contains("orders") {
        return table(
            &["id", "customer_id", "total", "status", "order_date"],
            vec![
                vec![1001.into(), 15.into(), 99.99.into(), "completed".into(), "2024-01-20 12:30:00".into()],
                vec![1002.into(), 23.into(), 249.5.into(), "processing".into(), "2024-01-20 14:15:00".into()],
                vec![1003.into(), 8.into(), 75.0.into(), "shipped".into(), "2024-01-19 16:22:00".into()],
                vec![1004.into(), 42.into(), 189.99.into(), "completed".into(), "2024-01-19 10:45:00".into()],
            ],
        );
    }

    table(&["result"], vec![vec!["Query executed successfully".into()]])
}

#[cfg(test)]
mod tests {
    use datalink_core::profiles::DatabaseKind;
    use datalink_core::result_set::CellValue;
    use datalink_core::sql_generator::{insert_template_sql, select_all_columns_sql};

    use super::{canned_result, demo_catalog};

    #[test]
    fn keyword_matching_picks_the_sample_set() {
        let users = canned_result("SELECT * FROM Users WHERE status = 'active'").expect("users");
        assert_eq!(users.row_count(), 5);
        assert_eq!(users.columns()[1], "name");

        let orders = canned_result("select id from orders").expect("orders");
        assert_eq!(orders.row_count(), 4);
        assert_eq!(orders.row(0).map(|row| row[0].clone()), Some(CellValue::Int(1001)));

        let update = canned_result("UPDATE users SET status = 'active'").expect("fallback");
        assert_eq!(update.columns(), ["result".to_string()]);
        assert_eq!(
            update.row(0),
            Some(&[CellValue::from("Query executed successfully")][..])
        );
    }

    #[test]
    fn catalog_depends_on_connection_kind() {
        assert_eq!(demo_catalog(DatabaseKind::Mysql).database_name, "ecommerce_db");
        assert_eq!(demo_catalog(DatabaseKind::Sqlite).database_name, "ecommerce_db");

        let analytics = demo_catalog(DatabaseKind::Postgresql);
        assert_eq!(analytics.database_name, "analytics_db");
        let events = analytics.table("events").expect("events table");
        assert_eq!(events.indexes[3].method.as_deref(), Some("gin"));
    }

    #[test]
    fn demo_tables_generate_templates() {
        let catalog = demo_catalog(DatabaseKind::Mysql);
        let orders = catalog.table("orders").expect("orders table");
        assert_eq!(
            select_all_columns_sql(orders, 10).expect("select"),
            "SELECT id, user_id, total_amount, status, shipping_address, created_at, updated_at\nFROM orders\nLIMIT 10;"
        );
        assert_eq!(
            insert_template_sql(catalog.table("categories").expect("categories")).expect("insert"),
            "INSERT INTO categories (name, parent_id, description, created_at)\nVALUES (?, ?, ?, ?);"
        );
    }
}
