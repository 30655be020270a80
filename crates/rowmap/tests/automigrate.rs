//! Automigrate against SQLite and against a recording driver.

mod common;

use std::sync::Mutex;

use async_trait::async_trait;
use common::memory_db;
use rowmap::{
    automigrate, bindings, ColumnDef, ColumnInfo, Driver, MigrationStep, QueryOptions, Record,
    Result, Session, SqlValue, TableSchema,
};

#[derive(Debug, Default, Record)]
#[record(table = "codes")]
struct Code {
    #[column(primary_key, auto_increment)]
    id: i64,
    #[column(size = 10, not_null)]
    code: String,
    note: Option<String>,
}

#[derive(Debug, Default, Record)]
#[record(table = "widgets")]
struct WidgetV1 {
    #[column(primary_key, auto_increment)]
    id: i64,
    name: String,
    legacy: String,
}

#[derive(Debug, Default, Record)]
#[record(table = "widgets")]
struct WidgetV2 {
    #[column(primary_key, auto_increment)]
    id: i64,
    name: String,
    #[column(size = 20)]
    color: Option<String>,
    #[column(not_null)]
    weight: i64,
    #[column(index)]
    sku: String,
}

#[derive(Debug, Default, Record)]
#[record(table = "tags", option = "WITHOUT ROWID")]
struct Tag {
    #[column(primary_key)]
    name: String,
    weight: i64,
}

#[derive(Debug, Default, Record)]
#[record(table = "tickets")]
struct Ticket {
    #[column(auto_increment)]
    id: Option<i64>,
    memo: String,
}

fn alter(table: &str, column: &str) -> MigrationStep {
    MigrationStep::AlterColumn {
        table: table.to_string(),
        column: column.to_string(),
    }
}

fn add(table: &str, column: &str) -> MigrationStep {
    MigrationStep::AddColumn {
        table: table.to_string(),
        column: column.to_string(),
    }
}

#[tokio::test]
async fn test_create_then_idempotent() {
    let db = memory_db().await;
    let steps = db.automigrate::<Code>(&QueryOptions::new()).await.unwrap();
    assert_eq!(
        steps,
        vec![MigrationStep::CreateTable {
            table: "codes".to_string()
        }]
    );

    let steps = db.automigrate::<Code>(&QueryOptions::new()).await.unwrap();
    assert!(steps.is_empty(), "{steps:?}");
}

#[tokio::test]
async fn test_optional_auto_increment_key_is_stable() {
    let mut db = memory_db().await;
    db.automigrate::<Ticket>(&QueryOptions::new()).await.unwrap();
    let ticket = Ticket {
        id: None,
        memo: "first".to_string(),
    };
    let id = db
        .insert(&ticket, &QueryOptions::new())
        .await
        .unwrap()
        .last_insert_id;
    assert!(id > 0);

    let steps = db.automigrate::<Ticket>(&QueryOptions::new()).await.unwrap();
    assert!(steps.is_empty(), "{steps:?}");
}

#[tokio::test]
async fn test_widen_and_tighten_existing_column() {
    let mut db = memory_db().await;
    db.exec(
        "CREATE TABLE codes (id integer PRIMARY KEY AUTOINCREMENT NOT NULL, code varchar(5), note text)",
        Vec::new(),
    )
    .await
    .unwrap();
    db.exec(
        "INSERT INTO codes (code, note) VALUES (?, ?), (NULL, ?)",
        vec![
            SqlValue::Text("ab".to_string()),
            SqlValue::Text("first".to_string()),
            SqlValue::Text("second".to_string()),
        ],
    )
    .await
    .unwrap();

    let steps = db.automigrate::<Code>(&QueryOptions::new()).await.unwrap();
    assert_eq!(steps, vec![alter("codes", "code")]);

    let columns = db.driver().column_types("codes").await.unwrap();
    let code = columns.iter().find(|c| c.name == "code").unwrap();
    assert_eq!(code.size, Some(10));
    assert!(code.not_null);
    let note = columns.iter().find(|c| c.name == "note").unwrap();
    assert!(note.data_type.eq_ignore_ascii_case("text"), "{}", note.data_type);
    assert!(!note.not_null);

    let mut codes: Vec<String> = Vec::new();
    db.query("SELECT code FROM codes ORDER BY id", Vec::new())
        .scalars(&mut codes)
        .await
        .unwrap();
    assert_eq!(codes, vec!["ab", ""]);

    let mut notes: Vec<String> = Vec::new();
    db.query("SELECT note FROM codes ORDER BY id", Vec::new())
        .scalars(&mut notes)
        .await
        .unwrap();
    assert_eq!(notes, vec!["first", "second"]);

    let steps = db.automigrate::<Code>(&QueryOptions::new()).await.unwrap();
    assert!(steps.is_empty(), "{steps:?}");
}

#[tokio::test]
async fn test_add_columns_and_index_keeps_extra_columns() {
    let mut db = memory_db().await;
    db.automigrate::<WidgetV1>(&QueryOptions::new()).await.unwrap();
    db.insert(
        &WidgetV1 {
            id: 0,
            name: "bolt".to_string(),
            legacy: "old".to_string(),
        },
        &QueryOptions::new(),
    )
    .await
    .unwrap();

    let steps = db.automigrate::<WidgetV2>(&QueryOptions::new()).await.unwrap();
    assert_eq!(
        steps,
        vec![
            add("widgets", "color"),
            add("widgets", "weight"),
            add("widgets", "sku"),
            MigrationStep::CreateIndex {
                table: "widgets".to_string(),
                index: "idx_widgets_sku".to_string(),
            },
        ]
    );

    let mut widget = WidgetV2 {
        id: 1,
        ..WidgetV2::default()
    };
    db.get(&mut widget, &QueryOptions::new()).await.unwrap();
    assert_eq!(widget.name, "bolt");
    assert_eq!(widget.weight, 0);
    assert_eq!(widget.color, None);

    let mut legacy = String::new();
    db.query("SELECT legacy FROM widgets WHERE id = 1", Vec::new())
        .scalar(&mut legacy)
        .await
        .unwrap();
    assert_eq!(legacy, "old");

    let steps = db.automigrate::<WidgetV2>(&QueryOptions::new()).await.unwrap();
    assert!(steps.is_empty(), "{steps:?}");
}

#[tokio::test]
async fn test_table_options_are_applied() {
    let db = memory_db().await;
    db.automigrate::<Tag>(&QueryOptions::new()).await.unwrap();
    let ddl = db.driver().raw_ddl("tags").await.unwrap();
    assert!(ddl.ends_with("WITHOUT ROWID"), "{ddl}");

    let opts = QueryOptions::new()
        .with_table("strict_tags")
        .with_table_options(&["STRICT"]);
    db.automigrate::<Tag>(&opts).await.unwrap();
    let ddl = db.driver().raw_ddl("strict_tags").await.unwrap();
    assert!(ddl.ends_with("WITHOUT ROWID, STRICT"), "{ddl}");
}

/// Answers introspection from canned data and records every DDL call.
struct RecordingDriver {
    exists: bool,
    columns: Vec<ColumnInfo>,
    indexes: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl RecordingDriver {
    fn new(exists: bool, columns: Vec<ColumnInfo>) -> Self {
        Self {
            exists,
            columns,
            indexes: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

fn info(name: &str, data_type: &str, size: Option<u32>, not_null: bool) -> ColumnInfo {
    ColumnInfo {
        name: name.to_string(),
        data_type: data_type.to_string(),
        size,
        not_null,
    }
}

#[async_trait]
impl Driver for RecordingDriver {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn driver_data_type(&self, column: &ColumnDef) -> Result<String> {
        Ok(column.kind.to_string())
    }

    fn full_data_type(&self, column: &ColumnDef) -> Result<String> {
        self.driver_data_type(column)
    }

    async fn has_table(&self, _table: &str) -> Result<bool> {
        Ok(self.exists)
    }

    async fn has_column(&self, _table: &str, column: &str) -> Result<bool> {
        Ok(self.columns.iter().any(|c| c.name == column))
    }

    async fn has_index(&self, _table: &str, index: &str) -> Result<bool> {
        Ok(self.indexes.iter().any(|i| i == index))
    }

    async fn column_types(&self, _table: &str) -> Result<Vec<ColumnInfo>> {
        Ok(self.columns.clone())
    }

    async fn create_table(&self, schema: &TableSchema) -> Result<()> {
        self.record(format!("create_table {}", schema.name));
        Ok(())
    }

    async fn drop_table(&self, table: &str) -> Result<()> {
        self.record(format!("drop_table {table}"));
        Ok(())
    }

    async fn add_column(&self, table: &str, column: &ColumnDef) -> Result<()> {
        self.record(format!("add_column {table}.{}", column.name));
        Ok(())
    }

    async fn drop_column(&self, table: &str, column: &str) -> Result<()> {
        self.record(format!("drop_column {table}.{column}"));
        Ok(())
    }

    async fn alter_column(&self, table: &str, column: &ColumnDef) -> Result<()> {
        self.record(format!("alter_column {table}.{}", column.name));
        Ok(())
    }

    async fn create_index(&self, table: &str, column: &ColumnDef) -> Result<()> {
        self.record(format!("create_index {table}.{}", column.name));
        Ok(())
    }

    async fn drop_index(&self, table: &str, index: &str) -> Result<()> {
        self.record(format!("drop_index {table}.{index}"));
        Ok(())
    }

    async fn tables(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn current_database(&self) -> Result<String> {
        Ok("recording".to_string())
    }

    async fn raw_ddl(&self, _table: &str) -> Result<String> {
        Ok(String::new())
    }
}

#[tokio::test]
async fn test_missing_table_is_created_only() {
    let driver = RecordingDriver::new(false, Vec::new());
    let steps = automigrate(&driver, bindings::<Code>().table()).await.unwrap();
    assert_eq!(steps.len(), 1);
    assert_eq!(driver.calls(), vec!["create_table codes"]);
}

#[tokio::test]
async fn test_single_alter_leaves_other_columns() {
    let driver = RecordingDriver::new(
        true,
        vec![
            info("id", "integer", None, true),
            info("code", "varchar(5)", Some(5), false),
            info("note", "text", None, false),
            info("extra", "text", None, true),
        ],
    );
    let steps = automigrate(&driver, bindings::<Code>().table()).await.unwrap();
    assert_eq!(steps, vec![alter("codes", "code")]);
    assert_eq!(driver.calls(), vec!["alter_column codes.code"]);
}

#[tokio::test]
async fn test_column_names_match_exactly() {
    let driver = RecordingDriver::new(
        true,
        vec![
            info("id", "integer", None, true),
            info("code", "varchar(10)", Some(10), true),
            info("Note", "text", None, false),
        ],
    );
    let steps = automigrate(&driver, bindings::<Code>().table()).await.unwrap();
    assert_eq!(steps, vec![add("codes", "note")]);
    assert_eq!(driver.calls(), vec!["add_column codes.note"]);
}

#[tokio::test]
async fn test_existing_index_is_not_recreated() {
    let mut driver = RecordingDriver::new(
        true,
        vec![
            info("id", "integer", None, true),
            info("name", "text", None, false),
            info("color", "varchar(20)", Some(20), false),
            info("weight", "integer", None, true),
            info("sku", "text", None, false),
        ],
    );
    driver.indexes.push("idx_widgets_sku".to_string());
    let steps = automigrate(&driver, bindings::<WidgetV2>().table())
        .await
        .unwrap();
    assert!(steps.is_empty(), "{steps:?}");
    assert!(driver.calls().is_empty());
}
