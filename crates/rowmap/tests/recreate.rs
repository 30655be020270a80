//! Column changes that rebuild a SQLite table.

mod common;

use common::memory_db;
use rowmap::{ColumnDef, Db, OrmError, Session, StorageKind, TableSchema};

const PEOPLE: &str = "CREATE TABLE \"people\" (\
    id integer PRIMARY KEY, \
    name text NOT NULL, \
    age integer, \
    city varchar(30) DEFAULT 'x,y', \
    CONSTRAINT \"uq_name\" UNIQUE (name))";

async fn people() -> Db {
    let db = memory_db().await;
    let script = format!(
        "{PEOPLE};\n\
         CREATE INDEX idx_people_age ON people (age);\n\
         CREATE INDEX idx_people_city ON people (city);\n\
         INSERT INTO people (name, age, city) VALUES ('ann', 30, 'oslo');\n\
         INSERT INTO people (name, age) VALUES ('bob', 40);\n"
    );
    db.exec_script(script.as_bytes()).await.unwrap();
    db
}

async fn column_names(db: &Db, table: &str) -> Vec<String> {
    db.driver()
        .column_types(table)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect()
}

async fn texts(db: &mut Db, sql: &str) -> Vec<String> {
    let mut out = Vec::new();
    db.query(sql, Vec::new()).scalars(&mut out).await.unwrap();
    out
}

#[tokio::test]
async fn test_drop_column_keeps_rows_and_indexes() {
    let mut db = people().await;
    let driver = db.driver();

    driver.drop_column("people", "age").await.unwrap();

    assert_eq!(column_names(&db, "people").await, vec!["id", "name", "city"]);
    assert_eq!(
        texts(&mut db, "SELECT name || ':' || city FROM people ORDER BY id").await,
        vec!["ann:oslo", "bob:x,y"]
    );
    assert!(driver.has_index("people", "idx_people_city").await.unwrap());
    assert!(!driver.has_index("people", "idx_people_age").await.unwrap());
    assert!(!driver.has_table("people__temp").await.unwrap());

    let ddl = driver.raw_ddl("people").await.unwrap();
    assert!(ddl.contains("CONSTRAINT \"uq_name\" UNIQUE (name)"), "{ddl}");

    let err = db
        .exec(
            "INSERT INTO people (name) VALUES (?)",
            vec![rowmap::SqlValue::Text("ann".to_string())],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::Execution { .. }));
}

#[tokio::test]
async fn test_drop_unknown_column_leaves_table() {
    let db = people().await;
    let driver = db.driver();
    let before = driver.raw_ddl("people").await.unwrap();

    let err = driver.drop_column("people", "nope").await.unwrap_err();
    assert!(matches!(err, OrmError::Validation(_)));
    assert_eq!(driver.raw_ddl("people").await.unwrap(), before);

    let err = driver.drop_column("ghosts", "id").await.unwrap_err();
    assert!(matches!(err, OrmError::Validation(_)));
}

#[tokio::test]
async fn test_alter_column_to_not_null_fills_nulls() {
    let mut db = people().await;
    db.exec("UPDATE people SET city = NULL WHERE name = 'bob'", Vec::new())
        .await
        .unwrap();

    let mut city = ColumnDef::new("city", StorageKind::String);
    city.size = Some(50);
    city.not_null = Some(true);
    db.driver().alter_column("people", &city).await.unwrap();

    let columns = db.driver().column_types("people").await.unwrap();
    let altered = columns.iter().find(|c| c.name == "city").unwrap();
    assert!(
        altered.data_type.eq_ignore_ascii_case("varchar(50)"),
        "{}",
        altered.data_type
    );
    assert!(altered.not_null);
    assert_eq!(
        texts(&mut db, "SELECT city FROM people ORDER BY id").await,
        vec!["oslo", ""]
    );
    assert!(db
        .driver()
        .has_index("people", "idx_people_city")
        .await
        .unwrap());
}

#[tokio::test]
async fn test_add_unique_column_rebuilds() {
    let mut db = people().await;
    let mut email = ColumnDef::new("email", StorageKind::String);
    email.unique = true;
    db.driver().add_column("people", &email).await.unwrap();

    assert_eq!(
        column_names(&db, "people").await,
        vec!["id", "name", "age", "city", "email"]
    );
    assert_eq!(
        texts(&mut db, "SELECT name FROM people ORDER BY id").await,
        vec!["ann", "bob"]
    );

    let ddl = db.driver().raw_ddl("people").await.unwrap();
    let email_at = ddl.find("`email`").unwrap();
    let constraint_at = ddl.find("CONSTRAINT").unwrap();
    assert!(email_at < constraint_at, "{ddl}");
}

#[tokio::test]
async fn test_rebuild_keeps_table_options() {
    let db = memory_db().await;
    let driver = db.driver();

    let mut schema = TableSchema::new("kv");
    let mut key = ColumnDef::new("k", StorageKind::String);
    key.primary_key = true;
    key.not_null = Some(true);
    schema.columns.push(key);
    schema.columns.push(ColumnDef::new("v", StorageKind::String));
    schema.columns.push(ColumnDef::new("stale", StorageKind::Int));
    schema.options.push("WITHOUT ROWID".to_string());
    driver.create_table(&schema).await.unwrap();

    driver.drop_column("kv", "stale").await.unwrap();

    let ddl = driver.raw_ddl("kv").await.unwrap();
    assert!(ddl.ends_with("WITHOUT ROWID"), "{ddl}");
    assert!(!ddl.contains("stale"), "{ddl}");
}
