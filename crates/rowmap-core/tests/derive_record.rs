//! Schemas produced by `#[derive(Record)]`.

use rowmap_core::{bindings, Record, RecordSchema, SqlValue, StorageKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, Record)]
struct Address {
    street: String,
    #[column(size = 12)]
    zip: String,
}

#[derive(Debug, Default, Record)]
#[record(table = "accounts", option = "WITHOUT ROWID", comment = "customer accounts")]
struct Account {
    #[column(primary_key, size = 36)]
    uuid: String,
    #[column(name = "Display_Name", unique, default = "'anon'")]
    display_name: String,
    #[column(index_class = "UNIQUE")]
    email: String,
    #[column(index)]
    created_at: chrono::DateTime<chrono::Utc>,
    balance: f64,
    #[column(kind = "int")]
    raw_level: SqlValue,
    level: SqlValue,
    #[column(embed)]
    home: Address,
    #[column(embed, name = "billing")]
    billing: Option<Address>,
    #[column(json)]
    tags: Vec<String>,
    #[column(not_null)]
    active: bool,
    nickname: Option<String>,
    #[column(skip)]
    cache: Vec<u8>,
}

#[derive(Debug, Default, Record)]
struct HTTPRequestLog {
    id: u64,
}

#[test]
fn test_table_name_and_options() {
    assert_eq!(Account::table_name(), "accounts");
    assert_eq!(HTTPRequestLog::table_name(), "http_request_log");

    let schema = bindings::<Account>();
    assert_eq!(schema.table().options, vec!["WITHOUT ROWID"]);
    assert_eq!(schema.table().comment.as_deref(), Some("customer accounts"));
}

#[test]
fn test_columns_in_declaration_order() {
    let schema = bindings::<Account>();
    assert_eq!(
        schema.column_names(),
        vec![
            "uuid",
            "display_name",
            "email",
            "created_at",
            "balance",
            "raw_level",
            "street",
            "zip",
            "billing",
            "tags",
            "active",
            "nickname",
        ]
    );
}

#[test]
fn test_column_flags() {
    let schema = bindings::<Account>();
    let def = |name: &str| schema.binding(name).unwrap().def().clone();

    let uuid = def("uuid");
    assert!(uuid.primary_key);
    assert_eq!(uuid.size, Some(36));
    assert_eq!(uuid.not_null, Some(true));

    let display = def("DISPLAY_NAME");
    assert!(display.unique);
    assert_eq!(display.default.as_deref(), Some("'anon'"));

    let email = def("email");
    assert!(email.index);
    assert_eq!(email.index_class.as_deref(), Some("UNIQUE"));

    assert_eq!(def("created_at").kind, StorageKind::Time);
    assert!(def("created_at").index);
    assert_eq!(def("raw_level").kind, StorageKind::Int);
    assert_eq!(def("zip").size, Some(12));
    assert_eq!(def("billing").kind, StorageKind::Json);
    assert_eq!(def("tags").kind, StorageKind::Json);
    assert_eq!(def("active").not_null, Some(true));
    assert_eq!(def("nickname").not_null, Some(false));
    assert_eq!(def("balance").not_null, None);
    assert_eq!(
        schema.primary_keys().map(|b| b.name()).collect::<Vec<_>>(),
        vec!["uuid"]
    );
}

#[test]
fn test_embedded_and_json_values() {
    let schema = bindings::<Account>();
    let mut account = Account {
        home: Address {
            street: "Main St".to_string(),
            zip: "0150".to_string(),
        },
        tags: vec!["vip".to_string()],
        ..Account::default()
    };

    assert_eq!(
        schema.binding("street").unwrap().value(&account).unwrap(),
        SqlValue::Text("Main St".to_string())
    );
    assert_eq!(
        schema.binding("billing").unwrap().value(&account).unwrap(),
        SqlValue::Null
    );
    assert_eq!(
        schema.binding("tags").unwrap().value(&account).unwrap(),
        SqlValue::Text("[\"vip\"]".to_string())
    );

    schema
        .binding("billing")
        .unwrap()
        .assign(
            &mut account,
            SqlValue::Text("{\"street\":\"Dock\",\"zip\":\"9\"}".to_string()),
        )
        .unwrap();
    assert_eq!(
        account.billing,
        Some(Address {
            street: "Dock".to_string(),
            zip: "9".to_string(),
        })
    );

    let err = schema
        .binding("active")
        .unwrap()
        .assign(&mut account, SqlValue::Text("maybe".to_string()))
        .unwrap_err();
    assert!(err.to_string().contains("`active`"), "{err}");
}

#[test]
fn test_derivation_is_deterministic() {
    let first = RecordSchema::<Account>::derive();
    let second = RecordSchema::<Account>::derive();
    assert_eq!(first.table(), second.table());
    assert_eq!(first.table(), bindings::<Account>().table());
}
