//! Shared records and helpers for the integration tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use rowmap::{Db, DbOptions, DriverRegistry, Record};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub theme: String,
    pub volume: u8,
}

#[derive(Debug, Default, Clone, PartialEq, Record)]
pub struct Audit {
    pub created_by: String,
    pub revision: i32,
}

#[derive(Debug, Default, Clone, PartialEq, Record)]
#[record(table = "samples")]
pub struct Sample {
    #[column(primary_key, auto_increment)]
    pub id: i64,
    pub flag: bool,
    pub count: i32,
    pub total: u32,
    pub ratio: f64,
    #[column(size = 32, index)]
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub payload: Vec<u8>,
    #[column(json)]
    pub settings: Settings,
    #[column(json)]
    pub extra: Option<Settings>,
    pub note: Option<String>,
    #[column(embed)]
    pub audit: Audit,
    #[column(skip)]
    pub scratch: String,
}

pub fn timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 10, 20, 30).unwrap()
}

pub fn sample(label: &str, count: i32) -> Sample {
    Sample {
        id: 0,
        flag: true,
        count,
        total: 4_000_000_000,
        ratio: 0.25,
        label: label.to_string(),
        created_at: timestamp(),
        payload: vec![0, 1, 2, 255],
        settings: Settings {
            theme: "dark".to_string(),
            volume: 7,
        },
        extra: None,
        note: Some(format!("note for {label}")),
        audit: Audit {
            created_by: "tester".to_string(),
            revision: 3,
        },
        scratch: String::new(),
    }
}

pub async fn open(options: DbOptions) -> Db {
    Db::open(options, &DriverRegistry::with_builtins())
        .await
        .unwrap()
}

pub async fn memory_db() -> Db {
    open(DbOptions::default()).await
}
