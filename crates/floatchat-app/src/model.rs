// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use time::macros::format_description;

use crate::ids::MessageId;

pub const GREETING: &str = "Hello! How can I help you explore the ARGO data today?";
pub const FAILURE_PREFIX: &str = "Sorry, I encountered an error: ";

pub const LATITUDE_FIELD: &str = "latitude";
pub const LONGITUDE_FIELD: &str = "longitude";
pub const PRESSURE_FIELD: &str = "pressure";
pub const TEMPERATURE_FIELD: &str = "temperature";
pub const SALINITY_FIELD: &str = "salinity";
pub const PLATFORM_FIELD: &str = "platform_number";

/// One flat result row. Field order follows the service payload.
pub type Record = Map<String, Value>;

/// Ordered result rows as returned by the answering service.
pub type RowSet = Vec<Record>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub data: Option<RowSet>,
    pub sql: Option<String>,
    pub is_error: bool,
    pub created_at: OffsetDateTime,
}

impl Message {
    fn build(role: Role, content: String) -> Self {
        Self {
            id: MessageId::fresh(),
            role,
            content,
            data: None,
            sql: None,
            is_error: false,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::build(Role::User, content.into())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::build(Role::Assistant, content.into())
    }

    pub fn greeting() -> Self {
        Self::assistant(GREETING)
    }

    pub fn answer(answer: Answer) -> Self {
        Self {
            data: answer.data,
            sql: answer.sql,
            ..Self::build(Role::Assistant, answer.summary)
        }
    }

    /// Failure notice for a round trip. The detail is embedded verbatim.
    pub fn failure(detail: &str) -> Self {
        let detail = detail.trim();
        let detail = if detail.is_empty() {
            "unknown error"
        } else {
            detail
        };
        Self {
            is_error: true,
            ..Self::build(Role::Assistant, format!("{FAILURE_PREFIX}{detail}"))
        }
    }

    pub fn rows(&self) -> &[Record] {
        self.data.as_deref().unwrap_or(&[])
    }

    /// `HH:MM` of creation, for display only.
    pub fn clock_label(&self) -> String {
        self.created_at
            .format(&format_description!("[hour]:[minute]"))
            .unwrap_or_default()
    }
}

/// Successful answer body from the answering service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Answer {
    pub summary: String,
    #[serde(default)]
    pub data: Option<RowSet>,
    #[serde(default, rename = "sql_query")]
    pub sql: Option<String>,
}

/// Key present with a non-null value. Zero and empty strings count.
pub fn has_field(record: &Record, field: &str) -> bool {
    record.get(field).is_some_and(|value| !value.is_null())
}

pub fn numeric_field(record: &Record, field: &str) -> Option<f64> {
    record.get(field).and_then(Value::as_f64)
}

pub fn display_value(value: Option<&Value>) -> String {
    match value {
        None => String::new(),
        Some(Value::Null) => "null".to_owned(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}
