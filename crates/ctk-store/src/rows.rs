//! Row <-> domain type mapping shared by every operations module.

use chrono::{DateTime, Utc};
use ctk_core::content::MessageContent;
use ctk_core::message::{Message, MessageRole};
use ctk_error::CtkResult;
use rusqlite::Row;
use std::collections::HashMap;
use uuid::Uuid;

pub fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value.and_then(|v| DateTime::parse_from_rfc3339(&v).ok().map(|d| d.with_timezone(&Utc)))
}

pub fn format_timestamp(value: Option<DateTime<Utc>>) -> Option<String> {
    value.map(|v| v.to_rfc3339())
}

pub fn message_from_row(row: &Row) -> rusqlite::Result<Message> {
    let id: String = row.get("id")?;
    let parent_id: Option<String> = row.get("parent_id")?;
    let role: String = row.get("role")?;
    let content_json: String = row.get("content")?;
    let timestamp: Option<String> = row.get("timestamp")?;
    let metadata_json: String = row.get("metadata")?;

    let content: MessageContent = serde_json::from_str(&content_json).unwrap_or_default();
    let metadata: HashMap<String, serde_json::Value> =
        serde_json::from_str(&metadata_json).unwrap_or_default();

    Ok(Message {
        id: Uuid::parse_str(&id).unwrap_or_else(|_| Uuid::nil()),
        role: MessageRole::from(role.as_str()),
        content,
        timestamp: parse_timestamp(timestamp),
        parent_id: parent_id.and_then(|p| Uuid::parse_str(&p).ok()),
        metadata,
    })
}

pub fn message_content_json(content: &MessageContent) -> CtkResult<String> {
    Ok(serde_json::to_string(content)?)
}

pub fn metadata_json(metadata: &HashMap<String, serde_json::Value>) -> CtkResult<String> {
    Ok(serde_json::to_string(metadata)?)
}
