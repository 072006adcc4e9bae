//! `save_conversation` / `load_conversation` / `delete_conversation` /
//! `update_conversation_metadata` / organization toggles / duplicate.

use std::collections::HashMap;

use chrono::Utc;
use ctk_core::conversation::{ConversationMetadata, ConversationTree};
use ctk_core::message::Message;
use ctk_error::CtkResult;
use rusqlite::{params, OptionalExtension, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::rows::{format_timestamp, message_content_json, message_from_row, metadata_json, parse_timestamp};
use crate::Store;

fn slugify_title(title: Option<&str>) -> String {
    let base = title.unwrap_or("conversation");
    let slug = slug::slugify(base);
    if slug.is_empty() {
        "conversation".to_string()
    } else {
        slug
    }
}

/// Generates a URL-safe slug (`<slugified title>-<id suffix>`), retrying
/// with a longer id suffix on collision. Called with an open transaction
/// so the uniqueness check and the eventual insert are atomic.
fn generate_unique_slug(tx: &Transaction, id: Uuid, title: Option<&str>) -> CtkResult<String> {
    let base = slugify_title(title);
    let id_str = id.simple().to_string();
    for suffix_len in [6usize, 8, 12, 32] {
        let candidate = format!("{}-{}", base, &id_str[..suffix_len.min(id_str.len())]);
        let exists: Option<String> = tx
            .query_row(
                "SELECT id FROM conversations WHERE slug = ?1 AND id != ?2",
                params![candidate, id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Ok(candidate);
        }
    }
    // Exhausted retries (astronomically unlikely): fall back to the full id.
    Ok(format!("{}-{}", base, id_str))
}

fn fts_body(tree: &ConversationTree) -> String {
    tree.insertion_order()
        .iter()
        .filter_map(|id| tree.message_map.get(id))
        .map(|m| m.content.get_text())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

impl Store {
    /// Upsert by id. Computes a slug if absent. `updated_at` is preserved
    /// from `tree.metadata` — the store does not stamp it unless the
    /// caller omitted one.
    pub fn save_conversation(&self, tree: &ConversationTree) -> CtkResult<Uuid> {
        self.with_transaction(|tx| {
            let existing_slug: Option<String> = tx
                .query_row(
                    "SELECT slug FROM conversations WHERE id = ?1",
                    params![tree.id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            let slug = match existing_slug {
                Some(s) => s,
                None => generate_unique_slug(tx, tree.id, tree.title.as_deref())?,
            };

            tx.execute(
                "INSERT INTO conversations (
                    id, title, slug, created_at, updated_at, source, model, project,
                    starred_at, pinned_at, archived_at, version, format, custom_data
                 ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14)
                 ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    slug = excluded.slug,
                    updated_at = excluded.updated_at,
                    source = excluded.source,
                    model = excluded.model,
                    project = excluded.project,
                    starred_at = excluded.starred_at,
                    pinned_at = excluded.pinned_at,
                    archived_at = excluded.archived_at,
                    version = excluded.version,
                    format = excluded.format,
                    custom_data = excluded.custom_data",
                params![
                    tree.id.to_string(),
                    tree.title,
                    slug,
                    tree.metadata.created_at.to_rfc3339(),
                    tree.metadata.updated_at.to_rfc3339(),
                    tree.metadata.source,
                    tree.metadata.model,
                    tree.metadata.project,
                    format_timestamp(tree.metadata.starred_at),
                    format_timestamp(tree.metadata.pinned_at),
                    format_timestamp(tree.metadata.archived_at),
                    tree.metadata.version,
                    tree.metadata.format,
                    serde_json::to_string(&tree.metadata.custom_data)?,
                ],
            )?;

            // Replace messages: delete-then-insert inside the same transaction.
            tx.execute(
                "DELETE FROM messages WHERE conversation_id = ?1",
                params![tree.id.to_string()],
            )?;
            for (seq, id) in tree.insertion_order().iter().enumerate() {
                let m = &tree.message_map[id];
                tx.execute(
                    "INSERT INTO messages (id, conversation_id, parent_id, role, content, timestamp, seq, metadata)
                     VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
                    params![
                        m.id.to_string(),
                        tree.id.to_string(),
                        m.parent_id.map(|p| p.to_string()),
                        m.role.as_str(),
                        message_content_json(&m.content)?,
                        format_timestamp(m.timestamp),
                        seq as i64,
                        metadata_json(&m.metadata)?,
                    ],
                )?;
            }

            // Tags: replace the tag set to match tree.metadata.tags.
            tx.execute(
                "DELETE FROM conversation_tags WHERE conv_id = ?1",
                params![tree.id.to_string()],
            )?;
            for tag in &tree.metadata.tags {
                tx.execute("INSERT OR IGNORE INTO tags (name) VALUES (?1)", params![tag])?;
                tx.execute(
                    "INSERT OR IGNORE INTO conversation_tags (conv_id, tag_name) VALUES (?1, ?2)",
                    params![tree.id.to_string(), tag],
                )?;
            }

            // FTS: transactional delete-then-insert keyed by conversation id.
            tx.execute(
                "DELETE FROM conversation_fts WHERE conv_id = ?1",
                params![tree.id.to_string()],
            )?;
            tx.execute(
                "INSERT INTO conversation_fts (conv_id, title, body) VALUES (?1, ?2, ?3)",
                params![tree.id.to_string(), tree.title.clone().unwrap_or_default(), fts_body(tree)],
            )?;

            debug!(id = %tree.id, "saved conversation");
            Ok(tree.id)
        })
    }

    pub fn load_conversation(&self, id: Uuid) -> CtkResult<Option<ConversationTree>> {
        let conn = self.lock();
        let conv_row = conn
            .query_row(
                "SELECT title, created_at, updated_at, source, model, project,
                        starred_at, pinned_at, archived_at, version, format, custom_data
                 FROM conversations WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, Option<String>>(6)?,
                        row.get::<_, Option<String>>(7)?,
                        row.get::<_, Option<String>>(8)?,
                        row.get::<_, String>(9)?,
                        row.get::<_, String>(10)?,
                        row.get::<_, String>(11)?,
                    ))
                },
            )
            .optional()?;

        let Some((title, created_at, updated_at, source, model, project, starred_at, pinned_at, archived_at, version, format, custom_data)) =
            conv_row
        else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT id, parent_id, role, content, timestamp, metadata FROM messages
             WHERE conversation_id = ?1 ORDER BY seq ASC",
        )?;
        let messages: Vec<Message> = stmt
            .query_map(params![id.to_string()], |row| message_from_row(row))?
            .collect::<Result<_, _>>()?;
        drop(stmt);

        let tags: Vec<String> = {
            let mut stmt = conn.prepare(
                "SELECT tag_name FROM conversation_tags WHERE conv_id = ?1 ORDER BY tag_name ASC",
            )?;
            stmt.query_map(params![id.to_string()], |row| row.get(0))?
                .collect::<Result<_, _>>()?
        };

        let updated_at_parsed = parse_timestamp(Some(updated_at)).unwrap_or_else(Utc::now);
        let mut tree = ConversationTree::new(title);
        tree.id = id;
        tree.metadata = ConversationMetadata {
            version,
            format,
            created_at: parse_timestamp(Some(created_at)).unwrap_or_else(Utc::now),
            updated_at: updated_at_parsed,
            source,
            model,
            tags,
            project,
            custom_data: serde_json::from_str(&custom_data).unwrap_or_default(),
            starred_at: parse_timestamp(starred_at),
            pinned_at: parse_timestamp(pinned_at),
            archived_at: parse_timestamp(archived_at),
        };
        for m in messages {
            tree.add_message(m);
        }
        // add_message stamps updated_at to now(); restore the persisted value.
        tree.metadata.updated_at = updated_at_parsed;

        Ok(Some(tree))
    }

    /// Removes the conversation, its messages, tag links, embeddings,
    /// similarities (both sides), and FTS row. Returns whether a row was
    /// actually removed.
    pub fn delete_conversation(&self, id: Uuid) -> CtkResult<bool> {
        self.with_transaction(|tx| {
            let id_str = id.to_string();
            tx.execute("DELETE FROM similarities WHERE a_id = ?1 OR b_id = ?1", params![id_str])?;
            tx.execute("DELETE FROM embeddings WHERE conversation_id = ?1", params![id_str])?;
            tx.execute("DELETE FROM conversation_tags WHERE conv_id = ?1", params![id_str])?;
            tx.execute("DELETE FROM conversation_fts WHERE conv_id = ?1", params![id_str])?;
            tx.execute("DELETE FROM messages WHERE conversation_id = ?1", params![id_str])?;
            let removed = tx.execute("DELETE FROM conversations WHERE id = ?1", params![id_str])?;
            Ok(removed > 0)
        })
    }

    /// Partial update of `{title, project, source, model, custom_data}`.
    /// Fields left `None` are left untouched.
    pub fn update_conversation_metadata(
        &self,
        id: Uuid,
        title: Option<String>,
        project: Option<String>,
        source: Option<String>,
        model: Option<String>,
    ) -> CtkResult<bool> {
        self.with_transaction(|tx| {
            let now = Utc::now().to_rfc3339();
            let updated = tx.execute(
                "UPDATE conversations SET
                    title = COALESCE(?2, title),
                    project = COALESCE(?3, project),
                    source = COALESCE(?4, source),
                    model = COALESCE(?5, model),
                    updated_at = ?6
                 WHERE id = ?1",
                params![id.to_string(), title, project, source, model, now],
            )?;
            if updated > 0 {
                // Title feeds the FTS row; refresh it if it changed.
                if let Some(new_title) = &title {
                    tx.execute(
                        "UPDATE conversation_fts SET title = ?2 WHERE conv_id = ?1",
                        params![id.to_string(), new_title],
                    )?;
                }
            }
            Ok(updated > 0)
        })
    }

    fn set_organization_flag(&self, id: Uuid, column: &str, value: bool) -> CtkResult<bool> {
        let now = Utc::now().to_rfc3339();
        let sql = format!(
            "UPDATE conversations SET {column} = ?2, updated_at = ?3 WHERE id = ?1",
            column = column
        );
        let conn = self.lock();
        let updated = conn.execute(
            &sql,
            params![id.to_string(), if value { Some(now.clone()) } else { None }, now],
        )?;
        Ok(updated > 0)
    }

    pub fn star_conversation(&self, id: Uuid, starred: bool) -> CtkResult<bool> {
        self.set_organization_flag(id, "starred_at", starred)
    }

    pub fn pin_conversation(&self, id: Uuid, pinned: bool) -> CtkResult<bool> {
        self.set_organization_flag(id, "pinned_at", pinned)
    }

    pub fn archive_conversation(&self, id: Uuid, archived: bool) -> CtkResult<bool> {
        self.set_organization_flag(id, "archived_at", archived)
    }

    /// Clones a tree with new UUIDs for the conversation and every
    /// message (preserving `parent_id` mapping via a translation table),
    /// appends `" (copy)"` to the title, and resets organization flags.
    pub fn duplicate_conversation(&self, id: Uuid) -> CtkResult<Option<Uuid>> {
        let Some(original) = self.load_conversation(id)? else {
            return Ok(None);
        };

        let new_id = Uuid::new_v4();
        let mut id_map: HashMap<Uuid, Uuid> = HashMap::new();
        for old_id in original.message_map.keys() {
            id_map.insert(*old_id, Uuid::new_v4());
        }

        let mut copy = ConversationTree::new(Some(format!(
            "{} (copy)",
            original.title.clone().unwrap_or_default()
        )));
        copy.id = new_id;
        copy.metadata = ConversationMetadata {
            starred_at: None,
            pinned_at: None,
            archived_at: None,
            ..original.metadata.clone()
        };

        // Preserve the original insertion order so parents are always
        // translated before their children are inserted, even though
        // `add_message` does not require it.
        for &old_id in original.insertion_order() {
            let m = &original.message_map[&old_id];
            let mut translated = m.clone();
            translated.id = id_map[&old_id];
            translated.parent_id = m.parent_id.and_then(|p| id_map.get(&p).copied());
            copy.add_message(translated);
        }
        // `add_message` stamps `updated_at` to now(), but duplication
        // preserves metadata except organization flags, so restore the
        // original timestamps after the copy loop.
        copy.metadata.created_at = original.metadata.created_at;
        copy.metadata.updated_at = original.metadata.updated_at;

        self.save_conversation(&copy)?;
        Ok(Some(new_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctk_core::message::{Message, MessageRole};
    use ctk_core::content::MessageContent;

    /// Messages are added out of UUID order; a save/load round trip must
    /// come back in the order they were actually added, not sorted by id.
    #[test]
    fn save_load_round_trip_preserves_insertion_order() {
        let store = Store::open_in_memory().unwrap();
        let mut tree = ConversationTree::new(Some("ordering".into()));
        let texts = ["first", "second", "third", "fourth"];
        for t in texts {
            tree.add_message(Message::new(MessageRole::User, MessageContent::from_text(t)));
        }
        let expected_order: Vec<_> = tree.insertion_order().to_vec();

        let id = store.save_conversation(&tree).unwrap();
        let loaded = store.load_conversation(id).unwrap().unwrap();

        assert_eq!(loaded.insertion_order(), expected_order.as_slice());
        let loaded_texts: Vec<_> = loaded
            .insertion_order()
            .iter()
            .map(|mid| loaded.message_map[mid].content.get_text())
            .collect();
        assert_eq!(loaded_texts, texts);
    }
}
