//! Tag operations: many-to-many relation maintained inside the store.

use ctk_error::CtkResult;
use rusqlite::params;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Store;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagUsage {
    pub name: String,
    pub usage_count: Option<i64>,
}

impl Store {
    /// De-duplicates against the conversation's existing tag set.
    pub fn add_tags(&self, id: Uuid, names: &[String]) -> CtkResult<()> {
        self.with_transaction(|tx| {
            for name in names {
                tx.execute("INSERT OR IGNORE INTO tags (name) VALUES (?1)", params![name])?;
                tx.execute(
                    "INSERT OR IGNORE INTO conversation_tags (conv_id, tag_name) VALUES (?1, ?2)",
                    params![id.to_string(), name],
                )?;
            }
            Ok(())
        })
    }

    pub fn remove_tag(&self, id: Uuid, name: &str) -> CtkResult<bool> {
        let conn = self.lock();
        let removed = conn.execute(
            "DELETE FROM conversation_tags WHERE conv_id = ?1 AND tag_name = ?2",
            params![id.to_string(), name],
        )?;
        Ok(removed > 0)
    }

    /// Tag list, optionally with usage counts, always computed via an
    /// aggregation query, never in-memory traversal.
    pub fn get_all_tags(&self, with_counts: bool) -> CtkResult<Vec<TagUsage>> {
        let conn = self.lock();
        if with_counts {
            let mut stmt = conn.prepare(
                "SELECT t.name, COUNT(ct.conv_id) AS usage_count
                 FROM tags t
                 LEFT JOIN conversation_tags ct ON ct.tag_name = t.name
                 GROUP BY t.name
                 ORDER BY usage_count DESC, t.name ASC",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(TagUsage {
                        name: row.get(0)?,
                        usage_count: Some(row.get(1)?),
                    })
                })?
                .collect::<Result<_, _>>()?;
            Ok(rows)
        } else {
            let mut stmt = conn.prepare("SELECT name FROM tags ORDER BY name ASC")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(TagUsage {
                        name: row.get(0)?,
                        usage_count: None,
                    })
                })?
                .collect::<Result<_, _>>()?;
            Ok(rows)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctk_core::conversation::ConversationTree;

    #[test]
    fn add_tags_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        let tree = ConversationTree::new(Some("t".into()));
        let id = store.save_conversation(&tree).unwrap();

        store.add_tags(id, &["rust".to_string(), "llm".to_string()]).unwrap();
        store.add_tags(id, &["rust".to_string(), "llm".to_string()]).unwrap();

        let tags = store.get_all_tags(true).unwrap();
        let rust = tags.iter().find(|t| t.name == "rust").unwrap();
        assert_eq!(rust.usage_count, Some(1));
    }

    #[test]
    fn remove_tag_reports_whether_it_existed() {
        let store = Store::open_in_memory().unwrap();
        let tree = ConversationTree::new(Some("t".into()));
        let id = store.save_conversation(&tree).unwrap();
        store.add_tags(id, &["rust".to_string()]).unwrap();

        assert!(store.remove_tag(id, "rust").unwrap());
        assert!(!store.remove_tag(id, "rust").unwrap());
    }
}
