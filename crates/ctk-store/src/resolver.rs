//! Identifier resolver. Resolves short/partial ids or slugs to a
//! canonical id using indexed lookups only — never loads a conversation
//! to disambiguate.

use ctk_core::constants::AMBIGUITY_CHECK_LIMIT;
use ctk_error::CtkResult;
use rusqlite::params;
use uuid::Uuid;

use crate::Store;

impl Store {
    /// Resolution order: exact slug, exact id, unique slug prefix, unique
    /// id prefix. Returns `None` on no match OR on ambiguity — callers
    /// that need to distinguish "not found" from "ambiguous" should use
    /// [`Store::resolve_identifier_checked`].
    pub fn resolve_identifier(&self, input: &str) -> CtkResult<Option<(Uuid, String)>> {
        match self.resolve_identifier_checked(input)? {
            Resolution::Found(id, slug) => Ok(Some((id, slug))),
            _ => Ok(None),
        }
    }

    pub fn resolve_identifier_checked(&self, input: &str) -> CtkResult<Resolution> {
        let conn = self.lock();

        // 1. exact slug
        if let Some(row) = conn
            .query_row(
                "SELECT id, slug FROM conversations WHERE slug = ?1",
                params![input],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .ok()
        {
            let (id, slug) = row;
            if let Ok(uuid) = Uuid::parse_str(&id) {
                return Ok(Resolution::Found(uuid, slug));
            }
        }

        // 2. exact id
        if let Ok(uuid) = Uuid::parse_str(input) {
            if let Some(slug) = conn
                .query_row(
                    "SELECT slug FROM conversations WHERE id = ?1",
                    params![uuid.to_string()],
                    |row| row.get::<_, String>(0),
                )
                .ok()
            {
                return Ok(Resolution::Found(uuid, slug));
            }
        }

        // 3. unique slug prefix
        let mut stmt = conn.prepare(
            "SELECT id, slug FROM conversations WHERE slug GLOB ?1 LIMIT ?2",
        )?;
        let glob = format!("{}*", input);
        let matches: Vec<(String, String)> = stmt
            .query_map(params![glob, AMBIGUITY_CHECK_LIMIT as i64], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?
            .collect::<Result<_, _>>()?;
        drop(stmt);
        if matches.len() == 1 {
            let (id, slug) = &matches[0];
            if let Ok(uuid) = Uuid::parse_str(id) {
                return Ok(Resolution::Found(uuid, slug.clone()));
            }
        } else if matches.len() >= AMBIGUITY_CHECK_LIMIT {
            return Ok(Resolution::Ambiguous);
        }

        // 4. unique id prefix
        let mut stmt = conn.prepare(
            "SELECT id, slug FROM conversations WHERE id GLOB ?1 LIMIT ?2",
        )?;
        let glob = format!("{}*", input);
        let matches: Vec<(String, String)> = stmt
            .query_map(params![glob, AMBIGUITY_CHECK_LIMIT as i64], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?
            .collect::<Result<_, _>>()?;
        drop(stmt);
        if matches.len() == 1 {
            let (id, slug) = &matches[0];
            if let Ok(uuid) = Uuid::parse_str(id) {
                return Ok(Resolution::Found(uuid, slug.clone()));
            }
        } else if matches.len() >= AMBIGUITY_CHECK_LIMIT {
            return Ok(Resolution::Ambiguous);
        }

        Ok(Resolution::NotFound)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(Uuid, String),
    Ambiguous,
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctk_core::conversation::ConversationTree;

    fn make(store: &Store, title: &str) -> Uuid {
        let tree = ConversationTree::new(Some(title.to_string()));
        store.save_conversation(&tree).unwrap()
    }

    #[test]
    fn resolves_exact_and_prefix_ids_without_ambiguity() {
        let store = Store::open_in_memory().unwrap();
        let id = make(&store, "hello world");
        let full = id.to_string();
        let prefix = &full[..8];

        let (resolved, _) = store.resolve_identifier(&full).unwrap().unwrap();
        assert_eq!(resolved, id);

        let (resolved, _) = store.resolve_identifier(prefix).unwrap().unwrap();
        assert_eq!(resolved, id);
    }

    #[test]
    fn resolver_idempotence() {
        let store = Store::open_in_memory().unwrap();
        let id = make(&store, "idempotent");
        let (resolved, _) = store.resolve_identifier(&id.to_string()).unwrap().unwrap();
        let (resolved_again, _) = store.resolve_identifier(&resolved.to_string()).unwrap().unwrap();
        assert_eq!(resolved, resolved_again);
    }

    #[test]
    fn ambiguous_prefix_returns_none() {
        let store = Store::open_in_memory().unwrap();
        // Force two ids sharing a short common prefix by looping until we
        // get a collision is impractical; instead assert the Ambiguous
        // branch directly using two manually inserted rows sharing a slug
        // prefix.
        let a = make(&store, "alpha");
        let b = make(&store, "alpha");
        let shared_prefix = {
            let conn = store.lock();
            let slug_a: String = conn
                .query_row("SELECT slug FROM conversations WHERE id = ?1", params![a.to_string()], |r| r.get(0))
                .unwrap();
            slug_a.split('-').next().unwrap().to_string()
        };
        let resolution = store.resolve_identifier_checked(&shared_prefix).unwrap();
        assert_eq!(resolution, Resolution::Ambiguous);
        let _ = b;
    }
}
