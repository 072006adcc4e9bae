//! `list_conversations` / `search_conversations`.
//!
//! Ordering is always pinned-first, then starred, then `updated_at`
//! descending, with id ascending as the final tiebreak so cursors are
//! stable. Cursor pagination is real keyset pagination (not `OFFSET`)
//! precisely so that property holds under concurrent inserts.

use ctk_core::constants::MAX_RESULT_LIMIT;
use ctk_core::conversation::ConversationSummary;
use ctk_core::pagination::{Cursor, Paginated};
use ctk_error::{CtkError, CtkResult, ValidationError};
use rusqlite::types::ToSqlOutput;
use rusqlite::ToSql;
use uuid::Uuid;

use crate::rows::parse_timestamp;
use crate::Store;

/// A limit/page size of zero or less is rejected rather than silently
/// treated as "unlimited" — the caller asked for nothing, that's a
/// validation error, not a shortcut around `MAX_RESULT_LIMIT`.
fn validate_page_bound(value: i64, name: &str) -> CtkResult<()> {
    if value < 1 || value > MAX_RESULT_LIMIT {
        return Err(CtkError::Validation(ValidationError::OutOfRange {
            field: name.to_string(),
            min: "1".to_string(),
            max: MAX_RESULT_LIMIT.to_string(),
            actual: value.to_string(),
        }));
    }
    Ok(())
}

fn validate_pagination(pagination: &Pagination) -> CtkResult<()> {
    match pagination {
        Pagination::LimitOffset { limit, .. } => validate_page_bound(*limit, "limit"),
        Pagination::Cursor { page_size, .. } => validate_page_bound(*page_size, "page_size"),
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListFilters {
    pub source: Option<String>,
    pub model: Option<String>,
    pub project: Option<String>,
    pub tag: Option<String>,
    pub tags: Option<Vec<String>>,
    pub starred: Option<bool>,
    pub pinned: Option<bool>,
    pub archived: Option<bool>,
    pub include_archived: bool,
}

#[derive(Debug, Clone, Copy)]
pub enum Pagination<'a> {
    LimitOffset { limit: i64, offset: i64 },
    Cursor { cursor: Option<&'a str>, page_size: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderBy {
    CreatedAt,
    #[default]
    UpdatedAt,
    Title,
    Relevance,
}

#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub query_text: Option<String>,
    pub title_only: bool,
    pub content_only: bool,
    pub date_from: Option<chrono::DateTime<chrono::Utc>>,
    pub date_to: Option<chrono::DateTime<chrono::Utc>>,
    pub min_messages: Option<i64>,
    pub max_messages: Option<i64>,
    pub has_branches: Option<bool>,
    pub filters: ListFilters,
    pub order_by: OrderBy,
    pub ascending: bool,
}

/// A small helper so filter clauses can own their bound values without
/// fighting rusqlite's lifetime-bound `ToSql` trait.
#[derive(Clone)]
enum Bound {
    Text(String),
    Int(i64),
}

impl ToSql for Bound {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Bound::Text(s) => s.to_sql(),
            Bound::Int(i) => i.to_sql(),
        }
    }
}

fn push_common_filters(filters: &ListFilters, clauses: &mut Vec<String>, binds: &mut Vec<Bound>) {
    if let Some(source) = &filters.source {
        clauses.push("source = ?".to_string());
        binds.push(Bound::Text(source.clone()));
    }
    if let Some(model) = &filters.model {
        clauses.push("model = ?".to_string());
        binds.push(Bound::Text(model.clone()));
    }
    if let Some(project) = &filters.project {
        clauses.push("project = ?".to_string());
        binds.push(Bound::Text(project.clone()));
    }
    if let Some(tag) = &filters.tag {
        clauses.push(
            "id IN (SELECT conv_id FROM conversation_tags WHERE tag_name = ?)".to_string(),
        );
        binds.push(Bound::Text(tag.clone()));
    }
    if let Some(tags) = &filters.tags {
        if !tags.is_empty() {
            let placeholders = tags.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            clauses.push(format!(
                "id IN (SELECT conv_id FROM conversation_tags WHERE tag_name IN ({placeholders}))"
            ));
            for t in tags {
                binds.push(Bound::Text(t.clone()));
            }
        }
    }
    if let Some(starred) = filters.starred {
        clauses.push(if starred {
            "starred_at IS NOT NULL".to_string()
        } else {
            "starred_at IS NULL".to_string()
        });
    }
    if let Some(pinned) = filters.pinned {
        clauses.push(if pinned {
            "pinned_at IS NOT NULL".to_string()
        } else {
            "pinned_at IS NULL".to_string()
        });
    }
    match filters.archived {
        Some(true) => clauses.push("archived_at IS NOT NULL".to_string()),
        Some(false) => clauses.push("archived_at IS NULL".to_string()),
        None => {
            if !filters.include_archived {
                clauses.push("archived_at IS NULL".to_string());
            }
        }
    }
}

fn summary_from_row(row: &rusqlite::Row) -> rusqlite::Result<ConversationSummary> {
    let id: String = row.get("id")?;
    let title: Option<String> = row.get("title")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let source: Option<String> = row.get("source")?;
    let model: Option<String> = row.get("model")?;
    let project: Option<String> = row.get("project")?;
    let starred_at: Option<String> = row.get("starred_at")?;
    let pinned_at: Option<String> = row.get("pinned_at")?;
    let archived_at: Option<String> = row.get("archived_at")?;
    let message_count: i64 = row.get("message_count")?;
    Ok(ConversationSummary {
        id: Uuid::parse_str(&id).unwrap_or_else(|_| Uuid::nil()),
        title,
        created_at: parse_timestamp(Some(created_at)).unwrap_or_else(chrono::Utc::now),
        updated_at: parse_timestamp(Some(updated_at)).unwrap_or_else(chrono::Utc::now),
        message_count: message_count.max(0) as usize,
        source,
        model,
        tags: Vec::new(),
        project,
        starred_at: parse_timestamp(starred_at),
        pinned_at: parse_timestamp(pinned_at),
        archived_at: parse_timestamp(archived_at),
    })
}

const ORDER_SQL: &str = "
    (CASE WHEN pinned_at IS NULL THEN 1 ELSE 0 END) ASC,
    (CASE WHEN starred_at IS NULL THEN 1 ELSE 0 END) ASC,
    updated_at DESC,
    id ASC
";

fn keyset_predicate(cursor: &Cursor) -> Result<(String, Vec<Bound>), ValidationError> {
    let mut parts = cursor.sort_key.splitn(3, '|');
    let pinned_rank: i64 = parts
        .next()
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| ValidationError::InvalidCursor {
            field: "cursor".to_string(),
        })?;
    let starred_rank: i64 = parts
        .next()
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| ValidationError::InvalidCursor {
            field: "cursor".to_string(),
        })?;
    let updated_at = parts
        .next()
        .ok_or_else(|| ValidationError::InvalidCursor {
            field: "cursor".to_string(),
        })?
        .to_string();

    let pr = "(CASE WHEN pinned_at IS NULL THEN 1 ELSE 0 END)";
    let sr = "(CASE WHEN starred_at IS NULL THEN 1 ELSE 0 END)";
    let sql = format!(
        "({pr} > ?) OR ({pr} = ? AND {sr} > ?) OR ({pr} = ? AND {sr} = ? AND updated_at < ?) OR ({pr} = ? AND {sr} = ? AND updated_at = ? AND id > ?)"
    );
    let binds = vec![
        Bound::Int(pinned_rank),
        Bound::Int(pinned_rank),
        Bound::Int(starred_rank),
        Bound::Int(pinned_rank),
        Bound::Int(starred_rank),
        Bound::Text(updated_at.clone()),
        Bound::Int(pinned_rank),
        Bound::Int(starred_rank),
        Bound::Text(updated_at),
        Bound::Text(cursor.id.clone()),
    ];
    Ok((sql, binds))
}

fn row_cursor(pinned_at: &Option<String>, starred_at: &Option<String>, updated_at: &str, id: &str) -> Cursor {
    let pinned_rank = if pinned_at.is_some() { 0 } else { 1 };
    let starred_rank = if starred_at.is_some() { 0 } else { 1 };
    Cursor {
        sort_key: format!("{pinned_rank}|{starred_rank}|{updated_at}"),
        id: id.to_string(),
    }
}

impl Store {
    pub fn list_conversations(
        &self,
        filters: &ListFilters,
        pagination: Pagination,
    ) -> CtkResult<Paginated<ConversationSummary>> {
        validate_pagination(&pagination)?;
        let mut clauses: Vec<String> = Vec::new();
        let mut binds: Vec<Bound> = Vec::new();
        push_common_filters(filters, &mut clauses, &mut binds);

        let (fetch_limit, offset, cursor_bind): (i64, i64, Option<(String, Vec<Bound>)>) =
            match pagination {
                Pagination::LimitOffset { limit, offset } => (limit, offset, None),
                Pagination::Cursor { cursor, page_size } => {
                    let kp = match cursor {
                        Some(c) => {
                            let decoded = Cursor::decode("cursor", c)?;
                            Some(keyset_predicate(&decoded)?)
                        }
                        None => None,
                    };
                    (page_size, 0, kp)
                }
            };

        if let Some((sql, kbinds)) = &cursor_bind {
            clauses.push(format!("({sql})"));
            binds.extend(kbinds.clone());
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let sql = format!(
            "SELECT c.id, c.title, c.created_at, c.updated_at, c.source, c.model, c.project,
                    c.starred_at, c.pinned_at, c.archived_at,
                    (SELECT COUNT(*) FROM messages m WHERE m.conversation_id = c.id) AS message_count
             FROM conversations c
             {where_sql}
             ORDER BY {ORDER_SQL}
             LIMIT ? OFFSET ?"
        );

        binds.push(Bound::Int(fetch_limit + 1));
        binds.push(Bound::Int(offset));

        let conn = self.lock();
        let mut stmt = conn.prepare(&sql)?;
        let mut rows: Vec<(ConversationSummary, Option<String>, Option<String>, String)> = stmt
            .query_map(rusqlite::params_from_iter(binds.iter().map(|b| b as &dyn ToSql)), |row| {
                let summary = summary_from_row(row)?;
                let pinned_at: Option<String> = row.get("pinned_at")?;
                let starred_at: Option<String> = row.get("starred_at")?;
                let updated_at: String = row.get("updated_at")?;
                Ok((summary, pinned_at, starred_at, updated_at))
            })?
            .collect::<Result<_, _>>()?;
        drop(stmt);

        let has_more = rows.len() as i64 > fetch_limit;
        if has_more {
            rows.truncate(fetch_limit as usize);
        }

        let next_cursor = if has_more {
            rows.last().map(|(summary, pinned_at, starred_at, updated_at)| {
                row_cursor(pinned_at, starred_at, updated_at, &summary.id.to_string()).encode()
            })
        } else {
            None
        };

        let mut items: Vec<ConversationSummary> = Vec::with_capacity(rows.len());
        for (mut summary, _, _, _) in rows {
            summary.tags = self.tags_for(summary.id)?;
            items.push(summary);
        }

        Ok(Paginated {
            items,
            next_cursor,
            has_more,
        })
    }

    fn tags_for(&self, id: Uuid) -> CtkResult<Vec<String>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare("SELECT tag_name FROM conversation_tags WHERE conv_id = ?1 ORDER BY tag_name ASC")?;
        let tags = stmt
            .query_map(rusqlite::params![id.to_string()], |row| row.get(0))?
            .collect::<Result<_, _>>()?;
        Ok(tags)
    }

    /// `query_text = None` behaves like `list_conversations` with the same
    /// filters. Candidate ids are fetched from FTS within
    /// `DEFAULT_SEARCH_LIMIT`; structural post-filters then operate within
    /// that budget plus `SEARCH_BUFFER`.
    pub fn search_conversations(
        &self,
        params: &SearchParams,
        pagination: Pagination,
    ) -> CtkResult<Paginated<ConversationSummary>> {
        validate_pagination(&pagination)?;
        if let Some(q) = &params.query_text {
            if q.chars().count() > ctk_core::constants::MAX_QUERY_LENGTH {
                return Err(CtkError::Validation(ValidationError::TooLong {
                    field: "query_text".to_string(),
                    max: ctk_core::constants::MAX_QUERY_LENGTH,
                    actual: q.chars().count(),
                }));
            }
        }

        let Some(query_text) = params.query_text.as_ref().filter(|q| !q.is_empty()) else {
            return self.list_conversations(&params.filters, pagination);
        };

        let title_only = params.title_only && !params.content_only;
        let content_only = params.content_only && !params.title_only;

        let fts_query = escape_fts_query(query_text);
        let budget = ctk_core::constants::DEFAULT_SEARCH_LIMIT + ctk_core::constants::SEARCH_BUFFER;

        // FTS5 allows at most one MATCH operator per virtual table per
        // query, so a search over "both" columns runs as two separate
        // column-filtered queries (title, body) that are merged below
        // rather than one query with two MATCH clauses.
        let base_select = "SELECT c.id, c.title, c.created_at, c.updated_at, c.source, c.model, c.project,
                    c.starred_at, c.pinned_at, c.archived_at,
                    (SELECT COUNT(*) FROM messages m WHERE m.conversation_id = c.id) AS message_count,
                    bm25(f) AS rank
             FROM conversation_fts f
             JOIN conversations c ON c.id = f.conv_id
             WHERE {col} MATCH ?1
             LIMIT ?2";

        let run = |col: &str, conn: &rusqlite::Connection| -> CtkResult<Vec<(ConversationSummary, f64)>> {
            let sql = base_select.replace("{col}", col);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![fts_query, budget as i64], |row| {
                    let summary = summary_from_row(row)?;
                    let bm25: f64 = row.get("rank")?;
                    Ok((summary, -bm25))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        };

        let conn = self.lock();
        let mut merged: std::collections::HashMap<Uuid, (ConversationSummary, f64)> = std::collections::HashMap::new();
        if !content_only {
            for (summary, score) in run("f.title", &conn)? {
                let boosted = score * ctk_core::constants::TITLE_MATCH_BOOST;
                merged
                    .entry(summary.id)
                    .and_modify(|(_, s)| *s = s.max(boosted))
                    .or_insert((summary, boosted));
            }
        }
        if !title_only {
            for (summary, score) in run("f.body", &conn)? {
                merged
                    .entry(summary.id)
                    .and_modify(|(_, s)| *s = s.max(score))
                    .or_insert((summary, score));
            }
        }
        drop(conn);
        let candidates: Vec<(ConversationSummary, f64)> = merged.into_values().collect();

        // Structural post-filters, applied within the fetched budget.
        let mut filtered: Vec<(ConversationSummary, f64)> = candidates
            .into_iter()
            .filter(|(s, _)| self.passes_structural_filters(s, params))
            .filter(|(s, _)| self.passes_common_filters(s.id, &params.filters))
            .collect();
        match params.order_by {
            OrderBy::Relevance => {
                // Scores come off a HashMap merge (no stable source order), so a
                // bare score comparison would let tied rows swap places between
                // calls; break ties by id ascending, the same tiebreak
                // `list_conversations` uses, so the order (and cursor paging
                // over it) is deterministic.
                filtered.sort_by(|a, b| {
                    b.1.partial_cmp(&a.1)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| a.0.id.cmp(&b.0.id))
                });
            }
            OrderBy::CreatedAt => filtered.sort_by_key(|(s, _)| s.created_at),
            OrderBy::UpdatedAt => filtered.sort_by_key(|(s, _)| s.updated_at),
            OrderBy::Title => filtered.sort_by(|a, b| a.0.title.cmp(&b.0.title)),
        }
        if !params.ascending && params.order_by != OrderBy::Relevance {
            filtered.reverse();
        }

        // The candidate set is already fully materialized and sorted in
        // memory (it is bounded by DEFAULT_SEARCH_LIMIT + SEARCH_BUFFER),
        // so cursor pagination here is just an opaque offset rather than
        // the keyset scheme `list_conversations` uses against the live
        // table — still opaque to the caller.
        let (limit, offset, cursor_mode) = match pagination {
            Pagination::LimitOffset { limit, offset } => (limit, offset, false),
            Pagination::Cursor { cursor, page_size } => {
                let offset = match cursor {
                    Some(c) => Cursor::decode("cursor", c)?.id.parse::<i64>().unwrap_or(0),
                    None => 0,
                };
                (page_size, offset, true)
            }
        };
        let total = filtered.len() as i64;
        let start = offset.clamp(0, total) as usize;
        let end = ((offset + limit).clamp(0, total)) as usize;
        let has_more = (offset + limit) < total;

        let mut items = Vec::new();
        for (mut summary, _) in filtered.into_iter().skip(start).take(end.saturating_sub(start)) {
            summary.tags = self.tags_for(summary.id)?;
            items.push(summary);
        }

        let next_cursor = if has_more && cursor_mode {
            Some(
                Cursor {
                    sort_key: String::new(),
                    id: (offset + limit).to_string(),
                }
                .encode(),
            )
        } else {
            None
        };

        Ok(Paginated {
            items,
            next_cursor,
            has_more,
        })
    }

    fn passes_structural_filters(&self, s: &ConversationSummary, params: &SearchParams) -> bool {
        if let Some(min) = params.min_messages {
            if (s.message_count as i64) < min {
                return false;
            }
        }
        if let Some(max) = params.max_messages {
            if (s.message_count as i64) > max {
                return false;
            }
        }
        if let Some(from) = params.date_from {
            if s.created_at < from {
                return false;
            }
        }
        if let Some(to) = params.date_to {
            if s.created_at > to {
                return false;
            }
        }
        if let Some(want_branches) = params.has_branches {
            let has = self
                .load_conversation(s.id)
                .ok()
                .flatten()
                .map(|t| t.count_branches() > 0)
                .unwrap_or(false);
            if has != want_branches {
                return false;
            }
        }
        true
    }

    fn passes_common_filters(&self, id: Uuid, filters: &ListFilters) -> bool {
        let conn = self.lock();
        let mut clauses: Vec<String> = vec!["id = ?".to_string()];
        let mut binds: Vec<Bound> = vec![Bound::Text(id.to_string())];
        push_common_filters(filters, &mut clauses, &mut binds);
        let sql = format!(
            "SELECT 1 FROM conversations WHERE {}",
            clauses.join(" AND ")
        );
        conn.query_row(
            &sql,
            rusqlite::params_from_iter(binds.iter().map(|b| b as &dyn ToSql)),
            |_| Ok(()),
        )
        .is_ok()
    }
}

/// Escapes an FTS5 MATCH query so raw user text can't inject query syntax
/// (`AND`/`OR`/`NOT`/column filters). Wrapping each token in double quotes
/// makes FTS5 treat it as a literal phrase token.
fn escape_fts_query(text: &str) -> String {
    text.split_whitespace()
        .map(|tok| format!("\"{}\"", tok.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Store;

    #[test]
    fn zero_or_negative_limit_is_rejected_not_treated_as_unlimited() {
        let store = Store::open_in_memory().unwrap();
        let filters = ListFilters::default();

        let err = store
            .list_conversations(&filters, Pagination::LimitOffset { limit: 0, offset: 0 })
            .unwrap_err();
        assert!(err.is_caller_error());

        let err = store
            .list_conversations(&filters, Pagination::LimitOffset { limit: -5, offset: 0 })
            .unwrap_err();
        assert!(err.is_caller_error());
    }

    #[test]
    fn limit_above_max_result_limit_is_rejected() {
        let store = Store::open_in_memory().unwrap();
        let filters = ListFilters::default();
        let err = store
            .list_conversations(
                &filters,
                Pagination::LimitOffset { limit: MAX_RESULT_LIMIT + 1, offset: 0 },
            )
            .unwrap_err();
        assert!(err.is_caller_error());
    }

    #[test]
    fn zero_page_size_is_rejected_for_cursor_pagination() {
        let store = Store::open_in_memory().unwrap();
        let filters = ListFilters::default();
        let err = store
            .list_conversations(&filters, Pagination::Cursor { cursor: None, page_size: 0 })
            .unwrap_err();
        assert!(err.is_caller_error());
    }
}
