//! Aggregate statistics, model/source listings, and conversation
//! timeline, plus the branch-ratio/average-message-count supplement to
//! `get_statistics`.

use ctk_core::constants::DEFAULT_TIMELINE_LIMIT;
use ctk_error::{CtkError, CtkResult};
use serde::{Deserialize, Serialize};

use crate::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineGranularity {
    Day,
    Week,
    Month,
}

impl TimelineGranularity {
    fn strftime_format(&self) -> &'static str {
        match self {
            TimelineGranularity::Day => "%Y-%m-%d",
            TimelineGranularity::Week => "%Y-W%W",
            TimelineGranularity::Month => "%Y-%m",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStatistics {
    pub total_conversations: i64,
    pub total_messages: i64,
    pub avg_messages_per_conversation: f64,
    pub total_branches: i64,
    pub branch_ratio: f64,
    pub starred_count: i64,
    pub pinned_count: i64,
    pub archived_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineBucket {
    pub bucket: String,
    pub count: i64,
}

impl Store {
    pub fn get_statistics(&self) -> CtkResult<StoreStatistics> {
        let conn = self.lock();
        let total_conversations: i64 =
            conn.query_row("SELECT COUNT(*) FROM conversations", [], |r| r.get(0))?;
        let total_messages: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |r| r.get(0))?;
        let starred_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM conversations WHERE starred_at IS NOT NULL",
            [],
            |r| r.get(0),
        )?;
        let pinned_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM conversations WHERE pinned_at IS NOT NULL",
            [],
            |r| r.get(0),
        )?;
        let archived_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM conversations WHERE archived_at IS NOT NULL",
            [],
            |r| r.get(0),
        )?;

        // Branch count (messages with >=2 children) computed directly in
        // SQL rather than loading every tree into memory.
        let total_branches: i64 = conn.query_row(
            "SELECT COUNT(*) FROM (
                SELECT parent_id FROM messages
                WHERE parent_id IS NOT NULL
                GROUP BY parent_id
                HAVING COUNT(*) >= 2
             )",
            [],
            |r| r.get(0),
        )?;

        let avg_messages_per_conversation = if total_conversations > 0 {
            total_messages as f64 / total_conversations as f64
        } else {
            0.0
        };
        let branch_ratio = if total_conversations > 0 {
            total_branches as f64 / total_conversations as f64
        } else {
            0.0
        };

        Ok(StoreStatistics {
            total_conversations,
            total_messages,
            avg_messages_per_conversation,
            total_branches,
            branch_ratio,
            starred_count,
            pinned_count,
            archived_count,
        })
    }

    pub fn get_models(&self) -> CtkResult<Vec<String>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT model FROM conversations WHERE model IS NOT NULL ORDER BY model ASC",
        )?;
        let rows = stmt.query_map([], |r| r.get(0))?.collect::<Result<_, _>>()?;
        Ok(rows)
    }

    pub fn get_sources(&self) -> CtkResult<Vec<String>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT source FROM conversations WHERE source IS NOT NULL ORDER BY source ASC",
        )?;
        let rows = stmt.query_map([], |r| r.get(0))?.collect::<Result<_, _>>()?;
        Ok(rows)
    }

    pub fn get_conversation_timeline(
        &self,
        granularity: TimelineGranularity,
        limit: Option<usize>,
    ) -> CtkResult<Vec<TimelineBucket>> {
        let limit = limit.unwrap_or(DEFAULT_TIMELINE_LIMIT);
        let fmt = granularity.strftime_format();
        let conn = self.lock();
        let sql = format!(
            "SELECT strftime('{fmt}', created_at) AS bucket, COUNT(*) AS count
             FROM conversations
             GROUP BY bucket
             ORDER BY bucket DESC
             LIMIT ?1"
        );
        let mut stmt = conn.prepare(&sql).map_err(CtkError::from)?;
        let rows = stmt
            .query_map([limit as i64], |row| {
                Ok(TimelineBucket {
                    bucket: row.get(0)?,
                    count: row.get(1)?,
                })
            })?
            .collect::<Result<_, _>>()?;
        Ok(rows)
    }
}
