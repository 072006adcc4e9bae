//! Embedding and similarity cache tables, written and read by
//! `ctk-embed` / `ctk-similarity` through the store rather than owning
//! their own persistence.

use chrono::{DateTime, Utc};
use ctk_error::CtkResult;
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::rows::parse_timestamp;
use crate::Store;

#[derive(Debug, Clone)]
pub struct EmbeddingRecord {
    pub conversation_id: Uuid,
    pub provider: String,
    pub model: Option<String>,
    pub chunking: String,
    pub aggregation: String,
    pub vector: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub config_hash: String,
}

#[derive(Debug, Clone)]
pub struct SimilarityRecord {
    pub a_id: Uuid,
    pub b_id: Uuid,
    pub metric: String,
    pub provider: String,
    pub similarity: f64,
    pub computed_at: DateTime<Utc>,
}

fn vector_to_blob(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn blob_to_vector(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

impl Store {
    /// Unique key is `(conversation_id, provider, model, chunking,
    /// aggregation)`; recomputation upserts. `config_hash` is the full
    /// `ConversationEmbeddingConfig::to_hash()`, keyed on the full hash
    /// rather than just provider/model.
    pub fn save_embedding(&self, record: &EmbeddingRecord) -> CtkResult<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO embeddings (
                conversation_id, provider, model, chunking, aggregation, dims, vector, created_at, config_hash
             ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)
             ON CONFLICT(conversation_id, provider, model, chunking, aggregation) DO UPDATE SET
                dims = excluded.dims,
                vector = excluded.vector,
                created_at = excluded.created_at,
                config_hash = excluded.config_hash",
            params![
                record.conversation_id.to_string(),
                record.provider,
                record.model,
                record.chunking,
                record.aggregation,
                record.vector.len() as i64,
                vector_to_blob(&record.vector),
                record.created_at.to_rfc3339(),
                record.config_hash,
            ],
        )?;
        Ok(())
    }

    pub fn load_embedding(
        &self,
        conversation_id: Uuid,
        provider: &str,
        model: Option<&str>,
        chunking: &str,
        aggregation: &str,
    ) -> CtkResult<Option<EmbeddingRecord>> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT vector, created_at, config_hash FROM embeddings
                 WHERE conversation_id = ?1 AND provider = ?2 AND model IS ?3 AND chunking = ?4 AND aggregation = ?5",
                params![conversation_id.to_string(), provider, model, chunking, aggregation],
                |row| {
                    Ok((
                        row.get::<_, Vec<u8>>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;
        Ok(row.map(|(blob, created_at, config_hash)| EmbeddingRecord {
            conversation_id,
            provider: provider.to_string(),
            model: model.map(|m| m.to_string()),
            chunking: chunking.to_string(),
            aggregation: aggregation.to_string(),
            vector: blob_to_vector(&blob),
            created_at: parse_timestamp(Some(created_at)).unwrap_or_else(Utc::now),
            config_hash,
        }))
    }

    /// Every stored embedding matching a config hash — the similarity
    /// engine's "enumerate all embeddings in the store" path when no
    /// candidate set is given to `find_similar`.
    pub fn list_embeddings_by_config_hash(&self, config_hash: &str) -> CtkResult<Vec<(Uuid, Vec<f32>)>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT conversation_id, vector FROM embeddings WHERE config_hash = ?1",
        )?;
        let rows = stmt
            .query_map(params![config_hash], |row| {
                let id: String = row.get(0)?;
                let blob: Vec<u8> = row.get(1)?;
                Ok((id, blob))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows
            .into_iter()
            .filter_map(|(id, blob)| Uuid::parse_str(&id).ok().map(|id| (id, blob_to_vector(&blob))))
            .collect())
    }

    pub fn delete_embeddings_not_matching(&self, config_hash: &str) -> CtkResult<()> {
        let conn = self.lock();
        conn.execute("DELETE FROM embeddings WHERE config_hash != ?1", params![config_hash])?;
        Ok(())
    }

    /// `(a_id, b_id)` canonicalized with `min_id < max_id` before storage.
    /// Idempotent; `computed_at` updates on write.
    pub fn save_similarity(&self, record: &SimilarityRecord) -> CtkResult<()> {
        let (a, b) = if record.a_id < record.b_id {
            (record.a_id, record.b_id)
        } else {
            (record.b_id, record.a_id)
        };
        let conn = self.lock();
        conn.execute(
            "INSERT INTO similarities (a_id, b_id, metric, provider, similarity, computed_at)
             VALUES (?1,?2,?3,?4,?5,?6)
             ON CONFLICT(a_id, b_id, metric, provider) DO UPDATE SET
                similarity = excluded.similarity,
                computed_at = excluded.computed_at",
            params![
                a.to_string(),
                b.to_string(),
                record.metric,
                record.provider,
                record.similarity,
                record.computed_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Cached top-K similar conversations for `target_id`, reading from
    /// whichever side of the canonicalized pair it appears on.
    pub fn get_similar_conversations(
        &self,
        target_id: Uuid,
        metric: &str,
        top_k: usize,
        threshold: f64,
    ) -> CtkResult<Vec<(Uuid, f64)>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT CASE WHEN a_id = ?1 THEN b_id ELSE a_id END AS other, similarity
             FROM similarities
             WHERE (a_id = ?1 OR b_id = ?1) AND metric = ?2 AND similarity >= ?3
             ORDER BY similarity DESC
             LIMIT ?4",
        )?;
        let rows = stmt
            .query_map(
                params![target_id.to_string(), metric, threshold, top_k as i64],
                |row| {
                    let id: String = row.get(0)?;
                    let sim: f64 = row.get(1)?;
                    Ok((id, sim))
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows
            .into_iter()
            .filter_map(|(id, sim)| Uuid::parse_str(&id).ok().map(|id| (id, sim)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Store;
    use ctk_core::conversation::ConversationTree;

    #[test]
    fn embedding_round_trips_through_blob_encoding() {
        let store = Store::open_in_memory().unwrap();
        let tree = ConversationTree::new(Some("t".into()));
        let id = store.save_conversation(&tree).unwrap();

        let record = EmbeddingRecord {
            conversation_id: id,
            provider: "local".into(),
            model: Some("tfidf".into()),
            chunking: "whole".into(),
            aggregation: "mean".into(),
            vector: vec![0.1, -0.2, 0.3],
            created_at: Utc::now(),
            config_hash: "abc123".into(),
        };
        store.save_embedding(&record).unwrap();

        let loaded = store
            .load_embedding(id, "local", Some("tfidf"), "whole", "mean")
            .unwrap()
            .unwrap();
        assert_eq!(loaded.vector.len(), 3);
        assert!((loaded.vector[1] - (-0.2)).abs() < 1e-6);
    }

    #[test]
    fn similarity_is_symmetric_under_canonicalization() {
        let store = Store::open_in_memory().unwrap();
        let a = store.save_conversation(&ConversationTree::new(Some("a".into()))).unwrap();
        let b = store.save_conversation(&ConversationTree::new(Some("b".into()))).unwrap();

        store
            .save_similarity(&SimilarityRecord {
                a_id: b,
                b_id: a,
                metric: "cosine".into(),
                provider: "local".into(),
                similarity: 0.75,
                computed_at: Utc::now(),
            })
            .unwrap();

        let from_a = store.get_similar_conversations(a, "cosine", 10, 0.0).unwrap();
        let from_b = store.get_similar_conversations(b, "cosine", 10, 0.0).unwrap();
        assert_eq!(from_a, vec![(b, 0.75)]);
        assert_eq!(from_b, vec![(a, 0.75)]);
    }
}
