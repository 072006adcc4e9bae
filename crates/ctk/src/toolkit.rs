//! The [`Toolkit`] facade: a single type a CLI/TUI/MCP collaborator can
//! hold instead of wiring up `ctk-store`/`ctk-embed`/`ctk-similarity`/
//! `ctk-plugins` itself. Every mutation that accepts a caller-supplied
//! identifier routes it through the resolver first, since any short-id
//! input must be resolved to a canonical id before any mutation touches
//! it, rather than trusting it to already be canonical.

use std::path::Path;

use ctk_core::conversation::{ConversationSummary, ConversationTree};
use ctk_core::pagination::Paginated;
use ctk_embed::{ConversationEmbeddingConfig, EmbeddingManager};
use ctk_error::{CtkError, CtkResult};
use ctk_plugins::Registry;
use ctk_similarity::{build_graph, compute_similarity_matrix, find_similar, ConversationGraph, SimilarityMetric, SimilarityResult};
use ctk_store::embeddings::EmbeddingRecord;
use ctk_store::listing::{ListFilters, OrderBy, Pagination, SearchParams};
use ctk_store::resolver::Resolution;
use ctk_store::stats::{StoreStatistics, TimelineBucket, TimelineGranularity};
use ctk_store::streaming::ConversationStream;
use ctk_store::tags::TagUsage;
use ctk_store::Store;
use serde_json::Value;
use uuid::Uuid;

use crate::builder::ToolkitBuilder;

/// Owns a [`Store`], an [`EmbeddingManager`], the embedding configuration
/// new embeddings are computed under, and a plugin [`Registry`]. Build
/// one with [`ToolkitBuilder`].
pub struct Toolkit {
    store: Store,
    embedding: EmbeddingManager,
    embedding_config: ConversationEmbeddingConfig,
    plugins: Registry,
}

impl Toolkit {
    pub fn new(store: Store, embedding: EmbeddingManager, embedding_config: ConversationEmbeddingConfig, plugins: Registry) -> Self {
        Self {
            store,
            embedding,
            embedding_config,
            plugins,
        }
    }

    pub fn builder() -> ToolkitBuilder {
        ToolkitBuilder::new()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn plugins(&self) -> &Registry {
        &self.plugins
    }

    pub fn plugins_mut(&mut self) -> &mut Registry {
        &mut self.plugins
    }

    pub fn embedding_config(&self) -> &ConversationEmbeddingConfig {
        &self.embedding_config
    }

    pub fn set_embedding_config(&mut self, config: ConversationEmbeddingConfig) {
        self.embedding_config = config;
    }

    /// Resolves a short id/slug to a canonical conversation id, rejecting
    /// ambiguity and absence as distinct, user-facing errors rather than
    /// silently picking one or returning `None`.
    pub fn resolve(&self, identifier: &str) -> CtkResult<Uuid> {
        match self.store.resolve_identifier_checked(identifier)? {
            Resolution::Found(id, _slug) => Ok(id),
            Resolution::Ambiguous => Err(CtkError::ambiguous(format!("\"{identifier}\" matches more than one conversation"))),
            Resolution::NotFound => Err(CtkError::not_found(format!("no conversation matches \"{identifier}\""))),
        }
    }

    // ---- conversation CRUD ----

    pub fn save_conversation(&self, tree: &ConversationTree) -> CtkResult<Uuid> {
        self.store.save_conversation(tree)
    }

    pub fn load_conversation(&self, identifier: &str) -> CtkResult<ConversationTree> {
        let id = self.resolve(identifier)?;
        self.store
            .load_conversation(id)?
            .ok_or_else(|| CtkError::not_found(format!("conversation {id} resolved but could not be loaded")))
    }

    pub fn delete_conversation(&self, identifier: &str) -> CtkResult<bool> {
        let id = self.resolve(identifier)?;
        self.store.delete_conversation(id)
    }

    pub fn update_conversation_metadata(
        &self,
        identifier: &str,
        title: Option<String>,
        project: Option<String>,
        source: Option<String>,
        model: Option<String>,
    ) -> CtkResult<bool> {
        let id = self.resolve(identifier)?;
        self.store.update_conversation_metadata(id, title, project, source, model)
    }

    pub fn star_conversation(&self, identifier: &str, starred: bool) -> CtkResult<bool> {
        let id = self.resolve(identifier)?;
        self.store.star_conversation(id, starred)
    }

    pub fn pin_conversation(&self, identifier: &str, pinned: bool) -> CtkResult<bool> {
        let id = self.resolve(identifier)?;
        self.store.pin_conversation(id, pinned)
    }

    pub fn archive_conversation(&self, identifier: &str, archived: bool) -> CtkResult<bool> {
        let id = self.resolve(identifier)?;
        self.store.archive_conversation(id, archived)
    }

    pub fn duplicate_conversation(&self, identifier: &str) -> CtkResult<Uuid> {
        let id = self.resolve(identifier)?;
        self.store
            .duplicate_conversation(id)?
            .ok_or_else(|| CtkError::not_found(format!("conversation {id} resolved but could not be duplicated")))
    }

    // ---- listing, search, tags, stats ----

    pub fn list_conversations(&self, filters: &ListFilters, pagination: Pagination) -> CtkResult<Paginated<ConversationSummary>> {
        self.store.list_conversations(filters, pagination)
    }

    pub fn search_conversations(&self, params: &SearchParams, pagination: Pagination) -> CtkResult<Paginated<ConversationSummary>> {
        self.store.search_conversations(params, pagination)
    }

    /// Streaming equivalent of [`Toolkit::list_conversations`]: yields
    /// one summary at a time, fetching successive pages lazily rather
    /// than materializing the whole result set up front.
    pub fn iter_conversations(&self, filters: ListFilters) -> ConversationStream {
        self.store.iter_conversations(filters)
    }

    pub fn iter_search(&self, params: SearchParams) -> ConversationStream {
        self.store.iter_search(params)
    }

    pub fn add_tags(&self, identifier: &str, names: &[String]) -> CtkResult<()> {
        let id = self.resolve(identifier)?;
        self.store.add_tags(id, names)
    }

    pub fn remove_tag(&self, identifier: &str, name: &str) -> CtkResult<bool> {
        let id = self.resolve(identifier)?;
        self.store.remove_tag(id, name)
    }

    pub fn get_all_tags(&self, with_counts: bool) -> CtkResult<Vec<TagUsage>> {
        self.store.get_all_tags(with_counts)
    }

    pub fn get_statistics(&self) -> CtkResult<StoreStatistics> {
        self.store.get_statistics()
    }

    pub fn get_models(&self) -> CtkResult<Vec<String>> {
        self.store.get_models()
    }

    pub fn get_sources(&self) -> CtkResult<Vec<String>> {
        self.store.get_sources()
    }

    pub fn get_conversation_timeline(&self, granularity: TimelineGranularity, limit: Option<usize>) -> CtkResult<Vec<TimelineBucket>> {
        self.store.get_conversation_timeline(granularity, limit)
    }

    // ---- embedding pipeline ----

    /// Embeds `identifier`'s conversation under the toolkit's current
    /// [`ConversationEmbeddingConfig`] and persists the result, keyed on
    /// the config's full hash.
    pub fn embed_conversation(&self, identifier: &str) -> CtkResult<Vec<f32>> {
        let id = self.resolve(identifier)?;
        let tree = self
            .store
            .load_conversation(id)?
            .ok_or_else(|| CtkError::not_found(format!("conversation {id} resolved but could not be loaded")))?;

        let vector = self.embedding.embed_conversation(&tree, &self.embedding_config)?;

        self.store.save_embedding(&EmbeddingRecord {
            conversation_id: id,
            provider: self.embedding.provider().name().to_string(),
            model: self.embedding_config.model.clone(),
            chunking: self.embedding_config.chunking.as_str().to_string(),
            aggregation: self.embedding_config.aggregation.as_str().to_string(),
            vector: vector.clone(),
            created_at: chrono::Utc::now(),
            config_hash: self.embedding_config.to_hash(),
        })?;

        Ok(vector)
    }

    /// Drops every cached embedding computed under a *different*
    /// embedding config than the toolkit's current one, so a stale
    /// provider/chunking/aggregation combination never silently leaks
    /// into similarity results.
    pub fn prune_stale_embeddings(&self) -> CtkResult<()> {
        self.store.delete_embeddings_not_matching(&self.embedding_config.to_hash())
    }

    // ---- similarity ----

    /// Top-`k` conversations similar to `identifier` under the toolkit's
    /// current embedding config. If `identifier` has no embedding yet,
    /// this rejects with a user-facing [`CtkError::NotFound`] naming the
    /// fix ("embed it first") rather than panicking or returning a
    /// confusing empty result — callers can match
    /// `CtkError::is_caller_error` to tell this apart from a real store
    /// failure.
    pub fn find_similar(&self, identifier: &str, metric: SimilarityMetric, top_k: usize, threshold: f64, use_cache: bool) -> CtkResult<Vec<SimilarityResult>> {
        let id = self.resolve(identifier)?;
        let config_hash = self.embedding_config.to_hash();
        let record = self.store.load_embedding(
            id,
            self.embedding.provider().name(),
            self.embedding_config.model.as_deref(),
            self.embedding_config.chunking.as_str(),
            self.embedding_config.aggregation.as_str(),
        )?;
        let Some(record) = record else {
            return Err(CtkError::not_found(format!(
                "conversation {id} has no embedding under the current config; call embed_conversation first"
            )));
        };

        find_similar(
            &self.store,
            id,
            &record.vector,
            &config_hash,
            self.embedding.provider().name(),
            None,
            metric,
            top_k,
            threshold,
            use_cache,
        )
    }

    /// Embeds `query_text` directly (no conversation round-trip) and
    /// ranks every stored conversation embedding under the current
    /// config against it. Returns an empty list rather than erroring
    /// when nothing has been embedded yet — there is no single
    /// conversation to point the caller at, so there's nothing to "fix
    /// and retry" the way there is for [`Toolkit::find_similar`].
    pub fn semantic_search(&self, query_text: &str, metric: SimilarityMetric, top_k: usize, threshold: f64) -> CtkResult<Vec<(Uuid, f64)>> {
        let query_vector = self.embedding.provider().embed(query_text)?.vector;
        let candidates = self.store.list_embeddings_by_config_hash(&self.embedding_config.to_hash())?;
        if candidates.is_empty() {
            tracing::warn!("semantic_search: no conversations have been embedded under the current config yet");
            return Ok(Vec::new());
        }

        let mut scored: Vec<(Uuid, f64)> = candidates
            .iter()
            .map(|(id, vector)| (*id, metric.compute(&query_vector, vector)))
            .filter(|(_, similarity)| *similarity >= threshold)
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    // ---- similarity graph ----

    /// Builds the similarity graph over every conversation embedded
    /// under the current config. An empty embedding set yields an empty
    /// graph rather than an error — `build_graph` over zero items is
    /// well-defined and every downstream analysis on it degrades to
    /// zeros, so there is nothing to fail on.
    pub fn build_similarity_graph(&self, metric: SimilarityMetric, threshold: f64, max_links_per_node: Option<usize>) -> CtkResult<ConversationGraph> {
        let items = self.store.list_embeddings_by_config_hash(&self.embedding_config.to_hash())?;
        if items.is_empty() {
            tracing::warn!("build_similarity_graph: no conversations have been embedded under the current config yet");
        }
        Ok(build_graph(&items, metric, threshold, max_links_per_node))
    }

    pub fn get_network_summary(&self, metric: SimilarityMetric, threshold: f64, max_links_per_node: Option<usize>) -> CtkResult<Value> {
        Ok(self.build_similarity_graph(metric, threshold, max_links_per_node)?.summary())
    }

    /// Clusters conversations by community detection over the similarity
    /// graph, falling back to label propagation unless `use_modularity`
    /// asks for the (slower, higher-quality) greedy modularity pass.
    pub fn get_clusters(&self, metric: SimilarityMetric, threshold: f64, use_modularity: bool) -> CtkResult<std::collections::HashMap<Uuid, usize>> {
        let graph = self.build_similarity_graph(metric, threshold, None)?;
        Ok(if use_modularity { graph.greedy_modularity() } else { graph.label_propagation() })
    }

    pub fn get_bridges(&self, metric: SimilarityMetric, threshold: f64, top_k: usize) -> CtkResult<Vec<(Uuid, f64)>> {
        Ok(self.build_similarity_graph(metric, threshold, None)?.bridges(top_k))
    }

    /// Pairwise similarity matrix over an explicit set of embeddings,
    /// for callers that already have the vectors in hand and don't want
    /// a full graph build.
    pub fn similarity_matrix(&self, items: &[(Uuid, Vec<f32>)], metric: SimilarityMetric) -> Vec<Vec<f64>> {
        compute_similarity_matrix(items, metric)
    }

    // ---- import/export ----

    pub fn import_file(&self, path: &Path, format: Option<&str>, opts: &std::collections::HashMap<String, Value>) -> CtkResult<Vec<ConversationTree>> {
        self.plugins.import_file(path, format, opts)
    }

    /// Imports `path` and saves every conversation it yields, returning
    /// their newly assigned canonical ids.
    pub fn import_and_save(&self, path: &Path, format: Option<&str>, opts: &std::collections::HashMap<String, Value>) -> CtkResult<Vec<Uuid>> {
        self.plugins
            .import_file(path, format, opts)?
            .iter()
            .map(|tree| self.store.save_conversation(tree))
            .collect()
    }

    pub fn export_file(&self, identifiers: &[String], path: &Path, format: &str, opts: &std::collections::HashMap<String, Value>) -> CtkResult<()> {
        let trees = identifiers
            .iter()
            .map(|identifier| self.load_conversation(identifier))
            .collect::<CtkResult<Vec<_>>>()?;
        self.plugins.export_file(&trees, path, format, opts)
    }

    pub fn discover_plugins(&mut self, search_dirs: &[impl AsRef<Path>], allow_list: &[impl AsRef<Path>]) -> CtkResult<usize> {
        self.plugins.discover_plugins(search_dirs, allow_list)
    }

    // ---- shared defaults for callers wiring up list/search without opinions ----

    pub fn default_order(&self) -> OrderBy {
        OrderBy::default()
    }
}
