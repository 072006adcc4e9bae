//! Facade crate: a single [`Toolkit`] a CLI/TUI/MCP collaborator can
//! depend on instead of wiring up `ctk-store`/`ctk-embed`/
//! `ctk-similarity`/`ctk-plugins` directly. Re-exports the types those
//! collaborators need without requiring a direct dependency on every
//! sub-crate.

pub mod builder;
pub mod toolkit;

pub use builder::ToolkitBuilder;
pub use toolkit::Toolkit;

pub use ctk_core::{ConversationMetadata, ConversationSummary, ConversationTree, Message, MessageRole, MessageContent, Paginated};
pub use ctk_embed::{Aggregation, Chunking, ConversationEmbeddingConfig};
pub use ctk_error::{CtkError, CtkResult, ValidationError};
pub use ctk_plugins::{ExportedData, ExporterPlugin, ImporterPlugin, PluginKind, PluginManifest, Registry};
pub use ctk_similarity::{ConversationGraph, ConversationLink, SimilarityMetric, SimilarityResult};
pub use ctk_store::listing::{ListFilters, OrderBy, Pagination, SearchParams};
pub use ctk_store::resolver::Resolution;
pub use ctk_store::stats::{StoreStatistics, TimelineBucket, TimelineGranularity};
pub use ctk_store::streaming::ConversationStream;
pub use ctk_store::tags::TagUsage;
pub use ctk_store::Store;

#[cfg(test)]
mod tests {
    use super::*;
    use ctk_core::content::MessageContent as Content;
    use ctk_core::message::{Message as Msg, MessageRole as Role};

    fn sample_tree(title: &str) -> ConversationTree {
        let mut tree = ConversationTree::new(Some(title.to_string()));
        tree.add_message(Msg::new(Role::User, Content::from_text("hello")));
        tree.add_message(Msg::new(Role::Assistant, Content::from_text("hi there")));
        tree
    }

    #[test]
    fn open_save_load_round_trip() {
        let toolkit = ToolkitBuilder::new().in_memory().open().unwrap();
        let tree = sample_tree("first conversation");
        let id = toolkit.save_conversation(&tree).unwrap();

        let loaded = toolkit.load_conversation(&id.to_string()).unwrap();
        assert_eq!(loaded.title, Some("first conversation".to_string()));
    }

    #[test]
    fn mutations_reject_unresolvable_identifiers() {
        let toolkit = ToolkitBuilder::new().in_memory().open().unwrap();
        let err = toolkit.star_conversation("does-not-exist", true).unwrap_err();
        assert!(err.is_caller_error());
    }

    #[test]
    fn mutations_resolve_short_ids_before_acting() {
        let toolkit = ToolkitBuilder::new().in_memory().open().unwrap();
        let tree = sample_tree("short id target");
        let id = toolkit.save_conversation(&tree).unwrap();

        let short = &id.to_string()[..8];
        assert!(toolkit.star_conversation(short, true).unwrap());

        let reloaded = toolkit.load_conversation(short).unwrap();
        assert!(reloaded.metadata.is_starred());
    }

    #[test]
    fn find_similar_without_an_embedding_is_a_caller_error_not_a_panic() {
        let toolkit = ToolkitBuilder::new().in_memory().open().unwrap();
        let tree = sample_tree("unembedded");
        let id = toolkit.save_conversation(&tree).unwrap();

        let err = toolkit
            .find_similar(&id.to_string(), SimilarityMetric::Cosine, 5, 0.0, true)
            .unwrap_err();
        assert!(err.is_caller_error());
    }
}
