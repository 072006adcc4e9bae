//! Plugin registry: importer/exporter trait pair, a `Registry` value
//! holding them by name, auto-detection, file dispatch, and
//! manifest-based discovery of built-in formats.

pub mod discovery;
pub mod formats;
pub mod registry;
pub mod traits;

pub use discovery::{PluginKind, PluginManifest};
pub use registry::Registry;
pub use traits::{ExportedData, ExporterPlugin, ImporterPlugin};

/// Plugin manifest file size cap: a plugin file is rejected if it
/// exceeds 1 MiB.
pub const MAX_PLUGIN_FILE_BYTES: u64 = 1024 * 1024;

#[cfg(test)]
mod tests {
    use super::*;
    use ctk_core::content::MessageContent;
    use ctk_core::conversation::ConversationTree;
    use ctk_core::message::{Message, MessageRole};
    use std::collections::HashMap;

    #[test]
    fn import_file_requires_named_importer_to_exist() {
        let registry = Registry::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, "{}").unwrap();

        let err = registry.import_file(&path, Some("does-not-exist"), &HashMap::new()).unwrap_err();
        assert!(matches!(err, ctk_error::CtkError::UnknownFormat(_)));
    }

    #[test]
    fn import_file_auto_detects_when_format_absent() {
        let mut registry = Registry::new();
        registry.register_importer("json", Box::new(formats::json::JsonImporter));

        let mut tree = ConversationTree::new(Some("t".into()));
        tree.add_message(Message::new(MessageRole::User, MessageContent::from_text("hi")));
        let json = serde_json::to_string(&vec![tree]).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, json).unwrap();

        let imported = registry.import_file(&path, None, &HashMap::new()).unwrap();
        assert_eq!(imported.len(), 1);
    }

    #[test]
    fn export_file_requires_named_exporter_to_exist() {
        let registry = Registry::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let err = registry.export_file(&[], &path, "does-not-exist", &HashMap::new()).unwrap_err();
        assert!(matches!(err, ctk_error::CtkError::UnknownFormat(_)));
    }

    #[test]
    fn export_file_round_trips_through_default_dispatch() {
        let mut registry = Registry::new();
        registry.register_exporter("json", Box::new(formats::json::JsonExporter));
        registry.register_importer("json", Box::new(formats::json::JsonImporter));

        let mut tree = ConversationTree::new(Some("roundtrip".into()));
        tree.add_message(Message::new(MessageRole::User, MessageContent::from_text("hi")));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        registry.export_file(&[tree], &path, "json", &HashMap::new()).unwrap();

        let imported = registry.import_file(&path, Some("json"), &HashMap::new()).unwrap();
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].title, Some("roundtrip".to_string()));
    }

    #[test]
    fn discovery_is_idempotent_and_respects_allow_list() {
        let mut registry = Registry::new();
        let allowed = tempfile::tempdir().unwrap();
        std::fs::write(allowed.path().join("plugin.json"), r#"{"name":"json","kind":"importer"}"#).unwrap();

        let not_allowed = tempfile::tempdir().unwrap();
        std::fs::write(not_allowed.path().join("plugin.json"), r#"{"name":"json","kind":"exporter"}"#).unwrap();

        let registered = registry
            .discover_plugins(&[allowed.path(), not_allowed.path()], &[allowed.path()])
            .unwrap();
        assert_eq!(registered, 1);
        assert!(registry.get_importer("json").is_some());
        assert!(registry.get_exporter("json").is_none());

        let second_pass = registry.discover_plugins(&[allowed.path()], &[allowed.path()]).unwrap();
        assert_eq!(second_pass, 0);
    }

    #[test]
    fn discovery_rejects_oversized_manifest() {
        let mut registry = Registry::new();
        let dir = tempfile::tempdir().unwrap();
        let oversized = "x".repeat((MAX_PLUGIN_FILE_BYTES + 1) as usize);
        std::fs::write(dir.path().join("plugin.json"), oversized).unwrap();

        let registered = registry.discover_plugins(&[dir.path()], &[dir.path()]).unwrap();
        assert_eq!(registered, 0);
    }
}
