//! Plugin directory discovery and sandboxing.
//!
//! Rust has no safe equivalent of importing an arbitrary module off
//! disk, so discovery here works over declarative manifests: a
//! `plugin.json` in an allow-listed directory names a plugin and its
//! supported formats, and is bound to a statically-linked built-in
//! implementation by name. Unknown names are skipped, matching the
//! contract's "skipped without error" requirement — nothing is ever
//! dynamically loaded.

use serde::Deserialize;

use crate::formats::json::{JsonExporter, JsonImporter};
use crate::Registry;

#[derive(Debug, Deserialize)]
pub struct PluginManifest {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub kind: PluginKind,
}

#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PluginKind {
    #[default]
    Importer,
    Exporter,
}

/// Binds a manifest to a built-in plugin implementation, registering it
/// under `manifest.name` if recognized. Returns whether anything was
/// registered.
pub fn register_builtin(registry: &mut Registry, manifest: &PluginManifest) -> bool {
    if manifest.name.trim().is_empty() {
        return false;
    }
    match (manifest.kind.eq(&PluginKind::Importer), manifest.name.as_str()) {
        (true, "json") => {
            registry.register_importer("json", Box::new(JsonImporter));
            true
        }
        (false, "json") => {
            registry.register_exporter("json", Box::new(JsonExporter));
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_plugin_name_is_rejected_silently() {
        let mut registry = Registry::new();
        let manifest = PluginManifest {
            name: "does-not-exist".into(),
            version: "1".into(),
            kind: PluginKind::Importer,
        };
        assert!(!register_builtin(&mut registry, &manifest));
    }

    #[test]
    fn empty_name_is_rejected() {
        let mut registry = Registry::new();
        let manifest = PluginManifest {
            name: "".into(),
            version: "1".into(),
            kind: PluginKind::Importer,
        };
        assert!(!register_builtin(&mut registry, &manifest));
    }

    #[test]
    fn json_importer_manifest_binds_to_builtin() {
        let mut registry = Registry::new();
        let manifest = PluginManifest {
            name: "json".into(),
            version: "1".into(),
            kind: PluginKind::Importer,
        };
        assert!(register_builtin(&mut registry, &manifest));
        assert!(registry.get_importer("json").is_some());
    }
}
