//! Plugin registry. A plain value, not a process-wide singleton, so
//! callers can hold several independently-configured registries (e.g.
//! one per test) without shared static state.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use ctk_core::conversation::ConversationTree;
use ctk_error::{CtkError, CtkResult};
use serde_json::Value;
use tracing::{debug, warn};

use crate::traits::{ExporterPlugin, ImporterPlugin};

#[derive(Default)]
pub struct Registry {
    importers: HashMap<String, Box<dyn ImporterPlugin>>,
    exporters: HashMap<String, Box<dyn ExporterPlugin>>,
    /// Preserves registration order for `auto_detect_importer`, which
    /// must probe in the order plugins were registered rather than
    /// `HashMap`'s unspecified iteration order.
    importer_order: Vec<String>,
    discovered: bool,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_importer(&mut self, name: impl Into<String>, plugin: Box<dyn ImporterPlugin>) {
        let name = name.into();
        debug!(plugin = %name, "registering importer");
        if !self.importers.contains_key(&name) {
            self.importer_order.push(name.clone());
        }
        self.importers.insert(name, plugin);
    }

    pub fn register_exporter(&mut self, name: impl Into<String>, plugin: Box<dyn ExporterPlugin>) {
        let name = name.into();
        debug!(plugin = %name, "registering exporter");
        self.exporters.insert(name, plugin);
    }

    pub fn get_importer(&self, name: &str) -> Option<&dyn ImporterPlugin> {
        self.importers.get(name).map(|b| b.as_ref())
    }

    pub fn get_exporter(&self, name: &str) -> Option<&dyn ExporterPlugin> {
        self.exporters.get(name).map(|b| b.as_ref())
    }

    pub fn list_importers(&self) -> Vec<String> {
        self.importer_order.clone()
    }

    pub fn list_exporters(&self) -> Vec<String> {
        let mut names: Vec<String> = self.exporters.keys().cloned().collect();
        names.sort();
        names
    }

    /// Probes each registered importer's `detect_format` in registration
    /// order; returns the first match's name.
    pub fn auto_detect_importer(&self, data: &[u8]) -> Option<String> {
        self.importer_order
            .iter()
            .find(|name| self.importers.get(*name).map(|p| p.detect_format(data)).unwrap_or(false))
            .cloned()
    }

    /// `import_file(path, format?)`: if `format` is given, the named
    /// importer must exist. Otherwise the file is auto-detected; no match
    /// is an `UnknownFormat` error, never a silent empty result.
    pub fn import_file(&self, path: &Path, format: Option<&str>, opts: &HashMap<String, Value>) -> CtkResult<Vec<ConversationTree>> {
        let data = fs::read(path)?;
        let name = match format {
            Some(f) => {
                if !self.importers.contains_key(f) {
                    return Err(CtkError::unknown_format(f));
                }
                f.to_string()
            }
            None => self
                .auto_detect_importer(&data)
                .ok_or_else(|| CtkError::unknown_format(format!("no importer matched {}", path.display())))?,
        };
        self.importers[&name].import_data(&data, opts)
    }

    /// `export_file(convs, path, format)`: the named exporter is
    /// required. Dispatches to `export_to_file`, whose default
    /// implementation serializes `export_data`'s output by content type.
    pub fn export_file(&self, convs: &[ConversationTree], path: &Path, format: &str, opts: &HashMap<String, Value>) -> CtkResult<()> {
        let exporter = self.exporters.get(format).ok_or_else(|| CtkError::unknown_format(format))?;
        exporter.export_to_file(convs, path, opts)
    }

    /// Idempotent scan of `search_dirs` for plugin manifests, restricted
    /// to `allow_list`. A directory outside the allow-list is skipped
    /// without error; a manifest file over 1 MiB is rejected; a manifest
    /// whose declared plugin name is empty, or whose name doesn't match
    /// a built-in factory, is skipped without error. Returns the number
    /// of plugins newly registered. Calling this again after a
    /// successful discovery is a no-op.
    pub fn discover_plugins(&mut self, search_dirs: &[impl AsRef<Path>], allow_list: &[impl AsRef<Path>]) -> CtkResult<usize> {
        if self.discovered {
            return Ok(0);
        }

        let allow_list: Vec<&Path> = allow_list.iter().map(|p| p.as_ref()).collect();
        let mut registered = 0;

        for dir in search_dirs {
            let dir = dir.as_ref();
            if !allow_list.iter().any(|allowed| dir.starts_with(allowed)) {
                debug!(dir = %dir.display(), "plugin directory not in allow-list, skipping");
                continue;
            }

            let manifest_path = dir.join("plugin.json");
            let Ok(meta) = fs::metadata(&manifest_path) else {
                continue;
            };
            if meta.len() > crate::MAX_PLUGIN_FILE_BYTES {
                warn!(path = %manifest_path.display(), size = meta.len(), "plugin manifest exceeds size cap, skipping");
                continue;
            }

            let Ok(raw) = fs::read_to_string(&manifest_path) else {
                continue;
            };
            let Ok(manifest): Result<crate::discovery::PluginManifest, _> = serde_json::from_str(&raw) else {
                warn!(path = %manifest_path.display(), "plugin manifest failed to parse, skipping");
                continue;
            };

            if crate::discovery::register_builtin(self, &manifest) {
                registered += 1;
            } else {
                debug!(plugin = %manifest.name, "no built-in factory for discovered plugin, skipping");
            }
        }

        self.discovered = true;
        Ok(registered)
    }
}
