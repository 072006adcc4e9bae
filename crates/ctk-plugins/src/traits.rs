//! Importer/exporter contract: closed trait pair instead of duck-typed
//! plugin objects, dispatched through [`crate::Registry`] by name.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use ctk_core::conversation::ConversationTree;
use ctk_error::CtkResult;
use serde_json::Value;

/// What `ExporterPlugin::export_data` produced, before it is written
/// somewhere: a `string`/`bytes`/`structured` union.
#[derive(Debug, Clone)]
pub enum ExportedData {
    Text(String),
    Bytes(Vec<u8>),
    Structured(Value),
}

pub trait ImporterPlugin: Send + Sync {
    fn name(&self) -> &str;
    fn version(&self) -> &str;
    fn supported_formats(&self) -> Vec<String>;

    /// Whether `data` is well-formed input for this importer.
    fn validate(&self, data: &[u8]) -> bool;

    /// Sniff-test used by auto-detection. Defaults to [`Self::validate`];
    /// importers whose format has a cheaper or more specific signature
    /// (a magic header, a top-level JSON key) should override this.
    fn detect_format(&self, data: &[u8]) -> bool {
        self.validate(data)
    }

    fn import_data(&self, data: &[u8], opts: &HashMap<String, Value>) -> CtkResult<Vec<ConversationTree>>;
}

pub trait ExporterPlugin: Send + Sync {
    fn name(&self) -> &str;
    fn version(&self) -> &str;
    fn supported_formats(&self) -> Vec<String>;

    /// Whether `data` (typically a previously exported blob) is
    /// well-formed for this format. Used for round-trip sanity checks.
    fn validate(&self, data: &[u8]) -> bool;

    fn export_data(&self, convs: &[ConversationTree], opts: &HashMap<String, Value>) -> CtkResult<ExportedData>;

    /// Writes the export directly to `path`. The default implementation
    /// calls [`Self::export_data`] and serializes by content type
    /// (text written as-is, bytes written raw, structured pretty-printed
    /// as JSON) — the fallback the registry's `export_file` dispatch
    /// relies on when a plugin doesn't need a custom file layout.
    fn export_to_file(&self, convs: &[ConversationTree], path: &Path, opts: &HashMap<String, Value>) -> CtkResult<()> {
        match self.export_data(convs, opts)? {
            ExportedData::Text(s) => fs::write(path, s)?,
            ExportedData::Bytes(b) => fs::write(path, b)?,
            ExportedData::Structured(v) => fs::write(path, serde_json::to_string_pretty(&v)?)?,
        }
        Ok(())
    }
}
