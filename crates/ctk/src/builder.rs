//! Fluent loader for a [`Toolkit`]: create/open a store, then
//! insert/mutate/query against it until close. Chains optional
//! configuration before a single terminal `open()`.

use std::path::{Path, PathBuf};

use ctk_embed::{ConversationEmbeddingConfig, EmbeddingManager};
use ctk_error::CtkResult;
use ctk_plugins::Registry;
use ctk_plugins::formats::json::{JsonExporter, JsonImporter};
use ctk_store::Store;

use crate::toolkit::Toolkit;

#[derive(Debug, Clone)]
enum Location {
    Directory(PathBuf),
    InMemory,
}

pub struct ToolkitBuilder {
    location: Location,
    provider_name: String,
    embedding_config: ConversationEmbeddingConfig,
    register_builtin_plugins: bool,
}

impl ToolkitBuilder {
    pub fn new() -> Self {
        Self {
            location: Location::InMemory,
            provider_name: "local".to_string(),
            embedding_config: ConversationEmbeddingConfig::default(),
            register_builtin_plugins: true,
        }
    }

    /// Opens (creating if necessary) a store directory on disk.
    pub fn at(mut self, dir: impl AsRef<Path>) -> Self {
        self.location = Location::Directory(dir.as_ref().to_path_buf());
        self
    }

    /// Uses an in-memory store instead of a directory. This is the
    /// default when `at` is never called.
    pub fn in_memory(mut self) -> Self {
        self.location = Location::InMemory;
        self
    }

    pub fn with_embedding_provider(mut self, name: impl Into<String>) -> Self {
        self.provider_name = name.into();
        self
    }

    pub fn with_embedding_config(mut self, config: ConversationEmbeddingConfig) -> Self {
        self.embedding_config = config;
        self
    }

    /// Skips registering the built-in JSON importer/exporter, leaving an
    /// empty plugin registry for callers who want to register only their
    /// own formats.
    pub fn without_builtin_plugins(mut self) -> Self {
        self.register_builtin_plugins = false;
        self
    }

    pub fn open(self) -> CtkResult<Toolkit> {
        let store = match self.location {
            Location::Directory(dir) => Store::open(dir)?,
            Location::InMemory => Store::open_in_memory()?,
        };

        let embedding = EmbeddingManager::new(&self.provider_name)?;

        let mut plugins = Registry::new();
        if self.register_builtin_plugins {
            plugins.register_importer("json", Box::new(JsonImporter));
            plugins.register_exporter("json", Box::new(JsonExporter));
        }

        Ok(Toolkit::new(store, embedding, self.embedding_config, plugins))
    }
}

impl Default for ToolkitBuilder {
    fn default() -> Self {
        Self::new()
    }
}
