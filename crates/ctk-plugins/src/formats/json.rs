//! Built-in JSON importer/exporter: round-trips [`ConversationTree`]
//! through its own `Serialize`/`Deserialize` impl. Serves as the
//! reference implementation other format plugins are modeled on, and is
//! what `discover_plugins` binds a `"json"`-named manifest to.

use std::collections::HashMap;

use ctk_core::conversation::ConversationTree;
use ctk_error::{CtkError, CtkResult};
use serde_json::Value;

use crate::traits::{ExportedData, ExporterPlugin, ImporterPlugin};

pub struct JsonImporter;

impl ImporterPlugin for JsonImporter {
    fn name(&self) -> &str {
        "json"
    }

    fn version(&self) -> &str {
        "1.0"
    }

    fn supported_formats(&self) -> Vec<String> {
        vec!["json".to_string()]
    }

    fn validate(&self, data: &[u8]) -> bool {
        serde_json::from_slice::<Value>(data).is_ok()
    }

    fn detect_format(&self, data: &[u8]) -> bool {
        let trimmed = data.iter().find(|b| !b.is_ascii_whitespace());
        matches!(trimmed, Some(b'{') | Some(b'['))
    }

    fn import_data(&self, data: &[u8], _opts: &HashMap<String, Value>) -> CtkResult<Vec<ConversationTree>> {
        let value: Value = serde_json::from_slice(data)?;
        match value {
            Value::Array(items) => items
                .into_iter()
                .map(|v| serde_json::from_value(v).map_err(CtkError::from))
                .collect(),
            single => Ok(vec![serde_json::from_value(single)?]),
        }
    }
}

pub struct JsonExporter;

impl ExporterPlugin for JsonExporter {
    fn name(&self) -> &str {
        "json"
    }

    fn version(&self) -> &str {
        "1.0"
    }

    fn supported_formats(&self) -> Vec<String> {
        vec!["json".to_string()]
    }

    fn validate(&self, data: &[u8]) -> bool {
        serde_json::from_slice::<Value>(data).is_ok()
    }

    fn export_data(&self, convs: &[ConversationTree], _opts: &HashMap<String, Value>) -> CtkResult<ExportedData> {
        let value = serde_json::to_value(convs)?;
        Ok(ExportedData::Structured(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctk_core::content::MessageContent;
    use ctk_core::message::{Message, MessageRole};

    fn sample_tree() -> ConversationTree {
        let mut tree = ConversationTree::new(Some("hello".into()));
        tree.add_message(Message::new(MessageRole::User, MessageContent::from_text("hi")));
        tree
    }

    #[test]
    fn json_round_trips_a_conversation_array() {
        let importer = JsonImporter;
        let exporter = JsonExporter;
        let convs = vec![sample_tree()];

        let exported = exporter.export_data(&convs, &HashMap::new()).unwrap();
        let ExportedData::Structured(value) = exported else {
            panic!("expected structured export");
        };
        let bytes = serde_json::to_vec(&value).unwrap();

        assert!(importer.validate(&bytes));
        assert!(importer.detect_format(&bytes));
        let imported = importer.import_data(&bytes, &HashMap::new()).unwrap();
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].title, Some("hello".to_string()));
    }

    #[test]
    fn detect_format_rejects_non_json_looking_bytes() {
        let importer = JsonImporter;
        assert!(!importer.detect_format(b"not json at all"));
    }
}
