//! Text extraction and chunking: turns a conversation into an ordered
//! list of `(text, weight)` chunks ready for embedding.

use ctk_core::conversation::ConversationTree;
use ctk_core::message::Message;

use crate::config::{Chunking, ConversationEmbeddingConfig};

/// A chunk of text paired with the weight its embedding should carry in
/// the final aggregation step.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedChunk {
    pub text: String,
    pub weight: f64,
}

/// Builds the ordered chunk list for `tree` per `config`. Title and tags
/// chunks (when enabled) always come first/last respectively, regardless
/// of chunking strategy; they are independent of message traversal order.
pub fn extract_chunks(tree: &ConversationTree, config: &ConversationEmbeddingConfig) -> Vec<WeightedChunk> {
    let mut chunks = Vec::new();

    if config.include_title {
        if let Some(title) = tree.title.as_ref().filter(|t| !t.is_empty()) {
            chunks.push(WeightedChunk {
                text: title.clone(),
                weight: config.title_weight,
            });
        }
    }

    chunks.extend(message_chunks(tree, config));

    if config.include_tags && !tree.metadata.tags.is_empty() {
        chunks.push(WeightedChunk {
            text: tree.metadata.tags.join(" "),
            weight: 1.0,
        });
    }

    chunks
}

fn message_chunks(tree: &ConversationTree, config: &ConversationEmbeddingConfig) -> Vec<WeightedChunk> {
    let ordered = tree.longest_path_messages();

    match config.chunking {
        Chunking::Whole => {
            let text = tree.longest_path_text();
            if text.is_empty() {
                Vec::new()
            } else {
                vec![WeightedChunk { text, weight: average_weight(&ordered, config) }]
            }
        }
        Chunking::Message => ordered
            .iter()
            .filter_map(|m| message_chunk(m, config))
            .collect(),
        Chunking::MessagePair => pair_chunks(&ordered, config),
        Chunking::Window => window_chunks(&ordered, config),
    }
}

fn message_chunk(m: &Message, config: &ConversationEmbeddingConfig) -> Option<WeightedChunk> {
    let text = m.content.get_text();
    if text.is_empty() {
        return None;
    }
    Some(WeightedChunk {
        text,
        weight: config.role_weight(m.role.as_str()),
    })
}

fn average_weight(messages: &[&Message], config: &ConversationEmbeddingConfig) -> f64 {
    if messages.is_empty() {
        return 1.0;
    }
    let sum: f64 = messages.iter().map(|m| config.role_weight(m.role.as_str())).sum();
    sum / messages.len() as f64
}

/// Pairs a user message with the assistant message immediately following
/// it in longest-path order. A message without such a partner (e.g. two
/// consecutive user turns, or a trailing message with nothing after it)
/// is emitted as its own single-message chunk.
fn pair_chunks(ordered: &[&Message], config: &ConversationEmbeddingConfig) -> Vec<WeightedChunk> {
    let mut chunks = Vec::new();
    let mut i = 0;
    while i < ordered.len() {
        let current = ordered[i];
        let next = ordered.get(i + 1);
        let pairs_with_next = matches!(current.role, ctk_core::message::MessageRole::User)
            && next.is_some_and(|n| matches!(n.role, ctk_core::message::MessageRole::Assistant));

        if pairs_with_next {
            let next = next.unwrap();
            let a = current.content.get_text();
            let b = next.content.get_text();
            let combined = [a, b].into_iter().filter(|t| !t.is_empty()).collect::<Vec<_>>().join("\n");
            if !combined.is_empty() {
                let weight = (config.role_weight(current.role.as_str()) + config.role_weight(next.role.as_str())) / 2.0;
                chunks.push(WeightedChunk { text: combined, weight });
            }
            i += 2;
        } else {
            if let Some(chunk) = message_chunk(current, config) {
                chunks.push(chunk);
            }
            i += 1;
        }
    }
    chunks
}

fn window_chunks(ordered: &[&Message], config: &ConversationEmbeddingConfig) -> Vec<WeightedChunk> {
    let window_size = config.window_size().max(1);
    if ordered.is_empty() {
        return Vec::new();
    }
    ordered
        .chunks(window_size)
        .filter_map(|window| {
            let text = window
                .iter()
                .map(|m| m.content.get_text())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join("\n");
            if text.is_empty() {
                return None;
            }
            let weight = average_weight(window, config);
            Some(WeightedChunk { text, weight })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctk_core::content::MessageContent;
    use ctk_core::message::{Message, MessageRole};

    fn tree_with(title: &str, turns: &[(MessageRole, &str)]) -> ConversationTree {
        let mut tree = ConversationTree::new(Some(title.to_string()));
        let mut parent = None;
        for (role, text) in turns {
            let mut m = Message::new(*role, MessageContent::from_text(*text));
            m.parent_id = parent;
            parent = Some(m.id);
            tree.add_message(m);
        }
        tree
    }

    #[test]
    fn whole_chunking_produces_one_chunk() {
        let tree = tree_with(
            "t",
            &[(MessageRole::User, "hello"), (MessageRole::Assistant, "hi there")],
        );
        let config = ConversationEmbeddingConfig {
            chunking: Chunking::Whole,
            include_title: false,
            include_tags: false,
            ..Default::default()
        };
        let chunks = extract_chunks(&tree, &config);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.contains("hello"));
        assert!(chunks[0].text.contains("hi there"));
    }

    #[test]
    fn message_chunking_weights_by_role() {
        let tree = tree_with(
            "t",
            &[(MessageRole::User, "hello"), (MessageRole::Assistant, "hi there")],
        );
        let config = ConversationEmbeddingConfig {
            chunking: Chunking::Message,
            include_title: false,
            include_tags: false,
            ..Default::default()
        };
        let chunks = extract_chunks(&tree, &config);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].weight, 2.0);
        assert_eq!(chunks[1].weight, 1.0);
    }

    #[test]
    fn pair_chunking_combines_user_then_assistant() {
        let tree = tree_with(
            "t",
            &[
                (MessageRole::User, "question"),
                (MessageRole::Assistant, "answer"),
                (MessageRole::User, "trailing question"),
            ],
        );
        let config = ConversationEmbeddingConfig {
            chunking: Chunking::MessagePair,
            include_title: false,
            include_tags: false,
            ..Default::default()
        };
        let chunks = extract_chunks(&tree, &config);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].text.contains("question"));
        assert!(chunks[0].text.contains("answer"));
        assert_eq!(chunks[1].text, "trailing question");
    }

    #[test]
    fn title_and_tags_bracket_message_chunks() {
        let mut tree = tree_with("hello world", &[(MessageRole::User, "body text")]);
        tree.metadata.tags = vec!["rust".to_string(), "cli".to_string()];
        let config = ConversationEmbeddingConfig {
            chunking: Chunking::Message,
            ..Default::default()
        };
        let chunks = extract_chunks(&tree, &config);
        assert_eq!(chunks.first().unwrap().text, "hello world");
        assert_eq!(chunks.last().unwrap().text, "rust cli");
    }
}
