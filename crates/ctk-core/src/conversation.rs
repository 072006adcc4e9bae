use std::cell::RefCell;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::constants::MAX_PATH_DEPTH;
use crate::message::{Message, MessageRole};

/// Organization flags, tag list and open metadata for a conversation.
/// The three `_at` timestamps double as booleans: a conversation is
/// starred iff `starred_at.is_some()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMetadata {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_format")]
    pub format: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub custom_data: HashMap<String, Value>,
    #[serde(default)]
    pub starred_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pinned_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub archived_at: Option<DateTime<Utc>>,
}

fn default_version() -> String {
    "1".to_string()
}
fn default_format() -> String {
    "ctk".to_string()
}

impl Default for ConversationMetadata {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            version: default_version(),
            format: default_format(),
            created_at: now,
            updated_at: now,
            source: None,
            model: None,
            tags: Vec::new(),
            project: None,
            custom_data: HashMap::new(),
            starred_at: None,
            pinned_at: None,
            archived_at: None,
        }
    }
}

impl ConversationMetadata {
    pub fn is_starred(&self) -> bool {
        self.starred_at.is_some()
    }
    pub fn is_pinned(&self) -> bool {
        self.pinned_at.is_some()
    }
    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }
}

/// Lightweight projection returned by list/search paths without loading
/// message bodies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
    pub source: Option<String>,
    pub model: Option<String>,
    pub tags: Vec<String>,
    pub project: Option<String>,
    pub starred_at: Option<DateTime<Utc>>,
    pub pinned_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
}

/// Wire shape used for serialization: a flat messages list in insertion
/// order rather than a map, so round-trips are order-stable and the
/// derived path cache never needs to be encoded. Serialization
/// round-trips `(id, title, metadata, messages list, root_message_ids)`
/// only.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConversationTreeDto {
    id: Uuid,
    title: Option<String>,
    metadata: ConversationMetadata,
    messages: Vec<Message>,
    root_message_ids: Vec<Uuid>,
}

type PathsCache = (u64, Vec<Vec<Uuid>>);

/// A rooted (possibly multi-rooted) tree of messages. Mutation methods
/// enforce parent/child and id-uniqueness invariants directly, and cache
/// coherence for the derived path list is enforced via
/// [`Self::fingerprint`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "ConversationTreeDto", from = "ConversationTreeDto")]
pub struct ConversationTree {
    pub id: Uuid,
    pub title: Option<String>,
    pub metadata: ConversationMetadata,
    pub message_map: HashMap<Uuid, Message>,
    pub root_message_ids: Vec<Uuid>,
    /// Order messages were added in. Not part of the persisted shape but
    /// used to break sort ties stably in the absence of a deterministic
    /// HashMap iteration order.
    insertion_order: Vec<Uuid>,
    /// `(fingerprint, paths)`. Invalidated (`None`) on every mutation;
    /// recomputed lazily by [`Self::get_all_paths`].
    #[serde(skip)]
    paths_cache: RefCell<Option<PathsCache>>,
}

impl From<ConversationTreeDto> for ConversationTree {
    fn from(dto: ConversationTreeDto) -> Self {
        let mut tree = ConversationTree {
            id: dto.id,
            title: dto.title,
            metadata: dto.metadata,
            message_map: HashMap::new(),
            root_message_ids: Vec::new(),
            insertion_order: Vec::new(),
            paths_cache: RefCell::new(None),
        };
        for m in dto.messages {
            tree.insertion_order.push(m.id);
            tree.message_map.insert(m.id, m);
        }
        tree.root_message_ids = dto.root_message_ids;
        tree
    }
}

impl From<ConversationTree> for ConversationTreeDto {
    fn from(tree: ConversationTree) -> Self {
        let messages: Vec<Message> = tree
            .insertion_order
            .iter()
            .filter_map(|id| tree.message_map.get(id).cloned())
            .collect();
        ConversationTreeDto {
            id: tree.id,
            title: tree.title,
            metadata: tree.metadata,
            messages,
            root_message_ids: tree.root_message_ids,
        }
    }
}

impl ConversationTree {
    pub fn new(title: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            metadata: ConversationMetadata::default(),
            message_map: HashMap::new(),
            root_message_ids: Vec::new(),
            insertion_order: Vec::new(),
            paths_cache: RefCell::new(None),
        }
    }

    /// Insert or replace (last-writer-wins, invariant 3) a message. Refreshes
    /// `updated_at` and invalidates the path cache (invariant 4/5). Never
    /// fails; the caller is responsible for not introducing cycles
    /// (invariant 6 is enforced only at traversal time via a depth cap).
    pub fn add_message(&mut self, message: Message) {
        let id = message.id;
        let is_new = !self.message_map.contains_key(&id);
        if is_new {
            self.insertion_order.push(id);
        }
        if message.parent_id.is_none() && !self.root_message_ids.contains(&id) {
            self.root_message_ids.push(id);
        }
        self.message_map.insert(id, message);
        self.metadata.updated_at = Utc::now();
        *self.paths_cache.borrow_mut() = None;
    }

    /// Message ids in the order they were added to this tree — the order
    /// a store round trip should persist as the `seq` column.
    pub fn insertion_order(&self) -> &[Uuid] {
        &self.insertion_order
    }

    /// Children of `id`, ordered by timestamp ascending; messages with a
    /// missing timestamp sort last. Ties (including all-missing) break by
    /// insertion order, which `Vec::sort_by_key`'s stability preserves.
    pub fn get_children(&self, id: Uuid) -> Vec<&Message> {
        let mut children: Vec<&Message> = self
            .insertion_order
            .iter()
            .filter_map(|mid| self.message_map.get(mid))
            .filter(|m| m.parent_id == Some(id))
            .collect();
        children.sort_by_key(|m| (m.timestamp.is_none(), m.timestamp));
        children
    }

    fn fingerprint(&self) -> u64 {
        let mut ids: Vec<&Uuid> = self.message_map.keys().collect();
        ids.sort();
        let mut hasher = Sha256::new();
        for id in ids {
            let m = &self.message_map[id];
            hasher.update(id.as_bytes());
            if let Some(p) = m.parent_id {
                hasher.update(p.as_bytes());
            }
            if let Some(ts) = m.timestamp {
                hasher.update(ts.timestamp_nanos_opt().unwrap_or(0).to_le_bytes());
            }
        }
        for r in &self.root_message_ids {
            hasher.update(r.as_bytes());
        }
        let digest = hasher.finalize();
        u64::from_le_bytes(digest[0..8].try_into().unwrap())
    }

    /// Enumerates every root-to-leaf sequence, caching the result keyed by
    /// [`Self::fingerprint`]. Recursion is capped at `MAX_PATH_DEPTH` so a
    /// malformed (cyclic) import cannot overflow the stack (invariant 6).
    pub fn get_all_paths(&self) -> Vec<Vec<Uuid>> {
        let fp = self.fingerprint();
        if let Some((cached_fp, paths)) = self.paths_cache.borrow().as_ref() {
            if *cached_fp == fp {
                return paths.clone();
            }
        }
        let mut paths = Vec::new();
        for &root in &self.root_message_ids {
            let mut stack = vec![root];
            self.walk_paths(root, &mut stack, &mut paths, 0);
            stack.pop();
        }
        *self.paths_cache.borrow_mut() = Some((fp, paths.clone()));
        paths
    }

    fn walk_paths(&self, id: Uuid, stack: &mut Vec<Uuid>, out: &mut Vec<Vec<Uuid>>, depth: usize) {
        if depth >= MAX_PATH_DEPTH {
            out.push(stack.clone());
            return;
        }
        let children = self.get_children(id);
        if children.is_empty() {
            out.push(stack.clone());
            return;
        }
        for child in children {
            stack.push(child.id);
            self.walk_paths(child.id, stack, out, depth + 1);
            stack.pop();
        }
    }

    /// The longest root-to-leaf path. Ties break by the smallest timestamp
    /// of the last message, then by that message's insertion order (see
    /// `DESIGN.md`).
    pub fn get_longest_path(&self) -> Vec<Uuid> {
        let paths = self.get_all_paths();
        let insertion_rank: HashMap<Uuid, usize> = self
            .insertion_order
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, i))
            .collect();
        paths
            .into_iter()
            .max_by(|a, b| {
                let len_cmp = a.len().cmp(&b.len());
                if len_cmp != std::cmp::Ordering::Equal {
                    return len_cmp;
                }
                let ts = |p: &Vec<Uuid>| p.last().and_then(|id| self.message_map.get(id)).and_then(|m| m.timestamp);
                // smaller timestamp should win ties -> invert cmp since max_by picks largest
                let ts_cmp = match (ts(a), ts(b)) {
                    (Some(x), Some(y)) => y.cmp(&x),
                    (None, Some(_)) => std::cmp::Ordering::Less,
                    (Some(_), None) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                };
                if ts_cmp != std::cmp::Ordering::Equal {
                    return ts_cmp;
                }
                let rank = |p: &Vec<Uuid>| p.last().and_then(|id| insertion_rank.get(id)).copied().unwrap_or(usize::MAX);
                rank(b).cmp(&rank(a))
            })
            .unwrap_or_default()
    }

    /// Walks parent pointers upward from `leaf_id`, then reverses. Returns
    /// an empty sequence (never an error) when `leaf_id` is unknown.
    pub fn get_linear_history(&self, leaf_id: Uuid) -> Vec<Uuid> {
        let mut history = Vec::new();
        let mut current = Some(leaf_id);
        let mut depth = 0;
        while let Some(id) = current {
            if depth >= MAX_PATH_DEPTH || !self.message_map.contains_key(&id) {
                break;
            }
            history.push(id);
            current = self.message_map.get(&id).and_then(|m| m.parent_id);
            depth += 1;
        }
        history.reverse();
        history
    }

    /// Number of messages with two or more children (regenerated
    /// responses / branch points).
    pub fn count_branches(&self) -> usize {
        let mut counts: HashMap<Uuid, usize> = HashMap::new();
        for m in self.message_map.values() {
            if let Some(parent) = m.parent_id {
                *counts.entry(parent).or_insert(0) += 1;
            }
        }
        counts.values().filter(|&&c| c >= 2).count()
    }

    /// Full concatenated text along the longest path, in role-tagged
    /// form. Used by the embedding pipeline's `Whole` chunking strategy.
    pub fn longest_path_text(&self) -> String {
        self.get_longest_path()
            .iter()
            .filter_map(|id| self.message_map.get(id))
            .map(|m| m.content.get_text())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Messages along the longest path, in order — the canonical
    /// "flattened" view of a branching tree used by export and embedding.
    pub fn longest_path_messages(&self) -> Vec<&Message> {
        self.get_longest_path()
            .iter()
            .filter_map(|id| self.message_map.get(id))
            .collect()
    }

    pub fn to_summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id,
            title: self.title.clone(),
            created_at: self.metadata.created_at,
            updated_at: self.metadata.updated_at,
            message_count: self.message_map.len(),
            source: self.metadata.source.clone(),
            model: self.metadata.model.clone(),
            tags: self.metadata.tags.clone(),
            project: self.metadata.project.clone(),
            starred_at: self.metadata.starred_at,
            pinned_at: self.metadata.pinned_at,
            archived_at: self.metadata.archived_at,
        }
    }
}

/// Unknown role fallback used by callers constructing a tree from raw
/// strings before `MessageRole::from` normalization.
pub const DEFAULT_ROLE: MessageRole = MessageRole::User;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::MessageContent;
    use crate::message::Message;

    fn msg(role: MessageRole, parent: Option<Uuid>) -> Message {
        let mut m = Message::new(role, MessageContent::from_text("x"));
        m.parent_id = parent;
        m
    }

    #[test]
    fn branching_and_longest_path() {
        let mut tree = ConversationTree::new(Some("t".into()));
        let m1 = msg(MessageRole::User, None);
        let m1_id = m1.id;
        tree.add_message(m1);

        let m2a = msg(MessageRole::Assistant, Some(m1_id));
        let m2a_id = m2a.id;
        tree.add_message(m2a);

        let m2b = msg(MessageRole::Assistant, Some(m1_id));
        tree.add_message(m2b);

        let m3 = msg(MessageRole::User, Some(m2a_id));
        let m3_id = m3.id;
        tree.add_message(m3);

        let m4 = msg(MessageRole::Assistant, Some(m3_id));
        let m4_id = m4.id;
        tree.add_message(m4);

        let paths = tree.get_all_paths();
        assert_eq!(paths.len(), 2);
        assert_eq!(tree.count_branches(), 1);

        let longest = tree.get_longest_path();
        assert_eq!(longest, vec![m1_id, m2a_id, m3_id, m4_id]);
        assert!(paths.contains(&longest));
    }

    #[test]
    fn linear_history_on_missing_id_is_empty() {
        let tree = ConversationTree::new(None);
        assert!(tree.get_linear_history(Uuid::new_v4()).is_empty());
    }

    #[test]
    fn empty_tree_has_no_paths() {
        let tree = ConversationTree::new(None);
        assert!(tree.get_all_paths().is_empty());
        assert!(tree.get_longest_path().is_empty());
    }

    #[test]
    fn serialization_round_trips_structural_equality() {
        let mut tree = ConversationTree::new(Some("hi".into()));
        let m1 = msg(MessageRole::User, None);
        let m1_id = m1.id;
        tree.add_message(m1);
        let m2 = msg(MessageRole::Assistant, Some(m1_id));
        tree.add_message(m2);

        let json = serde_json::to_string(&tree).unwrap();
        let round_tripped: ConversationTree = serde_json::from_str(&json).unwrap();

        assert_eq!(round_tripped.id, tree.id);
        assert_eq!(round_tripped.title, tree.title);
        assert_eq!(round_tripped.root_message_ids, tree.root_message_ids);
        assert_eq!(round_tripped.message_map.len(), tree.message_map.len());
        for (id, m) in &tree.message_map {
            assert_eq!(&round_tripped.message_map[id], m);
        }
    }

    #[test]
    fn save_then_load_preserves_branch_count() {
        let mut tree = ConversationTree::new(None);
        let m1 = msg(MessageRole::User, None);
        let m1_id = m1.id;
        tree.add_message(m1);
        tree.add_message(msg(MessageRole::Assistant, Some(m1_id)));
        tree.add_message(msg(MessageRole::Assistant, Some(m1_id)));

        let json = serde_json::to_string(&tree).unwrap();
        let reloaded: ConversationTree = serde_json::from_str(&json).unwrap();
        assert_eq!(reloaded.count_branches(), tree.count_branches());
    }

    #[test]
    fn adding_message_with_existing_id_replaces_and_keeps_roots_unique() {
        let mut tree = ConversationTree::new(None);
        let mut m1 = msg(MessageRole::User, None);
        let id = m1.id;
        tree.add_message(m1.clone());
        m1.content = MessageContent::from_text("updated");
        tree.add_message(m1);
        assert_eq!(tree.root_message_ids.iter().filter(|r| **r == id).count(), 1);
        assert_eq!(tree.message_map[&id].content.get_text(), "updated");
    }
}
