use moka::sync::Cache;
use reach_core::model::ContentItem;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Tool input schemas are compiled on first use and kept by tool name.
pub type CompiledSchema = Arc<jsonschema::JSONSchema>;

pub struct ToolCaches {
    pub schemas: Cache<String, CompiledSchema>,
    pub library: ContentLibrary,
}

impl ToolCaches {
    pub fn new(max_entries: u64) -> Self {
        Self {
            schemas: Cache::new(64),
            library: ContentLibrary::new(max_entries),
        }
    }
}

/// Generated content, keyed by a hash of the generation request.
///
/// Bounded at `max_entries`; moka picks which items to evict.
pub struct ContentLibrary {
    items: Cache<String, ContentItem>,
}

impl ContentLibrary {
    pub fn new(max_entries: u64) -> Self {
        Self {
            items: Cache::new(max_entries),
        }
    }

    pub fn get(&self, key: &str) -> Option<ContentItem> {
        self.items.get(key)
    }

    pub fn insert(&self, key: String, item: ContentItem) {
        self.items.insert(key, item);
    }

    pub fn find_by_id(&self, id: &str) -> Option<ContentItem> {
        self.items
            .iter()
            .map(|(_, item)| item)
            .find(|item| item.id == id)
    }

    /// Every stored item, oldest first.
    pub fn list(&self) -> Vec<ContentItem> {
        let mut all: Vec<ContentItem> = self.items.iter().map(|(_, item)| item).collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        all
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
