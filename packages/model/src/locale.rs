//! Per-locale display-string cache
//!
//! Rendering collaborators resolve localized display strings (processed
//! titles, numbered headings) per node and per locale. Computing them walks
//! markdown/placeholder processing, so results are cached here and the editor
//! invalidates only the subtrees a structural change touched.

use crate::SchemaNode;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct LocaleCache {
    entries: HashMap<String, HashMap<String, String>>,
}

impl LocaleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, node_id: &str, locale: &str) -> Option<&str> {
        self.entries
            .get(node_id)
            .and_then(|locales| locales.get(locale))
            .map(String::as_str)
    }

    pub fn insert(&mut self, node_id: &str, locale: &str, text: String) {
        self.entries
            .entry(node_id.to_string())
            .or_default()
            .insert(locale.to_string(), text);
    }

    /// Drop every cached string for one node, all locales
    pub fn invalidate(&mut self, node_id: &str) {
        self.entries.remove(node_id);
    }

    /// Drop cached strings for a whole subtree. The subtree is passed as a
    /// node (live or a detached snapshot) because after a removal the ids are
    /// no longer reachable through the document.
    pub fn invalidate_subtree(&mut self, subtree: &SchemaNode) {
        let mut ids = Vec::new();
        subtree.collect_ids(&mut ids);
        for id in ids {
            self.entries.remove(&id);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
