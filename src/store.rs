use std::collections::HashMap;
use std::sync::Mutex;

/// Extracted document text retained in memory, keyed by filename and
/// ingestion time.
///
/// The chat flow only ever writes here; entries are never evicted, so the
/// map grows for the life of the process. See DESIGN.md for the open
/// repurposing question.
#[derive(Debug, Default)]
pub struct DocumentStore {
    entries: Mutex<HashMap<String, String>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert extracted text, returning the generated cache key.
    pub fn insert(&self, filename: &str, text: String) -> String {
        let key = format!("{}_{}", filename, chrono::Utc::now().timestamp());
        self.entries.lock().unwrap().insert(key.clone(), text);
        key
    }

    /// Look up a previously ingested document.
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    /// Number of cached documents.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserted_text_is_retrievable_by_key() {
        let store = DocumentStore::new();
        let key = store.insert("notes.txt", "alpha".to_string());
        assert!(key.starts_with("notes.txt_"));
        assert_eq!(store.get(&key).as_deref(), Some("alpha"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn unknown_key_is_none() {
        let store = DocumentStore::new();
        assert!(store.get("missing").is_none());
        assert!(store.is_empty());
    }
}
