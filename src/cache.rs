use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use sha2::{Digest, Sha256};

use crate::types::EvidenceSnippet;

/// Write-through memo of retrieval results keyed by (question, answer, k).
///
/// Entries are immutable once written and never evicted; a key that exists
/// suppresses the external search call for that exact triple for the rest of
/// the process lifetime. Reads and writes go through an `RwLock` so the
/// runner can share one cache across concurrent item tasks.
#[derive(Debug, Default)]
pub struct EvidenceCache {
    entries: RwLock<HashMap<String, Vec<EvidenceSnippet>>>,
}

fn cache_key(question: &str, answer: &str, k: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{question}::{answer}::k={k}").as_bytes());
    format!("{:x}", hasher.finalize())
}

impl EvidenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a previously flushed snapshot. A missing or unreadable file is
    /// not an error; the cache simply starts empty.
    pub fn load(path: &Path) -> Self {
        let entries = std::fs::read_to_string(path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        Self {
            entries: RwLock::new(entries),
        }
    }

    pub fn get(&self, question: &str, answer: &str, k: usize) -> Option<Vec<EvidenceSnippet>> {
        let entries = self.entries.read().expect("evidence cache lock poisoned");
        entries.get(&cache_key(question, answer, k)).cloned()
    }

    pub fn put(&self, question: &str, answer: &str, k: usize, snippets: Vec<EvidenceSnippet>) {
        let mut entries = self.entries.write().expect("evidence cache lock poisoned");
        entries.insert(cache_key(question, answer, k), snippets);
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("evidence cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Best-effort snapshot to disk. Failures are logged and swallowed; the
    /// in-memory cache stays usable either way.
    pub fn flush(&self, path: &Path) {
        let entries = self.entries.read().expect("evidence cache lock poisoned");
        let write = || -> anyhow::Result<()> {
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            let raw = serde_json::to_string(&*entries)?;
            std::fs::write(path, raw)?;
            Ok(())
        };
        if let Err(err) = write() {
            tracing::warn!(path = %path.display(), %err, "evidence cache flush failed");
        }
    }
}
