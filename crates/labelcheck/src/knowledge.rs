//! Read-once reference corpus shared by every request.
//!
//! The corpus is advisory prompt material. A missing directory or an
//! unreadable file degrades to an empty or smaller corpus with a warning,
//! mirroring how the service treats every non-essential input.

use std::fs;
use std::path::Path;

use tracing::warn;

/// One reference document, typically a Markdown file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeDoc {
    pub name: String,
    pub body: String,
}

/// Immutable set of reference documents loaded at startup.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    docs: Vec<KnowledgeDoc>,
}

impl KnowledgeBase {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_docs(docs: Vec<KnowledgeDoc>) -> Self {
        Self { docs }
    }

    /// Loads every Markdown file in `dir`, sorted by file name so the prompt
    /// composition is deterministic across restarts.
    pub fn load(dir: &Path) -> Self {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(dir = %dir.display(), %err, "knowledge base directory unavailable, continuing without it");
                return Self::empty();
            }
        };

        let mut docs = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("md") {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            match fs::read_to_string(&path) {
                Ok(body) if !body.trim().is_empty() => docs.push(KnowledgeDoc { name, body }),
                Ok(_) => {}
                Err(err) => {
                    warn!(file = %path.display(), %err, "skipping unreadable knowledge document");
                }
            }
        }

        docs.sort_by(|a, b| a.name.cmp(&b.name));
        Self { docs }
    }

    pub fn docs(&self) -> &[KnowledgeDoc] {
        &self.docs
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}
