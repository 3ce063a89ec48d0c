//! Insertion-ordered document store.
//!
//! Documents live in a `Vec` so iteration order is stable; `positions` maps
//! each id to its slot. Batch inserts are validated against a staged view and
//! only committed once every entry passes.

use crate::config::GENERATED_ID_PREFIX;
use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub type Metadata = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// An entry of an add batch; `id` is generated when absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewDocument {
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub id: Option<String>,
}

impl NewDocument {
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into(), ..Self::default() }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    docs: Vec<Document>,
    positions: HashMap<String, usize>,
    /// Last counter value handed out for a generated id.
    next_id: u64,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Document> {
        self.positions.get(id).map(|&pos| &self.docs[pos])
    }

    /// Documents in store order.
    pub fn iter(&self) -> impl Iterator<Item = &Document> + '_ {
        self.docs.iter()
    }

    pub fn documents(&self) -> &[Document] {
        &self.docs
    }

    pub fn id_counter(&self) -> u64 {
        self.next_id
    }

    /// Insert a batch atomically. Returns the ids in batch order.
    ///
    /// Fails with `DuplicateId` if a supplied id is already stored or is
    /// supplied twice in the batch; in that case nothing changes.
    pub fn insert_batch(&mut self, batch: Vec<NewDocument>) -> Result<Vec<String>> {
        let mut supplied: HashSet<&str> = HashSet::new();
        for entry in &batch {
            if let Some(id) = entry.id.as_deref() {
                if self.contains(id) || !supplied.insert(id) {
                    return Err(EngineError::DuplicateId(id.to_string()));
                }
            }
        }

        let mut counter = self.next_id;
        let mut ids = Vec::with_capacity(batch.len());
        for entry in &batch {
            let id = match &entry.id {
                Some(id) => id.clone(),
                None => loop {
                    counter += 1;
                    let candidate = format!("{GENERATED_ID_PREFIX}{counter}");
                    if !self.contains(&candidate) && !supplied.contains(candidate.as_str()) {
                        break candidate;
                    }
                },
            };
            ids.push(id);
        }

        // Validation is done; from here on nothing can fail.
        self.next_id = counter;
        self.docs.reserve(batch.len());
        for (entry, id) in batch.into_iter().zip(&ids) {
            self.positions.insert(id.clone(), self.docs.len());
            self.docs.push(Document { id: id.clone(), content: entry.content, metadata: entry.metadata });
        }
        Ok(ids)
    }

    /// Replace content and metadata in place, keeping the document's position.
    pub fn replace(&mut self, id: &str, content: String, metadata: Metadata) -> Result<()> {
        let pos = *self
            .positions
            .get(id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        let doc = &mut self.docs[pos];
        doc.content = content;
        doc.metadata = metadata;
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Result<Document> {
        let pos = self
            .positions
            .remove(id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        let doc = self.docs.remove(pos);
        for later in &self.docs[pos..] {
            if let Some(p) = self.positions.get_mut(&later.id) {
                *p -= 1;
            }
        }
        Ok(doc)
    }

    /// Build a store from a full document list, e.g. a snapshot.
    pub fn from_documents(docs: Vec<Document>, next_id: u64) -> Result<Self> {
        let mut positions = HashMap::with_capacity(docs.len());
        for (pos, doc) in docs.iter().enumerate() {
            if positions.insert(doc.id.clone(), pos).is_some() {
                return Err(EngineError::DuplicateId(doc.id.clone()));
            }
        }
        Ok(Self { docs, positions, next_id })
    }
}
