//! The retrieval engine: document store plus BM25 index behind one lock.
//!
//! Mutations hold the write lock across the store change and the index
//! rebuild, so a search sees either the old or the new index in full.

use crate::config::{validate_k, EngineConfig, TokenizerConfig};
use crate::error::Result;
use crate::index::{Bm25Params, ScoringIndex};
use crate::persist::{MetaFile, Snapshot};
use crate::store::{Document, DocumentStore, Metadata, NewDocument};
use crate::tokenizer::Tokenizer;
use parking_lot::RwLock;
use std::time::Instant;

struct Inner {
    store: DocumentStore,
    index: ScoringIndex,
    /// Number of index rebuilds since construction.
    generation: u64,
}

pub struct Engine {
    config: EngineConfig,
    tokenizer: Tokenizer,
    inner: RwLock<Inner>,
}

impl Engine {
    pub fn new(config: EngineConfig, tokenizer: Tokenizer) -> Result<Self> {
        config.validate()?;
        let params = Bm25Params { k1: config.k1, b: config.b };
        Ok(Self {
            config,
            tokenizer,
            inner: RwLock::new(Inner { store: DocumentStore::new(), index: ScoringIndex::empty(params), generation: 0 }),
        })
    }

    pub fn with_tokenizer_config(config: EngineConfig, tokenizer: &TokenizerConfig) -> Result<Self> {
        Self::new(config, Tokenizer::new(tokenizer))
    }

    pub fn len(&self) -> usize {
        self.inner.read().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().store.is_empty()
    }

    /// Bumped once per index rebuild; a failed mutation leaves it unchanged.
    pub fn index_generation(&self) -> u64 {
        self.inner.read().generation
    }

    pub fn get(&self, id: &str) -> Option<Document> {
        self.inner.read().store.get(id).cloned()
    }

    /// Insert a batch, rebuilding the index once. Returns the assigned ids.
    pub fn add_documents(&self, batch: Vec<NewDocument>) -> Result<Vec<String>> {
        let mut inner = self.inner.write();
        let ids = inner.store.insert_batch(batch)?;
        if !ids.is_empty() {
            self.rebuild(&mut inner);
        }
        tracing::info!(added = ids.len(), num_docs = inner.store.len(), "documents added");
        Ok(ids)
    }

    pub fn update_document(&self, id: &str, content: String, metadata: Metadata) -> Result<()> {
        let mut inner = self.inner.write();
        inner.store.replace(id, content, metadata)?;
        self.rebuild(&mut inner);
        tracing::info!(id, "document updated");
        Ok(())
    }

    pub fn remove_document(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.write();
        inner.store.remove(id)?;
        self.rebuild(&mut inner);
        tracing::info!(id, num_docs = inner.store.len(), "document removed");
        Ok(())
    }

    /// Ranked search. `k` overrides the configured default for this call only.
    pub fn search(&self, query: &str, k: Option<usize>) -> Result<Vec<Document>> {
        self.search_inner(query, k, None)
    }

    /// Ranked search that aborts with `DeadlineExceeded` once `deadline` passes.
    pub fn search_until(&self, query: &str, k: Option<usize>, deadline: Instant) -> Result<Vec<Document>> {
        self.search_inner(query, k, Some(deadline))
    }

    fn search_inner(&self, query: &str, k: Option<usize>, deadline: Option<Instant>) -> Result<Vec<Document>> {
        let k = match k {
            Some(k) => {
                validate_k(k)?;
                k
            }
            None => self.config.default_k,
        };
        let terms = self.tokenizer.tokenize(query);
        let inner = self.inner.read();
        let hits = inner.index.top_k_until(&terms, k, deadline)?;
        let docs = inner.store.documents();
        tracing::debug!(terms = terms.len(), hits = hits.len(), "search");
        Ok(hits.into_iter().map(|hit| docs[hit.doc].clone()).collect())
    }

    /// Consistent copy of the store, suitable for persisting.
    pub fn snapshot(&self) -> Snapshot {
        let inner = self.inner.read();
        let documents = inner.store.documents().to_vec();
        Snapshot { meta: MetaFile::new(documents.len(), inner.store.id_counter()), documents }
    }

    /// Replace the whole store with a snapshot's documents and rebuild once.
    pub fn restore(&self, snapshot: Snapshot) -> Result<()> {
        let store = DocumentStore::from_documents(snapshot.documents, snapshot.meta.next_id)?;
        let mut inner = self.inner.write();
        inner.store = store;
        self.rebuild(&mut inner);
        Ok(())
    }

    /// Re-derive the index from the current store. Called with the write lock held.
    fn rebuild(&self, inner: &mut Inner) {
        let corpus: Vec<Vec<String>> = inner.store.iter().map(|d| self.tokenizer.tokenize(&d.content)).collect();
        inner.index = ScoringIndex::build(&corpus, inner.index.params);
        inner.generation += 1;
        tracing::debug!(generation = inner.generation, num_docs = inner.index.num_docs(), num_terms = inner.index.num_terms(), "index rebuilt");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    fn engine() -> Engine {
        Engine::new(EngineConfig::default(), Tokenizer::default()).unwrap()
    }

    #[test]
    fn rejects_invalid_config() {
        let cfg = EngineConfig { default_k: 0, ..EngineConfig::default() };
        assert!(matches!(Engine::new(cfg, Tokenizer::default()), Err(EngineError::InvalidConfiguration(_))));
    }

    #[test]
    fn rejects_zero_k_override() {
        let e = engine();
        e.add_documents(vec![NewDocument::new("a b c")]).unwrap();
        assert!(matches!(e.search("a", Some(0)), Err(EngineError::InvalidConfiguration(_))));
    }

    #[test]
    fn empty_batch_is_a_noop() {
        let e = engine();
        assert!(e.add_documents(vec![]).unwrap().is_empty());
        assert!(e.is_empty());
    }

    #[test]
    fn update_changes_ranking() {
        let e = engine();
        e.add_documents(vec![NewDocument::new("apples").with_id("a"), NewDocument::new("pears").with_id("b")])
            .unwrap();
        assert_eq!(e.search("pears", Some(1)).unwrap()[0].id, "b");
        e.update_document("a", "pears pears".into(), Metadata::new()).unwrap();
        assert_eq!(e.search("pears", Some(1)).unwrap()[0].id, "a");
    }

    #[test]
    fn snapshot_restore_roundtrip() {
        let e = engine();
        e.add_documents(vec![NewDocument::new("the cat sat"), NewDocument::new("birds fly")]).unwrap();
        let snap = e.snapshot();
        assert_eq!(snap.meta.num_docs, 2);
        assert_eq!(snap.meta.next_id, 2);

        let other = engine();
        other.restore(snap).unwrap();
        assert_eq!(other.search("cat", Some(1)).unwrap()[0].id, "doc_1");
        let ids = other.add_documents(vec![NewDocument::new("x")]).unwrap();
        assert_eq!(ids, vec!["doc_3"]);
    }
}
