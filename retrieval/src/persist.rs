//! On-disk snapshots of the document store.
//!
//! Layout under the snapshot root:
//!
//! ```text
//! meta.json                  current generation, document count, timestamp
//! documents-00000003.json    documents of generation 3
//! ```
//!
//! Every file is written to a temp file in the same directory and renamed
//! into place. A save writes the next generation's documents first and then
//! swaps `meta.json`, so until the swap a reader still sees the previous
//! generation in full.

use crate::store::Document;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const SNAPSHOT_VERSION: u32 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: usize,
    /// Id counter of the store, so generated ids keep increasing after a restore.
    pub next_id: u64,
    /// Selects the documents file; bumped on every save.
    #[serde(default)]
    pub generation: u64,
    pub created_at: String,
    pub version: u32,
}

impl MetaFile {
    pub fn new(num_docs: usize, next_id: u64) -> Self {
        let created_at = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        Self { num_docs, next_id, generation: 0, created_at, version: SNAPSHOT_VERSION }
    }
}

/// Document store contents. The scoring index is never persisted; it is
/// re-derived on restore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub meta: MetaFile,
    pub documents: Vec<Document>,
}

pub struct SnapshotPaths {
    pub root: PathBuf,
}

impl SnapshotPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    fn documents(&self, generation: u64) -> PathBuf {
        self.root.join(format!("documents-{generation:08}.json"))
    }

    /// True once a save has completed; `meta.json` is only ever renamed into place.
    pub fn exists(&self) -> bool {
        self.meta().is_file()
    }
}

/// Serialize `value` next to `path` and rename it over `path`.
fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T, pretty: bool) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut w = BufWriter::new(tmp.as_file_mut());
        if pretty {
            serde_json::to_writer_pretty(&mut w, value)?;
        } else {
            serde_json::to_writer(&mut w, value)?;
        }
        w.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let value = serde_json::from_reader(BufReader::new(f))
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(value)
}

pub fn load_meta(paths: &SnapshotPaths) -> Result<MetaFile> {
    read_json(&paths.meta())
}

pub fn save_documents(paths: &SnapshotPaths, generation: u64, docs: &[Document]) -> Result<()> {
    write_json_atomic(&paths.documents(generation), docs, false)
}

pub fn load_documents(paths: &SnapshotPaths, generation: u64) -> Result<Vec<Document>> {
    read_json(&paths.documents(generation))
}

/// Write the next generation. The previous documents file is removed only
/// after the new `meta.json` is in place.
pub fn save_snapshot(paths: &SnapshotPaths, snapshot: &Snapshot) -> Result<()> {
    let previous = if paths.exists() { Some(load_meta(paths)?.generation) } else { None };
    let generation = previous.map_or(1, |g| g + 1);

    save_documents(paths, generation, &snapshot.documents)?;
    let meta = MetaFile { generation, num_docs: snapshot.documents.len(), ..snapshot.meta.clone() };
    write_json_atomic(&paths.meta(), &meta, true)?;

    if let Some(old) = previous {
        if let Err(err) = fs::remove_file(paths.documents(old)) {
            tracing::warn!(generation = old, error = %err, "could not remove superseded snapshot documents");
        }
    }
    tracing::debug!(generation, num_docs = meta.num_docs, "snapshot saved");
    Ok(())
}

pub fn load_snapshot(paths: &SnapshotPaths) -> Result<Snapshot> {
    let meta = load_meta(paths)?;
    if meta.version != SNAPSHOT_VERSION {
        anyhow::bail!("unsupported snapshot version {}", meta.version);
    }
    let documents = load_documents(paths, meta.generation)?;
    if documents.len() != meta.num_docs {
        anyhow::bail!("snapshot meta lists {} documents, found {}", meta.num_docs, documents.len());
    }
    Ok(Snapshot { meta, documents })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Metadata;

    fn doc(id: &str, content: &str) -> Document {
        Document { id: id.into(), content: content.into(), metadata: Metadata::new() }
    }

    fn snapshot(docs: Vec<Document>) -> Snapshot {
        Snapshot { meta: MetaFile::new(docs.len(), docs.len() as u64), documents: docs }
    }

    #[test]
    fn saves_advance_generation_and_drop_old_files() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SnapshotPaths::new(dir.path());
        assert!(!paths.exists());

        save_snapshot(&paths, &snapshot(vec![doc("a", "x")])).unwrap();
        save_snapshot(&paths, &snapshot(vec![doc("a", "x"), doc("b", "y")])).unwrap();

        let loaded = load_snapshot(&paths).unwrap();
        assert_eq!(loaded.meta.generation, 2);
        assert_eq!(loaded.documents.len(), 2);
        assert!(!paths.documents(1).exists());
        assert!(paths.documents(2).exists());
    }

    #[test]
    fn interrupted_save_keeps_previous_generation_loadable() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SnapshotPaths::new(dir.path());
        save_snapshot(&paths, &snapshot(vec![doc("a", "x"), doc("b", "y")])).unwrap();

        // the next save got as far as its documents file, then stopped
        let next = vec![doc("a", "x"), doc("b", "y"), doc("c", "z")];
        save_documents(&paths, 2, &next).unwrap();

        let loaded = load_snapshot(&paths).unwrap();
        assert_eq!(loaded.meta.generation, 1);
        assert_eq!(loaded.documents, vec![doc("a", "x"), doc("b", "y")]);

        // a later complete save takes over cleanly
        save_snapshot(&paths, &snapshot(next)).unwrap();
        assert_eq!(load_snapshot(&paths).unwrap().documents.len(), 3);
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SnapshotPaths::new(dir.path());
        save_snapshot(&paths, &snapshot(vec![doc("a", "x")])).unwrap();
        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["documents-00000001.json", "meta.json"]);
    }
}
