//! Artifact Store - the host asset database, as an explicit interface
//!
//! Every component receives the store it works against. Nothing here is global.

use std::collections::BTreeMap;
use thiserror::Error;

use crate::artifacts::{normalize, Clip, Controller};
use crate::grouping::FrameAsset;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt artifact encoding at {path}: {source}")]
    Encoding {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Batch error: {0}")]
    Batch(String),
}

/// Persistent store of named, typed assets.
///
/// Paths use forward slashes and are relative to the store root.
pub trait ArtifactStore {
    fn folder_exists(&self, folder: &str) -> bool;

    /// Frame assets under `folder`, recursively, in a stable order.
    fn frames_in(&self, folder: &str) -> Result<Vec<FrameAsset>, StoreError>;

    fn load_clip(&self, path: &str) -> Result<Option<Clip>, StoreError>;

    fn write_clip(&mut self, path: &str, clip: &Clip) -> Result<(), StoreError>;

    fn load_controller(&self, path: &str) -> Result<Option<Controller>, StoreError>;

    fn write_controller(&mut self, path: &str, controller: &Controller) -> Result<(), StoreError>;

    /// Returns whether anything was deleted.
    fn delete(&mut self, path: &str) -> Result<bool, StoreError>;

    /// Clip paths under `root`, sorted.
    fn list_clips(&self, root: &str) -> Result<Vec<String>, StoreError>;

    /// Controller paths under `root`, sorted.
    fn list_controllers(&self, root: &str) -> Result<Vec<String>, StoreError>;

    /// Start deferring re-indexing. Batches nest.
    fn begin_batch(&mut self) -> Result<(), StoreError>;

    fn end_batch(&mut self) -> Result<(), StoreError>;

    fn exists(&self, path: &str) -> Result<bool, StoreError> {
        Ok(self.load_clip(path)?.is_some() || self.load_controller(path)?.is_some())
    }

    /// Keyframe count read back from the persisted clip; `None` if absent.
    fn clip_keyframe_count(&self, path: &str) -> Result<Option<usize>, StoreError> {
        Ok(self.load_clip(path)?.map(|c| c.keyframe_count()))
    }
}

/// True when `path` is `root` itself or lies below it.
pub(crate) fn is_under(path: &str, root: &str) -> bool {
    let root = root.trim_end_matches('/');
    root.is_empty() || path == root || path.starts_with(&format!("{}/", root))
}

/// In-memory store. Used by tests and by callers embedding the compiler.
///
/// `drop_keyframes_on_next_clip_writes` reproduces the host bug where a
/// freshly written clip persists without its keyframes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    folders: BTreeMap<String, Vec<FrameAsset>>,
    clips: BTreeMap<String, Clip>,
    controllers: BTreeMap<String, Controller>,
    batch_depth: u32,
    batches_completed: u32,
    dropped_writes_pending: u32,
    clip_writes: u32,
    refuse_batches: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a frame under `folder`.
    pub fn add_frame(&mut self, folder: &str, frame: FrameAsset) {
        self.folders.entry(normalize(folder)).or_default().push(frame);
    }

    pub fn add_frames<'a>(&mut self, folder: &str, names: impl IntoIterator<Item = &'a str>) {
        for name in names {
            let image = format!("{}/{}.png", normalize(folder), name);
            self.add_frame(folder, FrameAsset::new(name, image));
        }
    }

    pub fn drop_keyframes_on_next_clip_writes(&mut self, count: u32) {
        self.dropped_writes_pending = count;
    }

    /// Make `begin_batch` fail, as a host that cannot open a transaction would.
    pub fn refuse_batches(&mut self, refuse: bool) {
        self.refuse_batches = refuse;
    }

    pub fn clip_writes(&self) -> u32 {
        self.clip_writes
    }

    pub fn batches_completed(&self) -> u32 {
        self.batches_completed
    }

    pub fn in_batch(&self) -> bool {
        self.batch_depth > 0
    }

    pub fn clip_count(&self) -> usize {
        self.clips.len()
    }
}

impl ArtifactStore for MemoryStore {
    fn folder_exists(&self, folder: &str) -> bool {
        let folder = normalize(folder);
        self.folders.keys().any(|f| is_under(f, &folder))
    }

    fn frames_in(&self, folder: &str) -> Result<Vec<FrameAsset>, StoreError> {
        let folder = normalize(folder);
        Ok(self
            .folders
            .iter()
            .filter(|(f, _)| is_under(f, &folder))
            .flat_map(|(_, frames)| frames.iter().cloned())
            .collect())
    }

    fn load_clip(&self, path: &str) -> Result<Option<Clip>, StoreError> {
        Ok(self.clips.get(&normalize(path)).cloned())
    }

    fn write_clip(&mut self, path: &str, clip: &Clip) -> Result<(), StoreError> {
        self.clip_writes += 1;
        let mut stored = clip.clone();
        if self.dropped_writes_pending > 0 {
            self.dropped_writes_pending -= 1;
            stored.keyframes.clear();
        }
        self.clips.insert(normalize(path), stored);
        Ok(())
    }

    fn load_controller(&self, path: &str) -> Result<Option<Controller>, StoreError> {
        Ok(self.controllers.get(&normalize(path)).cloned())
    }

    fn write_controller(&mut self, path: &str, controller: &Controller) -> Result<(), StoreError> {
        self.controllers.insert(normalize(path), controller.clone());
        Ok(())
    }

    fn delete(&mut self, path: &str) -> Result<bool, StoreError> {
        let path = normalize(path);
        let clip = self.clips.remove(&path).is_some();
        let controller = self.controllers.remove(&path).is_some();
        Ok(clip || controller)
    }

    fn list_clips(&self, root: &str) -> Result<Vec<String>, StoreError> {
        let root = normalize(root);
        Ok(self.clips.keys().filter(|p| is_under(p, &root)).cloned().collect())
    }

    fn list_controllers(&self, root: &str) -> Result<Vec<String>, StoreError> {
        let root = normalize(root);
        Ok(self
            .controllers
            .keys()
            .filter(|p| is_under(p, &root))
            .cloned()
            .collect())
    }

    fn begin_batch(&mut self) -> Result<(), StoreError> {
        if self.refuse_batches {
            return Err(StoreError::Batch("store refused to open a batch".into()));
        }
        self.batch_depth += 1;
        Ok(())
    }

    fn end_batch(&mut self) -> Result<(), StoreError> {
        if self.batch_depth == 0 {
            return Err(StoreError::Batch("end_batch without begin_batch".into()));
        }
        self.batch_depth -= 1;
        if self.batch_depth == 0 {
            self.batches_completed += 1;
        }
        Ok(())
    }
}
