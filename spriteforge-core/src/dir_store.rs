//! Directory Store - artifacts as canonical JSON files under a project root
//!
//! Frames are image files; the frame name is the file stem. The artifact
//! index is only rewritten when the outermost batch ends.

use log::debug;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::artifacts::{normalize, Clip, Controller, CLIP_EXTENSION, CONTROLLER_EXTENSION};
use crate::grouping::FrameAsset;
use crate::hashing::{artifact_hash, canonical_json};
use crate::store::{is_under, ArtifactStore, StoreError};

pub const INDEX_FILE: &str = ".spriteforge-index.json";

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tga", "bmp", "gif", "psd"];

pub struct DirStore {
    root: PathBuf,
    batch_depth: u32,
    /// path -> Some(hash) for writes, None for deletes, since the last flush
    pending_index: BTreeMap<String, Option<String>>,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            batch_depth: 0,
            pending_index: BTreeMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Artifact path -> SHA-256 of its canonical JSON.
    pub fn read_index(&self) -> Result<BTreeMap<String, String>, StoreError> {
        Ok(self.read_json(INDEX_FILE)?.unwrap_or_default())
    }

    fn abs(&self, path: &str) -> PathBuf {
        self.root.join(normalize(path).trim_start_matches('/'))
    }

    fn rel(&self, abs: &Path) -> String {
        let rel = abs.strip_prefix(&self.root).unwrap_or(abs);
        normalize(&rel.to_string_lossy())
    }

    fn read_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, StoreError> {
        let abs = self.abs(path);
        if !abs.is_file() {
            return Ok(None);
        }
        let content = fs::read_to_string(&abs).map_err(|source| io(path, source))?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| StoreError::Encoding {
                path: path.to_string(),
                source,
            })
    }

    fn write_json<T: Serialize>(&mut self, path: &str, value: &T) -> Result<(), StoreError> {
        let encoded = canonical_json(value).map_err(|source| StoreError::Encoding {
            path: path.to_string(),
            source,
        })?;
        let abs = self.abs(path);
        if let Some(parent) = abs.parent() {
            fs::create_dir_all(parent).map_err(|source| io(path, source))?;
        }
        fs::write(&abs, encoded).map_err(|source| io(path, source))?;

        let hash = artifact_hash(value).map_err(|source| StoreError::Encoding {
            path: path.to_string(),
            source,
        })?;
        self.pending_index.insert(normalize(path), Some(hash));
        self.flush_if_idle()
    }

    fn files_under(&self, folder: &str, keep: &dyn Fn(&Path) -> bool) -> Result<Vec<String>, StoreError> {
        let mut out = vec![];
        let start = self.abs(folder);
        if start.is_dir() {
            walk(&start, &mut |p: &Path| {
                if keep(p) {
                    out.push(self.rel(p));
                }
            })
            .map_err(|source| io(folder, source))?;
        }
        out.sort();
        Ok(out)
    }

    fn list_with_extension(&self, root: &str, ext: &str) -> Result<Vec<String>, StoreError> {
        let root = normalize(root);
        let mut paths = self.files_under(&root, &|p: &Path| has_extension(p, &[ext]))?;
        paths.retain(|p| is_under(p, &root));
        Ok(paths)
    }

    fn flush_if_idle(&mut self) -> Result<(), StoreError> {
        if self.batch_depth > 0 || self.pending_index.is_empty() {
            return Ok(());
        }

        let mut index = self.read_index()?;
        for (path, hash) in std::mem::take(&mut self.pending_index) {
            match hash {
                Some(h) => index.insert(path, h),
                None => index.remove(&path),
            };
        }

        let encoded = canonical_json(&index).map_err(|source| StoreError::Encoding {
            path: INDEX_FILE.to_string(),
            source,
        })?;
        fs::create_dir_all(&self.root).map_err(|source| io(INDEX_FILE, source))?;
        fs::write(self.abs(INDEX_FILE), encoded).map_err(|source| io(INDEX_FILE, source))?;
        debug!("[DirStore] index updated: {} artifacts", index.len());
        Ok(())
    }
}

fn io(path: &str, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_string(),
        source,
    }
}

fn has_extension(path: &Path, exts: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| exts.iter().any(|x| x.eq_ignore_ascii_case(e)))
}

fn walk(dir: &Path, visit: &mut dyn FnMut(&Path)) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk(&path, visit)?;
        } else {
            visit(&path);
        }
    }
    Ok(())
}

impl ArtifactStore for DirStore {
    fn folder_exists(&self, folder: &str) -> bool {
        self.abs(folder).is_dir()
    }

    fn frames_in(&self, folder: &str) -> Result<Vec<FrameAsset>, StoreError> {
        let paths = self.files_under(folder, &|p: &Path| has_extension(p, IMAGE_EXTENSIONS))?;
        Ok(paths
            .into_iter()
            .filter_map(|rel| {
                let name = Path::new(&rel).file_stem()?.to_str()?.to_string();
                Some(FrameAsset::new(name, rel))
            })
            .collect())
    }

    fn load_clip(&self, path: &str) -> Result<Option<Clip>, StoreError> {
        if !has_extension(Path::new(path), &[CLIP_EXTENSION]) {
            return Ok(None);
        }
        self.read_json(path)
    }

    fn write_clip(&mut self, path: &str, clip: &Clip) -> Result<(), StoreError> {
        self.write_json(path, clip)
    }

    fn load_controller(&self, path: &str) -> Result<Option<Controller>, StoreError> {
        if !has_extension(Path::new(path), &[CONTROLLER_EXTENSION]) {
            return Ok(None);
        }
        self.read_json(path)
    }

    fn write_controller(&mut self, path: &str, controller: &Controller) -> Result<(), StoreError> {
        self.write_json(path, controller)
    }

    fn delete(&mut self, path: &str) -> Result<bool, StoreError> {
        let abs = self.abs(path);
        if !abs.is_file() {
            return Ok(false);
        }
        fs::remove_file(&abs).map_err(|source| io(path, source))?;
        self.pending_index.insert(normalize(path), None);
        self.flush_if_idle()?;
        Ok(true)
    }

    fn list_clips(&self, root: &str) -> Result<Vec<String>, StoreError> {
        self.list_with_extension(root, CLIP_EXTENSION)
    }

    fn list_controllers(&self, root: &str) -> Result<Vec<String>, StoreError> {
        self.list_with_extension(root, CONTROLLER_EXTENSION)
    }

    fn begin_batch(&mut self) -> Result<(), StoreError> {
        if !self.root.is_dir() {
            return Err(StoreError::Batch(format!(
                "project root {} is not a directory",
                self.root.display()
            )));
        }
        self.batch_depth += 1;
        Ok(())
    }

    fn end_batch(&mut self) -> Result<(), StoreError> {
        if self.batch_depth == 0 {
            return Err(StoreError::Batch("end_batch without begin_batch".into()));
        }
        self.batch_depth -= 1;
        self.flush_if_idle()
    }
}
