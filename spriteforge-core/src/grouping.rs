//! Frame Grouping - Character -> Animation -> ordered frames

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::naming;
use crate::store::{ArtifactStore, StoreError};

/// Opaque handle to the image behind a frame. Owned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageHandle(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameAsset {
    pub name: String,
    pub image: ImageHandle,
}

impl FrameAsset {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: ImageHandle(image.into()),
        }
    }
}

/// Case-insensitive key folding. Ordinal ignore-case semantics.
pub fn fold(s: &str) -> String {
    s.to_uppercase()
}

/// Case-insensitive comparison with a raw-string tie-break, so the order is total.
pub fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    fold(a).cmp(&fold(b)).then_with(|| a.cmp(b))
}

/// Map with case-insensitive keys. Keeps the first-seen spelling for display
/// and iterates in folded lexicographic order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldedMap<V> {
    entries: BTreeMap<String, (String, V)>,
}

impl<V> FoldedMap<V> {
    pub fn new() -> Self {
        Self { entries: BTreeMap::new() }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(&fold(key)).map(|(_, v)| v)
    }

    /// Display spelling stored for `key`.
    pub fn display_key(&self, key: &str) -> Option<&str> {
        self.entries.get(&fold(key)).map(|(k, _)| k.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&fold(key))
    }

    /// Insert or replace the value. An existing key keeps its first spelling.
    pub fn insert(&mut self, key: &str, value: V) {
        match self.entries.get_mut(&fold(key)) {
            Some(slot) => slot.1 = value,
            None => {
                self.entries.insert(fold(key), (key.to_string(), value));
            }
        }
    }

    pub fn get_or_insert_with(&mut self, key: &str, f: impl FnOnce() -> V) -> &mut V {
        &mut self
            .entries
            .entry(fold(key))
            .or_insert_with(|| (key.to_string(), f()))
            .1
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.values().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> Default for FoldedMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// character -> animation -> ordered frames
pub type AnimationGroups = FoldedMap<FoldedMap<Vec<FrameAsset>>>;

/// Group a flat frame pool. Frames whose names do not parse are skipped.
pub fn group(frames: &[FrameAsset]) -> AnimationGroups {
    let mut groups = AnimationGroups::new();

    for frame in frames {
        let parsed = match naming::parse(&frame.name) {
            Ok(p) => p,
            Err(e) => {
                debug!("[AnimPipeline] skipped frame: {}", e);
                continue;
            }
        };

        groups
            .get_or_insert_with(&parsed.character, FoldedMap::new)
            .get_or_insert_with(&parsed.animation, Vec::new)
            .push(frame.clone());
    }

    for (_, animations) in groups.entries.values_mut() {
        for (_, frames) in animations.entries.values_mut() {
            order_frames(frames);
        }
    }

    groups
}

/// Frame index ascending, then name case-insensitively.
pub fn order_frames(frames: &mut [FrameAsset]) {
    frames.sort_by(|a, b| {
        naming::frame_index(&a.name)
            .cmp(&naming::frame_index(&b.name))
            .then_with(|| cmp_ignore_case(&a.name, &b.name))
    });
}

/// Enumerate frames under every configured root folder. Missing folders are
/// logged and skipped; blank entries are ignored.
pub fn load_frames(
    store: &dyn ArtifactStore,
    folders: &[String],
) -> Result<Vec<FrameAsset>, StoreError> {
    let mut frames = vec![];

    for folder in folders.iter().filter(|f| !f.trim().is_empty()) {
        if !store.folder_exists(folder) {
            warn!("[AnimPipeline] Folder not found: {}", folder);
            continue;
        }
        frames.extend(store.frames_in(folder)?);
    }

    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(names: &[&str]) -> Vec<FrameAsset> {
        names.iter().map(|n| FrameAsset::new(*n, format!("img/{}.png", n))).collect()
    }

    fn names(frames: &[FrameAsset]) -> Vec<&str> {
        frames.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn test_natural_order() {
        let groups = group(&frames(&["Hero_Walk_2", "Hero_Walk_10", "Hero_Walk_1"]));
        let walk = groups.get("Hero").unwrap().get("Walk").unwrap();
        assert_eq!(names(walk), vec!["Hero_Walk_1", "Hero_Walk_2", "Hero_Walk_10"]);
    }

    #[test]
    fn test_index_ties_sort_by_name() {
        let groups = group(&frames(&["Hero_Idle_b", "Hero_Idle_A", "Hero_Idle_c"]));
        // No trailing digits: each name is its own animation.
        assert_eq!(groups.get("hero").unwrap().len(), 3);

        let mut tied = frames(&["Hero_Walk_b1", "Hero_Walk_A1", "Hero_Walk_c1"]);
        order_frames(&mut tied);
        assert_eq!(names(&tied), vec!["Hero_Walk_A1", "Hero_Walk_b1", "Hero_Walk_c1"]);
    }

    #[test]
    fn test_case_insensitive_keys_keep_first_spelling() {
        let groups = group(&frames(&["hero_walk_1", "HERO_Walk_2", "Hero_WALK_3"]));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups.keys().collect::<Vec<_>>(), vec!["hero"]);
        let anims = groups.get("Hero").unwrap();
        assert_eq!(anims.display_key("WALK"), Some("walk"));
        assert_eq!(anims.get("Walk").unwrap().len(), 3);
    }

    #[test]
    fn test_skips_unmatched() {
        let groups = group(&frames(&["background", "_Walk_1", "Hero_Walk_1"]));
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn test_iteration_is_folded_lexicographic() {
        let groups = group(&frames(&["Zed_Idle", "alpha_Idle", "Beta_Idle"]));
        assert_eq!(groups.keys().collect::<Vec<_>>(), vec!["alpha", "Beta", "Zed"]);
    }
}
