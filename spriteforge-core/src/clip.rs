//! Clip Synthesis - ordered frames to a timed, looping clip
//!
//! CRITICAL: every write is read back. A clip that persists with zero
//! keyframes is deleted and rebuilt exactly once, then the clip fails.

use log::{debug, error, warn};

use crate::artifacts::{ArtifactLayout, Clip, ClipIdentity, Keyframe};
use crate::error::CompilerError;
use crate::grouping::FrameAsset;
use crate::store::{ArtifactStore, StoreError};

pub struct ClipSynthesizer {
    layout: ArtifactLayout,
}

impl ClipSynthesizer {
    pub fn new(layout: ArtifactLayout) -> Self {
        Self { layout }
    }

    /// Write the clip for `identity` and verify it.
    ///
    /// Any existing clip at the same path is fully overwritten.
    pub fn synthesize(
        &self,
        store: &mut dyn ArtifactStore,
        identity: &ClipIdentity,
        frames: &[FrameAsset],
        frame_rate: f32,
        looping: bool,
    ) -> Result<Clip, CompilerError> {
        if frames.is_empty() {
            return Err(CompilerError::EmptyGroup {
                character: identity.character.clone(),
                animation: identity.animation.clone(),
            });
        }
        if !frame_rate.is_finite() || frame_rate <= 0.0 {
            return Err(CompilerError::InvalidFrameRate(frame_rate));
        }

        let path = self.layout.clip_path(identity);
        let clip = build_clip(identity, frames, frame_rate, looping);

        let existed = match store.load_clip(&path) {
            Ok(found) => found.is_some(),
            Err(StoreError::Encoding { source, .. }) => {
                warn!("[AnimPipeline] Clip {} is unreadable ({}), overwriting", path, source);
                true
            }
            Err(e) => return Err(e.into()),
        };
        store.write_clip(&path, &clip)?;

        if persisted_keyframes(store, &path)? > 0 {
            debug!(
                "[AnimPipeline] {} clip: {} ({} keys)",
                if existed { "Updated" } else { "Created" },
                path,
                clip.keyframe_count()
            );
            return Ok(clip);
        }

        // Host quirk: a fresh write sometimes loses its keys. Recreate once.
        warn!("[AnimPipeline] Clip {} read back with 0 keys, recreating", path);
        store.delete(&path)?;
        store.write_clip(&path, &clip)?;

        if persisted_keyframes(store, &path)? > 0 {
            return Ok(clip);
        }

        error!("[AnimPipeline] BUG: Clip '{}' has 0 keys even after recreate.", path);
        store.delete(&path)?;
        Err(CompilerError::CorruptClip { path })
    }
}

fn build_clip(identity: &ClipIdentity, frames: &[FrameAsset], frame_rate: f32, looping: bool) -> Clip {
    let keyframes = frames
        .iter()
        .enumerate()
        .map(|(i, frame)| Keyframe {
            time: i as f32 / frame_rate,
            frame: frame.clone(),
        })
        .collect();

    Clip {
        identity: identity.clone(),
        frame_rate,
        looping,
        keyframes,
    }
}

fn persisted_keyframes(store: &dyn ArtifactStore, path: &str) -> Result<usize, CompilerError> {
    Ok(store.clip_keyframe_count(path)?.unwrap_or(0))
}
