//! Compilation Pipeline - Single Entry Point
//!
//! CRITICAL: all artifact writes of one run happen inside one store batch.
//! Per-clip and per-character failures are recorded, never propagated.

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::artifacts::{Clip, ClipIdentity};
use crate::clip::ClipSynthesizer;
use crate::controller::ControllerSynthesizer;
use crate::error::CompilerError;
use crate::grouping::{self, FoldedMap, FrameAsset};
use crate::naming;
use crate::settings::{Settings, SettingsError};
use crate::store::{ArtifactStore, StoreError};
use crate::ENGINE_VERSION;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Settings require engine >= {0}, current is {1}")]
    EngineVersionMismatch(String, String),

    #[error("Settings spriteRootFolders is empty")]
    NoSourceFolders,

    #[error("Store transaction failed: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Failure {
    pub character: String,
    pub animation: Option<String>,
    pub kind: String,
    pub reason: String,
}

impl Failure {
    fn new(character: &str, animation: Option<&str>, err: &CompilerError) -> Self {
        Self {
            character: character.to_string(),
            animation: animation.map(str::to_string),
            kind: err.kind().to_string(),
            reason: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CharacterOutcome {
    pub character: String,
    pub clips: usize,
    pub controller: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub engine_version: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub frames_scanned: usize,
    pub unmatched_frames: Vec<String>,
    pub clips_touched: usize,
    pub controllers_touched: usize,
    pub characters: Vec<CharacterOutcome>,
    pub failures: Vec<Failure>,
}

impl RunReport {
    fn start(frames: &[FrameAsset]) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4().to_string(),
            engine_version: ENGINE_VERSION.to_string(),
            started_at: now,
            finished_at: now,
            frames_scanned: frames.len(),
            unmatched_frames: frames
                .iter()
                .filter(|f| naming::parse(&f.name).is_err())
                .map(|f| f.name.clone())
                .collect(),
            clips_touched: 0,
            controllers_touched: 0,
            characters: vec![],
            failures: vec![],
        }
    }

    /// No failures. Does not mean the output is valid; run the validator.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Done. Clips created/updated: {}, Controllers created/updated: {}",
            self.clips_touched, self.controllers_touched
        )?;
        writeln!(f, "Frames scanned: {} (unmatched: {})", self.frames_scanned, self.unmatched_frames.len())?;
        for c in &self.characters {
            match (c.clips, c.controller) {
                (0, _) => writeln!(f, "- {}: Clips=0 (no valid sprites matched naming)", c.character)?,
                (n, true) => writeln!(f, "- {}: Clips={} Controller=OK", c.character, n)?,
                (n, false) => writeln!(f, "- {}: Clips={} Controller=FAILED", c.character, n)?,
            }
        }
        writeln!(f, "Failures: {}", self.failures.len())?;
        for failure in &self.failures {
            match &failure.animation {
                Some(anim) => writeln!(f, "- {}/{}: {}", failure.character, anim, failure.reason)?,
                None => writeln!(f, "- {}: {}", failure.character, failure.reason)?,
            }
        }
        Ok(())
    }
}

/// The compilation pipeline - frame pool in, clips and controllers out
pub struct CompilationPipeline {
    settings: Settings,
    clips: ClipSynthesizer,
    controllers: ControllerSynthesizer,
}

impl CompilationPipeline {
    pub fn new(settings: Settings) -> Self {
        let layout = settings.layout();
        Self {
            clips: ClipSynthesizer::new(layout.clone()),
            controllers: ControllerSynthesizer::new(layout, settings.anim_id_parameter_name.clone()),
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Rebuild every clip and controller derivable from the frame pool.
    ///
    /// Safe to re-run: unchanged input converges to unchanged output.
    pub fn build_all(&self, store: &mut dyn ArtifactStore) -> Result<RunReport, PipelineError> {
        self.settings.validate()?;
        self.check_engine_version()?;

        if self.settings.sprite_root_folders.iter().all(|f| f.trim().is_empty()) {
            return Err(PipelineError::NoSourceFolders);
        }

        let frames = grouping::load_frames(store, &self.settings.sprite_root_folders)?;
        let mut report = RunReport::start(&frames);
        if frames.is_empty() {
            warn!("[AnimPipeline] No sprites found in the configured folders.");
            report.finished_at = Utc::now();
            return Ok(report);
        }

        let groups = grouping::group(&frames);

        store.begin_batch()?;
        for (character, animations) in groups.iter() {
            self.build_character(store, character, animations, &mut report);
        }
        store.end_batch()?;

        report.finished_at = Utc::now();
        info!(
            "[AnimPipeline] Done. Clips created/updated: {}, Controllers created/updated: {}, Failures: {}",
            report.clips_touched,
            report.controllers_touched,
            report.failures.len()
        );
        Ok(report)
    }

    fn build_character(
        &self,
        store: &mut dyn ArtifactStore,
        character: &str,
        animations: &FoldedMap<Vec<FrameAsset>>,
        report: &mut RunReport,
    ) {
        let mut clip_by_anim: FoldedMap<Clip> = FoldedMap::new();

        for (animation, frames) in animations.iter() {
            let identity = ClipIdentity::new(character, animation);
            match self.clips.synthesize(
                store,
                &identity,
                frames,
                self.settings.default_frame_rate,
                self.settings.loop_all_clips,
            ) {
                Ok(clip) => {
                    clip_by_anim.insert(animation, clip);
                    report.clips_touched += 1;
                }
                Err(e) => {
                    warn!("[AnimPipeline] {}/{}: {}", character, animation, e);
                    report.failures.push(Failure::new(character, Some(animation), &e));
                }
            }
        }

        let mut outcome = CharacterOutcome {
            character: character.to_string(),
            clips: clip_by_anim.len(),
            controller: false,
        };

        if clip_by_anim.is_empty() {
            report.characters.push(outcome);
            return;
        }

        match self.controllers.synthesize(store, character, &clip_by_anim) {
            Ok(_) => {
                outcome.controller = true;
                report.controllers_touched += 1;
            }
            Err(e) => {
                warn!("[AnimPipeline] {}: {}", character, e);
                report.failures.push(Failure::new(character, None, &e));
            }
        }
        report.characters.push(outcome);
    }

    fn check_engine_version(&self) -> Result<(), PipelineError> {
        let engine_ver = semver::Version::parse(ENGINE_VERSION)
            .map_err(|_| PipelineError::EngineVersionMismatch(self.settings.engine_min_version.clone(), ENGINE_VERSION.to_string()))?;
        let min_ver = semver::Version::parse(&self.settings.engine_min_version)
            .map_err(|e| SettingsError::Invalid {
                field: "engineMinVersion",
                reason: e.to_string(),
            })?;

        if engine_ver < min_ver {
            return Err(PipelineError::EngineVersionMismatch(
                self.settings.engine_min_version.clone(),
                ENGINE_VERSION.to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for CompilationPipeline {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn settings() -> Settings {
        Settings {
            sprite_root_folders: vec!["Art".into(), "Missing".into()],
            output_root_folder: "Out".into(),
            ..Settings::default()
        }
    }

    #[test]
    fn test_build_writes_inside_one_batch() {
        let mut store = MemoryStore::new();
        store.add_frames("Art/Hero", ["Hero_Walk_1", "Hero_Walk_2", "Hero_Idle"]);
        store.add_frames("Art/Slime", ["Slime_Bounce_1", "notes"]);

        let report = CompilationPipeline::new(settings()).build_all(&mut store).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.clips_touched, 3);
        assert_eq!(report.controllers_touched, 2);
        assert_eq!(report.unmatched_frames, vec!["notes"]);
        assert_eq!(store.batches_completed(), 1);
        assert!(!store.in_batch());
    }

    #[test]
    fn test_no_frames_is_not_an_error() {
        let mut store = MemoryStore::new();
        let report = CompilationPipeline::new(settings()).build_all(&mut store).unwrap();
        assert_eq!(report.frames_scanned, 0);
        assert_eq!(store.batches_completed(), 0);
    }

    #[test]
    fn test_refused_batch_aborts_run() {
        let mut store = MemoryStore::new();
        store.add_frames("Art", ["Hero_Walk_1"]);
        store.refuse_batches(true);
        let err = CompilationPipeline::new(settings()).build_all(&mut store).unwrap_err();
        assert!(matches!(err, PipelineError::Store(_)));
        assert_eq!(store.clip_writes(), 0);
    }

    #[test]
    fn test_engine_version_gate() {
        let mut s = settings();
        s.engine_min_version = "99.0.0".into();
        let err = CompilationPipeline::new(s).build_all(&mut MemoryStore::new()).unwrap_err();
        assert!(err.to_string().contains("require engine >= 99.0.0"));
    }

    #[test]
    fn test_no_source_folders() {
        let mut s = settings();
        s.sprite_root_folders = vec!["  ".into()];
        let err = CompilationPipeline::new(s).build_all(&mut MemoryStore::new()).unwrap_err();
        assert!(matches!(err, PipelineError::NoSourceFolders));
    }
}
