//! Validation System - Rule/Policy Separation
//!
//! Rules produce structured issues. Validation never fails on a finding;
//! it accumulates every issue and returns them all.

use log::info;
use serde::{Deserialize, Serialize};

use crate::artifacts::{ArtifactLayout, ClipIdentity, ClipRef, Controller, State};
use crate::grouping::{self, AnimationGroups};
use crate::hashing::anim_id_collisions;
use crate::settings::Settings;
use crate::store::{ArtifactStore, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Issue {
    pub rule: String,
    pub severity: IssueSeverity,
    pub character: String,
    /// Animation or state the issue is about, if any.
    pub subject: Option<String>,
    pub location: String,
    pub message: String,
    pub remediation: Vec<String>,
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.subject {
            Some(subject) => write!(f, "[{}] {}/{}: {} => {}", self.rule, self.character, subject, self.message, self.location),
            None => write!(f, "[{}] {}: {} => {}", self.rule, self.character, self.message, self.location),
        }
    }
}

const REBUILD: &str = "Run `spriteforge-cli build` to regenerate the pipeline output";

/// What the rules look at: expected characters and animations plus the
/// artifact locations derived from them.
pub struct ValidationContext<'a> {
    pub layout: &'a ArtifactLayout,
    pub groups: &'a AnimationGroups,
}

/// Validation rule trait - produces issues
pub trait ValidationRule {
    fn name(&self) -> &'static str;
    fn check(
        &self,
        ctx: &ValidationContext<'_>,
        store: &dyn ArtifactStore,
    ) -> Result<Vec<Issue>, StoreError>;
}

/// A load that tells an undecodable artifact apart from a store failure.
enum Loaded<T> {
    Found(T),
    Missing,
    Unreadable(String),
}

fn loaded<T>(result: Result<Option<T>, StoreError>) -> Result<Loaded<T>, StoreError> {
    match result {
        Ok(Some(value)) => Ok(Loaded::Found(value)),
        Ok(None) => Ok(Loaded::Missing),
        Err(StoreError::Encoding { source, .. }) => Ok(Loaded::Unreadable(source.to_string())),
        Err(e) => Err(e),
    }
}

pub const ARTIFACT_ENCODING: &str = "artifact_encoding";

fn unreadable_issue(character: &str, subject: Option<&str>, path: &str, reason: &str) -> Issue {
    Issue {
        rule: ARTIFACT_ENCODING.to_string(),
        severity: IssueSeverity::Error,
        character: character.to_string(),
        subject: subject.map(str::to_string),
        location: path.to_string(),
        message: format!("Artifact cannot be decoded: {}", reason),
        remediation: vec![REBUILD.to_string()],
    }
}

/// Why a state cannot play, if it cannot.
fn motion_defect(store: &dyn ArtifactStore, state: &State) -> Result<Option<&'static str>, StoreError> {
    let Some(motion) = &state.motion else {
        return Ok(Some("has no motion"));
    };
    Ok(match loaded(store.load_clip(&motion.path))? {
        Loaded::Found(clip) if clip.keyframe_count() > 0 => None,
        Loaded::Found(_) => Some("plays a clip with 0 keyframes"),
        Loaded::Missing => Some("references a missing clip"),
        Loaded::Unreadable(_) => Some("references an unreadable clip"),
    })
}

// --- Concrete Rules ---

pub struct ControllerPresenceRule;

impl ValidationRule for ControllerPresenceRule {
    fn name(&self) -> &'static str { "controller_presence" }

    fn check(&self, ctx: &ValidationContext<'_>, store: &dyn ArtifactStore) -> Result<Vec<Issue>, StoreError> {
        let mut issues = vec![];
        for character in ctx.groups.keys() {
            let path = ctx.layout.controller_path(character);
            match loaded(store.load_controller(&path))? {
                Loaded::Found(_) => {}
                Loaded::Missing => issues.push(Issue {
                    rule: self.name().to_string(),
                    severity: IssueSeverity::Error,
                    character: character.to_string(),
                    subject: None,
                    location: path,
                    message: "Missing controller".to_string(),
                    remediation: vec![REBUILD.to_string()],
                }),
                Loaded::Unreadable(reason) => {
                    issues.push(unreadable_issue(character, None, &path, &reason))
                }
            }
        }
        Ok(issues)
    }
}

pub struct ClipPresenceRule;

impl ValidationRule for ClipPresenceRule {
    fn name(&self) -> &'static str { "clip_presence" }

    fn check(&self, ctx: &ValidationContext<'_>, store: &dyn ArtifactStore) -> Result<Vec<Issue>, StoreError> {
        let mut issues = vec![];
        for (character, animations) in ctx.groups.iter() {
            for animation in animations.keys() {
                let path = ctx.layout.clip_path(&ClipIdentity::new(character, animation));
                let message = match loaded(store.load_clip(&path))? {
                    Loaded::Found(clip) if clip.keyframe_count() > 0 => continue,
                    Loaded::Found(_) => "Clip has 0 keyframes (broken)",
                    Loaded::Missing => "Missing clip",
                    Loaded::Unreadable(reason) => {
                        issues.push(unreadable_issue(character, Some(animation), &path, &reason));
                        continue;
                    }
                };
                issues.push(Issue {
                    rule: self.name().to_string(),
                    severity: IssueSeverity::Error,
                    character: character.to_string(),
                    subject: Some(animation.to_string()),
                    location: path,
                    message: message.to_string(),
                    remediation: vec![REBUILD.to_string()],
                });
            }
        }
        Ok(issues)
    }
}

/// States must play a clip that exists and has keyframes.
pub struct StateMotionRule;

impl StateMotionRule {
    fn controller_issues(
        &self,
        store: &dyn ArtifactStore,
        path: &str,
        controller: &Controller,
    ) -> Result<Vec<Issue>, StoreError> {
        let mut issues = vec![];
        for state in &controller.states {
            let Some(defect) = motion_defect(store, state)? else { continue };
            issues.push(Issue {
                rule: self.name().to_string(),
                severity: IssueSeverity::Error,
                character: controller.character.clone(),
                subject: Some(state.name.clone()),
                location: path.to_string(),
                message: format!("State '{}' {}", state.name, defect),
                remediation: vec![
                    "Run `spriteforge-cli fix` to reassign clips found at their expected path".to_string(),
                    REBUILD.to_string(),
                ],
            });
        }
        Ok(issues)
    }
}

impl ValidationRule for StateMotionRule {
    fn name(&self) -> &'static str { "state_motion" }

    fn check(&self, ctx: &ValidationContext<'_>, store: &dyn ArtifactStore) -> Result<Vec<Issue>, StoreError> {
        let mut issues = vec![];
        for character in ctx.groups.keys() {
            let path = ctx.layout.controller_path(character);
            // Unreadable controllers are reported by ControllerPresenceRule.
            if let Loaded::Found(controller) = loaded(store.load_controller(&path))? {
                issues.extend(self.controller_issues(store, &path, &controller)?);
            }
        }
        Ok(issues)
    }
}

pub struct AnimIdCollisionRule;

impl AnimIdCollisionRule {
    fn controller_issues(&self, path: &str, controller: &Controller) -> Vec<Issue> {
        anim_id_collisions(controller.states.iter().map(|s| s.name.as_str()))
            .into_iter()
            .map(|(a, b, id)| Issue {
                rule: self.name().to_string(),
                severity: IssueSeverity::Warning,
                character: controller.character.clone(),
                subject: Some(b.clone()),
                location: path.to_string(),
                message: format!("States '{}' and '{}' share animation id {}", a, b, id),
                remediation: vec!["Rename one of the animations".to_string()],
            })
            .collect()
    }
}

impl ValidationRule for AnimIdCollisionRule {
    fn name(&self) -> &'static str { "anim_id_collision" }

    fn check(&self, ctx: &ValidationContext<'_>, store: &dyn ArtifactStore) -> Result<Vec<Issue>, StoreError> {
        let mut issues = vec![];
        for character in ctx.groups.keys() {
            let path = ctx.layout.controller_path(character);
            if let Loaded::Found(controller) = loaded(store.load_controller(&path))? {
                issues.extend(self.controller_issues(&path, &controller));
            }
        }
        Ok(issues)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixReport {
    pub controllers_scanned: usize,
    pub controllers_fixed: usize,
    pub states_fixed: usize,
    /// Issues left after the fix, from a fresh validation pass.
    pub remaining: Vec<Issue>,
}

/// Validator orchestrates rules over the store
pub struct PipelineValidator {
    settings: Settings,
    layout: ArtifactLayout,
    rules: Vec<Box<dyn ValidationRule>>,
}

impl PipelineValidator {
    pub fn new(settings: Settings) -> Self {
        let layout = settings.layout();
        Self {
            settings,
            layout,
            rules: vec![
                Box::new(ControllerPresenceRule),
                Box::new(ClipPresenceRule),
                Box::new(StateMotionRule),
                Box::new(AnimIdCollisionRule),
            ],
        }
    }

    /// Check the output expected from the current frame pool.
    pub fn validate(&self, store: &dyn ArtifactStore) -> Result<Vec<Issue>, StoreError> {
        let frames = grouping::load_frames(store, &self.settings.sprite_root_folders)?;
        let groups = grouping::group(&frames);
        self.validate_groups(store, &groups)
    }

    pub fn validate_groups(
        &self,
        store: &dyn ArtifactStore,
        groups: &AnimationGroups,
    ) -> Result<Vec<Issue>, StoreError> {
        let ctx = ValidationContext {
            layout: &self.layout,
            groups,
        };

        let mut all_issues = vec![];
        for rule in &self.rules {
            all_issues.extend(rule.check(&ctx, store)?);
        }
        Ok(all_issues)
    }

    /// Full scan of everything under the output root, whether or not the
    /// current frame pool still produces it.
    pub fn validate_project(&self, store: &dyn ArtifactStore) -> Result<Vec<Issue>, StoreError> {
        let root = self.layout.output_root();
        let mut issues = vec![];

        for path in store.list_clips(root)? {
            let clip = match loaded(store.load_clip(&path))? {
                Loaded::Found(clip) => clip,
                Loaded::Missing => continue,
                Loaded::Unreadable(reason) => {
                    let character = self.layout.character_of(&path).unwrap_or_default();
                    issues.push(unreadable_issue(&character, None, &path, &reason));
                    continue;
                }
            };
            if clip.is_corrupt() {
                issues.push(Issue {
                    rule: ClipPresenceRule.name().to_string(),
                    severity: IssueSeverity::Error,
                    character: clip.identity.character.clone(),
                    subject: Some(clip.identity.animation.clone()),
                    location: path,
                    message: "Clip has NO keyframes".to_string(),
                    remediation: vec![REBUILD.to_string()],
                });
            }
        }

        for path in store.list_controllers(root)? {
            let controller = match loaded(store.load_controller(&path))? {
                Loaded::Found(controller) => controller,
                Loaded::Missing => continue,
                Loaded::Unreadable(reason) => {
                    let character = self.layout.character_of(&path).unwrap_or_default();
                    issues.push(unreadable_issue(&character, None, &path, &reason));
                    continue;
                }
            };
            issues.extend(StateMotionRule.controller_issues(store, &path, &controller)?);
            issues.extend(AnimIdCollisionRule.controller_issues(&path, &controller));
        }

        Ok(issues)
    }

    /// Reassign motions to motion-less states from the clip at their expected
    /// path. Never fabricates a clip; states without one stay broken.
    pub fn auto_fix(&self, store: &mut dyn ArtifactStore) -> Result<FixReport, StoreError> {
        let mut report = FixReport::default();

        store.begin_batch()?;
        let result = self.fix_controllers(store, &mut report);
        let ended = store.end_batch();
        result?;
        ended?;

        report.remaining = self.validate(store)?;
        Ok(report)
    }

    fn fix_controllers(&self, store: &mut dyn ArtifactStore, report: &mut FixReport) -> Result<(), StoreError> {
        for path in store.list_controllers(self.layout.output_root())? {
            let Loaded::Found(mut controller) = loaded(store.load_controller(&path))? else { continue };
            report.controllers_scanned += 1;

            let Some(character) = self.layout.character_of(&path) else { continue };
            let mut changed = false;

            for state in controller.states.iter_mut() {
                if motion_defect(store, state)?.is_none() {
                    continue;
                }
                let identity = ClipIdentity::new(character.as_str(), state.name.as_str());
                let expected = self.layout.clip_path(&identity);
                let playable = matches!(
                    loaded(store.load_clip(&expected))?,
                    Loaded::Found(clip) if clip.keyframe_count() > 0
                );
                if !playable {
                    continue;
                }

                info!("[AutoFix] {} -> State '{}' assigned '{}'", character, state.name, identity.clip_name());
                state.motion = Some(ClipRef {
                    path: expected,
                    name: identity.clip_name(),
                });
                report.states_fixed += 1;
                changed = true;
            }

            if changed {
                store.write_controller(&path, &controller)?;
                report.controllers_fixed += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn settings() -> Settings {
        Settings {
            sprite_root_folders: vec!["Art".into()],
            output_root_folder: "Out".into(),
            ..Settings::default()
        }
    }

    #[test]
    fn test_empty_output_reports_everything_missing() {
        let mut store = MemoryStore::new();
        store.add_frames("Art", ["Hero_Walk_1", "Hero_Idle_1"]);

        let issues = PipelineValidator::new(settings()).validate(&store).unwrap();
        let rules: Vec<_> = issues.iter().map(|i| i.rule.as_str()).collect();
        assert_eq!(rules, vec!["controller_presence", "clip_presence", "clip_presence"]);
        assert_eq!(issues[1].subject.as_deref(), Some("Idle"));
        assert_eq!(issues[1].location, "Out/Hero/Hero_Idle.clip");
    }

    #[test]
    fn test_project_scan_finds_orphans() {
        let mut store = MemoryStore::new();
        let mut controller = Controller::new("Ghost");
        controller.states.push(State { name: "Float".into(), motion: None });
        store.write_controller("Out/Ghost/Ghost.controller", &controller).unwrap();

        let validator = PipelineValidator::new(settings());
        assert!(validator.validate(&store).unwrap().is_empty());

        let issues = validator.validate_project(&store).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].subject.as_deref(), Some("Float"));
    }

    #[test]
    fn test_auto_fix_skips_controllers_outside_character_folders() {
        let mut store = MemoryStore::new();
        let mut controller = Controller::new("Loose");
        controller.states.push(State { name: "Idle".into(), motion: None });
        store.write_controller("Out/Loose.controller", &controller).unwrap();

        let report = PipelineValidator::new(settings()).auto_fix(&mut store).unwrap();
        assert_eq!(report.controllers_scanned, 1);
        assert_eq!(report.states_fixed, 0);
        assert_eq!(store.batches_completed(), 1);
    }

    fn state(name: &str, clip: &str) -> State {
        State {
            name: name.into(),
            motion: Some(ClipRef { path: clip.into(), name: name.into() }),
        }
    }

    #[test]
    fn test_dangling_motion_is_reported() {
        let mut store = MemoryStore::new();
        let mut controller = Controller::new("Hero");
        controller.states.push(state("Idle", "Out/Hero/Hero_Idle.clip"));
        store.write_controller("Out/Hero/Hero.controller", &controller).unwrap();

        let issues = PipelineValidator::new(settings()).validate_project(&store).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].rule, "state_motion");
        assert_eq!(issues[0].message, "State 'Idle' references a missing clip");
    }

    #[test]
    fn test_auto_fix_repoints_dangling_motion() {
        let mut store = MemoryStore::new();
        store.add_frames("Art", ["Hero_Idle_1"]);
        let layout = settings().layout();
        let identity = ClipIdentity::new("Hero", "Idle");
        let clip = crate::artifacts::Clip {
            identity: identity.clone(),
            frame_rate: 12.0,
            looping: true,
            keyframes: vec![crate::artifacts::Keyframe {
                time: 0.0,
                frame: crate::grouping::FrameAsset::new("Hero_Idle_1", "Art/Hero_Idle_1.png"),
            }],
        };
        store.write_clip(&layout.clip_path(&identity), &clip).unwrap();

        let mut controller = Controller::new("Hero");
        controller.states.push(state("Idle", "Out/Old/Idle.clip"));
        store.write_controller("Out/Hero/Hero.controller", &controller).unwrap();

        let report = PipelineValidator::new(settings()).auto_fix(&mut store).unwrap();
        assert_eq!(report.states_fixed, 1);
        assert!(report.remaining.is_empty());

        let controller = store.load_controller("Out/Hero/Hero.controller").unwrap().unwrap();
        assert_eq!(
            controller.state("Idle").unwrap().motion.as_ref().unwrap().path,
            "Out/Hero/Hero_Idle.clip"
        );
    }

    #[test]
    fn test_anim_id_collision_is_a_warning() {
        let mut store = MemoryStore::new();
        let mut controller = Controller::new("Hero");
        controller.states.push(State { name: "Anim41816".into(), motion: None });
        controller.states.push(State { name: "Anim203283".into(), motion: None });
        store.write_controller("Out/Hero/Hero.controller", &controller).unwrap();

        let issues = PipelineValidator::new(settings()).validate_project(&store).unwrap();
        let collisions: Vec<_> = issues.iter().filter(|i| i.rule == "anim_id_collision").collect();
        assert_eq!(collisions.len(), 1);
        assert_eq!(collisions[0].severity, IssueSeverity::Warning);
        assert_eq!(collisions[0].subject.as_deref(), Some("Anim203283"));
    }
}
