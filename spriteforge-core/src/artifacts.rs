//! Artifact Model - Clips and Controllers
//!
//! Encoding is left to the store; these are the shapes it persists.

use serde::{Deserialize, Serialize};

use crate::grouping::{fold, FrameAsset};
use crate::naming::sanitize_file_part;

pub const CLIP_EXTENSION: &str = "clip";
pub const CONTROLLER_EXTENSION: &str = "controller";

/// Blend duration for generated AnyState transitions, in seconds.
pub const TRANSITION_DURATION: f32 = 0.05;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipIdentity {
    pub character: String,
    pub animation: String,
}

impl ClipIdentity {
    pub fn new(character: impl Into<String>, animation: impl Into<String>) -> Self {
        Self {
            character: character.into(),
            animation: animation.into(),
        }
    }

    /// Artifact name, `Character_Animation` with the animation sanitized.
    pub fn clip_name(&self) -> String {
        format!("{}_{}", self.character, sanitize_file_part(&self.animation))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub time: f32,
    pub frame: FrameAsset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub identity: ClipIdentity,
    pub frame_rate: f32,
    pub looping: bool,
    pub keyframes: Vec<Keyframe>,
}

impl Clip {
    pub fn keyframe_count(&self) -> usize {
        self.keyframes.len()
    }

    /// Clips with no keyframes are corrupt.
    pub fn is_corrupt(&self) -> bool {
        self.keyframes.is_empty()
    }
}

/// Reference from a controller state to a clip artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipRef {
    pub path: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    Int,
    Float,
    Bool,
    Trigger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub kind: ParameterKind,
    #[serde(default)]
    pub default_int: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionMode {
    Equals,
    NotEqual,
    Greater,
    Less,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub mode: ConditionMode,
    pub parameter: String,
    pub threshold: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub name: String,
    #[serde(default)]
    pub motion: Option<ClipRef>,
}

/// Transition evaluated from any state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub destination: String,
    pub conditions: Vec<Condition>,
    pub has_exit_time: bool,
    pub has_fixed_duration: bool,
    pub duration: f32,
    pub can_transition_to_self: bool,
}

impl Transition {
    /// True when the only condition tests `parameter`. Those are the ones the
    /// controller synthesizer owns and replaces on every run.
    pub fn is_single_condition_on(&self, parameter: &str) -> bool {
        matches!(
            self.conditions.as_slice(),
            [only] if only.parameter.eq_ignore_ascii_case(parameter)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Controller {
    pub character: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub states: Vec<State>,
    #[serde(default)]
    pub default_state: Option<String>,
    #[serde(default)]
    pub any_state_transitions: Vec<Transition>,
}

impl Controller {
    pub fn new(character: impl Into<String>) -> Self {
        Self {
            character: character.into(),
            parameters: vec![],
            states: vec![],
            default_state: None,
            any_state_transitions: vec![],
        }
    }

    /// State lookup is case-insensitive, like the grouping keys.
    pub fn state(&self, name: &str) -> Option<&State> {
        let folded = fold(name);
        self.states.iter().find(|s| fold(&s.name) == folded)
    }

    pub fn state_mut(&mut self, name: &str) -> Option<&mut State> {
        let folded = fold(name);
        self.states.iter_mut().find(|s| fold(&s.name) == folded)
    }

    pub fn int_parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters
            .iter()
            .find(|p| p.kind == ParameterKind::Int && p.name == name)
    }

    pub fn int_parameter_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.parameters
            .iter_mut()
            .find(|p| p.kind == ParameterKind::Int && p.name == name)
    }

    pub fn transitions_to(&self, state: &str) -> usize {
        self.any_state_transitions
            .iter()
            .filter(|t| fold(&t.destination) == fold(state))
            .count()
    }
}

/// Deterministic artifact locations under the output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    output_root: String,
}

impl ArtifactLayout {
    pub fn new(output_root: &str) -> Self {
        Self {
            output_root: normalize(output_root).trim_end_matches('/').to_string(),
        }
    }

    pub fn output_root(&self) -> &str {
        &self.output_root
    }

    pub fn character_folder(&self, character: &str) -> String {
        format!("{}/{}", self.output_root, character)
    }

    pub fn clip_path(&self, identity: &ClipIdentity) -> String {
        format!(
            "{}/{}.{}",
            self.character_folder(&identity.character),
            identity.clip_name(),
            CLIP_EXTENSION
        )
    }

    pub fn controller_path(&self, character: &str) -> String {
        format!(
            "{}/{}.{}",
            self.character_folder(character),
            character,
            CONTROLLER_EXTENSION
        )
    }

    /// Character owning an artifact, taken from its parent folder name. `None`
    /// when the path is not directly inside a character folder of this root.
    pub fn character_of(&self, artifact_path: &str) -> Option<String> {
        let path = normalize(artifact_path);
        let rest = path.strip_prefix(&format!("{}/", self.output_root))?;
        match rest.split('/').collect::<Vec<_>>().as_slice() {
            [character, _file] if !character.is_empty() => Some(character.to_string()),
            _ => None,
        }
    }
}

/// Forward slashes only.
pub fn normalize(path: &str) -> String {
    path.replace('\\', "/")
}
