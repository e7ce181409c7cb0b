//! Pipeline Settings - one JSON record per project

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::artifacts::ArtifactLayout;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Root folders scanned for frames.
    #[serde(default = "default_sprite_roots")]
    pub sprite_root_folders: Vec<String>,
    /// Where clips and controllers are written.
    #[serde(default = "default_output_root")]
    pub output_root_folder: String,
    #[serde(default = "default_frame_rate")]
    pub default_frame_rate: f32,
    #[serde(default = "default_true")]
    pub loop_all_clips: bool,
    /// Int parameter driving the animation. The clip is chosen via
    /// `param == anim_id(animName)`.
    #[serde(default = "default_anim_id_parameter")]
    pub anim_id_parameter_name: String,
    #[serde(default = "default_engine_min_version")]
    pub engine_min_version: String,
}

fn default_true() -> bool { true }

fn default_sprite_roots() -> Vec<String> {
    vec!["Assets/_Project/Art/Characters".to_string()]
}

fn default_output_root() -> String {
    "Assets/_Project/Animations/Characters".to_string()
}

fn default_frame_rate() -> f32 { 12.0 }

fn default_anim_id_parameter() -> String {
    "AnimId".to_string()
}

fn default_engine_min_version() -> String {
    crate::MIN_SETTINGS_ENGINE_VERSION.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sprite_root_folders: default_sprite_roots(),
            output_root_folder: default_output_root(),
            default_frame_rate: default_frame_rate(),
            loop_all_clips: true,
            anim_id_parameter_name: default_anim_id_parameter(),
            engine_min_version: default_engine_min_version(),
        }
    }
}

impl Settings {
    pub fn load_from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let settings: Settings = serde_json::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !self.default_frame_rate.is_finite() || self.default_frame_rate <= 0.0 {
            return Err(SettingsError::Invalid {
                field: "defaultFrameRate",
                reason: format!("{} is not > 0", self.default_frame_rate),
            });
        }
        if self.anim_id_parameter_name.trim().is_empty() {
            return Err(SettingsError::Invalid {
                field: "animIdParameterName",
                reason: "must not be empty".into(),
            });
        }
        if self.output_root_folder.trim().is_empty() {
            return Err(SettingsError::Invalid {
                field: "outputRootFolder",
                reason: "must not be empty".into(),
            });
        }
        semver::Version::parse(&self.engine_min_version).map_err(|e| SettingsError::Invalid {
            field: "engineMinVersion",
            reason: e.to_string(),
        })?;
        Ok(())
    }

    pub fn layout(&self) -> ArtifactLayout {
        ArtifactLayout::new(&self.output_root_folder)
    }
}
