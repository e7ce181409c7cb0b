//! SpriteForge Core - Sprite Animation Compiler
//!
//! # The Five Laws (Non-Negotiable)
//! 1. Names Are The Contract (`Character_AnimName_###`)
//! 2. Rebuilds Converge (idempotent, no growth across reruns)
//! 3. Every Write Is Verified
//! 4. Deterministic Output
//! 5. Silence Is Not Success (reports always list every failure)

pub mod naming;
pub mod grouping;
pub mod artifacts;
pub mod store;
pub mod dir_store;
pub mod hashing;
pub mod error;
pub mod clip;
pub mod controller;
pub mod validation;
pub mod report;
pub mod settings;
pub mod pipeline;

pub use naming::{parse, ParsedName, NotMatched};
pub use grouping::{group, AnimationGroups, FoldedMap, FrameAsset, ImageHandle};
pub use artifacts::{ArtifactLayout, Clip, ClipIdentity, Controller, State, Transition};
pub use store::{ArtifactStore, MemoryStore, StoreError};
pub use dir_store::DirStore;
pub use hashing::{anim_id, artifact_hash, canonical_json};
pub use error::CompilerError;
pub use clip::ClipSynthesizer;
pub use controller::ControllerSynthesizer;
pub use validation::{FixReport, Issue, IssueSeverity, PipelineValidator};
pub use report::CharacterReport;
pub use settings::Settings;
pub use pipeline::{CompilationPipeline, PipelineError, RunReport};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const MIN_SETTINGS_ENGINE_VERSION: &str = "1.0.0";
