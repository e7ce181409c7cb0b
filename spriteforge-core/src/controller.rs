//! Controller Synthesis - one state machine per character
//!
//! States are additive across runs. The AnyState transitions keyed on the
//! animation-id parameter are owned by this module and replaced wholesale.

use log::{info, warn};

use crate::artifacts::{
    ArtifactLayout, Clip, ClipRef, Condition, ConditionMode, Controller, Parameter,
    ParameterKind, State, Transition, TRANSITION_DURATION,
};
use crate::error::CompilerError;
use crate::grouping::FoldedMap;
use crate::hashing::anim_id;
use crate::store::{ArtifactStore, StoreError};

pub struct ControllerSynthesizer {
    layout: ArtifactLayout,
    parameter: String,
}

impl ControllerSynthesizer {
    pub fn new(layout: ArtifactLayout, parameter: impl Into<String>) -> Self {
        Self {
            layout,
            parameter: parameter.into(),
        }
    }

    /// Create or re-synchronize the controller for `character`.
    ///
    /// The default state is the alphabetically first animation
    /// (case-insensitive); no other naming assumption is made.
    pub fn synthesize(
        &self,
        store: &mut dyn ArtifactStore,
        character: &str,
        clips: &FoldedMap<Clip>,
    ) -> Result<Controller, CompilerError> {
        // FoldedMap iterates in case-insensitive order already.
        let anim_names: Vec<&str> = clips.keys().collect();
        let default_anim = match anim_names.first() {
            Some(name) => *name,
            None => {
                return Err(CompilerError::MissingRequiredClip {
                    character: character.to_string(),
                })
            }
        };

        let path = self.layout.controller_path(character);
        let existing = match store.load_controller(&path) {
            Ok(found) => found,
            Err(StoreError::Encoding { source, .. }) => {
                warn!("[AnimPipeline] Controller {} is unreadable ({}), rebuilding", path, source);
                None
            }
            Err(e) => return Err(e.into()),
        };
        let is_new = existing.is_none();
        let mut controller = existing.unwrap_or_else(|| Controller::new(character));

        if controller.int_parameter(&self.parameter).is_none() {
            controller.parameters.push(Parameter {
                name: self.parameter.clone(),
                kind: ParameterKind::Int,
                default_int: 0,
            });
        }

        for (name, clip) in clips.iter() {
            let motion = ClipRef {
                path: self.layout.clip_path(&clip.identity),
                name: clip.identity.clip_name(),
            };
            match controller.state_mut(name) {
                Some(state) => state.motion = Some(motion),
                None => controller.states.push(State {
                    name: name.to_string(),
                    motion: Some(motion),
                }),
            }
        }

        release_deleted_motions(store, &mut controller, clips)?;

        let default_state = state_name(&controller, default_anim);
        controller.default_state = Some(default_state);

        let parameter = self.parameter.as_str();
        controller
            .any_state_transitions
            .retain(|t| !t.is_single_condition_on(parameter));

        for name in &anim_names {
            let destination = state_name(&controller, name);
            controller.any_state_transitions.push(Transition {
                destination,
                conditions: vec![Condition {
                    mode: ConditionMode::Equals,
                    parameter: self.parameter.clone(),
                    threshold: anim_id(name),
                }],
                has_exit_time: false,
                has_fixed_duration: true,
                duration: TRANSITION_DURATION,
                can_transition_to_self: false,
            });
        }

        if let Some(param) = controller.int_parameter_mut(&self.parameter) {
            param.default_int = anim_id(default_anim);
        }

        store.write_controller(&path, &controller)?;

        info!(
            "[AnimPipeline] {} controller: {}",
            if is_new { "Created" } else { "Updated" },
            path
        );

        Ok(controller)
    }
}

/// States kept from earlier runs lose a motion whose clip no longer exists.
fn release_deleted_motions(
    store: &dyn ArtifactStore,
    controller: &mut Controller,
    clips: &FoldedMap<Clip>,
) -> Result<(), StoreError> {
    for state in controller.states.iter_mut().filter(|s| !clips.contains_key(&s.name)) {
        let Some(motion) = &state.motion else { continue };
        match store.load_clip(&motion.path) {
            Ok(Some(_)) | Err(StoreError::Encoding { .. }) => {}
            Ok(None) => {
                warn!(
                    "[AnimPipeline] State '{}' referenced deleted clip {}, motion cleared",
                    state.name, motion.path
                );
                state.motion = None;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Spelling of the state matching `anim`. Existing states keep theirs.
fn state_name(controller: &Controller, anim: &str) -> String {
    controller
        .state(anim)
        .map(|s| s.name.clone())
        .unwrap_or_else(|| anim.to_string())
}
