//! Contract Invariant Tests
//!
//! These tests verify the non-negotiable guarantees.

use spriteforge_core::{
    anim_id, canonical_json,
    naming::{format_frame_name, parse},
    ArtifactStore, CompilationPipeline, CompilerError, MemoryStore, PipelineValidator, Settings,
};

const ART: &str = "Art/Characters";

fn create_test_settings() -> Settings {
    Settings {
        sprite_root_folders: vec![ART.to_string()],
        output_root_folder: "Out".to_string(),
        default_frame_rate: 12.0,
        loop_all_clips: true,
        anim_id_parameter_name: "AnimId".to_string(),
        ..Settings::default()
    }
}

fn create_store(names: &[&str]) -> MemoryStore {
    let mut store = MemoryStore::new();
    store.add_frames(ART, names.iter().copied());
    store
}

fn hero_store() -> MemoryStore {
    create_store(&[
        "Hero_Walk_2",
        "Hero_Walk_10",
        "Hero_Walk_1",
        "Hero_Idle_1",
        "Hero_Idle_2",
        "Hero_Jump",
    ])
}

#[test]
fn invariant_parser_round_trip() {
    for character in ["Hero", "Slime", "Boss"] {
        for anim in ["Walk", "Idle", "Attack"] {
            for index in [None, Some(0), Some(7), Some(42)] {
                let parsed = parse(&format_frame_name(character, anim, index)).unwrap();
                assert_eq!(parsed.character, character);
                assert_eq!(parsed.animation, anim);
                assert_eq!(parsed.frame_index, index.unwrap_or(0));
            }
        }
    }
}

#[test]
fn invariant_natural_frame_order() {
    let mut store = hero_store();
    CompilationPipeline::new(create_test_settings())
        .build_all(&mut store)
        .unwrap();

    let clip = store.load_clip("Out/Hero/Hero_Walk.clip").unwrap().unwrap();
    let names: Vec<_> = clip.keyframes.iter().map(|k| k.frame.name.as_str()).collect();
    assert_eq!(names, vec!["Hero_Walk_1", "Hero_Walk_2", "Hero_Walk_10"]);
    assert_eq!(clip.keyframes[1].time, 1.0 / 12.0);
}

#[test]
fn invariant_default_state_alphabetical() {
    let mut store = hero_store();
    CompilationPipeline::new(create_test_settings())
        .build_all(&mut store)
        .unwrap();

    let controller = store.load_controller("Out/Hero/Hero.controller").unwrap().unwrap();
    assert_eq!(controller.default_state.as_deref(), Some("Idle"));
    assert_eq!(
        controller.int_parameter("AnimId").unwrap().default_int,
        anim_id("idle")
    );
}

#[test]
fn invariant_rebuild_is_deterministic() {
    let pipeline = CompilationPipeline::new(create_test_settings());
    let mut store = hero_store();

    pipeline.build_all(&mut store).unwrap();
    let clips_first: Vec<String> = ["Out/Hero/Hero_Walk.clip", "Out/Hero/Hero_Idle.clip", "Out/Hero/Hero_Jump.clip"]
        .iter()
        .map(|p| canonical_json(&store.load_clip(p).unwrap().unwrap()).unwrap())
        .collect();
    let controller_first = store.load_controller("Out/Hero/Hero.controller").unwrap().unwrap();

    pipeline.build_all(&mut store).unwrap();
    let clips_second: Vec<String> = ["Out/Hero/Hero_Walk.clip", "Out/Hero/Hero_Idle.clip", "Out/Hero/Hero_Jump.clip"]
        .iter()
        .map(|p| canonical_json(&store.load_clip(p).unwrap().unwrap()).unwrap())
        .collect();
    let controller_second = store.load_controller("Out/Hero/Hero.controller").unwrap().unwrap();

    // Byte-identical clips, and no transition growth
    assert_eq!(clips_first, clips_second);
    assert_eq!(
        controller_first.any_state_transitions.len(),
        controller_second.any_state_transitions.len()
    );
    assert_eq!(controller_first, controller_second);
}

#[test]
fn invariant_transitions_do_not_accumulate() {
    let pipeline = CompilationPipeline::new(create_test_settings());
    let mut store = hero_store();

    for _ in 0..3 {
        pipeline.build_all(&mut store).unwrap();
    }

    let controller = store.load_controller("Out/Hero/Hero.controller").unwrap().unwrap();
    assert_eq!(controller.states.len(), 3);
    assert_eq!(controller.any_state_transitions.len(), 3);
    for state in &controller.states {
        assert_eq!(controller.transitions_to(&state.name), 1);
    }
}

#[test]
fn invariant_corrupt_clip_retried_once() {
    let pipeline = CompilationPipeline::new(create_test_settings());
    let mut store = create_store(&["Hero_Walk_1", "Hero_Walk_2"]);
    store.drop_keyframes_on_next_clip_writes(1);

    let report = pipeline.build_all(&mut store).unwrap();
    assert!(report.is_clean());
    assert_eq!(store.clip_writes(), 2);
    assert_eq!(store.clip_keyframe_count("Out/Hero/Hero_Walk.clip").unwrap(), Some(2));
}

#[test]
fn invariant_corrupt_clip_fails_loudly_and_is_isolated() {
    let pipeline = CompilationPipeline::new(create_test_settings());
    // Characters build in order: Bat first, then Hero.
    let mut store = create_store(&["Bat_Fly_1", "Hero_Walk_1"]);
    store.drop_keyframes_on_next_clip_writes(2);

    let report = pipeline.build_all(&mut store).unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].kind, "corrupt_clip");
    assert_eq!(report.failures[0].character, "Bat");
    assert_eq!(report.failures[0].animation.as_deref(), Some("Fly"));
    let summary = report.to_string();
    assert!(summary.contains("- Bat: Clips=0"));
    assert!(summary.contains("Failures: 1"));

    // No zero-keyframe clip remains, and no controller references one.
    assert_eq!(store.load_clip("Out/Bat/Bat_Fly.clip").unwrap(), None);
    assert!(store.load_controller("Out/Bat/Bat.controller").unwrap().is_none());

    // Hero still built.
    assert_eq!(report.clips_touched, 1);
    assert_eq!(report.controllers_touched, 1);
    assert!(store.load_controller("Out/Hero/Hero.controller").unwrap().is_some());
}

#[test]
fn invariant_failed_rebuild_leaves_no_dangling_motion() {
    let settings = create_test_settings();
    let pipeline = CompilationPipeline::new(settings.clone());
    let mut store = create_store(&["Hero_Idle_1", "Hero_Walk_1"]);
    pipeline.build_all(&mut store).unwrap();

    // Idle is written first; both of its attempts lose their keys.
    store.drop_keyframes_on_next_clip_writes(2);
    let report = pipeline.build_all(&mut store).unwrap();
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].animation.as_deref(), Some("Idle"));

    let controller = store.load_controller("Out/Hero/Hero.controller").unwrap().unwrap();
    assert!(controller.state("Idle").unwrap().motion.is_none());
    assert_eq!(controller.default_state.as_deref(), Some("Walk"));

    let validator = PipelineValidator::new(settings);
    let issues = validator.validate_project(&store).unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].rule, "state_motion");
    assert_eq!(issues[0].subject.as_deref(), Some("Idle"));

    let rules: Vec<_> = validator
        .validate(&store)
        .unwrap()
        .into_iter()
        .map(|i| i.rule)
        .collect();
    assert_eq!(rules, vec!["clip_presence", "state_motion"]);
}

#[test]
fn invariant_validator_finds_missing_motion() {
    let settings = create_test_settings();
    let mut store = hero_store();
    CompilationPipeline::new(settings.clone())
        .build_all(&mut store)
        .unwrap();

    let validator = PipelineValidator::new(settings);
    assert!(validator.validate(&store).unwrap().is_empty());

    let path = "Out/Hero/Hero.controller";
    let mut controller = store.load_controller(path).unwrap().unwrap();
    controller.state_mut("Walk").unwrap().motion = None;
    store.write_controller(path, &controller).unwrap();

    let issues = validator.validate(&store).unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].subject.as_deref(), Some("Walk"));
    assert_eq!(issues[0].location, path);

    let fix = validator.auto_fix(&mut store).unwrap();
    assert_eq!(fix.controllers_scanned, 1);
    assert_eq!(fix.controllers_fixed, 1);
    assert_eq!(fix.states_fixed, 1);
    assert!(fix.remaining.is_empty());

    let controller = store.load_controller(path).unwrap().unwrap();
    assert_eq!(
        controller.state("Walk").unwrap().motion.as_ref().unwrap().path,
        "Out/Hero/Hero_Walk.clip"
    );
}

#[test]
fn invariant_auto_fix_never_fabricates() {
    let settings = create_test_settings();
    let mut store = hero_store();
    CompilationPipeline::new(settings.clone())
        .build_all(&mut store)
        .unwrap();

    let path = "Out/Hero/Hero.controller";
    let mut controller = store.load_controller(path).unwrap().unwrap();
    controller.state_mut("Walk").unwrap().motion = None;
    store.write_controller(path, &controller).unwrap();
    store.delete("Out/Hero/Hero_Walk.clip").unwrap();

    let validator = PipelineValidator::new(settings);
    let fix = validator.auto_fix(&mut store).unwrap();
    assert_eq!(fix.states_fixed, 0);
    assert_eq!(fix.controllers_fixed, 0);

    let motion_issues: Vec<_> = fix
        .remaining
        .iter()
        .filter(|i| i.rule == "state_motion")
        .collect();
    assert_eq!(motion_issues.len(), 1);
    assert_eq!(motion_issues[0].subject.as_deref(), Some("Walk"));
    assert!(fix.remaining.iter().any(|i| i.rule == "clip_presence"));
}

#[test]
fn invariant_auto_fix_ignores_empty_clip() {
    let settings = create_test_settings();
    let mut store = hero_store();
    CompilationPipeline::new(settings.clone())
        .build_all(&mut store)
        .unwrap();

    let path = "Out/Hero/Hero.controller";
    let mut controller = store.load_controller(path).unwrap().unwrap();
    controller.state_mut("Jump").unwrap().motion = None;
    store.write_controller(path, &controller).unwrap();

    let clip_path = "Out/Hero/Hero_Jump.clip";
    let mut clip = store.load_clip(clip_path).unwrap().unwrap();
    clip.keyframes.clear();
    store.write_clip(clip_path, &clip).unwrap();

    let fix = PipelineValidator::new(settings).auto_fix(&mut store).unwrap();
    assert_eq!(fix.states_fixed, 0);
    assert_eq!(fix.remaining.len(), 2);
}

#[test]
fn invariant_compiler_error_kinds_are_stable() {
    let err = CompilerError::CorruptClip { path: "x".into() };
    assert_eq!(err.kind(), "corrupt_clip");
    assert!(err.to_string().contains("0 keyframes"));
}
