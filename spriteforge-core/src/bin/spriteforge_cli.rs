//! SpriteForge CLI - build and check animation output for a project
//!
//! Commands: report, build, validate, fix, probe
//! Outputs JSON to stdout, logs to stderr (RUST_LOG)
//! Returns 2 when failures or issues remain

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use spriteforge_core::{
    grouping, ArtifactStore, CharacterReport, CompilationPipeline, DirStore, PipelineValidator,
    Settings,
};

#[derive(Parser)]
#[command(name = "spriteforge-cli", version)]
#[command(about = "SpriteForge CLI - Sprite Animation Compiler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project root; every configured folder is relative to it
    #[arg(short, long, default_value = ".")]
    project: PathBuf,

    /// Settings JSON, relative to the project root unless absolute
    #[arg(short, long, default_value = "spriteforge.json")]
    settings: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Report detected characters and animation groups
    Report,

    /// Build all clips and controllers
    Build,

    /// Validate pipeline output
    Validate {
        /// Scan every artifact under the output root instead of the expected set
        #[arg(long)]
        full: bool,
    },

    /// Reassign missing state motions, then re-validate
    Fix,

    /// Print the keyframe count of one clip
    Probe {
        /// Clip path relative to the project root
        #[arg(short, long)]
        clip: String,
    },
}

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()));
}

fn fail(error: impl std::fmt::Display) -> ExitCode {
    print_json(&serde_json::json!({ "success": false, "error": error.to_string() }));
    ExitCode::FAILURE
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let settings_path = cli.project.join(&cli.settings);
    let settings = match Settings::load_from_file(&settings_path) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    let mut store = DirStore::new(&cli.project);

    match cli.command {
        Commands::Report => {
            let frames = match grouping::load_frames(&store, &settings.sprite_root_folders) {
                Ok(f) => f,
                Err(e) => return fail(e),
            };
            let report = CharacterReport::build(&frames);
            log::info!("[AnimPipeline] {}", report);
            print_json(&serde_json::json!(report));
            ExitCode::SUCCESS
        }

        Commands::Build => {
            let pipeline = CompilationPipeline::new(settings);
            match pipeline.build_all(&mut store) {
                Ok(report) => {
                    log::info!("[AnimPipeline] {}", report);
                    let clean = report.is_clean();
                    print_json(&serde_json::json!({ "success": clean, "report": report }));
                    if clean {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::from(2)
                    }
                }
                Err(e) => fail(e),
            }
        }

        Commands::Validate { full } => {
            let validator = PipelineValidator::new(settings);
            let result = if full {
                validator.validate_project(&store)
            } else {
                validator.validate(&store)
            };
            match result {
                Ok(issues) => {
                    for issue in &issues {
                        log::warn!("{}", issue);
                    }
                    print_json(&serde_json::json!({ "valid": issues.is_empty(), "issues": issues }));
                    if issues.is_empty() {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::from(2)
                    }
                }
                Err(e) => fail(e),
            }
        }

        Commands::Fix => {
            let validator = PipelineValidator::new(settings);
            match validator.auto_fix(&mut store) {
                Ok(report) => {
                    let remaining = report.remaining.len();
                    print_json(&serde_json::json!({ "success": remaining == 0, "fix": report }));
                    if remaining == 0 {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::from(2)
                    }
                }
                Err(e) => fail(e),
            }
        }

        Commands::Probe { clip } => match store.load_clip(&clip) {
            Ok(Some(c)) => {
                let keys = c.keyframe_count();
                if keys == 0 {
                    log::warn!("[ClipProbe] {} : no keyframes found.", clip);
                }
                print_json(&serde_json::json!({ "clip": clip, "keyframes": keys }));
                if keys == 0 {
                    ExitCode::from(2)
                } else {
                    ExitCode::SUCCESS
                }
            }
            Ok(None) => fail(format!("Clip not found: {}", clip)),
            Err(e) => fail(e),
        },
    }
}
