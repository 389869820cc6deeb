use clap::{Parser, Subcommand};
use promptlens::config::{self, OutputFormat};
use promptlens::{imaging, output, pipeline};
use rayon::prelude::*;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup, called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "promptlens")]
#[command(about = "Read generation parameters from AI-generated images")]
#[command(long_about = "\
Read generation parameters from AI-generated images

Reads the text metadata embedded in PNG, JPEG and WebP files, works out
which tool produced the image and prints a normalized record: model,
sampler, steps, CFG, seed, size and both prompts.

Recognized generators:
  NovelAI          Software/Source/Comment tags
  ComfyUI          prompt graph, workflow graph or generation_data
  Stable Diffusion A1111-style `parameters` text or JSON
  IllustriousXL    generate_info JSON
  Midjourney       description text with --flags

Artist and character names from the dictionaries under the config
directory are located in the positive prompt.

Run 'promptlens gen-config' to generate a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Directory holding config.toml and the dictionaries
    #[arg(long, default_value = ".", global = true)]
    config: PathBuf,

    /// Skip loading the artist/character dictionaries
    #[arg(long, global = true)]
    no_dictionaries: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract metadata from images or directories of images
    Inspect {
        /// Image files or directories (searched recursively)
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
        /// List every raw tag in text output
        #[arg(long)]
        raw: bool,
    },
    /// Find dictionary artists and characters in a piece of text
    Match {
        /// Text to scan
        text: String,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    match &cli.command {
        Command::Inspect { paths, json, raw } => {
            let mut app_config = load_app_config(&cli)?;
            if *json {
                app_config.output.format = OutputFormat::Json;
            }
            if *raw {
                app_config.output.show_raw_tags = true;
            }
            init_thread_pool(&app_config.processing);

            let matchers = app_config.dictionaries.registry(&cli.config);
            // Load once up front so workers never race the first build.
            if let Err(e) = matchers.initialize() {
                tracing::warn!(error = %e, "dictionaries unavailable, prompts will not be annotated");
            }

            let images = imaging::collect_images(paths);
            tracing::info!(count = images.len(), "inspecting images");
            let reports: Vec<_> = images
                .par_iter()
                .map(|path| pipeline::inspect(path, &matchers))
                .collect();

            match app_config.output.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
                OutputFormat::Text => output::print_reports(&reports, &app_config.output),
            }
        }
        Command::Match { text } => {
            let app_config = load_app_config(&cli)?;
            let matchers = app_config.dictionaries.registry(&cli.config);
            matchers.initialize()?;
            output::print_text_matches(
                &matchers.find_artists(text),
                &matchers.find_characters(text),
            );
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// `config.toml` from `--config`, with `--no-dictionaries` applied.
fn load_app_config(cli: &Cli) -> Result<config::AppConfig, config::ConfigError> {
    let mut app_config = config::load_config(&cli.config)?;
    if cli.no_dictionaries {
        app_config.dictionaries.enabled = false;
    }
    Ok(app_config)
}

/// Log to stderr, filtered by `RUST_LOG` (default `warn`).
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
