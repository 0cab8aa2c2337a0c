//! Reframe CLI: create, analyze, preview, and export screen-recording projects.
//!
//! Usage:
//!   reframe init <NAME> --media <FILE> --cursor <JSONL>   Create a project
//!   reframe list                                          List projects
//!   reframe info <ID>                                     Show project information
//!   reframe validate <ID>                                 Validate a project
//!   reframe analyze <ID>                                  Generate auto-zoom keyframes
//!   reframe frame <ID> --time <T> --out <PNG>             Render one preview frame
//!   reframe export <ID>                                   Export to video

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reframe_common::config::AppConfig;
use reframe_project_model::ProjectStore;

mod commands;

#[derive(Parser)]
#[command(
    name = "reframe",
    about = "Screen-recording editor with automatic zoom",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Project store directory (defaults to the configured one)
    #[arg(long, global = true)]
    projects_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a project from a recording and its cursor telemetry
    Init {
        /// Project name
        name: String,

        /// Recorded media file
        #[arg(long)]
        media: PathBuf,

        /// Cursor telemetry (one JSON sample per line)
        #[arg(long)]
        cursor: PathBuf,
    },

    /// List projects in the store
    List,

    /// Show project information
    Info {
        /// Project id
        id: String,
    },

    /// Validate a project
    Validate {
        /// Project id
        id: String,
    },

    /// Generate zoom keyframes from cursor activity
    Analyze {
        /// Project id
        id: String,

        /// Auto-zoom profile JSON (overrides the configured profile)
        #[arg(long)]
        profile: Option<PathBuf>,

        /// Print the keyframes without saving them
        #[arg(long)]
        dry_run: bool,
    },

    /// Render a single preview frame to PNG
    Frame {
        /// Project id
        id: String,

        /// Media time in seconds
        #[arg(short, long)]
        time: f64,

        /// Output PNG path
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Export a project to video
    Export {
        /// Project id
        id: String,

        /// Quality preset: original|high|medium|small
        #[arg(long)]
        quality: Option<String>,

        /// Playback speed multiplier (0.5 to 2.0)
        #[arg(long)]
        speed: Option<f64>,

        /// Video codec: h264|h265|vp9
        #[arg(long)]
        codec: Option<String>,

        /// Output directory (defaults to the project's exports/)
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Per-seek timeout in seconds
        #[arg(long)]
        seek_timeout: Option<f64>,

        /// Emit progress as JSON lines
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load();

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    reframe_common::logging::init_logging(&logging);

    let store = ProjectStore::new(
        cli.projects_dir
            .clone()
            .unwrap_or_else(|| config.projects_dir.clone()),
    );

    match cli.command {
        Commands::Init {
            name,
            media,
            cursor,
        } => commands::init::run(&store, &config, name, media, cursor).await,
        Commands::List => commands::info::list(&store),
        Commands::Info { id } => commands::info::run(&store, &id),
        Commands::Validate { id } => commands::validate::run(&store, &id),
        Commands::Analyze {
            id,
            profile,
            dry_run,
        } => commands::analyze::run(&store, &config, &id, profile, dry_run),
        Commands::Frame { id, time, out } => commands::frame::run(&store, &id, time, out).await,
        Commands::Export {
            id,
            quality,
            speed,
            codec,
            out_dir,
            seek_timeout,
            json,
        } => {
            let args = commands::export::ExportArgs {
                quality,
                speed,
                codec,
                out_dir,
                seek_timeout,
                json,
            };
            commands::export::run(&store, &config, &id, args).await
        }
    }
}
