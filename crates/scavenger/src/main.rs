//! Scavenger - Main Entry Point

use anyhow::Context;
use clap::{Parser, Subcommand};
use geofence::Location;
use scavenger::{init_logging, AppState, Settings};
use std::path::PathBuf;
use std::sync::Arc;
use storage::{FenceStore, SqlitePreferences};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "scavenger", version, about = "Mark and manage geofences")]
struct Cli {
    /// Config file (defaults to ./scavenger.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the database path
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the location status and fence count
    Status {
        #[arg(long, requires = "lng", allow_hyphen_values = true)]
        lat: Option<f64>,
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lng: Option<f64>,
    },
    /// List stored fences
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark a fence at the given location
    Mark {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        /// Trigger radius in meters
        #[arg(long)]
        radius: Option<f32>,
    },
    /// Show one fence
    Show { id: String },
    /// Show the message of the fence at a list position, then remove it
    Select { index: usize },
    /// Remove a fence by id
    Remove { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(path) = cli.database {
        settings.database.path = path;
    }
    init_logging(&settings.logging)?;

    info!("=== Scavenger v{} ===", env!("CARGO_PKG_VERSION"));

    let prefs = SqlitePreferences::open(&settings.database.path, settings.database.max_connections)
        .await
        .with_context(|| format!("opening {}", settings.database.path.display()))?;
    let prefs = Arc::new(prefs);
    let mut state = AppState::new(
        FenceStore::new(Arc::clone(&prefs)),
        settings.fence.default_radius_meters,
    );
    state.restore().await?;

    match cli.command {
        Command::Status { lat, lng } => {
            if let (Some(lat), Some(lng)) = (lat, lng) {
                state.on_location_changed(Location::new(lat, lng));
            }
            println!("{}", state.location_label());
            println!("Fences: {}", state.fences().len());
        }
        Command::List { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(state.fences())?);
            } else {
                for (index, fence) in state.fences().iter().enumerate() {
                    println!("{:>3}  {}  [{}]", index, fence, fence.transition_type);
                }
            }
        }
        Command::Mark { lat, lng, radius } => {
            state.on_location_changed(Location::new(lat, lng));
            let radius = radius.unwrap_or(settings.fence.default_radius_meters);
            let fence = state.mark_with(&mut rand::thread_rng(), radius).await?;
            println!("Marked {} (message {})", fence, fence.message_id);
        }
        Command::Show { id } => match state.store().get(&id).await? {
            Some(fence) => println!("{}", serde_json::to_string_pretty(&fence)?),
            None => anyhow::bail!("no fence with id {}", id),
        },
        Command::Select { index } => {
            let message_id = state.select(index).await?;
            println!("{}", message_id);
        }
        Command::Remove { id } => {
            if !state.remove(&id).await? {
                println!("No fence {} listed; cleared any stored keys", id);
            }
        }
    }

    state.persist_all().await?;
    prefs.close().await;
    Ok(())
}
