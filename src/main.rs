use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use show_fill::assembler::{Composer, Show};
use show_fill::config::ConfigStore;
use show_fill::duration::runtime;
use show_fill::fit::FitPolicy;
use show_fill::item::Item;
use show_fill::library;
use show_fill::playlist::{Composition, SyncOp};
use show_fill::store::PlaylistStore;
use show_fill::timecode::format_delta;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "showfill", about = "Fill a radio show's time slot from a pool of items")]
struct Cli {
    /// Suppress log output
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose and store the playlist for a show
    Compose {
        /// Candidate pool as a JSON array of items
        #[arg(long, conflicts_with = "library", required_unless_present = "library")]
        pool: Option<PathBuf>,
        /// Build the pool by scanning an audio folder instead
        #[arg(long)]
        library: Option<PathBuf>,
        /// Show descriptor (starts, ends, config, playlist)
        #[arg(long)]
        show: PathBuf,
        /// Config directory (default: platform config dir/showfill)
        #[arg(long)]
        configs: Option<PathBuf>,
        /// Stored playlist file to sync (default: <configs>/playlists/<id>.json)
        #[arg(long)]
        playlist: Option<PathBuf>,
        /// Fixed RNG seed (overrides settings.json)
        #[arg(long)]
        seed: Option<u64>,
        /// Fit policy: "over" keeps the overshooting item, "under" drops it
        #[arg(long)]
        fit: Option<String>,
        /// Print the playlist without touching the store
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the total runtime of a pool
    Runtime {
        /// Pool as a JSON array of items
        #[arg(long)]
        pool: PathBuf,
        /// Also list every item with its length
        #[arg(short, long)]
        list: bool,
    },
    /// List the show configs in the config directory
    Configs {
        #[arg(long)]
        configs: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.quiet {
        EnvFilter::new("off")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Compose {
            pool,
            library,
            show,
            configs,
            playlist,
            seed,
            fit,
            dry_run,
        } => {
            let configs = config_store(configs)?;
            let mut settings = configs.load_settings();
            if seed.is_some() {
                settings.seed = seed;
            }
            if let Some(fit) = fit {
                settings.fit_policy =
                    FitPolicy::from_str_loose(&fit).map_err(anyhow::Error::msg)?;
            }

            let show: Show = read_json(&show).context("reading show")?;
            let pool = match (pool, library) {
                (Some(path), _) => read_json::<Vec<Item>>(&path).context("reading pool")?,
                (None, Some(dir)) => library::scan(&dir)
                    .with_context(|| format!("scanning library {}", dir.display()))?,
                (None, None) => anyhow::bail!("one of --pool or --library is required"),
            };

            let now = Utc::now().naive_utc();
            let composition = Composer::new(&settings, &configs)
                .compose(&show, &pool, now)
                .with_context(|| format!("composing '{}'", show.name))?;
            print_composition(&show, &composition);

            if dry_run {
                println!("Dry run: playlist not stored.");
                return Ok(());
            }

            let path = playlist.unwrap_or_else(|| {
                configs
                    .dir()
                    .join("playlists")
                    .join(format!("{}.json", file_stem_for(&composition.playlist)))
            });
            let mut store = PlaylistStore::load(&path, &composition.playlist)?;
            let ops = store.sync(&composition.entries)?;
            if composition.name.is_some() {
                store.playlist.name = composition.name.clone();
            }
            if composition.description.is_some() {
                store.playlist.description = composition.description.clone();
            }
            store
                .save()
                .with_context(|| format!("saving playlist {}", path.display()))?;
            print_sync_summary(&ops, &path);
        }
        Commands::Runtime { pool, list } => {
            let items: Vec<Item> = read_json(&pool).context("reading pool")?;
            if list {
                for (i, item) in items.iter().enumerate() {
                    println!(
                        "  {:>3}. [{}] {} ({})",
                        i + 1,
                        item.kind,
                        item.id,
                        item.duration_display()
                    );
                }
            }
            println!("Items: {}", items.len());
            println!("Runtime: {}", format_delta(runtime(&items, false)));
            println!("Final runtime: {}", format_delta(runtime(&items, true)));
        }
        Commands::Configs { configs } => {
            let store = config_store(configs)?;
            let names = store.names()?;
            if names.is_empty() {
                println!("No configs in {}.", store.dir().display());
            }
            for name in names {
                println!("  {}", name);
            }
        }
    }

    Ok(())
}

fn config_store(dir: Option<PathBuf>) -> Result<ConfigStore> {
    match dir.or_else(ConfigStore::default_dir) {
        Some(dir) => Ok(ConfigStore::new(dir)),
        None => anyhow::bail!("no config directory; pass --configs"),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let data = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
}

/// Playlist ids may be URLs or paths; keep only what is safe in a file name.
fn file_stem_for(id: &str) -> String {
    let stem: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if stem.is_empty() {
        "playlist".to_string()
    } else {
        stem
    }
}

fn print_composition(show: &Show, composition: &Composition) {
    let name = composition.name.as_deref().unwrap_or(&show.name);
    println!(
        "Show '{}' -> playlist '{}' ({} items, {})",
        name,
        composition.playlist,
        composition.entries.len(),
        composition.runtime_display()
    );
    for entry in &composition.entries {
        let label = if entry.title.is_empty() {
            entry.item.as_str()
        } else {
            entry.title.as_str()
        };
        println!(
            "  {:>3}. [{}] {} - {} ({})",
            entry.position + 1,
            entry.kind,
            entry.artist,
            label,
            entry.clip_length
        );
    }
}

fn print_sync_summary(ops: &[SyncOp], path: &Path) {
    let (mut updated, mut created, mut deleted) = (0, 0, 0);
    for op in ops {
        match op {
            SyncOp::Update { .. } => updated += 1,
            SyncOp::Create(_) => created += 1,
            SyncOp::Delete { .. } => deleted += 1,
            SyncOp::SetLength(_) => {}
        }
    }
    println!(
        "Stored {}: {} updated, {} created, {} deleted.",
        path.display(),
        updated,
        created,
        deleted
    );
}
