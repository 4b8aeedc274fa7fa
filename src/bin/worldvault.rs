//! # worldvault CLI - safe edits for world saves
//!
//! Command-line front end for the worldvault library. Every write goes
//! through the library's lock check, optional snapshot and atomic save.
//!
//! ## Usage
//! ```bash
//! # List worlds in the default saves folder
//! worldvault worlds list
//!
//! # Show a summary of one world
//! worldvault inspect --world Survival
//!
//! # Snapshot, change difficulty, then roll back
//! worldvault backup create --world Survival
//! worldvault world set --world Survival --difficulty hard
//! worldvault backup restore --world Survival backup-20240517-103000
//!
//! # Reset the region holding chunk (-40, 12)
//! worldvault --backup always regions reset-chunk --world Survival --chunk-x -40 --chunk-z 12
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::*;
use humantime::format_duration;
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use worldvault::edits::{AdvancedEdit, Difficulty, GameMode, MetadataEdit, PlayerEdit, Weather};
use worldvault::utils::format_bytes;
use worldvault::{
    BackgroundTask, BackupPolicy, Config, Confirmer, LogProgress, MutationReport, StdinConfirmer, WorldError,
    WorldManager,
};

/// worldvault - inspect and safely edit world saves
#[derive(Parser)]
#[command(name = "worldvault")]
#[command(version)]
#[command(about = "Inspect and safely edit world saves, with snapshots and restore")]
#[command(long_about = None)]
struct Cli {
    /// Saves folder (defaults to the game's standard location)
    #[arg(long, global = true)]
    saves_dir: Option<PathBuf>,

    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Answer yes to every prompt
    #[arg(short, long, global = true)]
    yes: bool,

    /// Snapshot the world before writes
    #[arg(long, value_enum, global = true)]
    backup: Option<BackupMode>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum BackupMode {
    Always,
    Never,
    Ask,
}

impl From<BackupMode> for BackupPolicy {
    fn from(mode: BackupMode) -> Self {
        match mode {
            BackupMode::Always => BackupPolicy::Always,
            BackupMode::Never => BackupPolicy::Never,
            BackupMode::Ask => BackupPolicy::Ask,
        }
    }
}

#[derive(Args)]
struct WorldArg {
    /// World name (under the saves folder) or path
    #[arg(short, long)]
    world: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover worlds
    #[command(subcommand)]
    Worlds(WorldsCommand),

    /// Show a summary of a world
    Inspect {
        #[command(flatten)]
        target: WorldArg,

        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a world or player document as JSON
    Dump {
        #[command(flatten)]
        target: WorldArg,

        /// Dump this player's document instead of level.dat
        #[arg(long)]
        player: Option<String>,
    },

    /// Create, list and restore snapshots
    #[command(subcommand)]
    Backup(BackupCommand),

    /// Edit world settings
    #[command(subcommand)]
    World(WorldCommand),

    /// Edit game rules
    #[command(subcommand)]
    Gamerule(GameruleCommand),

    /// Edit player files
    #[command(subcommand)]
    Player(PlayerCommand),

    /// Entity regions and queued entity commands
    #[command(subcommand)]
    Entity(EntityCommand),

    /// Terrain region files
    #[command(subcommand)]
    Regions(RegionsCommand),
}

#[derive(Subcommand)]
enum WorldsCommand {
    /// List worlds in the saves folder
    List,
}

#[derive(Subcommand)]
enum BackupCommand {
    /// Snapshot a world
    Create {
        #[command(flatten)]
        target: WorldArg,
    },
    /// List snapshots, newest first
    List {
        #[command(flatten)]
        target: WorldArg,
    },
    /// Replace a world with a snapshot
    Restore {
        #[command(flatten)]
        target: WorldArg,
        /// Snapshot name, e.g. backup-20240517-103000
        name: String,
    },
}

#[derive(Subcommand)]
enum WorldCommand {
    /// Set name, difficulty or game mode
    Set {
        #[command(flatten)]
        target: WorldArg,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        difficulty: Option<Difficulty>,
        #[arg(long)]
        gamemode: Option<GameMode>,
    },
    /// Set time, weather, spawn, border, flags or seed
    AdvancedSet(AdvancedArgs),
}

#[derive(Args)]
struct AdvancedArgs {
    #[command(flatten)]
    target: WorldArg,
    #[arg(long)]
    time: Option<i64>,
    #[arg(long)]
    weather: Option<Weather>,
    /// Weather duration in ticks (default 6000)
    #[arg(long)]
    weather_duration: Option<i32>,
    #[arg(long, allow_negative_numbers = true)]
    spawn_x: Option<i32>,
    #[arg(long, allow_negative_numbers = true)]
    spawn_y: Option<i32>,
    #[arg(long, allow_negative_numbers = true)]
    spawn_z: Option<i32>,
    #[arg(long, allow_negative_numbers = true)]
    border_center_x: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    border_center_z: Option<f64>,
    #[arg(long)]
    border_size: Option<f64>,
    #[arg(long)]
    hardcore: Option<bool>,
    #[arg(long)]
    allow_commands: Option<bool>,
    #[arg(long, allow_negative_numbers = true)]
    seed: Option<i64>,
}

#[derive(Subcommand)]
enum GameruleCommand {
    /// Set one game rule
    Set {
        #[command(flatten)]
        target: WorldArg,
        rule: String,
        value: String,
    },
}

#[derive(Subcommand)]
enum PlayerCommand {
    /// List player ids
    List {
        #[command(flatten)]
        target: WorldArg,
    },
    /// Set position or stats
    Set {
        #[command(flatten)]
        target: WorldArg,
        #[arg(long)]
        uuid: String,
        #[arg(long, allow_negative_numbers = true)]
        x: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        y: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        z: Option<f64>,
        #[arg(long)]
        health: Option<f32>,
        #[arg(long)]
        hunger: Option<i32>,
        #[arg(long)]
        slot: Option<i32>,
    },
    /// Set health to zero
    Kill {
        #[command(flatten)]
        target: WorldArg,
        #[arg(long)]
        uuid: String,
    },
    /// Delete a player file
    Delete {
        #[command(flatten)]
        target: WorldArg,
        #[arg(long)]
        uuid: String,
    },
}

#[derive(Subcommand)]
enum EntityCommand {
    /// List entity region files
    ListRegions {
        #[command(flatten)]
        target: WorldArg,
    },
    /// Delete one entity region file
    DeleteRegion {
        #[command(flatten)]
        target: WorldArg,
        /// Region file name, e.g. r.0.-1.mca
        region: String,
    },
    /// Delete every entity region file
    DeleteAllRegions {
        #[command(flatten)]
        target: WorldArg,
    },
    /// Queue a summon command
    QueueSummon {
        #[command(flatten)]
        target: WorldArg,
        /// Entity id, e.g. minecraft:zombie
        #[arg(long)]
        entity: String,
        #[arg(long, allow_negative_numbers = true)]
        x: f64,
        #[arg(long, allow_negative_numbers = true)]
        y: f64,
        #[arg(long, allow_negative_numbers = true)]
        z: f64,
        /// Extra data appended to the command, e.g. {NoAI:1b}
        #[arg(long)]
        nbt: Option<String>,
    },
    /// Queue a kill command
    QueueKill {
        #[command(flatten)]
        target: WorldArg,
        /// Target selector, e.g. @e[type=minecraft:zombie]
        #[arg(long)]
        selector: String,
    },
}

#[derive(Subcommand)]
enum RegionsCommand {
    /// List terrain region files
    List {
        #[command(flatten)]
        target: WorldArg,
    },
    /// Delete one terrain region file
    Delete {
        #[command(flatten)]
        target: WorldArg,
        /// Region file name, e.g. r.0.-1.mca
        region: String,
    },
    /// Delete the region file owning a chunk
    ResetChunk {
        #[command(flatten)]
        target: WorldArg,
        #[arg(long, allow_negative_numbers = true)]
        chunk_x: i32,
        #[arg(long, allow_negative_numbers = true)]
        chunk_z: i32,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli) {
        let message = match e.downcast_ref::<WorldError>() {
            Some(err) => err.user_message(),
            None => format!("{:#}", e),
        };
        eprintln!("{}: {}", "Error".red().bold(), message);
        std::process::exit(1);
    }
}

/// Progress bar currently on screen
#[derive(Clone, Default)]
struct ActiveBar(Arc<Mutex<Option<ProgressBar>>>);

impl ActiveBar {
    fn set(&self, bar: Option<ProgressBar>) {
        *self.0.lock() = bar;
    }

    fn get(&self) -> Option<ProgressBar> {
        self.0.lock().clone()
    }
}

/// Stdin prompt that hides the active progress bar until answered
///
/// Background tasks ask from their worker thread while the main thread
/// draws the bar.
struct TerminalConfirmer {
    bar: ActiveBar,
}

impl Confirmer for TerminalConfirmer {
    fn confirm(&self, message: &str) -> bool {
        match self.bar.get() {
            Some(bar) => bar.suspend(|| StdinConfirmer.confirm(message)),
            None => StdinConfirmer.confirm(message),
        }
    }
}

fn build_manager(cli: &Cli, bar: &ActiveBar) -> Result<WorldManager> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path).with_context(|| format!("reading config {}", path.display()))?,
        None => Config::default(),
    };
    config = config.apply_env()?;

    if let Some(dir) = &cli.saves_dir {
        config.saves_dir = Some(dir.clone());
    }
    if let Some(mode) = cli.backup {
        config.backup_policy = mode.into();
    }
    if cli.yes {
        config.assume_yes = true;
    }

    let builder = config.manager_builder().progress(LogProgress);
    let builder = if config.assume_yes {
        builder
    } else {
        builder.confirmer(TerminalConfirmer { bar: bar.clone() })
    };
    Ok(builder.build())
}

/// Main command runner
fn run(cli: Cli) -> Result<()> {
    let bar = ActiveBar::default();
    let manager = build_manager(&cli, &bar)?;

    match cli.command {
        Commands::Worlds(WorldsCommand::List) => cmd_worlds_list(&manager),
        Commands::Inspect { target, json } => cmd_inspect(&manager, &target.world, json),
        Commands::Dump { target, player } => cmd_dump(&manager, &target.world, player.as_deref()),
        Commands::Backup(cmd) => match cmd {
            BackupCommand::Create { target } => cmd_backup_create(&manager, &bar, &target.world),
            BackupCommand::List { target } => cmd_backup_list(&manager, &target.world),
            BackupCommand::Restore { target, name } => cmd_backup_restore(&manager, &bar, &target.world, &name),
        },
        Commands::World(WorldCommand::Set {
            target,
            name,
            difficulty,
            gamemode,
        }) => {
            let edit = MetadataEdit {
                name,
                difficulty,
                game_mode: gamemode,
            };
            report("Updated world settings", manager.set_metadata(&target.world, &edit)?);
            Ok(())
        }
        Commands::World(WorldCommand::AdvancedSet(args)) => {
            let edit = AdvancedEdit {
                time: args.time,
                weather: args.weather,
                weather_duration: args.weather_duration,
                spawn_x: args.spawn_x,
                spawn_y: args.spawn_y,
                spawn_z: args.spawn_z,
                border_center_x: args.border_center_x,
                border_center_z: args.border_center_z,
                border_size: args.border_size,
                hardcore: args.hardcore,
                allow_commands: args.allow_commands,
                seed: args.seed,
            };
            report("Updated advanced settings", manager.set_advanced(&args.target.world, &edit)?);
            Ok(())
        }
        Commands::Gamerule(GameruleCommand::Set { target, rule, value }) => {
            let result = manager.set_gamerule(&target.world, &rule, &value)?;
            report(&format!("Set game rule {} = {}", rule, value), result);
            Ok(())
        }
        Commands::Player(cmd) => cmd_player(&manager, cmd),
        Commands::Entity(cmd) => cmd_entity(&manager, cmd),
        Commands::Regions(cmd) => cmd_regions(&manager, cmd),
    }
}

fn report(action: &str, result: MutationReport) {
    println!("{} {}", "✓".green().bold(), action);
    println!("  Target: {}", result.target.display().to_string().cyan());
    println!("  Affected: {}", result.affected.to_string().cyan());
    if let Some(backup) = result.backup {
        println!("  Backup: {}", backup.name.yellow());
    }
}

fn print_names(title: &str, names: &[String], empty: &str) {
    if names.is_empty() {
        println!("{}", empty.yellow());
        return;
    }
    println!("{}", title.blue().bold());
    for name in names {
        println!("  {}", name);
    }
}

fn cmd_worlds_list(manager: &WorldManager) -> Result<()> {
    let worlds = manager.list_worlds()?;
    if worlds.is_empty() {
        println!("{} {}", "No worlds found in".yellow(), manager.saves_dir().display());
        return Ok(());
    }
    println!("{}", "Worlds:".blue().bold());
    for world in worlds {
        println!("  {}  {}", world.name.bold(), world.path.display().to_string().dimmed());
    }
    Ok(())
}

fn cmd_inspect(manager: &WorldManager, world: &str, json: bool) -> Result<()> {
    let info = manager.inspect(world)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("{}", info.level_name.blue().bold());
    println!("  Folder: {}", info.name.cyan());
    println!("  Path: {}", info.path.display().to_string().cyan());
    println!("  DataVersion: {}", info.data_version.to_string().cyan());
    println!("  Difficulty: {}", info.difficulty.as_deref().unwrap_or("-").cyan());
    println!("  Game mode: {}", info.game_mode.as_deref().unwrap_or("-").cyan());
    println!("  Hardcore: {}", info.hardcore.to_string().cyan());
    println!("  Time: {} (day time {})", info.time, info.day_time);
    println!("  Spawn: {} {} {}", info.spawn.0, info.spawn.1, info.spawn.2);
    println!("  Game rules: {}", info.gamerule_count);
    println!("  Players: {}", info.player_count);
    println!("  Regions: {} terrain, {} entity", info.region_count, info.entity_region_count);
    println!("  Backups: {}", info.backup_count);
    if info.locked {
        println!("  {}", "Locked: session.lock present (world may be open)".yellow());
    }
    Ok(())
}

fn cmd_dump(manager: &WorldManager, world: &str, player: Option<&str>) -> Result<()> {
    let doc = match player {
        Some(uuid) => manager.load_player(world, uuid)?,
        None => manager.load_level(world)?,
    };
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}

/// Run a copy-heavy operation on a worker thread, drawing a progress bar
/// from its events
///
/// A restore may snapshot first, so the bar length follows the latest event.
fn with_progress_bar<T>(mut task: BackgroundTask<T>, active: &ActiveBar, message: &str) -> Result<T> {
    let mut bar: Option<ProgressBar> = None;
    let update = |bar: &mut Option<ProgressBar>, task: &mut BackgroundTask<T>| {
        for event in task.drain() {
            let pb = bar.get_or_insert_with(|| {
                let pb = ProgressBar::new(event.total as u64);
                if let Ok(style) = ProgressStyle::default_bar()
                    .template("{spinner:.green} {msg} [{bar:30.cyan/blue}] {pos}/{len}")
                {
                    pb.set_style(style.progress_chars("=> "));
                }
                pb.set_message(message.to_string());
                active.set(Some(pb.clone()));
                pb
            });
            pb.set_length(event.total as u64);
            pb.set_position(event.completed as u64);
        }
    };

    while !task.is_finished() {
        update(&mut bar, &mut task);
        thread::sleep(Duration::from_millis(50));
    }
    update(&mut bar, &mut task);

    active.set(None);
    if let Some(pb) = bar {
        pb.finish_and_clear();
    }
    Ok(task.join()?)
}

fn cmd_backup_create(manager: &WorldManager, bar: &ActiveBar, world: &str) -> Result<()> {
    let start = Instant::now();
    let world_name = world.to_string();
    let task = manager.spawn(move |m| m.create_backup(&world_name))?;
    let entry = with_progress_bar(task, bar, "Copying")?;

    println!("{} Created backup {}", "✓".green().bold(), entry.name.yellow().bold());
    println!("  Path: {}", entry.path.display().to_string().cyan());
    println!("  Time: {}", format_duration(trim_millis(start.elapsed())).to_string().cyan());
    Ok(())
}

fn cmd_backup_list(manager: &WorldManager, world: &str) -> Result<()> {
    let backups = manager.list_backups(world)?;
    if backups.is_empty() {
        println!("{}", "No backups found.".yellow());
        return Ok(());
    }
    println!("{}", "Backups (newest first):".blue().bold());
    for backup in backups {
        let when = backup
            .timestamp()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        println!("  {}  {}", backup.name.yellow(), when.dimmed());
    }
    Ok(())
}

fn cmd_backup_restore(manager: &WorldManager, bar: &ActiveBar, world: &str, name: &str) -> Result<()> {
    println!("{} {}", "Restoring backup".blue().bold(), name.yellow());
    let (world_name, backup_name) = (world.to_string(), name.to_string());
    let task = manager.spawn(move |m| m.restore_backup(&world_name, &backup_name))?;
    let result = with_progress_bar(task, bar, "Restoring")?;

    println!("{} Restoration complete", "✓".green().bold());
    println!("  Entries removed: {}", result.entries_removed.to_string().yellow());
    println!("  Files restored: {}", result.files_restored.to_string().cyan());
    println!("  Bytes written: {}", format_bytes(result.bytes_written).cyan());
    println!(
        "  Time: {}",
        format_duration(Duration::from_millis(result.duration_ms)).to_string().cyan()
    );
    Ok(())
}

fn trim_millis(d: Duration) -> Duration {
    Duration::from_millis(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

fn cmd_player(manager: &WorldManager, cmd: PlayerCommand) -> Result<()> {
    match cmd {
        PlayerCommand::List { target } => {
            print_names("Players:", &manager.list_players(&target.world)?, "No player files found.");
        }
        PlayerCommand::Set {
            target,
            uuid,
            x,
            y,
            z,
            health,
            hunger,
            slot,
        } => {
            let edit = PlayerEdit {
                x,
                y,
                z,
                health,
                hunger,
                selected_slot: slot,
            };
            report(&format!("Updated player {}", uuid), manager.set_player(&target.world, &uuid, &edit)?);
        }
        PlayerCommand::Kill { target, uuid } => {
            report(&format!("Killed player {}", uuid), manager.kill_player(&target.world, &uuid)?);
        }
        PlayerCommand::Delete { target, uuid } => {
            report(&format!("Deleted player {}", uuid), manager.delete_player(&target.world, &uuid)?);
        }
    }
    Ok(())
}

fn cmd_entity(manager: &WorldManager, cmd: EntityCommand) -> Result<()> {
    match cmd {
        EntityCommand::ListRegions { target } => {
            print_names(
                "Entity regions:",
                &manager.list_entity_regions(&target.world)?,
                "No entity region files found.",
            );
        }
        EntityCommand::DeleteRegion { target, region } => {
            let result = manager.delete_entity_region(&target.world, &region)?;
            report(&format!("Deleted entity region {}", region), result);
        }
        EntityCommand::DeleteAllRegions { target } => {
            let result = manager.delete_all_entity_regions(&target.world)?;
            if result.affected == 0 {
                println!("{}", "No entity region files to delete.".yellow());
            } else {
                report("Deleted all entity regions", result);
            }
        }
        EntityCommand::QueueSummon {
            target,
            entity,
            x,
            y,
            z,
            nbt,
        } => {
            let result = manager.queue_summon(&target.world, &entity, (x, y, z), nbt.as_deref())?;
            report(&format!("Queued summon of {}", entity), result);
        }
        EntityCommand::QueueKill { target, selector } => {
            let result = manager.queue_kill(&target.world, &selector)?;
            report(&format!("Queued kill {}", selector), result);
        }
    }
    Ok(())
}

fn cmd_regions(manager: &WorldManager, cmd: RegionsCommand) -> Result<()> {
    match cmd {
        RegionsCommand::List { target } => {
            print_names("Regions:", &manager.list_regions(&target.world)?, "No region files found.");
        }
        RegionsCommand::Delete { target, region } => {
            let result = manager.delete_region(&target.world, &region)?;
            report(&format!("Deleted region {}", region), result);
        }
        RegionsCommand::ResetChunk {
            target,
            chunk_x,
            chunk_z,
        } => {
            let result = manager.reset_chunk(&target.world, chunk_x, chunk_z)?;
            report(&format!("Reset chunk {},{}", chunk_x, chunk_z), result);
        }
    }
    Ok(())
}
