use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;

use reclaimer_core::disk::{self, VolumeChange};
use reclaimer_core::{
    ProgressEvent, ReclaimConfig, ReclaimPhase, Reclaimer, RunSummary, Target, format_bytes,
};

pub mod settings;

use settings::{Settings, hours_to_duration};

/// 清理命令的参数配置
#[derive(Debug, Default)]
struct CleanCommandArgs {
    force: bool,
    yes: bool,
    config: Option<PathBuf>,
    targets: Vec<PathBuf>,
    concurrency: Option<usize>,
    older_than_hours: Option<u64>,
    no_prune: bool,
    json: bool,
}

#[derive(Parser)]
#[command(name = "reclaimer")]
#[command(about = "A tool for reclaiming disk space by bulk-deleting clutter and cache directories")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Delete old files under the configured targets and reclaim browser caches
    Clean {
        /// Ignore file age and terminate processes that hold resource directories
        #[arg(short, long)]
        force: bool,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,

        /// Path to a TOML settings file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directories to reclaim instead of the configured targets (can be specified multiple times)
        #[arg(short = 't', long = "target", action = clap::ArgAction::Append)]
        targets: Vec<PathBuf>,

        /// Maximum number of concurrent filesystem operations
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,

        /// Only delete entries last modified more than H hours ago
        #[arg(long)]
        older_than_hours: Option<u64>,

        /// Skip the empty directory pass
        #[arg(long)]
        no_prune: bool,

        /// Print the summary as JSON (requires --yes)
        #[arg(long, requires = "yes")]
        json: bool,
    },
    /// Print the effective settings
    Config {
        /// Path to a TOML settings file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // 设置日志级别
    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "reclaimer={log_level},reclaimer_core={log_level},reclaimer_cli={log_level}"
        ))
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Commands::Clean {
            force,
            yes,
            config,
            targets,
            concurrency,
            older_than_hours,
            no_prune,
            json,
        } => handle_clean_command(CleanCommandArgs {
            force,
            yes,
            config,
            targets,
            concurrency,
            older_than_hours,
            no_prune,
            json,
        }),
        Commands::Config { config } => handle_config_command(config),
    }
}

fn handle_config_command(config: Option<PathBuf>) -> Result<()> {
    let settings = Settings::load(config.as_deref())?;
    if config.is_none() {
        if let Some(path) = Settings::config_file_path() {
            println!("# {}", path.display());
        }
    }
    print!("{}", settings.to_toml()?);
    Ok(())
}

fn handle_clean_command(args: CleanCommandArgs) -> Result<()> {
    let settings = Settings::load(args.config.as_deref())?;
    let config = create_reclaim_config(&settings, &args);

    if config.targets.is_empty() && config.resource_groups.is_empty() {
        notice(args.json, "No targets configured.");
        return Ok(());
    }

    if !args.json {
        display_plan(&config);
    }

    // 确认清理
    if !args.yes && !confirm_reclaim(&config)? {
        println!("Reclaiming cancelled.");
        return Ok(());
    }

    let watched = watched_paths(&config);
    let disks_before = disk::volumes_for(&watched);

    let reclaimer = Reclaimer::new(config)?;
    let summary = if args.json {
        reclaimer.run()
    } else {
        let summary = reclaimer.run_with_progress(|event| {
            print!("\r{}", format_status(&event));
            let _ = io::stdout().flush();
        });
        println!();
        summary
    };

    let volumes = disk::compare(&disks_before, &disk::volumes_for(&watched));

    // 显示结果
    if args.json {
        let report = SummaryReport::new(&summary, &volumes);
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        display_summary(&summary);
        display_disk_space(&volumes);
    }

    Ok(())
}

/// `--json` 模式下提示信息写到 stderr，保持 stdout 只有 JSON
fn notice(json: bool, message: &str) {
    if json {
        eprintln!("{message}");
    } else {
        println!("{message}");
    }
}

/// 需要统计磁盘空间的路径：所有目标和资源组目录
fn watched_paths(config: &ReclaimConfig) -> Vec<PathBuf> {
    config
        .targets
        .iter()
        .map(|target| target.path.clone())
        .chain(
            config
                .resource_groups
                .iter()
                .flat_map(|group| group.directories.iter().cloned()),
        )
        .collect()
}

fn create_reclaim_config(settings: &Settings, args: &CleanCommandArgs) -> ReclaimConfig {
    let mut config = settings.to_reclaim_config();

    if !args.targets.is_empty() {
        config.targets = args.targets.iter().map(Target::new).collect();
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency_limit = concurrency;
    }
    if let Some(hours) = args.older_than_hours {
        config.age_threshold = hours_to_duration(hours);
    }

    config.force = args.force;
    config.prune_empty_dirs = config.prune_empty_dirs && !args.no_prune;
    config
}

fn display_plan(config: &ReclaimConfig) {
    println!("Targets ({}):", config.targets.len());
    for target in &config.targets {
        println!("  {}", target.path.display());
    }

    if !config.resource_groups.is_empty() {
        println!("Resource groups ({}):", config.resource_groups.len());
        for group in &config.resource_groups {
            println!(
                "  {} ({} directories)",
                group.process_name,
                group.directories.len()
            );
        }
    }

    if config.force {
        println!("Mode: force (file age ignored)");
    } else {
        println!(
            "Mode: only entries older than {} hours",
            config.age_threshold.as_secs() / 3600
        );
    }
}

fn confirm_reclaim(config: &ReclaimConfig) -> Result<bool> {
    if config.force {
        println!("\nForce mode will terminate running processes that hold resource directories.");
    }

    print!(
        "\nThis will permanently delete files under {} targets. Continue? [y/N]: ",
        config.targets.len()
    );

    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    Ok(is_affirmative(&input))
}

fn is_affirmative(input: &str) -> bool {
    let input = input.trim().to_lowercase();
    input == "y" || input == "yes"
}

fn phase_label(phase: ReclaimPhase) -> &'static str {
    match phase {
        ReclaimPhase::Removing => "Removing",
        ReclaimPhase::Reclaiming => "Reclaiming locked resources",
        ReclaimPhase::Pruning => "Removing empty directories",
        ReclaimPhase::Complete => "Complete",
    }
}

/// 单行状态文本，用于覆盖刷新
fn format_status(event: &ProgressEvent) -> String {
    let s = &event.snapshot;
    format!(
        "[*] {}: {} files | {} folders | {} skipped | {} failed",
        phase_label(event.phase),
        s.files_deleted,
        s.folders_deleted,
        s.skipped,
        s.failed
    )
}

fn display_summary(summary: &RunSummary) {
    let s = &summary.stats;
    println!("\nReclaiming completed!");
    println!("Files deleted: {}", s.files_deleted);
    println!("Folders deleted: {}", s.folders_deleted);
    println!("Skipped: {}", s.skipped);
    println!("Failed operations: {}", s.failed);
    println!("Total deleted: {}", s.total_deleted());
    println!("Elapsed: {:.2}s", summary.elapsed_secs());
}

fn format_signed_bytes(bytes: i64) -> String {
    if bytes < 0 {
        format!("-{}", format_bytes(bytes.unsigned_abs()))
    } else {
        format!("+{}", format_bytes(bytes.unsigned_abs()))
    }
}

fn format_volume(volume: &VolumeChange) -> String {
    let after = volume.after();
    format!(
        "{}: total {} | used {} | free {} ({:.1}%) | change {}",
        volume.mount_point.display(),
        format_bytes(after.total),
        format_bytes(after.used()),
        format_bytes(after.available),
        after.available_percent(),
        format_signed_bytes(volume.reclaimed())
    )
}

fn display_disk_space(volumes: &[VolumeChange]) {
    if volumes.is_empty() {
        return;
    }
    println!("\nDisk space:");
    for volume in volumes {
        println!("  {}", format_volume(volume));
    }
}

/// JSON 输出格式
#[derive(Debug, Serialize)]
struct SummaryReport {
    files_deleted: u64,
    folders_deleted: u64,
    skipped: u64,
    failed: u64,
    total_deleted: u64,
    elapsed_seconds: f64,
    disks: Vec<DiskReport>,
}

#[derive(Debug, Serialize)]
struct DiskReport {
    mount_point: PathBuf,
    total_bytes: u64,
    free_bytes_before: u64,
    free_bytes_after: u64,
    reclaimed_bytes: i64,
}

impl SummaryReport {
    fn new(summary: &RunSummary, volumes: &[VolumeChange]) -> Self {
        let s = &summary.stats;
        Self {
            files_deleted: s.files_deleted,
            folders_deleted: s.folders_deleted,
            skipped: s.skipped,
            failed: s.failed,
            total_deleted: s.total_deleted(),
            elapsed_seconds: summary.elapsed_secs(),
            disks: volumes
                .iter()
                .map(|volume| DiskReport {
                    mount_point: volume.mount_point.clone(),
                    total_bytes: volume.total,
                    free_bytes_before: volume.available_before,
                    free_bytes_after: volume.available_after,
                    reclaimed_bytes: volume.reclaimed(),
                })
                .collect(),
        }
    }
}
