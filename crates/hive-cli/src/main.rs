use std::io::{self, BufRead, Write as _};
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use hive_core::analyze::{analyze_tasks, overlapping_files};
use hive_core::config::{self, ConfigKey, HiveConfig};
use hive_core::error::HiveError;
use hive_core::git;
use hive_core::merge::{abort_merge, merge_task, MergeOptions};
use hive_core::ops::{create_task, drop_task, DropOptions};
use hive_core::reconcile;
use hive_core::registry;
use hive_core::review::{batch_review_request, review_request, ReviewEngine};
use hive_core::task::TaskStatus;
use hive_core::worktree;

mod version;

#[derive(Parser)]
#[command(name = "hive", version = version::FULL, about = "Parallel tasks on isolated git worktrees")]
struct Cli {
    /// Repository to operate on (defaults to the current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a task: branch, worktree, and registry record
    New {
        /// Free-text description; the slug is derived from it
        #[arg(required = true)]
        description: Vec<String>,
        /// Branch to root the task on instead of the configured default
        #[arg(long)]
        base: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// List tasks
    List {
        /// Only tasks with this status (active, merged, dropped)
        #[arg(long)]
        status: Option<TaskStatus>,
        #[arg(long)]
        json: bool,
    },
    /// Show one task's record and live worktree status
    Status {
        slug: String,
        #[arg(long)]
        json: bool,
    },
    /// Show a task's diff against its base branch
    Diff {
        slug: String,
        #[arg(long)]
        base: Option<String>,
        /// Per-file counters instead of the full patch
        #[arg(long)]
        stat: bool,
        #[arg(long)]
        json: bool,
    },
    /// Merge a task branch into the target branch
    Merge {
        slug: String,
        #[arg(long)]
        target: Option<String>,
        /// Leave the worktree in place after a successful merge
        #[arg(long)]
        keep_worktree: bool,
        /// Skip pulling the target branch first
        #[arg(long)]
        no_pull: bool,
        #[arg(long)]
        json: bool,
    },
    /// Abort an in-progress merge in the main working copy
    AbortMerge,
    /// Drop a task, removing its worktree
    Drop {
        slug: String,
        /// Discard uncommitted changes without asking
        #[arg(long)]
        force: bool,
        /// Delete the registry record instead of marking it dropped
        #[arg(long)]
        remove: bool,
        #[arg(long)]
        json: bool,
    },
    /// List git worktrees with their hive slugs
    Worktrees {
        #[arg(long)]
        json: bool,
    },
    /// Per-task diff stats and cross-task file overlaps
    Analyze {
        #[arg(long)]
        json: bool,
    },
    /// Send a task diff (or the whole active set) to the review service
    Review {
        slug: Option<String>,
        /// Review every active task together with the overlap set
        #[arg(long)]
        batch: bool,
        #[arg(long)]
        json: bool,
    },
    /// Reconcile worktrees against the registry
    Clean {
        /// Report what would change without touching anything
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        json: bool,
    },
    /// Read or change configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Print version information
    Version,
}

#[derive(Subcommand)]
enum ConfigAction {
    Get { key: String },
    Set { key: String, value: String },
    List,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("HIVE_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let start_dir = cli.root.clone().unwrap_or(std::env::current_dir()?);

    // Version needs no repository.
    if matches!(cli.command, Command::Version) {
        println!("hive {}", version::FULL);
        return Ok(());
    }

    let repo_root = git::repo_root(&start_dir)?;
    let config = config::load_or_init(&repo_root)?;

    match cli.command {
        Command::New {
            description,
            base,
            json,
        } => cmd_new(&repo_root, &config, &description.join(" "), base.as_deref(), json),
        Command::List { status, json } => cmd_list(&repo_root, status, json),
        Command::Status { slug, json } => cmd_status(&repo_root, &slug, json),
        Command::Diff {
            slug,
            base,
            stat,
            json,
        } => cmd_diff(&repo_root, &config, &slug, base.as_deref(), stat, json),
        Command::Merge {
            slug,
            target,
            keep_worktree,
            no_pull,
            json,
        } => {
            let options = MergeOptions {
                target_branch: target,
                keep_worktree,
                pull_first: !no_pull,
            };
            cmd_merge(&repo_root, &config, &slug, &options, json)
        }
        Command::AbortMerge => {
            if abort_merge(&repo_root)? {
                println!("merge aborted");
            } else {
                println!("no merge in progress");
            }
            Ok(())
        }
        Command::Drop {
            slug,
            force,
            remove,
            json,
        } => cmd_drop(&repo_root, &slug, force, remove, json),
        Command::Worktrees { json } => cmd_worktrees(&repo_root, json),
        Command::Analyze { json } => cmd_analyze(&repo_root, &config, json),
        Command::Review { slug, batch, json } => {
            cmd_review(&repo_root, &config, slug.as_deref(), batch, json)
        }
        Command::Clean { dry_run, json } => cmd_clean(&repo_root, &config, dry_run, json),
        Command::Config { action } => cmd_config(&repo_root, config, action),
        Command::Version => unreachable!("handled before repo resolution"),
    }
}

fn cmd_new(
    repo_root: &std::path::Path,
    config: &HiveConfig,
    description: &str,
    base: Option<&str>,
    json: bool,
) -> Result<()> {
    let created = create_task(repo_root, config, description, base)?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "ok": true,
                "task": created.task,
                "worktree": created.worktree,
            }))?
        );
        return Ok(());
    }
    println!("created task {}", created.task.slug);
    println!("  branch   {}", created.task.branch);
    println!("  base     {}", created.worktree.base);
    println!("  worktree {}", created.worktree.path.display());
    let share = &created.worktree.share;
    if !share.created.is_empty() {
        println!(
            "  shared   {} ({} saved)",
            share.created.join(", "),
            format_bytes(share.saved_bytes)
        );
    }
    for skipped in &share.skipped {
        println!("  skipped  {skipped}");
    }
    Ok(())
}

fn cmd_list(repo_root: &std::path::Path, status: Option<TaskStatus>, json: bool) -> Result<()> {
    let tasks = match status {
        Some(status) => registry::tasks_by_status(repo_root, status)?,
        None => registry::tasks(repo_root)?,
    };
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "ok": true, "tasks": tasks }))?
        );
        return Ok(());
    }
    if tasks.is_empty() {
        println!("no tasks");
        return Ok(());
    }
    for task in tasks {
        println!(
            "{:<30} {:<8} {:<36} {}",
            task.slug, task.status, task.branch, task.description
        );
    }
    Ok(())
}

fn cmd_status(repo_root: &std::path::Path, slug: &str, json: bool) -> Result<()> {
    let task = registry::find_task(repo_root, slug)?
        .ok_or_else(|| HiveError::NotFound(slug.to_string()))?;
    let live = if task.worktree_path.exists() {
        Some(worktree::worktree_status(repo_root, slug)?)
    } else {
        None
    };
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "ok": true, "task": task, "worktree": live }))?
        );
        return Ok(());
    }
    println!("{} [{}]", task.slug, task.status);
    println!("  description {}", task.description);
    println!("  branch      {}", task.branch);
    println!("  worktree    {}", task.worktree_path.display());
    println!("  created     {}", task.created_at);
    match live {
        Some(status) if status.clean => {
            println!("  status      clean (ahead {}, behind {})", status.ahead, status.behind);
        }
        Some(status) => {
            println!(
                "  status      dirty: {} modified, {} added, {} deleted, {} staged, {} conflicted",
                status.modified, status.added, status.deleted, status.staged, status.conflicted
            );
        }
        None => println!("  status      worktree missing"),
    }
    Ok(())
}

fn cmd_diff(
    repo_root: &std::path::Path,
    config: &HiveConfig,
    slug: &str,
    base: Option<&str>,
    stat: bool,
    json: bool,
) -> Result<()> {
    if stat || json {
        let stats = worktree::diff_stats(repo_root, config, slug, base)?;
        if json {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({ "ok": true, "stats": stats }))?
            );
            return Ok(());
        }
        for file in &stats.files {
            println!(
                "{:<50} +{:<6} -{:<6} {}",
                file.path, file.insertions, file.deletions, file.change_type
            );
        }
        println!(
            "{} files, +{} -{}",
            stats.total_files, stats.total_insertions, stats.total_deletions
        );
        return Ok(());
    }
    let diff = worktree::full_diff(repo_root, config, slug, base)?;
    println!("{diff}");
    Ok(())
}

fn cmd_merge(
    repo_root: &std::path::Path,
    config: &HiveConfig,
    slug: &str,
    options: &MergeOptions,
    json: bool,
) -> Result<()> {
    let outcome = merge_task(repo_root, config, slug, options)?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "ok": outcome.merged, "outcome": outcome }))?
        );
        if !outcome.merged {
            std::process::exit(1);
        }
        return Ok(());
    }
    if outcome.merged {
        println!("merged {} into {}", slug, outcome.target);
        return Ok(());
    }
    println!("merge of {} into {} stopped on conflicts:", slug, outcome.target);
    for path in &outcome.conflicts {
        println!("  {path}");
    }
    println!("resolve and commit in the main working copy, or run `hive abort-merge`");
    std::process::exit(1);
}

fn cmd_drop(
    repo_root: &std::path::Path,
    slug: &str,
    force: bool,
    remove: bool,
    json: bool,
) -> Result<()> {
    let options = DropOptions {
        force,
        remove_record: remove,
    };
    let report = match drop_task(repo_root, slug, options) {
        Err(HiveError::DirtyWorktree(_)) if !force => {
            let discard = confirm(&format!(
                "worktree for '{slug}' has uncommitted changes; discard and drop? [y/N] "
            ))?;
            if !discard {
                println!("drop aborted");
                std::process::exit(1);
            }
            drop_task(
                repo_root,
                slug,
                DropOptions {
                    force: true,
                    remove_record: remove,
                },
            )?
        }
        other => other?,
    };
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "ok": true, "drop": report }))?
        );
        return Ok(());
    }
    if report.record_removed {
        println!("dropped {slug} and removed its record");
    } else {
        println!("dropped {slug}");
    }
    Ok(())
}

fn cmd_worktrees(repo_root: &std::path::Path, json: bool) -> Result<()> {
    let worktrees = worktree::list_worktrees(repo_root)?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "ok": true, "worktrees": worktrees }))?
        );
        return Ok(());
    }
    for info in worktrees {
        println!(
            "{:<20} {:<30} {}",
            info.slug.as_deref().unwrap_or("-"),
            info.branch.as_deref().unwrap_or("(detached)"),
            info.path.display()
        );
    }
    Ok(())
}

fn cmd_analyze(repo_root: &std::path::Path, config: &HiveConfig, json: bool) -> Result<()> {
    let tasks = registry::tasks(repo_root)?;
    let analyses = analyze_tasks(repo_root, config, &tasks, None)?;
    let overlaps = overlapping_files(&analyses);
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "ok": true,
                "taskAnalyses": analyses,
                "overlaps": overlaps,
            }))?
        );
        return Ok(());
    }
    for analysis in &analyses {
        println!(
            "{}: {} files, +{} -{}",
            analysis.slug,
            analysis.stats.total_files,
            analysis.stats.total_insertions,
            analysis.stats.total_deletions
        );
    }
    if overlaps.is_empty() {
        println!("no overlapping files");
    } else {
        println!("overlapping files:");
        for overlap in &overlaps {
            println!("  {} ({})", overlap.path, overlap.slugs.join(", "));
        }
    }
    Ok(())
}

fn cmd_review(
    repo_root: &std::path::Path,
    config: &HiveConfig,
    slug: Option<&str>,
    batch: bool,
    json: bool,
) -> Result<()> {
    // Network clients register here; none ship with the core binary, so
    // resolution explains what is missing instead of failing generically.
    let engine = ReviewEngine::new();
    let provider = engine.resolve(config)?;
    let tasks = registry::tasks(repo_root)?;
    let analyses = analyze_tasks(repo_root, config, &tasks, None)?;
    if batch {
        let overlaps = overlapping_files(&analyses);
        let report = provider.batch_review(&batch_review_request(&analyses, &overlaps))?;
        if json {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({ "ok": true, "report": report }))?
            );
        } else {
            println!("{}", report.overall);
        }
        return Ok(());
    }
    let slug = slug.ok_or_else(|| {
        HiveError::Validation("review needs a task slug or --batch".to_string())
    })?;
    let analysis = analyses
        .iter()
        .find(|analysis| analysis.slug == slug)
        .ok_or_else(|| HiveError::NotFound(slug.to_string()))?;
    let result = provider.review(&review_request(analysis))?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "ok": true, "review": result }))?
        );
    } else {
        println!("{}", result.summary);
    }
    Ok(())
}

fn cmd_clean(
    repo_root: &std::path::Path,
    config: &HiveConfig,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    if dry_run {
        let report = reconcile::scan(repo_root, config)?;
        if json {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({ "ok": true, "scan": report }))?
            );
            return Ok(());
        }
        for info in &report.orphan_worktrees {
            println!("orphan worktree: {}", info.path.display());
        }
        for slug in &report.missing_worktrees {
            println!("missing worktree for task: {slug}");
        }
        if report.orphan_worktrees.is_empty() && report.missing_worktrees.is_empty() {
            println!("registry and worktrees are consistent");
        }
        return Ok(());
    }
    let report = reconcile::clean(repo_root, config)?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "ok": true, "clean": report }))?
        );
        return Ok(());
    }
    for slug in &report.removed_worktrees {
        println!("removed orphan worktree {slug}");
    }
    for slug in &report.dropped_tasks {
        println!("marked {slug} dropped (worktree missing)");
    }
    if report.removed_worktrees.is_empty() && report.dropped_tasks.is_empty() {
        println!("nothing to clean");
    }
    Ok(())
}

fn cmd_config(
    repo_root: &std::path::Path,
    mut config: HiveConfig,
    action: ConfigAction,
) -> Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let key: ConfigKey = key.parse()?;
            println!("{}", config::get_value(&config, key));
        }
        ConfigAction::Set { key, value } => {
            let key: ConfigKey = key.parse()?;
            config::set_value(&mut config, key, &value)?;
            config::save_config(repo_root, &config)?;
            println!("{key} = {}", config::get_value(&config, key));
        }
        ConfigAction::List => {
            for key in ConfigKey::ALL {
                println!("{key} = {}", config::get_value(&config, key));
            }
        }
    }
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let answer = line.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
