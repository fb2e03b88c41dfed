use std::io;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use rememberizer_engine::{Domain, LearningEngine, LearningStore};
use rememberizer_storage::Storage;

mod config;
mod logging;
mod practice;

use config::Config;

#[derive(Debug, Parser)]
#[command(name = "rememberizer", version, about = "Learn facts with adaptive multiple-choice practice")]
struct Cli {
    /// SQLite database file; overrides DATABASE_PATH.
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Import one or more JSON domain files.
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List imported domains.
    Domains,
    /// Practice a domain interactively.
    Practice {
        /// Domain name or id.
        domain: String,
        #[arg(long, default_value = "local")]
        user: String,
        /// Stop after this many turns.
        #[arg(long)]
        max_turns: Option<usize>,
    },
    /// Show learning progress for a domain.
    Progress {
        domain: String,
        #[arg(long, default_value = "local")]
        user: String,
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Delete all progress of a user for a domain.
    Reset {
        domain: String,
        #[arg(long, default_value = "local")]
        user: String,
        /// Do not ask for confirmation.
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(path) = cli.database.clone() {
        config.database_path = path;
    }

    let _log_guard = logging::init_tracing(&config.log_level, config.log_dir.as_deref());

    let storage = Storage::new(&config.database_path)
        .with_context(|| format!("opening database {}", config.database_path.display()))?;
    tracing::debug!(db_path = %storage.db_path(), "database ready");

    match cli.command {
        Command::Import { files } => import(&storage, &files),
        Command::Domains => list_domains(&storage),
        Command::Practice {
            domain,
            user,
            max_turns,
        } => {
            let engine = LearningEngine::new(&storage, config.engine_config()?)?;
            let domain = resolve_domain(&storage, &domain)?;
            let stdin = io::stdin();
            let mut input = stdin.lock();
            let mut out = io::stdout();
            practice::run(&engine, &domain, &user, &mut input, &mut out, max_turns)?;
            Ok(())
        }
        Command::Progress { domain, user, json } => {
            let engine = LearningEngine::new(&storage, config.engine_config()?)?;
            let domain = resolve_domain(&storage, &domain)?;
            show_progress(&engine, &domain, &user, json)
        }
        Command::Reset { domain, user, yes } => {
            let engine = LearningEngine::new(&storage, config.engine_config()?)?;
            let domain = resolve_domain(&storage, &domain)?;
            if !yes && !confirm(&format!("Reset all progress of '{user}' in {}?", domain.name))? {
                println!("Aborted.");
                return Ok(());
            }
            let summary = engine.reset_progress(domain.id, &user)?;
            println!(
                "Removed {} fact states and {} attempts.",
                summary.fact_states_deleted, summary.attempts_deleted
            );
            Ok(())
        }
    }
}

fn import(storage: &Storage, files: &[PathBuf]) -> Result<()> {
    let catalog = storage.catalog();
    for path in files {
        let domain_id = catalog
            .import_file(path)
            .with_context(|| format!("importing {}", path.display()))?;
        println!("Imported {} as domain {domain_id}", path.display());
    }
    Ok(())
}

fn list_domains(storage: &Storage) -> Result<()> {
    let domains = storage.catalog().list_domains()?;
    if domains.is_empty() {
        println!("No domains imported yet.");
        return Ok(());
    }
    for domain in domains {
        println!(
            "{:>4}  {:<30} {:>4} facts  [{}]",
            domain.id,
            domain.name,
            domain.fact_count,
            domain.fields.join(", ")
        );
    }
    Ok(())
}

/// Accepts a numeric id or an exact domain name.
fn resolve_domain(storage: &Storage, key: &str) -> Result<Domain> {
    let found = match key.parse::<i64>() {
        Ok(id) => storage.domain(id)?,
        Err(_) => storage.catalog().find_domain_by_name(key)?,
    };
    match found {
        Some(domain) => Ok(domain),
        None => bail!("unknown domain '{key}'"),
    }
}

fn show_progress<S: LearningStore>(
    engine: &LearningEngine<S>,
    domain: &Domain,
    user: &str,
    json: bool,
) -> Result<()> {
    let progress = engine.progress_summary(domain.id, user)?;
    let activity = engine.activity_summary(domain.id, user)?;

    if json {
        let body = serde_json::json!({
            "domain": domain.name,
            "progress": progress,
            "activity": activity,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!("{} ({user})", domain.name);
    println!("  {}", progress.symbols);
    println!(
        "  {} facts: {} mastered, {} learned, {} unlearned",
        progress.total, progress.mastered, progress.learned, progress.unlearned
    );
    println!(
        "  {} answers ({:.0}% correct) over {} sessions, ~{} min",
        activity.total_attempts,
        activity.accuracy() * 100.0,
        activity.sessions,
        activity.minutes_spent
    );
    println!(
        "  today: {} answers, streak {} days (best {}){}",
        activity.attempts_today,
        activity.current_streak,
        activity.longest_streak,
        if activity.streak_at_risk { ", practice today to keep it" } else { "" }
    );
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    use std::io::{BufRead, Write};

    print!("{prompt} [y/N] ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}
