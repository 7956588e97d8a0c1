use anyhow::{Context, Result};
use chrono::{Datelike, Local, NaiveDate};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;

use ondoku::aggregator::{AggregateError, Aggregator};
use ondoku::config::Config;
use ondoku::model::{ReadingBundle, SourceKind, SourceSet};
use ondoku::render;
use ondoku::settings::SettingsStore;
use ondoku::sources::fallback;
use ondoku::storage::{stores, Database, DatabaseError, HistoryRecord};

/// Get the config directory path (~/.config/ondoku/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let config_dir = PathBuf::from(home).join(".config").join("ondoku");
    Ok(config_dir)
}

#[derive(Parser, Debug)]
#[command(name = "ondoku", about = "Daily reading-aloud aggregator", version)]
struct Args {
    /// Reset database (delete and recreate)
    #[arg(long)]
    reset_db: bool,

    /// Config file (default: ~/.config/ondoku/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show today's reading (default)
    Today(TodayArgs),
    /// Mark the day's reading as completed
    Complete(CompleteArgs),
    /// List completed days, newest first
    History {
        #[arg(long, default_value_t = 30)]
        limit: usize,
    },
    /// Current consecutive-day streak
    Streak,
    /// Month view of completed days
    Calendar {
        #[arg(long, value_name = "YYYY-MM", value_parser = parse_month)]
        month: Option<(i32, u32)>,
    },
    /// Reading totals
    Stats,
    /// Show or change user settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Manage the daily bundle cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(ClapArgs, Debug, Default)]
struct TodayArgs {
    /// Reading date (default: today)
    #[arg(long, value_name = "YYYY-MM-DD")]
    date: Option<NaiveDate>,

    /// Comma-separated sources, e.g. wiki,news (default: from settings)
    #[arg(long)]
    sources: Option<SourceSet>,

    /// Ignore the cache and fetch again
    #[arg(long)]
    force: bool,

    /// Print the bundle as JSON
    #[arg(long)]
    debug: bool,
}

#[derive(ClapArgs, Debug, Default)]
struct CompleteArgs {
    /// Reading date (default: today)
    #[arg(long, value_name = "YYYY-MM-DD")]
    date: Option<NaiveDate>,

    /// Sources the reading was shown with (default: the cached reading)
    #[arg(long)]
    sources: Option<SourceSet>,

    /// Replace an existing record for the day
    #[arg(long)]
    force: bool,
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    Show,
    /// Set one key, e.g. `fontSize large` or `enabledSources.news false`
    Set { key: String, value: String },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Remove entries older than N days
    Prune {
        #[arg(long)]
        days: Option<u32>,
    },
    /// Remove every cached bundle
    Clear,
}

fn parse_month(s: &str) -> Result<(i32, u32), String> {
    let (year, month) = s
        .split_once('-')
        .ok_or_else(|| format!("expected YYYY-MM, got '{s}'"))?;
    let year: i32 = year.parse().map_err(|_| format!("invalid year '{year}'"))?;
    let month: u32 = month.parse().map_err(|_| format!("invalid month '{month}'"))?;
    if !(1..=12).contains(&month) {
        return Err(format!("month must be 1-12, got {month}"));
    }
    Ok((year, month))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // Set up config directory
    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        eprintln!("Created config directory: {}", config_dir.display());
    }

    // Reading history is personal; keep the directory user-only on Unix
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(&config_dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(&config_dir, perms) {
                    tracing::warn!(
                        path = %config_dir.display(),
                        error = %e,
                        "Failed to set config directory permissions to 0700"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %config_dir.display(),
                    error = %e,
                    "Failed to read config directory metadata"
                );
            }
        }
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let db_path = config_dir.join("ondoku.db");
    if args.reset_db && db_path.exists() {
        std::fs::remove_file(&db_path).context("Failed to delete database")?;
        eprintln!("Database reset.");
    }

    let db_path_str = db_path
        .to_str()
        .context("Database path contains invalid UTF-8")?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of ondoku appears to be running. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open database: {}", e));
        }
    };

    let command = args
        .command
        .unwrap_or_else(|| Command::Today(TodayArgs::default()));

    match command {
        Command::Today(today) => run_today(&config, db, today).await,
        Command::Complete(complete) => run_complete(&config, db, complete).await,
        Command::History { limit } => {
            let records = db.list_history().await.context("Failed to read history")?;
            let shown = &records[..limit.min(records.len())];
            print!("{}", render::render_history(shown));
            Ok(())
        }
        Command::Streak => {
            let streak = db.streak().await.context("Failed to compute streak")?;
            println!("連続記録: {streak}日");
            Ok(())
        }
        Command::Calendar { month } => {
            let (year, month) = month.unwrap_or_else(|| {
                let today = Local::now().date_naive();
                (today.year(), today.month())
            });
            let records = db
                .history_month(year, month)
                .await
                .context("Failed to read history")?;
            let calendar = render::render_calendar(year, month, &records)
                .with_context(|| format!("Invalid month {year}-{month:02}"))?;
            print!("{calendar}");
            Ok(())
        }
        Command::Stats => {
            let stats = db.history_stats().await.context("Failed to read history")?;
            print!("{}", render::render_stats(&stats));
            Ok(())
        }
        Command::Settings { action } => run_settings(&db, action).await,
        Command::Cache { action } => {
            let removed = match action {
                CacheAction::Prune { days } => db
                    .prune_cache(days.unwrap_or(config.cache_prune_days))
                    .await
                    .context("Failed to prune cache")?,
                CacheAction::Clear => db
                    .clear_store(stores::READING_CACHE)
                    .await
                    .context("Failed to clear cache")?,
            };
            println!("Removed {removed} cached bundle(s).");
            Ok(())
        }
    }
}

/// The day's bundle, or the fallback reading when every provider failed.
///
/// On total failure the per-source reasons are returned alongside so the
/// caller can report them.
async fn load_bundle(
    aggregator: &Aggregator,
    date: NaiveDate,
    enabled: SourceSet,
    force: bool,
) -> Result<(ReadingBundle, Option<BTreeMap<SourceKind, String>>)> {
    match aggregator.daily_bundle(date, enabled, force).await {
        Ok(bundle) => Ok((bundle, None)),
        Err(AggregateError::AllSourcesFailed { errors }) => {
            tracing::warn!(date = %date, status = 503, "All sources failed, using fallback reading");
            let bundle = ReadingBundle::new(date, vec![fallback::reading(date)], BTreeMap::new());
            Ok((bundle, Some(errors)))
        }
        Err(e @ AggregateError::NoSourcesEnabled) => Err(e).context(
            "Enable a source with `ondoku settings set enabledSources.<name> true` or pass --sources",
        ),
    }
}

async fn run_today(config: &Config, db: Database, args: TodayArgs) -> Result<()> {
    let store = SettingsStore::load(&db).await.context("Failed to load settings")?;
    let settings = store.get().clone();
    let date = args.date.unwrap_or_else(|| Local::now().date_naive());
    let enabled = args.sources.unwrap_or_else(|| settings.source_set());

    let completed = db
        .has_completed(date)
        .await
        .context("Failed to read history")?;

    let aggregator = Aggregator::from_config(config, db).context("Failed to build HTTP client")?;
    let (bundle, failures) = load_bundle(&aggregator, date, enabled, args.force).await?;

    if args.debug {
        let json = match &failures {
            Some(errors) => serde_json::json!({ "errors": errors, "fallback": bundle }),
            None => serde_json::to_value(&bundle)?,
        };
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    if let Some(errors) = &failures {
        eprint!("{}", render::render_errors(errors));
        eprintln!();
    }
    print!("{}", render::render_bundle(&bundle, &settings, completed));
    Ok(())
}

async fn run_complete(config: &Config, db: Database, args: CompleteArgs) -> Result<()> {
    let date = args.date.unwrap_or_else(|| Local::now().date_naive());
    match record_completion(config, &db, date, &args).await? {
        Some(record) => {
            let streak = db.streak().await.context("Failed to compute streak")?;
            println!("{date} を記録しました（{}字）。連続記録: {streak}日", record.char_count);
        }
        None => println!("{date} は読了済みです。記録し直すには --force を付けてください。"),
    }
    Ok(())
}

/// Record `date` as read. `None` when the day already has a completed record
/// and `--force` was not given.
///
/// The recorded bundle is the one last shown for the day: the cached bundle
/// (restricted to `--sources` when given), fetched only when nothing is
/// cached.
async fn record_completion(
    config: &Config,
    db: &Database,
    date: NaiveDate,
    args: &CompleteArgs,
) -> Result<Option<HistoryRecord>> {
    if !args.force && db.has_completed(date).await.context("Failed to read history")? {
        return Ok(None);
    }

    let aggregator =
        Aggregator::from_config(config, db.clone()).context("Failed to build HTTP client")?;
    let bundle = match aggregator.cached_bundle(date, args.sources).await {
        Some(bundle) => bundle,
        None => {
            let enabled = match args.sources {
                Some(sources) => sources,
                None => {
                    let store = SettingsStore::load(db).await.context("Failed to load settings")?;
                    store.get().source_set()
                }
            };
            load_bundle(&aggregator, date, enabled, false).await?.0
        }
    };

    let mut record = HistoryRecord::completed(date, bundle.total_char_count, bundle.source_list());
    if bundle.sections.iter().any(|s| s.source == SourceKind::Fallback) {
        record.group_id = Some(fallback::group_for_date(date).id.to_string());
    }
    db.append_history(&record)
        .await
        .context("Failed to record reading")?;
    Ok(Some(record))
}

async fn run_settings(db: &Database, action: SettingsAction) -> Result<()> {
    let mut store = SettingsStore::load(db).await.context("Failed to load settings")?;
    let settings = match action {
        SettingsAction::Show => store.get(),
        SettingsAction::Set { key, value } => store
            .set_key(&key, &value)
            .await
            .with_context(|| format!("Failed to set '{key}'"))?,
    };
    println!("{}", serde_json::to_string_pretty(settings)?);
    Ok(())
}
