//! Bookmarks CLI
//!
//! Command-line interface over a local bookmark database:
//! - Add and remove entries
//! - Browse by rank, page, day, tag and domain
//! - Inspect index statistics and consistency

use anyhow::{bail, Context};
use bookmarks::storage::SqliteBackend;
use bookmarks::{BookmarkStore, Config, Entry, EntryId, LoggingConfig};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "bookmarks")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Store and browse bookmarks by time, tag and domain")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the usual locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Table, global = true)]
    pub format: Format,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a bookmark
    Add {
        #[arg(short, long)]
        url: String,
        #[arg(short = 'T', long)]
        title: String,
        /// Tag (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },

    /// Remove a bookmark by id
    Remove { id: String },

    /// Show bookmarks by id
    Get {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// List bookmarks newest first, ranks [start, end)
    List {
        #[arg(short, long, default_value = "0")]
        start: usize,
        #[arg(short, long)]
        end: Option<usize>,
    },

    /// Show one page of bookmarks, newest first
    Page {
        #[arg(short, long, default_value = "0")]
        index: usize,
        #[arg(short, long, default_value = "20")]
        size: usize,
        /// Keep going until the last page
        #[arg(long)]
        all: bool,
    },

    /// Bookmarks created on a UTC day (0 = today)
    Day {
        #[arg(default_value = "0")]
        days_ago: u32,
    },

    /// List all tags
    Tags,

    /// Bookmarks carrying a tag
    Tag { name: String },

    /// List all domains
    Domains,

    /// Bookmarks on a domain
    Domain { name: String },

    /// Bookmarks of a day, grouped by domain
    Group {
        #[arg(short, long, default_value = "0")]
        days_ago: u32,
    },

    /// Show index statistics and consistency
    Stats,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let Cli {
        command,
        config,
        format,
    } = Cli::parse();

    if let Commands::Config { output } = &command {
        return write_default_config(output.as_deref());
    }

    let config = match &config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    init_logging(&config.logging);

    let store = BookmarkStore::open_sqlite(&config.storage)
        .with_context(|| format!("opening {:?}", config.storage.db_path()))?;

    run(&store, command, format)
}

fn init_logging(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("bookmarks={}", logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if logging.is_json() {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn run(store: &BookmarkStore<SqliteBackend>, command: Commands, format: Format) -> anyhow::Result<()> {
    match command {
        Commands::Add { url, title, tags } => {
            let raw = serde_json::json!({
                "url": url,
                "title": title,
                "tags": tags,
            });
            let Some(raw) = raw.as_object() else {
                bail!("entry is not an object");
            };
            let id = store.add_entry(raw)?;
            emit(format, &id, |id| println!("Added {}", id))?;
        }

        Commands::Remove { id } => {
            let id = EntryId::from(id);
            let removed = store.remove_entry(&id)?;
            emit(format, &removed, |removed| {
                if *removed {
                    println!("Removed {}", id);
                } else {
                    println!("No bookmark with id {}", id);
                }
            })?;
        }

        Commands::Get { ids } => {
            let ids: Vec<EntryId> = ids.into_iter().map(EntryId::from).collect();
            let entries = store.get_entries(&ids)?;
            emit(format, &entries, |entries| {
                for (id, entry) in ids.iter().zip(entries) {
                    match entry {
                        Some(entry) => print_entry_detail(entry),
                        None => println!("{}: not found", id),
                    }
                }
            })?;
        }

        Commands::List { start, end } => {
            let ids = store.get_all_entries(start, end)?;
            show_entries(store, format, &ids)?;
        }

        Commands::Page { index, size, all } => {
            if all {
                let mut ids = Vec::new();
                for page in store.get_paged_entries(index, size) {
                    ids.extend(page?);
                }
                show_entries(store, format, &ids)?;
            } else {
                let page = store.get_paged_entries(index, size).next().transpose()?;
                show_entries(store, format, &page.unwrap_or_default())?;
            }
        }

        Commands::Day { days_ago } => {
            let ids = store.get_page_by_day(days_ago)?;
            show_entries(store, format, &ids)?;
        }

        Commands::Tags => {
            let tags = store.get_all_tags()?;
            emit(format, &tags, |tags| print_names(tags, "No tags yet."))?;
        }

        Commands::Tag { name } => {
            let ids: Vec<EntryId> = store.get_entries_for_tag(&name)?.into_iter().collect();
            show_entries(store, format, &ids)?;
        }

        Commands::Domains => {
            let domains = store.get_all_domains()?;
            emit(format, &domains, |domains| print_names(domains, "No domains yet."))?;
        }

        Commands::Domain { name } => {
            let ids: Vec<EntryId> = store.get_entries_for_domain(&name)?.into_iter().collect();
            show_entries(store, format, &ids)?;
        }

        Commands::Group { days_ago } => {
            let ids = store.get_page_by_day(days_ago)?;
            let groups = store.group_by_domain(&ids)?;
            emit(format, &groups, |groups| {
                if groups.is_empty() {
                    println!("No bookmarks for that day");
                }
                for group in groups {
                    let domain = if group.domain.is_empty() { "-" } else { &group.domain };
                    println!("{} ({})", domain, group.entries.len());
                    for entry in &group.entries {
                        println!("  {}  {}", entry.id, entry.title);
                    }
                }
            })?;
        }

        Commands::Stats => {
            let stats = store.stats()?;
            let violations = store.validate()?;

            #[derive(Serialize)]
            struct Report {
                entries: usize,
                tags: usize,
                domains: usize,
                violations: Vec<String>,
            }

            let report = Report {
                entries: stats.entries,
                tags: stats.tags,
                domains: stats.domains,
                violations: violations.iter().map(|v| v.to_string()).collect(),
            };

            emit(format, &report, |report| {
                println!("Bookmarks v{}", env!("CARGO_PKG_VERSION"));
                if let Some(path) = store.backend().path() {
                    println!("Database: {:?}", path);
                }
                println!();
                println!("  Entries: {}", report.entries);
                println!("  Tags:    {}", report.tags);
                println!("  Domains: {}", report.domains);

                if report.violations.is_empty() {
                    println!();
                    println!("Indexes are consistent");
                } else {
                    println!();
                    println!("Index problems ({}):", report.violations.len());
                    for violation in &report.violations {
                        println!("  {}", violation);
                    }
                }
            })?;
        }

        Commands::Config { output } => write_default_config(output.as_deref())?,
    }

    Ok(())
}

fn write_default_config(output: Option<&std::path::Path>) -> anyhow::Result<()> {
    let config = bookmarks::config::generate_default_config();

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &config)?;
            println!("Config written to {:?}", path);
        }
        None => {
            print!("{}", config);
        }
    }

    Ok(())
}

/// Print `value` as JSON, or hand it to `table` for the human format
fn emit<T: Serialize>(format: Format, value: &T, table: impl FnOnce(&T)) -> anyhow::Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(value)?),
        Format::Table => table(value),
    }
    Ok(())
}

fn show_entries(
    store: &BookmarkStore<SqliteBackend>,
    format: Format,
    ids: &[EntryId],
) -> anyhow::Result<()> {
    let entries: Vec<Entry> = store.get_entries(ids)?.into_iter().flatten().collect();
    emit(format, &entries, |entries| print_table(entries))
}

fn print_table(entries: &[Entry]) {
    if entries.is_empty() {
        println!("No bookmarks");
        return;
    }

    println!("{:<20} {:<40} {:<24} {}", "Created", "Id", "Domain", "Title");
    println!("{}", "-".repeat(100));

    for entry in entries {
        println!(
            "{:<20} {:<40} {:<24} {}",
            entry.created_at.format("%Y-%m-%d %H:%M:%S"),
            entry.id,
            truncate(&entry.domain, 24),
            entry.title
        );
    }
}

fn print_entry_detail(entry: &Entry) {
    println!("{}", entry.id);
    println!("  Title:   {}", entry.title);
    println!("  URL:     {}", entry.url);
    println!("  Domain:  {}", entry.domain);
    println!("  Created: {}", entry.created_at.to_rfc3339());
    if !entry.tags.is_empty() {
        let tags: Vec<&str> = entry.tags.iter().map(String::as_str).collect();
        println!("  Tags:    {}", tags.join(", "));
    }
}

fn print_names(names: &std::collections::BTreeSet<String>, empty: &str) {
    if names.is_empty() {
        println!("{}", empty);
    }
    for name in names {
        println!("{}", name);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}
