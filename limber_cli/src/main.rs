use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use clap::{Parser, Subcommand};
use limber_core::csv_export::{export_to_path, read_csv, write_csv};
use limber_core::history::entries_on;
use limber_core::session::{carry_over_default, ordinal_count, parse_timestamp};
use limber_core::*;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "limber")]
#[command(about = "Stretch and exercise session tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Override catalog file
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show today's session (default)
    Session {
        /// Show the session for another day (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Regimen to use: auto, short, full or all
        #[arg(long)]
        regimen: Option<String>,

        /// Print the session as JSON
        #[arg(long)]
        json: bool,
    },

    /// Log a completed hold or set
    Log {
        /// Item name as it appears in the catalog
        item: String,

        /// Hold or set number, starting at 1
        ordinal: u32,

        /// Hold duration in seconds
        #[arg(long, conflicts_with_all = ["weight", "reps"])]
        seconds: Option<u32>,

        /// Weight used for the set
        #[arg(long, requires = "reps")]
        weight: Option<f64>,

        /// Reps completed in the set
        #[arg(long, requires = "weight")]
        reps: Option<u32>,

        /// Completion time (RFC 3339); defaults to now
        #[arg(long)]
        at: Option<String>,
    },

    /// Delete a logged entry by its exact key
    Undo {
        item: String,
        ordinal: u32,
        timestamp: String,
    },

    /// Print the history log, newest first
    History {
        /// Print as CSV
        #[arg(long)]
        csv: bool,

        /// Write CSV to a file instead of stdout
        #[arg(long, requires = "csv")]
        output: Option<PathBuf>,
    },

    /// Replace the whole history from a JSON or CSV file
    Import { file: PathBuf },

    /// Print the catalog version token
    Version,

    /// Validate the catalog and summarize it
    Check,

    /// Write the starter catalog
    Init {
        /// Overwrite an existing catalog
        #[arg(long)]
        force: bool,
    },
}

struct Paths {
    catalog: PathBuf,
    history: PathBuf,
}

fn main() -> Result<()> {
    // Initialize logging
    limber_core::logging::init();

    let cli = Cli::parse();

    let config = Config::load()?;
    let data_dir = cli
        .data_dir
        .unwrap_or_else(|| config.data.data_dir.clone());
    let paths = Paths {
        catalog: cli
            .catalog
            .unwrap_or_else(|| config.catalog_path(&data_dir)),
        history: Config::history_path(&data_dir),
    };

    match cli.command {
        Some(Commands::Session {
            date,
            regimen,
            json,
        }) => cmd_session(&paths, &config, date, regimen, json),
        Some(Commands::Log {
            item,
            ordinal,
            seconds,
            weight,
            reps,
            at,
        }) => {
            let measurement = match (seconds, weight, reps) {
                (Some(s), _, _) => Some(Measurement::duration(s)),
                (None, Some(w), Some(r)) => Some(Measurement::load(w, r)),
                _ => None,
            };
            cmd_log(&paths, &item, ordinal, measurement, at)
        }
        Some(Commands::Undo {
            item,
            ordinal,
            timestamp,
        }) => cmd_undo(&paths, item, ordinal, timestamp),
        Some(Commands::History { csv, output }) => cmd_history(&paths, csv, output),
        Some(Commands::Import { file }) => cmd_import(&paths, &file),
        Some(Commands::Version) => cmd_version(&paths),
        Some(Commands::Check) => cmd_check(&paths),
        Some(Commands::Init { force }) => cmd_init(&paths, force),
        None => {
            // Default to "session" command
            cmd_session(&paths, &config, None, None, false)
        }
    }
}

fn cmd_session(
    paths: &Paths,
    config: &Config,
    date: Option<NaiveDate>,
    regimen: Option<String>,
    json: bool,
) -> Result<()> {
    let snapshot = CatalogLoader::from_path(&paths.catalog).load()?;
    let history = JsonlHistoryStore::new(&paths.history).read()?;

    let today = SessionDate::local_today();
    let day = date.map_or(today, |d| today.with_date(d));

    let selection = match regimen {
        Some(r) => r.parse()?,
        None => config.default_selection()?,
    };
    let selected = select_items(&snapshot.catalog, selection, day.weekday())?;
    let session = build_session(&selected.items, &history, &day);

    if json {
        let view = serde_json::json!({
            "date": day.date().to_string(),
            "weekday": day.weekday(),
            "regimen": selected.mode,
            "label": selected.label,
            "version": snapshot.version,
            "items": session,
        });
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    display_session(&day, &selected, &session);
    Ok(())
}

fn cmd_log(
    paths: &Paths,
    item: &str,
    ordinal: u32,
    measurement: Option<Measurement>,
    at: Option<String>,
) -> Result<()> {
    let snapshot = CatalogLoader::from_path(&paths.catalog).load()?;
    let template = snapshot
        .catalog
        .find_by_name(item)
        .ok_or_else(|| Error::Other(format!("Unknown item \"{}\"", item)))?;

    let count = ordinal_count(template);
    if ordinal == 0 || ordinal > count {
        return Err(Error::Other(format!(
            "\"{}\" has {} hold(s); ordinal must be between 1 and {}",
            template.name, count, count
        )));
    }

    let timestamp = match at {
        Some(at) => {
            DateTime::parse_from_rfc3339(&at)
                .map_err(|e| Error::Other(format!("Invalid --at timestamp \"{}\": {}", at, e)))?;
            at
        }
        None => Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    };

    let mut store = JsonlHistoryStore::new(&paths.history);
    let measurement = match measurement {
        Some(m) if m.kind() != template.default.kind() => {
            return Err(Error::InvalidEntry(format!(
                "\"{}\" is logged as {}, not {}",
                template.name,
                describe_kind(template.default.kind()),
                describe_kind(m.kind())
            )));
        }
        Some(m) => m,
        None => carry_over_default(template, &store.read()?),
    };

    let entry = HistoryEntry {
        item: template.name.clone(),
        ordinal,
        measurement,
        timestamp,
    };
    store.append(std::slice::from_ref(&entry))?;

    let label = snapshot
        .catalog
        .hold_label(&entry.item, entry.ordinal)
        .map(|l| format!(" ({})", l))
        .unwrap_or_default();
    println!(
        "✓ Logged {} #{}{}: {}",
        entry.item, entry.ordinal, label, entry.measurement
    );
    println!("  Timestamp: {}", entry.timestamp);
    Ok(())
}

fn cmd_undo(paths: &Paths, item: String, ordinal: u32, timestamp: String) -> Result<()> {
    let key = EntryKey {
        item,
        ordinal,
        timestamp,
    };
    let mut store = JsonlHistoryStore::new(&paths.history);
    let removed = store.delete_by_key(&key)?;

    if removed == 0 {
        println!("No history entry matches {}", key);
    } else {
        println!("✓ Deleted {} entry {}", removed, key);
    }
    Ok(())
}

fn cmd_history(paths: &Paths, csv: bool, output: Option<PathBuf>) -> Result<()> {
    let history = JsonlHistoryStore::new(&paths.history).read()?;

    if csv {
        match output {
            Some(path) => {
                let count = export_to_path(&history, &path)?;
                println!("✓ Exported {} entries to {}", count, path.display());
            }
            None => {
                write_csv(&history, std::io::stdout().lock())?;
            }
        }
        return Ok(());
    }

    if history.is_empty() {
        println!("No history yet.");
        return Ok(());
    }

    // Labels are cosmetic; a broken catalog should not hide the log
    let catalog = match CatalogLoader::from_path(&paths.catalog).load() {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            tracing::warn!("Catalog unavailable, showing history without labels: {}", e);
            None
        }
    };

    let today = SessionDate::local_today();
    let logged_today = entries_on(&history, &today).len();

    for entry in &history {
        let label = catalog
            .as_ref()
            .and_then(|s| s.catalog.hold_label(&entry.item, entry.ordinal))
            .map(|l| format!(" ({})", l))
            .unwrap_or_default();
        println!(
            "  {:<16} {} #{}{}  {}",
            format_timestamp(&entry.timestamp, &today),
            entry.item,
            entry.ordinal,
            label,
            entry.measurement
        );
    }
    println!();
    println!("{} entries, {} today", history.len(), logged_today);
    Ok(())
}

fn cmd_import(paths: &Paths, file: &Path) -> Result<()> {
    let is_csv = file
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"));

    let entries = if is_csv {
        read_csv(file)?
    } else {
        parse_import_json(&std::fs::read_to_string(file)?)?
    };

    let mut store = JsonlHistoryStore::new(&paths.history);
    store.replace_all(&entries)?;

    println!("✓ Imported {} entries (history replaced)", entries.len());
    Ok(())
}

/// Accepts `{"history": [...]}`, `{"entries": [...]}` or a bare array
fn parse_import_json(text: &str) -> Result<Vec<HistoryEntry>> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let list = match value {
        serde_json::Value::Array(_) => value,
        serde_json::Value::Object(mut map) => map
            .remove("history")
            .or_else(|| map.remove("entries"))
            .ok_or_else(|| {
                Error::Other("Import file needs a \"history\" or \"entries\" array".into())
            })?,
        _ => return Err(Error::Other("Invalid history payload".into())),
    };
    Ok(serde_json::from_value(list)?)
}

fn cmd_version(paths: &Paths) -> Result<()> {
    let version = CatalogLoader::from_path(&paths.catalog).version()?;
    println!("{}", version);
    Ok(())
}

fn cmd_check(paths: &Paths) -> Result<()> {
    let snapshot = CatalogLoader::from_path(&paths.catalog).load()?;
    let catalog = &snapshot.catalog;

    println!(
        "✓ Catalog OK: {} items (version {})",
        catalog.items.len(),
        snapshot.version
    );

    match &catalog.regimens {
        Some(regimens) => {
            for mode in RegimenMode::ALL {
                let def = regimens.get(mode);
                let days: Vec<String> = def.auto_week_days.iter().map(|d| d.to_string()).collect();
                println!(
                    "  {:<5} \"{}\": {} items, weekdays [{}]",
                    mode,
                    def.label,
                    def.order.len(),
                    days.join(", ")
                );
            }
        }
        None => println!("  No regimens defined; every item is shown each day"),
    }
    Ok(())
}

fn cmd_init(paths: &Paths, force: bool) -> Result<()> {
    if paths.catalog.exists() && !force {
        return Err(Error::Other(format!(
            "Catalog already exists at {}; pass --force to overwrite",
            paths.catalog.display()
        )));
    }
    if let Some(parent) = paths.catalog.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&paths.catalog, DEFAULT_CATALOG_YAML)?;
    println!("✓ Wrote starter catalog to {}", paths.catalog.display());
    Ok(())
}

fn display_session(day: &SessionDate, selected: &SelectedItems, session: &[SessionItem]) {
    let heading = match (&selected.label, selected.mode) {
        (Some(label), Some(mode)) => format!("{} ({} regimen)", label, mode),
        _ => "All items".to_string(),
    };

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  {}", heading);
    println!("│  {}", day.date().format("%A %Y-%m-%d"));
    println!("╰─────────────────────────────────────────╯");
    println!();

    for item in session {
        let mark = if item.is_complete() { "✓" } else { " " };
        println!(
            "[{}] {}  ({}/{})",
            mark,
            item.name,
            item.completed_count(),
            item.entries.len()
        );
        for entry in &item.entries {
            let label = entry
                .label
                .clone()
                .unwrap_or_else(|| format!("#{}", entry.ordinal));
            let done = entry
                .timestamp
                .as_deref()
                .map(|ts| format!("  done {}", format_timestamp(ts, day)))
                .unwrap_or_default();
            println!("      {:<8} {}{}", label, entry.measurement, done);
        }
    }

    let done: usize = session.iter().map(|i| i.completed_count()).sum();
    let total: usize = session.iter().map(|i| i.entries.len()).sum();
    println!();
    println!("{} of {} done", done, total);
}

fn describe_kind(kind: MeasurementKind) -> &'static str {
    match kind {
        MeasurementKind::Duration => "a timed hold (--seconds)",
        MeasurementKind::Load => "a weighted set (--weight/--reps)",
    }
}

/// "Today, HH:MM" for entries from the actual current day, "Mar 1, HH:MM"
/// otherwise
fn format_timestamp(timestamp: &str, day: &SessionDate) -> String {
    let offset = day.offset();
    match parse_timestamp(timestamp, offset) {
        Some(dt) => {
            let local = dt.with_timezone(&offset);
            if local.date_naive() == Utc::now().with_timezone(&offset).date_naive() {
                local.format("Today, %H:%M").to_string()
            } else {
                local.format("%b %-d, %H:%M").to_string()
            }
        }
        None => timestamp.to_string(),
    }
}
