//! LifeDex command-line driver.
//!
//! # Responsibility
//! - Open a SQLite-backed session, run one command, flush pending writes.
//! - Keep output plain and line-oriented for scripting.
//!
//! # Invariants
//! - Every mutation goes through `ProgressSession`; the CLI never edits the
//!   stored document directly.
//! - Undo history lives for one process; commands do not undo across runs.

use clap::{Parser, Subcommand, ValueEnum};
use lifedex_core::{
    core_version, default_log_level, init_logging, AddXpRequest, Category, PersistenceConfig,
    ProgressSession, SqliteKvStore, State, TrackerId, WriteOutcome,
};
use log::info;
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    name = "lifedex",
    version,
    about = "LifeDex: track XP across skills, careers, traits and hobbies"
)]
struct Cli {
    /// SQLite database holding the saved document.
    #[arg(long, default_value = "lifedex.sqlite3")]
    db: PathBuf,

    /// Absolute directory for rolling log files. Logging is off when unset.
    #[arg(long)]
    log_dir: Option<String>,

    /// Log level (trace|debug|info|warn|error).
    #[arg(long)]
    log_level: Option<String>,

    /// Log swallowed persistence failures at warn level.
    #[arg(long)]
    diagnostics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List trackers and recent timeline entries.
    Status {
        /// Number of timeline entries to show.
        #[arg(long, default_value_t = 5)]
        recent: usize,
    },
    /// Create a tracker.
    Create {
        name: String,
        #[arg(long, value_enum, default_value_t = CategoryArg::Skill)]
        category: CategoryArg,
    },
    /// Award (or remove) XP, optionally journaling text.
    AddXp {
        /// Tracker id or name.
        tracker: String,
        #[arg(allow_hyphen_values = true)]
        amount: i64,
        #[arg(long, default_value = "")]
        text: String,
        #[arg(long, default_value = "note")]
        kind: String,
    },
    /// Zero a tracker's XP and clear its log.
    Reset { tracker: String },
    /// Delete a tracker. Its timeline entries are kept.
    Delete { tracker: String },
    /// Attach (or replace) a tracker's career tree from a JSON file.
    SetCareerTree { tracker: String, path: PathBuf },
    /// Complete a milestone of a tree attached with `set-career-tree`.
    CompleteNode { tracker: String, node: String },
    /// Write the validated document to a file.
    Export { path: PathBuf },
    /// Replace the saved document with one read from a file.
    Import { path: PathBuf },
    /// Discard everything and start from the default trackers.
    ResetAll,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CategoryArg {
    Skill,
    Career,
    Trait,
    Hobby,
}

impl From<CategoryArg> for Category {
    fn from(value: CategoryArg) -> Self {
        match value {
            CategoryArg::Skill => Category::Skill,
            CategoryArg::Career => Category::Career,
            CategoryArg::Trait => Category::Trait,
            CategoryArg::Hobby => Category::Hobby,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, log_dir)?;
    }
    info!(
        "event=cli_start module=cli status=ok version={}",
        core_version()
    );

    let store = SqliteKvStore::open(&cli.db)?;
    let config = PersistenceConfig::default().with_diagnostics(cli.diagnostics);
    let mut session = ProgressSession::open(store, config);

    match cli.command {
        Commands::Status { recent } => print_status(session.state(), recent),
        Commands::Create { name, category } => {
            let id = session.create_tracker(&name, category.into())?;
            println!("created {id}");
        }
        Commands::AddXp {
            tracker,
            amount,
            text,
            kind,
        } => {
            let id = resolve_tracker(session.state(), &tracker)?;
            let request = AddXpRequest::new(amount).with_text(text).with_kind(kind);
            let delta = session.add_xp(&id, request)?;
            println!("xp {delta:+}");
        }
        Commands::Reset { tracker } => {
            let id = resolve_tracker(session.state(), &tracker)?;
            report_write("reset", session.reset_tracker(&id)?);
        }
        Commands::Delete { tracker } => {
            let id = resolve_tracker(session.state(), &tracker)?;
            report_write("deleted", session.delete_tracker(&id)?);
        }
        Commands::SetCareerTree { tracker, path } => {
            let id = resolve_tracker(session.state(), &tracker)?;
            let text = fs::read_to_string(&path)?;
            session.set_career_tree_from_json(&id, &text)?;
            println!("career tree attached to {id}");
        }
        Commands::CompleteNode { tracker, node } => {
            let id = resolve_tracker(session.state(), &tracker)?;
            let reward = session.complete_career_node(&id, &node)?;
            println!("milestone +{reward}");
        }
        Commands::Export { path } => {
            let document = session.export_document()?;
            fs::write(&path, document)?;
            println!("exported {}", path.display());
        }
        Commands::Import { path } => {
            let text = fs::read_to_string(&path)?;
            report_write("imported", session.import_document(&text)?);
        }
        Commands::ResetAll => {
            session.reset_all();
            println!("reset all");
        }
    }

    if let Some(outcome) = session.flush() {
        if !outcome.is_written() {
            eprintln!("warning: changes were not saved ({outcome:?})");
        }
    }
    Ok(())
}

fn resolve_tracker(state: &State, query: &str) -> Result<TrackerId, Box<dyn Error>> {
    let query = query.trim();
    state
        .trackers
        .iter()
        .find(|tracker| tracker.id.as_str() == query)
        .or_else(|| {
            state
                .trackers
                .iter()
                .find(|tracker| tracker.name.eq_ignore_ascii_case(query))
        })
        .map(|tracker| tracker.id.clone())
        .ok_or_else(|| format!("no tracker matches `{query}`").into())
}

fn report_write(action: &str, outcome: WriteOutcome) {
    match outcome {
        WriteOutcome::Written { .. } => println!("{action}"),
        WriteOutcome::WrittenStripped { .. } => {
            println!("{action} (attachment payloads dropped to fit storage)")
        }
        WriteOutcome::Skipped | WriteOutcome::Failed => {
            println!("{action} (not saved)")
        }
    }
}

fn print_status(state: &State, recent: usize) {
    println!("total xp {}", state.total_xp());
    for tracker in &state.trackers {
        let career = tracker
            .career_tree
            .as_ref()
            .map(|tree| {
                let (done, total) = tree.progress();
                format!(" career {done}/{total}")
            })
            .unwrap_or_default();
        println!(
            "{}  {:<8} {:>6} xp  {}{}",
            tracker.id,
            tracker.category.as_str(),
            tracker.xp,
            tracker.name,
            career
        );
    }
    for item in state.timeline.iter().take(recent) {
        let name = item
            .tracker(state)
            .map(|tracker| tracker.name.as_str())
            .unwrap_or(item.tracker_name.as_str());
        println!(
            "{:>+5}  [{}] {}: {}",
            item.entry.xp, item.entry.entry_kind, name, item.entry.text
        );
    }
}
