//! # Campus Connect CLI (`campus`)
//!
//! ## Usage
//!
//! ```bash
//! campus --config ./config/campus.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `campus init` | Create the SQLite database and run schema migrations |
//! | `campus add-note` | Create a knowledge entry |
//! | `campus list-notes` | List the most recent knowledge entries |
//! | `campus search-notes` | Search knowledge entries |
//! | `campus add-task` | Create a task |
//! | `campus list-tasks` | List the most recent tasks |
//! | `campus update-task <id>` | Change a task's fields |
//! | `campus chat` | Start the interactive assistant |
//! | `campus history <session>` | Print a logged chat transcript |
//! | `campus seed` | Import a Campus Connect snapshot |
//! | `campus completions <shell>` | Print a shell completion script |

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use campus_connect::agent::CampusAgent;
use campus_connect::chat::{run_chat, run_history};
use campus_connect::config::{self, Config};
use campus_connect::import::{run_seed, SnapshotSource};
use campus_connect::knowledge::{run_add_note, run_list_notes, NewEntry};
use campus_connect::llm::Responder;
use campus_connect::models::split_tags;
use campus_connect::search::run_search_notes;
use campus_connect::store::{SqliteStore, Store};
use campus_connect::tasks::{run_add_task, run_list_tasks, run_update_task, NewTask, TaskUpdate};

/// Campus Connect: notes, tasks and a study assistant for your portal data.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/campus.example.toml` for a full example.
#[derive(Parser)]
#[command(name = "campus", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// When the file does not exist, built-in defaults are used and the
    /// database lives under `$CAMPUS_CONNECT_STATE_DIR` or
    /// `~/.campus_connect_portal`.
    #[arg(long, global = true, default_value = "./config/campus.toml")]
    config: PathBuf,

    /// Enable debug logging on stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Create a knowledge entry.
    AddNote {
        #[arg(long)]
        title: String,
        /// Note text.
        #[arg(long, conflicts_with = "from_file")]
        content: Option<String>,
        /// Read the note text from a file.
        #[arg(long)]
        from_file: Option<PathBuf>,
        /// Comma-separated tags.
        #[arg(long, default_value = "")]
        tags: String,
        #[arg(long, default_value = "Other")]
        campus_area: String,
        /// Where the note came from, e.g. "Campus Connect > Grades > Fall 2025".
        #[arg(long)]
        source: Option<String>,
    },

    /// List stored knowledge entries, most recent first.
    ListNotes {
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Search knowledge entries.
    SearchNotes {
        #[arg(long)]
        query: String,
        #[arg(long, default_value = "3")]
        limit: usize,
    },

    /// Create a task.
    AddTask {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        /// todo, in_progress, blocked or done.
        #[arg(long, default_value = "todo")]
        status: String,
        /// low, medium, high or critical.
        #[arg(long, default_value = "medium")]
        priority: String,
        /// YYYY-MM-DD.
        #[arg(long)]
        due_date: Option<String>,
        #[arg(long)]
        related_entry_id: Option<String>,
    },

    /// List tasks, most recent first.
    ListTasks {
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Update a task.
    UpdateTask {
        task_id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        priority: Option<String>,
        #[arg(long)]
        due_date: Option<String>,
    },

    /// Start the terminal chat assistant.
    Chat,

    /// Print the transcript of a chat session.
    History {
        session_id: String,
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Import a Campus Connect snapshot.
    Seed {
        /// JSON file exported from Campus Connect.
        #[arg(long, conflicts_with = "sample", required_unless_present = "sample")]
        file: Option<PathBuf>,
        /// Load the built-in sample snapshot.
        #[arg(long)]
        sample: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn load_or_default(path: &std::path::Path) -> anyhow::Result<Config> {
    let mut cfg = if path.exists() {
        config::load_config(path)?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Config::minimal()
    };
    cfg.resolve_credentials();
    Ok(cfg)
}

fn read_note_content(content: Option<String>, from_file: Option<PathBuf>) -> anyhow::Result<String> {
    match (content, from_file) {
        (Some(content), _) => Ok(content),
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read note file: {}", path.display())),
        (None, None) => anyhow::bail!("Either --content or --from-file must be provided."),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "campus", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = load_or_default(&cli.config)?;
    let sqlite = SqliteStore::open(&cfg).await?;
    let store: Arc<dyn Store> = Arc::new(sqlite.clone());

    let outcome = dispatch(cli.command, &cfg, store).await;
    sqlite.close().await;
    outcome
}

async fn dispatch(command: Commands, cfg: &Config, store: Arc<dyn Store>) -> anyhow::Result<()> {
    match command {
        Commands::Init => {
            println!("Database ready at {}", cfg.db.path.display());
        }
        Commands::AddNote {
            title,
            content,
            from_file,
            tags,
            campus_area,
            source,
        } => {
            let content = read_note_content(content, from_file)?;
            let entry = NewEntry {
                title,
                content,
                tags: split_tags(&tags),
                campus_area: Some(campus_area),
                source,
            };
            run_add_note(store.as_ref(), entry).await?;
        }
        Commands::ListNotes { limit } => {
            run_list_notes(store.as_ref(), limit).await?;
        }
        Commands::SearchNotes { query, limit } => {
            run_search_notes(
                store.as_ref(),
                &query,
                limit,
                cfg.retrieval.knowledge_scan_limit,
            )
            .await?;
        }
        Commands::AddTask {
            title,
            description,
            status,
            priority,
            due_date,
            related_entry_id,
        } => {
            let new = NewTask {
                title,
                description,
                status,
                priority,
                due_date,
                related_entry_id,
            };
            run_add_task(store.as_ref(), new).await?;
        }
        Commands::ListTasks { status, limit } => {
            run_list_tasks(store.as_ref(), status, limit).await?;
        }
        Commands::UpdateTask {
            task_id,
            title,
            description,
            status,
            priority,
            due_date,
        } => {
            let update = TaskUpdate {
                title,
                description,
                status,
                priority,
                due_date,
            };
            run_update_task(store.as_ref(), &task_id, update).await?;
        }
        Commands::Chat => {
            let agent = CampusAgent::new(
                store,
                Responder::from_config(&cfg.llm),
                cfg.retrieval.clone(),
            );
            run_chat(agent).await?;
        }
        Commands::History { session_id, limit } => {
            run_history(store, &session_id, limit).await?;
        }
        Commands::Seed { file, sample } => {
            let source = match file {
                Some(ref path) if !sample => SnapshotSource::File(path),
                _ => SnapshotSource::Sample,
            };
            run_seed(store.as_ref(), source).await?;
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}
