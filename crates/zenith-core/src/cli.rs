use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "zenith",
    version,
    about = "Zenith: kanban, list and calendar task planner with AI subtask suggestions",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create a task.
    Add(AddArgs),
    /// Change fields of an existing task.
    Edit(EditArgs),
    /// Show tasks as a table.
    List(ListArgs),
    /// Case-insensitive search over titles and descriptions.
    Search {
        #[arg(trailing_var_arg = true)]
        query: Vec<String>,
    },
    /// Show tasks grouped into status columns.
    Board {
        #[arg(trailing_var_arg = true)]
        query: Vec<String>,
    },
    /// Show a month of tasks by due date.
    Calendar {
        /// Month as YYYY-MM; defaults to the current month.
        #[arg(long)]
        month: Option<String>,
    },
    /// Show every field of one task, with its checklist.
    Show { id: String },
    /// Toggle a checklist item by its zero-based index.
    Check { id: String, index: usize },
    /// Ask the AI advisor for subtasks.
    Suggest {
        id: String,
        /// Append the suggestions to the description as checklist items.
        #[arg(long)]
        apply: bool,
    },
    /// Print the stored collection as JSON.
    Export,
    /// Render a named view (board, list or calendar).
    View { name: Option<String> },
}

#[derive(Args, Debug, Clone, Default)]
pub struct AddArgs {
    #[arg(required = true, trailing_var_arg = true)]
    pub title: Vec<String>,

    #[arg(short = 'd', long = "desc")]
    pub description: Option<String>,

    #[arg(short = 's', long)]
    pub status: Option<String>,

    #[arg(short = 'p', long)]
    pub priority: Option<String>,

    #[arg(long)]
    pub due: Option<String>,

    /// Ask the AI advisor for a checklist before saving.
    #[arg(long)]
    pub plan: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct EditArgs {
    pub id: String,

    #[arg(short = 't', long)]
    pub title: Option<String>,

    #[arg(short = 'd', long = "desc")]
    pub description: Option<String>,

    #[arg(short = 's', long)]
    pub status: Option<String>,

    #[arg(short = 'p', long)]
    pub priority: Option<String>,

    #[arg(long)]
    pub due: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    #[arg(short = 's', long)]
    pub status: Option<String>,

    /// Only tasks due on this date.
    #[arg(long)]
    pub due: Option<String>,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.key=value` (or `rc.key:value`) overrides out of
/// the argument list before clap sees it.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = rest.split_once('=').or_else(|| rest.split_once(':'));
            if let Some((k, v)) = parsed {
                let (k, v) = (format!("rc.{k}"), v.to_string());
                if k.contains("api_key") {
                    debug!(key = %k, "captured positional rc override");
                } else {
                    debug!(key = %k, value = %v, "captured positional rc override");
                }
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}
