use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mvm", about = concat!("marvin-mirror v", env!("CARGO_PKG_VERSION"), " - your Marvin tasks as markdown"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Use a different settings file
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rebuild the mirrored categories, projects and inbox
    Sync,
    /// Print the tasks due or scheduled today, or insert them into a file
    Today(TodayArgs),
    /// Create a task and print (or insert) its markdown line
    Add(AddArgs),
    /// Mark a task done
    Done(DoneArgs),
    /// List categories as shown in the add-task picker
    Categories,
    /// Watch a markdown file and report tasks checked off in it
    Watch(WatchArgs),
    /// Show or change settings
    Config(ConfigCmd),
}

// ---------------------------------------------------------------------------
// Read command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct TodayArgs {
    /// Date to import (YYYY-MM-DD, default: today)
    #[arg(long)]
    pub date: Option<String>,
    /// Which items to include: due, scheduled, or both (default: from settings)
    #[arg(long)]
    pub show: Option<String>,
    #[command(flatten)]
    pub insert: InsertArgs,
}

/// Where to put generated markdown instead of stdout
#[derive(Args)]
pub struct InsertArgs {
    /// Insert into this file
    #[arg(long, value_name = "FILE")]
    pub into: Option<String>,
    /// 1-based line to insert before (default: end of file)
    #[arg(long, requires = "into")]
    pub line: Option<usize>,
}

// ---------------------------------------------------------------------------
// Write command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct AddArgs {
    /// Category id or title, or "inbox"
    #[arg(long, short = 'c')]
    pub category: Option<String>,
    /// Task text. The first line is the title, the rest the note
    #[arg(required = true, num_args = 1..)]
    pub text: Vec<String>,
    #[command(flatten)]
    pub insert: InsertArgs,
}

#[derive(Args)]
pub struct DoneArgs {
    /// Remote task id
    pub id: String,
}

#[derive(Args)]
pub struct WatchArgs {
    /// Markdown file to watch
    pub file: String,
    /// Send mark-done requests for checked tasks (default: from settings)
    #[arg(long)]
    pub mark_done: bool,
}

// ---------------------------------------------------------------------------
// Config subcommands
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ConfigCmd {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective settings
    Show,
    /// Set section.key to a value
    Set {
        /// Setting name, e.g. format.show_due_date
        key: String,
        value: String,
    },
    /// Print the settings file location
    Path,
}
