use std::path::PathBuf;

use chrono::{NaiveDate, NaiveTime};
use clap::{Args, Parser, Subcommand, ValueEnum};
use taskdeck_core::{ConflictChoice, TaskStatus};

#[derive(Parser)]
#[command(name = "taskdeck")]
#[command(about = "Tasks, projects and tags synced across your devices")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Remote API base URL (overrides config and TASKDECK_API_URL)
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Signed-in user id (overrides config and TASKDECK_USER)
    #[arg(long, global = true, value_name = "ID")]
    pub user: Option<String>,

    /// Bearer token for the remote API (overrides config and TASKDECK_TOKEN)
    #[arg(long, global = true, value_name = "TOKEN")]
    pub token: Option<String>,

    /// Configuration profile to use (defaults to the active one)
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,

    /// Path to the local session snapshot
    #[arg(long, global = true, value_name = "PATH")]
    pub state: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List tasks
    #[command(alias = "ls")]
    List(ListArgs),
    /// Create a new task
    #[command(alias = "new")]
    Add(AddArgs),
    /// Edit an existing task
    Edit(EditArgs),
    /// Toggle completion of a task
    Done {
        /// Task ID or unique ID prefix
        id: String,
    },
    /// Toggle the important flag of a task
    Star {
        /// Task ID or unique ID prefix
        id: String,
    },
    /// Move a task to another kanban column
    Move {
        /// Task ID or unique ID prefix
        id: String,
        /// Target column (backlog, todo, in-progress, done)
        status: TaskStatus,
    },
    /// Delete a task
    Delete {
        /// Task ID or unique ID prefix
        id: String,
    },
    /// Manage the checklist of a task
    Subtask {
        #[command(subcommand)]
        command: SubtaskCommands,
    },
    /// Manage projects
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },
    /// Manage tags
    Tag {
        #[command(subcommand)]
        command: TagCommands,
    },
    /// Pull remote changes and push queued local changes
    Sync {
        /// Output the sync report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Keep syncing in the foreground until interrupted
    Watch,
    /// List open sync conflicts
    Conflicts {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Settle an open sync conflict
    Resolve {
        /// Conflicting entity id
        id: String,
        /// Which copy to keep
        #[arg(long, value_name = "SIDE")]
        keep: ConflictChoice,
    },
    /// Show queue and sync state without contacting the remote
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or change the stored configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// Only tasks of this project (name or id)
    #[arg(long)]
    pub project: Option<String>,
    /// Only tasks carrying any of these tags (name or id)
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,
    /// Only tasks in this column
    #[arg(long)]
    pub status: Option<TaskStatus>,
    /// Include completed tasks
    #[arg(short, long)]
    pub all: bool,
    /// Only important tasks
    #[arg(long)]
    pub important: bool,
    /// Only overdue tasks
    #[arg(long)]
    pub overdue: bool,
    /// Case-insensitive search over title and description
    #[arg(short, long)]
    pub search: Option<String>,
    /// Group by kanban column
    #[arg(long, conflicts_with = "json")]
    pub board: bool,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Default)]
pub struct AddArgs {
    /// Task title
    pub title: Vec<String>,
    #[arg(short, long)]
    pub description: Option<String>,
    /// Project name or id
    #[arg(short, long)]
    pub project: Option<String>,
    /// Tag name or id (repeatable)
    #[arg(short, long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,
    /// Due date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub due: Option<NaiveDate>,
    /// Due time (HH:MM)
    #[arg(long, value_name = "TIME", requires = "due")]
    pub at: Option<NaiveTime>,
    /// Mark as important
    #[arg(short, long)]
    pub important: bool,
    /// Initial column
    #[arg(long)]
    pub status: Option<TaskStatus>,
}

#[derive(Args, Debug, Default)]
pub struct EditArgs {
    /// Task ID or unique ID prefix
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    /// New description (empty string clears it)
    #[arg(short, long)]
    pub description: Option<String>,
    /// Project name or id (empty string clears it)
    #[arg(short, long)]
    pub project: Option<String>,
    /// Replace the tag set (repeatable)
    #[arg(short, long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,
    /// Remove all tags
    #[arg(long, conflicts_with = "tags")]
    pub clear_tags: bool,
    /// Due date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub due: Option<NaiveDate>,
    /// Due time (HH:MM)
    #[arg(long, value_name = "TIME")]
    pub at: Option<NaiveTime>,
    /// Remove due date and time
    #[arg(long, conflicts_with_all = ["due", "at"])]
    pub no_due: bool,
}

#[derive(Subcommand)]
pub enum SubtaskCommands {
    /// Append a checklist item
    Add {
        /// Task ID or unique ID prefix
        task: String,
        /// Item title
        title: Vec<String>,
    },
    /// Toggle a checklist item
    Done {
        /// Task ID or unique ID prefix
        task: String,
        /// Item position (1-based) or id
        item: String,
    },
    /// Remove a checklist item
    Delete {
        /// Task ID or unique ID prefix
        task: String,
        /// Item position (1-based) or id
        item: String,
    },
}

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// List projects
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a project
    Add {
        name: String,
        /// Hex color (#rrggbb); picked from the palette when omitted
        #[arg(long)]
        color: Option<String>,
    },
    /// Rename or recolor a project
    Edit {
        /// Project name or id
        project: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        color: Option<String>,
    },
    /// Delete a project, detaching its tasks
    Delete {
        /// Project name or id
        project: String,
    },
}

#[derive(Subcommand)]
pub enum TagCommands {
    /// List tags
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a tag
    Add {
        name: String,
        /// Hex color (#rrggbb); picked from the palette when omitted
        #[arg(long)]
        color: Option<String>,
    },
    /// Delete a tag, removing it from every task
    Delete {
        /// Tag name or id
        tag: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the stored configuration
    Show,
    /// Store a connection setting; omit the value to unset it
    Set {
        /// Make the profile the active one
        #[arg(long)]
        activate: bool,
        key: ConfigKey,
        value: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ConfigKey {
    ApiUrl,
    User,
    Token,
}
