use clap::{Parser, Subcommand, ValueEnum};
use tassel_core::models::ItemKind;

/// Student planner with recurring tasks, deadlines and exams
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Add an item, one-off or recurring
    Add(AddCommand),
    /// List upcoming or completed items
    List(ListCommand),
    /// Mark an item as done
    Done(DoneCommand),
    /// Edit a single item
    Edit(EditCommand),
    /// Delete a single item
    Delete(DeleteCommand),
    /// Manage recurring rules
    Rule(RuleCommand),
    /// Refill generation windows for all active rules
    Sweep,
}

/// CLI-side mirror of the core item kinds.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindArg {
    Task,
    Deadline,
    Exam,
}

impl From<KindArg> for ItemKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Task => ItemKind::Task,
            KindArg::Deadline => ItemKind::Deadline,
            KindArg::Exam => ItemKind::Exam,
        }
    }
}

#[derive(Parser, Debug, Clone)]
pub struct AddCommand {
    /// What kind of item to add
    #[clap(value_enum)]
    pub kind: KindArg,
    /// The title of the item
    pub title: String,
    /// Free-form notes
    #[clap(short, long)]
    pub notes: Option<String>,
    /// Course the item belongs to
    #[clap(short, long)]
    pub course: Option<String>,
    /// Tags to add to the item
    #[clap(short, long, num_args = 1..)]
    pub tag: Vec<String>,
    /// Related links
    #[clap(long, num_args = 1..)]
    pub link: Vec<String>,
    /// Due date for a one-off item (YYYY-MM-DD)
    #[clap(long, conflicts_with_all = ["daily", "weekly", "monthly", "every_days"])]
    pub due: Option<String>,
    /// Time of day (HH:MM)
    #[clap(long)]
    pub at: Option<String>,

    /// Repeat every day
    #[clap(long, conflicts_with_all = ["weekly", "monthly", "every_days"])]
    pub daily: bool,
    /// Repeat weekly on the given days (e.g. mon,wed,fri)
    #[clap(long, conflicts_with_all = ["monthly", "every_days"])]
    pub weekly: Option<String>,
    /// Repeat monthly on the given days (e.g. 1,15)
    #[clap(long, conflicts_with = "every_days")]
    pub monthly: Option<String>,
    /// Repeat every N days
    #[clap(long)]
    pub every_days: Option<u32>,
    /// First occurrence date (defaults to today)
    #[clap(long)]
    pub start: Option<String>,
    /// Last occurrence date
    #[clap(long, conflicts_with = "count")]
    pub until: Option<String>,
    /// Maximum number of occurrences
    #[clap(long)]
    pub count: Option<u32>,
}

#[derive(Parser, Debug, Clone)]
pub struct ListCommand {
    /// Which kind of items to list
    #[clap(value_enum)]
    pub kind: KindArg,
    /// Show completion history instead of upcoming work
    #[clap(long)]
    pub done: bool,
    /// Show every open instance instead of one per rule
    #[clap(long, conflicts_with = "done")]
    pub all: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct DoneCommand {
    /// Which kind of item to complete
    #[clap(value_enum)]
    pub kind: KindArg,
    /// The ID of the item to mark as done
    pub id: String,
}

#[derive(Parser, Debug, Clone)]
pub struct EditCommand {
    /// Which kind of item to edit
    #[clap(value_enum)]
    pub kind: KindArg,
    /// The ID of the item to edit
    pub id: String,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub notes: Option<String>,
    #[arg(long, conflicts_with = "notes")]
    pub notes_clear: bool,

    #[arg(long)]
    pub course: Option<String>,
    #[arg(long, conflicts_with = "course")]
    pub course_clear: bool,

    /// Replace the tag set
    #[arg(long, num_args = 1..)]
    pub tag: Vec<String>,

    /// New due date (YYYY-MM-DD)
    #[arg(long)]
    pub due: Option<String>,
    #[arg(long, conflicts_with = "due")]
    pub due_clear: bool,
    /// Time of day for the due date (HH:MM)
    #[arg(long, requires = "due")]
    pub at: Option<String>,

    /// Reopen a completed item
    #[arg(long)]
    pub reopen: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct DeleteCommand {
    /// Which kind of item to delete
    #[clap(value_enum)]
    pub kind: KindArg,
    /// The ID of the item to delete
    pub id: String,
    /// Force deletion without confirmation
    #[clap(short, long)]
    pub force: bool,
}

/// Recurring rule management commands
#[derive(Parser, Debug, Clone)]
pub struct RuleCommand {
    #[command(subcommand)]
    pub command: RuleSubcommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum RuleSubcommand {
    /// List all rules
    List,
    /// Show a rule and its instances
    Show(RuleShowCommand),
    /// Edit a rule's template and/or recurrence shape
    Edit(RuleEditCommand),
    /// Pause a rule (stop generating new instances)
    Pause(RulePauseCommand),
    /// Resume a paused rule
    Resume(RulePauseCommand),
    /// Delete a rule and its open future instances
    Delete(RuleDeleteCommand),
}

#[derive(Parser, Debug, Clone)]
pub struct RuleShowCommand {
    /// Rule ID
    pub id: String,
}

#[derive(Parser, Debug, Clone)]
pub struct RulePauseCommand {
    /// Rule ID
    pub id: String,
}

#[derive(Parser, Debug, Clone)]
pub struct RuleDeleteCommand {
    /// Rule ID
    pub id: String,
    /// Force deletion without confirmation
    #[clap(short, long)]
    pub force: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct RuleEditCommand {
    /// Rule ID
    pub id: String,

    // Template fields: applied softly to open future instances.
    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub notes: Option<String>,
    #[arg(long, conflicts_with = "notes")]
    pub notes_clear: bool,

    #[arg(long)]
    pub course: Option<String>,
    #[arg(long, conflicts_with = "course")]
    pub course_clear: bool,

    /// Replace the template tag set
    #[arg(long, num_args = 1..)]
    pub tag: Vec<String>,

    /// New time of day (HH:MM)
    #[arg(long)]
    pub at: Option<String>,
    #[arg(long, conflicts_with = "at")]
    pub at_clear: bool,

    // Recurrence shape: open future instances are discarded and
    // regenerated when any of these change.
    #[arg(long, conflicts_with_all = ["weekly", "monthly", "every_days"])]
    pub daily: bool,
    /// Repeat weekly on the given days (e.g. mon,wed,fri)
    #[arg(long, conflicts_with_all = ["monthly", "every_days"])]
    pub weekly: Option<String>,
    /// Repeat monthly on the given days (e.g. 1,15)
    #[arg(long, conflicts_with = "every_days")]
    pub monthly: Option<String>,
    /// Repeat every N days
    #[arg(long)]
    pub every_days: Option<u32>,
    /// Move the first occurrence date
    #[arg(long)]
    pub start: Option<String>,
    /// Stop on a date
    #[arg(long, conflicts_with_all = ["count", "never"])]
    pub until: Option<String>,
    /// Stop after N occurrences
    #[arg(long, conflicts_with = "never")]
    pub count: Option<u32>,
    /// Remove the end condition
    #[arg(long)]
    pub never: bool,
}
