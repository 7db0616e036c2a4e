use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Item families the scheduling engine generates into.
///
/// One engine serves all three; each kind owns its own table with an
/// identical column shape, so generation, propagation and selection are
/// written once and dispatched over this enum.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum ItemKind {
    Task,
    Deadline,
    Exam,
}

impl ItemKind {
    /// The SQLite table backing this kind.
    pub fn table(self) -> &'static str {
        match self {
            ItemKind::Task => "tasks",
            ItemKind::Deadline => "deadlines",
            ItemKind::Exam => "exams",
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemKind::Task => write!(f, "task"),
            ItemKind::Deadline => write!(f, "deadline"),
            ItemKind::Exam => write!(f, "exam"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid item kind: {0}")]
pub struct ParseItemKindError(String);

impl FromStr for ItemKind {
    type Err = ParseItemKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "task" => Ok(ItemKind::Task),
            "deadline" => Ok(ItemKind::Deadline),
            "exam" => Ok(ItemKind::Exam),
            _ => Err(ParseItemKindError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum ItemStatus {
    Open,
    Done,
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemStatus::Open => write!(f, "open"),
            ItemStatus::Done => write!(f, "done"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid item status: {0}")]
pub struct ParseItemStatusError(String);

impl FromStr for ItemStatus {
    type Err = ParseItemStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(ItemStatus::Open),
            "done" => Ok(ItemStatus::Done),
            _ => Err(ParseItemStatusError(s.to_string())),
        }
    }
}

/// Declarative recurrence shape.
///
/// Weekday indices are 0-6 counted from Monday; month days are 1-31.
/// `BTreeSet` keeps both day-sets ordered, which the evaluator relies on
/// to emit dates in ascending order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Recurrence {
    Daily,
    Weekly { days: BTreeSet<u8> },
    Monthly { days: BTreeSet<u8> },
    Interval { every_days: u32 },
}

impl std::fmt::Display for Recurrence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
        match self {
            Recurrence::Daily => write!(f, "daily"),
            Recurrence::Weekly { days } => {
                let names: Vec<&str> = days
                    .iter()
                    .filter_map(|&d| WEEKDAYS.get(d as usize).copied())
                    .collect();
                write!(f, "weekly on {}", names.join(", "))
            }
            Recurrence::Monthly { days } => {
                let names: Vec<String> = days.iter().map(|d| d.to_string()).collect();
                write!(f, "monthly on the {}", names.join(", "))
            }
            Recurrence::Interval { every_days } => {
                if *every_days == 1 {
                    write!(f, "every day")
                } else {
                    write!(f, "every {} days", every_days)
                }
            }
        }
    }
}

/// When a rule stops producing occurrences.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EndCondition {
    Never,
    OnDate(NaiveDate),
    AfterCount(u32),
}

impl std::fmt::Display for EndCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndCondition::Never => write!(f, "never ends"),
            EndCondition::OnDate(d) => write!(f, "until {}", d),
            EndCondition::AfterCount(n) => write!(f, "{} times", n),
        }
    }
}

/// Payload copied verbatim onto every instance a rule generates.
///
/// `due_time` combines with the occurrence date to form the instance's
/// due timestamp; with no time the instance is date-only.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemTemplate {
    pub title: String,
    pub notes: Option<String>,
    pub course: Option<String>,
    pub tags: Vec<String>,
    pub links: Vec<String>,
    pub due_time: Option<NaiveTime>,
}

/// A recurring pattern: the single persisted source of truth for how an
/// item repeats and what its instances look like.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub id: Uuid,
    pub kind: ItemKind,
    pub recurrence: Recurrence,
    pub start_date: NaiveDate,
    pub end: EndCondition,
    /// Date through which occurrences have been materialized.
    /// Never moves before `start_date`; only a recurrence-shape edit may
    /// move it backward, and then no earlier than the edit date.
    pub cursor: NaiveDate,
    /// Instances materialized so far; enforces `AfterCount`.
    pub occurrences_generated: u32,
    /// An inactive rule generates no further instances; existing ones stay.
    pub active: bool,
    pub template: ItemTemplate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecurrenceRule {
    /// Remaining generation budget under `AfterCount`, if bounded.
    pub fn remaining_budget(&self) -> Option<u32> {
        match self.end {
            EndCondition::AfterCount(n) => Some(n.saturating_sub(self.occurrences_generated)),
            _ => None,
        }
    }
}

/// One concrete dated item row (task, deadline or exam).
///
/// Generated instances carry `rule_id` + `instance_date` as a weak
/// back-reference; deleting the rule never cascade-deletes history.
/// Beyond those two fields an instance behaves exactly like any
/// hand-created item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub id: Uuid,
    pub kind: ItemKind,
    pub title: String,
    pub notes: Option<String>,
    pub course: Option<String>,
    pub tags: Vec<String>,
    pub links: Vec<String>,
    pub status: ItemStatus,
    pub due_at: Option<DateTime<Utc>>,
    /// Calendar date the evaluator assigned; None for one-off items.
    pub instance_date: Option<NaiveDate>,
    /// Weak reference to the generating rule; None for one-off items.
    pub rule_id: Option<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Data Transfer Objects
// ============================================================================

/// Data for creating a one-off (non-recurring) item.
#[derive(Debug, Clone)]
pub struct NewItemData {
    pub kind: ItemKind,
    pub title: String,
    pub notes: Option<String>,
    pub course: Option<String>,
    pub tags: Vec<String>,
    pub links: Vec<String>,
    pub due_date: Option<NaiveDate>,
    pub due_time: Option<NaiveTime>,
}

impl NewItemData {
    pub fn new(kind: ItemKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            notes: None,
            course: None,
            tags: Vec::new(),
            links: Vec::new(),
            due_date: None,
            due_time: None,
        }
    }
}

/// Field-wise update of a single item. The inner `Option` distinguishes
/// "set to value" from "clear".
#[derive(Debug, Clone, Default)]
pub struct UpdateItemData {
    pub title: Option<String>,
    pub notes: Option<Option<String>>,
    pub course: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub links: Option<Vec<String>>,
    pub due_at: Option<Option<DateTime<Utc>>>,
    pub status: Option<ItemStatus>,
}

/// Data for creating a new recurring rule together with its first batch
/// of instances.
#[derive(Debug, Clone)]
pub struct NewRuleData {
    pub kind: ItemKind,
    pub recurrence: Recurrence,
    pub start_date: NaiveDate,
    pub end: EndCondition,
    pub template: ItemTemplate,
}

/// Template-field edits: soft, applied forward-only to open instances.
#[derive(Debug, Clone, Default)]
pub struct TemplatePatch {
    pub title: Option<String>,
    pub notes: Option<Option<String>>,
    pub course: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub links: Option<Vec<String>>,
    pub due_time: Option<Option<NaiveTime>>,
}

impl TemplatePatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.notes.is_none()
            && self.course.is_none()
            && self.tags.is_none()
            && self.links.is_none()
            && self.due_time.is_none()
    }
}

/// Recurrence-shape edits: destructive, open future instances are
/// discarded and regenerated against the new shape.
#[derive(Debug, Clone, Default)]
pub struct RecurrencePatch {
    pub recurrence: Option<Recurrence>,
    pub start_date: Option<NaiveDate>,
    pub end: Option<EndCondition>,
}

impl RecurrencePatch {
    pub fn is_empty(&self) -> bool {
        self.recurrence.is_none() && self.start_date.is_none() && self.end.is_none()
    }
}

/// A rule edit as submitted through the rule-update API: template and
/// recurrence fields arrive together so the propagator can decide soft
/// vs. destructive handling per part.
#[derive(Debug, Clone, Default)]
pub struct RuleUpdate {
    pub template: Option<TemplatePatch>,
    pub recurrence: Option<RecurrencePatch>,
}

/// What a rule edit did to the already-materialized instances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropagationOutcome {
    /// Open future instances updated in place by a template edit.
    pub template_updated: u64,
    /// Open future instances discarded by a recurrence-shape edit.
    pub discarded: u64,
    /// Instances freshly materialized after a recurrence-shape edit.
    pub regenerated: u64,
}

/// Statistics collected by a generation sweep across all active rules.
#[derive(Debug, Clone, Default)]
pub struct SweepSummary {
    pub rules_processed: usize,
    pub instances_created: usize,
    pub rules_exhausted: usize,
    pub rules_with_errors: usize,
    pub errors: Vec<String>,
}
