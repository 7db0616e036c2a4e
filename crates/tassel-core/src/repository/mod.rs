use crate::db::DbPool;
use crate::error::CoreError;
use crate::models::{
    Item, ItemKind, NewItemData, NewRuleData, PropagationOutcome, RecurrenceRule, RuleUpdate,
    SweepSummary, UpdateItemData,
};
use crate::recurrence::GenerationConfig;
use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

// Re-export domain modules
pub mod generation;
pub mod items;
pub mod propagation;
pub mod rules;

// Traits are defined in this module and implemented in respective domain modules

/// Domain-specific trait for instance (task/deadline/exam) operations.
/// Generated instances are ordinary rows here; nothing in this trait is
/// recurrence-aware beyond the read paths that apply display selection.
#[async_trait]
pub trait ItemRepository {
    async fn add_item(&self, data: NewItemData) -> Result<Item, CoreError>;
    async fn find_item_by_id(&self, kind: ItemKind, id: Uuid) -> Result<Option<Item>, CoreError>;
    async fn find_items_by_short_id_prefix(
        &self,
        kind: ItemKind,
        prefix: &str,
    ) -> Result<Vec<Item>, CoreError>;
    async fn update_item(
        &self,
        kind: ItemKind,
        id: Uuid,
        data: UpdateItemData,
    ) -> Result<Item, CoreError>;
    async fn complete_item(&self, kind: ItemKind, id: Uuid) -> Result<Item, CoreError>;
    async fn delete_item(&self, kind: ItemKind, id: Uuid) -> Result<(), CoreError>;
    async fn items_for_rule(&self, kind: ItemKind, rule_id: Uuid) -> Result<Vec<Item>, CoreError>;
    /// Open work, with each rule collapsed to its single visible instance.
    async fn upcoming_items(&self, kind: ItemKind) -> Result<Vec<Item>, CoreError>;
    /// Every open item, uncollapsed; search-style views use this.
    async fn open_items(&self, kind: ItemKind) -> Result<Vec<Item>, CoreError>;
    /// Full completion history, most recently completed first. Never collapsed.
    async fn completed_items(&self, kind: ItemKind) -> Result<Vec<Item>, CoreError>;
}

/// Domain-specific trait for recurrence-rule records.
#[async_trait]
pub trait RuleRepository {
    /// Validates and stores a rule, then materializes its initial batch.
    async fn create_rule(
        &self,
        data: NewRuleData,
        today: NaiveDate,
    ) -> Result<(RecurrenceRule, Vec<Item>), CoreError>;
    async fn find_rule_by_id(&self, id: Uuid) -> Result<Option<RecurrenceRule>, CoreError>;
    async fn find_rules_by_short_id_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<RecurrenceRule>, CoreError>;
    async fn find_rules(&self) -> Result<Vec<RecurrenceRule>, CoreError>;
    async fn find_active_rules(&self) -> Result<Vec<RecurrenceRule>, CoreError>;
    async fn set_rule_active(&self, id: Uuid, active: bool) -> Result<RecurrenceRule, CoreError>;
    /// Removes the rule and its open future instances. Completed and
    /// past-dated instances are history and stay behind.
    async fn delete_rule(&self, id: Uuid, today: NaiveDate) -> Result<(), CoreError>;
}

/// Domain-specific trait for occurrence generation.
#[async_trait]
pub trait GenerationRepository {
    /// Advances one rule's generation cursor through its lookahead
    /// window, returning the newly materialized instances. Idempotent:
    /// repeating the call with an unchanged rule creates nothing.
    async fn advance_rule(&self, id: Uuid, today: NaiveDate) -> Result<Vec<Item>, CoreError>;
    /// Refills every active rule's horizon; the periodic sweep entry point.
    async fn sweep(&self, today: NaiveDate) -> Result<SweepSummary, CoreError>;
}

/// Domain-specific trait for reconciling instances after a rule edit.
#[async_trait]
pub trait PropagationRepository {
    /// Applies a combined template + recurrence edit. Template changes
    /// update open future instances in place; recurrence-shape changes
    /// discard and regenerate them.
    async fn apply_rule_update(
        &self,
        id: Uuid,
        update: RuleUpdate,
        today: NaiveDate,
    ) -> Result<(RecurrenceRule, PropagationOutcome), CoreError>;
}

/// Main repository trait that composes all domain traits
#[async_trait]
pub trait Repository:
    ItemRepository + RuleRepository + GenerationRepository + PropagationRepository
{
    // This trait automatically composes all domain-specific repositories
    // Individual domain operations are defined in their respective traits
}

/// SQLite implementation of the repository pattern
pub struct SqliteRepository {
    pool: DbPool,
    config: GenerationConfig,
}

impl SqliteRepository {
    pub fn new(pool: DbPool, config: GenerationConfig) -> Self {
        Self { pool, config }
    }

    /// Get a reference to the database pool for internal use across modules
    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Get a reference to the generation configuration for internal use
    pub(crate) fn config(&self) -> &GenerationConfig {
        &self.config
    }
}

// The main Repository trait implementation will automatically be available
// when all domain trait implementations are defined
impl Repository for SqliteRepository {}

/// Normalizes a user-supplied short id for hex-prefix matching against
/// BLOB-stored UUIDs.
pub(crate) fn short_id_pattern(prefix: &str) -> String {
    let normalized: String = prefix
        .chars()
        .filter(|c| *c != '-')
        .flat_map(char::to_lowercase)
        .collect();
    format!("{}%", normalized)
}
