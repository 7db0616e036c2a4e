//! # Tassel Core Library
//!
//! The scheduling engine of the Tassel student planner: declarative
//! recurrence rules turned into concrete dated tasks, deadlines and
//! exams, kept in sync as rules are edited.
//!
//! ## Features
//!
//! - **Declarative recurrence**: daily, weekly day-sets, monthly day-sets
//!   with end-of-month clamping, and fixed day intervals
//! - **Cursor-based incremental generation**: never-ending rules are
//!   materialized over a rolling window instead of up front
//! - **Idempotent materialization**: at most one instance per
//!   (rule, date), enforced at the storage layer
//! - **Asymmetric update propagation**: template edits flow softly onto
//!   open future instances; shape edits discard and regenerate them
//! - **Display selection**: upcoming views collapse each rule down to
//!   its earliest open instance
//!
//! ## Core Modules
//!
//! - [`db`]: Database connection and migration management
//! - [`models`]: Core data structures and transfer objects
//! - [`repository`]: Data access layer with Repository pattern
//! - [`recurrence`]: Pure occurrence evaluation and rule validation
//! - [`selection`]: Read-time instance collapsing for list views
//! - [`error`]: Error types with context
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use tassel_core::{
//!     db,
//!     models::{EndCondition, ItemKind, ItemTemplate, NewRuleData, Recurrence},
//!     recurrence::GenerationConfig,
//!     repository::{RuleRepository, SqliteRepository},
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pool = db::establish_connection("tassel.db").await?;
//!     let repo = SqliteRepository::new(pool, GenerationConfig::default());
//!
//!     let today = Utc::now().date_naive();
//!     let data = NewRuleData {
//!         kind: ItemKind::Task,
//!         recurrence: Recurrence::Weekly { days: [0u8, 2].into_iter().collect() },
//!         start_date: today,
//!         end: EndCondition::Never,
//!         template: ItemTemplate {
//!             title: "Calculus problem set".to_string(),
//!             ..Default::default()
//!         },
//!     };
//!
//!     let (rule, instances) = repo.create_rule(data, today).await?;
//!     println!("rule {} generated {} instances", rule.id, instances.len());
//!
//!     Ok(())
//! }
//! ```

pub mod db;
pub mod error;
pub mod models;
pub mod recurrence;
pub mod repository;
pub mod selection;
