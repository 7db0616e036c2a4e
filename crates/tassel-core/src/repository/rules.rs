use crate::error::CoreError;
use crate::models::{
    EndCondition, Item, ItemKind, ItemTemplate, NewRuleData, Recurrence, RecurrenceRule,
};
use crate::recurrence::validate;
use crate::repository::{short_id_pattern, SqliteRepository};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::{FromRow, Sqlite, Transaction};
use tracing::info;
use uuid::Uuid;

/// Flat rule row; the recurrence shape and end condition are spread over
/// nullable columns and reassembled into their domain enums on read.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct RuleRow {
    pub id: Uuid,
    pub item_kind: ItemKind,
    pub frequency: String,
    pub by_weekday: Option<String>,
    pub by_monthday: Option<String>,
    pub interval_days: Option<i64>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub max_occurrences: Option<i64>,
    pub cursor_date: NaiveDate,
    pub occurrences_generated: i64,
    pub active: bool,
    pub title: String,
    pub notes: Option<String>,
    pub course: Option<String>,
    pub tags: String,
    pub links: String,
    pub due_time: Option<NaiveTime>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<RuleRow> for RecurrenceRule {
    type Error = CoreError;

    fn try_from(row: RuleRow) -> Result<Self, CoreError> {
        let recurrence = match row.frequency.as_str() {
            "daily" => Recurrence::Daily,
            "weekly" => Recurrence::Weekly {
                days: serde_json::from_str(row.by_weekday.as_deref().unwrap_or("[]"))?,
            },
            "monthly" => Recurrence::Monthly {
                days: serde_json::from_str(row.by_monthday.as_deref().unwrap_or("[]"))?,
            },
            "interval" => Recurrence::Interval {
                every_days: row
                    .interval_days
                    .ok_or_else(|| {
                        CoreError::InvalidInput("interval rule without interval_days".to_string())
                    })? as u32,
            },
            other => {
                return Err(CoreError::InvalidInput(format!(
                    "unknown recurrence frequency '{}'",
                    other
                )))
            }
        };

        let end = match (row.end_date, row.max_occurrences) {
            (Some(date), _) => EndCondition::OnDate(date),
            (None, Some(n)) => EndCondition::AfterCount(n as u32),
            (None, None) => EndCondition::Never,
        };

        Ok(RecurrenceRule {
            id: row.id,
            kind: row.item_kind,
            recurrence,
            start_date: row.start_date,
            end,
            cursor: row.cursor_date,
            occurrences_generated: row.occurrences_generated as u32,
            active: row.active,
            template: ItemTemplate {
                title: row.title,
                notes: row.notes,
                course: row.course,
                tags: serde_json::from_str(&row.tags)?,
                links: serde_json::from_str(&row.links)?,
                due_time: row.due_time,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Column values for the recurrence shape: (frequency, by_weekday,
/// by_monthday, interval_days).
fn shape_columns(
    recurrence: &Recurrence,
) -> Result<(&'static str, Option<String>, Option<String>, Option<i64>), CoreError> {
    Ok(match recurrence {
        Recurrence::Daily => ("daily", None, None, None),
        Recurrence::Weekly { days } => ("weekly", Some(serde_json::to_string(days)?), None, None),
        Recurrence::Monthly { days } => {
            ("monthly", None, Some(serde_json::to_string(days)?), None)
        }
        Recurrence::Interval { every_days } => {
            ("interval", None, None, Some(i64::from(*every_days)))
        }
    })
}

fn end_columns(end: &EndCondition) -> (Option<NaiveDate>, Option<i64>) {
    match end {
        EndCondition::Never => (None, None),
        EndCondition::OnDate(date) => (Some(*date), None),
        EndCondition::AfterCount(n) => (None, Some(i64::from(*n))),
    }
}

#[async_trait]
impl super::RuleRepository for SqliteRepository {
    async fn create_rule(
        &self,
        data: NewRuleData,
        today: NaiveDate,
    ) -> Result<(RecurrenceRule, Vec<Item>), CoreError> {
        // Reject invalid configurations before any generation is attempted.
        validate(&data.recurrence, data.start_date, &data.end)?;
        if data.template.title.trim().is_empty() {
            return Err(CoreError::InvalidInput("title must not be empty".to_string()));
        }

        let now = Utc::now();
        let mut rule = RecurrenceRule {
            id: Uuid::now_v7(),
            kind: data.kind,
            recurrence: data.recurrence,
            start_date: data.start_date,
            end: data.end,
            cursor: data.start_date,
            occurrences_generated: 0,
            active: true,
            template: data.template,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.pool().begin().await?;
        Self::insert_rule_in_transaction(&mut tx, &rule).await?;
        let instances = Self::advance_rule_in_tx(&mut tx, self.config(), &mut rule, today).await?;
        Self::persist_rule_progress(&mut tx, &rule).await?;
        tx.commit().await?;

        info!(
            rule_id = %rule.id,
            kind = %rule.kind,
            instances = instances.len(),
            "created recurrence rule"
        );
        Ok((rule, instances))
    }

    async fn find_rule_by_id(&self, id: Uuid) -> Result<Option<RecurrenceRule>, CoreError> {
        let row: Option<RuleRow> = sqlx::query_as("SELECT * FROM recurrence_rules WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.map(RecurrenceRule::try_from).transpose()
    }

    async fn find_rules_by_short_id_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<RecurrenceRule>, CoreError> {
        let rows: Vec<RuleRow> =
            sqlx::query_as("SELECT * FROM recurrence_rules WHERE lower(hex(id)) LIKE $1")
                .bind(short_id_pattern(prefix))
                .fetch_all(self.pool())
                .await?;
        rows.into_iter().map(RecurrenceRule::try_from).collect()
    }

    async fn find_rules(&self) -> Result<Vec<RecurrenceRule>, CoreError> {
        let rows: Vec<RuleRow> =
            sqlx::query_as("SELECT * FROM recurrence_rules ORDER BY created_at")
                .fetch_all(self.pool())
                .await?;
        rows.into_iter().map(RecurrenceRule::try_from).collect()
    }

    async fn find_active_rules(&self) -> Result<Vec<RecurrenceRule>, CoreError> {
        let rows: Vec<RuleRow> =
            sqlx::query_as("SELECT * FROM recurrence_rules WHERE active = TRUE ORDER BY created_at")
                .fetch_all(self.pool())
                .await?;
        rows.into_iter().map(RecurrenceRule::try_from).collect()
    }

    async fn set_rule_active(&self, id: Uuid, active: bool) -> Result<RecurrenceRule, CoreError> {
        let row: RuleRow = sqlx::query_as(
            r#"UPDATE recurrence_rules
            SET active = $1, updated_at = $2
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(active)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("Rule with id {} not found", id)))?;

        RecurrenceRule::try_from(row)
    }

    async fn delete_rule(&self, id: Uuid, today: NaiveDate) -> Result<(), CoreError> {
        let mut tx = self.pool().begin().await?;
        let rule = Self::load_rule_in_tx(&mut tx, id).await?;

        // Open future instances go with the rule; completed and
        // past-dated instances are history and keep their weak reference.
        let sql = format!(
            "DELETE FROM {} WHERE recurring_pattern_id = $1 AND status = 'open' AND instance_date >= $2",
            rule.kind.table()
        );
        let removed = sqlx::query(&sql)
            .bind(rule.id)
            .bind(today)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM recurrence_rules WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(rule_id = %id, removed_instances = removed, "deleted recurrence rule");
        Ok(())
    }
}

impl SqliteRepository {
    /// Loads a rule for update inside an existing transaction.
    pub(crate) async fn load_rule_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        id: Uuid,
    ) -> Result<RecurrenceRule, CoreError> {
        let row: RuleRow = sqlx::query_as("SELECT * FROM recurrence_rules WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Rule with id {} not found", id)))?;
        RecurrenceRule::try_from(row)
    }

    pub(crate) async fn insert_rule_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        rule: &RecurrenceRule,
    ) -> Result<(), CoreError> {
        let (frequency, by_weekday, by_monthday, interval_days) = shape_columns(&rule.recurrence)?;
        let (end_date, max_occurrences) = end_columns(&rule.end);

        sqlx::query(
            r#"INSERT INTO recurrence_rules (
                id, item_kind, frequency, by_weekday, by_monthday, interval_days,
                start_date, end_date, max_occurrences, cursor_date, occurrences_generated,
                active, title, notes, course, tags, links, due_time, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)"#,
        )
        .bind(rule.id)
        .bind(rule.kind)
        .bind(frequency)
        .bind(by_weekday)
        .bind(by_monthday)
        .bind(interval_days)
        .bind(rule.start_date)
        .bind(end_date)
        .bind(max_occurrences)
        .bind(rule.cursor)
        .bind(i64::from(rule.occurrences_generated))
        .bind(rule.active)
        .bind(&rule.template.title)
        .bind(&rule.template.notes)
        .bind(&rule.template.course)
        .bind(serde_json::to_string(&rule.template.tags)?)
        .bind(serde_json::to_string(&rule.template.links)?)
        .bind(rule.template.due_time)
        .bind(rule.created_at)
        .bind(rule.updated_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Persists the generation-progress fields only. Cursor and count
    /// commit atomically with the instance inserts they account for.
    pub(crate) async fn persist_rule_progress(
        tx: &mut Transaction<'_, Sqlite>,
        rule: &RecurrenceRule,
    ) -> Result<(), CoreError> {
        sqlx::query(
            r#"UPDATE recurrence_rules
            SET cursor_date = $1, occurrences_generated = $2, active = $3, updated_at = $4
            WHERE id = $5"#,
        )
        .bind(rule.cursor)
        .bind(i64::from(rule.occurrences_generated))
        .bind(rule.active)
        .bind(rule.updated_at)
        .bind(rule.id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Persists every mutable rule column; used after a propagated edit.
    pub(crate) async fn persist_rule_full(
        tx: &mut Transaction<'_, Sqlite>,
        rule: &RecurrenceRule,
    ) -> Result<(), CoreError> {
        let (frequency, by_weekday, by_monthday, interval_days) = shape_columns(&rule.recurrence)?;
        let (end_date, max_occurrences) = end_columns(&rule.end);

        sqlx::query(
            r#"UPDATE recurrence_rules
            SET frequency = $1, by_weekday = $2, by_monthday = $3, interval_days = $4,
                start_date = $5, end_date = $6, max_occurrences = $7, cursor_date = $8,
                occurrences_generated = $9, active = $10, title = $11, notes = $12,
                course = $13, tags = $14, links = $15, due_time = $16, updated_at = $17
            WHERE id = $18"#,
        )
        .bind(frequency)
        .bind(by_weekday)
        .bind(by_monthday)
        .bind(interval_days)
        .bind(rule.start_date)
        .bind(end_date)
        .bind(max_occurrences)
        .bind(rule.cursor)
        .bind(i64::from(rule.occurrences_generated))
        .bind(rule.active)
        .bind(&rule.template.title)
        .bind(&rule.template.notes)
        .bind(&rule.template.course)
        .bind(serde_json::to_string(&rule.template.tags)?)
        .bind(serde_json::to_string(&rule.template.links)?)
        .bind(rule.template.due_time)
        .bind(rule.updated_at)
        .bind(rule.id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}
