use crate::error::CoreError;
use crate::models::{EndCondition, Item, ItemStatus, RecurrenceRule, SweepSummary};
use crate::recurrence::{occurrences_between, GenerationConfig};
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use sqlx::{Sqlite, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

/// Turns a (rule, date) pair into a concrete item carrying the rule's
/// template and a weak back-reference. The due timestamp combines the
/// occurrence date with the template's time-of-day, when present.
pub(crate) fn instance_from_rule(rule: &RecurrenceRule, date: NaiveDate) -> Item {
    let now = Utc::now();
    Item {
        id: Uuid::now_v7(),
        kind: rule.kind,
        title: rule.template.title.clone(),
        notes: rule.template.notes.clone(),
        course: rule.template.course.clone(),
        tags: rule.template.tags.clone(),
        links: rule.template.links.clone(),
        status: ItemStatus::Open,
        due_at: rule.template.due_time.map(|t| date.and_time(t).and_utc()),
        instance_date: Some(date),
        rule_id: Some(rule.id),
        completed_at: None,
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl super::GenerationRepository for SqliteRepository {
    async fn advance_rule(&self, id: Uuid, today: NaiveDate) -> Result<Vec<Item>, CoreError> {
        let (_, instances) = self.advance_and_persist(id, today).await?;
        Ok(instances)
    }

    async fn sweep(&self, today: NaiveDate) -> Result<SweepSummary, CoreError> {
        use super::RuleRepository;

        let active_rules = self.find_active_rules().await?;
        let mut summary = SweepSummary::default();

        for rule in active_rules {
            match self.advance_and_persist(rule.id, today).await {
                Ok((updated, instances)) => {
                    summary.rules_processed += 1;
                    summary.instances_created += instances.len();
                    if !updated.active {
                        summary.rules_exhausted += 1;
                    }
                }
                Err(e) => {
                    summary.rules_with_errors += 1;
                    summary.errors.push(format!("rule {}: {}", rule.id, e));
                }
            }
        }

        info!(
            rules = summary.rules_processed,
            created = summary.instances_created,
            exhausted = summary.rules_exhausted,
            errors = summary.rules_with_errors,
            "generation sweep finished"
        );
        Ok(summary)
    }
}

impl SqliteRepository {
    /// Advances one rule inside its own transaction and persists the
    /// moved cursor atomically with the inserts it accounts for. A crash
    /// in between leaves the previous state; re-running is safe because
    /// materialization is insert-if-absent.
    pub(crate) async fn advance_and_persist(
        &self,
        rule_id: Uuid,
        today: NaiveDate,
    ) -> Result<(RecurrenceRule, Vec<Item>), CoreError> {
        let mut tx = self.pool().begin().await?;
        let mut rule = Self::load_rule_in_tx(&mut tx, rule_id).await?;
        let instances = Self::advance_rule_in_tx(&mut tx, self.config(), &mut rule, today).await?;
        Self::persist_rule_progress(&mut tx, &rule).await?;
        tx.commit().await?;
        Ok((rule, instances))
    }

    /// Core generation step: evaluate the window `[cursor, horizon]`,
    /// materialize each date not yet present, then move the cursor.
    ///
    /// The window is inclusive of the cursor date; the unique
    /// (rule, date) index dedupes the boundary occurrence, so repeated
    /// or concurrent calls cannot double-materialize.
    pub(crate) async fn advance_rule_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        config: &GenerationConfig,
        rule: &mut RecurrenceRule,
        today: NaiveDate,
    ) -> Result<Vec<Item>, CoreError> {
        if !rule.active {
            return Ok(Vec::new());
        }

        let horizon = today + Duration::days(config.lookahead_days);
        let window_end = match rule.end {
            EndCondition::OnDate(date) => horizon.min(date),
            _ => horizon,
        };
        if window_end < rule.cursor {
            return Ok(Vec::new());
        }

        let dates = occurrences_between(rule, rule.cursor, window_end);
        let budget = rule.remaining_budget().map(|b| b as usize);

        let mut created: Vec<Item> = Vec::new();
        let mut last_attempted: Option<NaiveDate> = None;
        let mut stopped_early = false;

        for date in dates {
            if budget.map(|b| b.saturating_sub(created.len())) == Some(0) {
                stopped_early = true;
                break;
            }
            if created.len() >= config.max_batch_size {
                stopped_early = true;
                break;
            }

            let item = instance_from_rule(rule, date);
            let inserted = Self::insert_instance_if_absent(tx, &item).await?;
            last_attempted = Some(date);
            if inserted {
                created.push(item);
            } else {
                // Benign: the date was materialized by an earlier advance
                // or a concurrent sweep.
                debug!(rule_id = %rule.id, %date, "instance already materialized, skipping");
            }
        }

        rule.occurrences_generated += created.len() as u32;
        // Full window processed: cursor lands on the window end. Stopped
        // early (count budget or batch cap): cursor stops at the last
        // attempted date so the remainder is re-scanned next time.
        let new_cursor = if stopped_early {
            last_attempted.unwrap_or(rule.cursor)
        } else {
            window_end
        };
        rule.cursor = rule.cursor.max(new_cursor);

        if rule.remaining_budget() == Some(0) {
            rule.active = false;
        }
        if let EndCondition::OnDate(date) = rule.end {
            if rule.cursor >= date {
                rule.active = false;
            }
        }
        rule.updated_at = Utc::now();

        debug!(
            rule_id = %rule.id,
            created = created.len(),
            cursor = %rule.cursor,
            active = rule.active,
            "advanced generation cursor"
        );
        Ok(created)
    }

    /// Insert-if-absent materialization; the storage layer's unique
    /// (rule, date) index is the idempotency guard. Returns whether a
    /// row was actually written.
    pub(crate) async fn insert_instance_if_absent(
        tx: &mut Transaction<'_, Sqlite>,
        item: &Item,
    ) -> Result<bool, CoreError> {
        let sql = format!(
            r#"INSERT INTO {} (id, title, notes, course, tags, links, status, due_at, instance_date, recurring_pattern_id, completed_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT DO NOTHING"#,
            item.kind.table()
        );
        let result = sqlx::query(&sql)
            .bind(item.id)
            .bind(&item.title)
            .bind(&item.notes)
            .bind(&item.course)
            .bind(serde_json::to_string(&item.tags)?)
            .bind(serde_json::to_string(&item.links)?)
            .bind(item.status)
            .bind(item.due_at)
            .bind(item.instance_date)
            .bind(item.rule_id)
            .bind(item.completed_at)
            .bind(item.created_at)
            .bind(item.updated_at)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}
