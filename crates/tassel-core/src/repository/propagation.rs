use crate::error::CoreError;
use crate::models::{
    PropagationOutcome, RecurrencePatch, RecurrenceRule, RuleUpdate, TemplatePatch,
};
use crate::recurrence::{validate, GenerationConfig};
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{Sqlite, Transaction};
use tracing::info;
use uuid::Uuid;

#[async_trait]
impl super::PropagationRepository for SqliteRepository {
    async fn apply_rule_update(
        &self,
        id: Uuid,
        update: RuleUpdate,
        today: NaiveDate,
    ) -> Result<(RecurrenceRule, PropagationOutcome), CoreError> {
        let mut tx = self.pool().begin().await?;
        let mut rule = Self::load_rule_in_tx(&mut tx, id).await?;
        let mut outcome = PropagationOutcome::default();

        // Template edits are soft and forward-only; recurrence-shape
        // edits are destructive and regenerative. Both may arrive in one
        // update, template first so regenerated instances pick it up too.
        if let Some(patch) = &update.template {
            if !patch.is_empty() {
                outcome.template_updated =
                    Self::apply_template_patch_in_tx(&mut tx, &mut rule, patch, today).await?;
            }
        }

        if let Some(patch) = &update.recurrence {
            if !patch.is_empty() {
                let (discarded, regenerated) = Self::apply_recurrence_patch_in_tx(
                    &mut tx,
                    self.config(),
                    &mut rule,
                    patch,
                    today,
                )
                .await?;
                outcome.discarded = discarded;
                outcome.regenerated = regenerated;
            }
        }

        rule.updated_at = Utc::now();
        Self::persist_rule_full(&mut tx, &rule).await?;
        tx.commit().await?;

        info!(
            rule_id = %rule.id,
            template_updated = outcome.template_updated,
            discarded = outcome.discarded,
            regenerated = outcome.regenerated,
            "propagated rule update"
        );
        Ok((rule, outcome))
    }
}

impl SqliteRepository {
    /// Applies template fields to the rule and to its open instances
    /// dated today or later. Completed and past-dated instances keep
    /// their original content; they represent history.
    async fn apply_template_patch_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        rule: &mut RecurrenceRule,
        patch: &TemplatePatch,
        today: NaiveDate,
    ) -> Result<u64, CoreError> {
        if let Some(title) = &patch.title {
            rule.template.title = title.clone();
        }
        if let Some(notes) = &patch.notes {
            rule.template.notes = notes.clone();
        }
        if let Some(course) = &patch.course {
            rule.template.course = course.clone();
        }
        if let Some(tags) = &patch.tags {
            rule.template.tags = tags.clone();
        }
        if let Some(links) = &patch.links {
            rule.template.links = links.clone();
        }
        if let Some(due_time) = &patch.due_time {
            rule.template.due_time = *due_time;
        }

        let select = format!(
            "SELECT id, instance_date FROM {} WHERE recurring_pattern_id = $1 AND status = 'open' AND instance_date >= $2",
            rule.kind.table()
        );
        let targets: Vec<(Uuid, Option<NaiveDate>)> = sqlx::query_as(&select)
            .bind(rule.id)
            .bind(today)
            .fetch_all(&mut **tx)
            .await?;

        let update = format!(
            r#"UPDATE {}
            SET title = $1, notes = $2, course = $3, tags = $4, links = $5, due_at = $6, updated_at = $7
            WHERE id = $8"#,
            rule.kind.table()
        );
        let now = Utc::now();
        for (item_id, instance_date) in &targets {
            // The due timestamp is derived state; recompute it from the
            // instance date and the (possibly changed) time-of-day.
            let due_at = instance_date.and_then(|date| {
                rule.template.due_time.map(|t| date.and_time(t).and_utc())
            });
            sqlx::query(&update)
                .bind(&rule.template.title)
                .bind(&rule.template.notes)
                .bind(&rule.template.course)
                .bind(serde_json::to_string(&rule.template.tags)?)
                .bind(serde_json::to_string(&rule.template.links)?)
                .bind(due_at)
                .bind(now)
                .bind(item_id)
                .execute(&mut **tx)
                .await?;
        }

        Ok(targets.len() as u64)
    }

    /// Replaces the recurrence shape: open future instances are
    /// discarded (their generation slots released), the cursor resets to
    /// the edit date, and the window is refilled against the new shape
    /// within the same transaction.
    async fn apply_recurrence_patch_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        config: &GenerationConfig,
        rule: &mut RecurrenceRule,
        patch: &RecurrencePatch,
        today: NaiveDate,
    ) -> Result<(u64, u64), CoreError> {
        let new_recurrence = patch
            .recurrence
            .clone()
            .unwrap_or_else(|| rule.recurrence.clone());
        let new_start = patch.start_date.unwrap_or(rule.start_date);
        let new_end = patch.end.unwrap_or(rule.end);

        validate(&new_recurrence, new_start, &new_end)?;

        if let Some(start) = patch.start_date {
            // History cannot be generated retroactively.
            if start != rule.start_date && start < rule.cursor {
                return Err(CoreError::InvalidRule(
                    "start date cannot move before already-generated occurrences".to_string(),
                ));
            }
        }

        let delete = format!(
            "DELETE FROM {} WHERE recurring_pattern_id = $1 AND status = 'open' AND instance_date >= $2",
            rule.kind.table()
        );
        let discarded = sqlx::query(&delete)
            .bind(rule.id)
            .bind(today)
            .execute(&mut **tx)
            .await?
            .rows_affected();

        // Discarded instances return their slots so an AfterCount rule
        // can regenerate replacements under the new shape.
        rule.occurrences_generated = rule.occurrences_generated.saturating_sub(discarded as u32);
        rule.recurrence = new_recurrence;
        rule.start_date = new_start;
        rule.end = new_end;
        rule.cursor = today.max(new_start);

        let regenerated = Self::advance_rule_in_tx(tx, config, rule, today).await?;
        Ok((discarded, regenerated.len() as u64))
    }
}
