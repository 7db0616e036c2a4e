use crate::error::CoreError;
use crate::models::{Item, ItemKind, ItemStatus, NewItemData, UpdateItemData};
use crate::repository::{short_id_pattern, SqliteRepository};
use crate::selection;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, Transaction};
use uuid::Uuid;

/// Flat row as stored in the per-kind item tables; tags and links are
/// JSON arrays in TEXT columns.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct ItemRow {
    pub id: Uuid,
    pub title: String,
    pub notes: Option<String>,
    pub course: Option<String>,
    pub tags: String,
    pub links: String,
    pub status: ItemStatus,
    pub due_at: Option<DateTime<Utc>>,
    pub instance_date: Option<NaiveDate>,
    pub recurring_pattern_id: Option<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ItemRow {
    pub(crate) fn into_item(self, kind: ItemKind) -> Result<Item, CoreError> {
        Ok(Item {
            id: self.id,
            kind,
            title: self.title,
            notes: self.notes,
            course: self.course,
            tags: serde_json::from_str(&self.tags)?,
            links: serde_json::from_str(&self.links)?,
            status: self.status,
            due_at: self.due_at,
            instance_date: self.instance_date,
            rule_id: self.recurring_pattern_id,
            completed_at: self.completed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// One-off items with a date but no time land at end of day, so they
/// sort after timed work on the same date.
fn one_off_due_at(date: Option<NaiveDate>, time: Option<NaiveTime>) -> Option<DateTime<Utc>> {
    let date = date?;
    let time = time
        .or_else(|| NaiveTime::from_hms_opt(23, 59, 0))
        .unwrap_or_default();
    Some(date.and_time(time).and_utc())
}

#[async_trait]
impl super::ItemRepository for SqliteRepository {
    async fn add_item(&self, data: NewItemData) -> Result<Item, CoreError> {
        let now = Utc::now();
        let item = Item {
            id: Uuid::now_v7(),
            kind: data.kind,
            title: data.title,
            notes: data.notes,
            course: data.course,
            tags: data.tags,
            links: data.links,
            status: ItemStatus::Open,
            due_at: one_off_due_at(data.due_date, data.due_time),
            instance_date: None,
            rule_id: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.pool().begin().await?;
        Self::insert_item_in_transaction(&mut tx, &item).await?;
        tx.commit().await?;
        Ok(item)
    }

    async fn find_item_by_id(&self, kind: ItemKind, id: Uuid) -> Result<Option<Item>, CoreError> {
        let sql = format!("SELECT * FROM {} WHERE id = $1", kind.table());
        let row: Option<ItemRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.map(|r| r.into_item(kind)).transpose()
    }

    async fn find_items_by_short_id_prefix(
        &self,
        kind: ItemKind,
        prefix: &str,
    ) -> Result<Vec<Item>, CoreError> {
        let sql = format!(
            "SELECT * FROM {} WHERE lower(hex(id)) LIKE $1",
            kind.table()
        );
        let rows: Vec<ItemRow> = sqlx::query_as(&sql)
            .bind(short_id_pattern(prefix))
            .fetch_all(self.pool())
            .await?;
        rows.into_iter().map(|r| r.into_item(kind)).collect()
    }

    async fn update_item(
        &self,
        kind: ItemKind,
        id: Uuid,
        data: UpdateItemData,
    ) -> Result<Item, CoreError> {
        let mut tx = self.pool().begin().await?;

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!("UPDATE {} SET ", kind.table()));
        let mut updated = false;

        if let Some(title) = data.title {
            qb.push("title = ");
            qb.push_bind(title);
            updated = true;
        }

        if let Some(notes) = data.notes {
            if updated {
                qb.push(", ");
            }
            qb.push("notes = ");
            qb.push_bind(notes);
            updated = true;
        }

        if let Some(course) = data.course {
            if updated {
                qb.push(", ");
            }
            qb.push("course = ");
            qb.push_bind(course);
            updated = true;
        }

        if let Some(tags) = data.tags {
            if updated {
                qb.push(", ");
            }
            qb.push("tags = ");
            qb.push_bind(serde_json::to_string(&tags)?);
            updated = true;
        }

        if let Some(links) = data.links {
            if updated {
                qb.push(", ");
            }
            qb.push("links = ");
            qb.push_bind(serde_json::to_string(&links)?);
            updated = true;
        }

        if let Some(due_at) = data.due_at {
            if updated {
                qb.push(", ");
            }
            qb.push("due_at = ");
            qb.push_bind(due_at);
            updated = true;
        }

        if let Some(status) = data.status {
            if updated {
                qb.push(", ");
            }
            qb.push("status = ");
            qb.push_bind(status);
            qb.push(", completed_at = ");
            match status {
                ItemStatus::Done => qb.push_bind(Some(Utc::now())),
                ItemStatus::Open => qb.push_bind(None::<DateTime<Utc>>),
            };
            updated = true;
        }

        if updated {
            qb.push(", updated_at = ");
            qb.push_bind(Utc::now());
            qb.push(" WHERE id = ");
            qb.push_bind(id);
            qb.build().execute(&mut *tx).await?;
        }

        let sql = format!("SELECT * FROM {} WHERE id = $1", kind.table());
        let row: ItemRow = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| CoreError::NotFound(id.to_string()))?;

        tx.commit().await?;
        row.into_item(kind)
    }

    async fn complete_item(&self, kind: ItemKind, id: Uuid) -> Result<Item, CoreError> {
        let sql = format!(
            r#"UPDATE {}
            SET status = $1, completed_at = $2, updated_at = $2
            WHERE id = $3
            RETURNING *
            "#,
            kind.table()
        );
        let row: ItemRow = sqlx::query_as(&sql)
            .bind(ItemStatus::Done)
            .bind(Utc::now())
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| CoreError::NotFound(id.to_string()))?;

        row.into_item(kind)
    }

    async fn delete_item(&self, kind: ItemKind, id: Uuid) -> Result<(), CoreError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", kind.table());
        let result = sqlx::query(&sql).bind(id).execute(self.pool()).await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn items_for_rule(&self, kind: ItemKind, rule_id: Uuid) -> Result<Vec<Item>, CoreError> {
        let sql = format!(
            "SELECT * FROM {} WHERE recurring_pattern_id = $1 ORDER BY instance_date",
            kind.table()
        );
        let rows: Vec<ItemRow> = sqlx::query_as(&sql)
            .bind(rule_id)
            .fetch_all(self.pool())
            .await?;
        rows.into_iter().map(|r| r.into_item(kind)).collect()
    }

    async fn upcoming_items(&self, kind: ItemKind) -> Result<Vec<Item>, CoreError> {
        let sql = format!(
            "SELECT * FROM {} WHERE status = 'open' ORDER BY due_at",
            kind.table()
        );
        let rows: Vec<ItemRow> = sqlx::query_as(&sql).fetch_all(self.pool()).await?;
        let items: Vec<Item> = rows
            .into_iter()
            .map(|r| r.into_item(kind))
            .collect::<Result<_, _>>()?;
        Ok(selection::collapse_upcoming(items))
    }

    async fn open_items(&self, kind: ItemKind) -> Result<Vec<Item>, CoreError> {
        let sql = format!(
            "SELECT * FROM {} WHERE status = 'open' ORDER BY instance_date, due_at",
            kind.table()
        );
        let rows: Vec<ItemRow> = sqlx::query_as(&sql).fetch_all(self.pool()).await?;
        rows.into_iter().map(|r| r.into_item(kind)).collect()
    }

    async fn completed_items(&self, kind: ItemKind) -> Result<Vec<Item>, CoreError> {
        let sql = format!(
            "SELECT * FROM {} WHERE status = 'done' ORDER BY completed_at DESC",
            kind.table()
        );
        let rows: Vec<ItemRow> = sqlx::query_as(&sql).fetch_all(self.pool()).await?;
        rows.into_iter().map(|r| r.into_item(kind)).collect()
    }
}

impl SqliteRepository {
    /// Inserts a fully built item row within an existing transaction.
    pub(crate) async fn insert_item_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        item: &Item,
    ) -> Result<(), CoreError> {
        let sql = format!(
            r#"INSERT INTO {} (id, title, notes, course, tags, links, status, due_at, instance_date, recurring_pattern_id, completed_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"#,
            item.kind.table()
        );
        sqlx::query(&sql)
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
        Ok(())
    }
}
