use crate::cli::EditCommand;
use crate::parser;
use crate::util::resolve_item_id;
use anyhow::Result;
use chrono::NaiveTime;
use owo_colors::OwoColorize;
use tassel_core::models::{ItemKind, ItemStatus, UpdateItemData};
use tassel_core::repository::{ItemRepository, Repository};

pub async fn run(repo: &impl Repository, cmd: EditCommand) -> Result<()> {
    let kind: ItemKind = cmd.kind.into();
    let id = resolve_item_id(repo, kind, &cmd.id).await?;

    let due_at = if cmd.due_clear {
        Some(None)
    } else if let Some(due) = cmd.due.as_deref() {
        let date = parser::parse_date(due)?;
        let time = cmd
            .at
            .as_deref()
            .map(parser::parse_time)
            .transpose()?
            .or_else(|| NaiveTime::from_hms_opt(23, 59, 0))
            .unwrap_or_default();
        Some(Some(date.and_time(time).and_utc()))
    } else {
        None
    };

    let data = UpdateItemData {
        title: cmd.title,
        notes: if cmd.notes_clear {
            Some(None)
        } else {
            cmd.notes.map(Some)
        },
        course: if cmd.course_clear {
            Some(None)
        } else {
            cmd.course.map(Some)
        },
        tags: if cmd.tag.is_empty() {
            None
        } else {
            Some(cmd.tag)
        },
        links: None,
        due_at,
        status: cmd.reopen.then_some(ItemStatus::Open),
    };

    let item = repo.update_item(kind, id, data).await?;
    println!("Updated {} {}.", kind, format!("'{}'", item.title).bold());
    Ok(())
}
