use crate::cli::ListCommand;
use crate::views::table;
use anyhow::Result;
use chrono::NaiveDate;
use tassel_core::models::ItemKind;
use tassel_core::repository::{ItemRepository, Repository};

pub async fn run(repo: &impl Repository, cmd: ListCommand, today: NaiveDate) -> Result<()> {
    let kind: ItemKind = cmd.kind.into();

    let items = if cmd.done {
        repo.completed_items(kind).await?
    } else if cmd.all {
        repo.open_items(kind).await?
    } else {
        repo.upcoming_items(kind).await?
    };

    table::display_items(&items, today);
    Ok(())
}
