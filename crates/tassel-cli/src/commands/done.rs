use crate::cli::DoneCommand;
use crate::util::resolve_item_id;
use anyhow::Result;
use owo_colors::OwoColorize;
use tassel_core::models::ItemKind;
use tassel_core::repository::{ItemRepository, Repository};

pub async fn run(repo: &impl Repository, cmd: DoneCommand) -> Result<()> {
    let kind: ItemKind = cmd.kind.into();
    let id = resolve_item_id(repo, kind, &cmd.id).await?;
    let item = repo.complete_item(kind, id).await?;
    println!("Completed {} {}.", kind, format!("'{}'", item.title).bold());
    Ok(())
}
