use crate::cli::DeleteCommand;
use crate::util::resolve_item_id;
use anyhow::Result;
use dialoguer::Confirm;
use owo_colors::OwoColorize;
use tassel_core::error::CoreError;
use tassel_core::models::ItemKind;
use tassel_core::repository::{ItemRepository, Repository};

pub async fn run(repo: &impl Repository, cmd: DeleteCommand) -> Result<()> {
    let kind: ItemKind = cmd.kind.into();
    let id = resolve_item_id(repo, kind, &cmd.id).await?;
    let item = repo
        .find_item_by_id(kind, id)
        .await?
        .ok_or_else(|| CoreError::NotFound(id.to_string()))?;

    if !cmd.force {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete {} '{}'?", kind, item.title))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Aborted.");
            return Ok(());
        }
    }

    repo.delete_item(kind, id).await?;
    println!("Deleted {} {}.", kind, format!("'{}'", item.title).bold());
    Ok(())
}
