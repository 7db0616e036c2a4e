use anyhow::{anyhow, Result};
use tassel_core::error::CoreError;
use tassel_core::models::ItemKind;
use tassel_core::repository::{ItemRepository, Repository, RuleRepository};
use uuid::Uuid;

pub async fn resolve_item_id(
    repo: &impl Repository,
    kind: ItemKind,
    short_id: &str,
) -> Result<Uuid> {
    if short_id.len() < 2 {
        return Err(anyhow!(CoreError::InvalidInput(
            "Short ID must be at least 2 characters long.".to_string()
        )));
    }
    let items = repo.find_items_by_short_id_prefix(kind, short_id).await?;
    if items.len() == 1 {
        Ok(items[0].id)
    } else if items.is_empty() {
        Err(anyhow!(CoreError::NotFound(format!(
            "No {} found with ID prefix '{}'",
            kind, short_id
        ))))
    } else {
        let item_info: Vec<(String, String)> = items
            .into_iter()
            .map(|i| (i.id.to_string(), i.title))
            .collect();
        Err(anyhow!(CoreError::AmbiguousId(item_info)))
    }
}

pub async fn resolve_rule_id(repo: &impl Repository, short_id: &str) -> Result<Uuid> {
    if short_id.len() < 2 {
        return Err(anyhow!(CoreError::InvalidInput(
            "Short ID must be at least 2 characters long.".to_string()
        )));
    }
    let rules = repo.find_rules_by_short_id_prefix(short_id).await?;
    if rules.len() == 1 {
        Ok(rules[0].id)
    } else if rules.is_empty() {
        Err(anyhow!(CoreError::NotFound(format!(
            "No rule found with ID prefix '{}'",
            short_id
        ))))
    } else {
        let rule_info: Vec<(String, String)> = rules
            .into_iter()
            .map(|r| (r.id.to_string(), r.template.title))
            .collect();
        Err(anyhow!(CoreError::AmbiguousId(rule_info)))
    }
}
