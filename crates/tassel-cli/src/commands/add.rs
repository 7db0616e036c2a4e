use crate::cli::AddCommand;
use crate::parser;
use anyhow::Result;
use chrono::NaiveDate;
use owo_colors::OwoColorize;
use tassel_core::models::{ItemKind, ItemTemplate, NewItemData, NewRuleData};
use tassel_core::repository::{ItemRepository, Repository, RuleRepository};

pub async fn run(repo: &impl Repository, cmd: AddCommand, today: NaiveDate) -> Result<()> {
    let kind: ItemKind = cmd.kind.into();
    let due_time = cmd.at.as_deref().map(parser::parse_time).transpose()?;
    let recurrence = parser::build_recurrence(
        cmd.daily,
        cmd.weekly.as_deref(),
        cmd.monthly.as_deref(),
        cmd.every_days,
    )?;

    match recurrence {
        Some(recurrence) => {
            let start_date = cmd
                .start
                .as_deref()
                .map(parser::parse_date)
                .transpose()?
                .unwrap_or(today);
            let end = parser::build_end_condition(cmd.until.as_deref(), cmd.count)?;
            let template = ItemTemplate {
                title: cmd.title,
                notes: cmd.notes,
                course: cmd.course,
                tags: cmd.tag,
                links: cmd.link,
                due_time,
            };

            let data = NewRuleData {
                kind,
                recurrence,
                start_date,
                end,
                template,
            };
            let (rule, instances) = repo.create_rule(data, today).await?;
            println!(
                "Created recurring {} {} ({}, {}); {} upcoming instance(s).",
                kind,
                format!("'{}'", rule.template.title).bold(),
                rule.recurrence,
                rule.end,
                instances.len()
            );
        }
        None => {
            let due_date = cmd.due.as_deref().map(parser::parse_date).transpose()?;
            let data = NewItemData {
                kind,
                title: cmd.title,
                notes: cmd.notes,
                course: cmd.course,
                tags: cmd.tag,
                links: cmd.link,
                due_date,
                due_time,
            };
            let item = repo.add_item(data).await?;
            println!("Added {} {}.", kind, format!("'{}'", item.title).bold());
        }
    }

    Ok(())
}
