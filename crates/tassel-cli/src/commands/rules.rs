use crate::cli::{RuleCommand, RuleEditCommand, RuleSubcommand};
use crate::parser;
use crate::util::resolve_rule_id;
use crate::views::table;
use anyhow::Result;
use chrono::NaiveDate;
use dialoguer::Confirm;
use owo_colors::OwoColorize;
use tassel_core::error::CoreError;
use tassel_core::models::{EndCondition, RecurrencePatch, RuleUpdate, TemplatePatch};
use tassel_core::repository::{
    ItemRepository, PropagationRepository, Repository, RuleRepository,
};

pub async fn run(repo: &impl Repository, cmd: RuleCommand, today: NaiveDate) -> Result<()> {
    match cmd.command {
        RuleSubcommand::List => {
            let rules = repo.find_rules().await?;
            table::display_rules(&rules);
        }
        RuleSubcommand::Show(show) => {
            let id = resolve_rule_id(repo, &show.id).await?;
            let rule = repo
                .find_rule_by_id(id)
                .await?
                .ok_or_else(|| CoreError::NotFound(id.to_string()))?;
            println!(
                "{} ({}) — {}, {}, started {}",
                rule.template.title.bold(),
                rule.kind,
                rule.recurrence,
                rule.end,
                rule.start_date
            );
            let instances = repo.items_for_rule(rule.kind, rule.id).await?;
            table::display_items(&instances, today);
        }
        RuleSubcommand::Edit(edit) => {
            edit_rule(repo, edit, today).await?;
        }
        RuleSubcommand::Pause(pause) => {
            let id = resolve_rule_id(repo, &pause.id).await?;
            let rule = repo.set_rule_active(id, false).await?;
            println!("Paused rule {}.", format!("'{}'", rule.template.title).bold());
        }
        RuleSubcommand::Resume(resume) => {
            let id = resolve_rule_id(repo, &resume.id).await?;
            let rule = repo.set_rule_active(id, true).await?;
            println!(
                "Resumed rule {}; run `tassel sweep` to refill its window.",
                format!("'{}'", rule.template.title).bold()
            );
        }
        RuleSubcommand::Delete(delete) => {
            let id = resolve_rule_id(repo, &delete.id).await?;
            let rule = repo
                .find_rule_by_id(id)
                .await?
                .ok_or_else(|| CoreError::NotFound(id.to_string()))?;

            if !delete.force {
                let confirmed = Confirm::new()
                    .with_prompt(format!(
                        "Delete rule '{}' and its open future instances? Completed instances stay.",
                        rule.template.title
                    ))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    println!("Aborted.");
                    return Ok(());
                }
            }

            repo.delete_rule(id, today).await?;
            println!("Deleted rule {}.", format!("'{}'", rule.template.title).bold());
        }
    }
    Ok(())
}

/// Assembles the combined template + shape update and routes it through
/// the propagator in one call, so soft and destructive parts are applied
/// together.
async fn edit_rule(repo: &impl Repository, cmd: RuleEditCommand, today: NaiveDate) -> Result<()> {
    let id = resolve_rule_id(repo, &cmd.id).await?;

    let template = TemplatePatch {
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
        due_time: if cmd.at_clear {
            Some(None)
        } else {
            cmd.at
                .as_deref()
                .map(parser::parse_time)
                .transpose()?
                .map(Some)
        },
    };

    let recurrence = RecurrencePatch {
        recurrence: parser::build_recurrence(
            cmd.daily,
            cmd.weekly.as_deref(),
            cmd.monthly.as_deref(),
            cmd.every_days,
        )?,
        start_date: cmd.start.as_deref().map(parser::parse_date).transpose()?,
        end: if cmd.never {
            Some(EndCondition::Never)
        } else if cmd.until.is_some() || cmd.count.is_some() {
            Some(parser::build_end_condition(cmd.until.as_deref(), cmd.count)?)
        } else {
            None
        },
    };

    if template.is_empty() && recurrence.is_empty() {
        println!("Nothing to change.");
        return Ok(());
    }

    let update = RuleUpdate {
        template: (!template.is_empty()).then_some(template),
        recurrence: (!recurrence.is_empty()).then_some(recurrence),
    };

    let (rule, outcome) = repo.apply_rule_update(id, update, today).await?;
    println!(
        "Updated rule {}: {} instance(s) updated, {} discarded, {} regenerated.",
        format!("'{}'", rule.template.title).bold(),
        outcome.template_updated,
        outcome.discarded,
        outcome.regenerated
    );
    Ok(())
}
