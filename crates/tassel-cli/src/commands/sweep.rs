use anyhow::Result;
use chrono::NaiveDate;
use owo_colors::OwoColorize;
use tassel_core::repository::{GenerationRepository, Repository};

pub async fn run(repo: &impl Repository, today: NaiveDate) -> Result<()> {
    let summary = repo.sweep(today).await?;
    println!(
        "Swept {} rule(s): {} instance(s) created, {} exhausted.",
        summary.rules_processed, summary.instances_created, summary.rules_exhausted
    );
    for error in &summary.errors {
        eprintln!("{} {}", "Warning:".yellow().bold(), error);
    }
    Ok(())
}
