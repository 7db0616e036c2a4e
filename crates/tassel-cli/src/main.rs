use clap::Parser;
use owo_colors::OwoColorize;
use tassel_core::db;
use tassel_core::error::CoreError;
use tassel_core::repository::SqliteRepository;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;
mod parser;
mod util;
mod views;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = config::Config::new().unwrap_or_default();
    let db_pool = match db::establish_connection(&config.database_path).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };
    let repository = SqliteRepository::new(db_pool, config.generation.clone().into());

    let cli = cli::Cli::parse();
    let today = chrono::Utc::now().date_naive();

    let result = match cli.command {
        cli::Commands::Add(command) => commands::add::run(&repository, command, today).await,
        cli::Commands::List(command) => commands::list::run(&repository, command, today).await,
        cli::Commands::Done(command) => commands::done::run(&repository, command).await,
        cli::Commands::Edit(command) => commands::edit::run(&repository, command).await,
        cli::Commands::Delete(command) => commands::delete::run(&repository, command).await,
        cli::Commands::Rule(command) => commands::rules::run(&repository, command, today).await,
        cli::Commands::Sweep => commands::sweep::run(&repository, today).await,
    };

    if let Err(e) = result {
        handle_error(e);
    }
}

fn handle_error(e: anyhow::Error) {
    if let Some(CoreError::AmbiguousId(matches)) = e.downcast_ref::<CoreError>() {
        eprintln!("{} Ambiguous short ID. Did you mean one of these?", "Error:".red().bold());
        for (id, title) in matches {
            eprintln!("  {}  {}", &id[..8], title);
        }
    } else {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
    }
    std::process::exit(1);
}
