//! Handoff agent - Main entry point

use clap::Parser;
use colored::Colorize;
use handoff_agent::config::resolve;
use handoff_agent::naming::RunInstant;
use handoff_agent::{AgentError, Cli, Configuration, Pipeline};
use handoff_common::logging::{init_logging, LogConfig, LogLevel};
use std::process;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // .env first, so env-backed flags see its values
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Normal mode: warnings and errors only
    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Warn
    };
    let log_config = LogConfig::for_binary("handoff").with_level(level);
    let log_config = log_config.clone().with_env_overrides().unwrap_or(log_config);

    // The agent still works without logging
    let guard = init_logging(&log_config).ok().flatten();

    let result = execute(&cli).await;

    if let Err(e) = result {
        error!(error = %e, category = e.category(), "Run failed");
        report(&e);
        drop(guard);
        process::exit(1);
    }
}

async fn execute(cli: &Cli) -> handoff_agent::Result<()> {
    let defaults = cli.defaults()?;
    let config = resolve(&cli.overrides(), &defaults)?;

    if cli.check {
        print_summary(&config);
        return Ok(());
    }

    let report = Pipeline::new(&config)?
        .run(&config, RunInstant::now())
        .await?;
    info!(
        uploaded = report.uploaded.len(),
        log_url = report.log_url.as_deref().unwrap_or("-"),
        "Run finished"
    );
    Ok(())
}

fn print_summary(config: &Configuration) {
    println!("{}", "Configuration is valid".green().bold());
    for (label, value) in config.summary() {
        println!("  {:<18} {}", format!("{label}:").cyan(), value);
    }
    if config.upload_plan().is_none() {
        println!("  {}", "Nothing will be uploaded".yellow());
    }
}

fn report(e: &AgentError) {
    match e {
        AgentError::InvalidConfiguration(errors) => {
            for field in errors.iter() {
                eprintln!("Error: {}", field.message);
            }
        }
        other => eprintln!("Error: {}", other),
    }
}
