use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;

mod cli;

use cli::Cli;
use cli::commands::{Commands, validate_name};
use stagehand::config::Config;
use stagehand::domain::Stage;
use stagehand::ops::{OpOutcome, OpRequest, Orchestrator};

fn setup_logging() -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stagehand")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("stagehand.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn parse_stage(value: &str) -> Result<Stage> {
    value
        .parse::<Stage>()
        .map_err(|e| eyre::eyre!("{}", e))
}

/// Print a dispatch outcome; errors become a nonzero exit.
fn finish(outcome: OpOutcome) -> Result<()> {
    match outcome {
        OpOutcome::Success(text) => {
            println!("{}", text);
            Ok(())
        }
        OpOutcome::Error(text) => {
            eprintln!("{} {}", "Error:".red(), text);
            eyre::bail!("operation failed")
        }
    }
}

async fn build_orchestrator(config: &Config) -> Result<Orchestrator> {
    let cwd = std::env::current_dir().context("Failed to resolve working directory")?;
    let (orchestrator, _events) = Orchestrator::bootstrap(&cwd, config.clone()).await?;
    Ok(orchestrator)
}

async fn handle_create(stage: &str, name: Option<String>, config: &Config) -> Result<()> {
    let orchestrator = build_orchestrator(config).await?;
    let name = match name {
        Some(name) => name,
        None => validate_name(orchestrator.worktrees().project_name())
            .map_err(|e| eyre::eyre!("project name is not usable for branches: {}", e))?,
    };

    let stages: Vec<Stage> = if stage == "all" {
        Stage::ALL.to_vec()
    } else {
        vec![parse_stage(stage)?]
    };

    // Batch semantics: one failed stage does not abort the rest
    let mut failures = 0;
    for stage in stages {
        info!("Creating worktree for stage: {}", stage);
        let outcome = orchestrator
            .dispatch(OpRequest::CreateWorktree { r#type: stage, name: name.clone() })
            .await;
        match outcome {
            OpOutcome::Success(text) => println!("{} {}", "Created:".green(), text),
            OpOutcome::Error(text) => {
                failures += 1;
                eprintln!("{} {}", "Failed:".red(), text);
            }
        }
    }

    if failures > 0 {
        eprintln!("{} {} worktree(s) failed", "Warning:".yellow(), failures);
    }
    Ok(())
}

async fn handle_spawn(worktree: &str, task: &str, command: Option<String>, config: &Config) -> Result<()> {
    let orchestrator = build_orchestrator(config).await?;
    let stage = parse_stage(worktree)?;

    println!("{} {} in {}", "Spawning:".cyan(), task, stage);
    finish(
        orchestrator
            .dispatch(OpRequest::SpawnAgent {
                worktree: stage,
                task: task.to_string(),
                command,
            })
            .await,
    )
}

async fn handle_status(config: &Config) -> Result<()> {
    let orchestrator = build_orchestrator(config).await?;
    finish(orchestrator.dispatch(OpRequest::GetStatus).await)
}

async fn handle_agents(agent_id: Option<String>, config: &Config) -> Result<()> {
    let orchestrator = build_orchestrator(config).await?;
    finish(orchestrator.dispatch(OpRequest::GetAgentStatus { agent_id }).await)
}

async fn handle_logs(agent_id: &str, lines: Option<usize>, config: &Config) -> Result<()> {
    let orchestrator = build_orchestrator(config).await?;
    finish(
        orchestrator
            .dispatch(OpRequest::GetAgentLogs {
                agent_id: agent_id.to_string(),
                lines,
            })
            .await,
    )
}

async fn handle_kill(agent_id: &str, config: &Config) -> Result<()> {
    let orchestrator = build_orchestrator(config).await?;
    println!("{} {}", "Killing:".red(), agent_id);
    finish(
        orchestrator
            .dispatch(OpRequest::KillAgent {
                agent_id: agent_id.to_string(),
            })
            .await,
    )
}

async fn handle_monitor(worktree: &str, since: Option<String>, config: &Config) -> Result<()> {
    let orchestrator = build_orchestrator(config).await?;
    let stage = parse_stage(worktree)?;
    finish(
        orchestrator
            .dispatch(OpRequest::MonitorProgress { worktree: stage, since })
            .await,
    )
}

async fn handle_integrate(source: &str, target: Option<String>, config: &Config) -> Result<()> {
    let orchestrator = build_orchestrator(config).await?;
    let stage = parse_stage(source)?;
    finish(
        orchestrator
            .dispatch(OpRequest::IntegrateChanges {
                source_worktree: stage,
                target_branch: target,
            })
            .await,
    )
}

async fn handle_cleanup(config: &Config) -> Result<()> {
    let orchestrator = build_orchestrator(config).await?;
    orchestrator.worktrees().remove_all().await?;
    println!("{}", "Removed all stage worktrees".green());
    Ok(())
}

async fn handle_watch(config: &Config) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to resolve working directory")?;
    let (orchestrator, events) = Orchestrator::bootstrap(&cwd, config.clone()).await?;

    let handle = orchestrator.watcher().start(events);
    println!(
        "{} project '{}' ({} worktrees root)",
        "Watching:".cyan(),
        orchestrator.worktrees().project_name(),
        orchestrator.worktrees().worktrees_root().display(),
    );
    println!("Press ctrl-c to stop");

    tokio::signal::ctrl_c().await.context("Failed to wait for ctrl-c")?;

    handle.shutdown();
    orchestrator.shutdown();
    println!("{}", "Stopped".yellow());
    Ok(())
}

async fn run_application(cli: Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.verbose {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match cli.command {
        Commands::Create { stage, name } => handle_create(&stage, name, config).await,
        Commands::Spawn { worktree, task, command } => {
            handle_spawn(&worktree, &task, command, config).await
        }
        Commands::Status => handle_status(config).await,
        Commands::Agents { agent_id } => handle_agents(agent_id, config).await,
        Commands::Logs { agent_id, lines } => handle_logs(&agent_id, lines, config).await,
        Commands::Kill { agent_id } => handle_kill(&agent_id, config).await,
        Commands::Monitor { worktree, since } => handle_monitor(&worktree, since, config).await,
        Commands::Integrate { source, target } => handle_integrate(&source, target, config).await,
        Commands::Cleanup => handle_cleanup(config).await,
        Commands::Watch => handle_watch(config).await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging first
    setup_logging().context("Failed to setup logging")?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(cli, &config).await.context("Application failed")?;

    Ok(())
}
