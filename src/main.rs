// src/main.rs

mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use installorder::{
    load_config, load_scenario, KeepResolver, OrderResult, PackageManager, RecordingInstaller,
};
use tracing::info;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber for logging
    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let path = cli.command.scenario();
    info!("Loading scenario: {}", path.display());
    let mut scenario = load_scenario(path)
        .with_context(|| format!("failed to load scenario {}", path.display()))?;

    let policy = cli.command.policy();
    if let Some(config_path) = &policy.config {
        scenario.config = load_config(config_path)
            .with_context(|| format!("failed to load config {}", config_path.display()))?;
    }
    policy.apply(&mut scenario.config, cli.debug);

    match &cli.command {
        Commands::Config { .. } => {
            print!("{}", scenario.config.to_toml()?);
        }
        Commands::Archives { .. } => {
            let mut pm = scenario.into_manager(RecordingInstaller::new());
            let requests = pm.archive_requests()?;
            let graph = pm.cache().graph().clone();
            for request in requests {
                let name = graph.package(request.package).full_name();
                let version = &graph.version(request.version).version;
                match pm.archive(request.package) {
                    Some(path) if !pm.is_missing(request.package) => {
                        println!("{} {} {}", name, version, path.display());
                    }
                    _ => println!("{} {} (missing)", name, version),
                }
            }
        }
        Commands::Order { .. } => {
            let mut pm = scenario.into_manager(RecordingInstaller::new());
            let result = pm.order_install();
            report(&pm, &result);
            if let OrderResult::Failed(err) = result {
                bail!("transaction failed: {}", err);
            }
        }
        Commands::FixMissing { .. } => {
            let mut pm = scenario.into_manager(RecordingInstaller::new());
            let mut resolver = KeepResolver::new();
            let fixed = pm.fix_missing(&mut resolver);
            let graph = pm.cache().graph().clone();
            for &pkg in resolver.kept() {
                println!("kept {}", graph.package(pkg).full_name());
            }
            if !fixed {
                bail!("cache is still broken after keeping packages with missing archives");
            }

            let result = pm.order_install();
            report(&pm, &result);
            if let OrderResult::Failed(err) = result {
                bail!("transaction failed: {}", err);
            }
        }
    }

    Ok(())
}

/// Print the operations performed and the outcome
fn report(pm: &PackageManager<RecordingInstaller>, result: &OrderResult) {
    for (i, op) in pm.installer().operations().iter().enumerate() {
        println!("{:>3}. {}", i + 1, op);
    }
    println!("Result: {}", result.as_str());
}
