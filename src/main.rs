//! recipe - run declarative API test recipes
//!
//! Recipes run in process, or on a remote execution service when
//! `TESTSERVER_ENDPOINT` (or the `testserver.endpoint` property) is set.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use recipe::cli::{self, Context};
use recipe::codec::TagPolicy;
use recipe::commands::Commands;
use recipe::common::config::{Config, Properties, Settings};
use recipe::common::{logging, Result};
use recipe::execution::ExecutionRouter;

#[derive(Parser)]
#[command(name = "recipe", about = "Declarative API test recipe runner")]
#[command(version, long_about = None)]
struct Cli {
    /// Set a process property (repeatable), e.g. -D testserver.endpoint=http://host:8080
    #[arg(long = "property", short = 'D', global = true, value_name = "KEY=VALUE")]
    properties: Vec<String>,

    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Keep records with unregistered type tags instead of rejecting them
    #[arg(long, global = true)]
    allow_plugins: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

fn build_context(cli: &Cli) -> Result<Context> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let properties = Properties::from_map(config.properties.clone());
    for assignment in &cli.properties {
        let (key, value) = Properties::parse_assignment(assignment)?;
        properties.set(key, value);
    }

    let settings = Settings::from_process(Arc::new(properties));
    let router = ExecutionRouter::new(&config, settings);
    let policy = TagPolicy::from_allow_plugins(cli.allow_plugins || config.codec.allow_plugins);

    Ok(Context {
        config,
        router,
        policy,
    })
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match &cli.log_file {
        Some(path) => {
            logging::init_file(path);
        }
        None => logging::init_cli(),
    }

    let result = match build_context(&cli) {
        Ok(ctx) => cli::dispatch(cli.command, &ctx).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            let category = e.category();
            eprintln!("Error [{}]: {e}", category.code());
            std::process::exit(category.exit_code());
        }
    }
}
