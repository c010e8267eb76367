//! CLI command handling
//!
//! Dispatches CLI commands to the library and formats output.

use colored::Colorize;
use std::path::Path;
use std::sync::Arc;

use crate::codec::{Format, RecipeCodec, TagPolicy};
use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::execution::local::LocalExecutor;
use crate::execution::{validate_recipe, ExecutionRouter, RecipeExecutor};
use crate::model::{AssertionStatus, ProjectResultReport, Recipe};
use crate::registry::TypeRegistry;

/// Everything a command needs, built once in `main`
pub struct Context {
    pub config: Config,
    pub router: ExecutionRouter,
    pub policy: TagPolicy,
}

impl Context {
    fn codec(&self) -> RecipeCodec<'static> {
        RecipeCodec::standard().with_policy(self.policy)
    }

    fn load(&self, path: &Path) -> Result<Recipe> {
        let recipe = self.codec().load(path)?;
        tracing::debug!(path = %path.display(), steps = recipe.test_steps.len(), "Loaded recipe");
        Ok(recipe)
    }
}

/// Dispatch a CLI command, returning the process exit code
pub async fn dispatch(command: Commands, ctx: &Context) -> Result<i32> {
    match command {
        Commands::Run {
            recipe,
            report,
            local,
        } => {
            let loaded = ctx.load(&recipe)?;
            let executor: Arc<dyn RecipeExecutor> = if local {
                Arc::new(LocalExecutor::from_config(&ctx.config.local))
            } else {
                ctx.router.backend()
            };

            println!(
                "\n{} {} {}",
                "Running Recipe:".blue().bold(),
                loaded
                    .name
                    .as_deref()
                    .unwrap_or_else(|| file_label(&recipe))
                    .white()
                    .bold(),
                format!("[{}]", executor.backend_kind()).dimmed()
            );

            let result = executor.execute(&loaded).await?;
            print_report(&result);

            if let Some(path) = report {
                let json = serde_json::to_string_pretty(&result)?;
                std::fs::write(&path, json)?;
                println!("  Report written to {}", path.display());
            }

            Ok(if result.is_success() { 0 } else { 1 })
        }

        Commands::Validate { recipe } => {
            let loaded = ctx.load(&recipe)?;
            validate_recipe(&loaded)?;

            let assertions: usize = loaded.test_steps.iter().map(|s| s.assertions().len()).sum();
            let plugins = loaded
                .test_steps
                .iter()
                .map(|s| {
                    usize::from(s.is_plugin())
                        + s.assertions().iter().filter(|a| a.is_plugin()).count()
                })
                .sum::<usize>();

            println!(
                "{} {}: {} step(s), {} assertion(s)",
                "✓".green(),
                file_label(&recipe),
                loaded.test_steps.len(),
                assertions
            );
            if plugins > 0 {
                println!(
                    "  {} {} record(s) with unregistered types kept as plugins",
                    "!".yellow(),
                    plugins
                );
            }
            Ok(0)
        }

        Commands::Convert { recipe, to, output } => {
            let loaded = ctx.load(&recipe)?;
            let text = ctx.codec().encode(&loaded, Format::from(to))?;
            match output {
                Some(path) => {
                    std::fs::write(&path, text).map_err(|e| Error::FileRead {
                        path: path.display().to_string(),
                        error: e.to_string(),
                    })?;
                    println!("Wrote {}", path.display());
                }
                None => print!("{}", text),
            }
            Ok(0)
        }

        Commands::Tags => {
            let registry = TypeRegistry::global();
            println!("{}", "Step types:".bold());
            for tag in registry.step_tags() {
                println!("  {}", tag);
            }
            println!("{}", "Assertion types:".bold());
            for tag in registry.assertion_tags() {
                println!("  {}", tag);
            }
            Ok(0)
        }

        Commands::Backend => {
            println!("{}", ctx.router.backend_kind());
            Ok(0)
        }
    }
}

fn file_label(path: &Path) -> &str {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or("recipe")
}

fn print_report(report: &ProjectResultReport) {
    for case in report.case_reports() {
        for step in &case.test_step_result_reports {
            let mark = match step.assertion_status {
                AssertionStatus::Ok => "✓".green(),
                AssertionStatus::Failed => "✗".red(),
                AssertionStatus::Unknown => "?".yellow(),
            };
            println!(
                "  {} {} {}",
                mark,
                step.test_step_name,
                format!("({} ms)", step.time_taken).dimmed()
            );
            for message in &step.messages {
                println!("      {}", message.dimmed());
            }
            for assertion in &step.assertion_results {
                if assertion.status == AssertionStatus::Ok {
                    continue;
                }
                let label = assertion.name.as_deref().unwrap_or(&assertion.tag);
                match &assertion.message {
                    Some(message) => println!("      {} {}: {}", "✗".red(), label, message),
                    None => println!("      {} {}", "✗".red(), label),
                }
            }
        }
    }

    for message in &report.messages {
        println!("  {}", message.dimmed());
    }

    let status = report.status.as_str();
    if report.is_success() {
        println!("\n{} {}", "✓".green().bold(), status.green().bold());
    } else {
        println!("\n{} {}", "✗".red().bold(), status.red().bold());
    }
}
