//! Analysis commands.

use std::sync::Arc;

use console::style;

use crate::config::Settings;
use crate::orchestrator::AnalysisOrchestrator;
use crate::registry::{ModuleRegistry, RegistryError};
use crate::supervisor::RunError;

use super::super::helpers::{open_database, short_id};

/// Analyze one capture, or the latest capture of a source with `--source`.
pub async fn cmd_analyze(
    settings: &Settings,
    registry: Arc<ModuleRegistry>,
    scraped_data_id: Option<&str>,
    source_id: Option<&str>,
) -> anyhow::Result<()> {
    let db = open_database(settings)?;

    let target = match (scraped_data_id, source_id) {
        (Some(id), None) => id.to_string(),
        (None, Some(source_id)) => match db.scraped().latest_for_source(source_id)? {
            Some(capture) => capture.id,
            None => {
                println!(
                    "{} Source '{}' has no captures yet",
                    style("!").yellow(),
                    source_id
                );
                return Ok(());
            }
        },
        _ => {
            println!(
                "{} Pass a capture id, or --source for its latest capture",
                style("✗").red()
            );
            return Ok(());
        }
    };

    let orchestrator = AnalysisOrchestrator::new(db, registry);
    match orchestrator.run(&target).await {
        Ok(outcome) if outcome.success => {
            println!(
                "{} Derived {} record(s) from capture {}, job {}",
                style("✓").green(),
                outcome.items_produced,
                short_id(&target),
                short_id(&outcome.job_id)
            );
        }
        Ok(outcome) => {
            println!(
                "{} Analysis of capture {} failed: {}",
                style("✗").red(),
                short_id(&target),
                outcome.error.unwrap_or_default()
            );
            println!("  Inspect with 'harvest job show {}'", outcome.job_id);
        }
        // Not an error: capture-only modules simply have nothing to derive.
        Err(RunError::Registry(RegistryError::NoAnalyzer(module))) => {
            println!(
                "{} Module '{}' has no analyzer, skipped",
                style("!").yellow(),
                module
            );
        }
        Err(err) => {
            println!("{} {}", style("✗").red(), err);
        }
    }
    Ok(())
}
