//! Scrape commands.

use std::sync::Arc;
use std::time::Duration;

use console::style;
use indicatif::ProgressBar;

use crate::config::Settings;
use crate::orchestrator::ScrapeOrchestrator;
use crate::registry::ModuleRegistry;
use crate::supervisor::{CancelToken, RunOptions};

use super::super::helpers::{open_database, short_id};

/// Scrape one source, or every active source with `--all`.
pub async fn cmd_scrape(
    settings: &Settings,
    registry: Arc<ModuleRegistry>,
    source_id: Option<&str>,
    all: bool,
    force: bool,
) -> anyhow::Result<()> {
    let db = open_database(settings)?;
    let orchestrator = ScrapeOrchestrator::new(db.clone(), registry);

    if all {
        // Automatic runs only ever see active sources.
        let sources = db.sources().get_active()?;
        if sources.is_empty() {
            println!("{} No active sources to scrape", style("!").yellow());
            return Ok(());
        }

        let bar = ProgressBar::new(sources.len() as u64);
        let mut succeeded = 0usize;
        let mut failed = 0usize;
        for (index, source) in sources.iter().enumerate() {
            bar.set_message(source.id.clone());
            match orchestrator.run(&source.id).await {
                Ok(outcome) if outcome.success => succeeded += 1,
                Ok(outcome) => {
                    failed += 1;
                    bar.println(format!(
                        "{} {}: {} (job {})",
                        style("✗").red(),
                        source.id,
                        outcome.error.unwrap_or_default(),
                        short_id(&outcome.job_id)
                    ));
                }
                Err(err) => {
                    failed += 1;
                    bar.println(format!("{} {}: {}", style("✗").red(), source.id, err));
                }
            }
            bar.inc(1);
            if index + 1 < sources.len() {
                tokio::time::sleep(settings.request_delay()).await;
            }
        }
        bar.finish_and_clear();

        println!(
            "{} Scraped {} source(s): {} succeeded, {} failed",
            style("✓").green(),
            sources.len(),
            succeeded,
            failed
        );
        return Ok(());
    }

    let Some(source_id) = source_id else {
        println!(
            "{} Pass a source id, or --all for every active source",
            style("✗").red()
        );
        return Ok(());
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_message(format!("Scraping {source_id}"));
    spinner.enable_steady_tick(Duration::from_millis(100));
    let result = orchestrator
        .run_with(source_id, RunOptions { force }, CancelToken::disabled())
        .await;
    spinner.finish_and_clear();

    match result {
        Ok(outcome) if outcome.success => {
            println!(
                "{} Scraped '{}': {} item(s), job {}",
                style("✓").green(),
                source_id,
                outcome.items_produced,
                short_id(&outcome.job_id)
            );
            if let Some(capture_id) = outcome.scraped_data_id {
                println!("  Capture: {capture_id}");
            }
        }
        Ok(outcome) => {
            println!(
                "{} Scrape of '{}' failed: {}",
                style("✗").red(),
                source_id,
                outcome.error.unwrap_or_default()
            );
            println!("  Inspect with 'harvest job show {}'", outcome.job_id);
        }
        Err(err) => {
            println!("{} {}", style("✗").red(), err);
        }
    }
    Ok(())
}
