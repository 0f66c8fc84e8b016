//! Capture inspection and retention commands.

use chrono::{Duration, Utc};
use console::style;

use crate::config::Settings;

use super::super::helpers::{open_database, short_id, truncate};

/// List captures for a source, newest first.
pub async fn cmd_data_list(settings: &Settings, source_id: &str) -> anyhow::Result<()> {
    let db = open_database(settings)?;
    if !db.sources().exists(source_id)? {
        println!("{} Source '{}' not found", style("✗").red(), source_id);
        return Ok(());
    }

    let captures = db.scraped().for_source(source_id)?;
    if captures.is_empty() {
        println!("{} No captures for '{}'", style("!").yellow(), source_id);
        return Ok(());
    }

    println!("\n{}", style(format!("Captures for {source_id}")).bold());
    println!("{}", "-".repeat(78));
    println!(
        "{:<38} {:<20} {:>6} {:>9}  Records",
        "ID", "Fetched", "HTTP", "Bytes"
    );
    println!("{}", "-".repeat(78));

    let processed = db.processed();
    for capture in captures {
        let records = processed.count_for_scraped(&capture.id)?;
        println!(
            "{:<38} {:<20} {:>6} {:>9}  {}",
            capture.id,
            capture.fetched_at.format("%Y-%m-%d %H:%M:%S"),
            capture
                .status_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string()),
            capture.payload.len(),
            records
        );
    }

    Ok(())
}

/// Show one capture and its derived records.
pub async fn cmd_data_show(settings: &Settings, scraped_data_id: &str) -> anyhow::Result<()> {
    let db = open_database(settings)?;
    let Some(capture) = db.scraped().get(scraped_data_id)? else {
        println!("{} Capture '{}' not found", style("✗").red(), scraped_data_id);
        return Ok(());
    };

    println!("\n{}", style(format!("Capture {}", capture.id)).bold());
    println!("  Source:  {}", capture.source_id);
    println!("  URL:     {}", capture.url);
    println!("  Fetched: {}", capture.fetched_at.format("%Y-%m-%d %H:%M:%S"));
    if let Some(status) = capture.status_code {
        println!("  HTTP:    {status}");
    }
    println!("  Bytes:   {}", capture.payload.len());
    println!("  SHA-256: {}", capture.content_hash);

    let records = db.processed().for_scraped(&capture.id)?;
    if records.is_empty() {
        println!("\n  No derived records. Run 'harvest analyze {}'", capture.id);
        return Ok(());
    }

    println!("\n  {} derived record(s):", records.len());
    for record in records {
        let score = record
            .score
            .map(|s| format!(" [score {s:.2}]"))
            .unwrap_or_default();
        println!(
            "    {} {}{}",
            short_id(&record.id),
            style(truncate(&record.title, 40)).bold(),
            score
        );
        if !record.body.is_empty() {
            println!("      {}", truncate(&record.body, 70));
        }
    }

    Ok(())
}

/// Delete captures older than the retention window. Explicit only; nothing
/// ever purges automatically.
pub async fn cmd_purge(
    settings: &Settings,
    source_id: &str,
    keep_days: i64,
    confirm: bool,
) -> anyhow::Result<()> {
    use std::io::{self, Write};

    let db = open_database(settings)?;
    if !db.sources().exists(source_id)? {
        println!("{} Source '{}' not found", style("✗").red(), source_id);
        return Ok(());
    }

    let cutoff = Utc::now() - Duration::days(keep_days);
    let total = db.scraped().count_for_source(source_id)?;

    println!(
        "\n{} Purge captures of '{}' older than {} day(s)",
        style("→").cyan(),
        style(source_id).yellow(),
        keep_days
    );
    println!("  Captures held: {total}");
    println!("  Derived records fall with their capture.");

    if !confirm {
        print!("\nProceed? [y/N] ");
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("{} Cancelled", style("!").yellow());
            return Ok(());
        }
    }

    let removed = db.scraped().purge_older_than(source_id, cutoff)?;
    println!(
        "{} Removed {} capture(s); {} kept",
        style("✓").green(),
        removed,
        total - removed
    );
    Ok(())
}
