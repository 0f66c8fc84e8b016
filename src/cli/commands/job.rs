//! Job inspection commands.

use console::style;

use crate::config::Settings;
use crate::models::JobStatus;

use super::super::helpers::{open_database, short_id, truncate};

fn styled_status(status: JobStatus) -> String {
    match status {
        JobStatus::Completed => style("completed").green().to_string(),
        JobStatus::Failed => style("failed").red().to_string(),
        JobStatus::Running => style("running").cyan().to_string(),
        JobStatus::Pending => style("pending").dim().to_string(),
    }
}

/// List recent jobs.
pub async fn cmd_job_list(settings: &Settings, limit: usize) -> anyhow::Result<()> {
    let db = open_database(settings)?;
    let jobs = db.jobs().recent(limit)?;

    if jobs.is_empty() {
        println!("{} No jobs recorded yet", style("!").yellow());
        return Ok(());
    }

    println!("\n{}", style("Jobs").bold());
    println!("{}", "-".repeat(86));
    println!(
        "{:<10} {:<8} {:<15} {:<10} {:>6}  Started",
        "ID", "Type", "Source", "Status", "Items"
    );
    println!("{}", "-".repeat(86));

    for job in jobs {
        let started = job
            .started_at
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<10} {:<8} {:<15} {:<10} {:>6}  {}",
            short_id(&job.id),
            job.job_type.as_str(),
            truncate(&job.source_id, 14),
            styled_status(job.status),
            job.items_produced,
            started
        );
    }

    Ok(())
}

/// Show one job in full.
pub async fn cmd_job_show(settings: &Settings, id: &str) -> anyhow::Result<()> {
    let db = open_database(settings)?;
    let Some(job) = db.jobs().get(id)? else {
        println!("{} Job '{}' not found", style("✗").red(), id);
        return Ok(());
    };

    println!("\n{}", style(format!("Job {}", job.id)).bold());
    println!("  Type:     {}", job.job_type.as_str());
    println!("  Source:   {}", job.source_id);
    println!("  Module:   {}", job.module);
    println!("  Status:   {}", styled_status(job.status));
    println!("  Created:  {}", job.created_at.format("%Y-%m-%d %H:%M:%S"));
    if let Some(started) = job.started_at {
        println!("  Started:  {}", started.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(finished) = job.finished_at {
        println!("  Finished: {}", finished.format("%Y-%m-%d %H:%M:%S"));
        if let Some(started) = job.started_at {
            let elapsed = finished - started;
            println!("  Duration: {}.{:03}s", elapsed.num_seconds(), elapsed.num_milliseconds() % 1000);
        }
    }
    println!("  Items:    {}", job.items_produced);
    if let Some(error) = &job.error {
        println!("  Error:    {}", style(error).red());
    }

    Ok(())
}
