//! Source management commands.

use console::style;
use url::Url;

use crate::config::Settings;
use crate::models::Source;
use crate::registry::ModuleRegistry;

use super::super::helpers::{open_database, short_id, truncate};

/// Add a new source bound to a registered module.
pub async fn cmd_source_add(
    settings: &Settings,
    registry: &ModuleRegistry,
    id: &str,
    name: &str,
    url: &str,
    module: &str,
    options: &[String],
) -> anyhow::Result<()> {
    let db = open_database(settings)?;
    let sources = db.sources();

    if sources.exists(id)? {
        println!("{} Source '{}' already exists", style("✗").red(), id);
        return Ok(());
    }
    if Url::parse(url).is_err() {
        println!("{} Invalid URL: {}", style("✗").red(), url);
        return Ok(());
    }
    if !registry.contains(module) {
        println!(
            "{} Unknown module '{}'. Registered modules: {}",
            style("✗").red(),
            module,
            registry.names().join(", ")
        );
        return Ok(());
    }

    let mut source = Source::new(id.into(), name.into(), url.into(), module.into());
    if !options.is_empty() {
        let mut config = serde_json::Map::new();
        for option in options {
            let Some((key, value)) = option.split_once('=') else {
                println!("{} Option '{}' is not KEY=VALUE", style("✗").red(), option);
                return Ok(());
            };
            // Values parse as JSON where possible, otherwise stay strings.
            let value = serde_json::from_str(value)
                .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
            config.insert(key.to_string(), value);
        }
        source.config = serde_json::Value::Object(config);
    }

    sources.save(&source)?;
    println!(
        "{} Added source '{}' handled by module '{}'",
        style("✓").green(),
        id,
        module
    );
    Ok(())
}

/// List configured sources.
pub async fn cmd_source_list(settings: &Settings) -> anyhow::Result<()> {
    let db = open_database(settings)?;
    let sources = db.sources().get_all()?;

    if sources.is_empty() {
        println!(
            "{} No sources configured. Run 'harvest source add' first.",
            style("!").yellow()
        );
        return Ok(());
    }

    println!("\n{}", style("Sources").bold());
    println!("{}", "-".repeat(78));
    println!(
        "{:<15} {:<22} {:<16} {:<8} Last Scraped",
        "ID", "Name", "Module", "Active"
    );
    println!("{}", "-".repeat(78));

    for source in sources {
        let last_scraped = source
            .last_scraped
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "Never".to_string());

        println!(
            "{:<15} {:<22} {:<16} {:<8} {}",
            source.id,
            truncate(&source.name, 21),
            truncate(&source.module, 15),
            if source.active { "yes" } else { "no" },
            last_scraped
        );
    }

    Ok(())
}

/// Show one source with capture counts and recent jobs.
pub async fn cmd_source_show(settings: &Settings, id: &str) -> anyhow::Result<()> {
    let db = open_database(settings)?;
    let Some(source) = db.sources().get(id)? else {
        println!("{} Source '{}' not found", style("✗").red(), id);
        return Ok(());
    };

    println!("\n{}", style(&source.name).bold());
    println!("  ID:       {}", source.id);
    println!("  URL:      {}", source.url);
    println!("  Module:   {}", source.module);
    println!("  Active:   {}", if source.active { "yes" } else { "no" });
    if source.config.as_object().is_some_and(|o| !o.is_empty()) {
        println!("  Config:   {}", source.config);
    }
    println!(
        "  Captures: {}",
        db.scraped().count_for_source(&source.id)?
    );

    let jobs = db.jobs().for_source(&source.id)?;
    if !jobs.is_empty() {
        println!("\n  Recent jobs:");
        for job in jobs.iter().take(5) {
            println!(
                "    {} {:<8} {:<10} {} items{}",
                short_id(&job.id),
                job.job_type.as_str(),
                job.status.as_str(),
                job.items_produced,
                job.error
                    .as_deref()
                    .map(|e| format!("  ({})", truncate(e, 40)))
                    .unwrap_or_default()
            );
        }
    }

    Ok(())
}

/// Soft-activate or deactivate a source. History always stays.
pub async fn cmd_source_set_active(
    settings: &Settings,
    id: &str,
    active: bool,
) -> anyhow::Result<()> {
    let db = open_database(settings)?;
    if !db.sources().set_active(id, active)? {
        println!("{} Source '{}' not found", style("✗").red(), id);
        return Ok(());
    }

    if active {
        println!("{} Source '{}' enabled", style("✓").green(), id);
    } else {
        println!(
            "{} Source '{}' disabled. Captures and jobs are kept; use --force to scrape anyway.",
            style("✓").green(),
            id
        );
    }
    Ok(())
}
