//! Registered module listing.

use console::style;

use crate::config::Settings;
use crate::registry::ModuleRegistry;

use super::super::helpers::open_database;

/// List registered modules with their source bindings.
pub async fn cmd_modules(settings: &Settings, registry: &ModuleRegistry) -> anyhow::Result<()> {
    let names = registry.names();
    if names.is_empty() {
        println!("{} No modules registered", style("!").yellow());
        return Ok(());
    }

    // Source counts are best-effort: the registry is useful before init.
    let db = open_database(settings).ok();

    println!("\n{}", style("Modules").bold());
    println!("{}", "-".repeat(60));
    println!("{:<20} {:<10} {:<9} Active", "Name", "Analyzer", "Sources");
    println!("{}", "-".repeat(60));

    for name in names {
        let analyzer = if registry.has_analyzer(&name) { "yes" } else { "no" };
        let (bound, active) = match &db {
            Some(db) => {
                let sources = db.sources();
                (
                    sources.count_for_module(&name)?.to_string(),
                    if sources.any_active_for_module(&name)? {
                        "yes"
                    } else {
                        "no"
                    }
                    .to_string(),
                )
            }
            None => ("-".to_string(), "-".to_string()),
        };
        println!("{:<20} {:<10} {:<9} {}", name, analyzer, bound, active);
    }

    Ok(())
}
