//! Initialize command.

use console::style;

use crate::config::Settings;
use crate::repository::Database;

/// Create the data directory and database.
pub async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    std::fs::create_dir_all(&settings.data_dir)?;
    let db = Database::open(&settings.database_path())?;

    println!(
        "{} Initialized data directory {}",
        style("✓").green(),
        settings.data_dir.display()
    );
    println!("  Database: {}", db.path().display());
    println!(
        "\nNext: add a source with 'harvest source add <id> --name <name> --url <url> --module <module>'"
    );
    Ok(())
}
