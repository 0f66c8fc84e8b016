//! Shared helper functions for CLI commands.

use crate::config::Settings;
use crate::repository::Database;

/// Truncate a string for table display.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}

/// Short id prefix for table display.
pub fn short_id(id: &str) -> &str {
    &id[..id.len().min(8)]
}

/// Open the database, requiring `harvest init` to have run.
pub fn open_database(settings: &Settings) -> anyhow::Result<Database> {
    if !settings.data_dir.exists() {
        anyhow::bail!(
            "data directory {} does not exist. Run 'harvest init' first.",
            settings.data_dir.display()
        );
    }
    Ok(Database::open(&settings.database_path())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_strings() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("abcdef", 4), "abc…");
    }

    #[test]
    fn short_id_handles_short_input() {
        assert_eq!(short_id("abcd"), "abcd");
        assert_eq!(short_id("0123456789"), "01234567");
    }
}
