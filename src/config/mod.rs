pub mod schema;
pub mod watcher;

use crate::error::{DeckError, Result};
use schema::{Config, KEY_COUNT};
use std::path::Path;
use tracing::info;

/// Load configuration from a JSON file, writing a starter config on first
/// run so the daemon always has a valid page set.
///
/// # Errors
/// Returns `DeckError::Io` on read/write errors, `DeckError::JsonParse` on
/// syntax errors, or `DeckError::Config` on validation failures.
pub fn load_or_init(path: &Path) -> Result<Config> {
    if !path.exists() {
        let config = Config::starter();
        save(path, &config)?;
        info!("wrote starter config to {}", path.display());
        return Ok(config);
    }
    load(path)
}

/// Load and validate configuration.
///
/// # Errors
/// Returns `DeckError::ConfigNotFound` if the file doesn't exist, plus the
/// same errors as [`load_or_init`].
pub fn load(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Err(DeckError::ConfigNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)?;
    let mut config: Config = serde_json::from_str(&content)?;

    validate(&config)?;
    // Tolerate a stale page index from an external edit.
    if config.current_page >= config.pages.len() {
        config.current_page = config.pages.len() - 1;
    }
    Ok(config)
}

/// Persist configuration as pretty-printed JSON (the UI edits it by hand
/// sometimes, so keep it readable).
///
/// # Errors
/// Returns `DeckError::Io` on write failure.
pub fn save(path: &Path, config: &Config) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Validate config constraints.
fn validate(config: &Config) -> Result<()> {
    if config.brightness > 100 {
        return Err(DeckError::Config("brightness must be 0-100".to_string()));
    }

    if config.pages.is_empty() {
        return Err(DeckError::Config(
            "config must contain at least one page".to_string(),
        ));
    }

    for page in &config.pages {
        for key in page.buttons.keys() {
            let valid = key
                .parse::<u8>()
                .is_ok_and(|k| (1..=KEY_COUNT).contains(&k));
            if !valid {
                return Err(DeckError::Config(format!(
                    "page '{}': key id '{key}' out of range (1-{KEY_COUNT})",
                    page.name
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_pages() {
        let config = Config {
            brightness: 50,
            current_page: 0,
            pages: vec![],
        };
        assert!(validate(&config).is_err());
    }

    #[test]
    fn rejects_out_of_range_key() {
        let mut config = Config::starter();
        config.pages[0]
            .buttons
            .insert("16".to_string(), schema::ButtonConfig::empty());
        assert!(validate(&config).is_err());
    }

    #[test]
    fn rejects_bad_brightness() {
        let mut config = Config::starter();
        config.brightness = 101;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = std::env::temp_dir().join("crtdeck-config-test");
        let path = dir.join("config.json");
        let _ = std::fs::remove_file(&path);

        let config = load_or_init(&path).unwrap();
        assert_eq!(config.pages.len(), 1);

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.brightness, config.brightness);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn stale_current_page_is_clamped() {
        let dir = std::env::temp_dir().join("crtdeck-clamp-test");
        let path = dir.join("config.json");
        let mut config = Config::starter();
        config.current_page = 9;
        save(&path, &config).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.current_page, 0);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
