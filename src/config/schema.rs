use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Number of physical keys on the SS-550 (3 rows of 5).
pub const KEY_COUNT: u8 = 15;

/// Background color of an unconfigured key.
pub const DEFAULT_COLOR: &str = "#1a1a2e";

/// Root configuration. This JSON schema is the contract shared with the
/// configuration UI, which reads and writes the same file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Display brightness 0-100.
    pub brightness: u8,

    /// Index of the active page.
    #[serde(rename = "currentPage")]
    pub current_page: usize,

    /// Ordered pages; never empty.
    pub pages: Vec<Page>,
}

/// A named full set of key configurations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub name: String,

    /// Key id ("1".."15") -> button. Missing keys render blank.
    #[serde(default)]
    pub buttons: HashMap<String, ButtonConfig>,
}

/// A single key definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ButtonConfig {
    #[serde(default)]
    pub label: String,

    /// Sigil grammar or free-form shell command. See [`crate::command`].
    #[serde(default)]
    pub command: String,

    /// Hex background color, e.g. "#1a1a2e".
    #[serde(default = "default_color")]
    pub color: String,

    /// Icon file name relative to the icons directory, or empty.
    #[serde(default)]
    pub icon: String,
}

impl ButtonConfig {
    pub fn empty() -> Self {
        Self {
            label: String::new(),
            command: String::new(),
            color: DEFAULT_COLOR.to_string(),
            icon: String::new(),
        }
    }

    /// Keys with nothing to show are skipped at page upload.
    pub fn is_blank(&self) -> bool {
        self.label.is_empty()
            && self.command.is_empty()
            && self.icon.is_empty()
            && self.color == DEFAULT_COLOR
    }
}

impl Page {
    /// A page with every key present but empty.
    pub fn empty(name: &str) -> Self {
        let buttons = (1..=KEY_COUNT)
            .map(|i| (i.to_string(), ButtonConfig::empty()))
            .collect();
        Self {
            name: name.to_string(),
            buttons,
        }
    }

    pub fn button(&self, key: u8) -> Option<&ButtonConfig> {
        self.buttons.get(&key.to_string())
    }
}

impl Config {
    /// First-run config: one page, a next-page button on key 5.
    pub fn starter() -> Self {
        let mut page = Page::empty("Main");
        page.buttons.insert(
            "5".to_string(),
            ButtonConfig {
                label: ">>".to_string(),
                command: "__NEXT_PAGE__".to_string(),
                color: "#e94560".to_string(),
                icon: String::new(),
            },
        );
        Self {
            brightness: 50,
            current_page: 0,
            pages: vec![page],
        }
    }

    pub fn active_page(&self) -> &Page {
        // current_page is clamped at load and on every mutation.
        &self.pages[self.current_page.min(self.pages.len() - 1)]
    }
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let json = r#"{
            "brightness": 70,
            "currentPage": 0,
            "pages": [{"name": "Main", "buttons": {}}]
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.brightness, 70);
        assert_eq!(config.pages.len(), 1);
        assert!(config.pages[0].button(1).is_none());
    }

    #[test]
    fn parse_button_defaults() {
        let json = r#"{
            "brightness": 50,
            "currentPage": 0,
            "pages": [{"name": "Main", "buttons": {"3": {"command": "firefox"}}}]
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        let btn = config.pages[0].button(3).unwrap();
        assert_eq!(btn.command, "firefox");
        assert_eq!(btn.color, DEFAULT_COLOR);
        assert!(btn.label.is_empty());
    }

    #[test]
    fn current_page_round_trips_camel_case() {
        let mut config = Config::starter();
        config.current_page = 2;
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["currentPage"], 2);
    }

    #[test]
    fn starter_config_is_valid() {
        let config = Config::starter();
        assert_eq!(config.pages.len(), 1);
        assert_eq!(config.pages[0].buttons.len(), usize::from(KEY_COUNT));
        assert_eq!(config.pages[0].button(5).unwrap().command, "__NEXT_PAGE__");
        assert!(!config.pages[0].button(5).unwrap().is_blank());
        assert!(config.pages[0].button(1).unwrap().is_blank());
    }
}
