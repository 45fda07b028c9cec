//! Keystroke and text injection via `xdotool`.
//!
//! Combos are validated against a fixed vocabulary before anything is sent;
//! one unknown token rejects the whole combo so a partial keystroke is never
//! injected.

use crate::error::{DeckError, Result};

const MODIFIERS: &[&str] = &["ctrl", "shift", "alt", "super"];

/// A validated `modifiers + key` combination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCombo {
    /// xdotool modifier names, in the order given.
    pub modifiers: Vec<String>,
    /// xdotool keysym for the final key.
    pub key: String,
}

impl KeyCombo {
    /// The `xdotool key` argument, e.g. `ctrl+shift+s`.
    pub fn to_xdotool(&self) -> String {
        let mut parts = self.modifiers.clone();
        parts.push(self.key.clone());
        parts.join("+")
    }
}

/// Parse a `+`-joined combo like `ctrl+shift+s`.
///
/// # Errors
/// Returns `DeckError::KeyCombo` naming the first unrecognized token, or a
/// combo that ends in a modifier instead of a key.
pub fn parse_combo(raw: &str) -> Result<KeyCombo> {
    let tokens: Vec<&str> = raw.split('+').collect();
    let bad = |token: &str| DeckError::KeyCombo {
        combo: raw.to_string(),
        token: token.to_string(),
    };

    let (&key_token, modifier_tokens) = tokens.split_last().ok_or_else(|| bad(raw))?;

    let mut modifiers = Vec::with_capacity(modifier_tokens.len());
    for &token in modifier_tokens {
        if !MODIFIERS.contains(&token) {
            return Err(bad(token));
        }
        modifiers.push(token.to_string());
    }

    let key = keysym(key_token).ok_or_else(|| bad(key_token))?;
    Ok(KeyCombo { modifiers, key })
}

/// Inject a validated combo.
///
/// # Errors
/// `DeckError::Inject` when xdotool cannot be spawned or reports failure.
pub async fn send_combo(combo: &KeyCombo) -> Result<()> {
    run_xdotool(&["key", &combo.to_xdotool()]).await
}

/// Type a text string verbatim.
///
/// # Errors
/// `DeckError::Inject` when xdotool cannot be spawned or reports failure.
pub async fn type_text(text: &str) -> Result<()> {
    run_xdotool(&["type", "--delay", "12", "--", text]).await
}

async fn run_xdotool(args: &[&str]) -> Result<()> {
    let status = tokio::process::Command::new("xdotool")
        .args(args)
        .status()
        .await
        .map_err(|e| DeckError::Inject(format!("xdotool spawn failed: {e}")))?;

    if status.success() {
        Ok(())
    } else {
        Err(DeckError::Inject(format!("xdotool exited with {status}")))
    }
}

/// Map a key token from the recognized vocabulary to its xdotool keysym.
fn keysym(token: &str) -> Option<String> {
    // Single letters and digits pass through as-is.
    if token.len() == 1 {
        let ch = token.chars().next()?;
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            return Some(token.to_string());
        }
        return None;
    }

    // Function keys f1-f12.
    if let Some(n) = token.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
        if (1..=12).contains(&n) {
            return Some(format!("F{n}"));
        }
        return None;
    }

    let sym = match token {
        "up" => "Up",
        "down" => "Down",
        "left" => "Left",
        "right" => "Right",
        "home" => "Home",
        "end" => "End",
        "pageup" => "Page_Up",
        "pagedown" => "Page_Down",
        "enter" => "Return",
        "tab" => "Tab",
        "space" => "space",
        "esc" => "Escape",
        "backspace" => "BackSpace",
        "delete" => "Delete",
        "insert" => "Insert",
        "volumeup" => "XF86AudioRaiseVolume",
        "volumedown" => "XF86AudioLowerVolume",
        "mute" => "XF86AudioMute",
        "playpause" => "XF86AudioPlay",
        "next" => "XF86AudioNext",
        "prev" => "XF86AudioPrev",
        "kpenter" => "KP_Enter",
        "kpplus" => "KP_Add",
        "kpminus" => "KP_Subtract",
        "kpmultiply" => "KP_Multiply",
        "kpdivide" => "KP_Divide",
        _ => {
            // Numpad digits kp0-kp9.
            let n = token.strip_prefix("kp")?.parse::<u8>().ok()?;
            if n <= 9 {
                return Some(format!("KP_{n}"));
            }
            return None;
        }
    };
    Some(sym.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_modifiers_and_key() {
        let combo = parse_combo("ctrl+shift+s").unwrap();
        assert_eq!(combo.modifiers, vec!["ctrl", "shift"]);
        assert_eq!(combo.key, "s");
        assert_eq!(combo.to_xdotool(), "ctrl+shift+s");
    }

    #[test]
    fn unknown_token_rejects_whole_combo() {
        let err = parse_combo("ctrl+bogus").unwrap_err();
        assert!(matches!(err, DeckError::KeyCombo { ref token, .. } if token == "bogus"));
    }

    #[test]
    fn modifier_without_key_rejected() {
        assert!(parse_combo("ctrl").is_err());
        assert!(parse_combo("ctrl+shift").is_err());
    }

    #[test]
    fn modifier_in_key_position_rejected() {
        // "shift" is not in the key vocabulary, only the modifier list.
        assert!(parse_combo("ctrl+shift+shift").is_err());
    }

    #[test]
    fn vocabulary_mapping() {
        assert_eq!(parse_combo("f5").unwrap().key, "F5");
        assert_eq!(parse_combo("enter").unwrap().key, "Return");
        assert_eq!(parse_combo("pageup").unwrap().key, "Page_Up");
        assert_eq!(parse_combo("volumeup").unwrap().key, "XF86AudioRaiseVolume");
        assert_eq!(parse_combo("kp7").unwrap().key, "KP_7");
        assert_eq!(parse_combo("super+4").unwrap().to_xdotool(), "super+4");
    }

    #[test]
    fn out_of_vocabulary_keys_rejected() {
        assert!(parse_combo("f13").is_err());
        assert!(parse_combo("kp10").is_err());
        assert!(parse_combo("A").is_err()); // vocabulary is lower-case
    }
}
