//! Logical key events and their wire encoding.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A key press as delivered by a terminal view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Enter,
    Backspace,
    /// A single printable (or already-resolved control) character.
    Char(char),
    /// Anything else: modifier-only presses, arrows, function keys.
    Named(String),
}

impl Key {
    /// Parse a browser-style key name (`"Enter"`, `"Backspace"`, `"a"`, `"Shift"`).
    pub fn from_name(name: &str) -> Self {
        match name {
            "Enter" => Key::Enter,
            "Backspace" => Key::Backspace,
            _ => {
                let mut chars = name.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Key::Char(c),
                    _ => Key::Named(name.to_string()),
                }
            }
        }
    }
}

/// Control byte sent to the backend for Backspace.
///
/// Backends disagree on which erase code their line discipline expects, so
/// this is configuration rather than a constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EraseCode {
    /// `\x08` (`^H`)
    Backspace,
    /// `\x7f` (`^?`)
    #[default]
    Delete,
}

impl EraseCode {
    pub fn as_char(self) -> char {
        match self {
            EraseCode::Backspace => '\u{8}',
            EraseCode::Delete => '\u{7f}',
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EraseCode::Backspace => "backspace",
            EraseCode::Delete => "delete",
        }
    }
}

impl std::fmt::Display for EraseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown erase code '{0}' (expected 'backspace' or 'delete')")]
pub struct ParseEraseCodeError(String);

impl FromStr for EraseCode {
    type Err = ParseEraseCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "backspace" | "bs" | "^h" => Ok(EraseCode::Backspace),
            "delete" | "del" | "^?" => Ok(EraseCode::Delete),
            _ => Err(ParseEraseCodeError(s.to_string())),
        }
    }
}

/// Map a key to the token sent over the wire, or `None` if it produces no traffic.
pub fn encode_key(key: &Key, erase: EraseCode) -> Option<String> {
    match key {
        Key::Enter => Some("\n".to_string()),
        Key::Backspace => Some(erase.as_char().to_string()),
        Key::Char(c) => Some(c.to_string()),
        Key::Named(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_name() {
        assert_eq!(Key::from_name("Enter"), Key::Enter);
        assert_eq!(Key::from_name("Backspace"), Key::Backspace);
        assert_eq!(Key::from_name("a"), Key::Char('a'));
        assert_eq!(Key::from_name("é"), Key::Char('é'));
        assert_eq!(Key::from_name(" "), Key::Char(' '));
        assert_eq!(Key::from_name("Shift"), Key::Named("Shift".to_string()));
        assert_eq!(Key::from_name(""), Key::Named(String::new()));
    }

    #[test]
    fn encode_enter_and_chars() {
        assert_eq!(encode_key(&Key::Enter, EraseCode::Delete).as_deref(), Some("\n"));
        assert_eq!(encode_key(&Key::Char('x'), EraseCode::Delete).as_deref(), Some("x"));
    }

    #[test]
    fn encode_backspace_follows_config() {
        assert_eq!(
            encode_key(&Key::Backspace, EraseCode::Delete).as_deref(),
            Some("\x7f")
        );
        assert_eq!(
            encode_key(&Key::Backspace, EraseCode::Backspace).as_deref(),
            Some("\x08")
        );
    }

    #[test]
    fn named_keys_are_dropped() {
        for name in ["Shift", "Control", "ArrowUp", "F5"] {
            assert_eq!(encode_key(&Key::from_name(name), EraseCode::Delete), None);
        }
    }

    #[test]
    fn erase_code_parsing() {
        assert_eq!("delete".parse::<EraseCode>().unwrap(), EraseCode::Delete);
        assert_eq!("BS".parse::<EraseCode>().unwrap(), EraseCode::Backspace);
        assert!("tab".parse::<EraseCode>().is_err());
        assert_eq!(EraseCode::default(), EraseCode::Delete);
    }
}
