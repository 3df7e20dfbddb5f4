//! Key name parsing
//!
//! Accepts pyautogui-style names ("enter", "esc", "pgdn", "f5") and
//! `+`-joined chords ("ctrl+shift+t"), resolved to Linux input event codes
//! (see /usr/include/linux/input-event-codes.h).

use crate::core::errors::{DesktopError, DesktopResult};

/// A key press with held modifiers, as Linux input event codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChord {
    pub modifiers: Vec<u16>,
    pub key: u16,
}

impl KeyChord {
    /// Parses "ctrl+c", "Return", "shift+F10" and the like
    pub fn parse(combo: &str) -> DesktopResult<Self> {
        let combo = combo.trim();
        if combo.is_empty() {
            return Err(DesktopError::invalid("key", "must not be empty"));
        }

        // A bare "+" is the key itself, not a separator
        if combo == "+" {
            return Ok(Self {
                modifiers: vec![KEY_LEFTSHIFT],
                key: KEY_EQUAL,
            });
        }

        let parts: Vec<&str> = combo.split('+').map(str::trim).collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(DesktopError::invalid("key", format!("malformed key combination '{combo}'")));
        }

        let Some((key, modifiers)) = parts.split_last() else {
            return Err(DesktopError::invalid("key", "must not be empty"));
        };

        let modifiers = modifiers
            .iter()
            .map(|m| {
                modifier_code(m).ok_or_else(|| {
                    DesktopError::invalid("key", format!("unknown modifier '{m}'"))
                })
            })
            .collect::<DesktopResult<Vec<u16>>>()?;

        let key = key_code(key)
            .ok_or_else(|| DesktopError::invalid("key", format!("unknown key '{key}'")))?;

        Ok(Self { modifiers, key })
    }
}

const KEY_LEFTSHIFT: u16 = 42;
const KEY_EQUAL: u16 = 13;

fn modifier_code(name: &str) -> Option<u16> {
    let code = match name.to_lowercase().as_str() {
        "ctrl" | "control" | "ctrlleft" => 29, // KEY_LEFTCTRL
        "ctrlright" => 97,
        "alt" | "altleft" | "option" => 56, // KEY_LEFTALT
        "altright" | "altgr" => 100,
        "shift" | "shiftleft" => KEY_LEFTSHIFT,
        "shiftright" => 54,
        "super" | "meta" | "win" | "winleft" | "command" | "cmd" => 125, // KEY_LEFTMETA
        "winright" => 126,
        _ => return None,
    };
    Some(code)
}

/// Maps a key name to its input event code
///
/// Modifiers are valid keys on their own; a purely numeric name of two or
/// more digits is taken as a raw event code.
pub fn key_code(name: &str) -> Option<u16> {
    if let Some(code) = modifier_code(name) {
        return Some(code);
    }

    let lower = name.to_lowercase();
    let code = match lower.as_str() {
        // Special keys
        "return" | "enter" => 28,
        "escape" | "esc" => 1,
        "tab" => 15,
        "backspace" => 14,
        "space" | " " => 57,
        "delete" | "del" => 111,
        "insert" => 110,
        "home" => 102,
        "end" => 107,
        "pageup" | "pgup" => 104,
        "pagedown" | "pgdn" => 109,
        "capslock" => 58,
        "numlock" => 69,
        "scrolllock" => 70,
        "printscreen" | "prtsc" | "prntscrn" => 99,
        "pause" => 119,
        "menu" | "apps" => 139,

        // Arrow keys
        "up" => 103,
        "down" => 108,
        "left" => 105,
        "right" => 106,

        // Function keys
        "f1" => 59,
        "f2" => 60,
        "f3" => 61,
        "f4" => 62,
        "f5" => 63,
        "f6" => 64,
        "f7" => 65,
        "f8" => 66,
        "f9" => 67,
        "f10" => 68,
        "f11" => 87,
        "f12" => 88,

        // Punctuation
        "-" | "minus" => 12,
        "=" | "equal" => KEY_EQUAL,
        "[" => 26,
        "]" => 27,
        ";" => 39,
        "'" => 40,
        "`" => 41,
        "\\" => 43,
        "," => 51,
        "." => 52,
        "/" => 53,

        // Letters
        "a" => 30,
        "b" => 48,
        "c" => 46,
        "d" => 32,
        "e" => 18,
        "f" => 33,
        "g" => 34,
        "h" => 35,
        "i" => 23,
        "j" => 36,
        "k" => 37,
        "l" => 38,
        "m" => 50,
        "n" => 49,
        "o" => 24,
        "p" => 25,
        "q" => 16,
        "r" => 19,
        "s" => 31,
        "t" => 20,
        "u" => 22,
        "v" => 47,
        "w" => 17,
        "x" => 45,
        "y" => 21,
        "z" => 44,

        // Numbers
        "0" => 11,
        "1" => 2,
        "2" => 3,
        "3" => 4,
        "4" => 5,
        "5" => 6,
        "6" => 7,
        "7" => 8,
        "8" => 9,
        "9" => 10,

        other if other.len() > 1 && other.chars().all(|c| c.is_ascii_digit()) => {
            return other.parse().ok();
        }
        _ => return None,
    };
    Some(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_keys() {
        assert_eq!(KeyChord::parse("enter").unwrap(), KeyChord { modifiers: vec![], key: 28 });
        assert_eq!(KeyChord::parse("Return").unwrap().key, 28);
        assert_eq!(KeyChord::parse("esc").unwrap().key, 1);
        assert_eq!(KeyChord::parse("F11").unwrap().key, 87);
        assert_eq!(KeyChord::parse("pgdn").unwrap().key, 109);
    }

    #[test]
    fn test_chords() {
        let chord = KeyChord::parse("ctrl+shift+t").unwrap();
        assert_eq!(chord.modifiers, vec![29, 42]);
        assert_eq!(chord.key, 20);

        let chord = KeyChord::parse("Alt + F4").unwrap();
        assert_eq!(chord.modifiers, vec![56]);
        assert_eq!(chord.key, 62);
    }

    #[test]
    fn test_modifier_alone_is_a_key() {
        let chord = KeyChord::parse("win").unwrap();
        assert!(chord.modifiers.is_empty());
        assert_eq!(chord.key, 125);
    }

    #[test]
    fn test_plus_key() {
        let chord = KeyChord::parse("+").unwrap();
        assert_eq!(chord.modifiers, vec![42]);
        assert_eq!(chord.key, 13);
    }

    #[test]
    fn test_raw_codes() {
        assert_eq!(key_code("183"), Some(183));
        // single digits are the number row, not raw codes
        assert_eq!(key_code("7"), Some(8));
    }

    #[test]
    fn test_rejects_unknown() {
        assert_eq!(KeyChord::parse("hyper+a").unwrap_err().kind(), "invalid_argument");
        assert!(KeyChord::parse("nosuchkey").is_err());
        assert!(KeyChord::parse("ctrl+").is_err());
        assert!(KeyChord::parse("").is_err());
    }
}
