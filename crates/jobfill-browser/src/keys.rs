//! Key names, virtual key codes and chord parsing.

/// Everything `Input.dispatchKeyEvent` needs for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDefinition {
    pub key: String,
    pub code: String,
    pub key_code: i32,
    /// Text produced on keyDown, if any.
    pub text: Option<String>,
}

/// Modifier bit for CDP's `modifiers` mask.
pub fn modifier_bit(key: &str) -> Option<i32> {
    match key {
        "Alt" => Some(1),
        "Control" => Some(2),
        "Meta" => Some(4),
        "Shift" => Some(8),
        _ => None,
    }
}

/// Canonical DOM key name for a user-facing alias (`ctrl`, `esc`, `return`...).
pub fn normalize_key(name: &str) -> String {
    let lower = name.trim().to_ascii_lowercase();
    let canonical = match lower.as_str() {
        "ctrl" | "control" => "Control",
        "alt" | "option" => "Alt",
        "shift" => "Shift",
        "meta" | "cmd" | "command" | "super" | "win" => "Meta",
        "enter" | "return" => "Enter",
        "tab" => "Tab",
        "esc" | "escape" => "Escape",
        "backspace" => "Backspace",
        "delete" | "del" => "Delete",
        "space" | "spacebar" => " ",
        "up" | "arrowup" => "ArrowUp",
        "down" | "arrowdown" => "ArrowDown",
        "left" | "arrowleft" => "ArrowLeft",
        "right" | "arrowright" => "ArrowRight",
        "home" => "Home",
        "end" => "End",
        "pageup" => "PageUp",
        "pagedown" => "PageDown",
        "insert" => "Insert",
        _ => {
            if let Some(n) = lower.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
                if (1..=12).contains(&n) {
                    return format!("F{}", n);
                }
            }
            return name.to_string();
        }
    };
    canonical.to_string()
}

/// Resolve a key name (already normalized or an alias) to its definition.
pub fn key_definition(name: &str) -> KeyDefinition {
    let key = normalize_key(name);
    let named = |code: &str, key_code: i32, text: Option<&str>| KeyDefinition {
        key: key.clone(),
        code: code.to_string(),
        key_code,
        text: text.map(str::to_string),
    };

    match key.as_str() {
        "Enter" => named("Enter", 13, Some("\r")),
        "Tab" => named("Tab", 9, None),
        "Escape" => named("Escape", 27, None),
        "Backspace" => named("Backspace", 8, None),
        "Delete" => named("Delete", 46, None),
        " " => named("Space", 32, Some(" ")),
        "ArrowUp" => named("ArrowUp", 38, None),
        "ArrowDown" => named("ArrowDown", 40, None),
        "ArrowLeft" => named("ArrowLeft", 37, None),
        "ArrowRight" => named("ArrowRight", 39, None),
        "Home" => named("Home", 36, None),
        "End" => named("End", 35, None),
        "PageUp" => named("PageUp", 33, None),
        "PageDown" => named("PageDown", 34, None),
        "Insert" => named("Insert", 45, None),
        "Control" => named("ControlLeft", 17, None),
        "Shift" => named("ShiftLeft", 16, None),
        "Alt" => named("AltLeft", 18, None),
        "Meta" => named("MetaLeft", 91, None),
        f if f.starts_with('F') && f.len() <= 3 && f[1..].parse::<i32>().is_ok() => {
            let n: i32 = f[1..].parse().unwrap_or(1);
            named(f, 111 + n, None)
        }
        _ => printable_definition(&key),
    }
}

fn printable_definition(key: &str) -> KeyDefinition {
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => {
            let upper = c.to_ascii_uppercase();
            let (code, key_code) = if c.is_ascii_alphabetic() {
                (format!("Key{}", upper), upper as i32)
            } else if c.is_ascii_digit() {
                (format!("Digit{}", c), c as i32)
            } else {
                (String::new(), 0)
            };
            KeyDefinition {
                key: key.to_string(),
                code,
                key_code,
                text: Some(key.to_string()),
            }
        }
        _ => KeyDefinition {
            key: key.to_string(),
            code: String::new(),
            key_code: 0,
            text: None,
        },
    }
}

/// Split a chord like `ctrl+shift+a` into modifiers and the final key.
///
/// A lone `+` (or a trailing `++`) means the plus key itself.
pub fn parse_chord(chord: &str) -> (Vec<String>, String) {
    let trimmed = chord.trim();
    if trimmed == "+" {
        return (Vec::new(), "+".to_string());
    }

    let (body, plus_key) = match trimmed.strip_suffix("++") {
        Some(rest) => (rest, true),
        None => (trimmed, false),
    };

    let mut parts: Vec<String> = body
        .split('+')
        .filter(|p| !p.is_empty())
        .map(normalize_key)
        .collect();

    let key = if plus_key {
        "+".to_string()
    } else {
        parts.pop().unwrap_or_default()
    };
    (parts, key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_aliases() {
        assert_eq!(normalize_key("ctrl"), "Control");
        assert_eq!(normalize_key("RETURN"), "Enter");
        assert_eq!(normalize_key("esc"), "Escape");
        assert_eq!(normalize_key("f5"), "F5");
        assert_eq!(normalize_key("a"), "a");
    }

    #[test]
    fn test_enter_definition() {
        let def = key_definition("enter");
        assert_eq!(def.key, "Enter");
        assert_eq!(def.key_code, 13);
        assert_eq!(def.text.as_deref(), Some("\r"));
    }

    #[test]
    fn test_printable_definition() {
        let def = key_definition("a");
        assert_eq!(def.code, "KeyA");
        assert_eq!(def.key_code, 65);
        assert_eq!(def.text.as_deref(), Some("a"));

        let digit = key_definition("7");
        assert_eq!(digit.code, "Digit7");
    }

    #[test]
    fn test_function_key() {
        assert_eq!(key_definition("F12").key_code, 123);
    }

    #[test]
    fn test_parse_chord() {
        let (mods, key) = parse_chord("ctrl+a");
        assert_eq!(mods, vec!["Control".to_string()]);
        assert_eq!(key, "a");

        let (mods, key) = parse_chord("Control+Shift+Tab");
        assert_eq!(mods, vec!["Control".to_string(), "Shift".to_string()]);
        assert_eq!(key, "Tab");
    }

    #[test]
    fn test_parse_chord_plus_key() {
        assert_eq!(parse_chord("+"), (Vec::new(), "+".to_string()));
        let (mods, key) = parse_chord("shift++");
        assert_eq!(mods, vec!["Shift".to_string()]);
        assert_eq!(key, "+");
    }

    #[test]
    fn test_modifier_bits() {
        assert_eq!(modifier_bit("Control"), Some(2));
        assert_eq!(modifier_bit("Shift"), Some(8));
        assert_eq!(modifier_bit("a"), None);
    }
}
