use crate::error::ValidationError;

/// 割り当て可能なコマンドトークン (キーボード + マウス)
pub const AVAILABLE_KEYS: &[&str] = &[
    // 英字
    "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m",
    "n", "o", "p", "q", "r", "s", "t", "u", "v", "w", "x", "y", "z",
    // 数字
    "0", "1", "2", "3", "4", "5", "6", "7", "8", "9",
    // ファンクション
    "f1", "f2", "f3", "f4", "f5", "f6", "f7", "f8", "f9", "f10", "f11", "f12",
    // 制御
    "enter", "space", "backspace", "tab", "escape", "shift", "ctrl", "alt",
    // 方向
    "up", "down", "left", "right",
    "home", "end", "pageup", "pagedown", "insert", "delete",
    // マウス
    "mouse_left_click", "mouse_right_click", "mouse_middle_click",
    "mouse_wheel_up", "mouse_wheel_down",
    "move_left", "move_right",
    "mouse_release",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Keyboard,
    Mouse,
}

pub fn is_known_key(token: &str) -> bool {
    AVAILABLE_KEYS.contains(&token)
}

/// 未知のトークンは None
pub fn key_kind(token: &str) -> Option<KeyKind> {
    if !is_known_key(token) {
        return None;
    }
    if token.starts_with("mouse_") || token.starts_with("move_") {
        Some(KeyKind::Mouse)
    } else {
        Some(KeyKind::Keyboard)
    }
}

/// 表示用の短縮ラベル
pub fn key_display(token: &str) -> String {
    let label = match token {
        "enter" => "ENTER",
        "space" => "SPACE",
        "backspace" => "BKSP",
        "tab" => "TAB",
        "escape" => "ESC",
        "shift" => "SHIFT",
        "ctrl" => "CTRL",
        "alt" => "ALT",
        "up" => "↑",
        "down" => "↓",
        "left" => "←",
        "right" => "→",
        "home" => "HOME",
        "end" => "END",
        "pageup" => "PGUP",
        "pagedown" => "PGDN",
        "insert" => "INS",
        "delete" => "DEL",
        "mouse_left_click" => "LMB",
        "mouse_right_click" => "RMB",
        "mouse_middle_click" => "MMB",
        "mouse_wheel_up" => "WHEEL↑",
        "mouse_wheel_down" => "WHEEL↓",
        "move_left" => "MOUSE←",
        "move_right" => "MOUSE→",
        "mouse_release" => "RELEASE",
        other => return other.to_uppercase(),
    };
    label.to_string()
}

/// 有効化前のキー列チェック: 空スロットと未知トークンを拒否
pub fn validate_keys(keys: &[String]) -> Result<(), ValidationError> {
    for (position, key) in keys.iter().enumerate() {
        if key.is_empty() {
            return Err(ValidationError::UnresolvedKey { position });
        }
        if !is_known_key(key) {
            return Err(ValidationError::UnknownKey(key.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_kind() {
        assert_eq!(key_kind("w"), Some(KeyKind::Keyboard));
        assert_eq!(key_kind("f12"), Some(KeyKind::Keyboard));
        assert_eq!(key_kind("mouse_wheel_up"), Some(KeyKind::Mouse));
        assert_eq!(key_kind("move_left"), Some(KeyKind::Mouse));
        assert_eq!(key_kind("hyper"), None);
    }

    #[test]
    fn test_key_display() {
        assert_eq!(key_display("backspace"), "BKSP");
        assert_eq!(key_display("up"), "↑");
        assert_eq!(key_display("j"), "J");
        assert_eq!(key_display("f5"), "F5");
    }

    #[test]
    fn test_validate_keys_allows_duplicates() {
        let keys = vec!["w".to_string(), "w".to_string(), "mouse_left_click".to_string()];
        assert!(validate_keys(&keys).is_ok());
    }

    #[test]
    fn test_validate_keys_rejects_placeholder() {
        let keys = vec!["w".to_string(), String::new()];
        assert_eq!(
            validate_keys(&keys),
            Err(ValidationError::UnresolvedKey { position: 1 })
        );
    }

    #[test]
    fn test_validate_keys_rejects_unknown() {
        let keys = vec!["esc".to_string()];
        assert_eq!(
            validate_keys(&keys),
            Err(ValidationError::UnknownKey("esc".to_string()))
        );
    }
}
