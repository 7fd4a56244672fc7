//! Text helpers: whitespace-insensitive comparison of trigger phrases and field keys,
//! plus cleanup of user-typed values.

/// Remove every whitespace character (including the full-width space U+3000).
///
/// Comparison of the result is codepoint equality; no case folding is applied.
pub fn normalize(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

/// True if `a` and `b` are equal after [`normalize`].
pub fn equivalent(a: &str, b: &str) -> bool {
    a.chars()
        .filter(|c| !c.is_whitespace())
        .eq(b.chars().filter(|c| !c.is_whitespace()))
}

/// Drop characters that render as nothing in a spreadsheet cell: control
/// characters and the zero-width space chat clients like to insert into names.
pub fn strip_invisible(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_control() && *c != '\u{200b}')
        .collect()
}

/// Map full-width digits (U+FF10..U+FF19) and the full-width full stop (U+FF0E)
/// to ASCII. Japanese IMEs emit these when typing numbers in full-width mode.
pub fn fold_fullwidth_digits(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '０'..='９' => char::from(b'0' + (c as u32 - '０' as u32) as u8),
            '．' => '.',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_ascii_and_fullwidth_space() {
        assert_eq!(normalize(" 工数 登録\u{3000}"), "工数登録");
        assert_eq!(normalize("\t案件 名\n"), "案件名");
    }

    #[test]
    fn test_normalize_keeps_case() {
        assert_eq!(normalize("Ab C"), "AbC");
        assert!(!equivalent("abc", "ABC"));
    }

    #[test]
    fn test_equivalent_matches_normalize() {
        assert!(equivalent("工数登録 ", "工数登録"));
        assert!(equivalent("工 数 登 録", "工数登録"));
        assert!(!equivalent("工数登録!", "工数登録"));
        assert!(equivalent("", "   "));
    }

    #[test]
    fn test_strip_invisible() {
        assert_eq!(strip_invisible("田\u{200b}中\u{0007}"), "田中");
        assert_eq!(strip_invisible("Tanaka Taro"), "Tanaka Taro");
    }

    #[test]
    fn test_fold_fullwidth_digits() {
        assert_eq!(fold_fullwidth_digits("２．５"), "2.5");
        assert_eq!(fold_fullwidth_digits("１０"), "10");
        assert_eq!(fold_fullwidth_digits("2.5h"), "2.5h");
        assert_eq!(fold_fullwidth_digits("時間"), "時間");
    }
}
