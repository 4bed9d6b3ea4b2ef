//! Small text helpers shared by the extractors.

/// Lower-case and fold `ё` into `е`.
pub fn normalize(text: &str) -> String {
    text.to_lowercase().replace('ё', "е")
}

/// True if any of the patterns occurs as a substring.
pub fn matches_any(text: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|p| text.contains(p))
}

/// Alphanumeric tokens of `text`, in order.
pub fn words(text: &str) -> Vec<&str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect()
}

/// True if `word` occurs as a whole token.
pub fn has_word(text: &str, word: &str) -> bool {
    words(text).contains(&word)
}

/// True if any of `candidates` occurs as a whole token.
pub fn has_any_word(text: &str, candidates: &[&str]) -> bool {
    let tokens = words(text);
    candidates.iter().any(|c| tokens.contains(c))
}

pub fn has_digit(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit())
}

pub fn has_cyrillic(text: &str) -> bool {
    text.chars()
        .any(|c| matches!(c, 'а'..='я' | 'А'..='Я' | 'ё' | 'Ё'))
}

/// Removes single spaces between digits so "2 500 000" reads as one number.
pub fn collapse_digit_groups(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (i, &c) in chars.iter().enumerate() {
        let between_digits = c.is_whitespace()
            && i > 0
            && chars[i - 1].is_ascii_digit()
            && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit());
        if !between_digits {
            out.push(c);
        }
    }
    out
}
