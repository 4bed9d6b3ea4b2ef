//! Phone number normalization to `+7XXXXXXXXXX`.

use std::sync::LazyLock;

use regex::Regex;

/// One run of digits joined by spaces, dashes or parentheses.
static PHONE_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\+?\(?\d[\d \t\-()]*\d").expect("valid regex"));

/// Canonical `+7XXXXXXXXXX` form, or `None` if the text holds no Russian number.
///
/// Accepts 11 digits starting with 8 or 7, or 10 digits without the
/// country code. The digits must form one run; numbers split by words
/// ("до 2 500 000 и 150 сил") are not a phone.
pub fn normalize_phone(text: &str) -> Option<String> {
    PHONE_RUN_RE.find_iter(text).find_map(|run| canonical(run.as_str()))
}

fn canonical(run: &str) -> Option<String> {
    let digits: String = run.chars().filter(char::is_ascii_digit).collect();
    match digits.len() {
        11 if digits.starts_with('8') => Some(format!("+7{}", &digits[1..])),
        11 if digits.starts_with('7') => Some(format!("+{digits}")),
        10 => Some(format!("+7{digits}")),
        _ => None,
    }
}

/// Number of ASCII digits in `text`.
pub fn digit_count(text: &str) -> usize {
    text.chars().filter(char::is_ascii_digit).count()
}

/// `+791****4567`: the first four and last four characters survive.
pub fn mask_phone(phone: &str) -> String {
    let chars: Vec<char> = phone.chars().collect();
    if chars.len() <= 8 {
        return phone.to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}****{tail}")
}
