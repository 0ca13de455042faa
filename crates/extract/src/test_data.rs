//! Test data normalization
//!
//! Turns free-text test data cells into a deduplicated list of items. URLs are
//! kept whole; everything else is split on newlines, commas and semicolons,
//! and `key: value` pairs are rendered with a lower-cased key.

use std::collections::HashSet;

use casepilot_common::TestDataItem;
use once_cell::sync::Lazy;
use regex::Regex;

static URL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://\S+$").expect("valid URL pattern"));

/// Normalize raw cells into items, first occurrence order
pub fn normalize_test_data<I, S>(cells: I) -> Vec<TestDataItem>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut items = Vec::new();

    for cell in cells {
        let cell = cell.as_ref().trim();
        if cell.is_empty() {
            continue;
        }

        if URL_PATTERN.is_match(cell) {
            if seen.insert(cell.to_string()) {
                items.push(cell.to_string());
            }
            continue;
        }

        for token in tokenize(cell) {
            if let Some(item) = normalize_token(token) {
                if seen.insert(item.clone()) {
                    items.push(item);
                }
            }
        }
    }

    items
}

/// The part of an item matched against step text: the key of a pair, or the
/// whole item, lower-cased.
pub fn match_key(item: &str) -> String {
    match item.split_once(':') {
        Some((key, _)) => key.trim().to_lowercase(),
        None => item.to_lowercase(),
    }
}

fn tokenize(cell: &str) -> impl Iterator<Item = &str> {
    cell.split('\n')
        .flat_map(|line| line.split(','))
        .flat_map(|part| part.split(';'))
}

fn normalize_token(token: &str) -> Option<TestDataItem> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }

    match token.split_once(':') {
        Some((key, value)) => {
            let value = value.trim();
            if value.is_empty() {
                return None;
            }
            Some(format!("{}: {}", key.trim().to_lowercase(), value))
        }
        None => Some(token.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pairs_are_deduplicated_after_normalization() {
        let items = normalize_test_data(["user: a", "user:a", "user: b"]);
        assert_eq!(items, vec!["user: a", "user: b"]);
    }

    #[test]
    fn test_url_is_atomic() {
        let items = normalize_test_data(["https://x.com/a,b"]);
        assert_eq!(items, vec!["https://x.com/a,b"]);
    }

    #[test]
    fn test_mixed_separators() {
        let items = normalize_test_data(["Username: Admin\nPassword: admin123; Role: ESS, Remember"]);
        assert_eq!(
            items,
            vec!["username: Admin", "password: admin123", "role: ESS", "Remember"]
        );
    }

    #[test]
    fn test_empty_values_and_tokens_are_dropped() {
        let items = normalize_test_data(["email:   ,, ;\n", "", "   "]);
        assert!(items.is_empty());
    }

    #[test]
    fn test_value_keeps_inner_colons() {
        let items = normalize_test_data(["Time: 10:30"]);
        assert_eq!(items, vec!["time: 10:30"]);
    }

    #[test]
    fn test_order_is_first_seen_across_cells() {
        let items = normalize_test_data(["b, a", "a, c", "B"]);
        assert_eq!(items, vec!["b", "a", "c", "B"]);
    }

    #[test]
    fn test_match_key() {
        assert_eq!(match_key("username: Admin"), "username");
        assert_eq!(match_key("Remember Me"), "remember me");
    }
}
