//! Column-name and value patterns used by type and role inference.
//!
//! Names are always matched lowercased.

use regex::Regex;
use std::sync::LazyLock;

static IDENTIFIER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^id|id$|_id$|key$|index$").expect("identifier pattern"));

static TARGET_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"target|label|class|outcome|result|prediction").expect("target pattern")
});

static TIME_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"time|date|timestamp|created|updated").expect("time pattern"));

/// Anchored at the start of the value, like a prefix match
static DATE_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d{4}-\d{2}-\d{2}|\d{2}/\d{2}/\d{4}|\d{2}-\d{2}-\d{4})")
        .expect("date pattern")
});

pub fn is_identifier_name(name: &str) -> bool {
    IDENTIFIER_NAME.is_match(&name.to_lowercase())
}

pub fn is_target_name(name: &str) -> bool {
    TARGET_NAME.is_match(&name.to_lowercase())
}

pub fn is_time_name(name: &str) -> bool {
    TIME_NAME.is_match(&name.to_lowercase())
}

pub fn looks_like_date(value: &str) -> bool {
    DATE_VALUE.is_match(value.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_names() {
        assert!(is_identifier_name("customer_id"));
        assert!(is_identifier_name("ID"));
        assert!(is_identifier_name("row_index"));
        assert!(is_identifier_name("primary_key"));
        assert!(!is_identifier_name("income"));
    }

    #[test]
    fn test_target_and_time_names() {
        assert!(is_target_name("Target"));
        assert!(is_target_name("class_label"));
        assert!(!is_target_name("churn"));
        assert!(is_time_name("created_at"));
        assert!(is_time_name("SignupDate"));
        assert!(!is_time_name("amount"));
    }

    #[test]
    fn test_date_values() {
        assert!(looks_like_date("2024-01-31"));
        assert!(looks_like_date("01/31/2024"));
        assert!(looks_like_date("31-01-2024 10:00"));
        assert!(!looks_like_date("Jan 31"));
        assert!(!looks_like_date("12345"));
    }
}
