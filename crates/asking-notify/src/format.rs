//! Text helpers for notification bodies.

/// Longest description a chat embed field accepts.
pub const DESCRIPTION_LIMIT: usize = 1024;

const ELLIPSIS: &str = "...";

/// Cuts a description down to [`DESCRIPTION_LIMIT`] characters, ending
/// in an ellipsis when anything was dropped.
pub fn truncate_description(text: &str) -> String {
    if text.chars().count() <= DESCRIPTION_LIMIT {
        return text.to_string();
    }

    let keep = DESCRIPTION_LIMIT - ELLIPSIS.len();
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

/// Formats a byte count as `N bytes`, `X.Y KB` or `X.Y MB`.
pub fn human_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;

    if bytes < KB {
        format!("{} bytes", bytes)
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_description_untouched() {
        assert_eq!(truncate_description("hello"), "hello");

        let exact = "x".repeat(DESCRIPTION_LIMIT);
        assert_eq!(truncate_description(&exact), exact);
    }

    #[test]
    fn test_long_description_truncated() {
        let long = "y".repeat(DESCRIPTION_LIMIT + 50);
        let out = truncate_description(&long);

        assert_eq!(out.chars().count(), DESCRIPTION_LIMIT);
        assert!(out.ends_with("..."));
        assert!(out.starts_with("yyy"));
    }

    #[test]
    fn test_truncate_multibyte() {
        let long = "ถ".repeat(DESCRIPTION_LIMIT + 1);
        let out = truncate_description(&long);
        assert_eq!(out.chars().count(), DESCRIPTION_LIMIT);
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(0), "0 bytes");
        assert_eq!(human_size(1023), "1023 bytes");
        assert_eq!(human_size(1024), "1.0 KB");
        assert_eq!(human_size(1536), "1.5 KB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.0 MB");
    }
}
