//! Small text and clock helpers.

const COMPACT_LIMIT: usize = 180;

/// Trimmed text, or `None` when only whitespace is left.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Whether `value` names an `http`/`https` endpoint with a host part.
pub fn is_http_url(value: &str) -> bool {
    value.split_once("://").is_some_and(|(scheme, rest)| {
        !rest.is_empty()
            && (scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https"))
    })
}

/// One-line form of a remote error body for logs and the dropped-change
/// log: whitespace runs collapse to a space, long text ends in `…`.
pub fn compact_text(value: &str) -> String {
    let joined = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if joined.chars().count() <= COMPACT_LIMIT {
        return joined;
    }
    let mut cut: String = joined.chars().take(COMPACT_LIMIT - 1).collect();
    cut.push('…');
    cut
}

/// Unix ms, the unit of `lastModified`.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn blank_titles_normalize_to_none() {
        assert_eq!(normalize_text_option(None), None);
        assert_eq!(normalize_text_option(Some(" \t\n".to_string())), None);
        assert_eq!(
            normalize_text_option(Some("  Buy milk ".to_string())).as_deref(),
            Some("Buy milk")
        );
    }

    #[test]
    fn api_urls_need_http_scheme_and_host() {
        assert!(is_http_url("http://127.0.0.1:8787"));
        assert!(is_http_url("HTTPS://tasks.example.com/deck"));
        assert!(!is_http_url("https://"));
        assert!(!is_http_url("ws://tasks.example.com"));
        assert!(!is_http_url("tasks.example.com"));
    }

    #[test]
    fn error_bodies_become_one_short_line() {
        assert_eq!(
            compact_text("<html>\n  <body>Bad Gateway</body>\n</html>"),
            "<html> <body>Bad Gateway</body> </html>"
        );

        let compacted = compact_text(&"timeout ".repeat(40));
        assert_eq!(compacted.chars().count(), COMPACT_LIMIT);
        assert!(compacted.ends_with('…'));
    }
}
