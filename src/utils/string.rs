//! String utilities
//!
//! Helpers for keeping platform error bodies bounded and tokens out of logs.

/// Truncate a string to at most `max_chars` characters on a char boundary
pub fn truncate_str(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Truncate and mark the cut with `...`
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        format!("{}...", truncate_str(s, max_chars))
    }
}

/// Redact a secret for display, keeping only its last four characters
///
/// ```
/// use deploy_broker::utils::mask_secret;
///
/// assert_eq!(mask_secret("rnd_abcdef123456"), "****3456");
/// assert_eq!(mask_secret("abc"), "****");
/// ```
pub fn mask_secret(secret: &str) -> String {
    let count = secret.chars().count();
    if count <= 4 {
        return "****".to_string();
    }
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("****{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str_multibyte() {
        assert_eq!(truncate_str("héllo wörld", 4), "héll");
        assert_eq!(truncate_str("short", 100), "short");
    }

    #[test]
    fn test_truncate_with_ellipsis() {
        assert_eq!(truncate_with_ellipsis("Service limit reached", 7), "Service...");
        assert_eq!(truncate_with_ellipsis("ok", 7), "ok");
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("rnd_0123456789"), "****6789");
        assert_eq!(mask_secret(""), "****");
        assert!(!mask_secret("rnd_supersecret").contains("super"));
    }
}
