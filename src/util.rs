// src/util.rs — Log-safe previews of upstream response bodies

use std::borrow::Cow;

/// Characters of an upstream body kept in logs and error messages.
pub const PREVIEW_CHARS: usize = 200;

/// Single-line preview of a response body for logs and error messages.
///
/// Whitespace runs collapse to one space so multi-line HTML error pages stay
/// on one log line; anything past [`PREVIEW_CHARS`] is cut and marked with
/// an ellipsis.
pub fn log_preview(body: &str) -> Cow<'_, str> {
    let body = body.trim();
    let single_line = !body.contains(|c: char| c.is_whitespace() && c != ' ')
        && !body.contains("  ");
    let flat: Cow<'_, str> = if single_line {
        Cow::Borrowed(body)
    } else {
        Cow::Owned(body.split_whitespace().collect::<Vec<_>>().join(" "))
    };

    match flat.char_indices().nth(PREVIEW_CHARS) {
        None => flat,
        Some((cut, _)) => Cow::Owned(format!("{}…", &flat[..cut])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_body_is_borrowed() {
        let preview = log_preview(r#"{"error":"bad token"}"#);
        assert!(matches!(preview, Cow::Borrowed(_)));
        assert_eq!(preview, r#"{"error":"bad token"}"#);
    }

    #[test]
    fn test_html_error_page_flattened() {
        let body = "<html>\n  <body>\n    502 Bad Gateway\n  </body>\n</html>\n";
        assert_eq!(
            log_preview(body),
            "<html> <body> 502 Bad Gateway </body> </html>"
        );
    }

    #[test]
    fn test_long_body_cut_with_ellipsis() {
        let body = "x".repeat(PREVIEW_CHARS + 50);
        let preview = log_preview(&body);
        assert_eq!(preview.chars().count(), PREVIEW_CHARS + 1);
        assert!(preview.ends_with('…'));
    }

    #[test]
    fn test_cut_counts_characters_not_bytes() {
        // Each "é" is two bytes; the cut must land on a character boundary.
        let body = "é".repeat(PREVIEW_CHARS + 1);
        let preview = log_preview(&body);
        assert_eq!(preview.chars().filter(|c| *c == 'é').count(), PREVIEW_CHARS);
    }

    #[test]
    fn test_exact_limit_untouched() {
        let body = "y".repeat(PREVIEW_CHARS);
        assert_eq!(log_preview(&body), body);
    }

    #[test]
    fn test_empty_body() {
        assert_eq!(log_preview("  \n "), "");
    }
}
