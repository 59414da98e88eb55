use ammonia;

/// Clean user-supplied HTML using the ammonia library.
///
/// Whitelist-based sanitization: safe tags (like <b>, <p>) survive, while
/// dangerous tags (like <script>, <iframe>) and event-handler attributes
/// are stripped. Applied to discussion post and reply bodies before they
/// are stored.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_tags() {
        let cleaned = clean_html("hello <script>alert(1)</script> world");
        assert!(!cleaned.contains("script"));
        assert!(cleaned.contains("hello"));
    }

    #[test]
    fn keeps_basic_formatting() {
        let cleaned = clean_html("<b>bold</b> text");
        assert!(cleaned.contains("<b>bold</b>"));
    }
}
