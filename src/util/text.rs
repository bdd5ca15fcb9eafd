use scraper::{ElementRef, Html};

/// Collapses every run of whitespace into a single space and trims both ends.
///
/// Control characters (anything `char::is_control` reports, other than the
/// whitespace already folded) are dropped: they are invalid in XML 1.0 and
/// would make the synthesized document unparseable.
///
/// # Examples
///
/// ```
/// use sitefeed::util::collapse_whitespace;
///
/// assert_eq!(collapse_whitespace("  Hello \n\t world  "), "Hello world");
/// assert_eq!(collapse_whitespace("Bell\x07 rings"), "Bell rings");
/// ```
pub fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for word in s.split_whitespace() {
        let mut cleaned = word.chars().filter(|c| !c.is_control()).peekable();
        if cleaned.peek().is_none() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.extend(cleaned);
    }
    out
}

/// Collapses whitespace and maps an empty result to `None`.
pub fn non_empty(s: &str) -> Option<String> {
    let collapsed = collapse_whitespace(s);
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// Joined, whitespace-collapsed text content of an element.
pub fn element_text(element: &ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

/// Converts an HTML fragment (feed summaries often carry markup) to plain text.
///
/// Input without a `<` is treated as text already and only collapsed.
pub fn html_to_text(fragment: &str) -> String {
    if !fragment.contains('<') {
        return collapse_whitespace(fragment);
    }
    let parsed = Html::parse_fragment(fragment);
    collapse_whitespace(&parsed.root_element().text().collect::<Vec<_>>().join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_mixed_whitespace() {
        assert_eq!(collapse_whitespace("a\n\n  b\tc"), "a b c");
    }

    #[test]
    fn test_collapse_empty_and_blank() {
        assert_eq!(collapse_whitespace(""), "");
        assert_eq!(collapse_whitespace(" \n\t "), "");
    }

    #[test]
    fn test_collapse_drops_control_chars() {
        assert_eq!(collapse_whitespace("Evil\x1b[31m Feed"), "Evil[31m Feed");
        assert_eq!(collapse_whitespace("\x00 \x07"), "");
    }

    #[test]
    fn test_collapse_preserves_unicode() {
        assert_eq!(collapse_whitespace(" 你好  世界 "), "你好 世界");
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty("  "), None);
        assert_eq!(non_empty(" x  y "), Some("x y".to_string()));
    }

    #[test]
    fn test_html_to_text_strips_tags() {
        assert_eq!(
            html_to_text("<p>Hello <b>bold</b>\n world</p>"),
            "Hello bold world"
        );
    }

    #[test]
    fn test_html_to_text_decodes_entities() {
        assert_eq!(html_to_text("<p>Fish &amp; chips</p>"), "Fish & chips");
    }

    #[test]
    fn test_html_to_text_plain_passthrough() {
        assert_eq!(html_to_text("just text "), "just text");
    }

    #[test]
    fn test_element_text() {
        let doc = Html::parse_fragment("<div><span>One</span>\n<span>Two</span></div>");
        let sel = scraper::Selector::parse("div").unwrap();
        let div = doc.select(&sel).next().unwrap();
        assert_eq!(element_text(&div), "One Two");
    }
}
