use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

static URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s<>)"']+"#).expect("valid URL pattern"));

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '\'', '"'];

/// Met l'URL en minuscules, retire la ponctuation finale puis une seule
/// barre oblique finale.
pub fn normalize_link(link: &str) -> String {
    let link = link.trim_end_matches(TRAILING_PUNCTUATION).to_lowercase();
    match link.strip_suffix('/') {
        Some(stripped) => stripped.to_string(),
        None => link,
    }
}

/// Liens normalisés trouvés dans `text`, triés et sans doublon.
pub fn extract_links(text: &str) -> BTreeSet<String> {
    URL.find_iter(text)
        .map(|m| normalize_link(m.as_str()))
        .filter(|link| !link.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_and_normalize() {
        let links = extract_links(
            "Click here to reset: https://Example.com/Reset/ or see (http://docs.example.com/faq). \
             Again: https://example.com/reset",
        );
        assert_eq!(
            links.into_iter().collect::<Vec<_>>(),
            vec!["http://docs.example.com/faq", "https://example.com/reset"]
        );
    }

    #[test]
    fn test_html_attributes_stop_at_quotes() {
        let links = extract_links(r#"<a href="https://example.com/a?b=1">link</a>"#);
        assert!(links.contains("https://example.com/a?b=1"));
        assert_eq!(links.len(), 1);
    }

    #[test]
    fn test_only_one_trailing_slash_is_removed() {
        assert_eq!(normalize_link("https://example.com/path/"), "https://example.com/path");
        assert_eq!(normalize_link("https://example.com//"), "https://example.com/");
        assert_eq!(normalize_link("HTTPS://EXAMPLE.COM/x/!"), "https://example.com/x");
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let first = extract_links("see https://Example.com/Docs/, https://foo.org/a?x=1; http://bar.net!");
        let joined = first.iter().cloned().collect::<Vec<_>>().join(" ");
        assert_eq!(extract_links(&joined), first);
    }

    #[test]
    fn test_no_links() {
        assert!(extract_links("no links here, just www.example.com").is_empty());
    }
}
