//! URL helpers shared by the classifier, catalog store and orchestrator.

use regex::Regex;
use url::Url;

/// Whether this URL is one the engine inspects at all.
pub fn is_supported(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

/// Lowercased host of `url`, if it has one.
pub fn host(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(|h| h.to_lowercase()))
}

/// Registrable-domain heuristic: the host with a single leading `www.`
/// label stripped. Good enough for catalog channel lookup without carrying
/// a public-suffix list; see DESIGN.md.
pub fn registrable_domain(url: &str) -> Option<String> {
    host(url).map(|h| match h.strip_prefix("www.") {
        Some(stripped) => stripped.to_string(),
        None => h,
    })
}

/// Whether `url`'s host is `domain` or a subdomain of it. Matches on label
/// boundaries, never on raw substrings.
pub fn host_matches_domain(url: &str, domain: &str) -> bool {
    let Some(h) = host(url) else {
        return false;
    };
    let domain = domain.to_lowercase();
    h == domain || h.ends_with(&format!(".{domain}"))
}

/// Whether two URLs share a registrable domain.
pub fn domains_match(a: &str, b: &str) -> bool {
    match (registrable_domain(a), registrable_domain(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Wildcard match: `*` in `pattern` matches any run of characters, every
/// other character is literal.
pub fn match_wildcard(text: &str, pattern: &str) -> bool {
    let mut regex_pattern = String::with_capacity(pattern.len() + 8);
    regex_pattern.push('^');
    let mut first = true;
    for part in pattern.split('*') {
        if !first {
            regex_pattern.push_str(".*");
        }
        first = false;
        regex_pattern.push_str(&regex::escape(part));
    }
    regex_pattern.push('$');

    match Regex::new(&regex_pattern) {
        Ok(regex) => regex.is_match(text),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_schemes() {
        assert!(is_supported("https://example.com/page"));
        assert!(is_supported("http://example.com"));
        assert!(!is_supported("chrome://settings"));
        assert!(!is_supported("not a url"));
    }

    #[test]
    fn test_registrable_domain_strips_www() {
        assert_eq!(
            registrable_domain("https://www.example.com/a").as_deref(),
            Some("example.com")
        );
        assert_eq!(
            registrable_domain("https://shop.example.com").as_deref(),
            Some("shop.example.com")
        );
    }

    #[test]
    fn test_host_matches_domain_on_label_boundary() {
        assert!(host_matches_domain("https://www.carmax.com/cars", "carmax.com"));
        assert!(host_matches_domain("https://carmax.com", "carmax.com"));
        // "notcarmax.com" must not match "carmax.com".
        assert!(!host_matches_domain("https://notcarmax.com", "carmax.com"));
    }

    #[test]
    fn test_domains_match_ignores_www() {
        assert!(domains_match(
            "https://www.example.com/landing",
            "https://example.com/other"
        ));
        assert!(!domains_match("https://example.com", "https://example.org"));
    }

    #[test]
    fn test_match_wildcard() {
        assert!(match_wildcard(
            "https://example.com/checkout/complete",
            "https://example.com/checkout/*"
        ));
        assert!(match_wildcard("anything", "*"));
        // Leading wildcards must not be swallowed.
        assert!(match_wildcard(
            "https://shop.example.com/checkout/done",
            "*checkout*"
        ));
        assert!(!match_wildcard("https://shop.example.com/cart", "*checkout*"));
        assert!(!match_wildcard(
            "https://example.com/cart",
            "https://example.com/checkout/*"
        ));
        // Dots are literal, not regex metacharacters.
        assert!(!match_wildcard(
            "https://exampleXcom/checkout/done",
            "https://example.com/checkout/*"
        ));
    }
}
