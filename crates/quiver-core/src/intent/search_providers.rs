//! Search-results-page detection and query extraction.

use url::Url;

use crate::urls;

/// A known search provider and the query parameter its results pages carry.
#[derive(Debug, Clone, Copy)]
pub struct SearchProvider {
    pub domain: &'static str,
    pub query_param: &'static str,
}

/// Providers whose results pages we recognize. Matching is by registrable
/// domain containment, so country variants like `search.yahoo.com` resolve
/// through their parent domain entry.
pub const SEARCH_PROVIDERS: &[SearchProvider] = &[
    SearchProvider {
        domain: "google.com",
        query_param: "q",
    },
    SearchProvider {
        domain: "bing.com",
        query_param: "q",
    },
    SearchProvider {
        domain: "duckduckgo.com",
        query_param: "q",
    },
    SearchProvider {
        domain: "yahoo.com",
        query_param: "p",
    },
    SearchProvider {
        domain: "yandex.com",
        query_param: "text",
    },
    SearchProvider {
        domain: "ecosia.org",
        query_param: "q",
    },
    SearchProvider {
        domain: "fireball.com",
        query_param: "q",
    },
    SearchProvider {
        domain: "qwant.com",
        query_param: "q",
    },
];

/// Extract the search query from `url` if it is a recognized results page.
///
/// Returns `None` for provider home pages and preference pages that carry
/// no query parameter.
pub fn extract_search_query(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed.host_str()?;

    let provider = SEARCH_PROVIDERS
        .iter()
        .find(|provider| urls::host_matches_domain(url, provider.domain))?;

    parsed
        .query_pairs()
        .find(|(name, _)| name == provider.query_param)
        .map(|(_, value)| value.into_owned())
        .filter(|query| !query.is_empty())
}

/// Whether `url` is a search results page.
pub fn is_search_results_page(url: &str) -> bool {
    extract_search_query(url).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_query_from_known_providers() {
        let cases = [
            (
                "https://www.google.com/search?q=this+is+a+test+search&sourceid=chrome",
                "this is a test search",
            ),
            (
                "https://duckduckgo.com/?q=this+is+another+test+search&t=h_&ia=videos",
                "this is another test search",
            ),
            (
                "https://www.bing.com/search?q=audi+a6+review+2020&qs=HS",
                "audi a6 review 2020",
            ),
            (
                "https://search.yahoo.com/search?p=audi+a6+review+2020&fr=sfp",
                "audi a6 review 2020",
            ),
            (
                "https://yandex.com/search/?text=audi%20a6%20review%202020&lr=109565",
                "audi a6 review 2020",
            ),
            (
                "https://www.ecosia.org/search?q=audi+a6+review",
                "audi a6 review",
            ),
            (
                "https://fireball.com/search?q=audi+a6+review",
                "audi a6 review",
            ),
        ];

        for (url, expected) in cases {
            assert_eq!(extract_search_query(url).as_deref(), Some(expected), "{url}");
        }
    }

    #[test]
    fn test_home_and_preference_pages_are_not_results_pages() {
        assert!(!is_search_results_page("https://duckduckgo.com/"));
        assert!(!is_search_results_page(
            "https://www.google.com/preferences?hl=en-GB&fg=1"
        ));
        assert!(!is_search_results_page("https://news.example.org/"));
    }
}
