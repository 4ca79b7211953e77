//! Target validation and canonicalization.
//!
//! Only absolute http(s) URLs on the configured site host (or its `www.`
//! alias) are accepted. In development mode loopback hosts are allowed too.
//! Accepted URLs lose their fragment and any tracking query parameters, so
//! that variants of the same page collapse onto one queue entry.

use url::{Host, Url};

use beacon_common::config::IndexNowConfig;

/// Host allow-list plus normalization rules for enqueued targets.
#[derive(Debug, Clone)]
pub struct TargetFilter {
    host: String,
    www_host: String,
    allow_loopback: bool,
    tracking_prefixes: Vec<String>,
}

impl TargetFilter {
    pub fn new(host: &str, allow_loopback: bool, tracking_prefixes: Vec<String>) -> Self {
        let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
        Self {
            www_host: format!("www.{host}"),
            host,
            allow_loopback,
            tracking_prefixes: tracking_prefixes
                .into_iter()
                .map(|p| p.to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &IndexNowConfig) -> Self {
        Self::new(&config.host, config.dev_mode, config.tracking_prefixes.clone())
    }

    /// Validate `raw` and return its canonical form, or `None` to drop it.
    pub fn accept(&self, raw: &str) -> Option<String> {
        let url = Url::parse(raw.trim()).ok()?;
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        if !self.host_allowed(&url) {
            return None;
        }
        Some(self.canonicalize(url))
    }

    fn host_allowed(&self, url: &Url) -> bool {
        match url.host() {
            Some(Host::Domain(domain)) => {
                domain == self.host
                    || domain == self.www_host
                    || (self.allow_loopback
                        && (domain == "localhost" || domain.ends_with(".localhost")))
            }
            Some(Host::Ipv4(addr)) => self.allow_loopback && addr.is_loopback(),
            Some(Host::Ipv6(addr)) => self.allow_loopback && addr.is_loopback(),
            None => false,
        }
    }

    /// Drop the fragment and tracking parameters.
    ///
    /// The query is only rewritten when something was removed, which makes
    /// the operation idempotent.
    pub fn canonicalize(&self, mut url: Url) -> String {
        url.set_fragment(None);

        if url.query().is_some() {
            let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
            let kept: Vec<(String, String)> = pairs
                .iter()
                .filter(|(name, _)| !self.is_tracking_param(name))
                .cloned()
                .collect();

            if kept.len() != pairs.len() {
                if kept.is_empty() {
                    url.set_query(None);
                } else {
                    url.query_pairs_mut().clear().extend_pairs(kept);
                }
            }
        }

        url.into()
    }

    fn is_tracking_param(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        self.tracking_prefixes
            .iter()
            .any(|prefix| name.starts_with(prefix.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> TargetFilter {
        TargetFilter::new("energie-profis.de", false, vec!["utm_".to_string()])
    }

    #[test]
    fn test_strips_fragment_and_tracking_params() {
        assert_eq!(
            filter().accept("https://energie-profis.de/b?utm_source=x#frag").as_deref(),
            Some("https://energie-profis.de/b")
        );
    }

    #[test]
    fn test_keeps_non_tracking_params() {
        assert_eq!(
            filter()
                .accept("https://energie-profis.de/search?q=solar&utm_medium=mail&page=2")
                .as_deref(),
            Some("https://energie-profis.de/search?q=solar&page=2")
        );
    }

    #[test]
    fn test_untouched_query_is_preserved_verbatim() {
        assert_eq!(
            filter().accept("https://energie-profis.de/s?q=a%20b").as_deref(),
            Some("https://energie-profis.de/s?q=a%20b")
        );
    }

    #[test]
    fn test_tracking_prefix_is_case_insensitive() {
        assert_eq!(
            filter().accept("https://energie-profis.de/x?UTM_Campaign=y").as_deref(),
            Some("https://energie-profis.de/x")
        );
    }

    #[test]
    fn test_www_alias_accepted() {
        assert!(filter().accept("https://www.energie-profis.de/solar").is_some());
    }

    #[test]
    fn test_foreign_and_malformed_targets_rejected() {
        let f = filter();
        assert_eq!(f.accept("https://evil.example/x"), None);
        assert_eq!(f.accept("https://sub.energie-profis.de/x"), None);
        assert_eq!(f.accept("https://energie-profis.de.evil.example/x"), None);
        assert_eq!(f.accept("/relative/path"), None);
        assert_eq!(f.accept("not a url"), None);
        assert_eq!(f.accept("ftp://energie-profis.de/file"), None);
    }

    #[test]
    fn test_loopback_only_in_dev_mode() {
        let prod = filter();
        let dev = TargetFilter::new("energie-profis.de", true, vec!["utm_".to_string()]);
        for raw in [
            "http://localhost:8080/a",
            "http://127.0.0.1/a",
            "http://[::1]/a",
            "http://app.localhost/a",
        ] {
            assert_eq!(prod.accept(raw), None, "{raw}");
            assert!(dev.accept(raw).is_some(), "{raw}");
        }
    }

    #[test]
    fn test_host_match_ignores_case() {
        let f = TargetFilter::new("Energie-Profis.DE", false, vec![]);
        assert_eq!(
            f.accept("https://ENERGIE-PROFIS.de/Path").as_deref(),
            Some("https://energie-profis.de/Path")
        );
    }

    #[test]
    fn test_canonicalize_is_idempotent() {
        let f = filter();
        for raw in [
            "https://energie-profis.de/b?utm_source=x#frag",
            "https://energie-profis.de/search?q=solar+panels&utm_medium=mail&page=2",
            "https://energie-profis.de/s?q=a%20b&x=%C3%A4",
            "https://energie-profis.de",
            "https://energie-profis.de/empty?",
        ] {
            let once = f.accept(raw).unwrap();
            let twice = f.accept(&once).unwrap();
            assert_eq!(once, twice, "{raw}");
        }
    }
}
