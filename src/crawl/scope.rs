//! Site boundaries
//!
//! A site is everything under its root URL, matched literally. Below the root,
//! path segments must not contain a dot, except for a final `*.html` segment,
//! which keeps images, archives and other assets out of the crawl.

use crate::error::{Error, Result};
use url::Url;

/// The part of the web that belongs to one configured site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteScope {
    root: Url,
}

impl SiteScope {
    /// Build a scope from a configured site URL.
    ///
    /// Query and fragment are dropped and the root path always ends with `/`.
    pub fn new(site_url: &str) -> Result<Self> {
        let mut root = Url::parse(site_url.trim())
            .map_err(|e| Error::Config(format!("Invalid site URL {}: {}", site_url, e)))?;

        if !matches!(root.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "Site URL must be http or https: {}",
                site_url
            )));
        }
        if root.host_str().is_none() {
            return Err(Error::Config(format!("Site URL has no host: {}", site_url)));
        }

        root.set_query(None);
        root.set_fragment(None);
        if !root.path().ends_with('/') {
            let path = format!("{}/", root.path());
            root.set_path(&path);
        }

        Ok(Self { root })
    }

    /// Normalized root URL (always ends with `/`)
    pub fn root(&self) -> &Url {
        &self.root
    }

    /// Whether `url` is a crawlable page of this site
    pub fn contains(&self, url: &Url) -> bool {
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }

        let raw = url.as_str();
        if raw.contains('#') || raw.chars().any(char::is_whitespace) {
            return false;
        }

        match self.remainder(url) {
            Some(rest) => path_is_crawlable(rest),
            None => false,
        }
    }

    /// Site-relative path of `url` (`/` plus everything after the root,
    /// query included), or `None` when the URL is not under the root.
    pub fn relative_path(&self, url: &Url) -> Option<String> {
        let mut url = url.clone();
        url.set_fragment(None);
        self.remainder(&url).map(|rest| format!("/{}", rest))
    }

    fn remainder<'a>(&self, url: &'a Url) -> Option<&'a str> {
        let raw = url.as_str();
        let root = self.root.as_str();
        if let Some(rest) = raw.strip_prefix(root) {
            Some(rest)
        } else if raw == root.trim_end_matches('/') {
            Some("")
        } else {
            None
        }
    }
}

impl std::fmt::Display for SiteScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.root)
    }
}

fn path_is_crawlable(rest: &str) -> bool {
    let path = rest.split('?').next().unwrap_or_default();
    let segments: Vec<&str> = path.split('/').collect();
    let last = segments.len().saturating_sub(1);

    segments.iter().enumerate().all(|(i, segment)| {
        !segment.contains('.') || (i == last && segment.ends_with(".html"))
    })
}

/// Canonical form of a configured site URL, or `None` if it is not one
pub fn normalize_site_url(site_url: &str) -> Option<String> {
    SiteScope::new(site_url).ok().map(|s| s.root.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_root_normalization() {
        let scope = SiteScope::new("https://example.com/docs?x=1#top").unwrap();
        assert_eq!(scope.root().as_str(), "https://example.com/docs/");

        let scope = SiteScope::new("https://example.com").unwrap();
        assert_eq!(scope.root().as_str(), "https://example.com/");

        assert!(SiteScope::new("ftp://example.com").is_err());
        assert!(SiteScope::new("not a url").is_err());
        assert_eq!(
            normalize_site_url("http://example.com/a").as_deref(),
            Some("http://example.com/a/")
        );
    }

    #[test]
    fn test_contains_prefix() {
        let scope = SiteScope::new("https://example.com/docs/").unwrap();
        assert!(scope.contains(&url("https://example.com/docs/")));
        assert!(scope.contains(&url("https://example.com/docs")));
        assert!(scope.contains(&url("https://example.com/docs/intro")));
        assert!(scope.contains(&url("https://example.com/docs/a/b/?page=2")));
        assert!(!scope.contains(&url("https://example.com/blog/")));
        assert!(!scope.contains(&url("http://example.com/docs/intro")));
        assert!(!scope.contains(&url("https://other.com/docs/intro")));
        assert!(!scope.contains(&url("https://example.com/docs/intro#part")));
    }

    #[test]
    fn test_contains_dot_rules() {
        let scope = SiteScope::new("https://example.com/").unwrap();
        assert!(scope.contains(&url("https://example.com/news/item.html")));
        assert!(!scope.contains(&url("https://example.com/logo.png")));
        assert!(!scope.contains(&url("https://example.com/files/report.pdf")));
        assert!(!scope.contains(&url("https://example.com/v1.2/intro")));
        assert!(!scope.contains(&url("https://example.com/a.html/b")));
    }

    #[test]
    fn test_relative_path() {
        let scope = SiteScope::new("https://example.com/docs/").unwrap();
        assert_eq!(
            scope.relative_path(&url("https://example.com/docs/")).as_deref(),
            Some("/")
        );
        assert_eq!(
            scope.relative_path(&url("https://example.com/docs")).as_deref(),
            Some("/")
        );
        assert_eq!(
            scope
                .relative_path(&url("https://example.com/docs/a/b?q=1#frag"))
                .as_deref(),
            Some("/a/b?q=1")
        );
        assert_eq!(scope.relative_path(&url("https://example.com/other")), None);
    }
}
