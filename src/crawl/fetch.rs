//! Single-page fetching

use crate::config::CrawlConfig;
use crate::error::{Error, Result};
use crate::parse::parse_html;
use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Content and title stored for pages that could not be read
pub const UNAVAILABLE: &str = "NA";

/// Status recorded when no HTTP response arrived at all
pub const TRANSPORT_FAILURE: u16 = 500;

/// Result of fetching one URL. Fetching never fails: network problems are
/// folded into the status code.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: Url,
    pub status: u16,
    pub content: String,
    pub title: String,
    pub links: Vec<Url>,
}

impl FetchedPage {
    fn unavailable(url: &Url, status: u16) -> Self {
        Self {
            url: url.clone(),
            status,
            content: UNAVAILABLE.to_string(),
            title: UNAVAILABLE.to_string(),
            links: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client for crawl fetches (redirects are recorded, never followed)
#[derive(Clone)]
pub struct PageFetcher {
    client: Client,
}

impl PageFetcher {
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if !config.referrer.is_empty() {
            let referrer = HeaderValue::from_str(&config.referrer)
                .map_err(|e| Error::Config(format!("Invalid referrer: {}", e)))?;
            headers.insert(REFERER, referrer);
        }

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::Crawl(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Fetch `url`, parsing title and links out of successful responses
    pub async fn fetch(&self, url: &Url) -> FetchedPage {
        debug!("Fetching: {}", url);

        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %url, error = %e, "Fetch failed");
                return FetchedPage::unavailable(url, TRANSPORT_FAILURE);
            }
        };

        let status = response.status();
        if !status.is_success() {
            debug!(url = %url, status = status.as_u16(), "Non-success response");
            return FetchedPage::unavailable(url, status.as_u16());
        }

        let content = match response.text().await {
            Ok(content) => content,
            Err(e) => {
                warn!(url = %url, error = %e, "Failed to read response body");
                return FetchedPage::unavailable(url, TRANSPORT_FAILURE);
            }
        };

        let parsed = parse_html(&content, url);
        FetchedPage {
            url: url.clone(),
            status: status.as_u16(),
            title: parsed.title.unwrap_or_default(),
            links: parsed.links,
            content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> PageFetcher {
        let config = CrawlConfig {
            timeout_secs: 5,
            ..CrawlConfig::default()
        };
        PageFetcher::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .and(header("referer", "http://www.google.com"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                "<title>Страница</title><a href=\"/next\">x</a>",
                "text/html; charset=utf-8",
            ))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/page", server.uri())).unwrap();
        let page = fetcher().fetch(&url).await;

        assert!(page.is_success());
        assert_eq!(page.title, "Страница");
        assert_eq!(page.links.len(), 1);
        assert_eq!(page.links[0].path(), "/next");
    }

    #[tokio::test]
    async fn test_fetch_error_status_and_redirect() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("gone"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/moved"))
            .respond_with(
                ResponseTemplate::new(301).insert_header("location", "/elsewhere"),
            )
            .mount(&server)
            .await;

        let missing = Url::parse(&format!("{}/missing", server.uri())).unwrap();
        let page = fetcher().fetch(&missing).await;
        assert_eq!(page.status, 404);
        assert_eq!(page.content, UNAVAILABLE);
        assert_eq!(page.title, UNAVAILABLE);

        let moved = Url::parse(&format!("{}/moved", server.uri())).unwrap();
        let page = fetcher().fetch(&moved).await;
        assert_eq!(page.status, 301);
        assert!(page.links.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_transport_failure() {
        // Nothing listens on port 1
        let url = Url::parse("http://127.0.0.1:1/").unwrap();
        let page = fetcher().fetch(&url).await;
        assert_eq!(page.status, TRANSPORT_FAILURE);
        assert_eq!(page.content, UNAVAILABLE);
    }
}
