//! Per-run set of visited URLs

use std::collections::HashSet;
use tokio::sync::Mutex;
use url::Url;

/// URLs already claimed by a crawl run.
///
/// `add` is the only way to claim a URL, so two tasks racing on the same link
/// can never both fetch it.
#[derive(Debug, Default)]
pub struct VisitedTracker {
    seen: Mutex<HashSet<String>>,
}

impl VisitedTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `url`; returns false if it was already claimed
    pub async fn add(&self, url: &Url) -> bool {
        let key = normalize_url(url);
        self.seen.lock().await.insert(key)
    }

    /// Number of URLs claimed so far
    pub async fn len(&self) -> usize {
        self.seen.lock().await.len()
    }
}

/// Normalize a URL for deduplication
pub fn normalize_url(url: &Url) -> String {
    let mut normalized = url.clone();
    normalized.set_fragment(None);

    // Remove trailing slash from path
    let path = url.path().trim_end_matches('/');
    if path.is_empty() {
        normalized.set_path("/");
    } else {
        normalized.set_path(path);
    }

    normalized.to_string()
}
