//! Default values for configuration

/// Default user agent (a desktop browser, many sites refuse bare clients)
pub fn default_crawl_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/111.0.0.0 Safari/537.36".to_string()
}

/// Default referrer sent with every request
pub fn default_crawl_referrer() -> String {
    "http://www.google.com".to_string()
}

/// Default request timeout in seconds
pub fn default_crawl_timeout() -> u64 {
    20
}

/// Default delay before each fetch (milliseconds)
pub fn default_politeness_delay() -> u64 {
    2500
}

/// Default rate limit (requests per second per site)
pub fn default_crawl_rate_limit() -> f64 {
    2.0
}

/// Default number of fetches in flight across all crawl tasks
pub fn default_max_concurrent_fetches() -> usize {
    8
}

/// URLs longer than this are treated as degenerate and never followed
pub fn default_max_url_length() -> usize {
    100
}

/// Refresh the site heartbeat every N newly visited URLs
pub fn default_heartbeat_every() -> usize {
    100
}

/// An INDEXING site whose heartbeat is older than this is considered abandoned
pub fn default_stale_after() -> u64 {
    1800
}

/// Default number of pages indexed concurrently per site
pub fn default_index_concurrency() -> usize {
    4
}

/// Default page size for search results
pub fn default_search_limit() -> usize {
    20
}

/// Rarest query lemmas used to narrow the candidate set
pub fn default_max_query_lemmas() -> usize {
    20
}

/// Snippet windows close once they exceed this many characters
pub fn default_snippet_window_chars() -> usize {
    300
}

/// Sentences longer than this are re-chunked
pub fn default_sentence_split_chars() -> usize {
    200
}

/// Re-chunking cuts at the first whitespace after this many characters
pub fn default_sentence_cut_after_chars() -> usize {
    100
}

/// Default analyzer language
pub fn default_morphology_language() -> String {
    "russian".to_string()
}

/// Default: words missing from the dictionary are their own normal form
pub fn default_accept_unknown_words() -> bool {
    true
}
