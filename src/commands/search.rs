//! Search command implementation

use crate::engine::SearchEngine;
use crate::error::Result;
use crate::rank::{SearchHit, SearchOutcome, SearchRequest};
use tracing::info;

/// Search options from the command line
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Restrict to one configured site root
    pub site: Option<String>,
    pub offset: usize,
    pub limit: Option<usize>,
}

/// Run a ranked search
pub async fn cmd_search(
    engine: &SearchEngine,
    query: &str,
    options: SearchOptions,
) -> Result<SearchOutcome> {
    info!("Searching: {}", query);

    let request = SearchRequest {
        query: query.to_string(),
        site: options.site,
        offset: options.offset,
        limit: options.limit,
    };
    engine.search(&request).await
}

/// Print search results to console
pub fn print_search_results(count: usize, hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("No results found ({} matching pages).", count);
        return;
    }

    println!("\n🔍 {} matching pages\n", count);
    for hit in hits {
        let title = if hit.title.is_empty() {
            hit.uri.as_str()
        } else {
            hit.title.as_str()
        };
        println!("[{:.3}] {}", hit.relevance, title);
        println!("  {}{}", hit.site, hit.uri);
        println!("  Site: {}", hit.site_name);
        if let Some(snippet) = &hit.snippet {
            println!("  {}", snippet);
        }
        println!();
    }
}
