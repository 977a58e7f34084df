//! Stats command implementation

use crate::engine::{SearchEngine, Statistics};
use crate::error::Result;
use tracing::info;

/// Collect index statistics
pub async fn cmd_stats(engine: &SearchEngine) -> Result<Statistics> {
    info!("Getting statistics");
    engine.statistics().await
}

/// Print statistics to console
pub fn print_statistics(stats: &Statistics) {
    println!("\n📊 lemmasearch Statistics\n");
    println!("Sites: {}", stats.total.sites);
    println!("Pages: {}", stats.total.pages);
    println!("Lemmas: {}", stats.total.lemmas);
    println!(
        "Indexing: {}",
        if stats.total.indexing { "running" } else { "idle" }
    );

    if stats.detailed.is_empty() {
        println!("\nNo sites indexed yet. Run 'lemmasearch index' to start.");
        return;
    }

    println!();
    for site in &stats.detailed {
        let marker = match site.status.as_str() {
            "INDEXED" => "✓",
            "INDEXING" => "…",
            _ => "✗",
        };
        println!("{} {} [{}]", marker, site.name, site.status);
        println!("  URL: {}", site.url);
        println!("  Pages: {}, Lemmas: {}", site.pages, site.lemmas);
        println!("  Updated: {}", site.status_time);
        if let Some(error) = &site.error {
            println!("  Error: {}", error);
        }
        println!();
    }
}
