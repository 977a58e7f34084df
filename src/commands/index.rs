//! Index, stop and index-page commands

use crate::engine::{PageOutcome, SearchEngine, StartOutcome, StopOutcome};
use crate::error::Result;
use crate::progress::add_spinner;
use std::time::Duration;
use tracing::{info, warn};

/// Re-crawl every configured site and wait for the runs to finish.
///
/// Ctrl-C stops the runs; the command still waits for them to wind down.
pub async fn cmd_index(engine: &SearchEngine, show_progress: bool) -> Result<StartOutcome> {
    let outcome = engine.start_all().await?;
    if outcome == StartOutcome::AlreadyRunning {
        return Ok(outcome);
    }

    let spinner = show_progress.then(|| add_spinner("Indexing"));
    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    let mut stopping = false;

    let wait = engine.wait_for_runs();
    tokio::pin!(wait);

    loop {
        tokio::select! {
            _ = &mut wait => break,
            _ = ticker.tick() => {
                if let Some(pb) = &spinner {
                    if let Ok(pages) = engine.db().count_all_pages().await {
                        pb.set_message(format!("Indexing: {} pages stored", pages));
                    }
                }
            }
            _ = tokio::signal::ctrl_c(), if !stopping => {
                stopping = true;
                warn!("Interrupted, stopping indexing");
                engine.stop_all().await?;
            }
        }
    }

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    info!("Indexing finished");
    Ok(outcome)
}

/// Stop indexing, including runs owned by another process
pub async fn cmd_stop(engine: &SearchEngine) -> Result<StopOutcome> {
    engine.stop_all().await
}

/// Re-fetch and re-index a single page
pub async fn cmd_index_page(engine: &SearchEngine, url: &str) -> Result<PageOutcome> {
    info!(url = %url, "Reindexing page");
    engine.index_single_page(url).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, SiteConfig};
    use crate::meta::SiteStatus;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn engine_for(server: &MockServer, tmp: &TempDir) -> SearchEngine {
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        config.sites.push(SiteConfig {
            url: server.uri(),
            name: "Mock".to_string(),
        });
        config.crawl.politeness_delay_ms = 0;
        config.crawl.rate_limit_per_host = 1000.0;
        SearchEngine::open(config).await.unwrap()
    }

    #[tokio::test]
    async fn test_cmd_index_waits_for_completion() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<p>Первая страница.</p>", "text/html; charset=utf-8"),
            )
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let engine = engine_for(&server, &tmp).await;

        let outcome = cmd_index(&engine, false).await.unwrap();
        assert_eq!(outcome, StartOutcome::Started { sites: 1 });
        assert!(!engine.is_running().await);

        let sites = engine.db().list_sites().await.unwrap();
        assert_eq!(sites[0].status().unwrap(), SiteStatus::Indexed);

        assert_eq!(cmd_stop(&engine).await.unwrap(), StopOutcome::NotRunning);
    }

    #[tokio::test]
    async fn test_cmd_index_page_out_of_scope() {
        let server = MockServer::start().await;
        let tmp = TempDir::new().unwrap();
        let engine = engine_for(&server, &tmp).await;

        let outcome = cmd_index_page(&engine, "https://unrelated.example/")
            .await
            .unwrap();
        assert_eq!(outcome, PageOutcome::OutOfScope);
    }
}
