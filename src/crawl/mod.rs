//! Site crawling with cooperative cancellation and rate limiting
//!
//! This module provides:
//! - Site scoping (literal root prefix plus a path grammar)
//! - Per-run visited tracking
//! - Politeness delays and rate limiting
//! - A recursive fork/join crawl over spawned tasks
//!
//! A crawl stops spawning work as soon as its run is cancelled, either through
//! the in-process flag or because the site row left the INDEXING state.

mod fetch;
mod rate_limit;
mod scope;
mod visited;

pub use fetch::*;
pub use rate_limit::*;
pub use scope::*;
pub use visited::*;

use crate::config::CrawlConfig;
use crate::error::{Error, Result};
use crate::meta::{Page, SearchDb, Site, SiteStatus};
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, trace, warn};
use url::Url;
use uuid::Uuid;

/// State shared by every task of one site crawl
#[derive(Debug)]
pub struct CrawlContext {
    pub run_id: Uuid,
    pub site: Site,
    pub scope: SiteScope,
    pub visited: VisitedTracker,
    cancelled: AtomicBool,
    politeness: Politeness,
    discovered: AtomicUsize,
}

impl CrawlContext {
    pub fn new(site: Site, scope: SiteScope, config: &CrawlConfig) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            site,
            scope,
            visited: VisitedTracker::new(),
            cancelled: AtomicBool::new(false),
            politeness: Politeness::new(
                Duration::from_millis(config.politeness_delay_ms),
                config.rate_limit_per_host,
            ),
            discovered: AtomicUsize::new(0),
        }
    }

    /// Raise the in-process cancellation flag
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether the flag has been raised (no database access)
    pub fn cancel_requested(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Whether the run should stop: the flag is up, or the stored site status
    /// is no longer INDEXING (e.g. another process stopped it).
    pub async fn is_cancelled(&self, db: &SearchDb) -> Result<bool> {
        if self.cancel_requested() {
            return Ok(true);
        }

        match db.site_status(self.site.id).await? {
            Some(SiteStatus::Indexing) => Ok(false),
            status => {
                debug!(site = %self.scope, ?status, "Site left INDEXING, cancelling run");
                self.cancel();
                Ok(true)
            }
        }
    }
}

/// Crawler over one shared HTTP client and fetch budget
#[derive(Clone)]
pub struct Crawler {
    fetcher: PageFetcher,
    db: SearchDb,
    config: Arc<CrawlConfig>,
    permits: Arc<Semaphore>,
}

impl Crawler {
    /// Create a new crawler
    pub fn new(config: &CrawlConfig, db: SearchDb) -> Result<Self> {
        Ok(Self {
            fetcher: PageFetcher::new(config)?,
            db,
            config: Arc::new(config.clone()),
            permits: Arc::new(Semaphore::new(config.max_concurrent_fetches.max(1))),
        })
    }

    /// Fetch a URL while holding one of the shared fetch permits
    pub async fn fetch(&self, url: &Url) -> Result<FetchedPage> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| Error::Crawl(format!("Fetch permits closed: {}", e)))?;
        Ok(self.fetcher.fetch(url).await)
    }

    /// Crawl the context's site from its root, returning every stored page
    pub async fn crawl(&self, ctx: Arc<CrawlContext>) -> Result<Vec<Page>> {
        let root = ctx.scope.root().clone();
        ctx.visited.add(&root).await;

        info!(site = %root, run = %ctx.run_id, "Starting crawl");
        let pages = self.clone().crawl_task(ctx.clone(), root.clone()).await?;
        let visited = ctx.visited.len().await;
        info!(
            site = %root,
            run = %ctx.run_id,
            pages = pages.len(),
            visited = visited,
            cancelled = ctx.cancel_requested(),
            "Crawl finished"
        );
        Ok(pages)
    }

    fn crawl_task(self, ctx: Arc<CrawlContext>, url: Url) -> BoxFuture<'static, Result<Vec<Page>>> {
        async move {
            if ctx.is_cancelled(&self.db).await? {
                return Ok(Vec::new());
            }

            ctx.politeness.wait().await;
            if ctx.is_cancelled(&self.db).await? {
                return Ok(Vec::new());
            }

            let fetched = self.fetch(&url).await?;
            let Some(path) = ctx.scope.relative_path(&url) else {
                warn!(url = %url, "Fetched URL outside site scope");
                return Ok(Vec::new());
            };

            let page = self
                .db
                .upsert_page(
                    ctx.site.id,
                    &path,
                    fetched.status,
                    &fetched.content,
                    &fetched.title,
                )
                .await?;
            trace!(url = %url, code = page.code, "Stored page");

            if ctx.is_cancelled(&self.db).await? {
                return Ok(vec![page]);
            }

            let children = self.discover_links(&ctx, &fetched.links).await?;
            let handles: Vec<_> = children
                .into_iter()
                .map(|child| tokio::spawn(self.clone().crawl_task(ctx.clone(), child)))
                .collect();

            let mut pages = vec![page];
            let mut first_error = None;
            for joined in join_all(handles).await {
                match joined {
                    Ok(Ok(mut child_pages)) => pages.append(&mut child_pages),
                    Ok(Err(e)) => {
                        first_error.get_or_insert(e);
                    }
                    Err(e) => warn!(error = %e, "Crawl task panicked"),
                }
            }

            match first_error {
                Some(e) => Err(e),
                None => Ok(pages),
            }
        }
        .boxed()
    }

    async fn discover_links(&self, ctx: &CrawlContext, links: &[Url]) -> Result<Vec<Url>> {
        let mut children = Vec::new();

        for link in links {
            let mut link = link.clone();
            link.set_fragment(None);

            if !ctx.visited.add(&link).await {
                continue;
            }

            let seen = ctx.discovered.fetch_add(1, Ordering::Relaxed) + 1;
            if seen % self.config.heartbeat_every.max(1) == 0 {
                debug!(site = %ctx.scope, seen, "Heartbeat");
                self.db.touch_site(ctx.site.id).await?;
            }

            if link.as_str().len() > self.config.max_url_length {
                trace!(url = %link, "Skipping overlong URL");
                continue;
            }

            if !ctx.scope.contains(&link) {
                continue;
            }

            let Some(path) = ctx.scope.relative_path(&link) else {
                continue;
            };
            if self.db.page_exists(ctx.site.id, &path).await? {
                continue;
            }

            children.push(link);
        }

        Ok(children)
    }
}
