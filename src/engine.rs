//! Indexing orchestration
//!
//! [`SearchEngine`] owns the site state machine:
//!
//! ```text
//! (none) --start--> INDEXING --crawl+index ok--> INDEXED
//!                      |
//!                      +--stop / error / stale--> FAILED
//! ```
//!
//! Each configured site gets its own run: crawl, then index every stored
//! 2xx page, then verify lemma frequencies. Runs are tracked in-process so a
//! stop can raise their cancellation flags; the stored status covers stops
//! issued from another process.

use crate::config::Config;
use crate::crawl::{CrawlContext, Crawler, SiteScope};
use crate::error::{Error, Result};
use crate::index::Indexer;
use crate::lemma::Lemmatizer;
use crate::meta::{Page, SearchDb, SiteStatus};
use crate::morph::DictionaryAnalyzer;
use crate::rank::{Ranker, SearchOutcome, SearchRequest};
use chrono::Utc;
use futures::future::join_all;
use futures::{stream, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

/// Recorded on sites failed by an operator stop
pub const STOPPED_BY_USER: &str = "Indexing stopped by user";

/// Recorded on INDEXING sites whose run died without finishing
pub const INTERRUPTED: &str = "Indexing was interrupted";

/// Outcome of a full indexing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started { sites: usize },
    AlreadyRunning,
}

/// Outcome of a stop request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped { sites: u64 },
    NotRunning,
}

/// Outcome of a single-page reindex
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    Indexed {
        site: String,
        path: String,
        code: u16,
        lemmas: usize,
    },
    OutOfScope,
    IndexingInProgress,
}

/// Index-wide totals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotalStatistics {
    pub sites: usize,
    pub pages: i64,
    pub lemmas: i64,
    pub indexing: bool,
}

/// Per-site statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteStatistics {
    pub url: String,
    pub name: String,
    pub status: String,
    pub status_time: String,
    pub error: Option<String>,
    pub pages: i64,
    pub lemmas: i64,
}

/// Snapshot of the whole index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statistics {
    pub total: TotalStatistics,
    pub detailed: Vec<SiteStatistics>,
}

struct SiteRun {
    ctx: Arc<CrawlContext>,
    handle: Option<JoinHandle<()>>,
}

impl SiteRun {
    fn is_live(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

/// The search engine: crawling, indexing, statistics and search
#[derive(Clone)]
pub struct SearchEngine {
    config: Arc<Config>,
    db: SearchDb,
    crawler: Crawler,
    indexer: Indexer,
    ranker: Ranker,
    runs: Arc<Mutex<HashMap<i64, SiteRun>>>,
}

impl SearchEngine {
    /// Open the configured database and build every component
    pub async fn open(config: Config) -> Result<Self> {
        let db = SearchDb::connect(&config).await?;
        db.init_schema().await?;
        Self::with_db(config, db)
    }

    /// Build an engine over an already initialized database
    pub fn with_db(config: Config, db: SearchDb) -> Result<Self> {
        let analyzer = DictionaryAnalyzer::from_config(&config.morphology)?;
        let lemmatizer = Lemmatizer::new(Arc::new(analyzer));

        Ok(Self {
            crawler: Crawler::new(&config.crawl, db.clone())?,
            indexer: Indexer::new(db.clone(), lemmatizer.clone()),
            ranker: Ranker::new(db.clone(), lemmatizer, config.search.clone()),
            config: Arc::new(config),
            db,
            runs: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn db(&self) -> &SearchDb {
        &self.db
    }

    /// Discard all indexed data and re-crawl every configured site
    pub async fn start_all(&self) -> Result<StartOutcome> {
        let mut runs = self.runs.lock().await;
        runs.retain(|_, run| run.is_live());
        if !runs.is_empty() {
            return Ok(StartOutcome::AlreadyRunning);
        }

        // A run owned by another process keeps its heartbeat fresh
        let stale_after = chrono::Duration::seconds(
            i64::try_from(self.config.crawl.stale_after_secs).unwrap_or(i64::MAX),
        );
        for site in self.db.list_sites_by_status(SiteStatus::Indexing).await? {
            let fresh = site
                .status_time()
                .is_some_and(|t| Utc::now().signed_duration_since(t) < stale_after);
            if fresh {
                info!(site = %site.url, "Indexing already running elsewhere");
                return Ok(StartOutcome::AlreadyRunning);
            }

            warn!(site = %site.url, "Recovering interrupted indexing run");
            self.db
                .transition_site(site.id, SiteStatus::Indexing, SiteStatus::Failed, Some(INTERRUPTED))
                .await?;
        }

        // Validate every site before touching stored data
        let scopes = self
            .config
            .sites
            .iter()
            .map(|site| SiteScope::new(&site.url).map(|scope| (site, scope)))
            .collect::<Result<Vec<_>>>()?;

        self.db.clear_all().await?;
        let released = self.indexer.release_site_locks().await;
        debug!(released, "Released writer locks of cleared sites");

        for (site_config, scope) in scopes {
            let site = self
                .db
                .insert_site(scope.root().as_str(), &site_config.name, SiteStatus::Indexing)
                .await?;
            let site_id = site.id;
            let ctx = Arc::new(CrawlContext::new(site, scope, &self.config.crawl));

            let engine = self.clone();
            let run_ctx = ctx.clone();
            let handle = tokio::spawn(async move { engine.run_site(run_ctx).await });

            runs.insert(
                site_id,
                SiteRun {
                    ctx,
                    handle: Some(handle),
                },
            );
        }

        info!(sites = runs.len(), "Indexing started");
        Ok(StartOutcome::Started { sites: runs.len() })
    }

    /// Stop every INDEXING site, here or in another process
    pub async fn stop_all(&self) -> Result<StopOutcome> {
        {
            let runs = self.runs.lock().await;
            for run in runs.values() {
                run.ctx.cancel();
            }
        }

        let stopped = self.db.fail_indexing_sites(STOPPED_BY_USER).await?;
        if stopped == 0 {
            return Ok(StopOutcome::NotRunning);
        }

        info!(sites = stopped, "Indexing stopped");
        Ok(StopOutcome::Stopped { sites: stopped })
    }

    /// Wait until every run started by this engine has finished
    pub async fn wait_for_runs(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut runs = self.runs.lock().await;
            runs.values_mut().filter_map(|run| run.handle.take()).collect()
        };

        for joined in join_all(handles).await {
            if let Err(e) = joined {
                error!(error = %e, "Site run panicked");
            }
        }
    }

    /// Whether any run started by this engine is still going
    pub async fn is_running(&self) -> bool {
        self.runs.lock().await.values().any(SiteRun::is_live)
    }

    async fn run_site(self, ctx: Arc<CrawlContext>) {
        let site_id = ctx.site.id;
        let url = ctx.site.url.clone();

        match self.index_site(&ctx).await {
            Ok(true) => {
                match self
                    .db
                    .transition_site(site_id, SiteStatus::Indexing, SiteStatus::Indexed, None)
                    .await
                {
                    Ok(true) => info!(site = %url, "Site indexed"),
                    Ok(false) => info!(site = %url, "Site left INDEXING before completion"),
                    Err(e) => error!(site = %url, error = %e, "Failed to mark site indexed"),
                }
            }
            Ok(false) => info!(site = %url, "Indexing cancelled"),
            Err(e) => {
                error!(site = %url, error = %e, "Indexing failed");
                let message = e.to_string();
                if let Err(e) = self
                    .db
                    .transition_site(site_id, SiteStatus::Indexing, SiteStatus::Failed, Some(&message))
                    .await
                {
                    error!(site = %url, error = %e, "Failed to mark site failed");
                }
            }
        }
    }

    /// Crawl and index one site. Returns false when the run was cancelled.
    async fn index_site(&self, ctx: &Arc<CrawlContext>) -> Result<bool> {
        let pages = self.crawler.crawl(ctx.clone()).await?;
        if ctx.is_cancelled(&self.db).await? {
            return Ok(false);
        }

        if !self.index_pages(ctx, pages).await? {
            return Ok(false);
        }

        self.db.check_frequency_invariant(ctx.site.id).await?;
        Ok(true)
    }

    /// Index the 2xx pages of a run. Every page first polls the run's
    /// cancellation, so a stop from another process halts indexing too.
    /// Returns false when the run was cancelled.
    async fn index_pages(&self, ctx: &Arc<CrawlContext>, pages: Vec<Page>) -> Result<bool> {
        let indexable: Vec<Page> = pages.into_iter().filter(Page::is_indexable).collect();
        info!(site = %ctx.site.url, pages = indexable.len(), "Indexing pages");

        let indexer = &self.indexer;
        let db = &self.db;
        stream::iter(indexable.into_iter().map(Ok::<_, Error>))
            .try_for_each_concurrent(self.config.index.concurrency.max(1), move |page| async move {
                if ctx.is_cancelled(db).await? {
                    return Ok(());
                }
                indexer.index_page(&page).await.map(|_| ())
            })
            .await?;

        Ok(!ctx.is_cancelled(db).await?)
    }

    /// Re-fetch and re-index one page of a configured site
    pub async fn index_single_page(&self, url: &str) -> Result<PageOutcome> {
        let Ok(mut url) = Url::parse(url.trim()) else {
            return Ok(PageOutcome::OutOfScope);
        };
        url.set_fragment(None);

        let Some((site_config, scope)) = self.config.site_for_url(&url) else {
            return Ok(PageOutcome::OutOfScope);
        };
        let Some(path) = scope.relative_path(&url) else {
            return Ok(PageOutcome::OutOfScope);
        };

        let site = match self.db.get_site_by_url(scope.root().as_str()).await? {
            Some(site) if site.status()? == SiteStatus::Indexing => {
                return Ok(PageOutcome::IndexingInProgress);
            }
            Some(site) => site,
            None => {
                self.db
                    .insert_site(scope.root().as_str(), &site_config.name, SiteStatus::Indexed)
                    .await?
            }
        };

        if let Some(old) = self.db.get_page_by_path(site.id, &path).await? {
            self.indexer.remove_page(&old).await?;
        }

        let fetched = self.crawler.fetch(&url).await?;
        let page = self
            .db
            .upsert_page(site.id, &path, fetched.status, &fetched.content, &fetched.title)
            .await?;

        let lemmas = if page.is_indexable() {
            self.indexer.index_page(&page).await?.total()
        } else {
            0
        };

        info!(site = %site.url, path = %path, code = fetched.status, lemmas, "Page reindexed");
        Ok(PageOutcome::Indexed {
            site: site.url,
            path,
            code: fetched.status,
            lemmas,
        })
    }

    /// Totals plus per-site details for every configured site with a row
    pub async fn statistics(&self) -> Result<Statistics> {
        let indexing = !self
            .db
            .list_sites_by_status(SiteStatus::Indexing)
            .await?
            .is_empty();

        let mut detailed = Vec::new();
        for site_config in &self.config.sites {
            let Ok(scope) = SiteScope::new(&site_config.url) else {
                continue;
            };
            let Some(site) = self.db.get_site_by_url(scope.root().as_str()).await? else {
                continue;
            };

            detailed.push(SiteStatistics {
                pages: self.db.count_pages(site.id).await?,
                lemmas: self.db.count_lemmas(site.id).await?,
                url: site.url,
                name: site.name,
                status: site.status,
                status_time: site.status_time,
                error: site.last_error,
            });
        }

        Ok(Statistics {
            total: TotalStatistics {
                sites: self.config.sites.len(),
                pages: self.db.count_all_pages().await?,
                lemmas: self.db.count_all_lemmas().await?,
                indexing,
            },
            detailed,
        })
    }

    /// Ranked search
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchOutcome> {
        self.ranker.search(request).await
    }
}
