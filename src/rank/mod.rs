//! Ranked search over the inverted index
//!
//! This module handles:
//! - Search preconditions (site states, filters)
//! - Candidate selection by intersecting the rarest query lemmas
//! - Relevance scoring and normalization
//! - Pagination and snippet enrichment

mod snippet;

pub use snippet::*;

use crate::config::SearchConfig;
use crate::crawl::normalize_site_url;
use crate::error::Result;
use crate::lemma::Lemmatizer;
use crate::meta::{Lemma, Page, SearchDb, Site, SiteStatus};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info};

/// A search query with optional site filter and pagination
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    /// Root URL of the only site to search
    pub site: Option<String>,
    pub offset: usize,
    /// Page size; the configured default when `None`
    pub limit: Option<usize>,
}

/// One ranked page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub site: String,
    pub site_name: String,
    /// Page path relative to the site root, without the leading `/`
    pub uri: String,
    pub title: String,
    pub snippet: Option<String>,
    /// Relevance relative to the best match, in `[0, 1]`
    pub relevance: f64,
}

/// Total match count plus the requested slice
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResults {
    pub count: usize,
    pub results: Vec<SearchHit>,
}

/// Why a search was not run
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum Rejection {
    #[error("Empty search query")]
    EmptyQuery,

    #[error("Sites are being indexed, try again later")]
    IndexingInProgress,

    #[error("Site indexing failed, restart indexing")]
    IndexingFailed,

    #[error("No indexed sites to search, run indexing first")]
    NothingIndexed,

    #[error("Site not found: {0}")]
    SiteNotFound(String),

    #[error("Site is being indexed: {0}")]
    SiteIndexing(String),

    #[error("Site indexing failed: {0}")]
    SiteFailed(String),
}

/// Search outcome
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    Found(SearchResults),
    Rejected(Rejection),
}

/// A matching page before enrichment
#[derive(Debug, Clone)]
struct Candidate {
    site: Site,
    page_id: i64,
    absolute: f64,
}

/// Search ranker
#[derive(Clone)]
pub struct Ranker {
    db: SearchDb,
    lemmatizer: Lemmatizer,
    config: SearchConfig,
}

impl Ranker {
    /// Create a new ranker
    pub fn new(db: SearchDb, lemmatizer: Lemmatizer, config: SearchConfig) -> Self {
        Self {
            db,
            lemmatizer,
            config,
        }
    }

    /// Run a search
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchOutcome> {
        if request.query.trim().is_empty() {
            return Ok(SearchOutcome::Rejected(Rejection::EmptyQuery));
        }

        let sites = match self.sites_to_search(request.site.as_deref()).await? {
            Ok(sites) => sites,
            Err(rejection) => return Ok(SearchOutcome::Rejected(rejection)),
        };

        let lemmas: BTreeSet<String> = self
            .lemmatizer
            .lemmatize(&request.query)
            .into_keys()
            .collect();
        if lemmas.is_empty() {
            debug!(query = %request.query, "Query has no searchable words");
            return Ok(SearchOutcome::Found(SearchResults::default()));
        }

        let mut candidates = Vec::new();
        for site in &sites {
            candidates.extend(self.site_candidates(site, &lemmas).await?);
        }

        let count = candidates.len();
        let limit = request.limit.unwrap_or(self.config.default_limit);
        let query_lemmas: HashSet<String> = lemmas.into_iter().collect();

        let mut results = Vec::new();
        for (candidate, relevance) in rank_candidates(candidates)
            .into_iter()
            .skip(request.offset)
            .take(limit)
        {
            // The page may have been re-indexed away since it was scored
            let Some(page) = self.db.get_page(candidate.page_id).await? else {
                continue;
            };

            results.push(SearchHit {
                uri: page.path.strip_prefix('/').unwrap_or(&page.path).to_string(),
                snippet: self.snippet(&page, &query_lemmas),
                title: page.title,
                site: candidate.site.url,
                site_name: candidate.site.name,
                relevance,
            });
        }

        info!(query = %request.query, count, returned = results.len(), "Search finished");
        Ok(SearchOutcome::Found(SearchResults { count, results }))
    }

    /// Best passage of `page` for the given query lemmas
    pub fn snippet(&self, page: &Page, query_lemmas: &HashSet<String>) -> Option<String> {
        build_snippet(&self.lemmatizer, &page.content, query_lemmas, &self.config)
    }

    async fn sites_to_search(
        &self,
        filter: Option<&str>,
    ) -> Result<std::result::Result<Vec<Site>, Rejection>> {
        let Some(filter) = filter else {
            if !self.db.list_sites_by_status(SiteStatus::Indexing).await?.is_empty() {
                return Ok(Err(Rejection::IndexingInProgress));
            }
            if !self.db.list_sites_by_status(SiteStatus::Failed).await?.is_empty() {
                return Ok(Err(Rejection::IndexingFailed));
            }
            let indexed = self.db.list_sites_by_status(SiteStatus::Indexed).await?;
            if indexed.is_empty() {
                return Ok(Err(Rejection::NothingIndexed));
            }
            return Ok(Ok(indexed));
        };

        let site = match normalize_site_url(filter) {
            Some(url) => self.db.get_site_by_url(&url).await?,
            None => None,
        };
        let Some(site) = site else {
            return Ok(Err(Rejection::SiteNotFound(filter.to_string())));
        };

        match site.status()? {
            SiteStatus::Indexing => Ok(Err(Rejection::SiteIndexing(site.url))),
            SiteStatus::Failed => Ok(Err(Rejection::SiteFailed(site.url))),
            SiteStatus::Indexed => Ok(Ok(vec![site])),
        }
    }

    /// Pages of `site` containing every query lemma, with absolute relevance
    async fn site_candidates(
        &self,
        site: &Site,
        lemmas: &BTreeSet<String>,
    ) -> Result<Vec<Candidate>> {
        let mut rows: Vec<Lemma> = Vec::with_capacity(lemmas.len());
        for lemma in lemmas {
            match self.db.get_lemma(site.id, lemma).await? {
                Some(row) => rows.push(row),
                None => {
                    debug!(site = %site.url, lemma = %lemma, "Lemma missing, skipping site");
                    return Ok(Vec::new());
                }
            }
        }

        let all_ids: Vec<i64> = rows.iter().map(|l| l.id).collect();

        rows.sort_by(|a, b| {
            a.frequency
                .cmp(&b.frequency)
                .then_with(|| a.lemma.cmp(&b.lemma))
        });
        rows.truncate(self.config.max_query_lemmas.max(1));

        let mut pages = self.db.page_ids_for_lemma(rows[0].id).await?;
        for row in &rows[1..] {
            if pages.is_empty() {
                break;
            }
            let with_lemma = self.db.page_ids_for_lemma(row.id).await?;
            pages.retain(|id| with_lemma.contains(id));
        }

        let mut candidates = Vec::with_capacity(pages.len());
        for page_id in pages {
            let absolute = self.db.page_relevance(page_id, &all_ids).await?;
            candidates.push(Candidate {
                site: site.clone(),
                page_id,
                absolute,
            });
        }
        Ok(candidates)
    }
}

/// Normalize against the best match and order by relevance, then page id
fn rank_candidates(candidates: Vec<Candidate>) -> Vec<(Candidate, f64)> {
    let max = candidates
        .iter()
        .map(|c| c.absolute)
        .fold(0.0_f64, f64::max);

    let mut ranked: Vec<(Candidate, f64)> = candidates
        .into_iter()
        .map(|c| {
            let relative = if max > 0.0 { c.absolute / max } else { 0.0 };
            (c, relative)
        })
        .collect();

    ranked.sort_by(|(a, ra), (b, rb)| {
        rb.partial_cmp(ra)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.page_id.cmp(&b.page_id))
    });
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Indexer;
    use crate::meta::tests::setup_test_db;
    use crate::morph::{DictionaryAnalyzer, PartOfSpeech};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn lemmatizer() -> Lemmatizer {
        let analyzer = DictionaryAnalyzer::new(true)
            .with_entry("леса", "лес", PartOfSpeech::Noun)
            .with_entry("лесу", "лес", PartOfSpeech::Noun)
            .with_entry("волки", "волк", PartOfSpeech::Noun);
        Lemmatizer::new(Arc::new(analyzer))
    }

    struct Fixture {
        db: SearchDb,
        ranker: Ranker,
        indexer: Indexer,
        _tmp: TempDir,
    }

    async fn fixture() -> Fixture {
        let (db, tmp) = setup_test_db().await;
        Fixture {
            ranker: Ranker::new(db.clone(), lemmatizer(), SearchConfig::default()),
            indexer: Indexer::new(db.clone(), lemmatizer()),
            db,
            _tmp: tmp,
        }
    }

    impl Fixture {
        async fn site(&self, url: &str, status: SiteStatus) -> Site {
            self.db.insert_site(url, "Site", status).await.unwrap()
        }

        async fn page(&self, site: &Site, path: &str, html: &str) -> Page {
            let page = self
                .db
                .upsert_page(site.id, path, 200, html, path)
                .await
                .unwrap();
            self.indexer.index_page(&page).await.unwrap();
            page
        }

        async fn search(&self, query: &str) -> SearchOutcome {
            self.ranker
                .search(&SearchRequest {
                    query: query.to_string(),
                    ..SearchRequest::default()
                })
                .await
                .unwrap()
        }
    }

    fn found(outcome: SearchOutcome) -> SearchResults {
        match outcome {
            SearchOutcome::Found(results) => results,
            SearchOutcome::Rejected(r) => panic!("unexpected rejection: {}", r),
        }
    }

    fn rejected(outcome: SearchOutcome) -> Rejection {
        match outcome {
            SearchOutcome::Rejected(r) => r,
            SearchOutcome::Found(_) => panic!("expected a rejection"),
        }
    }

    #[tokio::test]
    async fn test_preconditions() {
        let fx = fixture().await;
        assert_eq!(rejected(fx.search("   ").await), Rejection::EmptyQuery);
        assert_eq!(rejected(fx.search("лес").await), Rejection::NothingIndexed);

        let indexing = fx.site("https://a.com/", SiteStatus::Indexing).await;
        assert_eq!(rejected(fx.search("лес").await), Rejection::IndexingInProgress);

        fx.db
            .update_site_status(indexing.id, SiteStatus::Failed, Some("boom"))
            .await
            .unwrap();
        assert_eq!(rejected(fx.search("лес").await), Rejection::IndexingFailed);

        let request = |site: &str| SearchRequest {
            query: "лес".to_string(),
            site: Some(site.to_string()),
            ..SearchRequest::default()
        };
        let outcome = fx.ranker.search(&request("https://a.com")).await.unwrap();
        assert_eq!(
            rejected(outcome),
            Rejection::SiteFailed("https://a.com/".to_string())
        );

        let outcome = fx.ranker.search(&request("https://nope.com/")).await.unwrap();
        assert!(matches!(rejected(outcome), Rejection::SiteNotFound(_)));

        fx.site("https://b.com/", SiteStatus::Indexing).await;
        let outcome = fx.ranker.search(&request("https://b.com/")).await.unwrap();
        assert!(matches!(rejected(outcome), Rejection::SiteIndexing(_)));
    }

    #[tokio::test]
    async fn test_ranking_order_and_range() {
        let fx = fixture().await;
        let site = fx.site("https://a.com/", SiteStatus::Indexed).await;
        fx.page(&site, "/one", "<p>Лес. Волки.</p>").await;
        fx.page(&site, "/two", "<p>Лес, леса, лесу. Волки.</p>").await;
        fx.page(&site, "/three", "<p>Только лес.</p>").await;

        let results = found(fx.search("волки в лесу").await);
        assert_eq!(results.count, 2);
        assert_eq!(results.results[0].uri, "two");
        assert_eq!(results.results[0].relevance, 1.0);
        assert_eq!(results.results[1].uri, "one");
        assert_eq!(results.results[1].relevance, 0.5);
        assert_eq!(results.results[0].site, "https://a.com/");
        assert!(results.results[0]
            .snippet
            .as_deref()
            .unwrap()
            .contains("<b>Волки</b>"));
    }

    #[tokio::test]
    async fn test_missing_lemma_gives_no_results() {
        let fx = fixture().await;
        let site = fx.site("https://a.com/", SiteStatus::Indexed).await;
        fx.page(&site, "/", "<p>Лес.</p>").await;

        let results = found(fx.search("лес медведь").await);
        assert_eq!(results.count, 0);
        assert!(results.results.is_empty());

        // Only function words: nothing to look for
        let results = found(fx.search("и в на").await);
        assert_eq!(results.count, 0);
    }

    #[tokio::test]
    async fn test_pagination() {
        let fx = fixture().await;
        let site = fx.site("https://a.com/", SiteStatus::Indexed).await;
        for i in 1..=5 {
            let body = format!("<p>{}</p>", vec!["лес"; i].join(" "));
            fx.page(&site, &format!("/{}", i), &body).await;
        }

        let outcome = fx
            .ranker
            .search(&SearchRequest {
                query: "лес".to_string(),
                offset: 1,
                limit: Some(2),
                ..SearchRequest::default()
            })
            .await
            .unwrap();
        let results = found(outcome);

        assert_eq!(results.count, 5);
        let uris: Vec<&str> = results.results.iter().map(|r| r.uri.as_str()).collect();
        assert_eq!(uris, vec!["4", "3"]);

        let outcome = fx
            .ranker
            .search(&SearchRequest {
                query: "лес".to_string(),
                offset: 10,
                ..SearchRequest::default()
            })
            .await
            .unwrap();
        let results = found(outcome);
        assert_eq!(results.count, 5);
        assert!(results.results.is_empty());
    }

    #[tokio::test]
    async fn test_first_page_matches_full_ranking() {
        let fx = fixture().await;
        let site = fx.site("https://a.com/", SiteStatus::Indexed).await;
        for i in 1..=5 {
            let body = format!("<p>{}</p>", vec!["лес"; i].join(" "));
            fx.page(&site, &format!("/{}", i), &body).await;
        }

        let uris = |limit: usize| {
            let ranker = &fx.ranker;
            async move {
                let outcome = ranker
                    .search(&SearchRequest {
                        query: "лес".to_string(),
                        offset: 0,
                        limit: Some(limit),
                        ..SearchRequest::default()
                    })
                    .await
                    .unwrap();
                let results = found(outcome);
                assert_eq!(results.count, 5);
                results
                    .results
                    .into_iter()
                    .map(|r| r.uri)
                    .collect::<Vec<_>>()
            }
        };

        let all = uris(100).await;
        assert_eq!(all.len(), 5);
        for k in 1..=5 {
            assert_eq!(uris(k).await, all[..k].to_vec(), "limit {}", k);
        }
        assert_eq!(all[0], "5");
    }

    #[tokio::test]
    async fn test_results_span_sites() {
        let fx = fixture().await;
        let a = fx.site("https://a.com/", SiteStatus::Indexed).await;
        let b = fx.site("https://b.com/", SiteStatus::Indexed).await;
        fx.page(&a, "/", "<p>лес</p>").await;
        fx.page(&b, "/", "<p>лес лес</p>").await;

        let results = found(fx.search("лес").await);
        assert_eq!(results.count, 2);
        assert_eq!(results.results[0].site, "https://b.com/");

        let outcome = fx
            .ranker
            .search(&SearchRequest {
                query: "лес".to_string(),
                site: Some("https://a.com/".to_string()),
                ..SearchRequest::default()
            })
            .await
            .unwrap();
        let results = found(outcome);
        assert_eq!(results.count, 1);
        assert_eq!(results.results[0].site, "https://a.com/");
    }

    fn candidate(page_id: i64, absolute: f64) -> Candidate {
        Candidate {
            site: Site {
                id: 1,
                url: "https://a.com/".to_string(),
                name: "A".to_string(),
                status: SiteStatus::Indexed.to_string(),
                status_time: String::new(),
                last_error: None,
            },
            page_id,
            absolute,
        }
    }

    #[test]
    fn test_rank_candidates_ties_and_zero_max() {
        let ranked = rank_candidates(vec![candidate(3, 2.0), candidate(1, 2.0), candidate(2, 4.0)]);
        let order: Vec<(i64, f64)> = ranked.iter().map(|(c, r)| (c.page_id, *r)).collect();
        assert_eq!(order, vec![(2, 1.0), (1, 0.5), (3, 0.5)]);

        let ranked = rank_candidates(vec![candidate(5, 0.0), candidate(4, 0.0)]);
        let order: Vec<(i64, f64)> = ranked.iter().map(|(c, r)| (c.page_id, *r)).collect();
        assert_eq!(order, vec![(4, 0.0), (5, 0.0)]);
    }
}
