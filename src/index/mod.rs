//! Inverted index maintenance
//!
//! Turns stored pages into lemma histograms and applies them to the lemma and
//! index tables. Writers of the same site are serialized in-process; SQLite
//! transactions serialize everything else.

use crate::error::Result;
use crate::lemma::Lemmatizer;
use crate::meta::{IndexStats, Page, SearchDb};
use crate::parse::extract_text;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Page indexer
#[derive(Clone)]
pub struct Indexer {
    db: SearchDb,
    lemmatizer: Lemmatizer,
    site_locks: Arc<Mutex<HashMap<i64, Arc<Mutex<()>>>>>,
}

impl Indexer {
    pub fn new(db: SearchDb, lemmatizer: Lemmatizer) -> Self {
        Self {
            db,
            lemmatizer,
            site_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Index the visible text of a stored page.
    ///
    /// Idempotent: indexing the same content twice leaves the tables unchanged.
    pub async fn index_page(&self, page: &Page) -> Result<IndexStats> {
        let text = extract_text(&page.content);
        let lemmas = self.lemmatizer.lemmatize(&text);

        let lock = self.site_lock(page.site_id).await;
        let _guard = lock.lock().await;

        let stats = self
            .db
            .apply_page_lemmas(page.site_id, page.id, &lemmas)
            .await?;
        debug!(
            page = %page.path,
            added = stats.added,
            updated = stats.updated,
            removed = stats.removed,
            "Indexed page"
        );
        Ok(stats)
    }

    /// Delete a page and release every lemma it held
    pub async fn remove_page(&self, page: &Page) -> Result<usize> {
        let lock = self.site_lock(page.site_id).await;
        let _guard = lock.lock().await;

        self.db.delete_page(page.id).await
    }

    /// Forget every per-site writer lock. Called once the site rows they
    /// guarded have been deleted.
    pub async fn release_site_locks(&self) -> usize {
        let mut locks = self.site_locks.lock().await;
        let released = locks.len();
        locks.clear();
        released
    }

    async fn site_lock(&self, site_id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.site_locks.lock().await;
        locks
            .entry(site_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
