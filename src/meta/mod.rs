//! Search storage using SQLite
//!
//! This module handles all persistent state:
//! - Sites (one row per configured site per crawl generation)
//! - Pages (fetched documents with their HTTP status)
//! - Lemmas (per-site document frequency)
//! - Index entries (per-page lemma ranks)
//!
//! Every change to lemma frequencies happens inside a write transaction whose
//! first statement is a write, so SQLite hands out the write lock up front
//! instead of failing a read-to-write upgrade under contention.

mod schema;

pub use schema::*;

use crate::config::Config;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
    SqliteSynchronous,
};
use sqlx::FromRow;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, trace};

/// Site crawl status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SiteStatus {
    Indexing,
    Indexed,
    Failed,
}

impl std::fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SiteStatus::Indexing => write!(f, "INDEXING"),
            SiteStatus::Indexed => write!(f, "INDEXED"),
            SiteStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl FromStr for SiteStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "INDEXING" => Ok(SiteStatus::Indexing),
            "INDEXED" => Ok(SiteStatus::Indexed),
            "FAILED" => Ok(SiteStatus::Failed),
            _ => Err(Error::Other(format!("Unknown site status: {}", s))),
        }
    }
}

/// A crawled site
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Site {
    pub id: i64,
    pub url: String,
    pub name: String,
    pub status: String,
    pub status_time: String,
    pub last_error: Option<String>,
}

impl Site {
    pub fn status(&self) -> Result<SiteStatus> {
        self.status.parse()
    }

    /// Last status change or heartbeat
    pub fn status_time(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.status_time)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// A fetched page
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Page {
    pub id: i64,
    pub site_id: i64,
    /// Site-relative path, always starting with `/`
    pub path: String,
    pub code: i64,
    pub content: String,
    pub title: String,
}

impl Page {
    /// Only successfully fetched pages contribute to the index
    pub fn is_indexable(&self) -> bool {
        (200..300).contains(&self.code)
    }
}

/// A per-site lemma with its document frequency
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Lemma {
    pub id: i64,
    pub site_id: i64,
    pub lemma: String,
    pub frequency: i64,
}

/// A (page, lemma) pair with the in-page occurrence count
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: i64,
    pub page_id: i64,
    pub lemma_id: i64,
    pub rank: f64,
}

/// What applying a page histogram changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Lemmas newly attached to the page
    pub added: usize,
    /// Lemmas already attached whose rank was refreshed
    pub updated: usize,
    /// Lemmas no longer on the page
    pub removed: usize,
}

impl IndexStats {
    /// Lemmas attached to the page after the update
    pub fn total(&self) -> usize {
        self.added + self.updated
    }
}

/// Search database handle
#[derive(Clone)]
pub struct SearchDb {
    pool: SqlitePool,
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

impl SearchDb {
    /// Connect to the database configured in `config`
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::new(&config.paths.db_file).await
    }

    /// Connect to (and create if missing) the database at `db_path`
    pub async fn new(db_path: &Path) -> Result<Self> {
        // Create parent directory if needed
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(30));

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema");
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Check if database is initialized
    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type='table' AND name='sites'")
                .fetch_optional(&self.pool)
                .await?;
        Ok(result.is_some())
    }

    // ===== Site Operations =====

    /// Insert a new site row
    pub async fn insert_site(&self, url: &str, name: &str, status: SiteStatus) -> Result<Site> {
        let site = sqlx::query_as::<_, Site>(
            r#"
            INSERT INTO sites (url, name, status, status_time, last_error)
            VALUES (?, ?, ?, ?, NULL)
            RETURNING *
            "#,
        )
        .bind(url)
        .bind(name)
        .bind(status.to_string())
        .bind(now())
        .fetch_one(&self.pool)
        .await?;
        Ok(site)
    }

    /// Get site by ID
    pub async fn get_site(&self, id: i64) -> Result<Option<Site>> {
        let site = sqlx::query_as::<_, Site>("SELECT * FROM sites WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(site)
    }

    /// Get the newest site row for a root URL
    pub async fn get_site_by_url(&self, url: &str) -> Result<Option<Site>> {
        let site = sqlx::query_as::<_, Site>(
            "SELECT * FROM sites WHERE url = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(site)
    }

    /// List all sites
    pub async fn list_sites(&self) -> Result<Vec<Site>> {
        let sites = sqlx::query_as::<_, Site>("SELECT * FROM sites ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(sites)
    }

    /// List sites with a given status
    pub async fn list_sites_by_status(&self, status: SiteStatus) -> Result<Vec<Site>> {
        let sites = sqlx::query_as::<_, Site>("SELECT * FROM sites WHERE status = ? ORDER BY id")
            .bind(status.to_string())
            .fetch_all(&self.pool)
            .await?;
        Ok(sites)
    }

    /// Current status of a site, `None` if the row is gone
    pub async fn site_status(&self, id: i64) -> Result<Option<SiteStatus>> {
        let status: Option<String> = sqlx::query_scalar("SELECT status FROM sites WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        status.map(|s| s.parse()).transpose()
    }

    /// Set a site's status unconditionally
    pub async fn update_site_status(
        &self,
        id: i64,
        status: SiteStatus,
        last_error: Option<&str>,
    ) -> Result<()> {
        sqlx::query("UPDATE sites SET status = ?, status_time = ?, last_error = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(now())
            .bind(last_error)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Move a site from `from` to `to`; returns false when it was not in `from`
    pub async fn transition_site(
        &self,
        id: i64,
        from: SiteStatus,
        to: SiteStatus,
        last_error: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sites SET status = ?, status_time = ?, last_error = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(to.to_string())
        .bind(now())
        .bind(last_error)
        .bind(id)
        .bind(from.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Refresh a site's heartbeat
    pub async fn touch_site(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE sites SET status_time = ? WHERE id = ?")
            .bind(now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Fail every INDEXING site with `reason`, returning how many were failed
    pub async fn fail_indexing_sites(&self, reason: &str) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE sites SET status = ?, status_time = ?, last_error = ?
            WHERE status = ?
            "#,
        )
        .bind(SiteStatus::Failed.to_string())
        .bind(now())
        .bind(reason)
        .bind(SiteStatus::Indexing.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Count site rows
    pub async fn count_sites(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sites")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // ===== Page Operations =====

    /// Insert a page, or overwrite the one already stored at that path
    pub async fn upsert_page(
        &self,
        site_id: i64,
        path: &str,
        code: u16,
        content: &str,
        title: &str,
    ) -> Result<Page> {
        let page = sqlx::query_as::<_, Page>(
            r#"
            INSERT INTO pages (site_id, path, code, content, title)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(site_id, path) DO UPDATE SET
                code = excluded.code,
                content = excluded.content,
                title = excluded.title
            RETURNING *
            "#,
        )
        .bind(site_id)
        .bind(path)
        .bind(i64::from(code))
        .bind(content)
        .bind(title)
        .fetch_one(&self.pool)
        .await?;
        Ok(page)
    }

    /// Get page by ID
    pub async fn get_page(&self, id: i64) -> Result<Option<Page>> {
        let page = sqlx::query_as::<_, Page>("SELECT * FROM pages WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(page)
    }

    /// Get page by site and path
    pub async fn get_page_by_path(&self, site_id: i64, path: &str) -> Result<Option<Page>> {
        let page =
            sqlx::query_as::<_, Page>("SELECT * FROM pages WHERE site_id = ? AND path = ?")
                .bind(site_id)
                .bind(path)
                .fetch_optional(&self.pool)
                .await?;
        Ok(page)
    }

    /// Whether a page is stored at that path
    pub async fn page_exists(&self, site_id: i64, path: &str) -> Result<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM pages WHERE site_id = ? AND path = ?")
                .bind(site_id)
                .bind(path)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    /// Count pages of a site
    pub async fn count_pages(&self, site_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pages WHERE site_id = ?")
            .bind(site_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Count pages across all sites
    pub async fn count_all_pages(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pages")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // ===== Lemma Operations =====

    /// Get a site's lemma row
    pub async fn get_lemma(&self, site_id: i64, lemma: &str) -> Result<Option<Lemma>> {
        let row =
            sqlx::query_as::<_, Lemma>("SELECT * FROM lemmas WHERE site_id = ? AND lemma = ?")
                .bind(site_id)
                .bind(lemma)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row)
    }

    /// Count lemmas of a site
    pub async fn count_lemmas(&self, site_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lemmas WHERE site_id = ?")
            .bind(site_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Count lemmas across all sites
    pub async fn count_all_lemmas(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lemmas")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // ===== Index Operations =====

    /// Make the page's index entries match `lemmas` exactly.
    ///
    /// New (page, lemma) pairs bump the lemma frequency by one, existing pairs
    /// only get their rank refreshed, and pairs whose lemma disappeared from the
    /// page are removed with a decrement. Applying the same histogram twice is
    /// a no-op beyond the heartbeat.
    pub async fn apply_page_lemmas(
        &self,
        site_id: i64,
        page_id: i64,
        lemmas: &HashMap<String, u32>,
    ) -> Result<IndexStats> {
        let mut tx = self.pool.begin().await?;
        let mut stats = IndexStats::default();

        // Heartbeat first: takes the write lock for the whole transaction
        sqlx::query("UPDATE sites SET status_time = ? WHERE id = ?")
            .bind(now())
            .bind(site_id)
            .execute(&mut *tx)
            .await?;

        let existing: Vec<(i64, String)> = sqlx::query_as(
            r#"
            SELECT e.lemma_id, l.lemma
            FROM index_entries e JOIN lemmas l ON l.id = e.lemma_id
            WHERE e.page_id = ?
            "#,
        )
        .bind(page_id)
        .fetch_all(&mut *tx)
        .await?;

        for (lemma_id, lemma) in &existing {
            if lemmas.contains_key(lemma) {
                continue;
            }
            sqlx::query("DELETE FROM index_entries WHERE page_id = ? AND lemma_id = ?")
                .bind(page_id)
                .bind(lemma_id)
                .execute(&mut *tx)
                .await?;
            decrement_lemma(&mut tx, *lemma_id).await?;
            stats.removed += 1;
        }

        let mut sorted: Vec<(&String, &u32)> = lemmas.iter().collect();
        sorted.sort();

        for (lemma, count) in sorted {
            let lemma_id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO lemmas (site_id, lemma, frequency) VALUES (?, ?, 0)
                ON CONFLICT(site_id, lemma) DO UPDATE SET lemma = excluded.lemma
                RETURNING id
                "#,
            )
            .bind(site_id)
            .bind(lemma)
            .fetch_one(&mut *tx)
            .await?;

            let inserted = sqlx::query(
                r#"
                INSERT INTO index_entries (page_id, lemma_id, rank) VALUES (?, ?, ?)
                ON CONFLICT(page_id, lemma_id) DO NOTHING
                "#,
            )
            .bind(page_id)
            .bind(lemma_id)
            .bind(f64::from(*count))
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if inserted == 1 {
                sqlx::query("UPDATE lemmas SET frequency = frequency + 1 WHERE id = ?")
                    .bind(lemma_id)
                    .execute(&mut *tx)
                    .await?;
                stats.added += 1;
            } else {
                sqlx::query("UPDATE index_entries SET rank = ? WHERE page_id = ? AND lemma_id = ?")
                    .bind(f64::from(*count))
                    .bind(page_id)
                    .bind(lemma_id)
                    .execute(&mut *tx)
                    .await?;
                stats.updated += 1;
            }
        }

        tx.commit().await?;
        trace!(page_id, ?stats, "Applied page lemmas");
        Ok(stats)
    }

    /// Delete a page together with its index entries, releasing its lemmas.
    ///
    /// Returns the number of lemmas the page referenced.
    pub async fn delete_page(&self, page_id: i64) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        let lemma_ids: Vec<i64> =
            sqlx::query_scalar("DELETE FROM index_entries WHERE page_id = ? RETURNING lemma_id")
                .bind(page_id)
                .fetch_all(&mut *tx)
                .await?;

        for lemma_id in &lemma_ids {
            decrement_lemma(&mut tx, *lemma_id).await?;
        }

        sqlx::query("DELETE FROM pages WHERE id = ?")
            .bind(page_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!(page_id, lemmas = lemma_ids.len(), "Deleted page");
        Ok(lemma_ids.len())
    }

    /// IDs of the pages a lemma occurs on
    pub async fn page_ids_for_lemma(&self, lemma_id: i64) -> Result<HashSet<i64>> {
        let ids: Vec<i64> =
            sqlx::query_scalar("SELECT page_id FROM index_entries WHERE lemma_id = ?")
                .bind(lemma_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(ids.into_iter().collect())
    }

    /// Sum of the page's ranks over the given lemmas
    pub async fn page_relevance(&self, page_id: i64, lemma_ids: &[i64]) -> Result<f64> {
        if lemma_ids.is_empty() {
            return Ok(0.0);
        }

        let placeholders = lemma_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let query = format!(
            "SELECT COALESCE(SUM(rank), 0.0) FROM index_entries WHERE page_id = ? AND lemma_id IN ({})",
            placeholders
        );

        let mut query_builder = sqlx::query_scalar::<_, f64>(&query).bind(page_id);
        for id in lemma_ids {
            query_builder = query_builder.bind(id);
        }
        Ok(query_builder.fetch_one(&self.pool).await?)
    }

    /// Every lemma's frequency must equal the number of pages it occurs on,
    /// and no lemma may be stored with frequency zero.
    pub async fn check_frequency_invariant(&self, site_id: i64) -> Result<()> {
        let broken: Vec<(String, i64, i64)> = sqlx::query_as(
            r#"
            SELECT l.lemma, l.frequency, COUNT(e.id) AS entries
            FROM lemmas l LEFT JOIN index_entries e ON e.lemma_id = l.id
            WHERE l.site_id = ?
            GROUP BY l.id
            HAVING l.frequency != COUNT(e.id) OR l.frequency = 0
            LIMIT 5
            "#,
        )
        .bind(site_id)
        .fetch_all(&self.pool)
        .await?;

        if broken.is_empty() {
            return Ok(());
        }

        let details = broken
            .iter()
            .map(|(lemma, freq, entries)| format!("{} (frequency {}, pages {})", lemma, freq, entries))
            .collect::<Vec<_>>()
            .join(", ");
        Err(Error::Invariant(format!(
            "lemma frequency mismatch on site {}: {}",
            site_id, details
        )))
    }

    /// Drop all sites, pages, lemmas and index entries in one transaction
    pub async fn clear_all(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for table in ["index_entries", "lemmas", "pages", "sites"] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        info!("Cleared all indexed data");
        Ok(())
    }
}

/// Release one page's claim on a lemma, deleting the lemma once unused
async fn decrement_lemma(conn: &mut SqliteConnection, lemma_id: i64) -> Result<()> {
    let result =
        sqlx::query("UPDATE lemmas SET frequency = frequency - 1 WHERE id = ? AND frequency > 0")
            .bind(lemma_id)
            .execute(&mut *conn)
            .await?;

    if result.rows_affected() == 0 {
        return Err(Error::Invariant(format!(
            "lemma {} has no frequency left to release",
            lemma_id
        )));
    }

    sqlx::query("DELETE FROM lemmas WHERE id = ? AND frequency = 0")
        .bind(lemma_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    pub(crate) async fn setup_test_db() -> (SearchDb, TempDir) {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.db_file = tmp.path().join("test.db");

        let db = SearchDb::connect(&config).await.unwrap();
        db.init_schema().await.unwrap();
        (db, tmp)
    }

    fn histogram(pairs: &[(&str, u32)]) -> HashMap<String, u32> {
        pairs.iter().map(|(l, c)| (l.to_string(), *c)).collect()
    }

    #[tokio::test]
    async fn test_site_lifecycle() {
        let (db, _tmp) = setup_test_db().await;
        assert!(db.is_initialized().await.unwrap());

        let site = db
            .insert_site("https://example.com/", "Example", SiteStatus::Indexing)
            .await
            .unwrap();
        assert_eq!(site.status().unwrap(), SiteStatus::Indexing);
        assert!(site.status_time().is_some());

        let loaded = db.get_site_by_url("https://example.com/").await.unwrap().unwrap();
        assert_eq!(loaded.id, site.id);

        assert!(db
            .transition_site(site.id, SiteStatus::Indexing, SiteStatus::Indexed, None)
            .await
            .unwrap());
        assert!(!db
            .transition_site(site.id, SiteStatus::Indexing, SiteStatus::Failed, Some("late"))
            .await
            .unwrap());
        assert_eq!(
            db.site_status(site.id).await.unwrap(),
            Some(SiteStatus::Indexed)
        );
        assert_eq!(db.site_status(site.id + 100).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_fail_indexing_sites() {
        let (db, _tmp) = setup_test_db().await;
        let a = db
            .insert_site("https://a.com/", "A", SiteStatus::Indexing)
            .await
            .unwrap();
        let b = db
            .insert_site("https://b.com/", "B", SiteStatus::Indexed)
            .await
            .unwrap();

        assert_eq!(db.fail_indexing_sites("stopped").await.unwrap(), 1);

        let a = db.get_site(a.id).await.unwrap().unwrap();
        assert_eq!(a.status().unwrap(), SiteStatus::Failed);
        assert_eq!(a.last_error.as_deref(), Some("stopped"));
        assert_eq!(db.site_status(b.id).await.unwrap(), Some(SiteStatus::Indexed));
        assert!(db
            .list_sites_by_status(SiteStatus::Indexing)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_page_upsert_is_unique_per_path() {
        let (db, _tmp) = setup_test_db().await;
        let site = db
            .insert_site("https://example.com/", "Example", SiteStatus::Indexing)
            .await
            .unwrap();

        let first = db.upsert_page(site.id, "/a", 500, "NA", "NA").await.unwrap();
        let second = db
            .upsert_page(site.id, "/a", 200, "<p>ок</p>", "A")
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.code, 200);
        assert!(second.is_indexable());
        assert!(!first.is_indexable());
        assert_eq!(db.count_pages(site.id).await.unwrap(), 1);
        assert!(db.page_exists(site.id, "/a").await.unwrap());
        assert!(!db.page_exists(site.id, "/b").await.unwrap());
    }

    #[tokio::test]
    async fn test_apply_page_lemmas_keeps_frequencies() {
        let (db, _tmp) = setup_test_db().await;
        let site = db
            .insert_site("https://example.com/", "Example", SiteStatus::Indexing)
            .await
            .unwrap();
        let p1 = db.upsert_page(site.id, "/1", 200, "", "").await.unwrap();
        let p2 = db.upsert_page(site.id, "/2", 200, "", "").await.unwrap();

        let stats = db
            .apply_page_lemmas(site.id, p1.id, &histogram(&[("лес", 3), ("волк", 1)]))
            .await
            .unwrap();
        assert_eq!(stats.added, 2);

        db.apply_page_lemmas(site.id, p2.id, &histogram(&[("лес", 1)]))
            .await
            .unwrap();

        assert_eq!(db.get_lemma(site.id, "лес").await.unwrap().unwrap().frequency, 2);
        assert_eq!(db.get_lemma(site.id, "волк").await.unwrap().unwrap().frequency, 1);
        db.check_frequency_invariant(site.id).await.unwrap();

        // Re-applying the same histogram changes nothing
        let stats = db
            .apply_page_lemmas(site.id, p1.id, &histogram(&[("лес", 3), ("волк", 1)]))
            .await
            .unwrap();
        assert_eq!(stats, IndexStats { added: 0, updated: 2, removed: 0 });
        assert_eq!(db.get_lemma(site.id, "лес").await.unwrap().unwrap().frequency, 2);

        // Dropping a lemma from the page releases it
        let stats = db
            .apply_page_lemmas(site.id, p1.id, &histogram(&[("лес", 5)]))
            .await
            .unwrap();
        assert_eq!(stats.removed, 1);
        assert!(db.get_lemma(site.id, "волк").await.unwrap().is_none());
        db.check_frequency_invariant(site.id).await.unwrap();

        let lemma = db.get_lemma(site.id, "лес").await.unwrap().unwrap();
        assert_eq!(db.page_relevance(p1.id, &[lemma.id]).await.unwrap(), 5.0);
        assert_eq!(db.page_ids_for_lemma(lemma.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_page_releases_lemmas() {
        let (db, _tmp) = setup_test_db().await;
        let site = db
            .insert_site("https://example.com/", "Example", SiteStatus::Indexed)
            .await
            .unwrap();
        let p1 = db.upsert_page(site.id, "/1", 200, "", "").await.unwrap();
        let p2 = db.upsert_page(site.id, "/2", 200, "", "").await.unwrap();
        db.apply_page_lemmas(site.id, p1.id, &histogram(&[("лес", 1), ("волк", 2)]))
            .await
            .unwrap();
        db.apply_page_lemmas(site.id, p2.id, &histogram(&[("лес", 1)]))
            .await
            .unwrap();

        assert_eq!(db.delete_page(p1.id).await.unwrap(), 2);

        assert!(db.get_page(p1.id).await.unwrap().is_none());
        assert!(db.get_lemma(site.id, "волк").await.unwrap().is_none());
        assert_eq!(db.get_lemma(site.id, "лес").await.unwrap().unwrap().frequency, 1);
        assert_eq!(db.count_lemmas(site.id).await.unwrap(), 1);
        db.check_frequency_invariant(site.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_invariant_check_detects_drift() {
        let (db, _tmp) = setup_test_db().await;
        let site = db
            .insert_site("https://example.com/", "Example", SiteStatus::Indexing)
            .await
            .unwrap();
        let page = db.upsert_page(site.id, "/", 200, "", "").await.unwrap();
        db.apply_page_lemmas(site.id, page.id, &histogram(&[("лес", 1)]))
            .await
            .unwrap();

        sqlx::query("UPDATE lemmas SET frequency = 7")
            .execute(&db.pool)
            .await
            .unwrap();

        let err = db.check_frequency_invariant(site.id).await.unwrap_err();
        assert!(matches!(err, Error::Invariant(_)));
    }

    #[tokio::test]
    async fn test_page_relevance_without_lemmas() {
        let (db, _tmp) = setup_test_db().await;
        assert_eq!(db.page_relevance(1, &[]).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_clear_all() {
        let (db, _tmp) = setup_test_db().await;
        let site = db
            .insert_site("https://example.com/", "Example", SiteStatus::Indexed)
            .await
            .unwrap();
        let page = db.upsert_page(site.id, "/", 200, "", "").await.unwrap();
        db.apply_page_lemmas(site.id, page.id, &histogram(&[("лес", 1)]))
            .await
            .unwrap();

        db.clear_all().await.unwrap();

        assert_eq!(db.count_sites().await.unwrap(), 0);
        assert_eq!(db.count_all_pages().await.unwrap(), 0);
        assert_eq!(db.count_all_lemmas().await.unwrap(), 0);
    }
}
