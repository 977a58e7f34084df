//! Configuration management for lemmasearch
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::crawl::SiteScope;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Sites to crawl and index, in order
    #[serde(default)]
    pub sites: Vec<SiteConfig>,

    /// Web crawling configuration
    #[serde(default)]
    pub crawl: CrawlConfig,

    /// Indexing configuration
    #[serde(default)]
    pub index: IndexConfig,

    /// Search configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Morphology analyzer configuration
    #[serde(default)]
    pub morphology: MorphologyConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// A configured site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Root URL; only pages under it are crawled
    pub url: String,

    /// Display name
    pub name: String,
}

/// Web crawling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// User agent string
    #[serde(default = "default_crawl_user_agent")]
    pub user_agent: String,

    /// Referer header sent with every request
    #[serde(default = "default_crawl_referrer")]
    pub referrer: String,

    /// Request timeout in seconds
    #[serde(default = "default_crawl_timeout")]
    pub timeout_secs: u64,

    /// Fixed delay before each fetch, in milliseconds
    #[serde(default = "default_politeness_delay")]
    pub politeness_delay_ms: u64,

    /// Requests per second per site
    #[serde(default = "default_crawl_rate_limit")]
    pub rate_limit_per_host: f64,

    /// Maximum fetches in flight at once
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    /// Links longer than this are skipped
    #[serde(default = "default_max_url_length")]
    pub max_url_length: usize,

    /// Heartbeat interval, in newly visited URLs
    #[serde(default = "default_heartbeat_every")]
    pub heartbeat_every: usize,

    /// Seconds after which a silent INDEXING site is considered interrupted
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,
}

/// Indexing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Pages indexed concurrently per site
    #[serde(default = "default_index_concurrency")]
    pub concurrency: usize,
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Default number of results per page
    #[serde(default = "default_search_limit")]
    pub default_limit: usize,

    /// How many of the rarest query lemmas select candidates
    #[serde(default = "default_max_query_lemmas")]
    pub max_query_lemmas: usize,

    /// Snippet window size in characters
    #[serde(default = "default_snippet_window_chars")]
    pub snippet_window_chars: usize,

    /// Sentences longer than this are split before windowing
    #[serde(default = "default_sentence_split_chars")]
    pub sentence_split_chars: usize,

    /// Long sentences are cut at the first whitespace after this offset
    #[serde(default = "default_sentence_cut_after_chars")]
    pub sentence_cut_after_chars: usize,
}

/// Morphology analyzer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MorphologyConfig {
    /// Analyzer language (only "russian" is shipped)
    #[serde(default = "default_morphology_language")]
    pub language: String,

    /// Optional dictionary file: `form<TAB>lemma<TAB>TAG` per line
    #[serde(default)]
    pub dictionary: Option<PathBuf>,

    /// Treat words missing from the dictionary as their own normal form
    #[serde(default = "default_accept_unknown_words")]
    pub accept_unknown_words: bool,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for lemmasearch data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sites: Vec::new(),
            crawl: CrawlConfig::default(),
            index: IndexConfig::default(),
            search: SearchConfig::default(),
            morphology: MorphologyConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            user_agent: default_crawl_user_agent(),
            referrer: default_crawl_referrer(),
            timeout_secs: default_crawl_timeout(),
            politeness_delay_ms: default_politeness_delay(),
            rate_limit_per_host: default_crawl_rate_limit(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            max_url_length: default_max_url_length(),
            heartbeat_every: default_heartbeat_every(),
            stale_after_secs: default_stale_after(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            concurrency: default_index_concurrency(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_search_limit(),
            max_query_lemmas: default_max_query_lemmas(),
            snippet_window_chars: default_snippet_window_chars(),
            sentence_split_chars: default_sentence_split_chars(),
            sentence_cut_after_chars: default_sentence_cut_after_chars(),
        }
    }
}

impl Default for MorphologyConfig {
    fn default() -> Self {
        Self {
            language: default_morphology_language(),
            dictionary: None,
            accept_unknown_words: default_accept_unknown_words(),
        }
    }
}

impl Config {
    /// Get the default base directory for lemmasearch (~/.lemmasearch)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".lemmasearch")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("search.db"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        // Database lives next to the config file
        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("search.db"),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific base directory, falling back to defaults
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Find the configured site whose scope contains `url`
    pub fn site_for_url(&self, url: &url::Url) -> Option<(&SiteConfig, SiteScope)> {
        self.sites.iter().find_map(|site| {
            let scope = SiteScope::new(&site.url).ok()?;
            scope.contains(url).then_some((site, scope))
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let mut roots = HashSet::new();
        for site in &self.sites {
            if site.name.trim().is_empty() {
                return Err(Error::Config(format!(
                    "site {} must have a non-empty name",
                    site.url
                )));
            }

            let scope = SiteScope::new(&site.url)?;
            if !roots.insert(scope.root().to_string()) {
                return Err(Error::Config(format!(
                    "site {} is configured more than once",
                    site.url
                )));
            }
        }

        if self.crawl.rate_limit_per_host <= 0.0 {
            return Err(Error::Config(
                "crawl.rate_limit_per_host must be positive".to_string(),
            ));
        }

        if self.crawl.max_concurrent_fetches == 0 {
            return Err(Error::Config(
                "crawl.max_concurrent_fetches must be at least 1".to_string(),
            ));
        }

        if self.crawl.heartbeat_every == 0 {
            return Err(Error::Config(
                "crawl.heartbeat_every must be at least 1".to_string(),
            ));
        }

        if self.index.concurrency == 0 {
            return Err(Error::Config(
                "index.concurrency must be at least 1".to_string(),
            ));
        }

        if self.search.max_query_lemmas == 0 {
            return Err(Error::Config(
                "search.max_query_lemmas must be at least 1".to_string(),
            ));
        }

        if self.search.sentence_cut_after_chars >= self.search.sentence_split_chars {
            return Err(Error::Config(
                "search.sentence_cut_after_chars must be < search.sentence_split_chars"
                    .to_string(),
            ));
        }

        if self.morphology.language.to_lowercase() != "russian" {
            return Err(Error::Config(format!(
                "Unsupported morphology language: {}",
                self.morphology.language
            )));
        }

        Ok(())
    }
}
