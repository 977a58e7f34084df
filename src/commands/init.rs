//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::meta::SearchDb;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

/// Where `init` put things
#[derive(Debug, Clone, Serialize)]
pub struct InitResult {
    pub config_path: String,
    pub db_path: String,
}

/// Write a default configuration and create the database schema
pub async fn cmd_init(base_dir: PathBuf, config_path: PathBuf, force: bool) -> Result<InitResult> {
    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Config already exists at {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    let mut config = Config::default();
    config.init_paths(Some(base_dir));
    config.paths.config_file = config_path;
    config.save()?;

    let db = SearchDb::new(&config.paths.db_file).await?;
    db.init_schema().await?;
    info!(db = %config.paths.db_file.display(), "Database initialized");

    Ok(InitResult {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
    })
}

/// Print init result to console
pub fn print_init(result: &InitResult) {
    println!("✓ lemmasearch initialized successfully");
    println!("  Config: {}", result.config_path);
    println!("  Database: {}", result.db_path);
    println!("\nNext steps:");
    println!("  1. Add [[sites]] entries (url, name) to the config file");
    println!("  2. Crawl and index them: lemmasearch index");
    println!("  3. Search: lemmasearch search \"запрос\"");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_creates_config_and_db() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");

        let result = cmd_init(tmp.path().to_path_buf(), config_path.clone(), false)
            .await
            .unwrap();
        assert!(config_path.exists());
        assert!(tmp.path().join("search.db").exists());
        assert_eq!(result.config_path, config_path.display().to_string());

        let config = Config::load(&config_path).unwrap();
        assert!(config.sites.is_empty());
        assert_eq!(config.crawl.max_url_length, 100);

        let db = SearchDb::new(&config.paths.db_file).await.unwrap();
        assert!(db.is_initialized().await.unwrap());
    }

    #[tokio::test]
    async fn test_init_refuses_to_overwrite() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");

        cmd_init(tmp.path().to_path_buf(), config_path.clone(), false)
            .await
            .unwrap();
        let err = cmd_init(tmp.path().to_path_buf(), config_path.clone(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        cmd_init(tmp.path().to_path_buf(), config_path, true)
            .await
            .unwrap();
    }
}
