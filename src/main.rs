//! lemmasearch CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use lemmasearch::{
    commands::{
        cmd_index, cmd_index_page, cmd_init, cmd_search, cmd_stats, cmd_stop, print_init,
        print_response, Response, SearchOptions,
    },
    config::Config,
    error::Result,
    progress::LogWriterFactory,
    SearchEngine,
};
use std::path::{Path, PathBuf};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "lemmasearch")]
#[command(version, about = "Site crawler and lemma-based full-text search", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, env = "LEMMASEARCH_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize lemmasearch configuration and database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Discard the index, then crawl and index every configured site
    Index,

    /// Stop a running indexing
    Stop,

    /// Re-fetch and re-index a single page
    IndexPage {
        /// Absolute URL of a page inside a configured site
        url: String,
    },

    /// Show index statistics
    Stats,

    /// Search indexed pages
    Search {
        /// The search query
        query: String,

        /// Only search this configured site (root URL)
        #[arg(long)]
        site: Option<String>,

        /// Number of results to skip
        #[arg(long, default_value = "0")]
        offset: usize,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

/// Returns false when the command was rejected
async fn run() -> Result<bool> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory::default()))
        .with(filter)
        .init();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "lemmasearch", &mut std::io::stdout());
        return Ok(true);
    }

    if let Commands::Init { force } = cli.command {
        let (base_dir, config_path) = init_paths(cli.config);
        let result = cmd_init(base_dir, config_path, force).await?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else {
            print_init(&result);
        }
        return Ok(true);
    }

    let config = load_config(cli.config.as_deref())?;
    let engine = SearchEngine::open(config).await?;

    let response: Response = match cli.command {
        Commands::Index => cmd_index(&engine, !cli.json).await?.into(),
        Commands::Stop => cmd_stop(&engine).await?.into(),
        Commands::IndexPage { url } => cmd_index_page(&engine, &url).await?.into(),
        Commands::Stats => cmd_stats(&engine).await?.into(),
        Commands::Search {
            query,
            site,
            offset,
            limit,
        } => {
            let options = SearchOptions {
                site,
                offset,
                limit,
            };
            cmd_search(&engine, &query, options).await?.into()
        }
        Commands::Init { .. } | Commands::Completions { .. } => unreachable!(),
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_response(&response);
    }

    Ok(!response.is_error())
}

/// Base directory and config file for `init`: a `.toml` path names the file,
/// any other path names the directory.
fn init_paths(config: Option<PathBuf>) -> (PathBuf, PathBuf) {
    match config {
        Some(path) if path.extension().is_some_and(|e| e == "toml") => {
            let base = path
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(Config::default_base_dir);
            (base, path)
        }
        Some(dir) => {
            let config_path = dir.join("config.toml");
            (dir, config_path)
        }
        None => {
            let base = Config::default_base_dir();
            let config_path = base.join("config.toml");
            (base, config_path)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config_path = path
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_config_path);

    if !config_path.exists() {
        eprintln!(
            "Config file not found: {}\nRun 'lemmasearch init' first.",
            config_path.display()
        );
        std::process::exit(1);
    }

    Config::load(&config_path)
}
