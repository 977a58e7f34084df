//! lemmasearch - a self-hosted site crawler and lemmatizing search engine
//!
//! This crate provides:
//! - A concurrent crawler that walks configured sites under cooperative cancellation
//! - A lemmatizing inverted index over page text, stored in SQLite
//! - Ranked keyword search with highlighted snippets
//! - A CLI driving indexing, statistics and search

pub mod commands;
pub mod config;
pub mod crawl;
pub mod engine;
pub mod error;
pub mod index;
pub mod lemma;
pub mod meta;
pub mod morph;
pub mod parse;
pub mod progress;
pub mod rank;

pub use config::Config;
pub use engine::SearchEngine;
pub use error::{Error, Result};
