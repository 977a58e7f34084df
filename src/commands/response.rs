//! Machine-readable command responses

use super::{print_search_results, print_statistics};
use crate::engine::{PageOutcome, StartOutcome, Statistics, StopOutcome};
use crate::rank::{SearchHit, SearchOutcome};
use serde::{Deserialize, Serialize};

pub const ALREADY_RUNNING: &str = "Indexing is already running";
pub const NOT_RUNNING: &str = "Indexing is not running";
pub const OUT_OF_SCOPE: &str = "Page is outside the sites listed in the configuration file";
pub const PAGE_BLOCKED: &str = "The page's site is being indexed, try again later";

/// Response printed by `--json`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum Response {
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Error {
        error: String,
    },
    Statistics {
        statistics: Statistics,
    },
    Search {
        count: usize,
        data: Vec<SearchHit>,
    },
}

impl Response {
    pub fn ok(message: impl Into<String>) -> Self {
        Response::Ok {
            message: Some(message.into()),
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Response::Error {
            error: error.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }
}

impl From<StartOutcome> for Response {
    fn from(outcome: StartOutcome) -> Self {
        match outcome {
            StartOutcome::Started { sites } => Response::ok(format!("Indexing started for {} site(s)", sites)),
            StartOutcome::AlreadyRunning => Response::error(ALREADY_RUNNING),
        }
    }
}

impl From<StopOutcome> for Response {
    fn from(outcome: StopOutcome) -> Self {
        match outcome {
            StopOutcome::Stopped { sites } => Response::ok(format!("Indexing stopped for {} site(s)", sites)),
            StopOutcome::NotRunning => Response::error(NOT_RUNNING),
        }
    }
}

impl From<PageOutcome> for Response {
    fn from(outcome: PageOutcome) -> Self {
        match outcome {
            PageOutcome::Indexed {
                site,
                path,
                code,
                lemmas,
            } => Response::ok(format!(
                "Indexed {}{} (HTTP {}, {} lemmas)",
                site.trim_end_matches('/'),
                path,
                code,
                lemmas
            )),
            PageOutcome::OutOfScope => Response::error(OUT_OF_SCOPE),
            PageOutcome::IndexingInProgress => Response::error(PAGE_BLOCKED),
        }
    }
}

impl From<Statistics> for Response {
    fn from(statistics: Statistics) -> Self {
        Response::Statistics { statistics }
    }
}

impl From<SearchOutcome> for Response {
    fn from(outcome: SearchOutcome) -> Self {
        match outcome {
            SearchOutcome::Found(results) => Response::Search {
                count: results.count,
                data: results.results,
            },
            SearchOutcome::Rejected(rejection) => Response::error(rejection.to_string()),
        }
    }
}

/// Print a response to console
pub fn print_response(response: &Response) {
    match response {
        Response::Ok { message } => println!("✓ {}", message.as_deref().unwrap_or("Done")),
        Response::Error { error } => eprintln!("✗ {}", error),
        Response::Statistics { statistics } => print_statistics(statistics),
        Response::Search { count, data } => print_search_results(*count, data),
    }
}
