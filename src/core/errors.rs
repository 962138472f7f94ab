// src/core/errors.rs

//! Error taxonomy for the scan pipeline.
//!
//! Only `ValidationError` and `SubmitError` ever reach an HTTP client directly.
//! Everything that happens after a task is accepted is folded into the
//! published `ScanResult` instead.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// The submitted target is neither an IPv4 literal nor a domain name.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid target `{0}`")]
    InvalidTarget(String),
}

/// The scanner process could not be run to a successful exit.
#[derive(Debug, Error)]
pub enum ToolExecutionError {
    #[error("executable `{tool}` not found")]
    NotFound { tool: String },

    #[error("failed to launch `{tool}`: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("`{tool}` exited with status {code}: {stderr}")]
    NonZeroExit {
        tool: String,
        code: i32,
        stderr: String,
    },

    #[error("`{tool}` timed out after {limit:?}")]
    TimedOut { tool: String, limit: Duration },

    #[error("refusing to pass `{target}` to `{tool}`, it would be read as an option")]
    OptionLikeTarget { tool: String, target: String },
}

/// A network lookup (WHOIS, DNS, host intelligence) failed.
#[derive(Debug, Error)]
pub enum LookupFailure {
    #[error("connection to {server} failed: {source}")]
    Connect {
        server: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error talking to {server}: {source}")]
    Io {
        server: String,
        #[source]
        source: io::Error,
    },

    #[error("{service} lookup timed out")]
    TimedOut { service: &'static str },

    #[error("no WHOIS server known for `.{0}`")]
    NoWhoisServer(String),

    #[error("DNS error: {0}")]
    Dns(String),

    /// An error message reported by the host-intelligence provider itself.
    #[error("{0}")]
    Api(String),

    #[error("An unexpected error occurred: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("result for task {0} was already published")]
    AlreadyPublished(String),

    #[error("storage I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("result serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A scan could not be handed to the worker pool.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    #[error("scan queue is full")]
    QueueFull,

    #[error("worker pool is shut down")]
    Closed,
}
