//! Common test utilities with tracing setup.
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//!
//! #[test]
//! fn my_test() {
//!     common::init_tracing();
//!     // ... test code
//! }
//! ```
//!
//! # Configuration
//!
//! Environment variables:
//! - `RUST_LOG`: Filter directives (e.g., `shardtree=trace`)
//! - `SHARDTREE_LOG_DIR`: Log directory (default: `logs/`)
//! - `SHARDTREE_LOG_CONSOLE`: Set to "0" to disable console output
//!
//! Library events are only emitted when the crate is built with the
//! `tracing` feature. Logs are written to `logs/shardtree.jsonl` as
//! newline-delimited JSON:
//!
//! ```bash
//! cat logs/shardtree.jsonl | jq 'select(.fields.message == "Tree: subtree deleted")'
//! ```

#![allow(dead_code)]

use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Once;

use shardtree::{Leaf, Tree};
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Ensures tracing is only initialized once across all tests.
static INIT: Once = Once::new();

/// Initialize the tracing subscriber with file and console logging.
///
/// Safe to call multiple times - only the first call takes effect.
pub fn init_tracing() {
    INIT.call_once(setup_tracing);
}

/// Configuration for tracing setup.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Directory for log files.
    pub log_dir: PathBuf,
    /// Log file name.
    pub log_file: String,
    /// Enable console output.
    pub console_enabled: bool,
    /// Default log level if RUST_LOG is not set.
    pub default_level: Level,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            log_file: "shardtree.jsonl".to_string(),
            console_enabled: true,
            default_level: Level::INFO,
        }
    }
}

impl TracingConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = env::var("SHARDTREE_LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }

        if env::var("SHARDTREE_LOG_CONSOLE").is_ok_and(|v| v == "0") {
            config.console_enabled = false;
        }

        config
    }
}

fn make_filter(default_level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("{default_level}")))
}

fn setup_tracing() {
    let config = TracingConfig::from_env();

    // Fall back to console-only logging if the log file cannot be opened.
    let file = std::fs::create_dir_all(&config.log_dir).ok().and_then(|()| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(config.log_dir.join(&config.log_file))
            .ok()
    });

    let console_layer = config.console_enabled.then(|| {
        tracing_subscriber::fmt::layer()
            .with_test_writer()
            .with_thread_ids(true)
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .compact()
            .with_filter(make_filter(config.default_level))
    });

    let file_layer = file.map(|file| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::sync::Mutex::new(file))
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .json()
            .with_filter(make_filter(config.default_level))
    });

    // try_init: another test binary harness may already have installed one.
    let _ = Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init();
}

/// Node type used across the integration tests.
pub type TestNode = Leaf<String>;

/// Build a test node whose payload mirrors its id.
pub fn node(id: &str) -> TestNode {
    Leaf::new(id, id.to_owned())
}

/// Sorted ids of a query result.
pub fn ids(nodes: &[std::sync::Arc<TestNode>]) -> Vec<String> {
    use shardtree::TreeNode;
    nodes.iter().map(|n| n.id().to_owned()).collect()
}

/// A tree with `root -> a -> {b, c}` and `root -> d`.
pub fn sample_tree() -> Tree<TestNode> {
    let tree: Tree<TestNode> = Tree::new();
    let root = node("root");
    let a = node("a");
    tree.add(root.clone(), None).unwrap();
    tree.add(a.clone(), Some(&root)).unwrap();
    tree.add(node("b"), Some(&a)).unwrap();
    tree.add(node("c"), Some(&a)).unwrap();
    tree.add(node("d"), Some(&root)).unwrap();
    tree
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_init() {
        init_tracing();
        tracing::info!("Tracing initialized successfully");
        tracing::debug!(key = "test_key", value = 42, "Debug event");
    }
}
