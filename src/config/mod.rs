//! Writer configuration.
//!
//! [`WriterConfig`] is the library type, loadable from TOML. [`TargetOpts`]
//! is its clap counterpart for callers that flatten it into their own CLI.

mod duration;

pub use duration::{parse_duration, parse_duration_to_secs};

use anyhow::Context;
use bson::{doc, Bson, Document};
use clap::Args;
use mongodb_target::ConnectOpts;
use replay_core::WriteOptions;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const DEFAULT_URI: &str = "mongodb://localhost:27017";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// The `w` value of a write concern: a node count or a tag such as
/// `"majority"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Acknowledgment {
    Nodes(i32),
    Tag(String),
}

impl From<&str> for Acknowledgment {
    fn from(s: &str) -> Self {
        match s.parse::<i32>() {
            Ok(nodes) => Acknowledgment::Nodes(nodes),
            Err(_) => Acknowledgment::Tag(s.to_string()),
        }
    }
}

impl From<&Acknowledgment> for Bson {
    fn from(w: &Acknowledgment) -> Self {
        match w {
            Acknowledgment::Nodes(n) => Bson::Int32(*n),
            Acknowledgment::Tag(tag) => Bson::String(tag.clone()),
        }
    }
}

/// Settings for one writer and the connection it writes through.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WriterConfig {
    /// Target MongoDB connection string
    pub uri: String,

    /// Apply each batch as one unordered grouped request
    pub bulk: bool,

    /// Write concern `w` sent with every write command
    pub write_concern: Option<Acknowledgment>,

    /// Write concern `j` sent with every write command
    pub journal: Option<bool>,

    #[serde(deserialize_with = "duration::deserialize")]
    pub connect_timeout: Duration,

    #[serde(deserialize_with = "duration::deserialize")]
    pub server_selection_timeout: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_URI.to_string(),
            bulk: true,
            write_concern: None,
            journal: None,
            connect_timeout: DEFAULT_TIMEOUT,
            server_selection_timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl WriterConfig {
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("Failed to parse writer configuration")
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read writer configuration from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid writer configuration in {}", path.display()))
    }

    /// Writer-level options forwarded with every write command.
    pub fn write_options(&self) -> WriteOptions {
        let mut concern = Document::new();
        if let Some(w) = &self.write_concern {
            concern.insert("w", Bson::from(w));
        }
        if let Some(j) = self.journal {
            concern.insert("j", j);
        }

        if concern.is_empty() {
            WriteOptions::new()
        } else {
            WriteOptions::from(doc! { "writeConcern": concern })
        }
    }

    pub fn connect_opts(&self) -> ConnectOpts {
        ConnectOpts {
            uri: self.uri.clone(),
            connect_timeout: self.connect_timeout,
            server_selection_timeout: self.server_selection_timeout,
            app_name: Some(env!("CARGO_PKG_NAME").to_string()),
        }
    }
}

#[derive(Args, Clone, Debug)]
pub struct TargetOpts {
    /// Target MongoDB connection string
    #[arg(long, default_value = DEFAULT_URI, env = "TARGET_URI")]
    pub target_uri: String,

    /// Apply each batch as one unordered grouped request
    #[arg(
        long,
        default_value_t = true,
        action = clap::ArgAction::Set,
        env = "TARGET_BULK"
    )]
    pub target_bulk: bool,

    /// Write concern `w` value (node count or tag such as "majority")
    #[arg(long, env = "TARGET_WRITE_CONCERN")]
    pub target_write_concern: Option<String>,

    /// Request journal acknowledgment
    #[arg(long, env = "TARGET_JOURNAL")]
    pub target_journal: Option<bool>,

    /// Connection timeout (e.g. "10s", "1m")
    #[arg(long, default_value = "10s", value_parser = parse_duration)]
    pub target_connect_timeout: Duration,

    /// Server selection timeout (e.g. "10s", "1m")
    #[arg(long, default_value = "10s", value_parser = parse_duration)]
    pub target_server_selection_timeout: Duration,
}

impl From<&TargetOpts> for WriterConfig {
    fn from(opts: &TargetOpts) -> Self {
        Self {
            uri: opts.target_uri.clone(),
            bulk: opts.target_bulk,
            write_concern: opts.target_write_concern.as_deref().map(Acknowledgment::from),
            journal: opts.target_journal,
            connect_timeout: opts.target_connect_timeout,
            server_selection_timeout: opts.target_server_selection_timeout,
        }
    }
}
