use anyhow::Context;
use bson::doc;
use mongodb::{options::ClientOptions, Client};
use std::time::Duration;

/// Default connection and server selection timeout
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// MongoDB connection options (library type without clap)
#[derive(Clone, Debug)]
pub struct ConnectOpts {
    pub uri: String,
    pub connect_timeout: Duration,
    pub server_selection_timeout: Duration,
    pub app_name: Option<String>,
}

impl ConnectOpts {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            connect_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            server_selection_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            app_name: None,
        }
    }
}

/// Open a client against the target deployment and verify it responds.
///
/// The returned client is shared with every writer built on it; writers
/// never close or reconfigure it.
pub async fn connect(opts: &ConnectOpts) -> anyhow::Result<Client> {
    tracing::debug!("Parsing MongoDB connection options from URI: {}", opts.uri);
    let mut options = ClientOptions::parse(&opts.uri)
        .await
        .with_context(|| format!("Failed to parse MongoDB connection string '{}'", opts.uri))?;

    // Timeouts keep an unreachable target from hanging the caller
    options.connect_timeout = Some(opts.connect_timeout);
    options.server_selection_timeout = Some(opts.server_selection_timeout);
    if let Some(app_name) = &opts.app_name {
        options.app_name = Some(app_name.clone());
    }

    let client = Client::with_options(options).context("Failed to create MongoDB client")?;

    client
        .database("admin")
        .run_command(doc! { "ping": 1 })
        .await
        .with_context(|| format!("MongoDB at '{}' did not respond to ping", opts.uri))?;

    tracing::info!("Connected to target MongoDB");
    Ok(client)
}
