//! Serve command implementation.

use pagelog_core::{StoreConfig, Stores};
use pagelog_server::{PagelogServer, ServerConfig, ServerContext, DEFAULT_PORT};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// Options collected from flags and environment.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// Listening port.
    pub port: u16,
    /// Listening address.
    pub bind: IpAddr,
    /// Journal directory, if persistent.
    pub data_dir: Option<PathBuf>,
    /// Sync journals after every insert.
    pub sync_on_insert: bool,
    /// Override for the pending frame cap.
    pub max_pending_frames: Option<usize>,
    /// Override for the dedup window.
    pub dedup_window: Option<usize>,
    /// Override for the listing size cap.
    pub max_page_size: Option<u64>,
}

/// Parses `--port`/`PORT`, falling back to the default when unset or invalid.
pub fn parse_port(raw: Option<&str>) -> u16 {
    match raw.map(str::trim) {
        None | Some("") => DEFAULT_PORT,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(port = raw, default = DEFAULT_PORT, "invalid port, using default");
            DEFAULT_PORT
        }),
    }
}

impl ServeOptions {
    fn server_config(&self) -> ServerConfig {
        let mut config = ServerConfig::new(SocketAddr::new(self.bind, self.port));
        if let Some(max) = self.max_pending_frames {
            config = config.with_max_pending_frames(max);
        }
        if let Some(size) = self.dedup_window {
            config = config.with_dedup_window(size);
        }
        if let Some(size) = self.max_page_size {
            config = config.with_max_page_size(size);
        }
        config
    }

    fn store_config(&self) -> StoreConfig {
        let config = StoreConfig::new().sync_on_insert(self.sync_on_insert);
        match &self.data_dir {
            Some(dir) => config.data_dir(dir),
            None => config,
        }
    }
}

/// Runs the serve command.
pub fn run(options: ServeOptions) -> Result<(), Box<dyn std::error::Error>> {
    let store_config = options.store_config();
    if store_config.is_ephemeral() {
        tracing::warn!("no data directory given, pages will not survive a restart");
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let stores = Stores::open(&store_config)?;
        let context = ServerContext::new(options.server_config(), stores);
        PagelogServer::new(context).run().await?;
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
