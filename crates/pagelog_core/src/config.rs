//! Store configuration.

use std::path::PathBuf;

/// Configuration for opening the page and value stores.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Directory holding the journals. `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,

    /// Whether to sync the journal on every insert (safer but slower).
    pub sync_on_insert: bool,

    /// Open the journals for reading only. No directory lock is taken, so
    /// a running server may keep writing.
    pub read_only: bool,
}

impl StoreConfig {
    /// Creates an in-memory configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the journal directory.
    #[must_use]
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Sets whether to sync the journal on every insert.
    #[must_use]
    pub const fn sync_on_insert(mut self, value: bool) -> Self {
        self.sync_on_insert = value;
        self
    }

    /// Sets read-only mode.
    #[must_use]
    pub const fn read_only(mut self, value: bool) -> Self {
        self.read_only = value;
        self
    }

    /// Returns true when no journal directory is configured.
    #[must_use]
    pub fn is_ephemeral(&self) -> bool {
        self.data_dir.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_in_memory() {
        let config = StoreConfig::default();
        assert!(config.is_ephemeral());
        assert!(!config.sync_on_insert);
        assert!(!config.read_only);
    }

    #[test]
    fn builder_pattern() {
        let config = StoreConfig::new()
            .data_dir("/tmp/pagelog")
            .sync_on_insert(true)
            .read_only(true);
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/pagelog")));
        assert!(config.sync_on_insert);
        assert!(config.read_only);
    }
}
