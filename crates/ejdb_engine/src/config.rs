//! Engine configuration.

use crate::flags::OpenMode;

/// Default cap on the number of collections per database.
pub const DEFAULT_MAX_COLLECTIONS: usize = 1024;

/// Configuration for opening an engine.
#[derive(Debug, Clone)]
pub struct Config {
    /// Open mode bits.
    pub mode: OpenMode,

    /// Maximum number of collections.
    pub max_collections: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: OpenMode::DEFAULT,
            max_collections: DEFAULT_MAX_COLLECTIONS,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the open mode.
    #[must_use]
    pub const fn mode(mut self, mode: OpenMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the collection cap.
    #[must_use]
    pub const fn max_collections(mut self, max: usize) -> Self {
        self.max_collections = max;
        self
    }

    /// Whether each save is synced to disk.
    #[must_use]
    pub const fn sync_on_save(&self) -> bool {
        self.mode.contains(OpenMode::SYNC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.mode, OpenMode::DEFAULT);
        assert_eq!(config.max_collections, DEFAULT_MAX_COLLECTIONS);
        assert!(config.sync_on_save());
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .mode(OpenMode::READER)
            .max_collections(4);

        assert_eq!(config.mode, OpenMode::READER);
        assert_eq!(config.max_collections, 4);
        assert!(!config.sync_on_save());
    }
}
