use scanbridge_core::constants::DEFAULT_QUEUE_PATH;
use std::path::PathBuf;

/// Durable queue configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Path to the JSON queue document
    pub path: PathBuf,

    /// Whether to create missing parent directories on open
    pub create_dirs: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_QUEUE_PATH),
            create_dirs: true,
        }
    }
}

impl QueueConfig {
    /// Create a configuration for the document at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Set whether missing parent directories are created on open
    pub fn create_dirs(mut self, create: bool) -> Self {
        self.create_dirs = create;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_config_defaults() {
        let config = QueueConfig::default();
        assert_eq!(config.path, PathBuf::from("scanbridge-queue.json"));
        assert!(config.create_dirs);
    }

    #[test]
    fn test_queue_config_builder() {
        let config = QueueConfig::new("/var/lib/scanbridge/queue.json").create_dirs(false);
        assert_eq!(config.path, PathBuf::from("/var/lib/scanbridge/queue.json"));
        assert!(!config.create_dirs);
    }
}
