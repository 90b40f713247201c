use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;

/// Runtime configuration for the bot
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Directory holding one `<guild id>.json` per guild
    pub permissions_dir: PathBuf,
    /// Prefix for text commands
    pub prefix: String,
    pub log_level: LevelFilter,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            permissions_dir: PathBuf::from("data/permissions"),
            prefix: "-".to_string(),
            log_level: LevelFilter::INFO,
        }
    }
}

impl BotConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            permissions_dir: lookup("PERMISSIONS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.permissions_dir),
            prefix: lookup("COMMAND_PREFIX")
                .filter(|p| !p.trim().is_empty())
                .unwrap_or(defaults.prefix),
            log_level: lookup("LOG_LEVEL")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.log_level),
        }
    }

    /// Apply command line overrides on top of the environment
    pub fn with_overrides(
        mut self,
        permissions_dir: Option<PathBuf>,
        prefix: Option<String>,
        log_level: Option<LevelFilter>,
    ) -> Self {
        if let Some(dir) = permissions_dir {
            self.permissions_dir = dir;
        }
        if let Some(prefix) = prefix {
            self.prefix = prefix;
        }
        if let Some(level) = log_level {
            self.log_level = level;
        }
        self
    }
}
