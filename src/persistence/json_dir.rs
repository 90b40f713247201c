use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::gateway::PersistenceGateway;
use crate::error::{PermissionError, Result};
use crate::permissions::{GuildId, GuildPermissionProfile};

/// Stores one pretty-printed JSON file per guild, named `<guild id>.json`
#[derive(Debug, Clone)]
pub struct JsonDirectoryGateway {
    dir: PathBuf,
}

impl JsonDirectoryGateway {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File a guild's profile lives in
    pub fn path_for(&self, guild_id: GuildId) -> PathBuf {
        self.dir.join(format!("{}.json", guild_id))
    }

    /// Load a single permission file. The guild id comes from the file name.
    pub async fn load_file(path: &Path) -> Result<GuildPermissionProfile> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        let guild_id: GuildId = stem.trim().parse().map_err(|_| PermissionError::InvalidFileName {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        })?;

        let path_display = path.display().to_string();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| PermissionError::Read {
                path: path_display.clone(),
                source: e,
            })?;

        let mut profile: GuildPermissionProfile =
            serde_json::from_str(&content).map_err(|e| PermissionError::Parse {
                path: path_display.clone(),
                source: e,
            })?;

        if profile.guild_id != guild_id {
            warn!(
                "Permission file '{}' claims guild {}, using {} from the file name",
                path_display, profile.guild_id, guild_id
            );
            profile.guild_id = guild_id;
        }

        Ok(profile)
    }

    /// Load every readable entry. Failed entries are logged and skipped.
    async fn load_entries(
        entries: impl Stream<Item = std::io::Result<PathBuf>>,
    ) -> Vec<GuildPermissionProfile> {
        futures::pin_mut!(entries);
        let mut profiles = Vec::new();

        while let Some(entry) = entries.next().await {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    warn!("Skipping unreadable permission directory entry: {}", e);
                    continue;
                }
            };

            if !path.is_file() {
                continue;
            }

            match Self::load_file(&path).await {
                Ok(profile) => {
                    debug!(
                        "Loaded permissions for guild {} ({})",
                        profile.guild_id,
                        profile.guild_name()
                    );
                    profiles.push(profile);
                }
                Err(e) => warn!("Skipping permission file: {}", e),
            }
        }

        profiles
    }
}

/// Paths of a directory listing. Entry errors are yielded, not fatal.
fn entry_paths(entries: tokio::fs::ReadDir) -> impl Stream<Item = std::io::Result<PathBuf>> {
    futures::stream::unfold(entries, |mut entries| async move {
        match entries.next_entry().await {
            Ok(Some(entry)) => Some((Ok(entry.path()), entries)),
            Ok(None) => None,
            Err(e) => Some((Err(e), entries)),
        }
    })
}

#[async_trait]
impl PersistenceGateway for JsonDirectoryGateway {
    async fn load_all(&self) -> Vec<GuildPermissionProfile> {
        info!("Reading permission files from {}", self.dir.display());

        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            warn!(
                "Could not create permission directory {}: {}",
                self.dir.display(),
                e
            );
        }

        let entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    "Could not read permission directory {}: {}",
                    self.dir.display(),
                    e
                );
                return Vec::new();
            }
        };

        let profiles = Self::load_entries(entry_paths(entries)).await;
        info!("Permission initialization complete: {} guilds", profiles.len());
        profiles
    }

    async fn save(&self, profile: &GuildPermissionProfile) -> Result<()> {
        let path = self.path_for(profile.guild_id);
        let display = path.display().to_string();

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| PermissionError::Save {
                path: display.clone(),
                source: e,
            })?;

        let content = serde_json::to_string_pretty(profile)?;

        // Write to temp file first, then rename for atomicity
        let temp_path = self.dir.join(format!("{}.json.tmp", profile.guild_id));
        tokio::fs::write(&temp_path, &content)
            .await
            .map_err(|e| PermissionError::Save {
                path: display.clone(),
                source: e,
            })?;

        tokio::fs::rename(&temp_path, &path)
            .await
            .map_err(|e| PermissionError::Save {
                path: display,
                source: e,
            })?;

        Ok(())
    }
}
