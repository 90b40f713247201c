use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::permissions::GuildPermissionProfile;

/// Durable home for guild permission profiles
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Load every readable profile. Unreadable entries are skipped, never fatal.
    async fn load_all(&self) -> Vec<GuildPermissionProfile>;

    /// Write one profile, replacing whatever was stored for its guild
    async fn save(&self, profile: &GuildPermissionProfile) -> Result<()>;
}

pub type SharedGateway = Arc<dyn PersistenceGateway>;
