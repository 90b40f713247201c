use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

use super::types::*;
use crate::persistence::PersistenceWriter;

/// One guild's profile, shared between the registry and its readers
pub type SharedProfile = Arc<RwLock<GuildPermissionProfile>>;

/// Registry of every guild's permission profile.
///
/// Mutators update memory synchronously and schedule a write-behind save of
/// the edited guild.
pub struct PermissionStore {
    guilds: DashMap<GuildId, SharedProfile>,
    writer: PersistenceWriter,
}

impl PermissionStore {
    pub fn new(writer: PersistenceWriter) -> Self {
        Self {
            guilds: DashMap::new(),
            writer,
        }
    }

    /// Seed the registry with previously persisted profiles
    pub fn from_profiles(
        profiles: impl IntoIterator<Item = GuildPermissionProfile>,
        writer: PersistenceWriter,
    ) -> Self {
        let store = Self::new(writer);
        for profile in profiles {
            store
                .guilds
                .insert(profile.guild_id, Arc::new(RwLock::new(profile)));
        }
        info!("Permission store seeded with {} guilds", store.guilds.len());
        store
    }

    /// Fetch a guild's profile, creating a default one on first access
    pub fn get_or_create(&self, guild_id: GuildId, guild_name: &str) -> SharedProfile {
        self.guilds
            .entry(guild_id)
            .or_insert_with(|| {
                debug!("Creating permission profile for guild {} ({})", guild_id, guild_name);
                Arc::new(RwLock::new(GuildPermissionProfile::new(guild_id, guild_name)))
            })
            .clone()
    }

    /// Profile of a known guild
    pub fn get(&self, guild_id: GuildId) -> Option<SharedProfile> {
        self.guilds.get(&guild_id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.guilds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guilds.is_empty()
    }

    // ========== Lookups ==========

    fn lookup<F>(&self, guild_id: GuildId, select: F) -> Option<PermissionSet>
    where
        F: FnOnce(&GuildPermissionProfile) -> Option<&PermissionSet>,
    {
        let profile = self.get(guild_id)?;
        let profile = profile.read();
        select(&*profile).cloned()
    }

    pub fn get_default_permissions(&self, guild_id: GuildId) -> Option<PermissionSet> {
        self.lookup(guild_id, |p| Some(&p.default_permissions))
    }

    pub fn get_channel_permissions(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Option<PermissionSet> {
        self.lookup(guild_id, |p| p.channel_permissions.get(&channel_id))
    }

    pub fn get_role_permissions(
        &self,
        guild_id: GuildId,
        role_id: RoleId,
    ) -> Option<PermissionSet> {
        self.lookup(guild_id, |p| p.role_permissions.get(&role_id))
    }

    pub fn get_user_permissions(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> Option<PermissionSet> {
        self.lookup(guild_id, |p| p.user_permissions.get(&user_id))
    }

    /// Name of the role allowed to edit this guild's permissions
    pub fn controller_role_name(&self, guild_id: GuildId, guild_name: &str) -> String {
        self.get_or_create(guild_id, guild_name)
            .read()
            .controller_role_name
            .clone()
    }

    /// Whether denials should be reported. Unknown guilds use the default.
    pub fn is_verbose(&self, guild_id: GuildId) -> bool {
        self.get(guild_id).map(|p| p.read().verbose).unwrap_or(true)
    }

    // ========== Mutations ==========

    /// Apply an edit to a guild's profile and schedule it for saving
    fn mutate<F>(&self, guild_id: GuildId, guild_name: &str, edit: F)
    where
        F: FnOnce(&mut GuildPermissionProfile),
    {
        let profile = self.get_or_create(guild_id, guild_name);
        let mut profile = profile.write();
        edit(&mut *profile);
        // Scheduled under the lock so snapshots reach the writer in edit order
        self.writer.schedule(profile.clone());
    }

    fn set_rule(
        &self,
        guild_id: GuildId,
        guild_name: &str,
        subject: &Subject,
        kind: RuleKind,
        key: &str,
        allowed: bool,
    ) {
        debug!(
            "Guild {}: {} {} '{}' -> {}",
            guild_id,
            subject.kind(),
            kind,
            key,
            if allowed { "allowed" } else { "banned" }
        );
        self.mutate(guild_id, guild_name, |profile| {
            profile.subject_mut(subject).set(kind, key, allowed);
        });
    }

    pub fn set_module_permission(
        &self,
        guild_id: GuildId,
        guild_name: &str,
        subject: &Subject,
        module: &str,
        allowed: bool,
    ) {
        self.set_rule(guild_id, guild_name, subject, RuleKind::Module, module, allowed);
    }

    pub fn set_command_permission(
        &self,
        guild_id: GuildId,
        guild_name: &str,
        subject: &Subject,
        command: &str,
        allowed: bool,
    ) {
        self.set_rule(guild_id, guild_name, subject, RuleKind::Command, command, allowed);
    }

    pub fn set_controller_role_name(&self, guild_id: GuildId, guild_name: &str, role_name: &str) {
        debug!("Guild {}: controller role -> '{}'", guild_id, role_name);
        self.mutate(guild_id, guild_name, |profile| {
            profile.controller_role_name = role_name.to_string();
        });
    }

    pub fn set_verbose(&self, guild_id: GuildId, guild_name: &str, verbose: bool) {
        debug!("Guild {}: verbose -> {}", guild_id, verbose);
        self.mutate(guild_id, guild_name, |profile| {
            profile.verbose = verbose;
        });
    }

    /// Schedule a save of every known guild
    pub fn flush_all(&self) {
        for entry in self.guilds.iter() {
            let profile = entry.value().read();
            self.writer.schedule(profile.clone());
        }
    }

    /// Schedule a save of every guild and wait for the writes to finish
    pub async fn persist_all(&self) -> crate::error::Result<()> {
        self.flush_all();
        self.writer.flush().await
    }
}

/// Shared permission store type
pub type SharedPermissionStore = Arc<PermissionStore>;

pub fn create_shared_permission_store(store: PermissionStore) -> SharedPermissionStore {
    Arc::new(store)
}
