// src/permissions/types.rs
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub type GuildId = u64;
pub type ChannelId = u64;
pub type RoleId = u64;
pub type UserId = u64;

/// Role name allowed to edit a fresh guild's permissions
pub const DEFAULT_CONTROLLER_ROLE: &str = "Nadeko";

/// Allow/deny table attached to one subject (the guild itself, a channel, a role or a user)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    /// Display label of the owning subject
    #[serde(default)]
    pub name: String,

    /// Module name -> allowed
    #[serde(default)]
    pub modules: HashMap<String, bool>,

    /// Command name -> allowed
    #[serde(default)]
    pub commands: HashMap<String, bool>,
}

impl PermissionSet {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            modules: HashMap::new(),
            commands: HashMap::new(),
        }
    }

    /// Table for one rule granularity
    pub fn rules(&self, kind: RuleKind) -> &HashMap<String, bool> {
        match kind {
            RuleKind::Module => &self.modules,
            RuleKind::Command => &self.commands,
        }
    }

    fn rules_mut(&mut self, kind: RuleKind) -> &mut HashMap<String, bool> {
        match kind {
            RuleKind::Module => &mut self.modules,
            RuleKind::Command => &mut self.commands,
        }
    }

    /// True only when the key is present and explicitly set to false
    pub fn is_banned(&self, kind: RuleKind, key: &str) -> bool {
        matches!(self.rules(kind).get(key), Some(false))
    }

    #[cfg(test)]
    pub fn bans_module(&self, module: &str) -> bool {
        self.is_banned(RuleKind::Module, module)
    }

    #[cfg(test)]
    pub fn bans_command(&self, command: &str) -> bool {
        self.is_banned(RuleKind::Command, command)
    }

    /// Insert or overwrite a rule
    pub fn set(&mut self, kind: RuleKind, key: &str, allowed: bool) {
        self.rules_mut(kind).insert(key.to_string(), allowed);
    }

    /// Sorted names of everything explicitly banned at one granularity
    pub fn banned(&self, kind: RuleKind) -> Vec<&str> {
        let mut banned: Vec<&str> = self
            .rules(kind)
            .iter()
            .filter(|(_, allowed)| !**allowed)
            .map(|(key, _)| key.as_str())
            .collect();
        banned.sort_unstable();
        banned
    }
}

/// Root permission state for one guild.
///
/// Field names and order follow the on-disk JSON layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildPermissionProfile {
    /// Role allowed to edit this profile
    pub controller_role_name: String,

    /// Whether denials are reported back to the invoking user
    pub verbose: bool,

    #[serde(rename = "guildID")]
    pub guild_id: GuildId,

    /// Guild-wide rules; its name is the guild name captured at creation
    pub default_permissions: PermissionSet,

    #[serde(default)]
    pub user_permissions: HashMap<UserId, PermissionSet>,

    #[serde(default)]
    pub channel_permissions: HashMap<ChannelId, PermissionSet>,

    #[serde(default)]
    pub role_permissions: HashMap<RoleId, PermissionSet>,
}

impl GuildPermissionProfile {
    pub fn new(guild_id: GuildId, guild_name: &str) -> Self {
        Self {
            controller_role_name: DEFAULT_CONTROLLER_ROLE.to_string(),
            verbose: true,
            guild_id,
            default_permissions: PermissionSet::new(guild_name),
            user_permissions: HashMap::new(),
            channel_permissions: HashMap::new(),
            role_permissions: HashMap::new(),
        }
    }

    /// Guild name as it was when the profile was created
    pub fn guild_name(&self) -> &str {
        &self.default_permissions.name
    }

    /// Override set of a subject, if one has been created
    #[cfg(test)]
    pub fn subject(&self, subject: &Subject) -> Option<&PermissionSet> {
        match subject {
            Subject::Server => Some(&self.default_permissions),
            Subject::Channel { id, .. } => self.channel_permissions.get(id),
            Subject::Role { id, .. } => self.role_permissions.get(id),
            Subject::User { id, .. } => self.user_permissions.get(id),
        }
    }

    /// Override set of a subject, created with the subject's name on first use
    pub fn subject_mut(&mut self, subject: &Subject) -> &mut PermissionSet {
        match subject {
            Subject::Server => &mut self.default_permissions,
            Subject::Channel { id, name } => self
                .channel_permissions
                .entry(*id)
                .or_insert_with(|| PermissionSet::new(name)),
            Subject::Role { id, name } => self
                .role_permissions
                .entry(*id)
                .or_insert_with(|| PermissionSet::new(name)),
            Subject::User { id, name } => self
                .user_permissions
                .entry(*id)
                .or_insert_with(|| PermissionSet::new(name)),
        }
    }
}

/// Granularity of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    Module,
    Command,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::Module => write!(f, "module"),
            RuleKind::Command => write!(f, "command"),
        }
    }
}

/// Layer a rule is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubjectKind {
    Server,
    Channel,
    Role,
    User,
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectKind::Server => write!(f, "server"),
            SubjectKind::Channel => write!(f, "channel"),
            SubjectKind::Role => write!(f, "role"),
            SubjectKind::User => write!(f, "user"),
        }
    }
}

/// Target of a permission edit. The name labels a lazily created override set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    Server,
    Channel { id: ChannelId, name: String },
    Role { id: RoleId, name: String },
    User { id: UserId, name: String },
}

impl Subject {
    pub fn kind(&self) -> SubjectKind {
        match self {
            Subject::Server => SubjectKind::Server,
            Subject::Channel { .. } => SubjectKind::Channel,
            Subject::Role { .. } => SubjectKind::Role,
            Subject::User { .. } => SubjectKind::User,
        }
    }
}

/// Outcome of permission resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BanVerdict {
    None,
    ServerModule,
    ServerCommand,
    ChannelModule,
    ChannelCommand,
    RoleModule,
    RoleCommand,
    UserModule,
    UserCommand,
}

impl BanVerdict {
    pub fn banned(layer: SubjectKind, granularity: RuleKind) -> Self {
        match (layer, granularity) {
            (SubjectKind::Server, RuleKind::Module) => BanVerdict::ServerModule,
            (SubjectKind::Server, RuleKind::Command) => BanVerdict::ServerCommand,
            (SubjectKind::Channel, RuleKind::Module) => BanVerdict::ChannelModule,
            (SubjectKind::Channel, RuleKind::Command) => BanVerdict::ChannelCommand,
            (SubjectKind::Role, RuleKind::Module) => BanVerdict::RoleModule,
            (SubjectKind::Role, RuleKind::Command) => BanVerdict::RoleCommand,
            (SubjectKind::User, RuleKind::Module) => BanVerdict::UserModule,
            (SubjectKind::User, RuleKind::Command) => BanVerdict::UserCommand,
        }
    }

    pub fn is_banned(self) -> bool {
        self != BanVerdict::None
    }

    /// Layer that declared the ban
    pub fn layer(self) -> Option<SubjectKind> {
        match self {
            BanVerdict::None => None,
            BanVerdict::ServerModule | BanVerdict::ServerCommand => Some(SubjectKind::Server),
            BanVerdict::ChannelModule | BanVerdict::ChannelCommand => Some(SubjectKind::Channel),
            BanVerdict::RoleModule | BanVerdict::RoleCommand => Some(SubjectKind::Role),
            BanVerdict::UserModule | BanVerdict::UserCommand => Some(SubjectKind::User),
        }
    }

    /// Whether the whole module or just the command was banned
    pub fn granularity(self) -> Option<RuleKind> {
        match self {
            BanVerdict::None => None,
            BanVerdict::ServerModule
            | BanVerdict::ChannelModule
            | BanVerdict::RoleModule
            | BanVerdict::UserModule => Some(RuleKind::Module),
            BanVerdict::ServerCommand
            | BanVerdict::ChannelCommand
            | BanVerdict::RoleCommand
            | BanVerdict::UserCommand => Some(RuleKind::Command),
        }
    }
}

impl fmt::Display for BanVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.layer(), self.granularity()) {
            (Some(SubjectKind::Role), Some(granularity)) => {
                write!(f, "none of your roles may use this {}", granularity)
            }
            (Some(SubjectKind::User), Some(granularity)) => {
                write!(f, "you are banned from using this {}", granularity)
            }
            (Some(layer), Some(granularity)) => {
                write!(f, "this {} is banned on this {}", granularity, layer)
            }
            _ => write!(f, "allowed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_profile_defaults() {
        let profile = GuildPermissionProfile::new(42, "Test Guild");

        assert_eq!(profile.guild_id, 42);
        assert_eq!(profile.guild_name(), "Test Guild");
        assert_eq!(profile.controller_role_name, "Nadeko");
        assert!(profile.verbose);
        assert!(profile.default_permissions.modules.is_empty());
        assert!(profile.channel_permissions.is_empty());
        assert!(profile.role_permissions.is_empty());
        assert!(profile.user_permissions.is_empty());
    }

    #[test]
    fn test_only_explicit_false_is_banned() {
        let mut set = PermissionSet::new("general");
        set.set(RuleKind::Module, "Gambling", false);
        set.set(RuleKind::Command, "flip", true);

        assert!(set.bans_module("Gambling"));
        assert!(!set.bans_module("gambling"));
        assert!(!set.bans_command("flip"));
        assert!(!set.bans_command("8ball"));
    }

    #[test]
    fn test_set_overwrites_existing_rule() {
        let mut set = PermissionSet::new("general");
        set.set(RuleKind::Command, "flip", false);
        set.set(RuleKind::Command, "flip", true);

        assert_eq!(set.commands.len(), 1);
        assert_eq!(set.commands.get("flip"), Some(&true));
    }

    #[test]
    fn test_subject_mut_creates_named_set_once() {
        let mut profile = GuildPermissionProfile::new(1, "Guild");
        let subject = Subject::Role {
            id: 7,
            name: "Members".to_string(),
        };

        assert!(profile.subject(&subject).is_none());
        profile
            .subject_mut(&subject)
            .set(RuleKind::Module, "Music", false);
        profile
            .subject_mut(&Subject::Role {
                id: 7,
                name: "Renamed".to_string(),
            })
            .set(RuleKind::Command, "play", false);

        let set = profile.subject(&subject).unwrap();
        assert_eq!(set.name, "Members");
        assert!(set.bans_module("Music"));
        assert!(set.bans_command("play"));
        assert_eq!(profile.role_permissions.len(), 1);
    }

    #[test]
    fn test_banned_lists_sorted_denials_only() {
        let mut set = PermissionSet::new("x");
        set.set(RuleKind::Module, "Searches", false);
        set.set(RuleKind::Module, "Gambling", false);
        set.set(RuleKind::Module, "Music", true);

        assert_eq!(set.banned(RuleKind::Module), vec!["Gambling", "Searches"]);
        assert!(set.banned(RuleKind::Command).is_empty());
    }

    #[test]
    fn test_profile_json_round_trip() {
        let mut profile = GuildPermissionProfile::new(1234567890123, "Round Trip");
        profile.verbose = false;
        profile.controller_role_name = "Mods".to_string();
        profile
            .subject_mut(&Subject::Server)
            .set(RuleKind::Module, "Gambling", false);
        profile
            .subject_mut(&Subject::Channel {
                id: 55,
                name: "general".to_string(),
            })
            .set(RuleKind::Command, "flip", false);
        profile
            .subject_mut(&Subject::User {
                id: u64::MAX,
                name: "someone".to_string(),
            })
            .set(RuleKind::Command, "8ball", true);

        let json = serde_json::to_string_pretty(&profile).unwrap();
        let parsed: GuildPermissionProfile = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, profile);
    }

    #[test]
    fn test_profile_json_field_names() {
        let profile = GuildPermissionProfile::new(99, "Names");
        let value = serde_json::to_value(&profile).unwrap();

        assert_eq!(value["controllerRoleName"], "Nadeko");
        assert_eq!(value["verbose"], true);
        assert_eq!(value["guildID"], 99);
        assert_eq!(value["defaultPermissions"]["name"], "Names");
        assert!(value["userPermissions"].is_object());
        assert!(value["channelPermissions"].is_object());
        assert!(value["rolePermissions"].is_object());
    }

    #[test]
    fn test_parse_profile_without_override_maps() {
        let json = r#"{
            "controllerRoleName": "Admins",
            "verbose": false,
            "guildID": 5,
            "defaultPermissions": { "name": "Old Guild", "modules": { "NSFW": false } }
        }"#;

        let profile: GuildPermissionProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.controller_role_name, "Admins");
        assert!(profile.default_permissions.bans_module("NSFW"));
        assert!(profile.default_permissions.commands.is_empty());
        assert!(profile.role_permissions.is_empty());
    }

    #[test]
    fn test_verdict_layer_and_granularity() {
        assert!(!BanVerdict::None.is_banned());
        assert_eq!(BanVerdict::None.layer(), None);

        let verdict = BanVerdict::banned(SubjectKind::Channel, RuleKind::Command);
        assert_eq!(verdict, BanVerdict::ChannelCommand);
        assert!(verdict.is_banned());
        assert_eq!(verdict.layer(), Some(SubjectKind::Channel));
        assert_eq!(verdict.granularity(), Some(RuleKind::Command));
        assert_eq!(verdict.to_string(), "this command is banned on this channel");
        assert_eq!(
            BanVerdict::RoleModule.to_string(),
            "none of your roles may use this module"
        );
    }
}
