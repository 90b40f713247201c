//! Decides whether a command invocation is banned and by which layer.
//!
//! Layers are checked in a fixed order and the first ban wins:
//! server module, server command, channel module, channel command,
//! role module, role command, user module, user command.

use tracing::trace;

use super::store::SharedPermissionStore;
use super::types::*;

/// The command being invoked
#[derive(Debug, Clone, Copy)]
pub struct CommandDescriptor<'a> {
    /// Module the command belongs to
    pub category: &'a str,
    pub name: &'a str,
}

/// The member invoking a command
#[derive(Debug, Clone, Copy)]
pub struct Invoker<'a> {
    pub id: UserId,
    pub role_ids: &'a [RoleId],
}

#[derive(Clone)]
pub struct PermissionResolver {
    store: SharedPermissionStore,
}

impl PermissionResolver {
    pub fn new(store: SharedPermissionStore) -> Self {
        Self { store }
    }

    /// Verdict for an invocation in a guild. Unknown guilds carry no overrides.
    pub fn evaluate(
        &self,
        guild_id: GuildId,
        command: CommandDescriptor<'_>,
        invoker: Invoker<'_>,
        channel_id: ChannelId,
    ) -> BanVerdict {
        let verdict = match self.store.get(guild_id) {
            Some(profile) => resolve(&profile.read(), command, invoker, channel_id),
            None => resolve(
                &GuildPermissionProfile::new(guild_id, ""),
                command,
                invoker,
                channel_id,
            ),
        };

        trace!(
            "Guild {} channel {} user {}: {}/{} -> {:?}",
            guild_id,
            channel_id,
            invoker.id,
            command.category,
            command.name,
            verdict
        );
        verdict
    }
}

/// Apply the layer precedence to one profile
pub fn resolve(
    profile: &GuildPermissionProfile,
    command: CommandDescriptor<'_>,
    invoker: Invoker<'_>,
    channel_id: ChannelId,
) -> BanVerdict {
    let granularities = [
        (RuleKind::Module, command.category),
        (RuleKind::Command, command.name),
    ];

    for (kind, key) in granularities {
        if profile.default_permissions.is_banned(kind, key) {
            return BanVerdict::banned(SubjectKind::Server, kind);
        }
    }

    if let Some(channel) = profile.channel_permissions.get(&channel_id) {
        for (kind, key) in granularities {
            if channel.is_banned(kind, key) {
                return BanVerdict::banned(SubjectKind::Channel, kind);
            }
        }
    }

    // A role only blocks when every role the member holds bans the key.
    // Holding no roles at all therefore counts as banned.
    for (kind, key) in granularities {
        let any_role_allows = invoker.role_ids.iter().any(|role_id| {
            !profile
                .role_permissions
                .get(role_id)
                .is_some_and(|set| set.is_banned(kind, key))
        });
        if !any_role_allows {
            return BanVerdict::banned(SubjectKind::Role, kind);
        }
    }

    if let Some(user) = profile.user_permissions.get(&invoker.id) {
        for (kind, key) in granularities {
            if user.is_banned(kind, key) {
                return BanVerdict::banned(SubjectKind::User, kind);
            }
        }
    }

    BanVerdict::None
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUILD: GuildId = 1;
    const CHANNEL: ChannelId = 10;
    const USER: UserId = 100;
    const ROLE_A: RoleId = 1000;
    const ROLE_B: RoleId = 1001;

    const FLIP: CommandDescriptor<'static> = CommandDescriptor {
        category: "Gambling",
        name: "flip",
    };
    const EIGHT_BALL: CommandDescriptor<'static> = CommandDescriptor {
        category: "Games",
        name: "8ball",
    };

    fn profile() -> GuildPermissionProfile {
        GuildPermissionProfile::new(GUILD, "Test Guild")
    }

    fn channel(id: ChannelId) -> Subject {
        Subject::Channel {
            id,
            name: format!("channel-{}", id),
        }
    }

    fn role(id: RoleId) -> Subject {
        Subject::Role {
            id,
            name: format!("role-{}", id),
        }
    }

    fn user(id: UserId) -> Subject {
        Subject::User {
            id,
            name: format!("user-{}", id),
        }
    }

    fn ban(profile: &mut GuildPermissionProfile, subject: Subject, kind: RuleKind, key: &str) {
        profile.subject_mut(&subject).set(kind, key, false);
    }

    fn check(
        profile: &GuildPermissionProfile,
        command: CommandDescriptor<'_>,
        roles: &[RoleId],
    ) -> BanVerdict {
        resolve(
            profile,
            command,
            Invoker {
                id: USER,
                role_ids: roles,
            },
            CHANNEL,
        )
    }

    #[test]
    fn test_server_module_ban_beats_everything() {
        let mut p = profile();
        ban(&mut p, Subject::Server, RuleKind::Module, "Gambling");
        ban(&mut p, Subject::Server, RuleKind::Command, "flip");
        ban(&mut p, channel(CHANNEL), RuleKind::Module, "Gambling");
        ban(&mut p, role(ROLE_A), RuleKind::Module, "Gambling");
        ban(&mut p, user(USER), RuleKind::Command, "flip");

        assert_eq!(check(&p, FLIP, &[ROLE_A]), BanVerdict::ServerModule);
        assert_eq!(check(&p, FLIP, &[]), BanVerdict::ServerModule);
    }

    #[test]
    fn test_scenario_server_module_any_context() {
        let mut p = profile();
        ban(&mut p, Subject::Server, RuleKind::Module, "Gambling");

        for roles in [&[][..], &[ROLE_A][..], &[ROLE_A, ROLE_B][..]] {
            for channel_id in [CHANNEL, 11, 12] {
                let verdict = resolve(
                    &p,
                    FLIP,
                    Invoker {
                        id: 7,
                        role_ids: roles,
                    },
                    channel_id,
                );
                assert_eq!(verdict, BanVerdict::ServerModule);
            }
        }
    }

    #[test]
    fn test_server_command_ban() {
        let mut p = profile();
        ban(&mut p, Subject::Server, RuleKind::Command, "flip");
        ban(&mut p, channel(CHANNEL), RuleKind::Module, "Gambling");

        assert_eq!(check(&p, FLIP, &[ROLE_A]), BanVerdict::ServerCommand);
    }

    #[test]
    fn test_channel_bans_beat_role_and_user_bans() {
        let mut p = profile();
        ban(&mut p, channel(CHANNEL), RuleKind::Command, "flip");
        ban(&mut p, role(ROLE_A), RuleKind::Module, "Gambling");
        ban(&mut p, user(USER), RuleKind::Module, "Gambling");

        assert_eq!(check(&p, FLIP, &[ROLE_A]), BanVerdict::ChannelCommand);

        ban(&mut p, channel(CHANNEL), RuleKind::Module, "Gambling");
        assert_eq!(check(&p, FLIP, &[ROLE_A]), BanVerdict::ChannelModule);
    }

    #[test]
    fn test_channel_ban_only_applies_to_its_channel() {
        let mut p = profile();
        ban(&mut p, channel(99), RuleKind::Module, "Gambling");

        assert_eq!(check(&p, FLIP, &[ROLE_A]), BanVerdict::None);
    }

    #[test]
    fn test_all_roles_banning_module() {
        let mut p = profile();
        ban(&mut p, role(ROLE_A), RuleKind::Module, "Gambling");
        ban(&mut p, role(ROLE_B), RuleKind::Module, "Gambling");

        assert_eq!(check(&p, FLIP, &[ROLE_A, ROLE_B]), BanVerdict::RoleModule);
    }

    #[test]
    fn test_one_unbanned_role_lets_member_through() {
        let mut p = profile();
        ban(&mut p, role(ROLE_A), RuleKind::Module, "Gambling");
        ban(&mut p, user(USER), RuleKind::Command, "flip");

        // ROLE_B has no override at all
        assert_eq!(check(&p, FLIP, &[ROLE_A, ROLE_B]), BanVerdict::UserCommand);

        // An explicit allow counts the same as no override
        p.subject_mut(&role(ROLE_B)).set(RuleKind::Module, "Gambling", true);
        assert_eq!(check(&p, FLIP, &[ROLE_A, ROLE_B]), BanVerdict::UserCommand);
    }

    #[test]
    fn test_role_command_ban_after_module_passes() {
        let mut p = profile();
        ban(&mut p, role(ROLE_A), RuleKind::Command, "flip");
        ban(&mut p, role(ROLE_B), RuleKind::Module, "Gambling");

        // ROLE_A passes the module stage, but no role passes the command stage
        ban(&mut p, role(ROLE_B), RuleKind::Command, "flip");
        assert_eq!(check(&p, FLIP, &[ROLE_A, ROLE_B]), BanVerdict::RoleCommand);
    }

    #[test]
    fn test_scenario_role_command() {
        let mut p = profile();
        ban(&mut p, role(ROLE_A), RuleKind::Command, "flip");

        assert_eq!(check(&p, FLIP, &[ROLE_A]), BanVerdict::RoleCommand);
        assert_eq!(check(&p, EIGHT_BALL, &[ROLE_A]), BanVerdict::None);
    }

    #[test]
    fn test_member_without_roles_is_role_banned() {
        // Current behavior: with no roles there is no role that allows the module
        let p = profile();
        assert_eq!(check(&p, FLIP, &[]), BanVerdict::RoleModule);

        // Server and channel bans still take precedence
        let mut p = profile();
        ban(&mut p, channel(CHANNEL), RuleKind::Command, "flip");
        assert_eq!(check(&p, FLIP, &[]), BanVerdict::ChannelCommand);
    }

    #[test]
    fn test_scenario_user_command() {
        let mut p = profile();
        ban(&mut p, user(USER), RuleKind::Command, "8ball");

        assert_eq!(check(&p, EIGHT_BALL, &[ROLE_A]), BanVerdict::UserCommand);
        assert_eq!(check(&p, FLIP, &[ROLE_A]), BanVerdict::None);
    }

    #[test]
    fn test_user_module_before_user_command() {
        let mut p = profile();
        ban(&mut p, user(USER), RuleKind::Module, "Games");
        ban(&mut p, user(USER), RuleKind::Command, "8ball");

        assert_eq!(check(&p, EIGHT_BALL, &[ROLE_A]), BanVerdict::UserModule);
    }

    #[test]
    fn test_scenario_nothing_configured() {
        let p = profile();
        assert_eq!(check(&p, FLIP, &[ROLE_A]), BanVerdict::None);
        assert_eq!(check(&p, EIGHT_BALL, &[ROLE_A, ROLE_B]), BanVerdict::None);
    }

    #[test]
    fn test_keys_are_case_sensitive() {
        let mut p = profile();
        ban(&mut p, Subject::Server, RuleKind::Module, "gambling");
        ban(&mut p, Subject::Server, RuleKind::Command, "FLIP");

        assert_eq!(check(&p, FLIP, &[ROLE_A]), BanVerdict::None);
    }

    #[tokio::test]
    async fn test_evaluate_reads_through_store() {
        use crate::permissions::store::{create_shared_permission_store, PermissionStore};
        use crate::persistence::writer::tests::RecordingGateway;
        use crate::persistence::PersistenceWriter;
        use std::sync::Arc;

        let writer = PersistenceWriter::spawn(Arc::new(RecordingGateway::default()));
        let store = create_shared_permission_store(PermissionStore::new(writer));
        let resolver = PermissionResolver::new(store.clone());
        let invoker = Invoker {
            id: USER,
            role_ids: &[ROLE_A],
        };

        // Unknown guild: nothing restricted and nothing created
        assert_eq!(resolver.evaluate(GUILD, FLIP, invoker, CHANNEL), BanVerdict::None);
        assert!(store.get(GUILD).is_none());

        store.set_module_permission(GUILD, "Test Guild", &Subject::Server, "Gambling", false);
        assert_eq!(
            resolver.evaluate(GUILD, FLIP, invoker, CHANNEL),
            BanVerdict::ServerModule
        );
        assert_eq!(
            resolver.evaluate(GUILD, EIGHT_BALL, invoker, CHANNEL),
            BanVerdict::None
        );
    }
}
