pub mod resolver;
pub mod store;
pub mod types;

pub use resolver::{CommandDescriptor, Invoker, PermissionResolver};
pub use store::{create_shared_permission_store, PermissionStore, SharedPermissionStore};
pub use types::{
    BanVerdict, ChannelId, GuildId, GuildPermissionProfile, PermissionSet, RoleId, RuleKind,
    Subject, SubjectKind, UserId,
};
