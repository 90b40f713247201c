use poise::serenity_prelude as serenity;
use tracing::info;

use super::check::is_permission_controller;
use crate::permissions::{PermissionSet, RuleKind, Subject};
use crate::{Context, Error};

// ========== Helpers ==========

/// Guild id and display name of the invoking guild
async fn guild_info(ctx: Context<'_>) -> Result<(serenity::GuildId, String), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a guild")?;
    let guild_name = ctx
        .partial_guild()
        .await
        .map(|g| g.name)
        .unwrap_or_default();
    Ok((guild_id, guild_name))
}

/// Registered module name matching the input, ignoring case
fn canonical_module(ctx: Context<'_>, input: &str) -> Option<String> {
    ctx.framework()
        .options()
        .commands
        .iter()
        .filter_map(|c| c.category.as_deref())
        .find(|category| category.eq_ignore_ascii_case(input.trim()))
        .map(str::to_string)
}

/// Registered command name matching the input, ignoring case
fn canonical_command(ctx: Context<'_>, input: &str) -> Option<String> {
    fn find(commands: &[poise::Command<crate::Data, Error>], input: &str) -> Option<String> {
        commands.iter().find_map(|c| {
            if c.qualified_name.eq_ignore_ascii_case(input) || c.name.eq_ignore_ascii_case(input) {
                Some(c.qualified_name.clone())
            } else {
                find(&c.subcommands, input)
            }
        })
    }
    find(&ctx.framework().options().commands, input.trim())
}

async fn reply(ctx: Context<'_>, content: String) -> Result<(), Error> {
    ctx.send(poise::CreateReply::default().content(content).ephemeral(true))
        .await?;
    Ok(())
}

fn describe_subject(subject: &Subject) -> String {
    match subject {
        Subject::Server => "this server".to_string(),
        Subject::Channel { id, .. } => format!("<#{}>", id),
        Subject::Role { name, .. } => format!("role `{}`", name),
        Subject::User { name, .. } => format!("user `{}`", name),
    }
}

/// Listing of everything a permission set bans
pub fn format_permission_set(set: &PermissionSet) -> String {
    let mut out = String::new();
    for (kind, title) in [
        (RuleKind::Module, "Banned modules"),
        (RuleKind::Command, "Banned commands"),
    ] {
        let banned = set.banned(kind);
        if banned.is_empty() {
            continue;
        }
        out.push_str(&format!("**{}:**\n", title));
        for name in banned {
            out.push_str(&format!("`[x]` {}\n", name));
        }
    }
    if out.is_empty() {
        out.push_str("No restrictions.");
    }
    out
}

/// Channel argument or the channel the command was used in
async fn resolve_channel(
    ctx: Context<'_>,
    channel: Option<serenity::GuildChannel>,
) -> Result<serenity::GuildChannel, Error> {
    match channel {
        Some(channel) => Ok(channel),
        None => Ok(ctx
            .guild_channel()
            .await
            .ok_or("Could not resolve the current channel")?),
    }
}

fn channel_subject(channel: &serenity::GuildChannel) -> Subject {
    Subject::Channel {
        id: channel.id.get(),
        name: channel.name.clone(),
    }
}

fn role_subject(role: &serenity::Role) -> Subject {
    Subject::Role {
        id: role.id.get(),
        name: role.name.clone(),
    }
}

fn user_subject(user: &serenity::User) -> Subject {
    Subject::User {
        id: user.id.get(),
        name: user.name.clone(),
    }
}

/// Validate a module/command name and store the rule for a subject
async fn set_rule(
    ctx: Context<'_>,
    subject: Subject,
    kind: RuleKind,
    name: &str,
    allowed: bool,
) -> Result<(), Error> {
    let (guild_id, guild_name) = guild_info(ctx).await?;

    let key = match kind {
        RuleKind::Module => canonical_module(ctx, name),
        RuleKind::Command => canonical_command(ctx, name),
    };
    let Some(key) = key else {
        return reply(ctx, format!("There is no {} named `{}`.", kind, name)).await;
    };

    let store = &ctx.data().permissions;
    match kind {
        RuleKind::Module => {
            store.set_module_permission(guild_id.get(), &guild_name, &subject, &key, allowed)
        }
        RuleKind::Command => {
            store.set_command_permission(guild_id.get(), &guild_name, &subject, &key, allowed)
        }
    }

    info!(
        "{} set {} '{}' to {} for {:?} in guild {}",
        ctx.author().name,
        kind,
        key,
        allowed,
        subject.kind(),
        guild_id
    );

    ctx.say(format!(
        "{} `{}` is now **{}** for {}.",
        match kind {
            RuleKind::Module => "Module",
            RuleKind::Command => "Command",
        },
        key,
        if allowed { "allowed" } else { "banned" },
        describe_subject(&subject)
    ))
    .await?;
    Ok(())
}

async fn show_rules(
    ctx: Context<'_>,
    subject: Subject,
    set: Option<PermissionSet>,
) -> Result<(), Error> {
    let body = set
        .as_ref()
        .map(format_permission_set)
        .unwrap_or_else(|| "No restrictions.".to_string());
    reply(
        ctx,
        format!("Permissions for {}:\n{}", describe_subject(&subject), body),
    )
    .await
}

// ========== Settings ==========

/// Show or set the role allowed to edit permissions
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    category = "Permissions",
    check = "is_permission_controller"
)]
pub async fn permrole(
    ctx: Context<'_>,
    #[description = "Name of the new controller role"] role_name: Option<String>,
) -> Result<(), Error> {
    let (guild_id, guild_name) = guild_info(ctx).await?;
    let store = &ctx.data().permissions;

    match role_name.map(|r| r.trim().to_string()).filter(|r| !r.is_empty()) {
        Some(role_name) => {
            store.set_controller_role_name(guild_id.get(), &guild_name, &role_name);
            info!(
                "Controller role for guild {} set to '{}' by {}",
                guild_id,
                role_name,
                ctx.author().name
            );
            ctx.say(format!(
                "Members with the `{}` role can now edit permissions.",
                role_name
            ))
            .await?;
        }
        None => {
            let current = store.controller_role_name(guild_id.get(), &guild_name);
            reply(
                ctx,
                format!("Members with the `{}` role can edit permissions.", current),
            )
            .await?;
        }
    }
    Ok(())
}

/// Toggle whether blocked commands are reported to the user
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    category = "Permissions",
    check = "is_permission_controller"
)]
pub async fn verbose(
    ctx: Context<'_>,
    #[description = "Report blocked commands"] enabled: bool,
) -> Result<(), Error> {
    let (guild_id, guild_name) = guild_info(ctx).await?;
    ctx.data()
        .permissions
        .set_verbose(guild_id.get(), &guild_name, enabled);

    ctx.say(if enabled {
        "Blocked commands will be reported."
    } else {
        "Blocked commands will be ignored silently."
    })
    .await?;
    Ok(())
}

// ========== Server ==========

/// Allow or ban a module on the whole server
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    category = "Permissions",
    check = "is_permission_controller"
)]
pub async fn server_module(
    ctx: Context<'_>,
    #[description = "Module name"] module: String,
    #[description = "Allow the module"] allowed: bool,
) -> Result<(), Error> {
    set_rule(ctx, Subject::Server, RuleKind::Module, &module, allowed).await
}

/// Allow or ban a command on the whole server
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    category = "Permissions",
    check = "is_permission_controller"
)]
pub async fn server_command(
    ctx: Context<'_>,
    #[description = "Command name"] command: String,
    #[description = "Allow the command"] allowed: bool,
) -> Result<(), Error> {
    set_rule(ctx, Subject::Server, RuleKind::Command, &command, allowed).await
}

// ========== Channel ==========

/// Allow or ban a module in a channel
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    category = "Permissions",
    check = "is_permission_controller"
)]
pub async fn channel_module(
    ctx: Context<'_>,
    #[description = "Module name"] module: String,
    #[description = "Allow the module"] allowed: bool,
    #[description = "Channel (defaults to this one)"] channel: Option<serenity::GuildChannel>,
) -> Result<(), Error> {
    let channel = resolve_channel(ctx, channel).await?;
    set_rule(ctx, channel_subject(&channel), RuleKind::Module, &module, allowed).await
}

/// Allow or ban a command in a channel
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    category = "Permissions",
    check = "is_permission_controller"
)]
pub async fn channel_command(
    ctx: Context<'_>,
    #[description = "Command name"] command: String,
    #[description = "Allow the command"] allowed: bool,
    #[description = "Channel (defaults to this one)"] channel: Option<serenity::GuildChannel>,
) -> Result<(), Error> {
    let channel = resolve_channel(ctx, channel).await?;
    set_rule(ctx, channel_subject(&channel), RuleKind::Command, &command, allowed).await
}

// ========== Role ==========

/// Allow or ban a module for a role
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    category = "Permissions",
    check = "is_permission_controller"
)]
pub async fn role_module(
    ctx: Context<'_>,
    #[description = "Module name"] module: String,
    #[description = "Allow the module"] allowed: bool,
    #[description = "Role"] role: serenity::Role,
) -> Result<(), Error> {
    set_rule(ctx, role_subject(&role), RuleKind::Module, &module, allowed).await
}

/// Allow or ban a command for a role
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    category = "Permissions",
    check = "is_permission_controller"
)]
pub async fn role_command(
    ctx: Context<'_>,
    #[description = "Command name"] command: String,
    #[description = "Allow the command"] allowed: bool,
    #[description = "Role"] role: serenity::Role,
) -> Result<(), Error> {
    set_rule(ctx, role_subject(&role), RuleKind::Command, &command, allowed).await
}

// ========== User ==========

/// Allow or ban a module for a user
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    category = "Permissions",
    check = "is_permission_controller"
)]
pub async fn user_module(
    ctx: Context<'_>,
    #[description = "Module name"] module: String,
    #[description = "Allow the module"] allowed: bool,
    #[description = "User"] user: serenity::User,
) -> Result<(), Error> {
    set_rule(ctx, user_subject(&user), RuleKind::Module, &module, allowed).await
}

/// Allow or ban a command for a user
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    category = "Permissions",
    check = "is_permission_controller"
)]
pub async fn user_command(
    ctx: Context<'_>,
    #[description = "Command name"] command: String,
    #[description = "Allow the command"] allowed: bool,
    #[description = "User"] user: serenity::User,
) -> Result<(), Error> {
    set_rule(ctx, user_subject(&user), RuleKind::Command, &command, allowed).await
}

// ========== Listings ==========

/// Show the server-wide bans
#[poise::command(slash_command, prefix_command, guild_only, category = "Permissions")]
pub async fn server_perms(ctx: Context<'_>) -> Result<(), Error> {
    let (guild_id, _) = guild_info(ctx).await?;
    let set = ctx.data().permissions.get_default_permissions(guild_id.get());
    show_rules(ctx, Subject::Server, set).await
}

/// Show the bans of a channel
#[poise::command(slash_command, prefix_command, guild_only, category = "Permissions")]
pub async fn channel_perms(
    ctx: Context<'_>,
    #[description = "Channel (defaults to this one)"] channel: Option<serenity::GuildChannel>,
) -> Result<(), Error> {
    let (guild_id, _) = guild_info(ctx).await?;
    let channel = resolve_channel(ctx, channel).await?;
    let set = ctx
        .data()
        .permissions
        .get_channel_permissions(guild_id.get(), channel.id.get());
    show_rules(ctx, channel_subject(&channel), set).await
}

/// Show the bans of a role
#[poise::command(slash_command, prefix_command, guild_only, category = "Permissions")]
pub async fn role_perms(
    ctx: Context<'_>,
    #[description = "Role"] role: serenity::Role,
) -> Result<(), Error> {
    let (guild_id, _) = guild_info(ctx).await?;
    let set = ctx
        .data()
        .permissions
        .get_role_permissions(guild_id.get(), role.id.get());
    show_rules(ctx, role_subject(&role), set).await
}

/// Show the bans of a user
#[poise::command(slash_command, prefix_command, guild_only, category = "Permissions")]
pub async fn user_perms(
    ctx: Context<'_>,
    #[description = "User (defaults to you)"] user: Option<serenity::User>,
) -> Result<(), Error> {
    let (guild_id, _) = guild_info(ctx).await?;
    let user = user.unwrap_or_else(|| ctx.author().clone());
    let set = ctx
        .data()
        .permissions
        .get_user_permissions(guild_id.get(), user.id.get());
    show_rules(ctx, user_subject(&user), set).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_empty_set() {
        assert_eq!(format_permission_set(&PermissionSet::new("x")), "No restrictions.");
    }

    #[test]
    fn test_format_lists_only_bans() {
        let mut set = PermissionSet::new("x");
        set.set(RuleKind::Module, "Gambling", false);
        set.set(RuleKind::Module, "Music", true);
        set.set(RuleKind::Command, "flip", false);

        let text = format_permission_set(&set);
        assert!(text.contains("**Banned modules:**\n`[x]` Gambling\n"));
        assert!(text.contains("**Banned commands:**\n`[x]` flip\n"));
        assert!(!text.contains("Music"));
    }

    #[test]
    fn test_describe_subject() {
        assert_eq!(describe_subject(&Subject::Server), "this server");
        assert_eq!(
            describe_subject(&Subject::Channel {
                id: 5,
                name: "general".to_string()
            }),
            "<#5>"
        );
        assert_eq!(
            describe_subject(&Subject::Role {
                id: 1,
                name: "Mods".to_string()
            }),
            "role `Mods`"
        );
    }
}
