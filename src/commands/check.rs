use poise::serenity_prelude as serenity;
use tracing::{debug, info};

use crate::permissions::{CommandDescriptor, Invoker};
use crate::{Context, Error};

/// Category of the commands that edit permissions. Never gated, so a
/// guild cannot lock its controllers out.
pub const PERMISSIONS_CATEGORY: &str = "Permissions";

/// Framework-wide command check: blocks commands banned for this invocation
pub async fn permission_check(ctx: Context<'_>) -> Result<bool, Error> {
    // Direct messages carry no guild permissions
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(true);
    };

    let command = ctx.command();
    let category = command.category.as_deref().unwrap_or_default();
    if category == PERMISSIONS_CATEGORY {
        return Ok(true);
    }

    let role_ids = member_role_ids(ctx, guild_id).await;
    let verdict = ctx.data().resolver.evaluate(
        guild_id.get(),
        CommandDescriptor {
            category,
            name: &command.qualified_name,
        },
        Invoker {
            id: ctx.author().id.get(),
            role_ids: &role_ids,
        },
        ctx.channel_id().get(),
    );

    if !verdict.is_banned() {
        return Ok(true);
    }

    info!(
        "Blocked '{}' for {} (ID: {}) in guild {}: {:?}",
        command.qualified_name,
        ctx.author().name,
        ctx.author().id,
        guild_id,
        verdict
    );

    if ctx.data().permissions.is_verbose(guild_id.get()) {
        ctx.send(
            poise::CreateReply::default()
                .content(format!(
                    "Cannot run `{}`: {}.",
                    command.qualified_name, verdict
                ))
                .ephemeral(true),
        )
        .await?;
    }

    Ok(false)
}

/// Roles of the invoking member, including the guild's @everyone role
async fn member_role_ids(ctx: Context<'_>, guild_id: serenity::GuildId) -> Vec<u64> {
    let mut role_ids: Vec<u64> = match ctx.author_member().await {
        Some(member) => member.roles.iter().map(|r| r.get()).collect(),
        None => {
            debug!("No member data for {} in guild {}", ctx.author().id, guild_id);
            Vec::new()
        }
    };
    role_ids.push(guild_id.everyone_role().get());
    role_ids
}

/// Command check for permission editing: guild owner or holder of the controller role
pub async fn is_permission_controller(ctx: Context<'_>) -> Result<bool, Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(false);
    };
    let Some(guild) = ctx.partial_guild().await else {
        return Ok(false);
    };

    if guild.owner_id == ctx.author().id {
        return Ok(true);
    }

    let controller = ctx
        .data()
        .permissions
        .controller_role_name(guild_id.get(), &guild.name);

    let holds_role = match ctx.author_member().await {
        Some(member) => member.roles.iter().any(|role_id| {
            guild
                .roles
                .get(role_id)
                .is_some_and(|role| role.name == controller)
        }),
        None => false,
    };

    if !holds_role {
        info!(
            "User {} tried to edit permissions in guild {} without the '{}' role",
            ctx.author().name,
            guild_id,
            controller
        );
        ctx.send(
            poise::CreateReply::default()
                .content(format!(
                    "You need the `{}` role to edit permissions.",
                    controller
                ))
                .ephemeral(true),
        )
        .await?;
    }

    Ok(holds_role)
}
