use poise::serenity_prelude as serenity;
use std::collections::BTreeMap;
use tracing::info;

use crate::{Context, Error};

/// Check if the bot is running
#[poise::command(prefix_command, slash_command, category = "Help")]
pub async fn ping(ctx: Context<'_>) -> Result<(), Error> {
    info!("Ping command called by {}", ctx.author().name);
    ctx.send(poise::CreateReply::default()
        .content("Pong! Bot is working!")
        .ephemeral(true))
        .await?;
    Ok(())
}

/// List commands grouped by module
#[poise::command(prefix_command, slash_command, category = "Help")]
pub async fn help(ctx: Context<'_>) -> Result<(), Error> {
    let framework = ctx.framework();
    let mut modules: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for command in &framework.options().commands {
        if command.hide_in_help {
            continue;
        }
        modules
            .entry(command.category.as_deref().unwrap_or("Other"))
            .or_default()
            .push(&command.name);
    }

    let mut embed = serenity::CreateEmbed::new()
        .title("Bot Commands")
        .description(
            "Commands by module. Module and command names can be banned per server, \
             channel, role or user.",
        )
        .color(0x3498db);
    for (module, commands) in modules {
        let list = commands
            .iter()
            .map(|c| format!("`{}`", c))
            .collect::<Vec<_>>()
            .join(", ");
        embed = embed.field(module, list, false);
    }

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true)).await?;
    Ok(())
}
