use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use poise::serenity_prelude as serenity;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::filter::LevelFilter;

/// Discord bot that gates commands by server, channel, role and user bans
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the per-guild permission files
    #[arg(long)]
    permissions_dir: Option<PathBuf>,

    /// Prefix for text commands
    #[arg(long)]
    prefix: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<LevelFilter>,

    /// Force re-sync of slash commands
    #[arg(long, short = 's')]
    sync_commands: bool,

    /// Register commands to this guild only instead of globally (faster for testing)
    #[arg(long)]
    guild_id: Option<u64>,
}

mod commands;
mod config;
mod error;
mod logging;
mod permissions;
mod persistence;

use config::BotConfig;
use permissions::{
    create_shared_permission_store, PermissionResolver, PermissionStore, SharedPermissionStore,
};
use persistence::{JsonDirectoryGateway, PersistenceGateway, PersistenceWriter, SharedGateway};

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;

/// Shared application state
pub struct Data {
    pub permissions: SharedPermissionStore,
    pub resolver: PermissionResolver,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    let config = BotConfig::from_env().with_overrides(
        args.permissions_dir.clone(),
        args.prefix.clone(),
        args.log_level,
    );
    logging::init(config.log_level);

    let token = std::env::var("DISCORD_TOKEN").expect("Missing DISCORD_TOKEN environment variable");

    // Load permissions and start the write-behind worker
    let gateway: SharedGateway = Arc::new(JsonDirectoryGateway::new(&config.permissions_dir));
    let profiles = gateway.load_all().await;
    let writer = PersistenceWriter::spawn(gateway.clone());
    let store = create_shared_permission_store(PermissionStore::from_profiles(profiles, writer));
    if store.is_empty() {
        info!(
            "No saved permissions in {}, every guild starts unrestricted",
            config.permissions_dir.display()
        );
    }
    let resolver = PermissionResolver::new(store.clone());

    let sync_commands = args.sync_commands;
    let target_guild_id = args.guild_id;
    if let Some(gid) = target_guild_id {
        info!("--guild-id: Registering commands to guild {} only", gid);
    }

    let setup_store = store.clone();
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(config.prefix.clone()),
                ..Default::default()
            },
            command_check: Some(|ctx| Box::pin(commands::permission_check(ctx))),
            pre_command: |ctx| {
                Box::pin(async move {
                    info!(
                        "Command '{}' invoked by {} (ID: {}) in {}",
                        ctx.command().qualified_name,
                        ctx.author().name,
                        ctx.author().id,
                        ctx.guild_id().map(|g| g.to_string()).unwrap_or_else(|| "DM".to_string())
                    );
                })
            },
            on_error: |error| {
                Box::pin(async move {
                    match error {
                        poise::FrameworkError::Command { error, ctx, .. } => {
                            error!("Error in command '{}': {}", ctx.command().qualified_name, error);
                            let _ = ctx.say(format!("An error occurred: {}", error)).await;
                        }
                        poise::FrameworkError::ArgumentParse { error, input, ctx, .. } => {
                            warn!("Argument parse error in '{}': {} (input: {:?})", ctx.command().qualified_name, error, input);
                            let _ = ctx.say(format!("Invalid arguments: {}", error)).await;
                        }
                        poise::FrameworkError::CommandCheckFailed { error, ctx, .. } => {
                            if let Some(error) = error {
                                error!("Permission check failed for '{}': {}", ctx.command().qualified_name, error);
                            }
                        }
                        poise::FrameworkError::GuildOnly { ctx, .. } => {
                            warn!("Command '{}' is guild-only, used in DM by {}", ctx.command().qualified_name, ctx.author().name);
                        }
                        other => {
                            if let Err(e) = poise::builtins::on_error(other).await {
                                error!("Error while handling error: {}", e);
                            }
                        }
                    }
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Bot logged in as: {}", ready.user.name);

                match target_guild_id {
                    Some(gid) => {
                        let guild_id = serenity::GuildId::new(gid);
                        poise::builtins::register_in_guild(ctx, &framework.options().commands, guild_id).await?;
                        info!("Registered {} commands for guild {}", framework.options().commands.len(), guild_id);
                    }
                    None => {
                        if sync_commands {
                            info!("--sync-commands: Re-registering slash commands globally");
                        }
                        poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                        info!(
                            "Registered {} commands globally (may take up to 1 hour to propagate)",
                            framework.options().commands.len()
                        );
                    }
                }

                Ok(Data {
                    permissions: setup_store,
                    resolver,
                })
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_MEMBERS;

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await?;

    // Stop the shards on Ctrl-C so pending permission writes can be flushed
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            shard_manager.shutdown_all().await;
        }
    });

    info!("Starting bot...");
    let outcome = client.start().await;

    info!("Saving permissions for {} guilds...", store.len());
    if let Err(e) = store.persist_all().await {
        error!("Failed to save permissions on shutdown: {}", e);
    }

    if let Err(e) = outcome {
        error!("Bot stopped with error: {}", e);
        return Err(e.into());
    }
    warn!("Bot ended.");

    Ok(())
}
