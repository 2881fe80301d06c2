use std::env;
use std::sync::Arc;

use tracing::{error, info, warn};
use twilight_gateway::{EventTypeFlags, Intents, Shard, ShardId, StreamExt as _};
use twilight_http::Client;
use twilight_model::channel::message::EmojiReactionType;
use twilight_model::gateway::event::Event;
use twilight_model::gateway::payload::incoming::MessageCreate;
use twilight_model::gateway::GatewayReaction;
use twilight_model::id::Id;

use rustls::crypto::ring::default_provider;

use ember_commands::handle_message;
use ember_core::Context;
use ember_core::chat::HttpChat;
use ember_core::config::Config;
use ember_core::events::{EventBus, MessageEvent, ReactionEvent, ReactionKind};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls ring provider"))?;

    // Load the .env file
    dotenvy::dotenv().ok();

    // Store Discord Bot Token
    let token = env::var("DISCORD_TOKEN")?;
    let owner_id = env::var("OWNER_ID")
        .ok()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .map(Id::new);
    if owner_id.is_none() {
        warn!("OWNER_ID is not set; repl sessions are disabled");
    }

    // Create a single shared HTTP Client
    let http = Arc::new(Client::new(token.clone()));

    // The bot must know its own identity to ignore its own reactions
    let current_user = http.current_user().await?.model().await?;

    let config = Arc::new(Config::new(token.clone(), owner_id, current_user.id));
    let events = EventBus::default();
    let ctx = Context::new(
        Arc::new(HttpChat::new(Arc::clone(&http))),
        events,
        config,
    );

    // Declare which intents the bot has
    let intents = Intents::GUILDS
        | Intents::GUILD_MESSAGES
        | Intents::DIRECT_MESSAGES
        | Intents::MESSAGE_CONTENT
        | Intents::GUILD_MESSAGE_REACTIONS
        | Intents::DIRECT_MESSAGE_REACTIONS;

    // A shard is one Gateway WebSocket connection to Discord
    let mut shard = Shard::new(ShardId::new(0, 1), token, intents);

    info!("Ember is connecting...");

    while let Some(item) = shard.next_event(EventTypeFlags::all()).await {
        let event = match item {
            Ok(event) => event,
            Err(source) => {
                error!(?source, "gateway event stream error");
                continue;
            }
        };

        match event {
            Event::Ready(_) => {
                info!("Ember has successfully awoken!");
            }

            Event::MessageCreate(msg) => {
                let message = message_event(&msg);
                // sessions listen on the bus; the router starts them
                ctx.events.publish_message(message.clone());
                handle_message(ctx.clone(), message).await?;
            }
            Event::ReactionAdd(reaction) => {
                ctx.events
                    .publish_reaction(reaction_event(ReactionKind::Added, &reaction.0));
            }
            Event::ReactionRemove(reaction) => {
                ctx.events
                    .publish_reaction(reaction_event(ReactionKind::Removed, &reaction.0));
            }
            _ => {} // Ignore unused events
        }
    }
    Ok(()) // Return Success, shutdown cleanly
}

fn message_event(msg: &MessageCreate) -> MessageEvent {
    MessageEvent {
        author_id: msg.author.id,
        channel_id: msg.channel_id,
        guild_id: msg.guild_id,
        message_id: msg.id,
        content: msg.content.clone(),
        timestamp_secs: msg.timestamp.as_secs(),
        author_is_bot: msg.author.bot,
    }
}

fn reaction_event(kind: ReactionKind, reaction: &GatewayReaction) -> ReactionEvent {
    let emoji = match &reaction.emoji {
        EmojiReactionType::Unicode { name } => name.clone(),
        EmojiReactionType::Custom { name, .. } => name.clone().unwrap_or_default(),
    };

    ReactionEvent {
        kind,
        emoji,
        user_id: reaction.user_id,
        channel_id: reaction.channel_id,
        message_id: reaction.message_id,
    }
}
