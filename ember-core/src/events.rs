//! Broadcast fan-out of the gateway events the REPL core consumes.
//!
//! The gateway loop publishes every message and reaction here; sessions and
//! paginator interfaces subscribe and filter for the events they care about.

use tokio::sync::broadcast;
use twilight_model::id::{
    Id,
    marker::{ChannelMarker, GuildMarker, MessageMarker, UserMarker},
};

const DEFAULT_BUS_CAPACITY: usize = 64;

/// A message observed on the gateway.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub author_id: Id<UserMarker>,
    pub channel_id: Id<ChannelMarker>,
    pub guild_id: Option<Id<GuildMarker>>,
    pub message_id: Id<MessageMarker>,
    pub content: String,
    pub timestamp_secs: i64,
    pub author_is_bot: bool,
}

/// Whether a reaction was added to or removed from a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionKind {
    Added,
    Removed,
}

/// A reaction change observed on the gateway.
#[derive(Debug, Clone)]
pub struct ReactionEvent {
    pub kind: ReactionKind,
    pub emoji: String,
    pub user_id: Id<UserMarker>,
    pub channel_id: Id<ChannelMarker>,
    pub message_id: Id<MessageMarker>,
}

/// Clonable handle to the process-wide event channels.
#[derive(Clone)]
pub struct EventBus {
    messages: broadcast::Sender<MessageEvent>,
    reactions: broadcast::Sender<ReactionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (messages, _) = broadcast::channel(capacity);
        let (reactions, _) = broadcast::channel(capacity);

        Self {
            messages,
            reactions,
        }
    }

    /// Publish a message event. Events with no live subscriber are dropped.
    pub fn publish_message(&self, event: MessageEvent) {
        let _ = self.messages.send(event);
    }

    /// Publish a reaction event. Events with no live subscriber are dropped.
    pub fn publish_reaction(&self, event: ReactionEvent) {
        let _ = self.reactions.send(event);
    }

    pub fn subscribe_messages(&self) -> broadcast::Receiver<MessageEvent> {
        self.messages.subscribe()
    }

    pub fn subscribe_reactions(&self) -> broadcast::Receiver<ReactionEvent> {
        self.reactions.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}
