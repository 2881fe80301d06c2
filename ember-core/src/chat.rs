//! Outbound chat actions behind a trait so interactive components can be
//! exercised against a fake backend in tests.

use std::sync::Arc;

use async_trait::async_trait;
use twilight_http::Client;
use twilight_http::request::channel::reaction::RequestReactionType;
use twilight_model::id::{
    Id,
    marker::{ChannelMarker, MessageMarker},
};

/// Identifies a message the bot has sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentMessage {
    pub channel_id: Id<ChannelMarker>,
    pub message_id: Id<MessageMarker>,
}

/// Platform actions the pagination and REPL layers invoke.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn send_message(
        &self,
        channel_id: Id<ChannelMarker>,
        content: &str,
    ) -> anyhow::Result<SentMessage>;

    async fn edit_message(
        &self,
        channel_id: Id<ChannelMarker>,
        message_id: Id<MessageMarker>,
        content: &str,
    ) -> anyhow::Result<()>;

    async fn delete_message(
        &self,
        channel_id: Id<ChannelMarker>,
        message_id: Id<MessageMarker>,
    ) -> anyhow::Result<()>;

    async fn add_reaction(
        &self,
        channel_id: Id<ChannelMarker>,
        message_id: Id<MessageMarker>,
        emoji: &str,
    ) -> anyhow::Result<()>;

    async fn remove_own_reaction(
        &self,
        channel_id: Id<ChannelMarker>,
        message_id: Id<MessageMarker>,
        emoji: &str,
    ) -> anyhow::Result<()>;
}

/// Twilight-backed [`ChatApi`] implementation.
pub struct HttpChat {
    http: Arc<Client>,
}

impl HttpChat {
    pub fn new(http: Arc<Client>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ChatApi for HttpChat {
    async fn send_message(
        &self,
        channel_id: Id<ChannelMarker>,
        content: &str,
    ) -> anyhow::Result<SentMessage> {
        let message = self
            .http
            .create_message(channel_id)
            .content(content)
            .await?
            .model()
            .await?;

        Ok(SentMessage {
            channel_id: message.channel_id,
            message_id: message.id,
        })
    }

    async fn edit_message(
        &self,
        channel_id: Id<ChannelMarker>,
        message_id: Id<MessageMarker>,
        content: &str,
    ) -> anyhow::Result<()> {
        self.http
            .update_message(channel_id, message_id)
            .content(Some(content))
            .await?;

        Ok(())
    }

    async fn delete_message(
        &self,
        channel_id: Id<ChannelMarker>,
        message_id: Id<MessageMarker>,
    ) -> anyhow::Result<()> {
        self.http.delete_message(channel_id, message_id).await?;

        Ok(())
    }

    async fn add_reaction(
        &self,
        channel_id: Id<ChannelMarker>,
        message_id: Id<MessageMarker>,
        emoji: &str,
    ) -> anyhow::Result<()> {
        self.http
            .create_reaction(
                channel_id,
                message_id,
                &RequestReactionType::Unicode { name: emoji },
            )
            .await?;

        Ok(())
    }

    async fn remove_own_reaction(
        &self,
        channel_id: Id<ChannelMarker>,
        message_id: Id<MessageMarker>,
        emoji: &str,
    ) -> anyhow::Result<()> {
        self.http
            .delete_current_user_reaction(
                channel_id,
                message_id,
                &RequestReactionType::Unicode { name: emoji },
            )
            .await?;

        Ok(())
    }
}
