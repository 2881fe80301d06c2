//! REPL session flows against a fake chat backend.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use ember_commands::repl;
use ember_core::Context;
use ember_core::chat::{ChatApi, SentMessage};
use ember_core::config::Config;
use ember_core::events::{EventBus, MessageEvent};
use twilight_model::id::{
    Id,
    marker::{ChannelMarker, MessageMarker},
};

const OWNER: u64 = 7;
const BOT: u64 = 99;

struct FakeChat {
    sent: Mutex<Vec<String>>,
    notify: Notify,
    next_message_id: AtomicU64,
}

impl FakeChat {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            notify: Notify::new(),
            next_message_id: AtomicU64::new(500),
        })
    }

    fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    async fn wait_for_sent(&self, needle: &str) {
        self.wait_for_sent_count(needle, 1).await;
    }

    async fn wait_for_sent_count(&self, needle: &str, count: usize) {
        let waiter = async {
            loop {
                let notified = self.notify.notified();
                let seen = self
                    .sent()
                    .iter()
                    .filter(|content| content.contains(needle))
                    .count();
                if seen >= count {
                    return;
                }
                notified.await;
            }
        };

        tokio::time::timeout(Duration::from_secs(3000), waiter)
            .await
            .unwrap_or_else(|_| panic!("no message containing {needle:?} was sent"));
    }
}

#[async_trait]
impl ChatApi for FakeChat {
    async fn send_message(
        &self,
        channel_id: Id<ChannelMarker>,
        content: &str,
    ) -> anyhow::Result<SentMessage> {
        self.sent.lock().unwrap().push(content.to_owned());
        self.notify.notify_waiters();

        Ok(SentMessage {
            channel_id,
            message_id: Id::new(self.next_message_id.fetch_add(1, Ordering::SeqCst)),
        })
    }

    async fn edit_message(
        &self,
        _channel_id: Id<ChannelMarker>,
        _message_id: Id<MessageMarker>,
        _content: &str,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn delete_message(
        &self,
        _channel_id: Id<ChannelMarker>,
        _message_id: Id<MessageMarker>,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn add_reaction(
        &self,
        _channel_id: Id<ChannelMarker>,
        _message_id: Id<MessageMarker>,
        _emoji: &str,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn remove_own_reaction(
        &self,
        _channel_id: Id<ChannelMarker>,
        _message_id: Id<MessageMarker>,
        _emoji: &str,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

fn test_context(chat: Arc<FakeChat>, events: EventBus, token: &str) -> Context {
    let config = Config::new(token.to_owned(), Some(Id::new(OWNER)), Id::new(BOT));
    Context::new(chat, events, Arc::new(config))
}

fn message(content: &str, author: u64, channel: u64) -> MessageEvent {
    MessageEvent {
        author_id: Id::new(author),
        channel_id: Id::new(channel),
        guild_id: None,
        message_id: Id::new(1),
        content: content.to_owned(),
        timestamp_secs: 0,
        author_is_bot: false,
    }
}

#[tokio::test(start_paused = true)]
async fn session_executes_snippets_with_a_persistent_scope() {
    let chat = FakeChat::new();
    let events = EventBus::new(64);
    let ctx = test_context(chat.clone(), events.clone(), "token");
    let channel = 41;

    let session = tokio::spawn(repl::run(ctx.clone(), message("!repl", OWNER, channel)));
    chat.wait_for_sent("Starting repl").await;

    // the first snippet binds a variable and produces no visible output
    events.publish_message(message("```py\nx = 5\n```", OWNER, channel));
    // the second proves the scope carried it over
    events.publish_message(message("```py\nx + 1\n```", OWNER, channel));
    chat.wait_for_sent("```py\n6\n```").await;

    events.publish_message(message("`quit`", OWNER, channel));
    chat.wait_for_sent("Exiting.").await;

    session.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn second_session_in_the_same_channel_is_rejected() {
    let chat = FakeChat::new();
    let events = EventBus::new(64);
    let ctx = test_context(chat.clone(), events.clone(), "token");
    let channel = 42;

    let _session = tokio::spawn(repl::run(ctx.clone(), message("!repl", OWNER, channel)));
    chat.wait_for_sent("Starting repl").await;

    tokio::spawn(repl::run(ctx.clone(), message("!repl", OWNER, channel)));
    chat.wait_for_sent("There is already an active repl session!")
        .await;
}

#[tokio::test(start_paused = true)]
async fn channel_key_is_released_after_quit() {
    let chat = FakeChat::new();
    let events = EventBus::new(64);
    let ctx = test_context(chat.clone(), events.clone(), "token");
    let channel = 43;

    let session = tokio::spawn(repl::run(ctx.clone(), message("!repl", OWNER, channel)));
    chat.wait_for_sent("Starting repl").await;
    events.publish_message(message("`quit`", OWNER, channel));
    chat.wait_for_sent("Exiting.").await;
    session.await.unwrap().unwrap();

    // the channel key is free again, so a second session can start
    let second = tokio::spawn(repl::run(ctx.clone(), message("!repl", OWNER, channel)));
    chat.wait_for_sent_count("Starting repl", 2).await;

    events.publish_message(message("`quit`", OWNER, channel));
    chat.wait_for_sent_count("Exiting.", 2).await;
    second.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn idle_session_times_out() {
    let chat = FakeChat::new();
    let events = EventBus::new(64);
    let ctx = test_context(chat.clone(), events.clone(), "token");
    let channel = 44;

    let session = tokio::spawn(repl::run(ctx.clone(), message("!repl", OWNER, channel)));
    chat.wait_for_sent("Starting repl").await;

    // nothing arrives; virtual time runs out the 600s idle window
    chat.wait_for_sent("Timed out").await;
    session.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn errors_are_reported_and_the_session_continues() {
    let chat = FakeChat::new();
    let events = EventBus::new(64);
    let ctx = test_context(chat.clone(), events.clone(), "token");
    let channel = 45;

    let session = tokio::spawn(repl::run(ctx.clone(), message("!repl", OWNER, channel)));
    chat.wait_for_sent("Starting repl").await;

    events.publish_message(message("```py\n1 / 0\n```", OWNER, channel));
    chat.wait_for_sent("ZeroDivisionError").await;

    events.publish_message(message("```py\n2 + 2\n```", OWNER, channel));
    chat.wait_for_sent("```py\n4\n```").await;

    events.publish_message(message("`quit`", OWNER, channel));
    session.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn print_output_is_reported_as_stdout() {
    let chat = FakeChat::new();
    let events = EventBus::new(64);
    let ctx = test_context(chat.clone(), events.clone(), "token");
    let channel = 46;

    let session = tokio::spawn(repl::run(ctx.clone(), message("!repl", OWNER, channel)));
    chat.wait_for_sent("Starting repl").await;

    events.publish_message(message("```py\nprint('hi there')\n```", OWNER, channel));
    chat.wait_for_sent("`stdout`:").await;
    assert!(chat.sent().iter().any(|content| content.contains("hi there")));

    events.publish_message(message("`quit`", OWNER, channel));
    session.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn oversized_results_become_a_paginated_interface() {
    let chat = FakeChat::new();
    let events = EventBus::new(64);
    let ctx = test_context(chat.clone(), events.clone(), "token");
    let channel = 47;

    let session = tokio::spawn(repl::run(ctx.clone(), message("!repl", OWNER, channel)));
    chat.wait_for_sent("Starting repl").await;

    events.publish_message(message("```py\n'word ' * 500\n```", OWNER, channel));
    chat.wait_for_sent("Page 1/").await;

    events.publish_message(message("`quit`", OWNER, channel));
    session.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn non_owner_triggers_are_ignored() {
    let chat = FakeChat::new();
    let events = EventBus::new(64);
    let ctx = test_context(chat.clone(), events.clone(), "token");

    repl::run(ctx, message("!repl", 1234, 48)).await.unwrap();

    assert!(chat.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn results_have_the_token_scrubbed() {
    let chat = FakeChat::new();
    let events = EventBus::new(64);
    let ctx = test_context(chat.clone(), events.clone(), "hunter2");
    let channel = 49;

    let session = tokio::spawn(repl::run(ctx.clone(), message("!repl", OWNER, channel)));
    chat.wait_for_sent("Starting repl").await;

    events.publish_message(message("```py\n'my token is hunter2'\n```", OWNER, channel));
    chat.wait_for_sent("[token omitted]").await;
    assert!(
        !chat
            .sent()
            .iter()
            .any(|content| content.contains("hunter2") && content.contains("```py")),
        "token leaked: {:?}",
        chat.sent()
    );

    events.publish_message(message("`quit`", OWNER, channel));
    session.await.unwrap().unwrap();
}
