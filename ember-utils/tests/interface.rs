//! End-to-end paginator interface behavior against a fake chat backend.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use ember_core::Context;
use ember_core::chat::{ChatApi, SentMessage};
use ember_core::config::Config;
use ember_core::events::{EventBus, ReactionEvent, ReactionKind};
use ember_utils::pagination::{EmojiSet, Paginator, PaginatorInterface};
use twilight_model::id::{
    Id,
    marker::{ChannelMarker, MessageMarker},
};

const OWNER: u64 = 7;
const BOT: u64 = 99;
const CHANNEL: u64 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Send { content: String, message: u64 },
    Edit { message: u64, content: String },
    Delete { message: u64 },
    AddReaction { message: u64, emoji: String },
    RemoveReaction { message: u64, emoji: String },
}

struct FakeChat {
    calls: Mutex<Vec<Call>>,
    notify: Notify,
    next_message_id: AtomicU64,
}

impl FakeChat {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            notify: Notify::new(),
            next_message_id: AtomicU64::new(100),
        })
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
        self.notify.notify_waiters();
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    async fn wait_until(&self, predicate: impl Fn(&[Call]) -> bool) {
        let waiter = async {
            loop {
                let notified = self.notify.notified();
                if predicate(&self.calls()) {
                    return;
                }
                notified.await;
            }
        };

        tokio::time::timeout(Duration::from_secs(300), waiter)
            .await
            .expect("expected chat call did not happen");
    }
}

#[async_trait]
impl ChatApi for FakeChat {
    async fn send_message(
        &self,
        channel_id: Id<ChannelMarker>,
        content: &str,
    ) -> anyhow::Result<SentMessage> {
        let message_id = self.next_message_id.fetch_add(1, Ordering::SeqCst);
        self.record(Call::Send {
            content: content.to_owned(),
            message: message_id,
        });

        Ok(SentMessage {
            channel_id,
            message_id: Id::new(message_id),
        })
    }

    async fn edit_message(
        &self,
        _channel_id: Id<ChannelMarker>,
        message_id: Id<MessageMarker>,
        content: &str,
    ) -> anyhow::Result<()> {
        self.record(Call::Edit {
            message: message_id.get(),
            content: content.to_owned(),
        });
        Ok(())
    }

    async fn delete_message(
        &self,
        _channel_id: Id<ChannelMarker>,
        message_id: Id<MessageMarker>,
    ) -> anyhow::Result<()> {
        self.record(Call::Delete {
            message: message_id.get(),
        });
        Ok(())
    }

    async fn add_reaction(
        &self,
        _channel_id: Id<ChannelMarker>,
        message_id: Id<MessageMarker>,
        emoji: &str,
    ) -> anyhow::Result<()> {
        self.record(Call::AddReaction {
            message: message_id.get(),
            emoji: emoji.to_owned(),
        });
        Ok(())
    }

    async fn remove_own_reaction(
        &self,
        _channel_id: Id<ChannelMarker>,
        message_id: Id<MessageMarker>,
        emoji: &str,
    ) -> anyhow::Result<()> {
        self.record(Call::RemoveReaction {
            message: message_id.get(),
            emoji: emoji.to_owned(),
        });
        Ok(())
    }
}

fn test_context(chat: Arc<FakeChat>, events: EventBus) -> Context {
    let config = Config::new("token".to_owned(), Some(Id::new(OWNER)), Id::new(BOT));
    Context::new(chat, events, Arc::new(config))
}

fn reaction(emoji: &str, user: u64, message: u64) -> ReactionEvent {
    ReactionEvent {
        kind: ReactionKind::Added,
        emoji: emoji.to_owned(),
        user_id: Id::new(user),
        channel_id: Id::new(CHANNEL),
        message_id: Id::new(message),
    }
}

fn multi_page_paginator() -> Paginator {
    let mut paginator = Paginator::new().max_size(50);
    for index in 0..20 {
        paginator.add_line(&format!("item {index}")).unwrap();
    }
    paginator
}

fn add_reaction_count(calls: &[Call]) -> usize {
    calls
        .iter()
        .filter(|call| matches!(call, Call::AddReaction { .. }))
        .count()
}

#[tokio::test(start_paused = true)]
async fn send_attaches_close_and_navigation_reactions() {
    let chat = FakeChat::new();
    let events = EventBus::new(64);
    let ctx = test_context(chat.clone(), events);

    let mut interface = PaginatorInterface::new(multi_page_paginator())
        .unwrap()
        .owner(Id::new(OWNER));
    interface.send_to(&ctx, Id::new(CHANNEL)).await.unwrap();

    chat.wait_until(|calls| add_reaction_count(calls) >= 5).await;

    let calls = chat.calls();
    let Call::Send { content, .. } = &calls[0] else {
        panic!("first call should be the initial send, got {calls:?}");
    };
    assert!(content.contains("Page 1/"), "content: {content}");

    let emojis = EmojiSet::default();
    let attached: Vec<String> = calls
        .iter()
        .filter_map(|call| match call {
            Call::AddReaction { emoji, .. } => Some(emoji.clone()),
            _ => None,
        })
        .collect();
    // close first, then the four navigation symbols
    assert_eq!(attached[0], emojis.close);
    assert_eq!(attached.len(), 5);
}

#[tokio::test(start_paused = true)]
async fn owner_reactions_navigate_and_strangers_are_ignored() {
    let chat = FakeChat::new();
    let events = EventBus::new(64);
    let ctx = test_context(chat.clone(), events.clone());
    let emojis = EmojiSet::default();

    let mut interface = PaginatorInterface::new(multi_page_paginator())
        .unwrap()
        .owner(Id::new(OWNER));
    interface.send_to(&ctx, Id::new(CHANNEL)).await.unwrap();
    chat.wait_until(|calls| add_reaction_count(calls) >= 5).await;

    let message_id = interface.message().unwrap().message_id.get();

    events.publish_reaction(reaction(&emojis.forward, OWNER, message_id));
    chat.wait_until(|calls| {
        calls.iter().any(|call| {
            matches!(call, Call::Edit { content, .. } if content.contains("Page 2/"))
        })
    })
    .await;

    // neither a stranger nor the bot itself may navigate
    events.publish_reaction(reaction(&emojis.forward, 1234, message_id));
    events.publish_reaction(reaction(&emojis.forward, BOT, message_id));
    events.publish_reaction(reaction(&emojis.back, OWNER, message_id));

    chat.wait_until(|calls| {
        calls.iter().any(|call| {
            matches!(call, Call::Edit { content, .. } if content.contains("Page 1/"))
        })
    })
    .await;

    let edits = chat
        .calls()
        .iter()
        .filter(|call| matches!(call, Call::Edit { .. }))
        .count();
    // the ignored reactions produced no edits: forward then back only
    assert_eq!(edits, 2);
}

#[tokio::test(start_paused = true)]
async fn close_reaction_deletes_the_message() {
    let chat = FakeChat::new();
    let events = EventBus::new(64);
    let ctx = test_context(chat.clone(), events.clone());
    let emojis = EmojiSet::default();

    let mut interface = PaginatorInterface::new(multi_page_paginator())
        .unwrap()
        .owner(Id::new(OWNER));
    interface.send_to(&ctx, Id::new(CHANNEL)).await.unwrap();
    chat.wait_until(|calls| add_reaction_count(calls) >= 5).await;

    let message_id = interface.message().unwrap().message_id.get();
    events.publish_reaction(reaction(&emojis.close, OWNER, message_id));

    chat.wait_until(|calls| {
        calls
            .iter()
            .any(|call| matches!(call, Call::Delete { message } if *message == message_id))
    })
    .await;

    // the coordination task winds down after deleting
    tokio::time::timeout(Duration::from_secs(60), async {
        while !interface.closed() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("interface should close");
}

#[tokio::test(start_paused = true)]
async fn live_additions_refresh_and_attach_navigation_once() {
    let chat = FakeChat::new();
    let events = EventBus::new(64);
    let ctx = test_context(chat.clone(), events);

    let mut paginator = Paginator::new().max_size(50);
    paginator.add_line("only line").unwrap();

    let mut interface = PaginatorInterface::new(paginator)
        .unwrap()
        .owner(Id::new(OWNER));
    interface.send_to(&ctx, Id::new(CHANNEL)).await.unwrap();

    // single page: only the close reaction so far
    chat.wait_until(|calls| add_reaction_count(calls) == 1).await;

    for index in 0..20 {
        interface.add_line(&format!("grown {index}")).unwrap();
    }

    // the debounced refresh edits once and navigation appears exactly once
    chat.wait_until(|calls| {
        calls.iter().any(|call| matches!(call, Call::Edit { .. })) && add_reaction_count(calls) == 5
    })
    .await;

    let last_edit = chat
        .calls()
        .iter()
        .rev()
        .find_map(|call| match call {
            Call::Edit { content, .. } => Some(content.clone()),
            _ => None,
        })
        .expect("an edit should have happened");
    // growth keeps the display pinned to the (new) last page
    let page_count = interface.page_count();
    assert!(
        last_edit.contains(&format!("Page {page_count}/{page_count}")),
        "edit: {last_edit}"
    );
}

#[tokio::test(start_paused = true)]
async fn idle_timeout_strips_reactions_but_keeps_the_message() {
    let chat = FakeChat::new();
    let events = EventBus::new(64);
    let ctx = test_context(chat.clone(), events);

    let mut interface = PaginatorInterface::new(multi_page_paginator())
        .unwrap()
        .owner(Id::new(OWNER))
        .timeout(Duration::from_secs(5));
    interface.send_to(&ctx, Id::new(CHANNEL)).await.unwrap();

    chat.wait_until(|calls| {
        calls
            .iter()
            .filter(|call| matches!(call, Call::RemoveReaction { .. }))
            .count()
            == 5
    })
    .await;

    assert!(
        !chat
            .calls()
            .iter()
            .any(|call| matches!(call, Call::Delete { .. })),
        "timeout cleanup must not delete the message"
    );
}

#[tokio::test(start_paused = true)]
async fn delete_on_close_removes_the_message_on_timeout() {
    let chat = FakeChat::new();
    let events = EventBus::new(64);
    let ctx = test_context(chat.clone(), events);

    let mut interface = PaginatorInterface::new(multi_page_paginator())
        .unwrap()
        .owner(Id::new(OWNER))
        .timeout(Duration::from_secs(5))
        .delete_on_close(true);
    interface.send_to(&ctx, Id::new(CHANNEL)).await.unwrap();

    chat.wait_until(|calls| calls.iter().any(|call| matches!(call, Call::Delete { .. })))
        .await;
}
