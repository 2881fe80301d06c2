//! Reaction-driven message interface for live paginators.
//!
//! One coordination task per sent interface keeps the message in sync with
//! navigation reactions and content growth, with edits rate-limited to one
//! per second and every delivery failure swallowed after logging.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{Notify, broadcast};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::warn;

use ember_core::Context;
use ember_core::chat::{ChatApi, SentMessage};
use ember_core::events::ReactionEvent;
use twilight_model::id::{
    Id,
    marker::{ChannelMarker, UserMarker},
};

use super::{DEFAULT_INTERFACE_TIMEOUT_SECS, EmojiSet, MAX_PAGE_SIZE, Paginate, PaginationError};

const REFRESH_DEBOUNCE: Duration = Duration::from_secs(1);

/// A long-lived message users navigate with reactions.
///
/// Supports live output: lines added after `send_to` keep the display pinned
/// to the last page and trigger a coalesced message edit.
pub struct PaginatorInterface {
    shared: Arc<Shared>,
    owner: Option<Id<UserMarker>>,
    emojis: EmojiSet,
    timeout: Duration,
    delete_on_close: bool,
    message: Option<SentMessage>,
    worker: Option<Worker>,
}

struct Shared {
    state: Mutex<PageState>,
    refresh: Notify,
    nav_attached: AtomicBool,
}

struct PageState {
    pager: Box<dyn Paginate>,
    display_page: usize,
}

struct Worker {
    handle: JoinHandle<()>,
    cancel: Arc<Notify>,
}

impl PaginatorInterface {
    /// Wrap a paginator for interactive display.
    ///
    /// Fails when the paginator's page size plus the page-number footer could
    /// exceed the platform message ceiling.
    pub fn new(pager: impl Paginate + 'static) -> Result<Self, PaginationError> {
        let page_count = pager.live_pages().len().max(1);
        let footer = format!("\nPage {page_count}/{page_count}");
        let page_size = pager.max_size() + footer.chars().count();

        if page_size > MAX_PAGE_SIZE {
            return Err(PaginationError::PageSizeExceeded {
                page_size,
                limit: MAX_PAGE_SIZE,
            });
        }

        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(PageState {
                    pager: Box::new(pager),
                    display_page: 0,
                }),
                refresh: Notify::new(),
                nav_attached: AtomicBool::new(false),
            }),
            owner: None,
            emojis: EmojiSet::default(),
            timeout: Duration::from_secs(DEFAULT_INTERFACE_TIMEOUT_SECS),
            delete_on_close: false,
            message: None,
            worker: None,
        })
    }

    /// Restrict navigation to a single user.
    pub fn owner(mut self, owner: Id<UserMarker>) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Maximum idle time before the interface shuts itself down.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Delete the message on close instead of stripping reactions.
    pub fn delete_on_close(mut self, delete: bool) -> Self {
        self.delete_on_close = delete;
        self
    }

    /// Replace the navigation symbols.
    pub fn emojis(mut self, emojis: EmojiSet) -> Self {
        self.emojis = emojis;
        self
    }

    /// Add a line, keeping the display pinned to the last page when it
    /// already was, and schedule a coalesced refresh.
    pub fn add_line(&self, line: &str) -> Result<(), PaginationError> {
        self.append(line, false)
    }

    /// Add a line followed by one blank line.
    pub fn add_line_empty(&self, line: &str) -> Result<(), PaginationError> {
        self.append(line, true)
    }

    fn append(&self, line: &str, trailing_blank: bool) -> Result<(), PaginationError> {
        {
            let mut state = lock_state(&self.shared);
            let was_pinned = state.display() + 1 == state.page_count();

            if trailing_blank {
                state.pager.add_line_empty(line)?;
            } else {
                state.pager.add_line(line)?;
            }

            if was_pinned {
                state.display_page = state.page_count().saturating_sub(1);
            }
        }

        self.shared.refresh.notify_one();
        Ok(())
    }

    /// Pages including the open buffer, without closing it.
    pub fn pages(&self) -> Vec<String> {
        lock_state(&self.shared).pager.live_pages()
    }

    pub fn page_count(&self) -> usize {
        lock_state(&self.shared).page_count()
    }

    /// Currently displayed page index, clamped into bounds.
    pub fn display_page(&self) -> usize {
        lock_state(&self.shared).display()
    }

    /// Move the display. Out-of-range values are pushed back in bounds.
    pub fn set_display_page(&self, page: isize) {
        let mut state = lock_state(&self.shared);
        let last = state.page_count().saturating_sub(1);
        state.display_page = page.clamp(0, last as isize) as usize;
    }

    /// Rendered content of the current page, footer included.
    pub fn content(&self) -> String {
        lock_state(&self.shared).rendered()
    }

    /// The live message, once sent.
    pub fn message(&self) -> Option<SentMessage> {
        self.message
    }

    /// Whether the coordination task has finished (or never started).
    pub fn closed(&self) -> bool {
        self.worker
            .as_ref()
            .is_none_or(|worker| worker.handle.is_finished())
    }

    /// Ask the coordination task to shut down and clean up.
    pub fn close(&self) {
        if let Some(worker) = &self.worker {
            worker.cancel.notify_one();
        }
    }

    /// Send the interface to a channel and start its coordination task.
    ///
    /// Re-sending replaces the previous coordination task; the old task runs
    /// its cleanup against the old message.
    pub async fn send_to(
        &mut self,
        ctx: &Context,
        channel_id: Id<ChannelMarker>,
    ) -> anyhow::Result<()> {
        let content = lock_state(&self.shared).rendered();
        let sent = ctx.chat.send_message(channel_id, &content).await?;

        ctx.chat
            .add_reaction(sent.channel_id, sent.message_id, &self.emojis.close)
            .await?;

        self.message = Some(sent);

        if let Some(previous) = self.worker.take() {
            previous.cancel.notify_one();
        }

        // subscribe before spawning so no reaction can slip past the task
        let reactions = ctx.events.subscribe_reactions();
        let cancel = Arc::new(Notify::new());

        let worker = InterfaceWorker {
            shared: Arc::clone(&self.shared),
            chat: Arc::clone(&ctx.chat),
            cancel: Arc::clone(&cancel),
            emojis: self.emojis.clone(),
            owner: self.owner,
            bot_user_id: ctx.config.bot_user_id,
            timeout: self.timeout,
            delete_on_close: self.delete_on_close,
            message: sent,
            last_content: content,
        };
        let handle = tokio::spawn(worker.run(reactions));
        self.worker = Some(Worker { handle, cancel });

        if self.page_count() > 1 {
            attach_navigation(&*ctx.chat, &self.shared, &self.emojis, sent).await;
        }

        Ok(())
    }
}

impl PageState {
    fn page_count(&self) -> usize {
        self.pager.live_pages().len()
    }

    fn display(&self) -> usize {
        self.display_page
            .min(self.page_count().saturating_sub(1))
    }

    fn rendered(&self) -> String {
        let pages = self.pager.live_pages();
        let count = pages.len().max(1);
        let display = self.display_page.min(count - 1);
        let body = pages.get(display).map(String::as_str).unwrap_or("");

        format!("{body}\nPage {}/{count}", display + 1)
    }
}

fn lock_state(shared: &Shared) -> MutexGuard<'_, PageState> {
    shared.state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Attach the four paging reactions exactly once per interface.
async fn attach_navigation(
    chat: &dyn ChatApi,
    shared: &Shared,
    emojis: &EmojiSet,
    message: SentMessage,
) {
    if shared.nav_attached.swap(true, Ordering::AcqRel) {
        return;
    }

    for emoji in emojis.navigation() {
        if let Err(source) = chat
            .add_reaction(message.channel_id, message.message_id, emoji)
            .await
        {
            warn!(?source, emoji, "paginator reaction attach failed");
            break;
        }
    }
}

enum WaitOutcome {
    Reaction(ReactionEvent),
    Refresh,
    Cancelled,
}

struct InterfaceWorker {
    shared: Arc<Shared>,
    chat: Arc<dyn ChatApi>,
    cancel: Arc<Notify>,
    emojis: EmojiSet,
    owner: Option<Id<UserMarker>>,
    bot_user_id: Id<UserMarker>,
    timeout: Duration,
    delete_on_close: bool,
    message: SentMessage,
    last_content: String,
}

impl InterfaceWorker {
    async fn run(mut self, mut reactions: broadcast::Receiver<ReactionEvent>) {
        loop {
            let outcome = match timeout(self.timeout, self.wait_for_input(&mut reactions)).await {
                Ok(outcome) => outcome,
                // idle expiry behaves exactly like cancellation
                Err(_) => break,
            };

            match outcome {
                WaitOutcome::Cancelled => break,
                WaitOutcome::Reaction(event) if event.emoji == self.emojis.close => {
                    if let Err(source) = self
                        .chat
                        .delete_message(self.message.channel_id, self.message.message_id)
                        .await
                    {
                        warn!(?source, "paginator close delete failed");
                    }
                    return;
                }
                WaitOutcome::Reaction(event) => self.navigate(&event),
                WaitOutcome::Refresh => {}
            }

            let page_count = lock_state(&self.shared).page_count();
            if page_count > 1 {
                attach_navigation(&*self.chat, &self.shared, &self.emojis, self.message).await;
            }

            self.push_update().await;
        }

        self.cleanup().await;
    }

    async fn wait_for_input(
        &self,
        reactions: &mut broadcast::Receiver<ReactionEvent>,
    ) -> WaitOutcome {
        tokio::select! {
            _ = self.cancel.notified() => WaitOutcome::Cancelled,
            event = next_matching(reactions, self) => match event {
                Some(event) => WaitOutcome::Reaction(event),
                None => WaitOutcome::Cancelled,
            },
            _ = debounced_refresh(&self.shared.refresh) => WaitOutcome::Refresh,
        }
    }

    /// Whether a reaction event belongs to this interface.
    fn accepts(&self, event: &ReactionEvent) -> bool {
        let owner_ok = self.owner.is_none_or(|owner| event.user_id == owner);

        owner_ok
            && event.user_id != self.bot_user_id
            && event.message_id == self.message.message_id
            && self.emojis.contains(&event.emoji)
    }

    fn navigate(&self, event: &ReactionEvent) {
        let mut state = lock_state(&self.shared);
        let last = state.page_count().saturating_sub(1);

        if event.emoji == self.emojis.start {
            state.display_page = 0;
        } else if event.emoji == self.emojis.end {
            state.display_page = last;
        } else if event.emoji == self.emojis.back {
            state.display_page = state.display().saturating_sub(1);
        } else if event.emoji == self.emojis.forward {
            state.display_page = (state.display() + 1).min(last);
        }
    }

    async fn push_update(&mut self) {
        let content = lock_state(&self.shared).rendered();
        if content == self.last_content {
            return;
        }

        if let Err(source) = self
            .chat
            .edit_message(self.message.channel_id, self.message.message_id, &content)
            .await
        {
            warn!(?source, "paginator message edit failed");
        }

        self.last_content = content;
    }

    async fn cleanup(&self) {
        if self.delete_on_close {
            if let Err(source) = self
                .chat
                .delete_message(self.message.channel_id, self.message.message_id)
                .await
            {
                warn!(?source, "paginator cleanup delete failed");
            }
            return;
        }

        for emoji in self.emojis.all() {
            if let Err(source) = self
                .chat
                .remove_own_reaction(self.message.channel_id, self.message.message_id, emoji)
                .await
            {
                warn!(?source, emoji, "paginator reaction removal failed");
            }
        }
    }
}

/// Wait for the next reaction that belongs to this interface.
async fn next_matching(
    reactions: &mut broadcast::Receiver<ReactionEvent>,
    worker: &InterfaceWorker,
) -> Option<ReactionEvent> {
    loop {
        match reactions.recv().await {
            Ok(event) if worker.accepts(&event) => return Some(event),
            Ok(_) => continue,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "paginator reaction stream lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

/// Resolve one coalesced refresh: wait for a content-change signal, then
/// hold off for the debounce window so bursts collapse into a single edit.
async fn debounced_refresh(refresh: &Notify) {
    refresh.notified().await;
    sleep(REFRESH_DEBOUNCE).await;
}
