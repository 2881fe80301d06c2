//! Interactive REPL sessions.
//!
//! One session per channel: the owner submits fenced code blocks, each is
//! executed against the session's scope, and results stream back, inline
//! when small and through a paginator interface when oversized. Evaluation
//! errors are reported and the session continues; only quit keywords or the
//! idle timeout end it.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{Instant, timeout_at};
use tracing::warn;

use ember_core::Context;
use ember_core::events::MessageEvent;
use ember_engine::{AsyncCodeExecutor, ExecutionError, Scope, SourceRegistry, Value};
use ember_utils::pagination::{PaginatorInterface, WrappedPaginator};
use ember_utils::parse::{codeblock_converter, is_codeblock};
use twilight_model::id::{Id, marker::ChannelMarker};

use crate::output::{PAGINATED_MAX_SIZE, ResultDisplay, plan_result_display, redact};

/// Command word that starts a session (`!repl`).
pub const REPL_COMMAND: &str = "repl";

/// Idle time allowed between snippets.
const SNIPPET_TIMEOUT: Duration = Duration::from_secs(600);

const QUIT_KEYWORDS: [&str; 3] = ["quit", "exit", "exit()"];

/// Channels with a running session. Claims hand out guards so the key is
/// released on every exit path.
struct Sessions {
    active: Mutex<HashSet<Id<ChannelMarker>>>,
}

struct SessionGuard {
    channel_id: Id<ChannelMarker>,
}

fn sessions() -> &'static Sessions {
    static SESSIONS: OnceLock<Sessions> = OnceLock::new();
    SESSIONS.get_or_init(|| Sessions {
        active: Mutex::new(HashSet::new()),
    })
}

impl Sessions {
    fn lock(&self) -> MutexGuard<'_, HashSet<Id<ChannelMarker>>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn claim(&self, channel_id: Id<ChannelMarker>) -> Option<SessionGuard> {
        self.lock()
            .insert(channel_id)
            .then_some(SessionGuard { channel_id })
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        sessions().lock().remove(&self.channel_id);
    }
}

/// Start a REPL session for the triggering message, if allowed.
pub async fn run(ctx: Context, msg: MessageEvent) -> anyhow::Result<()> {
    let Some(owner_id) = ctx.config.owner_id else {
        return Ok(());
    };
    if msg.author_id != owner_id {
        return Ok(());
    }

    let Some(_guard) = sessions().claim(msg.channel_id) else {
        ctx.chat
            .send_message(msg.channel_id, "There is already an active repl session!")
            .await?;
        return Ok(());
    };

    // the guard releases the channel even when the session errors
    run_session(&ctx, &msg).await
}

async fn run_session(ctx: &Context, msg: &MessageEvent) -> anyhow::Result<()> {
    // subscribe before announcing so the first snippet cannot be missed
    let mut messages = ctx.events.subscribe_messages();

    ctx.chat.send_message(msg.channel_id, "Starting repl").await?;

    let scope = Scope::new();
    let registry = SourceRegistry::new();

    loop {
        let Some(event) = wait_for_snippet(&mut messages, msg).await else {
            ctx.chat.send_message(msg.channel_id, "Timed out").await?;
            return Ok(());
        };

        let code = codeblock_converter(&event.content);
        if QUIT_KEYWORDS.contains(&code.content.as_str()) {
            ctx.chat.send_message(msg.channel_id, "Exiting.").await?;
            return Ok(());
        }

        execute_snippet(ctx, msg, &event, &scope, &registry, &code.content).await?;
    }
}

/// Wait for the next code-block message from the session owner in this
/// channel, bounded by the idle timeout.
async fn wait_for_snippet(
    messages: &mut broadcast::Receiver<MessageEvent>,
    session: &MessageEvent,
) -> Option<MessageEvent> {
    let deadline = Instant::now() + SNIPPET_TIMEOUT;

    loop {
        match timeout_at(deadline, messages.recv()).await {
            Ok(Ok(event)) => {
                if event.channel_id == session.channel_id
                    && event.author_id == session.author_id
                    && !event.author_is_bot
                    && is_codeblock(&event.content)
                {
                    return Some(event);
                }
            }
            Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                warn!(skipped, "repl message stream lagged");
            }
            Ok(Err(broadcast::error::RecvError::Closed)) | Err(_) => return None,
        }
    }
}

async fn execute_snippet(
    ctx: &Context,
    session: &MessageEvent,
    event: &MessageEvent,
    scope: &Scope,
    registry: &SourceRegistry,
    source: &str,
) -> anyhow::Result<()> {
    let executor = match AsyncCodeExecutor::new(source, scope.clone(), registry) {
        Ok(executor) => executor,
        Err(error) => {
            report_error(ctx, session.channel_id, &error, registry).await?;
            return Ok(());
        }
    };

    let executor = executor
        .arg("message_id", Value::Int(event.message_id.get() as i64))
        .arg("channel_id", Value::Int(event.channel_id.get() as i64))
        .arg(
            "guild_id",
            event
                .guild_id
                .map_or(Value::None, |id| Value::Int(id.get() as i64)),
        )
        .arg("author_id", Value::Int(event.author_id.get() as i64))
        .arg("content", Value::Str(event.content.clone()));

    let mut stream = executor.stream();
    let mut failure: Option<ExecutionError> = None;

    while let Some(result) = stream.next().await {
        match result {
            Ok(Value::None) => {}
            Ok(value) => {
                scope.set_global("_", value.clone());
                dispatch_result(ctx, session, &value).await?;
            }
            Err(error) => {
                failure = Some(error);
                break;
            }
        }
    }

    report_stdout(ctx, session.channel_id, &stream.stdout()).await?;

    if let Some(error) = failure {
        report_error(ctx, session.channel_id, &error, registry).await?;
    }

    Ok(())
}

async fn dispatch_result(
    ctx: &Context,
    session: &MessageEvent,
    value: &Value,
) -> anyhow::Result<()> {
    match plan_result_display(value, &ctx.config.token) {
        ResultDisplay::Skip => Ok(()),
        ResultDisplay::Inline(content) => {
            ctx.chat.send_message(session.channel_id, &content).await?;
            Ok(())
        }
        ResultDisplay::Paginated(text) => {
            send_paginated(ctx, session, &text).await
        }
    }
}

async fn send_paginated(ctx: &Context, session: &MessageEvent, text: &str) -> anyhow::Result<()> {
    let mut paginator = WrappedPaginator::new()
        .prefix("```py")
        .suffix("```")
        .max_size(PAGINATED_MAX_SIZE);

    if let Err(source) = paginator.add_line(text) {
        warn!(?source, "result could not be paginated");
        ctx.chat
            .send_message(session.channel_id, "Result is too long to be displayed.")
            .await?;
        return Ok(());
    }

    let mut interface = PaginatorInterface::new(paginator)?.owner(session.author_id);
    interface.send_to(ctx, session.channel_id).await?;

    Ok(())
}

async fn report_stdout(
    ctx: &Context,
    channel_id: Id<ChannelMarker>,
    stdout: &str,
) -> anyhow::Result<()> {
    if stdout.is_empty() {
        return Ok(());
    }

    let rendered = format!(
        "`stdout`:\n```py\n{}\n```",
        redact(stdout, &ctx.config.token)
    );
    if rendered.chars().count() > 2000 {
        ctx.chat
            .send_message(channel_id, "Content is too big to be sent")
            .await?;
    } else {
        ctx.chat.send_message(channel_id, &rendered).await?;
    }

    Ok(())
}

async fn report_error(
    ctx: &Context,
    channel_id: Id<ChannelMarker>,
    error: &ExecutionError,
    registry: &SourceRegistry,
) -> anyhow::Result<()> {
    let rendered = format!("Traceback:\n```py\n{}\n```", error.traceback(registry));

    if rendered.chars().count() > 2000 {
        let fallback = format!("Traceback is too big to be sent\n{error}");
        ctx.chat.send_message(channel_id, &fallback).await?;
    } else {
        ctx.chat.send_message(channel_id, &rendered).await?;
    }

    Ok(())
}
