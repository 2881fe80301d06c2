/// Result rendering decisions for executed snippets.
pub mod output;
/// The interactive REPL session controller.
pub mod repl;

use tracing::error;

use ember_core::Context;
use ember_core::events::MessageEvent;
use ember_utils::COMMAND_PREFIX;

/// Route a gateway message to its command handler.
pub async fn handle_message(ctx: Context, msg: MessageEvent) -> anyhow::Result<()> {
    if msg.author_is_bot {
        return Ok(());
    }

    let content = msg.content.trim();
    let Some(rest) = content.strip_prefix(COMMAND_PREFIX) else {
        return Ok(());
    };

    match rest.trim().to_ascii_lowercase().as_str() {
        repl::REPL_COMMAND => {
            // sessions outlive the triggering event, so they run as tasks
            tokio::spawn(async move {
                if let Err(source) = repl::run(ctx, msg).await {
                    error!(?source, "repl session failed");
                }
            });
        }
        // Add new commands here
        _ => {}
    }

    Ok(())
}
