use twilight_model::id::{Id, marker::UserMarker};

/// Runtime configuration shared across the bot.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bot token, kept around so outgoing text can be scrubbed of it.
    pub token: String,
    /// User allowed to start REPL sessions. `None` disables the REPL.
    pub owner_id: Option<Id<UserMarker>>,
    /// The bot's own user id, used to ignore its own reactions.
    pub bot_user_id: Id<UserMarker>,
}

impl Config {
    pub fn new(token: String, owner_id: Option<Id<UserMarker>>, bot_user_id: Id<UserMarker>) -> Self {
        Self {
            token,
            owner_id,
            bot_user_id,
        }
    }
}
