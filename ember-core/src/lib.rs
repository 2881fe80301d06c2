use std::sync::Arc;

/// Outbound chat API boundary and its twilight implementation.
pub mod chat;
/// Startup configuration resolved from the environment.
pub mod config;
/// Inbound gateway event fan-out.
pub mod events;

use chat::ChatApi;
use config::Config;
use events::EventBus;

/// Shared application context passed into command handlers.
///
/// Cheap to clone because it only stores reference-counted shared state.
#[derive(Clone)]
pub struct Context {
    pub chat: Arc<dyn ChatApi>,
    pub events: EventBus,
    pub config: Arc<Config>,
}

impl Context {
    /// Create a new application context.
    pub fn new(chat: Arc<dyn ChatApi>, events: EventBus, config: Arc<Config>) -> Self {
        Self {
            chat,
            events,
            config,
        }
    }
}
