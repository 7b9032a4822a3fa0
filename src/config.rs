//! Configuration and settings management
//!
//! Loads startup settings from environment variables and defines the fixed
//! operational constants of the bot.

use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::time::Duration;

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Token the bot signs in with
    pub bot_token: String,
    /// Telegram API id used for every connection the bot opens for itself
    pub api_id: i32,
    /// Telegram API hash paired with `api_id`
    pub api_hash: String,
}

impl Settings {
    /// Create new settings by loading from the environment
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` when a required variable is absent or
    /// `API_ID` does not parse as an integer.
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            // Environment::default() auto-converts UPPER_SNAKE_CASE to snake_case;
            // ignore_empty treats empty env vars as unset.
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        s.try_deserialize()
    }
}

/// Path of the persisted settings document
pub const SETTINGS_FILE: &str = "tucl_settings.json";

/// Session artifact for the bot's own connection
pub const BOT_SESSION_FILE: &str = "tucl_session.session";

/// Directory holding per-user session artifacts
pub const SESSIONS_DIR: &str = "sessions";

/// Port the health-check server listens on
pub const HEALTH_PORT: u16 = 8000;

/// Delay before retrying after a generic RPC failure
pub const RPC_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Delay before retrying after an unclassified failure
pub const UNCLASSIFIED_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Wait applied when a flood error does not carry a duration
pub const FLOOD_FALLBACK_DELAY: Duration = Duration::from_secs(15);

/// Window after which a pending login attempt is discarded
pub const LOGIN_ATTEMPT_TTL: Duration = Duration::from_secs(10 * 60);

/// Maximum number of dialogs returned by /list_chats
pub const DIALOG_PAGE_LIMIT: usize = 50;

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    // Env manipulation lives in a single test to avoid race conditions
    // between parallel test threads.
    #[test]
    fn test_env_loading() -> Result<(), Box<dyn std::error::Error>> {
        env::set_var("BOT_TOKEN", "123456:dummy");
        env::set_var("API_ID", "424242");
        env::set_var("API_HASH", "abcdef");

        let settings = Settings::new()?;
        assert_eq!(settings.bot_token, "123456:dummy");
        assert_eq!(settings.api_id, 424_242);
        assert_eq!(settings.api_hash, "abcdef");

        // Non-numeric API_ID must be rejected, not silently defaulted.
        env::set_var("API_ID", "not-a-number");
        assert!(Settings::new().is_err());

        // A missing required variable must be rejected as well.
        env::remove_var("BOT_TOKEN");
        env::set_var("API_ID", "424242");
        assert!(Settings::new().is_err());

        env::remove_var("API_ID");
        env::remove_var("API_HASH");
        Ok(())
    }
}
