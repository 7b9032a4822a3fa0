//! Outer connection loop for the bot's own client.
//!
//! This is the only layer allowed to restart the connection. Receive-loop
//! failures are classified into a retry delay and the loop reconnects
//! forever; the process is expected to run under a supervisor.

use crate::bot::handlers::{self, BotContext};
use crate::bot::sessions;
use crate::config::{self, Settings};
use grammers_client::Client;
use grammers_mtsender::InvocationError;
use std::time::Duration;
use tracing::{error, info, warn};

/// Category of a receive-loop failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveFault {
    /// Server-side rate limit carrying the seconds to wait
    FloodWait(u64),
    /// Any other remote-procedure error
    Rpc(String),
    /// Everything else: transport drops, unexpected read failures
    Unclassified(String),
}

impl ReceiveFault {
    /// Classify a failure of the update stream
    #[must_use]
    pub fn classify(err: &InvocationError) -> Self {
        match err {
            InvocationError::Rpc(rpc) if rpc.name.starts_with("FLOOD") => Self::FloodWait(
                rpc.value
                    .map_or(config::FLOOD_FALLBACK_DELAY.as_secs(), u64::from),
            ),
            InvocationError::Rpc(rpc) => Self::Rpc(rpc.to_string()),
            other => Self::Unclassified(other.to_string()),
        }
    }

    /// How long to sleep before the next connection attempt
    #[must_use]
    pub fn delay(&self) -> Duration {
        match self {
            Self::FloodWait(secs) => Duration::from_secs(*secs),
            Self::Rpc(_) => config::RPC_RETRY_DELAY,
            Self::Unclassified(_) => config::UNCLASSIFIED_RETRY_DELAY,
        }
    }
}

/// Connect, receive, and dispatch until the process is killed
pub async fn run(settings: &Settings, ctx: &mut BotContext) {
    loop {
        let client = match sessions::connect_bot(settings).await {
            Ok(client) => client,
            Err(e) => {
                error!(
                    "Connection failed: {e}. Retrying in {}s...",
                    config::RPC_RETRY_DELAY.as_secs()
                );
                tokio::time::sleep(config::RPC_RETRY_DELAY).await;
                continue;
            }
        };
        info!("✅ Connected to Telegram");
        receive_loop(&client, ctx).await;
    }
}

// Returns after sleeping on a fault; the caller reconnects.
async fn receive_loop(client: &Client, ctx: &mut BotContext) {
    info!("🤖 Listening for updates...");
    loop {
        match client.next_update().await {
            Ok(update) => handlers::handle_update(update, ctx).await,
            Err(e) => {
                let fault = ReceiveFault::classify(&e);
                warn!(
                    "⏳ Receive loop interrupted: {e}. Reconnecting in {}s...",
                    fault.delay().as_secs()
                );
                tokio::time::sleep(fault.delay()).await;
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flood_wait_sleeps_the_reported_seconds() {
        assert_eq!(
            ReceiveFault::FloodWait(17).delay(),
            Duration::from_secs(17)
        );
    }

    #[test]
    fn test_rpc_fault_uses_the_fixed_delay() {
        assert_eq!(
            ReceiveFault::Rpc("CONNECTION_SYSTEM_ERROR".into()).delay(),
            config::RPC_RETRY_DELAY
        );
    }

    #[test]
    fn test_unclassified_fault_uses_the_long_delay() {
        assert_eq!(
            ReceiveFault::Unclassified("read error".into()).delay(),
            config::UNCLASSIFIED_RETRY_DELAY
        );
    }
}
