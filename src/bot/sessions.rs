//! Telegram session plumbing: connecting clients, naming their on-disk
//! artifacts, and tearing them down.
//!
//! The Telegram library owns the wire protocol, flood pacing, and session
//! encryption; this module only drives its high-level operations and keeps
//! the artifact files in order.

use crate::config::{self, Settings};
use grammers_client::types::{LoginToken, PasswordToken};
use grammers_client::{Client, Config as ClientConfig};
use grammers_session::Session;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Error raised by session plumbing
#[derive(Error, Debug)]
pub enum SessionError {
    /// Remote call failed; the library message is preserved verbatim
    #[error("Telegram error: {0}")]
    Telegram(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    /// Wrap a library error by message
    pub fn telegram(e: impl fmt::Display) -> Self {
        Self::Telegram(e.to_string())
    }
}

/// A login attempt waiting for the verification code
pub struct PendingCode {
    pub client: Client,
    pub token: LoginToken,
    pub phone: String,
    pub session_file: PathBuf,
}

/// A login attempt waiting for the two-factor password
pub struct PendingTwoFa {
    pub client: Client,
    pub token: PasswordToken,
    pub phone: String,
    pub session_file: PathBuf,
}

/// An authenticated user session
pub struct ActiveSession {
    pub client: Client,
    pub session_file: PathBuf,
}

/// The registry instantiated with the Telegram payloads
pub type Registry = crate::bot::registry::SessionRegistry<PendingCode, PendingTwoFa, ActiveSession>;

/// Connect the bot's own client, signing in with the bot token on first run.
///
/// # Errors
///
/// Surfaces connect, authorization-check, and sign-in failures.
pub async fn connect_bot(settings: &Settings) -> Result<Client, SessionError> {
    let session = Session::load_file_or_create(config::BOT_SESSION_FILE)?;
    let client = Client::connect(ClientConfig {
        session,
        api_id: settings.api_id,
        api_hash: settings.api_hash.clone(),
        params: Default::default(),
    })
    .await
    .map_err(SessionError::telegram)?;

    if !client.is_authorized().await.map_err(SessionError::telegram)? {
        info!("Not authorized yet, signing in with the bot token");
        client
            .bot_sign_in(&settings.bot_token)
            .await
            .map_err(SessionError::telegram)?;
    }
    client.session().save_to_file(config::BOT_SESSION_FILE)?;
    Ok(client)
}

/// Build the artifact path for a new login attempt:
/// `<dir>/<user_id>_<unix_ts>.session`
#[must_use]
pub fn session_file_for(dir: &Path, user: i64) -> PathBuf {
    let stamp = chrono::Utc::now().timestamp();
    dir.join(format!("{user}_{stamp}.session"))
}

/// Connect a fresh client with user-supplied credentials and ask Telegram to
/// send a login code to `phone`.
///
/// # Errors
///
/// Any connect or RPC failure is surfaced as [`SessionError::Telegram`]; the
/// caller discards the half-open attempt.
pub async fn start_login(
    api_id: i32,
    api_hash: &str,
    phone: &str,
    session_file: &Path,
) -> Result<(Client, LoginToken), SessionError> {
    let session = Session::load_file_or_create(session_file)?;
    let client = Client::connect(ClientConfig {
        session,
        api_id,
        api_hash: api_hash.to_string(),
        params: Default::default(),
    })
    .await
    .map_err(SessionError::telegram)?;

    let token = client
        .request_login_code(phone)
        .await
        .map_err(SessionError::telegram)?;
    Ok((client, token))
}

/// Persist the session artifact of a freshly authorized client
///
/// # Errors
///
/// Surfaces the underlying file write error.
pub fn save_session(client: &Client, session_file: &Path) -> Result<(), SessionError> {
    client.session().save_to_file(session_file)?;
    Ok(())
}

/// Drop a connection handle and remove its on-disk artifact
pub fn discard(client: Client, session_file: &Path) {
    drop(client);
    remove_artifact(session_file);
}

/// Remove one session artifact if present, logging instead of failing
pub fn remove_artifact(session_file: &Path) {
    match std::fs::remove_file(session_file) {
        Ok(()) => info!("Removed session artifact {}", session_file.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(
            "Could not remove session artifact {}: {e}",
            session_file.display()
        ),
    }
}

/// Remove every artifact under `dir` belonging to `user`
pub fn remove_all_artifacts(dir: &Path, user: i64) {
    let prefix = format!("{user}_");
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.starts_with(&prefix) && name.ends_with(".session") {
            remove_artifact(&entry.path());
        }
    }
}

/// Sign the session out remotely, then drop the handle and delete its artifact
pub async fn sign_out(session: ActiveSession) {
    if let Err(e) = session.client.sign_out().await {
        warn!("Remote sign-out failed: {e}");
    }
    discard(session.client, &session.session_file);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_file_naming() {
        let path = session_file_for(Path::new("sessions"), 42);
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .expect("file name");
        assert!(path.starts_with("sessions"));
        assert!(name.starts_with("42_"));
        assert!(name.ends_with(".session"));
    }

    #[test]
    fn test_remove_all_artifacts_is_scoped_to_the_user(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let mine = dir.path().join("42_1700000000.session");
        let other = dir.path().join("43_1700000000.session");
        let unrelated = dir.path().join("42_notes.txt");
        std::fs::write(&mine, b"x")?;
        std::fs::write(&other, b"x")?;
        std::fs::write(&unrelated, b"x")?;

        remove_all_artifacts(dir.path(), 42);

        assert!(!mine.exists());
        assert!(other.exists());
        assert!(unrelated.exists());
        Ok(())
    }

    #[test]
    fn test_remove_artifact_tolerates_missing_files() {
        remove_artifact(Path::new("definitely/not/there.session"));
    }
}
