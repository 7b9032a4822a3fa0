//! Command handlers and update dispatch.
//!
//! Handlers run sequentially on the receive loop, so the registry and the
//! settings store are plain `&mut` state. Every failure inside a handler
//! becomes a user-facing reply; nothing here is allowed to take the receive
//! loop down.

use crate::bot::commands::{self, Command};
use crate::bot::registry::{LoginRefused, LoginStatus, PendingAttempt, UserState};
use crate::bot::sessions::{self, ActiveSession, PendingCode, PendingTwoFa, Registry, SessionError};
use crate::config;
use crate::store::{ChatRef, SettingsStore};
use grammers_client::types::{CallbackQuery, Chat, Message};
use grammers_client::{button, reply_markup, Client, InputMessage, SignInError, Update};
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, warn};

/// Callback payload of the limited-mode toggle button
pub const TOGGLE_LIMITED: &[u8] = b"toggle_limited";

/// Mutable bot-side state shared by every handler invocation
pub struct BotContext {
    pub registry: Registry,
    pub store: SettingsStore,
}

/// Entry point for one update from the receive loop
pub async fn handle_update(update: Update, ctx: &mut BotContext) {
    match update {
        Update::NewMessage(message) if !message.outgoing() => {
            handle_message(message, ctx).await;
        }
        Update::CallbackQuery(query) => handle_callback(query, ctx).await,
        _ => {}
    }
}

async fn handle_message(message: Message, ctx: &mut BotContext) {
    let chat = message.chat();
    if ctx.store.limited_mode() && !chat_is_allowed(&chat, &ctx.store) {
        return;
    }

    let Some(parsed) = commands::parse(message.text()) else {
        return;
    };
    let Some(sender) = message.sender() else {
        return;
    };
    let user = sender.id();

    let reply = match parsed {
        Ok(command) => dispatch(command, user, ctx).await,
        Err(e) => InputMessage::text(format!("⚠️ {e}")),
    };
    if let Err(e) = message.respond(reply).await {
        error!("Failed to reply in chat {}: {e}", chat.id());
    }
}

// In limited mode only allow-listed groups and channels get replies. Private
// chats are exempt so the operator can always reach /settings.
fn chat_is_allowed(chat: &Chat, store: &SettingsStore) -> bool {
    if matches!(chat, Chat::User(_)) {
        return true;
    }
    store.is_chat_allowed(chat.id(), chat.username())
}

async fn dispatch(command: Command, user: i64, ctx: &mut BotContext) -> InputMessage {
    // Stale attempts are swept before any command touches the registry.
    for (expired_user, attempt) in ctx.registry.purge_expired(Instant::now()) {
        info!("Discarding expired login attempt of user {expired_user}");
        match attempt {
            PendingAttempt::Code(p) => sessions::discard(p.client, &p.session_file),
            PendingAttempt::TwoFa(p) => sessions::discard(p.client, &p.session_file),
        }
    }

    match command {
        Command::Start => InputMessage::text(start_text(ctx.registry.status(user))),
        Command::Ping => InputMessage::text("🏓 Pong! Connection stable"),
        Command::Login {
            api_id,
            api_hash,
            phone,
        } => login(user, api_id, &api_hash, phone, ctx).await,
        Command::VerifyCode { code } => verify_code(user, &code, ctx).await,
        Command::VerifyTwoFa { password } => verify_two_fa(user, &password, ctx).await,
        Command::ListChats => list_chats(user, &ctx.registry).await,
        Command::Logout => logout(user, ctx).await,
        Command::CleanAll => clean_all(user, ctx).await,
        Command::Settings => settings_reply(&ctx.store),
        Command::AllowChat { chat } => allow_chat(chat, &mut ctx.store),
    }
}

async fn login(
    user: i64,
    api_id: i32,
    api_hash: &str,
    phone: String,
    ctx: &mut BotContext,
) -> InputMessage {
    // Refuse before paying for a connection and a code request.
    if let Err(refused) = ctx.registry.ensure_can_login(user) {
        return InputMessage::text(refusal_text(refused));
    }

    let session_file = sessions::session_file_for(Path::new(config::SESSIONS_DIR), user);
    match sessions::start_login(api_id, api_hash, &phone, &session_file).await {
        Ok((client, token)) => {
            let pending = PendingCode {
                client,
                token,
                phone,
                session_file,
            };
            match ctx.registry.begin_login(user, pending, Instant::now()) {
                Ok(()) => {
                    info!("Login code requested for user {user}");
                    InputMessage::text("📨 Code sent. Reply with /verify_code <code>.")
                }
                Err(refused) => InputMessage::text(refusal_text(refused)),
            }
        }
        Err(e) => {
            warn!("Login of user {user} failed: {e}");
            sessions::remove_artifact(&session_file);
            InputMessage::text(format!("❌ Could not start login: {e}"))
        }
    }
}

fn refusal_text(refused: LoginRefused) -> &'static str {
    match refused {
        LoginRefused::AlreadyAuthorized => {
            "⛔️ You already have an active session. Use /logout first."
        }
        LoginRefused::AttemptPending => {
            "⏳ A login attempt is already pending. Finish it with /verify_code or wait for it to expire."
        }
    }
}

async fn verify_code(user: i64, code: &str, ctx: &mut BotContext) -> InputMessage {
    let Some((pending, started)) = ctx.registry.take_code_pending(user) else {
        return InputMessage::text(
            "⚠️ No code is pending for you. Start with /login <api_id> <api_hash> <phone>.",
        );
    };

    match pending.client.sign_in(&pending.token, code).await {
        Ok(tg_user) => {
            if let Err(e) = sessions::save_session(&pending.client, &pending.session_file) {
                warn!("Could not save session artifact of user {user}: {e}");
            }
            let name = tg_user.full_name();
            ctx.registry.authorize(
                user,
                ActiveSession {
                    client: pending.client,
                    session_file: pending.session_file,
                },
                Instant::now(),
            );
            info!("User {user} authorized");
            InputMessage::text(format!("✅ Logged in as {name}. Try /list_chats."))
        }
        Err(SignInError::PasswordRequired(token)) => {
            let prompt = match token.hint() {
                Some(hint) => format!(
                    "🔐 Two-factor password required (hint: {hint}). Reply with /verify_2fa <password>."
                ),
                None => "🔐 Two-factor password required. Reply with /verify_2fa <password>."
                    .to_string(),
            };
            ctx.registry.promote_two_fa(
                user,
                PendingTwoFa {
                    client: pending.client,
                    token,
                    phone: pending.phone,
                    session_file: pending.session_file,
                },
                started,
            );
            InputMessage::text(prompt)
        }
        Err(SignInError::InvalidCode) => {
            sessions::discard(pending.client, &pending.session_file);
            InputMessage::text("❌ Invalid code. The attempt was discarded; start again with /login.")
        }
        Err(SignInError::SignUpRequired { .. }) => {
            sessions::discard(pending.client, &pending.session_file);
            InputMessage::text("❌ This phone number has no Telegram account.")
        }
        Err(e) => {
            warn!("Sign-in of user {user} failed: {e}");
            sessions::discard(pending.client, &pending.session_file);
            InputMessage::text(format!("❌ Sign-in failed: {e}"))
        }
    }
}

async fn verify_two_fa(user: i64, password: &str, ctx: &mut BotContext) -> InputMessage {
    let Some((pending, _started)) = ctx.registry.take_two_fa(user) else {
        return InputMessage::text("⚠️ No two-factor check is pending for you. Start with /login.");
    };

    match pending.client.check_password(pending.token, password).await {
        Ok(tg_user) => {
            if let Err(e) = sessions::save_session(&pending.client, &pending.session_file) {
                warn!("Could not save session artifact of user {user}: {e}");
            }
            let name = tg_user.full_name();
            ctx.registry.authorize(
                user,
                ActiveSession {
                    client: pending.client,
                    session_file: pending.session_file,
                },
                Instant::now(),
            );
            info!("User {user} authorized via 2FA");
            InputMessage::text(format!("✅ Logged in as {name}. Try /list_chats."))
        }
        Err(SignInError::InvalidPassword) => {
            sessions::discard(pending.client, &pending.session_file);
            InputMessage::text(
                "❌ Wrong password. The attempt was discarded; start again with /login.",
            )
        }
        Err(e) => {
            warn!("Two-factor check of user {user} failed: {e}");
            sessions::discard(pending.client, &pending.session_file);
            InputMessage::text(format!("❌ Two-factor check failed: {e}"))
        }
    }
}

async fn list_chats(user: i64, registry: &Registry) -> InputMessage {
    let Some(session) = registry.authorized(user) else {
        return InputMessage::text("⛔️ Not logged in. Use /login first.");
    };

    match collect_dialogs(&session.client, config::DIALOG_PAGE_LIMIT).await {
        Ok(lines) if lines.is_empty() => InputMessage::text("No dialogs found."),
        Ok(lines) => InputMessage::text(format!(
            "💬 Your chats (first {}):\n{}",
            lines.len(),
            lines.join("\n")
        )),
        Err(e) => {
            warn!("Listing dialogs of user {user} failed: {e}");
            InputMessage::text(format!("❌ Could not list chats: {e}"))
        }
    }
}

async fn collect_dialogs(client: &Client, limit: usize) -> Result<Vec<String>, SessionError> {
    let mut dialogs = client.iter_dialogs();
    let mut lines = Vec::new();
    while lines.len() < limit {
        match dialogs.next().await.map_err(SessionError::telegram)? {
            Some(dialog) => {
                let chat = dialog.chat();
                lines.push(format!("• {} ({})", chat.name(), chat.id()));
            }
            None => break,
        }
    }
    Ok(lines)
}

async fn logout(user: i64, ctx: &mut BotContext) -> InputMessage {
    match ctx.registry.take_authorized(user) {
        Some(session) => {
            sessions::sign_out(session).await;
            info!("User {user} logged out");
            InputMessage::text("👋 Logged out and session removed.")
        }
        None => InputMessage::text("⚠️ No active session to log out."),
    }
}

async fn clean_all(user: i64, ctx: &mut BotContext) -> InputMessage {
    match ctx.registry.take_any(user) {
        Some(UserState::Authorized(session)) => sessions::sign_out(session).await,
        Some(UserState::CodePending(p)) => sessions::discard(p.client, &p.session_file),
        Some(UserState::TwoFaPending(p)) => sessions::discard(p.client, &p.session_file),
        None => {}
    }
    sessions::remove_all_artifacts(Path::new(config::SESSIONS_DIR), user);
    info!("Cleaned all session state of user {user}");
    InputMessage::text("🧹 Session state and artifacts removed.")
}

fn allow_chat(chat: ChatRef, store: &mut SettingsStore) -> InputMessage {
    if store.allow_chat(chat.clone()) {
        InputMessage::text(format!("✅ {chat} added to allowed chats."))
    } else {
        InputMessage::text(format!("{chat} is already in the allowed chats."))
    }
}

fn settings_reply(store: &SettingsStore) -> InputMessage {
    let markup = reply_markup::inline(vec![vec![button::inline(
        toggle_label(store.limited_mode()),
        TOGGLE_LIMITED,
    )]]);
    InputMessage::text(settings_text(store)).reply_markup(&markup)
}

async fn handle_callback(query: CallbackQuery, ctx: &mut BotContext) {
    if query.data() != TOGGLE_LIMITED {
        if let Err(e) = query.answer().send().await {
            warn!("Failed to answer callback: {e}");
        }
        return;
    }

    let enabled = ctx.store.toggle_limited_mode();
    info!("Limited mode toggled to {enabled}");
    if let Err(e) = query.answer().edit(settings_reply(&ctx.store)).await {
        warn!("Failed to update the settings message: {e}");
    }
}

fn start_text(status: LoginStatus) -> String {
    let state_line = match status {
        LoginStatus::Absent => "No account attached. Use /login <api_id> <api_hash> <phone>.",
        LoginStatus::CodePending => "Waiting for /verify_code <code>.",
        LoginStatus::TwoFaPending => "Waiting for /verify_2fa <password>.",
        LoginStatus::Authorized => "Account attached. Try /list_chats.",
    };
    format!("🚀 TUCL Bot is up!\n{state_line}")
}

fn settings_text(store: &SettingsStore) -> String {
    let settings = store.settings();
    let mode = if settings.limited_mode { "on" } else { "off" };
    let chats = if settings.allowed_chats.is_empty() {
        "(none)".to_string()
    } else {
        settings
            .allowed_chats
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!("⚙️ Settings\nLimited mode: {mode}\nAllowed chats: {chats}")
}

fn toggle_label(limited: bool) -> &'static str {
    if limited {
        "Disable limited mode"
    } else {
        "Enable limited mode"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_start_text_tracks_status() {
        assert!(start_text(LoginStatus::Absent).contains("/login"));
        assert!(start_text(LoginStatus::CodePending).contains("/verify_code"));
        assert!(start_text(LoginStatus::TwoFaPending).contains("/verify_2fa"));
        assert!(start_text(LoginStatus::Authorized).contains("/list_chats"));
    }

    #[test]
    fn test_settings_text_lists_allowed_chats() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let mut store = SettingsStore::load(dir.path().join("settings.json"));
        assert!(settings_text(&store).contains("Limited mode: off"));
        assert!(settings_text(&store).contains("(none)"));

        store.allow_chat(ChatRef::Username("@example".into()));
        store.allow_chat(ChatRef::Id(-100));
        store.toggle_limited_mode();

        let text = settings_text(&store);
        assert!(text.contains("Limited mode: on"));
        assert!(text.contains("@example"));
        assert!(text.contains("-100"));
        Ok(())
    }

    #[test]
    fn test_toggle_label_follows_state() {
        assert_eq!(toggle_label(false), "Enable limited mode");
        assert_eq!(toggle_label(true), "Disable limited mode");
    }

    #[test]
    fn test_refusal_texts_name_the_way_out() {
        assert!(refusal_text(LoginRefused::AlreadyAuthorized).contains("/logout"));
        assert!(refusal_text(LoginRefused::AttemptPending).contains("/verify_code"));
    }
}
