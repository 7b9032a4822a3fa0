//! Keyed store for per-user login state.
//!
//! Each user id maps to at most one of: a code-pending attempt, a
//! two-factor-pending attempt, or an authenticated session. Every transition
//! goes through the methods here, so the at-most-one-state invariant cannot
//! be broken from the outside. The store is generic over the stage payloads;
//! the bot instantiates it with the Telegram handles from
//! [`crate::bot::sessions`].

use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Why a new login attempt was refused
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginRefused {
    #[error("an active session exists; log out first")]
    AlreadyAuthorized,
    #[error("a login attempt is already pending")]
    AttemptPending,
}

/// Coarse state of a user id, for status replies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStatus {
    Absent,
    CodePending,
    TwoFaPending,
    Authorized,
}

/// Everything held for one user id
#[derive(Debug)]
pub enum UserState<C, T, A> {
    CodePending(C),
    TwoFaPending(T),
    Authorized(A),
}

/// A pending attempt handed back by [`SessionRegistry::purge_expired`] so the
/// caller can tear the handle down
#[derive(Debug)]
pub enum PendingAttempt<C, T> {
    Code(C),
    TwoFa(T),
}

#[derive(Debug)]
struct Entry<C, T, A> {
    state: UserState<C, T, A>,
    // Meaningless once authorized; only pending attempts expire.
    started: Instant,
}

/// Map from user id to login state, with expiry for pending attempts
#[derive(Debug)]
pub struct SessionRegistry<C, T, A> {
    pending_ttl: Duration,
    entries: HashMap<i64, Entry<C, T, A>>,
}

impl<C, T, A> SessionRegistry<C, T, A> {
    #[must_use]
    pub fn new(pending_ttl: Duration) -> Self {
        Self {
            pending_ttl,
            entries: HashMap::new(),
        }
    }

    /// Coarse state of `user` without touching the entry
    #[must_use]
    pub fn status(&self, user: i64) -> LoginStatus {
        match self.entries.get(&user).map(|e| &e.state) {
            None => LoginStatus::Absent,
            Some(UserState::CodePending(_)) => LoginStatus::CodePending,
            Some(UserState::TwoFaPending(_)) => LoginStatus::TwoFaPending,
            Some(UserState::Authorized(_)) => LoginStatus::Authorized,
        }
    }

    /// Check whether a new attempt for `user` would be accepted. Handlers
    /// call this before paying for a connection and a code request.
    ///
    /// # Errors
    ///
    /// Refused when the user is authorized or already has a pending attempt.
    pub fn ensure_can_login(&self, user: i64) -> Result<(), LoginRefused> {
        match self.entries.get(&user).map(|e| &e.state) {
            None => Ok(()),
            Some(UserState::Authorized(_)) => Err(LoginRefused::AlreadyAuthorized),
            Some(_) => Err(LoginRefused::AttemptPending),
        }
    }

    /// Record a fresh code-pending attempt for `user`.
    ///
    /// # Errors
    ///
    /// Same refusals as [`Self::ensure_can_login`]; a second `/login` never
    /// replaces a live attempt.
    pub fn begin_login(&mut self, user: i64, pending: C, now: Instant) -> Result<(), LoginRefused> {
        self.ensure_can_login(user)?;
        self.entries.insert(
            user,
            Entry {
                state: UserState::CodePending(pending),
                started: now,
            },
        );
        Ok(())
    }

    /// Consume the code-pending payload of `user`, if any, along with the
    /// instant the attempt started. The entry is removed; the caller either
    /// authorizes, promotes to the 2FA stage, or drops the payload.
    pub fn take_code_pending(&mut self, user: i64) -> Option<(C, Instant)> {
        if !matches!(
            self.entries.get(&user).map(|e| &e.state),
            Some(UserState::CodePending(_))
        ) {
            return None;
        }
        match self.entries.remove(&user) {
            Some(Entry {
                state: UserState::CodePending(pending),
                started,
            }) => Some((pending, started)),
            _ => None,
        }
    }

    /// Consume the 2FA-pending payload of `user`, if any
    pub fn take_two_fa(&mut self, user: i64) -> Option<(T, Instant)> {
        if !matches!(
            self.entries.get(&user).map(|e| &e.state),
            Some(UserState::TwoFaPending(_))
        ) {
            return None;
        }
        match self.entries.remove(&user) {
            Some(Entry {
                state: UserState::TwoFaPending(pending),
                started,
            }) => Some((pending, started)),
            _ => None,
        }
    }

    /// Park a 2FA-pending payload for `user`, keeping the start instant of
    /// the original attempt so expiry still applies to the whole flow.
    pub fn promote_two_fa(&mut self, user: i64, pending: T, started: Instant) {
        self.entries.insert(
            user,
            Entry {
                state: UserState::TwoFaPending(pending),
                started,
            },
        );
    }

    /// Mark `user` as authorized
    pub fn authorize(&mut self, user: i64, session: A, now: Instant) {
        self.entries.insert(
            user,
            Entry {
                state: UserState::Authorized(session),
                started: now,
            },
        );
    }

    /// Borrow the authorized session of `user`, if any
    #[must_use]
    pub fn authorized(&self, user: i64) -> Option<&A> {
        match self.entries.get(&user).map(|e| &e.state) {
            Some(UserState::Authorized(session)) => Some(session),
            _ => None,
        }
    }

    /// Remove and return the authorized session of `user`, if any
    pub fn take_authorized(&mut self, user: i64) -> Option<A> {
        if !matches!(
            self.entries.get(&user).map(|e| &e.state),
            Some(UserState::Authorized(_))
        ) {
            return None;
        }
        match self.entries.remove(&user) {
            Some(Entry {
                state: UserState::Authorized(session),
                ..
            }) => Some(session),
            _ => None,
        }
    }

    /// Remove whatever `user` currently holds
    pub fn take_any(&mut self, user: i64) -> Option<UserState<C, T, A>> {
        self.entries.remove(&user).map(|e| e.state)
    }

    /// Drop every pending attempt older than the configured window and hand
    /// the payloads back for teardown. Authorized sessions never expire.
    pub fn purge_expired(&mut self, now: Instant) -> Vec<(i64, PendingAttempt<C, T>)> {
        let expired: Vec<i64> = self
            .entries
            .iter()
            .filter(|(_, e)| {
                !matches!(e.state, UserState::Authorized(_))
                    && now.duration_since(e.started) >= self.pending_ttl
            })
            .map(|(&user, _)| user)
            .collect();

        let mut purged = Vec::with_capacity(expired.len());
        for user in expired {
            if let Some(entry) = self.entries.remove(&user) {
                match entry.state {
                    UserState::CodePending(pending) => {
                        purged.push((user, PendingAttempt::Code(pending)));
                    }
                    UserState::TwoFaPending(pending) => {
                        purged.push((user, PendingAttempt::TwoFa(pending)));
                    }
                    UserState::Authorized(_) => {}
                }
            }
        }
        purged
    }
}
