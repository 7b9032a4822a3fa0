//! TUCL Bot: a Telegram bot that attaches user accounts through the
//! code/two-factor login flow, lists their dialogs, and persists a small
//! settings document, with a health-check endpoint running alongside the
//! receive loop.

/// Bot surface: commands, handlers, session registry, connection loop
pub mod bot;
/// Startup settings and operational constants
pub mod config;
/// Health-check HTTP endpoint
pub mod health;
/// Persisted limited-mode flag and chat allow-list
pub mod store;
