/// State management module
///
/// This module handles all bot state, including:
/// - The settings document (config.rs)
/// - Permission roster and whitelist persistence (roster.rs)
/// - Shared data structures for stickers and artifacts (data.rs)
/// - Per-key async locks for requests touching the same files (locks.rs)

pub mod config;
pub mod data;
pub mod locks;
pub mod roster;
