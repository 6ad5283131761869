//! # Hearth Shared Library
//!
//! Domain model and business logic shared by the Hearth API server and the
//! reference sync client.
//!
//! ## Module Organization
//!
//! - `models`: database models and data structures
//! - `db`: connection pool and migrations
//! - `auth`: identity tokens, request context, role policy, authorization
//! - `directory`: house membership resolution and member removal
//! - `invitations`: invitation tokens and their workflow
//! - `realtime`: change events, session registry, broadcaster, Redis relay
//! - `notify`: notifications, mail and push
//! - `redis`: Redis client

pub mod auth;
pub mod db;
pub mod directory;
pub mod invitations;
pub mod models;
pub mod notify;
pub mod realtime;
pub mod redis;

/// Current version of the Hearth shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
