/// Middleware for the API server
///
/// - `security`: security response headers
/// - `auth`: identity token verification for `/v1` routes

pub mod auth;
pub mod security;
