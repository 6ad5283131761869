/// Database layer for Hearth
///
/// - `pool`: PostgreSQL connection pool with a start-up health check
/// - `migrations`: embedded schema migrations
///
/// Models live in the crate-level `models` module.

pub mod migrations;
pub mod pool;
