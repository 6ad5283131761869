/// Database models for Hearth
///
/// Each model owns its SQL. Multi-statement mutations take a transaction or a
/// generic executor so callers can compose them.
///
/// # Models
///
/// - `user`: accounts keyed by identity-provider uid
/// - `push_subscription`: push endpoints per user
/// - `house`: households
/// - `membership`: user/house relationships with roles and permission flags
/// - `invitation`: invitation tokens and their state machine
/// - `task`: chores on the house board
/// - `shopping_item`: shared shopping list
/// - `device`: smart-home device state blobs
/// - `notification`: in-app notifications

pub mod device;
pub mod house;
pub mod invitation;
pub mod membership;
pub mod notification;
pub mod push_subscription;
pub mod shopping_item;
pub mod task;
pub mod user;

use serde::{Deserialize, Deserializer};

/// Whether `err` is a unique violation of the named constraint or index
pub fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation() && db_err.constraint() == Some(constraint)
        }
        _ => false,
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`)
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
