/// House invitations
///
/// - `token`: token generation, hashing and format checks
/// - `service`: create, fetch, accept, decline, revoke and list

pub mod service;
pub mod token;

pub use service::{InvitationError, InvitationService, InvitationSettings, Inviter, IssuedInvitation};
