/// Authentication and authorization
///
/// # Modules
///
/// - [`jwt`]: identity-provider token verification
/// - [`middleware`]: `AuthContext` extractor and bearer-token parsing
/// - [`authorization`]: membership, role and permission-flag checks
/// - [`policy`]: the role policy table for member management
///
/// # Example
///
/// ```no_run
/// use hearth_shared::auth::jwt::validate_token;
/// use hearth_shared::auth::policy::{role_policy, RoleAction};
/// use hearth_shared::models::membership::MemberRole;
///
/// # fn example(token: &str) -> Result<(), Box<dyn std::error::Error>> {
/// let claims = validate_token(token, "provider-secret-of-at-least-32-bytes", None)?;
/// println!("signed in as {}", claims.email);
///
/// assert!(!role_policy(MemberRole::Owner, MemberRole::Admin, RoleAction::Remove).is_allowed());
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod policy;
