/// Role policy for member management
///
/// Decides whether an actor may change the role of, or remove, another
/// member. The table is asymmetric on purpose: owners cannot act on admins,
/// while admins can act on other admins.
///
/// | actor \ target | owner | admin | member |
/// |----------------|-------|-------|--------|
/// | owner          | deny  | deny  | allow  |
/// | admin          | deny  | allow | allow  |
/// | member         | deny  | deny  | deny   |
///
/// On top of the table: nobody acts on themselves (they leave instead), and
/// only an owner may grant the owner role.

use serde::Serialize;

use crate::models::membership::MemberRole;

/// Member-management action subject to the policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleAction {
    ChangeRole,
    Remove,
}

/// Why an action was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    #[error("members cannot manage other members")]
    ActorNotManager,

    #[error("owners cannot be changed or removed")]
    TargetIsOwner,

    #[error("owners cannot change or remove admins")]
    OwnerOnAdmin,

    #[error("use leave to remove yourself; you cannot change your own role")]
    SelfAction,

    #[error("only an owner may grant the owner role")]
    OwnerGrantRequiresOwner,
}

/// Policy outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    Allowed,
    Denied(DenyReason),
}

impl PolicyDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, PolicyDecision::Allowed)
    }

    pub fn into_result(self) -> Result<(), DenyReason> {
        match self {
            PolicyDecision::Allowed => Ok(()),
            PolicyDecision::Denied(reason) => Err(reason),
        }
    }
}

/// The bare role table; the action does not change the outcome
pub fn role_policy(actor: MemberRole, target: MemberRole, _action: RoleAction) -> PolicyDecision {
    use MemberRole::*;

    match (actor, target) {
        (Member, _) => PolicyDecision::Denied(DenyReason::ActorNotManager),
        (_, Owner) => PolicyDecision::Denied(DenyReason::TargetIsOwner),
        (Owner, Admin) => PolicyDecision::Denied(DenyReason::OwnerOnAdmin),
        (Owner, Member) | (Admin, Admin) | (Admin, Member) => PolicyDecision::Allowed,
    }
}

/// One side of a member-management request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Party {
    pub user_id: uuid::Uuid,
    pub role: MemberRole,
}

/// Full check: self rule, role table, then the owner-grant rule
///
/// `new_role` is only consulted for [`RoleAction::ChangeRole`].
pub fn check_member_action(
    actor: Party,
    target: Party,
    action: RoleAction,
    new_role: Option<MemberRole>,
) -> PolicyDecision {
    if actor.user_id == target.user_id {
        return PolicyDecision::Denied(DenyReason::SelfAction);
    }

    let decision = role_policy(actor.role, target.role, action);
    if !decision.is_allowed() {
        return decision;
    }

    if action == RoleAction::ChangeRole
        && new_role == Some(MemberRole::Owner)
        && actor.role != MemberRole::Owner
    {
        return PolicyDecision::Denied(DenyReason::OwnerGrantRequiresOwner);
    }

    PolicyDecision::Allowed
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use MemberRole::*;

    const ROLES: [MemberRole; 3] = [Owner, Admin, Member];
    const ACTIONS: [RoleAction; 2] = [RoleAction::ChangeRole, RoleAction::Remove];

    fn expected(actor: MemberRole, target: MemberRole) -> bool {
        matches!((actor, target), (Owner, Member) | (Admin, Admin) | (Admin, Member))
    }

    fn party(role: MemberRole) -> Party {
        Party {
            user_id: Uuid::new_v4(),
            role,
        }
    }

    #[test]
    fn test_role_table_is_exhaustive() {
        for actor in ROLES {
            for target in ROLES {
                for action in ACTIONS {
                    assert_eq!(
                        role_policy(actor, target, action).is_allowed(),
                        expected(actor, target),
                        "actor={actor:?} target={target:?} action={action:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_owner_cannot_touch_admin() {
        assert_eq!(
            role_policy(Owner, Admin, RoleAction::Remove),
            PolicyDecision::Denied(DenyReason::OwnerOnAdmin)
        );
        assert_eq!(
            role_policy(Owner, Admin, RoleAction::ChangeRole),
            PolicyDecision::Denied(DenyReason::OwnerOnAdmin)
        );
    }

    #[test]
    fn test_nobody_acts_on_owner() {
        for actor in [Owner, Admin] {
            assert_eq!(
                role_policy(actor, Owner, RoleAction::Remove),
                PolicyDecision::Denied(DenyReason::TargetIsOwner)
            );
        }
    }

    #[test]
    fn test_self_action_denied_for_every_role() {
        for role in ROLES {
            let me = party(role);
            for action in ACTIONS {
                assert_eq!(
                    check_member_action(me, me, action, Some(Member)),
                    PolicyDecision::Denied(DenyReason::SelfAction)
                );
            }
        }
    }

    #[test]
    fn test_only_owner_grants_owner() {
        let target = party(Member);

        assert_eq!(
            check_member_action(party(Admin), target, RoleAction::ChangeRole, Some(Owner)),
            PolicyDecision::Denied(DenyReason::OwnerGrantRequiresOwner)
        );
        assert!(check_member_action(party(Owner), target, RoleAction::ChangeRole, Some(Owner)).is_allowed());
    }

    #[test]
    fn test_admin_promotes_member_to_admin() {
        assert!(check_member_action(party(Admin), party(Member), RoleAction::ChangeRole, Some(Admin)).is_allowed());
    }

    #[test]
    fn test_into_result() {
        assert!(PolicyDecision::Allowed.into_result().is_ok());
        assert_eq!(
            PolicyDecision::Denied(DenyReason::ActorNotManager).into_result(),
            Err(DenyReason::ActorNotManager)
        );
    }
}
