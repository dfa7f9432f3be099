use crate::model::common::user::UserRole;

/// A privilege level required by an endpoint.
pub trait Rights {
    /// Directory roles granted this level.
    const ROLES: &'static [UserRole];
    /// Human-readable name, for error messages.
    const NAME: &'static str;

    fn permits(role: UserRole) -> bool {
        Self::ROLES.contains(&role)
    }
}

/// Any active user.
pub struct Member;

/// Election administrators.
pub struct Admin;

/// Admins and auditors, who may see full breakdowns.
pub struct Overseer;

impl Rights for Member {
    const ROLES: &'static [UserRole] = &[UserRole::Member, UserRole::Admin, UserRole::Auditor];
    const NAME: &'static str = "member";
}

impl Rights for Admin {
    const ROLES: &'static [UserRole] = &[UserRole::Admin];
    const NAME: &'static str = "admin";
}

impl Rights for Overseer {
    const ROLES: &'static [UserRole] = &[UserRole::Admin, UserRole::Auditor];
    const NAME: &'static str = "admin or auditor";
}
