//! Role gate for account operations.
//!
//! Admission is plain set membership: a caller passes only when its role is
//! listed for the operation. Admin does not implicitly satisfy a set it is
//! missing from.

use crate::error::{UserError, UserResult};
use crate::models::{Role, User};

/// Roles an operation accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredRoles(pub &'static [Role]);

impl RequiredRoles {
    pub const ADMIN: RequiredRoles = RequiredRoles(&[Role::Admin]);
    pub const STAFF: RequiredRoles = RequiredRoles(&[Role::Admin, Role::Moderator]);

    pub fn admits(&self, role: Role) -> bool {
        self.0.contains(&role)
    }
}

/// Every operation exposed over HTTP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    GetOwnProfile,
    UpdateOwnProfile,
    ChangeOwnPassword,
    Logout,
    ListUsers,
    GetUser,
    UpdateUserRole,
    ActivateUser,
    DeactivateUser,
    DeleteUser,
}

impl Operation {
    /// `None` means any authenticated caller may run it.
    pub fn required_roles(&self) -> Option<RequiredRoles> {
        match self {
            Operation::GetOwnProfile
            | Operation::UpdateOwnProfile
            | Operation::ChangeOwnPassword
            | Operation::Logout => None,
            Operation::ListUsers | Operation::GetUser => Some(RequiredRoles::STAFF),
            Operation::UpdateUserRole
            | Operation::ActivateUser
            | Operation::DeactivateUser
            | Operation::DeleteUser => Some(RequiredRoles::ADMIN),
        }
    }
}

pub fn authorize(caller: &User, required: RequiredRoles) -> UserResult<()> {
    if required.admits(caller.role) {
        Ok(())
    } else {
        tracing::debug!(user_id = %caller.id, role = %caller.role, "Role gate rejected caller");
        Err(UserError::Forbidden(
            "Insufficient role for this operation".to_string(),
        ))
    }
}

/// Checks `caller` against the roles `operation` requires.
pub fn authorize_operation(caller: &User, operation: Operation) -> UserResult<()> {
    match operation.required_roles() {
        Some(required) => authorize(caller, required),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(role: Role) -> User {
        let mut user = User::new("c@x.com", "caller", None);
        user.role = role;
        user
    }

    #[test]
    fn test_membership_only() {
        assert!(authorize(&caller(Role::Admin), RequiredRoles::ADMIN).is_ok());
        assert!(authorize(&caller(Role::Moderator), RequiredRoles::ADMIN).is_err());

        // No hierarchy: admin fails a moderator-only set
        let moderators_only = RequiredRoles(&[Role::Moderator]);
        assert!(matches!(
            authorize(&caller(Role::Admin), moderators_only),
            Err(UserError::Forbidden(_))
        ));
    }

    #[test]
    fn test_operation_table() {
        for op in [
            Operation::GetOwnProfile,
            Operation::UpdateOwnProfile,
            Operation::ChangeOwnPassword,
            Operation::Logout,
        ] {
            assert!(authorize_operation(&caller(Role::User), op).is_ok());
        }

        for op in [Operation::ListUsers, Operation::GetUser] {
            assert!(authorize_operation(&caller(Role::User), op).is_err());
            assert!(authorize_operation(&caller(Role::Moderator), op).is_ok());
            assert!(authorize_operation(&caller(Role::Admin), op).is_ok());
        }

        for op in [
            Operation::UpdateUserRole,
            Operation::ActivateUser,
            Operation::DeactivateUser,
            Operation::DeleteUser,
        ] {
            assert!(authorize_operation(&caller(Role::Moderator), op).is_err());
            assert!(authorize_operation(&caller(Role::Admin), op).is_ok());
        }
    }
}
