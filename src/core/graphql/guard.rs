//! Permission rules in front of resolvers

use async_graphql::{Context, Error, Guard, Result};

use super::context::Viewer;
use crate::core::db::models::Role;

pub const NOT_AUTHENTICATED: &str = "Not authenticated";
pub const INVALID_TOKEN: &str = "Invalid or expired token";

/// Requires a valid bearer token
pub struct AuthGuard;

impl AuthGuard {
    fn check_viewer(viewer: Viewer) -> Result<Role> {
        match viewer {
            Viewer::Authenticated { role, .. } => Ok(role),
            Viewer::InvalidToken => Err(Error::new(INVALID_TOKEN)),
            Viewer::Anonymous => Err(Error::new(NOT_AUTHENTICATED)),
        }
    }
}

impl Guard for AuthGuard {
    async fn check(&self, ctx: &Context<'_>) -> Result<()> {
        Self::check_viewer(Viewer::of(ctx)).map(|_| ())
    }
}

/// Requires a valid bearer token issued to a specific role
pub struct RoleGuard {
    role: Role,
}

impl RoleGuard {
    pub fn new(role: Role) -> Self {
        Self { role }
    }

    fn check_viewer(&self, viewer: Viewer) -> Result<()> {
        let role = AuthGuard::check_viewer(viewer)?;
        if role != self.role {
            return Err(Error::new(format!("Access Denied: {} only", self.role)));
        }
        Ok(())
    }
}

impl Guard for RoleGuard {
    async fn check(&self, ctx: &Context<'_>) -> Result<()> {
        self.check_viewer(Viewer::of(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn viewer(role: Role) -> Viewer {
        Viewer::Authenticated {
            user_id: Uuid::new_v4(),
            role,
        }
    }

    #[test]
    fn test_auth_guard() {
        assert!(AuthGuard::check_viewer(viewer(Role::Tenant)).is_ok());
        assert_eq!(
            AuthGuard::check_viewer(Viewer::Anonymous).unwrap_err().message,
            NOT_AUTHENTICATED
        );
        assert_eq!(
            AuthGuard::check_viewer(Viewer::InvalidToken).unwrap_err().message,
            INVALID_TOKEN
        );
    }

    #[test]
    fn test_role_guard() {
        let guard = RoleGuard::new(Role::PropertyManager);

        assert!(guard.check_viewer(viewer(Role::PropertyManager)).is_ok());
        assert_eq!(
            guard.check_viewer(viewer(Role::Tenant)).unwrap_err().message,
            "Access Denied: PropertyManager only"
        );
        assert_eq!(
            guard.check_viewer(Viewer::InvalidToken).unwrap_err().message,
            INVALID_TOKEN
        );
    }
}
