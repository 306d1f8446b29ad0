//! Per-request identity attached to every GraphQL request

use async_graphql::Context;
use uuid::Uuid;

use crate::core::auth::AuthService;
use crate::core::db::models::Role;

/// Who is making the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Viewer {
    /// No bearer token was sent
    #[default]
    Anonymous,
    /// A token was sent but did not validate
    InvalidToken,
    Authenticated { user_id: Uuid, role: Role },
}

impl Viewer {
    /// Resolve the bearer token (if any) into a viewer
    pub fn from_token(auth: &AuthService, token: Option<&str>) -> Self {
        let Some(token) = token else {
            return Viewer::Anonymous;
        };

        match auth.authenticate(token) {
            Ok((user_id, role)) => Viewer::Authenticated { user_id, role },
            Err(e) => {
                tracing::debug!(error = %e, "Rejected bearer token");
                Viewer::InvalidToken
            }
        }
    }

    pub fn token_valid(&self) -> bool {
        !matches!(self, Viewer::InvalidToken)
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Viewer::Authenticated { user_id, .. } => Some(*user_id),
            _ => None,
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            Viewer::Authenticated { role, .. } => Some(*role),
            _ => None,
        }
    }

    /// Viewer stored on the request, anonymous if none was attached
    pub fn of(ctx: &Context<'_>) -> Self {
        ctx.data_opt::<Viewer>().copied().unwrap_or_default()
    }
}

/// Authenticated user id; guards run first, so a miss here is a wiring error
pub fn current_user_id(ctx: &Context<'_>) -> async_graphql::Result<Uuid> {
    Viewer::of(ctx)
        .user_id()
        .ok_or_else(|| async_graphql::Error::new("Not authenticated"))
}

/// Pull the token out of an `Authorization: Bearer <token>` header value
pub fn bearer_token(header: &str) -> Option<&str> {
    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty()).then_some(token)
}
