//! Bearer-token authentication.
//!
//! Tokens are issued out of band and live in the `sessions` table; the
//! middleware resolves `Authorization: Bearer <token>` to a user row and
//! attaches an [`AuthUser`] extension for handlers to consume.

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use diesel::prelude::*;

use crate::error::{forbidden, internal_error, unauthorized, ApiError};
use crate::models::{User, UserRole};
use crate::schema::{sessions, users};
use crate::Context;

/// The authenticated caller, attached as a request extension.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: i32,
    pub role: UserRole,
}

impl AuthUser {
    pub fn require(&self, role: UserRole) -> Result<(), ApiError> {
        if self.role == role {
            Ok(())
        } else {
            Err(forbidden(format!("requires the {} role", role.as_str())))
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub async fn require_bearer<B>(
    State(state): State<Context>,
    mut req: Request<B>,
    next: Next<B>,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers())
        .ok_or_else(|| unauthorized("missing bearer token"))?
        .to_string();

    let conn = state.pool.get().await.map_err(internal_error)?;
    let user = conn
        .interact(move |conn| {
            sessions::table
                .inner_join(users::table)
                .filter(sessions::session_token.eq(token))
                .select(User::as_select())
                .first(conn)
                .optional()
        })
        .await
        .map_err(internal_error)?
        .map_err(internal_error)?
        .ok_or_else(|| unauthorized("invalid session token"))?;

    let role = UserRole::from_str(&user.role)
        .ok_or_else(|| forbidden(format!("unknown role {:?}", user.role)))?;

    req.extensions_mut().insert(AuthUser {
        user_id: user.id,
        role,
    });
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn extracts_bearer_token() {
        assert_eq!(bearer_token(&headers("Bearer abc123")), Some("abc123"));
    }

    #[test]
    fn rejects_other_schemes_and_empty_tokens() {
        assert_eq!(bearer_token(&headers("Basic abc123")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
