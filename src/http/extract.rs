use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::{AUTHORIZATION, USER_AGENT};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use std::net::SocketAddr;

use super::AppState;
use crate::contact::client_ip;
use crate::error::{AppError, Result};
use crate::types::{Actor, Role};

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Caller identified by a valid bearer token.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub actor: Actor,
    pub email: String,
}

impl CurrentUser {
    pub fn id(&self) -> i64 {
        self.actor.user_id
    }

    /// The actor, when its role is one of `roles`.
    pub fn require(&self, roles: &[Role]) -> Result<Actor> {
        if roles.contains(&self.actor.role) {
            Ok(self.actor)
        } else {
            Err(AppError::Forbidden("Access denied".to_string()))
        }
    }

    pub fn require_admin(&self) -> Result<Actor> {
        self.require(&[Role::Admin])
    }

    /// The caller is `user_id` or an admin.
    pub fn require_self_or_admin(&self, user_id: i64) -> Result<Actor> {
        if self.actor.can_act_for(user_id) {
            Ok(self.actor)
        } else {
            Err(AppError::Forbidden("Access denied".to_string()))
        }
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;
        let claims = state.auth.authenticate(token)?;
        Ok(CurrentUser {
            actor: Actor {
                user_id: claims.sub,
                role: claims.role,
            },
            email: claims.email,
        })
    }
}

/// Where a request came from, for the contact inbox.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for ClientMeta
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        let header = |name: &str| parts.headers.get(name).and_then(|v| v.to_str().ok());
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        Ok(ClientMeta {
            ip: client_ip(header("x-forwarded-for"), header("x-real-ip"), peer),
            user_agent: parts
                .headers
                .get(USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_role_guards() {
        let user = CurrentUser {
            actor: Actor {
                user_id: 5,
                role: Role::Student,
            },
            email: "s@example.lk".into(),
        };
        assert!(user.require(&[Role::Student]).is_ok());
        assert!(matches!(user.require_admin(), Err(AppError::Forbidden(_))));
        assert!(user.require_self_or_admin(5).is_ok());
        assert!(user.require_self_or_admin(6).is_err());
    }
}
