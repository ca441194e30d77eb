// src/session.rs
use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::calendar::now_millis;
use crate::error::AppError;
use crate::models::{Role, UserDoc};
use crate::permissions::{has_permission, Permission};
use crate::routes::AppState;

const TOKEN_LENGTH: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl From<&UserDoc> for SessionUser {
    fn from(user: &UserDoc) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            avatar: user.avatar.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub user: SessionUser,
    pub created_at: i64,
}

impl Session {
    pub fn new(user: SessionUser) -> Self {
        let token: String = thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LENGTH)
            .map(char::from)
            .collect();
        Self {
            token,
            user,
            created_at: now_millis(),
        }
    }

    pub fn can(&self, permission: Permission) -> bool {
        has_permission(self.user.role, permission)
    }

    pub fn require(&self, permission: Permission) -> Result<(), AppError> {
        if self.can(permission) {
            Ok(())
        } else {
            debug!(
                "User {} ({}) lacks {}",
                self.user.id, self.user.role, permission
            );
            Err(AppError::Forbidden(permission))
        }
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, token: &str) -> Option<Session>;
    async fn set(&self, session: Session);
    /// Returns whether a session was removed.
    async fn clear(&self, token: &str) -> bool;
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, token: &str) -> Option<Session> {
        self.sessions.lock().await.get(token).cloned()
    }

    async fn set(&self, session: Session) {
        self.sessions
            .lock()
            .await
            .insert(session.token.clone(), session);
    }

    async fn clear(&self, token: &str) -> bool {
        self.sessions.lock().await.remove(token).is_some()
    }
}

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Resolves the bearer token to a session and hands it to handlers as an extension.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&request)
        .map(str::to_string)
        .ok_or(AppError::Unauthorized)?;
    let session = state
        .sessions
        .get(&token)
        .await
        .ok_or(AppError::Unauthorized)?;

    debug!(
        "Authenticated {} for {} {}",
        session.user.id,
        request.method(),
        request.uri().path()
    );
    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

/// Creates and stores a session for a freshly authenticated user.
pub async fn open_session(store: &dyn SessionStore, user: &UserDoc) -> Session {
    let session = Session::new(SessionUser::from(user));
    store.set(session.clone()).await;
    info!("Opened session for user {}", user.id);
    session
}
