use crate::auth;
use crate::domain::{Session, UserSummary};
use crate::error::{AppError, Result};
use crate::storage::Storage;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

pub const USER_NOT_FOUND: &str = "User not found";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResponse {
    pub user: UserSummary,
    pub token: String,
}

pub struct SessionUseCase {
    storage: Arc<dyn Storage>,
    token_ttl: Duration,
}

impl SessionUseCase {
    pub fn new(storage: Arc<dyn Storage>, token_ttl_hours: i64) -> Self {
        Self {
            storage,
            token_ttl: Duration::hours(token_ttl_hours),
        }
    }

    pub async fn login(&self, input: LoginRequest, now: DateTime<Utc>) -> Result<SessionResponse> {
        let (Some(email), Some(password)) = (input.email, input.password) else {
            return Err(AppError::validation());
        };

        let user = self
            .storage
            .find_user_by_email(&email.trim().to_lowercase())
            .await?
            .ok_or_else(|| AppError::unauthorized(USER_NOT_FOUND))?;

        if !auth::verify_password(&user.password_hash, &password) {
            return Err(AppError::unauthorized(crate::app::users::PASSWORD_MISMATCH));
        }

        let token = auth::generate_token();
        self.storage
            .create_session(&Session {
                token_hash: auth::token_digest(&token),
                user_id: user.id,
                expires_at: now + self.token_ttl,
                created_at: now,
            })
            .await?;

        info!("User {} signed in", user.id);
        Ok(SessionResponse {
            user: UserSummary::from(&user),
            token,
        })
    }

    /// Resolve a bearer token to the id of its user
    pub async fn authenticate(&self, token: &str, now: DateTime<Utc>) -> Result<i64> {
        let session = self
            .storage
            .find_session(&auth::token_digest(token))
            .await?
            .ok_or_else(|| AppError::unauthorized(auth::TOKEN_INVALID))?;

        if session.expires_at <= now {
            debug!("Rejected expired session for user {}", session.user_id);
            return Err(AppError::unauthorized(auth::TOKEN_INVALID));
        }
        Ok(session.user_id)
    }
}
