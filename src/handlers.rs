use axum::{
    async_trait,
    extract::{
        multipart::Multipart,
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequestParts, Path, Query, State,
    },
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde_json::json;

use crate::app::meetups::{CreateMeetup, ListQuery, UpdateMeetup};
use crate::app::sessions::{LoginRequest, SessionResponse};
use crate::app::subscriptions::SubscribeRequest;
use crate::app::users::{RegisterUser, UpdateUser};
use crate::auth;
use crate::domain::{FileView, MeetupView, Subscription, SubscriptionView, UserSummary};
use crate::error::{AppError, Result};
use crate::state::AppState;

/// The signed-in user, resolved from the bearer token
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub i64);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        let token = auth::bearer_token(header)?;
        let user_id = state.sessions().authenticate(token, Utc::now()).await?;
        Ok(AuthUser(user_id))
    }
}

/// Malformed bodies and queries surface as validation failures
fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload.map(|Json(value)| value).map_err(|e| {
        tracing::debug!("Rejected JSON body: {}", e);
        AppError::validation()
    })
}

fn path<T>(id: std::result::Result<Path<T>, PathRejection>) -> Result<T> {
    id.map(|Path(value)| value).map_err(|e| {
        tracing::debug!("Rejected path parameter: {}", e);
        AppError::validation()
    })
}

fn query<T>(params: std::result::Result<Query<T>, QueryRejection>) -> Result<T> {
    params.map(|Query(value)| value).map_err(|e| {
        tracing::debug!("Rejected query string: {}", e);
        AppError::validation()
    })
}

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "meetapp",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed".to_string()),
    }
}

pub async fn register_user(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RegisterUser>, JsonRejection>,
) -> Result<Json<UserSummary>> {
    let input = body(payload)?;
    Ok(Json(state.users().register(input).await?))
}

pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: std::result::Result<Json<UpdateUser>, JsonRejection>,
) -> Result<Json<UserSummary>> {
    let input = body(payload)?;
    Ok(Json(state.users().update(user_id, input).await?))
}

pub async fn create_session(
    State(state): State<AppState>,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<SessionResponse>> {
    let input = body(payload)?;
    Ok(Json(state.sessions().login(input, Utc::now()).await?))
}

pub async fn upload_file(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    mut multipart: Multipart,
) -> Result<Json<FileView>> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::debug!("Rejected multipart body: {}", e);
        AppError::validation()
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or("upload").to_string();
        let bytes = field.bytes().await.map_err(|_| AppError::validation())?;
        return Ok(Json(state.files().store(&name, &bytes).await?));
    }
    Err(AppError::validation())
}

pub async fn list_meetups(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    params: std::result::Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Vec<MeetupView>>> {
    let params = query(params)?;
    Ok(Json(state.meetups().list(params, Utc::now()).await?))
}

pub async fn show_meetup(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
    id: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<MeetupView>> {
    let id = path(id)?;
    Ok(Json(state.meetups().show(id, Utc::now()).await?))
}

pub async fn create_meetup(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: std::result::Result<Json<CreateMeetup>, JsonRejection>,
) -> Result<Json<MeetupView>> {
    let input = body(payload)?;
    Ok(Json(state.meetups().create(user_id, input, Utc::now()).await?))
}

pub async fn update_meetup(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    id: std::result::Result<Path<i64>, PathRejection>,
    payload: std::result::Result<Json<UpdateMeetup>, JsonRejection>,
) -> Result<Json<MeetupView>> {
    let id = path(id)?;
    let input = body(payload)?;
    Ok(Json(state.meetups().update(user_id, id, input, Utc::now()).await?))
}

pub async fn delete_meetup(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    id: std::result::Result<Path<i64>, PathRejection>,
) -> Result<StatusCode> {
    let id = path(id)?;
    state.meetups().delete(user_id, id, Utc::now()).await?;
    Ok(StatusCode::OK)
}

pub async fn organizing(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<MeetupView>>> {
    Ok(Json(state.meetups().organizing(user_id, Utc::now()).await?))
}

pub async fn subscribe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: std::result::Result<Json<SubscribeRequest>, JsonRejection>,
) -> Result<Json<Subscription>> {
    let input = body(payload)?;
    Ok(Json(state.subscriptions().subscribe(user_id, input, Utc::now()).await?))
}

pub async fn list_subscriptions(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<SubscriptionView>>> {
    Ok(Json(state.subscriptions().upcoming(user_id, Utc::now()).await?))
}

pub async fn unsubscribe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    id: std::result::Result<Path<i64>, PathRejection>,
) -> Result<StatusCode> {
    let id = path(id)?;
    state.subscriptions().unsubscribe(user_id, id).await?;
    Ok(StatusCode::OK)
}
