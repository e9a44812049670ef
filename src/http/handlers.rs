use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::auth::AuthService;
use crate::app::notifications::{clamp_limit, ListFilter, NotificationService};
use crate::domain::notification::{Notification, NotificationType};
use crate::domain::user::User;
use crate::http::{AppError, AuthUser};
use crate::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db = state.db.ping().await.is_ok();
    let redis = state.cache.ping().await.is_ok();
    let status = if db && redis { "ok" } else { "degraded" };

    Json(HealthResponse { status })
}

// ---------------------------------------------------------------------------
// Accounts & auth
// ---------------------------------------------------------------------------

fn auth_service(state: &AppState) -> AuthService {
    AuthService::new(
        state.db.clone(),
        state.paseto_access_key,
        state.paseto_refresh_key,
        state.access_ttl_minutes,
        state.refresh_ttl_days,
    )
}

#[derive(Deserialize)]
pub struct SignupRequest {
    pub handle: String,
    pub email: String,
    pub display_name: String,
    pub password: String,
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(body): Json<SignupRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    if body.handle.trim().is_empty() || body.email.trim().is_empty() {
        return Err(AppError::bad_request("handle and email are required"));
    }
    if body.password.len() < 8 {
        return Err(AppError::bad_request("password must be at least 8 characters"));
    }

    let display_name = if body.display_name.trim().is_empty() {
        body.handle.clone()
    } else {
        body.display_name
    };

    let user = auth_service(&state)
        .signup(body.handle, body.email, display_name, body.password)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                AppError::conflict("handle or email already taken")
            } else {
                tracing::error!(error = ?err, "failed to create user");
                AppError::internal("failed to create user")
            }
        })?;

    Ok((StatusCode::CREATED, Json(user)))
}

fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|err| err.as_database_error())
        .map_or(false, |db_err| db_err.is_unique_violation())
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub access_expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub refresh_expires_at: OffsetDateTime,
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let tokens = auth_service(&state)
        .login(&body.identifier, &body.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "login failed");
            AppError::internal("login failed")
        })?
        .ok_or_else(|| AppError::unauthorized("invalid credentials"))?;

    Ok(Json(TokenResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        access_expires_at: tokens.access_expires_at,
        refresh_expires_at: tokens.refresh_expires_at,
    }))
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let tokens = auth_service(&state)
        .refresh(&body.refresh_token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "token refresh failed");
            AppError::internal("token refresh failed")
        })?
        .ok_or_else(|| AppError::unauthorized("invalid refresh token"))?;

    Ok(Json(TokenResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        access_expires_at: tokens.access_expires_at,
        refresh_expires_at: tokens.refresh_expires_at,
    }))
}

pub async fn revoke_token(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<StatusCode, AppError> {
    auth_service(&state)
        .revoke_refresh_token(&body.refresh_token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "token revoke failed");
            AppError::internal("token revoke failed")
        })?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_current_user(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<User>, AppError> {
    let user = auth_service(&state)
        .get_current_user(auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to load user");
            AppError::internal("failed to load user")
        })?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    Ok(Json(user))
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct NotificationListQuery {
    pub unread: Option<bool>,
    #[serde(rename = "type")]
    pub notification_type: Option<String>,
    pub since: Option<String>,
    pub before: Option<String>,
    pub limit: Option<i64>,
    pub cursor: Option<String>,
    pub page: Option<i64>,
}

#[derive(Serialize)]
pub struct NotificationListResponse {
    pub items: Vec<Notification>,
    pub next_cursor: Option<String>,
    pub next_page: Option<i64>,
    pub has_more: bool,
}

fn parse_cursor(cursor: Option<String>) -> Result<Option<(OffsetDateTime, Uuid)>, AppError> {
    let Some(cursor) = cursor else {
        return Ok(None);
    };

    let mut parts = cursor.splitn(2, '/');
    let timestamp = parts
        .next()
        .ok_or_else(|| AppError::bad_request("invalid cursor"))?;
    let id = parts
        .next()
        .ok_or_else(|| AppError::bad_request("invalid cursor"))?;

    let timestamp = OffsetDateTime::parse(timestamp, &Rfc3339)
        .map_err(|_| AppError::bad_request("invalid cursor"))?;
    let id = Uuid::parse_str(id).map_err(|_| AppError::bad_request("invalid cursor"))?;

    Ok(Some((timestamp, id)))
}

fn encode_cursor(cursor: Option<(OffsetDateTime, Uuid)>) -> Option<String> {
    let (timestamp, id) = cursor?;
    let timestamp = timestamp.format(&Rfc3339).ok()?;
    Some(format!("{}/{}", timestamp, id))
}

fn parse_timestamp(value: Option<String>, field: &str) -> Result<Option<OffsetDateTime>, AppError> {
    match value {
        Some(raw) => OffsetDateTime::parse(&raw, &Rfc3339)
            .map(Some)
            .map_err(|_| AppError::bad_request(format!("invalid {}: expected RFC 3339", field))),
        None => Ok(None),
    }
}

fn build_filter(query: &NotificationListQuery) -> Result<ListFilter, AppError> {
    let notification_type = match query.notification_type.as_deref() {
        Some(raw) => Some(
            NotificationType::parse(raw)
                .ok_or_else(|| AppError::bad_request("unknown notification type"))?,
        ),
        None => None,
    };

    Ok(ListFilter {
        unread_only: query.unread.unwrap_or(false),
        notification_type,
        since: parse_timestamp(query.since.clone(), "since")?,
        before: parse_timestamp(query.before.clone(), "before")?,
    })
}

pub async fn list_notifications(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<NotificationListQuery>,
) -> Result<Json<NotificationListResponse>, AppError> {
    if query.cursor.is_some() && query.page.is_some() {
        return Err(AppError::bad_request("cursor and page are mutually exclusive"));
    }

    let filter = build_filter(&query)?;
    let limit = clamp_limit(query.limit);
    let service = NotificationService::new(state.db.clone());

    if let Some(page) = query.page {
        if page < 0 {
            return Err(AppError::bad_request("page must be non-negative"));
        }
        let result = service
            .list_page(auth.user_id, &filter, page, limit)
            .await
            .map_err(|err| {
                tracing::error!(error = ?err, user_id = %auth.user_id, "failed to list notifications");
                AppError::internal("failed to list notifications")
            })?;

        return Ok(Json(NotificationListResponse {
            items: result.items,
            next_cursor: None,
            next_page: result.next_page,
            has_more: result.has_more,
        }));
    }

    let cursor = parse_cursor(query.cursor)?;
    let result = service
        .list(auth.user_id, &filter, cursor, limit)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to list notifications");
            AppError::internal("failed to list notifications")
        })?;

    Ok(Json(NotificationListResponse {
        items: result.items,
        next_cursor: encode_cursor(result.next_cursor),
        next_page: None,
        has_more: result.has_more,
    }))
}

#[derive(Serialize)]
pub struct UnreadCountResponse {
    pub unread: i64,
}

pub async fn unread_count(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UnreadCountResponse>, AppError> {
    let service = NotificationService::new(state.db.clone());
    let unread = service.count_unread(auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %auth.user_id, "failed to count unread");
        AppError::internal("failed to count unread notifications")
    })?;

    Ok(Json(UnreadCountResponse { unread }))
}

pub async fn mark_notification_read(
    auth: AuthUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = NotificationService::new(state.db.clone());
    let updated = service
        .mark_read(id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, notification_id = %id, user_id = %auth.user_id, "failed to mark notification read");
            AppError::internal("failed to mark notification read")
        })?;

    if updated {
        Ok(StatusCode::NO_CONTENT)
    } else {
        // Missing and not-owned look identical on purpose.
        Err(AppError::not_found("notification not found"))
    }
}

pub async fn mark_all_notifications_read(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = NotificationService::new(state.db.clone());
    let updated = service.mark_all_read(auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %auth.user_id, "failed to mark all read");
        AppError::internal("failed to mark notifications read")
    })?;

    tracing::debug!(user_id = %auth.user_id, updated, "marked all notifications read");
    Ok(StatusCode::NO_CONTENT)
}
