use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Form, Json,
};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::auth::{
    hash_password, new_access_token, normalize_email, sweep_expired_tokens, validate_email,
    validate_password, verify_password, CurrentUser, Superuser,
};
use crate::error::{
    ApiError, ApiResult, LOGIN_BAD_CREDENTIALS, REGISTER_USER_ALREADY_EXISTS,
    UPDATE_USER_EMAIL_ALREADY_EXISTS,
};
use crate::models::{
    AdminUserUpdate, ArticleQuery, ArticleRecord, LoginForm, TokenResponse, User, UserChanges,
    UserCreate, UserRead, UserUpdate,
};
use crate::repositories::RepositoryError;
use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "title": state.settings.title,
        "version": state.settings.version,
    }))
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<UserCreate>,
) -> ApiResult<(StatusCode, Json<UserRead>)> {
    let email = normalize_email(&body.email);
    validate_email(&email)?;
    validate_password(&body.password)?;

    let user = state
        .users
        .create_user(&email, &hash_password(&body.password)?)
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => ApiError::bad_request(REGISTER_USER_ALREADY_EXISTS),
            other => other.into(),
        })?;

    info!("User {} has registered", user.id);
    Ok((StatusCode::CREATED, Json(UserRead::from(&user))))
}

pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> ApiResult<Json<TokenResponse>> {
    let email = normalize_email(&form.username);

    let user = state
        .users
        .get_user_by_email(&email)
        .await?
        .filter(|user| user.is_active && verify_password(&form.password, &user.hashed_password))
        .ok_or_else(|| ApiError::bad_request(LOGIN_BAD_CREDENTIALS))?;

    sweep_expired_tokens(state.users.as_ref(), state.settings.token_lifetime_seconds).await?;

    let token = new_access_token(user.id);
    state.users.create_token(&token).await?;

    info!("User {} logged in", user.id);
    Ok(Json(TokenResponse::bearer(token.token)))
}

pub async fn logout(current: CurrentUser, State(state): State<AppState>) -> ApiResult<StatusCode> {
    state.users.delete_token(&current.token).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_me(current: CurrentUser) -> Json<UserRead> {
    Json(UserRead::from(&current.user))
}

pub async fn update_me(
    current: CurrentUser,
    State(state): State<AppState>,
    Json(body): Json<UserUpdate>,
) -> ApiResult<Json<UserRead>> {
    let changes = user_changes(body.email, body.password)?;
    let user = apply_changes(&state, current.user.id, changes).await?;
    Ok(Json(UserRead::from(&user)))
}

pub async fn get_user(
    _admin: Superuser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UserRead>> {
    let user = state
        .users
        .get_user(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(UserRead::from(&user)))
}

pub async fn update_user(
    _admin: Superuser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<AdminUserUpdate>,
) -> ApiResult<Json<UserRead>> {
    let changes = UserChanges {
        is_active: body.is_active,
        is_superuser: body.is_superuser,
        is_verified: body.is_verified,
        ..user_changes(body.email, body.password)?
    };
    let user = apply_changes(&state, id, changes).await?;
    Ok(Json(UserRead::from(&user)))
}

pub async fn delete_user(
    _admin: Superuser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !state.users.delete_user(id).await? {
        return Err(ApiError::not_found("User not found"));
    }
    info!("User {} deleted", id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_articles(
    _current: CurrentUser,
    State(state): State<AppState>,
    Query(query): Query<ArticleQuery>,
) -> ApiResult<Json<Vec<ArticleRecord>>> {
    let articles = state
        .articles
        .list_articles(query.limit(), query.offset(), query.tag())
        .await?;
    Ok(Json(articles))
}

pub async fn get_article(
    _current: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ArticleRecord>> {
    let article = state
        .articles
        .get_article(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Article not found"))?;
    Ok(Json(article))
}

fn user_changes(email: Option<String>, password: Option<String>) -> ApiResult<UserChanges> {
    let email = match email {
        Some(email) => {
            let email = normalize_email(&email);
            validate_email(&email)?;
            Some(email)
        }
        None => None,
    };
    let hashed_password = match password {
        Some(password) => {
            validate_password(&password)?;
            Some(hash_password(&password)?)
        }
        None => None,
    };

    Ok(UserChanges {
        email,
        hashed_password,
        ..UserChanges::default()
    })
}

async fn apply_changes(
    state: &AppState,
    id: Uuid,
    changes: UserChanges,
) -> ApiResult<User> {
    state
        .users
        .update_user(id, changes)
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => ApiError::bad_request(UPDATE_USER_EMAIL_ALREADY_EXISTS),
            other => other.into(),
        })?
        .ok_or_else(|| ApiError::not_found("User not found"))
}
