use axum::{
    Json, Router,
    extract::{FromRequestParts, State},
    http::{StatusCode, request::Parts},
    response::IntoResponse,
    routing::{get, post, put},
};
use axum_helpers::{AppError, UuidPath, ValidatedJson, ValidatedQuery, extract_bearer_token};

use crate::auth::AuthService;
use crate::authorization::{Operation, authorize_operation};
use crate::error::{UserError, UserResult};
use crate::models::{
    AuthResponse, ChangePassword, ListUsersQuery, LoginRequest, PaginatedUsers, RefreshRequest,
    RegisterRequest, UpdateProfile, UpdateRoleRequest, User, UserResponse,
};
use crate::repository::UserRepository;
use crate::service::UserService;

/// Shared state for the accounts routes
pub struct UsersState<R: UserRepository> {
    pub auth: AuthService<R>,
    pub users: UserService<R>,
}

impl<R: UserRepository> Clone for UsersState<R> {
    fn clone(&self) -> Self {
        Self {
            auth: self.auth.clone(),
            users: self.users.clone(),
        }
    }
}

/// Authenticated caller, resolved from `Authorization: Bearer <access token>`
pub struct CurrentUser(pub User);

impl<R: UserRepository + 'static> FromRequestParts<UsersState<R>> for CurrentUser {
    type Rejection = UserError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &UsersState<R>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)
            .ok_or_else(|| UserError::Unauthorized("Missing bearer token".to_string()))?;

        let user = state.auth.authenticate(token).await?;
        Ok(CurrentUser(user))
    }
}

/// Create the accounts router: `/auth/*` and `/users/*`
pub fn router<R: UserRepository + 'static>(state: UsersState<R>) -> Router {
    Router::new()
        .route("/auth/register", post(register::<R>))
        .route("/auth/login", post(login::<R>))
        .route("/auth/refresh", post(refresh::<R>))
        .route("/auth/logout", post(logout))
        .route("/users", get(list_users::<R>))
        .route("/users/me", get(get_profile::<R>).put(update_profile::<R>))
        .route("/users/me/change-password", post(change_password::<R>))
        .route("/users/{id}", get(get_user::<R>).delete(delete_user::<R>))
        .route("/users/{id}/role", put(update_user_role::<R>))
        .route("/users/{id}/activate", post(activate_user::<R>))
        .route("/users/{id}/deactivate", post(deactivate_user::<R>))
        .with_state(state)
}

/// Register a new account
///
/// POST /auth/register
async fn register<R: UserRepository>(
    State(state): State<UsersState<R>>,
    ValidatedJson(input): ValidatedJson<RegisterRequest>,
) -> UserResult<impl IntoResponse> {
    let user = state.auth.register(input).await?;
    let tokens = state.auth.issue_tokens(&user).await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse::new(user.without_password(), tokens)),
    ))
}

/// POST /auth/login
async fn login<R: UserRepository>(
    State(state): State<UsersState<R>>,
    ValidatedJson(input): ValidatedJson<LoginRequest>,
) -> UserResult<Json<AuthResponse>> {
    let user = state.auth.login(input).await?;
    let tokens = state.auth.issue_tokens(&user).await?;
    Ok(Json(AuthResponse::new(user, tokens)))
}

/// Exchange a refresh token for a new pair
///
/// POST /auth/refresh
///
/// Every failure answers 401 so callers cannot probe why a token was refused.
async fn refresh<R: UserRepository>(
    State(state): State<UsersState<R>>,
    ValidatedJson(input): ValidatedJson<RefreshRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    match state.auth.refresh(&input.refresh_token).await {
        Ok((user, tokens)) => Ok(Json(AuthResponse::new(user, tokens))),
        Err(e) => {
            if !matches!(e, UserError::InvalidToken) {
                tracing::warn!(error = %e, "Refresh failed");
            }
            Err(AppError::Unauthorized("Invalid refresh token".to_string()))
        }
    }
}

/// POST /auth/logout
///
/// Tokens are stateless; nothing is revoked.
async fn logout(CurrentUser(caller): CurrentUser) -> UserResult<StatusCode> {
    authorize_operation(&caller, Operation::Logout)?;
    tracing::info!(user_id = %caller.id, "User logged out");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /users/me
async fn get_profile<R: UserRepository>(
    State(state): State<UsersState<R>>,
    CurrentUser(caller): CurrentUser,
) -> UserResult<Json<UserResponse>> {
    authorize_operation(&caller, Operation::GetOwnProfile)?;
    let user = state.users.get_profile(caller.id).await?;
    Ok(Json(user.into()))
}

/// PUT /users/me
async fn update_profile<R: UserRepository>(
    State(state): State<UsersState<R>>,
    CurrentUser(caller): CurrentUser,
    ValidatedJson(input): ValidatedJson<UpdateProfile>,
) -> UserResult<Json<UserResponse>> {
    authorize_operation(&caller, Operation::UpdateOwnProfile)?;
    let user = state.users.update_profile(caller.id, input).await?;
    Ok(Json(user.into()))
}

/// POST /users/me/change-password
async fn change_password<R: UserRepository>(
    State(state): State<UsersState<R>>,
    CurrentUser(caller): CurrentUser,
    ValidatedJson(input): ValidatedJson<ChangePassword>,
) -> UserResult<StatusCode> {
    authorize_operation(&caller, Operation::ChangeOwnPassword)?;
    state.users.change_password(caller.id, input).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List accounts (admin, moderator)
///
/// GET /users?page=1&limit=10&search=ali&role=user&is_active=true
async fn list_users<R: UserRepository>(
    State(state): State<UsersState<R>>,
    CurrentUser(caller): CurrentUser,
    ValidatedQuery(query): ValidatedQuery<ListUsersQuery>,
) -> UserResult<Json<PaginatedUsers>> {
    authorize_operation(&caller, Operation::ListUsers)?;

    let page = state.users.list_users(query).await?;
    Ok(Json(page))
}

/// Get an account by ID (admin, moderator)
///
/// GET /users/{id}
async fn get_user<R: UserRepository>(
    State(state): State<UsersState<R>>,
    CurrentUser(caller): CurrentUser,
    UuidPath(id): UuidPath,
) -> UserResult<Json<UserResponse>> {
    authorize_operation(&caller, Operation::GetUser)?;
    let user = state.users.get_user(id).await?;
    Ok(Json(user.into()))
}

/// PUT /users/{id}/role
async fn update_user_role<R: UserRepository>(
    State(state): State<UsersState<R>>,
    CurrentUser(caller): CurrentUser,
    UuidPath(id): UuidPath,
    ValidatedJson(input): ValidatedJson<UpdateRoleRequest>,
) -> UserResult<Json<UserResponse>> {
    authorize_operation(&caller, Operation::UpdateUserRole)?;
    let user = state.users.update_user_role(id, &input.role).await?;
    Ok(Json(user.into()))
}

/// POST /users/{id}/activate
async fn activate_user<R: UserRepository>(
    State(state): State<UsersState<R>>,
    CurrentUser(caller): CurrentUser,
    UuidPath(id): UuidPath,
) -> UserResult<Json<UserResponse>> {
    authorize_operation(&caller, Operation::ActivateUser)?;
    let user = state.users.activate_user(id).await?;
    Ok(Json(user.into()))
}

/// POST /users/{id}/deactivate
async fn deactivate_user<R: UserRepository>(
    State(state): State<UsersState<R>>,
    CurrentUser(caller): CurrentUser,
    UuidPath(id): UuidPath,
) -> UserResult<Json<UserResponse>> {
    authorize_operation(&caller, Operation::DeactivateUser)?;
    let user = state.users.deactivate_user(id).await?;
    Ok(Json(user.into()))
}

/// Soft-delete an account
///
/// DELETE /users/{id}
async fn delete_user<R: UserRepository>(
    State(state): State<UsersState<R>>,
    CurrentUser(caller): CurrentUser,
    UuidPath(id): UuidPath,
) -> UserResult<StatusCode> {
    authorize_operation(&caller, Operation::DeleteUser)?;
    state.users.delete_user(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
