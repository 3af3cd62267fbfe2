use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use strum::{Display, EnumString};
use uuid::Uuid;
use validator::Validate;

/// Nickname charset
static NICKNAME_CHARSET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("nickname pattern is valid"));

fn validate_nickname(nickname: &str) -> Result<(), validator::ValidationError> {
    if !NICKNAME_CHARSET.is_match(nickname) {
        return Err(validator::ValidationError::new("invalid_nickname"));
    }
    Ok(())
}

/// Account roles
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Moderator,
    Admin,
}

/// User account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Always stored lowercase
    pub email: String,
    /// Argon2 PHC string. Only the credential lookups populate it.
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub nickname: String,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub oauth_provider: Option<String>,
    pub oauth_id: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Soft-delete tombstone
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// New active account with role `user`.
    pub fn new(email: &str, nickname: impl Into<String>, password_hash: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            email: normalize_email(email),
            password_hash,
            nickname: nickname.into(),
            avatar_url: None,
            role: Role::User,
            oauth_provider: None,
            oauth_id: None,
            is_active: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_moderator(&self) -> bool {
        self.role == Role::Moderator || self.is_admin()
    }

    pub fn can_moderate(&self) -> bool {
        self.is_moderator()
    }

    /// Accounts linked to an OAuth provider cannot change a password here.
    pub fn is_oauth_linked(&self) -> bool {
        self.oauth_provider.is_some()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Drops the password hash before the value leaves the credential path.
    pub fn without_password(mut self) -> Self {
        self.password_hash = None;
        self
    }

    /// Applies a patch in place and bumps `updated_at`.
    pub fn apply(&mut self, patch: UserPatch) {
        if let Some(nickname) = patch.nickname {
            self.nickname = nickname;
        }
        if let Some(avatar_url) = patch.avatar_url {
            self.avatar_url = Some(avatar_url);
        }
        if let Some(role) = patch.role {
            self.role = role;
        }
        if let Some(is_active) = patch.is_active {
            self.is_active = is_active;
        }
        if let Some(hash) = patch.password_hash {
            self.password_hash = Some(hash);
        }
        self.updated_at = Utc::now();
    }
}

/// Emails compare and store lowercase.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Partial update handed to `UserRepository::update`.
///
/// `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPatch {
    pub nickname: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub password_hash: Option<String>,
}

impl UserPatch {
    pub fn activate() -> Self {
        Self {
            is_active: Some(true),
            ..Default::default()
        }
    }

    pub fn deactivate() -> Self {
        Self {
            is_active: Some(false),
            ..Default::default()
        }
    }

    pub fn role(role: Role) -> Self {
        Self {
            role: Some(role),
            ..Default::default()
        }
    }

    pub fn password(hash: String) -> Self {
        Self {
            password_hash: Some(hash),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Repository-level listing filter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserFilter {
    pub offset: u64,
    pub limit: u64,
    /// Case-insensitive substring over email or nickname
    pub search: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

impl UserFilter {
    pub fn matches(&self, user: &User) -> bool {
        if user.is_deleted() {
            return false;
        }
        if let Some(ref search) = self.search {
            let needle = search.to_lowercase();
            if !user.email.contains(&needle) && !user.nickname.to_lowercase().contains(&needle) {
                return false;
            }
        }
        if let Some(role) = self.role {
            if user.role != role {
                return false;
            }
        }
        if let Some(is_active) = self.is_active {
            if user.is_active != is_active {
                return false;
            }
        }
        true
    }
}

/// Outward account projection (no password hash)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub nickname: String,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub oauth_provider: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            nickname: user.nickname,
            avatar_url: user.avatar_url,
            role: user.role,
            oauth_provider: user.oauth_provider,
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Compact user carried in auth responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub nickname: String,
    pub role: Role,
    pub avatar_url: Option<String>,
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            nickname: user.nickname,
            role: user.role,
            avatar_url: user.avatar_url,
        }
    }
}

/// Signed access/refresh pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Response for register, login and refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: AuthUser,
}

impl AuthResponse {
    pub fn new(user: User, tokens: AuthTokens) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            user: user.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email, length(max = 255))]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(length(min = 3, max = 30), custom(function = "validate_nickname"))]
    pub nickname: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email, length(max = 255))]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateProfile {
    #[validate(length(min = 3, max = 30), custom(function = "validate_nickname"))]
    pub nickname: Option<String>,
    #[validate(url, length(max = 2048))]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChangePassword {
    #[validate(length(min = 1, max = 128))]
    pub current_password: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

/// Role is taken as a raw string; the service rejects unknown values.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateRoleRequest {
    #[validate(length(min = 1, max = 32))]
    pub role: String,
}

/// Query string for `GET /users`
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ListUsersQuery {
    #[validate(range(min = 1))]
    pub page: Option<u64>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u64>,
    #[validate(length(max = 255))]
    pub search: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedUsers {
    pub users: Vec<UserResponse>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}
