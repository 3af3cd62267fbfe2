use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;

use crate::error::{UserError, UserResult};
use crate::models::{Role, User};

/// Sea-ORM Entity for the users table
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(column_type = "Text")]
    pub email: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub password_hash: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub nickname: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub avatar_url: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub role: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub oauth_provider: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub oauth_id: Option<String>,
    pub is_active: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub deleted_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Converts a row into the domain account, keeping `password_hash` only
    /// when asked to.
    pub fn into_user(self, with_password: bool) -> UserResult<User> {
        let role: Role = self.role.parse().map_err(|_| {
            UserError::Internal(format!("user {} has unknown role '{}'", self.id, self.role))
        })?;

        Ok(User {
            id: self.id,
            email: self.email,
            password_hash: if with_password { self.password_hash } else { None },
            nickname: self.nickname,
            avatar_url: self.avatar_url,
            role,
            oauth_provider: self.oauth_provider,
            oauth_id: self.oauth_id,
            is_active: self.is_active,
            created_at: self.created_at.into(),
            updated_at: self.updated_at.into(),
            deleted_at: self.deleted_at.map(Into::into),
        })
    }
}

impl From<User> for ActiveModel {
    fn from(user: User) -> Self {
        ActiveModel {
            id: Set(user.id),
            email: Set(user.email),
            password_hash: Set(user.password_hash),
            nickname: Set(user.nickname),
            avatar_url: Set(user.avatar_url),
            role: Set(user.role.to_string()),
            oauth_provider: Set(user.oauth_provider),
            oauth_id: Set(user.oauth_id),
            is_active: Set(user.is_active),
            created_at: Set(user.created_at.into()),
            updated_at: Set(user.updated_at.into()),
            deleted_at: Set(user.deleted_at.map(Into::into)),
        }
    }
}
