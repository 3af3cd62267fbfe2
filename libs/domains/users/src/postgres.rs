use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, SqlErr,
};
use uuid::Uuid;

use crate::{
    entity,
    error::{UniqueField, UserError, UserResult},
    models::{User, UserFilter, UserPatch, normalize_email},
    repository::UserRepository,
};

/// Postgres-backed account storage.
///
/// Uniqueness comes from the partial indexes on `lower(email)` and
/// `nickname`, both scoped to `deleted_at IS NULL`.
#[derive(Clone)]
pub struct PgUserRepository {
    db: DatabaseConnection,
}

impl PgUserRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn live() -> Select<entity::Entity> {
        entity::Entity::find().filter(entity::Column::DeletedAt.is_null())
    }

    async fn find_one(
        &self,
        query: Select<entity::Entity>,
        with_password: bool,
    ) -> UserResult<Option<User>> {
        query
            .one(&self.db)
            .await?
            .map(|model| model.into_user(with_password))
            .transpose()
    }
}

/// Which account column a unique-violation message points at.
///
/// Postgres reports `duplicate key value violates unique constraint "<name>"`;
/// the constraint name is matched, and anything that is not an email or
/// nickname index yields `None`.
fn violated_field(message: &str) -> Option<UniqueField> {
    let constraint = message.split('"').nth(1).unwrap_or(message);

    if constraint.contains("nickname") {
        Some(UniqueField::Nickname)
    } else if constraint.contains("email") {
        Some(UniqueField::Email)
    } else {
        None
    }
}

/// Maps an email or nickname unique violation to `Conflict`; every other
/// error is a storage failure.
fn map_write_err(err: DbErr, email: Option<&str>, nickname: Option<&str>) -> UserError {
    let field = match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(message)) => violated_field(&message),
        _ => None,
    };

    match field {
        Some(UniqueField::Email) => UserError::conflict(UniqueField::Email, email.unwrap_or_default()),
        Some(UniqueField::Nickname) => {
            UserError::conflict(UniqueField::Nickname, nickname.unwrap_or_default())
        }
        None => err.into(),
    }
}

/// `LIKE` pattern for a case-insensitive substring search
fn like_pattern(search: &str) -> String {
    let escaped = search
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn apply_filter(mut query: Select<entity::Entity>, filter: &UserFilter) -> Select<entity::Entity> {
    if let Some(ref search) = filter.search {
        let pattern = like_pattern(search);
        query = query.filter(Expr::cust_with_values(
            "(lower(email) LIKE $1 OR lower(nickname) LIKE $2)",
            [pattern.clone(), pattern],
        ));
    }

    if let Some(role) = filter.role {
        query = query.filter(entity::Column::Role.eq(role.to_string()));
    }

    if let Some(is_active) = filter.is_active {
        query = query.filter(entity::Column::IsActive.eq(is_active));
    }

    query
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: Uuid) -> UserResult<Option<User>> {
        self.find_one(Self::live().filter(entity::Column::Id.eq(id)), false)
            .await
    }

    async fn find_credential_by_id(&self, id: Uuid) -> UserResult<Option<User>> {
        self.find_one(Self::live().filter(entity::Column::Id.eq(id)), true)
            .await
    }

    async fn find_by_email(&self, email: &str) -> UserResult<Option<User>> {
        let query = Self::live().filter(entity::Column::Email.eq(normalize_email(email)));
        self.find_one(query, false).await
    }

    async fn find_credential_by_email(&self, email: &str) -> UserResult<Option<User>> {
        let query = Self::live().filter(entity::Column::Email.eq(normalize_email(email)));
        self.find_one(query, true).await
    }

    async fn find_by_nickname(&self, nickname: &str) -> UserResult<Option<User>> {
        let query = Self::live().filter(entity::Column::Nickname.eq(nickname));
        self.find_one(query, false).await
    }

    async fn find_by_oauth(&self, provider: &str, oauth_id: &str) -> UserResult<Option<User>> {
        let query = Self::live()
            .filter(entity::Column::OauthProvider.eq(provider))
            .filter(entity::Column::OauthId.eq(oauth_id));
        self.find_one(query, false).await
    }

    async fn list(&self, filter: UserFilter) -> UserResult<(Vec<User>, u64)> {
        let query = apply_filter(Self::live(), &filter);

        let total = query.clone().count(&self.db).await?;

        let models = query
            .order_by_desc(entity::Column::CreatedAt)
            .order_by_desc(entity::Column::Id)
            .limit(filter.limit)
            .offset(filter.offset)
            .all(&self.db)
            .await?;

        let users = models
            .into_iter()
            .map(|m| m.into_user(false))
            .collect::<UserResult<Vec<_>>>()?;

        Ok((users, total))
    }

    async fn create(&self, mut user: User) -> UserResult<User> {
        user.email = normalize_email(&user.email);
        let email = user.email.clone();
        let nickname = user.nickname.clone();

        let active_model: entity::ActiveModel = user.into();
        let model = active_model
            .insert(&self.db)
            .await
            .map_err(|e| map_write_err(e, Some(&email), Some(&nickname)))?;

        tracing::info!(user_id = %model.id, email = %model.email, "Created user");
        model.into_user(true)
    }

    async fn update(&self, id: Uuid, patch: UserPatch) -> UserResult<User> {
        let nickname = patch.nickname.clone();
        let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();

        let mut update = entity::Entity::update_many()
            .col_expr(entity::Column::UpdatedAt, Expr::value(now));
        if let Some(nickname) = patch.nickname {
            update = update.col_expr(entity::Column::Nickname, Expr::value(nickname));
        }
        if let Some(avatar_url) = patch.avatar_url {
            update = update.col_expr(entity::Column::AvatarUrl, Expr::value(avatar_url));
        }
        if let Some(role) = patch.role {
            update = update.col_expr(entity::Column::Role, Expr::value(role.to_string()));
        }
        if let Some(is_active) = patch.is_active {
            update = update.col_expr(entity::Column::IsActive, Expr::value(is_active));
        }
        if let Some(hash) = patch.password_hash {
            update = update.col_expr(entity::Column::PasswordHash, Expr::value(hash));
        }

        // Tombstoned rows are never written
        let result = update
            .filter(entity::Column::Id.eq(id))
            .filter(entity::Column::DeletedAt.is_null())
            .exec(&self.db)
            .await
            .map_err(|e| map_write_err(e, None, nickname.as_deref()))?;

        if result.rows_affected == 0 {
            return Err(UserError::NotFound(id));
        }

        tracing::info!(user_id = %id, "Updated user");
        self.find_by_id(id).await?.ok_or(UserError::NotFound(id))
    }

    async fn soft_delete(&self, id: Uuid) -> UserResult<()> {
        let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();

        let result = entity::Entity::update_many()
            .col_expr(entity::Column::DeletedAt, Expr::value(Some(now)))
            .col_expr(entity::Column::UpdatedAt, Expr::value(now))
            .filter(entity::Column::Id.eq(id))
            .filter(entity::Column::DeletedAt.is_null())
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(UserError::NotFound(id));
        }

        tracing::info!(user_id = %id, "Soft-deleted user");
        Ok(())
    }

    async fn exists_by_email(&self, email: &str) -> UserResult<bool> {
        let count = Self::live()
            .filter(entity::Column::Email.eq(normalize_email(email)))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    async fn exists_by_nickname(&self, nickname: &str) -> UserResult<bool> {
        let count = Self::live()
            .filter(entity::Column::Nickname.eq(nickname))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }
}
