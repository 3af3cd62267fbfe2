use std::sync::Arc;
use uuid::Uuid;

use crate::error::{UniqueField, UserError, UserResult};
use crate::models::{
    ChangePassword, DEFAULT_LIMIT, DEFAULT_PAGE, ListUsersQuery, PaginatedUsers, Role,
    UpdateProfile, User, UserFilter, UserPatch,
};
use crate::password::EncryptService;
use crate::repository::UserRepository;

/// Profile and account-administration use cases
pub struct UserService<R: UserRepository> {
    repository: Arc<R>,
    encrypt: EncryptService,
}

impl<R: UserRepository> Clone for UserService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            encrypt: self.encrypt.clone(),
        }
    }
}

impl<R: UserRepository> UserService<R> {
    pub fn new(repository: Arc<R>, encrypt: EncryptService) -> Self {
        Self {
            repository,
            encrypt,
        }
    }

    async fn require(&self, id: Uuid) -> UserResult<User> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or(UserError::NotFound(id))
    }

    /// Get the caller's own account
    pub async fn get_profile(&self, id: Uuid) -> UserResult<User> {
        self.require(id).await
    }

    /// Get any account (staff view)
    pub async fn get_user(&self, id: Uuid) -> UserResult<User> {
        self.require(id).await
    }

    /// Update nickname and avatar
    pub async fn update_profile(&self, id: Uuid, input: UpdateProfile) -> UserResult<User> {
        let user = self.require(id).await?;

        let nickname = match input.nickname {
            Some(nickname) if nickname != user.nickname => {
                if let Some(owner) = self.repository.find_by_nickname(&nickname).await? {
                    if owner.id != id {
                        return Err(UserError::conflict(UniqueField::Nickname, nickname));
                    }
                }
                Some(nickname)
            }
            _ => None,
        };

        let patch = UserPatch {
            nickname,
            avatar_url: input.avatar_url,
            ..Default::default()
        };
        if patch.is_empty() {
            return Ok(user);
        }

        self.repository.update(id, patch).await
    }

    /// Replace the password after checking the current one.
    ///
    /// OAuth-linked accounts are always refused, whatever passwords are sent.
    pub async fn change_password(&self, id: Uuid, input: ChangePassword) -> UserResult<()> {
        let user = self
            .repository
            .find_credential_by_id(id)
            .await?
            .ok_or(UserError::NotFound(id))?;

        if user.is_oauth_linked() {
            return Err(UserError::Forbidden(
                "Password change is not available for OAuth accounts".to_string(),
            ));
        }

        let current_ok = match user.password_hash.as_deref() {
            Some(hash) => self.encrypt.verify(&input.current_password, hash).await,
            None => false,
        };
        if !current_ok {
            return Err(UserError::Unauthorized(
                "Current password is incorrect".to_string(),
            ));
        }

        let hash = self.encrypt.hash(&input.new_password).await?;
        self.repository.update(id, UserPatch::password(hash)).await?;

        tracing::info!(user_id = %id, "Changed password");
        Ok(())
    }

    /// One page of accounts, newest first
    pub async fn list_users(&self, query: ListUsersQuery) -> UserResult<PaginatedUsers> {
        let page = query.page.unwrap_or(DEFAULT_PAGE).max(1);
        let limit = query.limit.unwrap_or(DEFAULT_LIMIT).max(1);

        // OFFSET is a signed 64-bit value in SQL
        let offset = (page - 1)
            .checked_mul(limit)
            .filter(|offset| i64::try_from(*offset).is_ok())
            .ok_or_else(|| {
                UserError::InvalidArgument(format!("Page {} is out of range", page))
            })?;

        let filter = UserFilter {
            offset,
            limit,
            search: query.search.filter(|s| !s.trim().is_empty()),
            role: query.role,
            is_active: query.is_active,
        };

        let (users, total) = self.repository.list(filter).await?;

        Ok(PaginatedUsers {
            users: users.into_iter().map(Into::into).collect(),
            total,
            page,
            limit,
            total_pages: total.div_ceil(limit),
        })
    }

    /// Set a new role. The account must exist before the value is checked.
    pub async fn update_user_role(&self, id: Uuid, role: &str) -> UserResult<User> {
        self.require(id).await?;

        let role: Role = role
            .parse()
            .map_err(|_| UserError::InvalidArgument(format!("Unknown role '{}'", role)))?;

        let updated = self.repository.update(id, UserPatch::role(role)).await?;
        tracing::info!(user_id = %id, role = %role, "Updated user role");
        Ok(updated)
    }

    pub async fn activate_user(&self, id: Uuid) -> UserResult<User> {
        self.require(id).await?;
        let updated = self.repository.update(id, UserPatch::activate()).await?;
        tracing::info!(user_id = %id, "Activated user");
        Ok(updated)
    }

    pub async fn deactivate_user(&self, id: Uuid) -> UserResult<User> {
        self.require(id).await?;
        let updated = self.repository.update(id, UserPatch::deactivate()).await?;
        tracing::info!(user_id = %id, "Deactivated user");
        Ok(updated)
    }

    /// Soft delete
    pub async fn delete_user(&self, id: Uuid) -> UserResult<()> {
        self.require(id).await?;
        self.repository.soft_delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::test_encrypt_service;
    use crate::repository::{InMemoryUserRepository, MockUserRepository};
    use chrono::{Duration, Utc};
    use std::collections::HashSet;

    struct Fixture {
        service: UserService<InMemoryUserRepository>,
        repo: Arc<InMemoryUserRepository>,
        encrypt: EncryptService,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(InMemoryUserRepository::new());
        let encrypt = test_encrypt_service();
        Fixture {
            service: UserService::new(repo.clone(), encrypt.clone()),
            repo,
            encrypt,
        }
    }

    impl Fixture {
        async fn seed(&self, email: &str, nickname: &str, password: &str) -> User {
            let hash = self.encrypt.hash(password).await.unwrap();
            self.repo
                .create(User::new(email, nickname, Some(hash)))
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_get_profile_not_found() {
        let f = fixture();
        let err = f.service.get_profile(Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, UserError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_profile() {
        let f = fixture();
        let alice = f.seed("a@x.com", "alice", "secret123").await;
        f.seed("b@x.com", "bob", "secret123").await;

        let err = f
            .service
            .update_profile(
                alice.id,
                UpdateProfile {
                    nickname: Some("bob".into()),
                    avatar_url: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::Conflict { field: UniqueField::Nickname, .. }));

        // Re-submitting the current nickname is a no-op, not a conflict
        let updated = f
            .service
            .update_profile(
                alice.id,
                UpdateProfile {
                    nickname: Some("alice".into()),
                    avatar_url: Some("https://cdn.example.com/a.png".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.nickname, "alice");
        assert_eq!(
            updated.avatar_url.as_deref(),
            Some("https://cdn.example.com/a.png")
        );
    }

    #[tokio::test]
    async fn test_change_password() {
        let f = fixture();
        let alice = f.seed("a@x.com", "alice", "secret123").await;

        let err = f
            .service
            .change_password(
                alice.id,
                ChangePassword {
                    current_password: "wrong".into(),
                    new_password: "newsecret456".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::Unauthorized(_)));

        f.service
            .change_password(
                alice.id,
                ChangePassword {
                    current_password: "secret123".into(),
                    new_password: "newsecret456".into(),
                },
            )
            .await
            .unwrap();

        let stored = f.repo.find_credential_by_id(alice.id).await.unwrap().unwrap();
        let hash = stored.password_hash.unwrap();
        assert!(f.encrypt.verify("newsecret456", &hash).await);
        assert!(!f.encrypt.verify("secret123", &hash).await);
    }

    #[tokio::test]
    async fn test_change_password_forbidden_for_oauth_accounts() {
        let f = fixture();
        let hash = f.encrypt.hash("secret123").await.unwrap();
        let mut linked = User::new("g@x.com", "googler", Some(hash));
        linked.oauth_provider = Some("google".into());
        linked.oauth_id = Some("g-1".into());
        let linked = f.repo.create(linked).await.unwrap();

        for current in ["secret123", "wrong", ""] {
            let err = f
                .service
                .change_password(
                    linked.id,
                    ChangePassword {
                        current_password: current.into(),
                        new_password: "newsecret456".into(),
                    },
                )
                .await
                .unwrap_err();
            assert!(matches!(err, UserError::Forbidden(_)));
        }
    }

    #[tokio::test]
    async fn test_change_password_never_hashes_before_check() {
        let mut mock = MockUserRepository::new();
        let hash = test_encrypt_service().hash("secret123").await.unwrap();
        let user = User::new("a@x.com", "alice", Some(hash));
        let id = user.id;
        mock.expect_find_credential_by_id()
            .returning(move |_| Ok(Some(user.clone())));
        mock.expect_update().never();

        let service = UserService::new(Arc::new(mock), test_encrypt_service());
        let err = service
            .change_password(
                id,
                ChangePassword {
                    current_password: "nope".into(),
                    new_password: "newsecret456".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_list_users_pagination() {
        let f = fixture();
        let base = Utc::now();
        for i in 0..15 {
            let mut user = User::new(&format!("u{}@x.com", i), format!("user{}", i), None);
            user.created_at = base + Duration::seconds(i);
            f.repo.create(user).await.unwrap();
        }

        let first = f
            .service
            .list_users(ListUsersQuery {
                page: Some(1),
                limit: Some(10),
                ..Default::default()
            })
            .await
            .unwrap();
        let second = f
            .service
            .list_users(ListUsersQuery {
                page: Some(2),
                limit: Some(10),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(first.total, 15);
        assert_eq!(first.total_pages, 2);
        assert_eq!(first.users.len(), 10);
        assert_eq!(second.users.len(), 5);
        assert_eq!(second.page, 2);

        let first_ids: HashSet<_> = first.users.iter().map(|u| u.id).collect();
        assert!(second.users.iter().all(|u| !first_ids.contains(&u.id)));

        let created: Vec<_> = second.users.iter().map(|u| u.created_at).collect();
        assert!(created.windows(2).all(|w| w[0] >= w[1]));
        assert!(first.users.last().unwrap().created_at >= second.users[0].created_at);
    }

    #[tokio::test]
    async fn test_list_users_defaults() {
        let f = fixture();
        f.seed("a@x.com", "alice", "secret123").await;

        let page = f.service.list_users(ListUsersQuery::default()).await.unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.limit, 10);
        assert_eq!(page.total, 1);
        assert_eq!(page.total_pages, 1);
    }

    #[tokio::test]
    async fn test_list_users_rejects_unreachable_page() {
        let f = fixture();
        f.seed("a@x.com", "alice", "secret123").await;

        let err = f
            .service
            .list_users(ListUsersQuery {
                page: Some(u64::MAX),
                limit: Some(100),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::InvalidArgument(_)));

        // Far past the end but representable: empty page, real total
        let page = f
            .service
            .list_users(ListUsersQuery {
                page: Some(1_000_000),
                limit: Some(100),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(page.users.is_empty());
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_update_user_role() {
        let f = fixture();
        let alice = f.seed("a@x.com", "alice", "secret123").await;

        let err = f
            .service
            .update_user_role(alice.id, "superuser")
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::InvalidArgument(_)));
        let stored = f.repo.find_by_id(alice.id).await.unwrap().unwrap();
        assert_eq!(stored.role, Role::User);

        let err = f
            .service
            .update_user_role(Uuid::now_v7(), "superuser")
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::NotFound(_)));

        let updated = f.service.update_user_role(alice.id, "moderator").await.unwrap();
        assert_eq!(updated.role, Role::Moderator);
    }

    #[tokio::test]
    async fn test_activation_and_delete() {
        let f = fixture();
        let alice = f.seed("a@x.com", "alice", "secret123").await;

        let user = f.service.deactivate_user(alice.id).await.unwrap();
        assert!(!user.is_active);
        let user = f.service.activate_user(alice.id).await.unwrap();
        assert!(user.is_active);

        f.service.delete_user(alice.id).await.unwrap();
        let err = f.service.get_user(alice.id).await.unwrap_err();
        assert!(matches!(err, UserError::NotFound(_)));

        let err = f.service.delete_user(alice.id).await.unwrap_err();
        assert!(matches!(err, UserError::NotFound(_)));
        let err = f.service.activate_user(alice.id).await.unwrap_err();
        assert!(matches!(err, UserError::NotFound(_)));
    }
}
