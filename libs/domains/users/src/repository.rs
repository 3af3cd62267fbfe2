use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{UniqueField, UserError, UserResult};
use crate::models::{User, UserFilter, UserPatch, normalize_email};

/// Account storage.
///
/// Soft-deleted accounts are invisible to every method. Only the two
/// `find_credential_*` lookups return `password_hash`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> UserResult<Option<User>>;

    /// Same as `find_by_id` but with `password_hash` populated
    async fn find_credential_by_id(&self, id: Uuid) -> UserResult<Option<User>>;

    /// Case-insensitive email lookup
    async fn find_by_email(&self, email: &str) -> UserResult<Option<User>>;

    /// Case-insensitive email lookup with `password_hash` populated
    async fn find_credential_by_email(&self, email: &str) -> UserResult<Option<User>>;

    async fn find_by_nickname(&self, nickname: &str) -> UserResult<Option<User>>;

    async fn find_by_oauth(&self, provider: &str, oauth_id: &str) -> UserResult<Option<User>>;

    /// One page of matching accounts, newest first, plus the total match count
    async fn list(&self, filter: UserFilter) -> UserResult<(Vec<User>, u64)>;

    /// Insert a new account. Duplicate email or nickname fails with `Conflict`.
    async fn create(&self, user: User) -> UserResult<User>;

    /// Apply a patch. Missing account fails with `NotFound`, a taken nickname with `Conflict`.
    async fn update(&self, id: Uuid, patch: UserPatch) -> UserResult<User>;

    /// Tombstone an account
    async fn soft_delete(&self, id: Uuid) -> UserResult<()>;

    async fn exists_by_email(&self, email: &str) -> UserResult<bool>;

    async fn exists_by_nickname(&self, nickname: &str) -> UserResult<bool>;
}

/// In-memory implementation of UserRepository (for development/testing)
///
/// Uniqueness checks run under the write lock, so concurrent creates with
/// the same email produce exactly one success.
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn find_live<P>(&self, predicate: P) -> Option<User>
    where
        P: Fn(&User) -> bool,
    {
        let users = self.users.read().await;
        users
            .values()
            .find(|u| !u.is_deleted() && predicate(u))
            .cloned()
    }
}

fn email_taken(users: &HashMap<Uuid, User>, email: &str, except: Option<Uuid>) -> bool {
    users
        .values()
        .any(|u| !u.is_deleted() && Some(u.id) != except && u.email == email)
}

fn nickname_taken(users: &HashMap<Uuid, User>, nickname: &str, except: Option<Uuid>) -> bool {
    users
        .values()
        .any(|u| !u.is_deleted() && Some(u.id) != except && u.nickname == nickname)
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: Uuid) -> UserResult<Option<User>> {
        Ok(self
            .find_credential_by_id(id)
            .await?
            .map(User::without_password))
    }

    async fn find_credential_by_id(&self, id: Uuid) -> UserResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(&id).filter(|u| !u.is_deleted()).cloned())
    }

    async fn find_by_email(&self, email: &str) -> UserResult<Option<User>> {
        Ok(self
            .find_credential_by_email(email)
            .await?
            .map(User::without_password))
    }

    async fn find_credential_by_email(&self, email: &str) -> UserResult<Option<User>> {
        let email = normalize_email(email);
        Ok(self.find_live(|u| u.email == email).await)
    }

    async fn find_by_nickname(&self, nickname: &str) -> UserResult<Option<User>> {
        Ok(self
            .find_live(|u| u.nickname == nickname)
            .await
            .map(User::without_password))
    }

    async fn find_by_oauth(&self, provider: &str, oauth_id: &str) -> UserResult<Option<User>> {
        Ok(self
            .find_live(|u| {
                u.oauth_provider.as_deref() == Some(provider)
                    && u.oauth_id.as_deref() == Some(oauth_id)
            })
            .await
            .map(User::without_password))
    }

    async fn list(&self, filter: UserFilter) -> UserResult<(Vec<User>, u64)> {
        let users = self.users.read().await;

        let mut matching: Vec<&User> = users.values().filter(|u| filter.matches(u)).collect();

        // Newest first; v7 ids break timestamp ties in creation order
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .cloned()
            .map(User::without_password)
            .collect();

        Ok((page, total))
    }

    async fn create(&self, mut user: User) -> UserResult<User> {
        user.email = normalize_email(&user.email);

        let mut users = self.users.write().await;

        if email_taken(&users, &user.email, None) {
            return Err(UserError::conflict(UniqueField::Email, user.email));
        }
        if nickname_taken(&users, &user.nickname, None) {
            return Err(UserError::conflict(UniqueField::Nickname, user.nickname));
        }

        users.insert(user.id, user.clone());

        tracing::info!(user_id = %user.id, email = %user.email, "Created user");
        Ok(user)
    }

    async fn update(&self, id: Uuid, patch: UserPatch) -> UserResult<User> {
        let mut users = self.users.write().await;

        match users.get(&id) {
            Some(existing) if !existing.is_deleted() => {}
            _ => return Err(UserError::NotFound(id)),
        }

        if let Some(ref nickname) = patch.nickname {
            if nickname_taken(&users, nickname, Some(id)) {
                return Err(UserError::conflict(UniqueField::Nickname, nickname.clone()));
            }
        }

        let user = users.get_mut(&id).ok_or(UserError::NotFound(id))?;
        user.apply(patch);

        tracing::info!(user_id = %id, "Updated user");
        Ok(user.clone().without_password())
    }

    async fn soft_delete(&self, id: Uuid) -> UserResult<()> {
        let mut users = self.users.write().await;

        match users.get_mut(&id) {
            Some(user) if !user.is_deleted() => {
                let now = Utc::now();
                user.deleted_at = Some(now);
                user.updated_at = now;
                tracing::info!(user_id = %id, "Soft-deleted user");
                Ok(())
            }
            _ => Err(UserError::NotFound(id)),
        }
    }

    async fn exists_by_email(&self, email: &str) -> UserResult<bool> {
        let users = self.users.read().await;
        Ok(email_taken(&users, &normalize_email(email), None))
    }

    async fn exists_by_nickname(&self, nickname: &str) -> UserResult<bool> {
        let users = self.users.read().await;
        Ok(nickname_taken(&users, nickname, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use chrono::Duration;

    fn user(email: &str, nickname: &str) -> User {
        User::new(email, nickname, Some("$argon2id$hash".to_string()))
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let repo = InMemoryUserRepository::new();
        let created = repo.create(user("Alice@X.com", "alice")).await.unwrap();
        assert_eq!(created.email, "alice@x.com");

        let found = repo.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.nickname, "alice");
        assert!(found.password_hash.is_none());

        let found = repo.find_by_email("ALICE@x.COM").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(found.password_hash.is_none());
    }

    #[tokio::test]
    async fn test_credential_lookups_include_hash() {
        let repo = InMemoryUserRepository::new();
        let created = repo.create(user("a@x.com", "alice")).await.unwrap();

        let by_email = repo.find_credential_by_email("A@X.COM").await.unwrap().unwrap();
        assert_eq!(by_email.password_hash.as_deref(), Some("$argon2id$hash"));

        let by_id = repo.find_credential_by_id(created.id).await.unwrap().unwrap();
        assert!(by_id.password_hash.is_some());
    }

    #[tokio::test]
    async fn test_create_conflicts_email_first() {
        let repo = InMemoryUserRepository::new();
        repo.create(user("a@x.com", "alice")).await.unwrap();

        let err = repo.create(user("A@x.com", "alice")).await.unwrap_err();
        assert!(matches!(err, UserError::Conflict { field: UniqueField::Email, .. }));

        let err = repo.create(user("b@x.com", "alice")).await.unwrap_err();
        assert!(matches!(err, UserError::Conflict { field: UniqueField::Nickname, .. }));
    }

    #[tokio::test]
    async fn test_concurrent_creates_yield_one_winner() {
        let repo = InMemoryUserRepository::new();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let repo = repo.clone();
                tokio::spawn(async move {
                    repo.create(user("race@x.com", &format!("racer{}", i))).await
                })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn test_update_nickname_conflict_and_not_found() {
        let repo = InMemoryUserRepository::new();
        let alice = repo.create(user("a@x.com", "alice")).await.unwrap();
        repo.create(user("b@x.com", "bob")).await.unwrap();

        let patch = UserPatch {
            nickname: Some("bob".into()),
            ..Default::default()
        };
        let err = repo.update(alice.id, patch).await.unwrap_err();
        assert!(matches!(err, UserError::Conflict { field: UniqueField::Nickname, .. }));

        // Keeping your own nickname is not a conflict
        let patch = UserPatch {
            nickname: Some("alice".into()),
            ..UserPatch::role(Role::Moderator)
        };
        let updated = repo.update(alice.id, patch).await.unwrap();
        assert_eq!(updated.role, Role::Moderator);

        let err = repo.update(Uuid::now_v7(), UserPatch::activate()).await.unwrap_err();
        assert!(matches!(err, UserError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_soft_deleted_accounts_are_invisible() {
        let repo = InMemoryUserRepository::new();
        let alice = repo.create(user("a@x.com", "alice")).await.unwrap();

        repo.soft_delete(alice.id).await.unwrap();

        assert!(repo.find_by_id(alice.id).await.unwrap().is_none());
        assert!(repo.find_credential_by_email("a@x.com").await.unwrap().is_none());
        assert!(repo.find_by_nickname("alice").await.unwrap().is_none());
        assert!(!repo.exists_by_email("a@x.com").await.unwrap());
        let (users, total) = repo
            .list(UserFilter {
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(users.is_empty());
        assert_eq!(total, 0);

        let err = repo.soft_delete(alice.id).await.unwrap_err();
        assert!(matches!(err, UserError::NotFound(_)));
        let err = repo.update(alice.id, UserPatch::activate()).await.unwrap_err();
        assert!(matches!(err, UserError::NotFound(_)));

        // Email and nickname are free again
        repo.create(user("a@x.com", "alice")).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_paginates_newest_first() {
        let repo = InMemoryUserRepository::new();
        let base = Utc::now();
        for i in 0..15 {
            let mut u = user(&format!("user{}@x.com", i), &format!("user{}", i));
            u.created_at = base + Duration::seconds(i);
            repo.create(u).await.unwrap();
        }

        let (page, total) = repo
            .list(UserFilter {
                offset: 10,
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(total, 15);
        assert_eq!(page.len(), 5);
        assert_eq!(page[0].nickname, "user4");
        assert_eq!(page[4].nickname, "user0");
    }

    #[tokio::test]
    async fn test_list_filters() {
        let repo = InMemoryUserRepository::new();
        repo.create(user("alice@x.com", "alice")).await.unwrap();
        let bob = repo.create(user("bob@y.com", "bob")).await.unwrap();
        repo.update(bob.id, UserPatch::deactivate()).await.unwrap();

        let (users, total) = repo
            .list(UserFilter {
                limit: 10,
                is_active: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(users[0].id, bob.id);

        let (_, total) = repo
            .list(UserFilter {
                limit: 10,
                search: Some("X.COM".into()),
                role: Some(Role::User),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn test_find_by_oauth() {
        let repo = InMemoryUserRepository::new();
        let mut linked = User::new("g@x.com", "googler", None);
        linked.oauth_provider = Some("google".into());
        linked.oauth_id = Some("123".into());
        let linked = repo.create(linked).await.unwrap();

        let found = repo.find_by_oauth("google", "123").await.unwrap().unwrap();
        assert_eq!(found.id, linked.id);
        assert!(repo.find_by_oauth("github", "123").await.unwrap().is_none());
    }
}
