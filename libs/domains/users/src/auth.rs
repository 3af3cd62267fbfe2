use std::sync::Arc;

use crate::error::{UniqueField, UserError, UserResult};
use crate::models::{AuthTokens, LoginRequest, RegisterRequest, User, normalize_email};
use crate::password::EncryptService;
use crate::repository::UserRepository;
use crate::tokens::TokenService;

/// Registration, login and token-based identity resolution
pub struct AuthService<R: UserRepository> {
    repository: Arc<R>,
    encrypt: EncryptService,
    tokens: TokenService,
}

impl<R: UserRepository> Clone for AuthService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            encrypt: self.encrypt.clone(),
            tokens: self.tokens.clone(),
        }
    }
}

impl<R: UserRepository> AuthService<R> {
    pub fn new(repository: Arc<R>, encrypt: EncryptService, tokens: TokenService) -> Self {
        Self {
            repository,
            encrypt,
            tokens,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Creates an active `user` account. Email is checked before nickname.
    pub async fn register(&self, input: RegisterRequest) -> UserResult<User> {
        let email = normalize_email(&input.email);

        if self.repository.exists_by_email(&email).await? {
            return Err(UserError::conflict(UniqueField::Email, email));
        }
        if self.repository.exists_by_nickname(&input.nickname).await? {
            return Err(UserError::conflict(UniqueField::Nickname, input.nickname));
        }

        let hash = self.encrypt.hash(&input.password).await?;
        let user = User::new(&email, input.nickname, Some(hash));

        let created = self.repository.create(user).await?;
        tracing::info!(user_id = %created.id, "Registered user");
        Ok(created)
    }

    /// Verifies email and password.
    ///
    /// Unknown email, inactive account, missing hash and wrong password all
    /// produce `InvalidCredentials`; the early exits still pay for one hash
    /// verification.
    pub async fn login(&self, input: LoginRequest) -> UserResult<User> {
        let Some(user) = self
            .repository
            .find_credential_by_email(&input.email)
            .await?
        else {
            self.encrypt.verify_dummy(&input.password).await;
            return Err(UserError::InvalidCredentials);
        };

        let hash = match user.password_hash.as_deref() {
            Some(hash) if user.is_active => hash,
            _ => {
                self.encrypt.verify_dummy(&input.password).await;
                return Err(UserError::InvalidCredentials);
            }
        };

        if !self.encrypt.verify(&input.password, hash).await {
            tracing::debug!(user_id = %user.id, "Password mismatch");
            return Err(UserError::InvalidCredentials);
        }

        tracing::info!(user_id = %user.id, "User logged in");
        Ok(user.without_password())
    }

    pub async fn issue_tokens(&self, user: &User) -> UserResult<AuthTokens> {
        self.tokens.issue_tokens(user).await
    }

    /// Trades a refresh token for a fresh pair. No rotation store: the old
    /// token stays valid until it expires.
    pub async fn refresh(&self, refresh_token: &str) -> UserResult<(User, AuthTokens)> {
        let claims = self.tokens.verify_refresh_token(refresh_token)?;
        let user = self.resolve_active(claims.user_id()?).await?;

        let tokens = self.tokens.issue_tokens(&user).await?;
        Ok((user, tokens))
    }

    /// Resolves an access token to a live, active account.
    pub async fn authenticate(&self, access_token: &str) -> UserResult<User> {
        let claims = self.tokens.verify_access_token(access_token)?;
        self.resolve_active(claims.user_id()?).await
    }

    async fn resolve_active(&self, id: uuid::Uuid) -> UserResult<User> {
        match self.repository.find_by_id(id).await? {
            Some(user) if user.is_active => Ok(user),
            _ => {
                tracing::debug!(user_id = %id, "Token subject missing or inactive");
                Err(UserError::InvalidToken)
            }
        }
    }
}
