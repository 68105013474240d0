use std::{future::Future, sync::Arc, time::Duration};

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{check_account_fields, LoginResponse, Profile, PublicUser, Registered, Status},
        jwt::TokenIssuer,
        password::PasswordHasher,
        repo::UserStore,
        repo_types::{NewUser, UserRecord},
    },
    config::AppConfig,
    error::AuthError,
};

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Register, login, logout and profile lookup over a [`UserStore`].
///
/// Each operation runs in one store transaction bounded by `store_timeout`;
/// a timeout or store failure drops the transaction, which rolls it back.
pub struct AuthService {
    store: Arc<dyn UserStore>,
    hasher: PasswordHasher,
    tokens: TokenIssuer,
    token_ttl: Duration,
    store_timeout: Duration,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn UserStore>,
        hasher: PasswordHasher,
        tokens: TokenIssuer,
        token_ttl: Duration,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            hasher,
            tokens,
            token_ttl,
            store_timeout,
        }
    }

    pub fn from_config(store: Arc<dyn UserStore>, config: &AppConfig) -> anyhow::Result<Self> {
        Ok(Self::new(
            store,
            PasswordHasher::new(&config.hashing)?,
            TokenIssuer::new(&config.jwt),
            config.jwt.ttl(),
            config.store_timeout(),
        ))
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, AuthError>
    where
        F: Future<Output = Result<T, AuthError>>,
    {
        match tokio::time::timeout(self.store_timeout, op).await {
            Ok(res) => res,
            Err(_) => {
                warn!(timeout_ms = self.store_timeout.as_millis() as u64, "store operation timed out");
                Err(AuthError::StoreUnavailable)
            }
        }
    }

    #[instrument(skip(self, raw_password))]
    pub async fn register(
        &self,
        display_name: &str,
        email: &str,
        raw_password: &str,
    ) -> Result<Registered, AuthError> {
        let email = normalize_email(email);
        let display_name = display_name.trim();
        check_account_fields(display_name, &email)?;
        self.bounded(self.register_tx(display_name, &email, raw_password))
            .await
    }

    async fn register_tx(
        &self,
        display_name: &str,
        email: &str,
        raw_password: &str,
    ) -> Result<Registered, AuthError> {
        let mut tx = self.store.begin().await?;

        if tx.find_by_email(email, true).await?.is_some() {
            warn!(email = %email, "email already registered");
            return Err(AuthError::DuplicateEmail);
        }

        if raw_password.is_empty() {
            warn!(email = %email, "register without password");
            return Err(AuthError::MissingPassword);
        }

        let password_hash = self.hasher.hash_blocking(raw_password).await?;
        let id = tx
            .insert(NewUser {
                display_name: display_name.to_string(),
                email: email.to_string(),
                password_hash,
            })
            .await?;
        tx.commit().await?;

        info!(user_id = %id, email = %email, "user registered");
        Ok(Registered {
            status: Status::Created,
            id,
        })
    }

    #[instrument(skip(self, raw_password))]
    pub async fn login(&self, email: &str, raw_password: &str) -> Result<LoginResponse, AuthError> {
        let email = normalize_email(email);
        if email.is_empty() || raw_password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }
        self.bounded(self.login_tx(&email, raw_password)).await
    }

    async fn login_tx(&self, email: &str, raw_password: &str) -> Result<LoginResponse, AuthError> {
        let mut tx = self.store.begin().await?;

        let Some(mut user) = tx.find_by_email(email, false).await? else {
            warn!(email = %email, "login unknown email");
            return Err(AuthError::EmailNotFound);
        };

        if !self.hasher.verify_blocking(raw_password, &user.password_hash).await? {
            warn!(email = %email, user_id = %user.id, "login invalid password");
            return Err(AuthError::InvalidPassword);
        }

        let token = self.tokens.issue(user.id, self.token_ttl)?;
        if !tx.update_token(user.id, Some(&token)).await? {
            // row vanished under the lock
            return Err(AuthError::EmailNotFound);
        }
        tx.commit().await?;
        user.current_token = Some(token.clone());

        info!(user_id = %user.id, email = %user.email, "user logged in");
        Ok(LoginResponse {
            status: Status::Success,
            user: PublicUser::from(user),
            token,
        })
    }

    #[instrument(skip(self))]
    pub async fn logout(&self, user_id: Uuid) -> Result<(), AuthError> {
        self.bounded(self.logout_tx(user_id)).await
    }

    async fn logout_tx(&self, user_id: Uuid) -> Result<(), AuthError> {
        let mut tx = self.store.begin().await?;
        let matched = tx.update_token(user_id, None).await?;
        tx.commit().await?;
        if matched {
            info!(user_id = %user_id, "user logged out");
        } else {
            debug!(user_id = %user_id, "logout for unknown user");
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_profile(&self, user_id: Uuid) -> Result<Profile, AuthError> {
        let user = self.bounded(self.load_user(user_id)).await?;
        Ok(Profile {
            email: user.email,
            display_name: user.display_name,
        })
    }

    /// Resolve a bearer token to its user, rejecting tokens that are no longer the active session.
    #[instrument(skip(self, token))]
    pub async fn authenticate(&self, token: &str) -> Result<Uuid, AuthError> {
        let user_id = self.tokens.verify(token)?;
        let user = self.bounded(self.load_user(user_id)).await?;
        if user.current_token.as_deref() != Some(token) {
            warn!(user_id = %user_id, "token is not the active session");
            return Err(AuthError::TokenInvalid);
        }
        Ok(user_id)
    }

    async fn load_user(&self, user_id: Uuid) -> Result<UserRecord, AuthError> {
        let mut tx = self.store.begin().await?;
        tx.find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }
}

#[cfg(test)]
pub(crate) fn test_service(store: Arc<dyn UserStore>) -> AuthService {
    test_service_with_timeout(store, Duration::from_secs(5))
}

#[cfg(test)]
pub(crate) fn test_service_with_timeout(
    store: Arc<dyn UserStore>,
    store_timeout: Duration,
) -> AuthService {
    AuthService::new(
        store,
        crate::auth::password::cheap_hasher(),
        TokenIssuer::new(&crate::auth::jwt::test_jwt_config()),
        Duration::from_secs(86_400),
        store_timeout,
    )
}
