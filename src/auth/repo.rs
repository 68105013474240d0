use async_trait::async_trait;
use sqlx::{error::ErrorKind, PgPool, Postgres, Transaction};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, UserRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store operation timed out")]
    Timeout,

    #[error("email already registered")]
    DuplicateEmail,

    #[error("record rejected: {0}")]
    Rejected(String),

    #[error("transaction already finished")]
    Closed,
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::DuplicateEmail,
            sqlx::Error::Database(db)
                if matches!(db.kind(), ErrorKind::CheckViolation | ErrorKind::NotNullViolation) =>
            {
                Self::Rejected(db.message().to_string())
            }
            sqlx::Error::PoolTimedOut => Self::Timeout,
            _ => Self::Unavailable(err.to_string()),
        }
    }
}

/// Durable storage of user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Open a transaction. Dropping it without `commit` rolls back.
    async fn begin(&self) -> StoreResult<Box<dyn UserTx>>;
}

/// One unit of work against the user store.
#[async_trait]
pub trait UserTx: Send {
    async fn find_by_email(
        &mut self,
        email: &str,
        case_insensitive: bool,
    ) -> StoreResult<Option<UserRecord>>;

    async fn find_by_id(&mut self, id: Uuid) -> StoreResult<Option<UserRecord>>;

    async fn insert(&mut self, user: NewUser) -> StoreResult<Uuid>;

    /// Returns false when no record has this id.
    async fn update_token(&mut self, id: Uuid, token: Option<&str>) -> StoreResult<bool>;

    async fn commit(&mut self) -> StoreResult<()>;
}

/// PostgreSQL-backed store. Email uniqueness is enforced by a unique index on `lower(email)`.
#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn begin(&self) -> StoreResult<Box<dyn UserTx>> {
        let tx = self.db.begin().await?;
        Ok(Box::new(PgUserTx { tx: Some(tx) }))
    }
}

struct PgUserTx {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgUserTx {
    fn active(&mut self) -> StoreResult<&mut Transaction<'static, Postgres>> {
        self.tx.as_mut().ok_or(StoreError::Closed)
    }
}

#[async_trait]
impl UserTx for PgUserTx {
    async fn find_by_email(
        &mut self,
        email: &str,
        case_insensitive: bool,
    ) -> StoreResult<Option<UserRecord>> {
        // row lock keeps concurrent logins/logouts on this user serialized
        let sql = if case_insensitive {
            r#"
            SELECT id, display_name, email, password_hash, current_token, created_at, updated_at
            FROM users
            WHERE lower(email) = lower($1)
            FOR UPDATE
            "#
        } else {
            r#"
            SELECT id, display_name, email, password_hash, current_token, created_at, updated_at
            FROM users
            WHERE email = $1
            FOR UPDATE
            "#
        };
        let tx = self.active()?;
        let user = sqlx::query_as::<_, UserRecord>(sql)
            .bind(email)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(user)
    }

    async fn find_by_id(&mut self, id: Uuid) -> StoreResult<Option<UserRecord>> {
        let tx = self.active()?;
        let user = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, display_name, email, password_hash, current_token, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(user)
    }

    async fn insert(&mut self, user: NewUser) -> StoreResult<Uuid> {
        let tx = self.active()?;
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO users (display_name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&user.display_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&mut **tx)
        .await?;
        Ok(id)
    }

    async fn update_token(&mut self, id: Uuid, token: Option<&str>) -> StoreResult<bool> {
        let tx = self.active()?;
        let result = sqlx::query(
            r#"
            UPDATE users
            SET current_token = $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn commit(&mut self) -> StoreResult<()> {
        let tx = self.tx.take().ok_or(StoreError::Closed)?;
        tx.commit().await?;
        Ok(())
    }
}

// These need a live PostgreSQL: `DATABASE_URL=... cargo test -- --ignored`.
#[cfg(test)]
mod pg_tests {
    use super::*;

    fn new_user(display_name: &str, email: &str) -> NewUser {
        NewUser {
            display_name: display_name.into(),
            email: email.into(),
            password_hash: "$argon2id$fake".into(),
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn case_variant_email_hits_unique_index(pool: PgPool) {
        let store = PgUserStore::new(pool);
        let mut tx = store.begin().await.unwrap();
        tx.insert(new_user("Ann", "ann@x.com")).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let err = tx.insert(new_user("Ann", "ANN@X.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn empty_display_name_is_rejected_not_unavailable(pool: PgPool) {
        let store = PgUserStore::new(pool);
        let mut tx = store.begin().await.unwrap();
        let err = tx.insert(new_user("", "ann@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn token_is_set_and_cleared(pool: PgPool) {
        let store = PgUserStore::new(pool);
        let mut tx = store.begin().await.unwrap();
        let id = tx.insert(new_user("Ann", "ann@x.com")).await.unwrap();
        assert!(tx.update_token(id, Some("tok")).await.unwrap());
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let user = tx.find_by_email("ANN@x.com", true).await.unwrap().unwrap();
        assert_eq!(user.current_token.as_deref(), Some("tok"));
        assert!(tx.find_by_email("ANN@x.com", false).await.unwrap().is_none());
        assert!(tx.update_token(id, None).await.unwrap());
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.find_by_id(id).await.unwrap().unwrap().current_token.is_none());
        assert!(!tx.update_token(Uuid::new_v4(), None).await.unwrap());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn dropped_transaction_rolls_back(pool: PgPool) {
        let store = PgUserStore::new(pool);
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert(new_user("Ann", "ann@x.com")).await.unwrap();
        }
        let mut tx = store.begin().await.unwrap();
        assert!(tx.find_by_email("ann@x.com", false).await.unwrap().is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn locked_row_serializes_writers(pool: PgPool) {
        let store = PgUserStore::new(pool);
        let mut tx = store.begin().await.unwrap();
        let id = tx.insert(new_user("Ann", "ann@x.com")).await.unwrap();
        tx.commit().await.unwrap();

        let mut first = store.begin().await.unwrap();
        first.find_by_email("ann@x.com", false).await.unwrap().unwrap();

        let second_store = store.clone();
        let second = tokio::spawn(async move {
            let mut tx = second_store.begin().await.unwrap();
            tx.find_by_email("ann@x.com", false).await.unwrap().unwrap();
            tx.update_token(id, Some("second")).await.unwrap();
            tx.commit().await.unwrap();
        });

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert!(!second.is_finished());
        first.update_token(id, Some("first")).await.unwrap();
        first.commit().await.unwrap();
        second.await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let user = tx.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.current_token.as_deref(), Some("second"));
    }
}
