use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::auth::{
    repo::{StoreError, StoreResult, UserStore, UserTx},
    repo_types::{NewUser, UserRecord},
};

type Users = HashMap<Uuid, UserRecord>;

/// In-process store, used by the test suite.
///
/// Transactions hold the whole table lock and work on a staged copy,
/// so they are serialized and roll back when dropped.
#[derive(Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<Mutex<Users>>,
    fail_commits: Arc<AtomicBool>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent commit fail with `StoreError::Unavailable`.
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.users.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn begin(&self) -> StoreResult<Box<dyn UserTx>> {
        let guard = Arc::clone(&self.users).lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryTx {
            guard: Some(guard),
            staged,
            fail_commit: self.fail_commits.load(Ordering::SeqCst),
        }))
    }
}

struct MemoryTx {
    guard: Option<OwnedMutexGuard<Users>>,
    staged: Users,
    fail_commit: bool,
}

impl MemoryTx {
    fn ensure_open(&self) -> StoreResult<()> {
        match self.guard {
            Some(_) => Ok(()),
            None => Err(StoreError::Closed),
        }
    }
}

#[async_trait]
impl UserTx for MemoryTx {
    async fn find_by_email(
        &mut self,
        email: &str,
        case_insensitive: bool,
    ) -> StoreResult<Option<UserRecord>> {
        self.ensure_open()?;
        let wanted = email.to_lowercase();
        Ok(self
            .staged
            .values()
            .find(|u| {
                if case_insensitive {
                    u.email.to_lowercase() == wanted
                } else {
                    u.email == email
                }
            })
            .cloned())
    }

    async fn find_by_id(&mut self, id: Uuid) -> StoreResult<Option<UserRecord>> {
        self.ensure_open()?;
        Ok(self.staged.get(&id).cloned())
    }

    async fn insert(&mut self, user: NewUser) -> StoreResult<Uuid> {
        self.ensure_open()?;
        let wanted = user.email.to_lowercase();
        if self.staged.values().any(|u| u.email.to_lowercase() == wanted) {
            return Err(StoreError::DuplicateEmail);
        }
        let now = OffsetDateTime::now_utc();
        let id = Uuid::new_v4();
        self.staged.insert(
            id,
            UserRecord {
                id,
                display_name: user.display_name,
                email: user.email,
                password_hash: user.password_hash,
                current_token: None,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn update_token(&mut self, id: Uuid, token: Option<&str>) -> StoreResult<bool> {
        self.ensure_open()?;
        match self.staged.get_mut(&id) {
            Some(user) => {
                user.current_token = token.map(str::to_owned);
                user.updated_at = OffsetDateTime::now_utc();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn commit(&mut self) -> StoreResult<()> {
        let mut guard = self.guard.take().ok_or(StoreError::Closed)?;
        if self.fail_commit {
            return Err(StoreError::Unavailable("commit rejected".into()));
        }
        *guard = std::mem::take(&mut self.staged);
        Ok(())
    }
}
