//! Persistence client.
//!
//! # Design
//! `TodoStore` is the seam to the document store: CRUD plus aggregation over
//! todos addressed by a `TodoPredicate`, and a small user collection. The
//! client is an explicit object with a `connect`/`close` lifecycle owned by
//! process startup and shutdown, and is shared behind an `Arc`.
//!
//! `MemoryStore` keeps both collections behind one `RwLock`. Every operation
//! first takes a permit from a bounded pool (a semaphore sized by
//! `StoreConfig::pool_size`), waiting at most `acquire_timeout`. Each
//! operation reads under a single guard, so an aggregation sees one
//! consistent snapshot.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{RwLock, Semaphore, SemaphorePermit};
use todo_core::{Todo, TodoPredicate, TodoQuery, TodoStatistics, User};
use uuid::Uuid;

pub const DEFAULT_POOL_SIZE: usize = 10;
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store connection is closed")]
    Closed,
    #[error("timed out after {0:?} waiting for a pooled connection")]
    PoolTimeout(Duration),
    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),
    #[error("duplicate value for unique field `{0}`")]
    DuplicateKey(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    pub pool_size: usize,
    pub acquire_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }
}

#[async_trait]
pub trait TodoStore: Send + Sync {
    /// Fails with `DuplicateKey("email")` if the email is taken.
    async fn insert_user(&self, user: User) -> Result<User, StoreError>;
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<User>, StoreError>;

    async fn insert_todo(&self, todo: Todo) -> Result<Todo, StoreError>;
    async fn find_todo(&self, predicate: &TodoPredicate) -> Result<Option<Todo>, StoreError>;
    async fn find_todos(&self, query: &TodoQuery) -> Result<Vec<Todo>, StoreError>;
    async fn count_todos(&self, predicate: &TodoPredicate) -> Result<u64, StoreError>;
    /// Overwrites the stored todo with the same id. `false` if it no longer
    /// exists.
    async fn replace_todo(&self, todo: Todo) -> Result<bool, StoreError>;
    /// Deletes the first match and returns it.
    async fn delete_todo(&self, predicate: &TodoPredicate) -> Result<Option<Todo>, StoreError>;
    async fn delete_todos(&self, predicate: &TodoPredicate) -> Result<u64, StoreError>;
    async fn aggregate_stats(
        &self,
        predicate: &TodoPredicate,
        now: DateTime<Utc>,
    ) -> Result<TodoStatistics, StoreError>;

    async fn close(&self);
}

#[derive(Debug, Default)]
struct Collections {
    users: HashMap<Uuid, User>,
    todos: HashMap<Uuid, Todo>,
}

#[derive(Debug)]
pub struct MemoryStore {
    data: RwLock<Collections>,
    pool: Semaphore,
    acquire_timeout: Duration,
}

impl MemoryStore {
    pub fn connect(config: StoreConfig) -> Result<Self, StoreError> {
        if config.pool_size == 0 {
            return Err(StoreError::InvalidConfig(
                "pool size must be at least 1".to_string(),
            ));
        }
        tracing::debug!(
            pool_size = config.pool_size,
            acquire_timeout_ms = config.acquire_timeout.as_millis() as u64,
            "Opened in-memory todo store"
        );
        Ok(Self {
            data: RwLock::new(Collections::default()),
            pool: Semaphore::new(config.pool_size),
            acquire_timeout: config.acquire_timeout,
        })
    }

    async fn acquire(&self) -> Result<SemaphorePermit<'_>, StoreError> {
        match tokio::time::timeout(self.acquire_timeout, self.pool.acquire()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(StoreError::Closed),
            Err(_) => Err(StoreError::PoolTimeout(self.acquire_timeout)),
        }
    }
}

#[async_trait]
impl TodoStore for MemoryStore {
    async fn insert_user(&self, user: User) -> Result<User, StoreError> {
        let _conn = self.acquire().await?;
        let mut data = self.data.write().await;
        if data
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(StoreError::DuplicateKey("email"));
        }
        if data.users.contains_key(&user.id) {
            return Err(StoreError::DuplicateKey("id"));
        }
        data.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let _conn = self.acquire().await?;
        Ok(self.data.read().await.users.get(&id).cloned())
    }

    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<User>, StoreError> {
        let _conn = self.acquire().await?;
        let data = self.data.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| data.users.get(id))
            .cloned()
            .collect())
    }

    async fn insert_todo(&self, todo: Todo) -> Result<Todo, StoreError> {
        let _conn = self.acquire().await?;
        let mut data = self.data.write().await;
        if data.todos.contains_key(&todo.id) {
            return Err(StoreError::DuplicateKey("id"));
        }
        data.todos.insert(todo.id, todo.clone());
        Ok(todo)
    }

    async fn find_todo(&self, predicate: &TodoPredicate) -> Result<Option<Todo>, StoreError> {
        let _conn = self.acquire().await?;
        let data = self.data.read().await;
        let found = match predicate.id {
            Some(id) => data.todos.get(&id).filter(|t| predicate.matches(t)),
            None => data.todos.values().find(|t| predicate.matches(t)),
        };
        Ok(found.cloned())
    }

    async fn find_todos(&self, query: &TodoQuery) -> Result<Vec<Todo>, StoreError> {
        let _conn = self.acquire().await?;
        let data = self.data.read().await;
        Ok(query.apply(data.todos.values()))
    }

    async fn count_todos(&self, predicate: &TodoPredicate) -> Result<u64, StoreError> {
        let _conn = self.acquire().await?;
        let data = self.data.read().await;
        Ok(data.todos.values().filter(|t| predicate.matches(t)).count() as u64)
    }

    async fn replace_todo(&self, todo: Todo) -> Result<bool, StoreError> {
        let _conn = self.acquire().await?;
        let mut data = self.data.write().await;
        match data.todos.get_mut(&todo.id) {
            Some(slot) => {
                *slot = todo;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_todo(&self, predicate: &TodoPredicate) -> Result<Option<Todo>, StoreError> {
        let _conn = self.acquire().await?;
        let mut data = self.data.write().await;
        let id = data
            .todos
            .values()
            .find(|t| predicate.matches(t))
            .map(|t| t.id);
        Ok(id.and_then(|id| data.todos.remove(&id)))
    }

    async fn delete_todos(&self, predicate: &TodoPredicate) -> Result<u64, StoreError> {
        let _conn = self.acquire().await?;
        let mut data = self.data.write().await;
        let before = data.todos.len();
        data.todos.retain(|_, t| !predicate.matches(t));
        Ok((before - data.todos.len()) as u64)
    }

    async fn aggregate_stats(
        &self,
        predicate: &TodoPredicate,
        now: DateTime<Utc>,
    ) -> Result<TodoStatistics, StoreError> {
        let _conn = self.acquire().await?;
        let data = self.data.read().await;
        Ok(TodoStatistics::collect(
            data.todos.values().filter(|t| predicate.matches(t)),
            now,
        ))
    }

    async fn close(&self) {
        self.pool.close();
        tracing::info!("Todo store closed");
    }
}
