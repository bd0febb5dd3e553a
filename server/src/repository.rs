//! Todo repository: the query-building layer between handlers and the store.
//!
//! Each method issues one store call (two for `create`, which checks that the
//! owner exists first). Ownership and visibility are part of the predicate,
//! so a todo owned by someone else is indistinguishable from a missing one.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use todo_core::{
    NewTodo, NewUser, Page, SortOrder, Todo, TodoFilters, TodoPredicate, TodoQuery,
    TodoStatistics, User, UserProfile,
};
use uuid::Uuid;

use crate::store::{StoreError, TodoStore};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("user {0} does not exist")]
    UnknownUser(Uuid),
}

#[derive(Clone)]
pub struct TodoRepository {
    store: Arc<dyn TodoStore>,
}

impl TodoRepository {
    pub fn new(store: Arc<dyn TodoStore>) -> Self {
        Self { store }
    }

    pub async fn register_user(
        &self,
        input: NewUser,
        now: DateTime<Utc>,
    ) -> Result<User, RepositoryError> {
        let user = User {
            id: Uuid::new_v4(),
            name: input.name,
            email: input.email,
            created_at: now,
        };
        Ok(self.store.insert_user(user).await?)
    }

    pub async fn find_user(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        Ok(self.store.find_user(id).await?)
    }

    /// The owner's todos matching `filters`, highest priority first, then
    /// newest first, windowed by `page`.
    pub async fn find_by_owner(
        &self,
        owner: Uuid,
        filters: TodoFilters,
        page: Page,
    ) -> Result<Vec<Todo>, RepositoryError> {
        let query = TodoQuery {
            sort: SortOrder::PriorityThenNewest,
            ..TodoQuery::new(TodoPredicate::for_owner(owner, filters))
        }
        .page(page);
        Ok(self.store.find_todos(&query).await?)
    }

    pub async fn count_by_owner(&self, owner: Uuid) -> Result<u64, RepositoryError> {
        Ok(self
            .store
            .count_todos(&TodoPredicate::owned_by(owner))
            .await?)
    }

    /// One aggregation over everything `owner` owns.
    pub async fn get_statistics(
        &self,
        owner: Uuid,
        now: DateTime<Utc>,
    ) -> Result<TodoStatistics, RepositoryError> {
        Ok(self
            .store
            .aggregate_stats(&TodoPredicate::owned_by(owner), now)
            .await?)
    }

    /// The todo if `user` owns it or it is shared with them.
    pub async fn find_visible(&self, id: Uuid, user: Uuid) -> Result<Option<Todo>, RepositoryError> {
        Ok(self
            .store
            .find_todo(&TodoPredicate::visible_to(user).with_id(id))
            .await?)
    }

    pub async fn find_owned(&self, id: Uuid, owner: Uuid) -> Result<Option<Todo>, RepositoryError> {
        Ok(self
            .store
            .find_todo(&TodoPredicate::owned_by(owner).with_id(id))
            .await?)
    }

    pub async fn create(
        &self,
        owner: Uuid,
        input: NewTodo,
        now: DateTime<Utc>,
    ) -> Result<Todo, RepositoryError> {
        if self.store.find_user(owner).await?.is_none() {
            return Err(RepositoryError::UnknownUser(owner));
        }
        let todo = self.store.insert_todo(Todo::create(owner, input, now)).await?;
        tracing::debug!(todo_id = %todo.id, owner = %owner, "Created todo");
        Ok(todo)
    }

    /// Writes back a todo read earlier. `None` if it was deleted in between.
    pub async fn save(&self, todo: Todo) -> Result<Option<Todo>, RepositoryError> {
        if self.store.replace_todo(todo.clone()).await? {
            Ok(Some(todo))
        } else {
            Ok(None)
        }
    }

    pub async fn delete_owned(&self, id: Uuid, owner: Uuid) -> Result<Option<Todo>, RepositoryError> {
        Ok(self
            .store
            .delete_todo(&TodoPredicate::owned_by(owner).with_id(id))
            .await?)
    }

    /// Bulk-deletes the owner's completed todos and returns how many went.
    pub async fn clear_completed(&self, owner: Uuid) -> Result<u64, RepositoryError> {
        let deleted = self
            .store
            .delete_todos(&TodoPredicate::owned_by(owner).completed(true))
            .await?;
        tracing::debug!(owner = %owner, deleted, "Cleared completed todos");
        Ok(deleted)
    }

    /// Profiles of every user the given todos are shared with.
    pub async fn sharing_profiles(
        &self,
        todos: &[Todo],
    ) -> Result<HashMap<Uuid, UserProfile>, RepositoryError> {
        let mut ids: Vec<Uuid> = todos
            .iter()
            .flat_map(|t| t.shared_with.iter().map(|s| s.user))
            .collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        ids.sort_unstable();
        ids.dedup();
        let users = self.store.find_users(&ids).await?;
        Ok(users.into_iter().map(|u| (u.id, u.profile())).collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use todo_core::{Permission, Priority};

    use super::*;
    use crate::store::{MemoryStore, StoreConfig};

    fn repo() -> TodoRepository {
        TodoRepository::new(Arc::new(MemoryStore::connect(StoreConfig::default()).unwrap()))
    }

    async fn register(repo: &TodoRepository, email: &str) -> User {
        repo.register_user(
            NewUser {
                name: email.to_string(),
                email: email.to_string(),
            },
            Utc::now(),
        )
        .await
        .unwrap()
    }

    fn new_todo(title: &str, priority: Priority) -> NewTodo {
        NewTodo {
            title: title.to_string(),
            priority,
            ..NewTodo::default()
        }
    }

    #[tokio::test]
    async fn create_requires_existing_owner() {
        let repo = repo();
        let err = repo
            .create(Uuid::new_v4(), new_todo("t", Priority::Low), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::UnknownUser(_)));
    }

    #[tokio::test]
    async fn find_by_owner_orders_and_pages() {
        let repo = repo();
        let alice = register(&repo, "alice@example.com").await;
        let bob = register(&repo, "bob@example.com").await;
        let start = Utc::now();
        repo.create(alice.id, new_todo("low", Priority::Low), start)
            .await
            .unwrap();
        repo.create(alice.id, new_todo("high", Priority::High), start)
            .await
            .unwrap();
        repo.create(
            alice.id,
            new_todo("newer-low", Priority::Low),
            start + Duration::seconds(1),
        )
        .await
        .unwrap();
        repo.create(bob.id, new_todo("bob", Priority::High), start)
            .await
            .unwrap();

        let all = repo
            .find_by_owner(alice.id, TodoFilters::default(), Page::default())
            .await
            .unwrap();
        let titles: Vec<&str> = all.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["high", "newer-low", "low"]);

        let second = repo
            .find_by_owner(alice.id, TodoFilters::default(), Page { page: 2, limit: 2 })
            .await
            .unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].title, "low");
        assert_eq!(repo.count_by_owner(alice.id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn shared_todo_is_visible_but_not_owned() {
        let repo = repo();
        let owner = register(&repo, "owner@example.com").await;
        let friend = register(&repo, "friend@example.com").await;
        let mut todo = repo
            .create(owner.id, new_todo("t", Priority::Low), Utc::now())
            .await
            .unwrap();
        todo.share(friend.id, Permission::Read, Utc::now());
        repo.save(todo.clone()).await.unwrap();

        assert!(repo.find_visible(todo.id, friend.id).await.unwrap().is_some());
        assert!(repo.find_owned(todo.id, friend.id).await.unwrap().is_none());
        assert!(repo.delete_owned(todo.id, friend.id).await.unwrap().is_none());

        let profiles = repo.sharing_profiles(&[todo]).await.unwrap();
        assert_eq!(profiles[&friend.id].email, "friend@example.com");
    }

    #[tokio::test]
    async fn clear_completed_with_nothing_completed_is_zero() {
        let repo = repo();
        let owner = register(&repo, "owner@example.com").await;
        repo.create(owner.id, new_todo("t", Priority::Low), Utc::now())
            .await
            .unwrap();
        assert_eq!(repo.clear_completed(owner.id).await.unwrap(), 0);
        assert_eq!(repo.count_by_owner(owner.id).await.unwrap(), 1);
    }
}
