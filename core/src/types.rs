//! Domain types for the todo API.
//!
//! # Design
//! `Todo` is the stored record. Derived values (`status`, priority label and
//! color, `days_until_due`, `is_overdue`) are computed from it on demand and
//! only materialised in `TodoView`, the serialized response shape. Nothing
//! derived is ever written back to storage.
//!
//! Completion is a two-state machine. `toggle` is the only transition and
//! owns `completed_at`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{InvalidPermission, InvalidPriority};
use crate::validate::{NewTodo, TodoChanges};

pub const DEFAULT_CATEGORY: &str = "General";

const MS_PER_DAY: f64 = 86_400_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Priority {
    #[default]
    Low = 1,
    Medium = 2,
    High = 3,
}

impl Priority {
    pub fn label(self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Priority::Low => "#4CAF50",
            Priority::Medium => "#FF9800",
            Priority::High => "#F44336",
        }
    }
}

impl TryFrom<u8> for Priority {
    type Error = InvalidPriority;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Priority::Low),
            2 => Ok(Priority::Medium),
            3 => Ok(Priority::High),
            other => Err(InvalidPriority(other)),
        }
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority as u8
    }
}

/// Access granted to a non-owner through `shared_with`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum Permission {
    #[default]
    Read,
    Write,
    Admin,
}

impl Permission {
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::Read => "read",
            Permission::Write => "write",
            Permission::Admin => "admin",
        }
    }
}

impl TryFrom<String> for Permission {
    type Error = InvalidPermission;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "read" => Ok(Permission::Read),
            "write" => Ok(Permission::Write),
            "admin" => Ok(Permission::Admin),
            _ => Err(InvalidPermission(value)),
        }
    }
}

impl From<Permission> for &'static str {
    fn from(permission: Permission) -> Self {
        permission.as_str()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TodoStatus {
    Pending,
    Completed,
}

/// Opaque file metadata. Stored as given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Attachment {
    pub filename: String,
    pub url: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedWith {
    pub user: Uuid,
    pub permission: Permission,
}

/// Append-only annotation on a todo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: Uuid,
    pub content: String,
    pub author: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

/// The public slice of a user, used when resolving `shared_with`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/// A single todo item as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: Uuid,
    pub owner: Uuid,
    pub title: String,
    pub description: String,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub category: String,
    pub attachments: Vec<Attachment>,
    pub shared_with: Vec<SharedWith>,
    pub notes: Vec<Note>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Todo {
    /// Builds a fresh, pending todo owned by `owner`.
    pub fn create(owner: Uuid, input: NewTodo, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            title: input.title,
            description: input.description,
            is_completed: false,
            completed_at: None,
            priority: input.priority,
            due_date: input.due_date,
            tags: input.tags,
            category: input.category,
            attachments: input.attachments,
            shared_with: Vec::new(),
            notes: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> TodoStatus {
        if self.is_completed {
            TodoStatus::Completed
        } else {
            TodoStatus::Pending
        }
    }

    /// True iff a due date is set, it lies before `now`, and the todo is
    /// still pending.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        match self.due_date {
            Some(due) => !self.is_completed && due < now,
            None => false,
        }
    }

    /// Whole days until the due date, rounded up. Negative once past due.
    pub fn days_until_due(&self, now: DateTime<Utc>) -> Option<i64> {
        self.due_date.map(|due| {
            let millis = (due - now).num_milliseconds() as f64;
            (millis / MS_PER_DAY).ceil() as i64
        })
    }

    pub fn is_visible_to(&self, user: Uuid) -> bool {
        self.owner == user || self.shared_with.iter().any(|s| s.user == user)
    }

    /// Flips completion. `completed_at` follows the new state.
    pub fn toggle(&mut self, now: DateTime<Utc>) {
        self.is_completed = !self.is_completed;
        self.completed_at = self.is_completed.then_some(now);
        self.updated_at = now;
    }

    /// Applies a validated partial update. Absent fields stay as they are.
    pub fn apply(&mut self, changes: TodoChanges, now: DateTime<Utc>) {
        if let Some(title) = changes.title {
            self.title = title;
        }
        if let Some(description) = changes.description {
            self.description = description;
        }
        if let Some(priority) = changes.priority {
            self.priority = priority;
        }
        if let Some(due_date) = changes.due_date {
            self.due_date = due_date;
        }
        if let Some(category) = changes.category {
            self.category = category;
        }
        if let Some(tags) = changes.tags {
            self.tags = tags;
        }
        self.updated_at = now;
    }

    /// Grants `permission` to `user`, replacing any earlier grant.
    pub fn share(&mut self, user: Uuid, permission: Permission, now: DateTime<Utc>) {
        match self.shared_with.iter_mut().find(|s| s.user == user) {
            Some(existing) => existing.permission = permission,
            None => self.shared_with.push(SharedWith { user, permission }),
        }
        self.updated_at = now;
    }

    pub fn add_note(&mut self, author: Uuid, content: String, now: DateTime<Utc>) {
        self.notes.push(Note {
            id: Uuid::new_v4(),
            content,
            author,
            created_at: now,
        });
        self.updated_at = now;
    }
}

/// `shared_with[].user` in a response: either the bare id or the resolved
/// profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SharedUser {
    Profile(UserProfile),
    Id(Uuid),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SharedWithView {
    pub user: SharedUser,
    pub permission: Permission,
}

/// Response shape of a todo: stored fields plus derived ones.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoView {
    pub id: Uuid,
    pub owner: Uuid,
    pub title: String,
    pub description: String,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub category: String,
    pub attachments: Vec<Attachment>,
    pub shared_with: Vec<SharedWithView>,
    pub notes: Vec<Note>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: TodoStatus,
    pub priority_label: &'static str,
    pub priority_color: &'static str,
    pub days_until_due: Option<i64>,
    pub is_overdue: bool,
}

impl TodoView {
    pub fn new(todo: Todo, now: DateTime<Utc>) -> Self {
        let status = todo.status();
        let days_until_due = todo.days_until_due(now);
        let is_overdue = todo.is_overdue(now);
        Self {
            id: todo.id,
            owner: todo.owner,
            title: todo.title,
            description: todo.description,
            is_completed: todo.is_completed,
            completed_at: todo.completed_at,
            priority: todo.priority,
            due_date: todo.due_date,
            tags: todo.tags,
            category: todo.category,
            attachments: todo.attachments,
            shared_with: todo
                .shared_with
                .into_iter()
                .map(|s| SharedWithView {
                    user: SharedUser::Id(s.user),
                    permission: s.permission,
                })
                .collect(),
            notes: todo.notes,
            created_at: todo.created_at,
            updated_at: todo.updated_at,
            status,
            priority_label: todo.priority.label(),
            priority_color: todo.priority.color(),
            days_until_due,
            is_overdue,
        }
    }

    /// Replaces shared user ids with profiles found in `profiles`. Ids with
    /// no matching profile are left as ids.
    pub fn resolve_sharing(mut self, profiles: &HashMap<Uuid, UserProfile>) -> Self {
        for entry in &mut self.shared_with {
            if let SharedUser::Id(id) = entry.user {
                if let Some(profile) = profiles.get(&id) {
                    entry.user = SharedUser::Profile(profile.clone());
                }
            }
        }
        self
    }
}
