//! Request payloads and their validation.
//!
//! Payload structs are deliberately loose (`Option` everywhere) so a missing
//! or blank field becomes a `FieldError` instead of a deserialization
//! failure. `validate` trims text, checks bounds and returns the typed,
//! normalised value the rest of the crate works with.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::{FieldError, ValidationError};
use crate::types::{Attachment, Permission, Priority, DEFAULT_CATEGORY};

pub const TITLE_MAX: usize = 200;
pub const DESCRIPTION_MAX: usize = 1000;
pub const CATEGORY_MAX: usize = 50;
pub const TAG_MAX: usize = 20;
pub const TAGS_MAX: usize = 10;
pub const NOTE_MAX: usize = 1000;
pub const USER_NAME_MAX: usize = 50;
pub const EMAIL_MAX: usize = 100;

const TITLE_MSG: &str = "Title must be between 1 and 200 characters";
const DESCRIPTION_MSG: &str = "Description cannot exceed 1000 characters";
const CATEGORY_MSG: &str = "Category cannot exceed 50 characters";
const TAGS_MSG: &str = "Tags must be an array with maximum 10 items";
const TAG_MSG: &str = "Each tag must be between 1 and 20 characters";
const DUE_DATE_MSG: &str = "Due date must be a valid ISO date or null";

/// A validated todo ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTodo {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub category: String,
    pub attachments: Vec<Attachment>,
}

impl Default for NewTodo {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            priority: Priority::default(),
            due_date: None,
            tags: Vec::new(),
            category: DEFAULT_CATEGORY.to_string(),
            attachments: Vec::new(),
        }
    }
}

/// A validated partial update. `None` means "leave unchanged"; for
/// `due_date`, `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Request payload for creating a todo.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTodo {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub attachments: Option<Vec<Attachment>>,
}

impl CreateTodo {
    pub fn validate(self) -> Result<NewTodo, ValidationError> {
        let mut errors = Vec::new();

        let title = match self.title.as_deref().map(str::trim) {
            Some(title) if within(title, 1, TITLE_MAX) => title.to_string(),
            _ => {
                errors.push(FieldError::body("title", TITLE_MSG));
                String::new()
            }
        };
        let description = self
            .description
            .map(|d| check_max(&mut errors, "description", d, DESCRIPTION_MAX, DESCRIPTION_MSG))
            .unwrap_or_default();
        let due_date = match self.due_date {
            Some(raw) => check_due_date(&mut errors, &raw),
            None => None,
        };
        let category = self
            .category
            .map(|c| check_category(&mut errors, c))
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
        let tags = self
            .tags
            .map(|t| check_tags(&mut errors, t))
            .unwrap_or_default();

        ValidationError::check(
            errors,
            NewTodo {
                title,
                description,
                priority: self.priority.unwrap_or_default(),
                due_date,
                tags,
                category,
                attachments: self.attachments.unwrap_or_default(),
            },
        )
    }
}

/// Request payload for a partial update. Only the fields present in the
/// JSON are applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTodo {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<String>>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl UpdateTodo {
    pub fn validate(self) -> Result<TodoChanges, ValidationError> {
        let mut errors = Vec::new();

        let title = self.title.and_then(|t| {
            let t = t.trim();
            if within(t, 1, TITLE_MAX) {
                Some(t.to_string())
            } else {
                errors.push(FieldError::body("title", TITLE_MSG));
                None
            }
        });
        let description = self
            .description
            .map(|d| check_max(&mut errors, "description", d, DESCRIPTION_MAX, DESCRIPTION_MSG));
        let due_date = self.due_date.map(|raw| match raw {
            Some(raw) => check_due_date(&mut errors, &raw),
            None => None,
        });
        let category = self.category.map(|c| check_category(&mut errors, c));
        let tags = self.tags.map(|t| check_tags(&mut errors, t));

        ValidationError::check(
            errors,
            TodoChanges {
                title,
                description,
                priority: self.priority,
                due_date,
                category,
                tags,
            },
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareTodo {
    pub user: Uuid,
    #[serde(default)]
    pub permission: Permission,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddNote {
    pub content: Option<String>,
}

impl AddNote {
    pub fn validate(self) -> Result<String, ValidationError> {
        match self.content.as_deref().map(str::trim) {
            Some(content) if within(content, 1, NOTE_MAX) => Ok(content.to_string()),
            _ => Err(ValidationError::single(FieldError::body(
                "content",
                "Note must be between 1 and 1000 characters",
            ))),
        }
    }
}

/// A validated user registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterUser {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl RegisterUser {
    pub fn validate(self) -> Result<NewUser, ValidationError> {
        let mut errors = Vec::new();

        let name = match self.name.as_deref().map(str::trim) {
            Some(name) if within(name, 1, USER_NAME_MAX) => name.to_string(),
            _ => {
                errors.push(FieldError::body(
                    "name",
                    "Name must be between 1 and 50 characters",
                ));
                String::new()
            }
        };
        let email = match self.email.as_deref().map(str::trim) {
            Some(email) if looks_like_email(email) => email.to_lowercase(),
            _ => {
                errors.push(FieldError::body("email", "Please provide a valid email"));
                String::new()
            }
        };

        ValidationError::check(errors, NewUser { name, email })
    }
}

/// Naive forms accepted after RFC 3339, all read as UTC. `%.f` also
/// matches an absent fraction.
const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parses a due date. Blank input means "no due date".
///
/// Accepts RFC 3339 timestamps, naive date-times with or without seconds
/// (a `T` or a space between date and time, optional trailing `Z`) and
/// plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_due_date(raw: &str) -> Result<Option<DateTime<Utc>>, chrono::ParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }
    let naive = raw
        .strip_suffix('Z')
        .or_else(|| raw.strip_suffix('z'))
        .unwrap_or(raw);
    if let Some(parsed) = NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(naive, format).ok())
    {
        return Ok(Some(parsed.and_utc()));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")?;
    Ok(date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc()))
}

/// Distinguishes an explicit `null` from an absent field.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn within(value: &str, min: usize, max: usize) -> bool {
    let len = value.chars().count();
    (min..=max).contains(&len)
}

fn check_max(
    errors: &mut Vec<FieldError>,
    field: &str,
    value: String,
    max: usize,
    message: &str,
) -> String {
    let value = value.trim();
    if !within(value, 0, max) {
        errors.push(FieldError::body(field, message));
    }
    value.to_string()
}

fn check_category(errors: &mut Vec<FieldError>, category: String) -> String {
    let category = check_max(errors, "category", category, CATEGORY_MAX, CATEGORY_MSG);
    if category.is_empty() {
        DEFAULT_CATEGORY.to_string()
    } else {
        category
    }
}

fn check_due_date(errors: &mut Vec<FieldError>, raw: &str) -> Option<DateTime<Utc>> {
    match parse_due_date(raw) {
        Ok(due) => due,
        Err(_) => {
            errors.push(FieldError::body("dueDate", DUE_DATE_MSG));
            None
        }
    }
}

fn check_tags(errors: &mut Vec<FieldError>, tags: Vec<String>) -> Vec<String> {
    if tags.len() > TAGS_MAX {
        errors.push(FieldError::body("tags", TAGS_MSG));
    }
    tags.into_iter()
        .enumerate()
        .map(|(i, tag)| {
            let tag = tag.trim();
            if !within(tag, 1, TAG_MAX) {
                errors.push(FieldError::body(format!("tags[{i}]"), TAG_MSG));
            }
            tag.to_string()
        })
        .collect()
}

fn looks_like_email(email: &str) -> bool {
    if email.chars().count() > EMAIL_MAX {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        }
        None => false,
    }
}
