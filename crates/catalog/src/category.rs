use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopkeep_core::{CategoryId, DomainError, DomainResult, Entity, FieldError, Status};

const NAME_MAX: usize = 50;
const DESCRIPTION_MAX: usize = 255;

/// A global product category. Not owned by anyone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    /// Unique across categories.
    pub name: String,
    pub description: Option<String>,
    /// Display order, ascending.
    pub sort: i32,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Category {
    type Id = CategoryId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
    pub sort: i32,
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CategoryDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sort: Option<i32>,
}

impl CategoryDraft {
    pub fn validate(&self) -> DomainResult<()> {
        let mut errors = Vec::new();
        check_name(&self.name, &mut errors);
        if let Some(description) = &self.description {
            check_description(description, &mut errors);
        }
        DomainError::check(errors)
    }

    pub fn into_new(self) -> NewCategory {
        NewCategory {
            name: self.name.trim().to_string(),
            description: self.description.filter(|d| !d.trim().is_empty()),
            sort: self.sort.unwrap_or(0),
            status: Status::Active,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CategoryPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sort: Option<i32>,
    #[serde(default)]
    pub status: Option<Status>,
}

impl CategoryPatch {
    pub fn validate(&self) -> DomainResult<()> {
        let mut errors = Vec::new();
        if let Some(name) = &self.name {
            check_name(name, &mut errors);
        }
        if let Some(description) = &self.description {
            check_description(description, &mut errors);
        }
        DomainError::check(errors)
    }

    pub fn apply(&self, category: &mut Category, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            category.name = name.trim().to_string();
        }
        if let Some(description) = &self.description {
            let description = description.trim();
            category.description = (!description.is_empty()).then(|| description.to_string());
        }
        if let Some(sort) = self.sort {
            category.sort = sort;
        }
        if let Some(status) = self.status {
            category.status = status;
        }
        category.updated_at = now;
    }
}

fn check_name(name: &str, errors: &mut Vec<FieldError>) {
    let len = name.trim().chars().count();
    if len == 0 {
        errors.push(FieldError::new("name", "must not be empty"));
    } else if len > NAME_MAX {
        errors.push(FieldError::new("name", format!("must be at most {NAME_MAX} characters")));
    }
}

fn check_description(description: &str, errors: &mut Vec<FieldError>) {
    if description.chars().count() > DESCRIPTION_MAX {
        errors.push(FieldError::new(
            "description",
            format!("must be at most {DESCRIPTION_MAX} characters"),
        ));
    }
}
