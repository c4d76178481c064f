//! User accounts: the persisted side of a principal.
//!
//! A [`User`] holds credential material and is never serialized outward;
//! [`PublicUser`] is the projection that crosses the API boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use shopkeep_core::{DomainError, DomainResult, Entity, FieldError, Status, UserId};

use crate::{Principal, Role};

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 50;
const EMAIL_MAX: usize = 100;
const PASSWORD_MIN: usize = 6;
const PASSWORD_MAX: usize = 50;
const NICKNAME_MAX: usize = 50;
const AVATAR_MAX: usize = 255;

// ─────────────────────────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────────────────────────

/// A stored user account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    pub nickname: Option<String>,
    pub avatar: Option<String>,
    pub role: Role,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Snapshot of the fields authorization decisions look at.
    pub fn principal(&self) -> Principal {
        Principal::new(self.id, self.role, self.status)
    }

    pub fn to_public(&self) -> PublicUser {
        PublicUser::from(self)
    }
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// A user as shown to clients: everything except credential material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub nickname: Option<String>,
    pub avatar: Option<String>,
    pub role: Role,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for PublicUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            username: u.username.clone(),
            email: u.email.clone(),
            nickname: u.nickname.clone(),
            avatar: u.avatar.clone(),
            role: u.role,
            status: u.status,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

/// Insert payload for a new account; storage assigns the id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub nickname: Option<String>,
    pub role: Role,
    pub status: Status,
}

// ─────────────────────────────────────────────────────────────────────────────
// Inputs
// ─────────────────────────────────────────────────────────────────────────────

/// Self-service sign-up request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub nickname: Option<String>,
}

impl Registration {
    pub fn validate(&self) -> DomainResult<()> {
        let mut errors = Vec::new();
        check_username(&self.username, &mut errors);
        check_email(&self.email, &mut errors);
        check_password("password", &self.password, &mut errors);
        if let Some(nickname) = &self.nickname {
            check_nickname(nickname, &mut errors);
        }
        DomainError::check(errors)
    }

    /// Nickname as stored: defaults to the username.
    pub fn effective_nickname(&self) -> String {
        match self.nickname.as_deref().map(str::trim) {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => self.username.clone(),
        }
    }
}

/// Login by username or email.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    /// Username or email address.
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn validate(&self) -> DomainResult<()> {
        let mut errors = Vec::new();
        if self.username.trim().is_empty() {
            errors.push(FieldError::new("username", "username or email is required"));
        }
        if self.password.is_empty() {
            errors.push(FieldError::new("password", "password is required"));
        }
        DomainError::check(errors)
    }
}

/// Partial update of a user's profile. Absent fields are left unchanged;
/// `null` or an empty string clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserPatch {
    #[serde(default, deserialize_with = "present")]
    pub nickname: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub avatar: Option<Option<String>>,
    #[serde(default)]
    pub role: Option<Role>,
}

impl UserPatch {
    pub fn validate(&self) -> DomainResult<()> {
        let mut errors = Vec::new();
        if let Some(Some(nickname)) = &self.nickname {
            check_nickname(nickname, &mut errors);
        }
        if let Some(avatar) = self.avatar.as_ref().and_then(|a| a.as_deref()).filter(|a| !a.is_empty()) {
            check_avatar(avatar, &mut errors);
        }
        DomainError::check(errors)
    }

    pub fn changes_role(&self) -> bool {
        self.role.is_some()
    }

    pub fn apply(&self, user: &mut User, now: DateTime<Utc>) {
        if let Some(nickname) = &self.nickname {
            user.nickname = nickname.as_deref().and_then(non_empty);
        }
        if let Some(avatar) = &self.avatar {
            user.avatar = avatar.as_deref().and_then(non_empty);
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        user.updated_at = now;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    pub old_password: String,
    pub new_password: String,
}

impl PasswordChange {
    pub fn validate(&self) -> DomainResult<()> {
        let mut errors = Vec::new();
        if self.old_password.is_empty() {
            errors.push(FieldError::new("oldPassword", "old password is required"));
        }
        check_password("newPassword", &self.new_password, &mut errors);
        DomainError::check(errors)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Field rules
// ─────────────────────────────────────────────────────────────────────────────

/// A field that is present in the body, `null` included.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn check_username(username: &str, errors: &mut Vec<FieldError>) {
    let len = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        errors.push(FieldError::new(
            "username",
            format!("must be {USERNAME_MIN} to {USERNAME_MAX} characters"),
        ));
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric()) {
        errors.push(FieldError::new("username", "may only contain letters and digits"));
    }
}

fn check_email(email: &str, errors: &mut Vec<FieldError>) {
    if email.chars().count() > EMAIL_MAX {
        errors.push(FieldError::new("email", format!("must be at most {EMAIL_MAX} characters")));
    }
    if !is_plausible_email(email) {
        errors.push(FieldError::new("email", "is not a valid email address"));
    }
}

fn is_plausible_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

fn check_password(field: &'static str, password: &str, errors: &mut Vec<FieldError>) {
    let len = password.chars().count();
    if !(PASSWORD_MIN..=PASSWORD_MAX).contains(&len) {
        errors.push(FieldError::new(
            field,
            format!("must be {PASSWORD_MIN} to {PASSWORD_MAX} characters"),
        ));
    }
}

fn check_nickname(nickname: &str, errors: &mut Vec<FieldError>) {
    if nickname.chars().count() > NICKNAME_MAX {
        errors.push(FieldError::new(
            "nickname",
            format!("must be at most {NICKNAME_MAX} characters"),
        ));
    }
}

fn check_avatar(avatar: &str, errors: &mut Vec<FieldError>) {
    if avatar.chars().count() > AVATAR_MAX {
        errors.push(FieldError::new("avatar", format!("must be at most {AVATAR_MAX} characters")));
    }
    let rest = avatar
        .strip_prefix("https://")
        .or_else(|| avatar.strip_prefix("http://"));
    if !matches!(rest, Some(host) if !host.is_empty() && !host.contains(char::is_whitespace)) {
        errors.push(FieldError::new("avatar", "must be an http(s) URL"));
    }
}
