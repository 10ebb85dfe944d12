//! Accounts, credentials, and the capability roles a user holds.

use std::fmt;

use thiserror::Error;

use crate::model::ids::UserId;

/// Language assigned to accounts that do not specify one.
pub const DEFAULT_LANGUAGE: &str = "en";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UserError {
    #[error("user {field} must not be empty")]
    EmptyField { field: &'static str },
}

//
// ─── ROLES ─────────────────────────────────────────────────────────────────────
//

/// Capabilities an account can hold. Editors may curate topics and
/// problems; everyone else is read-and-practice only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Student,
    Teacher,
    Editor,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Student, Role::Teacher, Role::Editor];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Editor => "editor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn role_bit(role: Role) -> u8 {
    match role {
        Role::Student => 1 << 0,
        Role::Teacher => 1 << 1,
        Role::Editor => 1 << 2,
    }
}

/// Set of roles held by a user, stored as a bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoleSet(u8);

impl RoleSet {
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub fn of(roles: &[Role]) -> Self {
        roles.iter().fold(Self::empty(), |set, role| set.with(*role))
    }

    #[must_use]
    pub fn with(mut self, role: Role) -> Self {
        self.insert(role);
        self
    }

    pub fn insert(&mut self, role: Role) {
        self.0 |= role_bit(role);
    }

    pub fn remove(&mut self, role: Role) {
        self.0 &= !role_bit(role);
    }

    /// Inserts or removes depending on `held`.
    pub fn set(&mut self, role: Role, held: bool) {
        if held {
            self.insert(role);
        } else {
            self.remove(role);
        }
    }

    #[must_use]
    pub fn contains(self, role: Role) -> bool {
        self.0 & role_bit(role) != 0
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Roles present, in declaration order.
    #[must_use]
    pub fn roles(self) -> Vec<Role> {
        Role::ALL
            .into_iter()
            .filter(|role| self.contains(*role))
            .collect()
    }
}

//
// ─── USER ──────────────────────────────────────────────────────────────────────
//

/// An account that can sign in, practice topics, and accrue scores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    id: UserId,
    username: String,
    email: Option<String>,
    password: String,
    language: String,
    roles: RoleSet,
}

impl User {
    /// Creates a user with the student role and default language.
    ///
    /// # Errors
    ///
    /// Returns `UserError::EmptyField` if the username is blank after
    /// trimming, or the password is empty.
    pub fn new(
        id: UserId,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, UserError> {
        Self::from_parts(
            id,
            username,
            None,
            password,
            DEFAULT_LANGUAGE,
            RoleSet::empty().with(Role::Student),
        )
    }

    /// Builds a user from explicit parts, trimming the username and
    /// normalizing a blank email to `None`.
    ///
    /// # Errors
    ///
    /// Returns `UserError::EmptyField` for a blank username or an empty
    /// password. Passwords are compared byte-for-byte, so surrounding
    /// whitespace is kept.
    pub fn from_parts(
        id: UserId,
        username: impl Into<String>,
        email: Option<String>,
        password: impl Into<String>,
        language: impl Into<String>,
        roles: RoleSet,
    ) -> Result<Self, UserError> {
        let username = username.into();
        if username.trim().is_empty() {
            return Err(UserError::EmptyField { field: "username" });
        }
        let password = password.into();
        if password.is_empty() {
            return Err(UserError::EmptyField { field: "password" });
        }
        let email = email.map(|e| e.trim().to_owned()).filter(|e| !e.is_empty());
        let language = language.into();
        let language = if language.trim().is_empty() {
            DEFAULT_LANGUAGE.to_owned()
        } else {
            language.trim().to_owned()
        };

        Ok(Self {
            id,
            username: username.trim().to_owned(),
            email,
            password,
            language,
            roles,
        })
    }

    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// The stored secret, exposed for persistence and export.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    #[must_use]
    pub fn roles(&self) -> RoleSet {
        self.roles
    }

    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(role)
    }

    pub fn set_role(&mut self, role: Role, held: bool) {
        self.roles.set(role, held);
    }

    /// Exact-match credential check.
    #[must_use]
    pub fn verify_password(&self, candidate: &str) -> bool {
        self.password == candidate
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
