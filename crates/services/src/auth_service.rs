//! Credential checks and the capability view of the signed-in user.

use std::sync::Arc;

use mastery_core::model::{Role, RoleSet, UserId};
use mastery_storage::repository::UserRepository;

use crate::error::AuthError;

/// The acting user, resolved at sign-in and passed explicitly into
/// gated operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: UserId,
    pub username: String,
    pub roles: RoleSet,
}

impl CurrentUser {
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(role)
    }

    /// Gate for curation operations.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::EditorRequired` when the editor role is
    /// missing.
    pub fn require_editor(&self) -> Result<(), AuthError> {
        if self.has_role(Role::Editor) {
            Ok(())
        } else {
            Err(AuthError::EditorRequired)
        }
    }
}

/// Verifies credentials and manages the editor role.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
}

impl AuthService {
    #[must_use]
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    /// Check a username/password pair and resolve the acting user.
    ///
    /// An unknown username and a wrong password produce the same error.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` when the pair does not
    /// match, or `AuthError::Storage` if the lookup fails.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<CurrentUser, AuthError> {
        let user = self.users.find_by_username(username).await?;
        match user {
            Some(user) if user.verify_password(password) => Ok(CurrentUser {
                id: user.id(),
                username: user.username().to_owned(),
                roles: user.roles(),
            }),
            _ => {
                log::warn!("failed sign-in attempt for {username}");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// Grant or revoke the editor role by username.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` with `StorageError::NotFound` inside
    /// if no such user exists.
    pub async fn set_editor(&self, username: &str, editor: bool) -> Result<(), AuthError> {
        self.users.set_editor(username, editor).await?;
        log::info!("editor role for {username} set to {editor}");
        Ok(())
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────
