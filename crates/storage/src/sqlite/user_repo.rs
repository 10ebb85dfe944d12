use mastery_core::model::{Role, User, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{db_err, map_user_row};
use crate::repository::{NewUser, StorageError, UserRepository};

const USER_COLUMNS: &str =
    "id, username, email, password, language, is_student, is_teacher, is_editor";

#[async_trait::async_trait]
impl UserRepository for SqliteRepository {
    async fn insert_user(&self, new_user: &NewUser) -> Result<User, StorageError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let row = sqlx::query(
            r"
            INSERT INTO users (
                username, email, password, language,
                is_student, is_teacher, is_editor
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            RETURNING id
            ",
        )
        .bind(new_user.username.clone())
        .bind(new_user.email.clone())
        .bind(new_user.password.clone())
        .bind(new_user.language.clone())
        .bind(new_user.roles.contains(Role::Student))
        .bind(new_user.roles.contains(Role::Teacher))
        .bind(new_user.roles.contains(Role::Editor))
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        let id: i64 = row
            .try_get("id")
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        // Domain validation happens here; a blank username rolls the
        // insert back.
        let user = new_user
            .clone()
            .into_user(UserId::new(id))
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        tx.commit().await.map_err(db_err)?;
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(map_user_row).transpose()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1");
        let row = sqlx::query(&sql)
            .bind(username.to_owned())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(map_user_row).transpose()
    }

    async fn list_users(&self) -> Result<Vec<User>, StorageError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id ASC");
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        let mut users = Vec::with_capacity(rows.len());
        for row in rows {
            users.push(map_user_row(&row)?);
        }
        Ok(users)
    }

    async fn set_editor(&self, username: &str, editor: bool) -> Result<(), StorageError> {
        let result = sqlx::query("UPDATE users SET is_editor = ?2 WHERE username = ?1")
            .bind(username.to_owned())
            .bind(editor)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_all_users(&self) -> Result<(), StorageError> {
        // Scores cascade via the user_id foreign key.
        sqlx::query("DELETE FROM users")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}
