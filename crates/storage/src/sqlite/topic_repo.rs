use mastery_core::model::{Topic, TopicId};

use super::SqliteRepository;
use super::mapping::{db_err, map_topic_row};
use crate::repository::{StorageError, TopicRepository};

#[async_trait::async_trait]
impl TopicRepository for SqliteRepository {
    async fn upsert_topic(&self, topic: &Topic) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO topics (id, title, description, prerequisites)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                prerequisites = excluded.prerequisites
            ",
        )
        .bind(topic.id().as_str().to_owned())
        .bind(topic.title().to_owned())
        .bind(topic.description().to_owned())
        .bind(topic.prerequisites().encode())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn get_topic(&self, id: &TopicId) -> Result<Option<Topic>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, title, description, prerequisites
            FROM topics
            WHERE id = ?1
            ",
        )
        .bind(id.as_str().to_owned())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(map_topic_row).transpose()
    }

    async fn list_topics(&self) -> Result<Vec<Topic>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, title, description, prerequisites
            FROM topics
            ORDER BY id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut topics = Vec::with_capacity(rows.len());
        for row in rows {
            topics.push(map_topic_row(&row)?);
        }
        Ok(topics)
    }

    async fn delete_topic(&self, id: &TopicId) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM topics WHERE id = ?1")
            .bind(id.as_str().to_owned())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
