use mastery_core::model::{Score, TopicId, UserId};

use super::SqliteRepository;
use super::mapping::{db_err, map_score_row};
use crate::repository::{ScoreRepository, StorageError};

#[async_trait::async_trait]
impl ScoreRepository for SqliteRepository {
    async fn get_score(
        &self,
        user_id: UserId,
        topic_id: &TopicId,
    ) -> Result<Option<Score>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT user_id, topic_id, problems_seen, correct_answers
            FROM scores
            WHERE user_id = ?1 AND topic_id = ?2
            ",
        )
        .bind(user_id.value())
        .bind(topic_id.as_str().to_owned())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(map_score_row).transpose()
    }

    async fn scores_for_user(&self, user_id: UserId) -> Result<Vec<Score>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, topic_id, problems_seen, correct_answers
            FROM scores
            WHERE user_id = ?1
            ORDER BY topic_id ASC
            ",
        )
        .bind(user_id.value())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut scores = Vec::with_capacity(rows.len());
        for row in rows {
            scores.push(map_score_row(&row)?);
        }
        Ok(scores)
    }

    async fn list_scores(&self) -> Result<Vec<Score>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, topic_id, problems_seen, correct_answers
            FROM scores
            ORDER BY user_id ASC, topic_id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut scores = Vec::with_capacity(rows.len());
        for row in rows {
            scores.push(map_score_row(&row)?);
        }
        Ok(scores)
    }

    async fn apply_answer(
        &self,
        user_id: UserId,
        topic_id: &TopicId,
        correct: bool,
    ) -> Result<Score, StorageError> {
        // One statement, so racing submissions serialize inside SQLite
        // and neither increment is lost.
        let row = sqlx::query(
            r"
            INSERT INTO scores (user_id, topic_id, problems_seen, correct_answers)
            VALUES (?1, ?2, 1, ?3)
            ON CONFLICT(user_id, topic_id) DO UPDATE SET
                problems_seen = problems_seen + 1,
                correct_answers = correct_answers + ?3
            RETURNING user_id, topic_id, problems_seen, correct_answers
            ",
        )
        .bind(user_id.value())
        .bind(topic_id.as_str().to_owned())
        .bind(i64::from(correct))
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        map_score_row(&row)
    }

    async fn upsert_score(&self, score: &Score) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO scores (user_id, topic_id, problems_seen, correct_answers)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id, topic_id) DO UPDATE SET
                problems_seen = excluded.problems_seen,
                correct_answers = excluded.correct_answers
            ",
        )
        .bind(score.user_id().value())
        .bind(score.topic_id().as_str().to_owned())
        .bind(i64::from(score.problems_seen()))
        .bind(i64::from(score.correct_answers()))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }
}
