use mastery_core::model::{Problem, ProblemId, TopicId, encode_solutions};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{count_from_i64, db_err, map_problem_row};
use crate::repository::{ProblemRepository, StorageError};

#[async_trait::async_trait]
impl ProblemRepository for SqliteRepository {
    async fn upsert_problem(&self, problem: &Problem) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO problems (id, topic_id, text, solutions)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                topic_id = excluded.topic_id,
                text = excluded.text,
                solutions = excluded.solutions
            ",
        )
        .bind(problem.id().as_str().to_owned())
        .bind(problem.topic_id().as_str().to_owned())
        .bind(problem.text().to_owned())
        .bind(encode_solutions(problem.solutions()))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn get_problem(&self, id: &ProblemId) -> Result<Option<Problem>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, topic_id, text, solutions
            FROM problems
            WHERE id = ?1
            ",
        )
        .bind(id.as_str().to_owned())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(map_problem_row).transpose()
    }

    async fn list_problems(&self) -> Result<Vec<Problem>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, topic_id, text, solutions
            FROM problems
            ORDER BY id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut problems = Vec::with_capacity(rows.len());
        for row in rows {
            problems.push(map_problem_row(&row)?);
        }
        Ok(problems)
    }

    async fn problems_for_topic(&self, topic_id: &TopicId) -> Result<Vec<Problem>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, topic_id, text, solutions
            FROM problems
            WHERE topic_id = ?1
            ORDER BY id ASC
            ",
        )
        .bind(topic_id.as_str().to_owned())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut problems = Vec::with_capacity(rows.len());
        for row in rows {
            problems.push(map_problem_row(&row)?);
        }
        Ok(problems)
    }

    async fn count_for_topic(&self, topic_id: &TopicId) -> Result<u32, StorageError> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM problems WHERE topic_id = ?1")
            .bind(topic_id.as_str().to_owned())
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        let count: i64 = row
            .try_get("count")
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        count_from_i64("count", count)
    }

    async fn delete_problem(&self, id: &ProblemId) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM problems WHERE id = ?1")
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
