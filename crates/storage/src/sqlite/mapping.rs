use mastery_core::model::{
    Problem, ProblemId, Role, RoleSet, Score, Topic, TopicId, User, UserId, decode_solutions,
};
use mastery_core::prereq::PrereqList;
use sqlx::Row;

use crate::repository::StorageError;

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn db_err(e: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(ref db) = e {
        if db.is_unique_violation() || db.is_check_violation() || db.is_foreign_key_violation() {
            return StorageError::Conflict;
        }
    }
    StorageError::Connection(e.to_string())
}

pub(crate) fn count_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn map_topic_row(row: &sqlx::sqlite::SqliteRow) -> Result<Topic, StorageError> {
    let id: String = row.try_get("id").map_err(ser)?;
    let title: String = row.try_get("title").map_err(ser)?;
    let description: String = row.try_get("description").map_err(ser)?;
    let prerequisites: String = row.try_get("prerequisites").map_err(ser)?;

    Ok(Topic::from_parts(
        TopicId::new(id),
        title,
        description,
        PrereqList::decode(&prerequisites),
    ))
}

pub(crate) fn map_problem_row(row: &sqlx::sqlite::SqliteRow) -> Result<Problem, StorageError> {
    let id: String = row.try_get("id").map_err(ser)?;
    let topic_id: String = row.try_get("topic_id").map_err(ser)?;
    let text: String = row.try_get("text").map_err(ser)?;
    let solutions: String = row.try_get("solutions").map_err(ser)?;

    Ok(Problem::from_parts(
        ProblemId::new(id),
        TopicId::new(topic_id),
        text,
        decode_solutions(&solutions),
    ))
}

pub(crate) fn map_score_row(row: &sqlx::sqlite::SqliteRow) -> Result<Score, StorageError> {
    let user_id: i64 = row.try_get("user_id").map_err(ser)?;
    let topic_id: String = row.try_get("topic_id").map_err(ser)?;
    let problems_seen = count_from_i64(
        "problems_seen",
        row.try_get::<i64, _>("problems_seen").map_err(ser)?,
    )?;
    let correct_answers = count_from_i64(
        "correct_answers",
        row.try_get::<i64, _>("correct_answers").map_err(ser)?,
    )?;

    Score::from_persisted(
        UserId::new(user_id),
        TopicId::new(topic_id),
        problems_seen,
        correct_answers,
    )
    .map_err(ser)
}

pub(crate) fn map_user_row(row: &sqlx::sqlite::SqliteRow) -> Result<User, StorageError> {
    let id: i64 = row.try_get("id").map_err(ser)?;
    let username: String = row.try_get("username").map_err(ser)?;
    let email: Option<String> = row.try_get("email").map_err(ser)?;
    let password: String = row.try_get("password").map_err(ser)?;
    let language: String = row.try_get("language").map_err(ser)?;

    let mut roles = RoleSet::empty();
    roles.set(Role::Student, row.try_get::<bool, _>("is_student").map_err(ser)?);
    roles.set(Role::Teacher, row.try_get::<bool, _>("is_teacher").map_err(ser)?);
    roles.set(Role::Editor, row.try_get::<bool, _>("is_editor").map_err(ser)?);

    User::from_parts(UserId::new(id), username, email, password, language, roles).map_err(ser)
}
