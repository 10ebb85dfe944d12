#![forbid(unsafe_code)]

pub mod graph;
pub mod model;
pub mod prereq;
pub mod progress;

pub use graph::would_create_cycle;
pub use model::{
    ATTEMPT_FLOOR, DEFAULT_LANGUAGE, MASTERY_BAR, ParseIdError, Problem, ProblemError, ProblemId,
    Role, RoleSet, Score, ScoreError, Topic, TopicError, TopicId, User, UserError, UserId,
    decode_solutions, encode_solutions,
};
pub use prereq::{LIST_DELIMITER, PrereqError, PrereqList};
pub use progress::{ActiveTopic, ProgressSnapshot, RECOMMENDATION_LIMIT, TopicState};
