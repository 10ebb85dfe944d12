mod ids;
mod problem;
mod score;
mod topic;
mod user;

pub use ids::{ParseIdError, ProblemId, TopicId, UserId};
pub use problem::{Problem, ProblemError, decode_solutions, encode_solutions};
pub use score::{ATTEMPT_FLOOR, MASTERY_BAR, Score, ScoreError};
pub use topic::{Topic, TopicError};
pub use user::{DEFAULT_LANGUAGE, Role, RoleSet, User, UserError};
