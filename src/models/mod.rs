mod post;
mod progress;
mod question;
mod topic;

pub use post::RawPost;
pub use progress::{RunPhase, RunProgress};
pub use question::QuestionCandidate;
pub use topic::Topic;
