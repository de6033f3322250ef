pub mod gamification;
pub mod progress;
pub mod question;
pub mod quiz_config;
pub mod quiz_result;
pub mod sync;
pub mod topic;
pub use gamification::{Badge, GamificationSnapshot, GamificationState, LedgerEvent, LevelProgress};
pub use progress::{CachedPartial, ProgressSummary, COMPLETE};
pub use question::{Question, QuestionBank};
pub use quiz_config::QuizConfiguration;
pub use quiz_result::{QuestionOutcome, QuestionReview, QuizResult};
pub use sync::{QuizResultRecord, SyncIdentity, XpLogEntry};
pub use topic::{MasteryLevel, TopicCatalog, TopicInfo, TopicMasterySummary, TopicProgress};
