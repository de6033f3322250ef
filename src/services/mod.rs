pub mod gamification_service;
pub mod level_curve;
pub mod partial_cache_service;
pub mod persist_scheduler;
pub mod progress_service;
pub mod quiz_grading_service;
pub mod quiz_session;
pub mod quiz_timer;
pub mod sync_forwarder;
pub mod topic_mastery_service;
