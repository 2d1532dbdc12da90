pub mod conversation;
pub mod decision;
pub mod interview;
pub mod schedule_audit;
