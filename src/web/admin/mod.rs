mod moderation;
mod stats;

pub use moderation::{approve_journal, list_all_journals, list_pending_journals, reject_journal};
pub use stats::dashboard_stats;
