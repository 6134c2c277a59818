use serde::{Deserialize, Serialize};

/// Fixed id of the single process-wide session state row.
pub const SESSION_STATE_ID: &str = "session_state";

/// Hard character cap on the Markovian summary.
pub const SESSION_SUMMARY_HARD_CAP: usize = 1200;

/// The rolling compressed session summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub summary: String,
    pub updated_at: i64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            summary: String::new(),
            updated_at: 0,
        }
    }
}
