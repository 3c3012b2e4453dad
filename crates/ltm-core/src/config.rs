use ltm_shared::constants::{DEFAULT_LAWYER_INTRO, DEFAULT_LAWYER_NICKNAME};

/// Settings for the payment-driven workflows.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Identity subject of the designated lawyer who joins privileged
    /// groups. When unset, activation only flips the status.
    pub lawyer_user_id: Option<String>,
    /// Nickname used for the lawyer when they have no profile record.
    pub lawyer_nickname: String,
    /// Text posted by the lawyer when joining a group.
    pub lawyer_intro: String,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            lawyer_user_id: None,
            lawyer_nickname: DEFAULT_LAWYER_NICKNAME.to_string(),
            lawyer_intro: DEFAULT_LAWYER_INTRO.to_string(),
        }
    }
}

impl WorkflowConfig {
    pub fn is_lawyer(&self, user_id: &str) -> bool {
        self.lawyer_user_id.as_deref() == Some(user_id)
    }
}
