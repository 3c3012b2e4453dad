use ltm_store::{Database, UserIndex};

use crate::config::WorkflowConfig;
use crate::profiles::Principal;
use crate::service::ChatService;

pub const LAWYER: &str = "lawyer";

pub fn service() -> ChatService {
    ChatService::new(Database::open_in_memory().unwrap(), WorkflowConfig::default())
}

pub fn service_with_lawyer() -> ChatService {
    let config = WorkflowConfig {
        lawyer_user_id: Some(LAWYER.to_string()),
        ..WorkflowConfig::default()
    };
    ChatService::new(Database::open_in_memory().unwrap(), config)
}

pub fn principal(name: &str) -> Principal {
    Principal {
        user_id: name.to_string(),
        email: format!("{name}@example.com"),
        nickname: name.to_string(),
    }
}

pub fn signup(svc: &ChatService, name: &str) -> UserIndex {
    svc.ensure_user(&principal(name)).unwrap()
}
