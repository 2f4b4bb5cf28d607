//! Caller identity passed explicitly into service calls

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The authenticated user on whose behalf a service call runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: Uuid,
    pub email: Option<String>,
}

impl Caller {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            email: None,
        }
    }
}
