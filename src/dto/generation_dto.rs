use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::assignment::Assignment;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignRequest {
    pub test_id: Uuid,
    pub user_id: Uuid,
    pub start_at_utc: Option<DateTime<Utc>>,
    pub end_at_utc: Option<DateTime<Utc>>,
}

/// Parallel lists: `test_ids[i]` goes to `user_ids[i]`, which is how the
/// personalized generation result is usually fed back.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "same_length"))]
pub struct AssignAllRequest {
    #[validate(length(min = 1))]
    pub test_ids: Vec<Uuid>,
    pub user_ids: Vec<Uuid>,
    pub start_at_utc: Option<DateTime<Utc>>,
    pub end_at_utc: Option<DateTime<Utc>>,
}

impl AssignAllRequest {
    pub fn pairs(&self) -> Vec<(Uuid, Uuid)> {
        self.test_ids
            .iter()
            .copied()
            .zip(self.user_ids.iter().copied())
            .collect()
    }
}

fn same_length(req: &AssignAllRequest) -> Result<(), ValidationError> {
    if req.test_ids.len() == req.user_ids.len() {
        Ok(())
    } else {
        Err(ValidationError::new("test_ids_and_user_ids_must_match"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignAllResponse {
    pub created: usize,
    pub assignments: Vec<Assignment>,
}
