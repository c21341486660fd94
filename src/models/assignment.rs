use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::User;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Uuid,
    pub test_id: Uuid,
    pub target_type: AssignmentTarget,
    pub target_value: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentTarget {
    User,
    Role,
    Team,
}

impl Assignment {
    pub fn for_user(
        test_id: Uuid,
        user_id: Uuid,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            test_id,
            target_type: AssignmentTarget::User,
            target_value: user_id.to_string(),
            start_at,
            end_at,
        }
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.start_at <= now && now <= self.end_at
    }

    pub fn targets(&self, user: &User) -> bool {
        match self.target_type {
            AssignmentTarget::User => self.target_value == user.id.to_string(),
            AssignmentTarget::Role => self.target_value.eq_ignore_ascii_case(user.role.as_str()),
            AssignmentTarget::Team => !user.team_id.is_empty() && self.target_value == user.team_id,
        }
    }
}
