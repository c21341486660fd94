use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::database::repository::Repository;
use crate::error::{Error, Result};
use crate::models::assignment::Assignment;
use crate::models::user::User;

#[derive(Clone)]
pub struct AssignmentService {
    assignments: Arc<dyn Repository<Assignment>>,
    users: Arc<dyn Repository<User>>,
}

impl AssignmentService {
    pub fn new(
        assignments: Arc<dyn Repository<Assignment>>,
        users: Arc<dyn Repository<User>>,
    ) -> Self {
        Self { assignments, users }
    }

    /// Tests the user may take at `now`, through a direct, role or team
    /// assignment.
    pub async fn available_test_ids(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<HashSet<Uuid>> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| Error::NotFound("User not found".to_string()))?;

        Ok(self
            .assignments
            .get_all()
            .await?
            .into_iter()
            .filter(|a| a.is_active_at(now) && a.targets(&user))
            .map(|a| a.test_id)
            .collect())
    }

    pub async fn is_available(
        &self,
        user_id: Uuid,
        test_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        Ok(self.available_test_ids(user_id, now).await?.contains(&test_id))
    }
}
