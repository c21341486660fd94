use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::json;
use uuid::Uuid;

use crate::error::Result;
use crate::models::test::Test;
use crate::models::user::User;

/// One user to tell about an assignment, optionally pointing at a session
/// that was already opened for them.
#[derive(Debug, Clone)]
pub struct NotifyTarget {
    pub user: User,
    pub session_id: Option<Uuid>,
}

impl NotifyTarget {
    pub fn new(user: User) -> Self {
        Self {
            user,
            session_id: None,
        }
    }

    pub fn relative_link(&self) -> String {
        match self.session_id {
            Some(id) => format!("/mytests/session/{}", id),
            None => "/mytests".to_string(),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AssignmentNotifier: Send + Sync {
    async fn notify_assignments(
        &self,
        test: &Test,
        targets: &[NotifyTarget],
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
    ) -> Result<()>;
}

/// Posts one JSON message per target to an outbound webhook (mail relay,
/// chat bot, ...).
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    target_url: String,
    base_url: String,
}

impl WebhookNotifier {
    pub fn new(target_url: String, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            target_url,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
        }
    }

    fn absolute(&self, path: &str) -> String {
        if self.base_url.is_empty() {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

#[async_trait]
impl AssignmentNotifier for WebhookNotifier {
    async fn notify_assignments(
        &self,
        test: &Test,
        targets: &[NotifyTarget],
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
    ) -> Result<()> {
        for target in targets {
            let user = &target.user;
            if user.email.trim().is_empty() {
                continue;
            }

            let payload = json!({
                "event": "test_assigned",
                "email": user.email,
                "name": user.name,
                "subject": format!("You have been assigned a test: {}", test.title),
                "test_id": test.id,
                "test_title": test.title,
                "duration_minutes": test.duration_minutes,
                "start_at": start_at,
                "end_at": end_at,
                "link": self.absolute(&target.relative_link()),
            });

            self.client
                .post(&self.target_url)
                .json(&payload)
                .send()
                .await?
                .error_for_status()?;
        }
        Ok(())
    }
}

/// Used when no webhook is configured.
pub struct LogNotifier;

#[async_trait]
impl AssignmentNotifier for LogNotifier {
    async fn notify_assignments(
        &self,
        test: &Test,
        targets: &[NotifyTarget],
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
    ) -> Result<()> {
        for target in targets {
            tracing::info!(
                test_id = %test.id,
                user_id = %target.user.id,
                link = %target.relative_link(),
                %start_at,
                %end_at,
                "Test assigned"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            name: "Ana".into(),
            email: "ana@example.com".into(),
            role: Default::default(),
            level: Default::default(),
            skill: "Rust".into(),
            team_id: String::new(),
            department: "Eng".into(),
        }
    }

    #[test]
    fn links_point_at_session_when_known() {
        let mut target = NotifyTarget::new(user());
        assert_eq!(target.relative_link(), "/mytests");

        let sid = Uuid::new_v4();
        target.session_id = Some(sid);
        assert_eq!(target.relative_link(), format!("/mytests/session/{}", sid));
    }

    #[test]
    fn links_are_made_absolute_with_base_url() {
        let notifier = WebhookNotifier::new("http://hook".into(), " https://hr.example.com/ ");
        assert_eq!(notifier.absolute("/mytests"), "https://hr.example.com/mytests");

        let bare = WebhookNotifier::new("http://hook".into(), "");
        assert_eq!(bare.absolute("/mytests"), "/mytests");
    }
}
