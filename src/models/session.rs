use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::question::Question;
use super::test::TestItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SessionStatus {
    Draft,
    Submitted,
    Graded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub test_id: Uuid,
    pub user_id: Uuid,
    pub status: SessionStatus,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub last_activity_at: DateTime<Utc>,

    pub consumed_seconds: i64,
    /// Present exactly while the timer is running.
    pub timer_started_at: Option<DateTime<Utc>>,

    pub auto_score: Decimal,
    pub manual_score: Decimal,
    pub total_score: Decimal,
    pub max_score: Decimal,
    pub percent: Decimal,
    pub is_passed: bool,

    pub snapshot: Vec<Question>,
    /// Points frozen for each snapshot question at start.
    pub items: Vec<TestItem>,
    #[serde(default)]
    pub answers: Vec<Answer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: Uuid,
    pub selected: Option<String>,
    pub text_answer: Option<String>,
    pub score: Decimal,
}

impl Session {
    pub fn is_running(&self) -> bool {
        self.timer_started_at.is_some()
    }

    pub fn has_essays(&self) -> bool {
        self.snapshot
            .iter()
            .any(|q| !q.question_type().is_auto_gradable())
    }

    pub fn points_for(&self, question_id: Uuid) -> Decimal {
        self.items
            .iter()
            .find(|i| i.question_id == question_id)
            .map(|i| i.points)
            .unwrap_or(Decimal::ZERO)
    }

    /// Whole seconds spent so far, including the currently running stretch.
    pub fn consumed_at(&self, now: DateTime<Utc>) -> i64 {
        let running = self
            .timer_started_at
            .map(|started| (now - started).num_seconds().max(0))
            .unwrap_or(0);
        (self.consumed_seconds + running).max(0)
    }

    pub fn remaining_seconds(&self, duration_minutes: i32, now: DateTime<Utc>) -> i64 {
        let total = i64::from(duration_minutes.max(1)) * 60;
        (total - self.consumed_at(now)).max(0)
    }

    /// Folds the running stretch into `consumed_seconds` and stops the timer.
    /// Returns `false` when the timer was already stopped.
    pub fn pause_timer(&mut self, now: DateTime<Utc>) -> bool {
        let Some(started) = self.timer_started_at.take() else {
            return false;
        };
        let delta = (now - started).num_seconds().max(0);
        self.consumed_seconds += delta;
        true
    }

    /// Starts the timer unless it is already running. Returns `false` when it
    /// was running.
    pub fn start_timer(&mut self, now: DateTime<Utc>) -> bool {
        if self.timer_started_at.is_some() {
            return false;
        }
        self.timer_started_at = Some(now);
        true
    }
}
