use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::question::QuestionType;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GenerationOptions {
    #[serde(default)]
    pub mode: TargetMode,
    pub department: Option<String>,
    pub user_ids: Option<Vec<Uuid>>,

    pub skills: Option<Vec<String>>,
    #[serde(default)]
    pub difficulty_policy: DifficultyPolicy,

    #[serde(default = "default_mcq_count")]
    pub mcq_count: i32,
    #[serde(default = "default_tf_count")]
    pub tf_count: i32,
    #[serde(default)]
    pub matching_count: i32,
    #[serde(default)]
    pub drag_drop_count: i32,
    #[serde(default)]
    pub essay_count: i32,

    #[serde(default = "default_total_score")]
    #[validate(custom(function = "positive_score"))]
    pub total_score: Decimal,
    /// 0 lets the allocator pick its default essay budget.
    #[serde(default)]
    #[validate(custom(function = "non_negative_score"))]
    pub essay_reserved: Decimal,

    #[serde(default = "default_fail_when_insufficient")]
    pub fail_when_insufficient: bool,

    pub start_at_utc: Option<DateTime<Utc>>,
    pub end_at_utc: Option<DateTime<Utc>>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            mode: TargetMode::default(),
            department: None,
            user_ids: None,
            skills: None,
            difficulty_policy: DifficultyPolicy::default(),
            mcq_count: default_mcq_count(),
            tf_count: default_tf_count(),
            matching_count: 0,
            drag_drop_count: 0,
            essay_count: 0,
            total_score: default_total_score(),
            essay_reserved: Decimal::ZERO,
            fail_when_insufficient: default_fail_when_insufficient(),
            start_at_utc: None,
            end_at_utc: None,
        }
    }
}

impl GenerationOptions {
    /// Requested count for one question type; negative requests count as zero.
    pub fn required(&self, question_type: QuestionType) -> usize {
        let raw = match question_type {
            QuestionType::Mcq => self.mcq_count,
            QuestionType::TrueFalse => self.tf_count,
            QuestionType::Matching => self.matching_count,
            QuestionType::DragDrop => self.drag_drop_count,
            QuestionType::Essay => self.essay_count,
        };
        raw.max(0) as usize
    }

    pub fn required_total(&self) -> usize {
        QuestionType::ALL.iter().map(|t| self.required(*t)).sum()
    }

    /// Explicit skills with blanks removed; `None` when the caller gave none.
    pub fn explicit_skills(&self) -> Option<Vec<String>> {
        let skills: Vec<String> = self
            .skills
            .iter()
            .flatten()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if skills.is_empty() {
            None
        } else {
            Some(skills)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TargetMode {
    #[default]
    Department,
    Users,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DifficultyPolicy {
    #[default]
    ByLevel,
    Any,
}

/// Upper bound for point budgets; keeps allocator arithmetic far from
/// `Decimal` overflow.
pub const MAX_SCORE: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

fn default_mcq_count() -> i32 {
    8
}

fn default_tf_count() -> i32 {
    2
}

fn default_total_score() -> Decimal {
    Decimal::from(10)
}

fn default_fail_when_insufficient() -> bool {
    true
}

fn positive_score(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        Err(ValidationError::new("total_score_must_be_positive"))
    } else if *value > MAX_SCORE {
        Err(ValidationError::new("total_score_too_large"))
    } else {
        Ok(())
    }
}

fn non_negative_score(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        Err(ValidationError::new("essay_reserved_must_not_be_negative"))
    } else if *value > MAX_SCORE {
        Err(ValidationError::new("essay_reserved_too_large"))
    } else {
        Ok(())
    }
}
