use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::question::{Question, QuestionBody, QuestionType};
use crate::models::session::{Answer, Session, SessionStatus};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// Raw answer per question id. `null` counts as unanswered.
    #[serde(default)]
    pub answers: HashMap<Uuid, Option<String>>,
}

impl SubmitRequest {
    pub fn into_answers(self) -> HashMap<Uuid, String> {
        self.answers
            .into_iter()
            .filter_map(|(id, raw)| raw.map(|raw| (id, raw)))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub id: Uuid,
    pub status: SessionStatus,
    pub auto_score: Decimal,
    pub total_score: Decimal,
    pub max_score: Decimal,
    pub percent: Decimal,
    pub is_passed: bool,
    pub needs_manual_grading: bool,
}

impl From<&Session> for SubmitResponse {
    fn from(s: &Session) -> Self {
        Self {
            id: s.id,
            status: s.status,
            auto_score: s.auto_score,
            total_score: s.total_score,
            max_score: s.max_score,
            percent: s.percent,
            is_passed: s.is_passed,
            needs_manual_grading: s.status == SessionStatus::Submitted && s.has_essays(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GradeRequest {
    pub scores: HashMap<Uuid, Decimal>,
}

/// A snapshot question as the candidate sees it: no correct keys, and
/// matching/drag-drop answers listed apart from their prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionView {
    pub id: Uuid,
    pub content: String,
    pub skill: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub points: Decimal,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub options: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub prompts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub min_words: Option<u32>,
}

impl QuestionView {
    pub fn new(q: &Question, points: Decimal) -> Self {
        let (options, prompts, min_words) = match &q.body {
            QuestionBody::Mcq { options, .. } => (options.clone(), vec![], None),
            QuestionBody::TrueFalse { .. } => {
                (vec!["True".to_string(), "False".to_string()], vec![], None)
            }
            QuestionBody::Matching { pairs } => {
                let mut rights: Vec<String> = pairs.iter().map(|p| p.right.clone()).collect();
                rights.sort();
                (rights, pairs.iter().map(|p| p.left.clone()).collect(), None)
            }
            QuestionBody::DragDrop { tokens, slots } => {
                let mut tokens = tokens.clone();
                if tokens.is_empty() {
                    tokens = slots.iter().map(|s| s.answer.clone()).collect();
                }
                tokens.sort();
                tokens.dedup();
                (tokens, slots.iter().map(|s| s.name.clone()).collect(), None)
            }
            QuestionBody::Essay { min_words } => (vec![], vec![], *min_words),
            QuestionBody::Unsupported => (vec![], vec![], None),
        };

        Self {
            id: q.id,
            content: q.content.clone(),
            skill: q.skill.clone(),
            question_type: q.question_type(),
            points,
            options,
            prompts,
            min_words,
        }
    }
}

/// Candidate-facing session. Scores and answers appear once it is submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub id: Uuid,
    pub test_id: Uuid,
    pub status: SessionStatus,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub max_score: Decimal,
    pub questions: Vec<QuestionView>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub result: Option<SubmitResponse>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub answers: Vec<Answer>,
}

impl From<&Session> for SessionView {
    fn from(s: &Session) -> Self {
        let finished = s.status != SessionStatus::Draft;
        Self {
            id: s.id,
            test_id: s.test_id,
            status: s.status,
            start_at: s.start_at,
            end_at: s.end_at,
            max_score: s.items.iter().map(|i| i.points).sum(),
            questions: s
                .snapshot
                .iter()
                .map(|q| QuestionView::new(q, s.points_for(q.id)))
                .collect(),
            result: finished.then(|| SubmitResponse::from(s)),
            answers: if finished { s.answers.clone() } else { vec![] },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub test_id: Uuid,
    pub status: SessionStatus,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub total_score: Decimal,
    pub max_score: Decimal,
    pub percent: Decimal,
    pub is_passed: bool,
}

impl From<&Session> for SessionSummary {
    fn from(s: &Session) -> Self {
        Self {
            id: s.id,
            test_id: s.test_id,
            status: s.status,
            start_at: s.start_at,
            end_at: s.end_at,
            total_score: s.total_score,
            max_score: s.max_score,
            percent: s.percent,
            is_passed: s.is_passed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::{Difficulty, MatchPair};

    #[test]
    fn null_answers_are_dropped() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let req = SubmitRequest {
            answers: HashMap::from([(a, Some("A".to_string())), (b, None)]),
        };
        let answers = req.into_answers();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[&a], "A");
    }

    #[test]
    fn matching_view_hides_the_mapping() {
        let q = Question {
            id: Uuid::new_v4(),
            content: "Match".into(),
            skill: "Rust".into(),
            difficulty: Difficulty::Junior,
            tags: vec![],
            body: QuestionBody::Matching {
                pairs: vec![
                    MatchPair { left: "Vec".into(), right: "growable".into() },
                    MatchPair { left: "Box".into(), right: "heap".into() },
                ],
            },
        };
        let view = QuestionView::new(&q, Decimal::ONE);
        assert_eq!(view.prompts, vec!["Vec", "Box"]);
        assert_eq!(view.options, vec!["growable", "heap"]);

        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("pairs").is_none());
        assert_eq!(json["type"], "Matching");
    }
}
