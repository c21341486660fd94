use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub content: String,
    #[serde(default)]
    pub skill: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub body: QuestionBody,
}

impl Question {
    pub fn question_type(&self) -> QuestionType {
        self.body.question_type()
    }

    pub fn has_skill(&self, skill: &str) -> bool {
        self.skill.trim().eq_ignore_ascii_case(skill.trim())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionType {
    #[serde(rename = "MCQ")]
    Mcq,
    TrueFalse,
    Matching,
    DragDrop,
    Essay,
}

impl QuestionType {
    pub const ALL: [QuestionType; 5] = [
        QuestionType::Mcq,
        QuestionType::TrueFalse,
        QuestionType::Matching,
        QuestionType::DragDrop,
        QuestionType::Essay,
    ];

    pub fn is_auto_gradable(self) -> bool {
        !matches!(self, QuestionType::Essay)
    }
}

/// Per-type payload of a question. Each variant only carries the fields its
/// grading rule reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QuestionBody {
    #[serde(rename = "MCQ")]
    Mcq {
        options: Vec<String>,
        correct_keys: Vec<String>,
    },
    TrueFalse {
        correct_keys: Vec<String>,
    },
    Matching {
        pairs: Vec<MatchPair>,
    },
    DragDrop {
        #[serde(default)]
        tokens: Vec<String>,
        slots: Vec<DragSlot>,
    },
    Essay {
        #[serde(default)]
        min_words: Option<u32>,
    },
    /// Any type tag this build does not recognise. Graded manually.
    #[serde(other)]
    Unsupported,
}

impl QuestionBody {
    pub fn question_type(&self) -> QuestionType {
        match self {
            QuestionBody::Mcq { .. } => QuestionType::Mcq,
            QuestionBody::TrueFalse { .. } => QuestionType::TrueFalse,
            QuestionBody::Matching { .. } => QuestionType::Matching,
            QuestionBody::DragDrop { .. } => QuestionType::DragDrop,
            QuestionBody::Essay { .. } | QuestionBody::Unsupported => QuestionType::Essay,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPair {
    pub left: String,
    pub right: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DragSlot {
    pub name: String,
    pub answer: String,
}

/// Question difficulty, also used as a candidate's level. Anything that is
/// not one of the three known names reads as `Middle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Difficulty {
    Junior,
    #[default]
    Middle,
    Senior,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Junior => "Junior",
            Difficulty::Middle => "Middle",
            Difficulty::Senior => "Senior",
        }
    }

    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "junior" => Difficulty::Junior,
            "senior" => Difficulty::Senior,
            _ => Difficulty::Middle,
        }
    }
}

impl From<String> for Difficulty {
    fn from(raw: String) -> Self {
        Difficulty::parse_lenient(&raw)
    }
}

impl From<Difficulty> for String {
    fn from(d: Difficulty) -> Self {
        d.as_str().to_string()
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_difficulty_reads_as_middle() {
        assert_eq!(Difficulty::parse_lenient("expert"), Difficulty::Middle);
        assert_eq!(Difficulty::parse_lenient(" senior "), Difficulty::Senior);
        let d: Difficulty = serde_json::from_value(json!("")).unwrap();
        assert_eq!(d, Difficulty::Middle);
    }

    #[test]
    fn question_body_is_tagged_by_type() {
        let q: Question = serde_json::from_value(json!({
            "id": Uuid::nil(),
            "content": "Pair them",
            "skill": "Rust",
            "difficulty": "Junior",
            "type": "Matching",
            "pairs": [{ "left": "a", "right": "1" }]
        }))
        .unwrap();
        assert_eq!(q.question_type(), QuestionType::Matching);
        assert_eq!(q.difficulty, Difficulty::Junior);
    }

    #[test]
    fn unrecognised_type_falls_back_to_manual_grading() {
        let q: Question = serde_json::from_value(json!({
            "id": Uuid::nil(),
            "content": "Draw a diagram",
            "type": "Whiteboard"
        }))
        .unwrap();
        assert!(matches!(q.body, QuestionBody::Unsupported));
        assert_eq!(q.question_type(), QuestionType::Essay);
    }
}
