use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::models::question::{Question, QuestionBody};

/// Outcome of grading one answer. `fraction` is in `[0, 1]` and is always
/// zero for manually graded questions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grade {
    pub fraction: Decimal,
    pub auto_gradable: bool,
}

impl Grade {
    fn auto(fraction: Decimal) -> Self {
        Self {
            fraction,
            auto_gradable: true,
        }
    }

    fn manual() -> Self {
        Self {
            fraction: Decimal::ZERO,
            auto_gradable: false,
        }
    }
}

pub struct GradingService;

impl GradingService {
    pub fn grade(question: &Question, raw: Option<&str>) -> Grade {
        let raw = raw.unwrap_or("");

        match &question.body {
            QuestionBody::Mcq { correct_keys, .. } | QuestionBody::TrueFalse { correct_keys } => {
                let selected = raw.trim();
                if !selected.is_empty() && correct_keys.iter().any(|k| k == selected) {
                    Grade::auto(Decimal::ONE)
                } else {
                    Grade::auto(Decimal::ZERO)
                }
            }
            QuestionBody::Matching { pairs } => {
                if pairs.is_empty() {
                    return Grade::auto(Decimal::ZERO);
                }
                let given = parse_pairs(raw);
                let hits = pairs
                    .iter()
                    .filter(|p| given.get(p.left.trim()).is_some_and(|v| *v == p.right.trim()))
                    .count();
                Grade::auto(ratio(hits, pairs.len()))
            }
            QuestionBody::DragDrop { slots, .. } => {
                if slots.is_empty() {
                    return Grade::auto(Decimal::ZERO);
                }
                let given = parse_pairs(raw);
                let hits = slots
                    .iter()
                    .filter(|s| given.get(s.name.trim()).is_some_and(|v| *v == s.answer.trim()))
                    .count();
                Grade::auto(ratio(hits, slots.len()))
            }
            QuestionBody::Essay { .. } | QuestionBody::Unsupported => Grade::manual(),
        }
    }
}

fn ratio(hits: usize, of: usize) -> Decimal {
    Decimal::from(hits) / Decimal::from(of)
}

/// Parses `key=value|key=value`. Fragments without `=` are dropped; the last
/// occurrence of a key wins.
pub fn parse_pairs(raw: &str) -> HashMap<&str, &str> {
    raw.split('|')
        .filter_map(|fragment| fragment.split_once('='))
        .map(|(k, v)| (k.trim(), v.trim()))
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::{Difficulty, DragSlot, MatchPair};
    use uuid::Uuid;

    fn question(body: QuestionBody) -> Question {
        Question {
            id: Uuid::new_v4(),
            content: "q".into(),
            skill: "Rust".into(),
            difficulty: Difficulty::Middle,
            tags: vec![],
            body,
        }
    }

    fn pair(left: &str, right: &str) -> MatchPair {
        MatchPair {
            left: left.into(),
            right: right.into(),
        }
    }

    #[test]
    fn mcq_matches_any_correct_key() {
        let q = question(QuestionBody::Mcq {
            options: vec!["A".into(), "B".into(), "C".into()],
            correct_keys: vec!["A".into()],
        });
        assert_eq!(GradingService::grade(&q, Some("A")).fraction, Decimal::ONE);
        assert_eq!(GradingService::grade(&q, Some(" A ")).fraction, Decimal::ONE);
        assert_eq!(GradingService::grade(&q, Some("B")).fraction, Decimal::ZERO);
        assert_eq!(GradingService::grade(&q, Some("")).fraction, Decimal::ZERO);
        assert_eq!(GradingService::grade(&q, None).fraction, Decimal::ZERO);
    }

    #[test]
    fn true_false_uses_keys() {
        let q = question(QuestionBody::TrueFalse {
            correct_keys: vec!["False".into()],
        });
        assert_eq!(GradingService::grade(&q, Some("False")).fraction, Decimal::ONE);
        assert_eq!(GradingService::grade(&q, Some("True")).fraction, Decimal::ZERO);
    }

    #[test]
    fn matching_gives_partial_credit() {
        let q = question(QuestionBody::Matching {
            pairs: vec![pair("a", "1"), pair("b", "2"), pair("c", "3"), pair("d", "4")],
        });
        let grade = GradingService::grade(&q, Some("a=1| b = 2 |c=3|d=9|junk"));
        assert!(grade.auto_gradable);
        assert_eq!(grade.fraction, Decimal::new(75, 2));
    }

    #[test]
    fn matching_without_pairs_scores_zero() {
        let q = question(QuestionBody::Matching { pairs: vec![] });
        assert_eq!(GradingService::grade(&q, Some("a=1")).fraction, Decimal::ZERO);
    }

    #[test]
    fn drag_drop_counts_filled_slots() {
        let q = question(QuestionBody::DragDrop {
            tokens: vec!["fn".into(), "let".into()],
            slots: vec![
                DragSlot {
                    name: "s1".into(),
                    answer: "fn".into(),
                },
                DragSlot {
                    name: "s2".into(),
                    answer: "let".into(),
                },
            ],
        });
        assert_eq!(GradingService::grade(&q, Some("s1=fn")).fraction, Decimal::new(5, 1));
        assert_eq!(GradingService::grade(&q, Some("s2=let|s1=fn")).fraction, Decimal::ONE);
    }

    #[test]
    fn essays_and_unknown_types_are_manual() {
        let essay = question(QuestionBody::Essay { min_words: Some(50) });
        let grade = GradingService::grade(&essay, Some("my long answer"));
        assert!(!grade.auto_gradable);
        assert_eq!(grade.fraction, Decimal::ZERO);

        let other = question(QuestionBody::Unsupported);
        assert!(!GradingService::grade(&other, Some("x")).auto_gradable);
    }

    #[test]
    fn pair_parsing_ignores_fragments_without_separator() {
        let parsed = parse_pairs(" x = 1 |nothing|=2|y=");
        assert_eq!(parsed.get("x"), Some(&"1"));
        assert_eq!(parsed.get("y"), Some(&""));
        assert_eq!(parsed.len(), 2);
    }
}
