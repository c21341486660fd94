//! Point allocation for generated tests.
//!
//! Auto-graded questions share the non-essay budget in proportion to their
//! difficulty weight, rounded to cents with the largest-remainder method.
//! Essays split the reserved essay budget evenly. The result always sums to
//! the requested total (to the cent) and never contains negative points.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

use crate::models::question::{Difficulty, Question, QuestionType};
use crate::models::test::TestItem;

/// Essay budget used when essays are requested but nothing was reserved.
pub const DEFAULT_ESSAY_RESERVE: Decimal = Decimal::from_parts(2, 0, 0, false, 0);

const CENT: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

#[derive(Debug, Clone, Copy)]
pub struct AllocationInput {
    pub id: Uuid,
    pub question_type: QuestionType,
    pub difficulty: Difficulty,
}

impl From<&Question> for AllocationInput {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id,
            question_type: q.question_type(),
            difficulty: q.difficulty,
        }
    }
}

pub fn difficulty_weight(difficulty: Difficulty) -> Decimal {
    match difficulty {
        Difficulty::Junior => Decimal::new(10, 1),
        Difficulty::Middle => Decimal::new(12, 1),
        Difficulty::Senior => Decimal::new(15, 1),
    }
}

pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn floor2(value: Decimal) -> Decimal {
    (value * Decimal::ONE_HUNDRED).floor() / Decimal::ONE_HUNDRED
}

struct Share {
    id: Uuid,
    points: Decimal,
    remainder: Decimal,
}

/// Allocates `total_score` across `questions`, preserving input order with
/// auto-graded questions first and essays after them.
///
/// Empty input or a non-positive total yields an empty allocation. Identical
/// ordered input always yields identical output.
pub fn allocate(
    questions: &[AllocationInput],
    total_score: Decimal,
    essay_reserved: Decimal,
    essay_count: usize,
) -> Vec<TestItem> {
    if questions.is_empty() || total_score <= Decimal::ZERO {
        return Vec::new();
    }

    let (essays, autos): (Vec<&AllocationInput>, Vec<&AllocationInput>) = questions
        .iter()
        .partition(|q| q.question_type == QuestionType::Essay);

    let essay_reserved = if essay_count > 0 && essay_reserved <= Decimal::ZERO {
        DEFAULT_ESSAY_RESERVE
    } else {
        essay_reserved
    };
    // A reserve larger than the whole budget could not be honoured anyway.
    let essay_reserved = essay_reserved.min(total_score);

    let autos_budget = if autos.is_empty() {
        Decimal::ZERO
    } else {
        (total_score - essay_reserved).max(Decimal::ZERO)
    };

    let mut result = allocate_autos(&autos, autos_budget);

    if !essays.is_empty() {
        let essay_budget = if essay_reserved > Decimal::ZERO {
            essay_reserved
        } else {
            let used: Decimal = result.iter().map(|i| i.points).sum();
            (total_score - used).max(Decimal::ZERO)
        };
        let per_essay = if essay_budget > Decimal::ZERO {
            round2(essay_budget / Decimal::from(essays.len()))
        } else {
            Decimal::ZERO
        };
        result.extend(essays.iter().map(|e| TestItem {
            question_id: e.id,
            points: per_essay,
        }));
    }

    // Rounding drift lands on the first entry so the sum is exact.
    let sum: Decimal = result.iter().map(|i| i.points).sum();
    let diff = total_score - sum;
    if let Some(first) = result.first_mut() {
        if diff.abs() >= CENT {
            first.points = round2(first.points + diff);
        }
    }

    for item in result.iter_mut() {
        if item.points < Decimal::ZERO {
            item.points = Decimal::ZERO;
        }
    }

    // A clamped first entry cannot take a negative correction; later entries
    // give it up in order.
    let mut excess = result.iter().map(|i| i.points).sum::<Decimal>() - total_score;
    for item in result.iter_mut() {
        if excess <= Decimal::ZERO {
            break;
        }
        let take = excess.min(item.points);
        item.points -= take;
        excess -= take;
    }

    result
}

fn allocate_autos(autos: &[&AllocationInput], budget: Decimal) -> Vec<TestItem> {
    if autos.is_empty() {
        return Vec::new();
    }

    let weights: Vec<Decimal> = autos.iter().map(|a| difficulty_weight(a.difficulty)).collect();
    let mut sum_w: Decimal = weights.iter().sum();
    if sum_w <= Decimal::ZERO {
        sum_w = Decimal::from(autos.len());
    }

    let mut shares: Vec<Share> = autos
        .iter()
        .zip(&weights)
        .map(|(a, w)| {
            let raw = budget * *w / sum_w;
            let floored = floor2(raw);
            Share {
                id: a.id,
                points: floored,
                remainder: raw - floored,
            }
        })
        .collect();

    let assigned: Decimal = shares.iter().map(|s| s.points).sum();
    let mut remaining_cents = ((budget - assigned) * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(0)
        .max(0);

    let mut order: Vec<usize> = (0..shares.len()).collect();
    order.sort_by(|&a, &b| shares[b].remainder.cmp(&shares[a].remainder));
    for idx in order {
        if remaining_cents <= 0 {
            break;
        }
        shares[idx].points += CENT;
        remaining_cents -= 1;
    }

    shares
        .into_iter()
        .map(|s| TestItem {
            question_id: s.id,
            points: s.points,
        })
        .collect()
}
