use std::collections::HashSet;
use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

use crate::models::generation::GenerationOptions;
use crate::models::question::{Difficulty, Question, QuestionType};
use crate::models::user::User;

/// Why a generation request could not be filled. Carried by
/// `Error::InsufficientPool` and rendered to the caller as-is.
#[derive(Debug, Clone, Serialize)]
pub struct InsufficientPool {
    pub requested: usize,
    pub available: usize,
    pub missing: usize,
    pub bank_total: usize,
    pub skill_filtered_total: usize,
    pub initial_pool_size: usize,
    pub user: Option<PoolTargetUser>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PoolTargetUser {
    pub id: Uuid,
    pub name: String,
    pub skill: String,
    pub level: Difficulty,
}

impl InsufficientPool {
    pub fn new(
        missing: usize,
        options: &GenerationOptions,
        all: &[Question],
        skills: &[String],
        initial_pool: &[Question],
        user: Option<&User>,
    ) -> Self {
        let requested = options.required_total();
        let skill_set = skill_set(skills);

        Self {
            requested,
            available: requested.saturating_sub(missing),
            missing,
            bank_total: distinct_ids(all.iter()),
            skill_filtered_total: distinct_ids(
                all.iter().filter(|q| skill_set.contains(&normalize(&q.skill))),
            ),
            initial_pool_size: distinct_ids(initial_pool.iter()),
            user: user.map(|u| PoolTargetUser {
                id: u.id,
                name: u.name.clone(),
                skill: u.skill.clone(),
                level: u.level,
            }),
        }
    }
}

impl fmt::Display for InsufficientPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(user) = &self.user {
            write!(f, "User: {} ({}/{}). ", user.name, user.skill, user.level)?;
        }
        write!(
            f,
            "Not enough questions to build the test: requested {} but only {} available \
             (bank: all={}, by skill={}, initial pool={}). \
             Try adding questions to the bank, broadening or filling in skills, \
             using difficulty policy Any, or requesting fewer questions.",
            self.requested,
            self.available,
            self.bank_total,
            self.skill_filtered_total,
            self.initial_pool_size
        )
    }
}

fn normalize(skill: &str) -> String {
    skill.trim().to_lowercase()
}

fn skill_set(skills: &[String]) -> HashSet<String> {
    skills
        .iter()
        .map(|s| normalize(s))
        .filter(|s| !s.is_empty())
        .collect()
}

fn distinct_ids<'a>(questions: impl Iterator<Item = &'a Question>) -> usize {
    questions.map(|q| q.id).collect::<HashSet<_>>().len()
}

/// Questions whose skill is in `skills`, case-insensitively. An empty skill
/// list filters nothing.
pub fn filter_by_skills(pool: &[Question], skills: &[String]) -> Vec<Question> {
    let set = skill_set(skills);
    if set.is_empty() {
        return pool.to_vec();
    }
    pool.iter()
        .filter(|q| set.contains(&normalize(&q.skill)))
        .cloned()
        .collect()
}

/// Whether a question of difficulty `question` suits a candidate at `level`.
pub fn is_allowed(question: Difficulty, level: Difficulty) -> bool {
    match question {
        Difficulty::Junior => matches!(level, Difficulty::Junior | Difficulty::Middle),
        Difficulty::Middle => true,
        Difficulty::Senior => matches!(level, Difficulty::Middle | Difficulty::Senior),
    }
}

pub fn filter_by_level(pool: &[Question], level: Difficulty) -> Vec<Question> {
    pool.iter()
        .filter(|q| is_allowed(q.difficulty, level))
        .cloned()
        .collect()
}

fn sample<'a, R: Rng + ?Sized>(
    candidates: impl Iterator<Item = &'a Question>,
    n: usize,
    rng: &mut R,
) -> Vec<&'a Question> {
    if n == 0 {
        return Vec::new();
    }
    let mut candidates: Vec<&Question> = candidates.collect();
    candidates.shuffle(rng);
    candidates.truncate(n);
    candidates
}

/// Picks the requested number of questions per type, relaxing the pool when it
/// runs short: first by dropping the per-type split inside the skill set, then
/// by drawing from the whole bank. Returns the picks and how many are still
/// missing.
pub fn pick_with_fallback<R: Rng + ?Sized>(
    initial_pool: &[Question],
    all: &[Question],
    skills: &[String],
    options: &GenerationOptions,
    rng: &mut R,
) -> (Vec<Question>, usize) {
    let need_total = options.required_total();
    let mut seen: HashSet<Uuid> = HashSet::new();
    let mut picked: Vec<Question> = Vec::new();

    for question_type in QuestionType::ALL {
        let need = options.required(question_type);
        let drawn = sample(
            initial_pool
                .iter()
                .filter(|q| q.question_type() == question_type),
            need,
            rng,
        );
        for q in drawn {
            if seen.insert(q.id) {
                picked.push(q.clone());
            }
        }
    }

    let missing = need_total.saturating_sub(picked.len());
    if missing == 0 {
        return (picked, 0);
    }

    let set = skill_set(skills);
    let by_skill = sample(
        all.iter()
            .filter(|q| set.contains(&normalize(&q.skill)) && !seen.contains(&q.id)),
        missing,
        rng,
    );
    for q in by_skill {
        if seen.insert(q.id) {
            picked.push(q.clone());
        }
    }

    let missing = need_total.saturating_sub(picked.len());
    if missing == 0 {
        return (picked, 0);
    }

    let any = sample(all.iter().filter(|q| !seen.contains(&q.id)), missing, rng);
    for q in any {
        if seen.insert(q.id) {
            picked.push(q.clone());
        }
    }

    let missing = need_total.saturating_sub(picked.len());
    (picked, missing)
}
