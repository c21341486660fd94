use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use crate::database::repository::Repository;
use crate::database::Stores;
use crate::error::{Error, Result};
use crate::models::assignment::Assignment;
use crate::models::generation::{DifficultyPolicy, GenerationOptions, TargetMode};
use crate::models::question::{Difficulty, Question, QuestionType};
use crate::models::test::{Test, TestItem};
use crate::models::user::User;
use crate::services::notification_service::{AssignmentNotifier, NotifyTarget};
use crate::services::pool_selector::{self, InsufficientPool};
use crate::services::score_allocator::{self, AllocationInput};
use crate::utils::random::RandomSource;
use crate::utils::time::Clock;

const MIN_DURATION_MINUTES: i32 = 10;
const MINUTES_PER_QUESTION: i32 = 2;
const TOP_SKILLS: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedTest {
    pub test: Test,
    pub items: Vec<TestItem>,
    pub targets: Vec<User>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PersonalizedTest {
    pub user: User,
    pub test: Test,
    pub items: Vec<TestItem>,
}

#[derive(Clone)]
pub struct GenerationService {
    questions: Arc<dyn Repository<Question>>,
    tests: Arc<dyn Repository<Test>>,
    users: Arc<dyn Repository<User>>,
    assignments: Arc<dyn Repository<Assignment>>,
    notifier: Arc<dyn AssignmentNotifier>,
    clock: Arc<dyn Clock>,
    random: Arc<RandomSource>,
}

impl GenerationService {
    pub fn new(
        stores: &Stores,
        notifier: Arc<dyn AssignmentNotifier>,
        clock: Arc<dyn Clock>,
        random: Arc<RandomSource>,
    ) -> Self {
        Self {
            questions: stores.questions.clone(),
            tests: stores.tests.clone(),
            users: stores.users.clone(),
            assignments: stores.assignments.clone(),
            notifier,
            clock,
            random,
        }
    }

    /// One shared draft test for a department or an explicit user list.
    pub async fn generate(
        &self,
        options: &GenerationOptions,
        actor: &str,
    ) -> Result<GeneratedTest> {
        options.validate()?;
        let targets = self.resolve_targets(options).await?;

        let skills = options
            .explicit_skills()
            .unwrap_or_else(|| top_skills(&targets, TOP_SKILLS));
        let level = majority_level(&targets);

        let all = self.questions.get_all().await?;
        let picked = self.select(&all, &skills, level, options, None)?;

        let title = format!(
            "Auto - Dept/Group - {} - Level:{}",
            skills.join(","),
            level
        );
        let test = self.draft_test(title, &picked, options, actor);
        self.tests.insert(test.clone()).await?;

        tracing::info!(
            "Generated test {} with {} questions for {} users",
            test.id,
            test.items.len(),
            targets.len()
        );

        Ok(GeneratedTest {
            items: test.items.clone(),
            test,
            targets,
        })
    }

    /// One draft test per target user, built from that user's own skill and
    /// level. Nothing is stored unless every user's test can be built.
    pub async fn generate_personalized(
        &self,
        options: &GenerationOptions,
        actor: &str,
    ) -> Result<Vec<PersonalizedTest>> {
        options.validate()?;
        let targets = self.resolve_targets(options).await?;
        let all = self.questions.get_all().await?;

        let mut results = Vec::with_capacity(targets.len());
        for user in targets {
            let skills = options.explicit_skills().unwrap_or_else(|| {
                let own = user.skill.trim();
                if own.is_empty() {
                    Vec::new()
                } else {
                    vec![own.to_string()]
                }
            });

            let picked = self.select(&all, &skills, user.level, options, Some(&user))?;
            let title = format!("Auto - {} - {} - {}", user.name, user.skill, user.level);
            let test = self.draft_test(title, &picked, options, actor);

            results.push(PersonalizedTest {
                items: test.items.clone(),
                test,
                user,
            });
        }

        for result in &results {
            self.tests.insert(result.test.clone()).await?;
        }

        tracing::info!("Generated {} personalized tests", results.len());
        Ok(results)
    }

    /// Group generation, then publish and assign the test to every target.
    pub async fn generate_and_assign(
        &self,
        options: &GenerationOptions,
        actor: &str,
    ) -> Result<GeneratedTest> {
        let (start_at, end_at) = self.window(options.start_at_utc, options.end_at_utc)?;
        let mut generated = self.generate(options, actor).await?;

        let now = self.clock.now();
        generated.test.publish(now);
        self.tests.save(generated.test.clone()).await?;

        for user in &generated.targets {
            self.assignments
                .insert(Assignment::for_user(generated.test.id, user.id, start_at, end_at))
                .await?;
        }

        let notify: Vec<NotifyTarget> = generated
            .targets
            .iter()
            .cloned()
            .map(NotifyTarget::new)
            .collect();
        self.notify(&generated.test, &notify, start_at, end_at).await;

        Ok(generated)
    }

    /// Publishes `test_id` if needed and assigns it to one user.
    pub async fn assign_test(
        &self,
        test_id: Uuid,
        user_id: Uuid,
        start_at: Option<DateTime<Utc>>,
        end_at: Option<DateTime<Utc>>,
    ) -> Result<Assignment> {
        let (start_at, end_at) = self.window(start_at, end_at)?;

        let mut test = self
            .tests
            .find_by_id(test_id)
            .await?
            .ok_or_else(|| Error::NotFound("Test not found".to_string()))?;
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| Error::NotFound("User not found".to_string()))?;

        if test.publish(self.clock.now()) {
            self.tests.save(test.clone()).await?;
        }

        let assignment = Assignment::for_user(test.id, user.id, start_at, end_at);
        self.assignments.insert(assignment.clone()).await?;

        self.notify(&test, &[NotifyTarget::new(user)], start_at, end_at)
            .await;
        Ok(assignment)
    }

    /// Assigns each `(test, user)` pair over one shared window. Pairs whose
    /// test no longer exists are skipped.
    pub async fn assign_all(
        &self,
        pairs: &[(Uuid, Uuid)],
        start_at: Option<DateTime<Utc>>,
        end_at: Option<DateTime<Utc>>,
    ) -> Result<Vec<Assignment>> {
        let (start_at, end_at) = self.window(start_at, end_at)?;

        let mut created = Vec::with_capacity(pairs.len());
        for &(test_id, user_id) in pairs {
            match self.assign_test(test_id, user_id, Some(start_at), Some(end_at)).await {
                Ok(assignment) => created.push(assignment),
                Err(Error::NotFound(msg)) => {
                    tracing::warn!(
                        "Skipping assignment of test {} to {}: {}",
                        test_id,
                        user_id,
                        msg
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(created)
    }

    pub async fn resolve_targets(&self, options: &GenerationOptions) -> Result<Vec<User>> {
        let users = self.users.get_all().await?;
        let targets = resolve_targets(users, options);
        if targets.is_empty() {
            return Err(Error::NoTargets);
        }
        Ok(targets)
    }

    fn select(
        &self,
        all: &[Question],
        skills: &[String],
        level: Difficulty,
        options: &GenerationOptions,
        user: Option<&User>,
    ) -> Result<Vec<Question>> {
        let mut pool = pool_selector::filter_by_skills(all, skills);
        if options.difficulty_policy != DifficultyPolicy::Any {
            pool = pool_selector::filter_by_level(&pool, level);
        }

        let (picked, missing) = self
            .random
            .with_rng(|rng| pool_selector::pick_with_fallback(&pool, all, skills, options, rng));

        if missing > 0 {
            let diag = InsufficientPool::new(missing, options, all, skills, &pool, user);
            if options.fail_when_insufficient {
                return Err(diag.into());
            }
            tracing::warn!("Accepting a short test: {}", diag);
        }
        Ok(picked)
    }

    fn draft_test(
        &self,
        title: String,
        picked: &[Question],
        options: &GenerationOptions,
        actor: &str,
    ) -> Test {
        let inputs: Vec<AllocationInput> = picked.iter().map(AllocationInput::from).collect();
        let allocation: HashMap<Uuid, Decimal> = score_allocator::allocate(
            &inputs,
            options.total_score,
            options.essay_reserved,
            options.required(QuestionType::Essay),
        )
        .into_iter()
        .map(|i| (i.question_id, i.points))
        .collect();

        let items: Vec<TestItem> = picked
            .iter()
            .map(|q| TestItem {
                question_id: q.id,
                points: allocation.get(&q.id).copied().unwrap_or(Decimal::ZERO),
            })
            .collect();

        let count = i32::try_from(picked.len()).unwrap_or(i32::MAX);
        Test {
            id: Uuid::new_v4(),
            title,
            duration_minutes: MIN_DURATION_MINUTES.max(count.saturating_mul(MINUTES_PER_QUESTION)),
            pass_score: (options.total_score / Decimal::TWO)
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero),
            shuffle_questions: true,
            total_max_score: options.total_score,
            question_ids: items.iter().map(|i| i.question_id).collect(),
            items,
            skill_filter: String::new(),
            random_mcq: 0,
            random_tf: 0,
            random_essay: 0,
            is_published: false,
            published_at: None,
            frozen_random: None,
            created_by: Some(actor.to_string()),
            created_at: self.clock.now(),
            updated_at: None,
        }
    }

    fn window(
        &self,
        start_at: Option<DateTime<Utc>>,
        end_at: Option<DateTime<Utc>>,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let now = self.clock.now();
        let start_at = start_at.unwrap_or(now - Duration::days(1));
        let end_at = end_at.unwrap_or(now + Duration::days(30));
        if end_at < start_at {
            return Err(Error::BadRequest(
                "Assignment window ends before it starts".to_string(),
            ));
        }
        Ok((start_at, end_at))
    }

    async fn notify(
        &self,
        test: &Test,
        targets: &[NotifyTarget],
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
    ) {
        if let Err(e) = self
            .notifier
            .notify_assignments(test, targets, start_at, end_at)
            .await
        {
            tracing::warn!("Failed to notify assignees of test {}: {}", test.id, e);
        }
    }
}

pub fn resolve_targets(users: Vec<User>, options: &GenerationOptions) -> Vec<User> {
    match options.mode {
        TargetMode::Users => {
            let ids: HashSet<Uuid> = options.user_ids.iter().flatten().copied().collect();
            users.into_iter().filter(|u| ids.contains(&u.id)).collect()
        }
        TargetMode::Department => {
            let dept = options.department.as_deref().unwrap_or("").trim().to_lowercase();
            users
                .into_iter()
                .filter(|u| u.department.trim().to_lowercase() == dept)
                .collect()
        }
    }
}

/// Counts keyed values, most frequent first; ties keep first-seen order.
fn ranked<K: Eq + std::hash::Hash + Clone>(values: impl Iterator<Item = K>) -> Vec<(K, usize)> {
    let mut order: Vec<(K, usize)> = Vec::new();
    let mut index: HashMap<K, usize> = HashMap::new();
    for value in values {
        match index.get(&value) {
            Some(&i) => order[i].1 += 1,
            None => {
                index.insert(value.clone(), order.len());
                order.push((value, 1));
            }
        }
    }
    order.sort_by(|a, b| b.1.cmp(&a.1));
    order
}

pub fn top_skills(users: &[User], n: usize) -> Vec<String> {
    ranked(
        users
            .iter()
            .map(|u| u.skill.trim().to_string())
            .filter(|s| !s.is_empty()),
    )
    .into_iter()
    .take(n)
    .map(|(skill, _)| skill)
    .collect()
}

pub fn majority_level(users: &[User]) -> Difficulty {
    ranked(users.iter().map(|u| u.level))
        .first()
        .map(|(level, _)| *level)
        .unwrap_or_default()
}
