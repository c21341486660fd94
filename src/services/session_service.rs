use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::database::locks::KeyedLocks;
use crate::database::repository::Repository;
use crate::database::Stores;
use crate::error::{Error, Result};
use crate::models::question::{Question, QuestionType};
use crate::models::session::{Answer, Session, SessionStatus};
use crate::models::test::{Test, TestItem};
use crate::services::assignment_service::AssignmentService;
use crate::services::grading_service::GradingService;
use crate::services::score_allocator::round2;
use crate::utils::random::RandomSource;
use crate::utils::time::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimerStatus {
    pub remaining_seconds: i64,
    pub running: bool,
    pub at: DateTime<Utc>,
}

/// Who is reading a session: its owner, or grading staff who may see any.
#[derive(Debug, Clone, Copy)]
pub enum Viewer {
    Owner(Uuid),
    Staff,
}

#[derive(Clone)]
pub struct SessionService {
    questions: Arc<dyn Repository<Question>>,
    tests: Arc<dyn Repository<Test>>,
    sessions: Arc<dyn Repository<Session>>,
    assignments: AssignmentService,
    clock: Arc<dyn Clock>,
    random: Arc<RandomSource>,
    session_locks: KeyedLocks,
    start_locks: KeyedLocks,
}

impl SessionService {
    pub fn new(stores: &Stores, clock: Arc<dyn Clock>, random: Arc<RandomSource>) -> Self {
        Self {
            questions: stores.questions.clone(),
            tests: stores.tests.clone(),
            sessions: stores.sessions.clone(),
            assignments: AssignmentService::new(stores.assignments.clone(), stores.users.clone()),
            clock,
            random,
            session_locks: KeyedLocks::new(),
            start_locks: KeyedLocks::new(),
        }
    }

    /// Returns the session the user should work on for `test_id`: a finished
    /// one if it exists, else their latest draft, else a fresh draft with a
    /// new snapshot.
    pub async fn start(&self, test_id: Uuid, user_id: Uuid) -> Result<Session> {
        let _guard = self.start_locks.lock(user_id).await;

        let test = self.published_test(test_id).await?;
        let now = self.clock.now();
        if !self.assignments.is_available(user_id, test_id, now).await? {
            return Err(Error::Forbidden(
                "Test is not assigned to you at this time".to_string(),
            ));
        }

        let existing: Vec<Session> = self
            .sessions
            .get_all()
            .await?
            .into_iter()
            .filter(|s| s.user_id == user_id && s.test_id == test_id)
            .collect();

        if let Some(done) = existing
            .iter()
            .filter(|s| s.status != SessionStatus::Draft)
            .max_by_key(|s| s.end_at.unwrap_or(s.start_at))
        {
            return Ok(done.clone());
        }
        if let Some(draft) = existing
            .iter()
            .filter(|s| s.status == SessionStatus::Draft)
            .max_by_key(|s| s.last_activity_at)
        {
            return Ok(draft.clone());
        }

        let bank = self.questions.get_all().await?;
        let (snapshot, items) = self.build_snapshot(&test, &bank);
        let max_score: Decimal = items.iter().map(|i| i.points).sum();

        let session = Session {
            id: Uuid::new_v4(),
            test_id,
            user_id,
            status: SessionStatus::Draft,
            start_at: now,
            end_at: None,
            last_activity_at: now,
            consumed_seconds: 0,
            timer_started_at: Some(now),
            auto_score: Decimal::ZERO,
            manual_score: Decimal::ZERO,
            total_score: Decimal::ZERO,
            max_score,
            percent: Decimal::ZERO,
            is_passed: false,
            snapshot,
            items,
            answers: Vec::new(),
        };
        self.sessions.insert(session.clone()).await?;

        tracing::info!(
            "Started session {} for user {} on test {} ({} questions)",
            session.id,
            user_id,
            test_id,
            session.snapshot.len()
        );
        Ok(session)
    }

    fn build_snapshot(&self, test: &Test, bank: &[Question]) -> (Vec<Question>, Vec<TestItem>) {
        let by_id: HashMap<Uuid, &Question> = bank.iter().map(|q| (q.id, q)).collect();

        let mut picked: Vec<(Question, TestItem)> = if !test.items.is_empty() {
            resolve(test, &by_id, test.items.iter().copied())
        } else if !test.question_ids.is_empty() {
            let items = test.question_ids.iter().map(|&id| TestItem {
                question_id: id,
                points: Decimal::ONE,
            });
            resolve(test, &by_id, items)
        } else {
            self.random_draw(test, bank)
        };

        if test.shuffle_questions {
            self.random.with_rng(|rng| picked.shuffle(rng));
        }
        picked.into_iter().unzip()
    }

    fn random_draw(&self, test: &Test, bank: &[Question]) -> Vec<(Question, TestItem)> {
        let (skill, mcq, tf, essay) = match &test.frozen_random {
            Some(f) => (f.skill_filter.as_str(), f.random_mcq, f.random_tf, f.random_essay),
            None => (
                test.skill_filter.as_str(),
                test.random_mcq,
                test.random_tf,
                test.random_essay,
            ),
        };
        let skill = skill.trim();

        let mut out = Vec::new();
        for (question_type, count) in [
            (QuestionType::Mcq, mcq),
            (QuestionType::TrueFalse, tf),
            (QuestionType::Essay, essay),
        ] {
            let mut pool: Vec<&Question> = bank
                .iter()
                .filter(|q| q.question_type() == question_type)
                .filter(|q| skill.is_empty() || q.has_skill(skill))
                .collect();
            self.random.with_rng(|rng| pool.shuffle(rng));
            out.extend(pool.into_iter().take(count as usize).map(|q| {
                (
                    q.clone(),
                    TestItem {
                        question_id: q.id,
                        points: Decimal::ONE,
                    },
                )
            }));
        }
        out
    }

    pub async fn touch(&self, session_id: Uuid, user_id: Uuid) -> Result<TimerStatus> {
        let _guard = self.session_locks.lock(session_id).await;
        let mut session = self.owned_session(session_id, user_id).await?;
        let test = self.test_of(&session).await?;

        let now = self.clock.now();
        session.last_activity_at = now;
        self.write_back(&session).await?;

        Ok(status_of(&session, &test, now))
    }

    pub async fn pause(&self, session_id: Uuid, user_id: Uuid) -> Result<TimerStatus> {
        let _guard = self.session_locks.lock(session_id).await;
        let mut session = self.owned_session(session_id, user_id).await?;
        let test = self.test_of(&session).await?;

        let now = self.clock.now();
        if session.pause_timer(now) {
            session.last_activity_at = now;
            self.write_back(&session).await?;
            tracing::debug!("Paused session {} at {}s", session.id, session.consumed_seconds);
        }

        Ok(status_of(&session, &test, now))
    }

    /// Restarts the timer of a draft that still has time left. Finished or
    /// expired sessions report a stopped timer instead.
    pub async fn resume(&self, session_id: Uuid, user_id: Uuid) -> Result<TimerStatus> {
        let _guard = self.session_locks.lock(session_id).await;
        let mut session = self.owned_session(session_id, user_id).await?;
        let test = self.test_of(&session).await?;

        let now = self.clock.now();
        let remaining = session.remaining_seconds(test.duration_minutes, now);
        if remaining <= 0 || session.status != SessionStatus::Draft {
            return Ok(TimerStatus {
                remaining_seconds: remaining,
                running: false,
                at: now,
            });
        }

        if session.start_timer(now) {
            session.last_activity_at = now;
            self.write_back(&session).await?;
            tracing::debug!("Resumed session {}", session.id);
        }

        Ok(status_of(&session, &test, now))
    }

    pub async fn timer_status(&self, session_id: Uuid, user_id: Uuid) -> Result<TimerStatus> {
        let session = self.owned_session(session_id, user_id).await?;
        let test = self.test_of(&session).await?;
        Ok(status_of(&session, &test, self.clock.now()))
    }

    /// Grades a draft and closes it. Submitting a session that is no longer a
    /// draft returns it unchanged. Late submissions are accepted.
    pub async fn submit(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        answers: &HashMap<Uuid, String>,
    ) -> Result<Session> {
        let _guard = self.session_locks.lock(session_id).await;
        let mut session = self.owned_session(session_id, user_id).await?;
        if session.status != SessionStatus::Draft {
            return Ok(session);
        }
        let pass_score = self.pass_score_of(&session).await?;

        let mut auto_score = Decimal::ZERO;
        let mut auto_max = Decimal::ZERO;
        let mut manual_max = Decimal::ZERO;
        let mut graded = Vec::with_capacity(session.snapshot.len());

        for question in &session.snapshot {
            let raw = answers.get(&question.id).map(String::as_str);
            let points = session.points_for(question.id);
            let grade = GradingService::grade(question, raw);

            if grade.auto_gradable {
                let score = grade.fraction * points;
                auto_score += score;
                auto_max += points;
                graded.push(Answer {
                    question_id: question.id,
                    selected: raw.map(str::to_string),
                    text_answer: None,
                    score,
                });
            } else {
                manual_max += points;
                graded.push(Answer {
                    question_id: question.id,
                    selected: None,
                    text_answer: raw.map(str::to_string),
                    score: Decimal::ZERO,
                });
            }
        }

        let now = self.clock.now();
        session.pause_timer(now);
        session.status = SessionStatus::Submitted;
        session.end_at = Some(now);
        session.last_activity_at = now;
        session.answers = graded;
        session.auto_score = round2(auto_score);
        session.manual_score = Decimal::ZERO;
        session.max_score = round2(auto_max + manual_max);
        finalize(&mut session, pass_score);

        self.write_back(&session).await?;

        let (owner, test_id, kept) = (session.user_id, session.test_id, session.id);
        let stale = move |s: &Session| {
            s.user_id == owner
                && s.test_id == test_id
                && s.id != kept
                && s.status == SessionStatus::Draft
        };
        let removed = self.sessions.delete(&stale).await?;
        if removed > 0 {
            tracing::debug!("Removed {} stale drafts after submitting {}", removed, session.id);
        }

        tracing::info!(
            "Session {} submitted: {}/{} ({}%)",
            session.id,
            session.total_score,
            session.max_score,
            session.percent
        );
        Ok(session)
    }

    /// Records essay scores for a submitted session and marks it graded. Can
    /// be repeated; every call recomputes the totals.
    pub async fn grade_essays(
        &self,
        session_id: Uuid,
        scores: &HashMap<Uuid, Decimal>,
    ) -> Result<Session> {
        let _guard = self.session_locks.lock(session_id).await;
        let mut session = self.find(session_id).await?;
        if session.status == SessionStatus::Draft {
            return Err(Error::BadRequest(
                "Session has not been submitted yet".to_string(),
            ));
        }

        let essay_ids: Vec<Uuid> = session
            .snapshot
            .iter()
            .filter(|q| !q.question_type().is_auto_gradable())
            .map(|q| q.id)
            .collect();
        if let Some(bad) = scores.keys().find(|id| !essay_ids.contains(*id)) {
            return Err(Error::BadRequest(format!(
                "Question {} is not an essay in this session",
                bad
            )));
        }

        for (&question_id, &raw) in scores {
            let max = session.points_for(question_id);
            let score = raw.max(Decimal::ZERO).min(max);
            match session.answers.iter_mut().find(|a| a.question_id == question_id) {
                Some(answer) => answer.score = score,
                None => session.answers.push(Answer {
                    question_id,
                    selected: None,
                    text_answer: Some(String::new()),
                    score,
                }),
            }
        }

        session.manual_score = round2(
            session
                .answers
                .iter()
                .filter(|a| essay_ids.contains(&a.question_id))
                .map(|a| a.score)
                .sum(),
        );
        let pass_score = self.pass_score_of(&session).await?;
        finalize(&mut session, pass_score);
        session.status = SessionStatus::Graded;
        session.last_activity_at = self.clock.now();

        self.write_back(&session).await?;
        tracing::info!(
            "Session {} graded: manual {} total {}",
            session.id,
            session.manual_score,
            session.total_score
        );
        Ok(session)
    }

    pub async fn get_session(&self, session_id: Uuid, viewer: Viewer) -> Result<Session> {
        match viewer {
            Viewer::Owner(user_id) => self.owned_session(session_id, user_id).await,
            Viewer::Staff => self.find(session_id).await,
        }
    }

    /// Submitted or graded sessions that contain essays, newest first.
    pub async fn list_pending_grading(&self) -> Result<Vec<Session>> {
        let mut list: Vec<Session> = self
            .sessions
            .get_all()
            .await?
            .into_iter()
            .filter(|s| s.status != SessionStatus::Draft && s.has_essays() && !s.items.is_empty())
            .collect();
        list.sort_by(|a, b| b.end_at.unwrap_or(b.start_at).cmp(&a.end_at.unwrap_or(a.start_at)));
        Ok(list)
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Session>> {
        let mut list: Vec<Session> = self
            .sessions
            .get_all()
            .await?
            .into_iter()
            .filter(|s| s.user_id == user_id)
            .collect();
        list.sort_by(|a, b| b.start_at.cmp(&a.start_at));
        Ok(list)
    }

    async fn find(&self, session_id: Uuid) -> Result<Session> {
        self.sessions
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| Error::NotFound("Session not found".to_string()))
    }

    /// Writes back a session read under its lock. A session deleted in the
    /// meantime, such as a stale draft removed by `submit`, stays deleted.
    async fn write_back(&self, session: &Session) -> Result<()> {
        if self.sessions.update(session.clone()).await? {
            Ok(())
        } else {
            Err(Error::NotFound("Session not found".to_string()))
        }
    }

    async fn owned_session(&self, session_id: Uuid, user_id: Uuid) -> Result<Session> {
        let session = self.find(session_id).await?;
        if session.user_id != user_id {
            return Err(Error::Forbidden("Session belongs to another user".to_string()));
        }
        Ok(session)
    }

    async fn published_test(&self, test_id: Uuid) -> Result<Test> {
        match self.tests.find_by_id(test_id).await? {
            Some(test) if test.is_published => Ok(test),
            _ => Err(Error::NotFound("Test not found".to_string())),
        }
    }

    async fn test_of(&self, session: &Session) -> Result<Test> {
        self.tests
            .find_by_id(session.test_id)
            .await?
            .ok_or_else(|| Error::NotFound("Test not found".to_string()))
    }

    async fn pass_score_of(&self, session: &Session) -> Result<Decimal> {
        Ok(self
            .tests
            .find_by_id(session.test_id)
            .await?
            .map(|t| t.pass_score)
            .unwrap_or(Decimal::ZERO))
    }
}

fn resolve(
    test: &Test,
    by_id: &HashMap<Uuid, &Question>,
    items: impl Iterator<Item = TestItem>,
) -> Vec<(Question, TestItem)> {
    items
        .filter_map(|item| match by_id.get(&item.question_id) {
            Some(q) => Some(((*q).clone(), item)),
            None => {
                tracing::warn!(
                    "Test {} references missing question {}, skipping",
                    test.id,
                    item.question_id
                );
                None
            }
        })
        .collect()
}

fn status_of(session: &Session, test: &Test, now: DateTime<Utc>) -> TimerStatus {
    TimerStatus {
        remaining_seconds: session.remaining_seconds(test.duration_minutes, now),
        running: session.is_running(),
        at: now,
    }
}

/// Recomputes total, percent and pass flag from the stored auto and manual
/// scores.
fn finalize(session: &mut Session, pass_score: Decimal) {
    session.total_score = round2(session.auto_score + session.manual_score);
    session.percent = if session.max_score > Decimal::ZERO {
        round2(session.total_score / session.max_score * Decimal::ONE_HUNDRED)
    } else {
        Decimal::ZERO
    };
    session.is_passed = session.total_score >= pass_score;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryRepository;
    use crate::models::assignment::Assignment;
    use crate::models::question::{Difficulty, MatchPair, QuestionBody};
    use crate::models::user::User;
    use crate::utils::time::ManualClock;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap()
    }

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

    fn mcq() -> Question {
        question(QuestionBody::Mcq {
            options: vec!["A".into(), "B".into()],
            correct_keys: vec!["A".into()],
        })
    }

    fn essay() -> Question {
        question(QuestionBody::Essay { min_words: None })
    }

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            name: "Lan".into(),
            email: "lan@example.com".into(),
            role: Default::default(),
            level: Difficulty::Middle,
            skill: "Rust".into(),
            team_id: String::new(),
            department: "Eng".into(),
        }
    }

    fn test_with(items: Vec<TestItem>, pass_score: Decimal, duration_minutes: i32) -> Test {
        Test {
            id: Uuid::new_v4(),
            title: "Rust basics".into(),
            duration_minutes,
            pass_score,
            shuffle_questions: false,
            total_max_score: items.iter().map(|i| i.points).sum(),
            question_ids: items.iter().map(|i| i.question_id).collect(),
            items,
            skill_filter: String::new(),
            random_mcq: 0,
            random_tf: 0,
            random_essay: 0,
            is_published: true,
            published_at: Some(t0()),
            frozen_random: None,
            created_by: Some("hr".into()),
            created_at: t0(),
            updated_at: None,
        }
    }

    fn item(q: &Question, points: i64) -> TestItem {
        TestItem {
            question_id: q.id,
            points: Decimal::from(points),
        }
    }

    struct Fixture {
        stores: Stores,
        clock: Arc<ManualClock>,
        service: SessionService,
        user: User,
    }

    fn fixture(questions: Vec<Question>, tests: Vec<Test>) -> Fixture {
        let user = user();
        let assignments: Vec<Assignment> = tests
            .iter()
            .map(|t| {
                Assignment::for_user(
                    t.id,
                    user.id,
                    t0() - Duration::days(1),
                    t0() + Duration::days(7),
                )
            })
            .collect();
        let stores = Stores {
            questions: Arc::new(MemoryRepository::with_items(questions)),
            tests: Arc::new(MemoryRepository::with_items(tests)),
            users: Arc::new(MemoryRepository::with_items(vec![user.clone()])),
            assignments: Arc::new(MemoryRepository::with_items(assignments)),
            ..Stores::in_memory()
        };
        let clock = Arc::new(ManualClock::new(t0()));
        let service =
            SessionService::new(&stores, clock.clone(), Arc::new(RandomSource::seeded(5)));
        Fixture {
            stores,
            clock,
            service,
            user,
        }
    }

    fn single_mcq() -> (Vec<Question>, Test) {
        let q = mcq();
        let test = test_with(vec![item(&q, 1)], Decimal::ONE, 10);
        (vec![q], test)
    }

    #[tokio::test]
    async fn start_requires_published_and_assigned_test() {
        let (qs, mut draft) = single_mcq();
        draft.is_published = false;
        let draft_id = draft.id;
        let (_, unassigned) = single_mcq();
        let f = fixture(qs, vec![draft]);
        f.stores.tests.insert(unassigned.clone()).await.unwrap();

        let err = f.service.start(draft_id, f.user.id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let err = f.service.start(unassigned.id, f.user.id).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[tokio::test]
    async fn snapshot_keeps_item_points_and_skips_missing_questions() {
        let a = mcq();
        let b = essay();
        let ghost = mcq();
        let test = test_with(vec![item(&a, 3), item(&ghost, 4), item(&b, 2)], Decimal::ONE, 10);
        let f = fixture(vec![a.clone(), b.clone()], vec![test.clone()]);

        let s = f.service.start(test.id, f.user.id).await.unwrap();

        assert_eq!(s.status, SessionStatus::Draft);
        assert_eq!(s.snapshot.len(), 2);
        assert_eq!(s.points_for(a.id), Decimal::from(3));
        assert_eq!(s.points_for(b.id), Decimal::from(2));
        assert_eq!(s.max_score, Decimal::from(5));
        assert_eq!(s.timer_started_at, Some(t0()));
        assert_eq!(s.consumed_seconds, 0);
    }

    #[tokio::test]
    async fn bare_ids_are_worth_one_point_each() {
        let (a, b) = (mcq(), mcq());
        let mut test = test_with(vec![], Decimal::ONE, 10);
        test.question_ids = vec![a.id, b.id];
        let f = fixture(vec![a, b], vec![test.clone()]);

        let s = f.service.start(test.id, f.user.id).await.unwrap();
        assert_eq!(s.items.len(), 2);
        assert!(s.items.iter().all(|i| i.points == Decimal::ONE));
        assert_eq!(s.max_score, Decimal::from(2));
    }

    #[tokio::test]
    async fn random_draw_uses_skill_filter_and_counts() {
        let mut bank: Vec<Question> = (0..5).map(|_| mcq()).collect();
        bank.extend((0..3).map(|_| essay()));
        let mut other = mcq();
        other.skill = "Go".into();
        bank.push(other.clone());

        let mut test = test_with(vec![], Decimal::ONE, 10);
        test.question_ids.clear();
        test.skill_filter = "rust".into();
        test.random_mcq = 3;
        test.random_essay = 1;
        test.shuffle_questions = true;
        let f = fixture(bank, vec![test.clone()]);

        let s = f.service.start(test.id, f.user.id).await.unwrap();
        assert_eq!(s.snapshot.len(), 4);
        assert!(s.snapshot.iter().all(|q| q.id != other.id));
        assert_eq!(
            s.snapshot
                .iter()
                .filter(|q| q.question_type() == QuestionType::Essay)
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn start_resumes_existing_draft_then_returns_result() {
        let (qs, test) = single_mcq();
        let f = fixture(qs, vec![test.clone()]);

        let first = f.service.start(test.id, f.user.id).await.unwrap();
        f.clock.advance(Duration::seconds(30));
        let again = f.service.start(test.id, f.user.id).await.unwrap();
        assert_eq!(first.id, again.id);

        f.service.submit(first.id, f.user.id, &HashMap::new()).await.unwrap();
        let after = f.service.start(test.id, f.user.id).await.unwrap();
        assert_eq!(after.id, first.id);
        assert_eq!(after.status, SessionStatus::Submitted);
        assert_eq!(f.stores.sessions.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stale_draft_stays_deleted_after_submit() {
        let (qs, test) = single_mcq();
        let f = fixture(qs, vec![test.clone()]);
        let kept = f.service.start(test.id, f.user.id).await.unwrap();
        let mut stale = kept.clone();
        stale.id = Uuid::new_v4();
        stale.last_activity_at = t0() - Duration::minutes(5);
        f.stores.sessions.insert(stale.clone()).await.unwrap();

        // read before the submit removes it, written after
        let read_early = f.stores.sessions.find_by_id(stale.id).await.unwrap().unwrap();
        f.service
            .submit(kept.id, f.user.id, &HashMap::new())
            .await
            .unwrap();
        let err = f.service.write_back(&read_early).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let err = f.service.pause(stale.id, f.user.id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(f.stores.sessions.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn pause_and_resume_are_idempotent() {
        let (qs, test) = single_mcq();
        let f = fixture(qs, vec![test.clone()]);
        let s = f.service.start(test.id, f.user.id).await.unwrap();
        let uid = f.user.id;

        f.clock.advance(Duration::seconds(20));
        let p1 = f.service.pause(s.id, uid).await.unwrap();
        let p2 = f.service.pause(s.id, uid).await.unwrap();
        assert_eq!(p1.remaining_seconds, 600 - 20);
        assert_eq!(p2.remaining_seconds, p1.remaining_seconds);
        assert!(!p2.running);

        f.clock.advance(Duration::seconds(300));
        let status = f.service.timer_status(s.id, uid).await.unwrap();
        assert_eq!(status.remaining_seconds, 580);

        let r1 = f.service.resume(s.id, uid).await.unwrap();
        let r2 = f.service.resume(s.id, uid).await.unwrap();
        assert!(r1.running && r2.running);
        assert_eq!(r1.remaining_seconds, 580);
        assert_eq!(r2.remaining_seconds, 580);

        f.clock.advance(Duration::seconds(10));
        let t = f.service.touch(s.id, uid).await.unwrap();
        assert_eq!(t.remaining_seconds, 570);
        let stored = f.stores.sessions.find_by_id(s.id).await.unwrap().unwrap();
        assert_eq!(stored.consumed_seconds, 20);
        assert_eq!(stored.last_activity_at, t0() + Duration::seconds(330));
    }

    #[tokio::test]
    async fn expired_session_cannot_resume_but_can_submit() {
        let (qs, test) = single_mcq();
        let qid = qs[0].id;
        let f = fixture(qs, vec![test.clone()]);
        let s = f.service.start(test.id, f.user.id).await.unwrap();

        f.clock.advance(Duration::seconds(200));
        f.service.pause(s.id, f.user.id).await.unwrap();
        f.clock.advance(Duration::minutes(20));
        f.service.resume(s.id, f.user.id).await.unwrap();
        f.clock.advance(Duration::minutes(15));

        let status = f.service.resume(s.id, f.user.id).await.unwrap();
        assert_eq!(status.remaining_seconds, 0);

        f.service.pause(s.id, f.user.id).await.unwrap();
        let status = f.service.resume(s.id, f.user.id).await.unwrap();
        assert!(!status.running);
        assert_eq!(status.remaining_seconds, 0);

        let answers = HashMap::from([(qid, "A".to_string())]);
        let done = f.service.submit(s.id, f.user.id, &answers).await.unwrap();
        assert_eq!(done.status, SessionStatus::Submitted);
        assert!(done.is_passed);
    }

    #[tokio::test]
    async fn other_users_are_forbidden() {
        let (qs, test) = single_mcq();
        let f = fixture(qs, vec![test.clone()]);
        let s = f.service.start(test.id, f.user.id).await.unwrap();
        let stranger = Uuid::new_v4();

        assert!(matches!(f.service.touch(s.id, stranger).await, Err(Error::Forbidden(_))));
        assert!(matches!(f.service.pause(s.id, stranger).await, Err(Error::Forbidden(_))));
        assert!(matches!(f.service.resume(s.id, stranger).await, Err(Error::Forbidden(_))));
        assert!(matches!(
            f.service.submit(s.id, stranger, &HashMap::new()).await,
            Err(Error::Forbidden(_))
        ));
        assert!(matches!(
            f.service.get_session(s.id, Viewer::Owner(stranger)).await,
            Err(Error::Forbidden(_))
        ));
        assert!(f.service.get_session(s.id, Viewer::Staff).await.is_ok());
        assert!(matches!(
            f.service.touch(Uuid::new_v4(), stranger).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn submit_grades_and_is_idempotent() {
        let m = mcq();
        let pairs = question(QuestionBody::Matching {
            pairs: vec![
                MatchPair { left: "a".into(), right: "1".into() },
                MatchPair { left: "b".into(), right: "2".into() },
                MatchPair { left: "c".into(), right: "3".into() },
                MatchPair { left: "d".into(), right: "4".into() },
            ],
        });
        let test = test_with(vec![item(&m, 2), item(&pairs, 4)], Decimal::from(4), 10);
        let f = fixture(vec![m.clone(), pairs.clone()], vec![test.clone()]);
        let s = f.service.start(test.id, f.user.id).await.unwrap();

        f.clock.advance(Duration::seconds(45));
        let answers = HashMap::from([
            (m.id, "A".to_string()),
            (pairs.id, "a=1|b=2|c=3|d=1".to_string()),
        ]);
        let done = f.service.submit(s.id, f.user.id, &answers).await.unwrap();

        assert_eq!(done.status, SessionStatus::Submitted);
        assert_eq!(done.auto_score, Decimal::from(5));
        assert_eq!(done.total_score, Decimal::from(5));
        assert_eq!(done.max_score, Decimal::from(6));
        assert_eq!(done.percent, "83.33".parse::<Decimal>().unwrap());
        assert!(done.is_passed);
        assert_eq!(done.end_at, Some(t0() + Duration::seconds(45)));
        assert!(!done.is_running());
        assert_eq!(done.consumed_seconds, 45);

        f.clock.advance(Duration::seconds(30));
        let wrong = HashMap::from([(m.id, "B".to_string())]);
        let again = f.service.submit(s.id, f.user.id, &wrong).await.unwrap();
        assert_eq!(again.total_score, done.total_score);
        assert_eq!(again.end_at, done.end_at);
        assert_eq!(again.answers.len(), 2);
    }

    #[tokio::test]
    async fn manual_grading_completes_the_score() {
        let (right, wrong, e) = (mcq(), mcq(), essay());
        let test = test_with(
            vec![item(&right, 1), item(&wrong, 1), item(&e, 2)],
            Decimal::from(5),
            10,
        );
        let f = fixture(vec![right.clone(), wrong.clone(), e.clone()], vec![test.clone()]);
        let s = f.service.start(test.id, f.user.id).await.unwrap();

        let early = f.service.grade_essays(s.id, &HashMap::from([(e.id, Decimal::ONE)])).await;
        assert!(matches!(early, Err(Error::BadRequest(_))));

        let answers = HashMap::from([
            (right.id, "A".to_string()),
            (wrong.id, "B".to_string()),
            (e.id, "Ownership moves values".to_string()),
        ]);
        let submitted = f.service.submit(s.id, f.user.id, &answers).await.unwrap();
        assert_eq!(submitted.auto_score, Decimal::ONE);
        assert_eq!(submitted.total_score, Decimal::ONE);
        assert_eq!(submitted.max_score, Decimal::from(4));
        assert_eq!(submitted.percent, Decimal::from(25));
        assert!(!submitted.is_passed);
        let essay_answer = submitted.answers.iter().find(|a| a.question_id == e.id).unwrap();
        assert_eq!(essay_answer.text_answer.as_deref(), Some("Ownership moves values"));

        let pending = f.service.list_pending_grading().await.unwrap();
        assert_eq!(pending.len(), 1);

        let graded = f
            .service
            .grade_essays(s.id, &HashMap::from([(e.id, Decimal::from(2))]))
            .await
            .unwrap();
        assert_eq!(graded.manual_score, Decimal::from(2));
        assert_eq!(graded.total_score, Decimal::from(3));
        assert_eq!(graded.percent, Decimal::from(75));
        assert!(!graded.is_passed);
        assert_eq!(graded.status, SessionStatus::Graded);

        // clamped to the item's points, and repeatable
        let regraded = f
            .service
            .grade_essays(s.id, &HashMap::from([(e.id, Decimal::from(9))]))
            .await
            .unwrap();
        assert_eq!(regraded.manual_score, Decimal::from(2));

        let not_essay = f
            .service
            .grade_essays(s.id, &HashMap::from([(right.id, Decimal::ONE)]))
            .await;
        assert!(matches!(not_essay, Err(Error::BadRequest(_))));
    }

    #[tokio::test]
    async fn concurrent_pause_resume_keep_timer_consistent() {
        let (qs, test) = single_mcq();
        let f = fixture(qs, vec![test.clone()]);
        let s = f.service.start(test.id, f.user.id).await.unwrap();
        f.clock.advance(Duration::seconds(5));

        let mut handles = Vec::new();
        for i in 0..16 {
            let svc = f.service.clone();
            let uid = f.user.id;
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    svc.pause(s.id, uid).await
                } else {
                    svc.resume(s.id, uid).await
                }
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let stored = f.stores.sessions.find_by_id(s.id).await.unwrap().unwrap();
        assert_eq!(stored.consumed_at(t0() + Duration::seconds(5)), 5);
        assert_eq!(f.stores.sessions.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_for_user_is_newest_first() {
        let (qa, ta) = single_mcq();
        let (qb, tb) = single_mcq();
        let mut qs = qa;
        qs.extend(qb);
        let f = fixture(qs, vec![ta.clone(), tb.clone()]);

        let first = f.service.start(ta.id, f.user.id).await.unwrap();
        f.clock.advance(Duration::minutes(1));
        let second = f.service.start(tb.id, f.user.id).await.unwrap();

        let list = f.service.list_for_user(f.user.id).await.unwrap();
        assert_eq!(list.iter().map(|s| s.id).collect::<Vec<_>>(), vec![second.id, first.id]);
        assert!(f.service.list_for_user(Uuid::new_v4()).await.unwrap().is_empty());
    }
}
