pub mod locks;
pub mod memory;
pub mod pool;
pub mod postgres;
pub mod repository;
pub mod seed;

use std::sync::Arc;

use sqlx::PgPool;

use crate::models::{
    assignment::Assignment, question::Question, session::Session, test::Test, user::User,
};
use memory::MemoryRepository;
use postgres::PgRepository;
use repository::Repository;

/// One repository per entity type, shared by every service.
#[derive(Clone)]
pub struct Stores {
    pub questions: Arc<dyn Repository<Question>>,
    pub tests: Arc<dyn Repository<Test>>,
    pub sessions: Arc<dyn Repository<Session>>,
    pub users: Arc<dyn Repository<User>>,
    pub assignments: Arc<dyn Repository<Assignment>>,
    /// "memory" or "postgres".
    pub backend: &'static str,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            questions: Arc::new(MemoryRepository::<Question>::new()),
            tests: Arc::new(MemoryRepository::<Test>::new()),
            sessions: Arc::new(MemoryRepository::<Session>::new()),
            users: Arc::new(MemoryRepository::<User>::new()),
            assignments: Arc::new(MemoryRepository::<Assignment>::new()),
            backend: "memory",
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self {
            questions: Arc::new(PgRepository::<Question>::new(pool.clone())),
            tests: Arc::new(PgRepository::<Test>::new(pool.clone())),
            sessions: Arc::new(PgRepository::<Session>::new(pool.clone())),
            users: Arc::new(PgRepository::<User>::new(pool.clone())),
            assignments: Arc::new(PgRepository::<Assignment>::new(pool)),
            backend: "postgres",
        }
    }
}
