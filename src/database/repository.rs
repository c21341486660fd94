use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    assignment::Assignment, question::Question, session::Session, test::Test, user::User,
};

/// A record the engine stores as one whole document.
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: &'static str;

    fn id(&self) -> Uuid;
}

pub type Predicate<'a, T> = &'a (dyn Fn(&T) -> bool + Send + Sync);

/// Key-addressable store for one entity type. Implementations write each
/// entity atomically; nothing here spans more than one entity type.
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    async fn get_all(&self) -> Result<Vec<T>>;

    async fn first_or_default(&self, predicate: Predicate<'_, T>) -> Result<Option<T>>;

    async fn insert(&self, entity: T) -> Result<()>;

    /// Replaces the first entity matching `predicate`, or appends `entity`.
    async fn upsert(&self, predicate: Predicate<'_, T>, entity: T) -> Result<()>;

    /// Returns the number of removed entities.
    async fn delete(&self, predicate: Predicate<'_, T>) -> Result<usize>;

    /// Replaces the entity with the same id. Returns `false`, writing nothing,
    /// when no such entity is stored any more.
    async fn update(&self, entity: T) -> Result<bool>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<T>> {
        let by_id = move |e: &T| e.id() == id;
        self.first_or_default(&by_id).await
    }

    async fn save(&self, entity: T) -> Result<()> {
        let id = entity.id();
        let by_id = move |e: &T| e.id() == id;
        self.upsert(&by_id, entity).await
    }
}

impl Entity for Question {
    const KIND: &'static str = "question";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Entity for Test {
    const KIND: &'static str = "test";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Entity for Session {
    const KIND: &'static str = "session";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Entity for User {
    const KIND: &'static str = "user";

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Entity for Assignment {
    const KIND: &'static str = "assignment";

    fn id(&self) -> Uuid {
        self.id
    }
}
