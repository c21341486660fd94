use async_trait::async_trait;
use tokio::sync::RwLock;

use super::repository::{Entity, Predicate, Repository};
use crate::error::Result;

/// Keeps entities in insertion order behind a single async lock.
pub struct MemoryRepository<T> {
    items: RwLock<Vec<T>>,
}

impl<T> MemoryRepository<T> {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
        }
    }

    pub fn with_items(items: Vec<T>) -> Self {
        Self {
            items: RwLock::new(items),
        }
    }
}

impl<T> Default for MemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Entity> Repository<T> for MemoryRepository<T> {
    async fn get_all(&self) -> Result<Vec<T>> {
        Ok(self.items.read().await.clone())
    }

    async fn first_or_default(&self, predicate: Predicate<'_, T>) -> Result<Option<T>> {
        Ok(self.items.read().await.iter().find(|e| predicate(e)).cloned())
    }

    async fn insert(&self, entity: T) -> Result<()> {
        self.items.write().await.push(entity);
        Ok(())
    }

    async fn upsert(&self, predicate: Predicate<'_, T>, entity: T) -> Result<()> {
        let mut items = self.items.write().await;
        match items.iter().position(|e| predicate(e)) {
            Some(idx) => items[idx] = entity,
            None => items.push(entity),
        }
        Ok(())
    }

    async fn update(&self, entity: T) -> Result<bool> {
        let mut items = self.items.write().await;
        let id = entity.id();
        match items.iter_mut().find(|e| e.id() == id) {
            Some(slot) => {
                *slot = entity;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, predicate: Predicate<'_, T>) -> Result<usize> {
        let mut items = self.items.write().await;
        let before = items.len();
        items.retain(|e| !predicate(e));
        Ok(before - items.len())
    }
}
