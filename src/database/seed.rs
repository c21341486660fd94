use std::path::Path;

use serde::Deserialize;

use super::repository::{Entity, Repository};
use super::Stores;
use crate::error::Result;
use crate::models::{
    assignment::Assignment, question::Question, test::Test, user::User,
};

/// Initial data for an empty store. Every collection is optional.
#[derive(Debug, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub tests: Vec<Test>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub users: usize,
    pub questions: usize,
    pub tests: usize,
    pub assignments: usize,
}

pub async fn load_seed_file(stores: &Stores, path: &Path) -> Result<SeedSummary> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow::anyhow!("Cannot read seed file {}: {}", path.display(), e))?;
    let data: SeedData = serde_json::from_str(&raw)?;
    seed(stores, data).await
}

/// Fills each collection that is still empty; collections that already hold
/// data are left alone.
pub async fn seed(stores: &Stores, data: SeedData) -> Result<SeedSummary> {
    Ok(SeedSummary {
        users: seed_if_empty(stores.users.as_ref(), data.users).await?,
        questions: seed_if_empty(stores.questions.as_ref(), data.questions).await?,
        tests: seed_if_empty(stores.tests.as_ref(), data.tests).await?,
        assignments: seed_if_empty(stores.assignments.as_ref(), data.assignments).await?,
    })
}

async fn seed_if_empty<T: Entity>(repo: &dyn Repository<T>, items: Vec<T>) -> Result<usize> {
    if items.is_empty() || !repo.get_all().await?.is_empty() {
        return Ok(0);
    }
    let count = items.len();
    for item in items {
        repo.insert(item).await?;
    }
    tracing::info!("Seeded {} {} records", count, T::KIND);
    Ok(count)
}
