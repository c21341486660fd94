pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use crate::config::Config;
use crate::database::Stores;
use crate::services::{
    generation_service::GenerationService,
    notification_service::{AssignmentNotifier, LogNotifier, WebhookNotifier},
    session_service::SessionService,
};
use crate::utils::{
    random::RandomSource,
    time::{Clock, SystemClock},
};

#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    pub generation_service: GenerationService,
    pub session_service: SessionService,
    pub jwt_secret: Arc<str>,
}

impl AppState {
    pub fn new(
        stores: Stores,
        notifier: Arc<dyn AssignmentNotifier>,
        clock: Arc<dyn Clock>,
        random: Arc<RandomSource>,
        jwt_secret: &str,
    ) -> Self {
        let generation_service =
            GenerationService::new(&stores, notifier, clock.clone(), random.clone());
        let session_service = SessionService::new(&stores, clock, random);

        Self {
            stores,
            generation_service,
            session_service,
            jwt_secret: Arc::from(jwt_secret),
        }
    }

    pub fn from_config(stores: Stores, config: &Config) -> Self {
        let notifier: Arc<dyn AssignmentNotifier> = match &config.assignment_webhook_url {
            Some(url) => Arc::new(WebhookNotifier::new(url.clone(), &config.app_base_url)),
            None => Arc::new(LogNotifier),
        };

        Self::new(
            stores,
            notifier,
            Arc::new(SystemClock::new()),
            Arc::new(RandomSource::from_optional_seed(config.rng_seed)),
            &config.jwt_secret,
        )
    }
}
