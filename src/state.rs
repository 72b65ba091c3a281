use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{
    config::AppConfig,
    repository::{
        AuditSink, Catalog, OrderRepository, SettingsProvider, UserDirectory,
        memory::MemoryStore, postgres::PgStore,
    },
    services::{assignment::EmployeeRotator, pricing::PricingPolicy},
};

/// Shared handles for every request. Collaborators are trait objects so the
/// service layer runs the same against Postgres or the in-memory store.
#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<dyn OrderRepository>,
    pub catalog: Arc<dyn Catalog>,
    pub settings: Arc<dyn SettingsProvider>,
    pub users: Arc<dyn UserDirectory>,
    pub audit: Arc<dyn AuditSink>,
    pub rotator: Arc<EmployeeRotator>,
    pub pricing: PricingPolicy,
    pub jwt_secret: Arc<str>,
}

impl AppState {
    pub fn postgres(orm: DatabaseConnection, config: &AppConfig) -> Self {
        let store = Arc::new(PgStore::new(orm));
        Self {
            orders: store.clone(),
            catalog: store.clone(),
            settings: store.clone(),
            users: store.clone(),
            audit: store,
            rotator: Arc::new(EmployeeRotator::in_memory()),
            pricing: config.pricing_policy,
            jwt_secret: Arc::from(config.jwt_secret.as_str()),
        }
    }

    pub fn in_memory(store: Arc<MemoryStore>, pricing: PricingPolicy) -> Self {
        Self {
            orders: store.clone(),
            catalog: store.clone(),
            settings: store.clone(),
            users: store.clone(),
            audit: store,
            rotator: Arc::new(EmployeeRotator::in_memory()),
            pricing,
            jwt_secret: Arc::from("dev-secret"),
        }
    }
}
