//! Collaborator seams of the order core.
//!
//! Every external dependency the order workflow touches (order storage, the
//! food catalog, store settings, the user directory and the audit log) is a
//! trait here. `postgres` backs them with sea-orm/sqlx, `memory` keeps
//! everything in process.

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    audit::AuditEvent,
    error::AppResult,
    models::{FoodItem, MonthlyRevenue, Order, OrderStatus, Settings, StatusCount, UserProfile},
    routes::params::SortOrder,
};

pub mod memory;
pub mod postgres;

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub customer_id: Option<Uuid>,
    pub assigned_employee: Option<Uuid>,
    pub status: Option<OrderStatus>,
}

impl OrderFilter {
    pub fn for_customer(customer_id: Uuid) -> Self {
        Self {
            customer_id: Some(customer_id),
            ..Self::default()
        }
    }

    pub fn for_employee(employee_id: Uuid) -> Self {
        Self {
            assigned_employee: Some(employee_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.customer_id.is_none_or(|id| order.customer_id == id)
            && self
                .assigned_employee
                .is_none_or(|id| order.assigned_employee == Some(id))
            && self.status.is_none_or(|status| order.status == status)
    }
}

/// Window over a `created_at`-ordered order listing.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub limit: i64,
    pub offset: i64,
    pub sort_order: SortOrder,
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert(&self, order: &Order) -> AppResult<()>;

    async fn find(&self, id: Uuid) -> AppResult<Option<Order>>;

    /// Persists the mutable fields of `order` (status, assignee, PIN,
    /// `updated_at`) only while the stored status still equals `expected`.
    /// Returns `false` when another writer got there first.
    async fn update_if_status(&self, order: &Order, expected: OrderStatus) -> AppResult<bool>;

    /// Matching orders for the page plus the total number of matches.
    async fn list(&self, filter: &OrderFilter, page: PageRequest) -> AppResult<(Vec<Order>, i64)>;

    async fn count(&self) -> AppResult<i64>;

    /// One row per status that has at least one order.
    async fn count_by_status(&self) -> AppResult<Vec<StatusCount>>;

    async fn total_revenue(&self) -> AppResult<Decimal>;

    /// Revenue per (year, month) of `created_at` in UTC, ascending.
    async fn monthly_revenue(&self) -> AppResult<Vec<MonthlyRevenue>>;
}

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn lookup(&self, food_id: Uuid) -> AppResult<Option<FoodItem>>;
}

#[async_trait]
pub trait SettingsProvider: Send + Sync {
    async fn current_settings(&self) -> AppResult<Settings>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, id: Uuid) -> AppResult<Option<UserProfile>>;

    /// Active employees in a stable order (join date, then id).
    async fn list_active_employees(&self) -> AppResult<Vec<UserProfile>>;
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent) -> AppResult<()>;
}
