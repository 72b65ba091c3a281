//! In-process implementations of every collaborator, used by the test suite.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Datelike;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    AuditSink, Catalog, OrderFilter, OrderRepository, PageRequest, SettingsProvider, UserDirectory,
};
use crate::{
    audit::AuditEvent,
    error::{AppError, AppResult},
    models::{
        FoodItem, MonthlyRevenue, Order, OrderStatus, Role, Settings, StatusCount, UserProfile,
    },
    routes::params::SortOrder,
};

#[derive(Default)]
pub struct MemoryStore {
    orders: RwLock<HashMap<Uuid, Order>>,
    foods: RwLock<HashMap<Uuid, FoodItem>>,
    users: RwLock<HashMap<Uuid, UserProfile>>,
    settings: RwLock<Settings>,
    audit_events: RwLock<Vec<AuditEvent>>,
    fail_on_audit: RwLock<bool>,
    fail_on_update: RwLock<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_food(&self, food: FoodItem) {
        self.foods.write().await.insert(food.id, food);
    }

    pub async fn put_user(&self, user: UserProfile) {
        self.users.write().await.insert(user.id, user);
    }

    pub async fn set_settings(&self, settings: Settings) {
        *self.settings.write().await = settings;
    }

    pub async fn set_fail_on_audit(&self, fail: bool) {
        *self.fail_on_audit.write().await = fail;
    }

    pub async fn set_fail_on_update(&self, fail: bool) {
        *self.fail_on_update.write().await = fail;
    }

    /// Overwrites the stored status behind the workflow's back, as a
    /// concurrent writer would.
    pub async fn force_status(&self, order_id: Uuid, status: OrderStatus) {
        if let Some(order) = self.orders.write().await.get_mut(&order_id) {
            order.status = status;
        }
    }

    pub async fn audit_events(&self) -> Vec<AuditEvent> {
        self.audit_events.read().await.clone()
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn insert(&self, order: &Order) -> AppResult<()> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id) {
            return Err(AppError::BadRequest(format!("order {} already exists", order.id)));
        }
        orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> AppResult<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn update_if_status(&self, order: &Order, expected: OrderStatus) -> AppResult<bool> {
        if *self.fail_on_update.read().await {
            return Err(AppError::Internal(anyhow::anyhow!("order store unavailable")));
        }
        let mut orders = self.orders.write().await;
        match orders.get_mut(&order.id) {
            Some(stored) if stored.status == expected => {
                stored.status = order.status;
                stored.assigned_employee = order.assigned_employee;
                stored.delivery_pin = order.delivery_pin.clone();
                stored.updated_at = order.updated_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list(&self, filter: &OrderFilter, page: PageRequest) -> AppResult<(Vec<Order>, i64)> {
        let orders = self.orders.read().await;
        let mut matched: Vec<Order> = orders
            .values()
            .filter(|order| filter.matches(order))
            .cloned()
            .collect();
        matched.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        if matches!(page.sort_order, SortOrder::Desc) {
            matched.reverse();
        }

        let total = matched.len() as i64;
        let items = matched
            .into_iter()
            .skip(page.offset.max(0) as usize)
            .take(page.limit.max(0) as usize)
            .collect();
        Ok((items, total))
    }

    async fn count(&self) -> AppResult<i64> {
        Ok(self.orders.read().await.len() as i64)
    }

    async fn count_by_status(&self) -> AppResult<Vec<StatusCount>> {
        let mut counts: BTreeMap<OrderStatus, i64> = BTreeMap::new();
        for order in self.orders.read().await.values() {
            *counts.entry(order.status).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(status, count)| StatusCount { status, count })
            .collect())
    }

    async fn total_revenue(&self) -> AppResult<Decimal> {
        Ok(self.orders.read().await.values().map(|order| order.total).sum())
    }

    async fn monthly_revenue(&self) -> AppResult<Vec<MonthlyRevenue>> {
        let mut buckets: BTreeMap<(i32, u32), Decimal> = BTreeMap::new();
        for order in self.orders.read().await.values() {
            let key = (order.created_at.year(), order.created_at.month());
            *buckets.entry(key).or_default() += order.total;
        }
        Ok(buckets
            .into_iter()
            .map(|((year, month), total_revenue)| MonthlyRevenue {
                year,
                month,
                total_revenue,
            })
            .collect())
    }
}

#[async_trait]
impl Catalog for MemoryStore {
    async fn lookup(&self, food_id: Uuid) -> AppResult<Option<FoodItem>> {
        Ok(self.foods.read().await.get(&food_id).cloned())
    }
}

#[async_trait]
impl SettingsProvider for MemoryStore {
    async fn current_settings(&self) -> AppResult<Settings> {
        Ok(self.settings.read().await.clone())
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn find_user(&self, id: Uuid) -> AppResult<Option<UserProfile>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn list_active_employees(&self) -> AppResult<Vec<UserProfile>> {
        let users = self.users.read().await;
        let mut employees: Vec<UserProfile> = users
            .values()
            .filter(|user| user.role == Role::Employee && user.is_active)
            .cloned()
            .collect();
        employees.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(employees)
    }
}

#[async_trait]
impl AuditSink for MemoryStore {
    async fn record(&self, event: AuditEvent) -> AppResult<()> {
        if *self.fail_on_audit.read().await {
            return Err(AppError::Internal(anyhow::anyhow!("audit sink unavailable")));
        }
        self.audit_events.write().await.push(event);
        Ok(())
    }
}
