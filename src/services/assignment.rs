//! Round-robin assignment of new orders to active employees.
//!
//! The cursor only spreads load; it is not an allocation ledger. The default
//! store lives in process memory and restarts at zero with the process.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    audit::{AuditEvent, log_audit},
    error::{AppError, AppResult},
    models::{Order, OrderStatus, UserProfile},
    state::AppState,
};

/// Source of rotation slots. Each call hands out the next slot exactly once.
#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn next_slot(&self) -> AppResult<u64>;
}

#[derive(Debug, Default)]
pub struct InMemoryCursor {
    next: AtomicU64,
}

impl InMemoryCursor {
    pub fn starting_at(slot: u64) -> Self {
        Self {
            next: AtomicU64::new(slot),
        }
    }
}

#[async_trait]
impl CursorStore for InMemoryCursor {
    async fn next_slot(&self) -> AppResult<u64> {
        Ok(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

pub struct EmployeeRotator {
    cursor: Arc<dyn CursorStore>,
}

impl EmployeeRotator {
    pub fn new(cursor: Arc<dyn CursorStore>) -> Self {
        Self { cursor }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryCursor::default()))
    }

    /// Picks `pool[cursor % len]` and advances the cursor. An empty pool
    /// leaves the cursor untouched.
    pub async fn select<'a>(&self, pool: &'a [UserProfile]) -> AppResult<Option<&'a UserProfile>> {
        if pool.is_empty() {
            return Ok(None);
        }
        let slot = self.cursor.next_slot().await?;
        let index = (slot % pool.len() as u64) as usize;
        Ok(pool.get(index))
    }
}

/// Stamps the next employee in rotation onto a freshly placed order.
///
/// The pool is read fresh on every call. Returns `None` and leaves the order
/// unassigned when nobody is active. A failed write propagates after the
/// cursor has already moved on.
pub async fn assign_employee_to_order(
    state: &AppState,
    order: &mut Order,
) -> AppResult<Option<UserProfile>> {
    let pool = state.users.list_active_employees().await?;
    let Some(employee) = state.rotator.select(&pool).await? else {
        tracing::warn!(order_id = %order.id, "no active employees, order left unassigned");
        return Ok(None);
    };
    let employee = employee.clone();

    order.assigned_employee = Some(employee.id);
    order.updated_at = Utc::now();
    if !state
        .orders
        .update_if_status(order, OrderStatus::Pending)
        .await?
    {
        return Err(AppError::StateConflict {
            action: "assign",
            status: order.status,
        });
    }

    tracing::info!(order_id = %order.id, employee_id = %employee.id, "order assigned");
    log_audit(
        state,
        AuditEvent::new(Some(employee.id), "order_assigned")
            .resource("orders")
            .metadata(serde_json::json!({
                "order_id": order.id,
                "employee_id": employee.id,
                "employee_name": employee.name,
            })),
    )
    .await;

    Ok(Some(employee))
}
