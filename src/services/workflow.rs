//! Order lifecycle state machine.
//!
//! ```text
//! Pending --confirm--> Confirmed --deliver(pin)--> Delivered
//!    |                     |
//!    +-------cancel--------+----> Cancelled
//! ```
//!
//! Each transition validates the actor and the source state before touching
//! the order, so a rejected call leaves it exactly as it was. On success the
//! previous status is returned; callers persist with a conditional update on
//! that status.

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::{
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderStatus, Role},
};

pub const PIN_MIN: u32 = 100_000;
pub const PIN_MAX: u32 = 999_999;

/// One-time code the customer hands over at the door.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryPin(String);

impl DeliveryPin {
    /// Uniform over 100000..=999999.
    pub fn generate() -> Self {
        let value = rand::rng().random_range(PIN_MIN..=PIN_MAX);
        Self(value.to_string())
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// How the actor relates to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Standing {
    Admin,
    AssignedEmployee,
    Customer,
    Stranger,
}

fn standing(order: &Order, actor: &AuthUser) -> Standing {
    match actor.role {
        Role::Admin => Standing::Admin,
        Role::Employee if order.assigned_employee == Some(actor.user_id) => {
            Standing::AssignedEmployee
        }
        Role::User if order.customer_id == actor.user_id => Standing::Customer,
        _ => Standing::Stranger,
    }
}

fn ensure_assigned(order: &Order, actor: &AuthUser) -> AppResult<()> {
    match standing(order, actor) {
        Standing::AssignedEmployee => Ok(()),
        _ => Err(AppError::Unauthorized),
    }
}

/// Whether the actor may read the order at all.
pub fn can_view(order: &Order, actor: &AuthUser) -> bool {
    standing(order, actor) != Standing::Stranger
}

/// Assigned employee accepts the order and a fresh PIN is stored.
///
/// Confirming an already confirmed order issues a new PIN and the old one
/// stops working.
pub fn confirm(
    order: &mut Order,
    actor: &AuthUser,
    pin: DeliveryPin,
    now: DateTime<Utc>,
) -> AppResult<OrderStatus> {
    ensure_assigned(order, actor)?;
    let prior = order.status;
    if prior.is_terminal() {
        return Err(AppError::StateConflict {
            action: "confirm",
            status: prior,
        });
    }

    order.status = OrderStatus::Confirmed;
    order.delivery_pin = Some(pin.into_string());
    order.updated_at = now;
    Ok(prior)
}

/// Completes delivery when the supplied PIN matches exactly. A wrong PIN
/// keeps the stored one so the customer can retry.
pub fn deliver(
    order: &mut Order,
    actor: &AuthUser,
    supplied_pin: &str,
    now: DateTime<Utc>,
) -> AppResult<OrderStatus> {
    ensure_assigned(order, actor)?;
    let prior = order.status;
    if prior != OrderStatus::Confirmed {
        return Err(AppError::StateConflict {
            action: "deliver",
            status: prior,
        });
    }
    if order.delivery_pin.as_deref() != Some(supplied_pin) {
        return Err(AppError::InvalidPin);
    }

    order.status = OrderStatus::Delivered;
    order.delivery_pin = None;
    order.updated_at = now;
    Ok(prior)
}

/// Admins and the assigned employee may cancel any active order; the
/// customer only while it is still pending.
pub fn cancel(order: &mut Order, actor: &AuthUser, now: DateTime<Utc>) -> AppResult<OrderStatus> {
    let standing = standing(order, actor);
    if standing == Standing::Stranger {
        return Err(AppError::Unauthorized);
    }
    let prior = order.status;
    if prior.is_terminal() {
        return Err(AppError::StateConflict {
            action: "cancel",
            status: prior,
        });
    }
    if standing == Standing::Customer && prior != OrderStatus::Pending {
        return Err(AppError::Unauthorized);
    }

    order.status = OrderStatus::Cancelled;
    order.delivery_pin = None;
    order.updated_at = now;
    Ok(prior)
}

/// Administrative override. Skips the PIN checks entirely but still drops
/// the PIN unless the target is `Confirmed`.
pub fn override_status(
    order: &mut Order,
    actor: &AuthUser,
    status: OrderStatus,
    now: DateTime<Utc>,
) -> AppResult<OrderStatus> {
    if !actor.role.is_admin() {
        return Err(AppError::Unauthorized);
    }
    let prior = order.status;
    order.status = status;
    if status != OrderStatus::Confirmed {
        order.delivery_pin = None;
    }
    order.updated_at = now;
    Ok(prior)
}
