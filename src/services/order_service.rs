use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    audit::{AuditEvent, log_audit},
    dto::orders::{ConfirmOrderResponse, DeliverOrderRequest, OrderList, PlaceOrderRequest},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_role},
    models::{DeliveryType, Order, OrderStatus, PICKUP_ADDRESS, Role},
    repository::OrderFilter,
    response::{ApiResponse, Meta},
    routes::params::OrderListQuery,
    services::{
        assignment::assign_employee_to_order,
        cart::CartSnapshot,
        pricing::{self, PricingContext},
        workflow::{self, DeliveryPin},
    },
    state::AppState,
};

pub async fn place_order(
    state: &AppState,
    user: &AuthUser,
    payload: PlaceOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    match create_order(state, user, payload).await {
        Ok(order) => Ok(ApiResponse::success(
            "Order placed successfully",
            order,
            Some(Meta::empty()),
        )),
        Err(err) => {
            log_audit(
                state,
                AuditEvent::new(Some(user.user_id), "order_placed")
                    .resource("orders")
                    .metadata(serde_json::json!({ "error": err.to_string() }))
                    .failed(),
            )
            .await;
            Err(err)
        }
    }
}

async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: PlaceOrderRequest,
) -> AppResult<Order> {
    ensure_role(user, Role::User)?;
    let customer = state
        .users
        .find_user(user.user_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let cart = CartSnapshot::from_requests(&payload.items)?;
    if cart.is_empty() {
        return Err(AppError::EmptyOrder);
    }
    let items = pricing::resolve_lines(state.catalog.as_ref(), &cart, state.pricing).await?;

    let delivery_address = match payload.delivery_type {
        DeliveryType::Pickup => PICKUP_ADDRESS.to_string(),
        DeliveryType::Delivery => payload
            .delivery_address
            .as_deref()
            .map(str::trim)
            .filter(|address| !address.is_empty())
            .ok_or_else(|| AppError::BadRequest("delivery address is required".into()))?
            .to_string(),
    };

    let settings = state.settings.current_settings().await?;
    let now = Utc::now();
    let breakdown = pricing::compute(
        &items,
        &PricingContext {
            settings: &settings,
            delivery_type: payload.delivery_type,
            promo_code: payload.promo_code.as_deref(),
            hints: payload.pricing.as_ref(),
            now,
        },
        state.pricing,
    )?;

    let mut order = Order {
        id: Uuid::new_v4(),
        customer_id: customer.id,
        customer_name: customer.name,
        items,
        subtotal: breakdown.subtotal,
        tax: breakdown.tax,
        delivery_fee: breakdown.delivery_fee,
        discount: breakdown.discount,
        total: breakdown.total,
        applied_promo_code: breakdown.applied_promo_code,
        payment_method: payload.payment_method,
        delivery_address,
        status: OrderStatus::Pending,
        assigned_employee: None,
        delivery_pin: None,
        created_at: now,
        updated_at: now,
    };
    state.orders.insert(&order).await?;
    tracing::info!(order_id = %order.id, customer_id = %order.customer_id, total = %order.total, "order placed");

    assign_employee_to_order(state, &mut order).await?;

    log_audit(
        state,
        AuditEvent::new(Some(user.user_id), "order_placed")
            .resource("orders")
            .metadata(serde_json::json!({
                "order_id": order.id,
                "total": order.total,
                "items": order.items.len(),
            })),
    )
    .await;

    Ok(order)
}

pub async fn confirm_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<ConfirmOrderResponse>> {
    let order = apply_transition(state, user, id, "confirm", "order_confirmed", |order, now| {
        workflow::confirm(order, user, DeliveryPin::generate(), now)
    })
    .await?;

    let delivery_pin = order
        .delivery_pin
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("confirmed order has no PIN")))?;
    Ok(ApiResponse::success(
        "Order confirmed",
        ConfirmOrderResponse {
            order_id: order.id,
            status: order.status,
            delivery_pin,
        },
        Some(Meta::empty()),
    ))
}

pub async fn deliver_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: DeliverOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    let result = apply_transition(state, user, id, "deliver", "order_delivered", |order, now| {
        workflow::deliver(order, user, &payload.pin, now)
    })
    .await;

    match result {
        Ok(order) => Ok(ApiResponse::success(
            "Order delivered",
            order,
            Some(Meta::empty()),
        )),
        Err(AppError::InvalidPin) => {
            tracing::info!(order_id = %id, employee_id = %user.user_id, "delivery rejected, wrong PIN");
            log_audit(
                state,
                AuditEvent::new(Some(user.user_id), "order_delivered")
                    .resource("orders")
                    .metadata(serde_json::json!({ "order_id": id, "reason": "invalid_pin" }))
                    .failed(),
            )
            .await;
            Err(AppError::InvalidPin)
        }
        Err(err) => Err(err),
    }
}

pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let order = apply_transition(state, user, id, "cancel", "order_cancelled", |order, now| {
        workflow::cancel(order, user, now)
    })
    .await?;

    Ok(ApiResponse::success(
        "Order cancelled",
        order,
        Some(Meta::empty()),
    ))
}

pub async fn list_orders_for_customer(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let filter = OrderFilter {
        status: query.status,
        ..OrderFilter::for_customer(user.user_id)
    };
    list_page(state, filter, &query).await
}

pub async fn list_orders_for_employee(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_role(user, Role::Employee)?;
    let filter = OrderFilter {
        status: query.status,
        ..OrderFilter::for_employee(user.user_id)
    };
    list_page(state, filter, &query).await
}

pub(crate) async fn list_page(
    state: &AppState,
    filter: OrderFilter,
    query: &OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, window) = query.page_request();
    let (orders, total) = state.orders.list(&filter, window).await?;
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(Meta::for_page(page, window, total)),
    ))
}

pub async fn get_order(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<ApiResponse<Order>> {
    let order = state
        .orders
        .find(id)
        .await?
        .filter(|order| workflow::can_view(order, user))
        .ok_or(AppError::NotFound)?;

    Ok(ApiResponse::success("OK", order, Some(Meta::empty())))
}

/// Loads the order, runs `transition` on it and persists the result only if
/// nobody moved the order out of its prior status in the meantime.
pub(crate) async fn apply_transition<F>(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    action: &'static str,
    audit_action: &str,
    transition: F,
) -> AppResult<Order>
where
    F: FnOnce(&mut Order, DateTime<Utc>) -> AppResult<OrderStatus>,
{
    let mut order = state.orders.find(id).await?.ok_or(AppError::NotFound)?;
    let prior = transition(&mut order, Utc::now())?;

    if !state.orders.update_if_status(&order, prior).await? {
        let current = state
            .orders
            .find(id)
            .await?
            .ok_or(AppError::NotFound)?
            .status;
        tracing::warn!(order_id = %id, expected = %prior, current = %current, "order changed concurrently");
        return Err(AppError::StateConflict {
            action,
            status: current,
        });
    }

    tracing::info!(order_id = %id, from = %prior, to = %order.status, actor = %user.user_id, "order transition");
    log_audit(
        state,
        AuditEvent::order_transition(user.user_id, audit_action, id, prior, order.status),
    )
    .await;

    Ok(order)
}
