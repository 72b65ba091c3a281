use uuid::Uuid;

use crate::{
    dto::{
        dashboard::DashboardStats,
        orders::{OrderList, UpdateOrderStatusRequest},
    },
    error::AppResult,
    middleware::auth::{AuthUser, ensure_admin},
    models::Order,
    repository::OrderFilter,
    response::{ApiResponse, Meta},
    routes::params::OrderListQuery,
    services::{
        order_service::{apply_transition, list_page},
        workflow,
    },
    state::AppState,
};

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let filter = OrderFilter {
        status: query.status,
        ..OrderFilter::default()
    };
    list_page(state, filter, &query).await
}

pub async fn set_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    let order = apply_transition(
        state,
        user,
        id,
        "override",
        "order_status_update",
        |order, now| workflow::override_status(order, user, payload.status, now),
    )
    .await?;

    Ok(ApiResponse::success(
        "Order status updated",
        order,
        Some(Meta::empty()),
    ))
}

pub async fn dashboard_aggregates(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<DashboardStats>> {
    ensure_admin(user)?;
    let total_orders = state.orders.count().await?;
    let total_revenue = state.orders.total_revenue().await?;
    let orders_by_status = state.orders.count_by_status().await?;
    let monthly_revenue = state.orders.monthly_revenue().await?;

    Ok(ApiResponse::success(
        "Dashboard",
        DashboardStats {
            total_orders,
            total_revenue,
            orders_by_status,
            monthly_revenue,
        },
        Some(Meta::empty()),
    ))
}
