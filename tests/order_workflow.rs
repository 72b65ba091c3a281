mod common;

use std::sync::Arc;

use async_trait::async_trait;
use food_delivery_api::{
    audit::AuditOutcome,
    dto::orders::{DeliverOrderRequest, PricingHints, UpdateOrderStatusRequest},
    error::{AppError, AppResult},
    models::{
        DeliveryType, MonthlyRevenue, Order, OrderStatus, PICKUP_ADDRESS, StatusCount,
    },
    repository::{OrderFilter, OrderRepository, PageRequest, memory::MemoryStore},
    routes::params::{OrderListQuery, SortOrder},
    services::{admin_service, order_service, pricing::PricingPolicy},
};
use rust_decimal::Decimal;
use uuid::Uuid;

use common::{Fixture, delivery_request, fixture, fixture_with, line, place, standard_request};

async fn confirm(fx: &Fixture, employee: usize, order_id: Uuid) -> AppResult<String> {
    let resp = order_service::confirm_order(&fx.state, &fx.employees[employee], order_id).await?;
    Ok(resp.data.expect("confirm data").delivery_pin)
}

async fn deliver(fx: &Fixture, employee: usize, order_id: Uuid, pin: &str) -> AppResult<Order> {
    let resp = order_service::deliver_order(
        &fx.state,
        &fx.employees[employee],
        order_id,
        DeliverOrderRequest { pin: pin.into() },
    )
    .await?;
    Ok(resp.data.expect("deliver data"))
}

async fn stored(fx: &Fixture, order_id: Uuid) -> Order {
    fx.store.find(order_id).await.unwrap().expect("stored order")
}

#[tokio::test]
async fn place_confirm_deliver_end_to_end() {
    let fx = fixture(2).await;

    let order = place(&fx, standard_request(&fx)).await;
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.subtotal, Decimal::new(2500, 2));
    assert_eq!(order.tax, Decimal::new(200, 2));
    assert_eq!(order.delivery_fee, Decimal::new(300, 2));
    assert_eq!(order.discount, Decimal::ZERO);
    assert_eq!(order.total, Decimal::new(3000, 2));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.customer_name, "Casey");
    assert_eq!(order.assigned_employee, Some(fx.employees[0].user_id));

    let pin = confirm(&fx, 0, order.id).await.unwrap();
    assert_eq!(pin.len(), 6);
    assert!(pin.chars().all(|c| c.is_ascii_digit()));
    let confirmed = stored(&fx, order.id).await;
    assert_eq!(confirmed.status, OrderStatus::Confirmed);
    assert_eq!(confirmed.delivery_pin.as_deref(), Some(pin.as_str()));

    let delivered = deliver(&fx, 0, order.id, &pin).await.unwrap();
    assert_eq!(delivered.status, OrderStatus::Delivered);
    assert!(delivered.delivery_pin.is_none());
    let json = serde_json::to_value(&delivered).unwrap();
    assert!(json.get("delivery_pin").is_none());

    let again = deliver(&fx, 0, order.id, &pin).await;
    assert!(matches!(
        again,
        Err(AppError::StateConflict {
            status: OrderStatus::Delivered,
            ..
        })
    ));
}

#[tokio::test]
async fn same_cart_prices_the_same_every_time() {
    let fx = fixture(1).await;

    let first = place(&fx, standard_request(&fx)).await;
    let second = place(&fx, standard_request(&fx)).await;

    for order in [&first, &second] {
        assert_eq!(
            order.total,
            order.subtotal + order.tax + order.delivery_fee - order.discount
        );
    }
    assert_eq!(
        (first.subtotal, first.tax, first.delivery_fee, first.discount, first.total),
        (second.subtotal, second.tax, second.delivery_fee, second.discount, second.total)
    );
}

#[tokio::test]
async fn unknown_items_are_dropped_until_nothing_is_left() {
    let fx = fixture(1).await;

    let order = place(
        &fx,
        delivery_request(vec![line(fx.pizza, 1), line(Uuid::new_v4(), 3)]),
    )
    .await;
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].food_id, fx.pizza);

    let result = order_service::place_order(
        &fx.state,
        &fx.customer,
        delivery_request(vec![line(Uuid::new_v4(), 1)]),
    )
    .await;
    assert!(matches!(result, Err(AppError::EmptyOrder)));

    let events = fx.store.audit_events().await;
    let failed = events
        .iter()
        .filter(|e| e.action == "order_placed" && e.outcome == AuditOutcome::Failed)
        .count();
    assert_eq!(failed, 1);
}

#[tokio::test]
async fn repeated_lines_merge_before_pricing() {
    let fx = fixture(1).await;

    let order = place(
        &fx,
        delivery_request(vec![line(fx.pizza, 1), line(fx.bread, 1), line(fx.pizza, 2)]),
    )
    .await;

    assert_eq!(order.items.len(), 2);
    assert_eq!(order.items[0].food_id, fx.pizza);
    assert_eq!(order.items[0].quantity, 3);
    assert_eq!(order.items[0].line_total, Decimal::new(3000, 2));
    assert_eq!(order.subtotal, Decimal::new(3500, 2));
}

#[tokio::test]
async fn orders_rotate_across_employees() {
    let fx = fixture(3).await;

    let mut assigned = Vec::new();
    for _ in 0..6 {
        let order = place(&fx, standard_request(&fx)).await;
        assigned.push(order.assigned_employee.expect("assigned"));
    }

    let expected: Vec<Uuid> = fx
        .employees
        .iter()
        .chain(fx.employees.iter())
        .map(|e| e.user_id)
        .collect();
    assert_eq!(assigned, expected);
}

#[tokio::test]
async fn order_without_employees_stays_unassigned() {
    let fx = fixture(0).await;

    let order = place(&fx, standard_request(&fx)).await;

    assert!(order.assigned_employee.is_none());
    let persisted = stored(&fx, order.id).await;
    assert_eq!(persisted.status, OrderStatus::Pending);
    assert!(persisted.assigned_employee.is_none());
}

#[tokio::test]
async fn only_assigned_employee_moves_the_order() {
    let fx = fixture(2).await;
    let order = place(&fx, standard_request(&fx)).await;

    let result = confirm(&fx, 1, order.id).await;
    assert!(matches!(result, Err(AppError::Unauthorized)));
    assert_eq!(stored(&fx, order.id).await, order);

    let pin = confirm(&fx, 0, order.id).await.unwrap();
    let before = stored(&fx, order.id).await;
    let result = deliver(&fx, 1, order.id, &pin).await;
    assert!(matches!(result, Err(AppError::Unauthorized)));
    assert_eq!(stored(&fx, order.id).await, before);
}

#[tokio::test]
async fn wrong_pin_is_rejected_and_recorded() {
    let fx = fixture(1).await;
    let order = place(&fx, standard_request(&fx)).await;
    let pin = confirm(&fx, 0, order.id).await.unwrap();
    let wrong = if pin == "111111" { "222222" } else { "111111" };

    let result = deliver(&fx, 0, order.id, wrong).await;

    assert!(matches!(result, Err(AppError::InvalidPin)));
    let after = stored(&fx, order.id).await;
    assert_eq!(after.status, OrderStatus::Confirmed);
    assert_eq!(after.delivery_pin.as_deref(), Some(pin.as_str()));
    assert!(fx.store.audit_events().await.iter().any(|e| {
        e.action == "order_delivered" && e.outcome == AuditOutcome::Failed
    }));

    let delivered = deliver(&fx, 0, order.id, &pin).await.unwrap();
    assert_eq!(delivered.status, OrderStatus::Delivered);
}

#[tokio::test]
async fn confirming_again_replaces_the_pin() {
    let fx = fixture(1).await;
    let order = place(&fx, standard_request(&fx)).await;

    confirm(&fx, 0, order.id).await.unwrap();
    let second = confirm(&fx, 0, order.id).await.unwrap();

    let after = stored(&fx, order.id).await;
    assert_eq!(after.status, OrderStatus::Confirmed);
    assert_eq!(after.delivery_pin.as_deref(), Some(second.as_str()));
}

#[tokio::test]
async fn missing_order_is_not_found() {
    let fx = fixture(1).await;

    let result = confirm(&fx, 0, Uuid::new_v4()).await;

    assert!(matches!(result, Err(AppError::NotFound)));
}

#[tokio::test]
async fn cancellation_follows_actor_rules() {
    let fx = fixture(1).await;

    let pending = place(&fx, standard_request(&fx)).await;
    let cancelled = order_service::cancel_order(&fx.state, &fx.customer, pending.id)
        .await
        .unwrap()
        .data
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);

    let again = order_service::cancel_order(&fx.state, &fx.admin, pending.id).await;
    assert!(matches!(again, Err(AppError::StateConflict { .. })));

    let confirmed = place(&fx, standard_request(&fx)).await;
    confirm(&fx, 0, confirmed.id).await.unwrap();
    let by_customer = order_service::cancel_order(&fx.state, &fx.customer, confirmed.id).await;
    assert!(matches!(by_customer, Err(AppError::Unauthorized)));
    let by_stranger =
        order_service::cancel_order(&fx.state, &fx.other_customer, confirmed.id).await;
    assert!(matches!(by_stranger, Err(AppError::Unauthorized)));

    order_service::cancel_order(&fx.state, &fx.employees[0], confirmed.id)
        .await
        .unwrap();
    let after = stored(&fx, confirmed.id).await;
    assert_eq!(after.status, OrderStatus::Cancelled);
    assert!(after.delivery_pin.is_none());
}

#[tokio::test]
async fn admin_override_skips_pin_and_clears_it() {
    let fx = fixture(1).await;
    let order = place(&fx, standard_request(&fx)).await;
    confirm(&fx, 0, order.id).await.unwrap();

    let denied = admin_service::set_order_status(
        &fx.state,
        &fx.employees[0],
        order.id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Delivered,
        },
    )
    .await;
    assert!(matches!(denied, Err(AppError::Unauthorized)));

    let updated = admin_service::set_order_status(
        &fx.state,
        &fx.admin,
        order.id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Delivered,
        },
    )
    .await
    .unwrap()
    .data
    .unwrap();
    assert_eq!(updated.status, OrderStatus::Delivered);
    assert!(stored(&fx, order.id).await.delivery_pin.is_none());

    let events = fx.store.audit_events().await;
    let audit = events
        .iter()
        .find(|e| e.action == "order_status_update")
        .expect("override audited");
    assert_eq!(audit.user_id, Some(fx.admin.user_id));
}

#[tokio::test]
async fn audit_outage_does_not_fail_operations() {
    let fx = fixture(1).await;
    fx.store.set_fail_on_audit(true).await;

    let order = place(&fx, standard_request(&fx)).await;
    let pin = confirm(&fx, 0, order.id).await.unwrap();
    let delivered = deliver(&fx, 0, order.id, &pin).await.unwrap();

    assert_eq!(delivered.status, OrderStatus::Delivered);
    assert!(fx.store.audit_events().await.is_empty());
}

#[tokio::test]
async fn store_failure_propagates_without_change() {
    let fx = fixture(1).await;
    let order = place(&fx, standard_request(&fx)).await;
    fx.store.set_fail_on_update(true).await;

    let result = confirm(&fx, 0, order.id).await;

    assert!(matches!(result, Err(AppError::Internal(_))));
    assert_eq!(stored(&fx, order.id).await.status, OrderStatus::Pending);
}

#[tokio::test]
async fn assignment_failure_fails_placement_and_leaves_order_pending() {
    let fx = fixture(2).await;
    fx.store.set_fail_on_update(true).await;

    let result = order_service::place_order(&fx.state, &fx.customer, standard_request(&fx)).await;

    assert!(matches!(result, Err(AppError::Internal(_))));
    let page = PageRequest {
        limit: 10,
        offset: 0,
        sort_order: SortOrder::Desc,
    };
    let (orders, total) = fx.store.list(&OrderFilter::default(), page).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(orders[0].status, OrderStatus::Pending);
    assert_eq!(orders[0].assigned_employee, None);
    assert!(orders[0].delivery_pin.is_none());
}

#[tokio::test]
async fn oversized_quantity_is_rejected_before_storing() {
    let fx = fixture(1).await;
    let request = delivery_request(vec![line(fx.pizza, 600), line(fx.pizza, 600)]);

    let result = order_service::place_order(&fx.state, &fx.customer, request).await;

    assert!(matches!(result, Err(AppError::BadRequest(_))));
    assert_eq!(fx.store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn huge_price_hint_is_ignored_when_recomputing() {
    let fx = fixture(1).await;
    let mut request = delivery_request(vec![line(fx.pizza, 2)]);
    request.items[0].price = Some(Decimal::MAX);

    let order = place(&fx, request).await;

    assert_eq!(order.items[0].unit_price, Decimal::new(1000, 2));
    assert_eq!(order.subtotal, Decimal::new(2000, 2));
}

#[tokio::test]
async fn trust_client_rejects_unstorable_figures() {
    let fx = fixture_with(1, PricingPolicy::TrustClient).await;

    let oversized = PricingHints {
        subtotal: Some(Decimal::MAX),
        tax: Some(Decimal::MAX),
        ..PricingHints::default()
    };
    let sub_cent = PricingHints {
        subtotal: Some(Decimal::new(25_001, 3)),
        ..PricingHints::default()
    };
    for hints in [oversized, sub_cent] {
        let mut request = standard_request(&fx);
        request.pricing = Some(hints);
        let result = order_service::place_order(&fx.state, &fx.customer, request).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    let mut request = delivery_request(vec![line(fx.pizza, 2)]);
    request.items[0].price = Some(Decimal::MAX);
    let result = order_service::place_order(&fx.state, &fx.customer, request).await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));
    assert_eq!(fx.store.count().await.unwrap(), 0);
}

/// Moves the order to `Cancelled` right before every conditional update, as a
/// concurrent admin would.
struct RacingOrders {
    inner: Arc<MemoryStore>,
}

#[async_trait]
impl OrderRepository for RacingOrders {
    async fn insert(&self, order: &Order) -> AppResult<()> {
        self.inner.insert(order).await
    }

    async fn find(&self, id: Uuid) -> AppResult<Option<Order>> {
        self.inner.find(id).await
    }

    async fn update_if_status(&self, order: &Order, expected: OrderStatus) -> AppResult<bool> {
        self.inner.force_status(order.id, OrderStatus::Cancelled).await;
        self.inner.update_if_status(order, expected).await
    }

    async fn list(&self, filter: &OrderFilter, page: PageRequest) -> AppResult<(Vec<Order>, i64)> {
        self.inner.list(filter, page).await
    }

    async fn count(&self) -> AppResult<i64> {
        self.inner.count().await
    }

    async fn count_by_status(&self) -> AppResult<Vec<StatusCount>> {
        self.inner.count_by_status().await
    }

    async fn total_revenue(&self) -> AppResult<Decimal> {
        self.inner.total_revenue().await
    }

    async fn monthly_revenue(&self) -> AppResult<Vec<MonthlyRevenue>> {
        self.inner.monthly_revenue().await
    }
}

#[tokio::test]
async fn losing_a_race_reports_conflict() {
    let mut fx = fixture(1).await;
    let order = place(&fx, standard_request(&fx)).await;
    fx.state.orders = Arc::new(RacingOrders {
        inner: fx.store.clone(),
    });

    let result = confirm(&fx, 0, order.id).await;

    assert!(matches!(
        result,
        Err(AppError::StateConflict {
            action: "confirm",
            status: OrderStatus::Cancelled,
        })
    ));
    let after = stored(&fx, order.id).await;
    assert_eq!(after.status, OrderStatus::Cancelled);
    assert!(after.delivery_pin.is_none());
}

#[tokio::test]
async fn pickup_skips_fee_and_address() {
    let fx = fixture(1).await;
    let mut request = standard_request(&fx);
    request.delivery_type = DeliveryType::Pickup;
    request.delivery_address = None;

    let order = place(&fx, request).await;

    assert_eq!(order.delivery_fee, Decimal::ZERO);
    assert_eq!(order.delivery_address, PICKUP_ADDRESS);
    assert_eq!(order.total, Decimal::new(2700, 2));
}

#[tokio::test]
async fn delivery_requires_an_address() {
    let fx = fixture(1).await;
    let mut request = standard_request(&fx);
    request.delivery_address = Some("   ".into());

    let result = order_service::place_order(&fx.state, &fx.customer, request).await;

    assert!(matches!(result, Err(AppError::BadRequest(_))));
    assert_eq!(fx.store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn promo_codes_discount_the_subtotal() {
    let fx = fixture(1).await;

    let mut request = standard_request(&fx);
    request.promo_code = Some("welcome10".into());
    let order = place(&fx, request).await;
    assert_eq!(order.discount, Decimal::new(250, 2));
    assert_eq!(order.applied_promo_code.as_deref(), Some("WELCOME10"));
    assert_eq!(order.total, Decimal::new(2750, 2));

    let mut request = standard_request(&fx);
    request.promo_code = Some("BIGOFF".into());
    let order = place(&fx, request).await;
    assert_eq!(order.discount, order.subtotal);

    for code in ["OLD", "NOPE"] {
        let mut request = standard_request(&fx);
        request.promo_code = Some(code.into());
        let result = order_service::place_order(&fx.state, &fx.customer, request).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}

#[tokio::test]
async fn recompute_ignores_client_figures() {
    let fx = fixture(1).await;
    let mut request = standard_request(&fx);
    request.items[0].price = Some(Decimal::new(1, 2));
    request.pricing = Some(PricingHints {
        subtotal: Some(Decimal::new(1, 0)),
        total: Some(Decimal::new(1, 0)),
        ..PricingHints::default()
    });

    let order = place(&fx, request).await;

    assert_eq!(order.subtotal, Decimal::new(2500, 2));
    assert_eq!(order.total, Decimal::new(3000, 2));
}

#[tokio::test]
async fn trust_client_mode_takes_consistent_figures() {
    let fx = fixture_with(1, PricingPolicy::TrustClient).await;
    let mut request = standard_request(&fx);
    request.pricing = Some(PricingHints {
        subtotal: Some(Decimal::new(2500, 2)),
        tax: Some(Decimal::new(100, 2)),
        delivery_fee: Some(Decimal::ZERO),
        discount: Some(Decimal::new(500, 2)),
        total: Some(Decimal::new(2100, 2)),
    });

    let order = place(&fx, request).await;
    assert_eq!(order.total, Decimal::new(2100, 2));
    assert_eq!(order.tax, Decimal::new(100, 2));

    let mut request = standard_request(&fx);
    request.pricing = Some(PricingHints {
        subtotal: Some(Decimal::new(2500, 2)),
        total: Some(Decimal::new(100, 2)),
        ..PricingHints::default()
    });
    let result = order_service::place_order(&fx.state, &fx.customer, request).await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));
}

#[tokio::test]
async fn only_customers_place_orders() {
    let fx = fixture(1).await;

    let result = order_service::place_order(&fx.state, &fx.employees[0], standard_request(&fx)).await;

    assert!(matches!(result, Err(AppError::Unauthorized)));
}

#[tokio::test]
async fn order_detail_is_hidden_from_strangers() {
    let fx = fixture(2).await;
    let order = place(&fx, standard_request(&fx)).await;

    for viewer in [&fx.customer, &fx.employees[0], &fx.admin] {
        let seen = order_service::get_order(&fx.state, viewer, order.id)
            .await
            .unwrap()
            .data
            .unwrap();
        assert_eq!(seen.id, order.id);
    }
    for stranger in [&fx.other_customer, &fx.employees[1]] {
        let result = order_service::get_order(&fx.state, stranger, order.id).await;
        assert!(matches!(result, Err(AppError::NotFound)));
    }
}

#[tokio::test]
async fn listings_are_scoped_to_the_caller() {
    let fx = fixture(2).await;
    let first = place(&fx, standard_request(&fx)).await;
    let second = place(&fx, standard_request(&fx)).await;
    confirm(&fx, 0, first.id).await.unwrap();

    let mine = order_service::list_orders_for_customer(&fx.state, &fx.customer, OrderListQuery::default())
        .await
        .unwrap();
    assert_eq!(mine.meta.as_ref().and_then(|m| m.total), Some(2));
    let others =
        order_service::list_orders_for_customer(&fx.state, &fx.other_customer, OrderListQuery::default())
            .await
            .unwrap();
    assert!(others.data.unwrap().items.is_empty());

    let assigned = order_service::list_orders_for_employee(&fx.state, &fx.employees[1], OrderListQuery::default())
        .await
        .unwrap()
        .data
        .unwrap();
    assert_eq!(assigned.items.len(), 1);
    assert_eq!(assigned.items[0].id, second.id);

    let confirmed_only = OrderListQuery {
        status: Some(OrderStatus::Confirmed),
        ..OrderListQuery::default()
    };
    let all = admin_service::list_all_orders(&fx.state, &fx.admin, confirmed_only)
        .await
        .unwrap()
        .data
        .unwrap();
    assert_eq!(all.items.len(), 1);
    assert_eq!(all.items[0].id, first.id);

    let denied =
        order_service::list_orders_for_employee(&fx.state, &fx.customer, OrderListQuery::default()).await;
    assert!(matches!(denied, Err(AppError::Unauthorized)));
    let denied = admin_service::list_all_orders(&fx.state, &fx.customer, OrderListQuery::default()).await;
    assert!(matches!(denied, Err(AppError::Unauthorized)));
}
