#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use food_delivery_api::{
    dto::orders::{OrderLineRequest, PlaceOrderRequest},
    middleware::auth::AuthUser,
    models::{
        DeliveryType, FoodItem, Order, PaymentMethod, Promo, PromoKind, Role, Settings,
        UserProfile,
    },
    repository::memory::MemoryStore,
    services::{order_service, pricing::PricingPolicy},
    state::AppState,
};
use rust_decimal::Decimal;
use uuid::Uuid;

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub state: AppState,
    pub customer: AuthUser,
    pub other_customer: AuthUser,
    pub admin: AuthUser,
    pub employees: Vec<AuthUser>,
    /// 10.00
    pub pizza: Uuid,
    /// 5.00
    pub bread: Uuid,
}

pub async fn fixture(employee_count: usize) -> Fixture {
    fixture_with(employee_count, PricingPolicy::Recompute).await
}

pub async fn fixture_with(employee_count: usize, pricing: PricingPolicy) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let joined = Utc::now() - Duration::days(30);

    let customer = add_user(&store, "Casey", Role::User, joined).await;
    let other_customer = add_user(&store, "Morgan", Role::User, joined).await;
    let admin = add_user(&store, "Admin", Role::Admin, joined).await;
    let mut employees = Vec::with_capacity(employee_count);
    for i in 0..employee_count {
        let employee = add_user(
            &store,
            &format!("Employee {i}"),
            Role::Employee,
            joined + Duration::minutes(i as i64),
        )
        .await;
        employees.push(employee);
    }

    let pizza = add_food(&store, "Margherita Pizza", Decimal::new(1000, 2)).await;
    let bread = add_food(&store, "Garlic Bread", Decimal::new(500, 2)).await;

    store
        .set_settings(Settings {
            delivery_fee: Decimal::new(300, 2),
            tax_rate: Decimal::new(8, 0),
            promos: vec![
                Promo {
                    code: "WELCOME10".into(),
                    kind: PromoKind::Percentage,
                    value: Decimal::new(10, 0),
                    expires_at: None,
                    is_active: true,
                },
                Promo {
                    code: "BIGOFF".into(),
                    kind: PromoKind::Fixed,
                    value: Decimal::new(10000, 2),
                    expires_at: None,
                    is_active: true,
                },
                Promo {
                    code: "OLD".into(),
                    kind: PromoKind::Fixed,
                    value: Decimal::new(500, 2),
                    expires_at: Some(Utc::now() - Duration::days(1)),
                    is_active: true,
                },
            ],
        })
        .await;

    let state = AppState::in_memory(store.clone(), pricing);
    Fixture {
        store,
        state,
        customer,
        other_customer,
        admin,
        employees,
        pizza,
        bread,
    }
}

async fn add_user(
    store: &MemoryStore,
    name: &str,
    role: Role,
    created_at: chrono::DateTime<Utc>,
) -> AuthUser {
    let id = Uuid::new_v4();
    store
        .put_user(UserProfile {
            id,
            name: name.into(),
            role,
            is_active: true,
            created_at,
        })
        .await;
    AuthUser { user_id: id, role }
}

async fn add_food(store: &MemoryStore, name: &str, price: Decimal) -> Uuid {
    let id = Uuid::new_v4();
    store
        .put_food(FoodItem {
            id,
            name: name.into(),
            image: format!("/images/{id}.png"),
            category: "Mains".into(),
            price,
        })
        .await;
    id
}

pub fn line(food_id: Uuid, quantity: i32) -> OrderLineRequest {
    OrderLineRequest {
        food_id,
        quantity: Some(quantity),
        price: None,
        size: None,
    }
}

pub fn delivery_request(items: Vec<OrderLineRequest>) -> PlaceOrderRequest {
    PlaceOrderRequest {
        items,
        payment_method: PaymentMethod::CashOnDelivery,
        delivery_type: DeliveryType::Delivery,
        delivery_address: Some("12 Market Street".into()),
        promo_code: None,
        pricing: None,
    }
}

/// Two pizzas and one garlic bread: subtotal 25.00.
pub fn standard_request(fx: &Fixture) -> PlaceOrderRequest {
    delivery_request(vec![line(fx.pizza, 2), line(fx.bread, 1)])
}

pub async fn place(fx: &Fixture, request: PlaceOrderRequest) -> Order {
    order_service::place_order(&fx.state, &fx.customer, request)
        .await
        .expect("order placed")
        .data
        .expect("order data")
}
