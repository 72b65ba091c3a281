use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{DeliveryType, Order, OrderStatus, PaymentMethod};

/// One selected cart line. Price and size are hints taken from the client's
/// cart snapshot.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct OrderLineRequest {
    pub food_id: Uuid,
    pub quantity: Option<i32>,
    pub price: Option<Decimal>,
    pub size: Option<String>,
}

/// Figures the client computed while previewing the checkout.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct PricingHints {
    pub subtotal: Option<Decimal>,
    pub tax: Option<Decimal>,
    pub delivery_fee: Option<Decimal>,
    pub discount: Option<Decimal>,
    pub total: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PlaceOrderRequest {
    pub items: Vec<OrderLineRequest>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub delivery_type: DeliveryType,
    pub delivery_address: Option<String>,
    pub promo_code: Option<String>,
    pub pricing: Option<PricingHints>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DeliverOrderRequest {
    pub pin: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConfirmOrderResponse {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub delivery_pin: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}
