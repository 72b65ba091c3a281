//! Pricing snapshot for a new order.
//!
//! The figures computed here are frozen onto the order and never recomputed,
//! so later settings changes do not touch existing orders.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::{
    dto::orders::PricingHints,
    error::{AppError, AppResult},
    models::{DeliveryType, OrderItem, Promo, PromoKind, Settings},
    repository::Catalog,
    services::cart::CartSnapshot,
};

/// Who is authoritative for the money figures of a new order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PricingPolicy {
    /// Catalog prices and store settings decide; client figures are only
    /// compared against the result.
    #[default]
    Recompute,
    /// Client price hints and pricing figures are accepted when present.
    TrustClient,
}

impl FromStr for PricingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "recompute" => Ok(PricingPolicy::Recompute),
            "trust-client" | "trust_client" => Ok(PricingPolicy::TrustClient),
            other => Err(format!("unknown PRICING_MODE `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceBreakdown {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub delivery_fee: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub applied_promo_code: Option<String>,
}

pub struct PricingContext<'a> {
    pub settings: &'a Settings,
    pub delivery_type: DeliveryType,
    pub promo_code: Option<&'a str>,
    pub hints: Option<&'a PricingHints>,
    pub now: DateTime<Utc>,
}

/// Largest amount a money column (`NUMERIC(12,2)`) can hold.
pub const MAX_MONEY: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2); // 9_999_999_999.99

pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn money_out_of_range() -> AppError {
    AppError::BadRequest("order amount exceeds the supported range".into())
}

/// Rounds a checked result and keeps it inside the storable range.
fn checked_money(amount: Option<Decimal>) -> AppResult<Decimal> {
    amount
        .map(round_money)
        .filter(|amount| amount.abs() <= MAX_MONEY)
        .ok_or_else(money_out_of_range)
}

/// Client-supplied money must already be a storable amount.
fn client_money(value: Decimal) -> AppResult<Decimal> {
    if value < Decimal::ZERO {
        return Err(AppError::BadRequest("pricing figures must not be negative".into()));
    }
    if value.normalize().scale() > 2 {
        return Err(AppError::BadRequest(
            "pricing figures allow at most two decimal places".into(),
        ));
    }
    if value > MAX_MONEY {
        return Err(money_out_of_range());
    }
    Ok(value)
}

/// Resolves cart lines against the catalog. Unknown items are dropped; the
/// order fails only when nothing resolves.
pub async fn resolve_lines(
    catalog: &dyn Catalog,
    cart: &CartSnapshot,
    policy: PricingPolicy,
) -> AppResult<Vec<OrderItem>> {
    let mut items = Vec::with_capacity(cart.len());
    for line in cart.lines() {
        let Some(food) = catalog.lookup(line.food_id).await? else {
            tracing::debug!(food_id = %line.food_id, "dropping line for unknown catalog item");
            continue;
        };

        let unit_price = match (policy, line.price_hint) {
            (PricingPolicy::TrustClient, Some(hint)) if hint >= Decimal::ZERO => client_money(hint)?,
            _ => food.price,
        };
        let line_total = checked_money(unit_price.checked_mul(Decimal::from(line.quantity)))?;

        items.push(OrderItem {
            food_id: food.id,
            name: food.name,
            image: food.image,
            category: food.category,
            size: line.size.clone(),
            unit_price,
            quantity: line.quantity,
            line_total,
        });
    }

    if items.is_empty() {
        return Err(AppError::EmptyOrder);
    }
    Ok(items)
}

pub fn compute(
    items: &[OrderItem],
    ctx: &PricingContext<'_>,
    policy: PricingPolicy,
) -> AppResult<PriceBreakdown> {
    if items.is_empty() {
        return Err(AppError::EmptyOrder);
    }
    match policy {
        PricingPolicy::Recompute => recompute(items, ctx),
        PricingPolicy::TrustClient => trust_client(items, ctx),
    }
}

fn items_subtotal(items: &[OrderItem]) -> AppResult<Decimal> {
    items.iter().try_fold(Decimal::ZERO, |acc, item| {
        checked_money(acc.checked_add(item.line_total))
    })
}

fn total_of(
    subtotal: Decimal,
    tax: Decimal,
    delivery_fee: Decimal,
    discount: Decimal,
) -> AppResult<Decimal> {
    checked_money(
        subtotal
            .checked_add(tax)
            .and_then(|sum| sum.checked_add(delivery_fee))
            .and_then(|sum| sum.checked_sub(discount)),
    )
}

fn recompute(items: &[OrderItem], ctx: &PricingContext<'_>) -> AppResult<PriceBreakdown> {
    let subtotal = items_subtotal(items)?;
    let tax = checked_money(
        subtotal
            .checked_mul(ctx.settings.tax_rate)
            .and_then(|tax| tax.checked_div(Decimal::ONE_HUNDRED)),
    )?;
    let delivery_fee = match ctx.delivery_type {
        DeliveryType::Delivery => ctx.settings.delivery_fee,
        DeliveryType::Pickup => Decimal::ZERO,
    };

    let (discount, applied_promo_code) = match normalized_code(ctx.promo_code) {
        Some(code) => {
            let promo = find_promo(ctx.settings, code, ctx.now)?;
            (promo_discount(promo, subtotal)?, Some(promo.code.clone()))
        }
        None => (Decimal::ZERO, None),
    };

    let breakdown = PriceBreakdown {
        subtotal,
        tax,
        delivery_fee,
        discount,
        total: total_of(subtotal, tax, delivery_fee, discount)?,
        applied_promo_code,
    };

    if let Some(hints) = ctx.hints {
        report_mismatch(hints, &breakdown);
    }
    Ok(breakdown)
}

fn trust_client(items: &[OrderItem], ctx: &PricingContext<'_>) -> AppResult<PriceBreakdown> {
    let hints = ctx.hints.cloned().unwrap_or_default();
    for value in [
        hints.subtotal,
        hints.tax,
        hints.delivery_fee,
        hints.discount,
        hints.total,
    ]
    .into_iter()
    .flatten()
    {
        client_money(value)?;
    }

    let subtotal = match hints.subtotal {
        Some(subtotal) => subtotal,
        None => items_subtotal(items)?,
    };
    let tax = hints.tax.unwrap_or(Decimal::ZERO);
    let delivery_fee = hints.delivery_fee.unwrap_or(Decimal::ZERO);
    let discount = hints.discount.unwrap_or(Decimal::ZERO);
    let derived = total_of(subtotal, tax, delivery_fee, discount)?;

    let total = match hints.total {
        Some(total) if total != derived => {
            return Err(AppError::BadRequest(format!(
                "pricing total {total} does not match {derived}"
            )));
        }
        Some(total) => total,
        None => derived,
    };

    Ok(PriceBreakdown {
        subtotal,
        tax,
        delivery_fee,
        discount,
        total,
        applied_promo_code: normalized_code(ctx.promo_code).map(str::to_string),
    })
}

fn normalized_code(code: Option<&str>) -> Option<&str> {
    code.map(str::trim).filter(|code| !code.is_empty())
}

/// Case-insensitive lookup over active promos.
pub fn find_promo<'a>(settings: &'a Settings, code: &str, now: DateTime<Utc>) -> AppResult<&'a Promo> {
    let promo = settings
        .promos
        .iter()
        .find(|promo| promo.is_active && promo.code.eq_ignore_ascii_case(code))
        .ok_or_else(|| AppError::BadRequest("Invalid promo code".into()))?;

    if promo.expires_at.is_some_and(|expires_at| expires_at < now) {
        return Err(AppError::BadRequest("Promo code expired".into()));
    }
    Ok(promo)
}

/// Never exceeds the subtotal.
fn promo_discount(promo: &Promo, subtotal: Decimal) -> AppResult<Decimal> {
    let raw = match promo.kind {
        PromoKind::Percentage => subtotal
            .checked_mul(promo.value)
            .and_then(|raw| raw.checked_div(Decimal::ONE_HUNDRED))
            .ok_or_else(money_out_of_range)?,
        PromoKind::Fixed => promo.value,
    };
    Ok(round_money(raw.max(Decimal::ZERO).min(subtotal)))
}

fn report_mismatch(hints: &PricingHints, computed: &PriceBreakdown) {
    let pairs = [
        ("subtotal", hints.subtotal, computed.subtotal),
        ("tax", hints.tax, computed.tax),
        ("delivery_fee", hints.delivery_fee, computed.delivery_fee),
        ("discount", hints.discount, computed.discount),
        ("total", hints.total, computed.total),
    ];
    for (field, client, server) in pairs {
        let Some(client) = client else {
            continue;
        };
        if round_money(client) != server {
            tracing::warn!(
                field,
                client = %client,
                server = %server,
                "client pricing differs from recomputed figure"
            );
        }
    }
}
