use std::collections::HashMap;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    dto::orders::OrderLineRequest,
    error::{AppError, AppResult},
    models::DEFAULT_SIZE,
};

/// Largest quantity a single merged line may carry.
pub const MAX_LINE_QUANTITY: u32 = 999;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CartKey {
    pub food_id: Uuid,
    pub size: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
    pub food_id: Uuid,
    pub size: String,
    pub quantity: u32,
    pub price_hint: Option<Decimal>,
}

/// Cart lines keyed by `(food_id, size)`, in first-insertion order.
///
/// Adding a key that is already present bumps that line's quantity; the
/// first line's price hint is kept.
#[derive(Debug, Clone, Default)]
pub struct CartSnapshot {
    lines: Vec<CartLine>,
    index: HashMap<CartKey, usize>,
}

impl CartSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_requests(requests: &[OrderLineRequest]) -> AppResult<Self> {
        let mut cart = Self::new();
        for request in requests {
            cart.add(
                request.food_id,
                request.size.as_deref(),
                request.quantity,
                request.price,
            )?;
        }
        Ok(cart)
    }

    /// Non-positive or missing quantities count as 1; a blank size is `Regular`.
    /// Fails when the line would exceed [`MAX_LINE_QUANTITY`].
    pub fn add(
        &mut self,
        food_id: Uuid,
        size: Option<&str>,
        quantity: Option<i32>,
        price_hint: Option<Decimal>,
    ) -> AppResult<()> {
        let size = size
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SIZE)
            .to_string();
        let quantity = quantity
            .filter(|q| *q > 0)
            .map(|q| q.unsigned_abs())
            .unwrap_or(1);
        let key = CartKey {
            food_id,
            size: size.clone(),
        };

        if let Some(&slot) = self.index.get(&key) {
            let line = &mut self.lines[slot];
            line.quantity = bounded_quantity(line.quantity.checked_add(quantity))?;
            return Ok(());
        }

        let quantity = bounded_quantity(Some(quantity))?;
        self.index.insert(key, self.lines.len());
        self.lines.push(CartLine {
            food_id,
            size,
            quantity,
            price_hint,
        });
        Ok(())
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }
}

fn bounded_quantity(quantity: Option<u32>) -> AppResult<u32> {
    quantity
        .filter(|q| *q <= MAX_LINE_QUANTITY)
        .ok_or_else(|| {
            AppError::BadRequest(format!("quantity per line is limited to {MAX_LINE_QUANTITY}"))
        })
}
