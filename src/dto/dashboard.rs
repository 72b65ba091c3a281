use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::{MonthlyRevenue, StatusCount};

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardStats {
    pub total_orders: i64,
    pub total_revenue: Decimal,
    pub orders_by_status: Vec<StatusCount>,
    pub monthly_revenue: Vec<MonthlyRevenue>,
}
