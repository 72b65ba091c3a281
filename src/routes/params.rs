use serde::Deserialize;
use utoipa::ToSchema;

use crate::{models::OrderStatus, repository::PageRequest};

#[derive(Debug, Default, Clone, Copy, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl Pagination {
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1).saturating_mul(per_page);
        (page, per_page, offset)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

// Flattening `Pagination` in here breaks numeric parsing under
// serde_urlencoded, so the page fields are repeated.
#[derive(Debug, Default, Clone, Deserialize, ToSchema)]
pub struct OrderListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<OrderStatus>,
    pub sort_order: Option<SortOrder>,
}

impl OrderListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
        }
    }

    /// Normalized page number plus the repository window it selects.
    pub fn page_request(&self) -> (i64, PageRequest) {
        let (page, limit, offset) = self.pagination().normalize();
        (
            page,
            PageRequest {
                limit,
                offset,
                sort_order: self.sort_order.unwrap_or_default(),
            },
        )
    }
}
