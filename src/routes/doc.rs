use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        dashboard::DashboardStats,
        orders::{
            ConfirmOrderResponse, DeliverOrderRequest, OrderLineRequest, OrderList,
            PlaceOrderRequest, PricingHints, UpdateOrderStatusRequest,
        },
    },
    models::{
        DeliveryType, MonthlyRevenue, Order, OrderItem, OrderStatus, PaymentMethod, Role,
        StatusCount,
    },
    response::{ApiResponse, Meta},
    routes::{admin, health, orders, params},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        orders::place_order,
        orders::list_all_orders,
        orders::list_my_orders,
        orders::list_employee_orders,
        orders::get_order,
        orders::confirm_order,
        orders::deliver_order,
        orders::cancel_order,
        admin::update_order_status,
        admin::dashboard
    ),
    components(
        schemas(
            Role,
            OrderStatus,
            PaymentMethod,
            DeliveryType,
            Order,
            OrderItem,
            StatusCount,
            MonthlyRevenue,
            OrderLineRequest,
            PricingHints,
            PlaceOrderRequest,
            DeliverOrderRequest,
            UpdateOrderStatusRequest,
            ConfirmOrderResponse,
            OrderList,
            DashboardStats,
            params::Pagination,
            params::SortOrder,
            params::OrderListQuery,
            Meta,
            ApiResponse<Order>,
            ApiResponse<OrderList>,
            ApiResponse<ConfirmOrderResponse>,
            ApiResponse<DashboardStats>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Orders", description = "Order placement and lifecycle"),
        (name = "Admin", description = "Admin overrides and dashboard"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
