use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use super::{
    AuditSink, Catalog, OrderFilter, OrderRepository, PageRequest, SettingsProvider, UserDirectory,
};
use crate::{
    audit::AuditEvent,
    entity::{
        audit_logs::ActiveModel as AuditActive,
        foods::{Entity as Foods, Model as FoodModel},
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        settings::Entity as SettingsRows,
        users::{Column as UserCol, Entity as Users, Model as UserModel},
    },
    error::{AppError, AppResult},
    models::{
        FoodItem, MonthlyRevenue, Order, OrderItem, OrderStatus, Promo, Role, Settings, StatusCount,
        UserProfile,
    },
    routes::params::SortOrder,
};

/// All collaborators backed by one PostgreSQL database.
#[derive(Clone)]
pub struct PgStore {
    orm: DatabaseConnection,
}

impl PgStore {
    pub fn new(orm: DatabaseConnection) -> Self {
        Self { orm }
    }

    fn pool(&self) -> &sqlx::PgPool {
        self.orm.get_postgres_connection_pool()
    }

    async fn load_items(&self, order_ids: Vec<Uuid>) -> AppResult<HashMap<Uuid, Vec<OrderItem>>> {
        let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        if order_ids.is_empty() {
            return Ok(grouped);
        }
        let rows = OrderItems::find()
            .filter(OrderItemCol::OrderId.is_in(order_ids))
            .order_by_asc(OrderItemCol::OrderId)
            .order_by_asc(OrderItemCol::Position)
            .all(&self.orm)
            .await?;
        for row in rows {
            grouped
                .entry(row.order_id)
                .or_default()
                .push(order_item_from_entity(row));
        }
        Ok(grouped)
    }
}

#[async_trait]
impl OrderRepository for PgStore {
    async fn insert(&self, order: &Order) -> AppResult<()> {
        let txn = self.orm.begin().await?;

        OrderActive {
            id: Set(order.id),
            customer_id: Set(order.customer_id),
            customer_name: Set(order.customer_name.clone()),
            subtotal: Set(order.subtotal),
            tax: Set(order.tax),
            delivery_fee: Set(order.delivery_fee),
            discount: Set(order.discount),
            total: Set(order.total),
            applied_promo_code: Set(order.applied_promo_code.clone()),
            payment_method: Set(order.payment_method.as_str().to_string()),
            delivery_address: Set(order.delivery_address.clone()),
            status: Set(order.status.as_str().to_string()),
            assigned_employee: Set(order.assigned_employee),
            delivery_pin: Set(order.delivery_pin.clone()),
            created_at: Set(order.created_at.into()),
            updated_at: Set(order.updated_at.into()),
        }
        .insert(&txn)
        .await?;

        for (position, item) in order.items.iter().enumerate() {
            let quantity = i32::try_from(item.quantity).map_err(|_| {
                AppError::BadRequest(format!("quantity {} is out of range", item.quantity))
            })?;
            OrderItemActive {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id),
                position: Set(position as i32),
                food_id: Set(item.food_id),
                name: Set(item.name.clone()),
                image: Set(item.image.clone()),
                category: Set(item.category.clone()),
                size: Set(item.size.clone()),
                unit_price: Set(item.unit_price),
                quantity: Set(quantity),
                line_total: Set(item.line_total),
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;
        Ok(())
    }

    async fn find(&self, id: Uuid) -> AppResult<Option<Order>> {
        let Some(model) = Orders::find_by_id(id).one(&self.orm).await? else {
            return Ok(None);
        };
        let mut items = self.load_items(vec![model.id]).await?;
        let items = items.remove(&model.id).unwrap_or_default();
        order_from_entity(model, items).map(Some)
    }

    async fn update_if_status(&self, order: &Order, expected: OrderStatus) -> AppResult<bool> {
        let changes = OrderActive {
            status: Set(order.status.as_str().to_string()),
            assigned_employee: Set(order.assigned_employee),
            delivery_pin: Set(order.delivery_pin.clone()),
            updated_at: Set(order.updated_at.into()),
            ..Default::default()
        };
        let result = Orders::update_many()
            .set(changes)
            .filter(
                Condition::all()
                    .add(OrderCol::Id.eq(order.id))
                    .add(OrderCol::Status.eq(expected.as_str())),
            )
            .exec(&self.orm)
            .await?;
        Ok(result.rows_affected == 1)
    }

    async fn list(&self, filter: &OrderFilter, page: PageRequest) -> AppResult<(Vec<Order>, i64)> {
        let mut condition = Condition::all();
        if let Some(customer_id) = filter.customer_id {
            condition = condition.add(OrderCol::CustomerId.eq(customer_id));
        }
        if let Some(employee_id) = filter.assigned_employee {
            condition = condition.add(OrderCol::AssignedEmployee.eq(employee_id));
        }
        if let Some(status) = filter.status {
            condition = condition.add(OrderCol::Status.eq(status.as_str()));
        }

        let mut finder = Orders::find().filter(condition);
        finder = match page.sort_order {
            SortOrder::Asc => finder
                .order_by_asc(OrderCol::CreatedAt)
                .order_by_asc(OrderCol::Id),
            SortOrder::Desc => finder
                .order_by_desc(OrderCol::CreatedAt)
                .order_by_desc(OrderCol::Id),
        };

        let total = finder.clone().count(&self.orm).await? as i64;

        let models = finder
            .limit(page.limit.max(0) as u64)
            .offset(page.offset.max(0) as u64)
            .all(&self.orm)
            .await?;

        let mut items = self
            .load_items(models.iter().map(|model| model.id).collect())
            .await?;
        let orders = models
            .into_iter()
            .map(|model| {
                let lines = items.remove(&model.id).unwrap_or_default();
                order_from_entity(model, lines)
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok((orders, total))
    }

    async fn count(&self) -> AppResult<i64> {
        Ok(Orders::find().count(&self.orm).await? as i64)
    }

    async fn count_by_status(&self) -> AppResult<Vec<StatusCount>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM orders GROUP BY status",
        )
        .fetch_all(self.pool())
        .await?;

        let mut counts = rows
            .into_iter()
            .map(|(status, count)| {
                Ok(StatusCount {
                    status: parse_column(&status)?,
                    count,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;
        counts.sort_by_key(|row| row.status);
        Ok(counts)
    }

    async fn total_revenue(&self) -> AppResult<Decimal> {
        let (total,): (Decimal,) = sqlx::query_as("SELECT COALESCE(SUM(total), 0) FROM orders")
            .fetch_one(self.pool())
            .await?;
        Ok(total)
    }

    async fn monthly_revenue(&self) -> AppResult<Vec<MonthlyRevenue>> {
        let rows: Vec<(i32, i32, Decimal)> = sqlx::query_as(
            r#"
            SELECT
                EXTRACT(YEAR FROM created_at AT TIME ZONE 'UTC')::int4 AS year,
                EXTRACT(MONTH FROM created_at AT TIME ZONE 'UTC')::int4 AS month,
                SUM(total) AS total_revenue
            FROM orders
            GROUP BY 1, 2
            ORDER BY 1, 2
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|(year, month, total_revenue)| MonthlyRevenue {
                year,
                month: month as u32,
                total_revenue,
            })
            .collect())
    }
}

#[async_trait]
impl Catalog for PgStore {
    async fn lookup(&self, food_id: Uuid) -> AppResult<Option<FoodItem>> {
        Ok(Foods::find_by_id(food_id)
            .one(&self.orm)
            .await?
            .map(food_from_entity))
    }
}

#[async_trait]
impl SettingsProvider for PgStore {
    async fn current_settings(&self) -> AppResult<Settings> {
        let Some(row) = SettingsRows::find().one(&self.orm).await? else {
            return Ok(Settings::default());
        };
        let promos: Vec<Promo> = serde_json::from_value(row.promos)
            .map_err(|err| AppError::Internal(anyhow::anyhow!("malformed promos: {err}")))?;
        Ok(Settings {
            delivery_fee: row.delivery_fee,
            tax_rate: row.tax_rate,
            promos,
        })
    }
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn find_user(&self, id: Uuid) -> AppResult<Option<UserProfile>> {
        Users::find_by_id(id)
            .one(&self.orm)
            .await?
            .map(user_from_entity)
            .transpose()
    }

    async fn list_active_employees(&self) -> AppResult<Vec<UserProfile>> {
        Users::find()
            .filter(UserCol::Role.eq(Role::Employee.as_str()))
            .filter(UserCol::IsActive.eq(true))
            .order_by_asc(UserCol::CreatedAt)
            .order_by_asc(UserCol::Id)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(user_from_entity)
            .collect()
    }
}

#[async_trait]
impl AuditSink for PgStore {
    async fn record(&self, event: AuditEvent) -> AppResult<()> {
        AuditActive {
            id: Set(Uuid::new_v4()),
            user_id: Set(event.user_id),
            action: Set(event.action),
            resource: Set(event.resource),
            metadata: Set(event.metadata),
            status: Set(event.outcome.as_str().to_string()),
            created_at: Set(event.at.into()),
        }
        .insert(&self.orm)
        .await?;
        Ok(())
    }
}

fn parse_column<T>(value: &str) -> AppResult<T>
where
    T: std::str::FromStr<Err = String>,
{
    value
        .parse()
        .map_err(|err: String| AppError::Internal(anyhow::anyhow!(err)))
}

fn order_from_entity(model: OrderModel, items: Vec<OrderItem>) -> AppResult<Order> {
    Ok(Order {
        id: model.id,
        customer_id: model.customer_id,
        customer_name: model.customer_name,
        items,
        subtotal: model.subtotal,
        tax: model.tax,
        delivery_fee: model.delivery_fee,
        discount: model.discount,
        total: model.total,
        applied_promo_code: model.applied_promo_code,
        payment_method: parse_column(&model.payment_method)?,
        delivery_address: model.delivery_address,
        status: parse_column(&model.status)?,
        assigned_employee: model.assigned_employee,
        delivery_pin: model.delivery_pin,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        food_id: model.food_id,
        name: model.name,
        image: model.image,
        category: model.category,
        size: model.size,
        unit_price: model.unit_price,
        quantity: model.quantity.max(0) as u32,
        line_total: model.line_total,
    }
}

fn food_from_entity(model: FoodModel) -> FoodItem {
    FoodItem {
        id: model.id,
        name: model.name,
        image: model.image,
        category: model.category,
        price: model.price,
    }
}

fn user_from_entity(model: UserModel) -> AppResult<UserProfile> {
    Ok(UserProfile {
        id: model.id,
        name: model.name,
        role: parse_column(&model.role)?,
        is_active: model.is_active,
        created_at: model.created_at.with_timezone(&Utc),
    })
}

