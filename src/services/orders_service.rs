use sqlx::PgPool;

use crate::db::{acquire_as, AuthContext};
use crate::error::AppResult;
use crate::models::order::ORDER_FOLLOW_COLUMNS;
use crate::models::{NewOrderFollow, OrderFollow, ScooterType};

/// Follow-up of scooter service orders.
#[derive(Clone)]
pub struct OrdersService {
    pool: PgPool,
}

impl OrdersService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn scooter_types(&self, ctx: &AuthContext) -> AppResult<Vec<ScooterType>> {
        let mut conn = acquire_as(&self.pool, ctx).await?;
        Ok(sqlx::query_as::<_, ScooterType>(
            "SELECT id::text, name, power::text, created_at::text FROM scooter_types ORDER BY name",
        )
        .fetch_all(&mut *conn)
        .await?)
    }

    /// Unfinished orders, oldest first.
    pub async fn open_orders(&self, ctx: &AuthContext) -> AppResult<Vec<OrderFollow>> {
        let mut conn = acquire_as(&self.pool, ctx).await?;
        let sql = format!(
            "SELECT {} FROM view_order_follow WHERE is_finish = false ORDER BY created_at ASC",
            ORDER_FOLLOW_COLUMNS
        );
        Ok(sqlx::query_as::<_, OrderFollow>(&sql)
            .fetch_all(&mut *conn)
            .await?)
    }

    pub async fn create(&self, ctx: &AuthContext, order: &NewOrderFollow) -> AppResult<String> {
        order.validate()?;
        let mut conn = acquire_as(&self.pool, ctx).await?;

        let id: String = sqlx::query_scalar(
            "INSERT INTO order_follow (number, id_scooter_type, status, phone, order_link, email) \
             VALUES ($1, $2::uuid, $3, $4, $5, $6) \
             RETURNING id::text",
        )
        .bind(order.number)
        .bind(order.id_scooter_type.trim())
        .bind(order.status.trim())
        .bind(order.phone.trim())
        .bind(order.order_link.trim())
        .bind(order.email.trim())
        .fetch_one(&mut *conn)
        .await?;

        tracing::info!("Created order follow-up: id={}, number={}", id, order.number);
        Ok(id)
    }
}
