use sqlx::PgPool;

use crate::db::{acquire_as, AuthContext, RpcCall, WhereClause};
use crate::error::{AppError, AppResult};
use crate::models::inventory::{HISTORY_COLUMNS, HISTORY_PAGE_SIZE, INVENTORY_COLUMNS};
use crate::models::{
    HistoryPage, InventoryItem, InventoryParams, InventoryUpdate, MovementHistoryItem,
    NewInventoryItem, Page,
};

const ALL_ITEMS_LIMIT: i64 = 1000;
const SEARCH_LIMIT: i64 = 50;

#[derive(Clone)]
pub struct InventoryService {
    pool: PgPool,
}

impl InventoryService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Paginated stock of one location. No location selected yields an empty page.
    pub async fn list(
        &self,
        ctx: &AuthContext,
        location_id: Option<&str>,
        params: &InventoryParams,
    ) -> AppResult<Page<InventoryItem>> {
        let Some(location_id) = selected(location_id) else {
            return Ok(Page::empty(params.page));
        };

        let mut clause = WhereClause::new();
        clause.eq("id_localizacion", "bigint", location_id);
        if let Some(term) = params.search.as_deref() {
            clause.search(&["nombre", "referencia"], term);
        }
        if let Some(status) = params.stock_status_filter() {
            clause.eq("estado_stock", "text", status);
        }
        if let Some(descontinuado) = params.descontinuado {
            clause.eq("descontinuado", "boolean", descontinuado.to_string());
        }
        if params.is_new {
            clause.raw("nuevo_hasta > NOW()");
        }

        let mut conn = acquire_as(&self.pool, ctx).await?;

        let count_sql = format!("SELECT COUNT(*) FROM v_inventario_completo {}", clause.sql());
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        for p in clause.params() {
            count_query = count_query.bind(p);
        }
        let total = count_query.fetch_one(&mut *conn).await?;

        let n = clause.params().len();
        let sql = format!(
            "SELECT {} FROM v_inventario_completo {} ORDER BY {} {} NULLS LAST LIMIT ${} OFFSET ${}",
            INVENTORY_COLUMNS,
            clause.sql(),
            params.order_by.column(),
            params.direction.as_sql(),
            n + 1,
            n + 2
        );
        let mut query = sqlx::query_as::<_, InventoryItem>(&sql);
        for p in clause.params() {
            query = query.bind(p);
        }
        let items = query
            .bind(params.page.limit())
            .bind(params.page.offset())
            .fetch_all(&mut *conn)
            .await?;

        Ok(Page::new(items, total, params.page))
    }

    /// Whole location stock by name, for pickers.
    pub async fn all_items(
        &self,
        ctx: &AuthContext,
        location_id: Option<&str>,
    ) -> AppResult<Vec<InventoryItem>> {
        let Some(location_id) = selected(location_id) else {
            return Ok(Vec::new());
        };
        let mut conn = acquire_as(&self.pool, ctx).await?;
        let sql = format!(
            "SELECT {} FROM v_inventario_completo WHERE id_localizacion = $1::bigint \
             ORDER BY nombre ASC LIMIT {}",
            INVENTORY_COLUMNS, ALL_ITEMS_LIMIT
        );
        Ok(sqlx::query_as::<_, InventoryItem>(&sql)
            .bind(location_id)
            .fetch_all(&mut *conn)
            .await?)
    }

    pub async fn get(&self, ctx: &AuthContext, id_inventario: &str) -> AppResult<InventoryItem> {
        let mut conn = acquire_as(&self.pool, ctx).await?;
        let sql = format!(
            "SELECT {} FROM v_inventario_completo WHERE id_inventario = $1::uuid",
            INVENTORY_COLUMNS
        );
        sqlx::query_as::<_, InventoryItem>(&sql)
            .bind(id_inventario)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Inventario {}", id_inventario)))
    }

    pub async fn search(
        &self,
        ctx: &AuthContext,
        location_id: Option<&str>,
        term: &str,
    ) -> AppResult<Vec<InventoryItem>> {
        let Some(location_id) = selected(location_id) else {
            return Ok(Vec::new());
        };
        if term.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut clause = WhereClause::new();
        clause
            .eq("id_localizacion", "bigint", location_id)
            .search(&["nombre", "referencia"], term);
        let sql = format!(
            "SELECT {} FROM v_inventario_completo {} ORDER BY referencia LIMIT {}",
            INVENTORY_COLUMNS,
            clause.sql(),
            SEARCH_LIMIT
        );

        let mut conn = acquire_as(&self.pool, ctx).await?;
        let mut query = sqlx::query_as::<_, InventoryItem>(&sql);
        for p in clause.params() {
            query = query.bind(p);
        }
        Ok(query.fetch_all(&mut *conn).await?)
    }

    /// Updates stock, position and part attributes in one procedure call.
    pub async fn update_item(
        &self,
        ctx: &AuthContext,
        update: &InventoryUpdate,
    ) -> AppResult<serde_json::Value> {
        if update.stock_actual < 0 {
            return Err(AppError::InvalidInput(
                "El stock no puede ser negativo".to_string(),
            ));
        }

        let mut conn = acquire_as(&self.pool, ctx).await?;
        let result = RpcCall::new("actualizar_item_inventario")
            .arg("p_id_inventario", "uuid", Some(update.id_inventario.clone()))
            .arg("p_stock_actual", "int4", Some(update.stock_actual.to_string()))
            .arg("p_posicion", "text", Some(update.posicion.clone()))
            .arg("p_cantidad_minima", "int4", Some(update.cantidad_minima.to_string()))
            .arg("p_descontinuado", "boolean", Some(update.descontinuado.to_string()))
            .arg("p_tipo", "text", Some(update.tipo.clone()))
            .arg("p_fecha_estimada", "date", update.fecha_estimada.clone())
            .arg("p_nuevo_hasta", "timestamptz", update.nuevo_hasta.clone())
            .fetch_one(&mut *conn)
            .await?;

        tracing::info!(
            "Updated inventory item: id={}, stock={}",
            update.id_inventario,
            update.stock_actual
        );
        Ok(result)
    }

    pub async fn create_item(&self, ctx: &AuthContext, item: &NewInventoryItem) -> AppResult<()> {
        if item.cantidad < 0 {
            return Err(AppError::InvalidInput(
                "La cantidad no puede ser negativa".to_string(),
            ));
        }

        let mut conn = acquire_as(&self.pool, ctx).await?;
        sqlx::query(
            "INSERT INTO inventario (id_repuesto, id_localizacion, cantidad, posicion, nuevo_hasta) \
             VALUES ($1::uuid, $2::bigint, $3, $4, $5::timestamptz)",
        )
        .bind(&item.id_repuesto)
        .bind(&item.id_localizacion)
        .bind(item.cantidad)
        .bind(item.posicion.as_deref())
        .bind(item.nuevo_hasta.as_deref())
        .execute(&mut *conn)
        .await?;

        tracing::info!(
            "Created inventory item: repuesto={}, localizacion={}, cantidad={}",
            item.id_repuesto,
            item.id_localizacion,
            item.cantidad
        );
        Ok(())
    }

    /// Timeline of one part reference, newest first, `page` is 0-based.
    pub async fn movement_history(
        &self,
        ctx: &AuthContext,
        referencia: &str,
        page: u32,
    ) -> AppResult<HistoryPage> {
        let mut conn = acquire_as(&self.pool, ctx).await?;
        let sql = format!(
            "SELECT {} FROM vista_timeline_repuesto WHERE referencia = $1 \
             ORDER BY fecha_movimiento DESC, created_at DESC LIMIT $2 OFFSET $3",
            HISTORY_COLUMNS
        );
        let items = sqlx::query_as::<_, MovementHistoryItem>(&sql)
            .bind(referencia)
            .bind(HISTORY_PAGE_SIZE)
            .bind(i64::from(page) * HISTORY_PAGE_SIZE)
            .fetch_all(&mut *conn)
            .await?;
        Ok(HistoryPage::new(items, page))
    }
}

/// The stored location id may be missing or the literal `"null"`.
pub(crate) fn selected(location_id: Option<&str>) -> Option<&str> {
    location_id
        .map(str::trim)
        .filter(|l| !l.is_empty() && *l != "null")
}
