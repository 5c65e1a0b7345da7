use sqlx::PgPool;

use crate::db::{acquire_as, AuthContext};
use crate::error::{AppError, AppResult};
use crate::models::request::REQUEST_HISTORY_COLUMNS;
use crate::models::{Location, RequestHistoryItem, Technician, TECHNICIAN_ROLE};

/// Read side of transfer requests plus the location directory.
#[derive(Clone)]
pub struct RequestsService {
    pool: PgPool,
}

impl RequestsService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Newest first; visibility is left to row-level security.
    pub async fn history(&self, ctx: &AuthContext) -> AppResult<Vec<RequestHistoryItem>> {
        let mut conn = acquire_as(&self.pool, ctx).await?;
        let sql = format!(
            "SELECT {} FROM v_historial_solicitudes ORDER BY fecha_creacion DESC",
            REQUEST_HISTORY_COLUMNS
        );
        Ok(sqlx::query_as::<_, RequestHistoryItem>(&sql)
            .fetch_all(&mut *conn)
            .await?)
    }

    pub async fn locations(&self, ctx: &AuthContext) -> AppResult<Vec<Location>> {
        let mut conn = acquire_as(&self.pool, ctx).await?;
        Ok(sqlx::query_as::<_, Location>(
            "SELECT id_localizacion::text, nombre, telefono::text FROM localizacion ORDER BY nombre",
        )
        .fetch_all(&mut *conn)
        .await?)
    }

    pub async fn location(&self, ctx: &AuthContext, id: &str) -> AppResult<Location> {
        let mut conn = acquire_as(&self.pool, ctx).await?;
        sqlx::query_as::<_, Location>(
            "SELECT id_localizacion::text, nombre, telefono::text FROM localizacion \
             WHERE id_localizacion = $1::bigint",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Localización {}", id)))
    }

    /// Users with the technician role assigned to a location.
    pub async fn technicians(&self, ctx: &AuthContext, location_id: &str) -> AppResult<Vec<Technician>> {
        let mut conn = acquire_as(&self.pool, ctx).await?;
        Ok(sqlx::query_as::<_, Technician>(
            "SELECT id_usuario::text, nombre_usuario FROM v_tecnicos_por_localizacion \
             WHERE id_localizacion = $1::bigint AND nombre_rol = $2 ORDER BY nombre_usuario",
        )
        .bind(location_id)
        .bind(TECHNICIAN_ROLE)
        .fetch_all(&mut *conn)
        .await?)
    }
}
