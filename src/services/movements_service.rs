use sqlx::PgPool;

use crate::db::{acquire_as, AuthContext, RpcCall, WhereClause};
use crate::error::{AppError, AppResult};
use crate::models::movement::{MOVEMENT_COUNT, MOVEMENT_SELECT};
use crate::models::{
    MovementFilters, MovementOutcome, NewTechnicalMovement, Page, PageRequest, TechnicalMovement,
    WarrantyMovement, WARRANTY_MOVEMENT_TYPE,
};

#[derive(Clone)]
pub struct MovementsService {
    pool: PgPool,
}

impl MovementsService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Paginated technical movements, newest first.
    pub async fn list(
        &self,
        ctx: &AuthContext,
        filters: &MovementFilters,
    ) -> AppResult<Page<TechnicalMovement>> {
        let clause = movement_clause(filters);
        let mut conn = acquire_as(&self.pool, ctx).await?;

        let count_sql = format!("{} {}", MOVEMENT_COUNT, clause.sql());
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        for p in clause.params() {
            count_query = count_query.bind(p);
        }
        let total = count_query.fetch_one(&mut *conn).await?;

        let n = clause.params().len();
        let sql = format!(
            "{} {} ORDER BY m.fecha DESC, m.created_at DESC LIMIT ${} OFFSET ${}",
            MOVEMENT_SELECT,
            clause.sql(),
            n + 1,
            n + 2
        );
        let mut query = sqlx::query_as::<_, TechnicalMovement>(&sql);
        for p in clause.params() {
            query = query.bind(p);
        }
        let items = query
            .bind(filters.page.limit())
            .bind(filters.page.offset())
            .fetch_all(&mut *conn)
            .await?;

        Ok(Page::new(items, total, filters.page))
    }

    /// Runs `registrar_movimiento_tecnico`. A `{success: false}` answer
    /// (e.g. insufficient stock) is returned as a validation error.
    pub async fn register(
        &self,
        ctx: &AuthContext,
        movement: &NewTechnicalMovement,
    ) -> AppResult<MovementOutcome> {
        if movement.cantidad <= 0 {
            return Err(AppError::InvalidInput(
                "La cantidad debe ser mayor que cero".to_string(),
            ));
        }

        let mut conn = acquire_as(&self.pool, ctx).await?;
        let result = RpcCall::new("registrar_movimiento_tecnico")
            .arg("p_id_localizacion", "bigint", Some(movement.id_localizacion.clone()))
            .arg("p_id_repuesto", "uuid", Some(movement.id_repuesto.clone()))
            .arg(
                "p_id_usuario_responsable",
                "uuid",
                Some(movement.id_usuario_responsable.clone()),
            )
            .arg("p_concepto", "text", Some(movement.concepto.as_str().to_string()))
            .arg("p_tipo", "text", Some(movement.tipo.as_str().to_string()))
            .arg("p_cantidad", "int4", Some(movement.cantidad.to_string()))
            .arg(
                "p_numero_orden",
                "text",
                movement.numero_orden.clone().filter(|o| !o.trim().is_empty()),
            )
            .arg("p_descargada", "boolean", Some(movement.descargada.to_string()))
            .fetch_one(&mut *conn)
            .await?;

        let outcome = parse_outcome(result)?;
        tracing::info!(
            "Registered technical movement: id={:?}, repuesto={}, concepto={}, cantidad={}",
            outcome.id_movimiento,
            movement.id_repuesto,
            movement.concepto.as_str(),
            movement.cantidad
        );
        Ok(outcome)
    }

    pub async fn mark_downloaded(&self, ctx: &AuthContext, id: &str) -> AppResult<()> {
        let mut conn = acquire_as(&self.pool, ctx).await?;
        let rows_affected = sqlx::query(
            "UPDATE movimientos_tecnicos SET descargada = true \
             WHERE id_movimientos_tecnicos = $1::uuid",
        )
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::NotFound(format!("Movimiento {}", id)));
        }
        tracing::info!("Marked technical movement as downloaded: id={}", id);
        Ok(())
    }

    /// Warranty exits of a location, newest first.
    pub async fn warranty_movements(
        &self,
        ctx: &AuthContext,
        location_id: &str,
        page: PageRequest,
    ) -> AppResult<Page<WarrantyMovement>> {
        let mut conn = acquire_as(&self.pool, ctx).await?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM vista_timeline_repuesto \
             WHERE tipo_movimiento = $1 AND id_localizacion = $2::bigint",
        )
        .bind(WARRANTY_MOVEMENT_TYPE)
        .bind(location_id)
        .fetch_one(&mut *conn)
        .await?;

        let items = sqlx::query_as::<_, WarrantyMovement>(
            "SELECT fecha_movimiento::text, \
             metadata->>'referencia_repuesto' AS referencia, \
             metadata->>'numero_orden' AS orden, \
             metadata->>'tecnico_asignado' AS tecnico, \
             COALESCE(cantidad, 0)::int4 AS cantidad \
             FROM vista_timeline_repuesto \
             WHERE tipo_movimiento = $1 AND id_localizacion = $2::bigint \
             ORDER BY fecha_movimiento DESC LIMIT $3 OFFSET $4",
        )
        .bind(WARRANTY_MOVEMENT_TYPE)
        .bind(location_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&mut *conn)
        .await?;

        Ok(Page::new(items, total, page))
    }
}

fn movement_clause(filters: &MovementFilters) -> WhereClause {
    let mut clause = WhereClause::new();
    if let Some(location) = filters.location_id.as_deref().filter(|l| !l.is_empty()) {
        clause.eq("m.id_localizacion", "bigint", location);
    }
    if let Some(technician) = filters.technician_id.as_deref().filter(|t| !t.is_empty()) {
        clause.eq("m.id_tecnico_asignado", "uuid", technician);
    }
    if let Some(start) = filters.start_date.as_deref().filter(|d| !d.is_empty()) {
        clause.compare("m.fecha", ">=", "date", start);
    }
    if let Some(end) = filters.end_date.as_deref().filter(|d| !d.is_empty()) {
        // Inclusive end date on a timestamp column.
        clause.compare("m.fecha", "<", "date + 1", end);
    }
    if let Some(order) = filters.order_number.as_deref() {
        clause.search(&["m.numero_orden::text"], order);
    }
    if let Some(concept) = filters.concept {
        clause.eq("m.concepto", "text", concept.as_str());
    }
    if let Some(downloaded) = filters.downloaded.as_bool() {
        clause.raw(if downloaded {
            "COALESCE(m.descargada, false) = true"
        } else {
            "COALESCE(m.descargada, false) = false"
        });
    }
    clause
}

fn parse_outcome(value: serde_json::Value) -> AppResult<MovementOutcome> {
    if value.is_null() {
        return Err(AppError::Internal(
            "registrar_movimiento_tecnico no devolvió resultado".to_string(),
        ));
    }
    let outcome: MovementOutcome = serde_json::from_value(value)?;
    if !outcome.success {
        return Err(AppError::InvalidInput(
            outcome
                .message
                .unwrap_or_else(|| "No se pudo registrar el movimiento".to_string()),
        ));
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::{DownloadedFilter, MovementConcept};

    #[test]
    fn test_movement_clause_with_all_filters() {
        let filters = MovementFilters {
            location_id: Some("3".to_string()),
            technician_id: Some("t-1".to_string()),
            start_date: Some("2024-05-01".to_string()),
            end_date: Some("2024-05-31".to_string()),
            order_number: Some("OT-7".to_string()),
            concept: Some(MovementConcept::ALL[0]),
            downloaded: DownloadedFilter::No,
            ..Default::default()
        };
        let clause = movement_clause(&filters);
        let sql = clause.sql();

        assert!(sql.starts_with("WHERE m.id_localizacion = $1::bigint"));
        assert!(sql.contains("m.id_tecnico_asignado = $2::uuid"));
        assert!(sql.contains("m.fecha >= $3::date"));
        assert!(sql.contains("m.fecha < $4::date + 1"));
        assert!(sql.contains("m.numero_orden::text ILIKE $5::text"));
        assert!(sql.contains("m.concepto = $6::text"));
        assert!(sql.ends_with("COALESCE(m.descargada, false) = false"));
        assert_eq!(clause.params().len(), 6);
    }

    #[test]
    fn test_empty_filters_have_no_clause() {
        let clause = movement_clause(&MovementFilters::default());
        assert!(clause.is_empty());
    }

    #[test]
    fn test_business_failure_is_validation_error() {
        let err = parse_outcome(json!({"success": false, "message": "Stock insuficiente"}))
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(ref m) if m == "Stock insuficiente"));
    }

    #[test]
    fn test_successful_outcome() {
        let outcome = parse_outcome(json!({"success": true, "id_movimiento": "m-1"})).unwrap();
        assert_eq!(outcome.id_movimiento, Some(json!("m-1")));
    }

    #[test]
    fn test_null_outcome_is_internal_error() {
        assert!(matches!(
            parse_outcome(serde_json::Value::Null),
            Err(AppError::Internal(_))
        ));
    }
}
