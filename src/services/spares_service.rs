use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::{acquire_as, AuthContext, WhereClause};
use crate::error::{AppError, AppResult};
use crate::models::spare_part::SPARE_PART_COLUMNS;
use crate::models::{
    Page, SparePart, SparePartChanges, SparePartInput, SparePartMatch, SparesParams,
};

pub const SEARCH_LIMIT: i64 = 50;

/// Catalogue writes used by the spreadsheet import.
#[async_trait]
pub trait SparePartWriter: Send + Sync {
    async fn create(&self, ctx: &AuthContext, input: &SparePartInput) -> AppResult<SparePart>;
}

#[derive(Clone)]
pub struct SparesService {
    pool: PgPool,
}

impl SparesService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, ctx: &AuthContext, params: &SparesParams) -> AppResult<Page<SparePart>> {
        let mut clause = WhereClause::new();
        if let Some(term) = params.search.as_deref() {
            clause.search(&["nombre", "referencia"], term);
        }
        if let Some(tipo) = params.category_filter() {
            clause.eq("tipo", "text", tipo);
        }
        if let Some(descontinuado) = params.descontinuado {
            clause.eq("descontinuado", "boolean", descontinuado.to_string());
        }

        let mut conn = acquire_as(&self.pool, ctx).await?;

        let count_sql = format!("SELECT COUNT(*) FROM repuestos {}", clause.sql());
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        for p in clause.params() {
            count_query = count_query.bind(p);
        }
        let total = count_query.fetch_one(&mut *conn).await?;

        let n = clause.params().len();
        let sql = format!(
            "SELECT {} FROM repuestos {} ORDER BY {} {} NULLS LAST LIMIT ${} OFFSET ${}",
            SPARE_PART_COLUMNS,
            clause.sql(),
            params.order_by.column(),
            params.direction.as_sql(),
            n + 1,
            n + 2
        );
        let mut query = sqlx::query_as::<_, SparePart>(&sql);
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

    pub async fn get(&self, ctx: &AuthContext, id: &str) -> AppResult<SparePart> {
        let mut conn = acquire_as(&self.pool, ctx).await?;
        let sql = format!("SELECT {} FROM repuestos WHERE id_repuesto = $1::uuid", SPARE_PART_COLUMNS);
        sqlx::query_as::<_, SparePart>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Repuesto {}", id)))
    }

    /// `None` when no part carries the reference.
    pub async fn find_by_reference(
        &self,
        ctx: &AuthContext,
        referencia: &str,
    ) -> AppResult<Option<SparePart>> {
        let mut conn = acquire_as(&self.pool, ctx).await?;
        let sql = format!("SELECT {} FROM repuestos WHERE referencia = $1 LIMIT 1", SPARE_PART_COLUMNS);
        Ok(sqlx::query_as::<_, SparePart>(&sql)
            .bind(referencia)
            .fetch_optional(&mut *conn)
            .await?)
    }

    pub async fn update(
        &self,
        ctx: &AuthContext,
        id: &str,
        changes: &SparePartChanges,
    ) -> AppResult<SparePart> {
        if changes.is_empty() {
            return self.get(ctx, id).await;
        }

        let mut sets = Vec::new();
        let mut values: Vec<Option<String>> = Vec::new();
        let mut push = |column: &str, cast: &str, value: Option<String>| {
            values.push(value);
            sets.push(format!("{} = ${}::{}", column, values.len(), cast));
        };
        if let Some(v) = &changes.referencia {
            push("referencia", "text", Some(v.clone()));
        }
        if let Some(v) = &changes.nombre {
            push("nombre", "text", Some(v.clone()));
        }
        if let Some(v) = changes.cantidad_minima {
            push("cantidad_minima", "int4", Some(v.to_string()));
        }
        if let Some(v) = changes.descontinuado {
            push("descontinuado", "boolean", Some(v.to_string()));
        }
        if let Some(v) = &changes.tipo {
            push("tipo", "text", Some(v.clone()));
        }
        if let Some(v) = &changes.fecha_estimada {
            push("fecha_estimada", "date", non_empty(v));
        }
        if let Some(v) = &changes.url_imagen {
            push("url_imagen", "text", non_empty(v));
        }
        if let Some(v) = &changes.marca {
            push("marca", "text", Some(v.clone()));
        }
        if let Some(v) = &changes.descripcion {
            push("descripcion", "text", Some(v.clone()));
        }

        let sql = format!(
            "UPDATE repuestos SET {} WHERE id_repuesto = ${}::uuid RETURNING {}",
            sets.join(", "),
            values.len() + 1,
            SPARE_PART_COLUMNS
        );

        let mut conn = acquire_as(&self.pool, ctx).await?;
        let mut query = sqlx::query_as::<_, SparePart>(&sql);
        for v in &values {
            query = query.bind(v.as_deref());
        }
        let part = query
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Repuesto {}", id)))?;

        tracing::info!("Updated spare part: id={}, referencia={}", part.id_repuesto, part.referencia);
        Ok(part)
    }

    pub async fn delete(&self, ctx: &AuthContext, id: &str) -> AppResult<()> {
        let mut conn = acquire_as(&self.pool, ctx).await?;
        let rows_affected = sqlx::query("DELETE FROM repuestos WHERE id_repuesto = $1::uuid")
            .bind(id)
            .execute(&mut *conn)
            .await?
            .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::NotFound(format!("Repuesto {}", id)));
        }
        tracing::info!("Deleted spare part: id={}", id);
        Ok(())
    }

    /// Autocomplete over a location's inventory, or over the catalogue when
    /// no location is given. Blank terms return nothing.
    pub async fn search(
        &self,
        ctx: &AuthContext,
        term: &str,
        location_id: Option<&str>,
    ) -> AppResult<Vec<SparePartMatch>> {
        if term.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut clause = WhereClause::new();
        let (source, stock) = match location_id.filter(|l| !l.is_empty()) {
            Some(location) => {
                clause.eq("id_localizacion", "bigint", location);
                ("v_inventario_completo", "stock_actual::int4")
            }
            None => ("repuestos", "NULL::int4"),
        };
        clause.search(&["nombre", "referencia"], term);

        let sql = format!(
            "SELECT id_repuesto::text, referencia, nombre, {} AS stock_actual FROM {} {} \
             ORDER BY referencia LIMIT {}",
            stock,
            source,
            clause.sql(),
            SEARCH_LIMIT
        );

        let mut conn = acquire_as(&self.pool, ctx).await?;
        let mut query = sqlx::query_as::<_, SparePartMatch>(&sql);
        for p in clause.params() {
            query = query.bind(p);
        }
        Ok(query.fetch_all(&mut *conn).await?)
    }
}

#[async_trait]
impl SparePartWriter for SparesService {
    async fn create(&self, ctx: &AuthContext, input: &SparePartInput) -> AppResult<SparePart> {
        if input.referencia.trim().is_empty() || input.nombre.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "La referencia y el nombre son obligatorios".to_string(),
            ));
        }

        let mut conn = acquire_as(&self.pool, ctx).await?;
        let sql = format!(
            "INSERT INTO repuestos (referencia, nombre, cantidad_minima, descontinuado, tipo, \
             fecha_estimada, url_imagen, marca, descripcion) \
             VALUES ($1, $2, $3, $4, $5, $6::date, $7, $8, $9) \
             RETURNING {}",
            SPARE_PART_COLUMNS
        );
        let part = sqlx::query_as::<_, SparePart>(&sql)
            .bind(input.referencia.trim())
            .bind(input.nombre.trim())
            .bind(input.cantidad_minima)
            .bind(input.descontinuado)
            .bind(&input.tipo)
            .bind(input.fecha_estimada.as_deref())
            .bind(input.url_imagen.as_deref())
            .bind(&input.marca)
            .bind(&input.descripcion)
            .fetch_one(&mut *conn)
            .await?;

        tracing::info!("Created spare part: id={}, referencia={}", part.id_repuesto, part.referencia);
        Ok(part)
    }
}

/// Empty strings clear nullable columns.
fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty("  "), None);
        assert_eq!(non_empty(" 2024-05-01 "), Some("2024-05-01".to_string()));
    }
}
