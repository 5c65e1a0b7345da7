use std::path::PathBuf;

use sqlx::PgPool;

use crate::db::{acquire_as, AuthContext, RpcCall};
use crate::error::{AppError, AppResult};
use crate::models::{CountClosure, CountHistoryItem, CountResult, CountRow, PartialCountItem};
use crate::services::import_service::{read_sheet, Record};

/// Count sheets carry a title line; the column names are on the second row.
pub const COUNT_HEADER_ROW: usize = 1;
pub const REFERENCE_COLUMN: &str = "REF.";
pub const QUANTITY_COLUMN: &str = "CANT.";

pub const NO_VALID_ROWS: &str = "No se encontraron datos válidos para enviar.";

/// Reads every file and concatenates their valid `{REF, CANT}` rows.
pub fn parse_count_files(paths: &[PathBuf]) -> AppResult<Vec<CountRow>> {
    let mut rows = Vec::new();
    for path in paths {
        let records = read_sheet(path, COUNT_HEADER_ROW)?;
        let parsed = count_rows(&records);
        tracing::debug!(
            "Parsed count file {}: {} of {} rows usable",
            path.display(),
            parsed.len(),
            records.len()
        );
        rows.extend(parsed);
    }
    Ok(rows)
}

/// Rows without a reference, or whose quantity is missing or not positive, are skipped.
pub fn count_rows(records: &[Record]) -> Vec<CountRow> {
    records
        .iter()
        .filter_map(|record| {
            let reference = record.get(REFERENCE_COLUMN)?.trim();
            if reference.is_empty() {
                return None;
            }
            let quantity: f64 = record.get(QUANTITY_COLUMN)?.trim().parse().ok()?;
            (quantity > 0.0).then(|| CountRow {
                reference: reference.to_string(),
                quantity,
            })
        })
        .collect()
}

#[derive(Clone)]
pub struct CountService {
    pool: PgPool,
}

impl CountService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Compares counted quantities against the location's stock.
    pub async fn send_count(
        &self,
        ctx: &AuthContext,
        location_id: &str,
        rows: &[CountRow],
    ) -> AppResult<Vec<CountResult>> {
        if rows.is_empty() {
            return Err(AppError::InvalidInput(NO_VALID_ROWS.to_string()));
        }

        let mut conn = acquire_as(&self.pool, ctx).await?;
        let results = RpcCall::new("procesar_comparacion_excel")
            .arg("p_id_localizacion", "bigint", Some(location_id.to_string()))
            .arg("p_datos_excel", "jsonb", Some(serde_json::to_string(rows)?))
            .fetch_many(&mut *conn)
            .await?;

        tracing::info!(
            "Processed count comparison: localizacion={}, rows={}, results={}",
            location_id,
            rows.len(),
            results.len()
        );
        results
            .into_iter()
            .map(|r| serde_json::from_value(r).map_err(AppError::from))
            .collect()
    }

    /// Parts the backend picks for a partial count of a location.
    pub async fn generate_partial_count(
        &self,
        ctx: &AuthContext,
        location_id: &str,
    ) -> AppResult<Vec<PartialCountItem>> {
        if location_id.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Se requiere una ubicación para generar el conteo parcial".to_string(),
            ));
        }

        let mut conn = acquire_as(&self.pool, ctx).await?;
        let items = RpcCall::new("generar_items_conteo_parcial")
            .arg("p_id_localizacion", "bigint", Some(location_id.to_string()))
            .fetch_many(&mut *conn)
            .await?;

        items
            .into_iter()
            .map(|i| serde_json::from_value(i).map_err(AppError::from))
            .collect()
    }

    pub async fn history(&self, ctx: &AuthContext, location_id: &str) -> AppResult<Vec<CountHistoryItem>> {
        let mut conn = acquire_as(&self.pool, ctx).await?;
        Ok(sqlx::query_as::<_, CountHistoryItem>(
            "SELECT fecha::text, tipo, usuario FROM vista_historial_conteos \
             WHERE localizacion::text = $1 ORDER BY fecha DESC",
        )
        .bind(location_id)
        .fetch_all(&mut *conn)
        .await?)
    }

    /// Stores a finished count with its totals and line items.
    pub async fn register_closure(
        &self,
        ctx: &AuthContext,
        closure: &CountClosure,
    ) -> AppResult<serde_json::Value> {
        if closure.items.is_empty() {
            return Err(AppError::InvalidInput(NO_VALID_ROWS.to_string()));
        }

        let mut conn = acquire_as(&self.pool, ctx).await?;
        let result = RpcCall::new("guardar_cierre_conteo")
            .arg("p_id_localizacion", "bigint", Some(closure.id_localizacion.clone()))
            .arg("p_id_usuario", "uuid", Some(closure.id_usuario.clone()))
            .arg("p_tipo", "text", Some(closure.tipo.as_str().to_string()))
            .arg(
                "p_total_items_auditados",
                "int4",
                Some(closure.totals.total_items_auditados.to_string()),
            )
            .arg(
                "p_total_diferencia_encontrada",
                "int4",
                Some(closure.totals.total_diferencia_encontrada.to_string()),
            )
            .arg(
                "p_total_items_pq",
                "int4",
                Some(closure.totals.total_items_pq.to_string()),
            )
            .arg(
                "p_observaciones",
                "text",
                closure.observaciones.clone().filter(|o| !o.trim().is_empty()),
            )
            .arg("p_items", "jsonb", Some(serde_json::to_string(&closure.items)?))
            .fetch_one(&mut *conn)
            .await?;

        tracing::info!(
            "Registered count closure: localizacion={}, tipo={}, items={}",
            closure.id_localizacion,
            closure.tipo.as_str(),
            closure.items.len()
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_count_rows_skip_invalid() {
        let records = vec![
            record(&[("REF.", "PF-100"), ("CANT.", "3")]),
            record(&[("REF.", "FA-200"), ("CANT.", "0")]),
            record(&[("REF.", "BJ-300")]),
            record(&[("CANT.", "5")]),
            record(&[("REF.", "AC-400"), ("CANT.", "-2")]),
            record(&[("REF.", "12345"), ("CANT.", "1.5")]),
            record(&[("REF.", "XX-1"), ("CANT.", "varios")]),
        ];
        let rows = count_rows(&records);
        assert_eq!(
            rows,
            vec![
                CountRow {
                    reference: "PF-100".to_string(),
                    quantity: 3.0
                },
                CountRow {
                    reference: "12345".to_string(),
                    quantity: 1.5
                },
            ]
        );
    }

    #[test]
    fn test_parse_count_files_concatenates() {
        let mut first = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        first
            .write_all(b"CONTEO BODEGA\nREF.,CANT.\nPF-100,2\nFA-200,0\n")
            .unwrap();
        let mut second = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        second
            .write_all(b"CONTEO BODEGA\nREF.,CANT.,OBS.\nBJ-300,4,revisar\n")
            .unwrap();

        let rows = parse_count_files(&[first.path().to_path_buf(), second.path().to_path_buf()])
            .unwrap();
        let references: Vec<&str> = rows.iter().map(|r| r.reference.as_str()).collect();
        assert_eq!(references, vec!["PF-100", "BJ-300"]);
    }
}
