use std::path::Path;
use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use crate::db::{acquire_as, AuthContext};
use crate::error::{AppError, AppResult};
use crate::models::warranty::WARRANTY_COLUMNS;
use crate::models::{Warranty, WarrantyDetails, WarrantyStatus};
use crate::storage::{content_type_for, StorageBackend};

/// Folder inside the evidence bucket.
pub const EVIDENCE_PREFIX: &str = "warranty-evidence";

#[derive(Clone)]
pub struct WarrantiesService {
    pool: PgPool,
    storage: Arc<dyn StorageBackend>,
}

impl WarrantiesService {
    pub fn new(pool: PgPool, storage: Arc<dyn StorageBackend>) -> Self {
        Self { pool, storage }
    }

    /// Warranties reported at a location, newest report first.
    pub async fn dashboard(&self, ctx: &AuthContext, location_id: &str) -> AppResult<Vec<Warranty>> {
        let mut conn = acquire_as(&self.pool, ctx).await?;
        let sql = format!(
            "SELECT {} FROM v_garantias_dashboard WHERE id_localizacion = $1::bigint \
             ORDER BY fecha_reporte DESC",
            WARRANTY_COLUMNS
        );
        Ok(sqlx::query_as::<_, Warranty>(&sql)
            .bind(location_id)
            .fetch_all(&mut *conn)
            .await?)
    }

    pub async fn update_status(
        &self,
        ctx: &AuthContext,
        id: &str,
        status: WarrantyStatus,
    ) -> AppResult<()> {
        let mut conn = acquire_as(&self.pool, ctx).await?;
        let rows_affected = sqlx::query(
            "UPDATE garantias SET estado = $1, updated_at = NOW() WHERE id_garantia = $2::uuid",
        )
        .bind(status.as_str())
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::NotFound(format!("Garantía {}", id)));
        }
        tracing::info!("Updated warranty status: id={}, estado={}", id, status.as_str());
        Ok(())
    }

    pub async fn update_details(
        &self,
        ctx: &AuthContext,
        id: &str,
        details: &WarrantyDetails,
    ) -> AppResult<()> {
        let mileage = details
            .kilometraje
            .as_deref()
            .map(parse_mileage)
            .transpose()?
            .flatten();

        let mut conn = acquire_as(&self.pool, ctx).await?;
        let rows_affected = sqlx::query(
            "UPDATE garantias SET estado = $1, comentarios_resolucion = $2, \
             kilometraje = $3::numeric, motivo_falla = $4, solicitante = $5, \
             url_evidencia_foto = $6, updated_at = NOW() \
             WHERE id_garantia = $7::uuid",
        )
        .bind(details.estado.as_str())
        .bind(details.comentarios_resolucion.as_deref())
        .bind(mileage.as_deref())
        .bind(details.motivo_falla.as_deref())
        .bind(details.solicitante.as_deref())
        .bind(details.url_evidencia_foto.as_deref())
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::NotFound(format!("Garantía {}", id)));
        }
        tracing::info!(
            "Updated warranty details: id={}, estado={}",
            id,
            details.estado.as_str()
        );
        Ok(())
    }

    /// Uploads an evidence photo and returns its public URL.
    pub async fn upload_evidence(&self, path: &Path) -> AppResult<String> {
        let data = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| AppError::InvalidInput("Nombre de archivo inválido".to_string()))?;
        upload_evidence(self.storage.as_ref(), file_name, data).await
    }
}

pub(crate) async fn upload_evidence(
    storage: &dyn StorageBackend,
    file_name: &str,
    data: Vec<u8>,
) -> AppResult<String> {
    let key = evidence_key(file_name, chrono::Utc::now().timestamp_millis());
    let extension = file_name.rsplit('.').next().unwrap_or_default();
    storage
        .upload(&key, data, content_type_for(extension))
        .await?;
    tracing::info!("Uploaded warranty evidence: bucket={}, key={}", storage.bucket(), key);
    Ok(storage.public_url(&key))
}

/// `warranty-evidence/<random>-<millis>.<ext>`
fn evidence_key(file_name: &str, millis: i64) -> String {
    let extension = file_name.rsplit('.').next().unwrap_or(file_name);
    let random = Uuid::new_v4().simple().to_string();
    format!("{}/{}-{}.{}", EVIDENCE_PREFIX, &random[..11], millis, extension)
}

/// Mileage as typed by the user ("12.500 km"); blank clears it.
fn parse_mileage(value: &str) -> AppResult<Option<String>> {
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        if value.trim().is_empty() {
            return Ok(None);
        }
        return Err(AppError::InvalidInput(format!(
            "Kilometraje inválido: {}",
            value.trim()
        )));
    }
    Ok(Some(digits))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct MemoryStorage {
        objects: Mutex<Vec<(String, usize, String)>>,
    }

    #[async_trait]
    impl StorageBackend for MemoryStorage {
        async fn upload(&self, key: &str, data: Vec<u8>, content_type: &str) -> AppResult<String> {
            self.objects
                .lock()
                .unwrap()
                .push((key.to_string(), data.len(), content_type.to_string()));
            Ok(key.to_string())
        }

        fn public_url(&self, key: &str) -> String {
            format!("https://storage.test/object/public/evidencias/{}", key)
        }

        async fn delete(&self, _key: &str) -> AppResult<()> {
            Ok(())
        }

        fn bucket(&self) -> &str {
            "evidencias"
        }
    }

    #[test]
    fn test_evidence_key_shape() {
        let key = evidence_key("foto.frenos.JPG", 1_714_550_400_000);
        assert!(key.starts_with("warranty-evidence/"));
        assert!(key.ends_with("-1714550400000.JPG"));
        let name = key.trim_start_matches("warranty-evidence/");
        assert_eq!(name.split('-').next().unwrap().len(), 11);
    }

    #[tokio::test]
    async fn test_upload_returns_public_url() {
        let storage = MemoryStorage::default();
        let url = upload_evidence(&storage, "evidencia.png", vec![1, 2, 3])
            .await
            .unwrap();

        let objects = storage.objects.lock().unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].1, 3);
        assert_eq!(objects[0].2, "image/png");
        assert_eq!(
            url,
            format!("https://storage.test/object/public/evidencias/{}", objects[0].0)
        );
    }

    #[test]
    fn test_parse_mileage() {
        assert_eq!(parse_mileage("12.500 km").unwrap(), Some("12500".to_string()));
        assert_eq!(parse_mileage("  ").unwrap(), None);
        assert!(parse_mileage("mucho").is_err());
    }
}
