use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::{acquire_as, begin_as, AuthContext};
use crate::error::{AppError, AppResult};
use crate::models::cart::CART_COLUMNS;
use crate::models::{CartItem, NewCartEntry, RequestDraft, RequestLine, REQUEST_STATUS_PENDING};
use crate::notify::{report_with, Notifier};
use crate::queries::{Mutation, QueryCache};

/// Persistence of the request cart and of submitted requests.
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// Staged rows of a location, newest first.
    async fn list(&self, location_id: &str) -> AppResult<Vec<CartItem>>;

    /// Stages a part. Returns `false` when the user already staged it.
    async fn insert_ignore(&self, entry: &NewCartEntry) -> AppResult<bool>;

    /// Returns the number of rows removed.
    async fn delete(&self, ids: &[String]) -> AppResult<u64>;

    /// Creates the request header and its lines, returns the request id.
    async fn create_request(&self, draft: &RequestDraft) -> AppResult<String>;
}

pub struct PgCartRepository {
    pool: PgPool,
    ctx: AuthContext,
}

impl PgCartRepository {
    pub fn new(pool: PgPool, ctx: AuthContext) -> Self {
        Self { pool, ctx }
    }
}

#[async_trait]
impl CartRepository for PgCartRepository {
    async fn list(&self, location_id: &str) -> AppResult<Vec<CartItem>> {
        let mut conn = acquire_as(&self.pool, &self.ctx).await?;
        let sql = format!(
            "SELECT {} FROM v_carrito_detallado WHERE id_localizacion = $1::bigint \
             ORDER BY created_at DESC",
            CART_COLUMNS
        );
        Ok(sqlx::query_as::<_, CartItem>(&sql)
            .bind(location_id)
            .fetch_all(&mut *conn)
            .await?)
    }

    async fn insert_ignore(&self, entry: &NewCartEntry) -> AppResult<bool> {
        let mut conn = acquire_as(&self.pool, &self.ctx).await?;
        let rows_affected = sqlx::query(
            "INSERT INTO carrito_solicitudes (id_usuario, id_localizacion, id_repuesto, cantidad) \
             VALUES ($1::uuid, $2::bigint, $3::uuid, $4) \
             ON CONFLICT (id_usuario, id_repuesto) DO NOTHING",
        )
        .bind(&entry.id_usuario)
        .bind(&entry.id_localizacion)
        .bind(&entry.id_repuesto)
        .bind(entry.cantidad)
        .execute(&mut *conn)
        .await?
        .rows_affected();
        Ok(rows_affected > 0)
    }

    async fn delete(&self, ids: &[String]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut conn = acquire_as(&self.pool, &self.ctx).await?;
        let rows_affected = sqlx::query(
            "DELETE FROM carrito_solicitudes WHERE id_item_carrito::text = ANY($1)",
        )
        .bind(ids)
        .execute(&mut *conn)
        .await?
        .rows_affected();
        Ok(rows_affected)
    }

    async fn create_request(&self, draft: &RequestDraft) -> AppResult<String> {
        let mut tx = begin_as(&self.pool, &self.ctx).await?;

        let id_solicitud: String = sqlx::query_scalar(
            "INSERT INTO solicitudes (id_localizacion_origen, id_localizacion_destino, \
             id_usuario_solicitante, estado, observaciones_generales) \
             VALUES ($1::bigint, $2::bigint, $3::uuid, $4, $5) \
             RETURNING id_solicitud::text",
        )
        .bind(&draft.id_localizacion_origen)
        .bind(&draft.id_localizacion_destino)
        .bind(&draft.id_usuario_solicitante)
        .bind(REQUEST_STATUS_PENDING)
        .bind(&draft.observaciones_generales)
        .fetch_one(&mut *tx)
        .await?;

        let part_ids: Vec<String> = draft.items.iter().map(|i| i.id_repuesto.clone()).collect();
        let quantities: Vec<i32> = draft.items.iter().map(|i| i.cantidad).collect();
        sqlx::query(
            "INSERT INTO detalles_solicitud (id_solicitud, id_repuesto, cantidad_solicitada) \
             SELECT $1::uuid, line.id_repuesto::uuid, line.cantidad \
             FROM UNNEST($2::text[], $3::int4[]) AS line(id_repuesto, cantidad)",
        )
        .bind(&id_solicitud)
        .bind(&part_ids)
        .bind(&quantities)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            "Created request: id={}, origen={}, destino={}, lines={}",
            id_solicitud,
            draft.id_localizacion_origen,
            draft.id_localizacion_destino,
            draft.items.len()
        );
        Ok(id_solicitud)
    }
}

/// What the user fills in when sending the cart.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub id_localizacion_origen: Option<String>,
    pub id_localizacion_destino: Option<String>,
    pub id_usuario_solicitante: Option<String>,
    pub observaciones_generales: String,
}

/// Client-side staging list of a transfer request.
pub struct CartWorkflow<R: CartRepository> {
    repo: R,
    items: Vec<CartItem>,
    loading: bool,
    notifier: Arc<dyn Notifier>,
    cache: Arc<QueryCache>,
}

impl<R: CartRepository> CartWorkflow<R> {
    pub fn new(repo: R, notifier: Arc<dyn Notifier>, cache: Arc<QueryCache>) -> Self {
        Self {
            repo,
            items: Vec::new(),
            loading: false,
            notifier,
            cache,
        }
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Replaces the staged list with the location's cart.
    pub async fn load(&mut self, location_id: &str) -> AppResult<()> {
        self.loading = true;
        let result = self.repo.list(location_id).await;
        self.loading = false;
        match result {
            Ok(items) => {
                self.items = items;
                Ok(())
            }
            Err(e) => {
                tracing::debug!("Cart load failed for location {}", location_id);
                report_with(self.notifier.as_ref(), "Error al cargar el carrito de solicitudes", &e);
                Err(e)
            }
        }
    }

    /// Stages a part and reloads. A part the user already staged is left as is.
    pub async fn add(
        &mut self,
        user_id: &str,
        location_id: &str,
        part_id: &str,
        quantity: i32,
    ) -> AppResult<bool> {
        let entry = NewCartEntry::new(user_id, location_id, part_id).with_quantity(quantity);
        self.loading = true;
        let inserted = self.repo.insert_ignore(&entry).await;
        self.loading = false;
        let inserted = match inserted {
            Ok(inserted) => inserted,
            Err(e) => {
                tracing::debug!("Cart add failed for part {}", part_id);
                report_with(self.notifier.as_ref(), "Error al agregar al carrito", &e);
                return Err(e);
            }
        };
        if !inserted {
            tracing::debug!("Part {} already staged by user {}", part_id, user_id);
        }
        self.cache.invalidate_all(Mutation::CartItem.invalidates()).await;
        self.load(location_id).await?;
        Ok(inserted)
    }

    /// Removes one staged row. Ids that are not staged are ignored.
    pub async fn remove(&mut self, cart_item_id: &str) -> AppResult<()> {
        if !self.items.iter().any(|i| i.id_item_carrito == cart_item_id) {
            tracing::debug!("Cart item {} is not staged, nothing to remove", cart_item_id);
            return Ok(());
        }

        self.loading = true;
        let result = self.repo.delete(&[cart_item_id.to_string()]).await;
        self.loading = false;
        match result {
            Ok(_) => {
                self.items.retain(|i| i.id_item_carrito != cart_item_id);
                self.cache.invalidate_all(Mutation::CartItem.invalidates()).await;
                self.notifier.success("Item eliminado del carrito");
                Ok(())
            }
            Err(e) => {
                tracing::debug!("Cart remove failed for item {}", cart_item_id);
                report_with(self.notifier.as_ref(), "Error al eliminar del carrito", &e);
                Err(e)
            }
        }
    }

    /// Removes several staged rows at once; an empty list is a no-op.
    pub async fn bulk_remove(&mut self, ids: &[String]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.loading = true;
        let result = self.repo.delete(ids).await;
        self.loading = false;
        let removed = result?;
        self.items.retain(|i| !ids.contains(&i.id_item_carrito));
        self.cache.invalidate_all(Mutation::CartItem.invalidates()).await;
        Ok(removed)
    }

    /// Sends the staged items as a new request and clears them from the cart.
    pub async fn submit(&mut self, request: SubmitRequest) -> AppResult<String> {
        let draft = match self.draft(request) {
            Ok(draft) => draft,
            Err(e) => {
                self.notifier.error(&e.user_message());
                return Err(e);
            }
        };

        self.loading = true;
        let created = self.repo.create_request(&draft).await;
        self.loading = false;
        let id_solicitud = match created {
            Ok(id) => id,
            Err(e) => {
                report_with(self.notifier.as_ref(), "Error al enviar la solicitud", &e);
                return Err(e);
            }
        };
        self.notifier.success("Solicitud enviada exitosamente");

        let staged: Vec<String> = self.items.iter().map(|i| i.id_item_carrito.clone()).collect();
        if let Err(e) = self.bulk_remove(&staged).await {
            tracing::warn!("Request {} created but cart cleanup failed: {}", id_solicitud, e);
            self.notifier
                .warning("Solicitud creada, pero hubo un error al limpiar el carrito.");
        }

        self.cache
            .invalidate_all(Mutation::RequestSubmitted.invalidates())
            .await;
        Ok(id_solicitud)
    }

    fn draft(&self, request: SubmitRequest) -> AppResult<RequestDraft> {
        let destino = request
            .id_localizacion_destino
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| AppError::InvalidInput("Seleccione un destino".to_string()))?;
        if self.items.is_empty() {
            return Err(AppError::InvalidInput(
                "Agregue repuestos a la solicitud".to_string(),
            ));
        }
        let origen = request
            .id_localizacion_origen
            .filter(|o| !o.trim().is_empty())
            .ok_or_else(|| {
                AppError::InvalidInput("No se ha seleccionado una ubicación de origen".to_string())
            })?;
        let solicitante = request
            .id_usuario_solicitante
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| AppError::InvalidInput("No se ha identificado el usuario".to_string()))?;

        Ok(RequestDraft {
            id_localizacion_origen: origen,
            id_localizacion_destino: destino,
            id_usuario_solicitante: solicitante,
            observaciones_generales: request.observaciones_generales,
            items: self
                .items
                .iter()
                .map(|i| RequestLine {
                    id_repuesto: i.id_repuesto.clone(),
                    cantidad: i.cantidad,
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::notify::testing::{Level, RecordingNotifier};

    /// In-memory cart with the same (user, part) uniqueness as the table.
    #[derive(Default)]
    struct MemoryCart {
        rows: Mutex<Vec<CartItem>>,
        requests: Mutex<Vec<(String, RequestDraft)>>,
        lines: Mutex<Vec<(String, RequestLine)>>,
        delete_calls: Mutex<usize>,
        fail_list: bool,
        fail_insert: bool,
        fail_delete: bool,
        fail_request: bool,
    }

    #[async_trait]
    impl CartRepository for MemoryCart {
        async fn list(&self, location_id: &str) -> AppResult<Vec<CartItem>> {
            if self.fail_list {
                return Err(AppError::Database(sqlx::Error::PoolTimedOut));
            }
            let mut rows: Vec<CartItem> = self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.id_localizacion == location_id)
                .cloned()
                .collect();
            rows.reverse();
            Ok(rows)
        }

        async fn insert_ignore(&self, entry: &NewCartEntry) -> AppResult<bool> {
            if self.fail_insert {
                return Err(AppError::Database(sqlx::Error::PoolClosed));
            }
            let mut rows = self.rows.lock().unwrap();
            if rows
                .iter()
                .any(|r| r.id_usuario == entry.id_usuario && r.id_repuesto == entry.id_repuesto)
            {
                return Ok(false);
            }
            let n = rows.len() + 1;
            rows.push(CartItem {
                id_item_carrito: format!("c-{}", n),
                id_usuario: entry.id_usuario.clone(),
                id_localizacion: entry.id_localizacion.clone(),
                cantidad: entry.cantidad,
                created_at: None,
                nombre_solicitante: None,
                rol_solicitante: None,
                id_repuesto: entry.id_repuesto.clone(),
                referencia: format!("REF-{}", entry.id_repuesto),
                nombre_repuesto: format!("Repuesto {}", entry.id_repuesto),
                url_imagen: None,
                stock_actual_en_taller: 0,
            });
            Ok(true)
        }

        async fn delete(&self, ids: &[String]) -> AppResult<u64> {
            *self.delete_calls.lock().unwrap() += 1;
            if self.fail_delete {
                return Err(AppError::Database(sqlx::Error::PoolClosed));
            }
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|r| !ids.contains(&r.id_item_carrito));
            Ok((before - rows.len()) as u64)
        }

        async fn create_request(&self, draft: &RequestDraft) -> AppResult<String> {
            if self.fail_request {
                return Err(AppError::Database(sqlx::Error::RowNotFound));
            }
            let mut requests = self.requests.lock().unwrap();
            let id = format!("s-{}", requests.len() + 1);
            requests.push((id.clone(), draft.clone()));
            let mut lines = self.lines.lock().unwrap();
            for line in &draft.items {
                lines.push((id.clone(), line.clone()));
            }
            Ok(id)
        }
    }

    fn workflow(repo: MemoryCart) -> (CartWorkflow<MemoryCart>, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let cache = Arc::new(QueryCache::new(Duration::from_secs(300)));
        (CartWorkflow::new(repo, notifier.clone(), cache), notifier)
    }

    fn submit_request() -> SubmitRequest {
        SubmitRequest {
            id_localizacion_origen: Some("1".to_string()),
            id_localizacion_destino: Some("2".to_string()),
            id_usuario_solicitante: Some("u-1".to_string()),
            observaciones_generales: "Urgente".to_string(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_add_keeps_one_row() {
        let (mut cart, _) = workflow(MemoryCart::default());
        assert!(cart.add("u-1", "1", "p-1", 1).await.unwrap());
        assert!(!cart.add("u-1", "1", "p-1", 3).await.unwrap());

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].cantidad, 1);
    }

    #[tokio::test]
    async fn test_submit_creates_header_and_lines() {
        let (mut cart, notifier) = workflow(MemoryCart::default());
        cart.add("u-1", "1", "p-1", 1).await.unwrap();
        cart.add("u-1", "1", "p-2", 2).await.unwrap();
        cart.add("u-1", "1", "p-3", 1).await.unwrap();

        let id = cart.submit(submit_request()).await.unwrap();

        let requests = cart.repo.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, id);
        let lines = cart.repo.lines.lock().unwrap();
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|(request_id, _)| *request_id == id));
        drop(lines);
        drop(requests);

        assert!(cart.items().is_empty());
        assert!(cart.repo.rows.lock().unwrap().is_empty());
        assert_eq!(
            notifier.of_level(Level::Success),
            vec!["Solicitud enviada exitosamente"]
        );
    }

    #[tokio::test]
    async fn test_submit_empty_cart_is_rejected() {
        let (mut cart, notifier) = workflow(MemoryCart::default());
        let err = cart.submit(submit_request()).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(cart.repo.requests.lock().unwrap().is_empty());
        assert_eq!(
            notifier.of_level(Level::Error),
            vec!["Agregue repuestos a la solicitud"]
        );
    }

    #[tokio::test]
    async fn test_submit_requires_destination() {
        let (mut cart, _) = workflow(MemoryCart::default());
        cart.add("u-1", "1", "p-1", 1).await.unwrap();
        let mut request = submit_request();
        request.id_localizacion_destino = None;
        let err = cart.submit(request).await.unwrap_err();
        assert_eq!(err.user_message(), "Seleccione un destino");
    }

    #[tokio::test]
    async fn test_cleanup_failure_only_warns() {
        let repo = MemoryCart {
            fail_delete: true,
            ..Default::default()
        };
        let (mut cart, notifier) = workflow(repo);
        cart.add("u-1", "1", "p-1", 1).await.unwrap();

        let result = cart.submit(submit_request()).await;
        assert!(result.is_ok());
        assert_eq!(cart.repo.requests.lock().unwrap().len(), 1);
        assert_eq!(
            notifier.of_level(Level::Warning),
            vec!["Solicitud creada, pero hubo un error al limpiar el carrito."]
        );
    }

    #[tokio::test]
    async fn test_failed_request_keeps_cart() {
        let repo = MemoryCart {
            fail_request: true,
            ..Default::default()
        };
        let (mut cart, notifier) = workflow(repo);
        cart.add("u-1", "1", "p-1", 1).await.unwrap();

        assert!(cart.submit(submit_request()).await.is_err());
        assert_eq!(cart.items().len(), 1);
        assert_eq!(*cart.repo.delete_calls.lock().unwrap(), 0);
        assert_eq!(notifier.of_level(Level::Error).len(), 1);
    }

    #[tokio::test]
    async fn test_remove_absent_item_is_noop() {
        let (mut cart, notifier) = workflow(MemoryCart::default());
        cart.add("u-1", "1", "p-1", 1).await.unwrap();

        cart.remove("does-not-exist").await.unwrap();
        assert_eq!(cart.items().len(), 1);
        assert_eq!(*cart.repo.delete_calls.lock().unwrap(), 0);
        assert!(notifier.of_level(Level::Error).is_empty());
    }

    #[tokio::test]
    async fn test_remove_staged_item() {
        let (mut cart, notifier) = workflow(MemoryCart::default());
        cart.add("u-1", "1", "p-1", 1).await.unwrap();
        let id = cart.items()[0].id_item_carrito.clone();

        cart.remove(&id).await.unwrap();
        assert!(cart.items().is_empty());
        assert_eq!(notifier.of_level(Level::Success), vec!["Item eliminado del carrito"]);
    }

    #[tokio::test]
    async fn test_bulk_remove_empty_makes_no_call() {
        let (mut cart, _) = workflow(MemoryCart::default());
        assert_eq!(cart.bulk_remove(&[]).await.unwrap(), 0);
        assert_eq!(*cart.repo.delete_calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_load_is_scoped_to_location() {
        let (mut cart, _) = workflow(MemoryCart::default());
        cart.add("u-1", "1", "p-1", 1).await.unwrap();
        cart.add("u-2", "2", "p-2", 1).await.unwrap();

        cart.load("1").await.unwrap();
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].id_repuesto, "p-1");
        assert!(!cart.is_loading());
    }

    #[tokio::test]
    async fn test_load_failure_shows_backend_message() {
        let repo = MemoryCart {
            fail_list: true,
            ..Default::default()
        };
        let (mut cart, notifier) = workflow(repo);

        let err = cart.load("1").await.unwrap_err();
        let errors = notifier.of_level(Level::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Error al cargar el carrito de solicitudes"));
        assert!(errors[0].contains(&err.user_message()));
        assert!(!cart.is_loading());
    }

    #[tokio::test]
    async fn test_add_failure_shows_backend_message() {
        let repo = MemoryCart {
            fail_insert: true,
            ..Default::default()
        };
        let (mut cart, notifier) = workflow(repo);

        let err = cart.add("u-1", "1", "p-1", 1).await.unwrap_err();
        assert!(cart.items().is_empty());
        assert_eq!(
            notifier.of_level(Level::Error),
            vec![format!("Error al agregar al carrito: {}", err.user_message())]
        );
    }
}
