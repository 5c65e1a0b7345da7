use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Staged request line, read through `v_carrito_detallado`.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct CartItem {
    pub id_item_carrito: String,
    pub id_usuario: String,
    pub id_localizacion: String,
    pub cantidad: i32,
    pub created_at: Option<String>,
    pub nombre_solicitante: Option<String>,
    pub rol_solicitante: Option<String>,
    pub id_repuesto: String,
    pub referencia: String,
    pub nombre_repuesto: String,
    pub url_imagen: Option<String>,
    pub stock_actual_en_taller: i32,
}

pub(crate) const CART_COLUMNS: &str = "id_item_carrito::text, id_usuario::text, id_localizacion::text, \
     COALESCE(cantidad, 1)::int4 AS cantidad, created_at::text, nombre_solicitante, rol_solicitante, \
     id_repuesto::text, referencia, nombre_repuesto, url_imagen, \
     COALESCE(stock_actual_en_taller, 0)::int4 AS stock_actual_en_taller";

/// Row inserted into `carrito_solicitudes`; unique on (user, part).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCartEntry {
    pub id_usuario: String,
    pub id_localizacion: String,
    pub id_repuesto: String,
    pub cantidad: i32,
}

impl NewCartEntry {
    pub fn new(
        id_usuario: impl Into<String>,
        id_localizacion: impl Into<String>,
        id_repuesto: impl Into<String>,
    ) -> Self {
        Self {
            id_usuario: id_usuario.into(),
            id_localizacion: id_localizacion.into(),
            id_repuesto: id_repuesto.into(),
            cantidad: 1,
        }
    }

    pub fn with_quantity(mut self, cantidad: i32) -> Self {
        self.cantidad = cantidad;
        self
    }
}
