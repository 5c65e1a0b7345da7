use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::db::Direction;
use crate::models::PageRequest;

/// Row of `v_inventario_completo`: one spare part stocked at one location.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id_inventario: String,
    pub id_localizacion: String,
    pub stock_actual: i32,
    pub posicion: Option<String>,
    pub id_repuesto: String,
    pub referencia: String,
    pub nombre: String,
    pub cantidad_minima: i32,
    pub descontinuado: bool,
    pub tipo: Option<String>,
    pub fecha_estimada: Option<String>,
    pub url_imagen: Option<String>,
    pub estado_stock: Option<String>,
    pub fecha_ingreso_inventario: Option<String>,
    pub nuevo_hasta: Option<String>,
}

pub(crate) const INVENTORY_COLUMNS: &str = "id_inventario::text, id_localizacion::text, \
     COALESCE(stock_actual, 0)::int4 AS stock_actual, posicion, id_repuesto::text, referencia, nombre, \
     COALESCE(cantidad_minima, 0)::int4 AS cantidad_minima, \
     COALESCE(descontinuado, false) AS descontinuado, tipo, fecha_estimada::text, url_imagen, \
     estado_stock, fecha_ingreso_inventario::text, nuevo_hasta::text";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryOrder {
    #[default]
    Referencia,
    Nombre,
    StockActual,
    Posicion,
    EstadoStock,
    FechaIngresoInventario,
}

impl InventoryOrder {
    pub fn column(&self) -> &'static str {
        match self {
            InventoryOrder::Referencia => "referencia",
            InventoryOrder::Nombre => "nombre",
            InventoryOrder::StockActual => "stock_actual",
            InventoryOrder::Posicion => "posicion",
            InventoryOrder::EstadoStock => "estado_stock",
            InventoryOrder::FechaIngresoInventario => "fecha_ingreso_inventario",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "referencia" => Some(InventoryOrder::Referencia),
            "nombre" => Some(InventoryOrder::Nombre),
            "stock_actual" => Some(InventoryOrder::StockActual),
            "posicion" => Some(InventoryOrder::Posicion),
            "estado_stock" => Some(InventoryOrder::EstadoStock),
            "fecha_ingreso_inventario" => Some(InventoryOrder::FechaIngresoInventario),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InventoryParams {
    pub page: PageRequest,
    pub order_by: InventoryOrder,
    pub direction: Direction,
    pub search: Option<String>,
    /// `"all"` disables the filter.
    pub estado_stock: Option<String>,
    pub descontinuado: Option<bool>,
    /// Only rows whose `nuevo_hasta` is still in the future.
    pub is_new: bool,
}

impl Default for InventoryParams {
    fn default() -> Self {
        Self {
            page: PageRequest::default(),
            order_by: InventoryOrder::default(),
            direction: Direction::Asc,
            search: None,
            estado_stock: None,
            descontinuado: None,
            is_new: false,
        }
    }
}

impl InventoryParams {
    pub fn stock_status_filter(&self) -> Option<&str> {
        self.estado_stock
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty() && *s != "all")
    }
}

/// Arguments of `actualizar_item_inventario`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryUpdate {
    pub id_inventario: String,
    pub stock_actual: i32,
    pub posicion: String,
    pub cantidad_minima: i32,
    pub descontinuado: bool,
    pub tipo: String,
    pub fecha_estimada: Option<String>,
    pub nuevo_hasta: Option<String>,
}

impl InventoryUpdate {
    /// Starts from the current row so callers only override what changed.
    pub fn from_item(item: &InventoryItem) -> Self {
        Self {
            id_inventario: item.id_inventario.clone(),
            stock_actual: item.stock_actual,
            posicion: item.posicion.clone().unwrap_or_default(),
            cantidad_minima: item.cantidad_minima,
            descontinuado: item.descontinuado,
            tipo: item.tipo.clone().unwrap_or_default(),
            fecha_estimada: item.fecha_estimada.clone(),
            nuevo_hasta: item.nuevo_hasta.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInventoryItem {
    pub id_repuesto: String,
    pub id_localizacion: String,
    pub cantidad: i32,
    pub posicion: Option<String>,
    pub nuevo_hasta: Option<String>,
}

/// Page size of the per-part movement timeline.
pub const HISTORY_PAGE_SIZE: i64 = 10;

/// Row of `vista_timeline_repuesto`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MovementHistoryItem {
    pub id_repuesto: String,
    pub id_localizacion: Option<String>,
    pub id_localizacion_destino: Option<String>,
    pub tipo_movimiento: String,
    pub cantidad: i32,
    pub id_usuario_responsable: Option<String>,
    pub estado: Option<String>,
    pub fecha_movimiento: Option<String>,
    pub created_at: Option<String>,
    pub metadata: Option<String>,
    pub referencia: String,
    pub nombre_repuesto: Option<String>,
    pub marca: Option<String>,
    pub nombre_localizacion: Option<String>,
    pub usuario_responsable: Option<String>,
    pub stock_acumulado: Option<i32>,
}

pub(crate) const HISTORY_COLUMNS: &str = "id_repuesto::text, id_localizacion::text, \
     id_localizacion_destino::text, tipo_movimiento, COALESCE(cantidad, 0)::int4 AS cantidad, \
     id_usuario_responsable::text, estado, fecha_movimiento::text, created_at::text, metadata::text, \
     referencia, nombre_repuesto, marca, nombre_localizacion, usuario_responsable, \
     stock_acumulado::int4";

/// One page of the timeline plus the index of the next one, if any.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryPage {
    pub items: Vec<MovementHistoryItem>,
    pub next_page: Option<u32>,
}

impl HistoryPage {
    /// A short page means the timeline is exhausted.
    pub fn new(items: Vec<MovementHistoryItem>, page: u32) -> Self {
        let next_page = if (items.len() as i64) < HISTORY_PAGE_SIZE {
            None
        } else {
            Some(page + 1)
        };
        Self { items, next_page }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history_item(n: i32) -> MovementHistoryItem {
        MovementHistoryItem {
            id_repuesto: "r-1".to_string(),
            id_localizacion: Some("1".to_string()),
            id_localizacion_destino: None,
            tipo_movimiento: "ingreso".to_string(),
            cantidad: n,
            id_usuario_responsable: None,
            estado: None,
            fecha_movimiento: None,
            created_at: None,
            metadata: None,
            referencia: "REF-1".to_string(),
            nombre_repuesto: None,
            marca: None,
            nombre_localizacion: None,
            usuario_responsable: None,
            stock_acumulado: None,
        }
    }

    #[test]
    fn test_default_params_order_by_reference_ascending() {
        let params = InventoryParams::default();
        assert_eq!(params.order_by.column(), "referencia");
        assert_eq!(params.direction, Direction::Asc);
        assert_eq!(params.stock_status_filter(), None);
    }

    #[test]
    fn test_stock_status_all_is_no_filter() {
        let params = InventoryParams {
            estado_stock: Some("all".to_string()),
            ..Default::default()
        };
        assert_eq!(params.stock_status_filter(), None);

        let params = InventoryParams {
            estado_stock: Some("bajo".to_string()),
            ..Default::default()
        };
        assert_eq!(params.stock_status_filter(), Some("bajo"));
    }

    #[test]
    fn test_history_next_page_only_after_full_page() {
        let full: Vec<_> = (0..10).map(history_item).collect();
        assert_eq!(HistoryPage::new(full, 0).next_page, Some(1));

        let short: Vec<_> = (0..4).map(history_item).collect();
        assert_eq!(HistoryPage::new(short, 1).next_page, None);
    }
}
