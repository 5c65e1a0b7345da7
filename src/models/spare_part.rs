use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::db::Direction;
use crate::models::PageRequest;

pub const DEFAULT_CATEGORY: &str = "General";
pub const DEFAULT_BRAND: &str = "MINCA";

/// Catalogue row from `repuestos`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SparePart {
    pub id_repuesto: String,
    pub referencia: String,
    pub nombre: String,
    pub cantidad_minima: i32,
    pub descontinuado: bool,
    pub tipo: Option<String>,
    pub fecha_estimada: Option<String>,
    pub url_imagen: Option<String>,
    pub marca: Option<String>,
    pub descripcion: Option<String>,
    pub created_at: Option<String>,
}

pub(crate) const SPARE_PART_COLUMNS: &str = "id_repuesto::text, referencia, nombre, \
     COALESCE(cantidad_minima, 0)::int4 AS cantidad_minima, \
     COALESCE(descontinuado, false) AS descontinuado, tipo, fecha_estimada::text, url_imagen, \
     marca, descripcion, created_at::text";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparePartInput {
    pub referencia: String,
    pub nombre: String,
    pub cantidad_minima: i32,
    pub descontinuado: bool,
    pub tipo: String,
    pub fecha_estimada: Option<String>,
    pub url_imagen: Option<String>,
    pub marca: String,
    pub descripcion: String,
}

impl SparePartInput {
    pub fn new(referencia: impl Into<String>, nombre: impl Into<String>, cantidad_minima: i32) -> Self {
        Self {
            referencia: referencia.into(),
            nombre: nombre.into(),
            cantidad_minima,
            descontinuado: false,
            tipo: DEFAULT_CATEGORY.to_string(),
            fecha_estimada: None,
            url_imagen: None,
            marca: DEFAULT_BRAND.to_string(),
            descripcion: String::new(),
        }
    }
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SparePartChanges {
    pub referencia: Option<String>,
    pub nombre: Option<String>,
    pub cantidad_minima: Option<i32>,
    pub descontinuado: Option<bool>,
    pub tipo: Option<String>,
    pub fecha_estimada: Option<String>,
    pub url_imagen: Option<String>,
    pub marca: Option<String>,
    pub descripcion: Option<String>,
}

impl SparePartChanges {
    pub fn is_empty(&self) -> bool {
        self.referencia.is_none()
            && self.nombre.is_none()
            && self.cantidad_minima.is_none()
            && self.descontinuado.is_none()
            && self.tipo.is_none()
            && self.fecha_estimada.is_none()
            && self.url_imagen.is_none()
            && self.marca.is_none()
            && self.descripcion.is_none()
    }
}

/// Sortable catalogue columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpareOrder {
    #[default]
    FechaIngresoInventario,
    Referencia,
    Nombre,
    CantidadMinima,
    Tipo,
    CreatedAt,
}

impl SpareOrder {
    pub fn column(&self) -> &'static str {
        match self {
            SpareOrder::FechaIngresoInventario => "fecha_ingreso_inventario",
            SpareOrder::Referencia => "referencia",
            SpareOrder::Nombre => "nombre",
            SpareOrder::CantidadMinima => "cantidad_minima",
            SpareOrder::Tipo => "tipo",
            SpareOrder::CreatedAt => "created_at",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "fecha_ingreso_inventario" => Some(SpareOrder::FechaIngresoInventario),
            "referencia" => Some(SpareOrder::Referencia),
            "nombre" => Some(SpareOrder::Nombre),
            "cantidad_minima" => Some(SpareOrder::CantidadMinima),
            "tipo" => Some(SpareOrder::Tipo),
            "created_at" => Some(SpareOrder::CreatedAt),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SparesParams {
    pub page: PageRequest,
    pub search: Option<String>,
    /// `"all"` disables the filter.
    pub tipo: Option<String>,
    pub descontinuado: Option<bool>,
    pub order_by: SpareOrder,
    pub direction: Direction,
}

impl SparesParams {
    pub fn category_filter(&self) -> Option<&str> {
        self.tipo
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty() && *t != "all")
    }
}

/// Autocomplete hit; `stock_actual` is only known when searching a location's inventory.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SparePartMatch {
    pub id_repuesto: String,
    pub referencia: String,
    pub nombre: String,
    pub stock_actual: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_all_is_no_filter() {
        let mut params = SparesParams::default();
        assert_eq!(params.category_filter(), None);
        params.tipo = Some("all".to_string());
        assert_eq!(params.category_filter(), None);
        params.tipo = Some("Frenos".to_string());
        assert_eq!(params.category_filter(), Some("Frenos"));
    }

    #[test]
    fn test_order_whitelist() {
        assert_eq!(SpareOrder::default().column(), "fecha_ingreso_inventario");
        assert_eq!(SpareOrder::parse("nombre"), Some(SpareOrder::Nombre));
        assert_eq!(SpareOrder::parse("nombre; DROP TABLE repuestos"), None);
    }

    #[test]
    fn test_input_defaults() {
        let input = SparePartInput::new("REF-1", "Filtro", 2);
        assert_eq!(input.tipo, DEFAULT_CATEGORY);
        assert_eq!(input.marca, DEFAULT_BRAND);
        assert!(!input.descontinuado);
        assert!(SparePartChanges::default().is_empty());
    }
}
