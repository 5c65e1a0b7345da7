use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::PageRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    Ingreso,
    Salida,
    Venta,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Ingreso => "ingreso",
            MovementType::Salida => "salida",
            MovementType::Venta => "venta",
        }
    }
}

impl std::str::FromStr for MovementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ingreso" => Ok(MovementType::Ingreso),
            "salida" => Ok(MovementType::Salida),
            "venta" => Ok(MovementType::Venta),
            other => Err(format!("Tipo de movimiento desconocido: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementConcept {
    Salida,
    Ingreso,
    Venta,
    Garantia,
    Prestamo,
    Cotizacion,
    Devolucion,
}

impl MovementConcept {
    pub const ALL: [MovementConcept; 7] = [
        MovementConcept::Salida,
        MovementConcept::Ingreso,
        MovementConcept::Venta,
        MovementConcept::Garantia,
        MovementConcept::Prestamo,
        MovementConcept::Cotizacion,
        MovementConcept::Devolucion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementConcept::Salida => "salida",
            MovementConcept::Ingreso => "ingreso",
            MovementConcept::Venta => "venta",
            MovementConcept::Garantia => "garantia",
            MovementConcept::Prestamo => "prestamo",
            MovementConcept::Cotizacion => "cotizacion",
            MovementConcept::Devolucion => "devolucion",
        }
    }
}

impl std::str::FromStr for MovementConcept {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        MovementConcept::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| format!("Concepto desconocido: {}", s))
    }
}

/// `movimientos_tecnicos` joined with part, location and user names.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TechnicalMovement {
    pub id_movimientos_tecnicos: String,
    pub id_localizacion: String,
    pub id_repuesto: String,
    pub id_usuario_responsable: Option<String>,
    pub id_tecnico_asignado: Option<String>,
    pub concepto: Option<String>,
    pub tipo: Option<String>,
    pub cantidad: i32,
    pub fecha: Option<String>,
    pub numero_orden: Option<String>,
    pub descargada: bool,
    pub created_at: Option<String>,
    pub referencia: Option<String>,
    pub nombre_repuesto: Option<String>,
    pub nombre_localizacion: Option<String>,
    pub nombre_responsable: Option<String>,
    pub nombre_tecnico: Option<String>,
}

pub(crate) const MOVEMENT_SELECT: &str = "SELECT m.id_movimientos_tecnicos::text, \
     m.id_localizacion::text, m.id_repuesto::text, m.id_usuario_responsable::text, \
     m.id_tecnico_asignado::text, m.concepto, m.tipo, COALESCE(m.cantidad, 0)::int4 AS cantidad, \
     m.fecha::text, m.numero_orden::text, COALESCE(m.descargada, false) AS descargada, \
     m.created_at::text, r.referencia, r.nombre AS nombre_repuesto, l.nombre AS nombre_localizacion, \
     ur.nombre AS nombre_responsable, ut.nombre AS nombre_tecnico \
     FROM movimientos_tecnicos m \
     LEFT JOIN repuestos r ON r.id_repuesto = m.id_repuesto \
     LEFT JOIN localizacion l ON l.id_localizacion = m.id_localizacion \
     LEFT JOIN usuarios ur ON ur.id_usuario = m.id_usuario_responsable \
     LEFT JOIN usuarios ut ON ut.id_usuario = m.id_tecnico_asignado";

pub(crate) const MOVEMENT_COUNT: &str = "SELECT COUNT(*) FROM movimientos_tecnicos m";

/// Hours after which a movement that was not downloaded is flagged.
pub const DOWNLOAD_DEADLINE_HOURS: i64 = 24;

impl TechnicalMovement {
    /// Not downloaded and older than the download deadline.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        if self.descargada {
            return false;
        }
        self.fecha
            .as_deref()
            .and_then(parse_timestamp)
            .map(|fecha| now - fecha > Duration::hours(DOWNLOAD_DEADLINE_HOURS))
            .unwrap_or(false)
    }
}

/// Accepts the text forms Postgres renders timestamps in.
pub(crate) fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%d %H:%M:%S%#z"] {
        if let Ok(ts) = DateTime::parse_from_str(value, format) {
            return Some(ts.with_timezone(&Utc));
        }
    }
    chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadedFilter {
    #[default]
    All,
    Yes,
    No,
}

impl DownloadedFilter {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DownloadedFilter::All => None,
            DownloadedFilter::Yes => Some(true),
            DownloadedFilter::No => Some(false),
        }
    }
}

impl std::str::FromStr for DownloadedFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "all" => Ok(DownloadedFilter::All),
            "true" | "yes" | "si" => Ok(DownloadedFilter::Yes),
            "false" | "no" => Ok(DownloadedFilter::No),
            other => Err(format!("Filtro de descarga desconocido: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MovementFilters {
    pub page: PageRequest,
    pub location_id: Option<String>,
    pub technician_id: Option<String>,
    /// `YYYY-MM-DD`, inclusive.
    pub start_date: Option<String>,
    /// `YYYY-MM-DD`, inclusive.
    pub end_date: Option<String>,
    pub order_number: Option<String>,
    pub concept: Option<MovementConcept>,
    pub downloaded: DownloadedFilter,
}

/// Arguments of `registrar_movimiento_tecnico`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTechnicalMovement {
    pub id_localizacion: String,
    pub id_repuesto: String,
    pub id_usuario_responsable: String,
    pub concepto: MovementConcept,
    pub tipo: MovementType,
    pub cantidad: i32,
    pub numero_orden: Option<String>,
    pub descargada: bool,
}

/// Business outcome reported by `registrar_movimiento_tecnico`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovementOutcome {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
    pub id_movimiento: Option<serde_json::Value>,
}

/// Warranty exit from the part timeline (`tipo_movimiento = 'salida_garantia'`).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WarrantyMovement {
    pub fecha_movimiento: Option<String>,
    pub referencia: Option<String>,
    pub orden: Option<String>,
    pub tecnico: Option<String>,
    pub cantidad: i32,
}

pub const WARRANTY_MOVEMENT_TYPE: &str = "salida_garantia";
