use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::movement::parse_timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarrantyStatus {
    Pendiente,
    Aprobado,
    Rechazado,
}

impl WarrantyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarrantyStatus::Pendiente => "pendiente",
            WarrantyStatus::Aprobado => "aprobado",
            WarrantyStatus::Rechazado => "rechazado",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            WarrantyStatus::Pendiente => "Pendiente",
            WarrantyStatus::Aprobado => "Aprobado",
            WarrantyStatus::Rechazado => "Rechazado",
        }
    }

    /// Blank or unknown statuses read as pending.
    pub fn from_db(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.parse().ok())
            .unwrap_or(WarrantyStatus::Pendiente)
    }
}

impl std::str::FromStr for WarrantyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pendiente" => Ok(WarrantyStatus::Pendiente),
            "aprobado" => Ok(WarrantyStatus::Aprobado),
            "rechazado" => Ok(WarrantyStatus::Rechazado),
            other => Err(format!("Estado de garantía desconocido: {}", other)),
        }
    }
}

/// Row of `v_garantias_dashboard`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Warranty {
    pub id_garantia: String,
    pub fecha_reporte: Option<String>,
    pub nombre_repuesto: Option<String>,
    pub referencia_repuesto: Option<String>,
    pub taller_origen: Option<String>,
    pub estado: Option<String>,
    pub solicitante: Option<String>,
    pub orden: Option<String>,
    pub reportado_por: Option<String>,
    pub tecnico_responsable: Option<String>,
    pub motivo_falla: Option<String>,
    pub kilometraje: Option<String>,
    pub url_evidencia_foto: Option<String>,
    pub comentarios_resolucion: Option<String>,
}

pub(crate) const WARRANTY_COLUMNS: &str = "id_garantia::text, fecha_reporte::text, nombre_repuesto, \
     referencia_repuesto, taller_origen, estado, solicitante, orden::text, reportado_por, \
     tecnico_responsable, motivo_falla, kilometraje::text, url_evidencia_foto, comentarios_resolucion";

impl Warranty {
    pub fn status(&self) -> WarrantyStatus {
        WarrantyStatus::from_db(self.estado.as_deref())
    }
}

/// Fields editable from the warranty detail screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarrantyDetails {
    pub estado: WarrantyStatus,
    pub comentarios_resolucion: Option<String>,
    pub kilometraje: Option<String>,
    pub motivo_falla: Option<String>,
    pub solicitante: Option<String>,
    pub url_evidencia_foto: Option<String>,
}

/// Client-side dashboard filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarrantyFilter {
    /// Matches part name, part reference or origin workshop.
    pub search: String,
    pub status: Option<WarrantyStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl WarrantyFilter {
    pub fn matches(&self, warranty: &Warranty) -> bool {
        let term = self.search.trim().to_lowercase();
        let contains = |field: &Option<String>| {
            field
                .as_deref()
                .map(|v| v.to_lowercase().contains(&term))
                .unwrap_or(false)
        };
        let matches_search = term.is_empty()
            || contains(&warranty.nombre_repuesto)
            || contains(&warranty.referencia_repuesto)
            || contains(&warranty.taller_origen);

        let matches_status = self
            .status
            .map(|s| warranty.estado.as_deref().map(str::to_lowercase).as_deref() == Some(s.as_str()))
            .unwrap_or(true);

        let matches_date = if self.start_date.is_none() && self.end_date.is_none() {
            true
        } else {
            match warranty.fecha_reporte.as_deref().and_then(report_date) {
                Some(day) => {
                    self.start_date.map(|s| day >= s).unwrap_or(true)
                        && self.end_date.map(|e| day <= e).unwrap_or(true)
                }
                None => false,
            }
        };

        matches_search && matches_status && matches_date
    }

    pub fn apply<'a>(&self, warranties: &'a [Warranty]) -> Vec<&'a Warranty> {
        warranties.iter().filter(|w| self.matches(w)).collect()
    }
}

fn report_date(value: &str) -> Option<NaiveDate> {
    parse_timestamp(value)
        .map(|ts| ts.date_naive())
        .or_else(|| NaiveDate::parse_from_str(value.get(..10)?, "%Y-%m-%d").ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warranty(estado: Option<&str>, fecha: &str, taller: &str) -> Warranty {
        Warranty {
            id_garantia: "g-1".to_string(),
            fecha_reporte: Some(fecha.to_string()),
            nombre_repuesto: Some("Pastilla de freno".to_string()),
            referencia_repuesto: Some("PF-100".to_string()),
            taller_origen: Some(taller.to_string()),
            estado: estado.map(str::to_string),
            solicitante: None,
            orden: None,
            reportado_por: None,
            tecnico_responsable: None,
            motivo_falla: None,
            kilometraje: None,
            url_evidencia_foto: None,
            comentarios_resolucion: None,
        }
    }

    #[test]
    fn test_blank_status_is_pending() {
        assert_eq!(WarrantyStatus::from_db(None), WarrantyStatus::Pendiente);
        assert_eq!(WarrantyStatus::from_db(Some("")), WarrantyStatus::Pendiente);
        assert_eq!(WarrantyStatus::from_db(Some("Aprobado")), WarrantyStatus::Aprobado);
        assert_eq!(warranty(None, "2024-05-01", "Norte").status().label(), "Pendiente");
    }

    #[test]
    fn test_filter_by_search_and_status() {
        let rows = vec![
            warranty(Some("aprobado"), "2024-05-01 10:00:00+00", "Taller Norte"),
            warranty(Some("rechazado"), "2024-05-02 10:00:00+00", "Taller Sur"),
        ];
        let filter = WarrantyFilter {
            search: "norte".to_string(),
            ..Default::default()
        };
        assert_eq!(filter.apply(&rows).len(), 1);

        let filter = WarrantyFilter {
            search: "pf-100".to_string(),
            status: Some(WarrantyStatus::Rechazado),
            ..Default::default()
        };
        let hits = filter.apply(&rows);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].taller_origen.as_deref(), Some("Taller Sur"));
    }

    #[test]
    fn test_filter_by_date_range_is_inclusive() {
        let rows = vec![
            warranty(Some("pendiente"), "2024-05-01 23:59:00+00", "A"),
            warranty(Some("pendiente"), "2024-05-03 00:00:00+00", "B"),
        ];
        let filter = WarrantyFilter {
            start_date: NaiveDate::from_ymd_opt(2024, 5, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 5, 2),
            ..Default::default()
        };
        let hits = filter.apply(&rows);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].taller_origen.as_deref(), Some("A"));
    }
}
