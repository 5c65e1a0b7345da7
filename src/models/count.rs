use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One `{REF, CANT}` pair read from a count spreadsheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountRow {
    #[serde(rename = "REF")]
    pub reference: String,
    #[serde(rename = "CANT")]
    pub quantity: f64,
}

/// Comparison row returned by `procesar_comparacion_excel`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountResult {
    pub ref_excel: String,
    #[serde(default)]
    pub nombre: Option<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub cant_excel: i64,
    #[serde(default, deserialize_with = "lenient_int")]
    pub cantidad_sistema: i64,
    #[serde(default, deserialize_with = "lenient_int")]
    pub diferencia: i64,
    #[serde(default)]
    pub existe_en_bd: bool,
    #[serde(default)]
    pub existe_en_ubicacion: bool,
    #[serde(default, deserialize_with = "lenient_int")]
    pub cantidad_pq: i64,
}

/// Procedures may render quantities as integers, decimals, strings or null.
fn lenient_int<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .unwrap_or(0),
        serde_json::Value::String(s) => s.trim().parse::<f64>().map(|f| f.round() as i64).unwrap_or(0),
        _ => 0,
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifferenceFilter {
    #[default]
    All,
    Positive,
    Negative,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountFilters {
    pub referencia: String,
    pub diferencia: DifferenceFilter,
    pub existe_en_bd: Option<bool>,
    pub existe_en_ubicacion: Option<bool>,
}

impl CountFilters {
    pub fn matches(&self, row: &CountResult) -> bool {
        let term = self.referencia.trim().to_lowercase();
        if !term.is_empty() && !row.ref_excel.to_lowercase().contains(&term) {
            return false;
        }
        match self.diferencia {
            DifferenceFilter::Positive if row.diferencia <= 0 => return false,
            DifferenceFilter::Negative if row.diferencia >= 0 => return false,
            _ => {}
        }
        if self.existe_en_bd.is_some_and(|v| v != row.existe_en_bd) {
            return false;
        }
        if self
            .existe_en_ubicacion
            .is_some_and(|v| v != row.existe_en_ubicacion)
        {
            return false;
        }
        true
    }
}

/// Totals sent with a count closure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountTotals {
    pub total_items_auditados: i64,
    pub total_diferencia_encontrada: i64,
    pub total_items_pq: i64,
}

/// Editable result of a full count.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CountSheet {
    results: Vec<CountResult>,
}

impl CountSheet {
    pub fn new(results: Vec<CountResult>) -> Self {
        Self { results }
    }

    pub fn results(&self) -> &[CountResult] {
        &self.results
    }

    /// Sets the "PQ" quantity of a reference and recomputes its difference.
    /// An empty value means 0; a non-numeric value is ignored. Returns whether a row changed.
    pub fn set_pq(&mut self, reference: &str, value: &str) -> bool {
        let value = value.trim();
        let pq = if value.is_empty() {
            0
        } else {
            match value.parse::<i64>() {
                Ok(n) => n,
                Err(_) => return false,
            }
        };
        let mut changed = false;
        for row in self.results.iter_mut().filter(|r| r.ref_excel == reference) {
            row.cantidad_pq = pq;
            row.diferencia = row.cant_excel + pq - row.cantidad_sistema;
            changed = true;
        }
        changed
    }

    pub fn totals(&self) -> CountTotals {
        CountTotals {
            total_items_auditados: self.results.len() as i64,
            total_diferencia_encontrada: self.results.iter().filter(|r| r.diferencia != 0).count() as i64,
            total_items_pq: self.results.iter().map(|r| r.cantidad_pq).sum(),
        }
    }

    pub fn filtered(&self, filters: &CountFilters) -> Vec<&CountResult> {
        self.results.iter().filter(|r| filters.matches(r)).collect()
    }

    /// Line items in the shape `guardar_cierre_conteo` stores.
    pub fn closure_items(&self) -> Vec<ClosureItem> {
        self.results
            .iter()
            .map(|r| ClosureItem {
                id_repuesto: None,
                referencia: Some(r.ref_excel.clone()),
                cantidad_real: r.cant_excel,
                cantidad_csa: r.cantidad_sistema,
                cantidad_pq: r.cantidad_pq,
            })
            .collect()
    }
}

/// Candidate returned by `generar_items_conteo_parcial`, filled in by the counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialCountItem {
    pub id_repuesto: String,
    #[serde(default)]
    pub ref_excel: Option<String>,
    #[serde(default)]
    pub nombre: Option<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub cantidad_sistema: i64,
    #[serde(default)]
    pub real: i64,
    #[serde(default)]
    pub pq: i64,
}

impl PartialCountItem {
    pub fn diferencia(&self) -> i64 {
        self.real + self.pq - self.cantidad_sistema
    }
}

pub fn partial_totals(items: &[PartialCountItem]) -> CountTotals {
    CountTotals {
        total_items_auditados: items.len() as i64,
        total_diferencia_encontrada: items.iter().filter(|i| i.diferencia() != 0).count() as i64,
        total_items_pq: items.iter().map(|i| i.pq).sum(),
    }
}

pub fn partial_closure_items(items: &[PartialCountItem]) -> Vec<ClosureItem> {
    items
        .iter()
        .map(|i| ClosureItem {
            id_repuesto: Some(i.id_repuesto.clone()),
            referencia: i.ref_excel.clone(),
            cantidad_real: i.real,
            cantidad_csa: i.cantidad_sistema,
            cantidad_pq: i.pq,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_repuesto: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referencia: Option<String>,
    pub cantidad_real: i64,
    pub cantidad_csa: i64,
    pub cantidad_pq: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountType {
    Total,
    Parcial,
}

impl CountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CountType::Total => "total",
            CountType::Parcial => "parcial",
        }
    }
}

/// Arguments of `guardar_cierre_conteo`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountClosure {
    pub id_localizacion: String,
    pub id_usuario: String,
    pub tipo: CountType,
    pub totals: CountTotals,
    pub observaciones: Option<String>,
    pub items: Vec<ClosureItem>,
}

/// Row of `vista_historial_conteos`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CountHistoryItem {
    pub fecha: Option<String>,
    pub tipo: Option<String>,
    pub usuario: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(reference: &str, excel: i64, system: i64) -> CountResult {
        CountResult {
            ref_excel: reference.to_string(),
            nombre: None,
            cant_excel: excel,
            cantidad_sistema: system,
            diferencia: excel - system,
            existe_en_bd: true,
            existe_en_ubicacion: system > 0,
            cantidad_pq: 0,
        }
    }

    #[test]
    fn test_set_pq_recomputes_difference() {
        let mut sheet = CountSheet::new(vec![result("A-1", 3, 5), result("B-2", 4, 4)]);
        assert!(sheet.set_pq("A-1", "2"));
        assert_eq!(sheet.results()[0].cantidad_pq, 2);
        assert_eq!(sheet.results()[0].diferencia, 0);

        assert!(sheet.set_pq("A-1", ""));
        assert_eq!(sheet.results()[0].diferencia, -2);

        assert!(!sheet.set_pq("A-1", "dos"));
        assert_eq!(sheet.results()[0].cantidad_pq, 0);
        assert!(!sheet.set_pq("Z-9", "1"));
    }

    #[test]
    fn test_totals() {
        let mut sheet = CountSheet::new(vec![result("A-1", 3, 5), result("B-2", 4, 4), result("C-3", 1, 0)]);
        sheet.set_pq("B-2", "1");
        let totals = sheet.totals();
        assert_eq!(totals.total_items_auditados, 3);
        assert_eq!(totals.total_diferencia_encontrada, 3);
        assert_eq!(totals.total_items_pq, 1);
    }

    #[test]
    fn test_filters() {
        let sheet = CountSheet::new(vec![result("A-1", 3, 5), result("B-2", 4, 4), result("AB-3", 1, 0)]);
        let filters = CountFilters {
            referencia: "a".to_string(),
            ..Default::default()
        };
        assert_eq!(sheet.filtered(&filters).len(), 2);

        let filters = CountFilters {
            diferencia: DifferenceFilter::Negative,
            ..Default::default()
        };
        assert_eq!(sheet.filtered(&filters)[0].ref_excel, "A-1");

        let filters = CountFilters {
            existe_en_ubicacion: Some(false),
            ..Default::default()
        };
        let hits = sheet.filtered(&filters);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].ref_excel, "AB-3");
    }

    #[test]
    fn test_partial_totals() {
        let items = vec![
            PartialCountItem {
                id_repuesto: "r-1".to_string(),
                ref_excel: Some("A-1".to_string()),
                nombre: None,
                cantidad_sistema: 4,
                real: 3,
                pq: 1,
            },
            PartialCountItem {
                id_repuesto: "r-2".to_string(),
                ref_excel: None,
                nombre: None,
                cantidad_sistema: 2,
                real: 0,
                pq: 0,
            },
        ];
        let totals = partial_totals(&items);
        assert_eq!(totals.total_items_auditados, 2);
        assert_eq!(totals.total_diferencia_encontrada, 1);
        assert_eq!(totals.total_items_pq, 1);
        assert_eq!(partial_closure_items(&items)[0].cantidad_csa, 4);
    }

    #[test]
    fn test_result_accepts_loose_numbers() {
        let row: CountResult = serde_json::from_value(serde_json::json!({
            "ref_excel": "A-1",
            "cant_excel": "3",
            "cantidad_sistema": 5.0,
            "diferencia": null,
            "existe_en_bd": true
        }))
        .unwrap();
        assert_eq!(row.cant_excel, 3);
        assert_eq!(row.cantidad_sistema, 5);
        assert_eq!(row.diferencia, 0);
        assert!(!row.existe_en_ubicacion);
    }

    #[test]
    fn test_count_row_payload_shape() {
        let row = CountRow {
            reference: "A-1".to_string(),
            quantity: 3.0,
        };
        assert_eq!(
            serde_json::to_value(&row).unwrap(),
            serde_json::json!({"REF": "A-1", "CANT": 3.0})
        );
    }
}
