use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use async_trait::async_trait;
use calamine::{open_workbook_auto, Data, Reader};
use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::db::AuthContext;
use crate::error::{AppError, AppResult};
use crate::models::spare_part::{DEFAULT_BRAND, DEFAULT_CATEGORY};
use crate::models::SparePartInput;
use crate::services::spares_service::SparePartWriter;

/// One data row keyed by header; empty cells are left out.
pub type Record = BTreeMap<String, String>;

/// Reads the first sheet of a spreadsheet. `header_row` is the 0-based line
/// holding the column names; the rows after it become records.
pub fn read_sheet(path: &Path, header_row: usize) -> AppResult<Vec<Record>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let rows = match extension.as_str() {
        "csv" => read_csv(std::fs::File::open(path)?)?,
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_workbook(path, header_row)?,
        other => {
            return Err(AppError::Import(format!(
                "Formato de archivo no soportado: .{}",
                other
            )))
        }
    };

    // Workbook ranges are already trimmed to the header line.
    let offset = if extension == "csv" { header_row } else { 0 };
    Ok(rows_to_records(rows, offset))
}

fn read_csv<R: Read>(reader: R) -> AppResult<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

fn read_workbook(path: &Path, header_row: usize) -> AppResult<Vec<Vec<String>>> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| AppError::Import("El archivo no contiene hojas".to_string()))?;
    let range = workbook.worksheet_range(&sheet)?;

    // The range starts at the first non-empty cell, not at A1.
    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    let skip = (header_row as u32).saturating_sub(start_row) as usize;
    let padding = vec![String::new(); start_col as usize];

    Ok(range
        .rows()
        .skip(skip)
        .map(|row| {
            let mut cells = padding.clone();
            cells.extend(row.iter().map(cell_text));
            cells
        })
        .collect())
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn rows_to_records(rows: Vec<Vec<String>>, header_row: usize) -> Vec<Record> {
    let mut rows = rows.into_iter().skip(header_row);
    let Some(headers) = rows.next() else {
        return Vec::new();
    };
    let headers: Vec<String> = headers.iter().map(|h| h.trim().to_string()).collect();

    rows.map(|row| {
        headers
            .iter()
            .zip(row)
            .filter(|(header, value)| !header.is_empty() && !value.trim().is_empty())
            .map(|(header, value)| (header.clone(), value.trim().to_string()))
            .collect::<Record>()
    })
    .filter(|record| !record.is_empty())
    .collect()
}

/// Maps one spreadsheet record to a backend write.
#[async_trait]
pub trait RowImporter: Send + Sync {
    async fn import_row(&self, row: &Record) -> AppResult<()>;
}

#[derive(Debug, Clone, Serialize)]
pub struct RowError {
    /// 1-based position among the data rows.
    pub row: usize,
    pub values: Record,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub success: usize,
    pub errors: Vec<RowError>,
}

/// Submits every row on its own; a failing row is recorded and the batch goes on.
pub async fn run_import(importer: &dyn RowImporter, rows: &[Record]) -> ImportReport {
    let mut report = ImportReport::default();
    for (i, row) in rows.iter().enumerate() {
        match importer.import_row(row).await {
            Ok(()) => report.success += 1,
            Err(e) => {
                tracing::warn!("Import row {} failed: {}", i + 1, e);
                report.errors.push(RowError {
                    row: i + 1,
                    values: row.clone(),
                    error: e.user_message(),
                });
            }
        }
    }
    tracing::info!(
        "Import finished: success={}, errors={}",
        report.success,
        report.errors.len()
    );
    report
}

/// Catalogue import; each record becomes one spare part.
pub struct SpareImporter<W: SparePartWriter> {
    writer: W,
    ctx: AuthContext,
}

impl<W: SparePartWriter> SpareImporter<W> {
    pub fn new(writer: W, ctx: AuthContext) -> Self {
        Self { writer, ctx }
    }
}

#[async_trait]
impl<W: SparePartWriter> RowImporter for SpareImporter<W> {
    async fn import_row(&self, row: &Record) -> AppResult<()> {
        let input = spare_input_from_record(row)?;
        self.writer.create(&self.ctx, &input).await?;
        Ok(())
    }
}

pub fn spare_input_from_record(row: &Record) -> AppResult<SparePartInput> {
    let field = |name: &str| row.get(name).map(String::as_str).filter(|v| !v.is_empty());

    let referencia = field("referencia")
        .ok_or_else(|| AppError::InvalidInput("Falta la referencia".to_string()))?;
    let nombre =
        field("nombre").ok_or_else(|| AppError::InvalidInput("Falta el nombre".to_string()))?;
    let cantidad_minima = match field("cantidad_minima") {
        None => {
            return Err(AppError::InvalidInput(
                "Falta la cantidad mínima".to_string(),
            ))
        }
        Some(raw) => parse_quantity(raw).ok_or_else(|| {
            AppError::InvalidInput(format!("Cantidad mínima inválida: {}", raw))
        })?,
    };

    let mut input = SparePartInput::new(referencia, nombre, cantidad_minima);
    input.descontinuado = field("descontinuado")
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "si" | "sí"))
        .unwrap_or(false);
    input.tipo = field("tipo").unwrap_or(DEFAULT_CATEGORY).to_string();
    input.fecha_estimada = field("fecha_estimada")
        .map(|raw| {
            parse_sheet_date(raw)
                .map(|d| d.to_string())
                .ok_or_else(|| AppError::InvalidInput(format!("Fecha estimada inválida: {}", raw)))
        })
        .transpose()?;
    input.url_imagen = field("url_imagen").map(str::to_string);
    input.marca = field("marca").unwrap_or(DEFAULT_BRAND).to_string();
    input.descripcion = field("descripcion").unwrap_or_default().to_string();
    Ok(input)
}

/// Whole, non-negative numbers; spreadsheet floats like `5.0` are accepted.
pub(crate) fn parse_quantity(raw: &str) -> Option<i32> {
    let value: f64 = raw.trim().replace(',', ".").parse().ok()?;
    if value < 0.0 || value.fract() != 0.0 || value > f64::from(i32::MAX) {
        return None;
    }
    Some(value as i32)
}

/// `YYYY-MM-DD` text or an Excel serial day number.
fn parse_sheet_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw.get(..10).unwrap_or(raw), "%Y-%m-%d") {
        return Some(date);
    }
    let serial: f64 = raw.parse().ok()?;
    if !serial.is_finite() {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::try_days(serial.trunc() as i64)?)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::models::SparePart;

    #[derive(Default)]
    struct MemoryWriter {
        created: Mutex<Vec<SparePartInput>>,
    }

    #[async_trait]
    impl SparePartWriter for MemoryWriter {
        async fn create(&self, _ctx: &AuthContext, input: &SparePartInput) -> AppResult<SparePart> {
            let mut created = self.created.lock().unwrap();
            created.push(input.clone());
            Ok(SparePart {
                id_repuesto: format!("r-{}", created.len()),
                referencia: input.referencia.clone(),
                nombre: input.nombre.clone(),
                cantidad_minima: input.cantidad_minima,
                descontinuado: input.descontinuado,
                tipo: Some(input.tipo.clone()),
                fecha_estimada: input.fecha_estimada.clone(),
                url_imagen: input.url_imagen.clone(),
                marca: Some(input.marca.clone()),
                descripcion: Some(input.descripcion.clone()),
                created_at: None,
            })
        }
    }

    fn csv_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_import_with_missing_quantity_reports_one_error() {
        let file = csv_file(
            "referencia,nombre,cantidad_minima,tipo\n\
             PF-100,Pastilla de freno,2,Frenos\n\
             FA-200,Filtro de aire,,Filtros\n\
             BJ-300,Bujía,4,\n\
             AC-400,Aceite 20W50,1,Lubricantes\n",
        );
        let rows = read_sheet(file.path(), 0).unwrap();
        assert_eq!(rows.len(), 4);

        let importer = SpareImporter::new(MemoryWriter::default(), AuthContext::new("u-1", json!({})));
        let report = run_import(&importer, &rows).await;

        assert_eq!(report.success, rows.len() - 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].row, 2);
        assert_eq!(report.errors[0].error, "Falta la cantidad mínima");

        let created = importer.writer.created.lock().unwrap();
        assert_eq!(created[1].referencia, "BJ-300");
        assert_eq!(created[1].tipo, DEFAULT_CATEGORY);
        assert_eq!(created[1].marca, DEFAULT_BRAND);
    }

    #[tokio::test]
    async fn test_out_of_range_date_serial_is_a_row_error() {
        let file = csv_file(
            "referencia,nombre,cantidad_minima,fecha_estimada\n\
             PF-100,Pastilla de freno,2,1e300\n\
             FA-200,Filtro de aire,1,45413\n\
             BJ-300,Bujía,4,inf\n",
        );
        let rows = read_sheet(file.path(), 0).unwrap();

        let importer = SpareImporter::new(MemoryWriter::default(), AuthContext::new("u-1", json!({})));
        let report = run_import(&importer, &rows).await;

        assert_eq!(report.success, 1);
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors[0].row, 1);
        assert_eq!(report.errors[0].error, "Fecha estimada inválida: 1e300");
        assert_eq!(report.errors[1].row, 3);

        let created = importer.writer.created.lock().unwrap();
        assert_eq!(created[0].fecha_estimada.as_deref(), Some("2024-05-01"));
    }

    #[test]
    fn test_parse_sheet_date_bounds() {
        assert_eq!(parse_sheet_date("2024-05-01"), NaiveDate::from_ymd_opt(2024, 5, 1));
        assert_eq!(parse_sheet_date("1e300"), None);
        assert_eq!(parse_sheet_date("-1e300"), None);
        assert_eq!(parse_sheet_date("NaN"), None);
        assert_eq!(parse_sheet_date("9e15"), None);
    }

    #[test]
    fn test_header_row_offset() {
        let file = csv_file("CONTEO TALLER NORTE\nREF.,CANT.\nPF-100,3\n,\nFA-200,0\n");
        let rows = read_sheet(file.path(), 1).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("REF.").map(String::as_str), Some("PF-100"));
        assert_eq!(rows[1].get("CANT.").map(String::as_str), Some("0"));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = read_sheet(Path::new("repuestos.txt"), 0).unwrap_err();
        assert!(matches!(err, AppError::Import(_)));
    }

    #[test]
    fn test_record_mapping() {
        let row: Record = [
            ("referencia", "PF-100"),
            ("nombre", "Pastilla"),
            ("cantidad_minima", "3.0"),
            ("descontinuado", "TRUE"),
            ("fecha_estimada", "45413"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let input = spare_input_from_record(&row).unwrap();
        assert_eq!(input.cantidad_minima, 3);
        assert!(input.descontinuado);
        assert_eq!(input.fecha_estimada.as_deref(), Some("2024-05-01"));
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("7"), Some(7));
        assert_eq!(parse_quantity("2,0"), Some(2));
        assert_eq!(parse_quantity("1.5"), None);
        assert_eq!(parse_quantity("-1"), None);
        assert_eq!(parse_quantity("muchos"), None);
    }
}
