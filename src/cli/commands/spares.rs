//! `minca spares` - spare-part catalogue

use std::path::PathBuf;

use clap::Subcommand;
use tabled::Tabled;

use crate::cli::output::{day, opt, print_page, print_table, yes_no};
use crate::cli::App;
use crate::db::Direction;
use crate::error::{AppError, AppResult};
use crate::models::{
    PageRequest, SparePart, SparePartChanges, SparePartInput, SparesParams, SpareOrder,
    DEFAULT_BRAND, DEFAULT_CATEGORY,
};
use crate::queries::Mutation;
use crate::services::import_service::{read_sheet, RowError};
use crate::services::{run_import, SpareImporter};
use crate::session::Route;

/// Catalogue sheets carry their column names on the first row.
const IMPORT_HEADER_ROW: usize = 0;

#[derive(Subcommand, Debug)]
pub enum SpareCommands {
    /// List the catalogue
    List(ListArgs),
    /// Create a spare part
    Create(CreateArgs),
    /// Change fields of a spare part
    Update(UpdateArgs),
    /// Delete a spare part
    Delete { id: String },
    /// Import spare parts from a spreadsheet
    Import { file: PathBuf },
    /// Find parts by name or reference
    Search {
        term: String,
        /// Search the selected location's inventory instead of the catalogue
        #[arg(long)]
        location: bool,
    },
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    #[arg(long, default_value_t = 1)]
    pub page: u32,

    #[arg(long, short = 'n', default_value_t = 10)]
    pub limit: u32,

    /// Substring of name or reference
    #[arg(long, short = 's')]
    pub search: Option<String>,

    /// Category, `all` for every category
    #[arg(long, short = 't')]
    pub tipo: Option<String>,

    #[arg(long)]
    pub descontinuado: Option<bool>,

    /// Column to order by
    #[arg(long, value_parser = parse_order, default_value = "fecha_ingreso_inventario")]
    pub order_by: SpareOrder,

    /// Ascending order
    #[arg(long)]
    pub asc: bool,
}

fn parse_order(value: &str) -> Result<SpareOrder, String> {
    SpareOrder::parse(value).ok_or_else(|| format!("columna no permitida: {}", value))
}

#[derive(clap::Args, Debug)]
pub struct CreateArgs {
    pub referencia: String,
    pub nombre: String,
    #[arg(long, default_value_t = 0)]
    pub cantidad_minima: i32,
    #[arg(long, default_value = DEFAULT_CATEGORY)]
    pub tipo: String,
    #[arg(long, default_value = DEFAULT_BRAND)]
    pub marca: String,
    #[arg(long, default_value = "")]
    pub descripcion: String,
    /// `YYYY-MM-DD`
    #[arg(long)]
    pub fecha_estimada: Option<String>,
    #[arg(long)]
    pub url_imagen: Option<String>,
    #[arg(long)]
    pub descontinuado: bool,
}

#[derive(clap::Args, Debug)]
pub struct UpdateArgs {
    pub id: String,
    #[arg(long)]
    pub referencia: Option<String>,
    #[arg(long)]
    pub nombre: Option<String>,
    #[arg(long)]
    pub cantidad_minima: Option<i32>,
    #[arg(long)]
    pub descontinuado: Option<bool>,
    #[arg(long)]
    pub tipo: Option<String>,
    /// `YYYY-MM-DD`, empty to clear
    #[arg(long)]
    pub fecha_estimada: Option<String>,
    /// Empty to clear
    #[arg(long)]
    pub url_imagen: Option<String>,
    #[arg(long)]
    pub marca: Option<String>,
    #[arg(long)]
    pub descripcion: Option<String>,
}

#[derive(Tabled)]
struct SpareRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "REFERENCIA")]
    referencia: String,
    #[tabled(rename = "NOMBRE")]
    nombre: String,
    #[tabled(rename = "TIPO")]
    tipo: String,
    #[tabled(rename = "MÍN.")]
    minimo: i32,
    #[tabled(rename = "DESC.")]
    descontinuado: &'static str,
    #[tabled(rename = "LLEGADA")]
    fecha_estimada: String,
}

impl From<&SparePart> for SpareRow {
    fn from(part: &SparePart) -> Self {
        Self {
            id: part.id_repuesto.clone(),
            referencia: part.referencia.clone(),
            nombre: part.nombre.clone(),
            tipo: opt(&part.tipo),
            minimo: part.cantidad_minima,
            descontinuado: yes_no(part.descontinuado),
            fecha_estimada: day(&part.fecha_estimada),
        }
    }
}

#[derive(Tabled)]
struct MatchRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "REFERENCIA")]
    referencia: String,
    #[tabled(rename = "NOMBRE")]
    nombre: String,
    #[tabled(rename = "STOCK")]
    stock: String,
}

#[derive(Tabled)]
struct ImportErrorRow {
    #[tabled(rename = "FILA")]
    row: usize,
    #[tabled(rename = "VALORES")]
    values: String,
    #[tabled(rename = "ERROR")]
    error: String,
}

impl From<&RowError> for ImportErrorRow {
    fn from(e: &RowError) -> Self {
        Self {
            row: e.row,
            values: e
                .values
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(", "),
            error: e.error.clone(),
        }
    }
}

pub async fn run(app: &mut App, cmd: SpareCommands) -> AppResult<()> {
    app.require(Route::Repuestos)?;
    let ctx = app.context().await?;

    match cmd {
        SpareCommands::List(args) => {
            let params = SparesParams {
                page: PageRequest::new(args.page, args.limit),
                search: args.search,
                tipo: args.tipo,
                descontinuado: args.descontinuado,
                order_by: args.order_by,
                direction: if args.asc { Direction::Asc } else { Direction::Desc },
            };
            let page = app.queries.spares(&ctx, &params).await?;
            print_page(&page, |p| SpareRow::from(p));
        }
        SpareCommands::Create(args) => {
            let input = SparePartInput {
                descontinuado: args.descontinuado,
                tipo: args.tipo,
                marca: args.marca,
                descripcion: args.descripcion,
                fecha_estimada: args.fecha_estimada,
                url_imagen: args.url_imagen,
                ..SparePartInput::new(args.referencia, args.nombre, args.cantidad_minima)
            };
            let part = app.queries.create_spare(&ctx, &input).await?;
            app.notifier
                .success(&format!("Repuesto {} creado", part.referencia));
        }
        SpareCommands::Update(args) => {
            let changes = SparePartChanges {
                referencia: args.referencia,
                nombre: args.nombre,
                cantidad_minima: args.cantidad_minima,
                descontinuado: args.descontinuado,
                tipo: args.tipo,
                fecha_estimada: args.fecha_estimada,
                url_imagen: args.url_imagen,
                marca: args.marca,
                descripcion: args.descripcion,
            };
            let part = app.queries.update_spare(&ctx, &args.id, &changes).await?;
            app.notifier
                .success(&format!("Repuesto {} actualizado", part.referencia));
        }
        SpareCommands::Delete { id } => {
            app.queries.delete_spare(&ctx, &id).await?;
            app.notifier.success("Repuesto eliminado");
        }
        SpareCommands::Import { file } => {
            let records = read_sheet(&file, IMPORT_HEADER_ROW)?;
            if records.is_empty() {
                return Err(AppError::Import(
                    "El archivo no contiene filas con datos".to_string(),
                ));
            }
            let importer = SpareImporter::new(app.queries.spares.clone(), ctx);
            let report = run_import(&importer, &records).await;
            app.queries.after(Mutation::SparePart).await;

            if report.errors.is_empty() {
                app.notifier
                    .success(&format!("{} repuestos importados", report.success));
            } else {
                app.notifier.warning(&format!(
                    "{} repuestos importados, {} filas con errores",
                    report.success,
                    report.errors.len()
                ));
                print_table(report.errors.iter().map(ImportErrorRow::from).collect());
            }
        }
        SpareCommands::Search { term, location } => {
            let location_id = if location { Some(app.location()?) } else { None };
            let matches = app
                .queries
                .spares
                .search(&ctx, &term, location_id.as_deref())
                .await?;
            print_table(
                matches
                    .iter()
                    .map(|m| MatchRow {
                        id: m.id_repuesto.clone(),
                        referencia: m.referencia.clone(),
                        nombre: m.nombre.clone(),
                        stock: m
                            .stock_actual
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| "-".to_string()),
                    })
                    .collect(),
            );
        }
    }
    Ok(())
}
