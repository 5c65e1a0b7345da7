//! `minca count` - physical inventory counts

use std::path::PathBuf;

use clap::{Subcommand, ValueEnum};
use tabled::Tabled;

use crate::cli::output::{day, opt, print_table, yes_no};
use crate::cli::App;
use crate::error::{AppError, AppResult};
use crate::models::{
    partial_closure_items, partial_totals, CountClosure, CountFilters, CountResult, CountSheet,
    CountTotals, CountType, DifferenceFilter, PartialCountItem,
};
use crate::services::count_service::parse_count_files;
use crate::session::Route;

#[derive(Subcommand, Debug)]
pub enum CountCommands {
    /// Compare counted spreadsheets against the stock of the selected location
    Send(SendArgs),
    /// Count the parts picked for a partial count
    Partial(PartialArgs),
    /// Closed counts of the selected location
    History,
}

#[derive(clap::Args, Debug)]
pub struct SendArgs {
    /// Count spreadsheets, concatenated in order
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
    /// PQ quantity of a reference, `REF=N`
    #[arg(long = "pq", value_parser = parse_pair)]
    pub pq: Vec<(String, String)>,
    /// Substring of the reference
    #[arg(long, default_value = "")]
    pub referencia: String,
    #[arg(long, value_enum, default_value_t = Difference::All)]
    pub diferencia: Difference,
    #[arg(long)]
    pub existe_en_bd: Option<bool>,
    #[arg(long)]
    pub existe_en_ubicacion: Option<bool>,
    /// Register the count as a closed total count
    #[arg(long)]
    pub save: bool,
    #[arg(long)]
    pub observaciones: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct PartialArgs {
    /// Counted quantity of a part, `ID_OR_REF=N`
    #[arg(long = "real", value_parser = parse_pair)]
    pub real: Vec<(String, String)>,
    /// PQ quantity of a part, `ID_OR_REF=N`
    #[arg(long = "pq", value_parser = parse_pair)]
    pub pq: Vec<(String, String)>,
    /// Register the count as a closed partial count
    #[arg(long)]
    pub save: bool,
    #[arg(long)]
    pub observaciones: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Difference {
    All,
    Positive,
    Negative,
}

impl From<Difference> for DifferenceFilter {
    fn from(d: Difference) -> Self {
        match d {
            Difference::All => DifferenceFilter::All,
            Difference::Positive => DifferenceFilter::Positive,
            Difference::Negative => DifferenceFilter::Negative,
        }
    }
}

fn parse_pair(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((key, val)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), val.trim().to_string()))
        }
        _ => Err(format!("se esperaba CLAVE=VALOR: {}", value)),
    }
}

#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "REF.")]
    referencia: String,
    #[tabled(rename = "NOMBRE")]
    nombre: String,
    #[tabled(rename = "CONTADO")]
    contado: i64,
    #[tabled(rename = "SISTEMA")]
    sistema: i64,
    #[tabled(rename = "PQ")]
    pq: i64,
    #[tabled(rename = "DIF.")]
    diferencia: i64,
    #[tabled(rename = "EN BD")]
    en_bd: &'static str,
    #[tabled(rename = "EN UBICACIÓN")]
    en_ubicacion: &'static str,
}

impl From<&CountResult> for ResultRow {
    fn from(r: &CountResult) -> Self {
        Self {
            referencia: r.ref_excel.clone(),
            nombre: opt(&r.nombre),
            contado: r.cant_excel,
            sistema: r.cantidad_sistema,
            pq: r.cantidad_pq,
            diferencia: r.diferencia,
            en_bd: yes_no(r.existe_en_bd),
            en_ubicacion: yes_no(r.existe_en_ubicacion),
        }
    }
}

#[derive(Tabled)]
struct PartialRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "REF.")]
    referencia: String,
    #[tabled(rename = "NOMBRE")]
    nombre: String,
    #[tabled(rename = "SISTEMA")]
    sistema: i64,
    #[tabled(rename = "REAL")]
    real: i64,
    #[tabled(rename = "PQ")]
    pq: i64,
    #[tabled(rename = "DIF.")]
    diferencia: i64,
}

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "FECHA")]
    fecha: String,
    #[tabled(rename = "TIPO")]
    tipo: String,
    #[tabled(rename = "USUARIO")]
    usuario: String,
}

pub async fn run(app: &mut App, cmd: CountCommands) -> AppResult<()> {
    app.require(Route::Inventario)?;
    let ctx = app.context().await?;

    match cmd {
        CountCommands::Send(args) => {
            let location = app.location()?;
            let rows = parse_count_files(&args.files)?;
            let results = app.queries.counts.send_count(&ctx, &location, &rows).await?;

            let mut sheet = CountSheet::new(results);
            for (reference, value) in &args.pq {
                if !sheet.set_pq(reference, value) {
                    app.notifier
                        .warning(&format!("PQ ignorado para {}: {}", reference, value));
                }
            }

            let filters = CountFilters {
                referencia: args.referencia,
                diferencia: args.diferencia.into(),
                existe_en_bd: args.existe_en_bd,
                existe_en_ubicacion: args.existe_en_ubicacion,
            };
            print_table(sheet.filtered(&filters).into_iter().map(ResultRow::from).collect());
            let totals = sheet.totals();
            print_totals(&totals);

            if args.save {
                let closure = CountClosure {
                    id_localizacion: location,
                    id_usuario: app.user_id()?,
                    tipo: CountType::Total,
                    totals,
                    observaciones: args.observaciones,
                    items: sheet.closure_items(),
                };
                app.queries.register_count_closure(&ctx, &closure).await?;
                app.notifier.success("Conteo total registrado");
            }
        }
        CountCommands::Partial(args) => {
            let location = app.location()?;
            let mut items = app
                .queries
                .counts
                .generate_partial_count(&ctx, &location)
                .await?;
            for (key, value) in &args.real {
                fill(&mut items, key, value, |item, n| item.real = n)?;
            }
            for (key, value) in &args.pq {
                fill(&mut items, key, value, |item, n| item.pq = n)?;
            }

            print_table(
                items
                    .iter()
                    .map(|i| PartialRow {
                        id: i.id_repuesto.clone(),
                        referencia: opt(&i.ref_excel),
                        nombre: opt(&i.nombre),
                        sistema: i.cantidad_sistema,
                        real: i.real,
                        pq: i.pq,
                        diferencia: i.diferencia(),
                    })
                    .collect(),
            );
            let totals = partial_totals(&items);
            print_totals(&totals);

            if args.save {
                let closure = CountClosure {
                    id_localizacion: location,
                    id_usuario: app.user_id()?,
                    tipo: CountType::Parcial,
                    totals,
                    observaciones: args.observaciones,
                    items: partial_closure_items(&items),
                };
                app.queries.register_count_closure(&ctx, &closure).await?;
                app.notifier.success("Conteo parcial registrado");
            }
        }
        CountCommands::History => {
            let location = app.location()?;
            let history = app.queries.count_history(&ctx, &location).await?;
            print_table(
                history
                    .iter()
                    .map(|h| HistoryRow {
                        fecha: day(&h.fecha),
                        tipo: opt(&h.tipo),
                        usuario: opt(&h.usuario),
                    })
                    .collect(),
            );
        }
    }
    Ok(())
}

fn print_totals(totals: &CountTotals) {
    println!(
        "Auditados: {}  Con diferencia: {}  PQ: {}",
        totals.total_items_auditados, totals.total_diferencia_encontrada, totals.total_items_pq
    );
}

/// Sets a quantity on the item whose id or reference equals `key`. Blank means 0.
fn fill<F>(items: &mut [PartialCountItem], key: &str, value: &str, set: F) -> AppResult<()>
where
    F: Fn(&mut PartialCountItem, i64),
{
    let n = if value.is_empty() {
        0
    } else {
        value
            .parse::<i64>()
            .map_err(|_| AppError::InvalidInput(format!("Cantidad inválida para {}: {}", key, value)))?
    };
    let item = items
        .iter_mut()
        .find(|i| i.id_repuesto == key || i.ref_excel.as_deref() == Some(key))
        .ok_or_else(|| AppError::NotFound(format!("Repuesto {} no está en el conteo parcial", key)))?;
    set(item, n);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> Vec<PartialCountItem> {
        vec![
            PartialCountItem {
                id_repuesto: "r-1".to_string(),
                ref_excel: Some("PF-100".to_string()),
                nombre: None,
                cantidad_sistema: 5,
                real: 0,
                pq: 0,
            },
            PartialCountItem {
                id_repuesto: "r-2".to_string(),
                ref_excel: Some("FA-200".to_string()),
                nombre: None,
                cantidad_sistema: 2,
                real: 0,
                pq: 0,
            },
        ]
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(
            parse_pair("PF-100 = 3").unwrap(),
            ("PF-100".to_string(), "3".to_string())
        );
        assert_eq!(parse_pair("PF-100=").unwrap().1, "");
        assert!(parse_pair("=3").is_err());
        assert!(parse_pair("PF-100").is_err());
    }

    #[test]
    fn test_fill_by_id_or_reference() {
        let mut items = items();
        fill(&mut items, "r-1", "4", |i, n| i.real = n).unwrap();
        fill(&mut items, "FA-200", "1", |i, n| i.pq = n).unwrap();
        assert_eq!(items[0].real, 4);
        assert_eq!(items[0].diferencia(), -1);
        assert_eq!(items[1].pq, 1);
    }

    #[test]
    fn test_fill_rejects_unknown_part_and_bad_number() {
        let mut items = items();
        assert!(matches!(
            fill(&mut items, "r-9", "1", |i, n| i.real = n),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            fill(&mut items, "r-1", "x", |i, n| i.real = n),
            Err(AppError::InvalidInput(_))
        ));
    }
}
